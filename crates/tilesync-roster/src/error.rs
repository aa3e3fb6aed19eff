//! Error types for the roster.

use tilesync_protocol::EntityId;

/// Errors from roster operations. Both are logged and otherwise harmless:
/// the roster is left unchanged.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RosterError {
    #[error("entity {0} is already in the roster")]
    AlreadyPresent(EntityId),

    #[error("entity {0} is not in the roster")]
    UnknownEntity(EntityId),
}
