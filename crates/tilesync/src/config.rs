//! Aggregate configuration.

use serde::{Deserialize, Serialize};
use tilesync_roster::InterpolationConfig;
use tilesync_session::SessionConfig;
use tilesync_throttle::ThrottleConfig;

use crate::ConfigError;

const ENDPOINT_SCHEMES: [&str; 4] = ["ws://", "wss://", "http://", "https://"];

/// Everything tunable about a multiplayer session, in one place.
///
/// Every field has a default, so a partial JSON document is enough:
///
/// ```rust
/// use tilesync::SyncConfig;
///
/// let config = SyncConfig::from_json_str(
///     r#"{"session":{"endpoints":[{"url":"ws://localhost:3001"}]}}"#,
/// )
/// .unwrap();
/// assert_eq!(config.session.endpoints.len(), 1);
/// ```
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub session: SessionConfig,
    pub throttle: ThrottleConfig,
    pub interpolation: InterpolationConfig,
}

impl SyncConfig {
    /// Parses, checks and clamps a JSON config.
    ///
    /// # Errors
    /// `ConfigError::Parse` for malformed JSON, `ConfigError::Invalid` for
    /// values that can't be clamped into shape.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: SyncConfig = serde_json::from_str(json)?;
        config.check()?;
        Ok(config.validated())
    }

    /// Rejects values no clamping can fix.
    ///
    /// # Errors
    /// `ConfigError::Invalid` naming the first bad endpoint.
    pub fn check(&self) -> Result<(), ConfigError> {
        for endpoint in &self.session.endpoints {
            let url = endpoint.url.trim();
            if url.is_empty() {
                return Err(ConfigError::Invalid("empty endpoint url".into()));
            }
            if !ENDPOINT_SCHEMES.iter().any(|s| url.starts_with(s)) {
                return Err(ConfigError::Invalid(format!(
                    "endpoint {url} must start with ws://, wss://, http:// \
                     or https://"
                )));
            }
        }
        Ok(())
    }

    /// Returns a copy with every section's out-of-range values clamped.
    pub fn validated(&self) -> Self {
        Self {
            session: self.session.validated(),
            throttle: self.throttle.validated(),
            interpolation: self.interpolation.validated(),
        }
    }
}
