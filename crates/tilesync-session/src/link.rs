//! A live link: either a real connection or the offline peer.

use tilesync_transport::{Connection, ConnectionId, TransportError};

use crate::{LinkMode, OfflineConnection};

pub(crate) enum Link<T> {
    Remote(T),
    Offline(OfflineConnection),
}

impl<T> Link<T> {
    pub(crate) fn mode(&self) -> LinkMode {
        match self {
            Link::Remote(_) => LinkMode::Remote,
            Link::Offline(_) => LinkMode::Offline,
        }
    }
}

impl<T: Connection> Connection for Link<T> {
    async fn send(&self, frame: &str) -> Result<(), TransportError> {
        match self {
            Link::Remote(conn) => conn.send(frame).await,
            Link::Offline(conn) => conn.send(frame).await,
        }
    }

    async fn recv(&self) -> Result<Option<String>, TransportError> {
        match self {
            Link::Remote(conn) => conn.recv().await,
            Link::Offline(conn) => conn.recv().await,
        }
    }

    async fn close(&self) -> Result<(), TransportError> {
        match self {
            Link::Remote(conn) => conn.close().await,
            Link::Offline(conn) => conn.close().await,
        }
    }

    fn id(&self) -> ConnectionId {
        match self {
            Link::Remote(conn) => conn.id(),
            Link::Offline(conn) => conn.id(),
        }
    }
}
