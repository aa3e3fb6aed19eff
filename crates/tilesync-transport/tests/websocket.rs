//! Integration tests for the WebSocket dialer.
//!
//! These tests spin up a real localhost WebSocket server and check that
//! frames flow both ways and that failures are classified correctly.

#[cfg(feature = "websocket")]
mod websocket {
    use futures_util::{SinkExt, StreamExt};
    use tilesync_transport::{
        Connection, Connector, TransportError, WebSocketConnector,
    };
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio_tungstenite::tungstenite::Message;

    #[tokio::test]
    async fn test_websocket_connect_and_exchange_frames() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        // Server: accept one client, echo the first text frame back
        // with a prefix, then close.
        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(stream)
                .await
                .expect("server handshake");
            let msg = ws.next().await.unwrap().unwrap();
            let text = msg.into_text().unwrap();
            ws.send(Message::text(format!("echo:{}", text.as_str())))
                .await
                .unwrap();
            ws.send(Message::Close(None)).await.unwrap();
        });

        let conn = WebSocketConnector
            .connect(&format!("ws://{addr}"))
            .await
            .expect("client should connect");
        assert!(conn.id().into_inner() > 0);

        conn.send(r#"["ping",{"clientTime":1}]"#).await.unwrap();

        let reply = conn.recv().await.unwrap().expect("should get a frame");
        assert_eq!(reply, r#"echo:["ping",{"clientTime":1}]"#);

        // Server closed: recv sees a clean close.
        let closed = conn.recv().await.unwrap();
        assert!(closed.is_none());

        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_websocket_refused_port_is_transient() {
        // Bind then drop to get a port nobody is listening on.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = WebSocketConnector
            .connect(&format!("ws://{addr}"))
            .await
            .err()
            .expect("connect should fail");

        assert!(matches!(err, TransportError::Connect { .. }));
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_websocket_http_rejection_is_terminal() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        // A plain HTTP server that refuses the upgrade.
        let server = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 1024];
            let _ = stream.read(&mut buf).await.unwrap();
            stream
                .write_all(
                    b"HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\n\r\n",
                )
                .await
                .unwrap();
        });

        let err = WebSocketConnector
            .connect(&format!("ws://{addr}"))
            .await
            .err()
            .expect("upgrade should be rejected");

        assert!(matches!(err, TransportError::Handshake { .. }));
        assert!(!err.is_transient());
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_websocket_invalid_url_is_terminal() {
        let err = WebSocketConnector
            .connect("not a url")
            .await
            .err()
            .expect("bad url should fail");
        assert!(!err.is_transient());
    }
}
