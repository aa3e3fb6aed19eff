//! End-to-end test against a real localhost WebSocket server speaking the
//! game's event-array protocol.

#[cfg(feature = "websocket")]
mod websocket {
    use std::time::{Duration, Instant};

    use futures_util::{SinkExt, StreamExt};
    use serde_json::{Value, json};
    use tilesync::prelude::*;
    use tilesync::session::SessionConfig;
    use tokio::net::TcpListener;
    use tokio::sync::oneshot;
    use tokio_tungstenite::tungstenite::Message;

    struct NoInput;

    impl InputSource for NoInput {
        fn is_pressed(&self, _action: Action) -> bool {
            false
        }
    }

    #[tokio::test]
    async fn test_controller_syncs_with_websocket_server() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (position_tx, position_rx) = oneshot::channel::<Value>();

        // Server: welcome the player, introduce one peer, answer pings,
        // and report the first position update it hears.
        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(stream)
                .await
                .expect("server handshake");
            let mut position_tx = Some(position_tx);

            while let Some(Ok(msg)) = ws.next().await {
                let Message::Text(text) = msg else { continue };
                let event: Value = serde_json::from_str(text.as_str()).unwrap();
                let replies = match event[0].as_str() {
                    Some("joinGame") => vec![
                        json!(["playerJoined", {
                            "id": "me",
                            "nickname": event[1]["nickname"],
                            "x": 400, "y": 300
                        }]),
                        json!(["gameState", {"players": [
                            {"id": "me", "x": 400, "y": 300},
                            {"id": "p1", "nickname": "Zelda", "x": 10, "y": 20,
                             "direction": "left", "color": "#FF6B6B"}
                        ]}]),
                    ],
                    Some("ping") => vec![json!(["pong", event[1]])],
                    Some("updatePosition") => {
                        if let Some(tx) = position_tx.take() {
                            let _ = tx.send(event[1].clone());
                        }
                        vec![]
                    }
                    _ => vec![],
                };
                for reply in replies {
                    ws.send(Message::text(reply.to_string())).await.unwrap();
                }
            }
        });

        let mut session = SessionConfig::with_endpoints([format!("ws://{addr}")]);
        session.auto_reconnect = false;
        let config = SyncConfig {
            session,
            ..SyncConfig::default()
        };
        let mut controller = GameSessionController::builder(WebSocketConnector)
            .config(config)
            .nickname("Hero")
            .build()
            .unwrap();
        controller.connect().await.unwrap();

        let local = LocalPlayerState {
            x: 400.0,
            y: 300.0,
            ..LocalPlayerState::default()
        };
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            let view = controller.frame(&local, &NoInput, Instant::now());
            if view.local_id.is_some()
                && view.remote_count == 1
                && view.latency.is_some()
            {
                assert_eq!(view.play_mode, PlayMode::Multiplayer);
                let p1 = view.visible[0];
                assert_eq!(p1.display_name, "Zelda");
                assert_eq!(p1.color, "#FF6B6B");
                assert_eq!(p1.facing, Direction::Left);
                break;
            }
            assert!(Instant::now() < deadline, "controller never synced");
            tokio::time::sleep(Duration::from_millis(16)).await;
        }
        assert_eq!(controller.local_id(), Some(&EntityId::new("me")));

        let position = tokio::time::timeout(Duration::from_secs(5), position_rx)
            .await
            .expect("server never saw a position")
            .unwrap();
        assert_eq!(position["x"], 400);
        assert_eq!(position["y"], 300);
        assert_eq!(position["area"], "down");

        controller.disconnect();
        assert_eq!(controller.session().state(), ConnectionState::Disconnected);
        tokio::time::timeout(Duration::from_secs(5), server)
            .await
            .expect("server should see the close")
            .unwrap();
    }
}
