//! Rendezvous Module Tests
//!
//! Runs the presence service on loopback and drives it through real clients
//! and raw framed connections.
//!
//! ## Test Scopes
//! - **Registration**: happy path, observed-address fallback, field
//!   validation replies.
//! - **Discovery**: query contents and client-side self-filtering.
//! - **Lifecycle**: heartbeat touch-only semantics, unregister, staleness
//!   sweep.

#[cfg(test)]
mod tests {
    use crate::framing::{recv_message, send_message};
    use crate::rendezvous::client::RendezvousClient;
    use crate::rendezvous::protocol::{RendezvousRequest, RendezvousResponse};
    use crate::rendezvous::server::RendezvousServer;
    use crate::rendezvous::types::RendezvousRecord;

    use std::sync::Arc;
    use std::time::{Duration, Instant};

    use tokio::net::TcpStream;

    async fn start_server() -> Arc<RendezvousServer> {
        let server = RendezvousServer::new("127.0.0.1:0".parse().unwrap())
            .await
            .expect("failed to start rendezvous server");
        server.start();
        server
    }

    async fn wait_for<F: Fn() -> bool>(condition: F, what: &str) {
        let deadline = Instant::now() + Duration::from_secs(3);
        while !condition() {
            if Instant::now() > deadline {
                panic!("timed out waiting for {}", what);
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    // ============================================================
    // REGISTRATION TESTS
    // ============================================================

    #[tokio::test]
    async fn test_register_then_query_from_another_user() {
        let server = start_server().await;

        let alice = RendezvousClient::new("alice", 9001, "127.0.0.1", server.local_addr.port());
        assert!(alice.register().await, "registration should succeed");

        let bob = RendezvousClient::new("bob", 9002, "127.0.0.1", server.local_addr.port());
        let users = bob.get_online_users().await;

        assert_eq!(users.len(), 1);
        assert_eq!(users[0].username, "alice");
        assert_eq!(users[0].address, "127.0.0.1");
        assert_eq!(users[0].port, 9001);
    }

    #[tokio::test]
    async fn test_query_filters_own_username() {
        let server = start_server().await;

        let alice = RendezvousClient::new("alice", 9001, "127.0.0.1", server.local_addr.port());
        assert!(alice.register().await);

        let users = alice.get_online_users().await;
        assert!(users.is_empty(), "a user never sees herself in the list");
    }

    #[tokio::test]
    async fn test_register_with_missing_fields_is_refused_with_reason() {
        let server = start_server().await;

        // A request with no username decodes (serde default) and must be
        // answered, not dropped.
        let mut conn = TcpStream::connect(server.local_addr).await.unwrap();
        send_message(
            &mut conn,
            &serde_json::json!({"type": "register", "port": 9001}),
        )
        .await
        .unwrap();

        let reply: RendezvousResponse = recv_message(&mut conn).await.unwrap().unwrap();
        match reply {
            RendezvousResponse::RegisterResponse { success, reason } => {
                assert!(!success);
                assert_eq!(reason.as_deref(), Some("missing required fields"));
            }
            other => panic!("wrong reply: {:?}", other),
        }

        assert!(server.users.is_empty());
    }

    #[tokio::test]
    async fn test_register_port_zero_counts_as_missing() {
        let server = start_server().await;

        let mut conn = TcpStream::connect(server.local_addr).await.unwrap();
        send_message(
            &mut conn,
            &RendezvousRequest::Register {
                username: "alice".to_string(),
                port: 0,
                address: None,
            },
        )
        .await
        .unwrap();

        let reply: RendezvousResponse = recv_message(&mut conn).await.unwrap().unwrap();
        assert!(matches!(
            reply,
            RendezvousResponse::RegisterResponse { success: false, .. }
        ));
    }

    #[tokio::test]
    async fn test_reported_address_wins_over_observed() {
        let server = start_server().await;

        let mut conn = TcpStream::connect(server.local_addr).await.unwrap();
        send_message(
            &mut conn,
            &RendezvousRequest::Register {
                username: "alice".to_string(),
                port: 9001,
                address: Some("10.0.0.5".to_string()),
            },
        )
        .await
        .unwrap();
        let _reply: RendezvousResponse = recv_message(&mut conn).await.unwrap().unwrap();

        let record = server.users.get("alice").expect("alice should be registered");
        assert_eq!(record.address, "10.0.0.5");
        assert_eq!(record.port, 9001);
    }

    #[tokio::test]
    async fn test_unreported_address_falls_back_to_source_ip() {
        let server = start_server().await;

        let mut conn = TcpStream::connect(server.local_addr).await.unwrap();
        send_message(
            &mut conn,
            &RendezvousRequest::Register {
                username: "alice".to_string(),
                port: 9001,
                address: None,
            },
        )
        .await
        .unwrap();
        let _reply: RendezvousResponse = recv_message(&mut conn).await.unwrap().unwrap();

        let record = server.users.get("alice").unwrap();
        assert_eq!(record.address, "127.0.0.1");
    }

    #[tokio::test]
    async fn test_re_register_replaces_existing_entry() {
        let server = start_server().await;

        let first = RendezvousClient::new("alice", 9001, "127.0.0.1", server.local_addr.port());
        assert!(first.register().await);
        let second = RendezvousClient::new("alice", 9005, "127.0.0.1", server.local_addr.port());
        assert!(second.register().await);

        assert_eq!(server.users.len(), 1);
        assert_eq!(server.users.get("alice").unwrap().port, 9005);
    }

    // ============================================================
    // LIFECYCLE TESTS
    // ============================================================

    #[tokio::test]
    async fn test_heartbeat_touches_existing_entry() {
        let server = start_server().await;
        server
            .users
            .insert("alice".to_string(), RendezvousRecord::new("10.0.0.5", 9001));
        let before = server.users.get("alice").unwrap().last_seen;

        let mut conn = TcpStream::connect(server.local_addr).await.unwrap();
        send_message(
            &mut conn,
            &RendezvousRequest::Heartbeat {
                username: "alice".to_string(),
            },
        )
        .await
        .unwrap();
        drop(conn);

        wait_for(
            || server.users.get("alice").unwrap().last_seen > before,
            "heartbeat to advance last_seen",
        )
        .await;
    }

    #[tokio::test]
    async fn test_heartbeat_never_creates_an_entry() {
        let server = start_server().await;

        let mut conn = TcpStream::connect(server.local_addr).await.unwrap();
        send_message(
            &mut conn,
            &RendezvousRequest::Heartbeat {
                username: "ghost".to_string(),
            },
        )
        .await
        .unwrap();
        drop(conn);

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(server.users.is_empty());
    }

    #[tokio::test]
    async fn test_unregister_removes_entry() {
        let server = start_server().await;

        let alice = RendezvousClient::new("alice", 9001, "127.0.0.1", server.local_addr.port());
        assert!(alice.register().await);
        assert_eq!(server.users.len(), 1);

        alice.unregister().await;

        wait_for(|| server.users.is_empty(), "alice to be unregistered").await;
    }

    // ============================================================
    // STALENESS SWEEP TESTS
    // ============================================================

    #[tokio::test]
    async fn test_sweep_deletes_only_stale_entries() {
        let server = start_server().await;

        server.users.insert(
            "stale".to_string(),
            RendezvousRecord {
                address: "10.0.0.5".to_string(),
                port: 9001,
                last_seen: Instant::now() - Duration::from_secs(61),
            },
        );
        server
            .users
            .insert("fresh".to_string(), RendezvousRecord::new("10.0.0.6", 9002));

        server.sweep_once();

        assert!(server.users.get("stale").is_none(), "stale entry must be swept");
        assert!(server.users.get("fresh").is_some(), "fresh entry must survive");
    }

    #[tokio::test]
    async fn test_swept_user_is_absent_from_query() {
        let server = start_server().await;
        server.users.insert(
            "alice".to_string(),
            RendezvousRecord {
                address: "10.0.0.5".to_string(),
                port: 9001,
                last_seen: Instant::now() - Duration::from_secs(120),
            },
        );

        server.sweep_once();

        let bob = RendezvousClient::new("bob", 9002, "127.0.0.1", server.local_addr.port());
        assert!(bob.get_online_users().await.is_empty());
    }
}
