//! Sync protocol tests: two meshes exchanging messages in memory.

use crate::harness::TestMesh;
use flow_handlers::DataOrigin;
use flow_sync::{BrokerState, SyncMessage, Synchronizer};
use flow_types::{BrokerConfig, ChainIndex};

fn broker() -> BrokerConfig {
    BrokerConfig::single(2)
}

/// Shuttle messages between two synchronizers until both go quiet.
async fn drive(
    left: &mut Synchronizer,
    left_id: u64,
    right: &mut Synchronizer,
    right_id: u64,
    opening: Vec<(bool, SyncMessage)>,
) {
    // (to_left, message) pairs
    let mut queue: Vec<(bool, SyncMessage)> = opening;
    let mut budget = 64;
    while let Some((to_left, message)) = queue.pop() {
        budget -= 1;
        assert!(budget > 0, "message exchange did not converge");
        if to_left {
            // right -> left: left handles it, replies go to right
            if let Ok(replies) = left.handle_message(right_id, message).await {
                queue.extend(replies.into_iter().map(|reply| (false, reply)));
            }
        } else if let Ok(replies) = right.handle_message(left_id, message).await {
            queue.extend(replies.into_iter().map(|reply| (true, reply)));
        }
    }
}

#[tokio::test]
async fn test_fresh_peers_sync_to_synced() {
    let mesh_a = TestMesh::start();
    let mesh_b = TestMesh::start();

    let mut sync_a = Synchronizer::new(mesh_a.handlers.clone(), broker());
    let mut sync_b = Synchronizer::new(mesh_b.handlers.clone(), broker());

    // a=1 sees peer b=2 and vice versa
    let hello_a = sync_a.add_peer(2);
    let hello_b = sync_b.add_peer(1);

    drive(
        &mut sync_a,
        1,
        &mut sync_b,
        2,
        vec![(true, hello_b), (false, hello_a)],
    )
    .await;

    assert_eq!(sync_a.state_of(2), Some(BrokerState::Synced));
    assert_eq!(sync_b.state_of(1), Some(BrokerState::Synced));
}

#[tokio::test]
async fn test_lagging_peer_catches_up() {
    let mesh_ahead = TestMesh::start();
    let mesh_behind = TestMesh::start();

    // give the first node some history, waiting for each installation
    let mut events = mesh_ahead.handlers.subscribe();
    for step in 1..=3u64 {
        let block = mesh_ahead.mine(ChainIndex::new(0, 0), 1_000 * step);
        assert!(
            mesh_ahead
                .handlers
                .submit_block(block, DataOrigin::Local)
                .await
        );
        let event =
            tokio::time::timeout(std::time::Duration::from_secs(5), events.recv()).await;
        assert!(event.is_ok(), "block {step} did not install");
    }

    let mut sync_ahead = Synchronizer::new(mesh_ahead.handlers.clone(), broker());
    let mut sync_behind = Synchronizer::new(mesh_behind.handlers.clone(), broker());

    let hello_ahead = sync_ahead.add_peer(2);
    let hello_behind = sync_behind.add_peer(1);

    drive(
        &mut sync_behind,
        2,
        &mut sync_ahead,
        1,
        vec![(true, hello_ahead), (false, hello_behind)],
    )
    .await;

    // the lagging node ends up with the same canonical tip
    tokio::time::sleep(std::time::Duration::from_millis(200)).await;
    let tip_ahead = mesh_ahead
        .handlers
        .blockflow()
        .read()
        .best_tip(ChainIndex::new(0, 0));
    let tip_behind = mesh_behind
        .handlers
        .blockflow()
        .read()
        .best_tip(ChainIndex::new(0, 0));
    assert_eq!(tip_ahead, tip_behind);
}

#[tokio::test]
async fn test_malformed_message_scores_peer_down() {
    let mesh = TestMesh::start();
    let mut sync = Synchronizer::new(mesh.handlers.clone(), broker());
    sync.add_peer(9);

    // wrong-size locator vector is a protocol violation
    let result = sync
        .handle_message(
            9,
            SyncMessage::SyncRequest {
                locators: vec![Vec::new()], // expected 4 chains for G=2
            },
        )
        .await;
    assert!(result.is_err());
    assert_eq!(sync.score_of(9), Some(-1));

    // unknown peers are rejected outright
    let unknown = sync
        .handle_message(77, SyncMessage::BlockRequest { hashes: Vec::new() })
        .await;
    assert!(unknown.is_err());
}

#[tokio::test]
async fn test_incompatible_handshake_rejected() {
    let mesh = TestMesh::start();
    let mut sync = Synchronizer::new(mesh.handlers.clone(), broker());
    sync.add_peer(3);

    let result = sync
        .handle_message(
            3,
            SyncMessage::Handshake {
                version: flow_sync::PROTOCOL_VERSION,
                groups: 16, // wrong deployment
                broker_from: 0,
                broker_until: 16,
            },
        )
        .await;
    assert!(result.is_err());
    assert_eq!(sync.state_of(3), Some(BrokerState::Handshaking));
}

#[tokio::test]
async fn test_disconnect_drops_session() {
    let mesh = TestMesh::start();
    let mut sync = Synchronizer::new(mesh.handlers.clone(), broker());
    sync.add_peer(5);
    assert!(sync.state_of(5).is_some());

    sync.remove_peer(5);
    assert!(sync.state_of(5).is_none());

    // messages after disconnect are protocol violations
    let result = sync
        .handle_message(5, SyncMessage::BlockRequest { hashes: Vec::new() })
        .await;
    assert!(result.is_err());
}
