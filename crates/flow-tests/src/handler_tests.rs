//! Handler mesh tests: submission paths, event ordering, orphan recovery.

use crate::harness::TestMesh;
use flow_handlers::{DataOrigin, NodeEvent};
use flow_types::ChainIndex;
use std::time::Duration;

async fn next_block_added(
    events: &mut tokio::sync::broadcast::Receiver<NodeEvent>,
) -> Option<(ChainIndex, u64)> {
    loop {
        match tokio::time::timeout(Duration::from_secs(5), events.recv()).await {
            Ok(Ok(NodeEvent::BlockAdded {
                chain_index,
                weight,
                ..
            })) => return Some((chain_index, weight)),
            Ok(Ok(_)) => continue,
            _ => return None,
        }
    }
}

#[tokio::test]
async fn test_block_flows_through_mesh() {
    let mesh = TestMesh::start();
    let mut events = mesh.handlers.subscribe();

    let chain = ChainIndex::new(0, 0);
    let block = mesh.mine(chain, 1_000);
    assert!(mesh.handlers.submit_block(block, DataOrigin::Local).await);

    let (added_chain, weight) = next_block_added(&mut events).await.expect("BlockAdded");
    assert_eq!(added_chain, chain);
    assert_eq!(weight, 1);
}

#[tokio::test]
async fn test_block_added_total_order_carries_weights() {
    let mesh = TestMesh::start();
    let mut events = mesh.handlers.subscribe();

    // sequential submissions through different chain handlers still yield
    // one totally ordered event stream
    let order = [
        ChainIndex::new(0, 0),
        ChainIndex::new(1, 1),
        ChainIndex::new(0, 1),
    ];
    for (step, chain) in order.iter().enumerate() {
        // awaiting the previous event makes the prior block visible
        // before the next one is mined
        let block = mesh.mine(*chain, 1_000 * (step as u64 + 1));
        assert!(mesh.handlers.submit_block(block, DataOrigin::Local).await);
        let (added_chain, weight) = next_block_added(&mut events).await.expect("BlockAdded");
        assert_eq!(added_chain, *chain);
        assert_eq!(weight, step as u64 + 1);
    }
}

#[tokio::test]
async fn test_orphan_resolves_when_parent_arrives() {
    let mesh = TestMesh::start();
    let mut events = mesh.handlers.subscribe();
    let chain = ChainIndex::new(0, 0);

    let parent = mesh.mine(chain, 1_000);
    let parent_hash = parent.hash();

    // mine the child against a flow that already contains the parent
    let child = {
        let mut source = crate::harness::TestFlow::new();
        source.flow.add_block(&parent).unwrap();
        crate::harness::mine_on(&source.flow, chain, 2_000)
    };

    // child first: it parks, no event
    assert!(mesh
        .handlers
        .submit_block(child.clone(), DataOrigin::Peer(7))
        .await);
    // then the parent: both install, two events
    assert!(mesh.handlers.submit_block(parent, DataOrigin::Peer(7)).await);

    let (first_chain, first_weight) = next_block_added(&mut events).await.expect("parent event");
    assert_eq!(first_chain, chain);
    assert_eq!(first_weight, 1);

    let (second_chain, second_weight) = next_block_added(&mut events).await.expect("child event");
    assert_eq!(second_chain, chain);
    assert_eq!(second_weight, 2);

    let flow = mesh.handlers.blockflow().read();
    assert!(flow.contains(&parent_hash));
    assert!(flow.contains(&child.hash()));
}

#[tokio::test]
async fn test_duplicate_submission_produces_one_event() {
    let mesh = TestMesh::start();
    let mut events = mesh.handlers.subscribe();
    let chain = ChainIndex::new(1, 0);

    let block = mesh.mine(chain, 1_000);
    assert!(mesh
        .handlers
        .submit_block(block.clone(), DataOrigin::Local)
        .await);
    assert!(mesh.handlers.submit_block(block, DataOrigin::Local).await);

    assert!(next_block_added(&mut events).await.is_some());
    // the duplicate must not produce a second event
    let extra = tokio::time::timeout(Duration::from_millis(300), events.recv()).await;
    assert!(extra.is_err(), "duplicate produced an event");
}

#[tokio::test]
async fn test_template_tracks_new_tips() {
    let mesh = TestMesh::start();
    let chain = ChainIndex::new(0, 0);

    let before = mesh.handlers.prepare_template(chain).await.expect("template");

    let block = mesh.mine(chain, 1_000);
    let hash = block.hash();
    let mut events = mesh.handlers.subscribe();
    assert!(mesh.handlers.submit_block(block, DataOrigin::Local).await);
    next_block_added(&mut events).await.expect("BlockAdded");

    let after = mesh.handlers.prepare_template(chain).await.expect("template");
    assert_ne!(before.deps, after.deps);
    // the freshly mined block is now the intra-chain parent
    assert_eq!(after.deps.parent(chain, 2), hash);
}

#[tokio::test]
async fn test_tx_submission_and_confirmation_event() {
    use flow_types::{Hash, SecretKey, Transaction, TxOutput, TxOutputPoint, UnsignedTransaction};

    let mesh = TestMesh::start();
    let mut events = mesh.handlers.subscribe();

    let key = SecretKey::from_seed([9u8; 32]);
    let unsigned = UnsignedTransaction {
        inputs: vec![TxOutputPoint {
            short_key: 1,
            tx_hash: Hash::hash_blake2b(b"prev"),
            output_index: 0,
        }],
        outputs: vec![TxOutput::plain(10, key.public_key().address())],
    };
    let signature = key.sign(&unsigned.hash());
    let tx = Transaction {
        unsigned,
        signatures: vec![signature],
    };
    let tx_hash = tx.hash();

    assert!(mesh.handlers.submit_tx(tx.clone()).await);

    // a block carrying the transaction confirms it
    let chain = ChainIndex::new(0, 0);
    let block = {
        let flow = mesh.handlers.blockflow().read();
        let deps = flow.get_best_deps(chain);
        let target = flow.next_target(chain);
        drop(flow);
        let transactions = vec![tx];
        let mut header = flow_types::BlockHeader {
            deps,
            tx_merkle_root: flow_types::merkle_root(&transactions),
            timestamp_ms: 1_000,
            target,
            nonce: 0,
        };
        loop {
            let hash = header.hash();
            if ChainIndex::from_hash(&hash, 2) == chain && header.pow_valid() {
                break flow_types::Block {
                    header,
                    transactions,
                };
            }
            header.nonce += 1;
        }
    };
    assert!(mesh.handlers.submit_block(block, DataOrigin::Local).await);

    let confirmed = loop {
        match tokio::time::timeout(Duration::from_secs(5), events.recv()).await {
            Ok(Ok(NodeEvent::TxConfirmed { tx_hash, .. })) => break tx_hash,
            Ok(Ok(_)) => continue,
            other => panic!("no confirmation: {other:?}"),
        }
    };
    assert_eq!(confirmed, tx_hash);
}
