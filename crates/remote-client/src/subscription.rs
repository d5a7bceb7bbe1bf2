//! One long-poll loop per push topic.
//!
//! ```text
//!   ┌─► subscribe(topic) ──Ok(push)──► CoreEvent::Push ──► wait for ack ─┐
//!   │            │                                                       │
//!   │            └──Err──► CoreEvent::SubscriptionFailed ──► sleep ──────┤
//!   └────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A topic never has two polls in flight, and it is not re-armed until the
//! core has finished handling the previous push.
use std::time::Duration;

use remote_proto::protocol::Topic;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::core::CoreEvent;
use crate::rpc::RpcClient;

/// Starts one loop per topic.
pub fn spawn_all(
    rpc: &RpcClient,
    events_tx: &mpsc::Sender<CoreEvent>,
    resubscribe_delay: Duration,
    cancel: &CancellationToken,
) -> Vec<JoinHandle<()>> {
    Topic::ALL
        .iter()
        .map(|topic| {
            tokio::spawn(run(
                *topic,
                rpc.clone(),
                events_tx.clone(),
                resubscribe_delay,
                cancel.clone(),
            ))
        })
        .collect()
}

pub async fn run(
    topic: Topic,
    rpc: RpcClient,
    events_tx: mpsc::Sender<CoreEvent>,
    resubscribe_delay: Duration,
    cancel: CancellationToken,
) {
    info!("subscription: {} started", topic);
    loop {
        let result = tokio::select! {
            _ = cancel.cancelled() => break,
            result = rpc.subscribe(topic) => result,
        };

        match result {
            Ok(push) => {
                debug!("subscription: {} fired", topic);
                let (done_tx, done_rx) = oneshot::channel();
                if events_tx
                    .send(CoreEvent::Push {
                        push,
                        done: done_tx,
                    })
                    .await
                    .is_err()
                {
                    break;
                }
                // Dropped sender means the core is gone.
                if done_rx.await.is_err() {
                    break;
                }
            }
            Err(error) => {
                warn!(
                    "subscription: {} failed: {}; retrying in {:?}",
                    topic, error, resubscribe_delay
                );
                if events_tx
                    .send(CoreEvent::SubscriptionFailed { topic, error })
                    .await
                    .is_err()
                {
                    break;
                }
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(resubscribe_delay) => {}
                }
            }
        }
    }
    info!("subscription: {} stopped", topic);
}
