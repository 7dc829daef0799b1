//! Push-style fan-out of store snapshots and the derived board kept current from them.
//!
//! The store publishes its full materialised contents after every write; there
//! is no diffing. `LiveBoard` recomputes rankings, dashboard, and SLA queue from
//! each snapshot, so a lagging subscriber only ever needs the newest message.

use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::clock::Clock;
use super::report::{dashboard_stats, sla_queue, DashboardStats, SlaQueue};
use super::repository::StoreSnapshot;
use super::scoring::{score_contractors, ContractorPerformance};

/// Enough to absorb a burst of writes between board recomputations.
const FEED_CAPACITY: usize = 64;

#[derive(Clone)]
pub struct SnapshotFeed {
    tx: broadcast::Sender<Arc<StoreSnapshot>>,
}

impl Default for SnapshotFeed {
    fn default() -> Self {
        Self::new()
    }
}

impl SnapshotFeed {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(FEED_CAPACITY);
        Self { tx }
    }

    /// Returns the number of subscribers that will see the snapshot.
    pub fn publish(&self, snapshot: StoreSnapshot) -> usize {
        // No subscribers is not an error.
        self.tx.send(Arc::new(snapshot)).unwrap_or(0)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Arc<StoreSnapshot>> {
        self.tx.subscribe()
    }
}

/// Everything the authority dashboard renders, derived from one snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoardView {
    pub generated_at: DateTime<Utc>,
    pub rankings: Vec<ContractorPerformance>,
    pub dashboard: DashboardStats,
    pub queue: SlaQueue,
}

impl BoardView {
    pub fn derive(snapshot: &StoreSnapshot, now: DateTime<Utc>) -> Self {
        Self {
            generated_at: now,
            rankings: score_contractors(&snapshot.issues, &snapshot.contractors, now),
            dashboard: dashboard_stats(&snapshot.issues, now),
            queue: sla_queue(&snapshot.issues, now),
        }
    }
}

#[derive(Clone, Default)]
pub struct LiveBoard {
    view: Arc<RwLock<Option<BoardView>>>,
}

impl LiveBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&self, snapshot: &StoreSnapshot, now: DateTime<Utc>) -> BoardView {
        let view = BoardView::derive(snapshot, now);
        *self.view.write().expect("board lock poisoned") = Some(view.clone());
        view
    }

    pub fn current(&self) -> Option<BoardView> {
        self.view.read().expect("board lock poisoned").clone()
    }

    /// Keep the board in sync with `feed` until the feed is dropped.
    pub fn spawn<C>(&self, feed: &SnapshotFeed, clock: Arc<C>) -> JoinHandle<()>
    where
        C: Clock + 'static,
    {
        let mut rx = feed.subscribe();
        let board = self.clone();

        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(snapshot) => {
                        let view = board.apply(&snapshot, clock.now());
                        debug!(
                            issues = snapshot.issues.len(),
                            overdue = view.queue.overdue,
                            "live board refreshed"
                        );
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "live board lagged behind the snapshot feed");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }
}
