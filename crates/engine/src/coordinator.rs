//! Single-flight recomputation and snapshot fan-out.
//!
//! Each campaign id moves through `Idle → Scheduled → Computing → Idle`.
//! A change on an idle campaign spawns one driver task; changes that
//! arrive while it computes only mark the campaign `Scheduled`, so a burst
//! of events costs at most one extra computation. Every computation takes a
//! fresh generation number and a snapshot is published only if its
//! generation is newer than the last published one, so subscribers never
//! see a campaign go backwards. On-demand computations go through the same
//! slot: a caller either starts the driver or waits for the run that follows
//! the one in flight.
//!
//! Slot state is guarded by one mutex that is never held across an await.
//! Lock order is always slots, then subscribers.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};

use incentive_core::progress::ProgressSnapshot;
use incentive_core::store::ProgressStore;
use incentive_core::types::DbId;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::calculator::ProgressCalculator;
use crate::config::EngineConfig;
use crate::error::ProgressError;

// ---------------------------------------------------------------------------
// Slot state
// ---------------------------------------------------------------------------

/// Scheduling phase of a campaign.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    /// A computation is owed, either queued behind the one in flight or
    /// left behind by an upstream failure.
    Scheduled,
    Computing,
}

/// Observable state of one campaign.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotStatus {
    pub phase: Phase,
    /// A driver task is running for the campaign.
    pub in_flight: bool,
    /// Generation of the last published snapshot, 0 if none.
    pub published_generation: u64,
}

/// Result of one driver run, whether or not it was published.
#[derive(Debug, Clone)]
struct Outcome {
    generation: u64,
    result: Result<ProgressSnapshot, ProgressError>,
}

#[derive(Debug)]
struct Slot {
    in_flight: bool,
    pending: bool,
    last_generation: u64,
    published_generation: u64,
    latest: Option<ProgressSnapshot>,
    outcome: watch::Sender<Option<Outcome>>,
}

impl Default for Slot {
    fn default() -> Self {
        Self {
            in_flight: false,
            pending: false,
            last_generation: 0,
            published_generation: 0,
            latest: None,
            outcome: watch::channel(None).0,
        }
    }
}

impl Slot {
    /// Mark a computation as owed. Returns `true` when no driver is running
    /// and the caller must start one.
    fn schedule(&mut self) -> bool {
        self.pending = true;
        !std::mem::replace(&mut self.in_flight, true)
    }

    fn phase(&self) -> Phase {
        if self.pending {
            Phase::Scheduled
        } else if self.in_flight {
            Phase::Computing
        } else {
            Phase::Idle
        }
    }

    fn next_generation(&mut self) -> u64 {
        self.last_generation += 1;
        self.last_generation
    }

    fn is_disposable(&self) -> bool {
        !self.in_flight && !self.pending && self.latest.is_none()
    }
}

struct Subscriber {
    id: u64,
    sender: mpsc::UnboundedSender<ProgressSnapshot>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

// ---------------------------------------------------------------------------
// Inner
// ---------------------------------------------------------------------------

pub(crate) struct Inner {
    pub(crate) calculator: ProgressCalculator,
    pub(crate) recalc_concurrency: usize,
    slots: Mutex<HashMap<DbId, Slot>>,
    subscribers: RwLock<HashMap<DbId, Vec<Subscriber>>>,
    next_subscriber_id: AtomicU64,
}

impl Inner {
    /// Start a driver iteration: clear the pending flag and take a generation.
    fn begin(&self, campaign_id: DbId) -> u64 {
        let mut slots = lock(&self.slots);
        let slot = slots.entry(campaign_id).or_default();
        slot.pending = false;
        slot.next_generation()
    }

    /// Compute, confirm the campaign is still active, then publish.
    ///
    /// The snapshot is returned even when it was not published.
    async fn run_computation(
        &self,
        campaign_id: DbId,
        generation: u64,
    ) -> Result<ProgressSnapshot, ProgressError> {
        let snapshot = self.calculator.compute(campaign_id, generation).await?;

        match self.calculator.store().get_campaign(campaign_id).await? {
            Some(campaign) if campaign.is_active => {
                self.publish(snapshot.clone());
            }
            _ => {
                tracing::debug!(
                    campaign_id,
                    generation,
                    "Campaign deactivated during computation, snapshot discarded"
                );
            }
        }
        Ok(snapshot)
    }

    /// Publish a snapshot unless a newer generation is already out.
    ///
    /// Sends happen under the slot lock so per-campaign delivery order
    /// follows generation order.
    pub(crate) fn publish(&self, snapshot: ProgressSnapshot) -> bool {
        let campaign_id = snapshot.campaign_id;
        let mut slots = lock(&self.slots);
        let slot = slots.entry(campaign_id).or_default();

        if snapshot.generation <= slot.published_generation {
            tracing::debug!(
                campaign_id,
                generation = snapshot.generation,
                published_generation = slot.published_generation,
                "Stale snapshot discarded"
            );
            return false;
        }

        slot.published_generation = snapshot.generation;
        slot.latest = Some(snapshot.clone());

        let subscribers = read(&self.subscribers);
        let delivered = subscribers.get(&campaign_id).map_or(0, |list| {
            list.iter()
                .filter(|s| s.sender.send(snapshot.clone()).is_ok())
                .count()
        });
        tracing::debug!(
            campaign_id,
            generation = snapshot.generation,
            delivered,
            "Snapshot published"
        );
        true
    }

    fn remove_subscriber(&self, campaign_id: DbId, subscriber_id: u64) {
        let mut subscribers = write(&self.subscribers);
        if let Some(list) = subscribers.get_mut(&campaign_id) {
            list.retain(|s| s.id != subscriber_id);
            if list.is_empty() {
                subscribers.remove(&campaign_id);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// ChangeCoordinator
// ---------------------------------------------------------------------------

/// Keeps subscribers' view of each campaign's progress consistent with
/// the minimum recomputation work.
///
/// Cheap to clone; all clones share state. Must be used from within a
/// Tokio runtime because [`notify`](Self::notify) spawns driver tasks.
#[derive(Clone)]
pub struct ChangeCoordinator {
    pub(crate) inner: Arc<Inner>,
}

impl ChangeCoordinator {
    pub fn new(calculator: ProgressCalculator, config: &EngineConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                calculator,
                recalc_concurrency: config.recalc_concurrency.max(1),
                slots: Mutex::new(HashMap::new()),
                subscribers: RwLock::new(HashMap::new()),
                next_subscriber_id: AtomicU64::new(1),
            }),
        }
    }

    pub fn store(&self) -> &Arc<dyn ProgressStore> {
        self.inner.calculator.store()
    }

    /// Record a change to a campaign and make sure a computation follows.
    ///
    /// Spawns a driver when none is running; otherwise the change is
    /// coalesced into the next computation of the running driver.
    pub fn notify(&self, campaign_id: DbId) {
        let start = lock(&self.inner.slots)
            .entry(campaign_id)
            .or_default()
            .schedule();
        self.start_driver(campaign_id, start);
    }

    /// Compute a campaign's progress on demand and publish it.
    ///
    /// Shares the single-flight slot with [`notify`](Self::notify): when a
    /// computation is already running, the caller waits for the run that
    /// follows it instead of starting its own, so the result always reflects
    /// data read after the call began. A successful run settles a campaign
    /// left `Scheduled` by an earlier failure.
    pub async fn compute_progress(
        &self,
        campaign_id: DbId,
    ) -> Result<ProgressSnapshot, ProgressError> {
        let (start, after, mut outcome) = {
            let mut slots = lock(&self.inner.slots);
            let slot = slots.entry(campaign_id).or_default();
            let after = slot.last_generation;
            (slot.schedule(), after, slot.outcome.subscribe())
        };
        self.start_driver(campaign_id, start);

        let settled = outcome
            .wait_for(|o| o.as_ref().is_some_and(|o| o.generation > after))
            .await;
        match settled {
            Ok(current) => match &*current {
                Some(o) => o.result.clone(),
                None => Err(ProgressError::NotFound(campaign_id)),
            },
            // The slot is only dropped once the campaign stopped resolving.
            Err(_) => Err(ProgressError::NotFound(campaign_id)),
        }
    }

    fn start_driver(&self, campaign_id: DbId, start: bool) {
        if start {
            tokio::spawn(drive(Arc::clone(&self.inner), campaign_id));
        } else {
            tracing::trace!(campaign_id, "Change coalesced into scheduled computation");
        }
    }

    /// Receive every snapshot published for the campaign from now on.
    ///
    /// The last published snapshot, if any, is delivered first.
    pub fn subscribe(&self, campaign_id: DbId) -> SnapshotSubscription {
        let (sender, receiver) = mpsc::unbounded_channel();
        let id = self.inner.next_subscriber_id.fetch_add(1, Ordering::Relaxed);

        let slots = lock(&self.inner.slots);
        if let Some(latest) = slots.get(&campaign_id).and_then(|s| s.latest.clone()) {
            let _ = sender.send(latest);
        }
        write(&self.inner.subscribers)
            .entry(campaign_id)
            .or_default()
            .push(Subscriber { id, sender });
        drop(slots);

        SnapshotSubscription {
            campaign_id,
            id,
            receiver,
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Invoke `on_snapshot` for every snapshot published for the campaign.
    ///
    /// The callback runs on a spawned task until the returned handle is
    /// unsubscribed or dropped.
    pub fn subscribe_with<F>(&self, campaign_id: DbId, mut on_snapshot: F) -> CallbackSubscription
    where
        F: FnMut(ProgressSnapshot) + Send + 'static,
    {
        let mut subscription = self.subscribe(campaign_id);
        let task = tokio::spawn(async move {
            while let Some(snapshot) = subscription.recv().await {
                on_snapshot(snapshot);
            }
        });
        CallbackSubscription { task }
    }

    /// Last published snapshot of a campaign.
    pub fn latest(&self, campaign_id: DbId) -> Option<ProgressSnapshot> {
        lock(&self.inner.slots)
            .get(&campaign_id)
            .and_then(|s| s.latest.clone())
    }

    pub fn status(&self, campaign_id: DbId) -> SlotStatus {
        lock(&self.inner.slots)
            .get(&campaign_id)
            .map_or(
                SlotStatus {
                    phase: Phase::Idle,
                    in_flight: false,
                    published_generation: 0,
                },
                |s| SlotStatus {
                    phase: s.phase(),
                    in_flight: s.in_flight,
                    published_generation: s.published_generation,
                },
            )
    }

    pub fn subscriber_count(&self, campaign_id: DbId) -> usize {
        read(&self.inner.subscribers)
            .get(&campaign_id)
            .map_or(0, Vec::len)
    }
}

/// Driver loop: compute until no change arrived during the last run.
///
/// Every run's outcome is handed to callers waiting in
/// [`ChangeCoordinator::compute_progress`]. On an upstream failure with no
/// newer change pending, the campaign is left `Scheduled` without a driver;
/// the next change or a manual recompute tries again. A campaign that no
/// longer resolves has its slot dropped once nothing else refers to it.
async fn drive(inner: Arc<Inner>, campaign_id: DbId) {
    loop {
        let generation = inner.begin(campaign_id);
        let result = inner.run_computation(campaign_id, generation).await;

        let (upstream_failed, not_found) = match &result {
            Ok(_) => (false, false),
            Err(ProgressError::NotFound(_)) => {
                tracing::debug!(campaign_id, "Changed campaign no longer exists");
                (false, true)
            }
            Err(e @ ProgressError::Upstream(_)) => {
                tracing::warn!(campaign_id, generation, error = %e, "Progress computation failed");
                (true, false)
            }
        };

        let mut slots = lock(&inner.slots);
        let slot = slots.entry(campaign_id).or_default();
        slot.outcome.send_replace(Some(Outcome { generation, result }));
        if slot.pending {
            continue;
        }
        slot.in_flight = false;
        if upstream_failed {
            slot.pending = true;
        }
        if not_found && slot.is_disposable() {
            slots.remove(&campaign_id);
        }
        break;
    }
}

// ---------------------------------------------------------------------------
// Subscriptions
// ---------------------------------------------------------------------------

/// Stream of snapshots for one campaign. Dropping it unsubscribes.
pub struct SnapshotSubscription {
    campaign_id: DbId,
    id: u64,
    receiver: mpsc::UnboundedReceiver<ProgressSnapshot>,
    inner: Weak<Inner>,
}

impl SnapshotSubscription {
    pub fn campaign_id(&self) -> DbId {
        self.campaign_id
    }

    /// Wait for the next snapshot; `None` once the coordinator is gone.
    pub async fn recv(&mut self) -> Option<ProgressSnapshot> {
        self.receiver.recv().await
    }

    /// Next snapshot if one is already queued.
    pub fn try_recv(&mut self) -> Option<ProgressSnapshot> {
        self.receiver.try_recv().ok()
    }

    pub fn unsubscribe(self) {}
}

impl Drop for SnapshotSubscription {
    fn drop(&mut self) {
        if let Some(inner) = self.inner.upgrade() {
            inner.remove_subscriber(self.campaign_id, self.id);
        }
    }
}

/// Handle of a callback subscription. Dropping it unsubscribes.
pub struct CallbackSubscription {
    task: JoinHandle<()>,
}

impl CallbackSubscription {
    pub fn unsubscribe(self) {}
}

impl Drop for CallbackSubscription {
    fn drop(&mut self) {
        self.task.abort();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use incentive_core::progress::{CalculationOptions, Strategy};

    use super::*;
    use crate::memory::MemoryStore;

    fn coordinator() -> ChangeCoordinator {
        let calculator =
            ProgressCalculator::new(Arc::new(MemoryStore::new()), CalculationOptions::default());
        ChangeCoordinator::new(calculator, &EngineConfig::default())
    }

    fn snapshot(campaign_id: DbId, generation: u64, percentage: f64) -> ProgressSnapshot {
        ProgressSnapshot {
            campaign_id,
            current_value: percentage,
            percentage,
            is_completed: false,
            criteria_breakdown: Vec::new(),
            strategy: Strategy::Simple,
            counted_transactions: 0,
            computed_at: Utc::now(),
            generation,
        }
    }

    #[tokio::test]
    async fn older_generation_never_overwrites_newer() {
        let coordinator = coordinator();
        let mut sub = coordinator.subscribe(1);

        assert!(coordinator.inner.publish(snapshot(1, 4, 80.0)));
        assert!(!coordinator.inner.publish(snapshot(1, 3, 60.0)));

        assert_eq!(sub.try_recv().unwrap().generation, 4);
        assert!(sub.try_recv().is_none());
        assert_eq!(coordinator.latest(1).unwrap().percentage, 80.0);
        assert_eq!(coordinator.status(1).published_generation, 4);
    }

    #[tokio::test]
    async fn equal_generation_is_discarded() {
        let coordinator = coordinator();
        assert!(coordinator.inner.publish(snapshot(1, 2, 10.0)));
        assert!(!coordinator.inner.publish(snapshot(1, 2, 20.0)));
        assert_eq!(coordinator.latest(1).unwrap().percentage, 10.0);
    }

    #[tokio::test]
    async fn campaigns_are_independent() {
        let coordinator = coordinator();
        let mut sub = coordinator.subscribe(2);

        assert!(coordinator.inner.publish(snapshot(1, 9, 90.0)));
        assert!(coordinator.inner.publish(snapshot(2, 1, 5.0)));

        let received = sub.try_recv().unwrap();
        assert_eq!(received.campaign_id, 2);
        assert!(sub.try_recv().is_none());
    }

    #[tokio::test]
    async fn late_subscriber_gets_latest_first() {
        let coordinator = coordinator();
        coordinator.inner.publish(snapshot(1, 1, 30.0));

        let mut sub = coordinator.subscribe(1);
        assert_eq!(sub.try_recv().unwrap().percentage, 30.0);
    }

    #[tokio::test]
    async fn dropping_subscription_unsubscribes() {
        let coordinator = coordinator();
        let sub = coordinator.subscribe(1);
        let other = coordinator.subscribe(1);
        assert_eq!(coordinator.subscriber_count(1), 2);

        drop(sub);
        assert_eq!(coordinator.subscriber_count(1), 1);
        other.unsubscribe();
        assert_eq!(coordinator.subscriber_count(1), 0);
    }

    #[test]
    fn slot_phase_follows_flags() {
        let mut slot = Slot::default();
        assert_eq!(slot.phase(), Phase::Idle);
        slot.in_flight = true;
        assert_eq!(slot.phase(), Phase::Computing);
        slot.pending = true;
        assert_eq!(slot.phase(), Phase::Scheduled);
        slot.in_flight = false;
        assert_eq!(slot.phase(), Phase::Scheduled);
    }

    #[test]
    fn generations_increase() {
        let mut slot = Slot::default();
        assert_eq!(slot.next_generation(), 1);
        assert_eq!(slot.next_generation(), 2);
    }

    #[tokio::test]
    async fn unknown_campaign_leaves_no_slot() {
        let coordinator = coordinator();
        let result = coordinator.compute_progress(77).await;
        assert!(matches!(result, Err(ProgressError::NotFound(77))));
        assert!(lock(&coordinator.inner.slots).get(&77).is_none());
    }

    #[tokio::test]
    async fn notified_missing_campaign_leaves_no_slot() {
        let coordinator = coordinator();
        coordinator.notify(78);
        for _ in 0..400 {
            if lock(&coordinator.inner.slots).get(&78).is_none() {
                return;
            }
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
        panic!("slot kept for a campaign that does not exist");
    }
}
