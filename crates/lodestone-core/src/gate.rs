//! The region generation gate.
//!
//! A region load runs the claim on the I/O pool. Only the caller whose
//! claim inserted the row hands a placement job to the mutation lane, so a
//! region gets at most one vein no matter how often or how concurrently it
//! is loaded. The store's atomic insert is the only guard.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use lodestone_db::DurableStore;
use lodestone_types::{RealmId, RegionKey};
use lodestone_world::{BlockAccess, PlacementOutcome, PlacementSettings, place_vein};
use tokio::task::JoinHandle;

use crate::lanes::{IoPool, MutationLane};

/// What a single claim attempt did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimOutcome {
    /// This call claimed the region and queued its placement.
    Claimed,
    /// The region was claimed earlier; nothing queued.
    AlreadyClaimed,
    /// The region is outside the target realm; no claim was attempted.
    Rejected,
    /// The store could not answer; treated as not claimed.
    Unavailable,
    /// The claim succeeded but the mutation lane had stopped.
    LaneClosed,
}

/// Claims regions and dispatches vein placement for world `W`.
pub struct RegionGate<W> {
    store: DurableStore,
    lane: MutationLane<W>,
    pool: IoPool,
    realm: RealmId,
    settings: Arc<PlacementSettings>,
    dispatched: Arc<AtomicU64>,
}

impl<W> Clone for RegionGate<W> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            lane: self.lane.clone(),
            pool: self.pool.clone(),
            realm: self.realm.clone(),
            settings: Arc::clone(&self.settings),
            dispatched: Arc::clone(&self.dispatched),
        }
    }
}

impl<W> std::fmt::Debug for RegionGate<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegionGate")
            .field("realm", &self.realm)
            .field("dispatched", &self.dispatched.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl<W> RegionGate<W>
where
    W: BlockAccess + Send + 'static,
{
    /// Create a gate for regions of `realm`.
    pub fn new(
        store: DurableStore,
        lane: MutationLane<W>,
        pool: IoPool,
        realm: RealmId,
        settings: PlacementSettings,
    ) -> Self {
        Self {
            store,
            lane,
            pool,
            realm,
            settings: Arc::new(settings),
            dispatched: Arc::new(AtomicU64::new(0)),
        }
    }

    /// The only realm this gate claims in.
    pub const fn realm(&self) -> &RealmId {
        &self.realm
    }

    /// Placement jobs handed to the lane so far.
    pub fn dispatched(&self) -> u64 {
        self.dispatched.load(Ordering::Acquire)
    }

    /// React to a region load: run the claim on the I/O pool and return
    /// without waiting for it.
    pub fn on_region_load(&self, key: RegionKey) -> JoinHandle<Option<ClaimOutcome>> {
        let gate = self.clone();
        self.pool
            .spawn(async move { gate.claim_and_dispatch(&key).await })
    }

    /// Claim `key` and, if this call won, queue exactly one placement job.
    pub async fn claim_and_dispatch(&self, key: &RegionKey) -> ClaimOutcome {
        if key.realm != self.realm {
            tracing::debug!(region = %key, target = %self.realm, "Ignoring region outside target realm");
            return ClaimOutcome::Rejected;
        }

        match self.store.claims().claim_if_absent(key).await {
            Ok(true) => {}
            Ok(false) => {
                tracing::trace!(region = %key, "Region already claimed");
                return ClaimOutcome::AlreadyClaimed;
            }
            Err(e) => {
                tracing::warn!(region = %key, error = %e, "Claim store unavailable, skipping region");
                return ClaimOutcome::Unavailable;
            }
        }

        let settings = Arc::clone(&self.settings);
        let job_key = key.clone();
        let submitted = self
            .lane
            .submit(move |world: &mut W| {
                run_placement(world, &job_key, &settings);
            })
            .await;

        if submitted.is_err() {
            tracing::error!(region = %key, "Mutation lane closed after claim, vein lost");
            return ClaimOutcome::LaneClosed;
        }
        self.dispatched.fetch_add(1, Ordering::AcqRel);
        tracing::debug!(region = %key, "Region claimed, placement queued");
        ClaimOutcome::Claimed
    }
}

/// Placement job body. Runs on the mutation lane only.
fn run_placement<W: BlockAccess + ?Sized>(world: &mut W, key: &RegionKey, settings: &PlacementSettings) {
    let mut rng = rand::rng();
    match place_vein(world, key, settings, &mut rng) {
        Ok(PlacementOutcome::Placed { tier, sites }) => {
            tracing::info!(region = %key, ?tier, size = sites.len(), "Vein placed");
        }
        Ok(PlacementOutcome::RegionUnloaded) => {
            tracing::debug!(region = %key, "Region unloaded before placement, claim kept");
        }
        Ok(PlacementOutcome::NoSite) => {
            tracing::debug!(region = %key, "No vein site found");
        }
        Err(e) => {
            tracing::warn!(region = %key, error = %e, "Vein placement rejected by world");
        }
    }
}
