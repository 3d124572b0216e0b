//! Refresh Scheduler — decides when the screening pipeline runs and which
//! completion is allowed to change what the recruiter sees.
//!
//! Every trigger takes the next dispatch sequence. One driver task runs
//! refresh cycles back to back; triggers arriving while a cycle is in flight
//! collapse into a single pending refresh carrying the newest sequence. A
//! completion is applied only if its sequence is still the newest one
//! dispatched, so an older response can never overwrite a newer trigger's
//! state.
//!
//! Readers get immutable `Arc<ScreenView>` values from a watch channel. Only
//! the driver replaces the ranked list, the tier counts and the cache.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::try_join_all;
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::backend::{FetchError, ScoringBackend, UploadFile};
use crate::models::candidate::CandidateRecord;
use crate::models::score::ScoreEvent;
use crate::screening::aggregator::{fold, Aggregation};
use crate::screening::cache::{CacheError, ResultCache, ResultSnapshot, ViewMode};
use crate::screening::classifier::{classify, Tier, TierThresholds};
use crate::screening::identity::{resolve, CandidateIdentity};
use crate::screening::ranker::{rank, RankedCandidate, TierCounts};

pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(30);

/// Why a refresh was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RefreshTrigger {
    Activation,
    UserRequest,
    Interval,
    ScoreSubmitted,
    CandidateDeleted,
    ScoreDeleted,
    CollectionCleared,
    /// A mutation call failed; re-read the backend to find out where it stands.
    Resync,
}

/// What happened to a trigger at dispatch time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Dispatch {
    Started { sequence: u64 },
    Coalesced { sequence: u64 },
    Inactive,
}

impl Dispatch {
    pub fn sequence(&self) -> Option<u64> {
        match self {
            Dispatch::Started { sequence } | Dispatch::Coalesced { sequence } => Some(*sequence),
            Dispatch::Inactive => None,
        }
    }
}

/// Point-in-time state for the presentation layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScreenView {
    /// Sequence of the last applied cycle; 0 before any cycle finished.
    pub sequence: u64,
    pub captured_at: Option<DateTime<Utc>>,
    pub results: Vec<RankedCandidate>,
    pub counts: TierCounts,
    /// Set when the last applied cycle failed to fetch.
    pub error: Option<String>,
    pub refreshing: bool,
    pub view_mode: ViewMode,
    pub view_active: bool,
}

impl ScreenView {
    fn seeded(snapshot: Option<ResultSnapshot>, view_mode: ViewMode) -> Self {
        let (captured_at, results) = match snapshot {
            Some(s) => (Some(s.captured_at), s.results),
            None => (None, Vec::new()),
        };
        Self {
            sequence: 0,
            captured_at,
            counts: TierCounts::tally(&results),
            results,
            error: None,
            refreshing: false,
            view_mode,
            view_active: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SchedulerSettings {
    pub thresholds: TierThresholds,
    pub refresh_interval: Duration,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            thresholds: TierThresholds::default(),
            refresh_interval: DEFAULT_REFRESH_INTERVAL,
        }
    }
}

/// Result of a batch scoring call, with the tier the event earns on its own.
#[derive(Debug, Clone, Serialize)]
pub struct ScoredUpload {
    pub event: ScoreEvent,
    pub tier: Tier,
    pub dispatch: Dispatch,
}

#[derive(Debug, Clone, Copy)]
struct PendingRefresh {
    sequence: u64,
    reason: RefreshTrigger,
}

#[derive(Debug)]
struct DispatchState {
    latest: u64,
    in_flight: bool,
    pending: Option<PendingRefresh>,
    active: bool,
}

struct FetchedCollection {
    candidates: Vec<CandidateRecord>,
    events: Vec<ScoreEvent>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// The single owned screening context. Created by `activate`, torn down by
/// `deactivate`.
pub struct ScreeningContext {
    backend: Arc<dyn ScoringBackend>,
    cache: ResultCache,
    settings: SchedulerSettings,
    dispatch: Mutex<DispatchState>,
    /// Batch-scored events waiting to be folded into the next applied cycle.
    submitted: Mutex<Vec<ScoreEvent>>,
    view_tx: watch::Sender<Arc<ScreenView>>,
    view_active: AtomicBool,
    ticker: Mutex<Option<JoinHandle<()>>>,
}

impl ScreeningContext {
    /// Seeds the view from the cache, starts the interval ticker and
    /// dispatches the activation refresh.
    pub async fn activate(
        backend: Arc<dyn ScoringBackend>,
        cache: ResultCache,
        settings: SchedulerSettings,
    ) -> Arc<Self> {
        let restored = cache.load().await;
        let view_mode = cache.load_view_mode().await.unwrap_or_default();
        if let Some(snapshot) = &restored {
            info!(
                "Restored {} cached results captured at {}",
                snapshot.results.len(),
                snapshot.captured_at
            );
        }

        let (view_tx, _) = watch::channel(Arc::new(ScreenView::seeded(restored, view_mode)));
        let ctx = Arc::new(Self {
            backend,
            cache,
            settings,
            dispatch: Mutex::new(DispatchState {
                latest: 0,
                in_flight: false,
                pending: None,
                active: true,
            }),
            submitted: Mutex::new(Vec::new()),
            view_tx,
            view_active: AtomicBool::new(true),
            ticker: Mutex::new(None),
        });

        ctx.start_ticker();
        ctx.trigger(RefreshTrigger::Activation);
        ctx
    }

    /// Stops the ticker and refuses further triggers. A cycle still in flight
    /// finishes its fetch but its result is dropped.
    pub fn deactivate(&self) {
        lock(&self.dispatch).active = false;
        if let Some(handle) = lock(&self.ticker).take() {
            handle.abort();
        }
        info!("Screening context deactivated");
    }

    pub fn current(&self) -> Arc<ScreenView> {
        Arc::clone(&self.view_tx.borrow())
    }

    fn start_ticker(self: &Arc<Self>) {
        let weak = Arc::downgrade(self);
        let period = self.settings.refresh_interval;
        let handle = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let Some(ctx) = weak.upgrade() else { break };
                if ctx.view_active.load(Ordering::Acquire) {
                    ctx.trigger(RefreshTrigger::Interval);
                }
            }
        });
        *lock(&self.ticker) = Some(handle);
    }

    /// Assigns the next sequence and either starts a driver or leaves the
    /// request pending behind the cycle in flight.
    pub fn trigger(self: &Arc<Self>, reason: RefreshTrigger) -> Dispatch {
        let mut state = lock(&self.dispatch);
        if !state.active {
            return Dispatch::Inactive;
        }
        // Ticks never supersede an in-flight cycle.
        if reason == RefreshTrigger::Interval && state.in_flight {
            debug!("Interval tick skipped; refresh #{} in flight", state.latest);
            return Dispatch::Coalesced {
                sequence: state.latest,
            };
        }
        state.latest += 1;
        let sequence = state.latest;

        if state.in_flight {
            if let Some(replaced) = state.pending.replace(PendingRefresh { sequence, reason }) {
                debug!(
                    "Refresh #{} ({:?}) superseded by #{sequence}",
                    replaced.sequence, replaced.reason
                );
            }
            debug!("Refresh #{sequence} ({reason:?}) coalesced behind in-flight cycle");
            return Dispatch::Coalesced { sequence };
        }

        state.in_flight = true;
        self.set_refreshing(true);
        drop(state);

        tokio::spawn(Arc::clone(self).drive(sequence, reason));
        Dispatch::Started { sequence }
    }

    pub fn refresh(self: &Arc<Self>) -> Dispatch {
        self.trigger(RefreshTrigger::UserRequest)
    }

    async fn drive(self: Arc<Self>, mut sequence: u64, mut reason: RefreshTrigger) {
        loop {
            info!("Refresh #{sequence} dispatched ({reason:?})");
            let outcome = self.fetch().await;
            self.complete(sequence, outcome).await;

            let mut state = lock(&self.dispatch);
            match state.pending.take() {
                Some(next) if state.active => {
                    sequence = next.sequence;
                    reason = next.reason;
                }
                _ => {
                    state.in_flight = false;
                    self.set_refreshing(false);
                    break;
                }
            }
        }
    }

    async fn fetch(&self) -> Result<FetchedCollection, FetchError> {
        let candidates = self.backend.fetch_candidates().await?;
        if candidates.is_empty() {
            return Ok(FetchedCollection {
                candidates,
                events: Vec::new(),
            });
        }

        let histories = try_join_all(
            candidates
                .iter()
                .map(|c| self.backend.fetch_score_history(&c.id)),
        )
        .await?;

        let events = candidates
            .iter()
            .zip(histories)
            .flat_map(|(candidate, history)| {
                let identity = candidate.identity_ref();
                history
                    .into_iter()
                    .map(move |event| event.with_candidate_defaults(&identity))
            })
            .collect();

        Ok(FetchedCollection { candidates, events })
    }

    fn is_current(&self, sequence: u64) -> bool {
        let state = lock(&self.dispatch);
        state.active && state.latest == sequence
    }

    async fn complete(&self, sequence: u64, outcome: Result<FetchedCollection, FetchError>) {
        if !self.is_current(sequence) {
            debug!("Discarding stale completion of refresh #{sequence}");
            return;
        }

        match outcome {
            Err(e) => {
                error!("Refresh #{sequence} failed: {e}");
                self.clear_cache().await;
                let message = format!("Could not refresh results: {e}");
                self.publish(|view| {
                    view.sequence = sequence;
                    view.error = Some(message);
                });
            }
            Ok(fetched) if fetched.candidates.is_empty() => {
                lock(&self.submitted).clear();
                self.clear_cache().await;
                info!("Refresh #{sequence}: candidate collection is empty");
                self.publish(|view| {
                    view.sequence = sequence;
                    view.captured_at = Some(Utc::now());
                    view.results = Vec::new();
                    view.counts = TierCounts::default();
                    view.error = None;
                });
            }
            Ok(fetched) => {
                let submitted = std::mem::take(&mut *lock(&self.submitted));
                let aggregation = aggregate(fetched, submitted);
                let results = rank(aggregation, &self.settings.thresholds);
                let snapshot = ResultSnapshot {
                    captured_at: Utc::now(),
                    results,
                };

                if let Err(e) = self.cache.save(&snapshot).await {
                    warn!("Refresh #{sequence}: result cache not updated: {e}");
                    self.clear_cache().await;
                }

                let counts = TierCounts::tally(&snapshot.results);
                info!(
                    "Refresh #{sequence} applied: {} candidates ({} shortlisted, {} waitlisted, {} rejected, {} not evaluated)",
                    counts.total(),
                    counts.shortlisted,
                    counts.waitlisted,
                    counts.rejected,
                    counts.not_evaluated
                );
                self.publish(|view| {
                    view.sequence = sequence;
                    view.captured_at = Some(snapshot.captured_at);
                    view.results = snapshot.results;
                    view.counts = counts;
                    view.error = None;
                });
            }
        }
    }

    async fn clear_cache(&self) {
        if let Err(e) = self.cache.clear().await {
            warn!("Result cache could not be cleared: {e}");
        }
    }

    fn publish(&self, update: impl FnOnce(&mut ScreenView)) {
        self.view_tx.send_modify(|current| {
            let mut next = ScreenView::clone(current);
            update(&mut next);
            *current = Arc::new(next);
        });
    }

    fn set_refreshing(&self, refreshing: bool) {
        self.view_tx.send_if_modified(|current| {
            if current.refreshing == refreshing {
                return false;
            }
            let mut next = ScreenView::clone(current);
            next.refreshing = refreshing;
            *current = Arc::new(next);
            true
        });
    }

    // ────────────────────────────────────────────────────────────────────
    // Mutations. Each one calls the backend and then issues a trigger; a
    // failed call is returned to the caller and followed by a resync.
    // ────────────────────────────────────────────────────────────────────

    pub async fn score_upload(
        self: &Arc<Self>,
        resume: UploadFile,
        job_description: UploadFile,
    ) -> Result<ScoredUpload, FetchError> {
        let event = match self.backend.score_batch(resume, job_description).await {
            Ok(event) => event,
            Err(e) => {
                self.trigger(RefreshTrigger::Resync);
                return Err(e);
            }
        };

        let preview = fold(std::iter::once(event.clone()));
        let tier = preview
            .iter()
            .next()
            .map(|record| classify(record, &self.settings.thresholds))
            .unwrap_or(Tier::NotEvaluated);

        lock(&self.submitted).push(event.clone());
        let dispatch = self.trigger(RefreshTrigger::ScoreSubmitted);
        Ok(ScoredUpload {
            event,
            tier,
            dispatch,
        })
    }

    pub async fn delete_candidate(self: &Arc<Self>, candidate_id: &str) -> Result<Dispatch, FetchError> {
        if let Err(e) = self.backend.delete_candidate(candidate_id).await {
            self.trigger(RefreshTrigger::Resync);
            return Err(e);
        }
        lock(&self.submitted).retain(|event| {
            !event
                .internal_id
                .as_deref()
                .is_some_and(|id| id.trim().eq_ignore_ascii_case(candidate_id.trim()))
        });
        Ok(self.trigger(RefreshTrigger::CandidateDeleted))
    }

    pub async fn delete_score(self: &Arc<Self>, score_id: &str) -> Result<Dispatch, FetchError> {
        if let Err(e) = self.backend.delete_score(score_id).await {
            self.trigger(RefreshTrigger::Resync);
            return Err(e);
        }
        lock(&self.submitted).retain(|event| event.score_id.as_deref() != Some(score_id));
        Ok(self.trigger(RefreshTrigger::ScoreDeleted))
    }

    pub async fn clear_all(self: &Arc<Self>) -> Result<Dispatch, FetchError> {
        if let Err(e) = self.backend.clear_all().await {
            self.trigger(RefreshTrigger::Resync);
            return Err(e);
        }
        lock(&self.submitted).clear();
        Ok(self.trigger(RefreshTrigger::CollectionCleared))
    }

    /// Presentation preferences. These never touch the ranked list.
    pub async fn set_view(
        &self,
        active: Option<bool>,
        mode: Option<ViewMode>,
    ) -> Result<Arc<ScreenView>, CacheError> {
        if let Some(mode) = mode {
            self.cache.save_view_mode(mode).await?;
        }
        if let Some(active) = active {
            self.view_active.store(active, Ordering::Release);
        }
        self.view_tx.send_if_modified(|current| {
            let next_mode = mode.unwrap_or(current.view_mode);
            let next_active = active.unwrap_or(current.view_active);
            if next_mode == current.view_mode && next_active == current.view_active {
                return false;
            }
            let mut next = ScreenView::clone(current);
            next.view_mode = next_mode;
            next.view_active = next_active;
            *current = Arc::new(next);
            true
        });
        Ok(self.current())
    }
}

/// History events first, in candidate order, then batch-scored events that
/// belong to a candidate in the collection and are not already in its
/// history under the same score id. Batch events are matched to
/// their candidate by id, then email, then filename, and inherit its
/// identifying fields so both sources resolve to the same identity.
fn aggregate(fetched: FetchedCollection, submitted: Vec<ScoreEvent>) -> Aggregation {
    let FetchedCollection { candidates, events } = fetched;
    let known: HashSet<CandidateIdentity> = candidates
        .iter()
        .map(|c| resolve(&c.identity_ref()))
        .collect();

    let persisted: HashSet<String> = events.iter().filter_map(|e| e.score_id.clone()).collect();

    let mut aggregation = fold(events);
    for event in submitted {
        if let Some(score_id) = event.score_id.as_deref().filter(|id| persisted.contains(*id)) {
            debug!("Batch result {score_id} already in score history");
            continue;
        }
        let Some(candidate) = match_candidate(&event, &candidates) else {
            debug!(
                "Dropping batch result for {} (not in candidate collection)",
                resolve(&event.candidate())
            );
            continue;
        };
        let event = event.with_candidate_defaults(&candidate.identity_ref());
        if known.contains(&resolve(&event.candidate())) {
            aggregation.push(event);
        }
    }

    if aggregation.is_empty() {
        debug!("No score events for {} candidates", candidates.len());
    } else {
        debug!("Aggregated {} identities", aggregation.len());
    }
    aggregation
}

fn match_candidate<'a>(
    event: &ScoreEvent,
    candidates: &'a [CandidateRecord],
) -> Option<&'a CandidateRecord> {
    fn same(a: Option<&str>, b: Option<&str>) -> bool {
        match (a.map(str::trim), b.map(str::trim)) {
            (Some(a), Some(b)) if !a.is_empty() => a.eq_ignore_ascii_case(b),
            _ => false,
        }
    }

    candidates
        .iter()
        .find(|c| same(event.internal_id.as_deref(), Some(c.id.as_str())))
        .or_else(|| {
            candidates
                .iter()
                .find(|c| same(event.email.as_deref(), c.email.as_deref()))
        })
        .or_else(|| {
            candidates
                .iter()
                .find(|c| same(event.filename.as_deref(), c.filename.as_deref()))
        })
}
