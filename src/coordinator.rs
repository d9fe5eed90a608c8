/*!
 * Transfer coordinator: the central owner of transfer state, the priority
 * queue, and the worker pool that drains it (spec §4.2).
 */

use crate::copy_engine::{self, CancellationToken, CopyOutcome, CopyRequest};
use crate::disk_space;
use crate::error::{DailiesError, ErrorKind, Result};
use crate::event_bus::{Event, EventBus, ListenerToken};
use crate::file_watcher::FileWatcher;
use crate::mapping::MappingResolver;
use crate::metadata::MetadataPort;
use crate::model::{
    Batch, BatchId, Priority, TransferId, TransferRecord, TransferStatus, VerificationPolicy, VolumeId,
};
use crate::queue::TransferQueue;
use crate::rate_limiter::BandwidthLimiter;
use crate::stats::CoordinatorStats;
use crate::system_info::SystemInfoPort;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

/// Tuning knobs the coordinator needs from `Settings`, captured at
/// construction rather than re-read per transfer so a running pool's
/// behavior doesn't shift mid-flight when settings are edited.
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    pub parallel_copies: u8,
    pub chunk_size: u64,
    pub buffer_size: u64,
    pub verify_mode: VerificationPolicy,
    pub bandwidth_limit_bytes_per_second: u64,
    /// Extension -> target directory, handed to every file watcher this
    /// coordinator spawns on `VolumeAttached` (spec §2 data flow).
    pub mappings: HashMap<String, PathBuf>,
    /// Poll cadence for watchers spawned on volume attach (spec §4.4).
    pub watcher_poll_interval: Duration,
    /// Ceiling on automatic re-queues for a retry-eligible error (spec §7).
    pub max_retries: u32,
    pub retry_delay_ms: u64,
    pub retry_backoff_cap_ms: u64,
}

impl CoordinatorConfig {
    /// Exponential backoff delay before the `attempt`-th retry (0-indexed),
    /// capped at `retry_backoff_cap_ms` — same doubling shape as
    /// `Settings::retry_delay_for`.
    fn retry_delay_for(&self, attempt: u32) -> Duration {
        let doubled = self.retry_delay_ms.saturating_mul(1u64 << attempt.min(32));
        Duration::from_millis(doubled.min(self.retry_backoff_cap_ms))
    }
}

/// What a worker should do when it observes a stop request for the
/// transfer it is currently copying.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StopRequest {
    Pause,
    Cancel,
}

struct SharedState {
    records: HashMap<TransferId, TransferRecord>,
    batches: HashMap<BatchId, Batch>,
    /// Fingerprint -> transfer id, for at-most-one-active-per-fingerprint (spec §4.2).
    active_fingerprints: HashMap<(String, u64), TransferId>,
    stop_requests: HashMap<TransferId, StopRequest>,
    cancel_tokens: HashMap<TransferId, CancellationToken>,
}

/// Owns the transfer queue, worker pool, and all transfer/batch state. One
/// coordinator per running ingest session.
pub struct TransferCoordinator {
    state: Arc<Mutex<SharedState>>,
    queue: Arc<TransferQueue>,
    event_bus: EventBus,
    config: CoordinatorConfig,
    limiter: BandwidthLimiter,
    metadata: Arc<dyn MetadataPort>,
    stats: CoordinatorStats,
    workers: Vec<JoinHandle<()>>,
    watchers: Arc<Mutex<HashMap<VolumeId, FileWatcher>>>,
    volume_listener_token: Option<ListenerToken>,
    watcher_listener_token: Option<ListenerToken>,
    file_found_listener_token: Option<ListenerToken>,
}

impl TransferCoordinator {
    pub fn new(
        config: CoordinatorConfig,
        event_bus: EventBus,
        metadata: Arc<dyn MetadataPort>,
        system_info: Arc<dyn SystemInfoPort>,
    ) -> Self {
        let state = Arc::new(Mutex::new(SharedState {
            records: HashMap::new(),
            batches: HashMap::new(),
            active_fingerprints: HashMap::new(),
            stop_requests: HashMap::new(),
            cancel_tokens: HashMap::new(),
        }));
        let queue = Arc::new(TransferQueue::new());
        let limiter = BandwidthLimiter::new(config.bandwidth_limit_bytes_per_second);
        let stats = CoordinatorStats::new();
        let watchers: Arc<Mutex<HashMap<VolumeId, FileWatcher>>> = Arc::new(Mutex::new(HashMap::new()));

        let worker_count = config.parallel_copies.max(1) as usize;
        let mut workers = Vec::with_capacity(worker_count);
        for _ in 0..worker_count {
            workers.push(spawn_worker(
                state.clone(),
                queue.clone(),
                event_bus.clone(),
                config.clone(),
                limiter.clone(),
                metadata.clone(),
                system_info.clone(),
                stats.clone(),
            ));
        }

        let volume_listener_token = {
            let state_for_listener = state.clone();
            let queue_for_listener = queue.clone();
            let bus_for_listener = event_bus.clone();
            let watchers_for_detach = watchers.clone();
            Some(event_bus.register(move |event: &Event| {
                if let Event::VolumeDetached { id } = event {
                    handle_volume_detached(&state_for_listener, &queue_for_listener, &bus_for_listener, id);
                    watchers_for_detach.lock().unwrap().remove(id);
                }
            }))
        };

        // Spawns a per-volume file watcher on attach and tears it down on
        // detach, so the ingest pipeline picks up newly arrived files
        // without a host binary wiring the three subsystems together
        // itself (spec §2 data flow).
        let watcher_listener_token = {
            let watchers_for_attach = watchers.clone();
            let bus_for_watcher = event_bus.clone();
            let mappings_for_watcher = config.mappings.clone();
            let poll_interval = config.watcher_poll_interval;
            Some(event_bus.register(move |event: &Event| {
                if let Event::VolumeAttached { id, .. } = event {
                    let root = PathBuf::from(id.as_str());
                    let watcher = FileWatcher::start(
                        id.clone(),
                        root,
                        mappings_for_watcher.clone(),
                        bus_for_watcher.clone(),
                        poll_interval,
                    );
                    watchers_for_attach.lock().unwrap().insert(id.clone(), watcher);
                }
            }))
        };

        let file_found_listener_token = {
            let state_for_found = state.clone();
            let queue_for_found = queue.clone();
            let resolver = Arc::new(MappingResolver::new(&config.mappings));
            Some(event_bus.register(move |event: &Event| {
                if let Event::FileFound { path, volume, priority } = event {
                    handle_file_found(&state_for_found, &queue_for_found, &resolver, path, volume, *priority);
                }
            }))
        };

        Self {
            state,
            queue,
            event_bus,
            config,
            limiter,
            metadata,
            stats,
            workers,
            watchers,
            volume_listener_token,
            watcher_listener_token,
            file_found_listener_token,
        }
    }

    /// Enqueue a single transfer. Returns `ErrorKind::DuplicateTransfer` if
    /// an active transfer already shares this fingerprint (spec §4.2 "at
    /// most one active transfer per fingerprint").
    pub fn enqueue(
        &self,
        source_path: PathBuf,
        target_path: PathBuf,
        total_bytes: u64,
        priority: Priority,
        source_volume: Option<VolumeId>,
    ) -> Result<TransferId> {
        enqueue_internal(&self.state, &self.queue, source_path, target_path, total_bytes, priority, source_volume)
    }

    /// Enqueue a group of transfers as one batch (spec §3 "Batch").
    pub fn enqueue_batch(
        &self,
        name: String,
        description: Option<String>,
        items: Vec<(PathBuf, PathBuf, u64, Option<VolumeId>)>,
        priority: Priority,
    ) -> Result<BatchId> {
        let batch = Batch::new(name, description);
        let batch_id = batch.id;

        let mut ids = Vec::with_capacity(items.len());
        for (source_path, target_path, total_bytes, source_volume) in items {
            let id = self.enqueue(source_path, target_path, total_bytes, priority, source_volume)?;
            ids.push(id);
            let mut state = self.state.lock().unwrap();
            if let Some(record) = state.records.get_mut(&id) {
                record.batch_id = Some(batch_id);
            }
        }

        let mut batch = batch;
        batch.members = ids.into_iter().collect();
        self.state.lock().unwrap().batches.insert(batch_id, batch);
        Ok(batch_id)
    }

    pub fn status(&self, id: TransferId) -> Result<TransferRecord> {
        self.state.lock().unwrap().records.get(&id).cloned().ok_or_else(DailiesError::unknown_id)
    }

    /// Pause a `Running` transfer by soft-cancelling its in-flight copy; the
    /// worker observes the stop request and transitions the record to
    /// `Paused` instead of `Cancelled`. Resuming restarts the copy from
    /// scratch, since the adaptive copy strategies carry no resumable
    /// offset (see DESIGN.md).
    pub fn pause(&self, id: TransferId) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let status = state.records.get(&id).ok_or_else(DailiesError::unknown_id)?.status;
        if !matches!(status, TransferStatus::Running) {
            return Err(DailiesError::invalid_state("pause requires a running transfer"));
        }
        state.stop_requests.insert(id, StopRequest::Pause);
        if let Some(token) = state.cancel_tokens.get(&id) {
            token.cancel();
        }
        Ok(())
    }

    /// Resume a `Paused` transfer. The copy restarts from the beginning
    /// rather than continuing mid-stream, so this re-enters the queue as a
    /// fresh `Queued` transfer rather than attempting a direct Paused ->
    /// Running edge (see DESIGN.md).
    pub fn resume(&self, id: TransferId) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let record = state.records.get_mut(&id).ok_or_else(DailiesError::unknown_id)?;
        if !matches!(record.status, TransferStatus::Paused) {
            return Err(DailiesError::invalid_state("resume requires a paused transfer"));
        }
        record.status = TransferStatus::Queued;
        let priority = record.priority;
        drop(state);
        self.queue.push(id, priority);
        Ok(())
    }

    /// Cancel a `Queued` or `Running` transfer.
    pub fn cancel(&self, id: TransferId) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let status = state.records.get(&id).ok_or_else(DailiesError::unknown_id)?.status;

        match status {
            TransferStatus::Queued => {
                self.queue.remove(id);
                if let Some(record) = state.records.get_mut(&id) {
                    record.transition(TransferStatus::Cancelled);
                }
                drop(state);
                self.stats.record_cancelled();
                self.event_bus.publish(Event::Cancelled { id });
                Ok(())
            }
            TransferStatus::Running => {
                state.stop_requests.insert(id, StopRequest::Cancel);
                if let Some(token) = state.cancel_tokens.get(&id) {
                    token.cancel();
                }
                Ok(())
            }
            TransferStatus::Paused => {
                if let Some(record) = state.records.get_mut(&id) {
                    record.transition(TransferStatus::Cancelled);
                }
                drop(state);
                self.stats.record_cancelled();
                self.event_bus.publish(Event::Cancelled { id });
                Ok(())
            }
            _ => Err(DailiesError::invalid_state("cannot cancel a terminal transfer")),
        }
    }

    /// Re-queue an `Error` transfer (spec §3 status graph `Error -> Queued`).
    pub fn retry(&self, id: TransferId) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let record = state.records.get_mut(&id).ok_or_else(DailiesError::unknown_id)?;
        if !record.transition(TransferStatus::Queued) {
            return Err(DailiesError::invalid_state("retry requires an errored transfer"));
        }
        let priority = record.priority;
        drop(state);
        self.queue.push(id, priority);
        Ok(())
    }

    pub fn stats(&self) -> crate::stats::StatsSnapshot {
        self.stats.snapshot()
    }

    pub fn batch_status(&self, id: BatchId) -> Result<Batch> {
        self.state.lock().unwrap().batches.get(&id).cloned().ok_or_else(DailiesError::unknown_id)
    }

    /// Stop accepting work, cancel everything in flight, and join all
    /// workers, bounded by `timeout` (spec §5 "shutdown... bounded").
    pub fn shutdown(self, timeout: Duration) {
        if let Some(token) = self.volume_listener_token {
            self.event_bus.unregister(token);
        }
        if let Some(token) = self.watcher_listener_token {
            self.event_bus.unregister(token);
        }
        if let Some(token) = self.file_found_listener_token {
            self.event_bus.unregister(token);
        }

        let watchers: Vec<FileWatcher> = self.watchers.lock().unwrap().drain().map(|(_, w)| w).collect();
        for watcher in watchers {
            watcher.stop();
        }

        {
            let state = self.state.lock().unwrap();
            for token in state.cancel_tokens.values() {
                token.cancel();
            }
        }
        self.queue.close();

        let deadline = std::time::Instant::now() + timeout;
        for worker in self.workers {
            let remaining = deadline.saturating_duration_since(std::time::Instant::now());
            if remaining.is_zero() {
                break;
            }
            let _ = worker.join();
        }
    }
}

/// Shared by `TransferCoordinator::enqueue` and the `FileFound` listener so
/// watcher-discovered files and explicitly enqueued transfers go through the
/// same dedup and queue-push path.
#[allow(clippy::too_many_arguments)]
fn enqueue_internal(
    state: &Arc<Mutex<SharedState>>,
    queue: &Arc<TransferQueue>,
    source_path: PathBuf,
    target_path: PathBuf,
    total_bytes: u64,
    priority: Priority,
    source_volume: Option<VolumeId>,
) -> Result<TransferId> {
    let fingerprint = TransferRecord::fingerprint(&source_path, total_bytes);
    let mut state = state.lock().unwrap();
    if state.active_fingerprints.contains_key(&fingerprint) {
        return Err(DailiesError::duplicate_transfer("duplicate transfer already active for this fingerprint"));
    }

    let mut record = TransferRecord::new(source_path, target_path, total_bytes, priority);
    record.source_volume = source_volume;
    let id = record.id;
    state.active_fingerprints.insert(fingerprint, id);
    state.records.insert(id, record);
    drop(state);

    queue.push(id, priority);
    Ok(id)
}

/// Resolves a watcher-discovered file against the mapping table and enqueues
/// it, mirroring the target-directory + basename convention a host would use
/// when enqueuing by hand (spec §2 data flow, §4.4).
fn handle_file_found(
    state: &Arc<Mutex<SharedState>>,
    queue: &Arc<TransferQueue>,
    resolver: &MappingResolver,
    path: &Path,
    volume: &VolumeId,
    priority: Priority,
) {
    let Some(target_dir) = resolver.resolve(path) else { return };
    let Some(file_name) = path.file_name() else { return };
    let target_path = target_dir.join(file_name);
    let total_bytes = match std::fs::metadata(path) {
        Ok(metadata) => metadata.len(),
        Err(_) => return,
    };
    let _ = enqueue_internal(state, queue, path.to_path_buf(), target_path, total_bytes, priority, Some(volume.clone()));
}

fn handle_volume_detached(
    state: &Arc<Mutex<SharedState>>,
    queue: &Arc<TransferQueue>,
    event_bus: &EventBus,
    volume_id: &VolumeId,
) {
    let affected: Vec<TransferId> = {
        let state = state.lock().unwrap();
        state
            .records
            .iter()
            .filter(|(_, record)| {
                record.source_volume.as_ref() == Some(volume_id) && !record.status.is_terminal()
            })
            .map(|(id, _)| *id)
            .collect()
    };

    for id in affected {
        let mut state = state.lock().unwrap();
        let Some(record) = state.records.get_mut(&id) else { continue };
        let was_running = matches!(record.status, TransferStatus::Running);
        let next = if was_running { TransferStatus::Error } else { TransferStatus::Cancelled };
        if record.status.can_transition_to(next) {
            record.transition(next);
            record.error_message = Some("source_volume_detached".to_string());
        }
        if !was_running {
            queue.remove(id);
        }
        if let Some(token) = state.cancel_tokens.get(&id) {
            token.cancel();
        }
        drop(state);
        event_bus.publish(Event::Error { id, message: "source_volume_detached".to_string() });
    }
}

#[allow(clippy::too_many_arguments)]
fn spawn_worker(
    state: Arc<Mutex<SharedState>>,
    queue: Arc<TransferQueue>,
    event_bus: EventBus,
    config: CoordinatorConfig,
    limiter: BandwidthLimiter,
    metadata: Arc<dyn MetadataPort>,
    system_info: Arc<dyn SystemInfoPort>,
    stats: CoordinatorStats,
) -> JoinHandle<()> {
    std::thread::spawn(move || loop {
        let Some(id) = queue.pop_timeout(Duration::from_millis(200)) else {
            if queue.is_closed() {
                return;
            }
            continue;
        };

        let (source, target, total_bytes, fingerprint) = {
            let mut s = state.lock().unwrap();
            let Some(record) = s.records.get_mut(&id) else { continue };
            if !record.transition(TransferStatus::Running) {
                continue;
            }
            let fingerprint = TransferRecord::fingerprint(&record.source_path, record.total_bytes);
            let result = (record.source_path.clone(), record.target_path.clone(), record.total_bytes, fingerprint);
            let token = CancellationToken::new();
            s.cancel_tokens.insert(id, token);
            result
        };

        event_bus.publish(Event::Started {
            id,
            filename: source.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default(),
        });

        let cancel_token = state.lock().unwrap().cancel_tokens.get(&id).cloned().unwrap();

        let outcome = match disk_space::ensure_sufficient_space(system_info.as_ref(), &target, total_bytes) {
            Ok(()) => {
                let request = CopyRequest {
                    transfer_id: id,
                    source: &source,
                    target: &target,
                    total_bytes,
                    chunk_size: config.chunk_size,
                    buffer_size: config.buffer_size,
                    verify_mode: config.verify_mode,
                    limiter: &limiter,
                    cancel: &cancel_token,
                    metadata: metadata.as_ref(),
                    before_verify: None,
                };

                copy_engine::run_copy(request, |sample| {
                    event_bus.publish(Event::Progress {
                        id,
                        fraction: sample.fraction(),
                        speed_bps: sample.smoothed_bps,
                        eta_seconds: sample.eta_seconds,
                        total_bytes: sample.total_bytes,
                        transferred_bytes: sample.transferred_bytes,
                    });
                })
            }
            Err(err) => Err(err),
        };

        let mut s = state.lock().unwrap();
        s.cancel_tokens.remove(&id);
        let stop_request = s.stop_requests.remove(&id);
        s.active_fingerprints.remove(&fingerprint);

        let Some(record) = s.records.get_mut(&id) else { continue };
        match outcome {
            Ok(CopyOutcome::Completed { transferred_bytes }) => {
                record.transferred_bytes = transferred_bytes;
                record.transition(TransferStatus::Completed);
                drop(s);
                stats.record_completed(transferred_bytes);
                event_bus.publish(Event::Completed { id });
            }
            Ok(CopyOutcome::Skipped { reason }) => {
                record.transition(TransferStatus::Skipped);
                drop(s);
                stats.record_skipped();
                event_bus.publish(Event::Skipped { id, reason });
            }
            Err(err) if err.kind == ErrorKind::Cancelled => {
                match stop_request {
                    Some(StopRequest::Pause) => {
                        record.transition(TransferStatus::Paused);
                        drop(s);
                        event_bus.publish(Event::Paused { id });
                    }
                    _ => {
                        record.transition(TransferStatus::Cancelled);
                        drop(s);
                        stats.record_cancelled();
                        event_bus.publish(Event::Cancelled { id });
                    }
                }
            }
            Err(err) => {
                record.error_message = Some(err.message().to_string());
                record.transition(TransferStatus::Error);

                let retry = if err.is_retry_eligible() && record.attempt < config.max_retries {
                    record.attempt += 1;
                    Some((record.attempt, fingerprint.clone()))
                } else {
                    None
                };
                drop(s);

                stats.record_error();
                event_bus.publish(Event::Error { id, message: err.message().to_string() });

                if let Some((attempt, fingerprint)) = retry {
                    let state_for_retry = state.clone();
                    let queue_for_retry = queue.clone();
                    let delay = config.retry_delay_for(attempt - 1);
                    std::thread::spawn(move || {
                        std::thread::sleep(delay);
                        let priority = {
                            let mut s = state_for_retry.lock().unwrap();
                            let Some(record) = s.records.get_mut(&id) else { return };
                            if !record.transition(TransferStatus::Queued) {
                                return;
                            }
                            s.active_fingerprints.insert(fingerprint, id);
                            record.priority
                        };
                        queue_for_retry.push(id, priority);
                    });
                }
            }
        }

        recompute_batch_status(&state, &event_bus, id);
    });
}

fn recompute_batch_status(state: &Arc<Mutex<SharedState>>, event_bus: &EventBus, id: TransferId) {
    let mut s = state.lock().unwrap();
    let Some(batch_id) = s.records.get(&id).and_then(|r| r.batch_id) else { return };
    let member_statuses: Vec<TransferStatus> = {
        let Some(batch) = s.batches.get(&batch_id) else { return };
        batch.members.iter().filter_map(|member_id| s.records.get(member_id).map(|r| r.status)).collect()
    };
    let Some(batch) = s.batches.get_mut(&batch_id) else { return };
    batch.recompute_status(member_statuses.iter());
    let status = batch.status;
    let completed = member_statuses_completed(&s, batch_id);
    let total = s.batches.get(&batch_id).map(|b| b.members.len()).unwrap_or(0);
    drop(s);

    use crate::model::BatchStatus;
    match status {
        BatchStatus::Completed => event_bus.publish(Event::BatchCompleted { batch_id }),
        BatchStatus::Error => event_bus.publish(Event::BatchError { batch_id }),
        BatchStatus::Running => event_bus.publish(Event::BatchProgress { batch_id, completed, total }),
    }
}

fn member_statuses_completed(s: &SharedState, batch_id: BatchId) -> usize {
    let Some(batch) = s.batches.get(&batch_id) else { return 0 };
    batch
        .members
        .iter()
        .filter_map(|id| s.records.get(id))
        .filter(|r| r.status.is_terminal())
        .count()
}
