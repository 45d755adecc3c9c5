//! Histogramming worker
//!
//! One worker per job, running as its own tokio task. The worker owns its
//! event source, sink, and aggregators outright; nothing else touches them.
//! It drives the interval state machine, drains a single-slot control
//! channel, and emits statistics on a bounded broadcast channel (oldest
//! record dropped on overflow).

use crate::bus::{create_consumer, create_producer, Backoff};
use crate::config::JobConfig;
use crate::error::{ConfigurationError, JobError};
use crate::histogrammer::Histogrammer;
use crate::histograms::{EventHooks, Histogram};
use crate::sinks::HistogramSink;
use crate::sources::{EventSource, OffsetMode};
use crate::stats::{StatisticsRecord, WorkerState};
use std::time::Duration;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::{broadcast, mpsc};
use tokio::task::{JoinError, JoinHandle};
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

/// Upper bound on one bus poll.
pub const POLL_TIMEOUT: Duration = Duration::from_millis(500);

/// Wall-time publish cadence when no events arrive.
pub const PUBLISH_INTERVAL: Duration = Duration::from_secs(1);

/// Capacity of the outbound statistics channel.
pub const STATS_CAPACITY: usize = 8;

/// How long a control send may wait on the single-slot channel.
const CONTROL_SEND_TIMEOUT: Duration = Duration::from_secs(5);

/// Commands accepted on the worker control channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerCommand {
    /// Stop the job; the worker exits after one final statistics record.
    Quit,
    /// Zero all aggregators, keeping edges and shape.
    Clear,
}

/// Coordinator-side handle to a spawned worker.
#[derive(Debug)]
pub struct WorkerHandle {
    id: String,
    control_tx: mpsc::Sender<WorkerCommand>,
    join: JoinHandle<()>,
}

impl WorkerHandle {
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Send a command, waiting up to five seconds for the slot to free.
    pub async fn send(&self, cmd: WorkerCommand) -> bool {
        matches!(
            tokio::time::timeout(CONTROL_SEND_TIMEOUT, self.control_tx.send(cmd)).await,
            Ok(Ok(()))
        )
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Wait for the worker task to exit.
    pub async fn outcome(self) -> Result<(), JoinError> {
        self.join.await
    }
}

/// A running histogramming job.
pub struct Worker {
    job_id: String,
    run_id: String,
    source: EventSource,
    histogrammer: Histogrammer,
    offset_mode: OffsetMode,
    start_ns: i64,
    stop_ns: Option<i64>,
    state: WorkerState,
    control_rx: mpsc::Receiver<WorkerCommand>,
    stats_tx: broadcast::Sender<StatisticsRecord>,
    stats_overflow: u64,
}

impl Worker {
    /// Validate `cfg`, construct the job, and spawn its task.
    ///
    /// Fails without spawning anything when the configuration is invalid or
    /// the bus is unreachable; such failures affect this job only.
    pub fn spawn(
        cfg: &JobConfig,
        default_brokers: &[String],
        hooks: &EventHooks,
    ) -> Result<(WorkerHandle, broadcast::Receiver<StatisticsRecord>), JobError> {
        let mut missing = Vec::new();
        if cfg.data_topics.is_empty() {
            missing.push("data_topics".to_string());
        }
        if cfg.histograms.is_empty() {
            missing.push("histograms".to_string());
        }
        if !missing.is_empty() {
            return Err(ConfigurationError {
                kind: "job".to_string(),
                missing,
                invalid: Vec::new(),
            }
            .into());
        }

        let mut histograms = Vec::with_capacity(cfg.histograms.len());
        for hist_cfg in &cfg.histograms {
            histograms.push(Histogram::from_config(hist_cfg, hooks)?);
        }

        let brokers = if cfg.data_brokers.is_empty() {
            default_brokers
        } else {
            &cfg.data_brokers[..]
        };
        let consumer = create_consumer(brokers, &cfg.data_topics)?;
        let producer = create_producer(brokers)?;

        let (control_tx, control_rx) = mpsc::channel(1);
        let (stats_tx, stats_rx) = broadcast::channel(STATS_CAPACITY);

        let worker = Worker {
            job_id: cfg.id.clone(),
            run_id: uuid::Uuid::new_v4().to_string(),
            source: EventSource::new(consumer),
            histogrammer: Histogrammer::new(
                histograms,
                HistogramSink::new(producer),
                cfg.info.clone(),
            ),
            offset_mode: match cfg.start {
                Some(start) => OffsetMode::FromTimestamp(start),
                None => OffsetMode::Latest,
            },
            start_ns: cfg.start.unwrap_or(i64::MIN),
            stop_ns: cfg.stop,
            state: WorkerState::NotStarted,
            control_rx,
            stats_tx,
            stats_overflow: 0,
        };

        let id = cfg.id.clone();
        let join = tokio::spawn(worker.run());
        Ok((
            WorkerHandle {
                id,
                control_tx,
                join,
            },
            stats_rx,
        ))
    }

    #[tracing::instrument(skip(self), fields(job_id = %self.job_id, run_id = %self.run_id))]
    async fn run(mut self) {
        if let Err(e) = self.source.position(self.offset_mode).await {
            warn!("failed to position consumer: {e}");
            self.state = WorkerState::Error;
            self.emit_stats(Some(format!("failed to position consumer: {e}")));
            return;
        }

        info!(start_ns = self.start_ns, stop_ns = ?self.stop_ns, "worker started");
        let mut backoff = Backoff::new();
        let mut last_publish = Instant::now();

        loop {
            // Drain the control channel before blocking on the bus.
            match self.control_rx.try_recv() {
                Ok(WorkerCommand::Quit) => {
                    info!("quit requested");
                    self.state = WorkerState::Stopped;
                }
                Ok(WorkerCommand::Clear) => {
                    info!("clearing histogram data");
                    self.histogrammer.clear();
                }
                Err(TryRecvError::Empty) => {}
                Err(TryRecvError::Disconnected) => {
                    debug!("control channel closed, stopping");
                    self.state = WorkerState::Stopped;
                }
            }

            if self.state.is_terminal() {
                break;
            }

            let records = match self.source.poll(POLL_TIMEOUT).await {
                Ok(records) => {
                    backoff.reset();
                    records
                }
                Err(e) => {
                    // Offsets have not advanced; retry the same position.
                    warn!("bus poll failed, backing off: {e}");
                    sleep(backoff.next_delay()).await;
                    continue;
                }
            };

            let accepted = self.apply_records(records);

            if self.state.is_terminal() {
                break;
            }

            if accepted > 0 || last_publish.elapsed() >= PUBLISH_INTERVAL {
                self.histogrammer.publish().await;
                self.emit_stats(None);
                last_publish = Instant::now();
            }
        }

        // A completed interval gets one final snapshot; a stopped worker
        // only reports its terminal statistics.
        if self.state == WorkerState::Finished {
            self.histogrammer.publish().await;
        }
        self.emit_stats(None);
        info!(state = ?self.state, overflow = self.stats_overflow, "worker exited");
    }

    /// Run the interval state machine over one polled batch, returning the
    /// number of accepted events.
    fn apply_records(&mut self, records: Vec<crate::codec::EventMessage>) -> u64 {
        let mut accepted = 0;
        for record in &records {
            match self.state {
                WorkerState::NotStarted if record.pulse_time < self.start_ns => continue,
                WorkerState::NotStarted => {
                    info!(pulse_time = record.pulse_time, "interval started, counting");
                    self.state = WorkerState::Counting;
                }
                WorkerState::Counting => {}
                _ => break,
            }

            if let Some(stop) = self.stop_ns {
                if record.pulse_time >= stop {
                    info!(pulse_time = record.pulse_time, "interval complete");
                    self.state = WorkerState::Finished;
                    break;
                }
            }
            if record.pulse_time >= self.start_ns {
                accepted += self
                    .histogrammer
                    .add_data(std::slice::from_ref(record))
                    .accepted;
            }
        }
        accepted
    }

    fn emit_stats(&mut self, reason: Option<String>) {
        // The broadcast ring drops the oldest record when full; account for
        // the overflow before the send evicts it.
        if self.stats_tx.len() >= STATS_CAPACITY {
            self.stats_overflow += 1;
            debug!(overflow = self.stats_overflow, "stats channel full, oldest dropped");
        }
        let record = StatisticsRecord {
            job_id: self.job_id.clone(),
            last_pulse_time: self.histogrammer.last_pulse_time(),
            total_events: self.histogrammer.total_events(),
            dropped_out_of_range: self.histogrammer.total_dropped() + self.source.decode_errors(),
            state: self.state,
            ts: chrono::Utc::now().timestamp_millis(),
            reason,
        };
        let _ = self.stats_tx.send(record);
    }
}
