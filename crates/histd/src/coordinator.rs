//! Job coordinator
//!
//! Single supervision loop: consumes control envelopes from the config
//! topic, spawns/stops/replaces workers, fans worker statistics out to the
//! status topic, and restarts panicked workers with fresh aggregators.
//! An unreachable bus is fatal here at startup and only here; once running,
//! every failure is contained to the affected job.

use crate::bus::{create_consumer, create_producer, Backoff, MessageProducer};
use crate::config::{ControlMessage, JobConfig};
use crate::histograms::EventHooks;
use crate::stats::StatisticsRecord;
use crate::worker::{Worker, WorkerCommand, WorkerHandle};
use anyhow::{Context, Result};
use std::collections::{HashMap, VecDeque};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

const SUPERVISE_INTERVAL: Duration = Duration::from_millis(500);
const CONFIG_POLL_TIMEOUT: Duration = Duration::from_millis(500);

/// Total grace for all workers to exit on a program-wide quit.
const QUIT_GRACE: Duration = Duration::from_secs(10);

/// Grace for the old worker when a duplicate id replaces it.
const REPLACE_GRACE: Duration = Duration::from_secs(5);

/// A panicking job is restarted at most this many times per window before
/// it is marked permanently failed.
const RESTART_LIMIT: usize = 3;
const RESTART_WINDOW: Duration = Duration::from_secs(60);

struct JobEntry {
    config: JobConfig,
    handle: WorkerHandle,
    forwarder: JoinHandle<()>,
    restarts: VecDeque<Instant>,
}

/// Supervises one worker per histogramming job.
pub struct Coordinator {
    brokers: Vec<String>,
    config_topic: String,
    status_topic: String,
    hooks: EventHooks,
}

impl Coordinator {
    pub fn new(brokers: Vec<String>, config_topic: String, status_topic: String) -> Self {
        Self {
            brokers,
            config_topic,
            status_topic,
            hooks: EventHooks::default(),
        }
    }

    /// Install preprocessor/ROI hooks handed to every spawned job.
    pub fn with_hooks(mut self, hooks: EventHooks) -> Self {
        self.hooks = hooks;
        self
    }

    /// Run until a quit envelope arrives.
    ///
    /// Fails fast when the bus is unreachable at startup; after that the
    /// loop survives job failures, bad envelopes, and transient bus errors.
    pub async fn run(&mut self) -> Result<()> {
        let mut consumer = create_consumer(&self.brokers, &[self.config_topic.clone()])
            .context("opening config topic consumer")?;
        consumer
            .assign_latest()
            .await
            .context("positioning config topic consumer")?;
        let producer = create_producer(&self.brokers).context("opening status producer")?;

        let (stats_tx, mut stats_rx) = mpsc::channel::<StatisticsRecord>(64);
        let mut jobs: HashMap<String, JobEntry> = HashMap::new();
        let mut supervise = tokio::time::interval(SUPERVISE_INTERVAL);
        let mut backoff = Backoff::new();

        info!(
            config_topic = %self.config_topic,
            status_topic = %self.status_topic,
            "coordinator started"
        );

        loop {
            tokio::select! {
                result = consumer.poll(CONFIG_POLL_TIMEOUT) => match result {
                    Ok(batch) => {
                        backoff.reset();
                        for msg in batch {
                            let quit = self
                                .handle_control(&msg.payload, &mut jobs, &stats_tx, producer.as_ref())
                                .await;
                            if quit {
                                self.shutdown(jobs).await;
                                info!("coordinator exiting");
                                return Ok(());
                            }
                        }
                    }
                    Err(e) => {
                        warn!("config topic poll failed, backing off: {e}");
                        sleep(backoff.next_delay()).await;
                    }
                },
                Some(record) = stats_rx.recv() => {
                    publish_status(producer.as_ref(), &self.status_topic, &record).await;
                }
                _ = supervise.tick() => {
                    self.supervise(&mut jobs, &stats_tx, producer.as_ref()).await;
                }
            }
        }
    }

    /// Parse and apply one control envelope. Returns true on quit.
    async fn handle_control(
        &self,
        payload: &[u8],
        jobs: &mut HashMap<String, JobEntry>,
        stats_tx: &mpsc::Sender<StatisticsRecord>,
        producer: &dyn MessageProducer,
    ) -> bool {
        let msg: ControlMessage = match serde_json::from_slice(payload) {
            Ok(msg) => msg,
            Err(e) => {
                warn!("ignoring unparseable control message: {e}");
                return false;
            }
        };

        match msg {
            ControlMessage::Add(cfg) => {
                if let Some(entry) = jobs.remove(&cfg.id) {
                    info!(job_id = %cfg.id, "replacing running job");
                    stop_entry(entry, REPLACE_GRACE).await;
                }
                self.spawn_job(cfg, VecDeque::new(), jobs, stats_tx, producer)
                    .await;
                false
            }
            ControlMessage::Stop { id } => {
                self.dispatch_command(jobs, id, WorkerCommand::Quit).await;
                false
            }
            ControlMessage::Reset { id } => {
                self.dispatch_command(jobs, id, WorkerCommand::Clear).await;
                false
            }
            ControlMessage::Quit => true,
        }
    }

    async fn spawn_job(
        &self,
        cfg: JobConfig,
        restarts: VecDeque<Instant>,
        jobs: &mut HashMap<String, JobEntry>,
        stats_tx: &mpsc::Sender<StatisticsRecord>,
        producer: &dyn MessageProducer,
    ) {
        match Worker::spawn(&cfg, &self.brokers, &self.hooks) {
            Ok((handle, stats_rx)) => {
                info!(job_id = %cfg.id, topics = ?cfg.data_topics, "job started");
                let forwarder = forward_stats(cfg.id.clone(), stats_rx, stats_tx.clone());
                jobs.insert(
                    cfg.id.clone(),
                    JobEntry {
                        config: cfg,
                        handle,
                        forwarder,
                        restarts,
                    },
                );
            }
            Err(e) => {
                warn!(job_id = %cfg.id, "failed to start job: {e}");
                publish_status(
                    producer,
                    &self.status_topic,
                    &StatisticsRecord::error(&cfg.id, e.to_string()),
                )
                .await;
            }
        }
    }

    /// Send a command to one job, or to every job when `id` is absent.
    async fn dispatch_command(
        &self,
        jobs: &mut HashMap<String, JobEntry>,
        id: Option<String>,
        cmd: WorkerCommand,
    ) {
        match id {
            Some(id) => match jobs.get(&id) {
                Some(entry) => {
                    if !entry.handle.send(cmd).await {
                        warn!(job_id = %id, "worker did not accept command {cmd:?}");
                    }
                }
                None => warn!(job_id = %id, "no such job"),
            },
            None => {
                for entry in jobs.values() {
                    if !entry.handle.send(cmd).await {
                        warn!(job_id = entry.handle.id(), "worker did not accept command {cmd:?}");
                    }
                }
            }
        }
    }

    /// Reap exited workers; restart panicked ones with fresh aggregators.
    async fn supervise(
        &self,
        jobs: &mut HashMap<String, JobEntry>,
        stats_tx: &mpsc::Sender<StatisticsRecord>,
        producer: &dyn MessageProducer,
    ) {
        let finished: Vec<String> = jobs
            .iter()
            .filter(|(_, entry)| entry.handle.is_finished())
            .map(|(id, _)| id.clone())
            .collect();

        for id in finished {
            let Some(entry) = jobs.remove(&id) else {
                continue;
            };
            let JobEntry {
                config,
                handle,
                forwarder,
                mut restarts,
            } = entry;

            let result = handle.outcome().await;
            // Let the forwarder drain the final statistics record.
            let _ = tokio::time::timeout(Duration::from_millis(500), forwarder).await;

            match result {
                Ok(()) => debug!(job_id = %id, "job exited"),
                Err(e) if e.is_panic() => {
                    let now = Instant::now();
                    while restarts
                        .front()
                        .is_some_and(|t| now.duration_since(*t) > RESTART_WINDOW)
                    {
                        restarts.pop_front();
                    }
                    if restarts.len() >= RESTART_LIMIT {
                        warn!(job_id = %id, "restart limit exceeded, marking job failed");
                        publish_status(
                            producer,
                            &self.status_topic,
                            &StatisticsRecord::error(&id, "restart limit exceeded".to_string()),
                        )
                        .await;
                    } else {
                        restarts.push_back(now);
                        warn!(
                            job_id = %id,
                            restarts = restarts.len(),
                            "worker panicked, restarting with cleared histograms"
                        );
                        self.spawn_job(config, restarts, jobs, stats_tx, producer)
                            .await;
                    }
                }
                Err(e) => warn!(job_id = %id, "worker task cancelled: {e}"),
            }
        }
    }

    /// Stop every job and wait out the shared grace period.
    async fn shutdown(&self, jobs: HashMap<String, JobEntry>) {
        info!(jobs = jobs.len(), "quit received, stopping all jobs");
        let entries: Vec<JobEntry> = jobs.into_values().collect();
        for entry in &entries {
            entry.handle.send(WorkerCommand::Quit).await;
        }

        let deadline = Instant::now() + QUIT_GRACE;
        for entry in entries {
            let JobEntry {
                handle, forwarder, ..
            } = entry;
            let id = handle.id().to_string();
            let remaining = deadline.saturating_duration_since(Instant::now());
            match tokio::time::timeout(remaining, handle.outcome()).await {
                Ok(Ok(())) => debug!(job_id = %id, "worker exited"),
                Ok(Err(e)) => warn!(job_id = %id, "worker task failed during shutdown: {e}"),
                Err(_) => warn!(job_id = %id, "worker not exited by grace, abandoning"),
            }
            if tokio::time::timeout(Duration::from_millis(500), forwarder)
                .await
                .is_err()
            {
                debug!(job_id = %id, "stats forwarder abandoned");
            }
        }
    }
}

/// Relay one worker's statistics into the shared fan-in channel.
fn forward_stats(
    job_id: String,
    mut stats_rx: broadcast::Receiver<StatisticsRecord>,
    stats_tx: mpsc::Sender<StatisticsRecord>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match stats_rx.recv().await {
                Ok(record) => {
                    if stats_tx.send(record).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(job_id = %job_id, skipped, "statistics overflowed, oldest records dropped");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}

async fn stop_entry(entry: JobEntry, grace: Duration) {
    let JobEntry {
        handle, forwarder, ..
    } = entry;
    let id = handle.id().to_string();
    handle.send(WorkerCommand::Quit).await;
    if tokio::time::timeout(grace, handle.outcome()).await.is_err() {
        warn!(job_id = %id, "worker did not exit within grace, abandoning");
    }
    let _ = tokio::time::timeout(Duration::from_millis(500), forwarder).await;
}

async fn publish_status(producer: &dyn MessageProducer, topic: &str, record: &StatisticsRecord) {
    match serde_json::to_vec(record) {
        Ok(payload) => {
            if let Err(e) = producer.publish(topic, &payload).await {
                warn!("failed to publish status record: {e}");
            }
        }
        Err(e) => warn!("failed to serialize status record: {e}"),
    }
}
