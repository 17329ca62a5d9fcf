//! The worker loop.
//!
//! Each cycle checks the runtime budget and the stop flag, long-polls the queue, then runs
//! every event through download, extraction, persistence and acknowledgement, one event at
//! a time. Per-event failures are recorded on the processing record and never end the
//! loop.

use crate::error::ProcessingError;
use crate::queue::QueueClient;
use crate::shutdown::ShutdownSignal;
use crate::status::{ServiceStats, StatusReport};
use crate::tracker::RecordTracker;
use analysis_core::{AckPolicy, NotificationEvent, WorkerConfig};
use analysis_processing::MetadataExtractor;
use analysis_storage::ObjectStoreClient;
use chrono::Utc;
use serde::Serialize;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::path::PathBuf;
use std::time::{Duration, Instant};

/// Where an event is in its pipeline. Used as a structured log field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Idle,
    Polling,
    Validating,
    Downloading,
    Extracting,
    Persisting,
    Acknowledging,
}

impl Display for Stage {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        let name = match self {
            Stage::Idle => "idle",
            Stage::Polling => "polling",
            Stage::Validating => "validating",
            Stage::Downloading => "downloading",
            Stage::Extracting => "extracting",
            Stage::Persisting => "persisting",
            Stage::Acknowledging => "acknowledging",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub max_messages: i32,
    pub poll_interval: Duration,
    /// `None` runs until shutdown.
    pub max_runtime: Option<Duration>,
    pub ack_policy: AckPolicy,
    pub cleanup_after_processing: bool,
    /// Log the status summary every N cycles; 0 only at start and stop.
    pub status_interval_cycles: u64,
}

impl PipelineSettings {
    pub fn from_config(config: &WorkerConfig) -> Self {
        Self {
            max_messages: config.queue.max_messages,
            poll_interval: config.schedule.poll_interval(),
            max_runtime: config.schedule.max_runtime(),
            ack_policy: config.schedule.ack_policy,
            cleanup_after_processing: config.scratch.cleanup_after_processing,
            status_interval_cycles: config.schedule.status_interval_cycles,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    RuntimeBudget,
    Shutdown,
}

impl Display for StopReason {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            StopReason::RuntimeBudget => write!(f, "maximum runtime reached"),
            StopReason::Shutdown => write!(f, "shutdown requested"),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub reason: StopReason,
    pub elapsed: Duration,
    pub stats: ServiceStats,
}

/// Terminal result of one event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventOutcome {
    Completed,
    Failed(String),
}

pub struct Orchestrator {
    queue: QueueClient,
    storage: ObjectStoreClient,
    extractor: MetadataExtractor,
    records: RecordTracker,
    settings: PipelineSettings,
    shutdown: ShutdownSignal,
    stats: ServiceStats,
    started: Instant,
}

impl Orchestrator {
    pub fn new(
        queue: QueueClient,
        storage: ObjectStoreClient,
        extractor: MetadataExtractor,
        records: RecordTracker,
        settings: PipelineSettings,
        shutdown: ShutdownSignal,
    ) -> Self {
        Self {
            queue,
            storage,
            extractor,
            records,
            settings,
            shutdown,
            stats: ServiceStats::new(Utc::now()),
            started: Instant::now(),
        }
    }

    pub fn stats(&self) -> &ServiceStats {
        &self.stats
    }

    fn budget_exhausted(&self) -> bool {
        self.settings
            .max_runtime
            .map(|max| self.started.elapsed() >= max)
            .unwrap_or(false)
    }

    /// Run cycles until the runtime budget elapses or a stop is requested.
    ///
    /// A batch that has been polled always finishes before the loop exits.
    pub async fn run(&mut self) -> RunSummary {
        self.started = Instant::now();
        self.stats = ServiceStats::new(Utc::now());
        tracing::info!(
            max_runtime_secs = ?self.settings.max_runtime.map(|d| d.as_secs()),
            poll_interval_secs = self.settings.poll_interval.as_secs(),
            ack_policy = %self.settings.ack_policy,
            "Starting analysis service main loop"
        );
        self.log_status().await;

        let reason = loop {
            if self.shutdown.is_requested() {
                break StopReason::Shutdown;
            }
            if self.budget_exhausted() {
                tracing::info!("Reached maximum runtime limit, shutting down");
                break StopReason::RuntimeBudget;
            }

            self.run_cycle().await;
            self.stats.cycles += 1;

            let interval = self.settings.status_interval_cycles;
            if interval > 0 && self.stats.cycles % interval == 0 {
                self.log_status().await;
            }

            tracing::trace!(stage = %Stage::Idle, "Cycle finished");
            if self.shutdown.sleep(self.settings.poll_interval).await {
                break StopReason::Shutdown;
            }
        };

        tracing::info!(reason = %reason, "Shutting down analysis service");
        self.log_status().await;

        RunSummary {
            reason,
            elapsed: self.started.elapsed(),
            stats: self.stats.clone(),
        }
    }

    /// Poll once and handle every returned event.
    pub async fn run_cycle(&mut self) {
        tracing::debug!(stage = %Stage::Polling, "Polling queue");
        let events = self.queue.poll(self.settings.max_messages).await;
        self.stats.messages_rejected = self.queue.rejected_total();
        if events.is_empty() {
            return;
        }

        tracing::info!(count = events.len(), "Processing messages");
        for event in &events {
            self.process_event(event).await;
        }
        self.stats.last_activity = Some(Utc::now());
    }

    /// Run one event through the pipeline and acknowledge it per the ack policy.
    #[tracing::instrument(
        skip(self, event),
        fields(message_id = %event.message_id, object = %event.object_uri())
    )]
    pub async fn process_event(&mut self, event: &NotificationEvent) -> EventOutcome {
        tracing::info!("Processing file");
        let record_id = self.records.begin(&event.bucket, &event.key).await;

        let mut local_path = None;
        let result = self.handle_event(event, &mut local_path).await;

        tracing::debug!(stage = %Stage::Persisting, record_id = ?record_id, "Persisting outcome");
        let outcome = match result {
            Ok(metadata) => {
                self.records.complete(record_id, metadata).await;
                EventOutcome::Completed
            }
            Err(e) => {
                let message = e.to_string();
                tracing::error!(error = %message, "Failed to process message");
                self.records.fail(record_id, &message).await;
                EventOutcome::Failed(message)
            }
        };

        if self.settings.cleanup_after_processing {
            if let Some(path) = &local_path {
                self.storage.cleanup(path).await;
            }
        }

        let acknowledge = match (&outcome, self.settings.ack_policy) {
            (EventOutcome::Completed, _) => true,
            (EventOutcome::Failed(_), AckPolicy::Always) => true,
            (EventOutcome::Failed(_), AckPolicy::SuccessOnly) => false,
        };
        if acknowledge {
            tracing::debug!(stage = %Stage::Acknowledging, "Acknowledging message");
            self.queue.delete(event).await;
        } else {
            tracing::warn!("Leaving failed message for redelivery");
        }

        match &outcome {
            EventOutcome::Completed => {
                self.stats.messages_processed += 1;
                tracing::info!("Successfully processed");
            }
            EventOutcome::Failed(_) => self.stats.processing_errors += 1,
        }
        outcome
    }

    async fn handle_event(
        &mut self,
        event: &NotificationEvent,
        local_path: &mut Option<PathBuf>,
    ) -> Result<serde_json::Value, ProcessingError> {
        tracing::debug!(stage = %Stage::Validating, "Validating event");
        if event.bucket.is_empty() {
            return Err(ProcessingError::InvalidEvent("empty bucket"));
        }
        if event.key.is_empty() {
            return Err(ProcessingError::InvalidEvent("empty key"));
        }

        tracing::info!(stage = %Stage::Downloading, size_bytes = event.size, "Downloading file");
        let (path, precheck) = self
            .storage
            .download_with_attributes(&event.bucket, &event.key, None)
            .await?;
        *local_path = Some(path.clone());
        self.stats.files_downloaded += 1;

        // Only ask again when the pre-check could not read the attributes.
        let source = match precheck {
            Some(attrs) => Some(attrs),
            None => self
                .storage
                .fetch_metadata(&event.bucket, &event.key)
                .await
                .ok(),
        };

        tracing::info!(stage = %Stage::Extracting, "Extracting metadata and running analysis");
        let metadata = self.extractor.extract_metadata(&path, source).await?;
        Ok(serde_json::to_value(&metadata)?)
    }

    /// Assemble the current status snapshot.
    pub async fn status_report(&self) -> StatusReport {
        StatusReport {
            uptime: self.started.elapsed(),
            max_runtime: self.settings.max_runtime,
            stats: self.stats.clone(),
            queue: self.queue.stats().await,
            scratch: self.storage.dir_stats().await,
            records: self.records.stats().await,
            durable_records: self.records.is_durable(),
        }
    }

    async fn log_status(&self) {
        let report = self.status_report().await;
        tracing::info!("{}", report);
    }
}
