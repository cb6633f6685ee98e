//! Background analysis task orchestration
//!
//! Tasks are tracked in memory: submitting spawns the pipeline onto the
//! runtime and returns a fresh task id immediately. A task moves from
//! running to exactly one terminal state (completed or failed), and
//! terminal records are swept after a retention window. Running tasks are
//! never swept.

use crate::services::analyzer::{AnalysisOutcome, Analyzer, Submission};
use crate::services::feedback::ThresholdAdapter;
use chrono::{DateTime, Utc};
use museguard_common::config::EngineConfig;
use museguard_common::db::settings;
use museguard_common::Result;
use serde::Serialize;
use sqlx::SqlitePool;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use uuid::Uuid;

pub const DEFAULT_ANALYSIS_TIMEOUT_SECONDS: i64 = 300;
pub const DEFAULT_TASK_RETENTION_HOURS: i64 = 24;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Running,
    Completed,
    Failed,
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TaskStatus::Running)
    }
}

/// In-memory record of one background analysis
#[derive(Debug, Clone, Serialize)]
pub struct TaskRecord {
    pub task_id: Uuid,
    pub filename: String,
    pub status: TaskStatus,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<AnalysisOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Clone)]
pub struct TaskOrchestrator {
    db: SqlitePool,
    analyzer: Analyzer,
    table: Arc<RwLock<HashMap<Uuid, TaskRecord>>>,
}

impl TaskOrchestrator {
    pub fn new(db: SqlitePool, analyzer: Analyzer) -> Self {
        Self {
            db,
            analyzer,
            table: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Spawn the pipeline for a submission and return its task id.
    ///
    /// Unsupported extensions are rejected here, before a task exists;
    /// every other failure surfaces as a failed task.
    pub async fn submit(&self, submission: Submission) -> Result<Uuid> {
        Analyzer::validate_extension(&submission.filename)?;

        let task_id = Uuid::new_v4();
        let record = TaskRecord {
            task_id,
            filename: submission.filename.clone(),
            status: TaskStatus::Running,
            started_at: Utc::now(),
            completed_at: None,
            outcome: None,
            error: None,
        };
        self.table.write().await.insert(task_id, record);

        let timeout_seconds = settings::get_i64(
            &self.db,
            settings::ANALYSIS_TIMEOUT_SECONDS,
            DEFAULT_ANALYSIS_TIMEOUT_SECONDS,
        )
        .await?
        .max(1) as u64;

        let orchestrator = self.clone();
        tokio::spawn(async move {
            // The pipeline runs in its own task so a panic unwinds there
            // and surfaces here as a JoinError instead of skipping finish()
            let analyzer = orchestrator.analyzer.clone();
            let work = tokio::spawn(async move { analyzer.analyze(submission).await });
            let abort = work.abort_handle();

            let result = match tokio::time::timeout(Duration::from_secs(timeout_seconds), work).await
            {
                Ok(Ok(Ok(outcome))) => Ok(outcome),
                Ok(Ok(Err(e))) => Err(e.to_string()),
                Ok(Err(join_err)) if join_err.is_panic() => {
                    Err("Analysis panicked".to_string())
                }
                Ok(Err(_)) => Err("Analysis was cancelled".to_string()),
                Err(_) => {
                    abort.abort();
                    Err(format!("Analysis timed out after {}s", timeout_seconds))
                }
            };
            orchestrator.finish(task_id, result).await;
        });

        tracing::info!(%task_id, "Analysis task submitted");
        Ok(task_id)
    }

    /// Record the terminal state. A task transitions out of running at
    /// most once; a second terminal write is ignored.
    async fn finish(&self, task_id: Uuid, result: std::result::Result<AnalysisOutcome, String>) {
        let mut table = self.table.write().await;
        let record = match table.get_mut(&task_id) {
            Some(record) if record.status == TaskStatus::Running => record,
            Some(_) => {
                tracing::warn!(%task_id, "Ignoring terminal transition on finished task");
                return;
            }
            None => {
                tracing::warn!(%task_id, "Task record missing at completion");
                return;
            }
        };

        record.completed_at = Some(Utc::now());
        match result {
            Ok(outcome) => {
                tracing::info!(
                    %task_id,
                    verdict_id = outcome.verdict.id,
                    cached = outcome.cached,
                    "Analysis task completed"
                );
                record.status = TaskStatus::Completed;
                record.outcome = Some(outcome);
            }
            Err(error) => {
                tracing::warn!(%task_id, error = %error, "Analysis task failed");
                record.status = TaskStatus::Failed;
                record.error = Some(error);
            }
        }
    }

    pub async fn get(&self, task_id: Uuid) -> Option<TaskRecord> {
        self.table.read().await.get(&task_id).cloned()
    }

    /// All tracked tasks, newest first
    pub async fn list(&self) -> Vec<TaskRecord> {
        let mut tasks: Vec<TaskRecord> = self.table.read().await.values().cloned().collect();
        tasks.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        tasks
    }

    /// Sweep terminal tasks older than `max_age`. Running tasks stay.
    pub async fn cleanup(&self, max_age: chrono::Duration) -> usize {
        let cutoff = Utc::now() - max_age;
        let mut table = self.table.write().await;
        let before = table.len();
        table.retain(|_, record| {
            !record.status.is_terminal() || record.completed_at.map_or(true, |t| t > cutoff)
        });
        let removed = before - table.len();
        if removed > 0 {
            tracing::info!(removed, "Swept expired task records");
        }
        removed
    }
}

/// Spawn the periodic threshold-adaptation and task-sweep loops
pub fn spawn_background_loops(
    orchestrator: TaskOrchestrator,
    adapter: ThresholdAdapter,
    config: &EngineConfig,
) {
    let adaptation_interval = Duration::from_secs(config.adaptation_interval_seconds.max(1));
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(adaptation_interval);
        // The immediate first tick would adapt on startup
        ticker.tick().await;
        loop {
            ticker.tick().await;
            match adapter.run_once().await {
                Ok(outcome) => tracing::debug!(?outcome, "Threshold adaptation pass"),
                Err(e) => tracing::error!(error = %e, "Threshold adaptation failed"),
            }
        }
    });

    let cleanup_interval = Duration::from_secs(config.cleanup_interval_seconds.max(1));
    let db = orchestrator.db.clone();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(cleanup_interval);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let retention_hours = match settings::get_i64(
                &db,
                settings::TASK_RETENTION_HOURS,
                DEFAULT_TASK_RETENTION_HOURS,
            )
            .await
            {
                Ok(hours) => hours.max(1),
                Err(e) => {
                    tracing::error!(error = %e, "Could not read task retention setting");
                    DEFAULT_TASK_RETENTION_HOURS
                }
            };
            orchestrator.cleanup(chrono::Duration::hours(retention_hours)).await;
        }
    });
}
