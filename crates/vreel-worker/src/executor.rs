//! Single-run background executor.
//!
//! Runs one pipeline at a time on a background task and publishes its
//! progress through a watch channel, so a supervising interface stays
//! responsive and can poll or await the current status.

use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinHandle;
use tracing::{info, Instrument};

use crate::error::{WorkerError, WorkerResult};
use crate::pipeline::{Pipeline, RunOutput, Stage};

/// Observable state of the executor.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum RunStatus {
    Idle,
    Running {
        run_id: String,
        stage: Stage,
    },
    Succeeded {
        run_id: String,
        output: PathBuf,
    },
    Failed {
        run_id: String,
        message: String,
        /// The run lacked usable input rather than failing mid-processing
        input_error: bool,
    },
}

impl RunStatus {
    pub fn is_running(&self) -> bool {
        matches!(self, RunStatus::Running { .. })
    }

    pub fn is_finished(&self) -> bool {
        matches!(self, RunStatus::Succeeded { .. } | RunStatus::Failed { .. })
    }
}

/// Handle to a spawned run.
#[derive(Debug)]
pub struct RunHandle {
    run_id: String,
    join: JoinHandle<WorkerResult<RunOutput>>,
}

impl RunHandle {
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Wait for the run to finish.
    pub async fn wait(self) -> WorkerResult<RunOutput> {
        self.join
            .await
            .map_err(|e| WorkerError::processing_failed(format!("run task failed: {}", e)))?
    }
}

/// Executes at most one pipeline run at a time.
#[derive(Debug, Clone)]
pub struct RunExecutor {
    permits: Arc<Semaphore>,
    status: Arc<watch::Sender<RunStatus>>,
}

impl Default for RunExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl RunExecutor {
    pub fn new() -> Self {
        let (status, _) = watch::channel(RunStatus::Idle);
        Self {
            permits: Arc::new(Semaphore::new(1)),
            status: Arc::new(status),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<RunStatus> {
        self.status.subscribe()
    }

    pub fn status(&self) -> RunStatus {
        self.status.borrow().clone()
    }

    pub fn is_busy(&self) -> bool {
        self.permits.available_permits() == 0
    }

    /// Start `pipeline` on a background task.
    ///
    /// Fails with [`WorkerError::RunInProgress`] while another run holds the slot.
    pub fn spawn(&self, pipeline: Pipeline) -> WorkerResult<RunHandle> {
        let permit = self
            .permits
            .clone()
            .try_acquire_owned()
            .map_err(|_| WorkerError::RunInProgress)?;

        let run_id = pipeline.run_id().to_string();
        let span = pipeline.logger().create_span();

        self.status.send_replace(RunStatus::Running {
            run_id: run_id.clone(),
            stage: Stage::Inputs,
        });

        let stage_tx = self.status.clone();
        let stage_run_id = run_id.clone();
        let pipeline = pipeline.with_stage_observer(Arc::new(move |stage| {
            stage_tx.send_replace(RunStatus::Running {
                run_id: stage_run_id.clone(),
                stage,
            });
        }));

        let status = self.status.clone();
        let task_run_id = run_id.clone();
        let join = tokio::spawn(
            async move {
                let _permit = permit;
                let result = pipeline.run().await;

                let final_status = match &result {
                    Ok(output) => RunStatus::Succeeded {
                        run_id: task_run_id,
                        output: output.output.clone(),
                    },
                    Err(e) => RunStatus::Failed {
                        run_id: task_run_id,
                        message: e.to_string(),
                        input_error: e.is_input_error(),
                    },
                };
                status.send_replace(final_status);
                result
            }
            .instrument(span),
        );

        info!(run_id = %run_id, "Spawned pipeline run");
        Ok(RunHandle { run_id, join })
    }
}
