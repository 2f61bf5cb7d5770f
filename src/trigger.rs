//! The contract between a scheduled task and whatever schedules it, and the
//! downstream transform signalled after a successful ingestion.
//!
//! Cadence, retries and backoff are the scheduler's business. A task only
//! promises to run to completion (or fail) in bounded time and to be safe to
//! run again after a failure.

use std::process::Command;
use thiserror::Error;

use crate::config::TransformConfig;
use crate::logging::{self, Stage};

/// A unit of work an external scheduler can invoke.
pub trait ScheduledTask {
    type Output;
    type Error: std::error::Error;

    fn task_id(&self) -> &str;

    fn run(&self) -> Result<Self::Output, Self::Error>;
}

#[derive(Debug, Error)]
pub enum TriggerError {
    #[error("could not start transform command '{command}': {reason}")]
    Spawn { command: String, reason: String },
    #[error("transform command '{command}' exited with {status}")]
    Failed { command: String, status: String },
}

/// Signal sent to the downstream transformation step.
pub trait DownstreamTrigger {
    fn trigger(&self) -> Result<(), TriggerError>;
}

/// Runs an external command (by default `docker exec dbt_container dbt run ...`)
/// and waits for it to finish.
#[derive(Debug, Clone)]
pub struct CommandTrigger {
    config: TransformConfig,
}

impl CommandTrigger {
    pub fn new(config: &TransformConfig) -> Self {
        CommandTrigger {
            config: config.clone(),
        }
    }
}

impl DownstreamTrigger for CommandTrigger {
    fn trigger(&self) -> Result<(), TriggerError> {
        let command = self.config.command_line();
        logging::info(Stage::Transform, None, &format!("Running transform: {}", command));

        let status = Command::new(&self.config.program)
            .args(&self.config.args)
            .status()
            .map_err(|e| TriggerError::Spawn {
                command: command.clone(),
                reason: e.to_string(),
            })?;

        if !status.success() {
            return Err(TriggerError::Failed {
                command,
                status: status.to_string(),
            });
        }

        logging::info(Stage::Transform, None, "Transform finished");
        Ok(())
    }
}

/// What happened when a task and its downstream step were run together.
#[derive(Debug)]
pub enum TaskOutcome<T, E> {
    /// The task failed; the downstream step was not signalled.
    TaskFailed(E),
    /// The task succeeded and no downstream step was requested.
    Succeeded(T),
    /// The task succeeded and the downstream step ran.
    Transformed(T),
    /// The task succeeded but the downstream step failed.
    TransformFailed(T, TriggerError),
}

impl<T, E> TaskOutcome<T, E> {
    pub fn is_success(&self) -> bool {
        matches!(self, TaskOutcome::Succeeded(_) | TaskOutcome::Transformed(_))
    }
}

/// Run `task`, then signal `downstream` only if the task succeeded.
pub fn run_then_transform<T: ScheduledTask + ?Sized>(
    task: &T,
    downstream: Option<&dyn DownstreamTrigger>,
) -> TaskOutcome<T::Output, T::Error> {
    logging::info(Stage::System, None, &format!("Starting task {}", task.task_id()));

    let output = match task.run() {
        Ok(output) => output,
        Err(e) => {
            logging::warn(
                Stage::Transform,
                None,
                &format!("Task {} failed; transform not triggered", task.task_id()),
            );
            return TaskOutcome::TaskFailed(e);
        }
    };

    match downstream {
        None => TaskOutcome::Succeeded(output),
        Some(trigger) => match trigger.trigger() {
            Ok(()) => TaskOutcome::Transformed(output),
            Err(e) => {
                logging::error(Stage::Transform, None, &e.to_string());
                TaskOutcome::TransformFailed(output, e)
            }
        },
    }
}
