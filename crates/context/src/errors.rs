//! Mode runner errors

use navigator_common::errors::AppError;
use navigator_common::models::{LegFailure, Mode, RunStage};
use thiserror::Error;

/// A mode run that ended in `FAILED`, with the stage it failed in
#[derive(Debug, Error)]
#[error("{mode} run failed while {stage}: {error}")]
pub struct ModeError {
    pub mode: Mode,
    pub stage: RunStage,
    #[source]
    pub error: AppError,
}

impl ModeError {
    pub fn new(mode: Mode, stage: RunStage, error: AppError) -> Self {
        Self { mode, stage, error }
    }

    /// Serializable form for benchmark output
    pub fn failure(&self) -> LegFailure {
        LegFailure::new(self.mode, self.stage, &self.error)
    }
}

impl From<ModeError> for AppError {
    fn from(err: ModeError) -> Self {
        err.error
    }
}
