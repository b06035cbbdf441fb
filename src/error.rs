use thiserror::Error;

use crate::models::Mode;

/// Failures that stop the pipeline. Transport and formula problems never end up here.
#[derive(Debug, Error)]
pub enum DashboardError {
    #[error("{mode} source did not shut down cleanly: {reason}")]
    Teardown { mode: Mode, reason: String },
    #[error("cannot start {requested} source while {active} source is still running")]
    SourceActive { active: Mode, requested: Mode },
}
