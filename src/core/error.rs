use thiserror::Error;

pub type Result<T> = std::result::Result<T, SimError>;

/// Coarse classification used by collaborators to pick a user-facing message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Parse,
    Configuration,
    Shape,
}

/// Every failure the simulation core can report.
///
/// None of these are recoverable for the run that produced them: the engine is
/// deterministic, so retrying with the same inputs reproduces the same error.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimError {
    #[error("part not understood: `{token}` in phase `{phase}` ({reason})")]
    Parse {
        token: String,
        phase: String,
        reason: String,
    },

    #[error("unknown adaptive type `{0}` (expected one of: linear, exponential, mack, hall, macknhall, dualV, lepelley, dualmack, hybrid)")]
    UnknownAdaptiveType(String),

    #[error("group `{group}` references stimulus `{stimulus}` which has no alpha; supply it explicitly (e.g. --alpha-{stimulus}=0.1)")]
    MissingStimulus { group: String, stimulus: String },

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("shape mismatch: {0}")]
    Shape(String),
}

impl SimError {
    pub(crate) fn parse(token: &str, phase: &str, reason: impl Into<String>) -> Self {
        SimError::Parse {
            token: token.to_string(),
            phase: phase.to_string(),
            reason: reason.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            SimError::Parse { .. } => ErrorKind::Parse,
            SimError::UnknownAdaptiveType(_)
            | SimError::MissingStimulus { .. }
            | SimError::InvalidParameter(_) => ErrorKind::Configuration,
            SimError::Shape(_) => ErrorKind::Shape,
        }
    }
}
