#[path = "core/error.rs"]
pub mod error;

#[path = "core/prng.rs"]
pub mod prng;

#[path = "core/phase.rs"]
pub mod phase;

#[path = "core/strengths.rs"]
pub mod strengths;

#[path = "core/adaptive.rs"]
pub mod adaptive;

#[path = "core/group.rs"]
pub mod group;

#[path = "core/runner.rs"]
pub mod runner;

#[path = "core/aggregate.rs"]
pub mod aggregate;

#[path = "core/experiment.rs"]
pub mod experiment;

pub mod experiments;

pub use adaptive::AdaptiveType;
pub use aggregate::HistoryFilter;
pub use error::{ErrorKind, Result, SimError};
pub use experiment::{GroupLine, SimConfig};
pub use group::{Group, GroupParams};
pub use phase::{Phase, Sign, TrialElement};
pub use strengths::{History, Individual, Strengths};
