//! Group-line experiment files and the end-to-end simulation entry point.
//!
//! An experiment file holds one group per line:
//!
//! ```text
//! Control  | 10A+ | 10A-
//! Blocking | 10A+ | 10AB+ | B-
//! ```
//!
//! Field 0 names the group; every further field is a phase string.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::aggregate::{self, HistoryFilter, PhaseHistories};
use crate::error::{Result, SimError};
use crate::group::{Group, GroupParams};
use crate::phase::Phase;
use crate::prng::RandomSource;
use crate::runner::run_group_experiments;

/// Everything a run needs besides the experiment itself.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SimConfig {
    #[cfg_attr(feature = "serde", serde(flatten))]
    pub params: GroupParams,

    /// Per-stimulus alphas; letters not listed use `default_alpha`.
    pub alphas: BTreeMap<String, f64>,
    #[cfg_attr(feature = "serde", serde(alias = "alpha"))]
    pub default_alpha: f64,

    /// Repetitions of every randomized phase.
    pub num_trials: usize,

    /// Fixed seed for the shuffles of randomized phases.
    pub seed: Option<u64>,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            params: GroupParams::default(),
            alphas: BTreeMap::new(),
            default_alpha: 0.1,
            num_trials: 1000,
            seed: None,
        }
    }
}

impl SimConfig {
    pub fn with_params(mut self, params: GroupParams) -> Self {
        self.params = params;
        self
    }

    pub fn with_alpha(mut self, stimulus: impl Into<String>, alpha: f64) -> Self {
        self.alphas.insert(stimulus.into(), alpha);
        self
    }

    pub fn with_default_alpha(mut self, alpha: f64) -> Self {
        self.default_alpha = alpha;
        self
    }

    pub fn with_num_trials(mut self, num_trials: usize) -> Self {
        self.num_trials = num_trials;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    #[cfg(feature = "serde")]
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| SimError::InvalidParameter(e.to_string()))
    }
}

/// One row of an experiment file.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GroupLine {
    pub name: String,
    pub phases: Vec<String>,
}

impl GroupLine {
    pub fn new(name: impl Into<String>, phases: Vec<String>) -> Self {
        Self {
            name: name.into(),
            phases,
        }
    }

    /// Rebuilds a line from already parsed phases, in canonical phase form.
    pub fn from_phases(name: impl Into<String>, phases: &[Phase]) -> Self {
        Self::new(name, phases.iter().map(Phase::to_string).collect())
    }

    pub fn parse(line: &str) -> Result<Self> {
        let mut fields = line.split('|').map(str::trim);
        let name = fields.next().unwrap_or_default();
        if name.is_empty() {
            return Err(SimError::parse(line.trim(), line.trim(), "missing group name"));
        }

        let mut phases: Vec<String> = fields.map(str::to_string).collect();
        while phases.last().is_some_and(|p| p.is_empty()) {
            phases.pop();
        }

        Ok(Self::new(name, phases))
    }
}

impl fmt::Display for GroupLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        for phase in &self.phases {
            write!(f, "|{phase}")?;
        }
        Ok(())
    }
}

/// Parses a whole experiment file, skipping blank lines.
pub fn parse_experiment(text: &str) -> Result<Vec<GroupLine>> {
    text.lines()
        .filter(|line| !line.trim().is_empty())
        .map(GroupLine::parse)
        .collect()
}

/// Writes lines back in experiment-file form.
pub fn write_experiment(lines: &[GroupLine]) -> String {
    let mut out = String::new();
    for line in lines {
        out.push_str(&line.to_string());
        out.push('\n');
    }
    out
}

/// Parses a group's phases and builds the group tracking every stimulus they use.
pub fn create_group_and_phases(
    name: &str,
    phase_strs: &[String],
    cfg: &SimConfig,
) -> Result<(Group, Vec<Phase>)> {
    let phases = phase_strs
        .iter()
        .map(|p| Phase::parse(p))
        .collect::<Result<Vec<_>>>()?;

    let mut stimuli: BTreeSet<String> = BTreeSet::new();
    for phase in &phases {
        stimuli.extend(phase.cs().into_iter().map(String::from));
        stimuli.extend(phase.compounds());
    }

    let group = Group::new(
        name,
        &cfg.alphas,
        cfg.default_alpha,
        &stimuli,
        cfg.params.clone(),
    )?;
    Ok((group, phases))
}

/// Simulates every group selected by `filter` and aggregates their histories.
///
/// All selected groups are parsed and built before any of them runs, so an
/// input error leaves nothing half-simulated. Groups the filter excludes are
/// not simulated.
pub fn run_experiment<R: RandomSource>(
    lines: &[GroupLine],
    cfg: &SimConfig,
    filter: &HistoryFilter,
    rng: &mut R,
) -> Result<Vec<PhaseHistories>> {
    let mut prepared = Vec::new();
    for line in lines.iter().filter(|l| filter.includes_group(&l.name)) {
        prepared.push(create_group_and_phases(&line.name, &line.phases, cfg)?);
    }

    tracing::debug!(
        groups = prepared.len(),
        skipped = lines.len() - prepared.len(),
        num_trials = cfg.num_trials,
        "running experiment"
    );

    let mut histories: Vec<PhaseHistories> = Vec::new();
    for (mut group, phases) in prepared {
        let results = run_group_experiments(&mut group, &phases, cfg.num_trials, rng)?;
        let local = aggregate::group_results(&results, group.name(), filter)?;
        aggregate::merge(&mut histories, local);
    }

    Ok(aggregate::select_phase(histories, filter))
}

/// Text table of every group's phases, one row per group.
///
/// Group names are right-aligned, phase columns are right-aligned to their
/// widest entry and the `selected` phase (1-based) is wrapped in `*…*`.
pub fn phase_table(groups: &[(String, Vec<Phase>)], selected: Option<usize>) -> String {
    let columns = groups.iter().map(|(_, p)| p.len()).max().unwrap_or(0);
    let name_width = groups.iter().map(|(n, _)| n.len()).max().unwrap_or(0);
    let widths: Vec<usize> = (0..columns)
        .map(|x| {
            groups
                .iter()
                .filter_map(|(_, p)| p.get(x))
                .map(|p| p.phase_str.len())
                .max()
                .unwrap_or(0)
        })
        .collect();

    let rows: Vec<String> = groups
        .iter()
        .map(|(name, phases)| {
            let mut cells = vec![format!("{name:>name_width$}")];
            for (e, (phase, &width)) in phases.iter().zip(&widths).enumerate() {
                let pad = " ".repeat(width - phase.phase_str.len());
                if selected == Some(e + 1) {
                    cells.push(format!("{pad}*{}*", phase.phase_str));
                } else {
                    cells.push(format!("{pad}{}", phase.phase_str));
                }
            }
            cells.join("|")
        })
        .collect();

    rows.join("\n")
}
