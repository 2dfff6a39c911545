use std::collections::{BTreeMap, BTreeSet};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::adaptive::{AdaptiveType, StepContext, StepRule};
use crate::error::{Result, SimError};
use crate::phase::{Sign, TrialElement};
use crate::strengths::{History, Individual, Strengths};

/// Learning parameters shared by every stimulus of a group.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct GroupParams {
    // Salience of the US on reinforced / non-reinforced elements.
    #[cfg_attr(feature = "serde", serde(alias = "beta"))]
    pub betap: f64,
    #[cfg_attr(feature = "serde", serde(alias = "beta_neg"))]
    pub betan: f64,

    pub lamda: f64,

    // Weight of the latest prediction error in the gamma-smoothed alphas.
    pub gamma: f64,

    #[cfg_attr(feature = "serde", serde(alias = "thetaE"))]
    pub theta_e: f64,
    #[cfg_attr(feature = "serde", serde(alias = "thetaI"))]
    pub theta_i: f64,

    pub xi_hall: f64,

    // None picks the adaptive type's default.
    pub window_size: Option<usize>,

    pub use_configurals: bool,
    pub adaptive_type: AdaptiveType,
}

impl Default for GroupParams {
    fn default() -> Self {
        Self {
            betap: 0.3,
            betan: 0.2,
            lamda: 1.0,
            gamma: 0.5,
            theta_e: 0.3,
            theta_i: 0.1,
            xi_hall: 0.2,
            window_size: None,
            use_configurals: false,
            adaptive_type: AdaptiveType::default(),
        }
    }
}

impl GroupParams {
    pub fn with_adaptive_type(mut self, adaptive_type: AdaptiveType) -> Self {
        self.adaptive_type = adaptive_type;
        self
    }

    pub fn with_betas(mut self, betap: f64, betan: f64) -> Self {
        self.betap = betap;
        self.betan = betan;
        self
    }

    pub fn with_lamda(mut self, lamda: f64) -> Self {
        self.lamda = lamda;
        self
    }

    pub fn with_gamma(mut self, gamma: f64) -> Self {
        self.gamma = gamma;
        self
    }

    pub fn with_thetas(mut self, theta_e: f64, theta_i: f64) -> Self {
        self.theta_e = theta_e;
        self.theta_i = theta_i;
        self
    }

    pub fn with_xi_hall(mut self, xi_hall: f64) -> Self {
        self.xi_hall = xi_hall;
        self
    }

    pub fn with_window_size(mut self, window_size: usize) -> Self {
        self.window_size = Some(window_size);
        self
    }

    pub fn with_configurals(mut self, use_configurals: bool) -> Self {
        self.use_configurals = use_configurals;
        self
    }

    pub fn resolved_window_size(&self) -> usize {
        self.window_size
            .unwrap_or_else(|| self.adaptive_type.default_window_size())
    }

    pub fn validate(&self) -> Result<()> {
        let named = [
            ("betap", self.betap),
            ("betan", self.betan),
            ("lamda", self.lamda),
            ("gamma", self.gamma),
            ("thetaE", self.theta_e),
            ("thetaI", self.theta_i),
            ("xi_hall", self.xi_hall),
        ];
        if let Some((name, v)) = named.iter().find(|(_, v)| !v.is_finite()) {
            return Err(SimError::InvalidParameter(format!("{name} must be finite, got {v}")));
        }
        if self.window_size == Some(0) {
            return Err(SimError::InvalidParameter(
                "window_size must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// One experimental group: its stimuli, parameters and running context.
#[derive(Debug, Clone)]
pub struct Group {
    name: String,
    s: Strengths,
    params: GroupParams,

    rule: StepRule,
    window_size: usize,

    // Asymptote of the element processed last; carried across phases.
    prev_lamda: f64,
}

impl Group {
    /// Builds a group tracking every key in `stimuli` and in `alphas`.
    ///
    /// Single letters take their alpha from `alphas`, falling back to
    /// `default_alpha`. With configural cues on, multi-letter keys are tracked
    /// as their own stimulus; their alpha defaults to the product of their
    /// letters' alphas. Without configural cues multi-letter keys only
    /// contribute their letters.
    pub fn new(
        name: impl Into<String>,
        alphas: &BTreeMap<String, f64>,
        default_alpha: f64,
        stimuli: &BTreeSet<String>,
        params: GroupParams,
    ) -> Result<Self> {
        let name = name.into();
        params.validate()?;
        if !default_alpha.is_finite() {
            return Err(SimError::InvalidParameter(format!(
                "default alpha must be finite, got {default_alpha}"
            )));
        }

        let mut explicit: BTreeMap<String, f64> = BTreeMap::new();
        for (key, &alpha) in alphas {
            explicit.insert(stimulus_key(key)?, alpha);
        }

        let mut keys: BTreeSet<String> = BTreeSet::new();
        for key in stimuli.iter().chain(alphas.keys()) {
            let key = stimulus_key(key)?;
            for c in key.chars() {
                keys.insert(c.to_string());
            }
            if key.len() > 1 && params.use_configurals {
                keys.insert(key);
            }
        }

        let letter_alpha = |c: char| {
            explicit
                .get(c.to_string().as_str())
                .copied()
                .unwrap_or(default_alpha)
        };

        let mut s = Strengths::new();
        for key in keys {
            let alpha = match explicit.get(&key) {
                Some(&alpha) => alpha,
                None => key.chars().map(letter_alpha).product(),
            };
            s.insert(key, Individual::new(alpha));
        }

        tracing::debug!(
            group = %name,
            stimuli = s.len(),
            adaptive_type = %params.adaptive_type,
            "group constructed"
        );

        Ok(Self {
            name,
            s,
            rule: params.adaptive_type.rule(),
            window_size: params.resolved_window_size(),
            prev_lamda: params.lamda,
            params,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn params(&self) -> &GroupParams {
        &self.params
    }

    pub fn strengths(&self) -> &Strengths {
        &self.s
    }

    pub fn prev_lamda(&self) -> f64 {
        self.prev_lamda
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }

    /// Replaces the running state; used to rewind before a Monte-Carlo repetition.
    pub fn restore(&mut self, s: Strengths, prev_lamda: f64) {
        self.s = s;
        self.prev_lamda = prev_lamda;
    }

    /// Stimulus keys updated when `compound` is presented.
    fn members(&self, compound: &str) -> Vec<String> {
        let mut out: Vec<String> = compound.chars().map(|c| c.to_string()).collect();
        if self.params.use_configurals && compound.len() > 1 {
            out.push(compound.to_string());
        }
        out
    }

    fn missing(&self, stimulus: &str) -> SimError {
        missing_stimulus(&self.name, stimulus)
    }

    /// Runs `elems` in order and returns one `Strengths` per step index.
    ///
    /// Each stimulus history starts with the state observed before its first
    /// update in this phase, followed by one snapshot per element it took part in.
    /// The group is left untouched if any element references an unknown stimulus.
    pub fn run_phase(
        &mut self,
        elems: &[TrialElement],
        lamda_override: Option<f64>,
    ) -> Result<Vec<Strengths>> {
        for elem in elems {
            if let Some(key) = self
                .members(&elem.compound)
                .into_iter()
                .find(|k| !self.s.contains(k))
            {
                return Err(self.missing(&key));
            }
        }

        let phase_lamda = lamda_override.unwrap_or(self.params.lamda);
        let rule = self.rule;
        let capacity = self.window_size;
        let mut histories: BTreeMap<String, History> = BTreeMap::new();

        for elem in elems {
            let (beta, lamda) = match elem.sign {
                Sign::Plus => (self.params.betap, phase_lamda),
                Sign::Minus => (self.params.betan, 0.0),
            };

            let members = self.members(&elem.compound);

            let (mut sigma, mut sigma_e, mut sigma_i) = (0.0, 0.0, 0.0);
            for key in &members {
                let ind = self.s.individual(key).ok_or_else(|| self.missing(key))?;
                sigma += ind.assoc;
                sigma_e += ind.ve;
                sigma_i += ind.vi;
            }

            let ctx = StepContext {
                params: &self.params,
                beta,
                lamda,
                prev_lamda: self.prev_lamda,
                sign: elem.sign.value(),
                sigma,
                sigma_e,
                sigma_i,
            };

            for key in &members {
                let ind = self
                    .s
                    .individual_mut(key)
                    .ok_or_else(|| missing_stimulus(&self.name, key))?;

                let history = histories.entry(key.clone()).or_insert_with(|| {
                    let mut h = History::new();
                    h.add(ind);
                    h
                });

                if ind.window.is_empty() {
                    let before = ind.assoc;
                    ind.window.push(before, capacity);
                }
                let baseline = ind.window.mean().unwrap_or(ind.assoc);

                rule(ind, &ctx);

                let after = ind.assoc;
                ind.window.push(after, capacity);
                ind.delta_ma_hall = ind.window.mean().map(|m| m - baseline);

                history.add(ind);
            }

            self.prev_lamda = lamda;
        }

        Ok(Strengths::from_histories(&histories))
    }
}

/// Canonical (sorted) key for a stimulus or compound name.
fn stimulus_key(key: &str) -> Result<String> {
    let mut letters: Vec<char> = key.chars().collect();
    if letters.is_empty() || letters.iter().any(|c| !c.is_ascii_uppercase()) {
        return Err(SimError::InvalidParameter(format!(
            "stimulus names are uppercase letters, got `{key}`"
        )));
    }
    letters.sort_unstable();
    if letters.windows(2).any(|w| w[0] == w[1]) {
        return Err(SimError::InvalidParameter(format!(
            "compound `{key}` repeats a stimulus"
        )));
    }
    Ok(letters.into_iter().collect())
}

fn missing_stimulus(group: &str, stimulus: &str) -> SimError {
    SimError::MissingStimulus {
        group: group.to_string(),
        stimulus: stimulus.to_string(),
    }
}
