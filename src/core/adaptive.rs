//! Adaptive-attention step rules.
//!
//! Each variant of [`AdaptiveType`] maps to one stateless [`StepRule`]. A group
//! resolves its rule once at construction and calls it for every stimulus of
//! every trial element; nothing downstream branches on the variant again.
//!
//! The error-correction rules (`linear` .. `macknhall`) drive learning with
//! `prev_lamda`, the asymptote of the *previous* trial element. The
//! dual-process rules (`dualV` .. `hybrid`) use the current element's `lamda`
//! and keep separate excitatory (`ve`) and inhibitory (`vi`) accumulators,
//! with `assoc = ve - vi`.

use std::fmt;
use std::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{Result, SimError};
use crate::group::GroupParams;
use crate::strengths::{Individual, DEFAULT_DELTA_MA_HALL};

/// Bounds applied to the theta-driven alphas.
pub const MIN_ALPHA: f64 = 0.05;
pub const MAX_ALPHA: f64 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum AdaptiveType {
    Linear,
    Exponential,
    Mack,
    Hall,
    MackNHall,
    #[default]
    #[cfg_attr(feature = "serde", serde(rename = "dualV"))]
    DualV,
    LePelley,
    DualMack,
    Hybrid,
}

impl AdaptiveType {
    pub const ALL: [AdaptiveType; 9] = [
        AdaptiveType::Linear,
        AdaptiveType::Exponential,
        AdaptiveType::Mack,
        AdaptiveType::Hall,
        AdaptiveType::MackNHall,
        AdaptiveType::DualV,
        AdaptiveType::LePelley,
        AdaptiveType::DualMack,
        AdaptiveType::Hybrid,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            AdaptiveType::Linear => "linear",
            AdaptiveType::Exponential => "exponential",
            AdaptiveType::Mack => "mack",
            AdaptiveType::Hall => "hall",
            AdaptiveType::MackNHall => "macknhall",
            AdaptiveType::DualV => "dualV",
            AdaptiveType::LePelley => "lepelley",
            AdaptiveType::DualMack => "dualmack",
            AdaptiveType::Hybrid => "hybrid",
        }
    }

    /// Rules whose alpha depends on the moving-average window.
    pub fn is_hall_family(self) -> bool {
        matches!(self, AdaptiveType::Hall | AdaptiveType::MackNHall)
    }

    pub fn default_window_size(self) -> usize {
        if self.is_hall_family() {
            3
        } else {
            10
        }
    }

    pub fn rule(self) -> StepRule {
        match self {
            AdaptiveType::Linear => linear_step,
            AdaptiveType::Exponential => exponential_step,
            AdaptiveType::Mack => mack_step,
            AdaptiveType::Hall => hall_step,
            AdaptiveType::MackNHall => macknhall_step,
            AdaptiveType::DualV => dual_v_step,
            AdaptiveType::LePelley => lepelley_step,
            AdaptiveType::DualMack => dualmack_step,
            AdaptiveType::Hybrid => hybrid_step,
        }
    }
}

impl FromStr for AdaptiveType {
    type Err = SimError;

    fn from_str(s: &str) -> Result<Self> {
        AdaptiveType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| SimError::UnknownAdaptiveType(s.to_string()))
    }
}

impl fmt::Display for AdaptiveType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything a rule may read besides the stimulus itself.
#[derive(Debug, Clone, Copy)]
pub struct StepContext<'a> {
    pub params: &'a GroupParams,

    /// `betap` on `+` elements, `betan` on `-` elements.
    pub beta: f64,
    /// The phase asymptote on `+` elements, 0 on `-` elements.
    pub lamda: f64,
    /// `lamda` of the element processed just before this one.
    pub prev_lamda: f64,
    pub sign: i32,

    // Sums over the presented compound, observed before this element's updates.
    pub sigma: f64,
    pub sigma_e: f64,
    pub sigma_i: f64,
}

pub type StepRule = fn(&mut Individual, &StepContext<'_>);

fn mack_alpha(ind: &Individual, ctx: &StepContext<'_>) -> f64 {
    0.5 * (1.0 + 2.0 * ind.assoc - ctx.sigma)
}

// Pearce-Hall surprise, damped when the moving average is still changing.
fn hall_alpha(ind: &Individual, ctx: &StepContext<'_>) -> f64 {
    let delta = ind.delta_ma_hall.unwrap_or(DEFAULT_DELTA_MA_HALL);
    let surprise = (ctx.prev_lamda - ctx.sigma).abs();
    let window_term = 1.0 - ctx.params.xi_hall * (-delta * delta / 2.0).exp();
    let gamma = ctx.params.gamma;

    (1.0 - gamma) * ind.alpha_hall + gamma * surprise * window_term
}

fn error_correction(ind: &mut Individual, ctx: &StepContext<'_>) {
    ind.assoc += ind.alpha * ctx.beta * (ctx.prev_lamda - ctx.sigma);
}

fn linear_step(ind: &mut Individual, ctx: &StepContext<'_>) {
    ind.alpha *= 1.0 + ctx.sign as f64 * 0.05;
    error_correction(ind, ctx);
}

fn exponential_step(ind: &mut Individual, ctx: &StepContext<'_>) {
    if ctx.sign == 1 {
        ind.alpha *= ind.alpha.powf(0.05);
    }
    error_correction(ind, ctx);
}

fn mack_step(ind: &mut Individual, ctx: &StepContext<'_>) {
    ind.alpha_mack = mack_alpha(ind, ctx);
    ind.alpha = ind.alpha_mack;
    error_correction(ind, ctx);
}

fn hall_step(ind: &mut Individual, ctx: &StepContext<'_>) {
    ind.alpha_hall = hall_alpha(ind, ctx);
    ind.alpha = ind.alpha_hall;
    ind.assoc += 0.5 * ind.alpha * ctx.prev_lamda.abs();
}

fn macknhall_step(ind: &mut Individual, ctx: &StepContext<'_>) {
    ind.alpha_mack = mack_alpha(ind, ctx);
    ind.alpha_hall = hall_alpha(ind, ctx);
    ind.alpha = (1.0 - (ctx.prev_lamda - ctx.sigma).abs()) * ind.alpha_mack + ind.alpha_hall;
    error_correction(ind, ctx);
}

fn rho(ctx: &StepContext<'_>) -> f64 {
    ctx.lamda - (ctx.sigma_e - ctx.sigma_i)
}

fn dual_v_step(ind: &mut Individual, ctx: &StepContext<'_>) {
    let p = ctx.params;
    let rho = rho(ctx);

    if rho >= 0.0 {
        ind.ve += p.betap * ind.alpha * ctx.lamda;
    } else {
        ind.vi += p.betan * ind.alpha * rho.abs();
    }

    ind.alpha = p.gamma * rho.abs() + (1.0 - p.gamma) * ind.alpha;
    ind.assoc = ind.ve - ind.vi;
}

fn lepelley_step(ind: &mut Individual, ctx: &StepContext<'_>) {
    let p = ctx.params;
    let rho = rho(ctx);

    // Rest of the compound, excluding this stimulus.
    let vx_e = ctx.sigma_e - ind.ve;
    let vx_i = ctx.sigma_i - ind.vi;

    let mut dve = 0.0;
    let mut dvi = 0.0;
    if rho >= 0.0 {
        dve = ind.alpha * p.betap * (1.0 - ind.ve + ind.vi) * rho.abs();

        if rho > 0.0 {
            ind.alpha += -p.theta_e
                * ((ctx.lamda - ind.ve + ind.vi).abs() - (ctx.lamda - vx_e + vx_i).abs());
        }
    } else {
        dvi = ind.alpha * p.betan * (1.0 - ind.vi + ind.ve) * rho.abs();
        ind.alpha += -p.theta_i
            * ((rho.abs() - ind.vi + ind.ve).abs() - (rho.abs() - vx_i + vx_e).abs());
    }

    ind.alpha = ind.alpha.clamp(MIN_ALPHA, MAX_ALPHA);
    ind.ve += dve;
    ind.vi += dvi;
    ind.assoc = ind.ve - ind.vi;
}

fn dualmack_step(ind: &mut Individual, ctx: &StepContext<'_>) {
    let p = ctx.params;
    let rho = rho(ctx);

    let vx_e = ctx.sigma_e - ind.ve;
    let vx_i = ctx.sigma_i - ind.vi;

    if rho >= 0.0 {
        ind.ve += ind.alpha * p.betap * (1.0 - ind.ve + ind.vi) * rho.abs();
    } else {
        ind.vi += ind.alpha * p.betan * (1.0 - ind.vi + ind.ve) * rho.abs();
    }

    // Uses assoc from before this update.
    ind.alpha = 0.5 * (1.0 + ind.assoc - (vx_e - vx_i));
    ind.assoc = ind.ve - ind.vi;
}

fn hybrid_step(ind: &mut Individual, ctx: &StepContext<'_>) {
    let p = ctx.params;
    let rho = rho(ctx);

    let mut next_ve = ind.ve;
    let mut next_vi = ind.vi;
    if rho >= 0.0 {
        next_ve = ind.alpha_mack * ind.ve + p.betap * ind.alpha_hall * ctx.lamda;
    } else {
        next_vi = ind.alpha_mack * ind.vi + p.betan * ind.alpha_hall * rho.abs();
    }

    let vx_e = ctx.sigma_e - ind.ve;
    let vx_i = ctx.sigma_i - ind.vi;
    if rho > 0.0 {
        ind.alpha_mack += -p.theta_e
            * ((ctx.lamda - ind.ve + ind.vi).abs() - (ctx.lamda - vx_e + vx_i).abs());
    } else if rho < 0.0 {
        ind.alpha_mack += -p.theta_i
            * ((rho.abs() - ind.vi + ind.ve).abs() - (rho.abs() - vx_i + vx_e).abs());
    }

    ind.alpha_mack = ind.alpha_mack.clamp(MIN_ALPHA, MAX_ALPHA);
    ind.alpha_hall = p.gamma * rho.abs() + (1.0 - p.gamma) * ind.alpha_hall;

    ind.ve = next_ve;
    ind.vi = next_vi;
    ind.assoc = ind.ve - ind.vi;
}
