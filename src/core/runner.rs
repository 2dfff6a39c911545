//! Runs a group's phase list, averaging randomized phases over many shuffles.

use crate::error::{Result, SimError};
use crate::group::Group;
use crate::phase::Phase;
use crate::prng::RandomSource;
use crate::strengths::Strengths;

/// Runs every phase of `phases` on `group`, in order.
///
/// Returns, per phase, one `Strengths` per step index. State carries over from
/// one phase to the next. A phase flagged `rand` is run `num_trials` times from
/// the same starting state with independently shuffled element order; its
/// trajectory is the step-wise mean of all repetitions and the group continues
/// from the mean of their ending states.
pub fn run_group_experiments<R: RandomSource>(
    group: &mut Group,
    phases: &[Phase],
    num_trials: usize,
    rng: &mut R,
) -> Result<Vec<Vec<Strengths>>> {
    let mut results = Vec::with_capacity(phases.len());

    for (i, phase) in phases.iter().enumerate() {
        tracing::debug!(
            group = group.name(),
            phase = i + 1,
            elements = phase.len(),
            rand = phase.rand,
            "running phase"
        );

        let steps = if phase.rand {
            run_randomized(group, phase, num_trials, rng)?
        } else {
            group.run_phase(&phase.elems, phase.lamda)?
        };
        results.push(steps);
    }

    Ok(results)
}

fn run_randomized<R: RandomSource>(
    group: &mut Group,
    phase: &Phase,
    num_trials: usize,
    rng: &mut R,
) -> Result<Vec<Strengths>> {
    if num_trials == 0 {
        return Err(SimError::InvalidParameter(
            "num_trials must be at least 1 for randomized phases".into(),
        ));
    }

    let initial = group.strengths().clone();
    let initial_prev_lamda = group.prev_lamda();

    let mut elems = phase.elems.clone();
    let mut trajectories: Vec<Vec<Strengths>> = Vec::with_capacity(num_trials);
    let mut finals: Vec<Strengths> = Vec::with_capacity(num_trials);
    let mut prev_lamda_sum = 0.0;

    for _ in 0..num_trials {
        rng.shuffle(&mut elems);

        group.restore(initial.clone(), initial_prev_lamda);
        trajectories.push(group.run_phase(&elems, phase.lamda)?);
        finals.push(group.strengths().clone());
        prev_lamda_sum += group.prev_lamda();
    }

    tracing::trace!(
        group = group.name(),
        repetitions = num_trials,
        "averaging randomized phase"
    );

    let longest = trajectories.iter().map(Vec::len).max().unwrap_or(0);
    let mean_trajectory = (0..longest)
        .map(|x| {
            let at: Vec<Strengths> = trajectories
                .iter()
                .filter_map(|t| t.get(x).cloned())
                .collect();
            Strengths::avg(&at)
        })
        .collect::<Result<Vec<_>>>()?;

    group.restore(
        Strengths::avg(&finals)?,
        prev_lamda_sum / num_trials as f64,
    );

    Ok(mean_trajectory)
}
