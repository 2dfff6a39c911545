use crate::adaptive::AdaptiveType;
use crate::aggregate::{HistoryFilter, PhaseHistories};
use crate::error::{Result, SimError};
use crate::experiment::{parse_experiment, run_experiment, SimConfig};
use crate::group::GroupParams;
use crate::prng::Prng;

/// A textbook design: a `Target` group, usually a `Control` group, and the
/// cue whose final strength tells the two apart.
#[derive(Debug, Clone, Copy)]
pub struct Paradigm {
    pub name: &'static str,
    pub experiment: &'static str,
    pub probe: &'static str,
}

pub const PARADIGMS: [Paradigm; 5] = [
    Paradigm {
        name: "acquisition",
        experiment: "Target|20A+",
        probe: "A",
    },
    Paradigm {
        name: "extinction",
        experiment: "Target|20A+|20A-\nControl|20A+|20B-",
        probe: "A",
    },
    Paradigm {
        name: "blocking",
        experiment: "Target|20A+|10AB+\nControl|20C+|10AB+",
        probe: "B",
    },
    Paradigm {
        name: "overshadowing",
        experiment: "Target|10AB+\nControl|10B+",
        probe: "B",
    },
    Paradigm {
        name: "conditioned_inhibition",
        experiment: "Target|20A+|10A+/10AX-/rand\nControl|20A+|10A+/10X-/rand",
        probe: "X",
    },
];

#[derive(Debug, Clone)]
pub struct ParadigmResult {
    pub paradigm: &'static str,
    pub adaptive_type: AdaptiveType,
    pub target: f64,
    pub control: Option<f64>,
}

/// Runs `paradigm` under `adaptive_type` with otherwise default parameters.
pub fn evaluate(
    paradigm: &Paradigm,
    adaptive_type: AdaptiveType,
    seed: u64,
    num_trials: usize,
) -> Result<ParadigmResult> {
    let cfg = SimConfig::default()
        .with_params(GroupParams::default().with_adaptive_type(adaptive_type))
        .with_num_trials(num_trials)
        .with_seed(seed);
    let lines = parse_experiment(paradigm.experiment)?;

    let mut rng = Prng::new(seed);
    let histories = run_experiment(&lines, &cfg, &HistoryFilter::default(), &mut rng)?;

    let target = final_strength(&histories, &format!("Target - {}", paradigm.probe))?;
    let control = if lines.iter().any(|l| l.name == "Control") {
        Some(final_strength(
            &histories,
            &format!("Control - {}", paradigm.probe),
        )?)
    } else {
        None
    };

    Ok(ParadigmResult {
        paradigm: paradigm.name,
        adaptive_type,
        target,
        control,
    })
}

/// `assoc` at the end of the last phase in which `key` was presented.
fn final_strength(histories: &[PhaseHistories], key: &str) -> Result<f64> {
    histories
        .iter()
        .rev()
        .find_map(|phase| phase.get(key).and_then(|h| h.last()))
        .map(|ind| ind.assoc)
        .ok_or_else(|| SimError::Shape(format!("no history recorded for `{key}`")))
}

pub fn run() -> Result<()> {
    let seed = 1u64;
    let num_trials = 200;

    let mut results = Vec::with_capacity(PARADIGMS.len() * AdaptiveType::ALL.len());
    for paradigm in &PARADIGMS {
        for adaptive_type in AdaptiveType::ALL {
            results.push(evaluate(paradigm, adaptive_type, seed, num_trials)?);
        }
    }

    print_report(seed, num_trials, &results);
    Ok(())
}

fn print_report(seed: u64, num_trials: usize, results: &[ParadigmResult]) {
    println!("pavlov paradigms");
    println!("seed={seed}");
    println!("num_trials={num_trials}");
    println!();
    println!(
        "{:<24} {:<12} {:>9} {:>9}",
        "paradigm", "type", "target", "control"
    );
    for r in results {
        let control = r
            .control
            .map(|c| format!("{c:+.4}"))
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<24} {:<12} {:>+9.4} {:>9}",
            r.paradigm,
            r.adaptive_type.as_str(),
            r.target,
            control
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paradigm(name: &str) -> Paradigm {
        *PARADIGMS.iter().find(|p| p.name == name).unwrap()
    }

    #[test]
    fn every_paradigm_runs_under_every_rule() {
        for p in &PARADIGMS {
            for t in AdaptiveType::ALL {
                let r = evaluate(p, t, 3, 5).unwrap();
                assert!(r.target.is_finite(), "{} / {t}", p.name);
                assert_eq!(r.control.is_some(), p.experiment.contains("Control"));
            }
        }
    }

    #[test]
    fn acquisition_is_excitatory() {
        for t in AdaptiveType::ALL {
            let r = evaluate(&paradigm("acquisition"), t, 1, 1).unwrap();
            assert!(r.target > 0.0, "{t}: {}", r.target);
        }
    }

    #[test]
    fn linear_blocking_and_overshadowing() {
        let blocking = evaluate(&paradigm("blocking"), AdaptiveType::Linear, 1, 1).unwrap();
        assert!(blocking.target < blocking.control.unwrap());

        let overshadowing =
            evaluate(&paradigm("overshadowing"), AdaptiveType::Linear, 1, 1).unwrap();
        assert!(overshadowing.target < overshadowing.control.unwrap());
    }

    #[test]
    fn linear_extinction_lowers_strength() {
        let r = evaluate(&paradigm("extinction"), AdaptiveType::Linear, 1, 1).unwrap();
        assert!(r.target < r.control.unwrap());
    }

    #[test]
    fn dual_v_conditioned_inhibitor_goes_negative() {
        let inhibition = paradigm("conditioned_inhibition");
        let r = evaluate(&inhibition, AdaptiveType::DualV, 1, 50).unwrap();
        assert!(r.target < 0.0, "{}", r.target);
    }
}
