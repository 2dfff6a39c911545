//! Hand-rolled command-line parsing.
//!
//! Every `--flag value` may also be written `--flag=value`. Per-stimulus
//! alphas are given as `--alpha-A=0.3` or `--alpha_A 0.3`. The list flags
//! (`--plot-experiments`, `--plot-stimuli`) take every following argument up to
//! the next `--flag`.

use std::path::PathBuf;

use pavlov::aggregate::HistoryFilter;
use pavlov::experiment::SimConfig;
use pavlov::AdaptiveType;

use crate::error::CliError;

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Help,
    Run(CliArgs),
}

/// One command-line override, applied on top of the JSON config (if any).
#[derive(Debug, Clone, PartialEq)]
pub enum Setting {
    Alpha(String, f64),
    DefaultAlpha(f64),
    Beta(f64),
    BetaNeg(f64),
    Lamda(f64),
    Gamma(f64),
    ThetaE(f64),
    ThetaI(f64),
    XiHall(f64),
    UseConfigurals(bool),
    AdaptiveType(AdaptiveType),
    WindowSize(usize),
    NumTrials(usize),
    Seed(u64),
}

impl Setting {
    pub fn apply(&self, cfg: &mut SimConfig) {
        let p = &mut cfg.params;
        match self {
            Setting::Alpha(stimulus, v) => {
                cfg.alphas.insert(stimulus.clone(), *v);
            }
            Setting::DefaultAlpha(v) => cfg.default_alpha = *v,
            Setting::Beta(v) => p.betap = *v,
            Setting::BetaNeg(v) => p.betan = *v,
            Setting::Lamda(v) => p.lamda = *v,
            Setting::Gamma(v) => p.gamma = *v,
            Setting::ThetaE(v) => p.theta_e = *v,
            Setting::ThetaI(v) => p.theta_i = *v,
            Setting::XiHall(v) => p.xi_hall = *v,
            Setting::UseConfigurals(v) => p.use_configurals = *v,
            Setting::AdaptiveType(t) => p.adaptive_type = *t,
            Setting::WindowSize(n) => p.window_size = Some(*n),
            Setting::NumTrials(n) => cfg.num_trials = *n,
            Setting::Seed(s) => cfg.seed = Some(*s),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CliArgs {
    pub config: Option<PathBuf>,
    pub settings: Vec<Setting>,
    pub filter: HistoryFilter,
    /// `None` or `-` reads the experiment from stdin.
    pub experiment_file: Option<PathBuf>,
    /// `None` writes the JSON result to stdout.
    pub output: Option<PathBuf>,
}

impl CliArgs {
    pub fn sim_config(&self, mut base: SimConfig) -> SimConfig {
        for setting in &self.settings {
            setting.apply(&mut base);
        }
        base
    }

    pub fn reads_stdin(&self) -> bool {
        self.experiment_file
            .as_ref()
            .map_or(true, |p| p.as_os_str() == "-")
    }
}

struct Cursor {
    args: Vec<String>,
    pos: usize,
}

impl Cursor {
    fn next(&mut self) -> Option<String> {
        let arg = self.args.get(self.pos).cloned();
        self.pos += 1;
        arg
    }

    fn value(&mut self, flag: &str, inline: Option<&str>) -> Result<String, CliError> {
        match inline {
            Some(v) => Ok(v.to_string()),
            None => self
                .next()
                .ok_or_else(|| CliError::usage(format!("{flag} expects a value"))),
        }
    }

    fn list(&mut self, inline: Option<&str>) -> Vec<String> {
        let mut out: Vec<String> = inline.map(str::to_string).into_iter().collect();
        while let Some(arg) = self.args.get(self.pos) {
            if arg.starts_with("--") {
                break;
            }
            out.push(arg.clone());
            self.pos += 1;
        }
        out
    }
}

fn number<T: std::str::FromStr>(flag: &str, v: &str) -> Result<T, CliError> {
    v.trim()
        .parse()
        .map_err(|_| CliError::usage(format!("{flag} expects a number, got `{v}`")))
}

fn alpha_stimulus(flag: &str) -> Option<&str> {
    let stimulus = flag
        .strip_prefix("--alpha-")
        .or_else(|| flag.strip_prefix("--alpha_"))?;
    (!stimulus.is_empty() && stimulus.chars().all(|c| c.is_ascii_uppercase())).then_some(stimulus)
}

pub fn parse<I>(args: I) -> Result<Command, CliError>
where
    I: IntoIterator<Item = String>,
{
    let mut cursor = Cursor {
        args: args.into_iter().collect(),
        pos: 0,
    };
    let mut out = CliArgs::default();

    while let Some(arg) = cursor.next() {
        if arg == "-h" || arg == "--help" {
            return Ok(Command::Help);
        }
        if arg == "-" || !arg.starts_with("--") {
            if out.experiment_file.is_some() {
                return Err(CliError::usage(format!("unexpected argument `{arg}`")));
            }
            out.experiment_file = Some(PathBuf::from(arg));
            continue;
        }

        let (flag, inline) = match arg.split_once('=') {
            Some((f, v)) => (f, Some(v)),
            None => (arg.as_str(), None),
        };

        if let Some(stimulus) = alpha_stimulus(flag) {
            let v = number(flag, &cursor.value(flag, inline)?)?;
            out.settings.push(Setting::Alpha(stimulus.to_string(), v));
            continue;
        }

        let setting = match flag {
            "--alpha" => Setting::DefaultAlpha(number(flag, &cursor.value(flag, inline)?)?),
            "--beta" => Setting::Beta(number(flag, &cursor.value(flag, inline)?)?),
            "--beta-neg" => Setting::BetaNeg(number(flag, &cursor.value(flag, inline)?)?),
            "--lamda" | "--lambda" => Setting::Lamda(number(flag, &cursor.value(flag, inline)?)?),
            "--gamma" => Setting::Gamma(number(flag, &cursor.value(flag, inline)?)?),
            "--thetaE" => Setting::ThetaE(number(flag, &cursor.value(flag, inline)?)?),
            "--thetaI" => Setting::ThetaI(number(flag, &cursor.value(flag, inline)?)?),
            "--xi-hall" => Setting::XiHall(number(flag, &cursor.value(flag, inline)?)?),
            "--window-size" => Setting::WindowSize(number(flag, &cursor.value(flag, inline)?)?),
            "--num-trials" => Setting::NumTrials(number(flag, &cursor.value(flag, inline)?)?),
            "--seed" => Setting::Seed(number(flag, &cursor.value(flag, inline)?)?),
            "--adaptive-type" => {
                Setting::AdaptiveType(cursor.value(flag, inline)?.trim().parse()?)
            }
            "--use-configurals" | "--no-use-configurals" => {
                if inline.is_some() {
                    return Err(CliError::usage(format!("{flag} takes no value")));
                }
                Setting::UseConfigurals(flag == "--use-configurals")
            }
            "--config" => {
                out.config = Some(PathBuf::from(cursor.value(flag, inline)?));
                continue;
            }
            "--output" => {
                out.output = Some(PathBuf::from(cursor.value(flag, inline)?));
                continue;
            }
            "--plot-phase" => {
                out.filter.phase = Some(number(flag, &cursor.value(flag, inline)?)?);
                continue;
            }
            "--plot-experiments" => {
                out.filter.groups = Some(cursor.list(inline));
                continue;
            }
            "--plot-stimuli" => {
                out.filter.stimuli = Some(cursor.list(inline));
                continue;
            }
            _ => return Err(CliError::usage(format!("option not understood: {arg}"))),
        };
        out.settings.push(setting);
    }

    Ok(Command::Run(out))
}

pub fn usage() -> &'static str {
    "\
pavlov-sim (runs a group-line experiment file and writes JSON histories)
Usage: pavlov-sim [options] [experiment_file|-]

Model:
  --alpha V                 alpha of stimuli without an explicit value (0.1)
  --alpha-X V | --alpha_X V alpha of stimulus X
  --beta V                  US salience on reinforced trials (0.3)
  --beta-neg V              US salience on non-reinforced trials (0.2)
  --lamda V                 asymptote of learning (1)
  --gamma V                 weight of the latest error in smoothed alphas (0.5)
  --thetaE V | --thetaI V   LePelley excitatory / inhibitory thetas (0.3 / 0.1)
  --xi-hall V               xi of the Hall alpha (0.2)
  --window-size N           moving-average window (3 for hall types, else 10)
  --adaptive-type T         linear exponential mack hall macknhall dualV
                            lepelley dualmack hybrid (dualV)
  --[no-]use-configurals    track compounds as their own stimuli
  --num-trials N            repetitions of randomized phases (1000)
  --seed N                  fixed seed for randomized phases
  --config FILE             JSON config; flags override it

Output:
  --plot-phase N            keep only phase N
  --plot-experiments G...   keep only these groups
  --plot-stimuli S...       keep only these stimuli (A, AB, c(AB), ...)
  --output FILE             write JSON here instead of stdout

Logging goes to stderr and is controlled with RUST_LOG."
}
