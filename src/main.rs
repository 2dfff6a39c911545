use pavlov::aggregate::HistoryFilter;
use pavlov::experiment::{
    create_group_and_phases, parse_experiment, phase_table, run_experiment, SimConfig,
};
use pavlov::experiments::paradigms;
use pavlov::prng::Prng;
use pavlov::{AdaptiveType, GroupParams, Phase};

const DEMO: &str = "\
Control  | 10A+ | 10AB+      | 5B-
Blocking | 10A+ | 10AB+/rand | 5B-
";

fn main() {
    let args: Vec<String> = std::env::args().collect();
    if args.len() >= 2 && (args[1] == "--help" || args[1] == "-h" || args[1] == "help") {
        print_help();
        return;
    }
    if args.len() >= 2 && args[1] == "paradigms" {
        if let Err(e) = paradigms::run() {
            eprintln!("paradigms failed: {e}");
            std::process::exit(1);
        }
        return;
    }

    if args.len() >= 2 {
        eprintln!("Unknown command: {}", args[1]);
        print_help();
        std::process::exit(2);
    }

    if let Err(e) = run_demo() {
        eprintln!("demo failed: {e}");
        std::process::exit(1);
    }
}

// Minimal demo:
// - one control group and one blocking group
// - the blocking group's compound phase is shuffled and averaged
// - print every trajectory of the compound phase, step by step
fn run_demo() -> pavlov::Result<()> {
    let cfg = SimConfig::default()
        .with_params(GroupParams::default().with_adaptive_type(AdaptiveType::Linear))
        .with_num_trials(100)
        .with_seed(7);
    let lines = parse_experiment(DEMO)?;

    let mut groups: Vec<(String, Vec<Phase>)> = Vec::with_capacity(lines.len());
    for line in &lines {
        let (_, phases) = create_group_and_phases(&line.name, &line.phases, &cfg)?;
        groups.push((line.name.clone(), phases));
    }

    let phase = 2;
    println!("{}", phase_table(&groups, Some(phase)));
    println!();

    let filter = HistoryFilter::default().with_phase(phase);
    let mut rng = Prng::new(cfg.seed.unwrap_or(0));
    let histories = run_experiment(&lines, &cfg, &filter, &mut rng)?;

    for phase_histories in &histories {
        for (key, history) in phase_histories {
            let assoc: Vec<String> = history.assoc().iter().map(|v| format!("{v:.3}")).collect();
            println!("{key:<16} {}", assoc.join(" "));
        }
    }

    Ok(())
}

fn print_help() {
    println!("pavlov (Rescorla-Wagner simulator with adaptive attention)");
    println!("usage:");
    println!("  cargo run");
    println!("  cargo run -- paradigms");
    println!("  cargo run -- --help");
    println!();
    println!("for experiment files use the pavlov-sim binary (pavlov_cli).");
}
