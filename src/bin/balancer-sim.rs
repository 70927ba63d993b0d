use balancer_sim::balancer::{CommandOutcome, LoadBalancer};
use balancer_sim::commands::parse_commands;
use balancer_sim::config::{self, CommandArg, CommandsArgs, FormatArg, RunArgs, ScalabilityArgs};
use balancer_sim::engine;
use balancer_sim::error::Result;
use balancer_sim::models::{AlgoConfig, PatternKind, SimConfig};
use balancer_sim::output::{self, Formatter, HumanFormatter, JsonFormatter, SummaryFormatter};
use tracing_subscriber::EnvFilter;

fn main() {
    if let Err(err) = run() {
        eprintln!("Error: {}", err);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = config::parse_args()?;
    init_tracing(cli.verbose);

    match cli.command.unwrap_or(CommandArg::Run(cli.run)) {
        CommandArg::Run(args) => run_simulation(args),
        CommandArg::ShowConfig(args) => {
            let (config, _) = config::build_config(args)?;
            engine::validate_config(&config)?;
            print!("{}", output::format_config(&config));
            Ok(())
        }
        CommandArg::ListAlgorithms => {
            for algo in AlgoConfig::ALL {
                println!("{}", algo);
            }
            Ok(())
        }
        CommandArg::ListPatterns => {
            for kind in PatternKind::ALL {
                println!("{}", kind);
            }
            Ok(())
        }
        CommandArg::Scalability(args) => run_scalability(args),
        CommandArg::Commands(args) => replay(args),
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run_simulation(args: RunArgs) -> Result<()> {
    let (config, format) = config::build_config(args)?;
    let result = engine::run_simulation(&config)?;
    print!("{}", formatter_for(&format).write(&result));
    Ok(())
}

fn run_scalability(args: ScalabilityArgs) -> Result<()> {
    let mut config = SimConfig::default();
    if let Some(weighting) = args.weighting {
        config.weighting = weighting.into();
    }
    let format = if args.summary {
        FormatArg::Summary
    } else {
        args.format
    };
    let report = engine::run_scalability(&config);
    print!("{}", formatter_for(&format).write_scalability(&report));
    Ok(())
}

fn replay(args: CommandsArgs) -> Result<()> {
    let commands = parse_commands(&args.script)?;
    let (config, _) = config::build_config(args.run)?;
    engine::validate_config(&config)?;

    let mut balancer = LoadBalancer::from_config(&config);
    for (step, command) in commands.into_iter().enumerate() {
        balancer.advance_clock(step as f64);
        println!("> {}", command.key());
        match balancer.execute(command) {
            Ok(outcome) => {
                print!("{}", output::format_outcome(&outcome, balancer.algorithm()));
                if outcome == CommandOutcome::Quit {
                    break;
                }
            }
            Err(err) => println!("Error: {}", err),
        }
    }
    print!("{}", balancer.system_status());
    Ok(())
}

fn formatter_for(format: &FormatArg) -> Box<dyn Formatter> {
    match format {
        FormatArg::Human => Box::new(HumanFormatter),
        FormatArg::Summary => Box::new(SummaryFormatter),
        FormatArg::Json => Box::new(JsonFormatter),
    }
}
