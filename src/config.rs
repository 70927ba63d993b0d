use clap::{Args, Parser, Subcommand, ValueEnum};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::models::{AlgoConfig, PatternKind, ServerConfig, SimConfig, WeightingConfig};

#[derive(Parser, Debug)]
#[command(
    name = "balancer-sim",
    version,
    about = "Discrete-time load distribution simulator"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<CommandArg>,
    #[command(flatten)]
    pub run: RunArgs,
    #[arg(short, long, global = true, help = "Log at debug level (RUST_LOG wins when set)")]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum CommandArg {
    /// Run the tick loop (default)
    Run(RunArgs),
    /// Print the effective configuration without running
    ShowConfig(RunArgs),
    ListAlgorithms,
    ListPatterns,
    /// Grow a three-server pool to eight while switching policies
    Scalability(ScalabilityArgs),
    /// Replay a script of command keys, e.g. "asr+1d"
    Commands(CommandsArgs),
}

#[derive(Args, Debug, Clone, Default)]
pub struct RunArgs {
    #[arg(long)]
    pub config: Option<PathBuf>,
    #[arg(long, value_enum)]
    pub algo: Option<AlgoArg>,
    #[arg(long, value_enum)]
    pub weighting: Option<WeightingArg>,
    #[arg(long = "server", value_name = "CAPACITY")]
    pub server: Vec<String>,
    #[arg(long, value_name = "CAPACITIES", help = "Comma-separated capacities, e.g. 100,200,50")]
    pub servers: Option<String>,
    #[arg(long)]
    pub ticks: Option<usize>,
    #[arg(long)]
    pub tick_seconds: Option<f64>,
    #[arg(long, value_enum)]
    pub pattern: Option<PatternArg>,
    #[arg(long)]
    pub base_load: Option<f64>,
    #[arg(long)]
    pub amplitude: Option<f64>,
    #[arg(long)]
    pub frequency: Option<f64>,
    #[arg(long)]
    pub seed: Option<u64>,
    #[arg(long)]
    pub no_health: bool,
    #[arg(long)]
    pub failure_probability: Option<f64>,
    #[arg(long)]
    pub recovery_probability: Option<f64>,
    #[arg(long)]
    pub rebalance_every: Option<usize>,
    #[arg(long)]
    pub random_load: Option<u64>,
    #[arg(long, help = "Pace ticks on a background scheduler at this wall-clock interval")]
    pub interval_ms: Option<u64>,
    #[arg(long, value_enum, default_value = "human")]
    pub format: FormatArg,
    #[arg(long, help = "Shorthand for --format summary")]
    pub summary: bool,
}

#[derive(Args, Debug, Clone, Default)]
pub struct ScalabilityArgs {
    #[arg(long, value_enum)]
    pub weighting: Option<WeightingArg>,
    #[arg(long, value_enum, default_value = "human")]
    pub format: FormatArg,
    #[arg(long)]
    pub summary: bool,
}

#[derive(Args, Debug, Clone, Default)]
pub struct CommandsArgs {
    pub script: String,
    #[command(flatten)]
    pub run: RunArgs,
}

#[derive(ValueEnum, Clone, Debug, PartialEq, Eq)]
pub enum AlgoArg {
    RoundRobin,
    LeastLoaded,
    WeightedOptimization,
}

impl From<AlgoArg> for AlgoConfig {
    fn from(value: AlgoArg) -> Self {
        match value {
            AlgoArg::RoundRobin => AlgoConfig::RoundRobin,
            AlgoArg::LeastLoaded => AlgoConfig::LeastLoaded,
            AlgoArg::WeightedOptimization => AlgoConfig::WeightedOptimization,
        }
    }
}

#[derive(ValueEnum, Clone, Debug, PartialEq, Eq)]
pub enum WeightingArg {
    ProportionalCapacity,
    TargetUtilization,
}

impl From<WeightingArg> for WeightingConfig {
    fn from(value: WeightingArg) -> Self {
        match value {
            WeightingArg::ProportionalCapacity => WeightingConfig::ProportionalCapacity,
            WeightingArg::TargetUtilization => WeightingConfig::TargetUtilization,
        }
    }
}

#[derive(ValueEnum, Clone, Debug, PartialEq, Eq)]
pub enum PatternArg {
    Constant,
    Random,
    SineWave,
    Spike,
    GradualIncrease,
    GradualDecrease,
    Diurnal,
    Weekly,
    Bursty,
}

impl From<PatternArg> for PatternKind {
    fn from(value: PatternArg) -> Self {
        match value {
            PatternArg::Constant => PatternKind::Constant,
            PatternArg::Random => PatternKind::Random,
            PatternArg::SineWave => PatternKind::SineWave,
            PatternArg::Spike => PatternKind::Spike,
            PatternArg::GradualIncrease => PatternKind::GradualIncrease,
            PatternArg::GradualDecrease => PatternKind::GradualDecrease,
            PatternArg::Diurnal => PatternKind::Diurnal,
            PatternArg::Weekly => PatternKind::Weekly,
            PatternArg::Bursty => PatternKind::Bursty,
        }
    }
}

#[derive(ValueEnum, Clone, Debug, Default, PartialEq, Eq)]
pub enum FormatArg {
    #[default]
    Human,
    Summary,
    Json,
}

pub fn parse_args() -> Result<Cli> {
    Cli::try_parse().map_err(|e| Error::Cli(e.to_string()))
}

pub fn build_config(args: RunArgs) -> Result<(SimConfig, FormatArg)> {
    let mut config = match &args.config {
        Some(path) => load_config(path)?,
        None => SimConfig::default(),
    };

    let mut entries = args.server.clone();
    // A blank --servers is only an error when no --server entries were given.
    if let Some(list) = &args.servers {
        if !list.trim().is_empty() {
            entries.extend(list.split(',').map(str::to_string));
        } else if entries.is_empty() {
            return Err(Error::EmptyServers);
        }
    }
    if !entries.is_empty() {
        config.servers = parse_servers(&entries)?;
    }

    if let Some(algo) = args.algo {
        config.algo = algo.into();
    }
    if let Some(weighting) = args.weighting {
        config.weighting = weighting.into();
    }
    if let Some(ticks) = args.ticks {
        config.ticks = ticks;
    }
    if let Some(tick_seconds) = args.tick_seconds {
        config.tick_seconds = tick_seconds;
    }
    if let Some(pattern) = args.pattern {
        config.pattern.kind = pattern.into();
    }
    if let Some(base) = args.base_load {
        config.pattern.base = base;
    }
    if let Some(amplitude) = args.amplitude {
        config.pattern.amplitude = amplitude;
    }
    if let Some(frequency) = args.frequency {
        config.pattern.frequency = frequency;
    }
    if args.seed.is_some() {
        config.seed = args.seed;
    }
    if args.no_health {
        config.health.enabled = false;
    }
    if let Some(probability) = args.failure_probability {
        config.health.failure_probability = probability;
    }
    if let Some(probability) = args.recovery_probability {
        config.health.recovery_probability = probability;
    }
    if args.rebalance_every.is_some() {
        config.rebalance_every = args.rebalance_every;
    }
    if let Some(amount) = args.random_load {
        config.random_load = amount;
    }
    if args.interval_ms.is_some() {
        config.interval_ms = args.interval_ms;
    }

    let format = if args.summary {
        FormatArg::Summary
    } else {
        args.format
    };
    Ok((config, format))
}

pub fn parse_servers(entries: &[String]) -> Result<Vec<ServerConfig>> {
    if entries.is_empty() {
        return Err(Error::EmptyServers);
    }
    entries
        .iter()
        .map(|entry| {
            let trimmed = entry.trim();
            if trimmed.is_empty() {
                return Err(Error::EmptyServerEntry);
            }
            let capacity: u64 = trimmed
                .parse()
                .map_err(|_| Error::InvalidCapacity(trimmed.to_string()))?;
            if capacity == 0 {
                return Err(Error::InvalidCapacityValue(trimmed.to_string()));
            }
            Ok(ServerConfig { capacity })
        })
        .collect()
}

pub fn load_config(path: &Path) -> Result<SimConfig> {
    let contents = fs::read_to_string(path).map_err(|err| {
        Error::ConfigIo(format!(
            "failed to read config '{}': {}",
            path.display(),
            err
        ))
    })?;
    let ext = path
        .extension()
        .and_then(|value| value.to_str())
        .unwrap_or("");

    match ext {
        "toml" => toml::from_str(&contents)
            .map_err(|err| Error::ConfigParse(format!("failed to parse TOML: {}", err))),
        "json" => serde_json::from_str(&contents)
            .map_err(|err| Error::ConfigParse(format!("failed to parse JSON: {}", err))),
        "" => Err(Error::UnsupportedConfigFormat("unknown".to_string())),
        _ => Err(Error::UnsupportedConfigFormat(ext.to_string())),
    }
}
