use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct SimConfig {
    #[serde(default = "default_servers")]
    pub servers: Vec<ServerConfig>,
    #[serde(default)]
    pub algo: AlgoConfig,
    #[serde(default)]
    pub weighting: WeightingConfig,
    #[serde(default)]
    pub pattern: PatternConfig,
    #[serde(default)]
    pub health: HealthConfig,
    #[serde(default = "default_ticks")]
    pub ticks: usize,
    #[serde(default = "default_tick_seconds")]
    pub tick_seconds: f64,
    #[serde(default)]
    pub rebalance_every: Option<usize>,
    #[serde(default = "default_random_load")]
    pub random_load: u64,
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default)]
    pub interval_ms: Option<u64>,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            servers: default_servers(),
            algo: AlgoConfig::default(),
            weighting: WeightingConfig::default(),
            pattern: PatternConfig::default(),
            health: HealthConfig::default(),
            ticks: default_ticks(),
            tick_seconds: default_tick_seconds(),
            rebalance_every: None,
            random_load: default_random_load(),
            seed: None,
            interval_ms: None,
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct ServerConfig {
    pub capacity: u64,
}

#[derive(Clone, Copy, Debug, Deserialize, Serialize, Default, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum AlgoConfig {
    #[default]
    RoundRobin,
    LeastLoaded,
    WeightedOptimization,
}

impl AlgoConfig {
    pub const ALL: [AlgoConfig; 3] = [
        AlgoConfig::RoundRobin,
        AlgoConfig::LeastLoaded,
        AlgoConfig::WeightedOptimization,
    ];

    pub fn name(self) -> &'static str {
        match self {
            AlgoConfig::RoundRobin => "Round Robin",
            AlgoConfig::LeastLoaded => "Least Loaded",
            AlgoConfig::WeightedOptimization => "Weighted Optimization",
        }
    }

    pub fn next(self) -> Self {
        match self {
            AlgoConfig::RoundRobin => AlgoConfig::LeastLoaded,
            AlgoConfig::LeastLoaded => AlgoConfig::WeightedOptimization,
            AlgoConfig::WeightedOptimization => AlgoConfig::RoundRobin,
        }
    }
}

impl fmt::Display for AlgoConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            AlgoConfig::RoundRobin => "round-robin",
            AlgoConfig::LeastLoaded => "least-loaded",
            AlgoConfig::WeightedOptimization => "weighted-optimization",
        };
        write!(f, "{}", label)
    }
}

#[derive(Clone, Copy, Debug, Deserialize, Serialize, Default, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum WeightingConfig {
    #[default]
    ProportionalCapacity,
    TargetUtilization,
}

impl fmt::Display for WeightingConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WeightingConfig::ProportionalCapacity => write!(f, "proportional-capacity"),
            WeightingConfig::TargetUtilization => write!(f, "target-utilization"),
        }
    }
}

#[derive(Clone, Copy, Debug, Deserialize, Serialize, Default, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum PatternKind {
    #[default]
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

impl PatternKind {
    pub const ALL: [PatternKind; 9] = [
        PatternKind::Constant,
        PatternKind::Random,
        PatternKind::SineWave,
        PatternKind::Spike,
        PatternKind::GradualIncrease,
        PatternKind::GradualDecrease,
        PatternKind::Diurnal,
        PatternKind::Weekly,
        PatternKind::Bursty,
    ];
}

impl fmt::Display for PatternKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            PatternKind::Constant => "constant",
            PatternKind::Random => "random",
            PatternKind::SineWave => "sine-wave",
            PatternKind::Spike => "spike",
            PatternKind::GradualIncrease => "gradual-increase",
            PatternKind::GradualDecrease => "gradual-decrease",
            PatternKind::Diurnal => "diurnal",
            PatternKind::Weekly => "weekly",
            PatternKind::Bursty => "bursty",
        };
        write!(f, "{}", label)
    }
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct PatternConfig {
    #[serde(default)]
    pub kind: PatternKind,
    #[serde(default = "default_base_load")]
    pub base: f64,
    #[serde(default = "default_amplitude")]
    pub amplitude: f64,
    #[serde(default = "default_frequency")]
    pub frequency: f64,
    #[serde(default = "default_peak_hour")]
    pub peak_hour: u32,
    #[serde(default = "default_low_hour")]
    pub low_hour: u32,
    #[serde(default = "default_weekend_factor")]
    pub weekend_factor: f64,
    #[serde(default = "default_burst_probability")]
    pub burst_probability: f64,
    #[serde(default = "default_burst_multiplier")]
    pub burst_multiplier: f64,
    #[serde(default = "default_spike_every")]
    pub spike_every_secs: f64,
    #[serde(default = "default_spike_width")]
    pub spike_width_secs: f64,
    #[serde(default = "default_spike_multiplier")]
    pub spike_multiplier: f64,
}

impl Default for PatternConfig {
    fn default() -> Self {
        Self {
            kind: PatternKind::default(),
            base: default_base_load(),
            amplitude: default_amplitude(),
            frequency: default_frequency(),
            peak_hour: default_peak_hour(),
            low_hour: default_low_hour(),
            weekend_factor: default_weekend_factor(),
            burst_probability: default_burst_probability(),
            burst_multiplier: default_burst_multiplier(),
            spike_every_secs: default_spike_every(),
            spike_width_secs: default_spike_width(),
            spike_multiplier: default_spike_multiplier(),
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct HealthConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_failure_probability")]
    pub failure_probability: f64,
    #[serde(default = "default_recovery_probability")]
    pub recovery_probability: f64,
    #[serde(default = "default_min_dwell")]
    pub min_dwell_secs: f64,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            failure_probability: default_failure_probability(),
            recovery_probability: default_recovery_probability(),
            min_dwell_secs: default_min_dwell(),
        }
    }
}

fn default_servers() -> Vec<ServerConfig> {
    vec![ServerConfig { capacity: 100 }; 3]
}

fn default_ticks() -> usize {
    20
}

fn default_tick_seconds() -> f64 {
    1.0
}

fn default_random_load() -> u64 {
    10
}

fn default_base_load() -> f64 {
    20.0
}

fn default_amplitude() -> f64 {
    10.0
}

fn default_frequency() -> f64 {
    0.1
}

fn default_peak_hour() -> u32 {
    14
}

fn default_low_hour() -> u32 {
    3
}

fn default_weekend_factor() -> f64 {
    0.5
}

fn default_burst_probability() -> f64 {
    0.1
}

fn default_burst_multiplier() -> f64 {
    5.0
}

fn default_spike_every() -> f64 {
    10.0
}

fn default_spike_width() -> f64 {
    1.0
}

fn default_spike_multiplier() -> f64 {
    3.0
}

fn default_true() -> bool {
    true
}

fn default_failure_probability() -> f64 {
    0.01
}

fn default_recovery_probability() -> f64 {
    0.2
}

fn default_min_dwell() -> f64 {
    5.0
}
