use parking_lot::Mutex;
use serde::Serialize;
use std::sync::mpsc;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::balancer::{LoadBalancer, SystemStatus, DEFAULT_CAPACITY};
use crate::error::{Error, Result};
use crate::health::HealthEvent;
use crate::metrics::{AlgorithmSummary, MetricsRecorder};
use crate::models::{AlgoConfig, PatternKind, SimConfig};
use crate::pattern::{LoadPatternGenerator, MAX_LOAD_PER_TICK};
use crate::schedule::start_scheduled;
use crate::server::RegistrySnapshot;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RunMetadata {
    pub algo: String,
    pub weighting: String,
    pub pattern: String,
    pub ticks: usize,
    pub tick_seconds: f64,
    pub seed: u64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TickRecord {
    pub tick: usize,
    pub time_secs: f64,
    pub load: u64,
    pub distributed: u64,
    pub undistributed: u64,
    pub health_events: Vec<HealthEvent>,
    pub rebalanced: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Totals {
    pub requested: u64,
    pub distributed: u64,
    pub undistributed: u64,
    pub health_transitions: usize,
    pub rebalances: usize,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SimulationResult {
    pub metadata: RunMetadata,
    pub ticks: Vec<TickRecord>,
    pub final_state: RegistrySnapshot,
    pub final_algorithm: String,
    pub totals: Totals,
    pub algorithm_summary: Vec<AlgorithmSummary>,
}

pub struct SimulationEngine {
    config: SimConfig,
    balancer: LoadBalancer,
    generator: LoadPatternGenerator,
    recorder: MetricsRecorder,
}

impl SimulationEngine {
    pub fn new(config: SimConfig) -> Self {
        let recorder = MetricsRecorder::new();
        let balancer =
            LoadBalancer::from_config(&config).with_metrics(Box::new(recorder.clone()));
        let generator = LoadPatternGenerator::from_config(
            &config.pattern,
            config.tick_seconds,
            config.seed.unwrap_or(0),
        );
        Self {
            config,
            balancer,
            generator,
            recorder,
        }
    }

    pub fn balancer(&self) -> &LoadBalancer {
        &self.balancer
    }

    pub fn run(&mut self) -> Result<SimulationResult> {
        validate_config(&self.config)?;
        info!(
            algorithm = %self.config.algo,
            pattern = %self.config.pattern.kind,
            ticks = self.config.ticks,
            "simulation started"
        );

        let mut ticks = Vec::with_capacity(self.config.ticks);
        for tick in 0..self.config.ticks {
            let load = self.generator.generate_next();
            ticks.push(advance(&mut self.balancer, &self.config, tick, load));
        }
        Ok(collect_result(
            &self.config,
            &self.balancer,
            &self.recorder,
            ticks,
        ))
    }
}

pub fn run_simulation(config: &SimConfig) -> Result<SimulationResult> {
    match config.interval_ms {
        Some(interval_ms) => run_scheduled(config, Duration::from_millis(interval_ms)),
        None => SimulationEngine::new(config.clone()).run(),
    }
}

pub fn run_scheduled(config: &SimConfig, interval: Duration) -> Result<SimulationResult> {
    validate_config(config)?;
    let recorder = MetricsRecorder::new();
    let balancer = LoadBalancer::from_config(config)
        .with_metrics(Box::new(recorder.clone()))
        .into_shared();
    let generator = Arc::new(Mutex::new(LoadPatternGenerator::from_config(
        &config.pattern,
        config.tick_seconds,
        config.seed.unwrap_or(0),
    )));

    let (tick_tx, tick_rx) = mpsc::channel();
    let handle = {
        let balancer = Arc::clone(&balancer);
        let config = config.clone();
        let mut tick = 0usize;
        start_scheduled(generator, interval, None, move |load| {
            if tick >= config.ticks {
                return;
            }
            let record = advance(&mut balancer.lock(), &config, tick, load);
            tick += 1;
            // The receiver hangs up once it has every tick.
            let _ = tick_tx.send(record);
        })
    };

    let ticks: Vec<TickRecord> = tick_rx.iter().take(config.ticks).collect();
    let emitted = handle.stop();
    debug!(emitted, "scheduled run stopped");

    let balancer = balancer.lock();
    Ok(collect_result(config, &balancer, &recorder, ticks))
}

fn advance(balancer: &mut LoadBalancer, config: &SimConfig, tick: usize, load: u64) -> TickRecord {
    let time_secs = tick as f64 * config.tick_seconds;
    let allocation = balancer.add_system_load(load);
    let health_events = balancer.advance_health(time_secs + config.tick_seconds);

    let rebalanced = match config.rebalance_every {
        Some(every) if every > 0 && (tick + 1) % every == 0 => {
            balancer.rebalance();
            true
        }
        _ => false,
    };

    TickRecord {
        tick: tick + 1,
        time_secs,
        load,
        distributed: allocation.distributed(),
        undistributed: allocation.undistributed,
        health_events,
        rebalanced,
    }
}

fn collect_result(
    config: &SimConfig,
    balancer: &LoadBalancer,
    recorder: &MetricsRecorder,
    ticks: Vec<TickRecord>,
) -> SimulationResult {
    let totals = ticks.iter().fold(Totals::default(), |mut totals, record| {
        totals.requested = totals.requested.saturating_add(record.load);
        totals.distributed = totals.distributed.saturating_add(record.distributed);
        totals.undistributed = totals.undistributed.saturating_add(record.undistributed);
        totals.health_transitions += record.health_events.len();
        totals.rebalances += usize::from(record.rebalanced);
        totals
    });

    SimulationResult {
        metadata: RunMetadata {
            algo: config.algo.to_string(),
            weighting: config.weighting.to_string(),
            pattern: config.pattern.kind.to_string(),
            ticks: config.ticks,
            tick_seconds: config.tick_seconds,
            seed: config.seed.unwrap_or(0),
        },
        ticks,
        final_state: balancer.snapshot(),
        final_algorithm: balancer.algorithm().name().to_string(),
        totals,
        algorithm_summary: recorder.summary_by_algorithm(),
    }
}

pub fn validate_config(config: &SimConfig) -> Result<()> {
    if config.servers.is_empty() {
        return Err(Error::EmptyServers);
    }
    for (idx, server) in config.servers.iter().enumerate() {
        if server.capacity == 0 {
            return Err(Error::InvalidCapacityValue(format!("server #{}", idx + 1)));
        }
    }
    if config.ticks == 0 {
        return Err(Error::TicksZero);
    }
    if !(config.tick_seconds.is_finite() && config.tick_seconds > 0.0) {
        return Err(Error::InvalidTickSeconds(config.tick_seconds));
    }
    if config.random_load == 0 {
        return Err(Error::RandomLoadZero);
    }

    check_probability("failure probability", config.health.failure_probability)?;
    check_probability("recovery probability", config.health.recovery_probability)?;
    check_probability("burst probability", config.pattern.burst_probability)?;

    let pattern = &config.pattern;
    for (name, value) in [
        ("base", pattern.base),
        ("amplitude", pattern.amplitude),
        ("weekend factor", pattern.weekend_factor),
        ("burst multiplier", pattern.burst_multiplier),
        ("spike multiplier", pattern.spike_multiplier),
        ("spike width", pattern.spike_width_secs),
    ] {
        if !(value.is_finite() && value >= 0.0) {
            return Err(Error::InvalidPatternParameter(format!(
                "{} must be >= 0 (got {})",
                name, value
            )));
        }
    }
    for (name, value) in [("base", pattern.base), ("amplitude", pattern.amplitude)] {
        if value > MAX_LOAD_PER_TICK as f64 {
            return Err(Error::InvalidPatternParameter(format!(
                "{} must be <= {} (got {})",
                name, MAX_LOAD_PER_TICK, value
            )));
        }
    }
    if pattern.kind == PatternKind::Spike && pattern.spike_every_secs <= 0.0 {
        return Err(Error::InvalidPatternParameter(format!(
            "spike interval must be > 0 (got {})",
            pattern.spike_every_secs
        )));
    }
    if pattern.peak_hour > 23 || pattern.low_hour > 23 {
        return Err(Error::InvalidPatternParameter(format!(
            "hours must be within 0..=23 (got peak {}, low {})",
            pattern.peak_hour, pattern.low_hour
        )));
    }

    Ok(())
}

fn check_probability(name: &'static str, value: f64) -> Result<()> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(Error::InvalidProbability { name, value })
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ScalabilityRound {
    pub round: usize,
    pub time_secs: f64,
    pub servers: usize,
    pub algorithm: String,
    pub total_load: u64,
    pub total_capacity: u64,
    pub utilization_pct: f64,
    pub load_variance: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ScalabilityReport {
    pub initial_load: u64,
    pub initial_capacity: u64,
    pub rounds: Vec<ScalabilityRound>,
    pub final_state: RegistrySnapshot,
    pub status: SystemStatus,
}

const SCALE_START_SERVERS: usize = 3;
const SCALE_WARMUP_LOADS: usize = 5;
const SCALE_WARMUP_AMOUNT: u64 = 20;
const SCALE_ROUNDS: usize = 5;
const SCALE_ROUND_AMOUNT: u64 = 30;

pub fn run_scalability(config: &SimConfig) -> ScalabilityReport {
    let mut balancer = LoadBalancer::new(AlgoConfig::RoundRobin, config.weighting);
    for _ in 0..SCALE_START_SERVERS {
        balancer.add_server(DEFAULT_CAPACITY);
    }
    // One simulated second per step: warm-up loads first, then rounds.
    for step in 0..SCALE_WARMUP_LOADS {
        balancer.advance_clock(step as f64);
        balancer.add_system_load(SCALE_WARMUP_AMOUNT);
    }
    let initial_load = balancer.total_load();
    let initial_capacity = balancer.total_capacity();

    let rounds = (0..SCALE_ROUNDS)
        .map(|round| {
            let time_secs = (SCALE_WARMUP_LOADS + round) as f64;
            balancer.advance_clock(time_secs);
            balancer.add_server(DEFAULT_CAPACITY);
            balancer.add_system_load(SCALE_ROUND_AMOUNT);
            let algo = if round % 2 == 0 {
                AlgoConfig::LeastLoaded
            } else {
                AlgoConfig::WeightedOptimization
            };
            balancer.set_algorithm(algo);
            balancer.rebalance();

            let status = balancer.system_status();
            ScalabilityRound {
                round: round + 1,
                time_secs,
                servers: status.server_count,
                algorithm: algo.name().to_string(),
                total_load: status.total_load,
                total_capacity: status.total_capacity,
                utilization_pct: status.utilization_pct,
                load_variance: status.load_variance,
            }
        })
        .collect();

    ScalabilityReport {
        initial_load,
        initial_capacity,
        rounds,
        final_state: balancer.snapshot(),
        status: balancer.system_status(),
    }
}
