use parking_lot::Mutex;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::algorithms::{build_strategy, Allocation, DistributionContext, DistributionStrategy};
use crate::commands::Command;
use crate::error::{Error, Result};
use crate::health::{Fault, HealthEvent, HealthMonitor, HealthSimulator, NoHealth};
use crate::metrics::{MetricsSink, MetricsSnapshot, NoMetrics, Operation};
use crate::models::{AlgoConfig, SimConfig, WeightingConfig};
use crate::server::{RegistrySnapshot, Server, ServerId, ServerRegistry};

pub const DEFAULT_CAPACITY: u64 = 100;
const RANDOM_LOAD_STEP: u64 = 5;

pub type SharedBalancer = Arc<Mutex<LoadBalancer>>;

pub struct LoadBalancer {
    registry: ServerRegistry,
    algo: AlgoConfig,
    weighting: WeightingConfig,
    strategy: Box<dyn DistributionStrategy>,
    health: Box<dyn HealthMonitor>,
    metrics: Box<dyn MetricsSink>,
    random_load: u64,
    clock: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Removal {
    pub server_id: ServerId,
    pub capacity: u64,
    pub redistributed: Allocation,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SystemStatus {
    pub server_count: usize,
    pub online_count: usize,
    pub total_capacity: u64,
    pub total_load: u64,
    pub algorithm: String,
    pub random_load: u64,
    pub load_variance: f64,
    pub utilization_pct: f64,
}

impl fmt::Display for SystemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== LOAD BALANCER SYSTEM STATUS ===")?;
        writeln!(f, "Active Servers: {}", self.server_count)?;
        writeln!(f, "Total System Capacity: {}", self.total_capacity)?;
        writeln!(f, "Current Total Load: {}", self.total_load)?;
        writeln!(f, "Load Balancing Algorithm: {}", self.algorithm)?;
        writeln!(f, "Random Load Amount: {}", self.random_load)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum CommandOutcome {
    Distributed(Allocation),
    ServerAdded(ServerId),
    ServerRemoved(Removal),
    Rebalanced(Allocation),
    AlgorithmChanged(AlgoConfig),
    RandomLoadChanged(u64),
    ServerLoaded { server_id: ServerId, added: u64 },
    Help,
    Quit,
}

impl Default for LoadBalancer {
    fn default() -> Self {
        let mut balancer = Self::new(AlgoConfig::default(), WeightingConfig::default());
        for _ in 0..3 {
            balancer.add_server(DEFAULT_CAPACITY);
        }
        balancer
    }
}

impl LoadBalancer {
    pub fn new(algo: AlgoConfig, weighting: WeightingConfig) -> Self {
        Self {
            registry: ServerRegistry::new(),
            algo,
            weighting,
            strategy: build_strategy(algo, weighting),
            health: Box::new(NoHealth),
            metrics: Box::new(NoMetrics),
            random_load: 10,
            clock: 0.0,
        }
    }

    pub fn from_config(config: &SimConfig) -> Self {
        let mut balancer = Self::new(config.algo, config.weighting);
        if config.health.enabled {
            balancer = balancer.with_health(Box::new(HealthSimulator::new(
                config.health.clone(),
                config.seed.unwrap_or(0),
            )));
        }
        balancer.random_load = config.random_load;
        for server in &config.servers {
            balancer.add_server(server.capacity);
        }
        balancer
    }

    pub fn with_health(mut self, mut health: Box<dyn HealthMonitor>) -> Self {
        for server in self.registry.servers() {
            health.register(server.id);
        }
        self.health = health;
        self
    }

    pub fn with_metrics(mut self, metrics: Box<dyn MetricsSink>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn into_shared(self) -> SharedBalancer {
        Arc::new(Mutex::new(self))
    }

    pub fn registry(&self) -> &ServerRegistry {
        &self.registry
    }

    pub fn servers(&self) -> &[Server] {
        self.registry.servers()
    }

    pub fn server(&self, server_id: ServerId) -> Result<&Server> {
        self.registry
            .get(server_id)
            .ok_or(Error::ServerNotFound(server_id))
    }

    pub fn algorithm(&self) -> AlgoConfig {
        self.algo
    }

    pub fn weighting(&self) -> WeightingConfig {
        self.weighting
    }

    pub fn random_load(&self) -> u64 {
        self.random_load
    }

    pub fn clock(&self) -> f64 {
        self.clock
    }

    pub fn total_load(&self) -> u64 {
        self.registry.total_load()
    }

    pub fn total_capacity(&self) -> u64 {
        self.registry.total_capacity()
    }

    pub fn load_variance(&self) -> f64 {
        self.registry.load_variance()
    }

    pub fn snapshot(&self) -> RegistrySnapshot {
        self.registry.snapshot()
    }

    pub fn system_status(&self) -> SystemStatus {
        SystemStatus {
            server_count: self.registry.len(),
            online_count: self.registry.online_count(),
            total_capacity: self.registry.total_capacity(),
            total_load: self.registry.total_load(),
            algorithm: self.algo.name().to_string(),
            random_load: self.random_load,
            load_variance: self.registry.load_variance(),
            utilization_pct: self.registry.system_utilization(),
        }
    }

    pub fn add_server(&mut self, capacity: u64) -> ServerId {
        let started = Instant::now();
        let server_id = self.registry.add(capacity);
        self.health.register(server_id);
        info!(server_id, capacity, "server added");
        self.record(Operation::ServerAdded, started);
        server_id
    }

    pub fn remove_server(&mut self, server_id: ServerId) -> Result<Removal> {
        let started = Instant::now();
        let server = self
            .registry
            .get_mut(server_id)
            .ok_or(Error::ServerNotFound(server_id))?;
        let load = server.current_load;
        let capacity = server.capacity;
        server.online = false;
        server.current_load = 0;

        let redistributed = self.distribute(load);
        self.registry.remove(server_id);
        self.health.unregister(server_id);

        info!(server_id, load, "server removed");
        if redistributed.undistributed > 0 {
            warn!(
                server_id,
                undistributed = redistributed.undistributed,
                "load from removed server could not be placed"
            );
        }
        self.record(Operation::ServerRemoved, started);
        Ok(Removal {
            server_id,
            capacity,
            redistributed,
        })
    }

    pub fn remove_highest(&mut self) -> Result<Removal> {
        let server_id = self.registry.highest_id().ok_or(Error::NoServers)?;
        self.remove_server(server_id)
    }

    pub fn add_system_load(&mut self, amount: u64) -> Allocation {
        let started = Instant::now();
        let allocation = self.distribute(amount);
        self.record(Operation::Distribute, started);
        allocation
    }

    pub fn add_random_load(&mut self) -> Allocation {
        self.add_system_load(self.random_load)
    }

    pub fn add_load_to_server(&mut self, server_id: ServerId, amount: u64) -> Result<u64> {
        let started = Instant::now();
        let server = self
            .registry
            .get_mut(server_id)
            .ok_or(Error::ServerNotFound(server_id))?;
        if !server.online {
            return Err(Error::ServerOffline(server_id));
        }

        let added = amount.min(server.available_capacity());
        server.current_load += added;
        if added < amount {
            warn!(server_id, requested = amount, added, "server capacity exceeded");
        }
        debug!(server_id, added, "load added to server");
        self.record(Operation::ServerLoad, started);
        Ok(added)
    }

    pub fn rebalance(&mut self) -> Allocation {
        let started = Instant::now();
        let total = self.registry.total_load();
        self.registry.reset_loads();
        self.strategy.reset();
        let allocation = self.distribute(total);
        info!(algorithm = %self.algo, total, "load rebalanced");
        self.record(Operation::Rebalance, started);
        allocation
    }

    pub fn set_algorithm(&mut self, algo: AlgoConfig) {
        let started = Instant::now();
        self.algo = algo;
        self.strategy = build_strategy(algo, self.weighting);
        info!(algorithm = %algo, "algorithm switched");
        self.record(Operation::AlgorithmChanged, started);
    }

    pub fn cycle_algorithm(&mut self) -> AlgoConfig {
        let next = self.algo.next();
        self.set_algorithm(next);
        next
    }

    pub fn set_weighting(&mut self, weighting: WeightingConfig) {
        self.weighting = weighting;
        self.strategy = build_strategy(self.algo, weighting);
    }

    pub fn set_random_load(&mut self, amount: u64) -> Result<()> {
        if amount == 0 {
            return Err(Error::RandomLoadZero);
        }
        self.random_load = amount;
        Ok(())
    }

    pub fn increase_random_load(&mut self) -> u64 {
        self.random_load += RANDOM_LOAD_STEP;
        self.random_load
    }

    pub fn decrease_random_load(&mut self) -> u64 {
        if self.random_load > RANDOM_LOAD_STEP {
            self.random_load -= RANDOM_LOAD_STEP;
        }
        self.random_load
    }

    // Moves the metrics clock forward without ticking health. Never rewinds.
    pub fn advance_clock(&mut self, now: f64) {
        if now > self.clock {
            self.clock = now;
        }
    }

    pub fn advance_health(&mut self, now: f64) -> Vec<HealthEvent> {
        self.clock = now;
        self.health.tick(now);
        self.apply_health_events()
    }

    pub fn inject_fault(&mut self, fault: &Fault) -> Result<Vec<HealthEvent>> {
        self.health.inject(fault)?;
        Ok(self.apply_health_events())
    }

    pub fn execute(&mut self, command: Command) -> Result<CommandOutcome> {
        let outcome = match command {
            Command::AddRandomLoad => CommandOutcome::Distributed(self.add_random_load()),
            Command::AddServer => CommandOutcome::ServerAdded(self.add_server(DEFAULT_CAPACITY)),
            Command::RemoveServer => CommandOutcome::ServerRemoved(self.remove_highest()?),
            Command::Rebalance => CommandOutcome::Rebalanced(self.rebalance()),
            Command::CycleAlgorithm => CommandOutcome::AlgorithmChanged(self.cycle_algorithm()),
            Command::IncreaseRandomLoad => {
                CommandOutcome::RandomLoadChanged(self.increase_random_load())
            }
            Command::DecreaseRandomLoad => {
                CommandOutcome::RandomLoadChanged(self.decrease_random_load())
            }
            Command::LoadServer(server_id) => {
                let added = self.add_load_to_server(server_id, self.random_load)?;
                CommandOutcome::ServerLoaded { server_id, added }
            }
            Command::Help => CommandOutcome::Help,
            Command::Quit => CommandOutcome::Quit,
        };
        Ok(outcome)
    }

    fn distribute(&mut self, amount: u64) -> Allocation {
        let ctx = DistributionContext {
            servers: self.registry.servers(),
        };
        let allocation = self.strategy.distribute(&ctx, amount);
        debug_assert_eq!(
            allocation.distributed() + allocation.undistributed,
            amount,
            "allocation must conserve load"
        );
        self.registry.apply(&allocation);

        debug!(
            algorithm = %self.algo,
            requested = amount,
            distributed = allocation.distributed(),
            "load distributed"
        );
        if allocation.undistributed > 0 {
            warn!(
                undistributed = allocation.undistributed,
                "insufficient capacity"
            );
        }
        allocation
    }

    fn apply_health_events(&mut self) -> Vec<HealthEvent> {
        let started = Instant::now();
        let events = self.health.drain_events();
        for event in &events {
            match self.registry.get_mut(event.server_id) {
                Some(server) => {
                    server.status = event.state;
                    server.online = event.state.is_online();
                    server.set_performance_multiplier(event.performance_multiplier);
                }
                None => {
                    debug_assert!(
                        false,
                        "health event for unknown server #{}",
                        event.server_id
                    );
                    warn!(server_id = event.server_id, "health event for unknown server ignored");
                }
            }
        }
        if !events.is_empty() {
            self.record(Operation::HealthChanged, started);
        }
        events
    }

    fn record(&mut self, operation: Operation, started: Instant) {
        let latency_ms = started.elapsed().as_secs_f64() * 1000.0;
        self.metrics.record(MetricsSnapshot::capture(
            self.clock,
            operation,
            self.algo.name(),
            self.registry.loads(),
            latency_ms,
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::HealthState;
    use crate::metrics::MetricsRecorder;
    use crate::models::HealthConfig;

    fn balancer(algo: AlgoConfig, capacities: &[u64]) -> LoadBalancer {
        let mut balancer = LoadBalancer::new(algo, WeightingConfig::default());
        for &capacity in capacities {
            balancer.add_server(capacity);
        }
        balancer
    }

    fn loads(balancer: &LoadBalancer) -> Vec<u64> {
        balancer.registry().loads()
    }

    fn with_simulator(balancer: LoadBalancer) -> LoadBalancer {
        balancer.with_health(Box::new(HealthSimulator::new(HealthConfig::default(), 0)))
    }

    #[test]
    fn default_pool_has_three_servers_of_capacity_100() {
        let balancer = LoadBalancer::default();
        assert_eq!(balancer.servers().len(), 3);
        assert_eq!(balancer.total_capacity(), 300);
        assert_eq!(balancer.algorithm(), AlgoConfig::RoundRobin);
        assert_eq!(balancer.random_load(), 10);
    }

    #[test]
    fn every_policy_conserves_load() {
        for algo in AlgoConfig::ALL {
            let mut balancer = balancer(algo, &[50, 80, 120]);
            balancer.add_load_to_server(2, 30).unwrap();
            for amount in [0, 7, 33, 100, 250] {
                let before = balancer.total_load();
                let allocation = balancer.add_system_load(amount);
                assert_eq!(allocation.distributed() + allocation.undistributed, amount);
                assert_eq!(balancer.total_load(), before + allocation.distributed());
            }
        }
    }

    #[test]
    fn rebalance_is_idempotent() {
        for algo in AlgoConfig::ALL {
            let mut balancer = balancer(algo, &[100, 200, 50]);
            balancer.add_system_load(37);
            balancer.add_load_to_server(1, 20).unwrap();
            let first = balancer.rebalance();
            let after_first = loads(&balancer);
            let second = balancer.rebalance();
            assert_eq!(first, second, "{}", algo);
            assert_eq!(loads(&balancer), after_first, "{}", algo);
        }
    }

    #[test]
    fn removal_redistributes_then_readd_preserves_total() {
        let mut balancer = balancer(AlgoConfig::LeastLoaded, &[100, 100, 100]);
        balancer.add_system_load(150);
        let total = balancer.total_load();

        let removal = balancer.remove_server(1).unwrap();
        assert_eq!(removal.capacity, 100);
        assert_eq!(removal.redistributed.undistributed, 0);
        assert_eq!(balancer.total_load(), total);
        assert!(balancer.server(1).is_err());

        balancer.add_server(100);
        assert_eq!(balancer.total_load(), total);
        assert_eq!(balancer.servers().len(), 3);
    }

    #[test]
    fn removal_skips_the_departing_server() {
        let mut balancer = balancer(AlgoConfig::RoundRobin, &[100, 100, 100]);
        balancer.add_system_load(30);
        let removal = balancer.remove_highest().unwrap();
        assert_eq!(removal.server_id, 3);
        assert_eq!(removal.redistributed.delta_for(3), 0);
        assert_eq!(loads(&balancer), vec![15, 15]);
    }

    #[test]
    fn removing_the_last_server_reports_lost_load() {
        let mut balancer = balancer(AlgoConfig::RoundRobin, &[100]);
        balancer.add_system_load(40);
        let removal = balancer.remove_server(1).unwrap();
        assert_eq!(removal.redistributed.undistributed, 40);
        assert_eq!(balancer.remove_highest(), Err(Error::NoServers));
    }

    #[test]
    fn unknown_and_offline_servers_are_rejected() {
        let mut balancer = with_simulator(balancer(AlgoConfig::RoundRobin, &[100, 100]));
        assert_eq!(balancer.remove_server(9), Err(Error::ServerNotFound(9)));
        assert_eq!(balancer.add_load_to_server(9, 5), Err(Error::ServerNotFound(9)));

        balancer
            .inject_fault(&Fault::SetState {
                server_id: 2,
                state: HealthState::Offline,
            })
            .unwrap();
        assert_eq!(balancer.add_load_to_server(2, 5), Err(Error::ServerOffline(2)));
        assert_eq!(balancer.total_load(), 0);
    }

    #[test]
    fn direct_load_is_clamped_to_available_capacity() {
        let mut balancer = balancer(AlgoConfig::RoundRobin, &[50]);
        assert_eq!(balancer.add_load_to_server(1, 30).unwrap(), 30);
        assert_eq!(balancer.add_load_to_server(1, 30).unwrap(), 20);
        assert_eq!(balancer.add_load_to_server(1, 30).unwrap(), 0);
        assert_eq!(balancer.total_load(), 50);
    }

    #[test]
    fn random_load_steps_by_five_with_floor() {
        let mut balancer = LoadBalancer::default();
        assert_eq!(balancer.increase_random_load(), 15);
        assert_eq!(balancer.decrease_random_load(), 10);
        assert_eq!(balancer.decrease_random_load(), 5);
        assert_eq!(balancer.decrease_random_load(), 5);
        assert_eq!(balancer.set_random_load(0), Err(Error::RandomLoadZero));
    }

    #[test]
    fn algorithm_cycles_through_all_policies() {
        let mut balancer = LoadBalancer::default();
        assert_eq!(balancer.cycle_algorithm(), AlgoConfig::LeastLoaded);
        assert_eq!(balancer.cycle_algorithm(), AlgoConfig::WeightedOptimization);
        assert_eq!(balancer.cycle_algorithm(), AlgoConfig::RoundRobin);
    }

    #[test]
    fn health_events_update_registry() {
        let mut balancer = with_simulator(balancer(AlgoConfig::WeightedOptimization, &[100, 100]));
        let events = balancer
            .inject_fault(&Fault::Degrade {
                server_id: 1,
                factor: 0.5,
            })
            .unwrap();
        assert_eq!(events.len(), 1);
        let server = balancer.server(1).unwrap();
        assert_eq!(server.status, HealthState::Degraded);
        assert_eq!(server.performance_multiplier, 0.5);
        assert!(server.online);

        let allocation = balancer.add_system_load(30);
        assert_eq!(allocation.delta_for(1), 10);
        assert_eq!(allocation.delta_for(2), 20);

        balancer
            .inject_fault(&Fault::NetworkPartition(vec![2]))
            .unwrap();
        assert!(!balancer.server(2).unwrap().online);
        assert_eq!(balancer.total_capacity(), 100);
    }

    #[test]
    fn metrics_timestamps_follow_the_clock() {
        let recorder = MetricsRecorder::new();
        let mut balancer = LoadBalancer::default().with_metrics(Box::new(recorder.clone()));
        for (step, command) in [Command::AddRandomLoad, Command::AddServer, Command::Rebalance]
            .into_iter()
            .enumerate()
        {
            balancer.advance_clock(step as f64);
            balancer.execute(command).unwrap();
        }
        balancer.advance_clock(1.0);
        assert_eq!(balancer.clock(), 2.0);

        let timestamps: Vec<f64> = recorder
            .snapshots()
            .iter()
            .map(|snapshot| snapshot.timestamp)
            .collect();
        assert_eq!(timestamps, vec![0.0, 1.0, 2.0]);
    }

    #[test]
    fn huge_round_robin_loads_saturate() {
        let recorder = MetricsRecorder::new();
        let mut balancer = balancer(AlgoConfig::RoundRobin, &[100, 100, 100])
            .with_metrics(Box::new(recorder.clone()));
        let first = balancer.add_system_load(u64::MAX);
        assert_eq!(first.undistributed, 0);
        for _ in 0..3 {
            balancer.add_system_load(u64::MAX);
        }

        assert_eq!(balancer.total_load(), u64::MAX);
        assert!(loads(&balancer).iter().all(|&load| load == u64::MAX));
        assert!(balancer.system_status().utilization_pct.is_finite());
        assert_eq!(recorder.len(), 4);
        assert!(recorder.latest().unwrap().average_load > 0.0);
    }

    #[test]
    fn health_ticks_advance_the_clock() {
        let config = HealthConfig {
            failure_probability: 1.0,
            ..HealthConfig::default()
        };
        let mut balancer = balancer(AlgoConfig::RoundRobin, &[100])
            .with_health(Box::new(HealthSimulator::new(config, 1)));
        assert!(balancer.advance_health(1.0).is_empty());
        let events = balancer.advance_health(6.0);
        assert_eq!(events.len(), 1);
        assert_eq!(balancer.clock(), 6.0);
        assert_eq!(balancer.server(1).unwrap().status, HealthState::Degraded);
    }

    #[test]
    fn every_mutation_is_recorded() {
        let recorder = MetricsRecorder::new();
        let mut balancer = LoadBalancer::new(AlgoConfig::RoundRobin, WeightingConfig::default())
            .with_metrics(Box::new(recorder.clone()));
        balancer.add_server(100);
        balancer.add_server(100);
        balancer.add_system_load(10);
        balancer.rebalance();
        balancer.cycle_algorithm();
        balancer.remove_highest().unwrap();

        assert_eq!(recorder.count(Operation::ServerAdded), 2);
        assert_eq!(recorder.count(Operation::Distribute), 1);
        assert_eq!(recorder.count(Operation::Rebalance), 1);
        assert_eq!(recorder.count(Operation::AlgorithmChanged), 1);
        assert_eq!(recorder.count(Operation::ServerRemoved), 1);
        let latest = recorder.latest().unwrap();
        assert_eq!(latest.algorithm, "Least Loaded");
        assert_eq!(latest.server_loads, vec![10]);
    }

    #[test]
    fn commands_dispatch_to_operations() {
        let mut balancer = LoadBalancer::default();
        assert_eq!(
            balancer.execute(Command::AddServer).unwrap(),
            CommandOutcome::ServerAdded(4)
        );
        match balancer.execute(Command::AddRandomLoad).unwrap() {
            CommandOutcome::Distributed(allocation) => assert_eq!(allocation.distributed(), 10),
            other => panic!("unexpected outcome {:?}", other),
        }
        assert_eq!(
            balancer.execute(Command::LoadServer(2)).unwrap(),
            CommandOutcome::ServerLoaded {
                server_id: 2,
                added: 10
            }
        );
        assert_eq!(
            balancer.execute(Command::LoadServer(9)),
            Err(Error::ServerNotFound(9))
        );
        assert_eq!(balancer.execute(Command::Quit).unwrap(), CommandOutcome::Quit);
    }

    #[test]
    fn shared_handle_serializes_access() {
        let shared = LoadBalancer::default().into_shared();
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let shared = Arc::clone(&shared);
                std::thread::spawn(move || {
                    for _ in 0..10 {
                        shared.lock().add_system_load(3);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(shared.lock().total_load(), 120);
    }

    #[test]
    fn system_status_reports_aggregates() {
        let mut balancer = LoadBalancer::default();
        balancer.add_system_load(30);
        let status = balancer.system_status();
        assert_eq!(status.server_count, 3);
        assert_eq!(status.total_load, 30);
        assert_eq!(
            status.to_string(),
            concat!(
                "=== LOAD BALANCER SYSTEM STATUS ===\n",
                "Active Servers: 3\n",
                "Total System Capacity: 300\n",
                "Current Total Load: 30\n",
                "Load Balancing Algorithm: Round Robin\n",
                "Random Load Amount: 10\n",
            )
        );
    }
}
