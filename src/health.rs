use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::models::HealthConfig;
use crate::server::ServerId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum HealthState {
    Healthy,
    Degraded,
    Critical,
    Offline,
}

impl HealthState {
    pub fn label(self) -> &'static str {
        match self {
            HealthState::Healthy => "HEALTHY",
            HealthState::Degraded => "DEGRADED",
            HealthState::Critical => "CRITICAL",
            HealthState::Offline => "OFFLINE",
        }
    }

    pub fn is_online(self) -> bool {
        self != HealthState::Offline
    }

    fn profile(self) -> (f64, f64) {
        match self {
            HealthState::Healthy => (1.0, 1.0),
            HealthState::Degraded => (0.7, 0.7),
            HealthState::Critical => (0.3, 0.4),
            HealthState::Offline => (0.0, 0.0),
        }
    }
}

impl fmt::Display for HealthState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct HealthRecord {
    pub server_id: ServerId,
    pub state: HealthState,
    pub health_score: f64,
    pub failure_probability: f64,
    pub recovery_probability: f64,
    pub performance_multiplier: f64,
    pub last_state_change: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct HealthEvent {
    pub server_id: ServerId,
    pub state: HealthState,
    pub performance_multiplier: f64,
    pub at: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Fault {
    SetState {
        server_id: ServerId,
        state: HealthState,
    },
    Degrade {
        server_id: ServerId,
        factor: f64,
    },
    Recover(ServerId),
    RandomFailure,
    NetworkPartition(Vec<ServerId>),
    HighLoad(ServerId),
}

pub trait HealthMonitor: Send {
    fn register(&mut self, server_id: ServerId);
    fn unregister(&mut self, server_id: ServerId);
    fn tick(&mut self, now: f64);
    fn drain_events(&mut self) -> Vec<HealthEvent>;

    fn inject(&mut self, _fault: &Fault) -> Result<()> {
        Ok(())
    }
}

#[derive(Default)]
pub struct NoHealth;

impl HealthMonitor for NoHealth {
    fn register(&mut self, _server_id: ServerId) {}

    fn unregister(&mut self, _server_id: ServerId) {}

    fn tick(&mut self, _now: f64) {}

    fn drain_events(&mut self) -> Vec<HealthEvent> {
        Vec::new()
    }
}

/// One probabilistic step of the automaton. `roll` is uniform in [0, 1).
pub fn next_transition(
    state: HealthState,
    roll: f64,
    failure_probability: f64,
    recovery_probability: f64,
) -> Option<(HealthState, f64, f64)> {
    match state {
        HealthState::Healthy if roll < failure_probability => {
            Some((HealthState::Degraded, 0.7, 0.7))
        }
        HealthState::Degraded if roll < recovery_probability => {
            Some((HealthState::Healthy, 1.0, 1.0))
        }
        HealthState::Degraded if roll > 1.0 - 2.0 * failure_probability => {
            Some((HealthState::Critical, 0.3, 0.4))
        }
        HealthState::Critical if roll < recovery_probability / 2.0 => {
            Some((HealthState::Degraded, 0.6, 0.6))
        }
        HealthState::Critical if roll > 1.0 - 3.0 * failure_probability => {
            Some((HealthState::Offline, 0.0, 0.0))
        }
        HealthState::Offline if roll < recovery_probability / 3.0 => {
            Some((HealthState::Critical, 0.2, 0.3))
        }
        _ => None,
    }
}

pub struct HealthSimulator {
    records: BTreeMap<ServerId, HealthRecord>,
    config: HealthConfig,
    rng: StdRng,
    now: f64,
    events: Vec<HealthEvent>,
}

impl HealthSimulator {
    pub fn new(config: HealthConfig, seed: u64) -> Self {
        Self {
            records: BTreeMap::new(),
            config,
            rng: StdRng::seed_from_u64(seed),
            now: 0.0,
            events: Vec::new(),
        }
    }

    pub fn add_server(&mut self, server_id: ServerId) -> bool {
        let failure = self.config.failure_probability;
        let recovery = self.config.recovery_probability;
        self.add_server_with(server_id, failure, recovery)
    }

    pub fn add_server_with(
        &mut self,
        server_id: ServerId,
        failure_probability: f64,
        recovery_probability: f64,
    ) -> bool {
        if self.records.contains_key(&server_id) {
            warn!(server_id, "server already tracked by health simulator");
            return false;
        }
        self.records.insert(
            server_id,
            HealthRecord {
                server_id,
                state: HealthState::Healthy,
                health_score: 1.0,
                failure_probability,
                recovery_probability,
                performance_multiplier: 1.0,
                last_state_change: self.now,
            },
        );
        true
    }

    pub fn remove_server(&mut self, server_id: ServerId) -> bool {
        self.events.retain(|event| event.server_id != server_id);
        self.records.remove(&server_id).is_some()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn now(&self) -> f64 {
        self.now
    }

    pub fn record(&self, server_id: ServerId) -> Option<&HealthRecord> {
        self.records.get(&server_id)
    }

    pub fn state(&self, server_id: ServerId) -> Option<HealthState> {
        self.records.get(&server_id).map(|record| record.state)
    }

    pub fn health_score(&self, server_id: ServerId) -> Option<f64> {
        self.records.get(&server_id).map(|record| record.health_score)
    }

    pub fn performance_multiplier(&self, server_id: ServerId) -> Option<f64> {
        self.records
            .get(&server_id)
            .map(|record| record.performance_multiplier)
    }

    pub fn state_label(&self, server_id: ServerId) -> Option<&'static str> {
        self.state(server_id).map(HealthState::label)
    }

    pub fn update(&mut self, now: f64) {
        self.now = now;
        let min_dwell = self.config.min_dwell_secs;

        for record in self.records.values_mut() {
            if now - record.last_state_change < min_dwell {
                continue;
            }
            let roll: f64 = self.rng.gen();
            let Some((state, score, multiplier)) = next_transition(
                record.state,
                roll,
                record.failure_probability,
                record.recovery_probability,
            ) else {
                continue;
            };

            info!(
                server_id = record.server_id,
                from = %record.state,
                to = %state,
                "health transition"
            );
            record.state = state;
            record.health_score = score;
            record.performance_multiplier = multiplier;
            record.last_state_change = now;
            self.events.push(HealthEvent {
                server_id: record.server_id,
                state,
                performance_multiplier: multiplier,
                at: now,
            });
        }
    }

    pub fn set_state(&mut self, server_id: ServerId, state: HealthState) -> Result<()> {
        let (score, multiplier) = state.profile();
        self.force(server_id, state, score, multiplier)
    }

    pub fn recover(&mut self, server_id: ServerId) -> Result<()> {
        self.set_state(server_id, HealthState::Healthy)
    }

    pub fn degrade_performance(&mut self, server_id: ServerId, factor: f64) -> Result<HealthState> {
        let record = self
            .records
            .get(&server_id)
            .ok_or(Error::ServerNotFound(server_id))?;
        if record.state == HealthState::Offline {
            return Ok(HealthState::Offline);
        }

        let multiplier = record.performance_multiplier * factor.clamp(0.0, 1.0);
        let (state, score, multiplier) = if multiplier < 0.1 {
            (HealthState::Offline, 0.0, 0.0)
        } else if multiplier < 0.5 {
            (HealthState::Critical, 0.3, multiplier)
        } else if multiplier < 0.9 {
            (HealthState::Degraded, 0.7, multiplier)
        } else {
            (record.state, record.health_score, multiplier)
        };
        self.force(server_id, state, score, multiplier)?;
        Ok(state)
    }

    pub fn simulate_random_failure(&mut self) -> Option<(ServerId, HealthState)> {
        if self.records.is_empty() {
            return None;
        }
        let index = self.rng.gen_range(0..self.records.len());
        let server_id = *self.records.keys().nth(index)?;
        let severity: f64 = self.rng.gen();
        let state = if severity < 0.2 {
            HealthState::Degraded
        } else if severity < 0.7 {
            HealthState::Critical
        } else {
            HealthState::Offline
        };
        self.set_state(server_id, state).ok()?;
        Some((server_id, state))
    }

    pub fn simulate_network_partition(&mut self, server_ids: &[ServerId]) -> Vec<ServerId> {
        let mut affected = Vec::with_capacity(server_ids.len());
        for &server_id in server_ids {
            match self.set_state(server_id, HealthState::Offline) {
                Ok(()) => affected.push(server_id),
                Err(err) => warn!(server_id, error = %err, "partition skipped server"),
            }
        }
        affected
    }

    pub fn simulate_high_load(&mut self, server_id: ServerId) -> Result<Option<f64>> {
        let state = self
            .state(server_id)
            .ok_or(Error::ServerNotFound(server_id))?;
        if state == HealthState::Offline {
            return Ok(None);
        }
        let factor = self.rng.gen_range(0.5..=0.8);
        self.degrade_performance(server_id, factor)?;
        Ok(Some(factor))
    }

    fn force(
        &mut self,
        server_id: ServerId,
        state: HealthState,
        score: f64,
        multiplier: f64,
    ) -> Result<()> {
        let now = self.now;
        let record = self
            .records
            .get_mut(&server_id)
            .ok_or(Error::ServerNotFound(server_id))?;
        debug!(server_id, state = %state, multiplier, "health state forced");
        record.state = state;
        record.health_score = score;
        record.performance_multiplier = multiplier;
        record.last_state_change = now;
        self.events.push(HealthEvent {
            server_id,
            state,
            performance_multiplier: multiplier,
            at: now,
        });
        Ok(())
    }
}

impl HealthMonitor for HealthSimulator {
    fn register(&mut self, server_id: ServerId) {
        self.add_server(server_id);
    }

    fn unregister(&mut self, server_id: ServerId) {
        self.remove_server(server_id);
    }

    fn tick(&mut self, now: f64) {
        self.update(now);
    }

    fn drain_events(&mut self) -> Vec<HealthEvent> {
        std::mem::take(&mut self.events)
    }

    fn inject(&mut self, fault: &Fault) -> Result<()> {
        match fault {
            Fault::SetState { server_id, state } => self.set_state(*server_id, *state),
            Fault::Degrade { server_id, factor } => {
                self.degrade_performance(*server_id, *factor).map(|_| ())
            }
            Fault::Recover(server_id) => self.recover(*server_id),
            Fault::RandomFailure => {
                self.simulate_random_failure();
                Ok(())
            }
            Fault::NetworkPartition(server_ids) => {
                self.simulate_network_partition(server_ids);
                Ok(())
            }
            Fault::HighLoad(server_id) => self.simulate_high_load(*server_id).map(|_| ()),
        }
    }
}
