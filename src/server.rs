use serde::Serialize;

use crate::algorithms::Allocation;
use crate::health::HealthState;

pub type ServerId = u32;

#[derive(Clone, Debug, PartialEq)]
pub struct Server {
    pub id: ServerId,
    pub capacity: u64,
    pub current_load: u64,
    pub online: bool,
    pub performance_multiplier: f64,
    pub status: HealthState,
}

impl Server {
    pub fn new(id: ServerId, capacity: u64) -> Self {
        Self {
            id,
            capacity,
            current_load: 0,
            online: true,
            performance_multiplier: 1.0,
            status: HealthState::Healthy,
        }
    }

    pub fn available_capacity(&self) -> u64 {
        if !self.online {
            return 0;
        }
        self.capacity.saturating_sub(self.current_load)
    }

    pub fn effective_capacity(&self) -> f64 {
        if !self.online {
            return 0.0;
        }
        self.capacity as f64 * self.performance_multiplier
    }

    pub fn load_percentage(&self) -> f64 {
        if self.capacity == 0 {
            return 0.0;
        }
        (self.current_load as f64 / self.capacity as f64) * 100.0
    }

    pub fn set_performance_multiplier(&mut self, multiplier: f64) {
        self.performance_multiplier = multiplier.clamp(0.0, 1.0);
    }

    #[cfg(test)]
    pub(crate) fn test_at(id: ServerId, capacity: u64, current_load: u64, online: bool) -> Self {
        Self {
            current_load,
            online,
            ..Self::new(id, capacity)
        }
    }
}

#[derive(Clone, Debug)]
pub struct ServerRegistry {
    servers: Vec<Server>,
    next_id: ServerId,
}

impl Default for ServerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerRegistry {
    pub fn new() -> Self {
        Self {
            servers: Vec::new(),
            next_id: 1,
        }
    }

    pub fn add(&mut self, capacity: u64) -> ServerId {
        let id = self.next_id;
        self.next_id += 1;
        self.servers.push(Server::new(id, capacity));
        id
    }

    pub fn remove(&mut self, id: ServerId) -> Option<Server> {
        let idx = self.position(id)?;
        Some(self.servers.remove(idx))
    }

    pub fn get(&self, id: ServerId) -> Option<&Server> {
        self.position(id).map(|idx| &self.servers[idx])
    }

    pub fn get_mut(&mut self, id: ServerId) -> Option<&mut Server> {
        let idx = self.position(id)?;
        Some(&mut self.servers[idx])
    }

    pub fn servers(&self) -> &[Server] {
        &self.servers
    }

    pub fn len(&self) -> usize {
        self.servers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.servers.is_empty()
    }

    pub fn highest_id(&self) -> Option<ServerId> {
        self.servers.last().map(|server| server.id)
    }

    pub fn online_count(&self) -> usize {
        self.servers.iter().filter(|server| server.online).count()
    }

    pub fn total_load(&self) -> u64 {
        self.servers
            .iter()
            .fold(0u64, |total, server| total.saturating_add(server.current_load))
    }

    pub fn total_capacity(&self) -> u64 {
        self.servers
            .iter()
            .filter(|server| server.online)
            .fold(0u64, |total, server| total.saturating_add(server.capacity))
    }

    pub fn total_effective_capacity(&self) -> f64 {
        self.servers
            .iter()
            .map(|server| server.effective_capacity())
            .sum()
    }

    pub fn load_variance(&self) -> f64 {
        let percentages: Vec<f64> = self
            .servers
            .iter()
            .filter(|server| server.online)
            .map(|server| server.load_percentage())
            .collect();
        if percentages.is_empty() {
            return 0.0;
        }
        let mean = percentages.iter().sum::<f64>() / percentages.len() as f64;
        percentages
            .iter()
            .map(|value| (value - mean) * (value - mean))
            .sum::<f64>()
            / percentages.len() as f64
    }

    pub fn system_utilization(&self) -> f64 {
        let capacity = self.total_capacity();
        if capacity == 0 {
            return 0.0;
        }
        (self.total_load() as f64 / capacity as f64) * 100.0
    }

    pub fn reset_loads(&mut self) {
        for server in &mut self.servers {
            server.current_load = 0;
        }
    }

    pub fn apply(&mut self, allocation: &Allocation) {
        for delta in &allocation.deltas {
            match self.get_mut(delta.server_id) {
                Some(server) => {
                    server.current_load = server.current_load.saturating_add(delta.amount)
                }
                None => debug_assert!(false, "allocation for unknown server #{}", delta.server_id),
            }
        }
    }

    pub fn loads(&self) -> Vec<u64> {
        self.servers
            .iter()
            .map(|server| server.current_load)
            .collect()
    }

    pub fn snapshot(&self) -> RegistrySnapshot {
        RegistrySnapshot {
            servers: self
                .servers
                .iter()
                .map(|server| ServerView {
                    id: server.id,
                    capacity: server.capacity,
                    current_load: server.current_load,
                    online: server.online,
                    status: server.status.label().to_string(),
                    performance_multiplier: server.performance_multiplier,
                    load_percentage: server.load_percentage(),
                })
                .collect(),
            total_capacity: self.total_capacity(),
            total_load: self.total_load(),
            load_variance: self.load_variance(),
            utilization_pct: self.system_utilization(),
        }
    }

    fn position(&self, id: ServerId) -> Option<usize> {
        self.servers.binary_search_by_key(&id, |server| server.id).ok()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ServerView {
    pub id: ServerId,
    pub capacity: u64,
    pub current_load: u64,
    pub online: bool,
    pub status: String,
    pub performance_multiplier: f64,
    pub load_percentage: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RegistrySnapshot {
    pub servers: Vec<ServerView>,
    pub total_capacity: u64,
    pub total_load: u64,
    pub load_variance: f64,
    pub utilization_pct: f64,
}
