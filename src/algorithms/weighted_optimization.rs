use crate::algorithms::{
    apportion, fill_by_headroom, Allocation, DistributionContext, DistributionStrategy, Slot,
};
use crate::models::WeightingConfig;
use crate::server::Server;

pub struct WeightedOptimizationStrategy {
    weighting: WeightingConfig,
}

impl WeightedOptimizationStrategy {
    pub fn new(weighting: WeightingConfig) -> Self {
        Self { weighting }
    }

    fn proportional_capacity(&self, servers: &[&Server], amount: u64) -> Allocation {
        let mut slots: Vec<Slot> = servers
            .iter()
            .map(|server| Slot {
                server_id: server.id,
                weight: server.effective_capacity(),
                headroom: server.available_capacity(),
                assigned: 0,
            })
            .collect();
        apportion(&mut slots, amount);
        collect(amount, &slots)
    }

    fn target_utilization(&self, servers: &[&Server], amount: u64) -> Allocation {
        let total_capacity = servers
            .iter()
            .fold(0u64, |total, server| total.saturating_add(server.capacity));
        if total_capacity == 0 {
            return Allocation::new(amount);
        }
        let total_load: f64 = servers.iter().map(|server| server.current_load as f64).sum();
        let target = (total_load + amount as f64) / total_capacity as f64;

        let mut slots: Vec<Slot> = servers
            .iter()
            .map(|server| {
                let diff = target * server.capacity as f64 - server.current_load as f64;
                Slot {
                    server_id: server.id,
                    weight: diff.max(0.0),
                    headroom: server.available_capacity(),
                    assigned: 0,
                }
            })
            .collect();

        let leftover = apportion(&mut slots, amount);
        let mut allocation = collect(amount, &slots);
        if leftover > 0 {
            let rooms = slots
                .iter()
                .map(|slot| (slot.server_id, slot.headroom - slot.assigned))
                .collect();
            fill_by_headroom(rooms, leftover, &mut allocation);
        }
        allocation
    }
}

impl DistributionStrategy for WeightedOptimizationStrategy {
    fn distribute(&mut self, ctx: &DistributionContext, amount: u64) -> Allocation {
        let online: Vec<&Server> = ctx.servers.iter().filter(|server| server.online).collect();
        if online.is_empty() || amount == 0 {
            return Allocation::new(amount);
        }

        let allocation = match self.weighting {
            WeightingConfig::ProportionalCapacity => self.proportional_capacity(&online, amount),
            WeightingConfig::TargetUtilization => self.target_utilization(&online, amount),
        };
        allocation.sorted()
    }
}

fn collect(amount: u64, slots: &[Slot]) -> Allocation {
    let mut allocation = Allocation::new(amount);
    for slot in slots {
        allocation.assign(slot.server_id, slot.assigned);
    }
    allocation
}
