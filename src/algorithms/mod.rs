mod least_loaded;
mod round_robin;
mod weighted_optimization;

use serde::Serialize;

use crate::models::{AlgoConfig, WeightingConfig};
use crate::server::{Server, ServerId};

pub use least_loaded::LeastLoadedStrategy;
pub use round_robin::RoundRobinStrategy;
pub use weighted_optimization::WeightedOptimizationStrategy;

pub trait DistributionStrategy: Send {
    fn distribute(&mut self, ctx: &DistributionContext, amount: u64) -> Allocation;

    fn reset(&mut self) {}
}

pub struct DistributionContext<'a> {
    pub servers: &'a [Server],
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ServerDelta {
    pub server_id: ServerId,
    pub amount: u64,
}

/// Outcome of one distribution call. `distributed() + undistributed == requested`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Allocation {
    pub requested: u64,
    pub deltas: Vec<ServerDelta>,
    pub undistributed: u64,
}

impl Allocation {
    pub fn new(requested: u64) -> Self {
        Self {
            requested,
            deltas: Vec::new(),
            undistributed: requested,
        }
    }

    pub fn assign(&mut self, server_id: ServerId, amount: u64) {
        if amount == 0 {
            return;
        }
        debug_assert!(amount <= self.undistributed, "allocation exceeds request");
        let amount = amount.min(self.undistributed);
        self.undistributed -= amount;
        match self
            .deltas
            .iter_mut()
            .find(|delta| delta.server_id == server_id)
        {
            Some(delta) => delta.amount += amount,
            None => self.deltas.push(ServerDelta { server_id, amount }),
        }
    }

    pub fn distributed(&self) -> u64 {
        self.requested - self.undistributed
    }

    pub fn delta_for(&self, server_id: ServerId) -> u64 {
        self.deltas
            .iter()
            .find(|delta| delta.server_id == server_id)
            .map(|delta| delta.amount)
            .unwrap_or(0)
    }

    pub(crate) fn sorted(mut self) -> Self {
        self.deltas.sort_by_key(|delta| delta.server_id);
        self
    }
}

pub fn build_strategy(algo: AlgoConfig, weighting: WeightingConfig) -> Box<dyn DistributionStrategy> {
    match algo {
        AlgoConfig::RoundRobin => Box::new(RoundRobinStrategy::default()),
        AlgoConfig::LeastLoaded => Box::new(LeastLoadedStrategy),
        AlgoConfig::WeightedOptimization => Box::new(WeightedOptimizationStrategy::new(weighting)),
    }
}

pub(crate) fn fill_by_headroom(
    mut candidates: Vec<(ServerId, u64)>,
    amount: u64,
    allocation: &mut Allocation,
) -> u64 {
    candidates.retain(|(_, headroom)| *headroom > 0);
    candidates.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

    let mut remaining = amount;
    for (server_id, headroom) in candidates {
        if remaining == 0 {
            break;
        }
        let grant = remaining.min(headroom);
        allocation.assign(server_id, grant);
        remaining -= grant;
    }
    remaining
}

pub(crate) struct Slot {
    pub server_id: ServerId,
    pub weight: f64,
    pub headroom: u64,
    pub assigned: u64,
}

impl Slot {
    fn room(&self) -> u64 {
        self.headroom - self.assigned
    }
}

pub(crate) fn apportion(slots: &mut [Slot], amount: u64) -> u64 {
    let mut remaining = amount;

    loop {
        let active: Vec<usize> = (0..slots.len())
            .filter(|&idx| slots[idx].weight > 0.0 && slots[idx].room() > 0)
            .collect();
        if remaining == 0 || active.is_empty() {
            return remaining;
        }

        let total_weight: f64 = active.iter().map(|&idx| slots[idx].weight).sum();
        let mut granted = 0u64;
        let mut capped = false;
        for &idx in &active {
            let share = ((remaining as f64) * slots[idx].weight / total_weight).floor() as u64;
            let room = slots[idx].room();
            if share > room {
                capped = true;
            }
            let grant = share.min(room).min(remaining - granted);
            slots[idx].assigned += grant;
            granted += grant;
        }
        remaining -= granted;

        if !capped {
            return hand_out_units(slots, remaining);
        }
    }
}

fn hand_out_units(slots: &mut [Slot], mut remaining: u64) -> u64 {
    while remaining > 0 {
        let mut order: Vec<usize> = (0..slots.len())
            .filter(|&idx| slots[idx].weight > 0.0 && slots[idx].room() > 0)
            .collect();
        if order.is_empty() {
            break;
        }
        order.sort_by(|&a, &b| {
            slots[b]
                .room()
                .cmp(&slots[a].room())
                .then_with(|| slots[a].server_id.cmp(&slots[b].server_id))
        });
        for idx in order {
            if remaining == 0 {
                break;
            }
            slots[idx].assigned += 1;
            remaining -= 1;
        }
    }
    remaining
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slot(server_id: ServerId, weight: f64, headroom: u64) -> Slot {
        Slot {
            server_id,
            weight,
            headroom,
            assigned: 0,
        }
    }

    #[test]
    fn allocation_tracks_conservation() {
        let mut allocation = Allocation::new(10);
        allocation.assign(2, 3);
        allocation.assign(1, 4);
        allocation.assign(2, 1);
        assert_eq!(allocation.distributed(), 8);
        assert_eq!(allocation.undistributed, 2);
        assert_eq!(allocation.delta_for(2), 4);
        assert_eq!(allocation.delta_for(9), 0);
        let sorted = allocation.sorted();
        assert_eq!(sorted.deltas[0].server_id, 1);
    }

    #[test]
    fn fill_by_headroom_prefers_largest_room_then_lowest_id() {
        let mut allocation = Allocation::new(70);
        let left = fill_by_headroom(vec![(1, 30), (2, 50), (3, 50)], 70, &mut allocation);
        assert_eq!(left, 0);
        assert_eq!(allocation.delta_for(2), 50);
        assert_eq!(allocation.delta_for(3), 20);
        assert_eq!(allocation.delta_for(1), 0);
    }

    #[test]
    fn apportion_sends_rounding_remainder_to_most_room() {
        let mut slots = vec![slot(1, 100.0, 100), slot(2, 200.0, 200)];
        let left = apportion(&mut slots, 31);
        assert_eq!(left, 0);
        assert_eq!(slots[0].assigned, 10);
        assert_eq!(slots[1].assigned, 21);
    }

    #[test]
    fn apportion_resplits_capped_shortfall() {
        let mut slots = vec![slot(1, 100.0, 5), slot(2, 100.0, 100)];
        let left = apportion(&mut slots, 40);
        assert_eq!(left, 0);
        assert_eq!(slots[0].assigned, 5);
        assert_eq!(slots[1].assigned, 35);
    }

    #[test]
    fn apportion_reports_what_does_not_fit() {
        let mut slots = vec![slot(1, 1.0, 3), slot(2, 1.0, 4)];
        let left = apportion(&mut slots, 10);
        assert_eq!(left, 3);
        assert_eq!(slots[0].assigned + slots[1].assigned, 7);
    }
}
