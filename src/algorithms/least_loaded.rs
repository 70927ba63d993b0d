use crate::algorithms::{fill_by_headroom, Allocation, DistributionContext, DistributionStrategy};

#[derive(Default)]
pub struct LeastLoadedStrategy;

impl DistributionStrategy for LeastLoadedStrategy {
    fn distribute(&mut self, ctx: &DistributionContext, amount: u64) -> Allocation {
        let mut allocation = Allocation::new(amount);
        let candidates = ctx
            .servers
            .iter()
            .filter(|server| server.online)
            .map(|server| (server.id, server.available_capacity()))
            .collect();
        fill_by_headroom(candidates, amount, &mut allocation);
        allocation.sorted()
    }
}
