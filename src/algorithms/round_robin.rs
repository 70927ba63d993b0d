use crate::algorithms::{Allocation, DistributionContext, DistributionStrategy};
use crate::server::ServerId;

/// Batch round robin: every online server gets `amount / n`, the remainder goes
/// one unit at a time starting at the cursor. Capacity is not consulted.
#[derive(Default)]
pub struct RoundRobinStrategy {
    cursor: ServerId,
}

impl RoundRobinStrategy {
    pub fn cursor(&self) -> ServerId {
        self.cursor
    }
}

impl DistributionStrategy for RoundRobinStrategy {
    fn distribute(&mut self, ctx: &DistributionContext, amount: u64) -> Allocation {
        let mut allocation = Allocation::new(amount);
        let online: Vec<ServerId> = ctx
            .servers
            .iter()
            .filter(|server| server.online)
            .map(|server| server.id)
            .collect();
        if online.is_empty() || amount == 0 {
            return allocation;
        }

        let count = online.len() as u64;
        let base = amount / count;
        let remainder = amount % count;
        let start = online
            .iter()
            .position(|&id| id >= self.cursor)
            .unwrap_or(0);

        for step in 0..online.len() {
            let server_id = online[(start + step) % online.len()];
            let extra = u64::from((step as u64) < remainder);
            allocation.assign(server_id, base + extra);
        }

        if remainder > 0 {
            let last = online[(start + remainder as usize - 1) % online.len()];
            self.cursor = last + 1;
        }

        allocation.sorted()
    }

    fn reset(&mut self) {
        self.cursor = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::Server;

    fn pool() -> Vec<Server> {
        vec![
            Server::test_at(1, 100, 0, true),
            Server::test_at(2, 100, 0, true),
            Server::test_at(3, 100, 0, true),
        ]
    }

    #[test]
    fn divisible_load_splits_evenly() {
        let servers = pool();
        let mut strategy = RoundRobinStrategy::default();
        let ctx = DistributionContext { servers: &servers };

        let allocation = strategy.distribute(&ctx, 30);
        assert_eq!(allocation.delta_for(1), 10);
        assert_eq!(allocation.delta_for(2), 10);
        assert_eq!(allocation.delta_for(3), 10);
        assert_eq!(allocation.undistributed, 0);
        assert_eq!(strategy.cursor(), 0);
    }

    #[test]
    fn remainder_rotates_from_cursor() {
        let servers = pool();
        let mut strategy = RoundRobinStrategy::default();
        let ctx = DistributionContext { servers: &servers };

        let first = strategy.distribute(&ctx, 4);
        assert_eq!(
            (first.delta_for(1), first.delta_for(2), first.delta_for(3)),
            (2, 1, 1)
        );
        assert_eq!(strategy.cursor(), 2);

        let second = strategy.distribute(&ctx, 2);
        assert_eq!(
            (second.delta_for(1), second.delta_for(2), second.delta_for(3)),
            (0, 1, 1)
        );
        assert_eq!(strategy.cursor(), 4);

        let third = strategy.distribute(&ctx, 1);
        assert_eq!(third.delta_for(1), 1);
    }

    #[test]
    fn offline_servers_are_skipped() {
        let mut servers = pool();
        servers[1].online = false;
        let mut strategy = RoundRobinStrategy::default();
        let ctx = DistributionContext { servers: &servers };

        let allocation = strategy.distribute(&ctx, 9);
        assert_eq!(allocation.delta_for(1), 5);
        assert_eq!(allocation.delta_for(2), 0);
        assert_eq!(allocation.delta_for(3), 4);
        assert_eq!(allocation.distributed(), 9);
    }

    #[test]
    fn no_online_servers_leaves_everything_undistributed() {
        let mut servers = pool();
        for server in &mut servers {
            server.online = false;
        }
        let mut strategy = RoundRobinStrategy::default();
        let ctx = DistributionContext { servers: &servers };

        let allocation = strategy.distribute(&ctx, 12);
        assert!(allocation.deltas.is_empty());
        assert_eq!(allocation.undistributed, 12);
    }

    #[test]
    fn reset_restarts_rotation_at_lowest_id() {
        let servers = pool();
        let mut strategy = RoundRobinStrategy::default();
        let ctx = DistributionContext { servers: &servers };

        strategy.distribute(&ctx, 2);
        strategy.reset();
        let allocation = strategy.distribute(&ctx, 1);
        assert_eq!(allocation.delta_for(1), 1);
    }
}
