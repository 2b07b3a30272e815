use common::OrderId;

use super::PaymentStatus;

/// Decides the outcome of a payment attempt for an order.
pub trait PaymentDecider: Send + Sync {
    fn decide(&self, order_id: OrderId, amount: f64) -> PaymentStatus;
}

/// Completes or fails with equal probability.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomDecider;

impl PaymentDecider for RandomDecider {
    fn decide(&self, _order_id: OrderId, _amount: f64) -> PaymentStatus {
        if rand::random::<bool>() {
            PaymentStatus::Failed
        } else {
            PaymentStatus::Completed
        }
    }
}

/// Always returns the same outcome.
#[derive(Debug, Clone, Copy)]
pub struct FixedDecider(pub PaymentStatus);

impl PaymentDecider for FixedDecider {
    fn decide(&self, _order_id: OrderId, _amount: f64) -> PaymentStatus {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_decider_is_deterministic() {
        let decider = FixedDecider(PaymentStatus::Failed);
        for _ in 0..10 {
            assert_eq!(decider.decide(OrderId::new(), 1.0), PaymentStatus::Failed);
        }
    }

    #[test]
    fn random_decider_produces_both_outcomes() {
        let decider = RandomDecider;
        let outcomes: Vec<_> = (0..200).map(|_| decider.decide(OrderId::new(), 1.0)).collect();

        assert!(outcomes.contains(&PaymentStatus::Completed));
        assert!(outcomes.contains(&PaymentStatus::Failed));
    }
}
