use std::time::Duration;

use rand::{Rng, RngCore};

use skein_ledger::NodeId;
use skein_net::PatternSpec;

/// Drives the simulated workload: when to send and to whom.
pub trait TransactionPattern: Send {
    fn name(&self) -> &'static str;

    fn next_wait(&self, rng: &mut dyn RngCore) -> Duration;

    fn pick_receiver(&self, own: NodeId, peers: &[NodeId], rng: &mut dyn RngCore)
        -> Option<NodeId>;
}

/// Uniform random pattern: any peer is equally likely, waits are uniform in
/// `[min_wait, max_wait]`.
pub struct UniformRandomPattern {
    min_wait: Duration,
    max_wait: Duration,
}

impl UniformRandomPattern {
    pub fn new(min_wait: Duration, max_wait: Duration) -> Self {
        UniformRandomPattern {
            min_wait,
            max_wait: max_wait.max(min_wait),
        }
    }
}

impl TransactionPattern for UniformRandomPattern {
    fn name(&self) -> &'static str {
        "uniform-random"
    }

    fn next_wait(&self, rng: &mut dyn RngCore) -> Duration {
        if self.max_wait == self.min_wait {
            return self.min_wait;
        }
        let span = (self.max_wait - self.min_wait).as_millis() as u64;
        self.min_wait + Duration::from_millis(rng.gen_range(0..=span))
    }

    fn pick_receiver(
        &self,
        own: NodeId,
        peers: &[NodeId],
        rng: &mut dyn RngCore,
    ) -> Option<NodeId> {
        let candidates: Vec<NodeId> = peers.iter().copied().filter(|&id| id != own).collect();
        if candidates.is_empty() {
            return None;
        }
        Some(candidates[rng.gen_range(0..candidates.len())])
    }
}

pub fn from_spec(spec: PatternSpec) -> Box<dyn TransactionPattern> {
    match spec {
        PatternSpec::Uniform {
            min_wait_ms,
            max_wait_ms,
        } => Box::new(UniformRandomPattern::new(
            Duration::from_millis(min_wait_ms),
            Duration::from_millis(max_wait_ms),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn waits_stay_within_bounds() {
        let pattern =
            UniformRandomPattern::new(Duration::from_millis(100), Duration::from_millis(500));
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..100 {
            let wait = pattern.next_wait(&mut rng);
            assert!(wait >= Duration::from_millis(100));
            assert!(wait <= Duration::from_millis(500));
        }
    }

    #[test]
    fn never_picks_itself() {
        let pattern =
            UniformRandomPattern::new(Duration::from_millis(1), Duration::from_millis(1));
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..50 {
            let pick = pattern.pick_receiver(1, &[1, 2, 3], &mut rng);
            assert!(matches!(pick, Some(2) | Some(3)));
        }
        assert_eq!(pattern.pick_receiver(1, &[1], &mut rng), None);
    }
}
