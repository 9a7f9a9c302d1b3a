use fleet_core::{Envelope, Message};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::{trace, warn};

/// Carries envelopes through their text form, losing and duplicating some.
///
/// Every message is encoded and decoded on the way across, so anything the
/// codec cannot carry shows up here as `undecodable`.
#[derive(Debug, Clone)]
pub struct LossyBus {
    rng: ChaCha8Rng,
    drop_chance: f64,
    duplicate_chance: f64,
    pub carried: u64,
    pub dropped: u64,
    pub duplicated: u64,
    pub undecodable: u64,
}

impl LossyBus {
    pub fn new(seed: u64, drop_chance: f64, duplicate_chance: f64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
            drop_chance,
            duplicate_chance,
            carried: 0,
            dropped: 0,
            duplicated: 0,
            undecodable: 0,
        }
    }

    pub fn lossless() -> Self {
        Self::new(0, 0.0, 0.0)
    }

    fn roll(&mut self, chance: f64) -> bool {
        chance > 0.0 && self.rng.gen::<f64>() < chance
    }

    pub fn carry(&mut self, envelopes: Vec<Envelope>) -> Vec<Envelope> {
        let mut arrived = Vec::with_capacity(envelopes.len());
        for envelope in envelopes {
            if self.roll(self.drop_chance) {
                trace!(verb = envelope.message.verb(), "lost on the bus");
                self.dropped += 1;
                continue;
            }
            let text = envelope.message.encode();
            let message = match Message::decode(&text) {
                Ok(message) => message,
                Err(err) => {
                    warn!(%err, text, "undecodable message on the bus");
                    self.undecodable += 1;
                    continue;
                }
            };
            let envelope = Envelope {
                message,
                ..envelope
            };
            if self.roll(self.duplicate_chance) {
                self.duplicated += 1;
                arrived.push(envelope.clone());
            }
            self.carried += 1;
            arrived.push(envelope);
        }
        arrived
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleet_core::Waypoint;

    fn traffic(n: usize) -> Vec<Envelope> {
        (0..n)
            .map(|i| {
                Envelope::broadcast(
                    format!("peer_{i}").into(),
                    Message::RemoveConsumer {
                        unit: "Ice".into(),
                        waypoint: Waypoint::new("dock", 1.5, -2.25, 1e6),
                    },
                )
            })
            .collect()
    }

    #[test]
    fn lossless_bus_carries_everything_intact() {
        let mut bus = LossyBus::lossless();
        let sent = traffic(20);
        let arrived = bus.carry(sent.clone());
        assert_eq!(arrived, sent);
        assert_eq!(bus.carried, 20);
    }

    #[test]
    fn same_seed_same_losses() {
        let mut a = LossyBus::new(9, 0.3, 0.2);
        let mut b = LossyBus::new(9, 0.3, 0.2);
        assert_eq!(a.carry(traffic(200)), b.carry(traffic(200)));
        assert!(a.dropped > 0);
        assert!(a.duplicated > 0);
        assert_eq!(a.carried, 200 - a.dropped);
    }

    #[test]
    fn certain_loss_drops_everything() {
        let mut bus = LossyBus::new(1, 1.0, 0.0);
        assert!(bus.carry(traffic(10)).is_empty());
        assert_eq!(bus.dropped, 10);
    }
}
