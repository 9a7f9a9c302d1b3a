use rand::Rng;
use uuid::Uuid;

use crate::{Clock, Counters, EntityId, MissionId};

/// Generate a deterministic v4-format UUID from a seeded RNG.
pub fn generate_uuid(rng: &mut impl Rng) -> Uuid {
    let bytes: [u8; 16] = rng.gen();
    uuid::Builder::from_random_bytes(bytes).into_uuid()
}

/// Fresh allocator identity for a network that did not configure one.
pub fn generate_allocator_id(rng: &mut impl Rng) -> EntityId {
    EntityId(format!("allocator_{}", generate_uuid(rng).simple()))
}

/// Time-based mission token. The sequence suffix keeps ids distinct when two
/// missions are created within the same millisecond.
pub(crate) fn next_mission_id(clock: &dyn Clock, counters: &mut Counters) -> MissionId {
    let seq = counters.next_mission_seq;
    counters.next_mission_seq += 1;
    MissionId(format!("msn_{}_{:04}", clock.now_millis(), seq))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FixedClock;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn deterministic_uuid_from_same_seed() {
        let mut rng1 = ChaCha8Rng::seed_from_u64(42);
        let mut rng2 = ChaCha8Rng::seed_from_u64(42);
        let id1 = generate_uuid(&mut rng1);
        let id2 = generate_uuid(&mut rng2);
        assert_eq!(id1, id2);
        assert_eq!(id1.get_version(), Some(uuid::Version::Random));
    }

    #[test]
    fn allocator_ids_have_prefix() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let id = generate_allocator_id(&mut rng);
        assert!(id.as_str().starts_with("allocator_"));
        assert_eq!(id.as_str().len(), "allocator_".len() + 32);
    }

    #[test]
    fn mission_ids_stay_distinct_within_one_millisecond() {
        let clock = FixedClock(1_700_000_000_000);
        let mut counters = Counters::default();
        let a = next_mission_id(&clock, &mut counters);
        let b = next_mission_id(&clock, &mut counters);
        assert_ne!(a, b);
        assert_eq!(a.as_str(), "msn_1700000000000_0000");
        assert_eq!(counters.next_mission_seq, 2);
    }
}
