//! # Ironvale Sim
//!
//! Authoritative mob AI and combat simulation:
//! - Entity directory (mob and player vitals by id)
//! - Combat resolution (cooldowns, range, ammunition, damage, sessions)
//! - Mob AI state machine (idle, patrol, chase, attack, leash, death)
//! - Lifecycle (spawn points, death, loot requests, timed respawn)
//! - Event outbox and bus
//! - World definition loading

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

pub mod ai;
pub mod combat;
pub mod config;
pub mod damage;
pub mod directory;
pub mod events;
pub mod lifecycle;
pub mod mob;
pub mod session;
pub mod simulation;
pub mod world;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::ai::*;
    pub use crate::combat::*;
    pub use crate::config::*;
    pub use crate::damage::*;
    pub use crate::directory::*;
    pub use crate::events::*;
    pub use crate::lifecycle::*;
    pub use crate::mob::*;
    pub use crate::session::*;
    pub use crate::simulation::*;
    pub use crate::world::*;
}

pub use prelude::*;

#[cfg(test)]
mod tests {
    use super::*;
    use ironvale_common::{EntityId, SimTime, Vec3};
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn test_mob_health_stays_in_bounds(hits in prop::collection::vec(0u32..40, 0..20)) {
            let mut dir = EntityDirectory::new();
            let id = dir.next_mob_id();
            dir.insert_mob(directory::test_mob(id, MobKind::Orc, 5, Vec3::ZERO))
                .expect("insert");

            for (i, hit) in hits.into_iter().enumerate() {
                dir.apply_damage(id, hit, SimTime::from_secs(i as u64)).expect("damage");
                let mob = dir.mob(id).expect("mob");
                prop_assert!(mob.health <= mob.max_health);
                prop_assert_eq!(mob.health == 0, mob.state == AiState::Dead);
            }
        }

        #[test]
        fn test_sessions_stay_symmetric(
            hits in prop::collection::vec((1u64..6, 1u64..6, 0u64..30_000), 0..40),
        ) {
            let mut sessions = CombatSessions::new();
            let mut now = 0;
            for (a, b, dt) in hits {
                now += dt;
                if a != b {
                    sessions.record_hit(
                        EntityId::from_raw(a),
                        EntityId::from_raw(b),
                        WeaponCategory::Melee,
                        SimTime::from_millis(now),
                    );
                }
                sessions.sweep(SimTime::from_millis(now), std::time::Duration::from_secs(10));
                prop_assert!(sessions.is_symmetric());
            }
        }

        #[test]
        fn test_damage_within_bounds(
            weapon in 0u32..50,
            bonus in 0u32..50,
            defense in 0u32..100,
            roll in 0.0f32..1.0,
        ) {
            let input = DamageInput {
                weapon_damage: weapon,
                attribute_bonus: bonus,
                defense,
                defense_factor: 0.5,
            };
            let (low, high) = input.bounds(0.2);
            let damage = input.roll(0.2, roll);
            prop_assert!(damage >= low && damage <= high, "{} not in [{}, {}]", damage, low, high);
        }
    }

    #[test]
    fn test_prelude_exports() {
        let config = SimConfig::default();
        let sim = Simulation::new(config, SpawnRegistry::new());
        assert_eq!(sim.tick_count(), 0);
    }
}
