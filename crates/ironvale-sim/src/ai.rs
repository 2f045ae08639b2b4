//! Mob AI state machine.
//!
//! Each live mob is evaluated at most once per AI interval. The mob is cloned
//! out of the directory, stepped, written back, and only then does it strike,
//! so combat always sees the mob's post-move position.

use ironvale_common::{
    distance, horizontal_distance, offset_on_plane, step_toward, EntityId, SimTime, Vec3,
};
use std::f32::consts::TAU;
use thiserror::Error;
use tracing::{debug, trace};

use crate::combat::{AttackOutcome, CombatEngine};
use crate::config::SimConfig;
use crate::directory::EntityDirectory;
use crate::events::{Outbox, SimEvent};
use crate::mob::{AiState, Mob};

/// Errors raised while evaluating a single mob.
#[derive(Debug, Error)]
pub enum AiError {
    /// The mob id is not in the directory
    #[error("mob not found: {0}")]
    MobNotFound(EntityId),
    /// Health is outside `[0, max]`
    #[error("mob {mob} health {health} exceeds max {max}")]
    HealthOutOfRange {
        /// Mob id
        mob: EntityId,
        /// Current health
        health: u32,
        /// Max health
        max: u32,
    },
    /// Health and the dead state disagree
    #[error("mob {mob} has health {health} in state {state:?}")]
    DeathMismatch {
        /// Mob id
        mob: EntityId,
        /// Current health
        health: u32,
        /// Current state
        state: AiState,
    },
}

/// Result type for AI evaluation.
pub type AiResult<T> = Result<T, AiError>;

/// What [`MobAi::recover`] did with a broken mob.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recovery {
    /// Target cleared, heading home
    Returning,
    /// Health was zero; the mob is now dead and needs death handling
    Dead,
    /// Nothing to recover
    Missing,
}

/// Drives per-mob state transitions.
#[derive(Debug)]
pub struct MobAi {
    config: SimConfig,
    rng: fastrand::Rng,
}

impl MobAi {
    /// Creates the AI driver. Patrol waypoints use a stream derived from
    /// `config.rng_seed`.
    #[must_use]
    pub fn new(config: SimConfig) -> Self {
        let rng = fastrand::Rng::with_seed(config.rng_seed.rotate_left(17) ^ 0xA1);
        Self { config, rng }
    }

    /// Returns true if the mob's next AI slot has arrived.
    ///
    /// Slots are one interval apart. A tick up to half an interval early
    /// still counts, so host timer jitter does not skip a step.
    #[must_use]
    pub fn is_due(&self, mob: &Mob, now: SimTime) -> bool {
        let interval = self.config.ai_tick();
        mob.last_ai_tick
            .map_or(true, |last| now.saturating_since(last) + interval / 2 >= interval)
    }

    /// Slot recorded for an evaluation at `now`: one interval after the
    /// previous slot, or `now` if the mob fell behind.
    fn next_slot(&self, mob: &Mob, now: SimTime) -> SimTime {
        mob.last_ai_tick
            .map_or(now, |last| (last + self.config.ai_tick()).max(now))
    }

    /// Evaluates one mob.
    ///
    /// Returns the outcome of the attack the mob made this step, if any.
    pub fn tick_mob(
        &mut self,
        directory: &mut EntityDirectory,
        combat: &mut CombatEngine,
        id: EntityId,
        now: SimTime,
        outbox: &mut Outbox,
    ) -> AiResult<Option<AttackOutcome>> {
        let mut mob = directory.mob(id).cloned().ok_or(AiError::MobNotFound(id))?;
        check_invariants(&mob)?;

        if mob.is_dead() || !self.is_due(&mob, now) {
            return Ok(None);
        }
        mob.last_ai_tick = Some(self.next_slot(&mob, now));

        let start_position = mob.position;
        let mut transitions = Vec::new();
        let strike = self.step(&mut mob, directory, now, &mut transitions);

        let weapon = mob.weapon;
        let position = mob.position;
        if let Some(slot) = directory.mob_mut(id) {
            *slot = mob;
        }

        for (from, to) in transitions {
            trace!(mob = %id, from = from.as_str(), to = to.as_str(), "Mob state changed");
            outbox.push(SimEvent::MobStateChanged { mob: id, from, to });
        }
        if position != start_position {
            outbox.push(SimEvent::MobPositionUpdated { mob: id, position });
        }

        Ok(strike.map(|target| {
            combat.attempt_attack(directory, id, target, weapon, now, None, outbox)
        }))
    }

    /// Puts a mob whose evaluation failed back into a safe state.
    ///
    /// Health is clamped to max. A mob left at zero health is moved to the
    /// dead state; any other mob drops its target and heads home.
    pub fn recover(
        &self,
        directory: &mut EntityDirectory,
        id: EntityId,
        now: SimTime,
        outbox: &mut Outbox,
    ) -> Recovery {
        let Some(mob) = directory.mob_mut(id) else {
            return Recovery::Missing;
        };

        mob.health = mob.health.min(mob.max_health);
        let (changed, recovery) = if mob.health == 0 {
            mob.target = None;
            (mob.set_state(AiState::Dead, now), Recovery::Dead)
        } else {
            (mob.disengage(now), Recovery::Returning)
        };

        if let Some(from) = changed {
            outbox.push(SimEvent::MobStateChanged {
                mob: id,
                from,
                to: mob.state,
            });
        }
        recovery
    }

    /// Runs one step of the state machine. Returns a target to strike.
    fn step(
        &mut self,
        mob: &mut Mob,
        directory: &EntityDirectory,
        now: SimTime,
        transitions: &mut Vec<(AiState, AiState)>,
    ) -> Option<EntityId> {
        let mut enter = |mob: &mut Mob, state: AiState| {
            if let Some(from) = mob.set_state(state, now) {
                transitions.push((from, state));
            }
        };

        match mob.state {
            AiState::Idle => {
                if let Some(target) = self.scan(mob, directory) {
                    debug!(mob = %mob.id, %target, "Aggro");
                    mob.target = Some(target);
                    enter(mob, AiState::Chasing);
                } else if mob.patrol_radius > 0.0
                    && now.saturating_since(mob.state_since) >= self.config.patrol_interval()
                {
                    mob.patrol_waypoint = Some(self.pick_waypoint(mob.home, mob.patrol_radius));
                    enter(mob, AiState::Patrolling);
                }
                None
            },
            AiState::Patrolling => {
                if let Some(target) = self.scan(mob, directory) {
                    debug!(mob = %mob.id, %target, "Aggro while patrolling");
                    mob.target = Some(target);
                    mob.patrol_waypoint = None;
                    enter(mob, AiState::Chasing);
                    return None;
                }

                let waypoint = match mob.patrol_waypoint {
                    Some(waypoint) => waypoint,
                    None => {
                        let waypoint = self.pick_waypoint(mob.home, mob.patrol_radius);
                        mob.patrol_waypoint = Some(waypoint);
                        waypoint
                    },
                };
                mob.position = step_toward(mob.position, waypoint, self.config.move_step);
                if horizontal_distance(mob.position, waypoint) <= self.config.arrival_epsilon {
                    mob.patrol_waypoint = None;
                    enter(mob, AiState::Idle);
                }
                None
            },
            AiState::Chasing => {
                let Some((target, target_pos)) = live_target(mob, directory) else {
                    mob.target = None;
                    enter(mob, AiState::Returning);
                    return None;
                };

                if distance(mob.position, mob.home) > self.config.max_chase_distance {
                    debug!(mob = %mob.id, %target, "Leashed");
                    mob.target = None;
                    enter(mob, AiState::Returning);
                    return None;
                }

                let range = self.config.engagement_range(mob.weapon);
                if distance(mob.position, target_pos) <= range {
                    enter(mob, AiState::Attacking);
                    return Some(target);
                }

                mob.position = step_toward(mob.position, target_pos, self.config.move_step);
                None
            },
            AiState::Attacking => {
                let Some((target, target_pos)) = live_target(mob, directory) else {
                    mob.target = None;
                    enter(mob, AiState::Returning);
                    return None;
                };

                if distance(mob.position, target_pos) > self.config.disengage_range(mob.weapon) {
                    enter(mob, AiState::Chasing);
                    return None;
                }
                // Between engagement and disengage range the mob holds position and
                // its swings are rejected as out of range.
                // TODO: step toward the target in that band instead of standing still.
                Some(target)
            },
            AiState::Returning => {
                mob.position = step_toward(mob.position, mob.home, self.config.move_step);
                if distance(mob.position, mob.home) <= self.config.arrival_epsilon {
                    mob.position = mob.home;
                    enter(mob, AiState::Idle);
                }
                None
            },
            AiState::Dead => None,
        }
    }

    /// First live player in directory order that this mob will aggro.
    // TODO: prefer the nearest eligible player instead of the first found.
    fn scan(&self, mob: &Mob, directory: &EntityDirectory) -> Option<EntityId> {
        if !mob.aggressive {
            return None;
        }
        let rule = mob.kind.aggro_rule();
        directory
            .live_players()
            .find(|player| {
                distance(mob.position, player.position) <= mob.aggro_radius
                    && rule.permits(mob.level, player.level, self.config.aggro_level_threshold)
            })
            .map(|player| player.id)
    }

    fn pick_waypoint(&mut self, home: Vec3, radius: f32) -> Vec3 {
        let angle = self.rng.f32() * TAU;
        let reach = self.rng.f32().sqrt() * radius;
        offset_on_plane(home, angle, reach)
    }
}

fn live_target(mob: &Mob, directory: &EntityDirectory) -> Option<(EntityId, Vec3)> {
    let target = mob.target?;
    directory
        .combat_profile(target)
        .filter(|profile| profile.alive)
        .map(|profile| (target, profile.position))
}

fn check_invariants(mob: &Mob) -> AiResult<()> {
    if mob.health > mob.max_health {
        return Err(AiError::HealthOutOfRange {
            mob: mob.id,
            health: mob.health,
            max: mob.max_health,
        });
    }
    if (mob.health == 0) != mob.is_dead() {
        return Err(AiError::DeathMismatch {
            mob: mob.id,
            health: mob.health,
            state: mob.state,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::test_mob;
    use crate::directory::PlayerRecord;
    use crate::mob::MobKind;

    struct Harness {
        ai: MobAi,
        combat: CombatEngine,
        dir: EntityDirectory,
        outbox: Outbox,
        mob: EntityId,
    }

    impl Harness {
        fn new(kind: MobKind, level: u32, home: Vec3) -> Self {
            let config = SimConfig::default();
            let mut dir = EntityDirectory::new();
            let mob = dir.next_mob_id();
            dir.insert_mob(test_mob(mob, kind, level, home)).expect("insert");
            Self {
                ai: MobAi::new(config.clone()),
                combat: CombatEngine::new(config),
                dir,
                outbox: Outbox::new(),
                mob,
            }
        }

        fn add_player(&mut self, raw: u64, level: u32, position: Vec3) -> EntityId {
            let id = EntityId::from_raw(raw);
            self.dir
                .sync_player(PlayerRecord::new(id, level, position, 100))
                .expect("sync");
            id
        }

        fn tick(&mut self, millis: u64) -> Option<AttackOutcome> {
            self.ai
                .tick_mob(
                    &mut self.dir,
                    &mut self.combat,
                    self.mob,
                    SimTime::from_millis(millis),
                    &mut self.outbox,
                )
                .expect("tick")
        }

        fn state(&self) -> AiState {
            self.dir.mob(self.mob).map(|m| m.state).expect("mob")
        }

        fn mob(&self) -> &Mob {
            self.dir.mob(self.mob).expect("mob")
        }
    }

    #[test]
    fn test_idle_acquires_target_in_radius() {
        let mut h = Harness::new(MobKind::Goblin, 5, Vec3::new(10.0, 0.0, 0.0));
        let player = h.add_player(1, 3, Vec3::new(10.0, 0.0, 6.0));

        h.tick(0);
        assert_eq!(h.state(), AiState::Chasing);
        assert_eq!(h.mob().target, Some(player));
        assert!(h.outbox.iter().any(|e| matches!(
            e,
            SimEvent::MobStateChanged { from: AiState::Idle, to: AiState::Chasing, .. }
        )));
    }

    #[test]
    fn test_level_gate_blocks_aggro() {
        let mut h = Harness::new(MobKind::Goblin, 5, Vec3::ZERO);
        h.add_player(1, 30, Vec3::new(0.0, 0.0, 3.0));

        h.tick(0);
        assert_eq!(h.state(), AiState::Idle);
        assert!(h.mob().target.is_none());
    }

    #[test]
    fn test_passive_mob_ignores_players() {
        let mut h = Harness::new(MobKind::Wolf, 5, Vec3::ZERO);
        if let Some(m) = h.dir.mob_mut(h.mob) {
            m.aggressive = false;
        }
        h.add_player(1, 1, Vec3::new(0.0, 0.0, 1.0));

        h.tick(0);
        assert_eq!(h.state(), AiState::Idle);
    }

    #[test]
    fn test_first_player_in_directory_order_wins() {
        let mut h = Harness::new(MobKind::Goblin, 5, Vec3::ZERO);
        let far = h.add_player(1, 3, Vec3::new(0.0, 0.0, 7.0));
        h.add_player(2, 3, Vec3::new(0.0, 0.0, 1.0));

        h.tick(0);
        assert_eq!(h.mob().target, Some(far));
    }

    #[test]
    fn test_rejoined_player_does_not_jump_the_queue() {
        let mut h = Harness::new(MobKind::Goblin, 5, Vec3::ZERO);
        let leaving = h.add_player(1, 3, Vec3::new(0.0, 0.0, 1.0));
        let staying = h.add_player(2, 3, Vec3::new(0.0, 0.0, 6.0));
        h.dir.remove_player(leaving).expect("remove");
        h.add_player(3, 3, Vec3::new(0.0, 0.0, 1.0));

        h.tick(0);
        assert_eq!(h.mob().target, Some(staying));
    }

    #[test]
    fn test_ai_gated_by_interval() {
        let mut h = Harness::new(MobKind::Goblin, 5, Vec3::ZERO);
        h.add_player(1, 3, Vec3::new(0.0, 0.0, 7.0));

        h.tick(0);
        let after_first = h.mob().position;
        h.tick(100);
        assert_eq!(h.mob().position, after_first);
        h.tick(500);
        assert_ne!(h.mob().position, after_first);
    }

    #[test]
    fn test_jittered_ticks_still_evaluate() {
        let mut h = Harness::new(MobKind::Goblin, 5, Vec3::ZERO);
        h.add_player(1, 3, Vec3::new(0.0, 0.0, 7.0));

        let mut evaluated = 0;
        for millis in [3, 501, 1_002, 1_501, 2_003, 2_502] {
            let before = h.mob().last_ai_tick;
            h.tick(millis);
            if h.mob().last_ai_tick != before {
                evaluated += 1;
            }
        }
        assert_eq!(evaluated, 6);
        assert_eq!(h.mob().last_ai_tick, Some(SimTime::from_millis(2_503)));
    }

    #[test]
    fn test_frequent_ticks_keep_interval_rate() {
        let mut h = Harness::new(MobKind::Goblin, 5, Vec3::ZERO);
        h.add_player(1, 3, Vec3::new(0.0, 0.0, 7.0));

        let mut evaluated = 0;
        for millis in (0..=2_000).step_by(100) {
            let before = h.mob().last_ai_tick;
            h.tick(millis);
            if h.mob().last_ai_tick != before {
                evaluated += 1;
            }
        }
        assert_eq!(evaluated, 5);
    }

    #[test]
    fn test_chase_then_attack() {
        let mut h = Harness::new(MobKind::Goblin, 5, Vec3::ZERO);
        let player = h.add_player(1, 3, Vec3::new(0.0, 0.0, 5.0));

        h.tick(0); // acquire
        h.tick(500); // 5 -> 3
        assert_eq!(h.state(), AiState::Chasing);
        assert!(h.outbox.iter().any(|e| matches!(e, SimEvent::MobPositionUpdated { .. })));
        h.tick(1_000); // 3 -> 1
        assert_eq!(h.state(), AiState::Chasing);

        let outcome = h.tick(1_500).expect("attack attempted");
        assert_eq!(h.state(), AiState::Attacking);
        assert_eq!(outcome.hit().map(|r| r.target), Some(player));
    }

    #[test]
    fn test_attacking_falls_back_to_chasing() {
        let mut h = Harness::new(MobKind::Goblin, 5, Vec3::ZERO);
        let player = h.add_player(1, 3, Vec3::new(0.0, 0.0, 1.0));

        h.tick(0);
        h.tick(500);
        assert_eq!(h.state(), AiState::Attacking);

        // 1.5x melee range is 3.0
        h.dir
            .sync_player(PlayerRecord::new(player, 3, Vec3::new(0.0, 0.0, 2.9), 100))
            .expect("sync");
        h.tick(1_000);
        assert_eq!(h.state(), AiState::Attacking);

        h.dir
            .sync_player(PlayerRecord::new(player, 3, Vec3::new(0.0, 0.0, 3.5), 100))
            .expect("sync");
        h.tick(1_500);
        assert_eq!(h.state(), AiState::Chasing);
    }

    #[test]
    fn test_leash_returns_home() {
        let mut h = Harness::new(MobKind::Goblin, 5, Vec3::ZERO);
        let player = h.add_player(1, 3, Vec3::new(0.0, 0.0, 6.0));
        h.tick(0);
        assert_eq!(h.state(), AiState::Chasing);

        // Drag the mob past the leash distance.
        if let Some(m) = h.dir.mob_mut(h.mob) {
            m.position = Vec3::new(0.0, 0.0, 31.0);
        }
        h.dir
            .sync_player(PlayerRecord::new(player, 3, Vec3::new(0.0, 0.0, 40.0), 100))
            .expect("sync");

        h.tick(500);
        assert_eq!(h.state(), AiState::Returning);
        assert!(h.mob().target.is_none());

        let mut now = 500;
        while h.state() == AiState::Returning && now < 60_000 {
            now += 500;
            h.tick(now);
        }
        assert_eq!(h.state(), AiState::Idle);
        assert_eq!(h.mob().position, Vec3::ZERO);
    }

    #[test]
    fn test_dead_target_sends_mob_home() {
        let mut h = Harness::new(MobKind::Goblin, 5, Vec3::ZERO);
        let player = h.add_player(1, 3, Vec3::new(0.0, 0.0, 5.0));
        h.tick(0);

        h.dir
            .sync_player(PlayerRecord::new(player, 3, Vec3::new(0.0, 0.0, 5.0), 100).with_health(0))
            .expect("sync");
        h.tick(500);
        assert_eq!(h.state(), AiState::Returning);
    }

    #[test]
    fn test_patrol_wanders_and_returns_to_idle() {
        let mut h = Harness::new(MobKind::Wolf, 2, Vec3::ZERO);
        if let Some(m) = h.dir.mob_mut(h.mob) {
            m.patrol_radius = 4.0;
        }

        h.tick(0);
        assert_eq!(h.state(), AiState::Idle);
        h.tick(8_000);
        assert_eq!(h.state(), AiState::Patrolling);
        let waypoint = h.mob().patrol_waypoint.expect("waypoint");
        assert!(horizontal_distance(waypoint, Vec3::ZERO) <= 4.0 + 0.001);

        let mut now = 8_000;
        while h.state() == AiState::Patrolling && now < 20_000 {
            now += 500;
            h.tick(now);
        }
        assert_eq!(h.state(), AiState::Idle);
        assert!(horizontal_distance(h.mob().position, Vec3::ZERO) <= 4.0 + 0.001);
    }

    #[test]
    fn test_missing_mob_is_error() {
        let mut h = Harness::new(MobKind::Goblin, 5, Vec3::ZERO);
        let ghost = EntityId::from_raw(ironvale_common::MOB_ID_BASE + 99);
        let result = h
            .ai
            .tick_mob(&mut h.dir, &mut h.combat, ghost, SimTime::ZERO, &mut h.outbox);
        assert!(matches!(result, Err(AiError::MobNotFound(_))));
    }

    #[test]
    fn test_recover_resets_to_returning() {
        let mut h = Harness::new(MobKind::Goblin, 5, Vec3::ZERO);
        if let Some(m) = h.dir.mob_mut(h.mob) {
            m.state = AiState::Chasing;
            m.target = Some(EntityId::from_raw(1));
            m.health = 500;
        }

        let recovery = h.ai.recover(&mut h.dir, h.mob, SimTime::ZERO, &mut h.outbox);
        assert_eq!(recovery, Recovery::Returning);
        assert_eq!(h.state(), AiState::Returning);
        assert!(h.mob().target.is_none());
        assert_eq!(h.mob().health, h.mob().max_health);
    }

    #[test]
    fn test_recover_zero_health_marks_dead() {
        let mut h = Harness::new(MobKind::Goblin, 5, Vec3::ZERO);
        if let Some(m) = h.dir.mob_mut(h.mob) {
            m.health = 0;
        }
        assert_eq!(h.ai.recover(&mut h.dir, h.mob, SimTime::ZERO, &mut h.outbox), Recovery::Dead);
        assert!(h.mob().invariants_hold());
    }
}
