//! Combat resolution engine.
//!
//! Validates attack attempts (cooldown, range, ammunition), rolls damage,
//! applies it through the [`EntityDirectory`] and maintains combat sessions.
//! Rejections are ordinary outcomes rather than errors.

use ahash::AHashMap;
use ironvale_common::{distance, DirectoryError, EntityId, SimTime};
use thiserror::Error;
use tracing::{debug, trace, warn};

use crate::config::SimConfig;
use crate::damage::DamageInput;
use crate::directory::EntityDirectory;
use crate::events::{Outbox, SimEvent};
use crate::mob::WeaponCategory;
use crate::session::{CombatEndReason, CombatSessions, EndedSession};

/// Errors from applying already-resolved damage.
#[derive(Debug, Error)]
pub enum CombatError {
    /// Attacker or target is not in the directory
    #[error(transparent)]
    Directory(#[from] DirectoryError),
    /// Target is already at zero health
    #[error("target already defeated: {0}")]
    TargetDefeated(EntityId),
    /// Attacker and target are the same entity
    #[error("entity cannot attack itself: {0}")]
    SelfTarget(EntityId),
}

/// Result type for combat operations.
pub type CombatResult<T> = Result<T, CombatError>;

/// Inventory collaborator that owns player ammunition.
pub trait AmmoSource: Send {
    /// Consumes one unit of ammunition for `player`. Returns false if none
    /// is available. Must not block.
    fn try_consume(&mut self, player: EntityId) -> bool;
}

/// Why an attack attempt was refused.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AttackRejection {
    /// Attacker attempted again within the cooldown window
    Cooldown {
        /// Earliest time the next attempt is accepted
        ready_at: SimTime,
    },
    /// Target beyond the weapon's engagement range
    OutOfRange {
        /// Actual distance
        distance: f32,
        /// Engagement range
        range: f32,
    },
    /// Ranged player attack with no ammunition
    NoAmmo,
    /// Attacker unknown, dead, or targeting itself
    InvalidAttacker,
    /// Target unknown or dead
    InvalidTarget,
}

/// A landed hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HitReport {
    /// Attacker
    pub attacker: EntityId,
    /// Target
    pub target: EntityId,
    /// Damage applied
    pub damage: u32,
    /// Weapon category used
    pub weapon: WeaponCategory,
    /// Target health after the hit
    pub remaining_health: u32,
    /// True if the hit brought the target to zero
    pub killed: bool,
}

/// Outcome of [`CombatEngine::attempt_attack`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AttackOutcome {
    /// The attack landed
    Hit(HitReport),
    /// The attack was refused
    Rejected(AttackRejection),
}

impl AttackOutcome {
    /// The hit report, if the attack landed.
    #[must_use]
    pub const fn hit(&self) -> Option<&HitReport> {
        match self {
            Self::Hit(report) => Some(report),
            Self::Rejected(_) => None,
        }
    }

    /// Returns true if the attack landed and killed its target.
    #[must_use]
    pub fn is_kill(&self) -> bool {
        self.hit().is_some_and(|report| report.killed)
    }
}

/// Combat resolution engine.
#[derive(Debug)]
pub struct CombatEngine {
    config: SimConfig,
    /// Last attempt that passed the cooldown gate, per attacker
    cooldowns: AHashMap<EntityId, SimTime>,
    sessions: CombatSessions,
    rng: fastrand::Rng,
    warned_missing_ammo: bool,
}

impl CombatEngine {
    /// Creates an engine seeded from `config.rng_seed`.
    #[must_use]
    pub fn new(config: SimConfig) -> Self {
        let rng = fastrand::Rng::with_seed(config.rng_seed);
        Self {
            config,
            cooldowns: AHashMap::new(),
            sessions: CombatSessions::new(),
            rng,
            warned_missing_ammo: false,
        }
    }

    /// Combat sessions.
    #[must_use]
    pub fn sessions(&self) -> &CombatSessions {
        &self.sessions
    }

    /// Time of the last recorded attempt by `attacker`.
    #[must_use]
    pub fn last_attempt(&self, attacker: EntityId) -> Option<SimTime> {
        self.cooldowns.get(&attacker).copied()
    }

    /// Validates and resolves one attack.
    ///
    /// Checks run in order: cooldown, range, ammunition. A cooldown rejection
    /// changes nothing; any attempt past the cooldown gate records its time.
    /// `ammo` is consulted only for ranged attacks made by players.
    #[allow(clippy::too_many_arguments)]
    pub fn attempt_attack(
        &mut self,
        directory: &mut EntityDirectory,
        attacker: EntityId,
        target: EntityId,
        weapon: WeaponCategory,
        now: SimTime,
        ammo: Option<&mut dyn AmmoSource>,
        outbox: &mut Outbox,
    ) -> AttackOutcome {
        let Some(attacker_profile) = directory.combat_profile(attacker) else {
            return AttackOutcome::Rejected(AttackRejection::InvalidAttacker);
        };
        if !attacker_profile.alive || attacker == target {
            return AttackOutcome::Rejected(AttackRejection::InvalidAttacker);
        }

        // 1. Cooldown
        if let Some(last) = self.cooldowns.get(&attacker) {
            let ready_at = *last + self.config.attack_cooldown();
            if !now.has_reached(ready_at) {
                trace!(%attacker, ?ready_at, "Attack rejected: cooldown");
                return AttackOutcome::Rejected(AttackRejection::Cooldown { ready_at });
            }
        }
        self.cooldowns.insert(attacker, now);

        let Some(target_profile) = directory.combat_profile(target).filter(|p| p.alive) else {
            debug!(%attacker, %target, "Attack rejected: invalid target");
            return AttackOutcome::Rejected(AttackRejection::InvalidTarget);
        };

        // 2. Range (inclusive)
        let range = self.config.engagement_range(weapon);
        let dist = distance(attacker_profile.position, target_profile.position);
        if dist > range {
            debug!(%attacker, %target, distance = dist, range, "Attack rejected: out of range");
            return AttackOutcome::Rejected(AttackRejection::OutOfRange {
                distance: dist,
                range,
            });
        }

        // 3. Ammunition
        if weapon == WeaponCategory::Ranged && attacker.is_player() {
            match ammo {
                Some(source) => {
                    if !source.try_consume(attacker) {
                        debug!(%attacker, "Attack rejected: no ammunition");
                        outbox.push(SimEvent::CombatNoAmmo { player: attacker });
                        return AttackOutcome::Rejected(AttackRejection::NoAmmo);
                    }
                },
                None => {
                    if !self.warned_missing_ammo {
                        warn!(
                            "No ammunition source attached; ranged attacks will not consume ammo"
                        );
                        self.warned_missing_ammo = true;
                    }
                },
            }
        }

        // 4. Damage
        let input = DamageInput::between(&attacker_profile, &target_profile, weapon, &self.config);
        let damage = input.roll(self.config.damage_variance, self.rng.f32());

        // 5/6. Apply
        match self.apply_hit(directory, attacker, target, damage, weapon, now, outbox) {
            Ok(report) => AttackOutcome::Hit(report),
            Err(err) => {
                debug!(%attacker, %target, error = %err, "Attack could not be applied");
                AttackOutcome::Rejected(AttackRejection::InvalidTarget)
            },
        }
    }

    /// Applies already-resolved damage without range, cooldown or ammo checks.
    ///
    /// Opens or refreshes the session pair and emits `combat:hit`. A killing
    /// hit closes the pair and, for players, emits `player:defeated`; mob
    /// deaths are left to the caller.
    #[allow(clippy::too_many_arguments)]
    pub fn apply_hit(
        &mut self,
        directory: &mut EntityDirectory,
        attacker: EntityId,
        target: EntityId,
        damage: u32,
        weapon: WeaponCategory,
        now: SimTime,
        outbox: &mut Outbox,
    ) -> CombatResult<HitReport> {
        if attacker == target {
            return Err(CombatError::SelfTarget(attacker));
        }
        if !directory.contains(attacker) {
            return Err(DirectoryError::NotFound(attacker).into());
        }
        if !directory.is_alive(target) {
            if directory.contains(target) {
                return Err(CombatError::TargetDefeated(target));
            }
            return Err(DirectoryError::NotFound(target).into());
        }

        let applied = directory.apply_damage(target, damage, now)?;

        let update = self.sessions.record_hit(attacker, target, weapon, now);
        for ended in update.ended {
            outbox.push(ended_event(ended));
        }
        if update.opened {
            outbox.push(SimEvent::CombatEntered { attacker, target });
        }

        outbox.push(SimEvent::CombatHit {
            attacker,
            target,
            damage: applied.applied,
            weapon_category: weapon,
            remaining_health: applied.remaining,
        });
        debug!(
            %attacker,
            %target,
            damage = applied.applied,
            remaining = applied.remaining,
            weapon = weapon.as_str(),
            "Hit"
        );

        if applied.killed {
            if let Some(ended) = self.sessions.end(target, CombatEndReason::Death) {
                outbox.push(ended_event(ended));
            }
            if target.is_player() {
                debug!(player = %target, killer = %attacker, "Player defeated");
                outbox.push(SimEvent::PlayerDefeated {
                    player: target,
                    killer: Some(attacker),
                });
            }
        }

        Ok(HitReport {
            attacker,
            target,
            damage: applied.applied,
            weapon,
            remaining_health: applied.remaining,
            killed: applied.killed,
        })
    }

    /// Closes sessions idle longer than the combat timeout.
    pub fn sweep_expired(&mut self, now: SimTime, outbox: &mut Outbox) -> Vec<EndedSession> {
        let ended = self.sessions.sweep(now, self.config.combat_timeout());
        for closed in &ended {
            outbox.push(ended_event(*closed));
        }
        ended
    }

    /// Drops all combat state held for `id`.
    pub fn forget(&mut self, id: EntityId, reason: CombatEndReason, outbox: &mut Outbox) {
        self.cooldowns.remove(&id);
        if let Some(ended) = self.sessions.end(id, reason) {
            outbox.push(ended_event(ended));
        }
    }
}

fn ended_event(ended: EndedSession) -> SimEvent {
    SimEvent::CombatEnded {
        a: ended.a,
        b: ended.b,
        reason: ended.reason,
    }
}

/// Mock inventory for testing.
#[cfg(test)]
#[derive(Debug, Default)]
pub(crate) struct MockAmmo {
    pub(crate) stock: std::collections::HashMap<EntityId, u32>,
    pub(crate) consumed: Vec<EntityId>,
}

#[cfg(test)]
impl MockAmmo {
    pub(crate) fn with_stock(player: EntityId, count: u32) -> Self {
        let mut ammo = Self::default();
        ammo.stock.insert(player, count);
        ammo
    }
}

#[cfg(test)]
impl AmmoSource for MockAmmo {
    fn try_consume(&mut self, player: EntityId) -> bool {
        match self.stock.get_mut(&player) {
            Some(count) if *count > 0 => {
                *count -= 1;
                self.consumed.push(player);
                true
            },
            _ => false,
        }
    }
}
