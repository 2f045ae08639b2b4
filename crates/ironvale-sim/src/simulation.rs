//! Simulation root: owns the directory, combat engine, AI and lifecycle, and
//! runs them in a fixed phase order once per tick.

use crossbeam_channel::Receiver;
use ironvale_common::{DirectoryError, EntityId, SimTime};
use std::collections::VecDeque;
use std::fmt;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, error, info, trace};

use crate::ai::{MobAi, Recovery};
use crate::combat::{AmmoSource, AttackOutcome, CombatEngine, CombatResult, HitReport};
use crate::config::SimConfig;
use crate::directory::{EntityDirectory, PlayerRecord};
use crate::events::{EventBus, Outbox, SimEvent};
use crate::lifecycle::{LifecycleManager, LootRoller, SpawnRegistry};
use crate::mob::{Mob, WeaponCategory};
use crate::session::CombatEndReason;
use crate::world::{load_world, WorldLoadError};

/// Errors surfaced by the simulation root.
#[derive(Debug, Error)]
pub enum SimError {
    /// Directory lookup or registration failed
    #[error(transparent)]
    Directory(#[from] DirectoryError),
    /// World definition could not be loaded
    #[error(transparent)]
    World(#[from] WorldLoadError),
}

/// Result type for simulation operations.
pub type SimResult<T> = Result<T, SimError>;

/// A player attack waiting for the next tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlayerAttack {
    /// Attacking player
    pub attacker: EntityId,
    /// Target entity
    pub target: EntityId,
    /// Weapon override; the player's equipped weapon if `None`
    pub weapon: Option<WeaponCategory>,
}

/// Authoritative mob and combat simulation.
pub struct Simulation {
    config: SimConfig,
    clock: SimTime,
    tick_count: u64,
    directory: EntityDirectory,
    combat: CombatEngine,
    ai: MobAi,
    lifecycle: LifecycleManager,
    attack_queue: VecDeque<PlayerAttack>,
    ammo: Option<Box<dyn AmmoSource>>,
    loot: Option<Box<dyn LootRoller>>,
    bus: Option<EventBus>,
    outbox: Outbox,
}

impl fmt::Debug for Simulation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Simulation")
            .field("clock", &self.clock)
            .field("tick_count", &self.tick_count)
            .field("mobs", &self.directory.mob_count())
            .field("players", &self.directory.player_count())
            .field("queued_attacks", &self.attack_queue.len())
            .field("ammo_source", &self.ammo.is_some())
            .field("loot_roller", &self.loot.is_some())
            .finish_non_exhaustive()
    }
}

impl Simulation {
    /// Creates a simulation over a validated spawn registry.
    #[must_use]
    pub fn new(config: SimConfig, registry: SpawnRegistry) -> Self {
        Self {
            combat: CombatEngine::new(config.clone()),
            ai: MobAi::new(config.clone()),
            lifecycle: LifecycleManager::new(config.clone(), registry),
            config,
            clock: SimTime::ZERO,
            tick_count: 0,
            directory: EntityDirectory::new(),
            attack_queue: VecDeque::new(),
            ammo: None,
            loot: None,
            bus: None,
            outbox: Outbox::new(),
        }
    }

    /// Creates a simulation from a TOML world file.
    pub fn from_world_file(config: SimConfig, path: &Path) -> SimResult<Self> {
        let registry = load_world(path)?;
        Ok(Self::new(config, registry))
    }

    /// Populates every spawn point and returns the spawn events.
    pub fn start(&mut self, now: SimTime) -> SimResult<Vec<SimEvent>> {
        self.clock = self.clock.max(now);
        let created = self
            .lifecycle
            .populate(&mut self.directory, self.clock, &mut self.outbox)?;
        info!(mobs = created, "Simulation started");
        Ok(self.flush())
    }

    /// Attaches the inventory collaborator.
    pub fn set_ammo_source(&mut self, source: Box<dyn AmmoSource>) {
        self.ammo = Some(source);
    }

    /// Attaches the loot collaborator.
    pub fn set_loot_roller(&mut self, roller: Box<dyn LootRoller>) {
        self.loot = Some(roller);
    }

    /// Creates the event bus (if needed) and returns a subscriber handle.
    pub fn attach_event_bus(&mut self, capacity: usize) -> Receiver<SimEvent> {
        self.bus
            .get_or_insert_with(|| EventBus::new(capacity))
            .subscribe()
    }

    /// Inserts or replaces a player record.
    pub fn sync_player(&mut self, record: PlayerRecord) -> SimResult<()> {
        self.directory.sync_player(record)?;
        Ok(())
    }

    /// Removes a player, closing its combat session.
    ///
    /// Mobs targeting the player return home on their next AI step.
    pub fn remove_player(&mut self, id: EntityId) -> SimResult<PlayerRecord> {
        let record = self.directory.remove_player(id)?;
        self.combat
            .forget(id, CombatEndReason::Departed, &mut self.outbox);
        self.attack_queue.retain(|attack| attack.attacker != id);
        debug!(player = %id, "Player removed");
        Ok(record)
    }

    /// Queues a player attack for the next tick.
    pub fn queue_attack(
        &mut self,
        attacker: EntityId,
        target: EntityId,
        weapon: Option<WeaponCategory>,
    ) {
        self.attack_queue.push_back(PlayerAttack {
            attacker,
            target,
            weapon,
        });
    }

    /// Applies already-resolved damage, bypassing range, cooldown and ammo.
    ///
    /// Events are delivered with the next tick.
    pub fn apply_hit(
        &mut self,
        attacker: EntityId,
        target: EntityId,
        damage: u32,
        weapon: WeaponCategory,
    ) -> CombatResult<HitReport> {
        let report = self.combat.apply_hit(
            &mut self.directory,
            attacker,
            target,
            damage,
            weapon,
            self.clock,
            &mut self.outbox,
        )?;
        self.after_hit(&report);
        Ok(report)
    }

    /// Advances the simulation to `now`.
    ///
    /// Phases: loot, respawns, queued player attacks, mob AI, session sweep.
    /// Returns every event emitted since the previous tick; the same events are
    /// published on the event bus if one is attached.
    pub fn tick(&mut self, now: SimTime) -> Vec<SimEvent> {
        if now < self.clock {
            trace!(?now, clock = ?self.clock, "Clock went backwards; clamping");
        }
        self.clock = self.clock.max(now);
        self.tick_count += 1;
        let now = self.clock;

        // Loot queued on earlier ticks
        self.lifecycle
            .process_loot(loot_ref(&mut self.loot), &mut self.outbox);

        self.lifecycle
            .process_respawns(&mut self.directory, now, &mut self.outbox);

        while let Some(attack) = self.attack_queue.pop_front() {
            self.resolve_player_attack(attack, now);
        }

        for id in self.directory.mob_ids() {
            // Zero-health mobs outside the dead state still step so recovery can run.
            if self.directory.mob(id).map_or(true, Mob::is_dead) {
                continue;
            }
            match self.ai.tick_mob(
                &mut self.directory,
                &mut self.combat,
                id,
                now,
                &mut self.outbox,
            ) {
                Ok(Some(AttackOutcome::Hit(report))) => self.after_hit(&report),
                Ok(_) => {},
                Err(err) => {
                    error!(mob = %id, error = %err, "Mob AI step failed; recovering");
                    if self.ai.recover(&mut self.directory, id, now, &mut self.outbox)
                        == Recovery::Dead
                    {
                        self.handle_mob_death(id, None);
                    }
                },
            }
        }

        self.combat.sweep_expired(now, &mut self.outbox);

        let events = self.flush();
        trace!(tick = self.tick_count, events = events.len(), "Tick complete");
        events
    }

    fn resolve_player_attack(&mut self, attack: PlayerAttack, now: SimTime) {
        let Some(player) = self.directory.player(attack.attacker) else {
            debug!(attacker = %attack.attacker, "Queued attack from unknown player dropped");
            return;
        };
        let weapon = attack.weapon.unwrap_or(player.weapon);

        let outcome = self.combat.attempt_attack(
            &mut self.directory,
            attack.attacker,
            attack.target,
            weapon,
            now,
            ammo_ref(&mut self.ammo),
            &mut self.outbox,
        );
        match outcome {
            AttackOutcome::Hit(report) => self.after_hit(&report),
            AttackOutcome::Rejected(reason) => {
                debug!(
                    attacker = %attack.attacker,
                    target = %attack.target,
                    ?reason,
                    "Player attack rejected"
                );
            },
        }
    }

    fn after_hit(&mut self, report: &HitReport) {
        if report.killed && report.target.is_mob() {
            self.handle_mob_death(report.target, Some(report.attacker));
        }
    }

    fn handle_mob_death(&mut self, mob: EntityId, killer: Option<EntityId>) {
        if let Err(err) = self.lifecycle.handle_mob_death(
            &mut self.directory,
            mob,
            killer,
            self.clock,
            &mut self.outbox,
        ) {
            error!(%mob, error = %err, "Failed to handle mob death");
        }
        self.combat
            .forget(mob, CombatEndReason::Death, &mut self.outbox);
    }

    fn flush(&mut self) -> Vec<SimEvent> {
        let events = self.outbox.take();
        if let Some(bus) = self.bus.as_mut() {
            bus.publish_all(&events);
        }
        events
    }

    // === Accessors ===

    /// Simulation config.
    #[must_use]
    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    /// Current simulation time.
    #[must_use]
    pub fn now(&self) -> SimTime {
        self.clock
    }

    /// Number of ticks run.
    #[must_use]
    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    /// Entity directory.
    #[must_use]
    pub fn directory(&self) -> &EntityDirectory {
        &self.directory
    }

    /// Combat engine.
    #[must_use]
    pub fn combat(&self) -> &CombatEngine {
        &self.combat
    }

    /// Lifecycle manager.
    #[must_use]
    pub fn lifecycle(&self) -> &LifecycleManager {
        &self.lifecycle
    }

    /// Looks up a mob, dead or alive.
    #[must_use]
    pub fn mob(&self, id: EntityId) -> Option<&Mob> {
        self.directory.mob(id)
    }

    /// Looks up a player.
    #[must_use]
    pub fn player(&self, id: EntityId) -> Option<&PlayerRecord> {
        self.directory.player(id)
    }

    /// Number of player attacks waiting for the next tick.
    #[must_use]
    pub fn pending_attacks(&self) -> usize {
        self.attack_queue.len()
    }
}

fn ammo_ref(ammo: &mut Option<Box<dyn AmmoSource>>) -> Option<&mut dyn AmmoSource> {
    match ammo {
        Some(source) => Some(source.as_mut()),
        None => None,
    }
}

fn loot_ref(loot: &mut Option<Box<dyn LootRoller>>) -> Option<&mut dyn LootRoller> {
    match loot {
        Some(roller) => Some(roller.as_mut()),
        None => None,
    }
}
