//! Outbound simulation events and the event bus.

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use ironvale_common::{EntityId, LootTableId, SimTime, SpawnPointId, Vec3};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::lifecycle::LootDrop;
use crate::mob::{AiState, MobKind, WeaponCategory};
use crate::session::CombatEndReason;

/// Notification emitted by the simulation.
///
/// Serialised with an `event` tag carrying the wire name, e.g.
/// `{"event":"combat:hit","attacker":..,"target":..}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event")]
pub enum SimEvent {
    /// A mob was placed in the world for the first time
    #[serde(rename = "mob:spawned")]
    MobSpawned {
        /// Mob id
        mob: EntityId,
        /// Mob kind
        kind: MobKind,
        /// Originating spawn point
        spawn_point: SpawnPointId,
        /// Spawn position
        position: Vec3,
    },
    /// A mob moved during its AI step
    #[serde(rename = "mob:position_updated")]
    MobPositionUpdated {
        /// Mob id
        mob: EntityId,
        /// New position
        position: Vec3,
    },
    /// A mob's AI state changed
    #[serde(rename = "mob:state_changed")]
    MobStateChanged {
        /// Mob id
        mob: EntityId,
        /// Previous state
        from: AiState,
        /// New state
        to: AiState,
    },
    /// A mob's health reached zero
    #[serde(rename = "mob:died")]
    MobDied {
        /// Mob id
        mob: EntityId,
        /// Entity that landed the killing blow, if any
        killer: Option<EntityId>,
        /// Spawn point scheduled to respawn it
        spawn_point: SpawnPointId,
        /// Respawn deadline
        respawn_at: SimTime,
    },
    /// A dead mob was reset at its home position
    #[serde(rename = "mob:respawned")]
    MobRespawned {
        /// Mob id
        mob: EntityId,
        /// Home position
        position: Vec3,
    },
    /// An attack landed
    #[serde(rename = "combat:hit")]
    CombatHit {
        /// Attacker
        attacker: EntityId,
        /// Target
        target: EntityId,
        /// Damage dealt
        damage: u32,
        /// Weapon category used
        weapon_category: WeaponCategory,
        /// Target health after the hit
        remaining_health: u32,
    },
    /// Two entities entered combat with each other
    #[serde(rename = "combat:entered")]
    CombatEntered {
        /// Attacker that opened the session
        attacker: EntityId,
        /// Its opponent
        target: EntityId,
    },
    /// A combat session pair was closed
    #[serde(rename = "combat:ended")]
    CombatEnded {
        /// One participant
        a: EntityId,
        /// The other participant
        b: EntityId,
        /// Why it closed
        reason: CombatEndReason,
    },
    /// A player's ranged attack failed for lack of ammunition
    #[serde(rename = "combat:no_ammo")]
    CombatNoAmmo {
        /// Player
        player: EntityId,
    },
    /// A player's health reached zero
    #[serde(rename = "player:defeated")]
    PlayerDefeated {
        /// Player
        player: EntityId,
        /// Entity that landed the killing blow, if any
        killer: Option<EntityId>,
    },
    /// Loot rolled for a dead mob
    #[serde(rename = "loot:drop_requested")]
    LootDropRequested {
        /// Mob that dropped it
        mob: EntityId,
        /// Table rolled
        table: LootTableId,
        /// Where the mob died
        position: Vec3,
        /// Rolled items
        drops: Vec<LootDrop>,
    },
}

impl SimEvent {
    /// Wire name of this event.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::MobSpawned { .. } => "mob:spawned",
            Self::MobPositionUpdated { .. } => "mob:position_updated",
            Self::MobStateChanged { .. } => "mob:state_changed",
            Self::MobDied { .. } => "mob:died",
            Self::MobRespawned { .. } => "mob:respawned",
            Self::CombatHit { .. } => "combat:hit",
            Self::CombatEntered { .. } => "combat:entered",
            Self::CombatEnded { .. } => "combat:ended",
            Self::CombatNoAmmo { .. } => "combat:no_ammo",
            Self::PlayerDefeated { .. } => "player:defeated",
            Self::LootDropRequested { .. } => "loot:drop_requested",
        }
    }
}

/// Events collected during one tick, in emission order.
#[derive(Debug, Default)]
pub struct Outbox {
    events: Vec<SimEvent>,
}

impl Outbox {
    /// Creates an empty outbox.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an event.
    pub fn push(&mut self, event: SimEvent) {
        self.events.push(event);
    }

    /// Number of queued events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Returns true if nothing is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Iterates queued events.
    pub fn iter(&self) -> impl Iterator<Item = &SimEvent> {
        self.events.iter()
    }

    /// Takes every queued event, leaving the outbox empty.
    pub fn take(&mut self) -> Vec<SimEvent> {
        std::mem::take(&mut self.events)
    }
}

/// Bounded channel that fans simulation events out to subscribers.
#[derive(Debug)]
pub struct EventBus {
    sender: Sender<SimEvent>,
    receiver: Receiver<SimEvent>,
    capacity: usize,
    dropped: u64,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1024)
    }
}

impl EventBus {
    /// Creates a new event bus with the given capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, receiver) = bounded(capacity);
        Self {
            sender,
            receiver,
            capacity,
            dropped: 0,
        }
    }

    /// Publishes an event without blocking. A full bus drops it.
    pub fn publish(&mut self, event: SimEvent) {
        match self.sender.try_send(event) {
            Ok(()) => {},
            Err(TrySendError::Full(event) | TrySendError::Disconnected(event)) => {
                self.dropped += 1;
                // Logged at powers of two.
                if self.dropped.is_power_of_two() {
                    warn!(
                        event = event.name(),
                        dropped = self.dropped,
                        capacity = self.capacity,
                        "Event bus full; dropping event"
                    );
                }
            },
        }
    }

    /// Publishes every event in order.
    pub fn publish_all(&mut self, events: &[SimEvent]) {
        for event in events {
            self.publish(event.clone());
        }
    }

    /// Returns a receiver handle. Receivers share one queue.
    #[must_use]
    pub fn subscribe(&self) -> Receiver<SimEvent> {
        self.receiver.clone()
    }

    /// Drains all pending events.
    pub fn drain(&self) -> Vec<SimEvent> {
        self.receiver.try_iter().collect()
    }

    /// Returns the number of pending events.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.receiver.len()
    }

    /// Number of events dropped because the bus was full.
    #[must_use]
    pub const fn dropped_count(&self) -> u64 {
        self.dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_ammo(raw: u64) -> SimEvent {
        SimEvent::CombatNoAmmo {
            player: EntityId::from_raw(raw),
        }
    }

    #[test]
    fn test_event_wire_names() {
        let event = SimEvent::CombatHit {
            attacker: EntityId::from_raw(1),
            target: EntityId::from_raw(2),
            damage: 4,
            weapon_category: WeaponCategory::Melee,
            remaining_health: 26,
        };
        let json = serde_json::to_value(&event).expect("serialize");

        assert_eq!(json["event"], "combat:hit");
        assert_eq!(json["weapon_category"], "melee");
        assert_eq!(json["damage"], 4);
        assert_eq!(event.name(), "combat:hit");
    }

    #[test]
    fn test_state_change_serializes_states() {
        let event = SimEvent::MobStateChanged {
            mob: EntityId::from_raw(ironvale_common::MOB_ID_BASE),
            from: AiState::Idle,
            to: AiState::Chasing,
        };
        let json = serde_json::to_string(&event).expect("serialize");
        assert!(json.contains("\"mob:state_changed\""));
        assert!(json.contains("\"chasing\""));

        let back: SimEvent = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, event);
    }

    #[test]
    fn test_outbox_take_empties() {
        let mut outbox = Outbox::new();
        outbox.push(no_ammo(1));
        outbox.push(no_ammo(2));
        assert_eq!(outbox.len(), 2);

        let events = outbox.take();
        assert_eq!(events.len(), 2);
        assert!(outbox.is_empty());
    }

    #[test]
    fn test_bus_publish_and_drain() {
        let mut bus = EventBus::new(8);
        let rx = bus.subscribe();
        bus.publish(no_ammo(1));
        bus.publish(no_ammo(2));

        assert_eq!(bus.pending_count(), 2);
        assert_eq!(rx.try_recv().ok(), Some(no_ammo(1)));
        assert_eq!(bus.drain(), vec![no_ammo(2)]);
    }

    #[test]
    fn test_bus_full_drops() {
        let mut bus = EventBus::new(2);
        bus.publish_all(&[no_ammo(1), no_ammo(2), no_ammo(3)]);

        assert_eq!(bus.pending_count(), 2);
        assert_eq!(bus.dropped_count(), 1);
        assert_eq!(bus.drain(), vec![no_ammo(1), no_ammo(2)]);
    }
}
