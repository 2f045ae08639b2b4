//! Paired combat sessions.
//!
//! Each entity holds at most one session, naming its current opponent. Sessions
//! are opened and closed in pairs so that if A's session references B, B's
//! references A.

use ahash::AHashMap;
use ironvale_common::{EntityId, SimTime};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{error, trace};

use crate::mob::WeaponCategory;

/// One side of a combat pairing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CombatSession {
    /// The other participant
    pub opponent: EntityId,
    /// Weapon category of the last hit
    pub weapon: WeaponCategory,
    /// In-combat flag
    pub in_combat: bool,
    /// Time of the last successful hit between the pair
    pub last_hit: SimTime,
}

/// Why a session pair was closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CombatEndReason {
    /// One participant died
    Death,
    /// No hit within the combat timeout
    Timeout,
    /// A participant engaged someone else
    Disengaged,
    /// A participant left the world
    Departed,
    /// One side had no matching session (internal inconsistency)
    Orphaned,
}

/// A closed session pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EndedSession {
    /// One participant
    pub a: EntityId,
    /// The other participant
    pub b: EntityId,
    /// Why it closed
    pub reason: CombatEndReason,
}

/// Result of recording a hit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionUpdate {
    /// True if this hit opened a new pair
    pub opened: bool,
    /// Pairs closed because a participant switched opponents
    pub ended: Vec<EndedSession>,
}

/// All live combat sessions, keyed by participant.
#[derive(Debug, Default)]
pub struct CombatSessions {
    by_entity: AHashMap<EntityId, CombatSession>,
}

impl CombatSessions {
    /// Creates an empty session table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Session held by `id`.
    #[must_use]
    pub fn get(&self, id: EntityId) -> Option<&CombatSession> {
        self.by_entity.get(&id)
    }

    /// Current opponent of `id`.
    #[must_use]
    pub fn opponent_of(&self, id: EntityId) -> Option<EntityId> {
        self.by_entity.get(&id).map(|s| s.opponent)
    }

    /// Returns true if `id` is in combat.
    #[must_use]
    pub fn in_combat(&self, id: EntityId) -> bool {
        self.by_entity.get(&id).is_some_and(|s| s.in_combat)
    }

    /// Number of open pairs.
    #[must_use]
    pub fn pair_count(&self) -> usize {
        self.by_entity.len() / 2
    }

    /// Returns true if no sessions are open.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_entity.is_empty()
    }

    /// Opens or refreshes the pair for a landed hit.
    ///
    /// Either participant's pair with a third entity is closed first.
    pub fn record_hit(
        &mut self,
        attacker: EntityId,
        target: EntityId,
        weapon: WeaponCategory,
        now: SimTime,
    ) -> SessionUpdate {
        let mut update = SessionUpdate::default();

        for (side, other) in [(attacker, target), (target, attacker)] {
            if let Some(current) = self.opponent_of(side) {
                if current != other {
                    if let Some(ended) = self.end(side, CombatEndReason::Disengaged) {
                        update.ended.push(ended);
                    }
                }
            }
        }

        update.opened = !self.by_entity.contains_key(&attacker);
        for (side, other) in [(attacker, target), (target, attacker)] {
            self.by_entity.insert(
                side,
                CombatSession {
                    opponent: other,
                    weapon,
                    in_combat: true,
                    last_hit: now,
                },
            );
        }

        trace!(%attacker, %target, opened = update.opened, "Combat session refreshed");
        update
    }

    /// Closes the pair containing `id`, if any.
    pub fn end(&mut self, id: EntityId, reason: CombatEndReason) -> Option<EndedSession> {
        let session = self.by_entity.remove(&id)?;
        let opponent = session.opponent;

        match self.by_entity.get(&opponent) {
            Some(back) if back.opponent == id => {
                self.by_entity.remove(&opponent);
            },
            _ => {
                error!(entity = %id, %opponent, "Combat session had no matching pair");
            },
        }

        Some(EndedSession {
            a: id,
            b: opponent,
            reason,
        })
    }

    /// Closes pairs idle for longer than `timeout`, and any orphaned halves.
    ///
    /// Pairs are visited in ascending id order.
    pub fn sweep(&mut self, now: SimTime, timeout: Duration) -> Vec<EndedSession> {
        let mut ids: Vec<EntityId> = self.by_entity.keys().copied().collect();
        ids.sort_unstable();

        let mut ended = Vec::new();
        for id in ids {
            let Some(session) = self.by_entity.get(&id).copied() else {
                continue;
            };

            let paired = self
                .by_entity
                .get(&session.opponent)
                .is_some_and(|back| back.opponent == id);
            if !paired {
                error!(entity = %id, opponent = %session.opponent, "Orphaned combat session");
                debug_assert!(paired, "orphaned combat session for {id}");
                self.by_entity.remove(&id);
                ended.push(EndedSession {
                    a: id,
                    b: session.opponent,
                    reason: CombatEndReason::Orphaned,
                });
                continue;
            }

            if now.saturating_since(session.last_hit) > timeout {
                if let Some(closed) = self.end(id, CombatEndReason::Timeout) {
                    ended.push(closed);
                }
            }
        }
        ended
    }

    /// Checks that every session is mirrored by its opponent.
    #[must_use]
    pub fn is_symmetric(&self) -> bool {
        self.by_entity.iter().all(|(id, session)| {
            self.by_entity
                .get(&session.opponent)
                .is_some_and(|back| back.opponent == *id && back.last_hit == session.last_hit)
        })
    }
}
