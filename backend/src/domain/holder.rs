//! Live punishment state for one identity.
//!
//! A [`PunishmentHolder`] is shared between every caller that loads the same
//! (category, identifier) pair from the registry. All reads and writes go
//! through the holder's own lock, so work on different identities never
//! contends. [`HolderSnapshot`] is the inert, serialisable form exchanged with
//! persistence providers.

use std::fmt;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::{Deserialize, Serialize};

use super::{Alias, Category, Punishment, SharedClock};

/// Serialisable copy of a holder's fields.
///
/// Missing collections decode as empty and a `null` current punishment
/// decodes as the empty punishment. The snake_case keys of older stores
/// (`current_ban`, `past_bans` and so on) are accepted on decode.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HolderSnapshot {
    /// Identifier the snapshot was taken from, informational only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identifier: Option<String>,
    /// Known aliases in insertion order.
    #[serde(default)]
    pub aliases: Vec<Alias>,
    /// Active ban, empty when none.
    #[serde(default, alias = "current_ban", with = "empty_as_null")]
    pub current_ban: Punishment,
    /// Superseded bans, oldest first.
    #[serde(default, alias = "past_bans")]
    pub past_bans: Vec<Punishment>,
    /// Active mute, empty when none.
    #[serde(default, alias = "current_mute", with = "empty_as_null")]
    pub current_mute: Punishment,
    /// Superseded mutes, oldest first.
    #[serde(default, alias = "past_mutes")]
    pub past_mutes: Vec<Punishment>,
}

/// Writes the default punishment as `null`. Anything else, including a
/// punishment with an empty issuer, is written in full.
mod empty_as_null {
    use serde::{Deserialize, Deserializer, Serializer};

    use crate::domain::Punishment;

    pub(super) fn serialize<S: Serializer>(
        punishment: &Punishment,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        if *punishment == Punishment::default() {
            serializer.serialize_none()
        } else {
            serializer.serialize_some(punishment)
        }
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Punishment, D::Error> {
        Ok(Option::<Punishment>::deserialize(deserializer)?.unwrap_or_default())
    }
}

/// Current punishment of one kind plus everything it superseded.
#[derive(Debug, Clone, Default)]
struct Track {
    current: Punishment,
    history: Vec<Punishment>,
}

impl Track {
    fn issue(&mut self, punishment: Punishment) {
        let previous = std::mem::replace(&mut self.current, punishment);
        self.history.push(previous);
    }

    fn lift(&mut self) -> Option<Punishment> {
        if self.current.is_empty() {
            return None;
        }
        let lifted = std::mem::take(&mut self.current);
        self.history.push(lifted.clone());
        Some(lifted)
    }
}

#[derive(Debug, Clone, Default)]
struct HolderState {
    aliases: Vec<Alias>,
    bans: Track,
    mutes: Track,
}

/// Punishment and alias state for a single account, IP or device.
///
/// ## Invariants
/// - Issuing a ban or mute pushes the previous current value, even when it
///   is empty, onto the matching history. Histories only grow.
/// - Bans and mutes are tracked independently.
/// - The alias list never holds the same (username, account id) twice.
pub struct PunishmentHolder {
    category: Category,
    identifier: String,
    clock: SharedClock,
    state: RwLock<HolderState>,
}

impl PunishmentHolder {
    /// Create a holder with no aliases and no punishments.
    pub fn new(category: Category, identifier: impl Into<String>, clock: SharedClock) -> Self {
        Self::from_snapshot(category, identifier, HolderSnapshot::default(), clock)
    }

    /// Rebuild a live holder from a persisted snapshot.
    ///
    /// The registry key wins over `snapshot.identifier`. Duplicate aliases in
    /// the snapshot are collapsed, keeping the first occurrence.
    pub fn from_snapshot(
        category: Category,
        identifier: impl Into<String>,
        snapshot: HolderSnapshot,
        clock: SharedClock,
    ) -> Self {
        let HolderSnapshot {
            identifier: _,
            aliases: stored_aliases,
            current_ban,
            past_bans,
            current_mute,
            past_mutes,
        } = snapshot;

        let mut aliases: Vec<Alias> = Vec::with_capacity(stored_aliases.len());
        for alias in stored_aliases {
            if !aliases.contains(&alias) {
                aliases.push(alias);
            }
        }

        Self {
            category,
            identifier: identifier.into(),
            clock,
            state: RwLock::new(HolderState {
                aliases,
                bans: Track {
                    current: current_ban,
                    history: past_bans,
                },
                mutes: Track {
                    current: current_mute,
                    history: past_mutes,
                },
            }),
        }
    }

    /// Identity space this holder belongs to.
    pub fn category(&self) -> Category {
        self.category
    }

    /// Identifier within the category.
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// Record an alias, returning `false` when it was already known.
    pub fn add_alias(&self, alias: Alias) -> bool {
        let mut state = self.write();
        if state.aliases.contains(&alias) {
            return false;
        }
        state.aliases.push(alias);
        true
    }

    /// Whether `alias` has been recorded.
    pub fn has_alias(&self, alias: &Alias) -> bool {
        self.read().aliases.contains(alias)
    }

    /// Every recorded alias in insertion order.
    pub fn aliases(&self) -> Vec<Alias> {
        self.read().aliases.clone()
    }

    /// Whether a ban is in force right now.
    pub fn banned(&self) -> bool {
        let now = self.clock.utc();
        self.read().bans.current.is_active_at(now)
    }

    /// The current ban, possibly empty or already expired.
    pub fn current_ban(&self) -> Punishment {
        self.read().bans.current.clone()
    }

    /// Install `ban` as the current ban.
    ///
    /// The value is not validated. A ban with an empty issuer counts as no
    /// ban for [`Self::banned`] but is still kept and persisted as given.
    pub fn ban(&self, ban: Punishment) {
        self.write().bans.issue(ban);
    }

    /// Lift the current ban, returning it when one was set.
    pub fn unban(&self) -> Option<Punishment> {
        self.write().bans.lift()
    }

    /// Superseded bans, oldest first.
    pub fn ban_history(&self) -> Vec<Punishment> {
        self.read().bans.history.clone()
    }

    /// Whether a mute is in force right now.
    pub fn muted(&self) -> bool {
        let now = self.clock.utc();
        self.read().mutes.current.is_active_at(now)
    }

    /// The current mute, possibly empty or already expired.
    pub fn current_mute(&self) -> Punishment {
        self.read().mutes.current.clone()
    }

    /// Install `mute` as the current mute.
    pub fn mute(&self, mute: Punishment) {
        self.write().mutes.issue(mute);
    }

    /// Lift the current mute, returning it when one was set.
    pub fn unmute(&self) -> Option<Punishment> {
        self.write().mutes.lift()
    }

    /// Superseded mutes, oldest first.
    pub fn mute_history(&self) -> Vec<Punishment> {
        self.read().mutes.history.clone()
    }

    /// Copy every field under a single read lock.
    pub fn snapshot(&self) -> HolderSnapshot {
        let state = self.read();
        HolderSnapshot {
            identifier: Some(self.identifier.clone()),
            aliases: state.aliases.clone(),
            current_ban: state.bans.current.clone(),
            past_bans: state.bans.history.clone(),
            current_mute: state.mutes.current.clone(),
            past_mutes: state.mutes.history.clone(),
        }
    }

    // Every transition is a single assignment or push, so state behind a
    // poisoned lock is still consistent.
    fn read(&self) -> RwLockReadGuard<'_, HolderState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HolderState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for PunishmentHolder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PunishmentHolder")
            .field("category", &self.category)
            .field("identifier", &self.identifier)
            .field("state", &*self.read())
            .finish_non_exhaustive()
    }
}
