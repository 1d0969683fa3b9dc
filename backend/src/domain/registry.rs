//! Load-through cache of punishment holders.
//!
//! The registry keeps at most one live [`PunishmentHolder`] per
//! (category, identifier) pair. Lookups that miss consult the
//! [`PunishmentProvider`], build a holder from whatever it returns and keep
//! it for the rest of the registry's life. [`PunishmentRegistry::save`]
//! writes every cached holder back through the provider.
//!
//! Locking is two-level. A structural `RwLock` guards the map of per-key
//! slots and is held only long enough to find, insert or drop a slot. Each
//! slot has its own mutex that serialises the first load of that key, so the
//! provider is called outside the structural lock and at most once per key
//! that loads successfully. A load that fails drops its slot again, so
//! failing identifiers leave nothing behind. The structural lock is never
//! requested while a slot mutex is held.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, TryLockError};

use tracing::{debug, info, warn};

use super::ports::{PunishmentProvider, PunishmentProviderError};
use super::{Category, PunishmentHolder, SharedClock};

/// Errors surfaced by [`PunishmentRegistry`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// The provider failed while fetching a holder. Nothing was cached.
    #[error("failed to load {category} punishments for {identifier}: {source}")]
    Load {
        /// Category of the holder being loaded.
        category: Category,
        /// Identifier of the holder being loaded.
        identifier: String,
        /// Provider failure.
        #[source]
        source: PunishmentProviderError,
    },
    /// At least one holder could not be written during a flush.
    #[error(
        "failed to save {category} punishments for {identifier} \
         ({failed} holder(s) failed): {source}"
    )]
    Save {
        /// Category of the first holder that failed.
        category: Category,
        /// Identifier of the first holder that failed.
        identifier: String,
        /// Number of holders that failed in this flush.
        failed: usize,
        /// Provider failure for the first holder.
        #[source]
        source: PunishmentProviderError,
    },
}

#[derive(Default)]
struct SlotEntry {
    holder: Option<Arc<PunishmentHolder>>,
    /// Set once the slot has been dropped from the map; a loader that finds
    /// it set must fetch a fresh slot.
    retired: bool,
}

type Slot = Arc<Mutex<SlotEntry>>;

/// Authoritative in-memory view of punishment state.
///
/// # Examples
/// ```
/// use std::sync::Arc;
///
/// use chrono::Utc;
/// use mockable::DefaultClock;
/// use warden::domain::ports::FixturePunishmentProvider;
/// use warden::domain::{Category, Punishment, PunishmentRegistry};
///
/// let registry = PunishmentRegistry::new(Arc::new(FixturePunishmentProvider), Arc::new(DefaultClock));
///
/// let holder = registry.load(Category::Account, "X1").expect("fixture load");
/// holder.ban(Punishment::new(Utc::now(), "cheating", "mod-alice"));
///
/// let again = registry.account("X1").expect("cached");
/// assert!(Arc::ptr_eq(&holder, &again));
/// assert!(again.banned());
/// ```
pub struct PunishmentRegistry<P> {
    provider: Arc<P>,
    clock: SharedClock,
    holders: RwLock<BTreeMap<Category, BTreeMap<String, Slot>>>,
}

impl<P> PunishmentRegistry<P> {
    /// Create an empty registry in front of `provider`.
    pub fn new(provider: Arc<P>, clock: SharedClock) -> Self {
        Self {
            provider,
            clock,
            holders: RwLock::new(BTreeMap::new()),
        }
    }

    /// The backing provider.
    pub fn provider(&self) -> &Arc<P> {
        &self.provider
    }

    /// Return the cached holder for a key without consulting the provider.
    pub fn cached(&self, category: Category, identifier: &str) -> Option<Arc<PunishmentHolder>> {
        let slot = self
            .read_holders()
            .get(&category)
            .and_then(|by_identifier| by_identifier.get(identifier))
            .map(Arc::clone)?;
        lock_slot(&slot).holder.clone()
    }

    /// Number of holders currently cached.
    pub fn len(&self) -> usize {
        self.read_holders()
            .values()
            .flat_map(BTreeMap::values)
            .filter(|slot| lock_slot(slot).holder.is_some())
            .count()
    }

    /// Whether no holder has been cached yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn slot(&self, category: Category, identifier: &str) -> Slot {
        if let Some(slot) = self
            .read_holders()
            .get(&category)
            .and_then(|by_identifier| by_identifier.get(identifier))
        {
            return Arc::clone(slot);
        }

        // Another caller may have inserted the slot between the two locks;
        // `entry` keeps whichever got there first.
        let mut holders = self.holders.write().unwrap_or_else(PoisonError::into_inner);
        let slot = holders
            .entry(category)
            .or_default()
            .entry(identifier.to_owned())
            .or_default();
        Arc::clone(slot)
    }

    /// Drop `slot` from the map if it is still the registered slot for the
    /// key and holds no holder. A slot another caller is loading into is
    /// left alone; that caller drops it if its own load fails.
    fn discard_slot(&self, category: Category, identifier: &str, slot: &Slot) {
        let mut holders = self.holders.write().unwrap_or_else(PoisonError::into_inner);
        let Some(by_identifier) = holders.get_mut(&category) else {
            return;
        };
        if !by_identifier
            .get(identifier)
            .is_some_and(|current| Arc::ptr_eq(current, slot))
        {
            return;
        }

        let mut entry = match slot.try_lock() {
            Ok(entry) => entry,
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
            Err(TryLockError::WouldBlock) => return,
        };
        if entry.holder.is_some() {
            return;
        }
        entry.retired = true;
        drop(entry);

        by_identifier.remove(identifier);
        if by_identifier.is_empty() {
            holders.remove(&category);
        }
    }

    fn read_holders(&self) -> RwLockReadGuard<'_, BTreeMap<Category, BTreeMap<String, Slot>>> {
        self.holders.read().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<P: PunishmentProvider> PunishmentRegistry<P> {
    /// Return the holder for a key, loading it through the provider on a
    /// miss.
    ///
    /// Every caller asking for the same key receives the same `Arc`. When the
    /// provider has nothing stored the holder starts empty.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Load`] when the provider fails. The failure
    /// is not cached, so a later call retries.
    pub fn load(
        &self,
        category: Category,
        identifier: &str,
    ) -> Result<Arc<PunishmentHolder>, RegistryError> {
        loop {
            let slot = self.slot(category, identifier);
            let mut entry = lock_slot(&slot);
            if entry.retired {
                continue;
            }
            if let Some(holder) = entry.holder.as_ref() {
                return Ok(Arc::clone(holder));
            }

            debug!(%category, identifier, "punishment holder cache miss");
            let stored = match self.provider.load(category, identifier) {
                Ok(stored) => stored,
                Err(source) => {
                    drop(entry);
                    self.discard_slot(category, identifier, &slot);
                    return Err(RegistryError::Load {
                        category,
                        identifier: identifier.to_owned(),
                        source,
                    });
                }
            };

            let clock = Arc::clone(&self.clock);
            let holder = match stored {
                Some(snapshot) => {
                    PunishmentHolder::from_snapshot(category, identifier, snapshot, clock)
                }
                None => {
                    debug!(%category, identifier, "no stored punishments, starting empty");
                    PunishmentHolder::new(category, identifier, clock)
                }
            };
            let holder = Arc::new(holder);
            entry.holder = Some(Arc::clone(&holder));
            return Ok(holder);
        }
    }

    /// Shorthand for [`Self::load`] with [`Category::Account`].
    ///
    /// # Errors
    ///
    /// See [`Self::load`].
    pub fn account(&self, account_id: &str) -> Result<Arc<PunishmentHolder>, RegistryError> {
        self.load(Category::Account, account_id)
    }

    /// Shorthand for [`Self::load`] with [`Category::Ip`].
    ///
    /// # Errors
    ///
    /// See [`Self::load`].
    pub fn ip(&self, address: &str) -> Result<Arc<PunishmentHolder>, RegistryError> {
        self.load(Category::Ip, address)
    }

    /// Shorthand for [`Self::load`] with [`Category::Device`].
    ///
    /// # Errors
    ///
    /// See [`Self::load`].
    pub fn device(&self, device_id: &str) -> Result<Arc<PunishmentHolder>, RegistryError> {
        self.load(Category::Device, device_id)
    }

    /// Write every cached holder back through the provider.
    ///
    /// Every holder is attempted even after a failure. New keys cannot be
    /// inserted until the flush completes; already cached keys stay
    /// readable and writable.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Save`] describing the first failed holder
    /// and how many failed in total.
    pub fn save(&self) -> Result<(), RegistryError> {
        let holders = self.read_holders();
        let mut saved = 0_usize;
        let mut failed = 0_usize;
        let mut first_failure = None;

        for (category, by_identifier) in holders.iter() {
            for (identifier, slot) in by_identifier {
                let Some(holder) = lock_slot(slot).holder.clone() else {
                    continue;
                };
                let snapshot = holder.snapshot();
                match self.provider.save(*category, identifier, &snapshot) {
                    Ok(()) => saved += 1,
                    Err(error) => {
                        warn!(%category, %identifier, %error, "failed to save punishment holder");
                        failed += 1;
                        if first_failure.is_none() {
                            first_failure = Some((*category, identifier.clone(), error));
                        }
                    }
                }
            }
        }
        drop(holders);

        info!(saved, failed, "flushed punishment holders");
        match first_failure {
            None => Ok(()),
            Some((category, identifier, source)) => Err(RegistryError::Save {
                category,
                identifier,
                failed,
                source,
            }),
        }
    }

    /// Final flush at shutdown; identical to [`Self::save`].
    ///
    /// # Errors
    ///
    /// See [`Self::save`].
    pub fn close(&self) -> Result<(), RegistryError> {
        self.save()
    }
}

impl<P> fmt::Debug for PunishmentRegistry<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PunishmentRegistry")
            .field("cached", &self.len())
            .finish_non_exhaustive()
    }
}

fn lock_slot(slot: &Mutex<SlotEntry>) -> MutexGuard<'_, SlotEntry> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests;
