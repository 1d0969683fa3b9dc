//! Port for punishment holder persistence.
//!
//! The [`PunishmentProvider`] trait is the registry's only view of durable
//! storage. Adapters map (category, identifier) pairs onto whatever backend
//! they wrap: files, a relational table or a key-value store.

use crate::domain::{Category, HolderSnapshot};

use super::define_port_error;

define_port_error! {
    /// Errors raised by punishment provider adapters.
    pub enum PunishmentProviderError {
        /// Backend could not be reached or failed the operation.
        Backend { message: String } => "punishment provider backend failure: {message}",
        /// Stored payload could not be encoded or decoded.
        Serialization { message: String } =>
            "punishment provider serialisation failed: {message}",
    }
}

/// Port for loading and saving holder snapshots.
///
/// Calls are synchronous and expected to be bounded by the adapter; the
/// registry adds no timeout and never retries.
#[cfg_attr(test, mockall::automock)]
pub trait PunishmentProvider: Send + Sync {
    /// Fetch the snapshot stored for `identifier`.
    ///
    /// Returns `None` when nothing has been stored yet. Absence is not an
    /// error; the registry starts such identities empty.
    fn load(
        &self,
        category: Category,
        identifier: &str,
    ) -> Result<Option<HolderSnapshot>, PunishmentProviderError>;

    /// Persist `snapshot` for `identifier`, replacing any previous value.
    fn save(
        &self,
        category: Category,
        identifier: &str,
        snapshot: &HolderSnapshot,
    ) -> Result<(), PunishmentProviderError>;
}

/// Fixture implementation for running without storage.
///
/// Every lookup misses and every save is discarded. Use it where persistence
/// is not under test.
#[derive(Debug, Default, Clone, Copy)]
pub struct FixturePunishmentProvider;

impl PunishmentProvider for FixturePunishmentProvider {
    fn load(
        &self,
        _category: Category,
        _identifier: &str,
    ) -> Result<Option<HolderSnapshot>, PunishmentProviderError> {
        Ok(None)
    }

    fn save(
        &self,
        _category: Category,
        _identifier: &str,
        _snapshot: &HolderSnapshot,
    ) -> Result<(), PunishmentProviderError> {
        Ok(())
    }
}
