//! Warden: cached punishment records keyed by account, IP address and device.
//!
//! The [`domain`] module holds the registry, its holders and the persistence
//! port. [`config`] and [`telemetry`] cover the ambient concerns a host needs
//! to wire the registry up.

pub mod config;
pub mod domain;
pub mod telemetry;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use domain::{
    Alias, AliasSighting, Category, HolderSnapshot, PeriodicFlush, Punishment, PunishmentHolder,
    PunishmentRegistry, RegistryError,
};
