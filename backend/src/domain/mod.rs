//! Domain primitives, the punishment registry and alias correlation.
//!
//! Purpose: keep one authoritative in-memory view of punishment state per
//! identity, backed by whatever storage adapter implements
//! [`ports::PunishmentProvider`].
//!
//! Public surface:
//! - Category: identity space (account, IP, device).
//! - Punishment: one ban or mute record.
//! - Alias / AliasSighting: account evidence recorded under an IP or device.
//! - PunishmentHolder / HolderSnapshot: live and persisted holder state.
//! - PunishmentRegistry / RegistryError: load-through holder cache.
//! - PeriodicFlush: background worker saving the registry on a cadence.

use std::sync::Arc;

use mockable::Clock;

pub mod alias;
pub mod category;
mod correlation;
pub mod flush;
pub mod holder;
pub mod ports;
pub mod punishment;
pub mod registry;

pub use self::alias::{Alias, AliasSighting};
pub use self::category::{Category, CategoryParseError};
pub use self::flush::PeriodicFlush;
pub use self::holder::{HolderSnapshot, PunishmentHolder};
pub use self::punishment::{Punishment, PunishmentDecodeError};
pub use self::registry::{PunishmentRegistry, RegistryError};

/// Clock shared by the registry and every holder it creates.
pub type SharedClock = Arc<dyn Clock + Send + Sync>;
