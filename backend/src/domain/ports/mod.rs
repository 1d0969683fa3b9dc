//! Domain ports and supporting types for the hexagonal boundary.

mod macros;
pub(crate) use macros::define_port_error;

mod alias_handler;
mod punishment_provider;

pub use alias_handler::{AcceptAllAliases, AliasHandler};
#[cfg(test)]
pub use punishment_provider::MockPunishmentProvider;
pub use punishment_provider::{
    FixturePunishmentProvider, PunishmentProvider, PunishmentProviderError,
};
