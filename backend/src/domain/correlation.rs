//! Alias correlation across the IP and device identity spaces.
//!
//! Every sighting is recorded against both the IP holder and the device
//! holder, so each accumulates the accounts ever seen under it. Banning one
//! account then surfaces co-located accounts without a separate query.

use tracing::{debug, warn};

use super::ports::{AliasHandler, PunishmentProvider};
use super::{Alias, AliasSighting, Category, PunishmentRegistry, RegistryError};

impl<P: PunishmentProvider> PunishmentRegistry<P> {
    /// Record `sighting` against its IP and device holders, then hand it to
    /// `handler`.
    ///
    /// A holder that fails to load is logged and skipped; the other holder
    /// and the handler still run. Returns the handler's verdict.
    ///
    /// # Examples
    /// ```
    /// use std::sync::Arc;
    ///
    /// use mockable::DefaultClock;
    /// use warden::domain::ports::{AcceptAllAliases, FixturePunishmentProvider};
    /// use warden::domain::{AliasSighting, PunishmentRegistry};
    ///
    /// let registry = PunishmentRegistry::new(Arc::new(FixturePunishmentProvider), Arc::new(DefaultClock));
    /// let sighting = AliasSighting::new("Bob", "1.2.3.4", "dev1", "X1");
    ///
    /// assert!(registry.register_alias(&sighting, &(), &AcceptAllAliases));
    /// assert_eq!(registry.ip("1.2.3.4").expect("cached").aliases().len(), 1);
    /// ```
    pub fn register_alias<X, H>(&self, sighting: &AliasSighting, extra: &X, handler: &H) -> bool
    where
        X: ?Sized,
        H: AliasHandler<X> + ?Sized,
    {
        let alias = sighting.alias();
        for (category, identifier) in [
            (Category::Ip, sighting.ip.as_str()),
            (Category::Device, sighting.device.as_str()),
        ] {
            match self.load(category, identifier) {
                Ok(holder) => {
                    if holder.add_alias(alias.clone()) {
                        debug!(
                            %category,
                            identifier,
                            account_id = %alias.account_id,
                            "recorded new alias"
                        );
                    }
                }
                Err(error) => {
                    warn!(%category, identifier, %error, "alias correlation skipped holder");
                }
            }
        }

        handler.on_alias(sighting, extra)
    }

    /// Accounts seen under `ip` or `device`, IP aliases first, without
    /// duplicates.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Load`] when either holder cannot be loaded.
    pub fn related_accounts(&self, ip: &str, device: &str) -> Result<Vec<Alias>, RegistryError> {
        let mut related = self.ip(ip)?.aliases();
        for alias in self.device(device)?.aliases() {
            if !related.contains(&alias) {
                related.push(alias);
            }
        }
        Ok(related)
    }
}
