//! Account aliases observed under an IP address or device.

use serde::{Deserialize, Serialize};

/// Evidence that an account was seen under some identity.
///
/// Two aliases are the same only when both the username and the account id
/// match.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alias {
    /// Username at the time of the sighting.
    pub username: String,
    /// Stable account identifier.
    #[serde(alias = "xuid")]
    pub account_id: String,
}

impl Alias {
    /// Build an alias from its parts.
    pub fn new(username: impl Into<String>, account_id: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            account_id: account_id.into(),
        }
    }
}

/// One observation of a player fed into alias correlation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AliasSighting {
    /// Username the player connected with.
    pub username: String,
    /// Address the player connected from.
    pub ip: String,
    /// Device the player connected with.
    pub device: String,
    /// Account the player authenticated as.
    pub account_id: String,
}

impl AliasSighting {
    /// Build a sighting from its four identifiers.
    pub fn new(
        username: impl Into<String>,
        ip: impl Into<String>,
        device: impl Into<String>,
        account_id: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into(),
            ip: ip.into(),
            device: device.into(),
            account_id: account_id.into(),
        }
    }

    /// The alias recorded against the IP and device holders.
    pub fn alias(&self) -> Alias {
        Alias::new(self.username.clone(), self.account_id.clone())
    }
}
