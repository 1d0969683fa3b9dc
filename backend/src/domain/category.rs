//! Identity spaces a punishment holder can belong to.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Identity space keyed by a holder's identifier.
///
/// The tag returned by [`Category::as_str`] is stable: it appears in log
/// fields, error messages, persistence keys and serialised payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    /// Player account, keyed by account id.
    Account,
    /// Network address, keyed by the textual IP.
    Ip,
    /// Client device, keyed by device id.
    Device,
}

impl Category {
    /// Every known category, in declaration order.
    pub const ALL: [Self; 3] = [Self::Account, Self::Ip, Self::Device];

    /// Stable lowercase tag for the category.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Account => "account",
            Self::Ip => "ip",
            Self::Device => "device",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raised when a tag does not name a known [`Category`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown punishment category: {tag}")]
pub struct CategoryParseError {
    /// Tag that failed to parse.
    pub tag: String,
}

impl FromStr for Category {
    type Err = CategoryParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|category| category.as_str() == value)
            .ok_or_else(|| CategoryParseError {
                tag: value.to_owned(),
            })
    }
}
