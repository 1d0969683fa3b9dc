//! The rank abstraction and a data-only implementation of it.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A rank a player can hold.
///
/// Names identify ranks, so every rank handed to one
/// [`crate::RankRegistry`] should have a distinct name.
pub trait Rank: fmt::Debug + Send + Sync {
    /// Unique name of the rank.
    fn name(&self) -> &str;

    /// Importance level or clearance of the rank. Higher outranks lower.
    fn level(&self) -> u32;

    /// Whether holders of this rank are staff.
    fn staff(&self) -> bool;

    /// Chat format applied to messages from holders of this rank.
    fn chat_format(&self) -> &str;
}

/// Rank defined entirely by data, typically read from a config file.
///
/// # Example
///
/// ```
/// use ranks::{Rank, StaticRank};
///
/// let rank: StaticRank =
///     serde_json::from_str(r#"{"name": "admin", "level": 100, "staff": true}"#)
///         .expect("valid rank definition");
/// assert!(rank.staff());
/// assert_eq!(rank.chat_format(), "");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StaticRank {
    name: String,
    level: u32,
    #[serde(default)]
    staff: bool,
    #[serde(default)]
    chat_format: String,
}

impl StaticRank {
    /// Non-staff rank with an empty chat format.
    #[must_use]
    pub fn new(name: impl Into<String>, level: u32) -> Self {
        Self {
            name: name.into(),
            level,
            staff: false,
            chat_format: String::new(),
        }
    }

    /// Set the staff flag.
    #[must_use]
    pub const fn with_staff(mut self, staff: bool) -> Self {
        self.staff = staff;
        self
    }

    /// Set the chat format.
    #[must_use]
    pub fn with_chat_format(mut self, chat_format: impl Into<String>) -> Self {
        self.chat_format = chat_format.into();
        self
    }
}

impl Rank for StaticRank {
    fn name(&self) -> &str {
        &self.name
    }

    fn level(&self) -> u32 {
        self.level
    }

    fn staff(&self) -> bool {
        self.staff
    }

    fn chat_format(&self) -> &str {
        &self.chat_format
    }
}
