//! Punishment records issued against an identity.

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

/// Raised when a wire punishment carries a timestamp chrono cannot represent.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("punishment {field} timestamp out of range: {value}")]
pub struct PunishmentDecodeError {
    /// Wire field holding the bad value.
    pub field: &'static str,
    /// Raw unix-seconds value.
    pub value: i64,
}

/// A single ban or mute.
///
/// ## Invariants
/// - The empty punishment ([`Punishment::default`]) stands for "nothing
///   active". It is the only punishment with an empty issuer, so
///   [`Punishment::is_empty`] never confuses it with a real record.
/// - Values are immutable once built; a newer punishment supersedes an older
///   one rather than editing it.
///
/// Serialised as `{ time, reason, issuer, expires, expirationTime }` with
/// unix-second timestamps.
///
/// # Examples
/// ```
/// use chrono::{TimeDelta, TimeZone, Utc};
/// use warden::domain::Punishment;
///
/// let issued = Utc.timestamp_opt(1_700_000_000, 0).single().expect("valid");
/// let ban = Punishment::new(issued, "griefing", "mod-alice")
///     .expiring_after(TimeDelta::days(7));
///
/// assert!(ban.is_active_at(issued + TimeDelta::days(1)));
/// assert!(!ban.is_active_at(issued + TimeDelta::days(8)));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "PunishmentDto", into = "PunishmentDto")]
pub struct Punishment {
    issued_at: DateTime<Utc>,
    reason: String,
    issuer: String,
    expires_at: Option<DateTime<Utc>>,
}

impl Punishment {
    /// Build a permanent punishment.
    pub fn new(
        issued_at: DateTime<Utc>,
        reason: impl Into<String>,
        issuer: impl Into<String>,
    ) -> Self {
        Self {
            issued_at: truncate_to_seconds(issued_at),
            reason: reason.into(),
            issuer: issuer.into(),
            expires_at: None,
        }
    }

    /// Return a copy that lapses at `expires_at`.
    #[must_use]
    pub fn expiring_at(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(truncate_to_seconds(expires_at));
        self
    }

    /// Return a copy that lapses `duration` after its issue time.
    ///
    /// Durations that overflow the calendar saturate to the latest
    /// representable instant.
    #[must_use]
    pub fn expiring_after(self, duration: TimeDelta) -> Self {
        let expires_at = self
            .issued_at
            .checked_add_signed(duration)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        self.expiring_at(expires_at)
    }

    /// When the punishment was issued.
    pub fn issued_at(&self) -> DateTime<Utc> {
        self.issued_at
    }

    /// Moderator-supplied reason.
    pub fn reason(&self) -> &str {
        &self.reason
    }

    /// Identifier of the moderator who issued it.
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// Expiry instant, `None` for permanent punishments.
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    /// Whether the punishment lapses on its own.
    pub fn expires(&self) -> bool {
        self.expires_at.is_some()
    }

    /// Whether this is the "nothing active" value.
    pub fn is_empty(&self) -> bool {
        self.issuer.is_empty()
    }

    /// Whether the punishment has an expiry at or before `now`.
    pub fn expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expires_at| expires_at <= now)
    }

    /// Whether the punishment is in force at `now`.
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        !self.is_empty() && !self.expired_at(now)
    }
}

fn truncate_to_seconds(at: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::from_timestamp(at.timestamp(), 0).unwrap_or(at)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PunishmentDto {
    #[serde(default)]
    time: i64,
    #[serde(default)]
    reason: String,
    #[serde(default, alias = "banner")]
    issuer: String,
    #[serde(default)]
    expires: bool,
    #[serde(default, alias = "duration")]
    expiration_time: i64,
}

impl From<Punishment> for PunishmentDto {
    fn from(value: Punishment) -> Self {
        let Punishment {
            issued_at,
            reason,
            issuer,
            expires_at,
        } = value;
        Self {
            time: issued_at.timestamp(),
            reason,
            issuer,
            expires: expires_at.is_some(),
            expiration_time: expires_at.map_or(0, |at| at.timestamp()),
        }
    }
}

impl TryFrom<PunishmentDto> for Punishment {
    type Error = PunishmentDecodeError;

    fn try_from(value: PunishmentDto) -> Result<Self, Self::Error> {
        let issued_at = from_unix_seconds("time", value.time)?;
        let expires_at = if value.expires {
            Some(from_unix_seconds("expirationTime", value.expiration_time)?)
        } else {
            None
        };
        Ok(Self {
            issued_at,
            reason: value.reason,
            issuer: value.issuer,
            expires_at,
        })
    }
}

fn from_unix_seconds(field: &'static str, value: i64) -> Result<DateTime<Utc>, PunishmentDecodeError> {
    DateTime::from_timestamp(value, 0).ok_or(PunishmentDecodeError { field, value })
}
