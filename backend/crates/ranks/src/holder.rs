//! Per-player rank membership with cached aggregates.

use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::{Deserialize, Serialize};

use crate::error::RankError;
use crate::rank::Rank;
use crate::registry::RankRegistry;

/// Persisted form of a [`RankHolder`]: the held rank names.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankRecord {
    /// Held rank names.
    #[serde(default)]
    pub ranks: Vec<String>,
}

impl RankRecord {
    /// Record holding `names`.
    #[must_use]
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            ranks: names.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Debug, Default)]
struct Membership {
    ranks: BTreeMap<String, Arc<dyn Rank>>,
    permission_level: u32,
    staff: bool,
}

impl Membership {
    fn insert(&mut self, rank: Arc<dyn Rank>) {
        self.ranks.insert(rank.name().to_owned(), rank);
        self.recalculate();
    }

    fn recalculate(&mut self) {
        self.permission_level = self
            .ranks
            .values()
            .map(|rank| rank.level())
            .max()
            .unwrap_or(0);
        self.staff = self.ranks.values().any(|rank| rank.staff());
    }
}

/// The set of ranks one player holds.
///
/// The permission level (highest held level, 0 with no ranks) and the staff
/// flag (any held rank is staff) are recomputed on every change.
#[derive(Debug, Default)]
pub struct RankHolder {
    membership: RwLock<Membership>,
}

impl RankHolder {
    /// Holder with no ranks.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a holder from `record`, resolving each name in `registry`.
    ///
    /// # Errors
    ///
    /// Returns [`RankError::UnregisteredRank`] for the first name the
    /// registry does not know.
    pub fn from_record(record: &RankRecord, registry: &RankRegistry) -> Result<Self, RankError> {
        let mut membership = Membership::default();
        for name in &record.ranks {
            let rank = registry
                .rank(name)
                .ok_or_else(|| RankError::UnregisteredRank { name: name.clone() })?;
            membership.ranks.insert(rank.name().to_owned(), rank);
        }
        membership.recalculate();
        Ok(Self {
            membership: RwLock::new(membership),
        })
    }

    /// Parse a stored JSON record and rebuild the holder from it.
    ///
    /// # Errors
    ///
    /// Returns [`RankError::ParseError`] for malformed JSON, otherwise as
    /// [`Self::from_record`].
    pub fn from_json(json: &str, registry: &RankRegistry) -> Result<Self, RankError> {
        let record: RankRecord = serde_json::from_str(json).map_err(|e| RankError::ParseError {
            message: e.to_string(),
        })?;
        Self::from_record(&record, registry)
    }

    /// Grant `rank`, replacing any held rank with the same name.
    pub fn add(&self, rank: Arc<dyn Rank>) {
        self.write().insert(rank);
    }

    /// Revoke the rank called `name`. Returns whether it was held.
    pub fn remove(&self, name: &str) -> bool {
        let mut membership = self.write();
        let removed = membership.ranks.remove(name).is_some();
        if removed {
            membership.recalculate();
        }
        removed
    }

    /// The held rank called `name`, if any.
    #[must_use]
    pub fn rank(&self, name: &str) -> Option<Arc<dyn Rank>> {
        self.read().ranks.get(name).cloned()
    }

    /// Whether any held rank is a staff rank.
    #[must_use]
    pub fn staff(&self) -> bool {
        self.read().staff
    }

    /// Highest level among held ranks, or 0 when none are held.
    #[must_use]
    pub fn permission_level(&self) -> u32 {
        self.read().permission_level
    }

    /// Held rank names in sorted order.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.read().ranks.keys().cloned().collect()
    }

    /// Persisted form of the holder, names sorted.
    #[must_use]
    pub fn record(&self) -> RankRecord {
        RankRecord { ranks: self.names() }
    }

    fn read(&self) -> RwLockReadGuard<'_, Membership> {
        self.membership.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Membership> {
        self.membership
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    #![expect(
        clippy::expect_used,
        reason = "test code uses expect for clear failure messages"
    )]

    use super::*;
    use crate::StaticRank;
    use rstest::{fixture, rstest};

    fn rank(name: &str, level: u32, staff: bool) -> Arc<dyn Rank> {
        Arc::new(StaticRank::new(name, level).with_staff(staff))
    }

    #[fixture]
    fn registry() -> RankRegistry {
        RankRegistry::new([
            rank("member", 1, false),
            rank("helper", 20, true),
            rank("vip", 30, false),
        ])
    }

    #[rstest]
    fn empty_holder_has_no_permissions() {
        let holder = RankHolder::new();

        assert_eq!(holder.permission_level(), 0);
        assert!(!holder.staff());
        assert!(holder.names().is_empty());
    }

    #[rstest]
    fn removing_the_top_rank_lowers_aggregates() {
        let holder = RankHolder::new();
        holder.add(rank("member", 1, false));
        holder.add(rank("helper", 20, true));
        assert_eq!(holder.permission_level(), 20);
        assert!(holder.staff());

        assert!(holder.remove("helper"));
        assert_eq!(holder.permission_level(), 1);
        assert!(!holder.staff());
        assert!(!holder.remove("helper"));
    }

    #[rstest]
    fn adding_a_rank_with_a_held_name_replaces_it() {
        let holder = RankHolder::new();
        holder.add(rank("vip", 30, false));
        holder.add(rank("vip", 10, true));

        assert_eq!(holder.names(), vec!["vip".to_owned()]);
        assert_eq!(holder.permission_level(), 10);
        assert!(holder.staff());
    }

    #[rstest]
    fn records_resolve_through_the_registry(registry: RankRegistry) {
        let holder = RankHolder::from_record(&RankRecord::new(["vip", "member"]), &registry)
            .expect("registered ranks");

        assert_eq!(holder.permission_level(), 30);
        assert!(!holder.staff());
        assert_eq!(holder.record(), RankRecord::new(["member", "vip"]));
        assert!(holder.rank("vip").is_some());
        assert!(holder.rank("helper").is_none());
    }

    #[rstest]
    fn unknown_names_fail_the_whole_record(registry: RankRegistry) {
        let err = RankHolder::from_record(&RankRecord::new(["member", "owner"]), &registry)
            .expect_err("owner is not registered");

        assert_eq!(
            err,
            RankError::UnregisteredRank {
                name: "owner".to_owned()
            }
        );
    }

    #[rstest]
    #[case(r#"{"ranks": ["helper"]}"#, 20, true)]
    #[case(r#"{"ranks": []}"#, 0, false)]
    #[case("{}", 0, false)]
    fn json_records_rebuild_holders(
        registry: RankRegistry,
        #[case] json: &str,
        #[case] level: u32,
        #[case] staff: bool,
    ) {
        let holder = RankHolder::from_json(json, &registry).expect("valid record");

        assert_eq!(holder.permission_level(), level);
        assert_eq!(holder.staff(), staff);
    }

    #[rstest]
    fn malformed_json_is_a_parse_error(registry: RankRegistry) {
        let err = RankHolder::from_json("[1, 2", &registry).expect_err("malformed record");

        assert!(matches!(err, RankError::ParseError { .. }));
    }

    #[rstest]
    fn record_serialises_as_a_name_list() {
        let holder = RankHolder::new();
        holder.add(rank("vip", 30, false));
        holder.add(rank("helper", 20, true));

        let value = serde_json::to_value(holder.record()).expect("serialise record");
        assert_eq!(value, serde_json::json!({ "ranks": ["helper", "vip"] }));
    }
}
