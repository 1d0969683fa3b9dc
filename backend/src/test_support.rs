//! Test utilities for the warden crate.
//!
//! This module provides shared helpers for both unit tests (in `src/`) and
//! integration tests (in `tests/`). It is compiled for unit tests and when
//! the `test-support` feature is enabled.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Local, TimeDelta, TimeZone, Utc};
use mockable::Clock;

use crate::domain::ports::{PunishmentProvider, PunishmentProviderError};
use crate::domain::{Category, HolderSnapshot};

/// Instant every fixture clock starts at: 2026-03-14T12:00:00Z.
pub fn fixture_now() -> DateTime<Utc> {
    match Utc.with_ymd_and_hms(2026, 3, 14, 12, 0, 0).single() {
        Some(now) => now,
        None => panic!("fixture timestamp must be valid"),
    }
}

/// Clock frozen at a single instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Default for FixedClock {
    fn default() -> Self {
        Self(fixture_now())
    }
}

impl Clock for FixedClock {
    fn local(&self) -> DateTime<Local> {
        self.0.with_timezone(&Local)
    }

    fn utc(&self) -> DateTime<Utc> {
        self.0
    }
}

/// Clock that tests advance by hand.
pub struct MutableClock(Mutex<DateTime<Utc>>);

impl MutableClock {
    /// Start the clock at `now`.
    pub fn new(now: DateTime<Utc>) -> Self {
        Self(Mutex::new(now))
    }

    /// Move the clock forward by `seconds`.
    pub fn advance_seconds(&self, seconds: i64) {
        *self.lock_clock() += TimeDelta::seconds(seconds);
    }

    fn lock_clock(&self) -> MutexGuard<'_, DateTime<Utc>> {
        match self.0.lock() {
            Ok(guard) => guard,
            Err(_) => panic!("clock mutex"),
        }
    }
}

impl Default for MutableClock {
    fn default() -> Self {
        Self::new(fixture_now())
    }
}

impl Clock for MutableClock {
    fn local(&self) -> DateTime<Local> {
        self.utc().with_timezone(&Local)
    }

    fn utc(&self) -> DateTime<Utc> {
        *self.lock_clock()
    }
}

type Key = (Category, String);

#[derive(Default)]
struct RecordingState {
    stored: HashMap<Key, String>,
    load_calls: HashMap<Key, usize>,
    save_calls: HashMap<Key, usize>,
    load_failures: HashMap<Key, PunishmentProviderError>,
    save_failures: HashMap<Key, PunishmentProviderError>,
}

/// In-memory provider that stores snapshots as JSON and counts calls.
///
/// Snapshots pass through the serde wire form on every save and load, so a
/// save/load cycle exercises the same encoding a real adapter would.
/// Failures can be scripted per key.
#[derive(Default)]
pub struct RecordingProvider {
    state: Mutex<RecordingState>,
    load_delay: Option<Duration>,
}

impl RecordingProvider {
    /// Provider whose loads sleep for `delay` before answering, widening
    /// race windows in concurrency tests.
    pub fn with_load_delay(delay: Duration) -> Self {
        Self {
            load_delay: Some(delay),
            ..Self::default()
        }
    }

    /// Pre-store `snapshot` for a key.
    pub fn insert(&self, category: Category, identifier: &str, snapshot: &HolderSnapshot) {
        let encoded = match serde_json::to_string(snapshot) {
            Ok(encoded) => encoded,
            Err(error) => panic!("fixture snapshot must serialise: {error}"),
        };
        self.lock()
            .stored
            .insert((category, identifier.to_owned()), encoded);
    }

    /// Pre-store a raw JSON payload for a key.
    pub fn insert_raw(&self, category: Category, identifier: &str, json: &str) {
        self.lock()
            .stored
            .insert((category, identifier.to_owned()), json.to_owned());
    }

    /// Fail every load of a key with `error` until cleared.
    pub fn fail_loads_for(&self, category: Category, identifier: &str, error: PunishmentProviderError) {
        self.lock()
            .load_failures
            .insert((category, identifier.to_owned()), error);
    }

    /// Stop failing loads of a key.
    pub fn clear_load_failure(&self, category: Category, identifier: &str) {
        self.lock()
            .load_failures
            .remove(&(category, identifier.to_owned()));
    }

    /// Fail every save of a key with `error`.
    pub fn fail_saves_for(&self, category: Category, identifier: &str, error: PunishmentProviderError) {
        self.lock()
            .save_failures
            .insert((category, identifier.to_owned()), error);
    }

    /// Number of `load` calls made for a key.
    pub fn load_calls(&self, category: Category, identifier: &str) -> usize {
        let key = (category, identifier.to_owned());
        self.lock().load_calls.get(&key).copied().unwrap_or(0)
    }

    /// Number of `save` calls made for a key.
    pub fn save_calls(&self, category: Category, identifier: &str) -> usize {
        let key = (category, identifier.to_owned());
        self.lock().save_calls.get(&key).copied().unwrap_or(0)
    }

    /// Decode whatever is stored for a key.
    pub fn stored(&self, category: Category, identifier: &str) -> Option<HolderSnapshot> {
        let state = self.lock();
        let encoded = state.stored.get(&(category, identifier.to_owned()))?;
        match serde_json::from_str(encoded) {
            Ok(snapshot) => Some(snapshot),
            Err(error) => panic!("stored snapshot must decode: {error}"),
        }
    }

    fn lock(&self) -> MutexGuard<'_, RecordingState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl PunishmentProvider for RecordingProvider {
    fn load(
        &self,
        category: Category,
        identifier: &str,
    ) -> Result<Option<HolderSnapshot>, PunishmentProviderError> {
        if let Some(delay) = self.load_delay {
            std::thread::sleep(delay);
        }

        let key = (category, identifier.to_owned());
        let mut state = self.lock();
        *state.load_calls.entry(key.clone()).or_default() += 1;
        if let Some(error) = state.load_failures.get(&key) {
            return Err(error.clone());
        }
        state
            .stored
            .get(&key)
            .map(|encoded| serde_json::from_str::<HolderSnapshot>(encoded))
            .transpose()
            .map_err(|error| PunishmentProviderError::serialization(error.to_string()))
    }

    fn save(
        &self,
        category: Category,
        identifier: &str,
        snapshot: &HolderSnapshot,
    ) -> Result<(), PunishmentProviderError> {
        let key = (category, identifier.to_owned());
        let mut state = self.lock();
        *state.save_calls.entry(key.clone()).or_default() += 1;
        if let Some(error) = state.save_failures.get(&key) {
            return Err(error.clone());
        }
        let encoded = serde_json::to_string(snapshot)
            .map_err(|error| PunishmentProviderError::serialization(error.to_string()))?;
        state.stored.insert(key, encoded);
        Ok(())
    }
}
