//! Regression coverage for the load-through cache and flush protocol.

use std::collections::BTreeMap;
use std::sync::{Arc, Barrier, Condvar, Mutex, mpsc};
use std::time::Duration;

use mockall::predicate::eq;
use rstest::{fixture, rstest};

use super::*;
use crate::domain::ports::MockPunishmentProvider;
use crate::domain::{Alias, HolderSnapshot, Punishment};
use crate::test_support::{FixedClock, RecordingProvider, fixture_now};

type Registry = PunishmentRegistry<RecordingProvider>;

fn registry_with(provider: RecordingProvider) -> Registry {
    PunishmentRegistry::new(Arc::new(provider), Arc::new(FixedClock::default()))
}

#[fixture]
fn registry() -> Registry {
    registry_with(RecordingProvider::default())
}

#[rstest]
fn missing_holders_start_empty(registry: Registry) {
    let holder = registry.load(Category::Account, "X1").expect("load succeeds");

    assert!(!holder.banned());
    assert!(holder.aliases().is_empty());
    assert_eq!(registry.len(), 1);
    assert_eq!(registry.provider().load_calls(Category::Account, "X1"), 1);
}

#[rstest]
fn cache_hits_share_one_instance_and_skip_the_provider(registry: Registry) {
    let first = registry.load(Category::Ip, "1.2.3.4").expect("first load");
    first.ban(Punishment::new(fixture_now(), "evasion", "mod-a"));
    let second = registry.ip("1.2.3.4").expect("second load");

    assert!(Arc::ptr_eq(&first, &second));
    assert!(second.banned());
    assert_eq!(registry.provider().load_calls(Category::Ip, "1.2.3.4"), 1);
}

#[rstest]
fn same_identifier_in_different_categories_is_distinct(registry: Registry) {
    let account = registry.account("shared").expect("account");
    let device = registry.device("shared").expect("device");

    assert!(!Arc::ptr_eq(&account, &device));
    assert_eq!(registry.len(), 2);
}

#[rstest]
fn stored_snapshots_are_rebuilt() {
    let provider = RecordingProvider::default();
    let ban = Punishment::new(fixture_now(), "alt", "mod-a");
    provider.insert(
        Category::Device,
        "dev1",
        &HolderSnapshot {
            identifier: Some("dev1".to_owned()),
            aliases: vec![Alias::new("Bob", "X1")],
            current_ban: ban.clone(),
            past_bans: vec![Punishment::default()],
            ..HolderSnapshot::default()
        },
    );
    let registry = registry_with(provider);

    let holder = registry.device("dev1").expect("load stored holder");
    assert!(holder.banned());
    assert_eq!(holder.current_ban(), ban);
    assert_eq!(holder.ban_history(), vec![Punishment::default()]);
    assert_eq!(holder.aliases(), vec![Alias::new("Bob", "X1")]);
}

#[rstest]
fn failed_loads_are_not_cached() {
    let provider = RecordingProvider::default();
    provider.fail_loads_for(
        Category::Account,
        "X1",
        PunishmentProviderError::backend("connection reset"),
    );
    let registry = registry_with(provider);

    let err = registry.account("X1").expect_err("load fails");
    assert_eq!(
        err,
        RegistryError::Load {
            category: Category::Account,
            identifier: "X1".to_owned(),
            source: PunishmentProviderError::backend("connection reset"),
        }
    );
    assert!(registry.cached(Category::Account, "X1").is_none());
    assert!(registry.is_empty());

    registry
        .provider()
        .clear_load_failure(Category::Account, "X1");
    registry.account("X1").expect("retry succeeds");
    assert_eq!(registry.provider().load_calls(Category::Account, "X1"), 2);
}

#[rstest]
fn undecodable_payloads_surface_as_load_errors() {
    let provider = RecordingProvider::default();
    provider.insert_raw(Category::Ip, "1.2.3.4", r#"{"currentBan": {"time": 9223372036854775807, "issuer": "m"}}"#);
    let registry = registry_with(provider);

    let err = registry.ip("1.2.3.4").expect_err("decode fails");
    assert!(matches!(
        err,
        RegistryError::Load {
            source: PunishmentProviderError::Serialization { .. },
            ..
        }
    ));
}

#[rstest]
fn cached_never_consults_the_provider(registry: Registry) {
    assert!(registry.cached(Category::Ip, "9.9.9.9").is_none());
    assert_eq!(registry.provider().load_calls(Category::Ip, "9.9.9.9"), 0);
}

#[rstest]
fn save_writes_every_cached_holder(registry: Registry) {
    let holder = registry.account("X1").expect("account");
    holder.mute(Punishment::new(fixture_now(), "caps", "mod-a"));
    registry.ip("1.2.3.4").expect("ip");

    registry.save().expect("flush succeeds");

    let stored = registry
        .provider()
        .stored(Category::Account, "X1")
        .expect("account persisted");
    assert_eq!(stored, holder.snapshot());
    assert_eq!(registry.provider().save_calls(Category::Ip, "1.2.3.4"), 1);
}

#[rstest]
fn partial_save_failure_still_attempts_every_holder() {
    let provider = RecordingProvider::default();
    provider.fail_saves_for(Category::Account, "A", PunishmentProviderError::backend("disk full"));
    let registry = registry_with(provider);
    for identifier in ["A", "B", "C"] {
        registry.account(identifier).expect("load");
    }

    let err = registry.save().expect_err("flush reports failure");

    assert_eq!(
        err,
        RegistryError::Save {
            category: Category::Account,
            identifier: "A".to_owned(),
            failed: 1,
            source: PunishmentProviderError::backend("disk full"),
        }
    );
    for identifier in ["A", "B", "C"] {
        assert_eq!(registry.provider().save_calls(Category::Account, identifier), 1);
    }
    assert!(registry.provider().stored(Category::Account, "B").is_some());
    assert!(registry.provider().stored(Category::Account, "C").is_some());
}

#[rstest]
fn save_counts_every_failure_but_reports_the_first() {
    let provider = RecordingProvider::default();
    provider.fail_saves_for(Category::Ip, "1.1.1.1", PunishmentProviderError::backend("first"));
    provider.fail_saves_for(Category::Device, "dev1", PunishmentProviderError::backend("second"));
    let registry = registry_with(provider);
    registry.device("dev1").expect("device");
    registry.ip("1.1.1.1").expect("ip");
    registry.account("X1").expect("account");

    let err = registry.close().expect_err("close flushes");
    // Categories flush in declaration order, so the IP failure comes first.
    assert!(
        matches!(
            err,
            RegistryError::Save {
                category: Category::Ip,
                failed: 2,
                ..
            }
        ),
        "unexpected error: {err:?}"
    );
}

#[rstest]
fn save_skips_keys_whose_load_failed() {
    let provider = RecordingProvider::default();
    provider.fail_loads_for(Category::Ip, "1.2.3.4", PunishmentProviderError::backend("down"));
    let registry = registry_with(provider);
    registry.ip("1.2.3.4").expect_err("load fails");

    registry.save().expect("nothing to flush");
    assert_eq!(registry.provider().save_calls(Category::Ip, "1.2.3.4"), 0);
}

#[rstest]
fn provider_sees_the_registry_key() {
    let mut provider = MockPunishmentProvider::new();
    provider
        .expect_load()
        .with(eq(Category::Device), eq("dev1"))
        .times(1)
        .returning(|_, _| Ok(None));
    provider
        .expect_save()
        .withf(|category, identifier, snapshot| {
            *category == Category::Device
                && identifier == "dev1"
                && snapshot.identifier.as_deref() == Some("dev1")
        })
        .times(1)
        .returning(|_, _, _| Ok(()));
    let registry = PunishmentRegistry::new(Arc::new(provider), Arc::new(FixedClock::default()));

    registry.device("dev1").expect("load");
    registry.device("dev1").expect("cached load");
    registry.save().expect("save");
}

#[rstest]
fn concurrent_loads_create_one_holder() {
    const WORKERS: usize = 16;
    let registry = Arc::new(registry_with(RecordingProvider::with_load_delay(
        Duration::from_millis(20),
    )));
    let barrier = Arc::new(Barrier::new(WORKERS));

    let handles: Vec<_> = (0..WORKERS)
        .map(|_| {
            let registry = Arc::clone(&registry);
            let barrier = Arc::clone(&barrier);
            std::thread::spawn(move || {
                barrier.wait();
                registry.ip("1.2.3.4").expect("concurrent load")
            })
        })
        .collect();
    let holders: Vec<_> = handles
        .into_iter()
        .map(|handle| handle.join().expect("worker thread"))
        .collect();

    let first = holders.first().expect("at least one worker");
    assert!(holders.iter().all(|holder| Arc::ptr_eq(first, holder)));
    assert_eq!(registry.provider().load_calls(Category::Ip, "1.2.3.4"), 1);
    assert_eq!(registry.len(), 1);
}

/// Provider whose load of `slow` waits until a load of any other key has
/// run. If loads were serialised behind one lock, the slow load would time
/// out instead of being released.
struct GatedProvider {
    released: Mutex<bool>,
    opened: Condvar,
    slow_started: Mutex<mpsc::Sender<()>>,
}

impl GatedProvider {
    const SLOW_KEY: &'static str = "slow";
    const GATE_TIMEOUT: Duration = Duration::from_secs(5);

    fn new(slow_started: mpsc::Sender<()>) -> Self {
        Self {
            released: Mutex::new(false),
            opened: Condvar::new(),
            slow_started: Mutex::new(slow_started),
        }
    }
}

impl PunishmentProvider for GatedProvider {
    fn load(
        &self,
        _category: Category,
        identifier: &str,
    ) -> Result<Option<HolderSnapshot>, PunishmentProviderError> {
        let mut released = self.released.lock().expect("gate lock");
        if identifier != Self::SLOW_KEY {
            *released = true;
            self.opened.notify_all();
            return Ok(None);
        }

        self.slow_started
            .lock()
            .expect("signal lock")
            .send(())
            .expect("test thread listening");
        let (released, timeout) = self
            .opened
            .wait_timeout_while(released, Self::GATE_TIMEOUT, |open| !*open)
            .expect("gate wait");
        if timeout.timed_out() && !*released {
            return Err(PunishmentProviderError::backend("gate never opened"));
        }
        Ok(None)
    }

    fn save(
        &self,
        _category: Category,
        _identifier: &str,
        _snapshot: &HolderSnapshot,
    ) -> Result<(), PunishmentProviderError> {
        Ok(())
    }
}

#[rstest]
fn provider_loads_run_outside_the_structural_lock() {
    let (started_tx, started_rx) = mpsc::channel();
    let registry = Arc::new(PunishmentRegistry::new(
        Arc::new(GatedProvider::new(started_tx)),
        Arc::new(FixedClock::default()),
    ));

    let slow = {
        let registry = Arc::clone(&registry);
        std::thread::spawn(move || registry.ip(GatedProvider::SLOW_KEY).map(|_| ()))
    };
    started_rx
        .recv_timeout(GatedProvider::GATE_TIMEOUT)
        .expect("slow load should start");

    registry.ip("2.2.2.2").expect("other key loads while slow load waits");
    slow.join()
        .expect("worker thread")
        .expect("slow load released by the other load");
    assert_eq!(registry.len(), 2);
}

fn slot_count<P>(registry: &PunishmentRegistry<P>) -> usize {
    registry.read_holders().values().map(BTreeMap::len).sum()
}

#[rstest]
fn failed_loads_leave_no_slots_behind() {
    let provider = RecordingProvider::default();
    let addresses: Vec<String> = (0..100).map(|index| format!("10.0.0.{index}")).collect();
    for address in &addresses {
        provider.fail_loads_for(Category::Ip, address, PunishmentProviderError::backend("flapping"));
    }
    let registry = registry_with(provider);
    registry.account("X1").expect("healthy key");

    for address in &addresses {
        registry.ip(address).expect_err("scripted failure");
    }

    assert_eq!(registry.len(), 1);
    assert_eq!(slot_count(&registry), 1);
    assert!(registry.read_holders().get(&Category::Ip).is_none());
}

#[rstest]
fn keys_retry_cleanly_after_their_slot_is_dropped() {
    let provider = RecordingProvider::default();
    provider.fail_loads_for(Category::Device, "dev1", PunishmentProviderError::backend("down"));
    let registry = registry_with(provider);

    registry.device("dev1").expect_err("first load fails");
    assert_eq!(slot_count(&registry), 0);

    registry.provider().clear_load_failure(Category::Device, "dev1");
    let first = registry.device("dev1").expect("retry succeeds");
    let second = registry.device("dev1").expect("cached");
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(slot_count(&registry), 1);
}
