use super::*;
use crate::test_support::{capture_warnings, catalog, record};
use rota_config::{MemoryRotationStore, RotationRecord, TomlRotationStore};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;
use std::time::Duration;
use tempfile::tempdir;

const MAPS: &[&str] = &["x", "y", "z", "Harb", "Mega Blitz"];

fn manager_with(records: Vec<(&str, RotationRecord)>) -> (Arc<MemoryRotationStore>, RotationManager) {
    let store = Arc::new(MemoryRotationStore::with_records(
        records.into_iter().map(|(n, r)| (n.to_string(), r)),
    ));
    let manager = RotationManager::load(store.clone(), Arc::new(catalog(MAPS))).unwrap();
    (store, manager)
}

fn tiered() -> (Arc<MemoryRotationStore>, RotationManager) {
    manager_with(vec![
        ("default", record(true, 0, &["x", "y", "z"], Some("x"))),
        ("medium", record(true, 10, &["Harb", "x"], Some("Harb"))),
        ("mega", record(true, 50, &["Mega Blitz"], None)),
    ])
}

fn persisted_next(store: &dyn RotationStore, rotation: &str) -> Option<String> {
    store.read(rotation).unwrap().unwrap().next_map
}

/// Store whose flushes always fail.
#[derive(Default)]
struct FailingFlushStore {
    inner: MemoryRotationStore,
    attempts: AtomicU64,
}

impl RotationStore for FailingFlushStore {
    fn rotation_names(&self) -> Result<Vec<String>> {
        self.inner.rotation_names()
    }

    fn read(&self, rotation: &str) -> Result<Option<RotationRecord>> {
        self.inner.read(rotation)
    }

    fn write(&self, rotation: &str, field: RotationField) -> Result<()> {
        self.inner.write(rotation, field)
    }

    fn flush(&self) -> Result<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        anyhow::bail!("disk full")
    }
}

/// Store that, once armed, parks the next `read` until released.
struct GatedReadStore {
    inner: MemoryRotationStore,
    armed: AtomicBool,
    entered: Mutex<Sender<()>>,
    release: Mutex<Receiver<()>>,
}

impl GatedReadStore {
    fn new(inner: MemoryRotationStore) -> (Self, Receiver<()>, Sender<()>) {
        let (entered_tx, entered_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();
        let store = Self {
            inner,
            armed: AtomicBool::new(false),
            entered: Mutex::new(entered_tx),
            release: Mutex::new(release_rx),
        };
        (store, entered_rx, release_tx)
    }
}

impl RotationStore for GatedReadStore {
    fn rotation_names(&self) -> Result<Vec<String>> {
        self.inner.rotation_names()
    }

    fn read(&self, rotation: &str) -> Result<Option<RotationRecord>> {
        if self.armed.swap(false, Ordering::SeqCst) {
            self.entered.lock().unwrap().send(()).unwrap();
            self.release.lock().unwrap().recv().unwrap();
        }
        self.inner.read(rotation)
    }

    fn write(&self, rotation: &str, field: RotationField) -> Result<()> {
        self.inner.write(rotation, field)
    }

    fn flush(&self) -> Result<()> {
        self.inner.flush()
    }
}

// ── Loading ──────────────────────────────────────────────────────

#[test]
fn test_load_builds_every_rotation() {
    let (_, manager) = tiered();
    assert_eq!(
        manager.rotation_names().unwrap(),
        vec!["default", "medium", "mega"]
    );
    let summaries = manager.summaries().unwrap();
    assert_eq!(summaries.len(), 3);
    assert_eq!(summaries[1].next_map.as_deref(), Some("Harb"));
}

#[test]
fn test_load_skips_unreadable_rotation() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("rotations.toml");
    std::fs::write(
        &path,
        "[rotations.good]\nenabled = true\nmaps = [\"x\"]\n\n[rotations.bad]\nplayers = \"lots\"\n",
    )
    .unwrap();
    let store = Arc::new(TomlRotationStore::open(&path).unwrap());

    let (manager, logs) =
        capture_warnings(|| RotationManager::load(store, Arc::new(catalog(MAPS))).unwrap());
    assert_eq!(manager.rotation_names().unwrap(), vec!["good"]);
    assert!(logs.contains("Skipping unreadable rotation"), "{logs}");
}

#[test]
fn test_unknown_rotation() {
    let (_, manager) = tiered();
    let expected = RotationError::RotationNotFound("ranked".into());
    assert_eq!(manager.peek_next_map("ranked").unwrap_err(), expected);
    assert_eq!(manager.pop_next_map("ranked").unwrap_err(), expected);
    assert_eq!(manager.advance("ranked", 1).unwrap_err(), expected);
    assert_eq!(manager.summary("ranked").unwrap_err(), expected);
}

// ── Cursor moves & persistence ───────────────────────────────────

#[test]
fn test_pop_serves_and_persists_next_map() {
    let (store, manager) = manager_with(vec![("A", record(true, 0, &["x", "y", "z"], Some("y")))]);

    assert_eq!(manager.peek_next_map("A").unwrap().name(), "y");
    assert_eq!(manager.pop_next_map("A").unwrap().name(), "y");
    assert_eq!(manager.peek_next_map("A").unwrap().name(), "z");

    assert_eq!(persisted_next(&*store, "A").as_deref(), Some("z"));
    assert_eq!(store.flush_count(), 1);
}

#[test]
fn test_peek_does_not_persist() {
    let (store, manager) = tiered();
    manager.peek_next_map("default").unwrap();
    manager.summary("default").unwrap();
    assert_eq!(store.flush_count(), 0);
}

#[test]
fn test_advance_persists_wrapped_cursor() {
    let (store, manager) = tiered();
    assert_eq!(manager.advance("default", 5).unwrap().name(), "z");
    assert_eq!(persisted_next(&*store, "default").as_deref(), Some("z"));
    assert_eq!(manager.summary("default").unwrap().position, 2);
}

#[test]
fn test_set_position_persists() {
    let (store, manager) = tiered();
    assert_eq!(manager.set_position("default", 1).unwrap().name(), "y");
    assert_eq!(persisted_next(&*store, "default").as_deref(), Some("y"));
    assert_eq!(store.flush_count(), 1);
}

#[test]
fn test_set_next_map_persists() {
    let (store, manager) = tiered();
    manager.set_next_map("default", "z").unwrap();
    assert_eq!(persisted_next(&*store, "default").as_deref(), Some("z"));

    let err = manager.set_next_map("default", "Harb").unwrap_err();
    assert!(matches!(err, RotationError::MapNotInRotation { .. }));
    assert_eq!(persisted_next(&*store, "default").as_deref(), Some("z"));
}

#[test]
fn test_recovery_fallback_is_not_written_back_until_moved() {
    let (store, manager) =
        manager_with(vec![("A", record(true, 0, &["x", "y"], Some("deleted")))]);
    assert_eq!(manager.peek_next_map("A").unwrap().name(), "x");
    assert_eq!(persisted_next(&*store, "A").as_deref(), Some("deleted"));

    manager.pop_next_map("A").unwrap();
    assert_eq!(persisted_next(&*store, "A").as_deref(), Some("y"));
}

// ── Empty rotations ──────────────────────────────────────────────

#[test]
fn test_empty_rotation_is_never_selected_or_popped() {
    let (store, manager) = manager_with(vec![
        ("B", record(true, 0, &["gone", "also-gone"], None)),
        ("C", record(true, 5, &["x"], None)),
    ]);

    assert_eq!(
        manager.pop_next_map("B").unwrap_err(),
        RotationError::EmptyRotation("B".into())
    );
    assert_eq!(
        manager.advance("B", 1).unwrap_err(),
        RotationError::EmptyRotation("B".into())
    );
    assert_eq!(store.flush_count(), 0);

    for participants in [0, 4] {
        assert_eq!(
            manager.select_rotation(participants).unwrap_err(),
            RotationError::NoEligibleRotation { participants }
        );
    }
    for participants in [5, 1000] {
        assert_eq!(manager.select_rotation(participants).unwrap().name, "C");
    }
}

// ── Selection ────────────────────────────────────────────────────

#[test]
fn test_select_rotation_by_population() {
    let (_, manager) = tiered();
    assert_eq!(manager.select_rotation(25).unwrap().name, "medium");
    assert_eq!(manager.select_rotation(5).unwrap().name, "default");
    assert_eq!(manager.select_rotation(100).unwrap().name, "mega");
}

#[test]
fn test_select_rotation_none_eligible() {
    let (_, manager) = manager_with(vec![
        ("medium", record(true, 10, &["x"], None)),
        ("off", record(false, 0, &["x"], None)),
    ]);
    assert_eq!(
        manager.select_rotation(3).unwrap_err(),
        RotationError::NoEligibleRotation { participants: 3 }
    );
}

#[test]
fn test_pop_for_participants() {
    let (store, manager) = tiered();
    let (rotation, map) = manager.pop_for_participants(12).unwrap();
    assert_eq!(rotation, "medium");
    assert_eq!(map.name(), "Harb");
    assert_eq!(persisted_next(&*store, "medium").as_deref(), Some("x"));

    let (rotation, map) = manager.pop_for_participants(0).unwrap();
    assert_eq!(rotation, "default");
    assert_eq!(map.name(), "x");
}

// ── Flush failures ───────────────────────────────────────────────

#[test]
fn test_flush_failure_keeps_in_memory_cursor() {
    let store = Arc::new(FailingFlushStore::default());
    store
        .write("A", RotationField::Enabled(true))
        .unwrap();
    store
        .write(
            "A",
            RotationField::Maps(vec!["x".into(), "y".into(), "z".into()]),
        )
        .unwrap();
    let manager = RotationManager::load(store.clone(), Arc::new(catalog(MAPS))).unwrap();

    let (served, logs) = capture_warnings(|| {
        (0..4)
            .map(|_| manager.pop_next_map("A").unwrap().name().to_string())
            .collect::<Vec<_>>()
    });
    assert_eq!(served, vec!["x", "y", "z", "x"]);
    assert_eq!(store.attempts.load(Ordering::SeqCst), 4);
    assert!(logs.contains("Failed to save rotations"), "{logs}");
    assert!(logs.contains("disk full"), "{logs}");
    assert_eq!(persisted_next(&*store, "A").as_deref(), Some("y"));
}

// ── Restarts ─────────────────────────────────────────────────────

const ROTATIONS_TOML: &str = r#"
[rotations.default]
enabled = true
players = 0
maps = ["x", "y", "z"]
next_map = "y"

[rotations.mega]
enabled = true
players = 50
maps = ["Mega Blitz", "Harb"]
"#;

#[test]
fn test_cursor_survives_restart() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("rotations.toml");
    std::fs::write(&path, ROTATIONS_TOML).unwrap();

    {
        let store = Arc::new(TomlRotationStore::open(&path).unwrap());
        let manager = RotationManager::load(store, Arc::new(catalog(MAPS))).unwrap();
        assert_eq!(manager.pop_next_map("default").unwrap().name(), "y");
        assert_eq!(manager.pop_next_map("default").unwrap().name(), "z");
    }

    let store = Arc::new(TomlRotationStore::open(&path).unwrap());
    let manager = RotationManager::load(store, Arc::new(catalog(MAPS))).unwrap();
    let summary = manager.summary("default").unwrap();
    assert!(summary.recovery.is_restored());
    assert_eq!(summary.next_map.as_deref(), Some("x"));
    assert_eq!(manager.pop_next_map("default").unwrap().name(), "x");
}

#[test]
fn test_restart_after_map_removed_falls_back() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("rotations.toml");
    std::fs::write(&path, ROTATIONS_TOML).unwrap();

    let store = Arc::new(TomlRotationStore::open(&path).unwrap());
    let shrunk = Arc::new(catalog(&["x", "z", "Mega Blitz"]));
    let manager = RotationManager::load(store, shrunk).unwrap();

    let summary = manager.summary("default").unwrap();
    assert_eq!(summary.maps, vec!["x", "z"]);
    assert_eq!(summary.unresolved_maps, vec!["y"]);
    assert_eq!(summary.position, 0);
    assert!(!summary.recovery.is_restored());
}

#[test]
fn test_reload_rebuilds_from_store() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("rotations.toml");
    std::fs::write(&path, ROTATIONS_TOML).unwrap();

    let store = Arc::new(TomlRotationStore::open(&path).unwrap());
    let manager = RotationManager::load(store, Arc::new(catalog(MAPS))).unwrap();
    manager.pop_next_map("default").unwrap();

    std::fs::write(
        &path,
        "[rotations.weekend]\nenabled = true\nplayers = 0\nmaps = [\"Harb\", \"z\"]\nnext_map = \"z\"\n",
    )
    .unwrap();
    manager.reload().unwrap();

    assert_eq!(manager.rotation_names().unwrap(), vec!["weekend"]);
    assert_eq!(manager.peek_next_map("weekend").unwrap().name(), "z");
    assert_eq!(
        manager.peek_next_map("default").unwrap_err(),
        RotationError::RotationNotFound("default".into())
    );
}

#[test]
fn test_managers_sharing_a_file_never_replay_a_map() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("rotations.toml");
    std::fs::write(&path, ROTATIONS_TOML).unwrap();

    let open = || {
        let store = Arc::new(TomlRotationStore::open(&path).unwrap());
        RotationManager::load(store, Arc::new(catalog(MAPS))).unwrap()
    };
    let host = open();
    let cli = open();

    assert_eq!(host.pop_next_map("default").unwrap().name(), "y");
    assert_eq!(cli.pop_next_map("mega").unwrap().name(), "Mega Blitz");

    let restarted = open();
    assert_eq!(restarted.peek_next_map("default").unwrap().name(), "z");
    assert_eq!(restarted.peek_next_map("mega").unwrap().name(), "Harb");
}

// ── Concurrency ──────────────────────────────────────────────────

#[test]
fn test_concurrent_pops_never_duplicate_or_skip() {
    let (store, manager) = manager_with(vec![("A", record(true, 0, &["x", "y", "z"], Some("x")))]);
    let manager = Arc::new(manager);

    let threads = 4;
    let pops_per_thread = 30;
    let handles: Vec<_> = (0..threads)
        .map(|_| {
            let manager = Arc::clone(&manager);
            thread::spawn(move || {
                (0..pops_per_thread)
                    .map(|_| manager.pop_next_map("A").unwrap().name().to_string())
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    let mut counts = BTreeMap::new();
    for handle in handles {
        for map in handle.join().unwrap() {
            *counts.entry(map).or_insert(0usize) += 1;
        }
    }

    let total = threads * pops_per_thread;
    assert_eq!(counts.values().sum::<usize>(), total);
    for map in ["x", "y", "z"] {
        assert_eq!(counts[map], total / 3, "uneven serves: {counts:?}");
    }
    assert_eq!(manager.summary("A").unwrap().position, 0);
    assert_eq!(persisted_next(&*store, "A").as_deref(), Some("x"));
    assert_eq!(store.flush_count(), total as u64);
}

#[test]
fn test_concurrent_reads_see_valid_positions() {
    let (_, manager) = manager_with(vec![("A", record(true, 0, &["x", "y", "z"], None))]);
    let manager = Arc::new(manager);

    let writer = {
        let manager = Arc::clone(&manager);
        thread::spawn(move || {
            for _ in 0..200 {
                manager.pop_next_map("A").unwrap();
            }
        })
    };
    let reader = {
        let manager = Arc::clone(&manager);
        thread::spawn(move || {
            for _ in 0..200 {
                let summary = manager.summary("A").unwrap();
                assert!(summary.position < 3);
                assert_eq!(
                    summary.next_map.as_deref(),
                    Some(summary.maps[summary.position].as_str())
                );
            }
        })
    };

    writer.join().unwrap();
    reader.join().unwrap();
}

#[test]
fn test_pop_during_reload_waits_for_rebuilt_rotation() {
    let inner = MemoryRotationStore::with_records([(
        "A".to_string(),
        record(true, 0, &["x", "y", "z"], Some("x")),
    )]);
    let (store, entered, release) = GatedReadStore::new(inner);
    let store = Arc::new(store);
    let manager = RotationManager::load(store.clone(), Arc::new(catalog(MAPS))).unwrap();
    let manager = Arc::new(manager);

    store.armed.store(true, Ordering::SeqCst);
    let reloader = {
        let manager = Arc::clone(&manager);
        thread::spawn(move || manager.reload().unwrap())
    };
    entered.recv().unwrap();

    let popper = {
        let manager = Arc::clone(&manager);
        thread::spawn(move || manager.pop_next_map("A").unwrap().name().to_string())
    };
    thread::sleep(Duration::from_millis(50));
    assert!(!popper.is_finished(), "pop must wait for the reload to swap");

    release.send(()).unwrap();
    reloader.join().unwrap();
    let first = popper.join().unwrap();
    let second = manager.pop_next_map("A").unwrap().name().to_string();

    assert_eq!(first, "x");
    assert_eq!(second, "y");
}

#[test]
fn test_pop_for_participants_survives_concurrent_reloads() {
    let (_, manager) = tiered();
    let manager = Arc::new(manager);

    let reloader = {
        let manager = Arc::clone(&manager);
        thread::spawn(move || {
            for _ in 0..100 {
                manager.reload().unwrap();
            }
        })
    };
    let popper = {
        let manager = Arc::clone(&manager);
        thread::spawn(move || {
            for _ in 0..100 {
                let (rotation, _) = manager.pop_for_participants(12).unwrap();
                assert_eq!(rotation, "medium");
            }
        })
    };

    reloader.join().unwrap();
    popper.join().unwrap();
}
