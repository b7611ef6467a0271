use super::init_tracing;
use crate::process::{expand, processes_for_executable, ProcessSet};
use crate::testing::{FakeDesktop, FakeProcess};
use std::path::PathBuf;

fn launcher_family() -> FakeDesktop {
    let desktop = FakeDesktop::new();
    desktop
        .add_process(FakeProcess::new(100, "launcher.exe"))
        .add_process(FakeProcess::new(101, "app.exe").child_of(100))
        .add_process(FakeProcess::new(102, "renderer.exe").child_of(101))
        .add_process(FakeProcess::new(103, "gpu.exe").child_of(101))
        .add_process(FakeProcess::new(200, "unrelated.exe"));
    desktop
}

#[test]
fn test_expand_walks_all_descendants() {
    init_tracing();
    let desktop = launcher_family();
    let set = expand(&desktop, &[100]);
    assert_eq!(set.to_vec(), vec![100, 101, 102, 103]);
    assert!(!set.contains(200));
}

#[test]
fn test_expand_keeps_seeds_that_already_exited() {
    let desktop = launcher_family();
    desktop.exit_process(100);
    let set = expand(&desktop, &[100, 200]);
    // 101 lost its live parent; 100 itself is still reported.
    assert!(set.contains(100));
    assert!(set.contains(200));
    assert!(!set.contains(101));
}

#[test]
fn test_expand_is_a_superset_of_every_seed_combination() {
    let desktop = launcher_family();
    for seeds in [vec![], vec![101], vec![102, 200], vec![100, 101, 102, 103, 200], vec![9999]] {
        let set = expand(&desktop, &seeds);
        for seed in &seeds {
            assert!(set.contains(*seed), "seed {seed} missing from {:?}", set.to_vec());
        }
    }
}

#[test]
fn test_expand_survives_cyclic_parent_links() {
    let desktop = FakeDesktop::new();
    // Pid reuse can produce a parent loop.
    desktop
        .add_process(FakeProcess::new(10, "a.exe").child_of(11))
        .add_process(FakeProcess::new(11, "b.exe").child_of(10));
    let set = expand(&desktop, &[10]);
    assert_eq!(set.to_vec(), vec![10, 11]);
}

#[test]
fn test_expand_is_recomputed_per_call() {
    let desktop = launcher_family();
    let before = expand(&desktop, &[100]);
    desktop.add_process(FakeProcess::new(104, "late-helper.exe").child_of(102));
    let after = expand(&desktop, &[100]);
    assert!(!before.contains(104));
    assert!(after.contains(104));
}

#[test]
fn test_process_set_shrinks_only_on_explicit_removal() {
    let mut set = ProcessSet::from_pids([3, 1, 2]);
    assert!(!set.insert(2));
    assert!(set.insert(4));
    set.extend([5, 1]);
    assert_eq!(set.to_vec(), vec![1, 2, 3, 4, 5]);
    assert!(set.remove(3));
    assert_eq!(set.len(), 4);
    set.clear();
    assert!(set.is_empty());
}

#[test]
fn test_processes_for_executable_matches_path() {
    let dir = tempfile::tempdir().unwrap();
    let exe = dir.path().join("notepad.exe");
    std::fs::write(&exe, b"").unwrap();
    let other = dir.path().join("other.exe");
    std::fs::write(&other, b"").unwrap();

    let desktop = FakeDesktop::new();
    desktop
        .add_process(FakeProcess::new(1, "notepad.exe").exe(&exe))
        .add_process(FakeProcess::new(2, "other.exe").exe(&other))
        .add_process(FakeProcess::new(3, "notepad.exe").exe(&exe))
        .add_process(FakeProcess::new(4, "system"));

    // A non-canonical spelling of the same file still matches.
    let indirect: PathBuf = dir.path().join(".").join("notepad.exe");
    let found = processes_for_executable(&desktop, &indirect).unwrap();
    let pids: Vec<u32> = found.iter().map(|p| p.pid).collect();
    assert_eq!(pids, vec![1, 3]);
}
