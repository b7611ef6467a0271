use super::init_tracing;
use crate::termination::{ClosedBy, Terminator};
use crate::testing::{ExitsOn, FakeAction, FakeDesktop, FakeProcess, FakeWindow};
use crate::types::WindowId;
use std::time::Duration;

fn terminate(desktop: &FakeDesktop, pid: u32) -> Result<ClosedBy, crate::HarvestError> {
    Terminator::new(desktop, desktop, Duration::ZERO)
        .terminate(pid)
        .map(|outcome| outcome.closed_by)
}

#[test]
fn test_graceful_close_stops_escalation() {
    init_tracing();
    let desktop = FakeDesktop::new();
    desktop
        .add_process(FakeProcess::new(10, "notepad.exe"))
        .add_window(FakeWindow::new(1, 10, "Notepad"));

    assert_eq!(terminate(&desktop, 10).unwrap(), ClosedBy::WindowClose);
    assert_eq!(desktop.actions(), vec![FakeAction::CloseWindow(WindowId(1))]);
    assert!(!desktop.alive(10));
}

#[test]
fn test_already_exited_runs_no_tier() {
    let desktop = FakeDesktop::new();
    desktop.add_process(FakeProcess::new(10, "gone.exe").exited());

    assert_eq!(terminate(&desktop, 10).unwrap(), ClosedBy::AlreadyExited);
    assert_eq!(terminate(&desktop, 4242).unwrap(), ClosedBy::AlreadyExited);
    assert!(desktop.actions().is_empty());
}

#[test]
fn test_close_signal_tier() {
    let desktop = FakeDesktop::new();
    let mut no_pattern = FakeWindow::new(1, 10, "Legacy");
    no_pattern.info.supports_close = false;
    desktop
        .add_process(FakeProcess::new(10, "legacy.exe").exits_on(ExitsOn::CloseSignal))
        .add_window(no_pattern)
        .add_window(FakeWindow::hidden(2, 10, "helper"));

    assert_eq!(terminate(&desktop, 10).unwrap(), ClosedBy::CloseSignal);
    // Only the visible window is signalled.
    assert_eq!(desktop.actions(), vec![FakeAction::CloseSignal(WindowId(1))]);
}

#[test]
fn test_force_kill_tree_after_ignored_close() {
    let desktop = FakeDesktop::new();
    desktop
        .add_process(FakeProcess::new(10, "stubborn.exe").exits_on(ExitsOn::KillTree))
        .add_process(FakeProcess::new(11, "child.exe").child_of(10).exits_on(ExitsOn::KillTree))
        .add_window(FakeWindow::new(1, 10, "Unsaved changes"));

    assert_eq!(terminate(&desktop, 10).unwrap(), ClosedBy::KillTree);
    assert_eq!(
        desktop.actions(),
        vec![
            FakeAction::CloseWindow(WindowId(1)),
            FakeAction::CloseSignal(WindowId(1)),
            FakeAction::KillTree(10),
        ]
    );
    assert!(!desktop.alive(11));
}

#[test]
fn test_direct_kill_when_tree_kill_is_refused() {
    let desktop = FakeDesktop::new();
    desktop
        .add_process(FakeProcess::new(10, "service.exe").exits_on(ExitsOn::DirectKill))
        .add_process(FakeProcess::new(11, "worker.exe").child_of(10).exits_on(ExitsOn::DirectKill));

    assert_eq!(terminate(&desktop, 10).unwrap(), ClosedBy::DirectKill);
    let actions = desktop.actions();
    assert_eq!(
        actions,
        vec![FakeAction::KillTree(10), FakeAction::Kill(11), FakeAction::Kill(10)]
    );
    assert!(!desktop.alive(10));
    assert!(!desktop.alive(11));
}

#[test]
fn test_unkillable_process_is_termination_failure() {
    let desktop = FakeDesktop::new();
    desktop
        .add_process(FakeProcess::new(10, "protected.exe").exits_on(ExitsOn::Never))
        .add_window(FakeWindow::new(1, 10, "Protected"));

    let err = terminate(&desktop, 10).unwrap_err();
    assert_eq!(err.kind(), "termination_failed");
    assert!(desktop.alive(10));
}

#[test]
fn test_escalation_is_monotonic() {
    // Whatever the process yields to, tiers only ever move forward and
    // stop at the first one that works.
    let order = |action: &FakeAction| match action {
        FakeAction::CloseWindow(_) => 0,
        FakeAction::CloseSignal(_) => 1,
        FakeAction::KillTree(_) => 2,
        FakeAction::Kill(_) => 3,
        _ => 99,
    };
    for exits_on in [
        ExitsOn::WindowClose,
        ExitsOn::CloseSignal,
        ExitsOn::KillTree,
        ExitsOn::DirectKill,
        ExitsOn::Never,
    ] {
        let desktop = FakeDesktop::new();
        desktop
            .add_process(FakeProcess::new(10, "app.exe").exits_on(exits_on))
            .add_window(FakeWindow::new(1, 10, "App"));
        let _ = terminate(&desktop, 10);
        let tiers: Vec<u32> = desktop.actions().iter().map(order).collect();
        assert!(
            tiers.windows(2).all(|w| w[0] <= w[1]),
            "{exits_on:?}: {tiers:?}"
        );
    }
}

#[test]
fn test_terminate_many_is_independent_per_pid() {
    let desktop = FakeDesktop::new();
    desktop
        .add_process(FakeProcess::new(10, "protected.exe").exits_on(ExitsOn::Never))
        .add_process(FakeProcess::new(11, "notepad.exe"))
        .add_window(FakeWindow::new(1, 11, "Notepad"));

    let results = Terminator::new(&desktop, &desktop, Duration::ZERO).terminate_many(&[10, 11, 12]);
    assert_eq!(results.len(), 3);
    assert!(results[0].1.is_err());
    assert_eq!(results[1].1.as_ref().unwrap().closed_by, ClosedBy::WindowClose);
    assert_eq!(results[2].1.as_ref().unwrap().closed_by, ClosedBy::AlreadyExited);
}
