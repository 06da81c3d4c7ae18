//! Load Reconciliation Tests
//!
//! Tests that recounting per-shift loads from student records repairs
//! drifted counters and converges regardless of interleaved commits.

mod common;

use u_reassign::models::{Bus, BusId, ShiftLoad, Student, StudentStatus};
use u_reassign::Error;

#[test]
fn reconcile_repairs_drifted_counters() {
    let engine = common::engine();
    engine
        .store()
        .insert_bus(Bus::new("B2", 40, "R1").with_driver("D2").with_load(9, 4));
    engine.store().insert_student(
        Student::new("S1", "B1", "R1", "P1").with_status(StudentStatus::Suspended),
    );

    let report = engine.reconcile(None).unwrap();
    assert_eq!(report.counts.len(), 4);
    let drifted: Vec<&BusId> = report.drifted.iter().map(|d| &d.bus_id).collect();
    assert_eq!(drifted, vec![&BusId::new("B1"), &BusId::new("B2")]);

    assert_eq!(common::bus(engine.store(), "B1").load, ShiftLoad::new(1, 1));
    assert_eq!(common::bus(engine.store(), "B2").load, ShiftLoad::new(1, 0));
    assert!(engine.reconcile(None).unwrap().is_clean());
}

#[test]
fn reconcile_after_commits_is_clean() {
    let engine = common::engine();
    for (students, bus) in [(&["S1", "S4"][..], "B2"), (&["S2"][..], "B2"), (&["S4"][..], "B1")] {
        let buffer = common::stage(vec![common::move_students(students, bus)]);
        let (set, _) = engine.preview(&buffer).unwrap();
        engine.commit(&set, &common::actor()).unwrap();
        assert!(engine.reconcile(None).unwrap().is_clean());
    }
    assert_eq!(common::bus(engine.store(), "B1").load, ShiftLoad::new(1, 1));
    assert_eq!(common::bus(engine.store(), "B2").load, ShiftLoad::new(2, 0));
}

#[test]
fn stale_set_after_reconcile_conflicts() {
    let engine = common::engine();
    engine
        .store()
        .insert_bus(Bus::new("B2", 40, "R1").with_driver("D2").with_load(5, 0));

    let buffer = common::stage(vec![common::move_students(&["S1"], "B2")]);
    let (set, _) = engine.preview(&buffer).unwrap();
    engine.reconcile(Some(&[BusId::new("B2")])).unwrap();

    let err = engine.commit(&set, &common::actor()).unwrap_err();
    assert!(matches!(err, Error::Conflict { .. }));
}

#[test]
fn reconcile_unknown_bus_writes_nothing() {
    let engine = common::engine();
    engine
        .store()
        .insert_bus(Bus::new("B2", 40, "R1").with_driver("D2").with_load(5, 0));

    let err = engine
        .reconcile(Some(&[BusId::new("B2"), BusId::new("B99")]))
        .unwrap_err();
    assert!(matches!(err, Error::NotFound { .. }));
    assert_eq!(common::bus(engine.store(), "B2").load, ShiftLoad::new(5, 0));
}
