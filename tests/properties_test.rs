//! Net-Change Property Tests
//!
//! Random staged sequences, from fixed seeds, against the shared campus
//! fixture:
//! - Computing net changes is deterministic
//! - Restoring every document at the end of a sequence yields no changes
//! - Operations that cancel out once replayed yield no changes
//! - Committing then rolling back leaves the store as it was
//! - No successful commit leaves a served shift over capacity

mod common;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use u_reassign::models::{
    Bus, BusId, Document, DriverId, EntityKey, Route, RouteId, ShiftMode, Student, StudentId,
};
use u_reassign::staging::{OperationKind, StagingBuffer};
use u_reassign::store::{DocumentStore, MemoryStore, SnapshotScope};
use u_reassign::ReassignmentEngine;

const DRIVERS: [&str; 4] = ["D1", "D2", "D3", "D4"];
const BUSES: [&str; 4] = ["B1", "B2", "B3", "B4"];
const STUDENTS: [&str; 5] = ["S1", "S2", "S3", "S4", "S5"];
const ROUTES: [&str; 3] = ["R1", "R2", "North Loop"];

fn pick<'a>(rng: &mut StdRng, items: &[&'a str]) -> &'a str {
    items[rng.random_range(0..items.len())]
}

fn random_operation(rng: &mut StdRng) -> OperationKind {
    match rng.random_range(0..5) {
        0 => common::assign_driver(pick(rng, &DRIVERS), pick(rng, &BUSES)),
        1 => {
            let first = pick(rng, &DRIVERS);
            let second = loop {
                let d = pick(rng, &DRIVERS);
                if d != first {
                    break d;
                }
            };
            common::swap(first, second)
        }
        2 => OperationKind::MarkReserved {
            driver: DriverId::new(pick(rng, &DRIVERS)),
        },
        3 => OperationKind::ReassignRoute {
            bus: BusId::new(pick(rng, &BUSES)),
            route: RouteId::new(pick(rng, &ROUTES)),
        },
        _ => {
            let first = pick(rng, &STUDENTS);
            let mut students = vec![first];
            let second = pick(rng, &STUDENTS);
            if second != first {
                students.push(second);
            }
            common::move_students(&students, pick(rng, &BUSES))
        }
    }
}

fn random_buffer(rng: &mut StdRng) -> StagingBuffer {
    let len = rng.random_range(1..8);
    common::stage((0..len).map(|_| random_operation(rng)).collect())
}

/// Operations that put every document back where `store` has it.
fn restore_all(store: &MemoryStore) -> Vec<OperationKind> {
    let mut ops = Vec::new();
    for doc in store.documents() {
        match doc {
            Document::Bus(b) => ops.push(OperationKind::ReassignRoute {
                bus: b.id,
                route: b.route_id,
            }),
            Document::Driver(d) => ops.push(match d.bus_id {
                Some(bus) => OperationKind::AssignDriver { driver: d.id, bus },
                None => OperationKind::MarkReserved { driver: d.id },
            }),
            Document::Student(s) => ops.push(OperationKind::AssignStudents {
                students: vec![s.id],
                bus: s.bus_id,
                stop: Some(s.stop_id),
            }),
        }
    }
    ops
}

#[test]
fn net_changes_are_deterministic() {
    let engine = common::engine();
    let mut rng = StdRng::seed_from_u64(0x5eed);
    for _ in 0..200 {
        let buffer = random_buffer(&mut rng);
        let first = engine.compute_net_changes(buffer.operations()).unwrap();
        let second = engine.compute_net_changes(buffer.operations()).unwrap();
        assert_eq!(first, second);
        assert_eq!(
            serde_json::to_vec(&first).unwrap(),
            serde_json::to_vec(&second).unwrap()
        );
    }
}

#[test]
fn restoring_everything_yields_no_changes() {
    let engine = common::engine();
    let restore = restore_all(engine.store());
    let mut rng = StdRng::seed_from_u64(42);
    for _ in 0..200 {
        let mut buffer = random_buffer(&mut rng);
        for op in restore.clone() {
            buffer.stage_at(op, 1_000).unwrap();
        }
        let set = engine.compute_net_changes(buffer.operations()).unwrap();
        assert!(set.is_empty(), "unexpected changes: {:?}", set.changes);
    }
}

/// Sequences whose operations all survive collapsing and only cancel out
/// once replayed.
#[test]
fn operations_that_cancel_on_replay_yield_no_changes() {
    let engine = common::engine();
    let no_ops = |set: &u_reassign::netchange::NetChangeSet| -> Vec<EntityKey> {
        set.removed_no_ops.iter().map(|n| n.entity.clone()).collect()
    };

    let buffer = common::stage(vec![common::swap("D1", "D2"), common::swap("D2", "D1")]);
    let set = engine.compute_net_changes(buffer.operations()).unwrap();
    assert!(set.changes.is_empty(), "unexpected changes: {:?}", set.changes);
    assert!(set.superseded.is_empty());
    let removed = no_ops(&set);
    for key in [
        EntityKey::bus(&BusId::new("B1")),
        EntityKey::bus(&BusId::new("B2")),
        EntityKey::driver(&DriverId::new("D1")),
        EntityKey::driver(&DriverId::new("D2")),
    ] {
        assert!(removed.contains(&key), "{key:?} missing from {removed:?}");
    }

    // The first move survives as the last writer of S4.
    let buffer = common::stage(vec![
        common::move_students(&["S1", "S4"], "B2"),
        common::move_students(&["S1"], "B1"),
    ]);
    let set = engine.compute_net_changes(buffer.operations()).unwrap();
    assert!(set.changes.is_empty(), "unexpected changes: {:?}", set.changes);
    assert!(set.superseded.is_empty());
    assert!(set.load_impacts.is_empty());
    let removed = no_ops(&set);
    for key in [
        EntityKey::student(&StudentId::new("S1")),
        EntityKey::student(&StudentId::new("S4")),
        EntityKey::bus(&BusId::new("B1")),
        EntityKey::bus(&BusId::new("B2")),
    ] {
        assert!(removed.contains(&key), "{key:?} missing from {removed:?}");
    }

    let buffer = common::stage(vec![OperationKind::ReassignRoute {
        bus: BusId::new("B1"),
        route: RouteId::new("North Loop"),
    }]);
    let set = engine.compute_net_changes(buffer.operations()).unwrap();
    assert!(set.changes.is_empty(), "unexpected changes: {:?}", set.changes);
    assert!(set.route_impacts.is_empty());
    assert_eq!(set.removed_no_ops.len(), 1);
    assert_eq!(set.removed_no_ops[0].entity, EntityKey::bus(&BusId::new("B1")));
    assert_eq!(common::bus(engine.store(), "B1").route_id, RouteId::new("R1"));
}

#[test]
fn commit_then_rollback_round_trips_the_store() {
    let mut rng = StdRng::seed_from_u64(7);
    for _ in 0..100 {
        let engine = common::engine();
        let original = engine.store().documents();
        let buffer = random_buffer(&mut rng);
        let (set, _) = engine.preview(&buffer).unwrap();
        let Ok(committed) = engine.commit_with_override(&set, &common::actor()) else {
            continue;
        };
        match &committed.operation_id {
            Some(id) => {
                engine.rollback(id, &common::actor()).unwrap();
            }
            None => assert!(committed.is_no_op()),
        }
        assert_eq!(engine.store().documents(), original);
    }
}

fn tight_campus() -> MemoryStore {
    let store = MemoryStore::new();
    store.insert_route(Route::new("R1").with_stop("P1", "Gate").with_stop("P2", "Hall"));
    store.insert_bus(Bus::new("B1", 2, "R1").with_load(2, 1));
    store.insert_bus(Bus::new("B2", 2, "R1").with_load(1, 1));
    store.insert_bus(Bus::new("B3", 1, "R1").with_shift_mode(ShiftMode::Morning));
    let riders = [
        ("S1", "B1", "P1", false),
        ("S2", "B1", "P2", false),
        ("S3", "B1", "P1", true),
        ("S4", "B2", "P2", false),
        ("S5", "B2", "P1", true),
    ];
    for (id, bus, stop, evening) in riders {
        let mut student = Student::new(id, bus, "R1", stop);
        if evening {
            student = student.with_shift(u_reassign::models::Shift::Evening);
        }
        store.insert_student(student);
    }
    store
}

#[test]
fn successful_commits_respect_capacity() {
    let engine = ReassignmentEngine::new(tight_campus());
    let buses = ["B1", "B2", "B3"];
    let mut rng = StdRng::seed_from_u64(2024);
    for _ in 0..300 {
        let students: Vec<StudentId> = STUDENTS
            .iter()
            .filter(|_| rng.random_bool(0.3))
            .map(|s| StudentId::new(*s))
            .collect();
        if students.is_empty() {
            continue;
        }
        let mut buffer = StagingBuffer::new();
        buffer
            .stage_at(
                OperationKind::AssignStudents {
                    students,
                    bus: BusId::new(buses[rng.random_range(0..buses.len())]),
                    stop: None,
                },
                0,
            )
            .unwrap();
        let (set, _) = engine.preview(&buffer).unwrap();
        let _ = engine.commit(&set, &common::actor());

        let snapshot = engine.store().read_snapshot(&SnapshotScope::All).unwrap();
        for bus in snapshot.buses.values() {
            assert!(
                bus.load.overloaded_shifts(bus.capacity, bus.shift_mode).is_empty(),
                "bus {} over capacity: {}",
                bus.id,
                bus.load
            );
        }
    }
}
