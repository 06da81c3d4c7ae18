#![allow(dead_code)]

use u_reassign::audit::Actor;
use u_reassign::models::{
    Bus, BusId, Document, Driver, DriverId, EntityKey, Route, ShiftMode, Student, StudentId,
};
use u_reassign::staging::{OperationKind, StagingBuffer};
use u_reassign::store::{DocumentStore, MemoryStore};
use u_reassign::{EngineConfig, ReassignmentEngine};

/// Two routes, four buses, four drivers (one reserved) and a handful of
/// students whose counters match the bus loads.
///
/// | Bus | Route | Capacity | Mode | Driver | Morning | Evening |
/// |-----|-------|----------|------|--------|---------|---------|
/// | B1 | R1 | 40 | Both | D1 | 2 | 1 |
/// | B2 | R1 | 40 | Both | D2 | 1 | 0 |
/// | B3 | R2 | 40 | Both | D3 | 1 | 0 |
/// | B4 | R1 | 40 | Evening | - | 0 | 0 |
pub fn campus() -> MemoryStore {
    let store = MemoryStore::new();
    store.insert_route(
        Route::new("R1")
            .with_alias("North Loop")
            .with_stop("P1", "Main Gate")
            .with_stop("P2", "Library")
            .with_stop("P3", "Dormitory"),
    );
    store.insert_route(
        Route::new("R2")
            .with_stop("Q1", "Station")
            .with_stop("Q2", "Stadium"),
    );

    store.insert_bus(Bus::new("B1", 40, "R1").with_driver("D1").with_load(2, 1));
    store.insert_bus(Bus::new("B2", 40, "R1").with_driver("D2").with_load(1, 0));
    store.insert_bus(Bus::new("B3", 40, "R2").with_driver("D3").with_load(1, 0));
    store.insert_bus(Bus::new("B4", 40, "R1").with_shift_mode(ShiftMode::Evening));

    store.insert_driver(Driver::new("D1", "EMP-0001").with_name("Ana Reyes").with_bus("B1"));
    store.insert_driver(Driver::new("D2", "EMP-0002").with_name("Bo Lindqvist").with_bus("B2"));
    store.insert_driver(Driver::new("D3", "EMP-0003").with_name("Chidi Okafor").with_bus("B3"));
    store.insert_driver(Driver::new("D4", "EMP-0004").with_name("Dara Singh"));

    store.insert_student(Student::new("S1", "B1", "R1", "P1"));
    store.insert_student(Student::new("S2", "B1", "North Loop", "P2"));
    store.insert_student(
        Student::new("S3", "B1", "R1", "P3").with_shift(u_reassign::models::Shift::Evening),
    );
    store.insert_student(Student::new("S4", "B2", "R1", "P1"));
    store.insert_student(Student::new("S5", "B3", "R2", "Q1"));
    store
}

pub fn engine() -> ReassignmentEngine<MemoryStore> {
    ReassignmentEngine::new(campus())
}

pub fn engine_with(config: EngineConfig) -> ReassignmentEngine<MemoryStore> {
    ReassignmentEngine::with_config(campus(), config)
}

pub fn actor() -> Actor {
    Actor::new("dispatcher-1", "Morning Dispatcher")
}

pub fn stage(kinds: Vec<OperationKind>) -> StagingBuffer {
    let mut buffer = StagingBuffer::new();
    for (i, kind) in kinds.into_iter().enumerate() {
        buffer.stage_at(kind, i as i64).expect("stage operation");
    }
    buffer
}

pub fn assign_driver(driver: &str, bus: &str) -> OperationKind {
    OperationKind::AssignDriver {
        driver: DriverId::new(driver),
        bus: BusId::new(bus),
    }
}

pub fn swap(first: &str, second: &str) -> OperationKind {
    OperationKind::SwapDrivers {
        first: DriverId::new(first),
        second: DriverId::new(second),
    }
}

pub fn move_students(students: &[&str], bus: &str) -> OperationKind {
    OperationKind::AssignStudents {
        students: students.iter().map(|s| StudentId::new(*s)).collect(),
        bus: BusId::new(bus),
        stop: None,
    }
}

pub fn bus<S: DocumentStore>(store: &S, id: &str) -> Bus {
    match store.read_entity(&EntityKey::bus(&BusId::new(id))) {
        Ok(Some(Document::Bus(b))) => b,
        other => panic!("bus {id}: {other:?}"),
    }
}

pub fn driver<S: DocumentStore>(store: &S, id: &str) -> Driver {
    match store.read_entity(&EntityKey::driver(&DriverId::new(id))) {
        Ok(Some(Document::Driver(d))) => d,
        other => panic!("driver {id}: {other:?}"),
    }
}

pub fn student<S: DocumentStore>(store: &S, id: &str) -> Student {
    match store.read_entity(&EntityKey::student(&StudentId::new(id))) {
        Ok(Some(Document::Student(s))) => s,
        other => panic!("student {id}: {other:?}"),
    }
}
