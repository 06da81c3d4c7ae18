//! In-memory document store.
//!
//! Transactions run on a private copy of the state under a lock and swap it
//! in on success, so a failed closure leaves nothing behind and concurrent
//! callers are serialized.

use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::trace;

use super::{DocumentStore, SnapshotScope, Transaction};
use crate::audit::{OperationType, ReassignmentLog};
use crate::error::{Error, Result};
use crate::models::{
    Bus, BusId, Collection, Document, Driver, DriverId, EntityKey, OperationId, Route, RouteId,
    Snapshot, Student, StudentId,
};

#[derive(Debug, Clone, Default)]
struct MemoryState {
    buses: BTreeMap<BusId, Bus>,
    drivers: BTreeMap<DriverId, Driver>,
    routes: BTreeMap<RouteId, Route>,
    students: BTreeMap<StudentId, Student>,
    logs: BTreeMap<OperationId, ReassignmentLog>,
    latest: BTreeMap<OperationType, OperationId>,
    sequence: u64,
}

impl MemoryState {
    fn get(&self, key: &EntityKey) -> Option<Document> {
        match key.collection {
            Collection::Buses => self
                .buses
                .get(&BusId::new(key.id.as_str()))
                .cloned()
                .map(Document::Bus),
            Collection::Drivers => self
                .drivers
                .get(&DriverId::new(key.id.as_str()))
                .cloned()
                .map(Document::Driver),
            Collection::Students => self
                .students
                .get(&StudentId::new(key.id.as_str()))
                .cloned()
                .map(Document::Student),
        }
    }

    fn put(&mut self, doc: Document) {
        match doc {
            Document::Bus(b) => {
                self.buses.insert(b.id.clone(), b);
            }
            Document::Driver(d) => {
                self.drivers.insert(d.id.clone(), d);
            }
            Document::Student(s) => {
                self.students.insert(s.id.clone(), s);
            }
        }
    }
}

/// A [`DocumentStore`] held in process memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
    fail_log_writes: AtomicBool,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store holding every document of `snapshot`.
    pub fn from_snapshot(snapshot: &Snapshot) -> Self {
        let store = Self::new();
        {
            let mut state = store.state.lock();
            state.buses = snapshot.buses.clone();
            state.drivers = snapshot.drivers.clone();
            state.routes = snapshot.routes.clone();
            state.students = snapshot.students.clone();
        }
        store
    }

    /// Inserts or replaces a bus outside any transaction.
    pub fn insert_bus(&self, bus: Bus) {
        self.state.lock().buses.insert(bus.id.clone(), bus);
    }

    /// Inserts or replaces a driver outside any transaction.
    pub fn insert_driver(&self, driver: Driver) {
        self.state.lock().drivers.insert(driver.id.clone(), driver);
    }

    /// Inserts or replaces a route outside any transaction.
    pub fn insert_route(&self, route: Route) {
        self.state.lock().routes.insert(route.id.clone(), route);
    }

    /// Inserts or replaces a student outside any transaction.
    pub fn insert_student(&self, student: Student) {
        self.state.lock().students.insert(student.id.clone(), student);
    }

    /// Deletes a document outside any transaction.
    pub fn remove(&self, key: &EntityKey) -> bool {
        let mut state = self.state.lock();
        let id = key.id.as_str();
        match key.collection {
            Collection::Buses => state.buses.remove(&BusId::new(id)).is_some(),
            Collection::Drivers => state.drivers.remove(&DriverId::new(id)).is_some(),
            Collection::Students => state.students.remove(&StudentId::new(id)).is_some(),
        }
    }

    /// Makes every later audit log write fail, to exercise best-effort audit.
    pub fn fail_log_writes(&self, fail: bool) {
        self.fail_log_writes.store(fail, Ordering::SeqCst);
    }

    /// Every document currently stored, in key order.
    pub fn documents(&self) -> Vec<Document> {
        let state = self.state.lock();
        let buses = state.buses.values().cloned().map(Document::Bus);
        let drivers = state.drivers.values().cloned().map(Document::Driver);
        let students = state.students.values().cloned().map(Document::Student);
        buses.chain(drivers).chain(students).collect()
    }
}

struct MemoryTransaction<'a> {
    state: &'a mut MemoryState,
    fail_log_writes: bool,
}

impl MemoryTransaction<'_> {
    fn check_log_write(&self) -> Result<()> {
        if self.fail_log_writes {
            Err(Error::Store("audit log writes are failing".to_string()))
        } else {
            Ok(())
        }
    }
}

impl Transaction for MemoryTransaction<'_> {
    fn get(&self, key: &EntityKey) -> Result<Option<Document>> {
        Ok(self.state.get(key))
    }

    fn put(&mut self, doc: Document) -> Result<()> {
        trace!(key = %doc.key(), "put document");
        self.state.put(doc);
        Ok(())
    }

    fn buses(&self) -> Result<Vec<Bus>> {
        Ok(self.state.buses.values().cloned().collect())
    }

    fn students(&self) -> Result<Vec<Student>> {
        Ok(self.state.students.values().cloned().collect())
    }

    fn next_sequence(&mut self) -> Result<u64> {
        self.state.sequence += 1;
        Ok(self.state.sequence)
    }

    fn get_log(&self, id: &OperationId) -> Result<Option<ReassignmentLog>> {
        Ok(self.state.logs.get(id).cloned())
    }

    fn put_log(&mut self, log: ReassignmentLog) -> Result<()> {
        self.check_log_write()?;
        self.state.logs.insert(log.operation_id.clone(), log);
        Ok(())
    }

    fn delete_log(&mut self, id: &OperationId) -> Result<bool> {
        self.check_log_write()?;
        Ok(self.state.logs.remove(id).is_some())
    }

    fn logs(&self) -> Result<Vec<ReassignmentLog>> {
        let mut logs: Vec<ReassignmentLog> = self.state.logs.values().cloned().collect();
        logs.sort_by(|a, b| {
            a.created_at_ms
                .cmp(&b.created_at_ms)
                .then_with(|| a.operation_id.cmp(&b.operation_id))
        });
        Ok(logs)
    }

    fn latest(&self, operation_type: OperationType) -> Result<Option<OperationId>> {
        Ok(self.state.latest.get(&operation_type).cloned())
    }

    fn set_latest(&mut self, operation_type: OperationType, id: &OperationId) -> Result<()> {
        self.check_log_write()?;
        self.state.latest.insert(operation_type, id.clone());
        Ok(())
    }
}

impl DocumentStore for MemoryStore {
    fn read_snapshot(&self, scope: &SnapshotScope) -> Result<Snapshot> {
        let state = self.state.lock();
        let mut snapshot = Snapshot {
            routes: state.routes.clone(),
            ..Snapshot::default()
        };
        for bus in state.buses.values() {
            if scope.includes(&EntityKey::bus(&bus.id)) {
                snapshot.buses.insert(bus.id.clone(), bus.clone());
            }
        }
        for driver in state.drivers.values() {
            if scope.includes(&EntityKey::driver(&driver.id)) {
                snapshot.drivers.insert(driver.id.clone(), driver.clone());
            }
        }
        for student in state.students.values() {
            if scope.includes(&EntityKey::student(&student.id)) {
                snapshot.students.insert(student.id.clone(), student.clone());
            }
        }
        Ok(snapshot)
    }

    fn read_entity(&self, key: &EntityKey) -> Result<Option<Document>> {
        Ok(self.state.lock().get(key))
    }

    fn transaction<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut dyn Transaction) -> Result<T>,
    {
        let mut guard = self.state.lock();
        let mut working = guard.clone();
        let mut tx = MemoryTransaction {
            state: &mut working,
            fail_log_writes: self.fail_log_writes.load(Ordering::SeqCst),
        };
        let out = f(&mut tx)?;
        *guard = working;
        Ok(out)
    }
}
