//! Per-shift load reconciliation.
//!
//! Recomputes each bus's morning and evening counters from the student
//! records and overwrites stored counters that disagree. Runs outside the
//! commit path and is idempotent: any number of runs, interleaved with
//! commits in any order, converge on the counts the student records imply.
//!
//! # Counting
//!
//! | Student status | Counted |
//! |----------------|---------|
//! | Active | yes, on the student's shift |
//! | Suspended | no |
//! | Withdrawn | no |

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::models::{BusId, Document, EntityKey, ShiftLoad};
use crate::store::DocumentStore;

/// A bus whose stored counters were wrong.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadDrift {
    /// The bus.
    pub bus_id: BusId,
    /// Counters found in the store.
    pub stored: ShiftLoad,
    /// Counters implied by the student records.
    pub actual: ShiftLoad,
}

/// Result of a reconciliation run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileReport {
    /// Recomputed counters of every examined bus.
    pub counts: BTreeMap<BusId, ShiftLoad>,
    /// Buses whose counters were overwritten.
    pub drifted: Vec<LoadDrift>,
}

impl ReconcileReport {
    /// Whether every stored counter was already correct.
    pub fn is_clean(&self) -> bool {
        self.drifted.is_empty()
    }
}

/// Recounts `buses` (all buses if `None`) and fixes drifted counters.
///
/// # Errors
/// [`Error::NotFound`] if a requested bus does not exist; nothing is
/// written.
pub fn reconcile<S: DocumentStore>(store: &S, buses: Option<&[BusId]>) -> Result<ReconcileReport> {
    let report = store.transaction(|tx| {
        let all = tx.buses()?;
        let wanted: Option<BTreeSet<&BusId>> = buses.map(|ids| ids.iter().collect());
        if let Some(wanted) = &wanted {
            for id in wanted {
                if !all.iter().any(|b| &&b.id == id) {
                    return Err(Error::NotFound {
                        key: EntityKey::bus(id),
                    });
                }
            }
        }

        let mut counts: BTreeMap<BusId, ShiftLoad> = all
            .iter()
            .filter(|b| wanted.as_ref().map_or(true, |w| w.contains(&b.id)))
            .map(|b| (b.id.clone(), ShiftLoad::default()))
            .collect();
        for student in tx.students()? {
            if !student.is_active() {
                continue;
            }
            if let Some(load) = counts.get_mut(&student.bus_id) {
                load.board(student.shift);
            }
        }

        let mut drifted = Vec::new();
        for mut bus in all {
            let Some(actual) = counts.get(&bus.id).copied() else {
                continue;
            };
            if bus.load == actual {
                continue;
            }
            drifted.push(LoadDrift {
                bus_id: bus.id.clone(),
                stored: bus.load,
                actual,
            });
            bus.load = actual;
            tx.put(Document::Bus(bus))?;
        }
        Ok(ReconcileReport { counts, drifted })
    })?;

    for d in &report.drifted {
        warn!(bus_id = %d.bus_id, stored = %d.stored, actual = %d.actual, "load counters drifted");
    }
    info!(
        buses = report.counts.len(),
        drifted = report.drifted.len(),
        "reconciliation complete"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Bus, Shift, Student, StudentStatus};
    use crate::store::MemoryStore;

    fn store() -> MemoryStore {
        let store = MemoryStore::new();
        store.insert_bus(Bus::new("B1", 40, "R1").with_load(5, 5));
        store.insert_bus(Bus::new("B2", 40, "R1").with_load(1, 0));
        store.insert_student(Student::new("S1", "B1", "R1", "X"));
        store.insert_student(Student::new("S2", "B1", "R1", "X").with_shift(Shift::Evening));
        store.insert_student(
            Student::new("S3", "B1", "R1", "X").with_status(StudentStatus::Withdrawn),
        );
        store.insert_student(Student::new("S4", "B2", "R1", "X"));
        store
    }

    #[test]
    fn test_reconcile_fixes_drift() {
        let store = store();
        let report = reconcile(&store, None).unwrap();

        assert_eq!(report.counts[&BusId::new("B1")], ShiftLoad::new(1, 1));
        assert_eq!(report.counts[&BusId::new("B2")], ShiftLoad::new(1, 0));
        assert_eq!(report.drifted.len(), 1);
        assert_eq!(report.drifted[0].stored, ShiftLoad::new(5, 5));

        match store.read_entity(&EntityKey::bus(&BusId::new("B1"))).unwrap() {
            Some(Document::Bus(b)) => assert_eq!(b.load, ShiftLoad::new(1, 1)),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_reconcile_is_idempotent() {
        let store = store();
        let first = reconcile(&store, None).unwrap();
        let second = reconcile(&store, None).unwrap();
        assert_eq!(first.counts, second.counts);
        assert!(second.is_clean());
    }

    #[test]
    fn test_reconcile_subset() {
        let store = store();
        let report = reconcile(&store, Some(&[BusId::new("B2")])).unwrap();
        assert_eq!(report.counts.len(), 1);
        assert!(report.is_clean());
        // B1 was not examined, so its drift remains.
        match store.read_entity(&EntityKey::bus(&BusId::new("B1"))).unwrap() {
            Some(Document::Bus(b)) => assert_eq!(b.load, ShiftLoad::new(5, 5)),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_unknown_bus_rejected() {
        let store = store();
        let err = reconcile(&store, Some(&[BusId::new("B9")])).unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
    }
}
