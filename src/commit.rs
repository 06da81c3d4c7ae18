//! Optimistic-concurrency commit of net changes.
//!
//! Inside one transaction, every touched document is re-read and compared
//! field by field with the `before` state recorded at diff time. Any
//! mismatch aborts the whole transaction with [`Error::Conflict`]; otherwise
//! every `after` state is written. There is no retry: the caller recomputes
//! against fresh state.

use tracing::{debug, warn};

use crate::error::{Conflict, Error, Result};
use crate::models::{EntityChange, EntityKey, Side};
use crate::store::{DocumentStore, Transaction};

/// Re-reads each change's document and compares it with one recorded side.
///
/// Returns the documents paired with their changes, and every conflict.
pub(crate) fn check_preconditions(
    tx: &dyn Transaction,
    changes: &[EntityChange],
    side: Side,
) -> Result<(Vec<(usize, crate::models::Document)>, Vec<Conflict>)> {
    let mut ready = Vec::with_capacity(changes.len());
    let mut conflicts = Vec::new();
    for (i, change) in changes.iter().enumerate() {
        let key = change.key();
        match tx.get(&key)? {
            None => conflicts.push(Conflict::missing(key)),
            Some(doc) => {
                let mismatches = change.mismatches(side, &doc);
                if mismatches.is_empty() {
                    ready.push((i, doc));
                } else {
                    conflicts.push(Conflict::fields(key, mismatches));
                }
            }
        }
    }
    Ok((ready, conflicts))
}

/// Applies `changes` atomically if every document still holds its `before`
/// state.
///
/// Returns the keys written, in change order.
///
/// # Errors
/// - [`Error::Conflict`] listing every drifted or deleted document; nothing
///   is written.
/// - [`Error::Store`] if the store fails.
pub fn commit_changes<S: DocumentStore>(
    store: &S,
    changes: &[EntityChange],
) -> Result<Vec<EntityKey>> {
    store.transaction(|tx| {
        let (ready, conflicts) = check_preconditions(&*tx, changes, Side::Before)?;
        if !conflicts.is_empty() {
            for c in &conflicts {
                warn!(conflict = %c, "commit precondition failed");
            }
            return Err(Error::Conflict { conflicts });
        }

        let mut written = Vec::with_capacity(ready.len());
        for (i, mut doc) in ready {
            let change = &changes[i];
            if !change.apply(&mut doc) {
                return Err(Error::Store(format!(
                    "{} holds a document of another collection",
                    change.key()
                )));
            }
            written.push(change.key());
            tx.put(doc)?;
        }
        debug!(written = written.len(), "net changes applied");
        Ok(written)
    })
}
