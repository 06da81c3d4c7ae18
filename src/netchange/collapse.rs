//! Last-write-wins collapsing of staged operations.
//!
//! Each operation decides the final state of one or more documents (its
//! keys). An operation is dropped when, for every one of its keys, the next
//! operation to touch that key overwrites it without reading it. Anything
//! else survives: it is the last writer of some key, or a later swap or
//! stop-less student move still builds on what it wrote.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::models::EntityKey;
use crate::staging::StagedOperation;

/// A staged operation dropped because later operations overwrite all its keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Superseded {
    /// Dropped operation.
    pub operation: u64,
    /// The later operation that overwrites its first key.
    pub superseded_by: u64,
}

/// A document staged more than once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StagedDuplicate {
    /// The document.
    pub entity: EntityKey,
    /// Operations that stage it, in staging order.
    pub operations: Vec<u64>,
    /// Destination each operation gives it.
    pub destinations: Vec<String>,
    /// Whether the destinations disagree.
    pub conflicting: bool,
}

pub(crate) struct Collapsed<'a> {
    pub surviving: Vec<&'a StagedOperation>,
    pub superseded: Vec<Superseded>,
    pub duplicates: Vec<StagedDuplicate>,
}

pub(crate) fn collapse(operations: &[StagedOperation]) -> Collapsed<'_> {
    let mut staged: BTreeMap<EntityKey, Vec<(u64, String)>> = BTreeMap::new();
    for op in operations {
        for key in op.kind.keys() {
            let destination = op.kind.destination(&key);
            staged.entry(key).or_default().push((op.id, destination));
        }
    }

    // Walk backwards, remembering the next operation to touch each key.
    let mut next_touch: BTreeMap<EntityKey, &StagedOperation> = BTreeMap::new();
    let mut surviving = Vec::new();
    let mut superseded = Vec::new();
    for op in operations.iter().rev() {
        let keys = op.kind.keys();
        let live = keys
            .iter()
            .any(|k| next_touch.get(k).map_or(true, |next| !next.kind.overwrites()));
        if live {
            surviving.push(op);
        } else if let Some(next) = keys.first().and_then(|k| next_touch.get(k)) {
            superseded.push(Superseded {
                operation: op.id,
                superseded_by: next.id,
            });
        }
        for key in keys {
            next_touch.insert(key, op);
        }
    }
    surviving.reverse();
    superseded.reverse();

    let duplicates = staged
        .into_iter()
        .filter(|(_, entries)| entries.len() > 1)
        .map(|(entity, entries)| {
            let conflicting = entries.windows(2).any(|w| w[0].1 != w[1].1);
            let (operations, destinations): (Vec<u64>, Vec<String>) =
                entries.into_iter().unzip();
            StagedDuplicate {
                entity,
                operations,
                destinations,
                conflicting,
            }
        })
        .collect();

    Collapsed {
        surviving,
        superseded,
        duplicates,
    }
}
