// dnsc-core/src/core/diff.rs
// ============================================================================
// Module: Diff Engine
// Description: Structural and per-field diff between two snapshots.
// Purpose: Answer "what changed between snapshot A and snapshot B" without
// either snapshot needing to know about the other.
// Dependencies: crate::core::{hashing, identifiers, snapshot}
// ============================================================================

//! ## Overview
//! Diffs are computed at the level of the structural dictionary — the same
//! field projection [`crate::core::snapshot::Snapshot::fingerprint`] hashes —
//! so equal fingerprints guarantee an empty diff without a second full
//! comparison pass. Identity is by element id; the id field itself is never
//! reported as a changed field, since it is the join key, not a value.
//!
//! Each of the eleven entity categories is merged independently: since both
//! snapshots' entity vectors are already sorted by id (a [`Snapshot::new`]
//! invariant), a single linear merge finds additions, removals, and common
//! elements without sorting or hashing by id first.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::cmp::Ordering;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::core::hashing::HashError;
use crate::core::identifiers::BayId;
use crate::core::identifiers::BranchId;
use crate::core::identifiers::CorridorId;
use crate::core::identifiers::ElementRef;
use crate::core::identifiers::JunctionId;
use crate::core::identifiers::LoadId;
use crate::core::identifiers::MeasurementId;
use crate::core::identifiers::NodeId;
use crate::core::identifiers::ProtectionAssignmentId;
use crate::core::identifiers::SourceId;
use crate::core::identifiers::SubstationId;
use crate::core::identifiers::SwitchId;
use crate::core::snapshot::Snapshot;

// ============================================================================
// SECTION: Field Change
// ============================================================================

/// One field-level change on an element present in both snapshots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldChange {
    /// The element the change belongs to.
    pub element: ElementRef,
    /// Name of the changed field, as it appears in the structural dictionary.
    pub field_name: String,
    /// Value in the first (older) snapshot.
    pub old_value: Value,
    /// Value in the second (newer) snapshot.
    pub new_value: Value,
}

// ============================================================================
// SECTION: Diff Report
// ============================================================================

/// Result of comparing two snapshots' structural dictionaries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiffReport {
    /// Elements present in the second snapshot but not the first, sorted by
    /// `(entity_type, id)`.
    pub added_elements: Vec<ElementRef>,
    /// Elements present in the first snapshot but not the second, sorted by
    /// `(entity_type, id)`.
    pub removed_elements: Vec<ElementRef>,
    /// Per-field changes on elements present in both snapshots, sorted by
    /// `(id, field_name)`.
    pub modified_elements: Vec<FieldChange>,
    /// `true` iff the two snapshots have identical fingerprints.
    pub is_identical: bool,
}

// ============================================================================
// SECTION: Diff Engine
// ============================================================================

/// Stateless comparator between two [`Snapshot`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct DiffEngine;

impl DiffEngine {
    /// Diffs snapshot `old` against snapshot `new`.
    ///
    /// # Errors
    ///
    /// Returns [`HashError`] if either snapshot's fingerprint cannot be
    /// computed, or if an element cannot be canonically encoded for
    /// field-level comparison.
    pub fn diff(&self, old: &Snapshot, new: &Snapshot) -> Result<DiffReport, HashError> {
        if old.fingerprint()? == new.fingerprint()? {
            return Ok(DiffReport {
                added_elements: Vec::new(),
                removed_elements: Vec::new(),
                modified_elements: Vec::new(),
                is_identical: true,
            });
        }

        let mut added = Vec::new();
        let mut removed = Vec::new();
        let mut modified = Vec::new();

        merge_category(old.nodes(), new.nodes(), |n| n.id.as_str(), |id| ElementRef::Node(NodeId::new(id)), &mut added, &mut removed, &mut modified)?;
        merge_category(old.branches(), new.branches(), |b| b.id.as_str(), |id| ElementRef::Branch(BranchId::new(id)), &mut added, &mut removed, &mut modified)?;
        merge_category(old.switches(), new.switches(), |s| s.id.as_str(), |id| ElementRef::Switch(SwitchId::new(id)), &mut added, &mut removed, &mut modified)?;
        merge_category(old.sources(), new.sources(), |s| s.id.as_str(), |id| ElementRef::Source(SourceId::new(id)), &mut added, &mut removed, &mut modified)?;
        merge_category(old.loads(), new.loads(), |l| l.id.as_str(), |id| ElementRef::Load(LoadId::new(id)), &mut added, &mut removed, &mut modified)?;
        merge_category(old.substations(), new.substations(), |s| s.id.as_str(), |id| ElementRef::Substation(SubstationId::new(id)), &mut added, &mut removed, &mut modified)?;
        merge_category(old.bays(), new.bays(), |b| b.id.as_str(), |id| ElementRef::Bay(BayId::new(id)), &mut added, &mut removed, &mut modified)?;
        merge_category(old.junctions(), new.junctions(), |j| j.id.as_str(), |id| ElementRef::Junction(JunctionId::new(id)), &mut added, &mut removed, &mut modified)?;
        merge_category(old.corridors(), new.corridors(), |c| c.id.as_str(), |id| ElementRef::Corridor(CorridorId::new(id)), &mut added, &mut removed, &mut modified)?;
        merge_category(old.measurements(), new.measurements(), |m| m.id.as_str(), |id| ElementRef::Measurement(MeasurementId::new(id)), &mut added, &mut removed, &mut modified)?;
        merge_category(old.protection_assignments(), new.protection_assignments(), |p| p.id.as_str(), |id| ElementRef::ProtectionAssignment(ProtectionAssignmentId::new(id)), &mut added, &mut removed, &mut modified)?;

        added.sort_by(|a, b| (a.kind(), a.id_str()).cmp(&(b.kind(), b.id_str())));
        removed.sort_by(|a, b| (a.kind(), a.id_str()).cmp(&(b.kind(), b.id_str())));
        modified.sort_by(|a, b| {
            (a.element.id_str(), a.field_name.as_str()).cmp(&(b.element.id_str(), b.field_name.as_str()))
        });

        Ok(DiffReport {
            added_elements: added,
            removed_elements: removed,
            modified_elements: modified,
            is_identical: false,
        })
    }
}

/// Merges one entity category's two (already id-sorted) slices, appending
/// additions, removals, and field-level modifications for elements common
/// to both.
#[allow(clippy::too_many_arguments)]
fn merge_category<T: Serialize>(
    old: &[T],
    new: &[T],
    id_of: impl Fn(&T) -> &str,
    ref_of: impl Fn(&str) -> ElementRef,
    added: &mut Vec<ElementRef>,
    removed: &mut Vec<ElementRef>,
    modified: &mut Vec<FieldChange>,
) -> Result<(), HashError> {
    let mut oi = 0usize;
    let mut ni = 0usize;
    while oi < old.len() || ni < new.len() {
        match (old.get(oi), new.get(ni)) {
            (Some(o), None) => {
                removed.push(ref_of(id_of(o)));
                oi += 1;
            }
            (None, Some(n)) => {
                added.push(ref_of(id_of(n)));
                ni += 1;
            }
            (Some(o), Some(n)) => {
                let oid = id_of(o);
                let nid = id_of(n);
                match oid.cmp(nid) {
                    Ordering::Less => {
                        removed.push(ref_of(oid));
                        oi += 1;
                    }
                    Ordering::Greater => {
                        added.push(ref_of(nid));
                        ni += 1;
                    }
                    Ordering::Equal => {
                        diff_fields(o, n, ref_of(oid), modified)?;
                        oi += 1;
                        ni += 1;
                    }
                }
            }
            (None, None) => unreachable!("loop condition guards both exhausted"),
        }
    }
    Ok(())
}

/// Compares one element present in both snapshots field-by-field, skipping
/// the `id` field, and appends any differences found.
fn diff_fields<T: Serialize>(
    old: &T,
    new: &T,
    element: ElementRef,
    out: &mut Vec<FieldChange>,
) -> Result<(), HashError> {
    let old_value = serde_json::to_value(old)
        .map_err(|err| HashError::Canonicalization(err.to_string()))?;
    let new_value = serde_json::to_value(new)
        .map_err(|err| HashError::Canonicalization(err.to_string()))?;

    let (Value::Object(old_map), Value::Object(new_map)) = (old_value, new_value) else {
        return Ok(());
    };

    let mut field_names: Vec<&String> = old_map.keys().chain(new_map.keys()).collect();
    field_names.sort();
    field_names.dedup();

    for field_name in field_names {
        if field_name == "id" {
            continue;
        }
        let old_field = old_map.get(field_name).cloned().unwrap_or(Value::Null);
        let new_field = new_map.get(field_name).cloned().unwrap_or(Value::Null);
        if old_field != new_field {
            out.push(FieldChange {
                element: element.clone(),
                field_name: field_name.clone(),
                old_value: old_field,
                new_value: new_field,
            });
        }
    }
    Ok(())
}
