// dnsc-core/src/core/drift.rs
// ============================================================================
// Module: Drift Detector
// Description: Compares a snapshot's frozen catalog bindings against the
// current catalog registry and classifies the divergence by severity.
// Purpose: Surface when a snapshot's materialized parameters have silently
// fallen behind the registry-of-record.
// Dependencies: crate::core::{catalog, entities, hashing, identifiers, snapshot}
// ============================================================================

//! ## Overview
//! A [`crate::core::binding::CatalogBinding`] freezes a catalog item's
//! coordinates, version, and materialized fields at the moment an element
//! was last resolved against the registry. This module walks
//! every binding in a snapshot and re-resolves it against the
//! registry-of-record as it stands now. Whether a version change is
//! [`DriftSeverity::Breaking`] or merely [`DriftSeverity::Informational`]
//! turns on whether any **solver field** — as declared by the namespace's
//! [`crate::core::catalog::MaterializationContract`] — differs, versus only
//! display-only UI fields differing.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

use crate::core::catalog::CatalogItemVersion;
use crate::core::catalog::CatalogRegistry;
use crate::core::catalog::Namespace;
use crate::core::hashing::content_hash;
use crate::core::hashing::HashError;
use crate::core::identifiers::CatalogItemId;
use crate::core::identifiers::ElementRef;
use crate::core::snapshot::Snapshot;

// ============================================================================
// SECTION: Drift Severity
// ============================================================================

/// Classification of one binding's divergence from the registry-of-record.
///
/// Declared in "most concerning first" order, which is also the order
/// `#[derive(Ord)]` uses for report sorting, sorted by `(severity, namespace,
/// catalog_item_id, element_id)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DriftSeverity {
    /// A solver-relevant field differs from the registry-of-record.
    Breaking,
    /// No record for this binding exists in the registry anymore.
    Removed,
    /// Only UI-display fields differ; no effect on solver input.
    Informational,
    /// Registry version matches the binding; no divergence.
    Clean,
}

// ============================================================================
// SECTION: Drift Record
// ============================================================================

/// One binding's drift classification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriftRecord {
    /// Element the binding belongs to.
    pub element: ElementRef,
    /// Namespace of the bound catalog item.
    pub namespace: Namespace,
    /// Bound catalog item id.
    pub catalog_item_id: CatalogItemId,
    /// Version captured at materialization time.
    pub bound_version: CatalogItemVersion,
    /// Version currently in the registry, or `None` if the item was removed.
    pub current_version: Option<CatalogItemVersion>,
    /// Severity of the divergence.
    pub severity: DriftSeverity,
    /// Names of materialized fields whose value differs from the registry.
    pub changed_fields: Vec<String>,
}

// ============================================================================
// SECTION: Drift Report
// ============================================================================

/// Full drift classification over every catalog binding in a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriftReport {
    /// One record per binding, sorted by `(severity, namespace,
    /// catalog_item_id, element_id)`.
    pub records: Vec<DriftRecord>,
    /// SHA-256 over the sorted records, excluding this field.
    pub report_hash: String,
}

/// Content used to compute a [`DriftReport`]'s hash; mirrors the report
/// minus `report_hash` itself.
#[derive(Serialize)]
struct DriftReportSignature<'a> {
    records: &'a [DriftRecord],
}

// ============================================================================
// SECTION: Drift Detector
// ============================================================================

/// Stateless comparator between a snapshot's bindings and the registry.
#[derive(Debug, Clone, Copy, Default)]
pub struct DriftDetector;

impl DriftDetector {
    /// Classifies drift for every catalog binding in `snapshot`.
    ///
    /// # Errors
    ///
    /// Returns [`HashError`] if the report cannot be canonically encoded,
    /// which should never happen for a validly constructed snapshot.
    pub fn detect(
        &self,
        snapshot: &Snapshot,
        catalog: &CatalogRegistry,
    ) -> Result<DriftReport, HashError> {
        let mut records: Vec<DriftRecord> = collect_bindings(snapshot)
            .into_iter()
            .map(|(element, binding)| classify(element, binding, catalog))
            .collect();

        records.sort_by(|a, b| {
            (a.severity, a.namespace, &a.catalog_item_id, a.element.id_str()).cmp(&(
                b.severity,
                b.namespace,
                &b.catalog_item_id,
                b.element.id_str(),
            ))
        });

        let report_hash = content_hash(&DriftReportSignature { records: &records })?.value;
        Ok(DriftReport { records, report_hash })
    }
}

/// Gathers every `(element, binding)` pair from the four entity categories
/// that carry a catalog binding: branches, generator sources, measurements,
/// and protection assignments.
fn collect_bindings(
    snapshot: &Snapshot,
) -> Vec<(ElementRef, &crate::core::binding::CatalogBinding)> {
    let mut out = Vec::new();
    for branch in snapshot.branches() {
        if let Some(binding) = &branch.catalog_binding {
            out.push((ElementRef::Branch(branch.id.clone()), binding));
        }
    }
    for source in snapshot.sources() {
        if let Some(generator) = &source.generator {
            if let Some(binding) = &generator.catalog_binding {
                out.push((ElementRef::Source(source.id.clone()), binding));
            }
        }
    }
    for measurement in snapshot.measurements() {
        if let Some(binding) = &measurement.catalog_binding {
            out.push((ElementRef::Measurement(measurement.id.clone()), binding));
        }
    }
    for assignment in snapshot.protection_assignments() {
        if let Some(binding) = &assignment.catalog_binding {
            out.push((ElementRef::ProtectionAssignment(assignment.id.clone()), binding));
        }
    }
    out
}

/// Classifies one binding against the registry-of-record.
fn classify(
    element: ElementRef,
    binding: &crate::core::binding::CatalogBinding,
    catalog: &CatalogRegistry,
) -> DriftRecord {
    let base = |severity: DriftSeverity, current_version, changed_fields| DriftRecord {
        element: element.clone(),
        namespace: binding.namespace,
        catalog_item_id: binding.catalog_item_id.clone(),
        bound_version: binding.catalog_item_version.clone(),
        current_version,
        severity,
        changed_fields,
    };

    let Ok(item) = catalog.get(binding.namespace, &binding.catalog_item_id) else {
        return base(DriftSeverity::Removed, None, Vec::new());
    };

    if item.version == binding.catalog_item_version {
        return base(DriftSeverity::Clean, Some(item.version.clone()), Vec::new());
    }

    let mut changed_fields = Vec::new();
    for (field, value) in &binding.materialized_fields {
        if item.parameters.get(field) != Some(value) {
            changed_fields.push(field.clone());
        }
    }
    changed_fields.sort();

    let contract = catalog.materialization_contract(binding.namespace).ok();
    let is_breaking = changed_fields.iter().any(|field| {
        contract.is_some_and(|contract| contract.is_solver_field(field))
    });

    let severity = if is_breaking { DriftSeverity::Breaking } else { DriftSeverity::Informational };
    base(severity, Some(item.version.clone()), changed_fields)
}
