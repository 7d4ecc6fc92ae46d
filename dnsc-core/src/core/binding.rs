// dnsc-core/src/core/binding.rs
// ============================================================================
// Module: Catalog Binding & Materialization
// Description: Per-element catalog bindings and field-level provenance.
// Purpose: Record which catalog item an element is bound to, the canonical
// projection of its materialized fields, and where each field's value came
// from.
// Dependencies: crate::core::catalog, crate::core::hashing, crate::core::identifiers
// ============================================================================

//! ## Overview
//! A [`CatalogBinding`] is captured once, at the moment the Applier resolves
//! an element's parameters. It freezes the catalog item's
//! coordinates and version at that moment together with a canonical hash of
//! the materialized fields the namespace's contract declares as required.
//! Later comparison against the registry-of-record is [`crate::core::drift`]'s
//! job, not this module's.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::core::catalog::CatalogItemVersion;
use crate::core::catalog::Namespace;
use crate::core::hashing::content_hash;
use crate::core::hashing::HashError;
use crate::core::identifiers::CatalogItemId;

// ============================================================================
// SECTION: Source Kind
// ============================================================================

/// Where a resolved field's value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Value came from a bound catalog item.
    Catalog,
    /// Value came from an explicit instance override.
    Override,
    /// Value was computed from other fields rather than read directly.
    Derived,
    /// No value is available and none may be fabricated; the field is
    /// required and its absence is a validation issue, not a default.
    DefaultForbidden,
}

// ============================================================================
// SECTION: Field Provenance
// ============================================================================

/// Per-field provenance tag attached to a materialized parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldProvenance {
    /// Where the field's value came from.
    pub source: SourceKind,
    /// Human-readable source reference: catalog item coordinates, an
    /// override reason, or the name of the derivation rule.
    pub reference: String,
}

impl FieldProvenance {
    /// Builds provenance pointing at a specific catalog item.
    #[must_use]
    pub fn from_catalog(namespace: Namespace, item_id: &CatalogItemId, version: &CatalogItemVersion) -> Self {
        Self {
            source: SourceKind::Catalog,
            reference: format!("{namespace}:{item_id}@{version}"),
        }
    }

    /// Builds provenance for an explicit override with a human reason.
    #[must_use]
    pub fn from_override(reason: impl Into<String>) -> Self {
        Self {
            source: SourceKind::Override,
            reference: reason.into(),
        }
    }

    /// Builds provenance for a value computed from other fields.
    #[must_use]
    pub fn from_derivation(rule: impl Into<String>) -> Self {
        Self {
            source: SourceKind::Derived,
            reference: rule.into(),
        }
    }

    /// Builds provenance marking a required field as unresolved.
    #[must_use]
    pub fn default_forbidden() -> Self {
        Self {
            source: SourceKind::DefaultForbidden,
            reference: String::new(),
        }
    }
}

// ============================================================================
// SECTION: Catalog Binding
// ============================================================================

/// A frozen reference from an element to a catalog item, captured at
/// materialization time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogBinding {
    /// Namespace of the bound catalog item.
    pub namespace: Namespace,
    /// Catalog item id.
    pub catalog_item_id: CatalogItemId,
    /// Catalog item version at the time of materialization.
    pub catalog_item_version: CatalogItemVersion,
    /// Canonical projection of the fields the namespace's contract declares,
    /// frozen at materialization time. [`crate::core::drift`] compares this
    /// against the registry-of-record's current projection.
    pub materialized_fields: BTreeMap<String, Value>,
    /// Canonical hash of `materialized_fields`, hex-encoded.
    pub materialized_parameter_hash: String,
    /// Provenance per materialized field name.
    pub field_provenance: BTreeMap<String, FieldProvenance>,
}

impl CatalogBinding {
    /// Captures a new binding, computing the materialized parameter hash
    /// over the declared solver+UI field projection.
    ///
    /// # Errors
    ///
    /// Returns [`HashError`] if the projection cannot be canonically encoded.
    pub fn capture(
        namespace: Namespace,
        catalog_item_id: CatalogItemId,
        catalog_item_version: CatalogItemVersion,
        materialized_fields: &BTreeMap<String, Value>,
        field_provenance: BTreeMap<String, FieldProvenance>,
    ) -> Result<Self, HashError> {
        let digest = content_hash(materialized_fields)?;
        Ok(Self {
            namespace,
            catalog_item_id,
            catalog_item_version,
            materialized_fields: materialized_fields.clone(),
            materialized_parameter_hash: digest.value,
            field_provenance,
        })
    }
}
