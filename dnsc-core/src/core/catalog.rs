// dnsc-core/src/core/catalog.rs
// ============================================================================
// Module: Catalog Registry
// Description: Versioned, read-mostly repository of equipment types and the
// canonical-vs-instance parameter precedence contract.
// Purpose: Resolve per-element electrical parameters with a fixed precedence
// order and surface the materialization contract each namespace declares.
// Dependencies: serde, serde_json, crate::core::identifiers
// ============================================================================

//! ## Overview
//! The registry groups catalog items by [`Namespace`]. Each `(namespace,
//! item id)` pair holds exactly one *current* [`CatalogItem`]; republishing
//! under the same version with different content is rejected, matching the
//! "frozen once published" rule. A snapshot's catalog bindings capture the
//! version at the time they were materialized and do not follow later
//! registry evolution — only [`crate::core::drift`] compares the two.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::core::identifiers::CatalogItemId;
use crate::core::identifiers::NamespaceId;

// ============================================================================
// SECTION: Namespace
// ============================================================================

/// A category of equipment type with its own materialization contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Namespace {
    /// Medium-voltage cable types.
    CableMv,
    /// Medium-voltage overhead line types.
    LineMv,
    /// Medium-to-low-voltage transformer types.
    TransformerMvLv,
    /// Medium-voltage apparatus (switches, breakers).
    ApparatusMv,
    /// Low-voltage apparatus.
    ApparatusLv,
    /// Low-voltage cable types.
    CableLv,
    /// Current transformer types.
    CurrentTransformer,
    /// Voltage transformer types.
    VoltageTransformer,
    /// Load model types.
    LoadType,
    /// PV inverter types.
    PvInverter,
    /// BESS inverter types.
    BessInverter,
    /// Protection device types.
    ProtectionDevice,
    /// Protection setting templates.
    ProtectionSettingTemplate,
    /// Protection/solver curve definitions.
    Curve,
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::CableMv => "cable_mv",
            Self::LineMv => "line_mv",
            Self::TransformerMvLv => "transformer_mv_lv",
            Self::ApparatusMv => "apparatus_mv",
            Self::ApparatusLv => "apparatus_lv",
            Self::CableLv => "cable_lv",
            Self::CurrentTransformer => "current_transformer",
            Self::VoltageTransformer => "voltage_transformer",
            Self::LoadType => "load_type",
            Self::PvInverter => "pv_inverter",
            Self::BessInverter => "bess_inverter",
            Self::ProtectionDevice => "protection_device",
            Self::ProtectionSettingTemplate => "protection_setting_template",
            Self::Curve => "curve",
        };
        f.write_str(label)
    }
}

// ============================================================================
// SECTION: Catalog Item Version
// ============================================================================

/// Opaque, lexicographically ordered catalog item version string.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CatalogItemVersion(String);

impl CatalogItemVersion {
    /// Creates a new version tag from any string-like value.
    #[must_use]
    pub fn new(version: impl Into<String>) -> Self {
        Self(version.into())
    }

    /// Returns the version as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CatalogItemVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

// ============================================================================
// SECTION: Catalog Item
// ============================================================================

/// A single published equipment type.
///
/// `parameters` is the materialized, already-unit-converted field bag (for
/// example a cable type's `b_us_per_km` is stored pre-converted from its
/// nameplate capacitance). The same field-name space is used by
/// [`MaterializationContract`] and by [`crate::core::drift`] to classify
/// which fields matter to a solver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogItem {
    /// Identifier, unique within its namespace.
    pub id: CatalogItemId,
    /// Owning namespace.
    pub namespace: Namespace,
    /// Version tag at publication time.
    pub version: CatalogItemVersion,
    /// Human-readable label used for stable-sorted listings.
    pub display_label: String,
    /// Materialized parameter bag, keyed by field name.
    pub parameters: BTreeMap<String, Value>,
}

impl CatalogItem {
    /// Returns a named parameter as `f64`, if present and numeric.
    #[must_use]
    pub fn parameter_f64(&self, field: &str) -> Option<f64> {
        self.parameters.get(field).and_then(Value::as_f64)
    }

    /// Returns a named parameter as a string slice, if present and a string.
    #[must_use]
    pub fn parameter_str(&self, field: &str) -> Option<&str> {
        self.parameters.get(field).and_then(Value::as_str)
    }
}

// ============================================================================
// SECTION: Materialization Contract
// ============================================================================

/// Declares which fields a namespace's bindings must surface for solvers
/// (`solver_fields`) versus which are display-only (`ui_fields`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaterializationContract {
    /// Fields a solver input envelope requires to be present and correct.
    pub solver_fields: BTreeSet<String>,
    /// Fields relevant only to UI display.
    pub ui_fields: BTreeSet<String>,
}

impl MaterializationContract {
    /// Returns true if `field` is declared as solver-relevant.
    #[must_use]
    pub fn is_solver_field(&self, field: &str) -> bool {
        self.solver_fields.contains(field)
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised while querying or resolving against the catalog registry.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CatalogError {
    /// No item exists under the given `(namespace, id)` pair.
    #[error("catalog item '{item_id}' not found in namespace '{namespace}'")]
    NotFound {
        /// Namespace searched.
        namespace: Namespace,
        /// Item id searched.
        item_id: CatalogItemId,
    },
    /// A `type_ref` was specified but the catalog returned no matching item.
    #[error("{equipment_kind} type_ref '{type_ref}' not found in catalog")]
    TypeNotFound {
        /// The unresolved type reference.
        type_ref: CatalogItemId,
        /// Human-readable equipment kind, e.g. `"Line"`, `"Cable"`, `"Transformer"`.
        equipment_kind: &'static str,
    },
    /// No materialization contract is registered for the namespace.
    #[error("no materialization contract registered for namespace '{0}'")]
    UnknownNamespace(Namespace),
    /// An attempt to republish an existing `(namespace, id, version)` triple
    /// with different content.
    #[error(
        "catalog item '{item_id}' in namespace '{namespace}' version '{version}' is already \
         published with different content"
    )]
    VersionConflict {
        /// Namespace of the conflicting item.
        namespace: Namespace,
        /// Item id of the conflicting item.
        item_id: CatalogItemId,
        /// Version under conflict.
        version: CatalogItemVersion,
    },
}

// ============================================================================
// SECTION: Catalog Registry
// ============================================================================

/// Read-mostly repository of current catalog items, keyed by `(namespace,
/// id)`, plus one materialization contract per namespace.
#[derive(Debug, Clone, Default)]
pub struct CatalogRegistry {
    items: BTreeMap<(Namespace, CatalogItemId), CatalogItem>,
    contracts: BTreeMap<Namespace, MaterializationContract>,
}

impl CatalogRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers (or replaces, if content is identical) a namespace's
    /// materialization contract.
    pub fn set_contract(&mut self, namespace: Namespace, contract: MaterializationContract) {
        self.contracts.insert(namespace, contract);
    }

    /// Publishes a catalog item. Republishing the same `(namespace, id,
    /// version)` triple with different content is rejected.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::VersionConflict`] if an item already exists
    /// under the same key with different content.
    pub fn publish(&mut self, item: CatalogItem) -> Result<(), CatalogError> {
        let key = (item.namespace, item.id.clone());
        if let Some(existing) = self.items.get(&key) {
            if existing.version == item.version && *existing != item {
                return Err(CatalogError::VersionConflict {
                    namespace: item.namespace,
                    item_id: item.id,
                    version: item.version,
                });
            }
        }
        self.items.insert(key, item);
        Ok(())
    }

    /// Looks up a catalog item by namespace and id.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::NotFound`] if no such item is published.
    pub fn get(
        &self,
        namespace: Namespace,
        item_id: &CatalogItemId,
    ) -> Result<&CatalogItem, CatalogError> {
        self.items
            .get(&(namespace, item_id.clone()))
            .ok_or_else(|| CatalogError::NotFound {
                namespace,
                item_id: item_id.clone(),
            })
    }

    /// Lists all items in a namespace, sorted by `(display_label, id)`.
    #[must_use]
    pub fn list(&self, namespace: Namespace) -> Vec<&CatalogItem> {
        let mut items: Vec<&CatalogItem> = self
            .items
            .iter()
            .filter(|((ns, _), _)| *ns == namespace)
            .map(|(_, item)| item)
            .collect();
        items.sort_by(|a, b| {
            a.display_label
                .cmp(&b.display_label)
                .then_with(|| a.id.cmp(&b.id))
        });
        items
    }

    /// Returns the materialization contract registered for a namespace.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::UnknownNamespace`] if none was registered.
    pub fn materialization_contract(
        &self,
        namespace: Namespace,
    ) -> Result<&MaterializationContract, CatalogError> {
        self.contracts
            .get(&namespace)
            .ok_or(CatalogError::UnknownNamespace(namespace))
    }

    /// Resolves Line/Cable electrical parameters with canonical precedence:
    /// `impedance_override > type_ref > instance`.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::TypeNotFound`] if `type_ref` is set but not
    /// found in the `cable_mv`/`line_mv` namespace (chosen by `is_cable`).
    pub fn resolve_line_params(
        &self,
        type_ref: Option<&CatalogItemId>,
        is_cable: bool,
        impedance_override: Option<&ImpedanceOverride>,
        length_km: f64,
        instance: &LineInstanceParams,
    ) -> Result<ResolvedLineParams, CatalogError> {
        if let Some(over) = impedance_override {
            return Ok(if length_km <= 0.0 {
                ResolvedLineParams {
                    r_ohm_per_km: 0.0,
                    x_ohm_per_km: 0.0,
                    b_us_per_km: 0.0,
                    rated_current_a: instance.rated_current_a,
                    source: ParameterSource::Override,
                }
            } else {
                ResolvedLineParams {
                    r_ohm_per_km: over.r_total_ohm / length_km,
                    x_ohm_per_km: over.x_total_ohm / length_km,
                    b_us_per_km: over.b_total_us / length_km,
                    rated_current_a: instance.rated_current_a,
                    source: ParameterSource::Override,
                }
            });
        }

        if let Some(type_ref) = type_ref {
            let namespace = if is_cable { Namespace::CableMv } else { Namespace::LineMv };
            let equipment_kind = if is_cable { "Cable" } else { "Line" };
            let item = self.get(namespace, type_ref).map_err(|_| CatalogError::TypeNotFound {
                type_ref: type_ref.clone(),
                equipment_kind,
            })?;
            return Ok(ResolvedLineParams {
                r_ohm_per_km: item.parameter_f64("r_ohm_per_km").unwrap_or(0.0),
                x_ohm_per_km: item.parameter_f64("x_ohm_per_km").unwrap_or(0.0),
                b_us_per_km: item.parameter_f64("b_us_per_km").unwrap_or(0.0),
                rated_current_a: item.parameter_f64("rated_current_a").unwrap_or(0.0),
                source: ParameterSource::TypeRef,
            });
        }

        Ok(ResolvedLineParams {
            r_ohm_per_km: instance.r_ohm_per_km,
            x_ohm_per_km: instance.x_ohm_per_km,
            b_us_per_km: instance.b_us_per_km,
            rated_current_a: instance.rated_current_a,
            source: ParameterSource::Instance,
        })
    }

    /// Resolves Transformer nameplate parameters with canonical precedence:
    /// `type_ref > instance`.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::TypeNotFound`] if `type_ref` is set but not
    /// found in the `transformer_mv_lv` namespace.
    pub fn resolve_transformer_params(
        &self,
        type_ref: Option<&CatalogItemId>,
        instance: &TransformerInstanceParams,
    ) -> Result<ResolvedTransformerParams, CatalogError> {
        if let Some(type_ref) = type_ref {
            let item = self
                .get(Namespace::TransformerMvLv, type_ref)
                .map_err(|_| CatalogError::TypeNotFound {
                    type_ref: type_ref.clone(),
                    equipment_kind: "Transformer",
                })?;
            return Ok(ResolvedTransformerParams {
                rated_power_mva: item.parameter_f64("rated_power_mva").unwrap_or(0.0),
                voltage_hv_kv: item.parameter_f64("voltage_hv_kv").unwrap_or(0.0),
                voltage_lv_kv: item.parameter_f64("voltage_lv_kv").unwrap_or(0.0),
                uk_percent: item.parameter_f64("uk_percent").unwrap_or(0.0),
                pk_kw: item.parameter_f64("pk_kw").unwrap_or(0.0),
                i0_percent: item.parameter_f64("i0_percent").unwrap_or(0.0),
                p0_kw: item.parameter_f64("p0_kw").unwrap_or(0.0),
                vector_group: item.parameter_str("vector_group").unwrap_or("").to_string(),
                source: ParameterSource::TypeRef,
            });
        }

        Ok(ResolvedTransformerParams {
            rated_power_mva: instance.rated_power_mva,
            voltage_hv_kv: instance.voltage_hv_kv,
            voltage_lv_kv: instance.voltage_lv_kv,
            uk_percent: instance.uk_percent,
            pk_kw: instance.pk_kw,
            i0_percent: instance.i0_percent,
            p0_kw: instance.p0_kw,
            vector_group: instance.vector_group.clone(),
            source: ParameterSource::Instance,
        })
    }
}

// ============================================================================
// SECTION: Parameter Source (precedence outcome)
// ============================================================================

/// Which precedence level produced a resolved parameter set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParameterSource {
    /// Resolved from an explicit impedance override (line/cable only).
    Override,
    /// Resolved from a catalog `type_ref`.
    TypeRef,
    /// Resolved from direct instance parameters.
    Instance,
}

// ============================================================================
// SECTION: Line / Cable Parameters
// ============================================================================

/// Explicit total-impedance override for a line/cable segment.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ImpedanceOverride {
    /// Total resistance over the segment, ohms.
    pub r_total_ohm: f64,
    /// Total reactance over the segment, ohms.
    pub x_total_ohm: f64,
    /// Total susceptance over the segment, microsiemens.
    pub b_total_us: f64,
}

/// Direct per-km instance parameters used when neither an override nor a
/// catalog reference is present.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LineInstanceParams {
    /// Resistance per kilometer, ohms/km.
    pub r_ohm_per_km: f64,
    /// Reactance per kilometer, ohms/km.
    pub x_ohm_per_km: f64,
    /// Susceptance per kilometer, microsiemens/km.
    pub b_us_per_km: f64,
    /// Rated current, amps.
    pub rated_current_a: f64,
}

/// Result of [`CatalogRegistry::resolve_line_params`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResolvedLineParams {
    /// Resistance per kilometer, ohms/km.
    pub r_ohm_per_km: f64,
    /// Reactance per kilometer, ohms/km.
    pub x_ohm_per_km: f64,
    /// Susceptance per kilometer, microsiemens/km.
    pub b_us_per_km: f64,
    /// Rated current, amps.
    pub rated_current_a: f64,
    /// Precedence level the values were resolved from.
    pub source: ParameterSource,
}

// ============================================================================
// SECTION: Transformer Parameters
// ============================================================================

/// Direct nameplate instance parameters used when no `type_ref` is present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformerInstanceParams {
    /// Rated power, MVA.
    pub rated_power_mva: f64,
    /// High-voltage side rated voltage, kV.
    pub voltage_hv_kv: f64,
    /// Low-voltage side rated voltage, kV.
    pub voltage_lv_kv: f64,
    /// Short-circuit voltage, percent.
    pub uk_percent: f64,
    /// Short-circuit (copper) losses, kW.
    pub pk_kw: f64,
    /// No-load current, percent.
    pub i0_percent: f64,
    /// No-load (iron) losses, kW.
    pub p0_kw: f64,
    /// Vector group label, e.g. `"Dyn11"`.
    pub vector_group: String,
}

/// Result of [`CatalogRegistry::resolve_transformer_params`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedTransformerParams {
    /// Rated power, MVA.
    pub rated_power_mva: f64,
    /// High-voltage side rated voltage, kV.
    pub voltage_hv_kv: f64,
    /// Low-voltage side rated voltage, kV.
    pub voltage_lv_kv: f64,
    /// Short-circuit voltage, percent.
    pub uk_percent: f64,
    /// Short-circuit (copper) losses, kW.
    pub pk_kw: f64,
    /// No-load current, percent.
    pub i0_percent: f64,
    /// No-load (iron) losses, kW.
    pub p0_kw: f64,
    /// Vector group label.
    pub vector_group: String,
    /// Precedence level the values were resolved from.
    pub source: ParameterSource,
}

// ============================================================================
// SECTION: Namespace Id Conversion
// ============================================================================

impl From<Namespace> for NamespaceId {
    fn from(namespace: Namespace) -> Self {
        Self::new(namespace.to_string())
    }
}
