// dnsc-core/src/core/envelope.rs
// ============================================================================
// Module: Solver-Input Envelope Builder
// Description: Builds a versioned, analysis-type-specific payload for a
// snapshot, frozen per contract version.
// Purpose: Give solver callers a self-contained input that already knows
// whether it is eligible to run and carries only the fields that analysis
// needs.
// Dependencies: crate::core::{catalog, entities, identifiers, readiness, snapshot}
// ============================================================================

//! ## Overview
//! One envelope is built per `(snapshot, analysis_type)` pair. Its payload
//! schema is frozen per [`SOLVER_INPUT_CONTRACT_VERSION`]: adding a field to
//! [`ShortCircuitPayload`] or [`LoadFlowPayload`] requires a version bump,
//! not a silent addition, since solver callers pin against the version they
//! were written against.
//!
//! The provenance summary exists so a caller can tell, without walking the
//! whole snapshot, how much of the input came from catalog resolution versus
//! manual override or derivation.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;

use serde::Deserialize;
use serde::Serialize;

use crate::core::binding::SourceKind;
use crate::core::catalog::CatalogError;
use crate::core::catalog::CatalogRegistry;
use crate::core::entities::BranchElectricalModel;
use crate::core::entities::GeneratorType;
use crate::core::entities::NodeKind;
use crate::core::entities::SourceModel;
use crate::core::entities::SwitchKind;
use crate::core::entities::SwitchState;
use crate::core::identifiers::BranchId;
use crate::core::identifiers::NodeId;
use crate::core::identifiers::SourceId;
use crate::core::identifiers::SwitchId;
use crate::core::readiness::AnalysisType;
use crate::core::readiness::EligibilityEntry;
use crate::core::snapshot::Snapshot;

/// Contract version the payload shapes in this module are frozen against.
pub const SOLVER_INPUT_CONTRACT_VERSION: &str = "1.0";

// ============================================================================
// SECTION: Shared Payload Fragments
// ============================================================================

/// Solver-relevant projection of a [`crate::core::entities::Node`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusPayload {
    /// Bus id.
    pub id: NodeId,
    /// Electrical role.
    pub kind: NodeKind,
    /// Nominal voltage, kV.
    pub nominal_voltage_kv: f64,
}

/// Solver-relevant projection of an in-service line or cable branch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BranchPayload {
    /// Branch id.
    pub id: BranchId,
    /// "from" endpoint.
    pub from_node: NodeId,
    /// "to" endpoint.
    pub to_node: NodeId,
    /// `true` for a cable, `false` for an overhead line.
    pub is_cable: bool,
    /// Resistance per kilometer, ohms/km.
    pub r_ohm_per_km: f64,
    /// Reactance per kilometer, ohms/km.
    pub x_ohm_per_km: f64,
    /// Susceptance per kilometer, microsiemens/km.
    pub b_us_per_km: f64,
    /// Segment length, km.
    pub length_km: f64,
}

/// Solver-relevant projection of an in-service transformer branch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformerPayload {
    /// Branch id.
    pub id: BranchId,
    /// High-voltage side endpoint.
    pub from_node: NodeId,
    /// Low-voltage side endpoint.
    pub to_node: NodeId,
    /// Rated power, MVA.
    pub rated_power_mva: f64,
    /// High-voltage side rated voltage, kV.
    pub voltage_hv_kv: f64,
    /// Low-voltage side rated voltage, kV.
    pub voltage_lv_kv: f64,
    /// Short-circuit voltage, percent.
    pub uk_percent: f64,
    /// Vector group label.
    pub vector_group: String,
}

/// Solver-relevant projection of an in-service switching device, whether
/// modeled as a standalone [`crate::core::entities::Switch`] or as a
/// [`BranchElectricalModel::Switch`] branch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwitchPayload {
    /// Switch or branch-as-switch id.
    pub id: String,
    /// "from" endpoint.
    pub from_node: NodeId,
    /// "to" endpoint.
    pub to_node: NodeId,
    /// Device kind, absent for a branch-modeled switch.
    pub kind: Option<SwitchKind>,
    /// Current state.
    pub state: SwitchState,
}

/// Solver-relevant projection of an in-service source (grid tie or
/// generator).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourcePayload {
    /// Source id.
    pub id: SourceId,
    /// Node the source feeds.
    pub node: NodeId,
    /// Equivalent-circuit model.
    pub model: SourceModel,
    /// Generator technology, absent for a plain grid tie.
    pub generator_type: Option<GeneratorType>,
}

// ============================================================================
// SECTION: Analysis-Specific Payloads
// ============================================================================

/// Payload for `SC_3F`/`SC_2F`/`SC_1F` short-circuit analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShortCircuitPayload {
    /// Buses, sorted by id.
    pub buses: Vec<BusPayload>,
    /// Lines and cables, sorted by id.
    pub branches: Vec<BranchPayload>,
    /// Transformers, sorted by id.
    pub transformers: Vec<TransformerPayload>,
    /// Generator sources, sorted by id.
    pub inverter_sources: Vec<SourcePayload>,
    /// Switching devices, sorted by id.
    pub switches: Vec<SwitchPayload>,
    /// IEC 60909 voltage factor `c`, if any in-service grid source declares
    /// one.
    pub c_factor: Option<f64>,
    /// Inverter thermal withstand time assumed for fault current decay,
    /// seconds.
    pub thermal_time_seconds: f64,
    /// Whether inverter-based generation contributes fault current.
    pub include_inverter_contribution: bool,
}

/// Fixed inverter thermal withstand assumption, seconds.
const DEFAULT_THERMAL_TIME_SECONDS: f64 = 1.0;

/// Payload for `LOAD_FLOW` analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadFlowPayload {
    /// Buses, sorted by id.
    pub buses: Vec<BusPayload>,
    /// Lines and cables, sorted by id.
    pub branches: Vec<BranchPayload>,
    /// Transformers, sorted by id.
    pub transformers: Vec<TransformerPayload>,
    /// Generator sources, sorted by id.
    pub inverter_sources: Vec<SourcePayload>,
    /// Switching devices, sorted by id.
    pub switches: Vec<SwitchPayload>,
    /// Power-flow base, MVA.
    pub base_mva: f64,
    /// Maximum solver iterations.
    pub max_iterations: u32,
    /// Convergence tolerance, per-unit.
    pub tolerance: f64,
}

/// Fixed load-flow base power, MVA.
const DEFAULT_BASE_MVA: f64 = 100.0;
/// Fixed load-flow iteration cap.
const DEFAULT_MAX_ITERATIONS: u32 = 30;
/// Fixed load-flow convergence tolerance, per-unit.
const DEFAULT_TOLERANCE: f64 = 1e-6;

/// The analysis-specific solver payload, tagged by analysis type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SolverPayload {
    /// Short-circuit analysis payload (any of `SC_3F`/`SC_2F`/`SC_1F`).
    ShortCircuit(ShortCircuitPayload),
    /// Load-flow analysis payload.
    LoadFlow(LoadFlowPayload),
}

// ============================================================================
// SECTION: Provenance Summary
// ============================================================================

/// Counts summarizing where the payload's field values came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvenanceSummary {
    /// Number of distinct `(namespace, catalog_item_id)` pairs bound to by
    /// any element in the snapshot.
    pub distinct_catalog_refs: usize,
    /// Number of materialized fields whose provenance is an explicit
    /// override.
    pub override_count: usize,
    /// Number of materialized fields whose provenance is a derivation.
    pub derived_count: usize,
}

// ============================================================================
// SECTION: Envelope
// ============================================================================

/// A versioned, self-contained solver input for one `(snapshot,
/// analysis_type)` pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolverInputEnvelope {
    /// Contract version this envelope's payload schema is frozen against.
    pub solver_input_version: String,
    /// Caller-supplied case identifier, opaque to the envelope builder.
    pub case_id: String,
    /// Snapshot revision (its own id) the envelope was built from.
    pub enm_revision: String,
    /// Analysis type this envelope targets.
    pub analysis_type: AnalysisType,
    /// This analysis type's eligibility entry, carried verbatim.
    pub eligibility: EligibilityEntry,
    /// Catalog-resolution provenance summary.
    pub provenance_summary: ProvenanceSummary,
    /// The analysis-specific payload.
    pub payload: SolverPayload,
    /// Human-readable trace of distinct catalog references the payload
    /// drew from, sorted.
    pub trace: Vec<String>,
}

// ============================================================================
// SECTION: Envelope Builder
// ============================================================================

/// Stateless builder turning a snapshot and an eligibility entry into a
/// frozen-schema solver input.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvelopeBuilder;

impl EnvelopeBuilder {
    /// Builds the envelope for `analysis_type` against `snapshot`, carrying
    /// `eligibility` (computed by [`crate::core::readiness::ReadinessEngine`])
    /// verbatim.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError`] if a branch or transformer declares a
    /// `type_ref` that no longer resolves against `catalog`.
    pub fn build(
        &self,
        snapshot: &Snapshot,
        catalog: &CatalogRegistry,
        case_id: impl Into<String>,
        eligibility: EligibilityEntry,
    ) -> Result<SolverInputEnvelope, CatalogError> {
        let analysis_type = eligibility.analysis_type;
        let buses = build_buses(snapshot);
        let branches = build_branches(snapshot, catalog)?;
        let transformers = build_transformers(snapshot, catalog)?;
        let inverter_sources = build_sources(snapshot);
        let switches = build_switches(snapshot);

        let payload = match analysis_type {
            AnalysisType::Sc3f | AnalysisType::Sc2f | AnalysisType::Sc1f => {
                SolverPayload::ShortCircuit(ShortCircuitPayload {
                    c_factor: dominant_voltage_factor(snapshot),
                    thermal_time_seconds: DEFAULT_THERMAL_TIME_SECONDS,
                    include_inverter_contribution: has_inverter_generation(snapshot),
                    buses,
                    branches,
                    transformers,
                    inverter_sources,
                    switches,
                })
            }
            AnalysisType::LoadFlow => SolverPayload::LoadFlow(LoadFlowPayload {
                base_mva: DEFAULT_BASE_MVA,
                max_iterations: DEFAULT_MAX_ITERATIONS,
                tolerance: DEFAULT_TOLERANCE,
                buses,
                branches,
                transformers,
                inverter_sources,
                switches,
            }),
        };

        Ok(SolverInputEnvelope {
            solver_input_version: SOLVER_INPUT_CONTRACT_VERSION.to_string(),
            case_id: case_id.into(),
            enm_revision: snapshot.snapshot_id.to_string(),
            analysis_type,
            provenance_summary: build_provenance_summary(snapshot),
            trace: build_trace(snapshot),
            eligibility,
            payload,
        })
    }
}

/// Collects every in-service node as a [`BusPayload`], already sorted by id.
fn build_buses(snapshot: &Snapshot) -> Vec<BusPayload> {
    snapshot
        .nodes()
        .iter()
        .map(|node| BusPayload {
            id: node.id.clone(),
            kind: node.kind,
            nominal_voltage_kv: node.nominal_voltage_kv,
        })
        .collect()
}

/// Collects every in-service line/cable branch as a [`BranchPayload`],
/// resolving parameters through `catalog` with the registry's own
/// override/type_ref/instance precedence.
fn build_branches(
    snapshot: &Snapshot,
    catalog: &CatalogRegistry,
) -> Result<Vec<BranchPayload>, CatalogError> {
    let mut out = Vec::new();
    for branch in snapshot.branches().iter().filter(|b| b.in_service) {
        if let BranchElectricalModel::LineLike { is_cable, type_ref, impedance_override, instance, length_km } =
            &branch.electrical
        {
            let resolved = catalog.resolve_line_params(
                type_ref.as_ref(),
                *is_cable,
                impedance_override.as_ref(),
                *length_km,
                instance,
            )?;
            out.push(BranchPayload {
                id: branch.id.clone(),
                from_node: branch.from_node.clone(),
                to_node: branch.to_node.clone(),
                is_cable: *is_cable,
                r_ohm_per_km: resolved.r_ohm_per_km,
                x_ohm_per_km: resolved.x_ohm_per_km,
                b_us_per_km: resolved.b_us_per_km,
                length_km: *length_km,
            });
        }
    }
    Ok(out)
}

/// Collects every in-service transformer branch as a [`TransformerPayload`],
/// resolving nameplate parameters through `catalog` with `type_ref >
/// instance` precedence.
fn build_transformers(
    snapshot: &Snapshot,
    catalog: &CatalogRegistry,
) -> Result<Vec<TransformerPayload>, CatalogError> {
    let mut out = Vec::new();
    for branch in snapshot.branches().iter().filter(|b| b.in_service) {
        if let BranchElectricalModel::Transformer { type_ref, instance } = &branch.electrical {
            let resolved = catalog.resolve_transformer_params(type_ref.as_ref(), instance)?;
            out.push(TransformerPayload {
                id: branch.id.clone(),
                from_node: branch.from_node.clone(),
                to_node: branch.to_node.clone(),
                rated_power_mva: resolved.rated_power_mva,
                voltage_hv_kv: resolved.voltage_hv_kv,
                voltage_lv_kv: resolved.voltage_lv_kv,
                uk_percent: resolved.uk_percent,
                vector_group: resolved.vector_group,
            });
        }
    }
    Ok(out)
}

/// Collects every in-service switching device, from both standalone
/// switches and branch-modeled switches, as [`SwitchPayload`]s sorted by id.
fn build_switches(snapshot: &Snapshot) -> Vec<SwitchPayload> {
    let mut out: Vec<SwitchPayload> = snapshot
        .switches()
        .iter()
        .filter(|s| s.in_service)
        .map(|switch| SwitchPayload {
            id: switch.id.as_str().to_string(),
            from_node: switch.from_node.clone(),
            to_node: switch.to_node.clone(),
            kind: Some(switch.kind),
            state: switch.state,
        })
        .collect();
    for branch in snapshot.branches().iter().filter(|b| b.in_service) {
        if matches!(branch.electrical, BranchElectricalModel::Switch) {
            out.push(SwitchPayload {
                id: branch.id.as_str().to_string(),
                from_node: branch.from_node.clone(),
                to_node: branch.to_node.clone(),
                kind: None,
                state: SwitchState::Closed,
            });
        }
    }
    out.sort_by(|a, b| a.id.cmp(&b.id));
    out
}

/// Collects every in-service source as a [`SourcePayload`], sorted by id.
fn build_sources(snapshot: &Snapshot) -> Vec<SourcePayload> {
    snapshot
        .sources()
        .iter()
        .filter(|s| s.in_service)
        .map(|source| SourcePayload {
            id: source.id.clone(),
            node: source.node.clone(),
            model: source.model.clone(),
            generator_type: source.generator.as_ref().map(|g| g.generator_type),
        })
        .collect()
}

/// Returns the first in-service grid source's declared voltage factor `c`,
/// if any.
fn dominant_voltage_factor(snapshot: &Snapshot) -> Option<f64> {
    snapshot.sources().iter().filter(|s| s.in_service).find_map(|source| match &source.model {
        SourceModel::Grid { voltage_factor: Some(c), .. } => Some(*c),
        _ => None,
    })
}

/// Returns `true` if any in-service inverter-based generator is present.
fn has_inverter_generation(snapshot: &Snapshot) -> bool {
    snapshot.sources().iter().filter(|s| s.in_service).any(|source| {
        matches!(
            source.generator.as_ref().map(|g| g.generator_type),
            Some(GeneratorType::Pv | GeneratorType::WindInverter | GeneratorType::Bess)
        )
    })
}

/// Counts distinct catalog references and override/derived field provenance
/// across every catalog-bound element in the snapshot.
fn build_provenance_summary(snapshot: &Snapshot) -> ProvenanceSummary {
    let mut refs = BTreeSet::new();
    let mut override_count = 0usize;
    let mut derived_count = 0usize;

    let mut visit = |binding: &crate::core::binding::CatalogBinding| {
        refs.insert((binding.namespace, binding.catalog_item_id.clone()));
        for provenance in binding.field_provenance.values() {
            match provenance.source {
                SourceKind::Override => override_count += 1,
                SourceKind::Derived => derived_count += 1,
                SourceKind::Catalog | SourceKind::DefaultForbidden => {}
            }
        }
    };

    for branch in snapshot.branches() {
        if let Some(binding) = &branch.catalog_binding {
            visit(binding);
        }
    }
    for source in snapshot.sources() {
        if let Some(generator) = &source.generator {
            if let Some(binding) = &generator.catalog_binding {
                visit(binding);
            }
        }
    }
    for measurement in snapshot.measurements() {
        if let Some(binding) = &measurement.catalog_binding {
            visit(binding);
        }
    }
    for assignment in snapshot.protection_assignments() {
        if let Some(binding) = &assignment.catalog_binding {
            visit(binding);
        }
    }

    ProvenanceSummary {
        distinct_catalog_refs: refs.len(),
        override_count,
        derived_count,
    }
}

/// Lists every distinct `(namespace, catalog_item_id)@version` bound in the
/// snapshot, sorted, for the envelope's human-readable trace.
fn build_trace(snapshot: &Snapshot) -> Vec<String> {
    let mut refs = BTreeSet::new();

    let mut visit = |binding: &crate::core::binding::CatalogBinding| {
        refs.insert(format!(
            "{}:{}@{}",
            binding.namespace, binding.catalog_item_id, binding.catalog_item_version
        ));
    };

    for branch in snapshot.branches() {
        if let Some(binding) = &branch.catalog_binding {
            visit(binding);
        }
    }
    for source in snapshot.sources() {
        if let Some(generator) = &source.generator {
            if let Some(binding) = &generator.catalog_binding {
                visit(binding);
            }
        }
    }
    for measurement in snapshot.measurements() {
        if let Some(binding) = &measurement.catalog_binding {
            visit(binding);
        }
    }
    for assignment in snapshot.protection_assignments() {
        if let Some(binding) = &assignment.catalog_binding {
            visit(binding);
        }
    }

    refs.into_iter().collect()
}
