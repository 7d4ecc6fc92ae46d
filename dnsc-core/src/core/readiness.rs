// dnsc-core/src/core/readiness.rs
// ============================================================================
// Module: Readiness & Eligibility
// Description: Post-processes a Validation report into per-area readiness
// gates and a per-analysis-type eligibility matrix.
// Purpose: Answer "can I run analysis X against this snapshot" without
// re-running validation or touching the snapshot itself.
// Dependencies: crate::core::{hashing, identifiers, snapshot, validation},
// ret_logic
// ============================================================================

//! ## Overview
//! Each gate's dependency on functional areas is expressed as a
//! `ret_logic::Requirement<Area>` and evaluated with `TriState`/`KleeneLogic`:
//! an area with any blocker-severity issue evaluates `False`, an area that
//! was assessed and carries none evaluates `True`. `Unknown` only arises for
//! an area absent from the status map, which never happens here since
//! [`Self::area_status`] always assesses all seven areas; the tri-state path
//! is kept anyway for fidelity with how the rest of the stack composes
//! gates, even though DNSC's readiness gates reduce to boolean in practice.
//!
//! Per-analysis-type eligibility, distinct from the four named gates,
//! additionally escalates specific warning codes to blocking for analysis
//! types that cannot proceed without the data they describe — single-phase
//! fault analysis cannot run without zero-sequence data, even though that
//! same gap is merely a warning for three-phase fault and load-flow studies.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use ret_logic::KleeneLogic;
use ret_logic::Requirement;
use ret_logic::Row;
use ret_logic::TriState;
use ret_logic::TriStatePredicateEval;
use serde::Deserialize;
use serde::Serialize;

use crate::core::hashing::content_hash;
use crate::core::identifiers::SnapshotId;
use crate::core::snapshot::Snapshot;
use crate::core::validation::ValidationIssue;
use crate::core::validation::ValidationReport;

// ============================================================================
// SECTION: Area
// ============================================================================

/// A functional area issues are attributed to for gating purposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Area {
    /// Graph structure: node existence, slack presence, connectivity.
    Topology,
    /// Grid ties and generator source equivalents.
    Sources,
    /// Catalog reference resolution and nameplate completeness.
    Catalogs,
    /// Generator connection-variant declarations.
    Generators,
    /// Protection device and setting assignments.
    Protection,
    /// Measurement point assignments.
    Measurements,
    /// Cross-cutting analysis-input completeness (e.g. zero-sequence data).
    Analysis,
}

/// All declared areas, in the order they are assessed.
const ALL_AREAS: [Area; 7] = [
    Area::Topology,
    Area::Sources,
    Area::Catalogs,
    Area::Generators,
    Area::Protection,
    Area::Measurements,
    Area::Analysis,
];

/// Per-row blocker presence for every assessed area; the reader a
/// [`Requirement<Area>`] evaluates against. Row is always `0`: readiness is
/// assessed once per snapshot, never in batches.
type AreaStatus = BTreeMap<Area, bool>;

impl TriStatePredicateEval for Area {
    type Reader<'a> = AreaStatus;

    fn eval_row_tristate(&self, reader: &Self::Reader<'_>, _row: Row) -> TriState {
        match reader.get(self) {
            Some(true) => TriState::False,
            Some(false) => TriState::True,
            None => TriState::Unknown,
        }
    }
}

/// Builds the `All(area...)` requirement a gate depends on.
fn requires_all(areas: &[Area]) -> Requirement<Area> {
    Requirement::and(areas.iter().copied().map(Requirement::predicate).collect())
}

// ============================================================================
// SECTION: Readiness Report
// ============================================================================

/// The four named readiness gates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadinessReport {
    /// Snapshot this report was assessed against.
    pub snapshot_id: SnapshotId,
    /// Ready for single-line-diagram rendering. Depends on topology and
    /// generators; "stations" in the gate's original description is folded
    /// into topology, since DNSC's area taxonomy has no separate area for it.
    pub sld_ready: bool,
    /// Ready for short-circuit analysis. Depends on topology, sources,
    /// catalogs.
    pub short_circuit_ready: bool,
    /// Ready for load-flow analysis. Depends on topology, sources, catalogs.
    pub load_flow_ready: bool,
    /// Ready for export. Depends on every area having no blockers.
    pub export_ready: bool,
}

// ============================================================================
// SECTION: Eligibility
// ============================================================================

/// Analysis types the eligibility matrix covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AnalysisType {
    /// Three-phase short-circuit analysis.
    Sc3f,
    /// Two-phase short-circuit analysis.
    Sc2f,
    /// Single-phase (line-to-ground) short-circuit analysis.
    Sc1f,
    /// Load-flow analysis.
    LoadFlow,
}

/// Eligibility policy for one analysis type: which areas it depends on, and
/// which normally-non-blocking issue codes become blocking for it.
struct AnalysisProfile {
    /// The analysis type this profile governs.
    kind: AnalysisType,
    /// Areas whose blockers gate this analysis.
    areas: &'static [Area],
    /// Issue codes that block this analysis even at non-blocker severity.
    escalate: &'static [&'static str],
}

/// One profile per declared [`AnalysisType`].
const PROFILES: &[AnalysisProfile] = &[
    AnalysisProfile {
        kind: AnalysisType::Sc3f,
        areas: &[Area::Topology, Area::Sources, Area::Catalogs],
        escalate: &[],
    },
    AnalysisProfile {
        kind: AnalysisType::Sc2f,
        areas: &[Area::Topology, Area::Sources, Area::Catalogs],
        escalate: &[],
    },
    AnalysisProfile {
        kind: AnalysisType::Sc1f,
        areas: &[Area::Topology, Area::Sources, Area::Catalogs, Area::Analysis],
        escalate: &["W001", "W002"],
    },
    AnalysisProfile {
        kind: AnalysisType::LoadFlow,
        areas: &[Area::Topology, Area::Sources, Area::Catalogs],
        escalate: &[],
    },
];

/// One analysis type's eligibility entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EligibilityEntry {
    /// The analysis type this entry describes.
    pub analysis_type: AnalysisType,
    /// `true` iff no blocking issue (including escalated ones) applies.
    pub eligible: bool,
    /// Blocking issues, in report order.
    pub blockers: Vec<ValidationIssue>,
    /// Non-blocking issues attributed to this analysis's dependent areas.
    pub warnings: Vec<ValidationIssue>,
    /// SHA-256 over this entry's canonical content, excluding this field.
    pub content_hash: String,
}

/// The full per-analysis-type eligibility matrix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EligibilityMap {
    /// Snapshot this matrix was assessed against.
    pub snapshot_id: SnapshotId,
    /// One entry per declared analysis type, sorted by analysis type.
    pub entries: Vec<EligibilityEntry>,
    /// SHA-256 over the sorted entries, excluding this field.
    pub content_hash: String,
}

/// Content used to compute an [`EligibilityEntry`]'s hash; mirrors the entry
/// minus `content_hash` itself.
#[derive(Serialize)]
struct EligibilityEntrySignature<'a> {
    analysis_type: AnalysisType,
    eligible: bool,
    blockers: &'a [ValidationIssue],
    warnings: &'a [ValidationIssue],
}

/// Content used to compute an [`EligibilityMap`]'s hash; mirrors the map
/// minus `content_hash` itself.
#[derive(Serialize)]
struct EligibilityMapSignature<'a> {
    snapshot_id: &'a SnapshotId,
    entries: &'a [EligibilityEntry],
}

// ============================================================================
// SECTION: Readiness Engine
// ============================================================================

/// Stateless post-processor over a [`ValidationReport`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ReadinessEngine;

impl ReadinessEngine {
    /// Assesses the four named readiness gates.
    #[must_use]
    pub fn assess(&self, snapshot: &Snapshot, validation: &ValidationReport) -> ReadinessReport {
        let status = area_status(validation);
        ReadinessReport {
            snapshot_id: snapshot.snapshot_id.clone(),
            sld_ready: gate_ready(&status, &[Area::Topology, Area::Generators]),
            short_circuit_ready: gate_ready(
                &status,
                &[Area::Topology, Area::Sources, Area::Catalogs],
            ),
            load_flow_ready: gate_ready(&status, &[Area::Topology, Area::Sources, Area::Catalogs]),
            export_ready: gate_ready(&status, &ALL_AREAS),
        }
    }

    /// Builds the per-analysis-type eligibility matrix.
    ///
    /// # Errors
    ///
    /// Returns [`crate::core::hashing::HashError`] if an entry or the map
    /// itself cannot be canonically encoded, which should never happen for
    /// a validly constructed [`ValidationReport`].
    pub fn eligibility(
        &self,
        snapshot: &Snapshot,
        validation: &ValidationReport,
    ) -> Result<EligibilityMap, crate::core::hashing::HashError> {
        let mut entries = Vec::with_capacity(PROFILES.len());
        for profile in PROFILES {
            entries.push(build_entry(validation, profile)?);
        }
        entries.sort_by(|a, b| a.analysis_type.cmp(&b.analysis_type));
        let content_hash = content_hash(&EligibilityMapSignature {
            snapshot_id: &snapshot.snapshot_id,
            entries: &entries,
        })?
        .value;
        Ok(EligibilityMap { snapshot_id: snapshot.snapshot_id.clone(), entries, content_hash })
    }
}

/// Computes blocker presence for every declared area.
fn area_status(validation: &ValidationReport) -> AreaStatus {
    ALL_AREAS.iter().map(|&area| (area, validation.has_blocker_in(area))).collect()
}

/// Evaluates a gate's dependency requirement against the current area status.
fn gate_ready(status: &AreaStatus, areas: &[Area]) -> bool {
    requires_all(areas).eval_tristate(status, 0, &KleeneLogic).is_true()
}

/// Builds one analysis type's eligibility entry from the validation report.
fn build_entry(
    validation: &ValidationReport,
    profile: &AnalysisProfile,
) -> Result<EligibilityEntry, crate::core::hashing::HashError> {
    let in_scope = |issue: &&ValidationIssue| profile.areas.contains(&issue.area);

    let mut blockers: Vec<ValidationIssue> =
        validation.blockers.iter().filter(in_scope).cloned().collect();
    let mut warnings = Vec::new();
    for issue in validation.warnings.iter().filter(in_scope) {
        if profile.escalate.contains(&issue.code.as_str()) {
            blockers.push(issue.clone());
        } else {
            warnings.push(issue.clone());
        }
    }
    blockers.sort_by(|a, b| a.code.cmp(&b.code).then_with(|| a.element_ref.cmp(&b.element_ref)));

    let eligible = blockers.is_empty();
    let content_hash = content_hash(&EligibilityEntrySignature {
        analysis_type: profile.kind,
        eligible,
        blockers: &blockers,
        warnings: &warnings,
    })?
    .value;
    Ok(EligibilityEntry { analysis_type: profile.kind, eligible, blockers, warnings, content_hash })
}
