// dnsc-core/src/core/proof.rs
// ============================================================================
// Module: Result / Proof Artifact Builder
// Description: Frozen-after-introduction result-set wrappers, a step-by-step
// ProofDocument, a byte-deterministic ZIP Proof Pack exporter, and a DOCX
// export normalizer.
// Purpose: Give solver outputs a canonical, content-addressed wrapper, a
// reproducible archive for handing derivations to a human reader, and a way
// to make an externally-rendered DOCX report byte-reproducible.
// Dependencies: crate::core::hashing, serde, serde_json, zip, quick-xml
// ============================================================================

//! ## Overview
//! This module never reads a clock or touches the filesystem. Every
//! timestamp it carries (`ProofDocument::created_at`,
//! `ProofHeader::run_timestamp`) is supplied by the caller as an ISO-8601
//! string; every archive entry's modification time is the fixed sentinel
//! `1980-01-01 00:00:00`. Determinism therefore only depends on the
//! `ProofDocument`/`ResultSet` content passed in, never on when or where the
//! pack is built.
//!
//! PDF export is not attempted: invoking an external TeX toolchain has no
//! place in a pure, deterministic core library, so a Proof Pack here always
//! takes the JSON+LaTeX fallback path the original contract allows when a
//! compiler is unavailable.
//!
//! [`normalize_docx_bytes`] covers the narrower, byte-level sibling problem:
//! a DOCX report rendered elsewhere (a host process, a template engine) is a
//! ZIP archive whose entry timestamps, entry order, and
//! `docProps/core.xml` creation metadata are usually nondeterministic even
//! when the document's visible content is not. This module does not
//! generate DOCX content; it only normalizes bytes already produced.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::io::Cursor;
use std::io::Write as _;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use quick_xml::events::BytesText;
use quick_xml::events::Event;
use quick_xml::reader::Reader;
use quick_xml::writer::Writer;
use zip::write::SimpleFileOptions;
use zip::write::ZipWriter;
use zip::CompressionMethod;
use zip::DateTime as ZipDateTime;
use zip::ZipArchive;

use crate::core::hashing::content_hash;
use crate::core::hashing::hash_bytes;
use crate::core::hashing::HashAlgorithm;
use crate::core::hashing::HashError;

// ============================================================================
// SECTION: Proof Value
// ============================================================================

/// A single scalar result value, real or complex, with its unit and where it
/// came from.
///
/// Complex values are encoded as a `{re, im}` object rather than an `"a+jb"`
/// string: the canonical encoder walks `serde_json::Value` trees uniformly,
/// and a structured object avoids a second parser for a format the encoder
/// would otherwise have to special-case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProofValue {
    /// Display symbol, e.g. `"I_k3"`.
    pub symbol: String,
    /// The scalar value.
    pub value: ProofNumeric,
    /// Physical unit, e.g. `"kA"`.
    pub unit: String,
    /// Pre-formatted display string.
    pub formatted: String,
    /// Key identifying which upstream value this was read from.
    pub source_key: String,
}

/// A real or complex scalar.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProofNumeric {
    /// A real value.
    Real(f64),
    /// A complex value, real and imaginary parts.
    Complex {
        /// Real part.
        re: f64,
        /// Imaginary part.
        im: f64,
    },
}

// ============================================================================
// SECTION: Equation & Symbol Definitions
// ============================================================================

/// One symbol appearing in an [`EquationDefinition`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolDefinition {
    /// Display symbol.
    pub symbol: String,
    /// Physical unit.
    pub unit: String,
    /// Human-readable description.
    pub description_pl: String,
    /// Key this symbol is bound to in the step's input values.
    pub mapping_key: String,
}

/// A named, standard-referenced equation with its symbol table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquationDefinition {
    /// Stable equation identifier.
    pub equation_id: String,
    /// LaTeX rendering of the equation.
    pub latex: String,
    /// Human-readable name.
    pub name_pl: String,
    /// Standard clause this equation implements, e.g. `"IEC 60909-0 §4.3.1"`.
    pub standard_ref: String,
    /// Symbols used in the equation, in declaration order.
    pub symbols: Vec<SymbolDefinition>,
    /// Human-readable unit derivation.
    pub unit_derivation: String,
    /// Optional free-text note.
    pub notes: Option<String>,
}

// ============================================================================
// SECTION: Unit Check
// ============================================================================

/// Result of checking a step's computed unit against its expected unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitCheckResult {
    /// Whether the computed unit matched the expected unit.
    pub passed: bool,
    /// Expected unit.
    pub expected_unit: String,
    /// Unit actually computed.
    pub computed_unit: String,
    /// Units of each input value, keyed by input symbol.
    pub input_units: BTreeMap<String, String>,
    /// Human-readable derivation of the computed unit.
    pub derivation: String,
}

// ============================================================================
// SECTION: Proof Step
// ============================================================================

/// One step of a derivation: an equation applied to specific input values,
/// producing a result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProofStep {
    /// Stable step identifier.
    pub step_id: String,
    /// 1-based position within the document.
    pub step_number: u32,
    /// Human-readable title.
    pub title_pl: String,
    /// Equation this step applies.
    pub equation: EquationDefinition,
    /// Values substituted into the equation.
    pub input_values: Vec<ProofValue>,
    /// LaTeX rendering of the substitution.
    pub substitution_latex: String,
    /// The step's result.
    pub result: ProofValue,
    /// Unit-consistency check for this step.
    pub unit_check: UnitCheckResult,
    /// Maps symbol name to the snapshot/result field it was read from.
    pub source_keys: BTreeMap<String, String>,
}

// ============================================================================
// SECTION: Header & Summary
// ============================================================================

/// Document-level context a proof was run under.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProofHeader {
    /// Project name.
    pub project_name: String,
    /// Case name.
    pub case_name: String,
    /// ISO-8601 timestamp the solver run completed, supplied by the caller.
    pub run_timestamp: String,
    /// Solver version string.
    pub solver_version: String,
    /// Fault location, for short-circuit proofs.
    pub fault_location: Option<String>,
    /// Fault type, for short-circuit proofs.
    pub fault_type: Option<String>,
    /// IEC 60909 voltage factor `c`, for short-circuit proofs.
    pub voltage_factor: Option<f64>,
    /// Source bus, for voltage-drop proofs.
    pub source_bus: Option<String>,
    /// Target bus, for voltage-drop proofs.
    pub target_bus: Option<String>,
}

/// Roll-up of a proof document's key outputs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProofSummary {
    /// Named key results, e.g. `"ik3_ka"`.
    pub key_results: BTreeMap<String, ProofValue>,
    /// Whether every step's unit check passed.
    pub unit_check_passed: bool,
    /// Number of steps in the document.
    pub total_steps: u32,
    /// Non-fatal warnings accumulated while building the proof.
    pub warnings: Vec<String>,
    /// Overall outcome label, e.g. `"OK"` or `"UNIT_MISMATCH"`.
    pub overall_status: String,
}

// ============================================================================
// SECTION: Proof Type
// ============================================================================

/// Which analysis family a [`ProofDocument`] derives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProofType {
    /// Three-phase short circuit per IEC 60909.
    Sc3fIec60909,
    /// Two-phase short circuit per IEC 60909.
    Sc2fIec60909,
    /// Two-phase-to-ground short circuit per IEC 60909.
    Sc2fgIec60909,
    /// Single-phase-to-ground short circuit per IEC 60909.
    Sc1fIec60909,
    /// Voltage drop along a feeder.
    Vdrop,
    /// Q(U) reactive power regulation.
    QURegulation,
    /// Standalone equipment rating proof.
    EquipmentProof,
}

impl ProofType {
    /// Label used for grouping in a Proof Pack manifest; collapses the three
    /// asymmetrical short-circuit variants into one family, matching how the
    /// pack's toolchain groups them for filtering.
    #[must_use]
    pub fn pack_label(self) -> &'static str {
        match self {
            Self::Sc3fIec60909 => "SC3F_IEC60909",
            Self::Vdrop => "VDROP",
            Self::QURegulation => "QU_REGULATION",
            Self::EquipmentProof => "P12",
            Self::Sc1fIec60909 | Self::Sc2fIec60909 | Self::Sc2fgIec60909 => "SC1_ASYM",
        }
    }
}

// ============================================================================
// SECTION: Proof Document
// ============================================================================

/// Content used to compute a [`ProofDocument`]'s hash: the full document
/// minus `document_id` and `created_at`, which are informational and would
/// otherwise make two runs over identical inputs hash differently.
#[derive(Serialize)]
struct ProofDocumentSignature<'a> {
    artifact_id: &'a str,
    proof_type: ProofType,
    title_pl: &'a str,
    header: &'a ProofHeader,
    steps: &'a [ProofStep],
    summary: &'a ProofSummary,
}

/// A step-by-step, LaTeX-annotated derivation accompanying a solver result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProofDocument {
    /// Document identity, informational only.
    pub document_id: String,
    /// Identifies the artifact (solver run output) this proof derives.
    pub artifact_id: String,
    /// ISO-8601 creation timestamp, supplied by the caller, informational
    /// only.
    pub created_at: String,
    /// Which analysis family this document derives.
    pub proof_type: ProofType,
    /// Human-readable title.
    pub title_pl: String,
    /// Run context.
    pub header: ProofHeader,
    /// Ordered derivation steps.
    pub steps: Vec<ProofStep>,
    /// Roll-up of key outputs.
    pub summary: ProofSummary,
}

impl ProofDocument {
    /// Returns the canonical dict this document's content hash is computed
    /// over: every field except `document_id` and `created_at`.
    ///
    /// # Errors
    ///
    /// Returns [`HashError`] if the document cannot be canonically encoded.
    pub fn to_canonical_dict(&self) -> Result<Value, HashError> {
        let signature = ProofDocumentSignature {
            artifact_id: &self.artifact_id,
            proof_type: self.proof_type,
            title_pl: &self.title_pl,
            header: &self.header,
            steps: &self.steps,
            summary: &self.summary,
        };
        serde_json::to_value(&signature).map_err(|err| HashError::Canonicalization(err.to_string()))
    }

    /// Computes `SHA-256` over this document's canonical dict.
    ///
    /// # Errors
    ///
    /// Returns [`HashError`] if the document cannot be canonically encoded.
    pub fn content_hash(&self) -> Result<String, HashError> {
        let signature = ProofDocumentSignature {
            artifact_id: &self.artifact_id,
            proof_type: self.proof_type,
            title_pl: &self.title_pl,
            header: &self.header,
            steps: &self.steps,
            summary: &self.summary,
        };
        Ok(content_hash(&signature)?.value)
    }
}

// ============================================================================
// SECTION: Result Set
// ============================================================================

/// Outcome of a solver run, for result sets that wrap an iterative solver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConvergenceStatus {
    /// Solver converged within the iteration budget.
    Converged,
    /// Solver ran to the iteration budget without converging.
    NotConverged,
    /// Input failed validation before the solver ran.
    FailedValidation,
    /// Solver raised an internal error.
    FailedSolver,
}

/// Which analysis family a [`ResultSet`] wraps. Broader than
/// [`crate::core::readiness::AnalysisType`], which only covers the four
/// solver-eligibility gates; result sets additionally cover derived studies
/// that have no corresponding eligibility gate of their own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResultAnalysisType {
    /// Three-phase short-circuit analysis.
    ShortCircuit3f,
    /// Two-phase short-circuit analysis.
    ShortCircuit2f,
    /// Single-phase short-circuit analysis.
    ShortCircuit1f,
    /// Load-flow analysis.
    LoadFlow,
    /// Feeder loss computation.
    Losses,
    /// Q(U) reactive power regulation study.
    QuRegulation,
}

/// One element's opaque result payload, keyed by id.
///
/// The DNSC does not run solvers, so a result entry's `values` are whatever
/// scalar fields the calling solver produced; this module only guarantees
/// they are sorted by `id` and canonically hashable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultEntry {
    /// Node or branch id this entry describes.
    pub id: String,
    /// Solver-produced scalar fields for this element.
    pub values: BTreeMap<String, Value>,
}

/// Content used to compute a [`ResultSet`]'s deterministic signature: every
/// field except the signature itself.
#[derive(Serialize)]
struct ResultSetSignature<'a> {
    analysis_type: ResultAnalysisType,
    result_version: &'a str,
    snapshot_hash: &'a str,
    run_hash: &'a str,
    input_hash: &'a str,
    convergence_status: ConvergenceStatus,
    iteration_count: u32,
    nodes: &'a [ResultEntry],
    branches: &'a [ResultEntry],
    totals: &'a BTreeMap<String, Value>,
    warnings: &'a [String],
    errors: &'a [String],
}

/// A versioned, frozen-after-introduction wrapper around one solver run's
/// output.
///
/// Once a version (e.g. `"1"` for `LoadFlowResultSetV1`) is published, its
/// field set is immutable; a new field requires a new `result_version`, not
/// an addition to this struct.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultSet {
    /// Which analysis family produced this result.
    pub analysis_type: ResultAnalysisType,
    /// Result-set schema version, e.g. `"1"`.
    pub result_version: String,
    /// Hash of the snapshot the solver ran against.
    pub snapshot_hash: String,
    /// Hash identifying this specific solver run.
    pub run_hash: String,
    /// Hash of the solver-input envelope consumed.
    pub input_hash: String,
    /// Solver outcome.
    pub convergence_status: ConvergenceStatus,
    /// Number of iterations the solver took.
    pub iteration_count: u32,
    /// Per-node results, sorted by id.
    pub nodes: Vec<ResultEntry>,
    /// Per-branch results, sorted by id.
    pub branches: Vec<ResultEntry>,
    /// Aggregate totals, e.g. total losses.
    pub totals: BTreeMap<String, Value>,
    /// Non-fatal warnings, sorted.
    pub warnings: Vec<String>,
    /// Fatal errors, sorted, non-empty only when `convergence_status` is a
    /// failure variant.
    pub errors: Vec<String>,
    /// SHA-256 over every other field, canonically encoded.
    pub deterministic_signature: String,
}

impl ResultSet {
    /// Builds a result set, sorting `nodes`/`branches`/`warnings`/`errors`
    /// and computing the deterministic signature.
    ///
    /// # Errors
    ///
    /// Returns [`HashError`] if the content cannot be canonically encoded.
    #[allow(clippy::too_many_arguments)]
    pub fn build(
        analysis_type: ResultAnalysisType,
        result_version: impl Into<String>,
        snapshot_hash: impl Into<String>,
        run_hash: impl Into<String>,
        input_hash: impl Into<String>,
        convergence_status: ConvergenceStatus,
        iteration_count: u32,
        mut nodes: Vec<ResultEntry>,
        mut branches: Vec<ResultEntry>,
        totals: BTreeMap<String, Value>,
        mut warnings: Vec<String>,
        mut errors: Vec<String>,
    ) -> Result<Self, HashError> {
        nodes.sort_by(|a, b| a.id.cmp(&b.id));
        branches.sort_by(|a, b| a.id.cmp(&b.id));
        warnings.sort();
        errors.sort();

        let result_version = result_version.into();
        let snapshot_hash = snapshot_hash.into();
        let run_hash = run_hash.into();
        let input_hash = input_hash.into();

        let deterministic_signature = content_hash(&ResultSetSignature {
            analysis_type,
            result_version: &result_version,
            snapshot_hash: &snapshot_hash,
            run_hash: &run_hash,
            input_hash: &input_hash,
            convergence_status,
            iteration_count,
            nodes: &nodes,
            branches: &branches,
            totals: &totals,
            warnings: &warnings,
            errors: &errors,
        })?
        .value;

        Ok(Self {
            analysis_type,
            result_version,
            snapshot_hash,
            run_hash,
            input_hash,
            convergence_status,
            iteration_count,
            nodes,
            branches,
            totals,
            warnings,
            errors,
            deterministic_signature,
        })
    }
}

// ============================================================================
// SECTION: LaTeX Export
// ============================================================================

/// Characters `render_latex` escapes in any caller-supplied string before
/// emitting it.
const LATEX_SPECIAL: &[(char, &str)] = &[
    ('\\', "\\textbackslash{}"),
    ('{', "\\{"),
    ('}', "\\}"),
    ('_', "\\_"),
    ('^', "\\^{}"),
    ('#', "\\#"),
    ('&', "\\&"),
    ('%', "\\%"),
    ('$', "\\$"),
    ('~', "\\textasciitilde{}"),
];

/// Escapes the minimal set of LaTeX special characters in free text.
fn latex_escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match LATEX_SPECIAL.iter().find(|(special, _)| *special == ch) {
            Some((_, replacement)) => out.push_str(replacement),
            None => out.push(ch),
        }
    }
    out
}

/// Renders a deterministic LaTeX document: inputs sorted by key, equation
/// registry sorted by equation id, steps sorted by step id, outputs sorted
/// by key.
#[must_use]
pub fn render_latex(proof: &ProofDocument) -> String {
    let mut out = String::new();
    out.push_str("% auto-generated, do not edit\n");
    out.push_str(&format!("\\section*{{{}}}\n", latex_escape(&proof.title_pl)));

    out.push_str("\\subsection*{Header}\n\\begin{itemize}\n");
    out.push_str(&format!("  \\item Project: {}\n", latex_escape(&proof.header.project_name)));
    out.push_str(&format!("  \\item Case: {}\n", latex_escape(&proof.header.case_name)));
    out.push_str(&format!("  \\item Solver: {}\n", latex_escape(&proof.header.solver_version)));
    out.push_str("\\end{itemize}\n");

    let mut equations: Vec<&EquationDefinition> = proof.steps.iter().map(|step| &step.equation).collect();
    equations.sort_by(|a, b| a.equation_id.cmp(&b.equation_id));
    out.push_str("\\subsection*{Equations}\n\\begin{itemize}\n");
    for equation in &equations {
        out.push_str(&format!(
            "  \\item {}: {}\n",
            latex_escape(&equation.equation_id),
            equation.latex
        ));
    }
    out.push_str("\\end{itemize}\n");

    let mut steps: Vec<&ProofStep> = proof.steps.iter().collect();
    steps.sort_by(|a, b| a.step_id.cmp(&b.step_id));
    out.push_str("\\subsection*{Steps}\n");
    for step in &steps {
        out.push_str(&format!("\\paragraph{{{}}}\n", latex_escape(&step.title_pl)));
        out.push_str(&format!("{}\n", step.substitution_latex));
    }

    let mut outputs: Vec<(&String, &ProofValue)> = proof.summary.key_results.iter().collect();
    outputs.sort_by(|a, b| a.0.cmp(b.0));
    out.push_str("\\subsection*{Outputs}\n\\begin{itemize}\n");
    for (key, value) in outputs {
        out.push_str(&format!(
            "  \\item {}: {} {}\n",
            latex_escape(key),
            latex_escape(&value.formatted),
            latex_escape(&value.unit)
        ));
    }
    out.push_str("\\end{itemize}\n");

    out
}

// ============================================================================
// SECTION: Proof Pack
// ============================================================================

/// Errors raised while building a Proof Pack.
#[derive(Debug, Error)]
pub enum ProofPackError {
    /// The document could not be canonically encoded.
    #[error(transparent)]
    Hash(#[from] HashError),
    /// The in-memory ZIP archive could not be written.
    #[error("failed to build proof pack archive: {0}")]
    Zip(#[from] zip::result::ZipError),
    /// Writing archive entry bytes failed.
    #[error("failed to write proof pack entry: {0}")]
    Io(#[from] std::io::Error),
}

/// Caller-supplied identifiers carried into a Proof Pack's manifest and
/// signature, distinct from anything the pack itself derives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofPackContext {
    /// Case identifier.
    pub case_id: String,
    /// Solver run identifier.
    pub run_id: String,
    /// Snapshot identifier the proof was derived against.
    pub snapshot_id: String,
}

/// Fixed archive timestamp every Proof Pack entry carries.
const FIXED_ZIP_TIMESTAMP: (u16, u8, u8, u8, u8, u8) = (1980, 1, 1, 0, 0, 0);
/// Unix permission bits for file entries.
const FILE_MODE: u32 = 0o644;
/// Unix permission bits for directory entries.
const DIR_MODE: u32 = 0o755;

/// Builds byte-deterministic Proof Pack ZIP archives.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProofPackBuilder;

impl ProofPackBuilder {
    /// Builds a Proof Pack containing `proof.json`, `proof.tex`,
    /// `manifest.json`, and `signature.json`, all under a `proof_pack/`
    /// prefix, plus empty `assets/` and `proof_pack/` directory entries.
    ///
    /// # Errors
    ///
    /// Returns [`ProofPackError`] if the document cannot be canonically
    /// encoded or the archive cannot be written.
    pub fn build(
        &self,
        proof: &ProofDocument,
        context: &ProofPackContext,
    ) -> Result<Vec<u8>, ProofPackError> {
        let proof_json = pretty_json_bytes(proof)?;
        let proof_tex = render_latex(proof).into_bytes();

        let mut file_entries: BTreeMap<&'static str, Vec<u8>> = BTreeMap::new();
        file_entries.insert("proof_pack/proof.json", proof_json.clone());
        file_entries.insert("proof_pack/proof.tex", proof_tex);

        let manifest_bytes = build_manifest(proof, context, &file_entries, &proof_json)?;
        let signature_bytes = build_signature(&file_entries, &manifest_bytes)?;

        build_zip(&file_entries, &manifest_bytes, &signature_bytes)
    }
}

/// Serializes `value` to sorted-key, pretty-printed JSON bytes.
///
/// `serde_json::Value::Object` is backed by a `BTreeMap` in this crate's
/// configuration (the `preserve_order` feature is never enabled), so
/// round-tripping through [`serde_json::to_value`] already sorts keys.
fn pretty_json_bytes<T: Serialize>(value: &T) -> Result<Vec<u8>, ProofPackError> {
    let as_value =
        serde_json::to_value(value).map_err(|err| HashError::Canonicalization(err.to_string()))?;
    serde_json::to_vec_pretty(&as_value)
        .map_err(|err| ProofPackError::Hash(HashError::Canonicalization(err.to_string())))
}

/// Hashes `bytes` with the default algorithm, returning the hex digest.
fn sha256_hex(bytes: &[u8]) -> String {
    hash_bytes(HashAlgorithm::Sha256, bytes).value
}

/// One file's manifest/signature record.
#[derive(Serialize)]
struct FileRecord<'a> {
    path: &'a str,
    sha256: String,
    bytes: usize,
}

/// Builds `manifest.json`'s bytes.
fn build_manifest(
    proof: &ProofDocument,
    context: &ProofPackContext,
    file_entries: &BTreeMap<&'static str, Vec<u8>>,
    proof_json: &[u8],
) -> Result<Vec<u8>, ProofPackError> {
    let files: Vec<FileRecord<'_>> = file_entries
        .iter()
        .map(|(path, payload)| FileRecord { path, sha256: sha256_hex(payload), bytes: payload.len() })
        .collect();

    let proof_fingerprint = sha256_hex(proof_json);

    #[derive(Serialize)]
    struct Determinism {
        canonical_json: bool,
        sorted_zip_entries: bool,
        stable_newlines: &'static str,
    }

    #[derive(Serialize)]
    struct Manifest<'a> {
        pack_version: &'static str,
        created_at: &'a str,
        case_id: &'a str,
        run_id: &'a str,
        snapshot_id: &'a str,
        proof_type: &'static str,
        proof_fingerprint: String,
        files: Vec<FileRecord<'a>>,
        determinism: Determinism,
    }

    pretty_json_bytes(&Manifest {
        pack_version: "1.0",
        created_at: &proof.created_at,
        case_id: &context.case_id,
        run_id: &context.run_id,
        snapshot_id: &context.snapshot_id,
        proof_type: proof.proof_type.pack_label(),
        proof_fingerprint,
        files,
        determinism: Determinism {
            canonical_json: true,
            sorted_zip_entries: true,
            stable_newlines: "LF",
        },
    })
}

/// Builds `signature.json`'s bytes, covering the manifest plus every data
/// file.
fn build_signature(
    file_entries: &BTreeMap<&'static str, Vec<u8>>,
    manifest_bytes: &[u8],
) -> Result<Vec<u8>, ProofPackError> {
    let mut signature_entries: BTreeMap<&str, &[u8]> = BTreeMap::new();
    signature_entries.insert("proof_pack/manifest.json", manifest_bytes);
    for (path, payload) in file_entries {
        signature_entries.insert(path, payload);
    }

    let files: Vec<FileRecord<'_>> = signature_entries
        .iter()
        .map(|(path, payload)| FileRecord { path, sha256: sha256_hex(payload), bytes: payload.len() })
        .collect();

    let pack_fingerprint = pack_fingerprint(&files);

    #[derive(Serialize)]
    struct Signature<'a> {
        schema_version: &'static str,
        algorithm: &'static str,
        pack_fingerprint: String,
        files: Vec<FileRecord<'a>>,
    }

    pretty_json_bytes(&Signature {
        schema_version: "1.0",
        algorithm: "SHA-256",
        pack_fingerprint,
        files,
    })
}

/// Computes the pack fingerprint: SHA-256 of the concatenation of sorted
/// per-file hex hashes.
fn pack_fingerprint(files: &[FileRecord<'_>]) -> String {
    let concatenated: String = files.iter().map(|file| file.sha256.as_str()).collect();
    sha256_hex(concatenated.as_bytes())
}

/// Assembles the final ZIP archive from every entry, in sorted path order.
fn build_zip(
    file_entries: &BTreeMap<&'static str, Vec<u8>>,
    manifest_bytes: &[u8],
    signature_bytes: &[u8],
) -> Result<Vec<u8>, ProofPackError> {
    let mut entries: BTreeMap<&str, &[u8]> = BTreeMap::new();
    entries.insert("assets/", &[]);
    entries.insert("proof_pack/", &[]);
    entries.insert("proof_pack/manifest.json", manifest_bytes);
    entries.insert("proof_pack/signature.json", signature_bytes);
    for (path, payload) in file_entries {
        entries.insert(path, payload);
    }

    let (year, month, day, hour, minute, second) = FIXED_ZIP_TIMESTAMP;
    let timestamp = ZipDateTime::from_date_and_time(year, month, day, hour, minute, second)
        .map_err(|_| ProofPackError::Zip(zip::result::ZipError::InvalidArchive("fixed timestamp out of range")))?;

    let mut buffer = Cursor::new(Vec::new());
    {
        let mut writer = ZipWriter::new(&mut buffer);
        for (path, payload) in entries {
            let is_dir = path.ends_with('/');
            let options = SimpleFileOptions::default()
                .compression_method(CompressionMethod::Deflated)
                .compression_level(Some(9))
                .unix_permissions(if is_dir { DIR_MODE } else { FILE_MODE })
                .last_modified_time(timestamp);
            if is_dir {
                writer.add_directory(path, options)?;
            } else {
                writer.start_file(path, options)?;
                writer.write_all(payload)?;
            }
        }
        writer.finish()?;
    }
    Ok(buffer.into_inner())
}

// ============================================================================
// SECTION: DOCX Export Determinism
// ============================================================================

/// Path of the core-properties entry inside a DOCX archive that carries the
/// creation/modification metadata.
const DOCX_CORE_PROPERTIES_PATH: &str = "docProps/core.xml";
/// Fixed ISO-8601 timestamp `dcterms:created`/`dcterms:modified` are
/// rewritten to.
const DOCX_FIXED_XML_TIMESTAMP: &str = "2000-01-01T00:00:00Z";
/// Fixed value `cp:revision` is rewritten to.
const DOCX_FIXED_REVISION: &str = "1";

/// Errors raised while normalizing a DOCX archive for byte determinism.
#[derive(Debug, Error)]
pub enum DocxError {
    /// The archive could not be read or rewritten as a ZIP.
    #[error("failed to process docx archive: {0}")]
    Zip(#[from] zip::result::ZipError),
    /// An archive entry could not be read or written.
    #[error("failed to read or write docx entry: {0}")]
    Io(#[from] std::io::Error),
    /// `docProps/core.xml` could not be parsed or rewritten.
    #[error("failed to normalize docProps/core.xml: {0}")]
    Xml(String),
}

/// Normalizes a DOCX (ZIP) archive's bytes for binary determinism.
///
/// Every entry is rewritten with the same fixed timestamp a Proof Pack uses
/// ([`FIXED_ZIP_TIMESTAMP`]) and entries are written back in sorted path
/// order, regardless of the order the input archive listed them in. If
/// [`DOCX_CORE_PROPERTIES_PATH`] is present, its `dcterms:created`,
/// `dcterms:modified`, and `cp:revision` text content is rewritten to fixed
/// values; every other entry's bytes, including every other element of
/// `docProps/core.xml`, passes through unchanged. This function does not
/// render or generate DOCX content — it normalizes an archive already
/// produced elsewhere.
///
/// # Errors
///
/// Returns [`DocxError`] if `docx_bytes` is not a valid ZIP archive, if an
/// entry cannot be read or re-written, or if `docProps/core.xml` is present
/// but is not well-formed XML.
pub fn normalize_docx_bytes(docx_bytes: &[u8]) -> Result<Vec<u8>, DocxError> {
    let mut archive = ZipArchive::new(Cursor::new(docx_bytes))?;
    let mut entries: BTreeMap<String, (Vec<u8>, Option<u32>)> = BTreeMap::new();

    for index in 0..archive.len() {
        let mut entry = archive.by_index(index)?;
        let mut content = Vec::with_capacity(usize::try_from(entry.size()).unwrap_or(0));
        std::io::Read::read_to_end(&mut entry, &mut content)?;
        entries.insert(entry.name().to_string(), (content, entry.unix_mode()));
    }

    if let Some((core_xml, _)) = entries.get(DOCX_CORE_PROPERTIES_PATH) {
        let normalized = normalize_core_properties_xml(core_xml)?;
        if let Some(slot) = entries.get_mut(DOCX_CORE_PROPERTIES_PATH) {
            slot.0 = normalized;
        }
    }

    let (year, month, day, hour, minute, second) = FIXED_ZIP_TIMESTAMP;
    let timestamp = ZipDateTime::from_date_and_time(year, month, day, hour, minute, second)
        .map_err(|_| DocxError::Zip(zip::result::ZipError::InvalidArchive("fixed timestamp out of range")))?;

    let mut buffer = Cursor::new(Vec::new());
    {
        let mut writer = ZipWriter::new(&mut buffer);
        for (path, (content, unix_mode)) in &entries {
            let mut options = SimpleFileOptions::default()
                .compression_method(CompressionMethod::Deflated)
                .compression_level(Some(9))
                .last_modified_time(timestamp);
            if let Some(mode) = unix_mode {
                options = options.unix_permissions(*mode);
            }
            writer.start_file(path, options)?;
            writer.write_all(content)?;
        }
        writer.finish()?;
    }
    Ok(buffer.into_inner())
}

/// Rewrites `dcterms:created`, `dcterms:modified`, and `cp:revision` text
/// content in a `docProps/core.xml` document to fixed values, leaving every
/// other element untouched.
fn normalize_core_properties_xml(xml_bytes: &[u8]) -> Result<Vec<u8>, DocxError> {
    let mut reader = Reader::from_reader(xml_bytes);
    let mut writer = Writer::new(Cursor::new(Vec::new()));

    let mut pending_fixed_text: Option<&'static str> = None;
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_event_into(&mut buf).map_err(|err| DocxError::Xml(err.to_string()))? {
            Event::Eof => break,
            Event::Start(start) => {
                pending_fixed_text = fixed_value_for(start.name().as_ref());
                writer.write_event(Event::Start(start)).map_err(|err| DocxError::Xml(err.to_string()))?;
            }
            Event::Text(_) if pending_fixed_text.is_some() => {
                let value = pending_fixed_text.take().unwrap_or_default();
                writer
                    .write_event(Event::Text(BytesText::new(value)))
                    .map_err(|err| DocxError::Xml(err.to_string()))?;
            }
            other => {
                pending_fixed_text = None;
                writer.write_event(other).map_err(|err| DocxError::Xml(err.to_string()))?;
            }
        }
    }

    Ok(writer.into_inner().into_inner())
}

/// Fixed text content for a `docProps/core.xml` element name, or `None` if
/// the element's content must pass through unchanged.
fn fixed_value_for(qualified_name: &[u8]) -> Option<&'static str> {
    match qualified_name {
        b"dcterms:created" | b"dcterms:modified" => Some(DOCX_FIXED_XML_TIMESTAMP),
        b"cp:revision" => Some(DOCX_FIXED_REVISION),
        _ => None,
    }
}
