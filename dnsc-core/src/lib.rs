// dnsc-core/src/lib.rs
// ============================================================================
// Module: Deterministic Network Snapshot Core Library
// Description: Public API surface for the DNSC.
// Purpose: Expose canonical encoding, catalog, snapshot, action, validation,
// readiness, diff, proof, drift, and solver-envelope components.
// Dependencies: crate::core
// ============================================================================

//! ## Overview
//! The Deterministic Network Snapshot Core (DNSC) provides an immutable,
//! content-addressed medium-voltage network model, a canonical event-sourced
//! mutation protocol, and a deterministic interpretation pipeline (validation,
//! readiness, diff, drift, solver envelopes) together with a frozen-after-
//! introduction result/proof artifact contract.
//!
//! The DNSC is neither a solver nor a workflow engine: it never schedules
//! work, never opens sockets, and never embeds wall-clock time into anything
//! it signs.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod core;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use core::action::ActionEnvelope;
pub use core::action::ActionError;
pub use core::action::ActionPayload;
pub use core::action::ActionResult;
pub use core::action::Applier;
pub use core::action::DomainEvent;
pub use core::binding::CatalogBinding;
pub use core::binding::FieldProvenance;
pub use core::binding::SourceKind;
pub use core::catalog::CatalogError;
pub use core::catalog::CatalogItem;
pub use core::catalog::CatalogRegistry;
pub use core::catalog::MaterializationContract;
pub use core::catalog::Namespace;
pub use core::diff::DiffEngine;
pub use core::diff::DiffReport;
pub use core::drift::DriftDetector;
pub use core::drift::DriftReport;
pub use core::drift::DriftSeverity;
pub use core::entities::Branch;
pub use core::entities::Load;
pub use core::entities::Node;
pub use core::entities::Source;
pub use core::entities::Substation;
pub use core::entities::Switch;
pub use core::envelope::SolverInputEnvelope;
pub use core::hashing::HashAlgorithm;
pub use core::hashing::HashDigest;
pub use core::hashing::HashError;
pub use core::identifiers::ElementRef;
pub use core::proof::ProofDocument;
pub use core::proof::ResultSet;
pub use core::readiness::EligibilityMap;
pub use core::readiness::ReadinessReport;
pub use core::snapshot::Snapshot;
pub use core::snapshot::SnapshotError;
pub use core::validation::ValidationEngine;
pub use core::validation::ValidationReport;
