// dnsc-core/src/core/identifiers.rs
// ============================================================================
// Module: Snapshot Identifiers
// Description: Opaque string identifiers for every addressable snapshot entity.
// Purpose: Provide strongly typed, serializable, orderable IDs with stable
// string forms, and a sum type referencing any entity uniformly.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Identifiers are opaque strings. Construction never validates format or
//! uniqueness — that is a snapshot-level invariant enforced in
//! [`crate::core::snapshot`], not a property of the identifier type itself.
//! All identifier types order lexicographically by their inner string, which
//! is what gives the action protocol's "lexicographic id order" insertion
//! rule a precise meaning.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Identifier Generator
// ============================================================================

/// Declares an opaque, lexicographically ordered, string-backed identifier
/// type with `new`, `as_str`, `Display`, and `From<&str>`/`From<String>`.
macro_rules! opaque_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Creates a new identifier from any string-like value.
            #[must_use]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Returns the identifier as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self::new(value)
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self::new(value)
            }
        }
    };
}

opaque_id!(
    /// Identifier for an immutable network snapshot.
    SnapshotId
);

opaque_id!(
    /// Identifier for an applied action, scoped to the snapshot it produced.
    ActionId
);

opaque_id!(
    /// Identifier for a bus/node.
    NodeId
);

opaque_id!(
    /// Identifier for a branch (line, cable, or transformer).
    BranchId
);

opaque_id!(
    /// Identifier for a switching device.
    SwitchId
);

opaque_id!(
    /// Identifier for a source (grid connection or generator).
    SourceId
);

opaque_id!(
    /// Identifier for a load.
    LoadId
);

opaque_id!(
    /// Identifier for a substation.
    SubstationId
);

opaque_id!(
    /// Identifier for a bay within a substation.
    BayId
);

opaque_id!(
    /// Identifier for a junction point in the corridor topology.
    JunctionId
);

opaque_id!(
    /// Identifier for a cable/line corridor.
    CorridorId
);

opaque_id!(
    /// Identifier for a measurement point.
    MeasurementId
);

opaque_id!(
    /// Identifier for a protection device assignment.
    ProtectionAssignmentId
);

opaque_id!(
    /// Identifier for a catalog item (a type definition, not an instance).
    CatalogItemId
);

opaque_id!(
    /// Identifier for a catalog namespace (a manufacturer or standard body).
    NamespaceId
);

// ============================================================================
// SECTION: Element Reference
// ============================================================================

/// Uniform reference to any entity addressable within a snapshot.
///
/// Diagnostics, diffs, and drift reports key their findings on `ElementRef`
/// rather than on a specific per-kind id type, so that a single report can
/// mix findings across entity kinds and still sort deterministically.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum ElementRef {
    /// References a [`NodeId`].
    Node(NodeId),
    /// References a [`BranchId`].
    Branch(BranchId),
    /// References a [`SwitchId`].
    Switch(SwitchId),
    /// References a [`SourceId`].
    Source(SourceId),
    /// References a [`LoadId`].
    Load(LoadId),
    /// References a [`SubstationId`].
    Substation(SubstationId),
    /// References a [`BayId`].
    Bay(BayId),
    /// References a [`JunctionId`].
    Junction(JunctionId),
    /// References a [`CorridorId`].
    Corridor(CorridorId),
    /// References a [`MeasurementId`].
    Measurement(MeasurementId),
    /// References a [`ProtectionAssignmentId`].
    ProtectionAssignment(ProtectionAssignmentId),
}

impl ElementRef {
    /// Returns the short kind tag used in sorted diagnostic output
    /// (`"node"`, `"branch"`, ...).
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Node(_) => "node",
            Self::Branch(_) => "branch",
            Self::Switch(_) => "switch",
            Self::Source(_) => "source",
            Self::Load(_) => "load",
            Self::Substation(_) => "substation",
            Self::Bay(_) => "bay",
            Self::Junction(_) => "junction",
            Self::Corridor(_) => "corridor",
            Self::Measurement(_) => "measurement",
            Self::ProtectionAssignment(_) => "protection_assignment",
        }
    }

    /// Returns the inner identifier's string form, regardless of kind.
    #[must_use]
    pub fn id_str(&self) -> &str {
        match self {
            Self::Node(id) => id.as_str(),
            Self::Branch(id) => id.as_str(),
            Self::Switch(id) => id.as_str(),
            Self::Source(id) => id.as_str(),
            Self::Load(id) => id.as_str(),
            Self::Substation(id) => id.as_str(),
            Self::Bay(id) => id.as_str(),
            Self::Junction(id) => id.as_str(),
            Self::Corridor(id) => id.as_str(),
            Self::Measurement(id) => id.as_str(),
            Self::ProtectionAssignment(id) => id.as_str(),
        }
    }
}

impl fmt::Display for ElementRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind(), self.id_str())
    }
}
