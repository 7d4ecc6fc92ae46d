// dnsc-core/src/core/snapshot.rs
// ============================================================================
// Module: Snapshot Data Model
// Description: The immutable, content-addressed network image.
// Purpose: Hold a validated, fingerprintable image of nodes, branches,
// switches, sources, loads, and topological containers.
// Dependencies: crate::core::{entities, hashing, identifiers}
// ============================================================================

//! ## Overview
//! A [`Snapshot`] is built once, fully validated, and never mutated again.
//! Every entity vector is kept sorted by id at construction time so that no
//! downstream reader needs to re-sort, and so [`Snapshot::fingerprint`] is
//! insensitive to the order entities were supplied in.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::core::entities::Bay;
use crate::core::entities::Branch;
use crate::core::entities::BranchElectricalModel;
use crate::core::entities::ConnectionVariant;
use crate::core::entities::Corridor;
use crate::core::entities::GeneratorType;
use crate::core::entities::Junction;
use crate::core::entities::Load;
use crate::core::entities::Measurement;
use crate::core::entities::Node;
use crate::core::entities::ProtectionAssignment;
use crate::core::entities::Source;
use crate::core::entities::Substation;
use crate::core::entities::Switch;
use crate::core::hashing::content_hash;
use crate::core::hashing::HashDigest;
use crate::core::hashing::HashError;
use crate::core::identifiers::SnapshotId;

/// Current structural payload schema version.
pub const SCHEMA_VERSION: &str = "1";

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised constructing or interacting with a [`Snapshot`].
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// Two entities of the same category share an id.
    #[error("duplicate {category} id: {id}")]
    DuplicateId {
        /// Entity category, e.g. `"node"`.
        category: &'static str,
        /// The duplicated id.
        id: String,
    },
    /// A branch or switch endpoint does not reference an existing node.
    #[error("{entity} '{id}' references unknown node '{node_id}'")]
    DanglingNodeRef {
        /// Referencing entity category.
        entity: &'static str,
        /// Referencing entity id.
        id: String,
        /// Missing node id.
        node_id: String,
    },
    /// A bay references an unknown substation or bus.
    #[error("bay '{id}' references unknown {what} '{reference}'")]
    DanglingBayRef {
        /// Bay id.
        id: String,
        /// What kind of reference is dangling (`"substation"` or `"bus"`).
        what: &'static str,
        /// Missing reference.
        reference: String,
    },
    /// A substation references an unknown bus, bay, or transformer.
    #[error("substation '{id}' references unknown {what} '{reference}'")]
    DanglingSubstationRef {
        /// Substation id.
        id: String,
        /// What kind of reference is dangling.
        what: &'static str,
        /// Missing reference.
        reference: String,
    },
    /// A node has a non-positive nominal voltage.
    #[error("node '{id}' has non-positive nominal voltage: {voltage_kv}")]
    NonPositiveVoltage {
        /// Node id.
        id: String,
        /// The offending voltage value.
        voltage_kv: f64,
    },
    /// A branch connects a node to itself without being explicitly allowed to.
    #[error("branch '{id}' has identical from/to endpoints '{node_id}'")]
    SelfLoopBranch {
        /// Branch id.
        id: String,
        /// The shared endpoint.
        node_id: String,
    },
    /// A generator's connection-variant declaration is missing or invalid.
    #[error("source '{id}' is a {generator_type} generator with invalid connection variant: {reason}")]
    InvalidGeneratorConnection {
        /// Source id.
        id: String,
        /// Generator technology, lower-snake-case.
        generator_type: &'static str,
        /// Human-readable reason.
        reason: String,
    },
    /// Canonical encoding of the structural payload failed.
    #[error("failed to compute snapshot fingerprint: {0}")]
    Fingerprint(#[from] HashError),
    /// An operation attempted to mutate a snapshot inside a read-only guard.
    #[error("attempted mutation inside a read-only guard")]
    ReadOnlyViolation,
}

// ============================================================================
// SECTION: Snapshot
// ============================================================================

/// The immutable, content-addressed network image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// This snapshot's own id.
    pub snapshot_id: SnapshotId,
    /// Parent snapshot id, or `None` for a genesis/import snapshot.
    pub parent_snapshot_id: Option<SnapshotId>,
    /// Wall-clock creation time, informational only. Never included in the
    /// fingerprint.
    pub created_at: String,
    /// Identifier of the network model this snapshot belongs to.
    pub network_model_id: String,
    /// Structural payload schema version.
    pub schema_version: String,
    nodes: Vec<Node>,
    branches: Vec<Branch>,
    switches: Vec<Switch>,
    sources: Vec<Source>,
    loads: Vec<Load>,
    substations: Vec<Substation>,
    bays: Vec<Bay>,
    junctions: Vec<Junction>,
    corridors: Vec<Corridor>,
    measurements: Vec<Measurement>,
    protection_assignments: Vec<ProtectionAssignment>,
}

/// The subset of a [`Snapshot`] that feeds its fingerprint: every entity
/// vector, excluding snapshot id, parent id, and creation time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructuralPayload<'a> {
    /// Structural payload schema version.
    pub schema_version: &'a str,
    /// Nodes, sorted by id.
    pub nodes: &'a [Node],
    /// Branches, sorted by id.
    pub branches: &'a [Branch],
    /// Switches, sorted by id.
    pub switches: &'a [Switch],
    /// Sources, sorted by id.
    pub sources: &'a [Source],
    /// Loads, sorted by id.
    pub loads: &'a [Load],
    /// Substations, sorted by id.
    pub substations: &'a [Substation],
    /// Bays, sorted by id.
    pub bays: &'a [Bay],
    /// Junctions, sorted by id.
    pub junctions: &'a [Junction],
    /// Corridors, sorted by id.
    pub corridors: &'a [Corridor],
    /// Measurements, sorted by id.
    pub measurements: &'a [Measurement],
    /// Protection assignments, sorted by id.
    pub protection_assignments: &'a [ProtectionAssignment],
}

/// Fully-built, not-yet-validated entity sets handed to [`Snapshot::new`].
///
/// Plain data, not a builder: callers assemble a `SnapshotEntities` however
/// they like and `Snapshot::new` owns the single validation pass.
#[derive(Debug, Clone, Default)]
pub struct SnapshotEntities {
    /// Nodes, any order.
    pub nodes: Vec<Node>,
    /// Branches, any order.
    pub branches: Vec<Branch>,
    /// Switches, any order.
    pub switches: Vec<Switch>,
    /// Sources, any order.
    pub sources: Vec<Source>,
    /// Loads, any order.
    pub loads: Vec<Load>,
    /// Substations, any order.
    pub substations: Vec<Substation>,
    /// Bays, any order.
    pub bays: Vec<Bay>,
    /// Junctions, any order.
    pub junctions: Vec<Junction>,
    /// Corridors, any order.
    pub corridors: Vec<Corridor>,
    /// Measurements, any order.
    pub measurements: Vec<Measurement>,
    /// Protection assignments, any order.
    pub protection_assignments: Vec<ProtectionAssignment>,
}

impl Snapshot {
    /// Constructs a new snapshot, validating every §3.3 invariant.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError`] on the first invariant violation found;
    /// callers should not assume any particular rule fires before another.
    pub fn new(
        snapshot_id: SnapshotId,
        parent_snapshot_id: Option<SnapshotId>,
        created_at: impl Into<String>,
        network_model_id: impl Into<String>,
        mut entities: SnapshotEntities,
    ) -> Result<Self, SnapshotError> {
        entities.nodes.sort_by(|a, b| a.id.cmp(&b.id));
        entities.branches.sort_by(|a, b| a.id.cmp(&b.id));
        entities.switches.sort_by(|a, b| a.id.cmp(&b.id));
        entities.sources.sort_by(|a, b| a.id.cmp(&b.id));
        entities.loads.sort_by(|a, b| a.id.cmp(&b.id));
        entities.substations.sort_by(|a, b| a.id.cmp(&b.id));
        entities.bays.sort_by(|a, b| a.id.cmp(&b.id));
        entities.junctions.sort_by(|a, b| a.id.cmp(&b.id));
        entities.corridors.sort_by(|a, b| a.id.cmp(&b.id));
        entities.measurements.sort_by(|a, b| a.id.cmp(&b.id));
        entities.protection_assignments.sort_by(|a, b| a.id.cmp(&b.id));

        ensure_unique_ids("node", entities.nodes.iter().map(|n| n.id.as_str()))?;
        ensure_unique_ids("branch", entities.branches.iter().map(|b| b.id.as_str()))?;
        ensure_unique_ids("switch", entities.switches.iter().map(|s| s.id.as_str()))?;
        ensure_unique_ids("source", entities.sources.iter().map(|s| s.id.as_str()))?;
        ensure_unique_ids("load", entities.loads.iter().map(|l| l.id.as_str()))?;
        ensure_unique_ids("substation", entities.substations.iter().map(|s| s.id.as_str()))?;
        ensure_unique_ids("bay", entities.bays.iter().map(|b| b.id.as_str()))?;

        let node_ids: BTreeSet<&str> = entities.nodes.iter().map(|n| n.id.as_str()).collect();

        ensure_positive_voltage(&entities.nodes)?;
        ensure_branch_endpoints(&entities.branches, &node_ids)?;
        ensure_switch_endpoints(&entities.switches, &node_ids)?;
        ensure_source_nodes(&entities.sources, &node_ids)?;
        ensure_load_nodes(&entities.loads, &node_ids)?;
        ensure_generator_connection_variants(&entities.sources)?;

        let substation_ids: BTreeSet<&str> =
            entities.substations.iter().map(|s| s.id.as_str()).collect();
        let bay_ids: BTreeSet<&str> = entities.bays.iter().map(|b| b.id.as_str()).collect();
        let branch_ids: BTreeSet<&str> = entities.branches.iter().map(|b| b.id.as_str()).collect();

        ensure_bay_refs(&entities.bays, &substation_ids, &node_ids)?;
        ensure_substation_refs(&entities.substations, &node_ids, &bay_ids, &branch_ids)?;

        Ok(Self {
            snapshot_id,
            parent_snapshot_id,
            created_at: created_at.into(),
            network_model_id: network_model_id.into(),
            schema_version: SCHEMA_VERSION.to_string(),
            nodes: entities.nodes,
            branches: entities.branches,
            switches: entities.switches,
            sources: entities.sources,
            loads: entities.loads,
            substations: entities.substations,
            bays: entities.bays,
            junctions: entities.junctions,
            corridors: entities.corridors,
            measurements: entities.measurements,
            protection_assignments: entities.protection_assignments,
        })
    }

    /// Nodes, sorted by id.
    #[must_use]
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Branches, sorted by id.
    #[must_use]
    pub fn branches(&self) -> &[Branch] {
        &self.branches
    }

    /// Switches, sorted by id.
    #[must_use]
    pub fn switches(&self) -> &[Switch] {
        &self.switches
    }

    /// Sources, sorted by id.
    #[must_use]
    pub fn sources(&self) -> &[Source] {
        &self.sources
    }

    /// Loads, sorted by id.
    #[must_use]
    pub fn loads(&self) -> &[Load] {
        &self.loads
    }

    /// Substations, sorted by id.
    #[must_use]
    pub fn substations(&self) -> &[Substation] {
        &self.substations
    }

    /// Bays, sorted by id.
    #[must_use]
    pub fn bays(&self) -> &[Bay] {
        &self.bays
    }

    /// Junctions, sorted by id.
    #[must_use]
    pub fn junctions(&self) -> &[Junction] {
        &self.junctions
    }

    /// Corridors, sorted by id.
    #[must_use]
    pub fn corridors(&self) -> &[Corridor] {
        &self.corridors
    }

    /// Measurements, sorted by id.
    #[must_use]
    pub fn measurements(&self) -> &[Measurement] {
        &self.measurements
    }

    /// Protection assignments, sorted by id.
    #[must_use]
    pub fn protection_assignments(&self) -> &[ProtectionAssignment] {
        &self.protection_assignments
    }

    /// Returns the structural payload view used by [`Self::fingerprint`] and
    /// [`Self::to_canonical_dict`].
    #[must_use]
    pub fn structural_payload(&self) -> StructuralPayload<'_> {
        StructuralPayload {
            schema_version: &self.schema_version,
            nodes: &self.nodes,
            branches: &self.branches,
            switches: &self.switches,
            sources: &self.sources,
            loads: &self.loads,
            substations: &self.substations,
            bays: &self.bays,
            junctions: &self.junctions,
            corridors: &self.corridors,
            measurements: &self.measurements,
            protection_assignments: &self.protection_assignments,
        }
    }

    /// Computes the structural fingerprint: SHA-256 over the canonical JSON
    /// of [`Self::structural_payload`]. Independent of snapshot id, parent
    /// id, and creation time.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError::Fingerprint`] if canonicalization fails,
    /// which should never happen for a validly constructed snapshot.
    pub fn fingerprint(&self) -> Result<HashDigest, SnapshotError> {
        Ok(content_hash(&self.structural_payload())?)
    }

    /// Mirrors the structural payload in a form suitable for persistence.
    #[must_use]
    pub fn to_canonical_dict(&self) -> StructuralPayload<'_> {
        self.structural_payload()
    }

    /// Runs `body` under a read-only guard. The guard itself carries no
    /// interior mutability to violate; this exists so interpretation
    /// pipelines (validation, readiness, diff) have an explicit assertion
    /// point that they touch nothing but shared references.
    pub fn read_only_guard<T>(&self, body: impl FnOnce(&Snapshot) -> T) -> T {
        body(self)
    }
}

// ============================================================================
// SECTION: Validation Helpers
// ============================================================================

/// Rejects duplicate ids within one entity category.
fn ensure_unique_ids<'a>(
    category: &'static str,
    ids: impl Iterator<Item = &'a str>,
) -> Result<(), SnapshotError> {
    let mut seen = BTreeSet::new();
    for id in ids {
        if !seen.insert(id) {
            return Err(SnapshotError::DuplicateId {
                category,
                id: id.to_string(),
            });
        }
    }
    Ok(())
}

/// Enforces invariant 6 precursor: every node voltage level is positive.
fn ensure_positive_voltage(nodes: &[Node]) -> Result<(), SnapshotError> {
    for node in nodes {
        if node.nominal_voltage_kv <= 0.0 {
            return Err(SnapshotError::NonPositiveVoltage {
                id: node.id.to_string(),
                voltage_kv: node.nominal_voltage_kv,
            });
        }
    }
    Ok(())
}

/// Enforces invariant 1 and rejects accidental self-loop branches.
fn ensure_branch_endpoints(
    branches: &[Branch],
    node_ids: &BTreeSet<&str>,
) -> Result<(), SnapshotError> {
    for branch in branches {
        if !node_ids.contains(branch.from_node.as_str()) {
            return Err(SnapshotError::DanglingNodeRef {
                entity: "branch",
                id: branch.id.to_string(),
                node_id: branch.from_node.to_string(),
            });
        }
        if !node_ids.contains(branch.to_node.as_str()) {
            return Err(SnapshotError::DanglingNodeRef {
                entity: "branch",
                id: branch.id.to_string(),
                node_id: branch.to_node.to_string(),
            });
        }
        if branch.from_node == branch.to_node && !matches!(branch.electrical, BranchElectricalModel::Switch) {
            return Err(SnapshotError::SelfLoopBranch {
                id: branch.id.to_string(),
                node_id: branch.from_node.to_string(),
            });
        }
    }
    Ok(())
}

/// Enforces invariant 1 for standalone switching devices.
fn ensure_switch_endpoints(
    switches: &[Switch],
    node_ids: &BTreeSet<&str>,
) -> Result<(), SnapshotError> {
    for switch in switches {
        if !node_ids.contains(switch.from_node.as_str()) {
            return Err(SnapshotError::DanglingNodeRef {
                entity: "switch",
                id: switch.id.to_string(),
                node_id: switch.from_node.to_string(),
            });
        }
        if !node_ids.contains(switch.to_node.as_str()) {
            return Err(SnapshotError::DanglingNodeRef {
                entity: "switch",
                id: switch.id.to_string(),
                node_id: switch.to_node.to_string(),
            });
        }
    }
    Ok(())
}

/// Enforces invariant 2 for sources.
fn ensure_source_nodes(sources: &[Source], node_ids: &BTreeSet<&str>) -> Result<(), SnapshotError> {
    for source in sources {
        if !node_ids.contains(source.node.as_str()) {
            return Err(SnapshotError::DanglingNodeRef {
                entity: "source",
                id: source.id.to_string(),
                node_id: source.node.to_string(),
            });
        }
    }
    Ok(())
}

/// Enforces invariant 2 for loads.
fn ensure_load_nodes(loads: &[Load], node_ids: &BTreeSet<&str>) -> Result<(), SnapshotError> {
    for load in loads {
        if !node_ids.contains(load.node.as_str()) {
            return Err(SnapshotError::DanglingNodeRef {
                entity: "load",
                id: load.id.to_string(),
                node_id: load.node.to_string(),
            });
        }
    }
    Ok(())
}

/// Enforces invariant 5: generator connection-variant rules.
fn ensure_generator_connection_variants(sources: &[Source]) -> Result<(), SnapshotError> {
    for source in sources {
        let Some(generator) = &source.generator else {
            continue;
        };
        if generator.type_ref.is_none() {
            return Err(SnapshotError::InvalidGeneratorConnection {
                id: source.id.to_string(),
                generator_type: generator_type_label(generator.generator_type),
                reason: "generator has no catalog reference".to_string(),
            });
        }
        if generator.generator_type == GeneratorType::Synchronous {
            continue;
        }
        match generator.connection_variant {
            None => {
                return Err(SnapshotError::InvalidGeneratorConnection {
                    id: source.id.to_string(),
                    generator_type: generator_type_label(generator.generator_type),
                    reason: "connection_variant is required for this generator type".to_string(),
                });
            }
            Some(ConnectionVariant::NnSide) => {
                if generator.nn_side_substation.is_none() {
                    return Err(SnapshotError::InvalidGeneratorConnection {
                        id: source.id.to_string(),
                        generator_type: generator_type_label(generator.generator_type),
                        reason: "nn_side connection requires a substation reference".to_string(),
                    });
                }
            }
            Some(ConnectionVariant::BlockTransformer) => {
                if generator.block_transformer.is_none() {
                    return Err(SnapshotError::InvalidGeneratorConnection {
                        id: source.id.to_string(),
                        generator_type: generator_type_label(generator.generator_type),
                        reason: "block_transformer connection requires a transformer reference"
                            .to_string(),
                    });
                }
            }
        }
    }
    Ok(())
}

/// Returns the lower-snake-case label used in diagnostics.
fn generator_type_label(generator_type: GeneratorType) -> &'static str {
    match generator_type {
        GeneratorType::Pv => "pv",
        GeneratorType::WindInverter => "wind_inverter",
        GeneratorType::Bess => "bess",
        GeneratorType::Synchronous => "synchronous",
    }
}

/// Enforces invariant 3 for bays.
fn ensure_bay_refs(
    bays: &[Bay],
    substation_ids: &BTreeSet<&str>,
    node_ids: &BTreeSet<&str>,
) -> Result<(), SnapshotError> {
    for bay in bays {
        if !substation_ids.contains(bay.substation.as_str()) {
            return Err(SnapshotError::DanglingBayRef {
                id: bay.id.to_string(),
                what: "substation",
                reference: bay.substation.to_string(),
            });
        }
        if !node_ids.contains(bay.bus_ref.as_str()) {
            return Err(SnapshotError::DanglingBayRef {
                id: bay.id.to_string(),
                what: "bus",
                reference: bay.bus_ref.to_string(),
            });
        }
    }
    Ok(())
}

/// Enforces invariant 3 for substations.
fn ensure_substation_refs(
    substations: &[Substation],
    node_ids: &BTreeSet<&str>,
    bay_ids: &BTreeSet<&str>,
    branch_ids: &BTreeSet<&str>,
) -> Result<(), SnapshotError> {
    for substation in substations {
        for bus_ref in &substation.bus_refs {
            if !node_ids.contains(bus_ref.as_str()) {
                return Err(SnapshotError::DanglingSubstationRef {
                    id: substation.id.to_string(),
                    what: "bus",
                    reference: bus_ref.to_string(),
                });
            }
        }
        for bay_ref in &substation.bay_refs {
            if !bay_ids.contains(bay_ref.as_str()) {
                return Err(SnapshotError::DanglingSubstationRef {
                    id: substation.id.to_string(),
                    what: "bay",
                    reference: bay_ref.to_string(),
                });
            }
        }
        for transformer_ref in &substation.transformer_refs {
            if !branch_ids.contains(transformer_ref.as_str()) {
                return Err(SnapshotError::DanglingSubstationRef {
                    id: substation.id.to_string(),
                    what: "transformer",
                    reference: transformer_ref.to_string(),
                });
            }
        }
    }
    Ok(())
}
