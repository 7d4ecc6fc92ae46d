// dnsc-core/src/core/action.rs
// ============================================================================
// Module: Action Protocol & Applier
// Description: The closed action tag enumeration and the validated,
// deterministic parent-to-child snapshot transition.
// Purpose: Apply a single typed mutation to a snapshot, producing either a
// rejected diagnostic list or a new child snapshot plus its audit trail.
// Dependencies: crate::core::{binding, catalog, entities, hashing, identifiers, snapshot}
// ============================================================================

//! ## Overview
//! The [`Applier`] is pure apart from reading the parent snapshot and the
//! catalog registry: it never retries, never reads a clock, and every
//! successful application is a brand-new [`Snapshot`] built from a full clone
//! of the parent's entity vectors. Structural sharing is left on the table
//! deliberately — determinism is cheaper to reason about than
//! persistent-data-structure sharing, and a full copy per transition is
//! acceptable given the single-threaded, per-request scheduling model.
//!
//! New elements are inserted in lexicographic order of their generated ids;
//! because [`Snapshot::new`] always sorts every entity vector by id, this
//! falls out of construction rather than needing its own sort pass, except
//! in the audit trail, whose event order is sorted explicitly.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::core::binding::CatalogBinding;
use crate::core::binding::FieldProvenance;
use crate::core::catalog::CatalogItemVersion;
use crate::core::catalog::CatalogRegistry;
use crate::core::catalog::Namespace;
use crate::core::hashing::content_hash;
use crate::core::entities::Branch;
use crate::core::entities::BranchElectricalModel;
use crate::core::entities::GeneratorProfile;
use crate::core::entities::Load;
use crate::core::entities::LoadModelKind;
use crate::core::entities::Node;
use crate::core::entities::NodeKind;
use crate::core::entities::Source;
use crate::core::entities::SourceModel;
use crate::core::entities::Substation;
use crate::core::entities::Switch;
use crate::core::entities::SwitchKind;
use crate::core::entities::SwitchState;
use crate::core::identifiers::ActionId;
use crate::core::identifiers::BranchId;
use crate::core::identifiers::CatalogItemId;
use crate::core::identifiers::CorridorId;
use crate::core::identifiers::ElementRef;
use crate::core::identifiers::LoadId;
use crate::core::identifiers::NodeId;
use crate::core::identifiers::SnapshotId;
use crate::core::identifiers::SourceId;
use crate::core::identifiers::SwitchId;
use crate::core::snapshot::Snapshot;
use crate::core::snapshot::SnapshotEntities;

// ============================================================================
// SECTION: Action Envelope
// ============================================================================

/// A single validated mutation request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionEnvelope {
    /// Unique id for this action; becomes the new snapshot's id on success.
    pub action_id: ActionId,
    /// Snapshot this action is applied against.
    pub parent_snapshot_id: SnapshotId,
    /// Wall-clock submission time, informational only.
    pub created_at: String,
    /// Optional actor identity, informational only.
    pub actor: Option<String>,
    /// The typed mutation itself.
    pub payload: ActionPayload,
}

impl ActionEnvelope {
    /// Parses an envelope from an untyped JSON value, surfacing an
    /// unrecognized `action_type` tag as [`ActionError::UnknownAction`]
    /// rather than a generic deserialization failure.
    ///
    /// # Errors
    ///
    /// Returns [`ActionError::UnknownAction`] if the payload's `action_type`
    /// is not a member of the canonical [`ActionPayload`] enumeration, or if
    /// the envelope is otherwise malformed.
    pub fn from_json(value: Value) -> Result<Self, ActionError> {
        serde_json::from_value(value).map_err(|err| ActionError::UnknownAction(err.to_string()))
    }
}

// ============================================================================
// SECTION: Action Payload
// ============================================================================

/// The closed set of mutations the Applier accepts. Every tag here is
/// canonical; there are no aliases in this enumeration, so "alias chains to
/// alias" cannot occur by construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action_type", rename_all = "snake_case")]
pub enum ActionPayload {
    /// Adds a node. Fails if `id` already exists.
    CreateNode {
        /// New node id.
        id: NodeId,
        /// Display label.
        display_name: String,
        /// Electrical role.
        kind: NodeKind,
        /// Nominal voltage, kV.
        nominal_voltage_kv: f64,
        /// Scheduled active power injection, MW.
        scheduled_active_power_mw: Option<f64>,
        /// Scheduled reactive power injection, Mvar.
        scheduled_reactive_power_mvar: Option<f64>,
        /// Initial voltage magnitude guess, per-unit.
        initial_voltage_magnitude_pu: Option<f64>,
        /// Initial voltage angle guess, degrees.
        initial_voltage_angle_deg: Option<f64>,
    },
    /// Adds a branch. Endpoints must already exist.
    CreateBranch {
        /// New branch id.
        id: BranchId,
        /// Display label.
        display_name: String,
        /// "from" endpoint.
        from_node: NodeId,
        /// "to" endpoint.
        to_node: NodeId,
        /// Electrical model.
        electrical: BranchElectricalModel,
    },
    /// Adds a standalone switching device. Endpoints must already exist.
    CreateSwitch {
        /// New switch id.
        id: SwitchId,
        /// "from" endpoint.
        from_node: NodeId,
        /// "to" endpoint.
        to_node: NodeId,
        /// Device kind.
        kind: SwitchKind,
        /// Initial state.
        state: SwitchState,
    },
    /// Adds a source. The bound node must already exist.
    CreateSource {
        /// New source id.
        id: SourceId,
        /// Node the source feeds.
        node: NodeId,
        /// Equivalent-circuit model.
        model: SourceModel,
        /// Generator metadata, if this source is a generator.
        generator: Option<GeneratorProfile>,
    },
    /// Adds a load. The bound node must already exist.
    CreateLoad {
        /// New load id.
        id: LoadId,
        /// Node the load draws from.
        node: NodeId,
        /// Active power, MW.
        p_mw: f64,
        /// Reactive power, Mvar.
        q_mvar: f64,
        /// Voltage-dependence model.
        model: LoadModelKind,
    },
    /// Toggles the `in_service` flag on a branch, switch, source, or load.
    SetInService {
        /// Entity whose flag is toggled.
        target: ElementRef,
        /// New value.
        in_service: bool,
    },
    /// Sets a standalone switch's open/closed state.
    SetSwitchState {
        /// Switch to modify.
        switch: SwitchId,
        /// New state.
        state: SwitchState,
    },
    /// Re-materializes an element's parameters from the catalog.
    AssignCatalogToElement {
        /// Element to bind.
        target: ElementRef,
        /// Namespace of the catalog item.
        namespace: Namespace,
        /// Catalog item id.
        catalog_item_id: CatalogItemId,
    },
    /// Adds a grid-tie source to an existing node.
    AddGridSourceSn {
        /// New source id.
        id: SourceId,
        /// Node the grid connects to.
        node: NodeId,
        /// Short-circuit power, MVA.
        sk_mva: f64,
        /// X/R ratio.
        rx_ratio: f64,
        /// Optional IEC 60909 voltage factor.
        voltage_factor: Option<f64>,
    },
    /// Extends a trunk corridor by one new node and one new line/cable
    /// segment from an existing node.
    ContinueTrunkSegmentSn {
        /// Existing node the segment extends from.
        from_node: NodeId,
        /// New node terminating the segment.
        new_node: Node,
        /// New branch id for the segment.
        segment_id: BranchId,
        /// Segment electrical model; `length_km` and endpoints are overwritten.
        segment: BranchElectricalModel,
        /// Corridor to append the new segment to, if any.
        corridor: Option<CorridorId>,
    },
    /// Connects two existing nodes with a new, initially open, ring-tie switch.
    ConnectSecondaryRingSn {
        /// New switch id.
        id: SwitchId,
        /// First endpoint.
        node_a: NodeId,
        /// Second endpoint.
        node_b: NodeId,
    },
    /// Marks an existing switch as the network's designated normal-open point.
    SetNormalOpenPoint {
        /// Switch to open.
        switch: SwitchId,
    },
    /// Splits an existing line/cable branch in two, inserting a new node
    /// (and optionally a substation) at the split point.
    InsertStationOnSegmentSn {
        /// Branch being split; must be a line-like branch.
        original_branch: BranchId,
        /// Node inserted at the split point.
        new_node: Node,
        /// First segment id (from the original `from_node` to `new_node`).
        segment_a_id: BranchId,
        /// First segment length, km.
        segment_a_length_km: f64,
        /// Second segment id (from `new_node` to the original `to_node`).
        segment_b_id: BranchId,
        /// Second segment length, km.
        segment_b_length_km: f64,
        /// Optional substation wrapping the inserted node.
        new_substation: Option<Substation>,
    },
}

// ============================================================================
// SECTION: Rejection Diagnostics
// ============================================================================

/// A single validation failure blocking an action's application.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RejectionDiagnostic {
    /// Stable machine-readable code.
    pub code: String,
    /// Human-readable message.
    pub message: String,
    /// Path to the offending field, JSON-pointer-like.
    pub path: String,
}

// ============================================================================
// SECTION: Domain Events (Audit Trail)
// ============================================================================

/// A single canonical audit-trail entry recorded when an action is accepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainEvent {
    /// Stable machine-readable event code, e.g. `"node.created"`.
    pub code: String,
    /// Event payload, canonical JSON value.
    pub payload: Value,
}

// ============================================================================
// SECTION: Action Result
// ============================================================================

/// Outcome of [`Applier::apply`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ActionResult {
    /// The action was applied; `new_snapshot.snapshot_id == action_id`.
    Accepted {
        /// The resulting child snapshot.
        new_snapshot: Snapshot,
        /// Ordered audit trail recorded for this application.
        audit_trail: Vec<DomainEvent>,
    },
    /// The action could not be applied to its parent.
    Rejected {
        /// Sorted list of validation failures.
        errors: Vec<RejectionDiagnostic>,
    },
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Fatal Applier-level errors. Neither variant should occur on well-formed
/// input; their appearance indicates a bug upstream of the Applier.
#[derive(Debug, Error)]
pub enum ActionError {
    /// The envelope's `action_type` is not a member of [`ActionPayload`], or
    /// the envelope is otherwise malformed JSON.
    #[error("unrecognized or malformed action: {0}")]
    UnknownAction(String),
    /// An invariant broke after what should have been a pure, validated
    /// transition.
    #[error("snapshot invariant violated after a pre-validated action: {0}")]
    CorruptedState(String),
}

// ============================================================================
// SECTION: Applier
// ============================================================================

/// Stateless applier: validates an [`ActionEnvelope`] against a parent
/// [`Snapshot`] and the current [`CatalogRegistry`], producing either a
/// rejection or a new child snapshot.
#[derive(Debug, Clone, Copy, Default)]
pub struct Applier;

impl Applier {
    /// Applies `envelope` to `parent`.
    ///
    /// # Errors
    ///
    /// Returns [`ActionError::CorruptedState`] if the parent's invariants
    /// cannot be re-established after a mutation that passed pre-validation;
    /// this should never happen for a validly constructed parent.
    pub fn apply(
        &self,
        parent: &Snapshot,
        catalog: &CatalogRegistry,
        envelope: &ActionEnvelope,
    ) -> Result<ActionResult, ActionError> {
        let mut errors = validate_payload(parent, catalog, &envelope.payload);
        if !errors.is_empty() {
            errors.sort();
            return Ok(ActionResult::Rejected { errors });
        }

        let mut entities = clone_entities(parent);
        let mut events = mutate_entities(&mut entities, catalog, &envelope.payload)?;

        let new_snapshot = Snapshot::new(
            envelope.action_id.clone().into_snapshot_id(),
            Some(parent.snapshot_id.clone()),
            envelope.created_at.clone(),
            parent.network_model_id.clone(),
            entities,
        )
        .map_err(|err| ActionError::CorruptedState(err.to_string()))?;

        events.sort_by(|a, b| a.code.cmp(&b.code).then_with(|| {
            a.payload.to_string().cmp(&b.payload.to_string())
        }));

        Ok(ActionResult::Accepted {
            new_snapshot,
            audit_trail: events,
        })
    }
}

trait IntoSnapshotId {
    fn into_snapshot_id(self) -> SnapshotId;
}

impl IntoSnapshotId for ActionId {
    fn into_snapshot_id(self) -> SnapshotId {
        SnapshotId::new(self.as_str().to_string())
    }
}

// ============================================================================
// SECTION: Entity Cloning
// ============================================================================

fn clone_entities(parent: &Snapshot) -> SnapshotEntities {
    SnapshotEntities {
        nodes: parent.nodes().to_vec(),
        branches: parent.branches().to_vec(),
        switches: parent.switches().to_vec(),
        sources: parent.sources().to_vec(),
        loads: parent.loads().to_vec(),
        substations: parent.substations().to_vec(),
        bays: parent.bays().to_vec(),
        junctions: parent.junctions().to_vec(),
        corridors: parent.corridors().to_vec(),
        measurements: parent.measurements().to_vec(),
        protection_assignments: parent.protection_assignments().to_vec(),
    }
}

// ============================================================================
// SECTION: Pre-Validation
// ============================================================================

/// Runs payload-specific validation against the parent. An empty result
/// means the mutation may proceed.
fn validate_payload(
    parent: &Snapshot,
    catalog: &CatalogRegistry,
    payload: &ActionPayload,
) -> Vec<RejectionDiagnostic> {
    let mut errors = Vec::new();
    let node_exists = |id: &NodeId| parent.nodes().iter().any(|n| &n.id == id);
    let branch_exists = |id: &BranchId| parent.branches().iter().any(|b| &b.id == id);
    let switch_exists = |id: &SwitchId| parent.switches().iter().any(|s| &s.id == id);

    let mut reject = |code: &str, message: String, path: &str| {
        errors.push(RejectionDiagnostic {
            code: code.to_string(),
            message,
            path: path.to_string(),
        });
    };

    match payload {
        ActionPayload::CreateNode { id, nominal_voltage_kv, .. } => {
            if node_exists(id) {
                reject("E-ACT-DUP-NODE", format!("node '{id}' already exists"), "id");
            }
            if *nominal_voltage_kv <= 0.0 {
                reject(
                    "E-ACT-VOLT",
                    format!("node '{id}' nominal voltage must be positive"),
                    "nominal_voltage_kv",
                );
            }
        }
        ActionPayload::CreateBranch { id, from_node, to_node, .. } => {
            if branch_exists(id) {
                reject("E-ACT-DUP-BRANCH", format!("branch '{id}' already exists"), "id");
            }
            if !node_exists(from_node) {
                reject(
                    "E-ACT-REF",
                    format!("branch '{id}' references unknown node '{from_node}'"),
                    "from_node",
                );
            }
            if !node_exists(to_node) {
                reject(
                    "E-ACT-REF",
                    format!("branch '{id}' references unknown node '{to_node}'"),
                    "to_node",
                );
            }
        }
        ActionPayload::CreateSwitch { id, from_node, to_node, .. } => {
            if switch_exists(id) {
                reject("E-ACT-DUP-SWITCH", format!("switch '{id}' already exists"), "id");
            }
            if !node_exists(from_node) {
                reject(
                    "E-ACT-REF",
                    format!("switch '{id}' references unknown node '{from_node}'"),
                    "from_node",
                );
            }
            if !node_exists(to_node) {
                reject(
                    "E-ACT-REF",
                    format!("switch '{id}' references unknown node '{to_node}'"),
                    "to_node",
                );
            }
        }
        ActionPayload::CreateSource { id, node, generator, .. } => {
            if parent.sources().iter().any(|s| &s.id == id) {
                reject("E-ACT-DUP-SOURCE", format!("source '{id}' already exists"), "id");
            }
            if !node_exists(node) {
                reject(
                    "E-ACT-REF",
                    format!("source '{id}' references unknown node '{node}'"),
                    "node",
                );
            }
            if let Some(generator) = generator {
                if generator.type_ref.is_none() {
                    reject(
                        "E-GEN-CATALOG",
                        format!("generator source '{id}' has no catalog reference"),
                        "generator.type_ref",
                    );
                }
            }
        }
        ActionPayload::CreateLoad { id, node, .. } => {
            if parent.loads().iter().any(|l| &l.id == id) {
                reject("E-ACT-DUP-LOAD", format!("load '{id}' already exists"), "id");
            }
            if !node_exists(node) {
                reject(
                    "E-ACT-REF",
                    format!("load '{id}' references unknown node '{node}'"),
                    "node",
                );
            }
        }
        ActionPayload::SetInService { target, .. } => {
            if !element_exists(parent, target) {
                reject(
                    "E-ACT-REF",
                    format!("target '{target}' does not exist"),
                    "target",
                );
            }
        }
        ActionPayload::SetSwitchState { switch, .. } => {
            if !switch_exists(switch) {
                reject(
                    "E-ACT-REF",
                    format!("switch '{switch}' does not exist"),
                    "switch",
                );
            }
        }
        ActionPayload::AssignCatalogToElement { target, namespace, catalog_item_id } => {
            if !element_exists(parent, target) {
                reject(
                    "E-ACT-REF",
                    format!("target '{target}' does not exist"),
                    "target",
                );
            }
            match catalog.get(*namespace, catalog_item_id) {
                Err(_) => reject(
                    "E-ACT-TYPE-NOT-FOUND",
                    format!("catalog item '{catalog_item_id}' not found in namespace '{namespace}'"),
                    "catalog_item_id",
                ),
                Ok(item) if content_hash(&item.parameters).is_err() => reject(
                    "E-ACT-NON-FINITE-PARAM",
                    format!(
                        "catalog item '{catalog_item_id}' in namespace '{namespace}' has a non-finite parameter value"
                    ),
                    "catalog_item_id",
                ),
                Ok(_) => {}
            }
        }
        ActionPayload::AddGridSourceSn { id, node, .. } => {
            if parent.sources().iter().any(|s| &s.id == id) {
                reject("E-ACT-DUP-SOURCE", format!("source '{id}' already exists"), "id");
            }
            if !node_exists(node) {
                reject(
                    "E-ACT-REF",
                    format!("grid source '{id}' references unknown node '{node}'"),
                    "node",
                );
            }
        }
        ActionPayload::ContinueTrunkSegmentSn { from_node, new_node, segment_id, corridor, .. } => {
            if !node_exists(from_node) {
                reject(
                    "E-ACT-REF",
                    format!("segment extends from unknown node '{from_node}'"),
                    "from_node",
                );
            }
            if node_exists(&new_node.id) {
                reject(
                    "E-ACT-DUP-NODE",
                    format!("node '{}' already exists", new_node.id),
                    "new_node.id",
                );
            }
            if branch_exists(segment_id) {
                reject(
                    "E-ACT-DUP-BRANCH",
                    format!("branch '{segment_id}' already exists"),
                    "segment_id",
                );
            }
            if let Some(corridor_id) = corridor {
                if !parent.corridors().iter().any(|c| &c.id == corridor_id) {
                    reject(
                        "E-ACT-REF",
                        format!("corridor '{corridor_id}' does not exist"),
                        "corridor",
                    );
                }
            }
        }
        ActionPayload::ConnectSecondaryRingSn { id, node_a, node_b } => {
            if switch_exists(id) {
                reject("E-ACT-DUP-SWITCH", format!("switch '{id}' already exists"), "id");
            }
            if !node_exists(node_a) {
                reject("E-ACT-REF", format!("unknown node '{node_a}'"), "node_a");
            }
            if !node_exists(node_b) {
                reject("E-ACT-REF", format!("unknown node '{node_b}'"), "node_b");
            }
        }
        ActionPayload::SetNormalOpenPoint { switch } => {
            if !switch_exists(switch) {
                reject("E-ACT-REF", format!("switch '{switch}' does not exist"), "switch");
            }
        }
        ActionPayload::InsertStationOnSegmentSn {
            original_branch,
            new_node,
            segment_a_id,
            segment_b_id,
            ..
        } => {
            match parent.branches().iter().find(|b| &b.id == original_branch) {
                None => reject(
                    "E-ACT-REF",
                    format!("branch '{original_branch}' does not exist"),
                    "original_branch",
                ),
                Some(branch) => {
                    if !matches!(branch.electrical, BranchElectricalModel::LineLike { .. }) {
                        reject(
                            "E-ACT-KIND",
                            format!("branch '{original_branch}' is not a line or cable"),
                            "original_branch",
                        );
                    }
                }
            }
            if node_exists(&new_node.id) {
                reject(
                    "E-ACT-DUP-NODE",
                    format!("node '{}' already exists", new_node.id),
                    "new_node.id",
                );
            }
            if branch_exists(segment_a_id) {
                reject(
                    "E-ACT-DUP-BRANCH",
                    format!("branch '{segment_a_id}' already exists"),
                    "segment_a_id",
                );
            }
            if branch_exists(segment_b_id) {
                reject(
                    "E-ACT-DUP-BRANCH",
                    format!("branch '{segment_b_id}' already exists"),
                    "segment_b_id",
                );
            }
        }
    }

    errors
}

fn element_exists(parent: &Snapshot, target: &ElementRef) -> bool {
    match target {
        ElementRef::Node(id) => parent.nodes().iter().any(|n| &n.id == id),
        ElementRef::Branch(id) => parent.branches().iter().any(|b| &b.id == id),
        ElementRef::Switch(id) => parent.switches().iter().any(|s| &s.id == id),
        ElementRef::Source(id) => parent.sources().iter().any(|s| &s.id == id),
        ElementRef::Load(id) => parent.loads().iter().any(|l| &l.id == id),
        ElementRef::Substation(id) => parent.substations().iter().any(|s| &s.id == id),
        ElementRef::Bay(id) => parent.bays().iter().any(|b| &b.id == id),
        ElementRef::Junction(id) => parent.junctions().iter().any(|j| &j.id == id),
        ElementRef::Corridor(id) => parent.corridors().iter().any(|c| &c.id == id),
        ElementRef::Measurement(id) => parent.measurements().iter().any(|m| &m.id == id),
        ElementRef::ProtectionAssignment(id) => {
            parent.protection_assignments().iter().any(|p| &p.id == id)
        }
    }
}

// ============================================================================
// SECTION: Mutation
// ============================================================================

/// Applies a pre-validated payload to a cloned entity set, returning the
/// events to append to the audit trail.
///
/// # Errors
///
/// Returns [`ActionError::CorruptedState`] if a catalog item that passed
/// pre-validation cannot be materialized into a binding; this should never
/// happen for a parent that was validated by [`Applier::apply`].
fn mutate_entities(
    entities: &mut SnapshotEntities,
    catalog: &CatalogRegistry,
    payload: &ActionPayload,
) -> Result<Vec<DomainEvent>, ActionError> {
    let mut events = Vec::new();

    match payload {
        ActionPayload::CreateNode {
            id,
            display_name,
            kind,
            nominal_voltage_kv,
            scheduled_active_power_mw,
            scheduled_reactive_power_mvar,
            initial_voltage_magnitude_pu,
            initial_voltage_angle_deg,
        } => {
            let node = Node {
                id: id.clone(),
                display_name: display_name.clone(),
                kind: *kind,
                nominal_voltage_kv: *nominal_voltage_kv,
                scheduled_active_power_mw: *scheduled_active_power_mw,
                scheduled_reactive_power_mvar: *scheduled_reactive_power_mvar,
                initial_voltage_magnitude_pu: *initial_voltage_magnitude_pu,
                initial_voltage_angle_deg: *initial_voltage_angle_deg,
            };
            events.push(event("node.created", &node));
            entities.nodes.push(node);
        }
        ActionPayload::CreateBranch { id, display_name, from_node, to_node, electrical } => {
            let branch = Branch {
                id: id.clone(),
                display_name: display_name.clone(),
                from_node: from_node.clone(),
                to_node: to_node.clone(),
                in_service: true,
                electrical: electrical.clone(),
                catalog_binding: None,
            };
            events.push(event("branch.created", &branch));
            entities.branches.push(branch);
        }
        ActionPayload::CreateSwitch { id, from_node, to_node, kind, state } => {
            let switch = Switch {
                id: id.clone(),
                from_node: from_node.clone(),
                to_node: to_node.clone(),
                kind: *kind,
                state: *state,
                in_service: true,
            };
            events.push(event("switch.created", &switch));
            entities.switches.push(switch);
        }
        ActionPayload::CreateSource { id, node, model, generator } => {
            let source = Source {
                id: id.clone(),
                node: node.clone(),
                model: model.clone(),
                generator: generator.clone(),
                in_service: true,
            };
            events.push(event("source.created", &source));
            entities.sources.push(source);
        }
        ActionPayload::CreateLoad { id, node, p_mw, q_mvar, model } => {
            let load = Load {
                id: id.clone(),
                node: node.clone(),
                p_mw: *p_mw,
                q_mvar: *q_mvar,
                model: *model,
                in_service: true,
            };
            events.push(event("load.created", &load));
            entities.loads.push(load);
        }
        ActionPayload::SetInService { target, in_service } => {
            set_in_service(entities, target, *in_service);
            events.push(event(
                "in_service.changed",
                &serde_json::json!({ "target": target, "in_service": in_service }),
            ));
        }
        ActionPayload::SetSwitchState { switch, state } => {
            if let Some(found) = entities.switches.iter_mut().find(|s| &s.id == switch) {
                found.state = *state;
            }
            events.push(event(
                "switch.state_changed",
                &serde_json::json!({ "switch": switch, "state": state }),
            ));
        }
        ActionPayload::AssignCatalogToElement { target, namespace, catalog_item_id } => {
            if let Ok(item) = catalog.get(*namespace, catalog_item_id) {
                let binding = build_binding(*namespace, item.id.clone(), item.version.clone(), &item.parameters)?;
                apply_catalog_binding(entities, target, binding);
                events.push(event(
                    "catalog_binding.assigned",
                    &serde_json::json!({
                        "target": target,
                        "namespace": namespace,
                        "catalog_item_id": catalog_item_id,
                    }),
                ));
            }
        }
        ActionPayload::AddGridSourceSn { id, node, sk_mva, rx_ratio, voltage_factor } => {
            let source = Source {
                id: id.clone(),
                node: node.clone(),
                model: SourceModel::Grid {
                    sk_mva: *sk_mva,
                    rx_ratio: *rx_ratio,
                    voltage_factor: *voltage_factor,
                },
                generator: None,
                in_service: true,
            };
            events.push(event("source.created", &source));
            entities.sources.push(source);
        }
        ActionPayload::ContinueTrunkSegmentSn { from_node, new_node, segment_id, segment, corridor } => {
            let new_node = new_node.clone();
            let branch = Branch {
                id: segment_id.clone(),
                display_name: format!("{segment_id}"),
                from_node: from_node.clone(),
                to_node: new_node.id.clone(),
                in_service: true,
                electrical: segment.clone(),
                catalog_binding: None,
            };
            let mut ordered = vec![
                ("node.created".to_string(), event("node.created", &new_node)),
                ("branch.created".to_string(), event("branch.created", &branch)),
            ];
            ordered.sort_by(|a, b| a.0.cmp(&b.0));
            events.extend(ordered.into_iter().map(|(_, event)| event));
            entities.nodes.push(new_node);
            entities.branches.push(branch.clone());
            if let Some(corridor_id) = corridor {
                if let Some(found) = entities.corridors.iter_mut().find(|c| &c.id == corridor_id) {
                    found.branch_refs.push(branch.id);
                }
            }
        }
        ActionPayload::ConnectSecondaryRingSn { id, node_a, node_b } => {
            let switch = Switch {
                id: id.clone(),
                from_node: node_a.clone(),
                to_node: node_b.clone(),
                kind: SwitchKind::LoadSwitch,
                state: SwitchState::Open,
                in_service: true,
            };
            events.push(event("switch.created", &switch));
            entities.switches.push(switch);
        }
        ActionPayload::SetNormalOpenPoint { switch } => {
            if let Some(found) = entities.switches.iter_mut().find(|s| &s.id == switch) {
                found.state = SwitchState::Open;
            }
            events.push(event(
                "switch.normal_open_point_set",
                &serde_json::json!({ "switch": switch }),
            ));
        }
        ActionPayload::InsertStationOnSegmentSn {
            original_branch,
            new_node,
            segment_a_id,
            segment_a_length_km,
            segment_b_id,
            segment_b_length_km,
            new_substation,
        } => {
            let Some(original_index) = entities.branches.iter().position(|b| &b.id == original_branch)
            else {
                return Ok(events);
            };
            let original = entities.branches.remove(original_index);
            let (is_cable, type_ref, impedance_override, instance) = match &original.electrical {
                BranchElectricalModel::LineLike { is_cable, type_ref, impedance_override, instance, .. } => {
                    (*is_cable, type_ref.clone(), *impedance_override, *instance)
                }
                _ => {
                    entities.branches.insert(original_index, original);
                    return Ok(events);
                }
            };

            let new_node = new_node.clone();
            let segment_a = Branch {
                id: segment_a_id.clone(),
                display_name: segment_a_id.to_string(),
                from_node: original.from_node,
                to_node: new_node.id.clone(),
                in_service: original.in_service,
                electrical: BranchElectricalModel::LineLike {
                    is_cable,
                    type_ref: type_ref.clone(),
                    impedance_override,
                    instance,
                    length_km: *segment_a_length_km,
                },
                catalog_binding: None,
            };
            let segment_b = Branch {
                id: segment_b_id.clone(),
                display_name: segment_b_id.to_string(),
                from_node: new_node.id.clone(),
                to_node: original.to_node,
                in_service: original.in_service,
                electrical: BranchElectricalModel::LineLike {
                    is_cable,
                    type_ref,
                    impedance_override: None,
                    instance,
                    length_km: *segment_b_length_km,
                },
                catalog_binding: None,
            };

            let mut ordered: Vec<(String, DomainEvent)> = vec![
                ("node.created".to_string(), event("node.created", &new_node)),
                ("branch.created".to_string(), event("branch.created", &segment_a)),
                ("branch.created".to_string(), event("branch.created", &segment_b)),
            ];
            if let Some(substation) = new_substation {
                ordered.push(("substation.created".to_string(), event("substation.created", substation)));
                entities.substations.push(substation.clone());
            }
            ordered.sort_by(|a, b| a.0.cmp(&b.0));
            events.extend(ordered.into_iter().map(|(_, event)| event));

            entities.nodes.push(new_node);
            entities.branches.push(segment_a);
            entities.branches.push(segment_b);
        }
    }

    Ok(events)
}

fn set_in_service(entities: &mut SnapshotEntities, target: &ElementRef, in_service: bool) {
    match target {
        ElementRef::Branch(id) => {
            if let Some(found) = entities.branches.iter_mut().find(|b| &b.id == id) {
                found.in_service = in_service;
            }
        }
        ElementRef::Switch(id) => {
            if let Some(found) = entities.switches.iter_mut().find(|s| &s.id == id) {
                found.in_service = in_service;
            }
        }
        ElementRef::Source(id) => {
            if let Some(found) = entities.sources.iter_mut().find(|s| &s.id == id) {
                found.in_service = in_service;
            }
        }
        ElementRef::Load(id) => {
            if let Some(found) = entities.loads.iter_mut().find(|l| &l.id == id) {
                found.in_service = in_service;
            }
        }
        _ => {}
    }
}

fn apply_catalog_binding(entities: &mut SnapshotEntities, target: &ElementRef, binding: CatalogBinding) {
    match target {
        ElementRef::Branch(id) => {
            if let Some(found) = entities.branches.iter_mut().find(|b| &b.id == id) {
                found.catalog_binding = Some(binding);
            }
        }
        ElementRef::Source(id) => {
            if let Some(found) = entities.sources.iter_mut().find(|s| &s.id == id) {
                if let Some(generator) = found.generator.as_mut() {
                    generator.catalog_binding = Some(binding);
                }
            }
        }
        ElementRef::Measurement(id) => {
            if let Some(found) = entities.measurements.iter_mut().find(|m| &m.id == id) {
                found.catalog_binding = Some(binding);
            }
        }
        ElementRef::ProtectionAssignment(id) => {
            if let Some(found) = entities.protection_assignments.iter_mut().find(|p| &p.id == id) {
                found.catalog_binding = Some(binding);
            }
        }
        _ => {}
    }
}

fn build_binding(
    namespace: Namespace,
    item_id: CatalogItemId,
    version: CatalogItemVersion,
    parameters: &BTreeMap<String, Value>,
) -> Result<CatalogBinding, ActionError> {
    let provenance = parameters
        .keys()
        .map(|field| (field.clone(), FieldProvenance::from_catalog(namespace, &item_id, &version)))
        .collect();
    CatalogBinding::capture(namespace, item_id, version, parameters, provenance)
        .map_err(|err| ActionError::CorruptedState(err.to_string()))
}

fn event<T: Serialize>(code: &str, value: &T) -> DomainEvent {
    DomainEvent {
        code: code.to_string(),
        payload: serde_json::to_value(value).unwrap_or(Value::Null),
    }
}
