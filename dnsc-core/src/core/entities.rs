// dnsc-core/src/core/entities.rs
// ============================================================================
// Module: Network Entities
// Description: The node/branch/switch/source/load/topology types a Snapshot
// owns.
// Purpose: Define the domain vocabulary validated and interpreted by every
// downstream component.
// Dependencies: crate::core::binding, crate::core::catalog, crate::core::identifiers
// ============================================================================

//! ## Overview
//! Entities carry no behavior beyond plain accessors; every invariant that
//! spans more than one entity (endpoint existence, connectivity, generator
//! connection-variant rules) is enforced by [`crate::core::snapshot`] at
//! construction time or reported by [`crate::core::validation`], never by
//! the entity types themselves.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

use crate::core::binding::CatalogBinding;
use crate::core::catalog::ImpedanceOverride;
use crate::core::catalog::LineInstanceParams;
use crate::core::catalog::TransformerInstanceParams;
use crate::core::identifiers::BayId;
use crate::core::identifiers::BranchId;
use crate::core::identifiers::CatalogItemId;
use crate::core::identifiers::CorridorId;
use crate::core::identifiers::JunctionId;
use crate::core::identifiers::LoadId;
use crate::core::identifiers::MeasurementId;
use crate::core::identifiers::NodeId;
use crate::core::identifiers::ProtectionAssignmentId;
use crate::core::identifiers::SourceId;
use crate::core::identifiers::SubstationId;
use crate::core::identifiers::SwitchId;
use crate::core::identifiers::ElementRef;

// ============================================================================
// SECTION: Node
// ============================================================================

/// Electrical role of a node in a power-flow / short-circuit study.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    /// Reference (swing) bus.
    Slack,
    /// Constant active/reactive power bus.
    Pq,
    /// Constant active power / voltage magnitude bus.
    Pv,
    /// Not connected to any in-service branch.
    Isolated,
}

/// A bus in the network.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Unique id within the snapshot.
    pub id: NodeId,
    /// Human-readable label.
    pub display_name: String,
    /// Electrical role.
    pub kind: NodeKind,
    /// Nominal voltage level, kV. Must be strictly positive.
    pub nominal_voltage_kv: f64,
    /// Scheduled active power injection, MW (PQ/PV buses).
    pub scheduled_active_power_mw: Option<f64>,
    /// Scheduled reactive power injection, Mvar (PQ buses).
    pub scheduled_reactive_power_mvar: Option<f64>,
    /// Initial voltage magnitude guess, per-unit.
    pub initial_voltage_magnitude_pu: Option<f64>,
    /// Initial voltage angle guess, degrees.
    pub initial_voltage_angle_deg: Option<f64>,
}

// ============================================================================
// SECTION: Branch
// ============================================================================

/// Display/report-facing classification of a branch. Derived from
/// [`BranchElectricalModel`] rather than stored independently, so the two
/// can never disagree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BranchKind {
    /// Overhead line.
    Line,
    /// Underground cable.
    Cable,
    /// Two-winding transformer.
    Transformer,
    /// A switching device modeled as a branch (zero impedance).
    SwitchAsBranch,
}

/// The electrical model of a branch, tagged by the same closed set the
/// catalog registry resolves against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "model", rename_all = "snake_case")]
pub enum BranchElectricalModel {
    /// An overhead line or underground cable.
    LineLike {
        /// `true` for a cable, `false` for an overhead line.
        is_cable: bool,
        /// Optional catalog type reference.
        type_ref: Option<CatalogItemId>,
        /// Optional total-impedance override, dominates all other sources.
        impedance_override: Option<ImpedanceOverride>,
        /// Direct per-km instance parameters, used absent override/type_ref.
        instance: LineInstanceParams,
        /// Segment length, km.
        length_km: f64,
    },
    /// A two-winding transformer.
    Transformer {
        /// Optional catalog type reference.
        type_ref: Option<CatalogItemId>,
        /// Direct nameplate instance parameters, used absent type_ref.
        instance: TransformerInstanceParams,
    },
    /// A switching device modeled as a branch; carries no impedance.
    Switch,
}

/// A line, cable, transformer, or switch-as-branch connecting two nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Branch {
    /// Unique id within the snapshot.
    pub id: BranchId,
    /// Human-readable label.
    pub display_name: String,
    /// "from" endpoint.
    pub from_node: NodeId,
    /// "to" endpoint.
    pub to_node: NodeId,
    /// Whether the branch participates in studies.
    pub in_service: bool,
    /// Electrical model.
    pub electrical: BranchElectricalModel,
    /// Catalog binding captured at materialization time, if any.
    pub catalog_binding: Option<CatalogBinding>,
}

impl Branch {
    /// Returns the display-facing branch kind.
    #[must_use]
    pub fn kind(&self) -> BranchKind {
        match &self.electrical {
            BranchElectricalModel::LineLike { is_cable: true, .. } => BranchKind::Cable,
            BranchElectricalModel::LineLike { is_cable: false, .. } => BranchKind::Line,
            BranchElectricalModel::Transformer { .. } => BranchKind::Transformer,
            BranchElectricalModel::Switch => BranchKind::SwitchAsBranch,
        }
    }
}

// ============================================================================
// SECTION: Switch
// ============================================================================

/// Kind of switching device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SwitchKind {
    /// Circuit breaker.
    Breaker,
    /// Manual disconnector (isolator).
    Disconnector,
    /// Load-break switch.
    LoadSwitch,
    /// Fuse.
    Fuse,
}

/// Open/closed state of a switching device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SwitchState {
    /// Circuit open.
    Open,
    /// Circuit closed.
    Closed,
}

/// A standalone switching device (not modeled as a branch).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Switch {
    /// Unique id within the snapshot.
    pub id: SwitchId,
    /// "from" endpoint.
    pub from_node: NodeId,
    /// "to" endpoint.
    pub to_node: NodeId,
    /// Device kind.
    pub kind: SwitchKind,
    /// Current state.
    pub state: SwitchState,
    /// Whether the device participates in studies.
    pub in_service: bool,
}

// ============================================================================
// SECTION: Source
// ============================================================================

/// Source equivalent-circuit model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "model", rename_all = "snake_case")]
pub enum SourceModel {
    /// Short-circuit-power equivalent (grid or generator contribution).
    ShortCircuitPower {
        /// Short-circuit power, MVA.
        sk_mva: f64,
        /// X/R ratio at the point of connection.
        rx_ratio: f64,
    },
    /// Voltage-behind-impedance equivalent.
    VoltageBehindImpedance {
        /// Series resistance, ohms.
        r_ohm: f64,
        /// Series reactance, ohms.
        x_ohm: f64,
        /// Internal EMF magnitude, per-unit.
        voltage_pu: f64,
    },
    /// External grid connection.
    Grid {
        /// Short-circuit power, MVA.
        sk_mva: f64,
        /// X/R ratio at the point of connection.
        rx_ratio: f64,
        /// Optional IEC 60909 voltage factor `c`.
        voltage_factor: Option<f64>,
    },
}

/// Connection topology a renewable/inverter-based generator must declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionVariant {
    /// Connected directly on the substation's nn (low-voltage) side.
    NnSide,
    /// Connected through a dedicated block transformer.
    BlockTransformer,
}

/// Generator classification driving connection-variant validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GeneratorType {
    /// Photovoltaic inverter-based generation.
    Pv,
    /// Wind inverter-based generation.
    WindInverter,
    /// Battery energy storage system.
    Bess,
    /// Directly coupled synchronous machine.
    Synchronous,
}

/// Generator-specific metadata attached to a [`Source`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratorProfile {
    /// Generator technology.
    pub generator_type: GeneratorType,
    /// Required for PV/wind/BESS; absent (and unchecked) for synchronous.
    pub connection_variant: Option<ConnectionVariant>,
    /// Required when `connection_variant == NnSide`.
    pub nn_side_substation: Option<SubstationId>,
    /// Required when `connection_variant == BlockTransformer`.
    pub block_transformer: Option<BranchId>,
    /// Catalog type reference; every generator requires one regardless of type.
    pub type_ref: Option<CatalogItemId>,
    /// Catalog binding captured at materialization time, if any.
    pub catalog_binding: Option<CatalogBinding>,
}

/// A source of power or short-circuit infeed bound to a node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
    /// Unique id within the snapshot.
    pub id: SourceId,
    /// Node the source feeds.
    pub node: NodeId,
    /// Equivalent-circuit model.
    pub model: SourceModel,
    /// Present iff this source is a generator (as opposed to a grid tie).
    pub generator: Option<GeneratorProfile>,
    /// Whether the source participates in studies.
    pub in_service: bool,
}

// ============================================================================
// SECTION: Load
// ============================================================================

/// Voltage-dependence model of a load (ZIP-style classification).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadModelKind {
    /// Power draw independent of voltage.
    ConstantPower,
    /// Power draw proportional to voltage squared.
    ConstantImpedance,
    /// Power draw proportional to voltage.
    ConstantCurrent,
}

/// A load bound to a node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Load {
    /// Unique id within the snapshot.
    pub id: LoadId,
    /// Node the load draws from.
    pub node: NodeId,
    /// Active power, MW.
    pub p_mw: f64,
    /// Reactive power, Mvar.
    pub q_mvar: f64,
    /// Voltage-dependence model.
    pub model: LoadModelKind,
    /// Whether the load participates in studies.
    pub in_service: bool,
}

// ============================================================================
// SECTION: Topological Containers
// ============================================================================

/// A group of buses, bays, and transformers forming one physical station.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Substation {
    /// Unique id within the snapshot.
    pub id: SubstationId,
    /// Human-readable label.
    pub display_name: String,
    /// Buses belonging to this substation.
    pub bus_refs: Vec<NodeId>,
    /// Bays belonging to this substation.
    pub bay_refs: Vec<BayId>,
    /// Transformers belonging to this substation.
    pub transformer_refs: Vec<BranchId>,
}

/// A group of apparatus on a single bus within a substation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bay {
    /// Unique id within the snapshot.
    pub id: BayId,
    /// Owning substation.
    pub substation: SubstationId,
    /// Bus this bay's apparatus sit on.
    pub bus_ref: NodeId,
    /// Switching devices in this bay.
    pub switch_refs: Vec<SwitchId>,
}

/// A topological junction point in the corridor graph, with no electrical
/// behavior of its own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Junction {
    /// Unique id within the snapshot.
    pub id: JunctionId,
    /// Node this junction coincides with.
    pub node: NodeId,
}

/// An ordered list of branches forming a trunk corridor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Corridor {
    /// Unique id within the snapshot.
    pub id: CorridorId,
    /// Human-readable label.
    pub display_name: String,
    /// Branches in corridor order, from one end to the other.
    pub branch_refs: Vec<BranchId>,
}

// ============================================================================
// SECTION: Measurement & Protection
// ============================================================================

/// A metering point (current or voltage transformer) bound to an element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    /// Unique id within the snapshot.
    pub id: MeasurementId,
    /// Element being measured.
    pub measured_element: ElementRef,
    /// Optional catalog type reference (current/voltage transformer type).
    pub type_ref: Option<CatalogItemId>,
    /// Catalog binding captured at materialization time, if any.
    pub catalog_binding: Option<CatalogBinding>,
}

/// A protection device assignment to a branch or switch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProtectionAssignment {
    /// Unique id within the snapshot.
    pub id: ProtectionAssignmentId,
    /// Element being protected.
    pub protected_element: ElementRef,
    /// Optional protection device catalog reference.
    pub device_type_ref: Option<CatalogItemId>,
    /// Optional protection setting template catalog reference.
    pub setting_template_ref: Option<CatalogItemId>,
    /// Catalog binding captured at materialization time, if any.
    pub catalog_binding: Option<CatalogBinding>,
}
