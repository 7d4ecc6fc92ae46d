// dnsc-core/tests/readiness.rs
// ============================================================================
// Module: Readiness & Eligibility Tests
// Description: Verifies the four named readiness gates and the per-analysis
// eligibility matrix, including Sc1f's escalation of W001/W002 to blocking.
// ============================================================================
//! ## Overview
//! A warning that only affects single-phase fault analysis (missing
//! zero-sequence data) must not drag down short-circuit-3f, short-circuit-2f,
//! or load-flow eligibility, even though it is escalated to a blocker for
//! Sc1f specifically.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only panic-based assertions are permitted."
)]

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use dnsc_core::core::binding::CatalogBinding;
use dnsc_core::core::binding::FieldProvenance;
use dnsc_core::core::catalog::CatalogItem;
use dnsc_core::core::catalog::CatalogItemVersion;
use dnsc_core::core::catalog::LineInstanceParams;
use dnsc_core::core::catalog::MaterializationContract;
use dnsc_core::core::catalog::Namespace;
use dnsc_core::core::entities::Branch;
use dnsc_core::core::entities::BranchElectricalModel;
use dnsc_core::core::entities::Node;
use dnsc_core::core::entities::NodeKind;
use dnsc_core::core::entities::Source;
use dnsc_core::core::entities::SourceModel;
use dnsc_core::core::identifiers::BranchId;
use dnsc_core::core::identifiers::CatalogItemId;
use dnsc_core::core::identifiers::NodeId;
use dnsc_core::core::identifiers::SourceId;
use dnsc_core::core::readiness::AnalysisType;
use dnsc_core::core::readiness::ReadinessEngine;
use dnsc_core::core::snapshot::Snapshot;
use dnsc_core::core::snapshot::SnapshotEntities;
use dnsc_core::core::validation::ValidationEngine;
use dnsc_core::CatalogRegistry;
use serde_json::json;

// SECTION: Fixtures

fn slack_node() -> Node {
    Node {
        id: NodeId::new("n-slack"),
        display_name: "Slack".to_string(),
        kind: NodeKind::Slack,
        nominal_voltage_kv: 20.0,
        scheduled_active_power_mw: None,
        scheduled_reactive_power_mvar: None,
        initial_voltage_magnitude_pu: Some(1.0),
        initial_voltage_angle_deg: Some(0.0),
    }
}

fn load_node() -> Node {
    Node {
        id: NodeId::new("n-load"),
        display_name: "Load".to_string(),
        kind: NodeKind::Pq,
        nominal_voltage_kv: 20.0,
        scheduled_active_power_mw: Some(1.0),
        scheduled_reactive_power_mvar: Some(0.3),
        initial_voltage_magnitude_pu: None,
        initial_voltage_angle_deg: None,
    }
}

fn isolated_node() -> Node {
    Node {
        id: NodeId::new("n-isolated"),
        display_name: "Isolated".to_string(),
        kind: NodeKind::Isolated,
        nominal_voltage_kv: 20.0,
        scheduled_active_power_mw: None,
        scheduled_reactive_power_mvar: None,
        initial_voltage_magnitude_pu: None,
        initial_voltage_angle_deg: None,
    }
}

fn grid_source(voltage_factor: Option<f64>) -> Source {
    Source {
        id: SourceId::new("src-grid"),
        node: NodeId::new("n-slack"),
        model: SourceModel::Grid { sk_mva: 500.0, rx_ratio: 0.1, voltage_factor },
        generator: None,
        in_service: true,
    }
}

fn line_item() -> CatalogItem {
    let mut parameters = BTreeMap::new();
    parameters.insert("r_ohm_per_km".to_string(), json!(0.2));
    parameters.insert("x_ohm_per_km".to_string(), json!(0.1));
    parameters.insert("b_us_per_km".to_string(), json!(3.0));
    parameters.insert("rated_current_a".to_string(), json!(400.0));
    CatalogItem {
        id: CatalogItemId::new("NA2XS2Y-150"),
        namespace: Namespace::CableMv,
        version: CatalogItemVersion::new("1"),
        display_label: "NA2XS2Y 150mm2".to_string(),
        parameters,
    }
}

fn feeder_branch() -> Branch {
    let namespace = Namespace::CableMv;
    let item_id = CatalogItemId::new("NA2XS2Y-150");
    let version = CatalogItemVersion::new("1");
    let fields = BTreeMap::from([("r_ohm_per_km".to_string(), json!(0.2))]);
    Branch {
        id: BranchId::new("b-feeder"),
        display_name: "Feeder".to_string(),
        from_node: NodeId::new("n-slack"),
        to_node: NodeId::new("n-load"),
        in_service: true,
        electrical: BranchElectricalModel::LineLike {
            is_cable: true,
            type_ref: Some(item_id.clone()),
            impedance_override: None,
            instance: LineInstanceParams {
                r_ohm_per_km: 0.0,
                x_ohm_per_km: 0.0,
                b_us_per_km: 0.0,
                rated_current_a: 0.0,
            },
            length_km: 2.0,
        },
        catalog_binding: Some(
            CatalogBinding::capture(
                namespace,
                item_id.clone(),
                version.clone(),
                &fields,
                BTreeMap::from([(
                    "r_ohm_per_km".to_string(),
                    FieldProvenance::from_catalog(namespace, &item_id, &version),
                )]),
            )
            .expect("binding capture"),
        ),
    }
}

fn build_catalog() -> CatalogRegistry {
    let mut catalog = CatalogRegistry::new();
    catalog.set_contract(
        Namespace::CableMv,
        MaterializationContract {
            solver_fields: BTreeSet::from(["r_ohm_per_km".to_string()]),
            ui_fields: BTreeSet::new(),
        },
    );
    catalog.publish(line_item()).expect("publish cable type");
    catalog
}

fn build_ready_snapshot(voltage_factor: Option<f64>) -> Snapshot {
    Snapshot::new(
        "snap-readiness".into(),
        None,
        "2026-01-01T00:00:00Z",
        "network-1",
        SnapshotEntities {
            nodes: vec![slack_node(), load_node()],
            branches: vec![feeder_branch()],
            sources: vec![grid_source(voltage_factor)],
            ..SnapshotEntities::default()
        },
    )
    .expect("valid snapshot")
}

fn build_disconnected_snapshot() -> Snapshot {
    Snapshot::new(
        "snap-disconnected".into(),
        None,
        "2026-01-01T00:00:00Z",
        "network-1",
        SnapshotEntities {
            nodes: vec![slack_node(), load_node(), isolated_node()],
            branches: vec![feeder_branch()],
            sources: vec![grid_source(Some(1.1))],
            ..SnapshotEntities::default()
        },
    )
    .expect("valid snapshot")
}

// SECTION: Readiness Gates

#[test]
fn all_gates_ready_for_a_connected_network_with_no_blockers() {
    let snapshot = build_ready_snapshot(Some(1.1));
    let catalog = build_catalog();
    let validation = ValidationEngine.run(&snapshot, &catalog);
    let readiness = ReadinessEngine.assess(&snapshot, &validation);

    assert!(readiness.sld_ready);
    assert!(readiness.short_circuit_ready);
    assert!(readiness.load_flow_ready);
    assert!(readiness.export_ready);
}

#[test]
fn export_ready_tolerates_warnings_that_are_not_blockers() {
    let snapshot = build_ready_snapshot(None);
    let catalog = build_catalog();
    let validation = ValidationEngine.run(&snapshot, &catalog);
    assert!(!validation.warnings.is_empty(), "missing voltage_factor should raise W002");
    let readiness = ReadinessEngine.assess(&snapshot, &validation);
    assert!(readiness.export_ready, "a warning alone must not block export readiness");
}

#[test]
fn all_gates_blocked_when_topology_is_disconnected() {
    let snapshot = build_disconnected_snapshot();
    let catalog = build_catalog();
    let validation = ValidationEngine.run(&snapshot, &catalog);
    let readiness = ReadinessEngine.assess(&snapshot, &validation);

    assert!(!readiness.sld_ready);
    assert!(!readiness.short_circuit_ready);
    assert!(!readiness.load_flow_ready);
    assert!(!readiness.export_ready);
}

// SECTION: Eligibility Matrix

#[test]
fn sc1f_is_ineligible_while_other_analyses_remain_eligible() {
    let snapshot = build_ready_snapshot(None);
    let catalog = build_catalog();
    let validation = ValidationEngine.run(&snapshot, &catalog);
    let eligibility = ReadinessEngine.eligibility(&snapshot, &validation).expect("eligibility");

    let entry_for = |kind: AnalysisType| {
        eligibility
            .entries
            .iter()
            .find(|entry| entry.analysis_type == kind)
            .unwrap_or_else(|| panic!("missing entry for {kind:?}"))
    };

    assert!(!entry_for(AnalysisType::Sc1f).eligible, "W002 must escalate to blocking for Sc1f");
    assert!(entry_for(AnalysisType::Sc3f).eligible);
    assert!(entry_for(AnalysisType::Sc2f).eligible);
    assert!(entry_for(AnalysisType::LoadFlow).eligible);
}

#[test]
fn eligibility_entries_are_sorted_by_analysis_type() {
    let snapshot = build_ready_snapshot(Some(1.1));
    let catalog = build_catalog();
    let validation = ValidationEngine.run(&snapshot, &catalog);
    let eligibility = ReadinessEngine.eligibility(&snapshot, &validation).expect("eligibility");

    let kinds: Vec<AnalysisType> = eligibility.entries.iter().map(|e| e.analysis_type).collect();
    let mut sorted = kinds.clone();
    sorted.sort();
    assert_eq!(kinds, sorted);
}

#[test]
fn eligibility_content_hash_is_deterministic() {
    let snapshot = build_ready_snapshot(Some(1.1));
    let catalog = build_catalog();
    let validation = ValidationEngine.run(&snapshot, &catalog);
    let a = ReadinessEngine.eligibility(&snapshot, &validation).expect("eligibility a");
    let b = ReadinessEngine.eligibility(&snapshot, &validation).expect("eligibility b");
    assert_eq!(a.content_hash, b.content_hash);
}
