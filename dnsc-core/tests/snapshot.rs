// dnsc-core/tests/snapshot.rs
// ============================================================================
// Module: Snapshot Constructor Invariant Tests
// Description: Verifies Snapshot::new rejects every malformed entity set it
// documents, auto-sorts entity vectors by id, and fingerprints deterministically.
// ============================================================================
//! ## Overview
//! `Snapshot::new` is the single validation gate for a structural payload;
//! every rejection path and the auto-sort/fingerprint behavior it guarantees
//! downstream readers is exercised here.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only panic-based assertions are permitted."
)]

use dnsc_core::core::entities::Branch;
use dnsc_core::core::entities::BranchElectricalModel;
use dnsc_core::core::entities::ConnectionVariant;
use dnsc_core::core::entities::GeneratorProfile;
use dnsc_core::core::entities::GeneratorType;
use dnsc_core::core::entities::Node;
use dnsc_core::core::entities::NodeKind;
use dnsc_core::core::entities::Source;
use dnsc_core::core::entities::SourceModel;
use dnsc_core::core::catalog::LineInstanceParams;
use dnsc_core::core::identifiers::BranchId;
use dnsc_core::core::identifiers::CatalogItemId;
use dnsc_core::core::identifiers::NodeId;
use dnsc_core::core::identifiers::SourceId;
use dnsc_core::core::snapshot::Snapshot;
use dnsc_core::core::snapshot::SnapshotEntities;
use dnsc_core::core::snapshot::SnapshotError;

// SECTION: Fixtures

fn node(id: &str, voltage_kv: f64) -> Node {
    Node {
        id: NodeId::new(id),
        display_name: id.to_string(),
        kind: NodeKind::Pq,
        nominal_voltage_kv: voltage_kv,
        scheduled_active_power_mw: None,
        scheduled_reactive_power_mvar: None,
        initial_voltage_magnitude_pu: None,
        initial_voltage_angle_deg: None,
    }
}

fn switch_branch(id: &str, from_node: &str, to_node: &str) -> Branch {
    Branch {
        id: BranchId::new(id),
        display_name: id.to_string(),
        from_node: NodeId::new(from_node),
        to_node: NodeId::new(to_node),
        in_service: true,
        electrical: BranchElectricalModel::Switch,
        catalog_binding: None,
    }
}

fn line_branch(id: &str, from_node: &str, to_node: &str) -> Branch {
    Branch {
        id: BranchId::new(id),
        display_name: id.to_string(),
        from_node: NodeId::new(from_node),
        to_node: NodeId::new(to_node),
        in_service: true,
        electrical: BranchElectricalModel::LineLike {
            is_cable: false,
            type_ref: None,
            impedance_override: None,
            instance: LineInstanceParams {
                r_ohm_per_km: 0.2,
                x_ohm_per_km: 0.1,
                b_us_per_km: 3.0,
                rated_current_a: 400.0,
            },
            length_km: 1.0,
        },
        catalog_binding: None,
    }
}

fn pv_source_without_connection_variant() -> Source {
    Source {
        id: SourceId::new("src-pv"),
        node: NodeId::new("n-a"),
        model: SourceModel::Grid { sk_mva: 5.0, rx_ratio: 0.1, voltage_factor: Some(1.0) },
        generator: Some(GeneratorProfile {
            generator_type: GeneratorType::Pv,
            connection_variant: None,
            nn_side_substation: None,
            block_transformer: None,
            type_ref: Some(CatalogItemId::new("pv-inverter")),
            catalog_binding: None,
        }),
        in_service: true,
    }
}

fn two_node_entities(branches: Vec<Branch>) -> SnapshotEntities {
    SnapshotEntities { nodes: vec![node("n-a", 20.0), node("n-b", 20.0)], branches, ..SnapshotEntities::default() }
}

// SECTION: Rejections

#[test]
fn rejects_duplicate_node_ids() {
    let entities =
        SnapshotEntities { nodes: vec![node("n-a", 20.0), node("n-a", 20.0)], ..SnapshotEntities::default() };
    let err = Snapshot::new("s1".into(), None, "t", "net", entities).unwrap_err();
    assert!(matches!(err, SnapshotError::DuplicateId { category: "node", .. }));
}

#[test]
fn rejects_a_branch_with_a_dangling_endpoint() {
    let entities = two_node_entities(vec![line_branch("b-1", "n-a", "n-ghost")]);
    let err = Snapshot::new("s1".into(), None, "t", "net", entities).unwrap_err();
    assert!(matches!(err, SnapshotError::DanglingNodeRef { entity: "branch", .. }));
}

#[test]
fn rejects_non_positive_nominal_voltage() {
    let entities =
        SnapshotEntities { nodes: vec![node("n-a", 0.0)], ..SnapshotEntities::default() };
    let err = Snapshot::new("s1".into(), None, "t", "net", entities).unwrap_err();
    assert!(matches!(err, SnapshotError::NonPositiveVoltage { .. }));
}

#[test]
fn rejects_a_self_loop_line_branch_but_allows_a_self_loop_switch() {
    let rejected = Snapshot::new(
        "s1".into(),
        None,
        "t",
        "net",
        two_node_entities(vec![line_branch("b-1", "n-a", "n-a")]),
    )
    .unwrap_err();
    assert!(matches!(rejected, SnapshotError::SelfLoopBranch { .. }));

    let accepted =
        Snapshot::new("s2".into(), None, "t", "net", two_node_entities(vec![switch_branch("b-1", "n-a", "n-a")]));
    assert!(accepted.is_ok(), "a switch-as-branch self-loop is explicitly permitted");
}

#[test]
fn rejects_a_generator_with_a_missing_connection_variant() {
    let entities = SnapshotEntities {
        nodes: vec![node("n-a", 20.0)],
        sources: vec![pv_source_without_connection_variant()],
        ..SnapshotEntities::default()
    };
    let err = Snapshot::new("s1".into(), None, "t", "net", entities).unwrap_err();
    assert!(matches!(err, SnapshotError::InvalidGeneratorConnection { .. }));
}

// SECTION: Construction Behavior

#[test]
fn entity_vectors_are_sorted_by_id_regardless_of_input_order() {
    let entities = SnapshotEntities {
        nodes: vec![node("n-c", 20.0), node("n-a", 20.0), node("n-b", 20.0)],
        ..SnapshotEntities::default()
    };
    let snapshot = Snapshot::new("s1".into(), None, "t", "net", entities).expect("valid snapshot");
    let ids: Vec<&str> = snapshot.nodes().iter().map(|n| n.id.as_str()).collect();
    assert_eq!(ids, vec!["n-a", "n-b", "n-c"]);
}

#[test]
fn fingerprint_is_deterministic_and_ignores_snapshot_id_and_created_at() {
    let a = Snapshot::new("s1".into(), None, "2026-01-01T00:00:00Z", "net", two_node_entities(vec![]))
        .expect("valid snapshot a");
    let b = Snapshot::new("s2".into(), None, "2026-06-01T00:00:00Z", "net", two_node_entities(vec![]))
        .expect("valid snapshot b");
    assert_eq!(a.fingerprint().expect("fingerprint a"), b.fingerprint().expect("fingerprint b"));
}

#[test]
fn fingerprint_changes_when_structural_payload_changes() {
    let a = Snapshot::new("s1".into(), None, "t", "net", two_node_entities(vec![])).expect("valid snapshot a");
    let b = Snapshot::new("s1".into(), None, "t", "net", two_node_entities(vec![line_branch("b-1", "n-a", "n-b")]))
        .expect("valid snapshot b");
    assert_ne!(a.fingerprint().expect("fingerprint a"), b.fingerprint().expect("fingerprint b"));
}
