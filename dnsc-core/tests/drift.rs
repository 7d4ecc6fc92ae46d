// dnsc-core/tests/drift.rs
// ============================================================================
// Module: Drift Detector Tests
// Description: Verifies severity classification (breaking, removed,
// informational, clean) and deterministic sorting/hashing of drift reports.
// ============================================================================
//! ## Overview
//! Builds a snapshot with four catalog-bound branches, each engineered to
//! land in a distinct [`dnsc_core::core::drift::DriftSeverity`] bucket when
//! compared against a registry that has moved on since binding capture time.

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
use dnsc_core::core::catalog::MaterializationContract;
use dnsc_core::core::catalog::Namespace;
use dnsc_core::core::drift::DriftDetector;
use dnsc_core::core::drift::DriftSeverity;
use dnsc_core::core::entities::Branch;
use dnsc_core::core::entities::BranchElectricalModel;
use dnsc_core::core::entities::Node;
use dnsc_core::core::entities::NodeKind;
use dnsc_core::core::catalog::LineInstanceParams;
use dnsc_core::core::identifiers::BranchId;
use dnsc_core::core::identifiers::CatalogItemId;
use dnsc_core::core::identifiers::NodeId;
use dnsc_core::core::snapshot::Snapshot;
use dnsc_core::core::snapshot::SnapshotEntities;
use dnsc_core::CatalogRegistry;
use serde_json::json;

// SECTION: Fixtures

fn node_a() -> Node {
    Node {
        id: NodeId::new("n-a"),
        display_name: "A".to_string(),
        kind: NodeKind::Slack,
        nominal_voltage_kv: 20.0,
        scheduled_active_power_mw: None,
        scheduled_reactive_power_mvar: None,
        initial_voltage_magnitude_pu: Some(1.0),
        initial_voltage_angle_deg: Some(0.0),
    }
}

fn node_b() -> Node {
    Node {
        id: NodeId::new("n-b"),
        display_name: "B".to_string(),
        kind: NodeKind::Pq,
        nominal_voltage_kv: 20.0,
        scheduled_active_power_mw: Some(0.0),
        scheduled_reactive_power_mvar: Some(0.0),
        initial_voltage_magnitude_pu: None,
        initial_voltage_angle_deg: None,
    }
}

fn bound_fields() -> BTreeMap<String, serde_json::Value> {
    BTreeMap::from([
        ("r_ohm_per_km".to_string(), json!(0.2)),
        ("rated_current_a".to_string(), json!(400.0)),
    ])
}

fn bound_provenance(namespace: Namespace, item_id: &str, version: &str) -> BTreeMap<String, FieldProvenance> {
    let item_id = CatalogItemId::new(item_id);
    let version = CatalogItemVersion::new(version);
    BTreeMap::from([
        ("r_ohm_per_km".to_string(), FieldProvenance::from_catalog(namespace, &item_id, &version)),
        ("rated_current_a".to_string(), FieldProvenance::from_catalog(namespace, &item_id, &version)),
    ])
}

fn branch_bound_to(branch_id: &str, catalog_item_id: &str) -> Branch {
    let namespace = Namespace::CableMv;
    Branch {
        id: BranchId::new(branch_id),
        display_name: branch_id.to_string(),
        from_node: NodeId::new("n-a"),
        to_node: NodeId::new("n-b"),
        in_service: true,
        electrical: BranchElectricalModel::LineLike {
            is_cable: true,
            type_ref: Some(CatalogItemId::new(catalog_item_id)),
            impedance_override: None,
            instance: LineInstanceParams {
                r_ohm_per_km: 0.0,
                x_ohm_per_km: 0.0,
                b_us_per_km: 0.0,
                rated_current_a: 0.0,
            },
            length_km: 1.0,
        },
        catalog_binding: Some(
            CatalogBinding::capture(
                namespace,
                CatalogItemId::new(catalog_item_id),
                CatalogItemVersion::new("1"),
                &bound_fields(),
                bound_provenance(namespace, catalog_item_id, "1"),
            )
            .expect("binding capture"),
        ),
    }
}

fn published_item(item_id: &str, version: &str, r_ohm_per_km: f64, rated_current_a: f64) -> CatalogItem {
    let mut parameters = BTreeMap::new();
    parameters.insert("r_ohm_per_km".to_string(), json!(r_ohm_per_km));
    parameters.insert("rated_current_a".to_string(), json!(rated_current_a));
    CatalogItem {
        id: CatalogItemId::new(item_id),
        namespace: Namespace::CableMv,
        version: CatalogItemVersion::new(version),
        display_label: item_id.to_string(),
        parameters,
    }
}

fn build_snapshot() -> Snapshot {
    Snapshot::new(
        "snap-drift".into(),
        None,
        "2026-01-01T00:00:00Z",
        "network-1",
        SnapshotEntities {
            nodes: vec![node_a(), node_b()],
            branches: vec![
                branch_bound_to("b-breaking", "breaking-item"),
                branch_bound_to("b-informational", "informational-item"),
                branch_bound_to("b-clean", "clean-item"),
                branch_bound_to("b-removed", "removed-item"),
            ],
            ..SnapshotEntities::default()
        },
    )
    .expect("valid snapshot")
}

fn build_catalog() -> CatalogRegistry {
    let mut catalog = CatalogRegistry::new();
    catalog.set_contract(
        Namespace::CableMv,
        MaterializationContract {
            solver_fields: BTreeSet::from(["r_ohm_per_km".to_string()]),
            ui_fields: BTreeSet::from(["rated_current_a".to_string()]),
        },
    );
    // Breaking: solver-relevant field diverged from the bound version.
    catalog.publish(published_item("breaking-item", "2", 0.5, 400.0)).expect("publish breaking");
    // Informational: only a UI field diverged.
    catalog
        .publish(published_item("informational-item", "2", 0.2, 999.0))
        .expect("publish informational");
    // Clean: version in the registry matches what was bound.
    catalog.publish(published_item("clean-item", "1", 0.2, 400.0)).expect("publish clean");
    // Removed: "removed-item" is deliberately never published.
    catalog
}

fn record_for<'a>(
    report: &'a dnsc_core::core::drift::DriftReport,
    item_id: &str,
) -> &'a dnsc_core::core::drift::DriftRecord {
    report
        .records
        .iter()
        .find(|record| record.catalog_item_id.as_str() == item_id)
        .unwrap_or_else(|| panic!("no drift record for {item_id}"))
}

// SECTION: Tests

#[test]
fn breaking_when_solver_relevant_field_diverges() {
    let snapshot = build_snapshot();
    let catalog = build_catalog();
    let report = DriftDetector.detect(&snapshot, &catalog).expect("detect drift");
    let record = record_for(&report, "breaking-item");
    assert_eq!(record.severity, DriftSeverity::Breaking);
    assert_eq!(record.changed_fields, vec!["r_ohm_per_km".to_string()]);
}

#[test]
fn informational_when_only_ui_field_diverges() {
    let snapshot = build_snapshot();
    let catalog = build_catalog();
    let report = DriftDetector.detect(&snapshot, &catalog).expect("detect drift");
    let record = record_for(&report, "informational-item");
    assert_eq!(record.severity, DriftSeverity::Informational);
    assert_eq!(record.changed_fields, vec!["rated_current_a".to_string()]);
}

#[test]
fn clean_when_bound_version_still_current() {
    let snapshot = build_snapshot();
    let catalog = build_catalog();
    let report = DriftDetector.detect(&snapshot, &catalog).expect("detect drift");
    let record = record_for(&report, "clean-item");
    assert_eq!(record.severity, DriftSeverity::Clean);
    assert!(record.changed_fields.is_empty());
}

#[test]
fn removed_when_item_no_longer_published() {
    let snapshot = build_snapshot();
    let catalog = build_catalog();
    let report = DriftDetector.detect(&snapshot, &catalog).expect("detect drift");
    let record = record_for(&report, "removed-item");
    assert_eq!(record.severity, DriftSeverity::Removed);
    assert!(record.current_version.is_none());
}

#[test]
fn records_are_sorted_most_concerning_first() {
    let snapshot = build_snapshot();
    let catalog = build_catalog();
    let report = DriftDetector.detect(&snapshot, &catalog).expect("detect drift");
    let severities: Vec<DriftSeverity> = report.records.iter().map(|r| r.severity).collect();
    let mut sorted = severities.clone();
    sorted.sort();
    assert_eq!(severities, sorted, "records must already be in severity order");
    assert_eq!(severities[0], DriftSeverity::Breaking);
}

#[test]
fn report_hash_is_deterministic_across_calls() {
    let snapshot = build_snapshot();
    let catalog = build_catalog();
    let report_a = DriftDetector.detect(&snapshot, &catalog).expect("detect drift a");
    let report_b = DriftDetector.detect(&snapshot, &catalog).expect("detect drift b");
    assert_eq!(report_a.report_hash, report_b.report_hash);
}
