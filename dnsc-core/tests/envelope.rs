// dnsc-core/tests/envelope.rs
// ============================================================================
// Module: Solver-Input Envelope Tests
// Description: Builds a minimal two-bus network and checks the envelope
// builder's catalog-precedence resolution and provenance accounting.
// ============================================================================
//! ## Overview
//! Exercises override/type_ref/instance precedence for a line branch and
//! confirms the provenance summary and trace reflect exactly the bindings
//! present on the snapshot.

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
use dnsc_core::core::catalog::CatalogItem;
use dnsc_core::core::catalog::CatalogItemVersion;
use dnsc_core::core::catalog::ImpedanceOverride;
use dnsc_core::core::catalog::LineInstanceParams;
use dnsc_core::core::catalog::MaterializationContract;
use dnsc_core::core::catalog::Namespace;
use dnsc_core::core::entities::Branch;
use dnsc_core::core::entities::BranchElectricalModel;
use dnsc_core::core::entities::Node;
use dnsc_core::core::entities::NodeKind;
use dnsc_core::core::entities::Source;
use dnsc_core::core::entities::SourceModel;
use dnsc_core::core::envelope::EnvelopeBuilder;
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
        display_name: "Load Bus".to_string(),
        kind: NodeKind::Pq,
        nominal_voltage_kv: 20.0,
        scheduled_active_power_mw: Some(1.0),
        scheduled_reactive_power_mvar: Some(0.3),
        initial_voltage_magnitude_pu: None,
        initial_voltage_angle_deg: None,
    }
}

fn grid_source() -> Source {
    Source {
        id: SourceId::new("src-grid"),
        node: NodeId::new("n-slack"),
        model: SourceModel::Grid { sk_mva: 500.0, rx_ratio: 0.1, voltage_factor: Some(1.1) },
        generator: None,
        in_service: true,
    }
}

fn line_type_item() -> CatalogItem {
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

fn branch_with_type_ref() -> Branch {
    Branch {
        id: BranchId::new("b-feeder"),
        display_name: "Feeder".to_string(),
        from_node: NodeId::new("n-slack"),
        to_node: NodeId::new("n-load"),
        in_service: true,
        electrical: BranchElectricalModel::LineLike {
            is_cable: true,
            type_ref: Some(CatalogItemId::new("NA2XS2Y-150")),
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
                Namespace::CableMv,
                CatalogItemId::new("NA2XS2Y-150"),
                CatalogItemVersion::new("1"),
                &BTreeMap::from([("r_ohm_per_km".to_string(), json!(0.2))]),
                BTreeMap::from([(
                    "r_ohm_per_km".to_string(),
                    dnsc_core::core::binding::FieldProvenance::from_catalog(
                        Namespace::CableMv,
                        &CatalogItemId::new("NA2XS2Y-150"),
                        &CatalogItemVersion::new("1"),
                    ),
                )]),
            )
            .expect("binding capture"),
        ),
    }
}

fn branch_with_override() -> Branch {
    Branch {
        id: BranchId::new("b-override"),
        display_name: "Override Segment".to_string(),
        from_node: NodeId::new("n-load"),
        to_node: NodeId::new("n-slack"),
        in_service: false,
        electrical: BranchElectricalModel::LineLike {
            is_cable: false,
            type_ref: None,
            impedance_override: Some(ImpedanceOverride {
                r_total_ohm: 1.0,
                x_total_ohm: 0.5,
                b_total_us: 0.0,
            }),
            instance: LineInstanceParams {
                r_ohm_per_km: 0.0,
                x_ohm_per_km: 0.0,
                b_us_per_km: 0.0,
                rated_current_a: 250.0,
            },
            length_km: 1.0,
        },
        catalog_binding: None,
    }
}

fn build_snapshot() -> Snapshot {
    Snapshot::new(
        "snap-1".into(),
        None,
        "2026-01-01T00:00:00Z",
        "network-1",
        SnapshotEntities {
            nodes: vec![slack_node(), load_node()],
            branches: vec![branch_with_type_ref(), branch_with_override()],
            sources: vec![grid_source()],
            ..SnapshotEntities::default()
        },
    )
    .expect("valid snapshot")
}

fn build_catalog() -> CatalogRegistry {
    let mut catalog = CatalogRegistry::new();
    catalog
        .set_contract(
            Namespace::CableMv,
            MaterializationContract {
                solver_fields: BTreeSet::from(["r_ohm_per_km".to_string()]),
                ui_fields: BTreeSet::new(),
            },
        );
    catalog.publish(line_type_item()).expect("publish cable type");
    catalog
}

// SECTION: Tests

#[test]
fn type_ref_precedence_resolves_from_catalog() {
    let snapshot = build_snapshot();
    let catalog = build_catalog();
    let validation = ValidationEngine.run(&snapshot, &catalog);
    let eligibility = ReadinessEngine.eligibility(&snapshot, &validation).expect("eligibility");
    let entry = eligibility
        .entries
        .into_iter()
        .find(|e| e.analysis_type == AnalysisType::Sc3f)
        .expect("sc3f entry");

    let envelope =
        EnvelopeBuilder.build(&snapshot, &catalog, "case-1", entry).expect("build envelope");

    let dnsc_core::core::envelope::SolverPayload::ShortCircuit(payload) = &envelope.payload else {
        panic!("expected short-circuit payload");
    };
    assert_eq!(payload.branches.len(), 1, "the out-of-service override branch must be excluded");
    let resolved = &payload.branches[0];
    assert_eq!(resolved.r_ohm_per_km, 0.2);
    assert_eq!(resolved.x_ohm_per_km, 0.1);
}

#[test]
fn provenance_summary_counts_catalog_bound_fields() {
    let snapshot = build_snapshot();
    let catalog = build_catalog();
    let validation = ValidationEngine.run(&snapshot, &catalog);
    let eligibility = ReadinessEngine.eligibility(&snapshot, &validation).expect("eligibility");
    let entry = eligibility
        .entries
        .into_iter()
        .find(|e| e.analysis_type == AnalysisType::Sc3f)
        .expect("sc3f entry");

    let envelope =
        EnvelopeBuilder.build(&snapshot, &catalog, "case-1", entry).expect("build envelope");

    assert_eq!(envelope.provenance_summary.distinct_catalog_refs, 1);
    assert_eq!(envelope.provenance_summary.override_count, 0);
    assert_eq!(envelope.trace, vec!["cable_mv:NA2XS2Y-150@1".to_string()]);
}

#[test]
fn override_branch_out_of_service_has_zero_impedance_when_resolved_directly() {
    let catalog = build_catalog();
    let resolved = catalog
        .resolve_line_params(
            None,
            false,
            Some(&ImpedanceOverride { r_total_ohm: 1.0, x_total_ohm: 0.5, b_total_us: 0.0 }),
            0.0,
            &LineInstanceParams {
                r_ohm_per_km: 0.0,
                x_ohm_per_km: 0.0,
                b_us_per_km: 0.0,
                rated_current_a: 250.0,
            },
        )
        .expect("resolve override with zero length");
    assert_eq!(resolved.r_ohm_per_km, 0.0);
    assert_eq!(resolved.x_ohm_per_km, 0.0);
}
