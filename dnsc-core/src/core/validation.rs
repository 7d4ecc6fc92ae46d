// dnsc-core/src/core/validation.rs
// ============================================================================
// Module: Validation / Diagnostic Engine
// Description: Pure rule functions over a Snapshot (plus catalog registry)
// producing a sorted, severity-partitioned diagnostic report.
// Purpose: Surface structural and catalog-completeness problems without
// mutating anything; downstream readiness/eligibility gates consume this
// report's area tags rather than re-deriving them.
// Dependencies: crate::core::{action, catalog, entities, identifiers,
// readiness, snapshot}
// ============================================================================

//! ## Overview
//! Every rule here is a plain `fn(&Snapshot, ...) -> Vec<ValidationIssue>`.
//! None of them mutate the snapshot or the registry; [`ValidationEngine::run`]
//! just concatenates their output and sorts it. Generator connection-variant
//! rules are also enforced as hard invariants at [`crate::core::snapshot`]
//! construction time, so their re-check here is defense-in-depth: for any
//! snapshot that exists at all, it is structurally incapable of firing.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;

use crate::core::action::ActionPayload;
use crate::core::binding::SourceKind;
use crate::core::catalog::CatalogRegistry;
use crate::core::catalog::Namespace;
use crate::core::entities::BranchElectricalModel;
use crate::core::entities::ConnectionVariant;
use crate::core::entities::GeneratorType;
use crate::core::entities::NodeKind;
use crate::core::entities::SourceModel;
use crate::core::entities::SwitchState;
use crate::core::identifiers::ElementRef;
use crate::core::readiness::Area;
use crate::core::snapshot::Snapshot;

// ============================================================================
// SECTION: Severity
// ============================================================================

/// Severity band a [`ValidationIssue`] belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Blocks the gates that depend on this issue's area (`E-` codes).
    Blocker,
    /// Does not block, but is surfaced to the user (`W-` codes).
    Warning,
    /// Informational only (`I-` codes).
    Info,
}

// ============================================================================
// SECTION: Validation Issue
// ============================================================================

/// A single diagnostic finding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationIssue {
    /// Stable rule code, e.g. `"E-D01"`.
    pub code: String,
    /// Severity band.
    pub severity: Severity,
    /// Functional area this issue is attributed to for readiness gating.
    pub area: Area,
    /// Polish-language human message.
    pub message: String,
    /// Affected element, if the issue is element-scoped.
    pub element_ref: Option<ElementRef>,
    /// Affected field name, if the issue is field-scoped.
    pub field: Option<String>,
    /// Human-readable remediation hint, Polish-language.
    pub fix_hint: Option<String>,
    /// A concrete action that would resolve the issue, if one can be proposed
    /// without guessing at values the user has not supplied.
    pub fix_action: Option<ActionPayload>,
}

/// Returns the `(severity, code, element_ref, message)` sort key used to
/// order issues within a severity bucket.
fn sort_key(issue: &ValidationIssue) -> (Severity, &str, Option<&ElementRef>, &str) {
    (issue.severity, issue.code.as_str(), issue.element_ref.as_ref(), issue.message.as_str())
}

// ============================================================================
// SECTION: Validation Report
// ============================================================================

/// The frozen, severity-partitioned output of a validation run.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ValidationReport {
    /// Issues that block dependent readiness gates.
    pub blockers: Vec<ValidationIssue>,
    /// Issues that do not block but are surfaced.
    pub warnings: Vec<ValidationIssue>,
    /// Informational issues.
    pub info: Vec<ValidationIssue>,
}

impl ValidationReport {
    /// Partitions and sorts a flat issue list into a report.
    #[must_use]
    fn from_issues(issues: Vec<ValidationIssue>) -> Self {
        let mut blockers = Vec::new();
        let mut warnings = Vec::new();
        let mut info = Vec::new();
        for issue in issues {
            match issue.severity {
                Severity::Blocker => blockers.push(issue),
                Severity::Warning => warnings.push(issue),
                Severity::Info => info.push(issue),
            }
        }
        blockers.sort_by(|a, b| sort_key(a).cmp(&sort_key(b)));
        warnings.sort_by(|a, b| sort_key(a).cmp(&sort_key(b)));
        info.sort_by(|a, b| sort_key(a).cmp(&sort_key(b)));
        Self { blockers, warnings, info }
    }

    /// `true` iff no blocker-severity issue is present.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.blockers.is_empty()
    }

    /// Iterates every issue regardless of severity, in report order
    /// (blockers, then warnings, then info).
    pub fn all_issues(&self) -> impl Iterator<Item = &ValidationIssue> {
        self.blockers.iter().chain(self.warnings.iter()).chain(self.info.iter())
    }

    /// Returns whether any blocker-severity issue is attributed to `area`.
    #[must_use]
    pub fn has_blocker_in(&self, area: Area) -> bool {
        self.blockers.iter().any(|issue| issue.area == area)
    }
}

// ============================================================================
// SECTION: Validation Engine
// ============================================================================

/// Stateless rule runner.
#[derive(Debug, Clone, Copy, Default)]
pub struct ValidationEngine;

impl ValidationEngine {
    /// Runs every rule against `snapshot` (and `catalog`, for rules that
    /// need to resolve a `type_ref`) and returns the aggregated report.
    #[must_use]
    pub fn run(&self, snapshot: &Snapshot, catalog: &CatalogRegistry) -> ValidationReport {
        let mut issues = Vec::new();
        issues.extend(rule_slack_present(snapshot));
        issues.extend(rule_connected(snapshot));
        issues.extend(rule_line_zero_impedance(snapshot));
        issues.extend(rule_transformer_nameplate(snapshot));
        issues.extend(rule_override_provenance(snapshot));
        issues.extend(rule_generator_connection(snapshot));
        issues.extend(rule_transformer_zero_sequence(snapshot, catalog));
        issues.extend(rule_source_zero_sequence(snapshot));
        ValidationReport::from_issues(issues)
    }
}

// ============================================================================
// SECTION: Rules — Topology
// ============================================================================

/// `E-D01`: at least one slack-kind node must exist.
fn rule_slack_present(snapshot: &Snapshot) -> Vec<ValidationIssue> {
    if snapshot.nodes().iter().any(|node| node.kind == NodeKind::Slack) {
        return Vec::new();
    }
    vec![ValidationIssue {
        code: "E-D01".to_string(),
        severity: Severity::Blocker,
        area: Area::Topology,
        message: "Brak węzła typu SLACK (przyłącze sieciowe) w modelu sieci".to_string(),
        element_ref: None,
        field: None,
        fix_hint: Some("Dodaj węzeł typu SLACK reprezentujący przyłącze sieciowe".to_string()),
        fix_action: None,
    }]
}

/// Finds the root of `node`'s set, compressing the path as it walks up.
fn dsu_find(parent: &mut [usize], node: usize) -> usize {
    if parent[node] != node {
        let root = dsu_find(parent, parent[node]);
        parent[node] = root;
    }
    parent[node]
}

/// Merges the sets containing `a` and `b`.
fn dsu_union(parent: &mut [usize], a: usize, b: usize) {
    let root_a = dsu_find(parent, a);
    let root_b = dsu_find(parent, b);
    if root_a != root_b {
        parent[root_a] = root_b;
    }
}

/// `E-D03`: the network graph forms a single connected component across
/// in-service branches and closed, in-service switches.
fn rule_connected(snapshot: &Snapshot) -> Vec<ValidationIssue> {
    let nodes = snapshot.nodes();
    if nodes.len() <= 1 {
        return Vec::new();
    }
    let index: BTreeMap<&str, usize> =
        nodes.iter().enumerate().map(|(i, node)| (node.id.as_str(), i)).collect();
    let mut parent: Vec<usize> = (0 .. nodes.len()).collect();

    for branch in snapshot.branches().iter().filter(|b| b.in_service) {
        if let (Some(&a), Some(&b)) =
            (index.get(branch.from_node.as_str()), index.get(branch.to_node.as_str()))
        {
            dsu_union(&mut parent, a, b);
        }
    }
    for switch in snapshot
        .switches()
        .iter()
        .filter(|s| s.in_service && s.state == SwitchState::Closed)
    {
        if let (Some(&a), Some(&b)) =
            (index.get(switch.from_node.as_str()), index.get(switch.to_node.as_str()))
        {
            dsu_union(&mut parent, a, b);
        }
    }

    let root = dsu_find(&mut parent, 0);
    let connected = (1 .. nodes.len()).all(|i| dsu_find(&mut parent, i) == root);
    if connected {
        return Vec::new();
    }
    vec![ValidationIssue {
        code: "E-D03".to_string(),
        severity: Severity::Blocker,
        area: Area::Topology,
        message: "Graf sieci nie tworzy jednej spójnej składowej (wykryto wyspy)".to_string(),
        element_ref: None,
        field: None,
        fix_hint: Some(
            "Połącz izolowane fragmenty sieci gałęzią lub zamkniętym łącznikiem".to_string(),
        ),
        fix_action: None,
    }]
}

// ============================================================================
// SECTION: Rules — Catalogs
// ============================================================================

/// `E-D05`: no in-service line/cable may have both zero impedance and no
/// catalog reference.
fn rule_line_zero_impedance(snapshot: &Snapshot) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();
    for branch in snapshot.branches().iter().filter(|b| b.in_service) {
        let BranchElectricalModel::LineLike { type_ref, impedance_override, instance, .. } =
            &branch.electrical
        else {
            continue;
        };
        if type_ref.is_some() || impedance_override.is_some() {
            continue;
        }
        if instance.r_ohm_per_km != 0.0 || instance.x_ohm_per_km != 0.0 {
            continue;
        }
        issues.push(ValidationIssue {
            code: "E-D05".to_string(),
            severity: Severity::Blocker,
            area: Area::Catalogs,
            message: format!(
                "Odcinek '{}' nie ma referencji katalogowej, nadpisania impedancji ani \
                 niezerowej impedancji własnej",
                branch.id
            ),
            element_ref: Some(ElementRef::Branch(branch.id.clone())),
            field: Some("type_ref".to_string()),
            fix_hint: Some(
                "Przypisz typ z katalogu lub wprowadź niezerowe parametry impedancji".to_string(),
            ),
            fix_action: None,
        });
    }
    issues
}

/// `E009`: a transformer with no catalog reference must have a valid
/// nameplate (positive rated power and short-circuit voltage).
fn rule_transformer_nameplate(snapshot: &Snapshot) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();
    for branch in snapshot.branches().iter().filter(|b| b.in_service) {
        let BranchElectricalModel::Transformer { type_ref, instance } = &branch.electrical else {
            continue;
        };
        if type_ref.is_some() {
            continue;
        }
        if instance.rated_power_mva > 0.0 && instance.uk_percent > 0.0 {
            continue;
        }
        issues.push(ValidationIssue {
            code: "E009".to_string(),
            severity: Severity::Blocker,
            area: Area::Catalogs,
            message: format!(
                "Transformator '{}' nie ma referencji katalogowej ani poprawnych danych \
                 znamionowych",
                branch.id
            ),
            element_ref: Some(ElementRef::Branch(branch.id.clone())),
            field: Some("type_ref".to_string()),
            fix_hint: Some(
                "Przypisz typ z katalogu lub popraw dane znamionowe transformatora".to_string(),
            ),
            fix_action: None,
        });
    }
    issues
}

/// `E010`: an explicit impedance override is present but the branch's
/// catalog binding provenance does not record any field as `override`.
fn rule_override_provenance(snapshot: &Snapshot) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();
    for branch in snapshot.branches().iter().filter(|b| b.in_service) {
        let BranchElectricalModel::LineLike { impedance_override: Some(_), .. } = &branch.electrical
        else {
            continue;
        };
        let declares_override = branch
            .catalog_binding
            .as_ref()
            .is_some_and(|binding| {
                binding.field_provenance.values().any(|prov| prov.source == SourceKind::Override)
            });
        if declares_override {
            continue;
        }
        issues.push(ValidationIssue {
            code: "E010".to_string(),
            severity: Severity::Blocker,
            area: Area::Catalogs,
            message: format!(
                "Odcinek '{}' ma nadpisanie impedancji, ale powiązanie katalogowe nie \
                 deklaruje źródła 'override'",
                branch.id
            ),
            element_ref: Some(ElementRef::Branch(branch.id.clone())),
            field: Some("impedance_override".to_string()),
            fix_hint: Some(
                "Zaktualizuj powiązanie katalogowe tak, by odzwierciedlało nadpisane pola"
                    .to_string(),
            ),
            fix_action: None,
        });
    }
    issues
}

// ============================================================================
// SECTION: Rules — Generators (defense-in-depth)
// ============================================================================

/// Generator connection-variant rules, distinct codes per failure mode.
/// Already enforced as hard invariants at
/// [`crate::core::snapshot::Snapshot::new`] time, so this can only fire on a
/// snapshot that should be structurally impossible to construct; kept for
/// representative coverage and so a future relaxation of the constructor
/// invariant is still caught here.
fn rule_generator_connection(snapshot: &Snapshot) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();
    for source in snapshot.sources().iter().filter(|s| s.in_service) {
        let Some(generator) = &source.generator else {
            continue;
        };
        let element_ref = Some(ElementRef::Source(source.id.clone()));
        if generator.type_ref.is_none() {
            issues.push(ValidationIssue {
                code: "E-GEN-CATALOG".to_string(),
                severity: Severity::Blocker,
                area: Area::Generators,
                message: format!("Generator '{}' nie ma referencji katalogowej", source.id),
                element_ref: element_ref.clone(),
                field: Some("type_ref".to_string()),
                fix_hint: Some("Przypisz typ z katalogu do generatora".to_string()),
                fix_action: None,
            });
        }
        if generator.generator_type == GeneratorType::Synchronous {
            continue;
        }
        match generator.connection_variant {
            None => issues.push(ValidationIssue {
                code: "E-GEN-VARIANT".to_string(),
                severity: Severity::Blocker,
                area: Area::Generators,
                message: format!(
                    "Generator OZE '{}' nie ma wariantu przyłączenia (nn_side lub \
                     block_transformer)",
                    source.id
                ),
                element_ref: element_ref.clone(),
                field: Some("connection_variant".to_string()),
                fix_hint: Some("Wybierz wariant przyłączenia generatora".to_string()),
                fix_action: None,
            }),
            Some(ConnectionVariant::NnSide) if generator.nn_side_substation.is_none() => {
                issues.push(ValidationIssue {
                    code: "E-GEN-NN-SUBSTATION".to_string(),
                    severity: Severity::Blocker,
                    area: Area::Generators,
                    message: format!(
                        "Generator OZE '{}': wariant 'po stronie nN' wymaga wskazania stacji",
                        source.id
                    ),
                    element_ref: element_ref.clone(),
                    field: Some("nn_side_substation".to_string()),
                    fix_hint: Some("Wskaż stację SN/nN w modelu".to_string()),
                    fix_action: None,
                });
            }
            Some(ConnectionVariant::BlockTransformer) if generator.block_transformer.is_none() => {
                issues.push(ValidationIssue {
                    code: "E-GEN-BLOCK-TRANSFORMER".to_string(),
                    severity: Severity::Blocker,
                    area: Area::Generators,
                    message: format!(
                        "Generator OZE '{}': wariant 'transformator blokowy' wymaga wskazania \
                         transformatora",
                        source.id
                    ),
                    element_ref,
                    field: Some("block_transformer".to_string()),
                    fix_hint: Some("Wskaż transformator blokowy w modelu".to_string()),
                    fix_action: None,
                });
            }
            Some(_) => {}
        }
    }
    issues
}

// ============================================================================
// SECTION: Rules — Analysis (zero-sequence completeness)
// ============================================================================

/// `W001`: a transformer's vector group carries no earthed/neutral-brought-
/// out winding (no `n` in its vector group label), so no zero-sequence
/// return path is declared for single-phase fault analysis.
fn rule_transformer_zero_sequence(
    snapshot: &Snapshot,
    catalog: &CatalogRegistry,
) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();
    for branch in snapshot.branches().iter().filter(|b| b.in_service) {
        let BranchElectricalModel::Transformer { type_ref, instance } = &branch.electrical else {
            continue;
        };
        let vector_group = match type_ref {
            Some(type_ref) => catalog
                .get(Namespace::TransformerMvLv, type_ref)
                .ok()
                .and_then(|item| item.parameter_str("vector_group"))
                .map(str::to_string),
            None => Some(instance.vector_group.clone()),
        };
        let grounded = vector_group.as_deref().is_some_and(|vg| vg.contains('n'));
        if grounded {
            continue;
        }
        issues.push(ValidationIssue {
            code: "W001".to_string(),
            severity: Severity::Warning,
            area: Area::Analysis,
            message: format!(
                "Transformator '{}' nie deklaruje uziemionego uzwojenia — brak danych \
                 składowej zerowej dla analizy zwarć jednofazowych",
                branch.id
            ),
            element_ref: Some(ElementRef::Branch(branch.id.clone())),
            field: Some("vector_group".to_string()),
            fix_hint: Some(
                "Potwierdź grupę połączeń z uziemionym punktem neutralnym lub dodaj dane \
                 składowej zerowej"
                    .to_string(),
            ),
            fix_action: None,
        });
    }
    issues
}

/// `W002`: a grid-tied source with no declared IEC 60909 voltage factor `c`,
/// needed for single-phase fault analysis.
fn rule_source_zero_sequence(snapshot: &Snapshot) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();
    for source in snapshot.sources().iter().filter(|s| s.in_service) {
        let SourceModel::Grid { voltage_factor: None, .. } = &source.model else {
            continue;
        };
        issues.push(ValidationIssue {
            code: "W002".to_string(),
            severity: Severity::Warning,
            area: Area::Analysis,
            message: format!(
                "Źródło sieciowe '{}' nie deklaruje współczynnika napięcia 'c' — brak danych \
                 dla analizy zwarć jednofazowych",
                source.id
            ),
            element_ref: Some(ElementRef::Source(source.id.clone())),
            field: Some("voltage_factor".to_string()),
            fix_hint: Some("Podaj współczynnik napięcia c wg IEC 60909".to_string()),
            fix_action: None,
        });
    }
    issues
}
