//! Metadata model → canonical lineage graph.
//!
//! # Overview
//!
//! 1. Every datasource field, parameter, worksheet and dashboard becomes a
//!    node with a unique canonical id (see [`crate::graph::ids`]).
//! 2. Each node is registered in a [`NameIndex`] under its display name and
//!    its internal identifier, partitioned by kind.
//! 3. References are resolved by name:
//!    - calculation formula tokens: other calculations first, then raw
//!      fields, then parameters. A calculation never resolves to itself.
//!    - worksheet field usage: calculations first, then raw fields.
//!    - dashboard sheets: worksheets.
//!
//!    Within a kind, a candidate from the consumer's own datasource wins.
//! 4. Edges are deduplicated by `(source, target, rel)`.
//! 5. Usage lists on nodes are filled from the edge set, and the cycle
//!    detector runs for diagnostics.
//!
//! ## Shared captions
//!
//! A worksheet that uses "Profit" when the workbook has both a raw `Profit`
//! column and a calculation captioned `Profit` is showing the calculation;
//! Tableau hides the shadowed column.
//!
//! ## Content hash
//!
//! The output carries a BLAKE3 hash of the sorted edge triples so callers
//! can tell whether two loads produced the same lineage.

use std::collections::{HashMap, HashSet};

use tracing::{debug, info, instrument};
use twbgraph_core::diagnostics::{Diagnostics, WarningKind};
use twbgraph_core::model::{Field, WorkbookMetadata};
use twbgraph_core::parser::strip_brackets;

use crate::graph::classify;
use crate::graph::cycles::{find_cycles, format_cycle};
use crate::graph::ids::{IdAllocator, IdSource, clean_internal_id};
use crate::graph::lookup::LookupIndex;
use crate::graph::model::{Edge, Graph, Node, NodeKind, Relation};
use crate::graph::names::{NameIndex, normalize_name};

const FORMULA_PRIORITY: [NodeKind; 2] = [NodeKind::CalculatedField, NodeKind::Field];
const USAGE_PRIORITY: [NodeKind; 2] = [NodeKind::CalculatedField, NodeKind::Field];

/// Everything produced by one build.
#[derive(Debug, Clone)]
pub struct BuiltGraph {
    pub graph: Graph,
    pub lookup: LookupIndex,
    pub cycles: Vec<Vec<String>>,
    /// `blake3:<hex>` over the sorted edge triples.
    pub content_hash: String,
}

/// Build the lineage graph for `metadata`.
///
/// Never fails: unresolved references, id collisions and cycles are recorded
/// in `diagnostics` and the best graph available is returned.
#[instrument(skip(metadata, diagnostics))]
pub fn build_graph(metadata: &WorkbookMetadata, diagnostics: &mut Diagnostics) -> BuiltGraph {
    let mut builder = Builder::new(metadata);

    let mut calculations = Vec::new();
    for ds in &metadata.datasources {
        for field in &ds.fields {
            let pos = builder.add_field(field, &ds.caption, diagnostics);
            if field.is_calculated {
                calculations.push(pos);
            }
        }
    }
    for param in &metadata.parameters {
        let pos = builder.add_node(NodeKind::Parameter, &param.id, &param.caption, diagnostics);
        builder.nodes[pos].datatype.clone_from(&param.datatype);
    }
    let worksheets: Vec<(usize, &[String])> = metadata
        .worksheets
        .iter()
        .map(|ws| {
            let pos = builder.add_node(NodeKind::Worksheet, &ws.id, &ws.caption, diagnostics);
            (pos, ws.fields_used.as_slice())
        })
        .collect();
    let dashboards: Vec<(usize, &[String])> = metadata
        .dashboards
        .iter()
        .map(|db| {
            let pos = builder.add_node(NodeKind::Dashboard, &db.id, &db.caption, diagnostics);
            (pos, db.worksheets.as_slice())
        })
        .collect();

    for pos in calculations {
        builder.link_calculation(pos, diagnostics);
    }
    for (pos, fields_used) in worksheets {
        builder.link_worksheet(pos, fields_used, diagnostics);
    }
    for (pos, sheets) in dashboards {
        builder.link_dashboard(pos, sheets, diagnostics);
    }

    let graph = builder.finish();
    let cycles = find_cycles(&graph);
    for cycle in &cycles {
        diagnostics.warn(
            WarningKind::CycleDetected,
            format!("circular dependency: {}", format_cycle(cycle)),
        );
    }

    let lookup = LookupIndex::from_nodes(&graph.nodes);
    let content_hash = content_hash(&graph.edges);

    info!(
        nodes = graph.nodes.len(),
        edges = graph.edges.len(),
        cycles = cycles.len(),
        "lineage graph built"
    );

    BuiltGraph {
        graph,
        lookup,
        cycles,
        content_hash,
    }
}

/// BLAKE3 over the sorted `(source, rel, target)` triples.
#[must_use]
pub fn content_hash(edges: &[Edge]) -> String {
    let mut triples: Vec<(&str, &str, &str)> = edges
        .iter()
        .map(|e| (e.source.as_str(), e.rel.as_str(), e.target.as_str()))
        .collect();
    triples.sort_unstable();

    let mut hasher = blake3::Hasher::new();
    for (source, rel, target) in triples {
        hasher.update(source.as_bytes());
        hasher.update(b"\x00");
        hasher.update(rel.as_bytes());
        hasher.update(b"\x00");
        hasher.update(target.as_bytes());
        hasher.update(b"\n");
    }
    format!("blake3:{}", hasher.finalize().to_hex())
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Edges keyed by their identity triple, in first-seen order.
#[derive(Debug, Default)]
struct EdgeSet {
    seen: HashSet<(String, String, Relation)>,
    edges: Vec<Edge>,
}

impl EdgeSet {
    fn add(&mut self, source: &str, target: &str, rel: Relation) -> bool {
        if !self
            .seen
            .insert((source.to_string(), target.to_string(), rel))
        {
            return false;
        }
        self.edges.push(Edge::new(source, target, rel));
        true
    }
}

struct Builder {
    ids: IdAllocator,
    names: NameIndex,
    nodes: Vec<Node>,
    position: HashMap<String, usize>,
    /// Normalized datasource names; formula tokens like `[federated.1]` or
    /// `[Parameters]` qualify a field rather than name one.
    qualifiers: HashSet<String>,
    edges: EdgeSet,
}

impl Builder {
    fn new(metadata: &WorkbookMetadata) -> Self {
        let mut qualifiers: HashSet<String> = metadata
            .datasources
            .iter()
            .flat_map(|ds| [normalize_name(&ds.id), normalize_name(&ds.caption)])
            .collect();
        qualifiers.insert(normalize_name(twbgraph_core::parser::PARAMETERS_DATASOURCE));

        Self {
            ids: IdAllocator::new(),
            names: NameIndex::new(),
            nodes: Vec::new(),
            position: HashMap::new(),
            qualifiers,
            edges: EdgeSet::default(),
        }
    }

    fn add_node(
        &mut self,
        kind: NodeKind,
        raw_id: &str,
        name: &str,
        diagnostics: &mut Diagnostics,
    ) -> usize {
        let allocation = self.ids.allocate(kind, raw_id, name);
        if allocation.collided {
            diagnostics.warn(
                WarningKind::DuplicateId,
                format!(
                    "{kind} '{name}': internal id '{}' already used, assigned '{}'",
                    clean_internal_id(raw_id),
                    allocation.id
                ),
            );
        } else if allocation.source == IdSource::Random {
            debug!(%kind, name, id = %allocation.id, "slug suffixes exhausted");
        }

        let id = allocation.id;
        self.names.insert(kind, name, &id);
        let cleaned = clean_internal_id(raw_id);
        if !cleaned.is_empty() && normalize_name(&cleaned) != normalize_name(name) {
            self.names.insert(kind, &cleaned, &id);
        }

        let mut node = Node::new(id.clone(), kind, name);
        node.raw_name = raw_id.to_string();
        let pos = self.nodes.len();
        self.nodes.push(node);
        self.position.insert(id, pos);
        pos
    }

    fn add_field(&mut self, field: &Field, datasource: &str, diagnostics: &mut Diagnostics) -> usize {
        let kind = if field.is_calculated {
            NodeKind::CalculatedField
        } else {
            NodeKind::Field
        };
        let pos = self.add_node(kind, &field.id, &field.display_name, diagnostics);

        let node = &mut self.nodes[pos];
        node.datasource = Some(datasource.to_string());
        node.datatype.clone_from(&field.datatype);
        node.role.clone_from(&field.role);
        if let Some(calc) = &field.calculation {
            node.is_lod = classify::is_lod(&calc.formula);
            node.is_table_calc = classify::is_table_calc(&calc.formula);
            node.formula = Some(calc.formula.clone());
        }
        node.references.clone_from(&field.references);
        pos
    }

    /// Resolve `label` to a node id, excluding `exclude` and preferring
    /// candidates from `datasource`.
    fn resolve(
        &self,
        label: &str,
        priority: &[NodeKind],
        exclude: Option<&str>,
        datasource: Option<&str>,
    ) -> Option<String> {
        let same_datasource = |id: &str| {
            datasource.is_some()
                && self
                    .position
                    .get(id)
                    .and_then(|&p| self.nodes[p].datasource.as_deref())
                    == datasource
        };
        self.names
            .resolve(label, priority, |id| Some(id) != exclude, same_datasource)
            .map(|(id, _)| id.to_string())
    }

    fn link_calculation(&mut self, pos: usize, diagnostics: &mut Diagnostics) {
        let calc = &self.nodes[pos];
        let Some(refs) = calc.references.clone() else {
            return;
        };
        let calc_id = calc.id.clone();
        let calc_name = calc.name.clone();
        let datasource = calc.datasource.clone();

        for token in &refs.fields {
            let label = strip_brackets(token);
            let hit = self
                .resolve(label, &FORMULA_PRIORITY, Some(&calc_id), datasource.as_deref())
                .map(|id| (id, Relation::Feeds))
                .or_else(|| {
                    self.resolve(label, &[NodeKind::Parameter], None, None)
                        .map(|id| (id, Relation::ParamOf))
                });
            match hit {
                Some((source, rel)) => {
                    self.edges.add(&source, &calc_id, rel);
                }
                None if self.qualifiers.contains(&normalize_name(label)) => {}
                None => unresolved(diagnostics, &calc_name, token),
            }
        }

        for param in &refs.parameters {
            match self.resolve(param, &[NodeKind::Parameter], None, None) {
                Some(source) => {
                    self.edges.add(&source, &calc_id, Relation::ParamOf);
                }
                None => unresolved(diagnostics, &calc_name, &format!("[:{param}]")),
            }
        }
    }

    fn link_worksheet(&mut self, pos: usize, fields_used: &[String], diagnostics: &mut Diagnostics) {
        let sheet_id = self.nodes[pos].id.clone();
        for label in fields_used {
            match self.resolve(label, &USAGE_PRIORITY, None, None) {
                Some(source) => {
                    self.edges.add(&source, &sheet_id, Relation::UsedIn);
                }
                None => unresolved(diagnostics, &self.nodes[pos].name, label),
            }
        }
    }

    fn link_dashboard(&mut self, pos: usize, sheets: &[String], diagnostics: &mut Diagnostics) {
        let dashboard_id = self.nodes[pos].id.clone();
        for sheet in sheets {
            match self.resolve(sheet, &[NodeKind::Worksheet], None, None) {
                Some(source) => {
                    self.edges.add(&source, &dashboard_id, Relation::On);
                }
                None => unresolved(diagnostics, &self.nodes[pos].name, sheet),
            }
        }
    }

    /// Fill usage lists from the edge set and hand back the graph.
    fn finish(mut self) -> Graph {
        for edge in &self.edges.edges {
            let Some(&source) = self.position.get(&edge.source) else {
                continue;
            };
            let list = match edge.rel {
                Relation::Feeds | Relation::ParamOf => &mut self.nodes[source].referenced_by,
                Relation::UsedIn => &mut self.nodes[source].used_in_worksheets,
                Relation::On => &mut self.nodes[source].used_in_dashboards,
            };
            list.push(edge.target.clone());
        }

        Graph {
            nodes: self.nodes,
            edges: self.edges.edges,
        }
    }
}

fn unresolved(diagnostics: &mut Diagnostics, consumer: &str, reference: &str) {
    diagnostics.warn(
        WarningKind::UnresolvedReference,
        format!("'{consumer}' references '{reference}', which matches no node"),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use twbgraph_core::model::{
        Calculation, Dashboard, Datasource, Parameter, References, Worksheet,
    };
    use twbgraph_core::refs::extract_references;

    fn raw(id: &str, caption: Option<&str>) -> Field {
        Field {
            id: id.to_string(),
            caption: caption.map(str::to_string),
            display_name: caption
                .map_or_else(|| strip_brackets(id).to_string(), str::to_string),
            datatype: Some("real".into()),
            role: Some("measure".into()),
            default_aggregation: None,
            is_calculated: false,
            calculation: None,
            references: None,
        }
    }

    fn calc(id: &str, caption: &str, formula: &str) -> Field {
        Field {
            is_calculated: true,
            calculation: Some(Calculation {
                formula: formula.to_string(),
                class: Some("tableau".into()),
            }),
            references: Some(extract_references(formula)),
            ..raw(id, Some(caption))
        }
    }

    fn datasource(name: &str, fields: Vec<Field>) -> Datasource {
        Datasource {
            id: name.to_string(),
            caption: name.to_string(),
            connections: Vec::new(),
            fields,
        }
    }

    fn sheet(name: &str, fields: &[&str]) -> Worksheet {
        Worksheet {
            id: name.to_string(),
            caption: name.to_string(),
            fields_used: fields.iter().map(|f| (*f).to_string()).collect(),
        }
    }

    fn has_edge(graph: &Graph, source: &str, target: &str, rel: Relation) -> bool {
        graph
            .edges
            .iter()
            .any(|e| e.source == source && e.target == target && e.rel == rel)
    }

    fn build(metadata: &WorkbookMetadata) -> (BuiltGraph, Diagnostics) {
        let mut diagnostics = Diagnostics::new();
        let out = build_graph(metadata, &mut diagnostics);
        (out, diagnostics)
    }

    #[test]
    fn worksheet_binds_shared_caption_to_the_calculation() {
        let metadata = WorkbookMetadata {
            datasources: vec![datasource(
                "Orders",
                vec![
                    raw("[Profit]", None),
                    calc("[Calculation_1]", "Profit", "SUM([Profit])"),
                ],
            )],
            worksheets: vec![sheet("Overview", &["Profit"])],
            ..WorkbookMetadata::default()
        };
        let (out, diagnostics) = build(&metadata);

        assert!(has_edge(&out.graph, "Calculation_1", "Overview", Relation::UsedIn));
        assert!(!has_edge(&out.graph, "Profit", "Overview", Relation::UsedIn));
        // the calculation's own [Profit] token binds to the raw column
        assert!(has_edge(&out.graph, "Profit", "Calculation_1", Relation::Feeds));
        assert!(out.cycles.is_empty());
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn other_calculations_prefer_the_calculation_too() {
        let metadata = WorkbookMetadata {
            datasources: vec![datasource(
                "Orders",
                vec![
                    raw("[Profit]", None),
                    calc("[Calculation_1]", "Profit", "SUM([Profit])"),
                    calc("[Calculation_2]", "Double Profit", "[Profit] * 2"),
                ],
            )],
            ..WorkbookMetadata::default()
        };
        let (out, _) = build(&metadata);
        assert!(has_edge(&out.graph, "Calculation_1", "Calculation_2", Relation::Feeds));
        assert!(!has_edge(&out.graph, "Profit", "Calculation_2", Relation::Feeds));
    }

    #[test]
    fn empty_ids_with_shared_caption_get_distinct_slugs() {
        let metadata = WorkbookMetadata {
            datasources: vec![datasource(
                "Orders",
                vec![raw("", Some("Total")), raw("", Some("Total"))],
            )],
            ..WorkbookMetadata::default()
        };
        let (out, _) = build(&metadata);
        let ids: Vec<_> = out.graph.nodes.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["field:total", "field:total-2"]);
    }

    #[test]
    fn duplicate_internal_ids_warn_and_fall_back() {
        let metadata = WorkbookMetadata {
            datasources: vec![
                datasource("A", vec![raw("[Sales]", None)]),
                datasource("B", vec![raw("[Sales]", None)]),
            ],
            ..WorkbookMetadata::default()
        };
        let (out, diagnostics) = build(&metadata);
        let ids: Vec<_> = out.graph.nodes.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["Sales", "field:sales"]);
        assert_eq!(diagnostics.count(WarningKind::DuplicateId), 1);
    }

    #[test]
    fn same_datasource_candidate_wins() {
        let metadata = WorkbookMetadata {
            datasources: vec![
                datasource("A", vec![raw("[Sales]", None)]),
                datasource(
                    "B",
                    vec![raw("[Sales]", None), calc("[Calculation_1]", "Twice", "[Sales] * 2")],
                ),
            ],
            ..WorkbookMetadata::default()
        };
        let (out, _) = build(&metadata);
        assert!(has_edge(&out.graph, "field:sales", "Calculation_1", Relation::Feeds));
        assert!(!has_edge(&out.graph, "Sales", "Calculation_1", Relation::Feeds));
    }

    #[test]
    fn duplicate_triples_collapse_to_one_edge() {
        let metadata = WorkbookMetadata {
            datasources: vec![datasource("Orders", vec![raw("[Sales]", None)])],
            worksheets: vec![sheet("Overview", &["Sales", "sales", " SALES "])],
            ..WorkbookMetadata::default()
        };
        let (out, _) = build(&metadata);
        assert_eq!(out.graph.edges.len(), 1);
        assert_eq!(out.graph.nodes[0].used_in_worksheets, vec!["Overview"]);
    }

    #[test]
    fn edge_set_rejects_repeated_triples() {
        let mut set = EdgeSet::default();
        assert!(set.add("a", "b", Relation::Feeds));
        assert!(!set.add("a", "b", Relation::Feeds));
        assert!(set.add("a", "b", Relation::UsedIn));
        assert_eq!(set.edges.len(), 2);
    }

    #[test]
    fn parameters_link_by_colon_token_and_qualified_name() {
        let metadata = WorkbookMetadata {
            datasources: vec![datasource(
                "Orders",
                vec![
                    raw("[Sales]", None),
                    calc("[Calculation_1]", "Target", "[Sales] * (1 + [:Growth Rate])"),
                    calc("[Calculation_2]", "Stretch", "[Sales] * [Parameters].[Parameter 1]"),
                ],
            )],
            parameters: vec![Parameter {
                id: "[Parameter 1]".into(),
                caption: "Growth Rate".into(),
                datatype: Some("real".into()),
                current_value: Some("0.05".into()),
            }],
            ..WorkbookMetadata::default()
        };
        let (out, diagnostics) = build(&metadata);

        assert!(has_edge(&out.graph, "Parameter 1", "Calculation_1", Relation::ParamOf));
        assert!(has_edge(&out.graph, "Parameter 1", "Calculation_2", Relation::ParamOf));
        assert_eq!(diagnostics.count(WarningKind::UnresolvedReference), 0);

        let param = out.graph.node("Parameter 1").expect("param node");
        assert_eq!(param.referenced_by, vec!["Calculation_1", "Calculation_2"]);
    }

    #[test]
    fn dashboards_link_to_known_worksheets_only() {
        let metadata = WorkbookMetadata {
            worksheets: vec![sheet("Overview", &[]), sheet("Trend", &[])],
            dashboards: vec![Dashboard {
                id: "Exec".into(),
                caption: "Exec".into(),
                worksheets: vec!["Overview".into(), "Trend".into(), "Missing".into()],
            }],
            ..WorkbookMetadata::default()
        };
        let (out, diagnostics) = build(&metadata);

        assert!(has_edge(&out.graph, "Overview", "Exec", Relation::On));
        assert!(has_edge(&out.graph, "Trend", "Exec", Relation::On));
        assert_eq!(out.graph.edges.len(), 2);
        assert_eq!(diagnostics.count(WarningKind::UnresolvedReference), 1);
        assert_eq!(
            out.graph.node("Overview").expect("sheet").used_in_dashboards,
            vec!["Exec"]
        );
    }

    #[test]
    fn calculation_flags_and_attributes_are_copied() {
        let metadata = WorkbookMetadata {
            datasources: vec![datasource(
                "Orders",
                vec![
                    raw("[Region]", None),
                    raw("[Sales]", None),
                    calc("[c1]", "Regional Sales", "{FIXED [Region] : SUM([Sales])}"),
                    calc("[c2]", "Running", "RUNNING_SUM(SUM([Sales]))"),
                ],
            )],
            ..WorkbookMetadata::default()
        };
        let (out, _) = build(&metadata);

        let lod = out.graph.node("c1").expect("c1");
        assert_eq!(lod.kind, NodeKind::CalculatedField);
        assert!(lod.is_lod);
        assert!(!lod.is_table_calc);
        assert_eq!(lod.datasource.as_deref(), Some("Orders"));
        assert_eq!(lod.raw_name, "[c1]");
        assert_eq!(
            lod.references,
            Some(References {
                fields: vec!["[Region]".into(), "[Sales]".into()],
                parameters: Vec::new(),
            })
        );

        let running = out.graph.node("c2").expect("c2");
        assert!(running.is_table_calc);
        assert!(!running.is_lod);
    }

    #[test]
    fn calculation_cycles_are_reported_not_rejected() {
        let metadata = WorkbookMetadata {
            datasources: vec![datasource(
                "Orders",
                vec![
                    calc("[a]", "A", "[C] + 1"),
                    calc("[b]", "B", "[A] + 1"),
                    calc("[c]", "C", "[B] + 1"),
                ],
            )],
            ..WorkbookMetadata::default()
        };
        let (out, diagnostics) = build(&metadata);

        assert_eq!(out.graph.edges.len(), 3);
        assert_eq!(out.cycles.len(), 1);
        let mut members = out.cycles[0].clone();
        members.sort();
        assert_eq!(members, vec!["a", "b", "c"]);
        assert_eq!(diagnostics.count(WarningKind::CycleDetected), 1);
    }

    #[test]
    fn unresolved_and_qualifier_tokens() {
        let metadata = WorkbookMetadata {
            datasources: vec![datasource(
                "federated.1",
                vec![
                    raw("[Sales]", None),
                    calc("[c1]", "Mixed", "[federated.1].[Sales] + [Nowhere]"),
                ],
            )],
            ..WorkbookMetadata::default()
        };
        let (out, diagnostics) = build(&metadata);

        assert!(has_edge(&out.graph, "Sales", "c1", Relation::Feeds));
        assert_eq!(diagnostics.count(WarningKind::UnresolvedReference), 1);
        assert!(diagnostics.warnings()[0].message.contains("[Nowhere]"));
    }

    #[test]
    fn internal_ids_are_resolvable_names() {
        let metadata = WorkbookMetadata {
            datasources: vec![datasource(
                "Orders",
                vec![
                    calc("[Calculation_7]", "Margin", "0.5"),
                    calc("[Calculation_8]", "Margin x2", "[Calculation_7] * 2"),
                ],
            )],
            ..WorkbookMetadata::default()
        };
        let (out, _) = build(&metadata);
        assert!(has_edge(&out.graph, "Calculation_7", "Calculation_8", Relation::Feeds));
    }

    #[test]
    fn build_is_deterministic() {
        let metadata = WorkbookMetadata {
            datasources: vec![datasource(
                "Orders",
                vec![
                    raw("[Sales]", None),
                    raw("", Some("Total")),
                    calc("[c1]", "Twice", "[Sales] * 2"),
                ],
            )],
            worksheets: vec![sheet("Overview", &["Twice", "Total"])],
            ..WorkbookMetadata::default()
        };
        let (first, _) = build(&metadata);
        let (second, _) = build(&metadata);
        assert_eq!(first.graph, second.graph);
        assert_eq!(first.content_hash, second.content_hash);
        assert!(first.content_hash.starts_with("blake3:"));
    }

    #[test]
    fn content_hash_ignores_edge_order() {
        let a = vec![
            Edge::new("x", "y", Relation::Feeds),
            Edge::new("y", "z", Relation::UsedIn),
        ];
        let mut b = a.clone();
        b.reverse();
        assert_eq!(content_hash(&a), content_hash(&b));
        assert_ne!(content_hash(&a), content_hash(&a[..1]));
    }
}
