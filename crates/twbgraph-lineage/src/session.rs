//! One loaded workbook and everything derived from it.
//!
//! A [`WorkbookSession`] is built from scratch per load: decode → parse →
//! build → normalize → index. The graph, lookup index and neighborhood memo
//! are owned by the session, so independent sessions never share state and
//! reloading replaces all of it at once.

use std::collections::HashMap;

use tracing::{info, instrument};
use twbgraph_core::config::TwbgraphConfig;
use twbgraph_core::diagnostics::{Diagnostics, WarningKind};
use twbgraph_core::error::LoadError;
use twbgraph_core::load::{SourceInfo, decode_workbook};
use twbgraph_core::model::WorkbookMetadata;
use twbgraph_core::parser::parse_workbook;
use twbgraph_core::timing::timed;

use crate::graph::build::{build_graph, content_hash};
use crate::graph::cycles::{find_cycles, format_cycle};
use crate::graph::lookup::{LookupIndex, SearchEntry};
use crate::graph::model::{Edge, Graph, Node, NodeKind};
use crate::graph::normalize::{NormalizeReport, normalize_graph};
use crate::stats::GraphStats;
use crate::traverse::neighborhood::{Expansion, LineageGraph, NeighborhoodEngine};
use crate::traverse::rank::{Ranking, rank_from_root_tiers, rank_from_roots, rank_from_selection};

#[derive(Debug)]
pub struct WorkbookSession {
    source: Option<SourceInfo>,
    metadata: WorkbookMetadata,
    graph: Graph,
    positions: HashMap<String, usize>,
    lookup: LookupIndex,
    engine: NeighborhoodEngine,
    cycles: Vec<Vec<String>>,
    content_hash: String,
    normalize_report: NormalizeReport,
    diagnostics: Diagnostics,
}

impl WorkbookSession {
    /// Decode, parse and build a workbook from raw bytes.
    ///
    /// # Errors
    ///
    /// Returns a [`LoadError`] for rejected input (empty, wrong extension,
    /// over the size limit) or an unreadable document. Data-quality problems
    /// never fail the load; they are available from [`Self::diagnostics`].
    #[instrument(skip(bytes, config), fields(len = bytes.len()))]
    pub fn load(bytes: &[u8], file_name: &str, config: &TwbgraphConfig) -> Result<Self, LoadError> {
        let mut diagnostics = Diagnostics::new();
        let loaded = timed("decode", || {
            decode_workbook(bytes, file_name, &config.limits, &mut diagnostics)
        })?;
        let metadata = timed("parse", || parse_workbook(&loaded.document))?;
        Ok(Self::from_metadata(metadata, Some(loaded.source), config, diagnostics))
    }

    /// Replace this session with a freshly loaded workbook. On error the
    /// current session is left untouched.
    ///
    /// # Errors
    ///
    /// Same as [`Self::load`].
    pub fn reload(
        &mut self,
        bytes: &[u8],
        file_name: &str,
        config: &TwbgraphConfig,
    ) -> Result<(), LoadError> {
        *self = Self::load(bytes, file_name, config)?;
        Ok(())
    }

    /// Build a session from already parsed metadata.
    #[must_use]
    pub fn from_metadata(
        metadata: WorkbookMetadata,
        source: Option<SourceInfo>,
        config: &TwbgraphConfig,
        mut diagnostics: Diagnostics,
    ) -> Self {
        let built = timed("build", || build_graph(&metadata, &mut diagnostics));
        let (graph, report) = timed("normalize", || {
            normalize_graph(built.graph, &mut diagnostics)
        });
        Self::assemble(metadata, source, graph, report, built.cycles, config, diagnostics)
    }

    /// Build a session around an externally supplied graph payload. The
    /// graph is normalized and checked for cycles; there is no metadata.
    #[must_use]
    pub fn from_graph(graph: Graph, config: &TwbgraphConfig) -> Self {
        let mut diagnostics = Diagnostics::new();
        let (graph, report) = timed("normalize", || normalize_graph(graph, &mut diagnostics));
        let cycles = find_cycles(&graph);
        for cycle in &cycles {
            diagnostics.warn(
                WarningKind::CycleDetected,
                format!("circular dependency: {}", format_cycle(cycle)),
            );
        }
        Self::assemble(
            WorkbookMetadata::default(),
            None,
            graph,
            report,
            cycles,
            config,
            diagnostics,
        )
    }

    fn assemble(
        metadata: WorkbookMetadata,
        source: Option<SourceInfo>,
        graph: Graph,
        normalize_report: NormalizeReport,
        cycles: Vec<Vec<String>>,
        config: &TwbgraphConfig,
        diagnostics: Diagnostics,
    ) -> Self {
        let (lookup, lineage) = timed("index", || {
            (
                LookupIndex::from_nodes(&graph.nodes),
                LineageGraph::from_graph(&graph),
            )
        });
        let positions = graph
            .nodes
            .iter()
            .enumerate()
            .map(|(i, n)| (n.id.clone(), i))
            .collect();
        let content_hash = content_hash(&graph.edges);

        info!(
            nodes = graph.nodes.len(),
            edges = graph.edges.len(),
            cycles = cycles.len(),
            warnings = diagnostics.len(),
            %content_hash,
            "workbook session ready"
        );

        Self {
            source,
            metadata,
            graph,
            positions,
            lookup,
            engine: NeighborhoodEngine::new(lineage, config.traversal.clone()),
            cycles,
            content_hash,
            normalize_report,
            diagnostics,
        }
    }

    #[must_use]
    pub const fn source(&self) -> Option<&SourceInfo> {
        self.source.as_ref()
    }

    #[must_use]
    pub const fn metadata(&self) -> &WorkbookMetadata {
        &self.metadata
    }

    #[must_use]
    pub const fn graph(&self) -> &Graph {
        &self.graph
    }

    #[must_use]
    pub const fn lookup(&self) -> &LookupIndex {
        &self.lookup
    }

    #[must_use]
    pub const fn lineage(&self) -> &LineageGraph {
        self.engine.lineage()
    }

    #[must_use]
    pub fn cycles(&self) -> &[Vec<String>] {
        &self.cycles
    }

    #[must_use]
    pub fn content_hash(&self) -> &str {
        &self.content_hash
    }

    #[must_use]
    pub const fn normalize_report(&self) -> NormalizeReport {
        self.normalize_report
    }

    #[must_use]
    pub const fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    #[must_use]
    pub fn stats(&self) -> GraphStats {
        GraphStats::compute(
            &self.graph,
            self.engine.lineage(),
            self.cycles.len(),
            &self.content_hash,
        )
    }

    #[must_use]
    pub fn node(&self, id: &str) -> Option<&Node> {
        self.positions.get(id).map(|&i| &self.graph.nodes[i])
    }

    /// Find a node by canonical id or by name.
    #[must_use]
    pub fn resolve(&self, id_or_name: &str) -> Option<&Node> {
        self.lookup.resolve(id_or_name).and_then(|id| self.node(id))
    }

    #[must_use]
    pub fn search(&self, query: &str, limit: usize) -> Vec<&SearchEntry> {
        self.lookup.search(query, limit)
    }

    /// Edges pointing at `id`: what it depends on.
    #[must_use]
    pub fn edges_into(&self, id: &str) -> Vec<&Edge> {
        self.graph.edges.iter().filter(|e| e.target == id).collect()
    }

    /// Edges leaving `id`: what depends on it.
    #[must_use]
    pub fn edges_from(&self, id: &str) -> Vec<&Edge> {
        self.graph.edges.iter().filter(|e| e.source == id).collect()
    }

    #[must_use]
    pub fn closed_neighborhood(&self, id: &str) -> Vec<String> {
        self.engine.closed_neighborhood(id).into_iter().collect()
    }

    pub fn expand_neighborhood(&mut self, id: &str, depth: usize) -> Expansion {
        self.engine.expand_neighborhood(id, depth)
    }

    #[must_use]
    pub fn rank_from_roots(&self, roots: &[String]) -> Ranking {
        rank_from_roots(self.engine.lineage(), roots)
    }

    /// Rank from dashboards, or from worksheets when there are none.
    #[must_use]
    pub fn rank_hierarchy(&self) -> Ranking {
        let tier = |kind| {
            self.graph
                .nodes_of_kind(kind)
                .map(|n| n.id.clone())
                .collect::<Vec<_>>()
        };
        let tiers = [tier(NodeKind::Dashboard), tier(NodeKind::Worksheet)];
        rank_from_root_tiers(self.engine.lineage(), &tiers)
    }

    #[must_use]
    pub fn rank_from_selection(&self, id: &str) -> Option<Ranking> {
        rank_from_selection(self.engine.lineage(), id)
    }

    #[must_use]
    pub fn neighborhood_cache_len(&self) -> usize {
        self.engine.cache_len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use twbgraph_core::error::{FormatError, InputError};

    const WORKBOOK: &str = r"<?xml version='1.0' encoding='utf-8' ?>
<workbook>
  <datasources>
    <datasource name='Parameters'>
      <column name='[Parameter 1]' caption='Growth Rate' datatype='real' value='0.1'/>
    </datasource>
    <datasource name='federated.1' caption='Orders'>
      <column name='[Sales]' datatype='real' role='measure'/>
      <column name='[Profit]' datatype='real' role='measure'/>
      <column name='[Calculation_1]' caption='Profit' datatype='real'>
        <calculation class='tableau' formula='SUM([Profit])'/>
      </column>
      <column name='[Calculation_2]' caption='Target' datatype='real'>
        <calculation class='tableau' formula='[Sales] * (1 + [:Growth Rate])'/>
      </column>
    </datasource>
  </datasources>
  <worksheets>
    <worksheet name='Overview'><table><view>
      <datasource-dependencies datasource='federated.1'>
        <column name='[Calculation_1]' caption='Profit'/>
        <column name='[Calculation_2]' caption='Target'/>
      </datasource-dependencies>
    </view></table></worksheet>
  </worksheets>
  <dashboards>
    <dashboard name='Exec'><zones><zone name='Overview' id='1'/></zones></dashboard>
  </dashboards>
</workbook>";

    fn session() -> WorkbookSession {
        WorkbookSession::load(WORKBOOK.as_bytes(), "sample.twb", &TwbgraphConfig::default())
            .expect("load")
    }

    #[test]
    fn load_builds_a_clean_graph() {
        let s = session();
        assert_eq!(s.graph().nodes.len(), 7);
        assert!(s.normalize_report().is_clean());
        assert!(s.cycles().is_empty());
        assert!(s.diagnostics().is_empty(), "{:?}", s.diagnostics());
        assert_eq!(s.source().map(|src| src.file_name.as_str()), Some("sample.twb"));
        assert!(s.content_hash().starts_with("blake3:"));
    }

    #[test]
    fn resolve_accepts_ids_and_names() {
        let s = session();
        assert_eq!(s.resolve("Calculation_1").map(|n| n.name.as_str()), Some("Profit"));
        assert_eq!(s.resolve("profit").map(|n| n.id.as_str()), Some("Calculation_1"));
        assert_eq!(s.resolve("growth rate").map(|n| n.kind), Some(NodeKind::Parameter));
        assert!(s.resolve("nope").is_none());
    }

    #[test]
    fn edges_follow_lineage_direction() {
        let s = session();
        let into_target: Vec<_> = s
            .edges_into("Calculation_2")
            .into_iter()
            .map(|e| e.source.as_str())
            .collect();
        assert_eq!(into_target, vec!["Sales", "Parameter 1"]);
        let from_sheet: Vec<_> = s.edges_from("Overview").into_iter().map(|e| e.target.as_str()).collect();
        assert_eq!(from_sheet, vec!["Exec"]);
    }

    #[test]
    fn hierarchy_ranks_from_dashboards() {
        let s = session();
        let ranking = s.rank_hierarchy();
        assert_eq!(ranking.roots, vec!["Exec"]);
        assert_eq!(ranking.rank_of("Overview"), Some(1));
        assert_eq!(ranking.rank_of("Calculation_1"), Some(2));
        assert_eq!(ranking.rank_of("Profit"), Some(3));
        assert_eq!(ranking.rank_of("Parameter 1"), Some(3));
    }

    #[test]
    fn expansion_is_memoized_per_session() {
        let mut s = session();
        let one = s.expand_neighborhood("Overview", 1);
        assert_eq!(
            one.nodes.iter().map(String::as_str).collect::<Vec<_>>(),
            vec!["Calculation_1", "Calculation_2", "Exec", "Overview"]
        );
        s.expand_neighborhood("Overview", 1);
        assert_eq!(s.neighborhood_cache_len(), 1);

        s.reload(WORKBOOK.as_bytes(), "sample.twb", &TwbgraphConfig::default())
            .expect("reload");
        assert_eq!(s.neighborhood_cache_len(), 0);
    }

    #[test]
    fn failed_reload_keeps_the_current_session() {
        let mut s = session();
        let hash = s.content_hash().to_string();
        let err = s
            .reload(b"", "sample.twb", &TwbgraphConfig::default())
            .expect_err("empty input");
        assert!(matches!(err, LoadError::Input(InputError::Empty(_))));
        assert_eq!(s.content_hash(), hash);
    }

    #[test]
    fn malformed_markup_is_a_format_error() {
        let err = WorkbookSession::load(b"<workbook>", "x.twb", &TwbgraphConfig::default())
            .expect_err("malformed");
        assert!(matches!(err, LoadError::Format(FormatError::MalformedXml(_))));
    }

    #[test]
    fn worksheet_usage_binds_to_the_named_datasource() {
        let xml = r"<workbook><datasources>
              <datasource name='federated.a'>
                <column name='[Calculation_1]' caption='Profit Ratio'>
                  <calculation class='tableau' formula='SUM([Profit])'/>
                </column>
              </datasource>
              <datasource name='federated.b'>
                <column name='[Calculation_1]' caption='Margin'>
                  <calculation class='tableau' formula='SUM([Profit])'/>
                </column>
              </datasource>
            </datasources>
            <worksheets><worksheet name='S'><table><view>
              <datasource-dependencies datasource='federated.b'>
                <column name='[Calculation_1]'/>
              </datasource-dependencies>
            </view></table></worksheet></worksheets>
          </workbook>";
        let s = WorkbookSession::load(xml.as_bytes(), "dup.twb", &TwbgraphConfig::default())
            .expect("load");

        let margin = s.resolve("Margin").map(|n| n.id.clone()).expect("margin node");
        let sources: Vec<_> = s.edges_into("S").into_iter().map(|e| e.source.clone()).collect();
        assert_eq!(sources, vec![margin]);
    }

    #[test]
    fn external_graph_is_normalized() {
        let graph = Graph::from_json(
            r#"{"nodes":[{"id":"a","type":"Field","name":"A"},{"id":"b","type":"Worksheet","name":"B"}],
                "edges":[{"source":"a","target":"b","rel":"USED_IN"},
                         {"source":"a","target":"zzz","rel":"USED_IN"}]}"#,
        )
        .expect("json");
        let s = WorkbookSession::from_graph(graph, &TwbgraphConfig::default());
        assert_eq!(s.graph().edges.len(), 1);
        assert_eq!(s.normalize_report().dangling_edges, 1);
        assert!(s.source().is_none());
        assert_eq!(s.resolve("A").map(|n| n.id.as_str()), Some("a"));
    }
}
