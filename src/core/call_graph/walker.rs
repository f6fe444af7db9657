// src/core/call_graph/walker.rs
use std::collections::HashMap;
use tracing::{debug, warn};

use crate::config::{ContextDetail, ResolutionConfig};
use crate::core::source::SourceLocator;
use crate::error::Result;
use super::{CallSite, ContextResolver, Graph, GraphNode, Method, NodeId};

/// One serialized edge: caller, call site, callee and both contexts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputRecord {
    pub caller: String,
    /// Source location when resolvable, raw site text otherwise
    pub call_site: String,
    pub caller_context: Vec<String>,
    pub target: String,
    pub target_context: Vec<String>,
}

/// Counters reported once the walk is drained
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WalkStats {
    pub nodes_visited: usize,
    pub synthetic_nodes_skipped: usize,
    pub edges: usize,
    /// Sites printed raw because no line was found
    pub unresolved_sites: usize,
    /// Sites printed raw because resolution failed
    pub degraded_sites: usize,
    /// Contexts emptied because resolution failed
    pub degraded_contexts: usize,
}

/// Lazily enumerates one record per `(caller, call site, target)` in the
/// graph's node, then site, then target order.
pub struct GraphWalker<'g> {
    graph: &'g Graph,
    resolver: ContextResolver<'g>,
    locator: SourceLocator,
    source_numbers: bool,
    source_text: bool,
    exclude_synthetic: bool,
    detail: ContextDetail,
    node_pos: usize,
    site_pos: usize,
    target_pos: usize,
    site_description: Option<String>,
    contexts: HashMap<NodeId, Vec<String>>,
    stats: WalkStats,
}

impl<'g> GraphWalker<'g> {
    /// Fails only if the graph itself is malformed
    pub fn new(graph: &'g Graph, locator: SourceLocator, config: &ResolutionConfig) -> Result<Self> {
        graph.validate()?;
        Ok(Self {
            graph,
            resolver: ContextResolver::new(graph, config),
            locator,
            source_numbers: config.source_numbers,
            source_text: config.source_text,
            exclude_synthetic: config.exclude_synthetic,
            detail: config.context_detail,
            node_pos: 0,
            site_pos: 0,
            target_pos: 0,
            site_description: None,
            contexts: HashMap::new(),
            stats: WalkStats::default(),
        })
    }

    pub fn stats(&self) -> &WalkStats {
        &self.stats
    }

    fn advance_node(&mut self) {
        self.node_pos += 1;
        self.site_pos = 0;
        self.target_pos = 0;
        self.site_description = None;
    }

    fn advance_site(&mut self) {
        self.site_pos += 1;
        self.target_pos = 0;
        self.site_description = None;
    }

    fn describe_site(&mut self, method: &Method, site: &CallSite) -> String {
        if let Some(description) = &self.site_description {
            return description.clone();
        }

        let description = if !self.source_numbers {
            site.site.clone()
        } else {
            match self.locator.locate(method, site, self.source_text) {
                Ok(Some(location)) => location.to_string(),
                Ok(None) => {
                    self.stats.unresolved_sites += 1;
                    site.site.clone()
                }
                Err(e) => {
                    warn!("Could not resolve call site '{}' in {}: {}", site.site, method.signature, e);
                    self.stats.degraded_sites += 1;
                    site.site.clone()
                }
            }
        };

        self.site_description = Some(description.clone());
        description
    }

    fn context_of(&mut self, node: &GraphNode) -> Vec<String> {
        if let Some(frames) = self.contexts.get(&node.id) {
            return frames.clone();
        }

        let frames = match self.resolver.resolve(&node.context) {
            Ok(frames) => frames.iter().map(|frame| frame.to_string()).collect(),
            Err(e) => {
                warn!("Could not resolve {} context of node {}: {}", node.context.kind_name(), node.id.0, e);
                self.stats.degraded_contexts += 1;
                Vec::new()
            }
        };

        self.contexts.insert(node.id, frames.clone());
        frames
    }

    fn record(&mut self, caller: &'g GraphNode, method: &'g Method, site: &'g CallSite, target: NodeId) -> OutputRecord {
        let graph = self.graph;
        let call_site = self.describe_site(method, site);

        let caller_context = match self.detail {
            ContextDetail::Full => self.context_of(caller),
            ContextDetail::Target | ContextDetail::None => Vec::new(),
        };

        // Targets were checked by Graph::validate, a miss here means an empty record
        let (target_name, target_context) = match graph.node(target) {
            Some(target_node) => {
                let name = graph
                    .method(target_node.method)
                    .map(|m| m.signature.to_string())
                    .unwrap_or_default();
                let context = match self.detail {
                    ContextDetail::None => Vec::new(),
                    ContextDetail::Target | ContextDetail::Full => self.context_of(target_node),
                };
                (name, context)
            }
            None => (String::new(), Vec::new()),
        };

        self.stats.edges += 1;
        OutputRecord {
            caller: method.signature.to_string(),
            call_site,
            caller_context,
            target: target_name,
            target_context,
        }
    }
}

impl<'g> Iterator for GraphWalker<'g> {
    type Item = OutputRecord;

    fn next(&mut self) -> Option<OutputRecord> {
        let graph = self.graph;
        loop {
            let node = graph.nodes().get(self.node_pos)?;
            let method = match graph.method(node.method) {
                Some(method) => method,
                None => {
                    self.advance_node();
                    continue;
                }
            };

            if self.site_pos == 0 && self.target_pos == 0 {
                if self.exclude_synthetic && method.synthetic {
                    debug!("Skipping synthetic node {} ({})", node.id.0, method.signature);
                    self.stats.synthetic_nodes_skipped += 1;
                    self.advance_node();
                    continue;
                }
                self.stats.nodes_visited += 1;
            }

            let site = match node.call_sites.get(self.site_pos) {
                Some(site) => site,
                None => {
                    self.advance_node();
                    continue;
                }
            };

            let target = match site.targets.get(self.target_pos) {
                Some(target) => *target,
                None => {
                    self.advance_site();
                    continue;
                }
            };

            self.target_pos += 1;
            return Some(self.record(node, method, site, target));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SiteMatch;
    use crate::core::call_graph::{
        Context, ContextEntry, Instruction, InstructionKind, LineEntry, MethodId, MethodSignature,
    };

    fn method(id: u32, class: &str, name: &str, synthetic: bool, sites: &[(&str, u32)]) -> Method {
        Method {
            id: MethodId(id),
            signature: MethodSignature::new(class, name, "()V"),
            synthetic,
            instructions: sites
                .iter()
                .map(|(site, offset)| Instruction {
                    kind: InstructionKind::Invoke,
                    site: Some(site.to_string()),
                    offset: Some(*offset),
                })
                .collect(),
            line_table: if synthetic {
                vec![]
            } else {
                vec![LineEntry { start_pc: 0, line: 10 }, LineEntry { start_pc: 5, line: 11 }]
            },
        }
    }

    fn site(text: &str, pc: u32, targets: &[u32]) -> CallSite {
        CallSite {
            site: text.to_string(),
            pc,
            targets: targets.iter().map(|t| NodeId(*t)).collect(),
        }
    }

    /// 3 nodes and 4 edges; `main` is context-insensitive, `run` has two
    /// contexts, one of which names an unknown method.
    fn graph() -> Graph {
        let mut graph = Graph::new();
        graph.add_method(method(0, "Lcom/acme/App", "main", false, &[("a@1", 1), ("b@6", 6)]));
        graph.add_method(method(1, "Lcom/acme/Task", "run", false, &[]));
        graph.add_method(method(2, "Lcom/ibm/wala/FakeRootClass", "fakeRoot", true, &[("root@0", 0)]));

        graph.add_node(GraphNode {
            id: NodeId(0),
            method: MethodId(0),
            context: Context::Everywhere,
            call_sites: vec![site("a@1", 1, &[1, 2]), site("b@6", 6, &[1]), site("gone@9", 9, &[2])],
        });
        graph.add_node(GraphNode {
            id: NodeId(1),
            method: MethodId(1),
            context: Context::CallString {
                entries: vec![ContextEntry { method: MethodId(0), pc: 1, site: "a@1".to_string() }],
            },
            call_sites: vec![],
        });
        graph.add_node(GraphNode {
            id: NodeId(2),
            method: MethodId(1),
            context: Context::CallString {
                entries: vec![ContextEntry { method: MethodId(77), pc: 1, site: "a@1".to_string() }],
            },
            call_sites: vec![],
        });
        graph
    }

    fn new_walker<'a>(graph: &'a Graph, config: &ResolutionConfig) -> GraphWalker<'a> {
        GraphWalker::new(graph, SourceLocator::new(vec![], SiteMatch::First), config).unwrap()
    }

    #[test]
    fn emits_one_record_per_target_in_native_order() {
        let graph = graph();
        let records: Vec<OutputRecord> = new_walker(&graph, &ResolutionConfig::default()).collect();

        assert_eq!(records.len(), graph.edge_count());
        let sites: Vec<&str> = records.iter().map(|r| r.call_site.as_str()).collect();
        assert_eq!(
            sites,
            vec!["com/acme/App.java:10", "com/acme/App.java:10", "com/acme/App.java:11", "gone@9"]
        );
        assert!(records.iter().all(|r| r.caller == "com.acme.App.main()V"));
        assert!(records.iter().all(|r| r.caller_context.is_empty()));
    }

    #[test]
    fn contexts_resolve_or_degrade_per_edge() {
        let graph = graph();
        let mut walker = new_walker(&graph, &ResolutionConfig::default());
        let records: Vec<OutputRecord> = walker.by_ref().collect();

        assert_eq!(records[0].target_context, vec!["com.acme.App.main()V:10".to_string()]);
        assert!(records[1].target_context.is_empty());

        let stats = walker.stats();
        assert_eq!(stats.edges, 4);
        assert_eq!(stats.degraded_contexts, 1);
        assert_eq!(stats.unresolved_sites, 1);
        assert_eq!(stats.nodes_visited, 3);
    }

    #[test]
    fn no_source_numbers_prints_raw_sites() {
        let graph = graph();
        let config = ResolutionConfig {
            source_numbers: false,
            ..ResolutionConfig::default()
        };
        let records: Vec<OutputRecord> = new_walker(&graph, &config).collect();

        assert_eq!(records[0].call_site, "a@1");
        assert_eq!(records[0].target_context, vec!["a@1".to_string()]);
    }

    #[test]
    fn context_detail_none_leaves_contexts_empty() {
        let graph = graph();
        let config = ResolutionConfig {
            context_detail: ContextDetail::None,
            ..ResolutionConfig::default()
        };
        assert!(new_walker(&graph, &config).all(|r| r.target_context.is_empty() && r.caller_context.is_empty()));
    }

    #[test]
    fn synthetic_callers_can_be_skipped() {
        let mut graph = graph();
        graph.add_node(GraphNode {
            id: NodeId(3),
            method: MethodId(2),
            context: Context::Everywhere,
            call_sites: vec![site("root@0", 0, &[0])],
        });

        assert_eq!(new_walker(&graph, &ResolutionConfig::default()).count(), 5);

        let config = ResolutionConfig {
            exclude_synthetic: true,
            ..ResolutionConfig::default()
        };
        let mut skipping = new_walker(&graph, &config);
        assert_eq!(skipping.by_ref().count(), 4);
        assert_eq!(skipping.stats().synthetic_nodes_skipped, 1);
    }

    #[test]
    fn synthetic_caller_sites_fall_back_to_raw_text() {
        let mut graph = graph();
        graph.add_node(GraphNode {
            id: NodeId(3),
            method: MethodId(2),
            context: Context::Everywhere,
            call_sites: vec![site("root@0", 0, &[0])],
        });

        let records: Vec<OutputRecord> = new_walker(&graph, &ResolutionConfig::default()).collect();
        let last = records.last().unwrap();
        assert_eq!(last.call_site, "root@0");
        assert_eq!(last.target, "com.acme.App.main()V");
    }

    #[test]
    fn malformed_graph_is_rejected_up_front() {
        let mut graph = graph();
        graph.add_node(GraphNode {
            id: NodeId(9),
            method: MethodId(55),
            context: Context::Everywhere,
            call_sites: vec![],
        });
        let result = GraphWalker::new(
            &graph,
            SourceLocator::new(vec![], SiteMatch::First),
            &ResolutionConfig::default(),
        );
        assert!(result.is_err());
    }
}
