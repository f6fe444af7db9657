// src/core/call_graph/snapshot.rs
use std::collections::HashSet;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::config::{AnalysisConfig, ContextPolicy, ReflectionMode};
use crate::error::{ExtractError, Result};
use super::{
    AnalysisRequest, BuildOutcome, CallSite, CancellationToken, Completeness, Context,
    ContextEntry, Graph, GraphEngine, GraphNode, Method, MethodId, NodeId, PartialReason,
};

/// Engine that replays a graph exported by an external analyzer as JSON
pub struct SnapshotEngine {
    snapshot_path: PathBuf,
}

#[derive(Debug, Deserialize)]
struct Snapshot {
    policy: ContextPolicy,
    #[serde(default = "default_sensitivity")]
    sensitivity: u32,
    /// Engine options the graph was built with; absent ones took their defaults
    #[serde(default)]
    options: RecordedOptions,
    #[serde(default)]
    methods: Vec<Method>,
    #[serde(default)]
    nodes: Vec<SnapshotNode>,
}

#[derive(Debug, Deserialize)]
struct SnapshotNode {
    id: NodeId,
    method: MethodId,
    #[serde(default)]
    context: Option<SnapshotContext>,
    #[serde(default)]
    call_sites: Vec<CallSite>,
}

#[derive(Debug, Deserialize)]
struct SnapshotContext {
    kind: String,
    #[serde(default)]
    entries: Vec<ContextEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct RecordedOptions {
    reflection: ReflectionMode,
    handle_static_init: bool,
    handle_zero_length_array: bool,
    use_constant_specific_keys: bool,
    use_stacks_for_lexical_scoping: bool,
    use_lexical_scoping_for_globals: bool,
}

impl Default for RecordedOptions {
    fn default() -> Self {
        let defaults = AnalysisConfig::default();
        Self {
            reflection: defaults.reflection,
            handle_static_init: defaults.handle_static_init,
            handle_zero_length_array: defaults.handle_zero_length_array,
            use_constant_specific_keys: defaults.use_constant_specific_keys,
            use_stacks_for_lexical_scoping: defaults.use_stacks_for_lexical_scoping,
            use_lexical_scoping_for_globals: defaults.use_lexical_scoping_for_globals,
        }
    }
}

impl RecordedOptions {
    /// `(option, recorded, requested)` for every option that differs
    fn mismatches(&self, requested: &AnalysisConfig) -> Vec<(&'static str, String, String)> {
        let mut found = Vec::new();
        if self.reflection != requested.reflection {
            found.push((
                "reflection",
                format!("{:?}", self.reflection),
                format!("{:?}", requested.reflection),
            ));
        }
        let flags = [
            ("handle_static_init", self.handle_static_init, requested.handle_static_init),
            ("handle_zero_length_array", self.handle_zero_length_array, requested.handle_zero_length_array),
            ("use_constant_specific_keys", self.use_constant_specific_keys, requested.use_constant_specific_keys),
            ("use_stacks_for_lexical_scoping", self.use_stacks_for_lexical_scoping, requested.use_stacks_for_lexical_scoping),
            ("use_lexical_scoping_for_globals", self.use_lexical_scoping_for_globals, requested.use_lexical_scoping_for_globals),
        ];
        for (name, recorded, wanted) in flags {
            if recorded != wanted {
                found.push((name, recorded.to_string(), wanted.to_string()));
            }
        }
        found
    }
}

fn default_sensitivity() -> u32 {
    1
}

impl From<Option<SnapshotContext>> for Context {
    fn from(raw: Option<SnapshotContext>) -> Self {
        match raw {
            None => Context::Everywhere,
            Some(raw) => match raw.kind.as_str() {
                "everywhere" => Context::Everywhere,
                "call-string" => Context::CallString { entries: raw.entries },
                "allocation-string" => Context::AllocationString { entries: raw.entries },
                _ => Context::Unsupported(raw.kind),
            },
        }
    }
}

impl SnapshotEngine {
    pub fn new<P: AsRef<Path>>(snapshot_path: P) -> Self {
        Self {
            snapshot_path: snapshot_path.as_ref().to_path_buf(),
        }
    }

    fn read_snapshot(&self) -> Result<Snapshot> {
        let file = File::open(&self.snapshot_path).map_err(|e| {
            ExtractError::Config(format!(
                "cannot open graph snapshot {}: {}",
                self.snapshot_path.display(),
                e
            ))
        })?;
        serde_json::from_reader(BufReader::new(file)).map_err(|e| {
            ExtractError::GraphConstruction(format!(
                "malformed graph snapshot {}: {}",
                self.snapshot_path.display(),
                e
            ))
        })
    }

    fn check_options(&self, snapshot: &Snapshot, request: &AnalysisRequest) -> Result<()> {
        let options = &request.options;
        if snapshot.policy != options.policy {
            return Err(ExtractError::GraphConstruction(format!(
                "snapshot was built with policy {} but {} was requested",
                snapshot.policy, options.policy
            )));
        }
        if options.policy.uses_depth() && snapshot.sensitivity != options.sensitivity {
            return Err(ExtractError::GraphConstruction(format!(
                "snapshot was built with sensitivity {} but {} was requested",
                snapshot.sensitivity, options.sensitivity
            )));
        }
        let mismatches = snapshot.options.mismatches(options);
        if !mismatches.is_empty() {
            let details: Vec<String> = mismatches
                .iter()
                .map(|(name, recorded, wanted)| format!("{} (built {}, requested {})", name, recorded, wanted))
                .collect();
            return Err(ExtractError::GraphConstruction(format!(
                "snapshot was built with different engine options: {}",
                details.join(", ")
            )));
        }
        Ok(())
    }
}

impl GraphEngine for SnapshotEngine {
    fn build_graph(&self, request: &AnalysisRequest, cancel: &CancellationToken) -> Result<BuildOutcome> {
        let snapshot = self.read_snapshot()?;
        self.check_options(&snapshot, request)?;

        let options = &request.options;
        debug!(
            "Replaying {} for {} artifact(s) with {:?}",
            self.snapshot_path.display(),
            request.artifacts.len(),
            snapshot.options
        );

        let excluded: HashSet<MethodId> = snapshot
            .methods
            .iter()
            .filter(|m| request.is_excluded(&m.signature.declaring_class))
            .map(|m| m.id)
            .collect();
        if !excluded.is_empty() {
            info!("Excluding {} method(s) matched by exclusion patterns", excluded.len());
        }

        let mut graph = Graph::new();
        for method in snapshot.methods {
            if !excluded.contains(&method.id) {
                graph.add_method(method);
            }
        }

        let limit = options.node_limit();
        let mut completeness = Completeness::Complete;
        for node in snapshot.nodes {
            if cancel.is_cancelled() {
                warn!("Cancelled after {} node(s)", graph.node_count());
                completeness = Completeness::Partial(PartialReason::Cancelled);
                break;
            }
            if excluded.contains(&node.method) {
                continue;
            }
            if let Some(limit) = limit {
                if graph.node_count() >= limit {
                    completeness = Completeness::Partial(PartialReason::NodeLimit(limit));
                    break;
                }
            }
            graph.add_node(GraphNode {
                id: node.id,
                method: node.method,
                context: node.context.into(),
                call_sites: node.call_sites,
            });
        }

        let pruned = graph.prune_dangling_targets();
        if pruned > 0 {
            debug!("Dropped {} edge(s) to nodes outside the built graph", pruned);
        }

        Ok(BuildOutcome { graph, completeness })
    }

    fn engine_name(&self) -> &str {
        "snapshot"
    }
}
