// src/core/engine.rs
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{ExtractError, Result};
use super::{
    create_format, inputs, AnalysisRequest, BuildOutcome, CancellationToken, ChunkedWriter,
    Completeness, GraphEngine, GraphWalker, PartialReason, SourceLocator, WalkStats, WriteSummary,
};

/// Outcome of one extraction run
#[derive(Debug, Clone)]
pub struct ExtractionReport {
    pub completeness: Completeness,
    /// Set when construction stopped because the timeout elapsed
    pub timed_out: bool,
    pub nodes: usize,
    pub stats: WalkStats,
    pub output: WriteSummary,
}

impl ExtractionReport {
    pub fn is_partial(&self) -> bool {
        matches!(self.completeness, Completeness::Partial(_))
    }
}

/// Main orchestration engine: build, walk, serialize
pub struct Engine {
    config: Config,
}

impl Engine {
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        debug!("Loaded configuration: {:?}", config);
        Ok(Self { config })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run the whole pipeline for the artifacts named by `jars`.
    ///
    /// Configuration problems fail before the engine is invoked. A timeout or
    /// node cap still produces output and is reported through the returned
    /// completeness.
    pub async fn extract(
        &self,
        graph_engine: Arc<dyn GraphEngine>,
        jars: &str,
        output: &Path,
    ) -> Result<ExtractionReport> {
        let artifacts = inputs::resolve_artifacts(jars)?;
        info!("Analyzing {} artifact(s)", artifacts.len());

        let exclusions = inputs::load_exclusions(self.config.analysis.exclusions.as_deref())?;
        let archives = inputs::source_search_list(&artifacts, &self.config.resolution.source_archives)?;

        let request = AnalysisRequest {
            artifacts,
            exclusions,
            options: self.config.analysis.clone(),
        };
        let cancel =
            CancellationToken::with_timeout(Duration::from_millis(self.config.analysis.timeout_ms));

        info!(
            "Building call graph with {} engine (policy {}, timeout {}ms)",
            graph_engine.engine_name(),
            self.config.analysis.policy,
            self.config.analysis.timeout_ms
        );
        let outcome = build_with_interrupt(graph_engine, request, cancel.clone()).await?;
        let BuildOutcome { graph, completeness } = outcome;

        let timed_out = match completeness {
            Completeness::Complete => false,
            Completeness::Partial(PartialReason::Cancelled) => {
                let timed_out = cancel.deadline_passed();
                if timed_out {
                    warn!("Timed out after {}ms, writing the partial graph", self.config.analysis.timeout_ms);
                } else {
                    warn!("Interrupted, writing the partial graph");
                }
                timed_out
            }
            Completeness::Partial(reason) => {
                warn!("{}, writing the partial graph", reason);
                false
            }
        };
        info!("Call graph has {} nodes and {} edges", graph.node_count(), graph.edge_count());

        let locator = SourceLocator::new(archives, self.config.resolution.site_match);
        let mut walker = GraphWalker::new(&graph, locator, &self.config.resolution)?;

        let format = create_format(self.config.output.format);
        let writer = ChunkedWriter::new(output, self.config.output.chunk_size, format.as_ref())?;
        let summary = writer.write_all(walker.by_ref())?;

        let stats = walker.stats().clone();
        info!(
            "Wrote {} edges to {} file(s) ({} sites unresolved, {} sites and {} contexts degraded)",
            summary.records,
            summary.files.len(),
            stats.unresolved_sites,
            stats.degraded_sites,
            stats.degraded_contexts
        );

        Ok(ExtractionReport {
            completeness,
            timed_out,
            nodes: graph.node_count(),
            stats,
            output: summary,
        })
    }

    /// Write the current configuration as a starting point
    pub fn init_config(&self, path: Option<PathBuf>, force: bool) -> Result<PathBuf> {
        let path = path.unwrap_or_else(|| PathBuf::from("cgextract.toml"));
        if path.exists() && !force {
            return Err(ExtractError::Config(format!(
                "{} already exists, pass --force to overwrite",
                path.display()
            )));
        }
        self.config.save(&path)?;
        info!("Wrote configuration to {}", path.display());
        Ok(path)
    }
}

/// Run construction on a blocking thread. Ctrl-C cancels the token so the
/// engine can hand back what it has built so far.
async fn build_with_interrupt(
    graph_engine: Arc<dyn GraphEngine>,
    request: AnalysisRequest,
    cancel: CancellationToken,
) -> Result<BuildOutcome> {
    let token = cancel.clone();
    let mut build = tokio::task::spawn_blocking(move || graph_engine.build_graph(&request, &token));

    let joined = tokio::select! {
        joined = &mut build => joined,
        Ok(()) = tokio::signal::ctrl_c() => {
            warn!("Interrupt received, cancelling graph construction");
            cancel.cancel();
            build.await
        }
    };

    joined.map_err(|e| ExtractError::GraphConstruction(format!("construction task failed: {}", e)))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::call_graph::{Graph, GraphNode, Method, MethodId, MethodSignature, NodeId, CallSite, Context};
    use std::fs::File;
    use std::io::Write;
    use tempfile::TempDir;
    use zip::write::FileOptions;

    /// Engine returning a fixed graph, optionally as a partial result
    struct FixedEngine {
        completeness: Completeness,
    }

    impl GraphEngine for FixedEngine {
        fn build_graph(&self, _request: &AnalysisRequest, _cancel: &CancellationToken) -> Result<BuildOutcome> {
            let mut graph = Graph::new();
            graph.add_method(Method {
                id: MethodId(0),
                signature: MethodSignature::new("Lcom/acme/App", "main", "()V"),
                synthetic: false,
                instructions: vec![],
                line_table: vec![],
            });
            graph.add_node(GraphNode {
                id: NodeId(0),
                method: MethodId(0),
                context: Context::Everywhere,
                call_sites: vec![CallSite { site: "self@1".to_string(), pc: 1, targets: vec![NodeId(0)] }],
            });
            Ok(BuildOutcome { graph, completeness: self.completeness })
        }

        fn engine_name(&self) -> &str {
            "fixed"
        }
    }

    struct FailingEngine;

    impl GraphEngine for FailingEngine {
        fn build_graph(&self, _request: &AnalysisRequest, _cancel: &CancellationToken) -> Result<BuildOutcome> {
            Err(ExtractError::GraphConstruction("bad class hierarchy".to_string()))
        }

        fn engine_name(&self) -> &str {
            "failing"
        }
    }

    /// Engine that builds nothing until the token fires
    struct SlowEngine;

    impl GraphEngine for SlowEngine {
        fn build_graph(&self, _request: &AnalysisRequest, cancel: &CancellationToken) -> Result<BuildOutcome> {
            while !cancel.is_cancelled() {
                std::thread::sleep(Duration::from_millis(1));
            }
            Ok(BuildOutcome {
                graph: Graph::new(),
                completeness: Completeness::Partial(PartialReason::Cancelled),
            })
        }

        fn engine_name(&self) -> &str {
            "slow"
        }
    }

    fn jar(dir: &TempDir) -> String {
        let path = dir.path().join("app.jar");
        let mut writer = zip::ZipWriter::new(File::create(&path).unwrap());
        writer.start_file("com/acme/App.class", FileOptions::default()).unwrap();
        writer.write_all(&[0xCA, 0xFE, 0xBA, 0xBE]).unwrap();
        writer.finish().unwrap();
        path.to_string_lossy().to_string()
    }

    #[tokio::test]
    async fn partial_result_is_still_written() {
        let dir = TempDir::new().unwrap();
        let output = dir.path().join("cg.json");
        let engine = Engine::new(Config::default()).unwrap();
        let fixed = Arc::new(FixedEngine {
            completeness: Completeness::Partial(PartialReason::NodeLimit(1)),
        });

        let report = engine.extract(fixed, &jar(&dir), &output).await.unwrap();

        assert!(report.is_partial());
        assert!(!report.timed_out);
        assert_eq!(report.output.records, 1);
        assert!(output.exists());
    }

    #[tokio::test]
    async fn timeout_yields_partial_result_with_output() {
        let dir = TempDir::new().unwrap();
        let output = dir.path().join("cg.json");
        let mut config = Config::default();
        config.analysis.timeout_ms = 1;
        let engine = Engine::new(config).unwrap();

        let report = engine.extract(Arc::new(SlowEngine), &jar(&dir), &output).await.unwrap();

        assert!(report.is_partial());
        assert!(report.timed_out);
        assert_eq!(report.completeness, Completeness::Partial(PartialReason::Cancelled));
        assert_eq!(report.output.records, 0);
        assert_eq!(std::fs::read_to_string(&output).unwrap(), "[]");
    }

    #[tokio::test]
    async fn construction_error_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let output = dir.path().join("cg.json");
        let engine = Engine::new(Config::default()).unwrap();

        let result = engine.extract(Arc::new(FailingEngine), &jar(&dir), &output).await;

        assert!(matches!(result, Err(ExtractError::GraphConstruction(_))));
        assert!(!output.exists());
    }

    #[tokio::test]
    async fn bad_artifact_fails_before_construction() {
        let dir = TempDir::new().unwrap();
        let output = dir.path().join("cg.json");
        let engine = Engine::new(Config::default()).unwrap();
        let fixed = Arc::new(FixedEngine { completeness: Completeness::Complete });

        let result = engine.extract(fixed, "/missing/app.jar", &output).await;

        assert!(matches!(result, Err(ExtractError::Config(_))));
        assert!(!output.exists());
    }

    #[test]
    fn init_config_refuses_to_overwrite() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cgextract.toml");
        let engine = Engine::new(Config::default()).unwrap();

        engine.init_config(Some(path.clone()), false).unwrap();
        assert!(engine.init_config(Some(path.clone()), false).is_err());
        assert!(engine.init_config(Some(path.clone()), true).is_ok());
        assert_eq!(Config::load(&path).unwrap(), Config::default());
    }
}
