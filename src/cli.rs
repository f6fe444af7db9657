use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use anyhow::{Context, Result};
use tracing::warn;

use cgextract::config::{
    Config, ContextDetail, ContextPolicy, FrameOrder, OutputFormat, ReflectionMode, SiteMatch,
};
use cgextract::core::{Engine, SnapshotEngine};

#[derive(Parser)]
#[command(name = "cgextract")]
#[command(about = "Extract context-sensitive call graphs of JVM programs as JSON or TSV")]
#[command(version)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Build the call graph and write it out
    Extract(ExtractArgs),

    /// Write a configuration file with the current settings
    InitConfig {
        /// Where to write it (defaults to ./cgextract.toml)
        path: Option<PathBuf>,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[derive(Args)]
pub struct ExtractArgs {
    /// Program artifacts: a ':'-separated list of jars, or a directory of jars
    #[arg(long)]
    pub jars: String,

    /// Graph snapshot exported by the analyzer
    #[arg(long)]
    pub graph: PathBuf,

    /// Output file; further chunks get a numeric suffix
    #[arg(short = 'o', long, default_value = "callgraph.json")]
    pub cgoutput: PathBuf,

    /// File of class-name regexes to exclude
    #[arg(long)]
    pub exclusions: Option<PathBuf>,

    /// Extra source archive or directory searched for source text (repeatable)
    #[arg(long = "source-archive")]
    pub source_archives: Vec<PathBuf>,

    /// Call graph algorithm / context policy
    #[arg(long, value_enum)]
    pub cgalgo: Option<ContextPolicy>,

    /// Context depth for n-cfa and n-obj policies
    #[arg(long)]
    pub sensitivity: Option<u32>,

    #[arg(long = "reflection-setting", value_enum)]
    pub reflection: Option<ReflectionMode>,

    /// Node cap for construction, negative for unlimited
    #[arg(long, allow_negative_numbers = true)]
    pub max_nodes: Option<i64>,

    /// Construction timeout in milliseconds
    #[arg(short, long)]
    pub timeout: Option<u64>,

    /// Leave out static initializer edges
    #[arg(long)]
    pub no_static_init: bool,

    /// Do not specialize zero-length arrays
    #[arg(long)]
    pub no_zero_length_array: bool,

    /// Use distinct instance keys for distinct string constants
    #[arg(long)]
    pub constant_specific_keys: bool,

    /// Let lexical scoping analysis consider call stacks
    #[arg(long)]
    pub stacks_for_lexical_scoping: bool,

    /// Treat globals as lexically scoped from the root node
    #[arg(long)]
    pub lexical_scoping_for_globals: bool,

    /// Print raw call sites instead of source lines
    #[arg(long)]
    pub no_source_numbers: bool,

    /// Append the source line text to resolved call sites
    #[arg(long)]
    pub source_text: bool,

    /// Skip synthetic callers and synthetic context frames
    #[arg(long)]
    pub exclude_synthetic: bool,

    #[arg(long, value_enum)]
    pub frame_order: Option<FrameOrder>,

    #[arg(long, value_enum)]
    pub site_match: Option<SiteMatch>,

    #[arg(long, value_enum)]
    pub context_detail: Option<ContextDetail>,

    #[arg(long, value_enum)]
    pub format: Option<OutputFormat>,

    /// Maximum records per output file
    #[arg(long)]
    pub chunk_size: Option<usize>,
}

impl ExtractArgs {
    /// Layer the command line over the file configuration
    pub fn apply(&self, config: &mut Config) {
        let analysis = &mut config.analysis;
        if let Some(policy) = self.cgalgo {
            analysis.policy = policy;
        }
        if let Some(sensitivity) = self.sensitivity {
            analysis.sensitivity = sensitivity;
        }
        if let Some(reflection) = self.reflection {
            analysis.reflection = reflection;
        }
        if let Some(max_nodes) = self.max_nodes {
            analysis.max_nodes = max_nodes;
        }
        if let Some(timeout) = self.timeout {
            analysis.timeout_ms = timeout;
        }
        if self.no_static_init {
            analysis.handle_static_init = false;
        }
        if self.no_zero_length_array {
            analysis.handle_zero_length_array = false;
        }
        if self.constant_specific_keys {
            analysis.use_constant_specific_keys = true;
        }
        if self.stacks_for_lexical_scoping {
            analysis.use_stacks_for_lexical_scoping = true;
        }
        if self.lexical_scoping_for_globals {
            analysis.use_lexical_scoping_for_globals = true;
        }
        if self.exclusions.is_some() {
            analysis.exclusions = self.exclusions.clone();
        }

        let resolution = &mut config.resolution;
        if self.no_source_numbers {
            resolution.source_numbers = false;
        }
        if self.source_text {
            resolution.source_text = true;
        }
        if self.exclude_synthetic {
            resolution.exclude_synthetic = true;
        }
        if let Some(order) = self.frame_order {
            resolution.frame_order = order;
        }
        if let Some(site_match) = self.site_match {
            resolution.site_match = site_match;
        }
        if let Some(detail) = self.context_detail {
            resolution.context_detail = detail;
        }
        resolution.source_archives.extend(self.source_archives.iter().cloned());

        if let Some(format) = self.format {
            config.output.format = format;
        }
        if let Some(chunk_size) = self.chunk_size {
            config.output.chunk_size = chunk_size;
        }
    }
}

impl Cli {
    pub async fn execute(self) -> Result<()> {
        let mut config = Config::load_or_default(self.config.as_deref())
            .context("Failed to load configuration")?;

        match self.command {
            Commands::Extract(args) => {
                args.apply(&mut config);
                let engine = Engine::new(config)?;
                extract(&engine, &args).await
            }
            Commands::InitConfig { path, force } => {
                let engine = Engine::new(config)?;
                let written = engine.init_config(path, force)?;
                println!("Wrote {}", written.display());
                Ok(())
            }
        }
    }
}

async fn extract(engine: &Engine, args: &ExtractArgs) -> Result<()> {
    let snapshot = Arc::new(SnapshotEngine::new(&args.graph));
    let report = engine
        .extract(snapshot, &args.jars, &args.cgoutput)
        .await
        .with_context(|| format!("Extraction to {} failed", args.cgoutput.display()))?;

    if report.is_partial() {
        warn!(
            "Output covers a partial call graph of {} nodes{}",
            report.nodes,
            if report.timed_out { " (timed out)" } else { "" }
        );
    }
    Ok(())
}
