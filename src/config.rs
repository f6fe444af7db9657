use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::{ExtractError, Result};

/// Call-graph construction algorithm and the context policy it implies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum ContextPolicy {
    ZeroCfa,
    ZeroOneCfa,
    VanillaZeroOneCfa,
    ZeroContainerCfa,
    ZeroOneContainerCfa,
    VanillaZeroOneContainerCfa,
    NCfa,
    VanillaNCfa,
    NObj,
    VanillaNObj,
    Rta,
}

impl ContextPolicy {
    /// Whether the policy takes a sensitivity depth
    pub fn uses_depth(&self) -> bool {
        matches!(
            self,
            Self::NCfa | Self::VanillaNCfa | Self::NObj | Self::VanillaNObj
        )
    }
}

impl fmt::Display for ContextPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = self
            .to_possible_value()
            .map(|v| v.get_name().to_string())
            .unwrap_or_else(|| format!("{:?}", self));
        f.write_str(&name)
    }
}

/// How reflective calls are modeled during construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum ReflectionMode {
    Full,
    ApplicationGetMethod,
    NoFlowToCasts,
    NoFlowToCastsApplicationGetMethod,
    NoMethodInvoke,
    NoFlowToCastsNoMethodInvoke,
    OneFlowToCastsNoMethodInvoke,
    OneFlowToCastsApplicationGetMethod,
    MultiFlowToCastsApplicationGetMethod,
    NoStringConstants,
    StringOnly,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum OutputFormat {
    /// Array of JSON records
    Json,
    /// Tab-separated rows with a header
    Tsv,
}

/// Order of frames in a resolved context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum FrameOrder {
    /// Outermost caller first, as the context stores it
    OuterFirst,
    InnerFirst,
}

/// Which instruction wins when several match a call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum SiteMatch {
    First,
    Last,
}

/// Which contexts get resolved into frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum ContextDetail {
    None,
    /// Callee context only
    Target,
    /// Caller and callee contexts
    Full,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Graph construction options handed to the engine
    pub analysis: AnalysisConfig,

    /// Context and source resolution settings
    pub resolution: ResolutionConfig,

    /// Output encoding and chunking
    pub output: OutputConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub policy: ContextPolicy,

    /// Depth for n-CFA / n-OBJ policies
    pub sensitivity: u32,

    pub reflection: ReflectionMode,

    /// Maximum number of graph nodes, negative means unlimited
    pub max_nodes: i64,

    /// Wall-clock budget for graph construction
    pub timeout_ms: u64,

    pub handle_static_init: bool,

    pub handle_zero_length_array: bool,

    /// Distinct instance keys for distinct string constants
    pub use_constant_specific_keys: bool,

    /// Lexical scoping analysis considers call stacks
    pub use_stacks_for_lexical_scoping: bool,

    /// Globals are lexically scoped from the root node
    pub use_lexical_scoping_for_globals: bool,

    /// File of class-name regexes to leave out of the graph
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exclusions: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolutionConfig {
    /// Map call sites to source lines (otherwise print raw sites)
    pub source_numbers: bool,

    /// Append the literal source line to resolved call sites
    pub source_text: bool,

    /// Skip synthetic callers and drop synthetic frames
    pub exclude_synthetic: bool,

    pub frame_order: FrameOrder,

    pub site_match: SiteMatch,

    pub context_detail: ContextDetail,

    /// Extra archives or directories searched for source text, in order
    pub source_archives: Vec<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub format: OutputFormat,

    /// Maximum records per output file
    pub chunk_size: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            policy: ContextPolicy::ZeroCfa,
            sensitivity: 1,
            reflection: ReflectionMode::None,
            max_nodes: -1,
            timeout_ms: 7_200_000,
            handle_static_init: true,
            handle_zero_length_array: true,
            use_constant_specific_keys: false,
            use_stacks_for_lexical_scoping: false,
            use_lexical_scoping_for_globals: false,
            exclusions: None,
        }
    }
}

impl Default for ResolutionConfig {
    fn default() -> Self {
        Self {
            source_numbers: true,
            source_text: false,
            exclude_synthetic: false,
            frame_order: FrameOrder::OuterFirst,
            site_match: SiteMatch::First,
            context_detail: ContextDetail::Full,
            source_archives: Vec::new(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::Json,
            chunk_size: 1_000_000,
        }
    }
}

impl AnalysisConfig {
    /// Node cap as an option, `None` when unlimited
    pub fn node_limit(&self) -> Option<usize> {
        usize::try_from(self.max_nodes).ok()
    }
}

impl Config {
    /// Load configuration from file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config =
            toml::from_str(&content).map_err(|e| ExtractError::Config(e.to_string()))?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content =
            toml::to_string_pretty(self).map_err(|e| ExtractError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Load configuration with fallback to default
    pub fn load_or_default<P: AsRef<Path>>(path: Option<P>) -> Result<Self> {
        match path {
            Some(p) => {
                if p.as_ref().exists() {
                    Self::load(p)
                } else {
                    Err(ExtractError::Config(format!(
                        "config file {} does not exist",
                        p.as_ref().display()
                    )))
                }
            }
            None => {
                let candidates = ["cgextract.toml", ".cgextract.toml"];

                for candidate in &candidates {
                    if Path::new(candidate).exists() {
                        return Self::load(candidate);
                    }
                }

                Ok(Self::default())
            }
        }
    }

    /// Reject option combinations the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.output.chunk_size == 0 {
            return Err(ExtractError::Config(
                "output.chunk_size must be at least 1".to_string(),
            ));
        }
        if self.analysis.policy.uses_depth() && self.analysis.sensitivity == 0 {
            return Err(ExtractError::Config(format!(
                "policy {} needs a sensitivity of at least 1",
                self.analysis.policy
            )));
        }
        if self.analysis.timeout_ms == 0 {
            return Err(ExtractError::Config(
                "analysis.timeout_ms must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
