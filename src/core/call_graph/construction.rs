// src/core/call_graph/construction.rs
//! Boundary to the external call-graph construction engine.

use std::fmt;
use std::path::PathBuf;
use regex::Regex;

use crate::config::AnalysisConfig;
use crate::error::Result;
use super::{CancellationToken, Graph};

/// Everything the engine needs to build a graph for one program
#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    /// Program artifacts (jars), already checked to be readable
    pub artifacts: Vec<PathBuf>,
    /// Classes matching any pattern are left out of the graph
    pub exclusions: Vec<Regex>,
    pub options: AnalysisConfig,
}

impl AnalysisRequest {
    /// Whether a class (internal name, with or without the leading `L`) is excluded
    pub fn is_excluded(&self, declaring_class: &str) -> bool {
        let name = declaring_class.strip_prefix('L').unwrap_or(declaring_class);
        self.exclusions.iter().any(|pattern| pattern.is_match(name))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartialReason {
    Cancelled,
    NodeLimit(usize),
}

impl fmt::Display for PartialReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PartialReason::Cancelled => write!(f, "graph construction was cancelled"),
            PartialReason::NodeLimit(limit) => write!(f, "node limit of {} reached", limit),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completeness {
    Complete,
    Partial(PartialReason),
}

/// Graph returned by an engine plus whether construction ran to the end
#[derive(Debug)]
pub struct BuildOutcome {
    pub graph: Graph,
    pub completeness: Completeness,
}

/// Trait implemented by call-graph construction engines
pub trait GraphEngine: Send + Sync {
    /// Build the graph, polling `cancel` and returning what was built so far
    /// once it fires.
    fn build_graph(&self, request: &AnalysisRequest, cancel: &CancellationToken) -> Result<BuildOutcome>;

    /// Get the engine name for logging
    fn engine_name(&self) -> &str;
}
