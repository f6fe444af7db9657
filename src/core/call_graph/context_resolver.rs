// src/core/call_graph/context_resolver.rs
use std::fmt;
use serde::{Deserialize, Serialize};

use crate::config::{FrameOrder, ResolutionConfig};
use crate::error::ResolutionError;
use super::{Context, ContextEntry, Graph, MethodSignature};

/// One entry of a resolved context
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Frame {
    pub method: MethodSignature,
    /// Source line of the site, when the method's line table covers it
    pub line: Option<u32>,
    /// Raw site text, printed when the line is unknown
    pub site: String,
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.line {
            Some(line) => write!(f, "{}:{}", self.method, line),
            None => f.write_str(&self.site),
        }
    }
}

/// Turns node contexts into ordered frame lists
pub struct ContextResolver<'g> {
    graph: &'g Graph,
    frame_order: FrameOrder,
    exclude_synthetic: bool,
    source_numbers: bool,
}

impl<'g> ContextResolver<'g> {
    pub fn new(graph: &'g Graph, config: &ResolutionConfig) -> Self {
        Self {
            graph,
            frame_order: config.frame_order,
            exclude_synthetic: config.exclude_synthetic,
            source_numbers: config.source_numbers,
        }
    }

    /// Resolve a context into frames.
    ///
    /// The insensitive context yields an empty list. Unsupported kinds and
    /// entries naming unknown methods are errors for the caller to degrade.
    pub fn resolve(&self, context: &Context) -> Result<Vec<Frame>, ResolutionError> {
        let entries = match context {
            Context::Everywhere => return Ok(Vec::new()),
            Context::CallString { entries } | Context::AllocationString { entries } => entries,
            Context::Unsupported(kind) => {
                return Err(ResolutionError::UnsupportedContext(kind.clone()))
            }
        };

        let mut frames = Vec::with_capacity(entries.len());
        for entry in entries {
            if let Some(frame) = self.resolve_entry(entry)? {
                frames.push(frame);
            }
        }

        if self.frame_order == FrameOrder::InnerFirst {
            frames.reverse();
        }
        Ok(frames)
    }

    // Each entry maps through its own method's line table, no nested lookup.
    fn resolve_entry(&self, entry: &ContextEntry) -> Result<Option<Frame>, ResolutionError> {
        let method = self
            .graph
            .method(entry.method)
            .ok_or(ResolutionError::UnknownMethod(entry.method.0))?;

        if self.exclude_synthetic && method.synthetic {
            return Ok(None);
        }

        let line = if self.source_numbers {
            method.line_number(entry.pc)
        } else {
            None
        };

        Ok(Some(Frame {
            method: method.signature.clone(),
            line,
            site: entry.site.clone(),
        }))
    }
}
