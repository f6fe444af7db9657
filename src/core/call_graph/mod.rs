// src/core/call_graph/mod.rs
//! Context-sensitive call graph model and extraction.
//!
//! The graph itself comes from an external construction engine behind the
//! [`GraphEngine`] trait. This module walks it, resolving each node's context
//! into frames and each call site into a source position, and yields one
//! [`OutputRecord`] per `(caller, call site, target)` edge.

mod graph;
mod cancellation;
mod construction;
mod snapshot;
mod context_resolver;
mod walker;

pub use graph::{
    CallSite, Context, ContextEntry, Graph, GraphNode, Instruction, InstructionKind, LineEntry,
    Method, MethodId, MethodSignature, NodeId,
};
pub use cancellation::CancellationToken;
pub use construction::{AnalysisRequest, BuildOutcome, Completeness, GraphEngine, PartialReason};
pub use snapshot::SnapshotEngine;
pub use context_resolver::{ContextResolver, Frame};
pub use walker::{GraphWalker, OutputRecord, WalkStats};
