// src/core/mod.rs
mod engine;
mod inputs;

// Graph model, construction boundary and walking
mod call_graph;

// Call site to source mapping
mod source;

// Record encodings and chunked output
mod output;

pub use call_graph::{
    AnalysisRequest, BuildOutcome, CallSite, CancellationToken, Completeness, Context,
    ContextEntry, ContextResolver, Frame, Graph, GraphEngine, GraphNode, GraphWalker,
    Instruction, InstructionKind, LineEntry, Method, MethodId, MethodSignature, NodeId,
    OutputRecord, PartialReason, SnapshotEngine, WalkStats,
};
pub use source::{source_file_name, SourceArchive, SourceLocation, SourceLocator};
pub use output::{
    chunk_path, create_format, sanitize_field, ChunkedWriter, JsonFormat, RecordFormat,
    TsvFormat, WriteSummary, TSV_HEADER,
};
pub use inputs::{load_exclusions, resolve_artifacts, source_search_list};

// Export the main engine
pub use engine::{Engine, ExtractionReport};
