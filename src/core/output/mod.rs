// src/core/output/mod.rs
//! Record encodings and chunked file output.

mod format;
mod chunked;

pub use format::{create_format, sanitize_field, JsonFormat, RecordFormat, TsvFormat, TSV_HEADER};
pub use chunked::{chunk_path, ChunkedWriter, WriteSummary};
