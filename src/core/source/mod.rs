// src/core/source/mod.rs
//! Mapping bytecode call sites back to source files, lines and text.

mod archive;
mod locator;

pub use archive::{check_zip, SourceArchive};
pub use locator::{source_file_name, SourceLocation, SourceLocator};
