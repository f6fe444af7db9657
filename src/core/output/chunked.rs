// src/core/output/chunked.rs
use std::ffi::OsString;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::core::call_graph::OutputRecord;
use crate::error::{ExtractError, Result};
use super::RecordFormat;

/// What a chunked write produced
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteSummary {
    /// Files in chunk order
    pub files: Vec<PathBuf>,
    /// Records per file, same order as `files`
    pub chunk_records: Vec<usize>,
    pub records: usize,
}

/// Path of chunk `index`: the base path for chunk 0, then `base0`, `base1`, ...
pub fn chunk_path(base: &Path, index: usize) -> PathBuf {
    if index == 0 {
        return base.to_path_buf();
    }
    let mut name = OsString::from(base.as_os_str());
    name.push((index - 1).to_string());
    PathBuf::from(name)
}

struct OpenChunk {
    index: usize,
    path: PathBuf,
    writer: BufWriter<File>,
    count: usize,
}

/// Streams records into files of at most `chunk_size` records each.
///
/// Only the file being written is open at any time and no records are held
/// beyond the current one. A failed chunk is dropped (closing its handle);
/// chunks finished before it stay on disk.
pub struct ChunkedWriter<'f> {
    base: PathBuf,
    chunk_size: usize,
    format: &'f dyn RecordFormat,
}

impl<'f> ChunkedWriter<'f> {
    pub fn new<P: AsRef<Path>>(base: P, chunk_size: usize, format: &'f dyn RecordFormat) -> Result<Self> {
        if chunk_size == 0 {
            return Err(ExtractError::Config("chunk size must be at least 1".to_string()));
        }
        Ok(Self {
            base: base.as_ref().to_path_buf(),
            chunk_size,
            format,
        })
    }

    pub fn write_all<I>(&self, records: I) -> Result<WriteSummary>
    where
        I: IntoIterator<Item = OutputRecord>,
    {
        if let Some(parent) = self.base.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let mut summary = WriteSummary::default();
        let mut current: Option<OpenChunk> = None;
        let mut next_index = 0;

        for record in records {
            let mut chunk = match current.take() {
                Some(chunk) if chunk.count < self.chunk_size => chunk,
                Some(full) => {
                    self.finish(full, &mut summary)?;
                    self.open(&mut next_index)?
                }
                None => self.open(&mut next_index)?,
            };

            self.format
                .record(&mut chunk.writer, &record, chunk.count)
                .map_err(|source| ExtractError::Serialization {
                    chunk: chunk.index,
                    path: chunk.path.clone(),
                    source,
                })?;
            chunk.count += 1;
            current = Some(chunk);
        }

        let last = match current {
            Some(chunk) => chunk,
            None => self.open(&mut next_index)?,
        };
        self.finish(last, &mut summary)?;

        if summary.files.len() > 1 {
            info!(
                "Wrote {} records in {} chunks of at most {}",
                summary.records,
                summary.files.len(),
                self.chunk_size
            );
        }
        Ok(summary)
    }

    fn open(&self, next_index: &mut usize) -> Result<OpenChunk> {
        let index = *next_index;
        let path = chunk_path(&self.base, index);
        let fail = |source| ExtractError::Serialization {
            chunk: index,
            path: path.clone(),
            source,
        };

        let file = File::create(&path).map_err(fail)?;
        let mut writer = BufWriter::new(file);
        self.format.begin(&mut writer).map_err(fail)?;

        *next_index += 1;
        Ok(OpenChunk {
            index,
            path,
            writer,
            count: 0,
        })
    }

    fn finish(&self, mut chunk: OpenChunk, summary: &mut WriteSummary) -> Result<()> {
        let fail = |source| ExtractError::Serialization {
            chunk: chunk.index,
            path: chunk.path.clone(),
            source,
        };

        self.format.end(&mut chunk.writer).map_err(fail)?;
        chunk.writer.flush().map_err(fail)?;

        info!("Wrote chunk of call graph to {}", chunk.path.display());
        summary.records += chunk.count;
        summary.chunk_records.push(chunk.count);
        summary.files.push(chunk.path);
        Ok(())
    }
}
