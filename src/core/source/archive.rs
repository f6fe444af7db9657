// src/core/source/archive.rs
use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;
use zip::ZipArchive;

use crate::error::{ExtractError, Result};

/// A place source files can be looked up in: a zip/jar or a source tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceArchive {
    Zip(PathBuf),
    Directory(PathBuf),
}

impl SourceArchive {
    /// Open an archive, checking that it exists and (for files) reads as zip
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if path.is_dir() {
            return Ok(SourceArchive::Directory(path.to_path_buf()));
        }
        if !path.is_file() {
            return Err(ExtractError::Config(format!(
                "archive {} does not exist",
                path.display()
            )));
        }
        check_zip(path)?;
        Ok(SourceArchive::Zip(path.to_path_buf()))
    }

    pub fn path(&self) -> &Path {
        match self {
            SourceArchive::Zip(path) | SourceArchive::Directory(path) => path,
        }
    }

    /// All file entries, `/`-separated and relative to the archive root
    pub fn entry_names(&self) -> io::Result<Vec<String>> {
        match self {
            SourceArchive::Zip(path) => {
                let archive = open_zip(path)?;
                Ok(archive
                    .file_names()
                    .filter(|name| !name.ends_with('/'))
                    .map(str::to_string)
                    .collect())
            }
            SourceArchive::Directory(root) => {
                let mut names = Vec::new();
                for entry in WalkDir::new(root) {
                    let entry = entry.map_err(io::Error::from)?;
                    if !entry.file_type().is_file() {
                        continue;
                    }
                    if let Ok(relative) = entry.path().strip_prefix(root) {
                        let name: Vec<String> = relative
                            .components()
                            .map(|c| c.as_os_str().to_string_lossy().to_string())
                            .collect();
                        names.push(name.join("/"));
                    }
                }
                names.sort();
                Ok(names)
            }
        }
    }

    /// Read one entry as UTF-8 text
    pub fn read_entry(&self, name: &str) -> io::Result<String> {
        match self {
            SourceArchive::Zip(path) => {
                let mut archive = open_zip(path)?;
                let mut entry = archive.by_name(name).map_err(zip_to_io)?;
                let mut content = String::new();
                entry.read_to_string(&mut content)?;
                Ok(content)
            }
            SourceArchive::Directory(root) => std::fs::read_to_string(root.join(name)),
        }
    }
}

/// Find the entry for a candidate path, allowing a leading source root such
/// as `src/main/java/`.
///
/// Default-package candidates (no `/`) only match at the archive root, since
/// any prefix would be indistinguishable from a package directory.
pub fn find_entry<'a>(names: &'a [String], candidate: &str) -> Option<&'a String> {
    let exact = names.iter().find(|name| name.as_str() == candidate);
    if exact.is_some() || !candidate.contains('/') {
        return exact;
    }
    let suffix = format!("/{}", candidate);
    names.iter().find(|name| name.ends_with(&suffix))
}

/// Check that a program artifact is a readable zip archive
pub fn check_zip(path: &Path) -> Result<()> {
    open_zip(path).map(|_| ()).map_err(|e| {
        ExtractError::Config(format!("cannot read archive {}: {}", path.display(), e))
    })
}

fn open_zip(path: &Path) -> io::Result<ZipArchive<File>> {
    let file = File::open(path)?;
    ZipArchive::new(file).map_err(zip_to_io)
}

fn zip_to_io(err: zip::result::ZipError) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, err)
}
