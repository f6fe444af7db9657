// src/core/inputs.rs
//! Resolving program artifacts, exclusion patterns and source archives.

use std::path::{Path, PathBuf};
use regex::Regex;
use walkdir::WalkDir;

use crate::error::{ExtractError, Result};
use super::source::{check_zip, SourceArchive};

const ARTIFACT_EXTENSION: &str = "jar";

/// Turn a `:`-separated artifact list, or a single directory, into checked
/// artifact paths. Every artifact must open as a zip archive.
pub fn resolve_artifacts(spec: &str) -> Result<Vec<PathBuf>> {
    let parts: Vec<&str> = spec.split(':').filter(|p| !p.is_empty()).collect();
    if parts.is_empty() {
        return Err(ExtractError::Config("no input artifacts given".to_string()));
    }

    let artifacts = if parts.len() == 1 && Path::new(parts[0]).is_dir() {
        scan_directory(Path::new(parts[0]))?
    } else {
        parts.iter().map(PathBuf::from).collect()
    };

    for artifact in &artifacts {
        if !artifact.is_file() {
            return Err(ExtractError::Config(format!(
                "input artifact {} does not exist",
                artifact.display()
            )));
        }
        check_zip(artifact)?;
    }

    Ok(artifacts)
}

fn scan_directory(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut artifacts = Vec::new();
    for entry in WalkDir::new(dir).follow_links(true) {
        let entry = entry.map_err(|e| ExtractError::Config(e.to_string()))?;
        let path = entry.path();
        if entry.file_type().is_file()
            && path.extension().and_then(|ext| ext.to_str()) == Some(ARTIFACT_EXTENSION)
        {
            artifacts.push(path.to_path_buf());
        }
    }

    if artifacts.is_empty() {
        return Err(ExtractError::Config(format!(
            "no .{} files found in {}",
            ARTIFACT_EXTENSION,
            dir.display()
        )));
    }
    artifacts.sort();
    Ok(artifacts)
}

/// Read exclusion patterns, one regex per line; blank lines and `#` comments
/// are skipped.
pub fn load_exclusions(path: Option<&Path>) -> Result<Vec<Regex>> {
    let path = match path {
        Some(path) => path,
        None => return Ok(Vec::new()),
    };

    let content = std::fs::read_to_string(path).map_err(|e| {
        ExtractError::Config(format!("cannot read exclusions {}: {}", path.display(), e))
    })?;

    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(|line| {
            Regex::new(line).map_err(|e| {
                ExtractError::Config(format!("bad exclusion pattern '{}': {}", line, e))
            })
        })
        .collect()
}

/// Archive search order for source text: program artifacts first, then the
/// auxiliary source archives in the order given.
pub fn source_search_list(artifacts: &[PathBuf], extra: &[PathBuf]) -> Result<Vec<SourceArchive>> {
    artifacts
        .iter()
        .chain(extra.iter())
        .map(SourceArchive::open)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use tempfile::TempDir;
    use zip::write::FileOptions;

    fn write_jar(path: &Path) {
        let mut writer = zip::ZipWriter::new(File::create(path).unwrap());
        writer.start_file("META-INF/MANIFEST.MF", FileOptions::default()).unwrap();
        writer.write_all(b"Manifest-Version: 1.0\n").unwrap();
        writer.finish().unwrap();
    }

    #[test]
    fn colon_separated_list_keeps_order() {
        let dir = TempDir::new().unwrap();
        let a = dir.path().join("b.jar");
        let b = dir.path().join("a.jar");
        write_jar(&a);
        write_jar(&b);

        let spec = format!("{}:{}", a.display(), b.display());
        assert_eq!(resolve_artifacts(&spec).unwrap(), vec![a, b]);
    }

    #[test]
    fn directory_is_scanned_for_jars_sorted() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("lib")).unwrap();
        write_jar(&dir.path().join("lib").join("z.jar"));
        write_jar(&dir.path().join("app.jar"));
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let found = resolve_artifacts(dir.path().to_str().unwrap()).unwrap();
        assert_eq!(found, vec![dir.path().join("app.jar"), dir.path().join("lib").join("z.jar")]);
    }

    #[test]
    fn empty_directory_is_config_error() {
        let dir = TempDir::new().unwrap();
        let result = resolve_artifacts(dir.path().to_str().unwrap());
        assert!(matches!(result, Err(ExtractError::Config(_))));
    }

    #[test]
    fn missing_or_corrupt_artifacts_are_config_errors() {
        let dir = TempDir::new().unwrap();
        let corrupt = dir.path().join("bad.jar");
        std::fs::write(&corrupt, "garbage").unwrap();

        assert!(matches!(resolve_artifacts(corrupt.to_str().unwrap()), Err(ExtractError::Config(_))));
        assert!(matches!(resolve_artifacts("/no/such.jar"), Err(ExtractError::Config(_))));
        assert!(matches!(resolve_artifacts(""), Err(ExtractError::Config(_))));
    }

    #[test]
    fn exclusions_skip_comments_and_reject_bad_patterns() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("exclusions.txt");
        std::fs::write(&path, "# platform\njava\\/awt\\/.*\n\nsun\\/.*\n").unwrap();

        let patterns = load_exclusions(Some(&path)).unwrap();
        assert_eq!(patterns.len(), 2);
        assert!(patterns[0].is_match("java/awt/Frame"));

        std::fs::write(&path, "(unclosed\n").unwrap();
        assert!(load_exclusions(Some(&path)).is_err());
        assert!(load_exclusions(None).unwrap().is_empty());
    }
}
