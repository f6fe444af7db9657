// src/core/source/locator.rs
use std::collections::HashMap;
use std::fmt;
use tracing::debug;

use crate::config::SiteMatch;
use crate::core::call_graph::{CallSite, Method};
use crate::error::ResolutionError;
use super::archive::{find_entry, SourceArchive};

/// Source position of a call site
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLocation {
    /// Candidate path of the source file, e.g. `com/acme/App.java`
    pub file: String,
    /// 1-based line number
    pub line: u32,
    /// Literal text of the line, when requested and found
    pub text: Option<String>,
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.text {
            Some(text) => write!(f, "{}:{}: {}", self.file, self.line, text.trim()),
            None => write!(f, "{}:{}", self.file, self.line),
        }
    }
}

/// Source file a class compiles from. Nested and anonymous classes map to
/// their top-level file: `Lcom/acme/App$1` -> `com/acme/App.java`.
pub fn source_file_name(declaring_class: &str) -> String {
    let name = declaring_class.strip_prefix('L').unwrap_or(declaring_class);
    let name = name.strip_suffix(';').unwrap_or(name);
    let top_level = name.split('$').next().unwrap_or(name);
    format!("{}.java", top_level)
}

/// Maps call sites to source lines and, optionally, source text.
///
/// Archive listings and file contents are cached for the lifetime of the
/// locator, so each archive is scanned at most once per run.
pub struct SourceLocator {
    archives: Vec<SourceArchive>,
    site_match: SiteMatch,
    entries: HashMap<usize, Vec<String>>,
    files: HashMap<(usize, String), Option<Vec<String>>>,
}

impl SourceLocator {
    /// `archives` is the search order: program artifacts first, then
    /// auxiliary source archives as given.
    pub fn new(archives: Vec<SourceArchive>, site_match: SiteMatch) -> Self {
        Self {
            archives,
            site_match,
            entries: HashMap::new(),
            files: HashMap::new(),
        }
    }

    /// Line of the instruction matching `site`, or `None` when nothing matches.
    ///
    /// When several instructions carry the site identifier, the one at the
    /// site's own `pc` wins; otherwise the configured first/last rule applies.
    /// Synthetic methods carry no debug info and are never searched.
    pub fn line_of(&self, method: &Method, site: &CallSite) -> Result<Option<u32>, ResolutionError> {
        if method.synthetic {
            return Ok(None);
        }

        let matches: Vec<usize> = method
            .instructions
            .iter()
            .enumerate()
            .filter(|(_, instruction)| instruction.is_call_site())
            .filter(|(_, instruction)| instruction.site.as_deref() == Some(site.site.as_str()))
            .map(|(index, _)| index)
            .collect();

        let at_pc = matches
            .iter()
            .copied()
            .find(|&index| method.instructions[index].offset == Some(site.pc));
        let index = at_pc.or(match self.site_match {
            SiteMatch::First => matches.first().copied(),
            SiteMatch::Last => matches.last().copied(),
        });

        match index {
            Some(index) => {
                let offset = method.bytecode_offset(index)?;
                Ok(method.line_number(offset))
            }
            None => Ok(None),
        }
    }

    /// Literal text of `line` (1-based) in the source file of `declaring_class`.
    ///
    /// Only the first archive holding the file is consulted. Missing files,
    /// out-of-range lines and I/O failures all yield `None`.
    pub fn text_of(&mut self, declaring_class: &str, line: u32) -> Option<String> {
        let candidate = source_file_name(declaring_class);

        for index in 0..self.archives.len() {
            let entry = match self.find_in_archive(index, &candidate) {
                Some(entry) => entry,
                None => continue,
            };
            let lines = self.file_lines(index, &entry)?;
            let line_index = usize::try_from(line).ok()?.checked_sub(1)?;
            return lines.get(line_index).cloned();
        }

        None
    }

    /// Line plus optional text for a call site
    pub fn locate(
        &mut self,
        method: &Method,
        site: &CallSite,
        with_text: bool,
    ) -> Result<Option<SourceLocation>, ResolutionError> {
        let line = match self.line_of(method, site)? {
            Some(line) => line,
            None => return Ok(None),
        };
        let declaring_class = &method.signature.declaring_class;
        let text = if with_text {
            self.text_of(declaring_class, line)
        } else {
            None
        };

        Ok(Some(SourceLocation {
            file: source_file_name(declaring_class),
            line,
            text,
        }))
    }

    fn find_in_archive(&mut self, index: usize, candidate: &str) -> Option<String> {
        if !self.entries.contains_key(&index) {
            let archive = &self.archives[index];
            let names = match archive.entry_names() {
                Ok(names) => names,
                Err(e) => {
                    debug!("Cannot list {}: {}", archive.path().display(), e);
                    Vec::new()
                }
            };
            self.entries.insert(index, names);
        }

        self.entries
            .get(&index)
            .and_then(|names| find_entry(names, candidate))
            .cloned()
    }

    fn file_lines(&mut self, index: usize, entry: &str) -> Option<&Vec<String>> {
        let key = (index, entry.to_string());
        if !self.files.contains_key(&key) {
            let archive = &self.archives[index];
            let lines = match archive.read_entry(entry) {
                Ok(content) => Some(content.lines().map(str::to_string).collect()),
                Err(e) => {
                    debug!("Cannot read {} from {}: {}", entry, archive.path().display(), e);
                    None
                }
            };
            self.files.insert(key.clone(), lines);
        }

        self.files.get(&key).and_then(|lines| lines.as_ref())
    }
}
