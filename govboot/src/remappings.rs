//! Solidity import remapping.
//!
//! `remappings.txt` holds `find=replace` pairs (the Foundry format, e.g.
//! `@openzeppelin/=lib/openzeppelin-contracts/`). Tools that do not understand remappings need
//! the import paths rewritten before compilation; that is what this module does, one line at a time.

use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::debug;

/// Errors raised while loading remappings or rewriting sources.
#[crate::error::govboot_error]
pub enum RemappingError {
    /// A line of the remappings file has no `=` separator or an empty key.
    #[error("invalid remapping on line {line}: {content:?}")]
    InvalidLine {
        /// One-based line number.
        line: usize,
        /// The offending line.
        content: String,
    },
    /// Filesystem failure.
    #[error("failed to access {path}: {source}")]
    Io {
        /// Path that failed.
        path: String,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },
}

/// A single `find=replace` pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Remapping {
    /// Text to look for in import lines.
    pub find: String,
    /// Replacement text.
    pub replace: String,
}

/// An ordered remapping table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Remappings(Vec<Remapping>);

impl Remappings {
    /// Parses remappings from text. Blank lines are skipped and surrounding whitespace is trimmed.
    ///
    /// A line splits at its first `=`; everything after it, further `=` included, is the replacement.
    ///
    /// # Errors
    /// - `RemappingError::InvalidLine` if a non-blank line is not `find=replace`.
    pub fn parse(contents: &str) -> Result<Self, RemappingError> {
        contents
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(index, line)| {
                let trimmed = line.trim();
                match trimmed.split_once('=') {
                    Some((find, replace)) if !find.is_empty() => Ok(Remapping {
                        find: find.to_string(),
                        replace: replace.to_string(),
                    }),
                    _ => Err(RemappingError::InvalidLine {
                        line: index + 1,
                        content: trimmed.to_string(),
                    }),
                }
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Self)
    }

    /// Reads and parses a remappings file.
    ///
    /// # Errors
    /// - `RemappingError::Io` if the file cannot be read.
    /// - `RemappingError::InvalidLine` if a line is malformed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, RemappingError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| RemappingError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let remappings = Self::parse(&contents)?;
        debug!("Loaded {} remappings from {}", remappings.len(), path.display());
        Ok(remappings)
    }

    /// Number of pairs in the table.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the table is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The pairs, in file order.
    #[must_use]
    pub fn entries(&self) -> &[Remapping] {
        &self.0
    }

    /// Rewrites one source line.
    ///
    /// Only import statements are touched. Each matching pair, in table order, replaces the first
    /// occurrence of its `find` text, so later pairs see the output of earlier ones. `find` is
    /// matched literally, never as a pattern.
    #[must_use]
    pub fn transform_line(&self, line: &str) -> String {
        if !is_import(line) {
            return line.to_string();
        }
        self.0.iter().fold(line.to_string(), |line, remapping| {
            if line.contains(&remapping.find) {
                line.replacen(&remapping.find, &remapping.replace, 1)
            } else {
                line
            }
        })
    }

    /// Rewrites a whole source file, keeping its line endings.
    #[must_use]
    pub fn transform_source(&self, source: &str) -> String {
        source
            .split_inclusive('\n')
            .map(|chunk| {
                let (line, ending) = split_line_ending(chunk);
                let mut out = self.transform_line(line);
                out.push_str(ending);
                out
            })
            .collect()
    }

    /// Rewrites every `.sol` file under `sources` into the same relative path under `output`.
    ///
    /// Returns the written paths.
    ///
    /// # Errors
    /// - `RemappingError::Io` on any filesystem failure.
    pub fn preprocess_dir(
        &self,
        sources: impl AsRef<Path>,
        output: impl AsRef<Path>,
    ) -> Result<Vec<PathBuf>, RemappingError> {
        let sources = sources.as_ref();
        let output = output.as_ref();
        let mut written = Vec::new();
        let mut pending = vec![sources.to_path_buf()];

        while let Some(dir) = pending.pop() {
            let entries = fs::read_dir(&dir).map_err(|source| io_error(&dir, source))?;
            for entry in entries {
                let path = entry.map_err(|source| io_error(&dir, source))?.path();
                if path.is_dir() {
                    pending.push(path);
                    continue;
                }
                if path.extension().is_none_or(|ext| ext != "sol") {
                    continue;
                }
                let relative = path.strip_prefix(sources).unwrap_or(&path);
                let target = output.join(relative);
                let source = fs::read_to_string(&path).map_err(|e| io_error(&path, e))?;
                if let Some(parent) = target.parent() {
                    fs::create_dir_all(parent).map_err(|e| io_error(parent, e))?;
                }
                fs::write(&target, self.transform_source(&source))
                    .map_err(|e| io_error(&target, e))?;
                written.push(target);
            }
        }

        written.sort();
        Ok(written)
    }
}

fn io_error(path: &Path, source: std::io::Error) -> RemappingError {
    RemappingError::Io {
        path: path.display().to_string(),
        source,
    }
}

/// Matches `^\s*import ` case-insensitively.
fn is_import(line: &str) -> bool {
    let rest = line.trim_start();
    rest.len() > "import".len()
        && rest.as_bytes()[.."import".len()].eq_ignore_ascii_case(b"import")
        && rest.as_bytes()["import".len()] == b' '
}

fn split_line_ending(chunk: &str) -> (&str, &str) {
    if let Some(line) = chunk.strip_suffix("\r\n") {
        (line, "\r\n")
    } else if let Some(line) = chunk.strip_suffix('\n') {
        (line, "\n")
    } else {
        (chunk, "")
    }
}
