//! Wildcard pattern file loading and resource name matching.
//!
//! The pattern file is UTF-8 text with one pattern per line. Lines are trimmed and lowercased
//! at load time; blank and whitespace-only lines are dropped. Both tools apply the same policy,
//! and an empty result is a hard error.
//!
//! Every pattern is matched as if wrapped in `*...*`, using shell glob rules against the
//! lowercased resource name:
//!
//! - `*` matches any run of characters
//! - `?` matches exactly one character
//! - `[seq]` matches one character from the class, `[!seq]` one character outside it
//! - an unterminated `[` and every other character match literally
//!
//! A pattern with no metacharacters is therefore a plain case-insensitive substring test.

use regex::Regex;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WildcardError {
    #[error("Wildcard file '{}' does not exist.", path.display())]
    Missing { path: PathBuf },
    #[error("{source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("No valid wildcards found in '{}'.", path.display())]
    Empty { path: PathBuf },
}

/// One compiled pattern line
#[derive(Debug, Clone)]
pub struct WildcardPattern {
    raw: String,
    matcher: Matcher,
}

#[derive(Debug, Clone)]
enum Matcher {
    Glob(Regex),
    /// Fallback when the glob translation does not compile
    Literal,
}

impl WildcardPattern {
    /// Build a pattern from one line of the file; the text is trimmed and lowercased
    pub fn new(line: &str) -> Self {
        let raw = line.trim().to_lowercase();
        let source = format!("(?s)^.*{}.*$", translate_glob(&raw));
        let matcher = match Regex::new(&source) {
            Ok(regex) => Matcher::Glob(regex),
            Err(e) => {
                log_warn!(
                    "Wildcard '{}' is not a valid glob ({}), falling back to literal match",
                    raw,
                    e
                );
                Matcher::Literal
            }
        };
        Self { raw, matcher }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Test an already lowercased name
    fn is_match_lowercase(&self, name: &str) -> bool {
        match &self.matcher {
            Matcher::Glob(regex) => regex.is_match(name),
            Matcher::Literal => name.contains(&self.raw),
        }
    }

    /// Case-insensitive test of a resource name
    pub fn is_match(&self, name: &str) -> bool {
        self.is_match_lowercase(&name.to_lowercase())
    }
}

impl fmt::Display for WildcardPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Ordered list of patterns loaded from one file
#[derive(Debug, Clone, Default)]
pub struct WildcardSet {
    patterns: Vec<WildcardPattern>,
}

impl WildcardSet {
    /// Parse file contents, dropping blank lines
    pub fn parse(contents: &str) -> Self {
        let patterns = contents
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(WildcardPattern::new)
            .collect();
        Self { patterns }
    }

    /// Load and validate a pattern file.
    ///
    /// Fails when the file is missing, unreadable, or yields no usable pattern.
    pub fn load(path: &Path) -> Result<Self, WildcardError> {
        log_debug!("Loading wildcard file {}", path.display());

        let contents = std::fs::read_to_string(path).map_err(|source| {
            if source.kind() == io::ErrorKind::NotFound {
                WildcardError::Missing {
                    path: path.to_path_buf(),
                }
            } else {
                WildcardError::Unreadable {
                    path: path.to_path_buf(),
                    source,
                }
            }
        })?;

        let set = Self::parse(&contents);
        if set.is_empty() {
            return Err(WildcardError::Empty {
                path: path.to_path_buf(),
            });
        }

        log_info!(
            "Loaded {} wildcard(s) from {}",
            set.len(),
            path.display()
        );
        Ok(set)
    }

    /// First pattern, in file order, that matches the name
    pub fn first_match(&self, name: &str) -> Option<&WildcardPattern> {
        let lowered = name.to_lowercase();
        self.patterns.iter().find(|pattern| {
            let hit = pattern.is_match_lowercase(&lowered);
            log_trace!("wildcard '{}' vs '{}': {}", pattern, name, hit);
            hit
        })
    }

    pub fn is_match(&self, name: &str) -> bool {
        self.first_match(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &WildcardPattern> {
        self.patterns.iter()
    }
}

impl FromIterator<WildcardPattern> for WildcardSet {
    fn from_iter<I: IntoIterator<Item = WildcardPattern>>(iter: I) -> Self {
        Self {
            patterns: iter.into_iter().collect(),
        }
    }
}

/// Translate a shell glob into a regex fragment (no anchors)
fn translate_glob(pattern: &str) -> String {
    let chars: Vec<char> = pattern.chars().collect();
    let mut out = String::with_capacity(pattern.len() * 2);
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        i += 1;
        match c {
            '*' => {
                // Collapse runs of stars
                while i < chars.len() && chars[i] == '*' {
                    i += 1;
                }
                out.push_str(".*");
            }
            '?' => out.push('.'),
            '[' => {
                let mut j = i;
                if j < chars.len() && chars[j] == '!' {
                    j += 1;
                }
                if j < chars.len() && chars[j] == ']' {
                    j += 1;
                }
                while j < chars.len() && chars[j] != ']' {
                    j += 1;
                }

                if j >= chars.len() {
                    out.push_str(r"\[");
                    continue;
                }

                let mut class = &chars[i..j];
                out.push('[');
                if class.first() == Some(&'!') {
                    out.push('^');
                    class = &class[1..];
                }
                // Ranges are emitted as `lo-hi` with both ends escaped; any other `-` is literal
                let mut k = 0;
                while k < class.len() {
                    out.push_str(&escape_char(class[k]));
                    if k + 2 < class.len() && class[k + 1] == '-' {
                        out.push('-');
                        out.push_str(&escape_char(class[k + 2]));
                        k += 3;
                    } else {
                        k += 1;
                    }
                }
                out.push(']');
                i = j + 1;
            }
            other => out.push_str(&escape_char(other)),
        }
    }

    out
}

fn escape_char(c: char) -> String {
    regex::escape(c.encode_utf8(&mut [0u8; 4]))
}
