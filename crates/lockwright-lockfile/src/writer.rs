//! Requirements lockfile rendering.
//!
//! The output is a pip-compatible requirements file: a header comment, the
//! index options the set was resolved against, then one entry per pin with
//! optional hash continuation lines and `# via` annotations.

use crate::atomic::{WriteResult, write_atomic};
use crate::error::{LockfileError, Result};
use lockwright_core::Error as CoreError;
use lockwright_resolver::{
    ArtifactHashes, IndexOptions, Parent, Requirement, ResolvedSet, display_specifier,
};
use std::collections::BTreeSet;
use std::fmt::Write as _;
use std::path::Path;
use tracing::debug;

/// Index URL that is never written out.
pub const DEFAULT_INDEX_URL: &str = "https://pypi.org/simple";

/// Command shown in the header when none is configured.
const DEFAULT_COMMAND: &str = "lockwright compile";

/// Sorted specifier clauses, or `<any>` when there are none.
///
/// ```
/// use lockwright_lockfile::format_specifier;
/// use lockwright_resolver::Requirement;
///
/// let req = Requirement::parse("foo>1.2,~=1.1,<1.5").unwrap();
/// assert_eq!(format_specifier(&req), "~=1.1,>1.2,<1.5");
/// assert_eq!(format_specifier(&Requirement::parse("foo").unwrap()), "<any>");
/// ```
#[must_use]
pub fn format_specifier(requirement: &Requirement) -> String {
    display_specifier(&requirement.specifier)
}

/// One lockfile entry: the requirement line followed by ` \` continuation
/// lines carrying `--hash=` options.
#[must_use]
pub fn format_requirement(requirement: &Requirement, hashes: Option<&BTreeSet<String>>) -> String {
    let mut line = requirement.without_parents().to_string();
    for hash in hashes.into_iter().flatten() {
        let _ = write!(line, " \\\n    --hash={hash}");
    }
    line
}

/// Renders a resolved set as a requirements lockfile.
#[derive(Debug, Clone)]
pub struct LockfileWriter {
    command: String,
    options: IndexOptions,
    emit_header: bool,
    emit_index: bool,
    emit_trusted_host: bool,
    annotate: bool,
}

impl Default for LockfileWriter {
    fn default() -> Self {
        Self {
            command: DEFAULT_COMMAND.to_string(),
            options: IndexOptions::default(),
            emit_header: true,
            emit_index: true,
            emit_trusted_host: true,
            annotate: true,
        }
    }
}

impl LockfileWriter {
    /// Writer with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Command line shown in the header.
    #[must_use]
    pub fn command(mut self, command: impl Into<String>) -> Self {
        self.command = command.into();
        self
    }

    /// Index options to emit.
    #[must_use]
    pub fn index_options(mut self, options: IndexOptions) -> Self {
        self.options = options;
        self
    }

    /// Toggle the header comment.
    #[must_use]
    pub const fn emit_header(mut self, emit: bool) -> Self {
        self.emit_header = emit;
        self
    }

    /// Toggle `--index-url` / `--extra-index-url` / `--find-links` lines.
    #[must_use]
    pub const fn emit_index(mut self, emit: bool) -> Self {
        self.emit_index = emit;
        self
    }

    /// Toggle `--trusted-host` lines.
    #[must_use]
    pub const fn emit_trusted_host(mut self, emit: bool) -> Self {
        self.emit_trusted_host = emit;
        self
    }

    /// Toggle `# via` annotations.
    #[must_use]
    pub const fn annotate(mut self, annotate: bool) -> Self {
        self.annotate = annotate;
        self
    }

    /// Render `resolved`, adding hashes where given.
    pub fn render(&self, resolved: &ResolvedSet, hashes: Option<&ArtifactHashes>) -> Result<String> {
        let mut out = String::new();
        if self.emit_header {
            self.write_header(&mut out);
        }

        let options = self.option_lines();
        for line in &options {
            out.push_str(line);
            out.push('\n');
        }
        if !options.is_empty() {
            out.push('\n');
        }

        let mut entries: Vec<&Requirement> = resolved.requirements().collect();
        entries.sort_by(|a, b| b.editable.cmp(&a.editable).then_with(|| a.name.cmp(&b.name)));

        for requirement in entries {
            if !requirement.is_direct() && requirement.pinned_version().is_none() {
                return Err(LockfileError::NotPinned {
                    requirement: requirement.to_string(),
                    source: CoreError::not_pinned("render", requirement),
                });
            }
            let entry_hashes = hashes.and_then(|h| h.get(&requirement.name));
            out.push_str(&format_requirement(requirement, entry_hashes));
            out.push('\n');

            if self.annotate
                && let Some(via) = via(resolved, requirement)
            {
                let _ = writeln!(out, "    # via {via}");
            }
        }

        debug!(entries = resolved.len(), bytes = out.len(), "rendered lockfile");
        Ok(out)
    }

    /// Render and write atomically to `path`.
    pub fn write(
        &self,
        path: impl AsRef<Path>,
        resolved: &ResolvedSet,
        hashes: Option<&ArtifactHashes>,
    ) -> Result<WriteResult> {
        let contents = self.render(resolved, hashes)?;
        write_atomic(path, contents)
    }

    fn write_header(&self, out: &mut String) {
        out.push_str("#\n");
        out.push_str("# This file is autogenerated by lockwright\n");
        out.push_str("# To update, run:\n");
        out.push_str("#\n");
        let _ = writeln!(out, "#    {}", self.command);
        out.push_str("#\n");
    }

    fn option_lines(&self) -> Vec<String> {
        let mut lines = Vec::new();
        if self.emit_index {
            if let Some(url) = self
                .options
                .index_url
                .as_deref()
                .filter(|url| url.trim_end_matches('/') != DEFAULT_INDEX_URL)
            {
                lines.push(format!("--index-url {url}"));
            }
            for url in &self.options.extra_index_urls {
                lines.push(format!("--extra-index-url {url}"));
            }
        }
        if self.emit_trusted_host {
            for host in &self.options.trusted_hosts {
                lines.push(format!("--trusted-host {host}"));
            }
        }
        if self.emit_index {
            for link in &self.options.find_links {
                if let Some(link) = portable_link(link) {
                    lines.push(format!("--find-links {link}"));
                }
            }
        }
        lines
    }
}

/// Find-links worth recording: URLs and relative paths. Absolute local
/// paths only make sense on the machine that resolved.
fn portable_link(link: &str) -> Option<&str> {
    if link.contains("://") {
        return Some(link);
    }
    if link.starts_with('/') || Path::new(link).is_absolute() {
        return None;
    }
    let trimmed = link.trim_start_matches("./");
    (!trimmed.is_empty()).then_some(trimmed)
}

/// Dependents of a transitively pulled-in pin, comma separated.
fn via(resolved: &ResolvedSet, requirement: &Requirement) -> Option<String> {
    if requirement.parents.contains(&Parent::Root) {
        return None;
    }
    let mut names: Vec<&str> = resolved
        .dependents(&requirement.name)
        .into_iter()
        .map(|name| name.as_str())
        .collect();
    if names.is_empty() {
        names = requirement
            .parents
            .iter()
            .filter_map(|parent| match parent {
                Parent::Package(name) => Some(name.as_str()),
                Parent::Root => None,
            })
            .collect();
    }
    (!names.is_empty()).then(|| names.join(", "))
}
