//! Temporary project directories for integration tests.
//!
//! A project holds a `requirements.in`, an optional `constraints.txt` and
//! the `requirements.txt` lockfile written next to them.

use anyhow::{Context, Result};
use lockwright_resolver::Requirement;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::{TempDir, tempdir};

/// A temporary project directory for testing.
///
/// The project is automatically cleaned up when this struct is dropped.
#[derive(Debug)]
pub struct TempProject {
    /// The temporary directory containing the project.
    dir: TempDir,
    /// Path to requirements.in.
    requirements_in_path: PathBuf,
    /// Path to constraints.txt.
    constraints_path: PathBuf,
    /// Path to the requirements.txt lockfile.
    lockfile_path: PathBuf,
}

impl TempProject {
    /// Create a new temporary project builder.
    #[must_use]
    pub fn new() -> TempProjectBuilder {
        TempProjectBuilder::default()
    }

    /// Get the root directory of the project.
    #[must_use]
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Get the path to requirements.in.
    #[must_use]
    pub fn requirements_in_path(&self) -> &Path {
        &self.requirements_in_path
    }

    /// Get the path to constraints.txt.
    #[must_use]
    pub fn constraints_path(&self) -> &Path {
        &self.constraints_path
    }

    /// Get the path to requirements.txt.
    #[must_use]
    pub fn lockfile_path(&self) -> &Path {
        &self.lockfile_path
    }

    /// Check if the lockfile exists.
    #[must_use]
    pub fn has_lockfile(&self) -> bool {
        self.lockfile_path.exists()
    }

    /// Parse the top-level requirements from requirements.in.
    pub fn top_level(&self) -> Result<Vec<Requirement>> {
        read_requirements(&self.requirements_in_path)
    }

    /// Parse constraints.txt, or nothing if it does not exist.
    pub fn constraints(&self) -> Result<Vec<Requirement>> {
        if !self.constraints_path.exists() {
            return Ok(Vec::new());
        }
        Ok(read_requirements(&self.constraints_path)?
            .into_iter()
            .map(Requirement::as_constraint)
            .collect())
    }

    /// Read the lockfile content.
    pub fn read_lockfile(&self) -> Result<String> {
        fs::read_to_string(&self.lockfile_path).context("Failed to read requirements.txt")
    }

    /// Write content to the lockfile.
    pub fn write_lockfile(&self, content: &str) -> Result<()> {
        fs::write(&self.lockfile_path, content).context("Failed to write requirements.txt")
    }

    /// Write content to requirements.in.
    pub fn write_requirements_in(&self, content: &str) -> Result<()> {
        fs::write(&self.requirements_in_path, content).context("Failed to write requirements.in")
    }

    /// Names of every file in the project root, sorted.
    pub fn file_names(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(self.path()).context("Failed to list project directory")? {
            names.push(entry?.file_name().to_string_lossy().into_owned());
        }
        names.sort();
        Ok(names)
    }
}

fn read_requirements(path: &Path) -> Result<Vec<Requirement>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(|line| {
            Requirement::parse(line).with_context(|| format!("Invalid requirement line: {line}"))
        })
        .collect()
}

/// Builder for creating temporary projects.
#[derive(Debug, Default)]
pub struct TempProjectBuilder {
    requirements: Vec<String>,
    constraints: Vec<String>,
    lockfile: Option<String>,
}

impl TempProjectBuilder {
    /// Add a line to requirements.in.
    #[must_use]
    pub fn requirement(mut self, line: &str) -> Self {
        self.requirements.push(line.to_string());
        self
    }

    /// Add several lines to requirements.in.
    #[must_use]
    pub fn requirements(mut self, lines: &[&str]) -> Self {
        self.requirements
            .extend(lines.iter().map(ToString::to_string));
        self
    }

    /// Add a line to constraints.txt.
    #[must_use]
    pub fn constraint(mut self, line: &str) -> Self {
        self.constraints.push(line.to_string());
        self
    }

    /// Seed an existing lockfile.
    #[must_use]
    pub fn with_lockfile(mut self, content: &str) -> Self {
        self.lockfile = Some(content.to_string());
        self
    }

    /// Build the temporary project.
    pub fn build(self) -> Result<TempProject> {
        let dir = tempdir().context("Failed to create temp directory")?;
        let requirements_in_path = dir.path().join("requirements.in");
        let constraints_path = dir.path().join("constraints.txt");
        let lockfile_path = dir.path().join("requirements.txt");

        fs::write(&requirements_in_path, join_lines(&self.requirements))
            .context("Failed to write requirements.in")?;
        if !self.constraints.is_empty() {
            fs::write(&constraints_path, join_lines(&self.constraints))
                .context("Failed to write constraints.txt")?;
        }
        if let Some(lockfile) = &self.lockfile {
            fs::write(&lockfile_path, lockfile).context("Failed to write requirements.txt")?;
        }

        Ok(TempProject {
            dir,
            requirements_in_path,
            constraints_path,
            lockfile_path,
        })
    }
}

fn join_lines(lines: &[String]) -> String {
    let mut out = lines.join("\n");
    out.push('\n');
    out
}
