//! Scenario repositories for resolver and lockfile tests.
//!
//! A scenario is a [`MemoryRepository`] described by a compact JSON index:
//!
//! ```json
//! {
//!   "foo": { "1.0": ["bar>=1.0,<2.0"] },
//!   "bar": {
//!     "1.5": {
//!       "requires": [],
//!       "extras": { "tls": ["certs"] },
//!       "files": ["bar-1.5-py3-none-any.whl", "bar-1.5.tar.gz"]
//!     }
//!   },
//!   "@direct": {
//!     "git+https://github.com/org/zed@main": {
//!       "name": "zed", "version": "0.1", "requires": ["foo"]
//!     }
//!   }
//! }
//! ```
//!
//! File artifacts hash their own file name, so hashes are stable across
//! runs.

use anyhow::{Context, Result, bail};
use lockwright_resolver::{Artifact, IndexOptions, MemoryRepository, TargetTags};
use serde_json::{Value, json};
use std::sync::Arc;

/// Key holding direct (VCS and local) sources in a scenario index.
const DIRECT_KEY: &str = "@direct";

/// Builder for a scenario repository.
#[derive(Debug, Default)]
pub struct Scenario {
    repo: MemoryRepository,
}

impl Scenario {
    /// Empty scenario with the default target.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty scenario for a specific target.
    #[must_use]
    pub fn with_target(tags: TargetTags, options: IndexOptions) -> Self {
        Self {
            repo: MemoryRepository::with_target(tags, options),
        }
    }

    /// Build a scenario from a JSON index.
    pub fn from_json(index: &Value) -> Result<Self> {
        Self::new().load(index)
    }

    /// Add everything described by a JSON index.
    pub fn load(self, index: &Value) -> Result<Self> {
        let packages = index.as_object().context("scenario index must be an object")?;
        for (name, versions) in packages {
            if name == DIRECT_KEY {
                continue;
            }
            let versions = versions
                .as_object()
                .with_context(|| format!("versions of {name} must be an object"))?;
            for (version, release) in versions {
                self.load_release(name, version, release)?;
            }
        }
        if let Some(direct) = index.get(DIRECT_KEY) {
            let direct = direct.as_object().context("@direct must be an object")?;
            for (url, source) in direct {
                self.load_direct(url, source)?;
            }
        }
        Ok(self)
    }

    fn load_release(&self, name: &str, version: &str, release: &Value) -> Result<()> {
        let (requires, extras, files) = match release {
            Value::Array(_) => (release, None, None),
            Value::Object(map) => (
                map.get("requires").unwrap_or(&Value::Null),
                map.get("extras"),
                map.get("files"),
            ),
            other => bail!("release {name}=={version} has unexpected shape {other}"),
        };

        let requires = strings(requires)?;
        self.repo
            .add_release(name, version, &refs(&requires))
            .with_context(|| format!("adding {name}=={version}"))?;

        if let Some(extras) = extras.and_then(Value::as_object) {
            for (extra, deps) in extras {
                let deps = strings(deps)?;
                self.repo.add_extra(name, version, extra, &refs(&deps))?;
            }
        }
        for file in strings(files.unwrap_or(&Value::Null))? {
            let artifact = Artifact::from_bytes(file.as_str(), file.as_bytes());
            self.repo.add_artifact(name, version, artifact)?;
        }
        Ok(())
    }

    fn load_direct(&self, url: &str, source: &Value) -> Result<()> {
        let name = source["name"]
            .as_str()
            .with_context(|| format!("direct source {url} needs a name"))?;
        let version = source["version"].as_str().unwrap_or("0.0.0");
        let requires = strings(source.get("requires").unwrap_or(&Value::Null))?;
        self.repo
            .add_direct_source(url, name, version, &refs(&requires))
            .with_context(|| format!("adding direct source {url}"))?;

        if let Some(extras) = source.get("extras").and_then(Value::as_object) {
            for (extra, deps) in extras {
                let deps = strings(deps)?;
                self.repo.add_direct_extra(url, extra, &refs(&deps))?;
            }
        }
        if let Some(message) = source.get("fail").and_then(Value::as_str) {
            self.repo.fail_direct_source(url, message)?;
        }
        Ok(())
    }

    /// The repository.
    #[must_use]
    pub fn build(self) -> MemoryRepository {
        self.repo
    }

    /// The repository behind an `Arc`, for [`lockwright_resolver::Resolver`].
    #[must_use]
    pub fn shared(self) -> Arc<MemoryRepository> {
        Arc::new(self.repo)
    }
}

fn strings(value: &Value) -> Result<Vec<String>> {
    match value {
        Value::Null => Ok(Vec::new()),
        Value::Array(items) => items
            .iter()
            .map(|item| {
                item.as_str()
                    .map(String::from)
                    .with_context(|| format!("expected a string, found {item}"))
            })
            .collect(),
        other => bail!("expected a list of strings, found {other}"),
    }
}

fn refs(items: &[String]) -> Vec<&str> {
    items.iter().map(String::as_str).collect()
}

/// Collection of pre-built scenarios.
#[derive(Debug)]
pub struct Fixtures;

impl Fixtures {
    /// `foo 1.0 -> bar>=1.0,<2.0` with bar 1.0, 1.5 and 2.0 available.
    pub fn foo_bar() -> Result<MemoryRepository> {
        Ok(Scenario::from_json(&json!({
            "foo": { "1.0": ["bar>=1.0,<2.0"] },
            "bar": { "1.0": [], "1.5": [], "2.0": [] },
        }))?
        .build())
    }

    /// `foo 1.0 -> bar==2.0`, for conflicting against a top-level `bar==1.0`.
    pub fn bar_conflict() -> Result<MemoryRepository> {
        Ok(Scenario::from_json(&json!({
            "foo": { "1.0": ["bar==2.0"] },
            "bar": { "1.0": [], "2.0": [] },
        }))?
        .build())
    }

    /// Two independent packages with an old and a new release each.
    pub fn upgradable() -> Result<MemoryRepository> {
        Ok(Scenario::from_json(&json!({
            "a": { "1.0": [], "2.0": [] },
            "b": { "1.0": [], "2.0": [] },
        }))?
        .build())
    }

    /// A small web stack with wheels, sdists and an optional extra.
    pub fn flask_stack() -> Result<MemoryRepository> {
        Ok(Scenario::from_json(&json!({
            "flask": {
                "2.0.1": {
                    "requires": ["click>=7.1.2", "itsdangerous>=2.0", "jinja2>=3.0", "werkzeug>=2.0"],
                    "extras": { "dotenv": ["python-dotenv"] },
                    "files": ["Flask-2.0.1-py3-none-any.whl", "Flask-2.0.1.tar.gz"],
                },
            },
            "click": {
                "7.1.2": { "files": ["click-7.1.2-py2.py3-none-any.whl"] },
                "8.0.1": { "files": ["click-8.0.1-py3-none-any.whl", "click-8.0.1.tar.gz"] },
            },
            "itsdangerous": { "2.0.1": { "files": ["itsdangerous-2.0.1-py3-none-any.whl"] } },
            "jinja2": {
                "3.0.1": {
                    "requires": ["markupsafe>=2.0"],
                    "files": ["Jinja2-3.0.1-py3-none-any.whl"],
                },
            },
            "markupsafe": {
                "2.0.1": {
                    "files": [
                        "MarkupSafe-2.0.1-cp39-cp39-manylinux2010_x86_64.whl",
                        "MarkupSafe-2.0.1-cp39-cp39-win_amd64.whl",
                        "MarkupSafe-2.0.1.tar.gz",
                    ],
                },
            },
            "werkzeug": { "2.0.1": { "files": ["Werkzeug-2.0.1-py3-none-any.whl"] } },
            "python-dotenv": { "0.19.0": { "files": ["python_dotenv-0.19.0-py2.py3-none-any.whl"] } },
        }))?
        .build())
    }

    /// `a -> b -> a`.
    pub fn cycle() -> Result<MemoryRepository> {
        Ok(Scenario::from_json(&json!({
            "a": { "1.0": ["b"] },
            "b": { "1.0": ["a>=1.0"] },
        }))?
        .build())
    }

    /// An editable VCS checkout depending on a registry package.
    pub fn vcs_checkout() -> Result<MemoryRepository> {
        Ok(Scenario::from_json(&json!({
            "six": { "1.16.0": { "files": ["six-1.16.0-py2.py3-none-any.whl"] } },
            "@direct": {
                "git+https://github.com/org/zed@main": {
                    "name": "zed", "version": "0.1", "requires": ["six"],
                },
            },
        }))?
        .build())
    }
}
