//! Reading a previously written lockfile back into pins.

use crate::atomic::read_locked;
use crate::error::{LockfileError, Result};
use lockwright_core::{PackageName, Version};
use lockwright_resolver::Requirement;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, trace};

/// Parse lockfile text into `name -> version` for registry pins.
///
/// Comments, blank lines, option lines (`--index-url`, `-e ...`) and hash
/// continuations are skipped. Entries that are not pinned to one version
/// are ignored; lines that do not parse are errors.
///
/// ```
/// use lockwright_lockfile::read_previous_pins;
///
/// let pins = read_previous_pins("# header\nsix==1.16.0 \\\n    --hash=sha256:abc\n").unwrap();
/// assert_eq!(pins.len(), 1);
/// ```
pub fn read_previous_pins(text: &str) -> Result<BTreeMap<PackageName, Version>> {
    let mut pins = BTreeMap::new();
    for (line_no, line) in logical_lines(text) {
        let Some(entry) = requirement_part(&line) else {
            continue;
        };
        let requirement = Requirement::parse(entry).map_err(|source| LockfileError::Parse {
            line: line_no,
            content: line.clone(),
            source,
        })?;
        if requirement.is_direct() {
            continue;
        }
        match requirement.pinned_version() {
            Some(version) => {
                trace!(package = %requirement.name, version = %version, "previous pin");
                pins.insert(requirement.name.clone(), version.clone());
            }
            None => debug!(line = line_no, entry, "skipping unpinned entry"),
        }
    }
    Ok(pins)
}

/// Read previous pins from `path`; a missing file yields no pins.
pub fn read_previous_pins_from(path: impl AsRef<Path>) -> Result<BTreeMap<PackageName, Version>> {
    let path = path.as_ref();
    if !path.exists() {
        debug!(path = %path.display(), "no previous lockfile");
        return Ok(BTreeMap::new());
    }
    read_previous_pins(&read_locked(path)?)
}

/// Physical lines joined across trailing backslashes, with the 1-based
/// number of the first physical line.
fn logical_lines(text: &str) -> Vec<(usize, String)> {
    let mut lines = Vec::new();
    let mut current = String::new();
    let mut start = 0;
    for (idx, raw) in text.lines().enumerate() {
        if current.is_empty() {
            start = idx + 1;
        }
        match raw.trim_end().strip_suffix('\\') {
            Some(head) => {
                current.push_str(head);
                current.push(' ');
            }
            None => {
                current.push_str(raw);
                lines.push((start, std::mem::take(&mut current)));
            }
        }
    }
    if !current.trim().is_empty() {
        lines.push((start, current));
    }
    lines
}

/// The requirement text of a logical line, without options and comments.
fn requirement_part(line: &str) -> Option<&str> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') || line.starts_with('-') {
        return None;
    }
    let line = line.find(" #").map_or(line, |idx| &line[..idx]);
    let line = line.find(" --").map_or(line, |idx| &line[..idx]);
    let line = line.trim();
    (!line.is_empty()).then_some(line)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn pins(text: &str) -> Vec<String> {
        read_previous_pins(text)
            .unwrap()
            .into_iter()
            .map(|(name, version)| format!("{name}=={version}"))
            .collect()
    }

    #[test]
    fn reads_pins_and_skips_noise() {
        let text = "\
#
# This file is autogenerated by lockwright
#
--index-url http://example.com
--trusted-host example.com

-e git+https://github.com/org/zed@main#egg=zed
Bar==1.5
    # via foo
foo[extra]==1.0 \\
    --hash=sha256:aaa \\
    --hash=sha256:bbb
six==1.16.0  # pinned by hand
";
        assert_eq!(pins(text), vec!["bar==1.5", "foo==1.0", "six==1.16.0"]);
    }

    #[test]
    fn ignores_unpinned_and_direct_entries() {
        let text = "requests>=2.0\nfile:///tmp/pkg#egg=pkg\n";
        assert!(pins(text).is_empty());
    }

    #[test]
    fn reports_line_numbers() {
        let text = "six==1.0\n\nfoo=>1.0\n";
        let err = read_previous_pins(text).unwrap_err();
        match err {
            LockfileError::Parse { line, .. } => assert_eq!(line, 3),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn continuation_lines_keep_first_line_number() {
        let lines = logical_lines("a==1 \\\n  --hash=x\nb==2\n");
        assert_eq!(lines[0].0, 1);
        assert_eq!(lines[1], (3, "b==2".to_string()));
    }

    #[test]
    fn missing_file_has_no_pins() {
        let dir = tempfile::TempDir::new().unwrap();
        let pins = read_previous_pins_from(dir.path().join("requirements.txt")).unwrap();
        assert!(pins.is_empty());
    }
}
