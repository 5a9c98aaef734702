//! Resolve, hash, write and re-read lockfiles end to end.

use lockwright_lockfile::{LockfileWriter, read_locked, read_previous_pins_from};
use lockwright_resolver::{
    IndexOptions, ResolveRequest, Resolver, ResolverConfig, ResolvedSet, collect_hashes,
};
use lockwright_test_utils::prelude::*;
use lockwright_test_utils::prelude::assert_eq;
use rstest::rstest;
use std::sync::Arc;

fn compile(project: &TempProject) -> (Arc<lockwright_resolver::MemoryRepository>, ResolvedSet) {
    let repo = Arc::new(Fixtures::flask_stack().unwrap());
    let previous = read_previous_pins_from(project.lockfile_path()).unwrap();
    let request = ResolveRequest::new(project.top_level().unwrap())
        .with_constraints(project.constraints().unwrap())
        .with_previous_pins(previous);
    let resolved = Resolver::new(Arc::clone(&repo), ResolverConfig::default())
        .resolve(&request)
        .unwrap();
    (repo, resolved)
}

#[test]
fn written_lockfile_reads_back_as_previous_pins() {
    init_tracing();
    let project = TempProject::new()
        .requirement("flask")
        .constraint("click<8")
        .build()
        .unwrap();

    let (repo, resolved) = compile(&project);
    let hashes = collect_hashes(repo.as_ref(), &resolved).unwrap();
    let result = LockfileWriter::new()
        .command("lockwright compile --generate-hashes")
        .write(project.lockfile_path(), &resolved, Some(&hashes))
        .unwrap();
    assert!(!result.had_existing);
    assert_eq!(result.hash.len(), 64);

    let text = project.read_lockfile().unwrap();
    assert!(text.starts_with("#\n# This file is autogenerated by lockwright\n"));
    assert!(text.contains("#    lockwright compile --generate-hashes\n"));
    assert!(text.contains("click==7.1.2 \\\n    --hash=sha256:"));
    assert!(text.contains("    # via flask\n"));
    assert_lockfile_pins(
        &text,
        &[
            "click==7.1.2",
            "flask==2.0.1",
            "itsdangerous==2.0.1",
            "jinja2==3.0.1",
            "markupsafe==2.0.1",
            "werkzeug==2.0.1",
        ],
    )
    .unwrap();
}

#[test]
fn recompiling_keeps_the_lockfile_identical() {
    let project = TempProject::new()
        .requirements(&["flask", "click==7.1.2"])
        .build()
        .unwrap();
    let writer = LockfileWriter::new();

    let (_, first) = compile(&project);
    writer.write(project.lockfile_path(), &first, None).unwrap();
    let before = read_locked(project.lockfile_path()).unwrap();

    // Loosen the input; the previous pin of click is still preferred.
    project.write_requirements_in("flask\nclick\n").unwrap();
    let (_, second) = compile(&project);
    let result = writer.write(project.lockfile_path(), &second, None).unwrap();
    assert!(result.had_existing);

    let after = project.read_lockfile().unwrap();
    assert_eq!(before, after);
    assert_eq!(
        project.file_names().unwrap(),
        vec!["requirements.in", "requirements.txt", "requirements.txt.lck"]
    );
}

#[test]
fn editable_checkouts_are_written_first_without_hashes() {
    let project = TempProject::new()
        .requirement("-e git+https://github.com/org/zed@main#egg=zed")
        .build()
        .unwrap();
    let repo = Fixtures::vcs_checkout().unwrap();
    let resolved = Resolver::new(Arc::new(&repo), ResolverConfig::default())
        .resolve(&ResolveRequest::new(project.top_level().unwrap()))
        .unwrap();
    let hashes = collect_hashes(&repo, &resolved).unwrap();

    let text = LockfileWriter::new()
        .emit_header(false)
        .render(&resolved, Some(&hashes))
        .unwrap();
    let mut lines = text.lines();
    assert_eq!(
        lines.next(),
        Some("-e git+https://github.com/org/zed@main#egg=zed")
    );
    assert_eq!(lines.next(), Some("six==1.16.0 \\"));
    assert_lockfile_pins(&text, &["six==1.16.0"]).unwrap();
}

#[rstest]
#[case::defaults(IndexOptions::default(), true, true, "")]
#[case::custom_index(
    IndexOptions {
        index_url: Some("https://mirror.example/simple".into()),
        ..IndexOptions::default()
    },
    true,
    true,
    "--index-url https://mirror.example/simple\n\n"
)]
#[case::trusted_host_hidden(
    IndexOptions {
        extra_index_urls: vec!["https://extra.example/simple".into()],
        trusted_hosts: vec!["extra.example".into()],
        ..IndexOptions::default()
    },
    true,
    false,
    "--extra-index-url https://extra.example/simple\n\n"
)]
#[case::index_hidden(
    IndexOptions {
        index_url: Some("https://mirror.example/simple".into()),
        trusted_hosts: vec!["mirror.example".into()],
        ..IndexOptions::default()
    },
    false,
    true,
    "--trusted-host mirror.example\n\n"
)]
fn option_lines_follow_toggles(
    #[case] options: IndexOptions,
    #[case] emit_index: bool,
    #[case] emit_trusted_host: bool,
    #[case] expected_prefix: &str,
) {
    let repo = Fixtures::foo_bar().unwrap();
    let resolved = Resolver::new(Arc::new(&repo), ResolverConfig::default())
        .resolve(&ResolveRequest::new([
            lockwright_resolver::Requirement::parse("foo").unwrap(),
        ]))
        .unwrap();

    let text = LockfileWriter::new()
        .emit_header(false)
        .annotate(false)
        .index_options(options)
        .emit_index(emit_index)
        .emit_trusted_host(emit_trusted_host)
        .render(&resolved, None)
        .unwrap();
    assert_eq!(text, format!("{expected_prefix}bar==1.5\nfoo==1.0\n"));
}
