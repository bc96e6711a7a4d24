//! Integration tests for marfs-crawler
//!
//! These run complete crawls against the in-memory metadata store and check
//! the output file.

use marfs_crawler::config::{CrawlConfig, QueueCapacity};
use marfs_crawler::tag::{stream_id, FileTag};
use marfs_crawler::targets::Targets;
use marfs_crawler::tree::{MemoryStore, NamespaceSpec, NamespaceTree};
use marfs_crawler::walker::{CrawlCoordinator, CrawlResult};
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;
use tempfile::tempdir;

const REPO: &str = "main-repo";

/// Tag for a file whose data is object `objno` of a stream in `ns`
fn tag(ns: &str, objno: u64) -> String {
    FileTag {
        objno,
        bytes: 512,
        ..FileTag::new("ctag", stream_id(REPO, ns, 1700000000, 42), 4096)
    }
    .to_string()
}

fn object_id(ns: &str, objno: u64) -> String {
    format!("ctag|{}.{}", stream_id(REPO, ns, 1700000000, 42), objno)
}

fn tree(root: NamespaceSpec) -> Arc<NamespaceTree> {
    Arc::new(NamespaceTree::build("/campaign", "/", root).unwrap())
}

fn crawl(
    tree: Arc<NamespaceTree>,
    store: MemoryStore,
    targets: Targets,
    output: &Path,
    threads: usize,
) -> CrawlResult {
    let mut config = CrawlConfig::new(output, targets);
    config.threads = threads;
    CrawlCoordinator::new(config, tree, Arc::new(store))
        .unwrap()
        .run(None)
        .unwrap()
}

fn output_lines(output: &Path) -> BTreeSet<String> {
    std::fs::read_to_string(output)
        .unwrap()
        .lines()
        .map(str::to_string)
        .collect()
}

#[test]
fn test_two_files_two_objects() {
    let store = MemoryStore::new();
    store.add_file("/", "obj-a-file", tag("/", 0));
    store.add_file("/", "obj-b-file", tag("/", 1));

    let dir = tempdir().unwrap();
    let output = dir.path().join("objects.txt");
    let result = crawl(
        tree(NamespaceSpec::new("root").repo(REPO)),
        store,
        Targets::parse(["/campaign"]).unwrap(),
        &output,
        4,
    );

    let expected: BTreeSet<_> = [object_id("/", 0), object_id("/", 1)].into_iter().collect();
    assert_eq!(output_lines(&output), expected);
    assert_eq!(result.entries_written, 2);
    assert_eq!(result.files, 2);
    assert!(result.is_clean());
}

#[test]
fn test_shared_object_across_namespace_levels() {
    let store = MemoryStore::new();
    store.add_file("/", "top-shared", tag("/", 7));
    store.add_file("/", "top-unique", tag("/", 1));
    store.add_file("/sub", "nested/sub-shared", tag("/", 7));
    store.add_file("/sub", "nested/sub-unique", tag("/sub", 2));

    let dir = tempdir().unwrap();
    let output = dir.path().join("objects.txt");
    let result = crawl(
        tree(NamespaceSpec::new("root").repo(REPO).subspace(NamespaceSpec::new("sub"))),
        store,
        Targets::parse(["/campaign"]).unwrap(),
        &output,
        3,
    );

    let text = std::fs::read_to_string(&output).unwrap();
    assert_eq!(text.lines().count(), 3);
    assert_eq!(
        text.lines().filter(|l| *l == object_id("/", 7)).count(),
        1
    );
    assert!(output_lines(&output).contains(&object_id("/sub", 2)));
    assert_eq!(result.files, 4);
    // root, sub and sub/nested
    assert_eq!(result.directories, 3);
}

#[test]
fn test_reverse_lookup_finds_one_path() {
    let store = MemoryStore::new();
    store.add_file("/proj", "run1/out.dat", tag("/proj", 3));
    store.add_file("/proj", "run1/log.txt", tag("/proj", 4));
    store.add_file("/proj", "run2/out.dat", tag("/proj", 5));
    // Same stream position, but outside the namespace being searched
    store.add_file("/", "elsewhere", tag("/proj", 3));

    let dir = tempdir().unwrap();
    let output = dir.path().join("paths.txt");
    let result = crawl(
        tree(NamespaceSpec::new("root").repo(REPO).subspace(NamespaceSpec::new("proj"))),
        store,
        Targets::parse([object_id("/proj", 3)]).unwrap(),
        &output,
        2,
    );

    let expected: BTreeSet<_> = ["/campaign/proj/run1/out.dat".to_string()]
        .into_iter()
        .collect();
    assert_eq!(output_lines(&output), expected);
    assert_eq!(result.entries_written, 1);
}

#[test]
fn test_reverse_lookup_does_not_enter_subspaces() {
    let store = MemoryStore::new();
    store.add_file("/proj", "a", tag("/proj", 1));
    store.add_file("/proj/inner", "b", tag("/proj", 1));

    let dir = tempdir().unwrap();
    let output = dir.path().join("paths.txt");
    crawl(
        tree(
            NamespaceSpec::new("root")
                .repo(REPO)
                .subspace(NamespaceSpec::new("proj").subspace(NamespaceSpec::new("inner"))),
        ),
        store,
        Targets::parse([object_id("/proj", 1)]).unwrap(),
        &output,
        2,
    );

    let expected: BTreeSet<_> = ["/campaign/proj/a".to_string()].into_iter().collect();
    assert_eq!(output_lines(&output), expected);
}

#[test]
fn test_multi_object_file_and_file_target() {
    let store = MemoryStore::new();
    let big = FileTag {
        objno: 10,
        offset: 100,
        bytes: 3 * 4096,
        ..FileTag::new("ctag", stream_id(REPO, "/", 1700000000, 42), 4096)
    };
    store.add_file("/", "data/big", big.to_string());
    store.add_file("/", "data/other", tag("/", 99));

    let dir = tempdir().unwrap();
    let output = dir.path().join("objects.txt");
    let result = crawl(
        tree(NamespaceSpec::new("root").repo(REPO)),
        store,
        Targets::parse(["/campaign/data/big"]).unwrap(),
        &output,
        1,
    );

    let expected: BTreeSet<_> = (10..=13).map(|n| object_id("/", n)).collect();
    assert_eq!(output_lines(&output), expected);
    assert_eq!(result.files, 1);
    assert_eq!(result.directories, 0);
}

#[test]
fn test_broken_subtree_is_counted_not_fatal() {
    let store = MemoryStore::new();
    store.add_file("/", "good/f", tag("/", 1));
    store.add_file("/", "bad/f", tag("/", 2));
    store.break_dir("/", "bad");
    store.add_untagged_file("/", "good/untagged");

    let dir = tempdir().unwrap();
    let output = dir.path().join("objects.txt");
    let result = crawl(
        tree(NamespaceSpec::new("root").repo(REPO)),
        store,
        Targets::parse(["/campaign", "/campaign/missing"]).unwrap(),
        &output,
        4,
    );

    let expected: BTreeSet<_> = [object_id("/", 1)].into_iter().collect();
    assert_eq!(output_lines(&output), expected);
    assert_eq!(result.errors, 2);
    assert_eq!(result.skipped, 1);
    assert!(!result.is_clean());
}

#[test]
fn test_bounded_queue_and_output_truncation() {
    let store = MemoryStore::new();
    for i in 0..20 {
        store.add_file("/", &format!("d{}/f{}", i % 4, i), tag("/", i));
    }

    let dir = tempdir().unwrap();
    let output = dir.path().join("objects.txt");
    std::fs::write(&output, "stale line\n").unwrap();

    let mut config = CrawlConfig::new(&output, Targets::parse(["/campaign"]).unwrap());
    config.threads = 4;
    config.queue_capacity = QueueCapacity::Bounded(8);
    config.cache_capacity = 1;
    let result = CrawlCoordinator::new(
        config,
        tree(NamespaceSpec::new("root").repo(REPO)),
        Arc::new(store),
    )
    .unwrap()
    .run(None)
    .unwrap();

    let lines = output_lines(&output);
    assert_eq!(lines.len(), 20);
    assert!(!lines.contains("stale line"));
    assert_eq!(result.objects_recorded, 20);
    assert_eq!(result.directories, 5);
}

#[test]
fn test_tree_from_toml_file() {
    let dir = tempdir().unwrap();
    let config_path = dir.path().join("marfs.toml");
    std::fs::write(
        &config_path,
        r#"
mountpoint = "/campaign"
meta_root = "/"

[root]
name = "root"
repo = "main-repo"

[[root.subspaces]]
name = "projects"
"#,
    )
    .unwrap();

    let tree = NamespaceTree::load(&config_path).unwrap();
    assert_eq!(tree.len(), 2);

    let store = MemoryStore::new();
    store.add_file("/projects", "f", tag("/projects", 0));

    let output = dir.path().join("objects.txt");
    crawl(
        Arc::new(tree),
        store,
        Targets::parse(["/campaign/projects"]).unwrap(),
        &output,
        2,
    );

    let expected: BTreeSet<_> = [object_id("/projects", 0)].into_iter().collect();
    assert_eq!(output_lines(&output), expected);
}
