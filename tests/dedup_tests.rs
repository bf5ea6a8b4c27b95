use std::fs;
use std::os::unix::fs::{MetadataExt, PermissionsExt};
use std::path::{Path, PathBuf};

use filetime::{set_file_mtime, FileTime};
use hardlink_dedup::config::{LinkObjective, Options, TimePreference};
use hardlink_dedup::dedup::{Deduplicator, NullReporter, Reporter, RunSummary};
use hardlink_dedup::hardlink::{is_temp_path, LinkEvent};
use hardlink_dedup::scanner::{scan, PathFilter};
use hardlink_dedup::signal::CancelToken;
use tempfile::TempDir;

fn write(dir: &Path, name: &str, content: &[u8]) -> PathBuf {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(&path, content).unwrap();
    path
}

fn write_at(dir: &Path, name: &str, content: &[u8], mtime: i64) -> PathBuf {
    let path = write(dir, name, content);
    set_file_mtime(&path, FileTime::from_unix_time(mtime, 0)).unwrap();
    path
}

fn ino(path: &Path) -> u64 {
    fs::metadata(path).unwrap().ino()
}

fn same_inode(a: &Path, b: &Path) -> bool {
    let (ma, mb) = (fs::metadata(a).unwrap(), fs::metadata(b).unwrap());
    ma.dev() == mb.dev() && ma.ino() == mb.ino()
}

fn run(root: &Path, options: Options) -> RunSummary {
    let mut dedup = Deduplicator::new(options, CancelToken::new());
    scan(root, &PathFilter::default(), &mut dedup);
    dedup.run(&mut NullReporter)
}

fn temp_names(root: &Path) -> Vec<PathBuf> {
    walkdir::WalkDir::new(root)
        .into_iter()
        .filter_map(|e| e.ok())
        .map(|e| e.path().to_path_buf())
        .filter(|p| is_temp_path(p))
        .collect()
}

#[test]
fn test_identical_files_share_inode_after_run() {
    let dir = TempDir::new().unwrap();
    let a = write_at(dir.path(), "a", b"identical content", 1_000);
    let b = write_at(dir.path(), "nested/b", b"identical content", 1_000);

    let summary = run(dir.path(), Options::default());

    assert!(same_inode(&a, &b));
    assert_eq!(summary.stats.linked, 1);
    assert_eq!(summary.stats.saved, b"identical content".len() as u64);
    assert!(!summary.interrupted);
}

#[test]
fn test_overlapping_roots_link_each_path_once() {
    let dir = TempDir::new().unwrap();
    let a = write(dir.path(), "a", b"data");
    let b = write(dir.path(), "sub/b", b"data");

    let mut dedup = Deduplicator::new(Options::content_only(), CancelToken::new());
    for root in [dir.path().to_path_buf(), dir.path().join("sub"), dir.path().to_path_buf()] {
        scan(&root, &PathFilter::default(), &mut dedup);
    }
    let summary = dedup.run(&mut NullReporter);

    assert!(same_inode(&a, &b));
    assert_eq!(summary.stats.files, 2);
    assert_eq!(summary.stats.linked, 1);
    assert_eq!(summary.stats.saved, 4);
    assert_eq!(summary.stats.errors, 0);
    assert!(temp_names(dir.path()).is_empty());
}

#[test]
fn test_mode_mismatch_blocks_linking_unless_ignored() {
    let dir = TempDir::new().unwrap();
    let a = write_at(dir.path(), "a", b"same", 1_000);
    let b = write_at(dir.path(), "b", b"same", 1_000);
    fs::set_permissions(&a, fs::Permissions::from_mode(0o644)).unwrap();
    fs::set_permissions(&b, fs::Permissions::from_mode(0o640)).unwrap();

    let summary = run(dir.path(), Options::default());
    assert_eq!(summary.stats.linked, 0);
    assert_eq!(summary.stats.comparisons, 0);
    assert!(!same_inode(&a, &b));

    let ignore_mode = Options {
        respect_mode: false,
        ..Options::default()
    };
    let summary = run(dir.path(), ignore_mode);
    assert_eq!(summary.stats.linked, 1);
    assert!(same_inode(&a, &b));
}

#[test]
fn test_time_mismatch_blocks_linking_by_default() {
    let dir = TempDir::new().unwrap();
    let a = write_at(dir.path(), "a", b"same", 1_000);
    let b = write_at(dir.path(), "b", b"same", 2_000);

    run(dir.path(), Options::default());
    assert!(!same_inode(&a, &b));
}

#[test]
fn test_second_run_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let a = write(dir.path(), "a", b"payload");
    let b = write(dir.path(), "b", b"payload");
    let c = write(dir.path(), "c", b"payload");

    let first = run(dir.path(), Options::content_only());
    assert_eq!(first.stats.linked, 2);
    let inode = ino(&a);
    assert_eq!(ino(&b), inode);
    assert_eq!(ino(&c), inode);

    let second = run(dir.path(), Options::content_only());
    assert_eq!(second.stats.linked, 0);
    assert_eq!(second.stats.saved, 0);
    assert_eq!(second.stats.files, 3);
    assert_eq!(ino(&a), inode);
    assert_eq!(fs::metadata(&a).unwrap().nlink(), 3);
}

#[test]
fn test_newer_file_becomes_master() {
    // A(mtime=100, "X"), B(mtime=200, "X"), C(mtime=300, "Y")
    let dir = TempDir::new().unwrap();
    let a = write_at(dir.path(), "a", b"X", 100);
    let b = write_at(dir.path(), "b", b"X", 200);
    let c = write_at(dir.path(), "c", b"Y", 300);
    let b_inode = ino(&b);
    let c_inode = ino(&c);

    let options = Options {
        respect_time: false,
        time_preference: TimePreference::Newer,
        ..Options::default()
    };
    let summary = run(dir.path(), options);

    assert_eq!(ino(&a), b_inode);
    assert_eq!(ino(&b), b_inode);
    assert_eq!(ino(&c), c_inode);
    assert_eq!(summary.stats.saved, 1);
    assert_eq!(summary.stats.linked, 1);
    // A と B の比較、B と C の比較 (サイズが同じなので内容を比較する)
    assert_eq!(summary.stats.comparisons, 2);
}

#[test]
fn test_older_file_becomes_master_when_configured() {
    let dir = TempDir::new().unwrap();
    let a = write_at(dir.path(), "a", b"X", 100);
    let b = write_at(dir.path(), "b", b"X", 200);
    let a_inode = ino(&a);

    let options = Options {
        respect_time: false,
        time_preference: TimePreference::Older,
        ..Options::default()
    };
    run(dir.path(), options);

    assert_eq!(ino(&b), a_inode);
}

#[test]
fn test_different_sizes_are_never_compared() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "a", b"short");
    write(dir.path(), "b", b"much longer");

    let summary = run(dir.path(), Options::content_only());
    assert_eq!(summary.stats.comparisons, 0);
    assert_eq!(summary.stats.files, 2);
}

#[test]
fn test_maximize_keeps_most_linked_inode() {
    let dir = TempDir::new().unwrap();
    let lone = write(dir.path(), "a_lone", b"data");
    let linked = write(dir.path(), "b_linked", b"data");
    fs::hard_link(&linked, dir.path().join("c_linked")).unwrap();
    let linked_inode = ino(&linked);

    let options = Options {
        link_objective: LinkObjective::Maximize,
        ..Options::content_only()
    };
    let summary = run(dir.path(), options);

    assert_eq!(ino(&lone), linked_inode);
    assert_eq!(summary.stats.linked, 1);
    assert_eq!(summary.stats.saved, 4);
}

#[test]
fn test_saved_bytes_not_counted_when_inode_still_referenced() {
    let dir = TempDir::new().unwrap();
    let tree = dir.path().join("tree");
    let keep = write(&tree, "a", b"data");
    let slave = write(&tree, "b", b"data");
    // ツリー外からも参照されているinode
    fs::hard_link(&slave, dir.path().join("outside")).unwrap();

    let options = Options {
        link_objective: LinkObjective::Minimize,
        ..Options::content_only()
    };
    let summary = run(&tree, options);

    assert!(same_inode(&keep, &slave));
    assert_eq!(summary.stats.linked, 1);
    assert_eq!(summary.stats.saved, 0);
}

#[test]
fn test_dry_run_matches_real_run_without_mutation() {
    let dir = TempDir::new().unwrap();
    let a = write(dir.path(), "a", b"one");
    let b = write(dir.path(), "b", b"one");
    let c = write(dir.path(), "c", b"two");
    let d = write(dir.path(), "d", b"two");
    let before: Vec<u64> = [&a, &b, &c, &d].iter().map(|p| ino(p)).collect();

    let dry = run(
        dir.path(),
        Options {
            dry_run: true,
            ..Options::content_only()
        },
    );
    let after_dry: Vec<u64> = [&a, &b, &c, &d].iter().map(|p| ino(p)).collect();
    assert_eq!(before, after_dry);
    assert!(temp_names(dir.path()).is_empty());

    let real = run(dir.path(), Options::content_only());
    assert_eq!(dry.stats, real.stats);
    assert!(same_inode(&a, &b));
    assert!(same_inode(&c, &d));
}

#[test]
fn test_cancelled_run_mutates_nothing() {
    let dir = TempDir::new().unwrap();
    let a = write(dir.path(), "a", b"same");
    let b = write(dir.path(), "b", b"same");

    let mut dedup = Deduplicator::new(Options::content_only(), CancelToken::new());
    scan(dir.path(), &PathFilter::default(), &mut dedup);
    dedup.cancel_token().cancel();
    let summary = dedup.run(&mut NullReporter);

    assert!(summary.interrupted);
    assert_eq!(summary.stats.linked, 0);
    assert!(!same_inode(&a, &b));
}

#[test]
fn test_no_temporary_names_after_success() {
    let dir = TempDir::new().unwrap();
    for name in ["a", "b", "sub/c", "sub/d"] {
        write(dir.path(), name, b"content");
    }

    run(dir.path(), Options::content_only());
    assert!(temp_names(dir.path()).is_empty());
}

/// 最初の置換の直後にファイルシステムを書き換える `Reporter`
struct Sabotage<F: FnMut()> {
    action: Option<F>,
}

impl<F: FnMut()> Reporter for Sabotage<F> {
    fn linked(&mut self, _event: &LinkEvent, _dry_run: bool) {
        if let Some(mut action) = self.action.take() {
            action();
        }
    }
}

/// a (新しい) と、2つのパスを持つ古いinode c1 / c2 を作る
fn master_and_linked_pair(dir: &Path) -> (PathBuf, PathBuf, PathBuf) {
    let a = write_at(dir, "a", b"content", 300);
    let c1 = write_at(dir, "c1", b"content", 100);
    let c2 = dir.join("c2");
    fs::hard_link(&c1, &c2).unwrap();
    (a, c1, c2)
}

#[test]
fn test_no_temporary_names_after_rename_failure() {
    let dir = TempDir::new().unwrap();
    let (a, c1, c2) = master_and_linked_pair(dir.path());

    let mut dedup = Deduplicator::new(Options::content_only(), CancelToken::new());
    scan(dir.path(), &PathFilter::default(), &mut dedup);

    // c2 を空でないディレクトリに差し替えてリネームを失敗させる
    let victim = c2.clone();
    let mut reporter = Sabotage {
        action: Some(move || {
            fs::remove_file(&victim).unwrap();
            fs::create_dir(&victim).unwrap();
            fs::write(victim.join("inside"), b"x").unwrap();
        }),
    };
    let summary = dedup.run(&mut reporter);

    assert!(temp_names(dir.path()).is_empty());
    assert!(c2.is_dir());
    assert!(same_inode(&a, &c1));
    assert_eq!(summary.stats.linked, 1);
    assert_eq!(summary.stats.errors, 1);
}

#[test]
fn test_link_failure_leaves_slave_untouched() {
    let dir = TempDir::new().unwrap();
    let (a, c1, c2) = master_and_linked_pair(dir.path());
    let old_inode = ino(&c2);

    let mut dedup = Deduplicator::new(Options::content_only(), CancelToken::new());
    scan(dir.path(), &PathFilter::default(), &mut dedup);

    // マスターのパスが消えると、残りのパスにリンクを作れない
    let master = a.clone();
    let mut reporter = Sabotage {
        action: Some(move || fs::remove_file(&master).unwrap()),
    };
    let summary = dedup.run(&mut reporter);

    assert!(temp_names(dir.path()).is_empty());
    assert_eq!(ino(&c2), old_inode);
    assert_ne!(ino(&c1), old_inode);
    assert_eq!(fs::read(&c2).unwrap(), b"content");
    assert_eq!(summary.stats.linked, 1);
    assert_eq!(summary.stats.saved, 0);
    assert_eq!(summary.stats.errors, 1);
}
