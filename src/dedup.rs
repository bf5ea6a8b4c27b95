//! 重複排除の実行コンテキストとマージ処理

use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

use crate::compare::{check_link, Verdict};
use crate::config::Options;
use crate::hardlink::{replace, LinkEvent, ReplaceOutcome};
use crate::index::EquivalenceIndex;
use crate::record::{FileRecord, RecordId};
use crate::select::should_replace_master;
use crate::signal::CancelToken;

/// 処理統計
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Stats {
    /// 走査した通常ファイル数 (空ファイルを含む)
    pub files: usize,
    /// 内容比較の回数
    pub comparisons: usize,
    /// ハードリンクに置き換えたパス数
    pub linked: usize,
    /// 解放したバイト数
    pub saved: u64,
    /// 回復可能なエラーの数
    pub errors: usize,
}

/// 実行結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub stats: Stats,
    /// キャンセルにより途中で終了したか
    pub interrupted: bool,
    pub elapsed: Duration,
}

/// リンクイベントと統計スナップショットの受け手
pub trait Reporter {
    /// パスを1つ置き換えた (dry run では置き換えたとみなした)
    fn linked(&mut self, _event: &LinkEvent, _dry_run: bool) {}

    /// スナップショットが要求された
    fn snapshot(&mut self, _stats: &Stats) {}
}

/// 何もしない `Reporter`
#[derive(Debug, Default)]
pub struct NullReporter;

impl Reporter for NullReporter {}

enum Flow {
    Continue,
    Stop,
}

/// 1つのマスター選出パスの結果
struct Pass {
    master: RecordId,
    slaves: Vec<RecordId>,
    remaining: Vec<RecordId>,
}

/// 1回の実行全体の状態
///
/// 走査中は `add` でレコードを受け取り、その後 `run` で消費される。
/// 走査とマージは重ならないので、内部状態にロックは不要。
#[derive(Debug)]
pub struct Deduplicator {
    options: Options,
    cancel: CancelToken,
    index: EquivalenceIndex,
    /// 空ファイルのパス (インデックスには入れない)
    empty: HashSet<PathBuf>,
    stats: Stats,
    started: std::time::Instant,
}

impl Deduplicator {
    pub fn new(options: Options, cancel: CancelToken) -> Self {
        Self {
            options,
            cancel,
            index: EquivalenceIndex::new(),
            empty: HashSet::new(),
            stats: Stats::default(),
            started: std::time::Instant::now(),
        }
    }

    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    pub fn stats(&self) -> &Stats {
        &self.stats
    }

    pub fn index(&self) -> &EquivalenceIndex {
        &self.index
    }

    /// 走査で見つけた通常ファイルを登録する
    ///
    /// 空ファイルは数えるだけで、リンク対象にはならないので登録しない。
    /// 走査範囲が重なって同じパスを再び見た場合は数えない。
    pub fn add(&mut self, record: FileRecord) {
        if record.size == 0 {
            if self.empty.insert(record.path().to_path_buf()) {
                self.stats.files += 1;
            }
            return;
        }

        let path = record.path().to_path_buf();
        match self.index.insert(record) {
            Some(_) => self.stats.files += 1,
            None => log::debug!("{} already scanned", path.display()),
        }
    }

    /// 走査側の回復可能なエラーを数える
    pub fn record_error(&mut self) {
        self.stats.errors += 1;
    }

    /// キャンセル・スナップショット要求を確認する
    ///
    /// Returns:
    ///     キャンセルが要求されていればtrue
    fn poll(&mut self, reporter: &mut impl Reporter) -> bool {
        if self.cancel.take_snapshot_request() {
            reporter.snapshot(&self.stats);
        }
        self.cancel.is_cancelled()
    }

    /// 全ての同値クラスを処理する
    ///
    /// キャンセルされた場合は現在以降のクラスを処理せずに戻る。
    /// それまでに完了した置換はそのまま有効。
    pub fn run(mut self, reporter: &mut impl Reporter) -> RunSummary {
        let groups: Vec<Vec<RecordId>> = self.index.groups().map(<[RecordId]>::to_vec).collect();
        log::debug!(
            "{} candidate groups out of {} buckets",
            groups.len(),
            self.index.bucket_count()
        );

        let mut interrupted = false;
        for group in groups {
            if self.poll(reporter) {
                interrupted = true;
                break;
            }
            if let Flow::Stop = self.merge_group(group, reporter) {
                interrupted = true;
                break;
            }
        }

        if interrupted {
            log::info!("interrupted, completed replacements are kept");
        }

        RunSummary {
            stats: self.stats,
            interrupted,
            elapsed: self.started.elapsed(),
        }
    }

    /// 1つの同値クラスを処理する
    ///
    /// マスターと合わなかった候補は捨てずに、残りの候補だけで次のパスを行う。
    /// 各パスでマスターは必ず消費されるので、候補は単調に減る。
    fn merge_group(&mut self, group: Vec<RecordId>, reporter: &mut impl Reporter) -> Flow {
        let mut pending = group;
        while pending.len() >= 2 {
            let Some(pass) = self.select_pass(&pending, reporter) else {
                return Flow::Stop;
            };

            for slave in pass.slaves {
                if self.poll(reporter) {
                    return Flow::Stop;
                }
                if let Flow::Stop = self.commit(pass.master, slave, reporter) {
                    return Flow::Stop;
                }
            }

            pending = pass.remaining;
        }
        Flow::Continue
    }

    /// 先頭の候補を仮のマスターにして残りを順に比較し、最終的なマスターを決める
    ///
    /// 内容比較は候補ごとに現在のマスターとの1回だけ。
    fn select_pass(&mut self, pending: &[RecordId], reporter: &mut impl Reporter) -> Option<Pass> {
        let mut master = pending[0];
        let mut slaves = Vec::new();
        let mut remaining = Vec::new();

        for &candidate in &pending[1..] {
            if self.poll(reporter) {
                return None;
            }

            let current = self.index.get(master);
            let other = self.index.get(candidate);
            if other.slave {
                continue;
            }

            log::debug!("Comparing {} to {}", current.path().display(), other.path().display());
            let verdict = check_link(current, other, &self.options, &self.cancel);
            if verdict.compared() {
                self.stats.comparisons += 1;
            }

            match verdict {
                Verdict::Linkable => {
                    if should_replace_master(other, current, &self.options) {
                        slaves.push(master);
                        master = candidate;
                    } else {
                        slaves.push(candidate);
                    }
                }
                Verdict::AlreadyLinked => slaves.push(candidate),
                Verdict::Interrupted => return None,
                Verdict::Unreadable(e) => {
                    log::warn!("{}", e);
                    self.stats.errors += 1;
                    // マスター側が読めない場合、候補は次のパスでやり直せる
                    if e.path() == current.path() {
                        remaining.push(candidate);
                    }
                }
                Verdict::ContentDiffers => remaining.push(candidate),
                Verdict::Ineligible(reason) => {
                    log::debug!("{} not linkable: {:?} differs", other.path().display(), reason);
                    remaining.push(candidate);
                }
            }
        }

        Some(Pass {
            master,
            slaves,
            remaining,
        })
    }

    /// スレーブをマスターへのリンクに置き換える
    fn commit(&mut self, master: RecordId, slave: RecordId, reporter: &mut impl Reporter) -> Flow {
        let dry_run = self.options.dry_run;
        let stats = &mut self.stats;
        let (m, s) = self.index.pair_mut(master, slave);

        let result = replace(m, s, dry_run, &self.cancel, |event| {
            stats.linked += 1;
            stats.saved += event.saved;
            reporter.linked(event, dry_run);
        });

        match result {
            Ok(ReplaceOutcome::Merged) => Flow::Continue,
            Ok(ReplaceOutcome::Interrupted) => Flow::Stop,
            Err(e) => {
                log::warn!("{}", e);
                self.stats.errors += 1;
                Flow::Continue
            }
        }
    }
}
