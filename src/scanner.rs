//! ディレクトリツリーの走査とパスフィルタ

use std::path::Path;

use regex::Regex;
use walkdir::WalkDir;

use crate::dedup::Deduplicator;
use crate::hardlink::is_temp_path;
use crate::record::FileRecord;

/// フィルタの正規表現エラー
#[derive(Debug, thiserror::Error)]
#[error("could not compile regular expression {pattern}: {source}")]
pub struct FilterError {
    pub pattern: String,
    #[source]
    pub source: regex::Error,
}

/// 走査中のエントリ読み込みエラー
#[derive(Debug, thiserror::Error)]
#[error("cannot read entry: {0}")]
pub struct ScanError(#[from] walkdir::Error);

/// include / exclude の正規表現によるパスフィルタ
///
/// exclude に一致しても include にも一致すれば対象に含める。
/// exclude が無く include だけがある場合は、include に一致するものだけを対象にする。
#[derive(Debug, Clone, Default)]
pub struct PathFilter {
    include: Vec<Regex>,
    exclude: Vec<Regex>,
}

impl PathFilter {
    /// 正規表現をコンパイルしてフィルタを作る
    ///
    /// Args:
    ///     include: 対象に含めるパターン
    ///     exclude: 対象から外すパターン
    pub fn new(include: &[String], exclude: &[String]) -> Result<Self, FilterError> {
        Ok(Self {
            include: compile_all(include)?,
            exclude: compile_all(exclude)?,
        })
    }

    /// パスを対象に含めるか
    pub fn accepts(&self, path: &Path) -> bool {
        let text = path.to_string_lossy();
        let included = self.include.iter().any(|re| re.is_match(&text));

        if !self.exclude.is_empty() {
            let excluded = self.exclude.iter().any(|re| re.is_match(&text));
            return !excluded || included;
        }
        self.include.is_empty() || included
    }
}

fn compile_all(patterns: &[String]) -> Result<Vec<Regex>, FilterError> {
    patterns
        .iter()
        .map(|pattern| {
            Regex::new(pattern).map_err(|source| FilterError {
                pattern: pattern.clone(),
                source,
            })
        })
        .collect()
}

/// 走査の終わり方
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanOutcome {
    Completed,
    Interrupted,
}

/// 指定パス以下の通常ファイルを登録する
///
/// Args:
///     base_path: 探索開始ディレクトリ (ファイルでもよい)
///     filter: パスフィルタ
///     dedup: 登録先
pub fn scan(base_path: &Path, filter: &PathFilter, dedup: &mut Deduplicator) -> ScanOutcome {
    scan_with_progress(base_path, filter, dedup, |_| {})
}

/// 指定パス以下の通常ファイルを登録する (ディレクトリごとにコールバック)
///
/// シンボリックリンクは辿らない。エントリはファイル名順に訪れる。
/// 読めないエントリはログに出して数え、走査は続ける。
/// 予約済みの一時リンク名は対象外。
pub fn scan_with_progress<F>(
    base_path: &Path,
    filter: &PathFilter,
    dedup: &mut Deduplicator,
    mut on_dir: F,
) -> ScanOutcome
where
    F: FnMut(&Path),
{
    for entry in WalkDir::new(base_path).follow_links(false).sort_by_file_name() {
        if dedup.cancel_token().is_cancelled() {
            return ScanOutcome::Interrupted;
        }

        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                log::warn!("{}", ScanError::from(e));
                dedup.record_error();
                continue;
            }
        };

        let path = entry.path();
        let file_type = entry.file_type();
        if file_type.is_dir() {
            on_dir(path);
            continue;
        }
        if !file_type.is_file() || is_temp_path(path) || !filter.accepts(path) {
            continue;
        }

        let metadata = match entry.metadata() {
            Ok(metadata) => metadata,
            Err(e) => {
                log::warn!("{}", ScanError::from(e));
                dedup.record_error();
                continue;
            }
        };

        log::trace!("Visiting {} (file {})", path.display(), dedup.stats().files + 1);
        dedup.add(FileRecord::from_metadata(path.to_path_buf(), &metadata));
    }

    ScanOutcome::Completed
}
