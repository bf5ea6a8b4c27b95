//! ハードリンク置換処理

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process;

use crate::record::FileRecord;
use crate::signal::CancelToken;

/// 一時リンク名に付ける予約済みの接尾辞
pub const TEMP_SUFFIX: &str = ".hardlink-temporary";

/// ハードリンク置換のエラー
///
/// いずれの場合も置換対象のパスは元の内容のまま残り、一時リンクも残らない
/// (`RenameCleanup` を除く)。
#[derive(Debug, thiserror::Error)]
pub enum ReplaceError {
    /// 一時リンクの作成失敗 (デバイス跨ぎ、権限、リンク数上限など)
    #[error("cannot link {} to {}: {source}", master.display(), temp.display())]
    Link {
        master: PathBuf,
        temp: PathBuf,
        #[source]
        source: io::Error,
    },
    /// リネーム失敗 (一時リンクは削除済み)
    #[error("cannot rename {} to {}: {source}", temp.display(), target.display())]
    Rename {
        temp: PathBuf,
        target: PathBuf,
        #[source]
        source: io::Error,
    },
    /// リネーム失敗後、一時リンクの削除にも失敗
    #[error(
        "cannot rename {} to {}: {source} (removing the temporary link also failed: {cleanup})",
        temp.display(),
        target.display()
    )]
    RenameCleanup {
        temp: PathBuf,
        target: PathBuf,
        #[source]
        source: io::Error,
        cleanup: io::Error,
    },
}

/// 予約済みの一時リンク名 (`<name>.hardlink-temporary.<pid>`) か
pub fn is_temp_path(path: &Path) -> bool {
    let Some(name) = path.file_name() else {
        return false;
    };
    let name = name.to_string_lossy();
    let Some((head, pid)) = name.rsplit_once('.') else {
        return false;
    };
    !pid.is_empty()
        && pid.bytes().all(|b| b.is_ascii_digit())
        && head.len() > TEMP_SUFFIX.len()
        && head.ends_with(TEMP_SUFFIX)
}

/// `target` を `master` へのハードリンクにアトミックに置き換える
///
/// 同じディレクトリに一時名でリンクを作成し、それを `target` へリネームする。
/// `target` は常に置換前の内容か、マスターへのリンクのどちらかを指す。
///
/// Args:
///     master: リンク元
///     target: 置換対象
pub fn link_over(master: &Path, target: &Path) -> Result<(), ReplaceError> {
    let temp = temp_path(target);

    if let Err(source) = fs::hard_link(master, &temp) {
        return Err(ReplaceError::Link {
            master: master.to_path_buf(),
            temp,
            source,
        });
    }

    if let Err(source) = fs::rename(&temp, target) {
        return match fs::remove_file(&temp) {
            Ok(()) => Err(ReplaceError::Rename {
                temp,
                target: target.to_path_buf(),
                source,
            }),
            Err(cleanup) => Err(ReplaceError::RenameCleanup {
                temp,
                target: target.to_path_buf(),
                source,
                cleanup,
            }),
        };
    }

    // 同一inodeを指す2つの名前の間の rename(2) は何もせず成功する
    remove_if_regular_file(&temp);
    Ok(())
}

fn temp_path(target: &Path) -> PathBuf {
    let file_name = target
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "target".to_string());
    target.with_file_name(format!("{}{}.{}", file_name, TEMP_SUFFIX, process::id()))
}

fn remove_if_regular_file(path: &Path) {
    match fs::symlink_metadata(path) {
        Ok(meta) if meta.is_file() => {
            let _ = fs::remove_file(path);
        }
        _ => {}
    }
}

/// 1つのパスの置換で起きたこと
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkEvent {
    /// 置換されたパス
    pub path: PathBuf,
    /// リンク先 (マスターのパス)
    pub master: PathBuf,
    /// 置換前に `path` が指していたinode
    pub previous_inode: u64,
    /// マスターのinode
    pub master_inode: u64,
    /// ファイルサイズ
    pub size: u64,
    /// この置換で解放されたバイト数 (旧inodeの参照が0になった場合のみ)
    pub saved: u64,
}

/// スレーブの代表パスを1つマスターへのリンクに置き換え、レコードを更新する
///
/// 同一inodeの場合はディスク操作なしでパスを移し、スレーブを統合済みにする。
/// `dry_run` ではディスク操作だけを省き、記録の更新は同じように行う。
///
/// Returns:
///     置換を行った場合はそのイベント
pub fn replace_one(
    master: &mut FileRecord,
    slave: &mut FileRecord,
    dry_run: bool,
) -> Result<Option<LinkEvent>, ReplaceError> {
    if master.same_inode(slave) {
        master.paths.append(&mut slave.paths);
        slave.slave = true;
        return Ok(None);
    }

    if slave.paths.is_empty() {
        slave.slave = true;
        return Ok(None);
    }

    let target = slave.paths[0].path.clone();
    if !dry_run {
        link_over(master.path(), &target)?;
    }

    master.nlink += 1;
    slave.nlink = slave.nlink.saturating_sub(1);
    let saved = if slave.nlink == 0 { slave.size } else { 0 };

    let event = LinkEvent {
        path: target,
        master: master.path().to_path_buf(),
        previous_inode: slave.inode,
        master_inode: master.inode,
        size: slave.size,
        saved,
    };

    let moved = slave.paths.remove(0);
    master.paths.push(moved);
    if slave.paths.is_empty() {
        slave.slave = true;
    }

    Ok(Some(event))
}

/// `replace` の終わり方
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplaceOutcome {
    /// スレーブの全パスをマスターに統合した
    Merged,
    /// 途中でキャンセルされた (完了した置換はそのまま有効)
    Interrupted,
}

/// スレーブの全パスがマスターに移るまで `replace_one` を繰り返す
///
/// 各パスのディスク操作の前にキャンセルを確認する。リンクとリネームの組は
/// 一度始めたら途中で中断しない。
pub fn replace(
    master: &mut FileRecord,
    slave: &mut FileRecord,
    dry_run: bool,
    cancel: &CancelToken,
    mut on_link: impl FnMut(&LinkEvent),
) -> Result<ReplaceOutcome, ReplaceError> {
    while !slave.slave {
        if cancel.is_cancelled() {
            return Ok(ReplaceOutcome::Interrupted);
        }
        if let Some(event) = replace_one(master, slave, dry_run)? {
            on_link(&event);
        }
    }
    Ok(ReplaceOutcome::Merged)
}
