//! ファイル内容のバイト単位比較とリンク可否の判定

use std::fs::File;
use std::io::{self, ErrorKind, Read};
use std::path::{Path, PathBuf};

use crate::config::Options;
use crate::record::FileRecord;
use crate::signal::CancelToken;

/// 1回の読み込みで比較するバイト数
pub const CHUNK_SIZE: usize = 8 * 1024;

/// 比較中のI/Oエラー
#[derive(Debug, thiserror::Error)]
pub enum CompareError {
    #[error("cannot open {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("cannot read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl CompareError {
    /// 失敗したファイルのパス
    pub fn path(&self) -> &Path {
        match self {
            CompareError::Open { path, .. } | CompareError::Read { path, .. } => path,
        }
    }
}

/// 内容比較の結果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentMatch {
    Equal,
    Different,
    /// キャンセルにより途中で打ち切った (一致とはみなさない)
    Interrupted,
}

/// 2つのファイルの内容がバイト単位で一致するか比較する
///
/// 固定長のチャンク単位で読み、全チャンクが一致し、かつ両方が同じオフセットで
/// 終端に達した場合のみ一致とする。各チャンクを読む前にキャンセルを確認する。
///
/// Args:
///     a: 比較対象のパス1
///     b: 比較対象のパス2
///     cancel: キャンセルトークン
///
/// Returns:
///     比較結果。オープン・読み込みの失敗はエラー
pub fn contents_equal(a: &Path, b: &Path, cancel: &CancelToken) -> Result<ContentMatch, CompareError> {
    let mut fa = open_sequential(a)?;
    let mut fb = open_sequential(b)?;
    let mut buf_a = [0u8; CHUNK_SIZE];
    let mut buf_b = [0u8; CHUNK_SIZE];

    loop {
        if cancel.is_cancelled() {
            return Ok(ContentMatch::Interrupted);
        }

        let ca = fill_chunk(&mut fa, &mut buf_a).map_err(|source| CompareError::Read {
            path: a.to_path_buf(),
            source,
        })?;
        let cb = fill_chunk(&mut fb, &mut buf_b).map_err(|source| CompareError::Read {
            path: b.to_path_buf(),
            source,
        })?;

        if ca != cb {
            return Ok(ContentMatch::Different);
        }
        if ca == 0 {
            return Ok(ContentMatch::Equal);
        }
        if buf_a[..ca] != buf_b[..cb] {
            return Ok(ContentMatch::Different);
        }
    }
}

fn open_sequential(path: &Path) -> Result<File, CompareError> {
    let file = File::open(path).map_err(|source| CompareError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    advise_sequential(&file);
    Ok(file)
}

#[cfg(target_os = "linux")]
fn advise_sequential(file: &File) {
    use std::os::fd::AsRawFd;

    // 失敗しても比較結果には影響しない
    let _ = unsafe { libc::posix_fadvise(file.as_raw_fd(), 0, 0, libc::POSIX_FADV_SEQUENTIAL) };
}

#[cfg(not(target_os = "linux"))]
fn advise_sequential(_file: &File) {}

/// バッファが埋まるか終端に達するまで読む
fn fill_chunk(reader: &mut impl Read, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// リンクできない理由となる属性の不一致
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mismatch {
    Size,
    Empty,
    Device,
    Mode,
    Owner,
    Time,
    Name,
    /// パスを持たないレコード
    Detached,
}

/// リンク可否の判定結果
#[derive(Debug)]
pub enum Verdict {
    /// 内容まで一致し、リンクできる
    Linkable,
    /// 既に同一inode
    AlreadyLinked,
    /// 属性の不一致 (内容は読んでいない)
    Ineligible(Mismatch),
    ContentDiffers,
    /// 比較中にキャンセルされた
    Interrupted,
    /// 比較中のI/Oエラー
    Unreadable(CompareError),
}

impl Verdict {
    pub fn is_linkable(&self) -> bool {
        matches!(self, Verdict::Linkable)
    }

    /// 内容比較を実行したか
    pub fn compared(&self) -> bool {
        matches!(
            self,
            Verdict::Linkable | Verdict::ContentDiffers | Verdict::Interrupted | Verdict::Unreadable(_)
        )
    }
}

/// `b` を `a` へのハードリンクに置き換えてよいか判定する
///
/// 安価な属性チェックを先に行い、全て通った場合のみ内容を比較する。
pub fn check_link(a: &FileRecord, b: &FileRecord, options: &Options, cancel: &CancelToken) -> Verdict {
    if a.size != b.size {
        return Verdict::Ineligible(Mismatch::Size);
    }
    if a.size == 0 {
        return Verdict::Ineligible(Mismatch::Empty);
    }
    if a.device != b.device {
        return Verdict::Ineligible(Mismatch::Device);
    }
    if a.inode == b.inode {
        return Verdict::AlreadyLinked;
    }
    let (Some(name_a), Some(name_b)) = (a.primary(), b.primary()) else {
        return Verdict::Ineligible(Mismatch::Detached);
    };
    if options.respect_mode && a.mode != b.mode {
        return Verdict::Ineligible(Mismatch::Mode);
    }
    if options.respect_owner && (a.uid != b.uid || a.gid != b.gid) {
        return Verdict::Ineligible(Mismatch::Owner);
    }
    if options.respect_time && a.mtime != b.mtime {
        return Verdict::Ineligible(Mismatch::Time);
    }
    if options.respect_name && name_a.name() != name_b.name() {
        return Verdict::Ineligible(Mismatch::Name);
    }

    match contents_equal(&name_a.path, &name_b.path, cancel) {
        Ok(ContentMatch::Equal) => Verdict::Linkable,
        Ok(ContentMatch::Different) => Verdict::ContentDiffers,
        Ok(ContentMatch::Interrupted) => Verdict::Interrupted,
        Err(e) => Verdict::Unreadable(e),
    }
}

/// `check_link` の真偽値版
pub fn may_link(a: &FileRecord, b: &FileRecord, options: &Options, cancel: &CancelToken) -> bool {
    check_link(a, b, options, cancel).is_linkable()
}
