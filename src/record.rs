//! ファイルレコード (1つのinodeとそれを指すパス群)

use std::ffi::OsStr;
use std::fs::{self, Metadata};
use std::io;
use std::os::unix::ffi::OsStrExt;
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};

/// インデックス内のレコードを指すハンドル
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordId(pub(crate) usize);

/// レコードに属するパス
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkPath {
    /// ファイルパス
    pub path: PathBuf,
    /// パス中のベース名の開始オフセット (バイト)
    pub basename: usize,
}

impl LinkPath {
    pub fn new(path: PathBuf) -> Self {
        let total = path.as_os_str().len();
        let basename = path
            .file_name()
            .map(|name| total - name.len())
            .unwrap_or(0);
        Self { path, basename }
    }

    /// ベース名を返す
    pub fn name(&self) -> &OsStr {
        OsStr::from_bytes(&self.path.as_os_str().as_bytes()[self.basename..])
    }
}

/// ディスク上の1つのinodeについて現在わかっている情報
///
/// マージが進むと、マスターは置換済みのパスを取り込んで複数のパスを持つ。
/// `slave` が立ったレコードは終端であり、比較対象にもマスターにもならない。
#[derive(Debug, Clone)]
pub struct FileRecord {
    /// デバイスID
    pub device: u64,
    /// inode番号
    pub inode: u64,
    /// ファイルサイズ (バイト)
    pub size: u64,
    /// パーミッションを含むモード
    pub mode: u32,
    /// 所有ユーザー
    pub uid: u32,
    /// 所有グループ
    pub gid: u32,
    /// 更新時刻 (UNIX秒)
    pub mtime: i64,
    /// 現在のリンク数
    pub nlink: u64,
    /// このinodeを指すパス (先頭が代表パス)
    pub paths: Vec<LinkPath>,
    /// 別のマスターに統合済みか
    pub slave: bool,
}

impl FileRecord {
    /// メタデータからレコードを作成する
    ///
    /// Args:
    ///     path: ファイルパス
    ///     meta: `symlink_metadata` で取得したメタデータ
    pub fn from_metadata(path: PathBuf, meta: &Metadata) -> Self {
        Self {
            device: meta.dev(),
            inode: meta.ino(),
            size: meta.len(),
            mode: meta.mode(),
            uid: meta.uid(),
            gid: meta.gid(),
            mtime: meta.mtime(),
            nlink: meta.nlink(),
            paths: vec![LinkPath::new(path)],
            slave: false,
        }
    }

    /// パスを stat してレコードを作成する (シンボリックリンクは辿らない)
    pub fn from_path(path: &Path) -> io::Result<Self> {
        let meta = fs::symlink_metadata(path)?;
        Ok(Self::from_metadata(path.to_path_buf(), &meta))
    }

    /// 代表パス
    pub fn primary(&self) -> Option<&LinkPath> {
        self.paths.first()
    }

    /// 比較・リンク作成に使うパス
    ///
    /// 全パスを譲り渡した後のレコードは空になりうる。
    pub fn path(&self) -> &Path {
        self.primary()
            .map(|p| p.path.as_path())
            .unwrap_or_else(|| Path::new(""))
    }

    /// 同一inodeか
    pub fn same_inode(&self, other: &FileRecord) -> bool {
        self.device == other.device && self.inode == other.inode
    }

    /// 同値クラスのキー
    pub fn key(&self) -> (u64, u64) {
        (self.device, self.size)
    }
}
