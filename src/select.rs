//! マスター選択の順序付け

use std::cmp::Ordering;

use crate::config::{LinkObjective, Options, TimePreference};
use crate::record::FileRecord;

/// `a` と `b` のどちらをマスターにすべきか比較する
///
/// `Greater` なら `a` がマスター、`Less` なら `b` がマスター。
/// 同一inodeの場合のみ `Equal` になり、リンク操作は不要。
///
/// 1. 同一 (デバイス, inode) なら `Equal`
/// 2. リンク数 (`Maximize` / `Minimize` 指定時)
/// 3. 更新時刻 (`TimePreference` の向き)
/// 4. (デバイス, inode) の小さい方を優先
///
/// 各段は固定のキーによる辞書式比較なので、全体は全順序になる。
pub fn rank(a: &FileRecord, b: &FileRecord, options: &Options) -> Ordering {
    if a.same_inode(b) {
        return Ordering::Equal;
    }

    let by_links = match options.link_objective {
        LinkObjective::Ignore => Ordering::Equal,
        LinkObjective::Maximize => a.nlink.cmp(&b.nlink),
        LinkObjective::Minimize => b.nlink.cmp(&a.nlink),
    };

    let by_time = match options.time_preference {
        TimePreference::Newer => a.mtime.cmp(&b.mtime),
        TimePreference::Older => b.mtime.cmp(&a.mtime),
    };

    by_links
        .then(by_time)
        .then_with(|| (b.device, b.inode).cmp(&(a.device, a.inode)))
}

/// `candidate` が現在のマスターに取って代わるべきか
pub fn should_replace_master(candidate: &FileRecord, master: &FileRecord, options: &Options) -> bool {
    rank(candidate, master, options) == Ordering::Greater
}
