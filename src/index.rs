//! (デバイス, サイズ) による同値クラスのインデックス

use std::collections::{BTreeMap, HashMap};

use crate::record::{FileRecord, RecordId};

/// (デバイスID, ファイルサイズ)
pub type GroupKey = (u64, u64);

/// レコードのアリーナと、キーごとの候補リスト
///
/// 同じバケットに入ることは内容一致の必要条件にすぎない。
/// ここではファイル内容を一切読まない。
#[derive(Debug, Default)]
pub struct EquivalenceIndex {
    records: Vec<FileRecord>,
    buckets: BTreeMap<GroupKey, Vec<RecordId>>,
    inodes: HashMap<(u64, u64), RecordId>,
}

impl EquivalenceIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// レコードをキーに対応するバケットへ追加する
    ///
    /// 既に登録済みのinodeを指すレコードは新しい候補を作らず、
    /// 既存レコードのパスリストに合流させる。登録済みのパスは二重に持たない。
    ///
    /// Returns:
    ///     レコードが格納された(または合流した)ハンドル。
    ///     パスが全て登録済みだった場合はNone
    pub fn insert(&mut self, record: FileRecord) -> Option<RecordId> {
        if let Some(&id) = self.inodes.get(&(record.device, record.inode)) {
            let paths = &mut self.records[id.0].paths;
            let before = paths.len();
            for link in record.paths {
                if !paths.iter().any(|known| known.path == link.path) {
                    paths.push(link);
                }
            }
            return (paths.len() > before).then_some(id);
        }

        let id = RecordId(self.records.len());
        self.inodes.insert((record.device, record.inode), id);
        self.buckets.entry(record.key()).or_default().push(id);
        self.records.push(record);
        Some(id)
    }

    /// 候補が2つ以上あるバケットを返す
    pub fn groups(&self) -> impl Iterator<Item = &[RecordId]> + '_ {
        self.buckets
            .values()
            .filter(|ids| ids.len() >= 2)
            .map(|ids| ids.as_slice())
    }

    pub fn get(&self, id: RecordId) -> &FileRecord {
        &self.records[id.0]
    }

    /// 異なる2つのレコードを同時に可変借用する
    ///
    /// # Panics
    ///
    /// `a == b` の場合
    pub fn pair_mut(&mut self, a: RecordId, b: RecordId) -> (&mut FileRecord, &mut FileRecord) {
        assert_ne!(a, b, "pair_mut requires distinct records");
        if a.0 < b.0 {
            let (left, right) = self.records.split_at_mut(b.0);
            (&mut left[a.0], &mut right[0])
        } else {
            let (left, right) = self.records.split_at_mut(a.0);
            (&mut right[0], &mut left[b.0])
        }
    }

    /// 登録済みレコード数 (inode単位)
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// バケット数 (候補1つのものを含む)
    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }
}
