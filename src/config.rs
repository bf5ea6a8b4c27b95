//! 重複排除エンジンの設定

/// マスター選択時のリンク数の扱い
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LinkObjective {
    /// リンク数は考慮しない
    #[default]
    Ignore,
    /// リンク数の多いファイルをマスターにする
    Maximize,
    /// リンク数の少ないファイルをマスターにする
    Minimize,
}

/// 更新時刻によるマスター選択の向き
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimePreference {
    /// 新しいファイルをマスターにする
    #[default]
    Newer,
    /// 古いファイルをマスターにする
    Older,
}

/// エンジンの動作設定
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Options {
    /// モードの一致を要求する
    pub respect_mode: bool,
    /// 所有者 (uid, gid) の一致を要求する
    pub respect_owner: bool,
    /// ベース名の一致を要求する
    pub respect_name: bool,
    /// 更新時刻の一致を要求する
    pub respect_time: bool,
    pub link_objective: LinkObjective,
    pub time_preference: TimePreference,
    /// 判定のみ行い、ファイルシステムを変更しない
    pub dry_run: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            respect_mode: true,
            respect_owner: true,
            respect_name: false,
            respect_time: true,
            link_objective: LinkObjective::Ignore,
            time_preference: TimePreference::Newer,
            dry_run: false,
        }
    }
}

impl Options {
    /// 内容のみを比較する設定 (属性の一致を要求しない)
    pub fn content_only() -> Self {
        Self {
            respect_mode: false,
            respect_owner: false,
            respect_name: false,
            respect_time: false,
            ..Self::default()
        }
    }
}
