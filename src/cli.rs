//! コマンドライン引数のパースと設定

use clap::{ArgAction, Parser};

use crate::config::{LinkObjective, Options, TimePreference};

/// 同一内容のファイルをハードリンクに置き換えるツール
#[derive(Parser, Debug)]
#[command(name = "hardlink-dedup")]
#[command(version, about, long_about = None)]
pub struct Args {
    /// 探索対象のディレクトリまたはファイル
    #[arg(required = true)]
    pub paths: Vec<String>,

    /// 詳細出力 (繰り返すとさらに詳細)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,

    /// エラー以外を出力しない
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,

    /// ドライラン (実際には変更せず、判定結果のみ表示)
    #[arg(short = 'n', long = "dry-run")]
    pub dry_run: bool,

    /// ファイル名の一致を要求する
    #[arg(short = 'f', long = "respect-name")]
    pub respect_name: bool,

    /// モードの違いを無視する
    #[arg(short = 'p', long = "ignore-mode")]
    pub ignore_mode: bool,

    /// 所有者の違いを無視する
    #[arg(short = 'o', long = "ignore-owner")]
    pub ignore_owner: bool,

    /// 更新時刻の違いを無視する
    #[arg(short = 't', long = "ignore-time")]
    pub ignore_time: bool,

    /// 内容のみ比較する (-pot と同じ、ファイル名も無視)
    #[arg(short = 'c', long = "content-only")]
    pub content_only: bool,

    /// リンク数の多いファイルをマスターにする
    #[arg(short = 'm', long = "maximize", conflicts_with = "minimize")]
    pub maximize: bool,

    /// リンク数の少ないファイルをマスターにする
    #[arg(short = 'M', long = "minimize")]
    pub minimize: bool,

    /// 更新時刻が古いファイルをマスターにする (デフォルトは新しい方)
    #[arg(long = "keep-older")]
    pub keep_older: bool,

    /// 対象から外すパスの正規表現
    #[arg(short = 'x', long = "exclude", value_name = "REGEXP")]
    pub exclude: Vec<String>,

    /// 対象に含めるパスの正規表現 (exclude より優先)
    #[arg(short = 'i', long = "include", value_name = "REGEXP")]
    pub include: Vec<String>,
}

impl Args {
    /// 引数をパースして返す
    pub fn parse_args() -> Self {
        Args::parse()
    }

    /// エンジンの設定に変換する
    pub fn options(&self) -> Options {
        let mut options = if self.content_only {
            Options::content_only()
        } else {
            Options {
                respect_mode: !self.ignore_mode,
                respect_owner: !self.ignore_owner,
                respect_time: !self.ignore_time,
                respect_name: self.respect_name,
                ..Options::default()
            }
        };

        options.link_objective = if self.maximize {
            LinkObjective::Maximize
        } else if self.minimize {
            LinkObjective::Minimize
        } else {
            LinkObjective::Ignore
        };
        options.time_preference = if self.keep_older {
            TimePreference::Older
        } else {
            TimePreference::Newer
        };
        options.dry_run = self.dry_run;
        options
    }
}
