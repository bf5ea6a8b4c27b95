//! 国際化 (i18n) サポート

use sys_locale::get_locale;

/// 現在のロケールが日本語かどうかを判定する
pub fn is_japanese() -> bool {
    get_locale()
        .map(|l| l.starts_with("ja"))
        .unwrap_or(false)
}

/// メッセージキー
#[derive(Clone, Copy)]
pub enum Msg {
    // 処理中メッセージ
    Scanning,
    CheckingDirectory,
    Linking,
    DryRunPrefix,
    Interrupted,
    Snapshot,

    // サマリー
    Mode,
    ModeDryRun,
    ModeReal,
    Files,
    Linked,
    Compared,
    Saved,
    Duration,
    Errors,
    FilesUnit,
    SecondsUnit,
}

/// ローカライズされたメッセージを取得する
pub fn msg(key: Msg) -> &'static str {
    if is_japanese() {
        msg_ja(key)
    } else {
        msg_en(key)
    }
}

fn msg_ja(key: Msg) -> &'static str {
    match key {
        // 処理中メッセージ
        Msg::Scanning => "探索中",
        Msg::CheckingDirectory => "ディレクトリ確認中",
        Msg::Linking => "リンク",
        Msg::DryRunPrefix => "[ドライラン] ",
        Msg::Interrupted => "中断されました (完了した置換は保持されます)",
        Msg::Snapshot => "=== 途中経過 ===",

        // サマリー
        Msg::Mode => "モード",
        Msg::ModeDryRun => "ドライラン",
        Msg::ModeReal => "実行",
        Msg::Files => "ファイル",
        Msg::Linked => "リンク",
        Msg::Compared => "比較",
        Msg::Saved => "削減",
        Msg::Duration => "所要時間",
        Msg::Errors => "エラー",
        Msg::FilesUnit => "件",
        Msg::SecondsUnit => "秒",
    }
}

fn msg_en(key: Msg) -> &'static str {
    match key {
        // Processing
        Msg::Scanning => "Scanning",
        Msg::CheckingDirectory => "Checking directory",
        Msg::Linking => "Linking",
        Msg::DryRunPrefix => "[DryRun] ",
        Msg::Interrupted => "Interrupted (completed replacements are kept)",
        Msg::Snapshot => "=== Progress ===",

        // Summary
        Msg::Mode => "Mode",
        Msg::ModeDryRun => "dry-run",
        Msg::ModeReal => "real",
        Msg::Files => "Files",
        Msg::Linked => "Linked",
        Msg::Compared => "Compared",
        Msg::Saved => "Saved",
        Msg::Duration => "Duration",
        Msg::Errors => "Errors",
        Msg::FilesUnit => "files",
        Msg::SecondsUnit => "seconds",
    }
}

/// バイト数を人が読める形式にする
pub fn format_size(bytes: u64) -> String {
    const KIB: f64 = 1024.0;
    const MIB: f64 = KIB * 1024.0;
    const GIB: f64 = MIB * 1024.0;

    let b = bytes as f64;
    if b >= GIB {
        format!("{:.2} GiB", b / GIB)
    } else if b >= MIB {
        format!("{:.2} MiB", b / MIB)
    } else if b >= KIB {
        format!("{:.2} KiB", b / KIB)
    } else {
        format!("{} bytes", bytes)
    }
}
