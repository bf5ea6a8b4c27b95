//! ログ出力の初期化
//!
//! `RUST_LOG` が設定されていればそれに従い、なければ CLI のフラグからレベルを決める。

use std::env;
use std::io::Write;

use env_logger::Builder;
use log::LevelFilter;

/// ログを初期化する (プロセスにつき1回)
///
/// Args:
///     verbose: `-v` の回数 (0=warn, 1=info, 2=debug, 3以上=trace)
///     quiet: エラーのみ出力する
pub fn init_logging(verbose: u8, quiet: bool) {
    let mut builder = Builder::new();

    if env::var("RUST_LOG").is_ok() {
        builder.parse_default_env();
    } else {
        builder.filter_level(determine_level(verbose, quiet));
    }

    builder.format(|buf, record| {
        let level = record.level();
        let style = buf.default_level_style(level);
        match level {
            log::Level::Error | log::Level::Warn => {
                writeln!(buf, "{style}{}{style:#}: {}", level, record.args())
            }
            _ => writeln!(buf, "{}", record.args()),
        }
    });

    // テストなどで二重に初期化された場合は最初の設定を使う
    let _ = builder.try_init();
}

/// CLI フラグからログレベルを決める
fn determine_level(verbose: u8, quiet: bool) -> LevelFilter {
    if quiet {
        return LevelFilter::Error;
    }
    match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}
