use std::path::Path;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};

use crate::cli::Args;
use crate::dedup::{Deduplicator, Reporter, Stats};
use crate::hardlink::LinkEvent;
use crate::i18n::{format_size, msg, Msg};
use crate::logging::init_logging;
use crate::scanner::{scan_with_progress, PathFilter, ScanOutcome};
use crate::signal::{install_handlers, EXIT_CODE_INTERRUPTED};

/// 端末への出力を行う `Reporter`
struct ConsoleReporter {
    dry_run: bool,
    started: Instant,
}

impl Reporter for ConsoleReporter {
    fn linked(&mut self, event: &LinkEvent, dry_run: bool) {
        log::info!(
            "{}{} {} to {} (-{})",
            if dry_run { msg(Msg::DryRunPrefix) } else { "" },
            msg(Msg::Linking),
            event.master.display(),
            event.path.display(),
            format_size(event.size)
        );
    }

    fn snapshot(&mut self, stats: &Stats) {
        println!("{}", msg(Msg::Snapshot));
        print_stats(self.dry_run, stats, self.started.elapsed());
        println!();
    }
}

pub fn run(args: Args) -> i32 {
    init_logging(args.verbose, args.quiet);

    match execute(&args) {
        Ok(code) => code,
        Err(e) => {
            log::error!("{:#}", e);
            1
        }
    }
}

fn execute(args: &Args) -> Result<i32> {
    let started = Instant::now();
    let filter = PathFilter::new(&args.include, &args.exclude)?;
    let cancel = install_handlers().context("cannot set up signal handling")?;

    let options = args.options();
    let dry_run = options.dry_run;
    let mut dedup = Deduplicator::new(options, cancel);

    let interrupted = scan_roots(&args.paths, &filter, &mut dedup) == ScanOutcome::Interrupted;

    // 走査中にキャンセルされた場合、run は何もせずに戻る
    let mut reporter = ConsoleReporter { dry_run, started };
    let summary = dedup.run(&mut reporter);
    let interrupted = interrupted || summary.interrupted;

    if !args.quiet {
        println!();
        print_stats(dry_run, &summary.stats, summary.elapsed);
    }

    if interrupted {
        eprintln!("{}", msg(Msg::Interrupted));
        return Ok(EXIT_CODE_INTERRUPTED);
    }
    Ok(0)
}

/// 各ルートを順に走査する
///
/// 存在しないルートはエラーとして数え、残りのルートの処理を続ける。
fn scan_roots(paths: &[String], filter: &PathFilter, dedup: &mut Deduplicator) -> ScanOutcome {
    for path_str in paths {
        let path = Path::new(path_str);
        log::info!("{}: {}", msg(Msg::Scanning), path.display());
        let outcome = scan_with_progress(path, filter, dedup, |current| {
            log::debug!("{}: {}", msg(Msg::CheckingDirectory), current.display());
        });
        if outcome == ScanOutcome::Interrupted {
            return ScanOutcome::Interrupted;
        }
    }
    ScanOutcome::Completed
}

fn print_stats(dry_run: bool, stats: &Stats, elapsed: Duration) {
    let mode = if dry_run {
        msg(Msg::ModeDryRun)
    } else {
        msg(Msg::ModeReal)
    };
    println!("{}: {}", msg(Msg::Mode), mode);
    println!("{}: {}", msg(Msg::Files), stats.files);
    println!("{}: {} {}", msg(Msg::Linked), stats.linked, msg(Msg::FilesUnit));
    println!("{}: {} {}", msg(Msg::Compared), stats.comparisons, msg(Msg::FilesUnit));
    println!("{}: {}", msg(Msg::Saved), format_size(stats.saved));
    if stats.errors > 0 {
        println!("{}: {}", msg(Msg::Errors), stats.errors);
    }
    println!(
        "{}: {:.2} {}",
        msg(Msg::Duration),
        elapsed.as_secs_f64(),
        msg(Msg::SecondsUnit)
    );
}
