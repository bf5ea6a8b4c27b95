use std::process;

use hardlink_dedup::app::run;
use hardlink_dedup::cli::Args;

fn main() {
    let code = run(Args::parse_args());
    if code != 0 {
        process::exit(code);
    }
}
