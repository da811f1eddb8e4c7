use std::num::NonZeroUsize;

use anyhow::bail;
use clap::Parser;
use log::{error, info};
use tally_core::prelude::*;

/// Shared counter contention harness. Spawns worker threads which each increment a single
/// shared counter a fixed number of times under the selected synchronization policy and
/// prints the final counter value to stdout. Exits non zero if any worker failed to
/// complete its increments.
#[derive(Debug, Parser)]
#[command(name = "tally", version)]
struct Args {
    /// number of concurrent worker threads
    #[arg(long, default_value_t = NonZeroUsize::new(10).unwrap())]
    workers: NonZeroUsize,

    /// increments performed by each worker
    #[arg(long, default_value_t = 1_000_000)]
    increments: usize,

    /// synchronization applied to the shared counter: none | mutex
    #[arg(long, default_value = "mutex")]
    policy: SyncPolicy,

    /// log level: off | error | warn | info | debug | trace
    #[arg(long, default_value = "info")]
    log_level: log::LevelFilter,
}

fn configure_logging(level: log::LevelFilter) {
    use colored::*;
    use std::io::Write;
    env_logger::builder()
        .format(|buf, record| {
            let ts = buf.timestamp_nanos();
            let level = match record.level() {
                log::Level::Error => "ERROR".red(),
                log::Level::Warn => "WARN ".yellow(),
                log::Level::Info => "INFO ".green(),
                log::Level::Debug => "DEBUG".blue(),
                log::Level::Trace => "TRACE".blue(),
            };
            let args = record.args();
            let thread = std::thread::current();
            let id = thread.id();
            let name = thread
                .name()
                .unwrap_or(format!("Thread-{id:?}").as_str())
                .to_owned();
            writeln!(buf, "{ts} {level} ({name}) {args}")
        })
        .filter_level(level)
        .init();
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    configure_logging(args.log_level);

    let counter = ConcurrentCounter::new_ref(args.policy);
    info!("starting {} workers x {} increments on {}", args.workers, args.increments, counter);
    let summary = counter.run(args.workers, args.increments);

    println!("{}", summary.final_count());

    if !summary.is_complete() {
        for report in summary.failed_workers() {
            error!("{}", report);
        }
        bail!(
            "partial completion: {} of {} increments applied",
            summary.completed_increments(),
            args.workers.get() * args.increments
        );
    }
    Ok(())
}
