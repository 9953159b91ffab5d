use std::io::Write;

use log::LevelFilter;
use time::{format_description::well_known::Rfc3339, OffsetDateTime};

/// Initialize stderr logging.
///
/// `RUST_LOG` wins when set and accepts the usual filter directives
/// (`portrisk=trace,reqwest=warn`); otherwise the level is `info`, or `debug`
/// with `verbose`.
pub fn init_logging(verbose: bool) {
    let rust_log = std::env::var("RUST_LOG").ok();
    match builder(verbose, rust_log.as_deref()).try_init() {
        Ok(()) => log::debug!("[logging] initialized: max_level={}", log::max_level()),
        Err(e) => eprintln!("Warning: failed to initialize logging: {e}"),
    }
}

fn builder(verbose: bool, rust_log: Option<&str>) -> env_logger::Builder {
    let mut builder = env_logger::Builder::new();
    match rust_log.map(str::trim).filter(|s| !s.is_empty()) {
        Some(filters) => {
            builder.parse_filters(filters);
        }
        None => {
            let level = if verbose { LevelFilter::Debug } else { LevelFilter::Info };
            builder.filter_level(level);
        }
    }
    builder
        .format(|buf, record| {
            let ts = OffsetDateTime::now_utc()
                .format(&Rfc3339)
                .unwrap_or_else(|_| String::from("-"));
            writeln!(buf, "{} [{}] {} - {}", ts, record.level(), record.target(), record.args())
        })
        .target(env_logger::Target::Stderr);
    builder
}
