use env_logger::{Builder, Env};
use log::{info, Level};
use std::io::Write;

fn level_color(level: Level) -> &'static str {
    match level {
        Level::Error => "\x1B[1;31m",
        Level::Warn => "\x1B[1;33m",
        Level::Info => "\x1B[1;32m",
        Level::Debug => "\x1B[1;36m",
        Level::Trace => "\x1B[1;35m",
    }
}

/// Installs the process logger. `RUST_LOG` overrides the `info` default.
pub fn setup_logger() {
    Builder::from_env(Env::default().default_filter_or("info"))
        .format(|buf, record| {
            writeln!(
                buf,
                "[{}] {}{:<5}\x1B[0m {}: {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
                level_color(record.level()),
                record.level(),
                record.target(),
                record.args()
            )
        })
        .init();

    info!("Logger initialized");
}
