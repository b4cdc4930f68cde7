use std::ffi::OsStr;
use std::io;
use std::path::Path;

use clap::Parser;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use mzempcpder::{MZEmpCpder, MZEmpCpderError};

#[cfg(feature = "mimalloc")]
use mimalloc::MiMalloc;

#[cfg(feature = "mimalloc")]
#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

fn log_filter() -> EnvFilter {
    EnvFilter::builder()
        .with_default_directive(tracing::Level::INFO.into())
        .from_env_lossy()
}

/// Install the STDERR log layer, and a file layer if `log_file` is given.
///
/// The returned guard must be held until the program exits to flush the file.
fn init_logging(log_file: Option<&Path>) -> Option<WorkerGuard> {
    let (file_layer, guard) = match log_file {
        Some(path) => {
            let directory = path.parent().unwrap_or(Path::new("."));
            let file_name = path
                .file_name()
                .unwrap_or(OsStr::new("mzempcpder.log"));
            let appender = tracing_appender::rolling::never(directory, file_name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .compact()
                .with_ansi(false)
                .with_timer(fmt::time::ChronoLocal::rfc_3339())
                .with_writer(writer)
                .with_filter(log_filter());
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .compact()
                .with_timer(fmt::time::ChronoLocal::rfc_3339())
                .with_writer(io::stderr)
                .with_filter(log_filter()),
        )
        .with(file_layer)
        .init();
    guard
}

fn main() -> Result<(), MZEmpCpderError> {
    let args = MZEmpCpder::parse();
    let config_file = args.config_file.clone();

    let mut config = Figment::from(Serialized::defaults(args)).merge(Toml::file("mzempcpder.toml"));
    if let Some(path) = config_file {
        config = config.merge(Toml::file_exact(path));
    }
    config = config.merge(Env::prefixed("MZEMPCPDER_"));
    let driver: MZEmpCpder = config.extract()?;

    let _guard = init_logging(driver.log_file.as_deref());
    driver.main()?;
    Ok(())
}
