use crate::utils::error::Result;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Open (or create) the per-process log file the platform collects:
/// `<log_dir>/myserver<port>.log`. Returns the file handle and its
/// absolute path, which is registered with the platform at process-ready.
fn open_log_file(log_dir: &str, port: u16) -> Result<(File, String)> {
    std::fs::create_dir_all(log_dir)?;
    let log_path: PathBuf = Path::new(log_dir).join(format!("myserver{}.log", port));

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)?;

    let absolute = std::fs::canonicalize(&log_path)?;
    Ok((file, absolute.to_string_lossy().into_owned()))
}

fn env_filter(verbose: bool) -> EnvFilter {
    if verbose {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("small_gameserver=debug,info"))
    } else {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("small_gameserver=info"))
    }
}

/// Console + plain-text file logging. The file is what the platform's log
/// agent uploads when the session ends, so it always gets the full stream.
pub fn init_server_logger(log_dir: &str, port: u16, verbose: bool) -> Result<String> {
    let (file, log_path) = open_log_file(log_dir, port)?;

    tracing_subscriber::registry()
        .with(env_filter(verbose))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false)
                .compact(),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_target(false)
                .with_writer(Arc::new(file)),
        )
        .init();

    Ok(log_path)
}

/// Same tee, but the file layer emits JSON lines for fleets that ship logs
/// into a structured collector.
pub fn init_json_logger(log_dir: &str, port: u16, verbose: bool) -> Result<String> {
    let (file, log_path) = open_log_file(log_dir, port)?;

    tracing_subscriber::registry()
        .with(env_filter(verbose))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false)
                .compact(),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_target(false)
                .with_writer(Arc::new(file))
                .json(),
        )
        .init();

    Ok(log_path)
}
