use crate::shared::constants;
use anyhow::{Context, Result};
use std::backtrace::Backtrace;
use std::fs::OpenOptions;
use std::io::Write;
use std::panic;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing_subscriber::{fmt, layer::SubscriberExt, EnvFilter};

fn append_line(path: &Path, line: &str) {
    if let Ok(mut file) = OpenOptions::new().create(true).append(true).open(path) {
        let _ = writeln!(file, "{}", line);
    }
}

/// Install the global subscriber: console on stdout plus a plain-text debug
/// file next to the working directory. `RUST_LOG` overrides the default
/// `info` filter.
pub fn init(debug_log: &Path) -> Result<()> {
    let file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(debug_log)
        .with_context(|| format!("Failed to open log file: {}", debug_log.display()))?;

    let file_layer = fmt::layer()
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_file(true)
        .with_line_number(true);

    let console_layer = fmt::layer()
        .with_writer(std::io::stdout)
        .with_ansi(!cfg!(windows))
        .with_target(false);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let collector = tracing_subscriber::registry()
        .with(file_layer)
        .with(console_layer)
        .with(filter);
    tracing::subscriber::set_global_default(collector)
        .context("A global tracing subscriber is already installed")?;

    let error_path = error_log_path(debug_log);
    append_line(
        &error_path,
        &format!("=== Error Log Started: {} ===", chrono::Local::now()),
    );
    install_panic_hook(error_path);

    let log_var = std::env::var("RUST_LOG")
        .map(|var| format!(" with RUST_LOG=\"{}\"", var))
        .unwrap_or_default();
    tracing::debug!(
        "{} logging to console and \"{}\"{}",
        constants::APP_NAME,
        debug_log.display(),
        log_var
    );
    Ok(())
}

fn error_log_path(debug_log: &Path) -> PathBuf {
    let mut error_path = PathBuf::from(debug_log);
    error_path.set_file_name(constants::ERROR_LOG_FILE);
    error_path
}

fn install_panic_hook(error_path: PathBuf) {
    panic::set_hook(Box::new(move |info| {
        let backtrace = Backtrace::capture();
        let msg = match info.payload().downcast_ref::<&str>() {
            Some(s) => *s,
            None => match info.payload().downcast_ref::<String>() {
                Some(s) => &s[..],
                None => "Box<Any>",
            },
        };

        let location = info
            .location()
            .map(|l| format!("{}:{}", l.file(), l.line()))
            .unwrap_or_else(|| "unknown".to_string());

        tracing::error!("panic at {}: {}", location, msg);
        append_line(
            &error_path,
            &format!(
                "\n[{}] CRITICAL PANIC at {}:\nMessage: {}\nBacktrace:\n{:?}\n",
                chrono::Local::now().format("%H:%M:%S%.3f"),
                location,
                msg,
                backtrace
            ),
        );
        eprintln!("Application crashed. See {} for details.", error_path.display());
    }));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_log_sits_next_to_debug_log() {
        let path = error_log_path(Path::new("/var/log/capture/debug.log"));
        assert_eq!(path, PathBuf::from("/var/log/capture/error.log"));
    }
}
