use once_cell::sync::OnceCell;
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

/// Keeps the non-blocking file writer flushing for the life of the process.
static FILE_GUARD: OnceCell<WorkerGuard> = OnceCell::new();

/// Initialise logging. The default level is `info`; `debug` raises it and lets
/// `RUST_LOG` override it. When `file` is given, output goes to that file
/// instead of stderr.
pub fn init(debug: bool, file: Option<PathBuf>) {
    // Without debug logging we force `info` so a stray `RUST_LOG` in the
    // user's environment cannot turn on verbose tick tracing.
    let level = if debug { "debug" } else { "info" };

    let filter = if debug {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
    } else {
        EnvFilter::new(level)
    };

    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    match file.as_deref().and_then(open_log_file) {
        Some(log_file) => {
            let (writer, guard) = tracing_appender::non_blocking(log_file);
            let installed = builder.with_writer(writer).with_ansi(false).try_init().is_ok();
            if installed {
                let _ = FILE_GUARD.set(guard);
            }
        }
        None => {
            let _ = builder.try_init();
        }
    }
}

fn open_log_file(path: &std::path::Path) -> Option<std::fs::File> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        if let Err(err) = std::fs::create_dir_all(parent) {
            eprintln!("failed to create log directory {}: {err}", parent.display());
            return None;
        }
    }
    match std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
    {
        Ok(file) => Some(file),
        Err(err) => {
            eprintln!("failed to open log file {}: {err}", path.display());
            None
        }
    }
}
