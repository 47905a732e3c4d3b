//! Session logger: timestamped, level-tagged lines in a single log file.
//!
//! The file is truncated at `init`, so it only holds the current session.
//! Before `init` every macro is a silent no-op, which keeps library users
//! that never configure logging free of side effects.
//!
//! Default location (when `Settings::log_file` is empty):
//!   Windows:  `%APPDATA%\PaintCore\paintcore.log`
//!   Linux:    `~/.local/share/PaintCore/paintcore.log`
//!   macOS:    `~/Library/Application Support/PaintCore/paintcore.log`
//!
//! Use the `log_info!` / `log_warn!` / `log_err!` macros anywhere in the crate.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, OnceLock};
use std::time::{SystemTime, UNIX_EPOCH};

static LOG_FILE: OnceLock<Mutex<File>> = OnceLock::new();
static LOG_PATH: OnceLock<PathBuf> = OnceLock::new();
static ECHO: AtomicBool = AtomicBool::new(false);

/// Path of the current session log file, if `init` succeeded.
pub fn log_path() -> Option<&'static PathBuf> {
    LOG_PATH.get()
}

/// Mirror every logged line to stderr (CLI `--verbose`).
pub fn set_echo(on: bool) {
    ECHO.store(on, Ordering::Relaxed);
}

/// Write a raw line. I/O errors are swallowed so logging never fails a caller.
pub fn write_line(line: &str) {
    if ECHO.load(Ordering::Relaxed) {
        eprintln!("{}", line);
    }
    if let Some(mutex) = LOG_FILE.get()
        && let Ok(mut file) = mutex.lock()
    {
        let _ = writeln!(file, "{}", line);
    }
}

/// Write a timestamped, level-tagged line.
pub fn write(level: &str, msg: &str) {
    if !ECHO.load(Ordering::Relaxed) && LOG_FILE.get().is_none() {
        return;
    }
    write_line(&format!("[{}] [{}] {}", timestamp(), level, msg));
}

#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        $crate::logger::write("INFO", &format!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {
        $crate::logger::write("WARN", &format!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_err {
    ($($arg:tt)*) => {
        $crate::logger::write("ERROR", &format!($($arg)*))
    };
}

/// Initialise the session logger at `path`, or at the platform default when
/// `None`. Only the first successful call takes effect.
///
/// * Creates (or truncates) the log file.
/// * Installs a panic hook that mirrors the panic message to the log before
///   running the previous hook.
pub fn init(path: Option<&Path>) -> std::io::Result<()> {
    if LOG_FILE.get().is_some() {
        return Ok(());
    }
    let path = path.map(Path::to_path_buf).unwrap_or_else(default_log_path);

    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }

    let file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(&path)?;
    let _ = LOG_PATH.set(path.clone());
    let _ = LOG_FILE.set(Mutex::new(file));

    write_line(&format!(
        "=== PaintCore session started (unix {}) ===",
        unix_seconds().unwrap_or(0)
    ));
    write_line(&format!("Log file: {}", path.display()));
    write_line("");

    let prev = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        write_line(&format!("[{}] [PANIC] {}", timestamp(), info));
        prev(info);
    }));
    Ok(())
}

pub fn default_log_path() -> PathBuf {
    data_dir().join("PaintCore").join("paintcore.log")
}

/// Platform data directory (without the app sub-folder).
pub(crate) fn data_dir() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        if let Ok(appdata) = std::env::var("APPDATA") {
            return PathBuf::from(appdata);
        }
    }
    #[cfg(target_os = "macos")]
    {
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home)
                .join("Library")
                .join("Application Support");
        }
    }
    if let Ok(xdg) = std::env::var("XDG_DATA_HOME") {
        return PathBuf::from(xdg);
    }
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".local").join("share");
    }
    PathBuf::from(".")
}

fn unix_seconds() -> Option<u64> {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .ok()
        .map(|d| d.as_secs())
}

/// `HH:MM:SS` within the current UTC day.
fn timestamp() -> String {
    match unix_seconds() {
        Some(secs) => format!(
            "{:02}:{:02}:{:02}",
            (secs % 86400) / 3600,
            (secs % 3600) / 60,
            secs % 60
        ),
        None => "??:??:??".to_string(),
    }
}
