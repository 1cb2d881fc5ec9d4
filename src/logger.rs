//! Editor log: one file per launch in the OS data directory
//! (`%APPDATA%\Astra\astra.log`, `~/Library/Application Support/Astra/astra.log`,
//! `$XDG_DATA_HOME/Astra/astra.log` or `~/.local/share/Astra/astra.log`).
//!
//! Lines look like `[HH:MM:SS] [LEVEL] message`.  While an edit session is
//! open its short id is added after the level, so interleaved sessions can
//! be told apart: `[12:00:03] [INFO] [3f2a9c1b] mask exported`.
//!
//! Nothing is written until [`init`] runs, so tests and embedding hosts get
//! silent no-ops.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use std::sync::{Mutex, OnceLock};
use std::time::{SystemTime, UNIX_EPOCH};

use uuid::Uuid;

static SINK: OnceLock<Mutex<File>> = OnceLock::new();
static ACTIVE_SESSION: SessionTag = SessionTag::new();

/// The edit session whose id is stamped on log lines.
struct SessionTag(Mutex<Option<Uuid>>);

impl SessionTag {
    const fn new() -> Self {
        Self(Mutex::new(None))
    }

    fn get(&self) -> Option<Uuid> {
        self.0.lock().ok().and_then(|slot| *slot)
    }

    fn set(&self, id: Uuid) {
        if let Ok(mut slot) = self.0.lock() {
            *slot = Some(id);
        }
    }

    /// Clear only if `id` still owns the tag.
    fn release(&self, id: Uuid) {
        if let Ok(mut slot) = self.0.lock()
            && *slot == Some(id)
        {
            *slot = None;
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Level {
    Info,
    Warn,
    Error,
    Panic,
}

impl Level {
    fn tag(self) -> &'static str {
        match self {
            Level::Info => "INFO",
            Level::Warn => "WARN",
            Level::Error => "ERROR",
            Level::Panic => "PANIC",
        }
    }
}

/// Record a message.  I/O errors are dropped.
pub fn write(level: Level, msg: &str) {
    let Some(sink) = SINK.get() else { return };
    let session = ACTIVE_SESSION.get();
    let line = format_line(&clock(), level, session, msg);
    if let Ok(mut file) = sink.lock() {
        let _ = writeln!(file, "{}", line);
    }
}

/// Mark `id` as the open edit session and write a separator for it.
pub fn session_opened(id: Uuid) {
    ACTIVE_SESSION.set(id);
    write(Level::Info, &format!("---- edit session {} ----", id));
}

/// Clear the session tag if `id` is the one currently tagged.
pub fn session_closed(id: Uuid) {
    write(Level::Info, "---- edit session closed ----");
    ACTIVE_SESSION.release(id);
}

fn format_line(clock: &str, level: Level, session: Option<Uuid>, msg: &str) -> String {
    match session {
        Some(id) => {
            let short = id.simple().to_string();
            format!("[{}] [{}] [{}] {}", clock, level.tag(), &short[..8], msg)
        }
        None => format!("[{}] [{}] {}", clock, level.tag(), msg),
    }
}

#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        $crate::logger::write($crate::logger::Level::Info, &format!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {
        $crate::logger::write($crate::logger::Level::Warn, &format!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_err {
    ($($arg:tt)*) => {
        $crate::logger::write($crate::logger::Level::Error, &format!($($arg)*))
    };
}

/// Open (truncating) the log file and route panics into it.  Call once from
/// `main` before the window opens.
pub fn init() {
    let dir = data_dir().join("Astra");
    let path = dir.join("astra.log");
    let opened = fs::create_dir_all(&dir).and_then(|_| {
        OpenOptions::new().create(true).write(true).truncate(true).open(&path)
    });
    let file = match opened {
        Ok(f) => f,
        Err(e) => {
            eprintln!("astra: log disabled ({}: {})", path.display(), e);
            return;
        }
    };
    if SINK.set(Mutex::new(file)).is_err() {
        return;
    }
    write(
        Level::Info,
        &format!("Astra {} started, log at {}", env!("CARGO_PKG_VERSION"), path.display()),
    );

    let previous = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        write(Level::Panic, &info.to_string());
        previous(info);
    }));
}

fn data_dir() -> PathBuf {
    let env_dir = |key: &str| std::env::var_os(key).map(PathBuf::from);
    if cfg!(target_os = "windows") {
        if let Some(appdata) = env_dir("APPDATA") {
            return appdata;
        }
    } else if cfg!(target_os = "macos") {
        if let Some(home) = env_dir("HOME") {
            return home.join("Library").join("Application Support");
        }
    }
    env_dir("XDG_DATA_HOME")
        .or_else(|| env_dir("HOME").map(|h| h.join(".local").join("share")))
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Wall-clock HH:MM:SS (UTC).
fn clock() -> String {
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
        % 86_400;
    format!("{:02}:{:02}:{:02}", secs / 3600, secs % 3600 / 60, secs % 60)
}
