use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use env_logger::{Builder, Env, Target};
use log::info;

const MAX_LOG_BYTES: u64 = 2 * 1024 * 1024;

static LOG_PATH: OnceLock<PathBuf> = OnceLock::new();

/// Writes every line to stderr and, when it could be opened, the log file.
struct Tee {
    file: Option<File>,
}

impl Write for Tee {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let _ = io::stderr().write_all(buf);
        if let Some(file) = self.file.as_mut() {
            let _ = file.write_all(buf);
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        let _ = io::stderr().flush();
        if let Some(file) = self.file.as_mut() {
            file.flush()?;
        }
        Ok(())
    }
}

/// Install the global logger, writing to stderr and `<data_dir>/clipshelf.log`.
/// Level defaults to `info`; `RUST_LOG` overrides. Later calls do nothing.
pub fn init(data_dir: &Path) -> Option<PathBuf> {
    if let Some(path) = LOG_PATH.get() {
        return Some(path.clone());
    }

    let _ = fs::create_dir_all(data_dir);
    let file_path = data_dir.join("clipshelf.log");

    // Rotate: if file is > 2MB, rename to .old and start fresh
    if let Ok(meta) = fs::metadata(&file_path) {
        if meta.len() > MAX_LOG_BYTES {
            let _ = fs::rename(&file_path, data_dir.join("clipshelf.old.log"));
        }
    }

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&file_path)
        .ok();
    let has_file = file.is_some();

    let installed = Builder::from_env(Env::default().default_filter_or("info"))
        .format(|buf, record| {
            writeln!(
                buf,
                "[{}] {:<5} {}",
                chrono::Local::now().format("%H:%M:%S%.3f"),
                record.level(),
                record.args()
            )
        })
        .target(Target::Pipe(Box::new(Tee { file })))
        .try_init()
        .is_ok();

    if !installed {
        // Someone else owns the global logger.
        return None;
    }

    if has_file {
        let _ = LOG_PATH.set(file_path.clone());
    }
    info!("=== Clipshelf v{} started ===", env!("CARGO_PKG_VERSION"));
    info!("OS: {} ({})", std::env::consts::OS, std::env::consts::ARCH);
    if has_file {
        info!("Log file: {}", file_path.display());
    }
    log_path()
}

pub fn log_path() -> Option<PathBuf> {
    LOG_PATH.get().cloned()
}
