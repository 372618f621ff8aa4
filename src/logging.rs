// The terminal UI owns stdout/stderr, so log records go to a file next to the
// project state instead.
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use log::{Level, LevelFilter, Log, Metadata, Record};

const LOG_FILE: &str = "padloop.log";
const LEVEL_ENV: &str = "PADLOOP_LOG";

pub struct FileLogger {
    level: LevelFilter,
    file: Mutex<File>,
}

impl FileLogger {
    pub fn open(state_dir: &Path, level: LevelFilter) -> anyhow::Result<Self> {
        std::fs::create_dir_all(state_dir)?;
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(state_dir.join(LOG_FILE))?;
        Ok(Self { level, file: Mutex::new(file) })
    }
}

impl Log for FileLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs_f64())
            .unwrap_or_default();
        if let Ok(mut file) = self.file.lock() {
            let _ = writeln!(
                file,
                "{secs:.3} {:<5} {}: {}",
                record.level(),
                record.target(),
                record.args()
            );
        }
    }

    fn flush(&self) {
        if let Ok(mut file) = self.file.lock() {
            let _ = file.flush();
        }
    }
}

pub fn level_from_env() -> LevelFilter {
    std::env::var(LEVEL_ENV)
        .ok()
        .and_then(|v| v.parse::<Level>().ok())
        .map(|l| l.to_level_filter())
        .unwrap_or(LevelFilter::Info)
}

// Installs the file logger as the global `log` backend
pub fn init(state_dir: &Path) -> anyhow::Result<()> {
    let level = level_from_env();
    let logger = FileLogger::open(state_dir, level)?;
    log::set_boxed_logger(Box::new(logger))?;
    log::set_max_level(level);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_enabled_records_only() {
        let dir = tempfile::tempdir().unwrap();
        let logger = FileLogger::open(dir.path(), LevelFilter::Info).unwrap();
        logger.log(
            &Record::builder()
                .level(Level::Warn)
                .target("padloop::test")
                .args(format_args!("sample missing"))
                .build(),
        );
        logger.log(
            &Record::builder()
                .level(Level::Debug)
                .target("padloop::test")
                .args(format_args!("too chatty"))
                .build(),
        );
        logger.flush();

        let text = std::fs::read_to_string(dir.path().join(LOG_FILE)).unwrap();
        assert!(text.contains("WARN  padloop::test: sample missing"));
        assert!(!text.contains("too chatty"));
    }
}
