//! Size-capped rotating file sink
//!
//! Files are named `base` + three-digit index + `suffix`, e.g. `app000.log` to
//! `app009.log` for ten slots. The active file is always the highest index;
//! on rollover the closed files are renumbered oldest first from index 0, and
//! the oldest ones are dropped once every slot is taken.

use crate::core::config::{keys, Configuration};
use crate::core::error::{LoggerError, Result};
use crate::core::error_handler::ErrorHandler;
use crate::core::{Record, Sink, TemplateEngine, TimestampStyle};
use chrono::Local;
use std::collections::HashSet;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

pub const DEFAULT_LOGFILE_PREFIX: &str = "@t @c [@L]: ";
pub const DEFAULT_LOGFILE_NAME: &str = "quill.log";
pub const DEFAULT_KMAXSIZE: i64 = 100;
pub const DEFAULT_BACKUPS: usize = 10;
pub const MAX_BACKUPS: usize = 500;
/// Writes between two flushes
pub const FLUSH_INTERVAL: u64 = 50;
/// First token of the header line of every file
pub const HEADER_MARKER: &str = "###LogFile###";

const ROLLOVER_MARKER: &str = ".rollover";

/// Naming scheme for the numbered files
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupNaming {
    base: String,
    suffix: String,
}

impl BackupNaming {
    /// Split a configured name into base and suffix. Backslashes become `/`
    /// and a name without an extension gets `.log`.
    pub fn from_name(name: &str) -> Self {
        let name = name.trim().replace('\\', "/");
        let file_start = name.rfind('/').map_or(0, |slash| slash + 1);
        match name[file_start..].rfind('.') {
            Some(dot) if dot > 0 => {
                let dot = file_start + dot;
                Self {
                    base: name[..dot].to_string(),
                    suffix: name[dot..].to_string(),
                }
            }
            _ => Self {
                base: name,
                suffix: ".log".to_string(),
            },
        }
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    pub fn suffix(&self) -> &str {
        &self.suffix
    }

    pub fn path(&self, index: usize) -> PathBuf {
        PathBuf::from(format!("{}{:03}{}", self.base, index, self.suffix))
    }

    fn rollover_path(&self, index: usize) -> PathBuf {
        PathBuf::from(format!(
            "{}{:03}{}{}",
            self.base, index, self.suffix, ROLLOVER_MARKER
        ))
    }
}

/// Rotating file sink
///
/// # Examples
///
/// ```no_run
/// use quill_logger::sinks::RotatingFileSink;
///
/// // app000.log .. app004.log, 64 KiB each
/// let sink = RotatingFileSink::new("/var/log/app.log", 64 * 1024, 5).unwrap();
/// assert!(sink.active_path().ends_with("app004.log"));
/// ```
pub struct RotatingFileSink {
    engine: TemplateEngine,
    naming: BackupNaming,
    max_size: u64,
    backups: usize,
    writer: Option<BufWriter<File>>,
    current_size: u64,
    lines_in_file: u64,
    write_count: u64,
    shutting_down: bool,
    error_handler: ErrorHandler,
}

impl RotatingFileSink {
    /// Open a sink, rolling over whatever files a previous run left behind.
    ///
    /// # Errors
    ///
    /// Returns error if the log directory cannot be created, or in `exception`
    /// error mode if the rollover reported a failure.
    pub fn new(name: &str, max_size: u64, backups: usize) -> Result<Self> {
        Self::build(
            name,
            max_size,
            backups,
            TemplateEngine::new(DEFAULT_LOGFILE_PREFIX),
            ErrorHandler::default(),
        )
    }

    /// # Errors
    ///
    /// Same as [`RotatingFileSink::new`].
    pub fn from_config(config: &dyn Configuration) -> Result<Self> {
        let name = config.get_string(keys::LOGFILE_NAME, DEFAULT_LOGFILE_NAME);
        let kmaxsize = config.get_long(keys::LOGFILE_KMAXSIZE, DEFAULT_KMAXSIZE).max(0);
        let backups = config.get_long(keys::LOGFILE_BACKUPS, DEFAULT_BACKUPS as i64);
        let engine =
            TemplateEngine::from_config(config, keys::LOGFILE_PREFIX, DEFAULT_LOGFILE_PREFIX);
        let error_handler =
            ErrorHandler::from_name(&config.get_string(keys::ERROR_MODE, "syserror"));

        Self::build(
            &name,
            (kmaxsize as u64).saturating_mul(1024),
            usize::try_from(backups).unwrap_or(1),
            engine,
            error_handler,
        )
    }

    fn build(
        name: &str,
        max_size: u64,
        backups: usize,
        engine: TemplateEngine,
        error_handler: ErrorHandler,
    ) -> Result<Self> {
        let naming = BackupNaming::from_name(name);

        if let Some(parent) = naming.path(0).parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| {
                    LoggerError::io_operation(
                        "create log directory",
                        format!("Failed to create directory '{}'", parent.display()),
                        e,
                    )
                })?;
            }
        }

        let mut sink = Self {
            engine,
            naming,
            max_size,
            backups: backups.clamp(1, MAX_BACKUPS),
            writer: None,
            current_size: 0,
            lines_in_file: 0,
            write_count: 0,
            shutting_down: false,
            error_handler,
        };
        sink.rollover()?;
        Ok(sink)
    }

    /// Replace the template prefix
    #[must_use]
    pub fn with_prefix(mut self, prefix: &str) -> Self {
        self.engine = self.engine.clone().with_prefix(prefix);
        self
    }

    #[must_use]
    pub fn with_error_handler(mut self, error_handler: ErrorHandler) -> Self {
        self.error_handler = error_handler;
        self.engine = self.engine.clone().with_error_handler(error_handler);
        self
    }

    /// Path of the file currently written to
    #[must_use]
    pub fn active_path(&self) -> PathBuf {
        self.naming.path(self.backups - 1)
    }

    #[must_use]
    pub fn naming(&self) -> &BackupNaming {
        &self.naming
    }

    /// Bytes in the active file, header included
    #[must_use]
    pub fn current_size(&self) -> u64 {
        self.current_size
    }

    #[must_use]
    pub fn max_size(&self) -> u64 {
        self.max_size
    }

    #[must_use]
    pub fn backups(&self) -> usize {
        self.backups
    }

    fn report(
        &self,
        escalated: &mut Option<LoggerError>,
        path: &Path,
        action: &str,
        err: &std::io::Error,
    ) {
        let failure =
            LoggerError::file_rotation(path.display().to_string(), format!("{}: {}", action, err));
        if let Err(e) = self
            .error_handler
            .handle("RotatingFileSink: rollover step failed", Some(&failure))
        {
            escalated.get_or_insert(e);
        }
    }

    /// Renumber the existing files and open a fresh active file.
    ///
    /// Every failure is reported and the rollover carries on; in `exception`
    /// mode the first escalated failure is returned once it is complete.
    fn rollover(&mut self) -> Result<()> {
        let mut escalated = None;

        if let Some(mut writer) = self.writer.take() {
            if let Err(e) = writer.flush() {
                let active = self.active_path();
                self.report(&mut escalated, &active, "trouble closing log file", &e);
            }
        }

        // Move every existing file aside so renumbering cannot collide.
        // A file that cannot be moved stays pinned at its own path.
        let mut found: Vec<(SystemTime, usize, PathBuf, bool)> = Vec::new();
        for index in 0..self.backups {
            let path = self.naming.path(index);
            let Ok(metadata) = fs::metadata(&path) else {
                continue;
            };
            let modified = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH);
            let aside = self.naming.rollover_path(index);
            let _ = fs::remove_file(&aside);
            match fs::rename(&path, &aside) {
                Ok(()) => found.push((modified, index, aside, true)),
                Err(e) => {
                    self.report(&mut escalated, &path, "cannot move aside", &e);
                    found.push((modified, index, path, false));
                }
            }
        }

        found.sort_by(|a, b| (a.0, a.1).cmp(&(b.0, b.1)));

        let keep = self.backups - 1;
        let excess = found.len().saturating_sub(keep);
        for (_, _, path, _) in found.drain(..excess) {
            if let Err(e) = fs::remove_file(&path) {
                self.report(&mut escalated, &path, "cannot remove old backup", &e);
            }
        }

        let pinned: HashSet<PathBuf> = found
            .iter()
            .filter(|(_, _, _, moved)| !moved)
            .map(|(_, _, path, _)| path.clone())
            .collect();
        let mut targets = (0..keep)
            .map(|index| self.naming.path(index))
            .filter(|target| !pinned.contains(target));

        for (_, _, path, moved) in found {
            if !moved {
                continue;
            }
            let Some(target) = targets.next() else {
                break;
            };
            let _ = fs::remove_file(&target);
            if let Err(e) = fs::rename(&path, &target) {
                self.report(
                    &mut escalated,
                    &path,
                    &format!("cannot rename to {}", target.display()),
                    &e,
                );
            }
        }

        self.current_size = 0;
        self.lines_in_file = 0;
        let active = self.active_path();
        match Self::create_with_header(&active) {
            Ok((writer, header_len)) => {
                self.writer = Some(writer);
                self.current_size = header_len;
            }
            Err(e) => self.report(&mut escalated, &active, "cannot create active file", &e),
        }

        escalated.map_or(Ok(()), Err)
    }

    fn create_with_header(path: &Path) -> std::io::Result<(BufWriter<File>, u64)> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;
        let mut writer = BufWriter::new(file);
        let header = format!(
            "{} {}\n",
            HEADER_MARKER,
            TimestampStyle::IsoLocal.format(&Local::now())
        );
        writer.write_all(header.as_bytes())?;
        Ok((writer, header.len() as u64))
    }

    /// Try to reopen the active file (used for recovery after a failed rollover)
    fn try_reopen_file(path: &Path) -> std::io::Result<(BufWriter<File>, u64)> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let size = file.metadata()?.len();
        Ok((BufWriter::new(file), size))
    }
}

impl Sink for RotatingFileSink {
    fn append(&mut self, record: &Record) -> Result<()> {
        let mut line = self.engine.format(record);
        line.push('\n');
        let line_len = line.len() as u64;

        let mut outcome = Ok(());
        if self.current_size + line_len > self.max_size
            && self.lines_in_file > 0
            && !self.shutting_down
        {
            outcome = self.rollover();
        }

        if self.writer.is_none() {
            let active = self.active_path();
            match Self::try_reopen_file(&active) {
                Ok((writer, size)) => {
                    self.writer = Some(writer);
                    self.current_size = size;
                }
                Err(e) => {
                    self.error_handler.handle(
                        &format!("RotatingFileSink: cannot reopen {}", active.display()),
                        Some(&e),
                    )?;
                    return outcome;
                }
            }
        }

        if let Some(ref mut writer) = self.writer {
            if let Err(e) = writer.write_all(line.as_bytes()) {
                self.error_handler
                    .handle("RotatingFileSink cannot write to file", Some(&e))?;
                return outcome;
            }
        }
        self.current_size += line_len;
        self.lines_in_file += 1;
        self.write_count += 1;

        if self.write_count % FLUSH_INTERVAL == 0 {
            self.flush()?;
        }

        outcome
    }

    fn flush(&mut self) -> Result<()> {
        if let Some(ref mut writer) = self.writer {
            if let Err(e) = writer.flush() {
                self.error_handler
                    .handle("RotatingFileSink: flush failed", Some(&e))?;
            }
        }
        Ok(())
    }

    fn notify_shutdown(&mut self) {
        self.shutting_down = true;
    }

    fn close(&mut self) -> Result<()> {
        let result = self.flush();
        self.writer = None;
        result
    }

    fn name(&self) -> &str {
        "logfile"
    }
}

impl Drop for RotatingFileSink {
    fn drop(&mut self) {
        if let Some(mut writer) = self.writer.take() {
            let _ = writer.flush();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::MapConfig;
    use crate::core::error_handler::ErrorMode;
    use crate::core::{CallSite, Level};
    use tempfile::tempdir;

    fn record(message: &str) -> Record {
        Record::new(Level::Info, message, vec![], CallSite::caller())
    }

    fn quiet(name: &Path, max_size: u64, backups: usize) -> RotatingFileSink {
        RotatingFileSink::new(name.to_str().unwrap(), max_size, backups)
            .unwrap()
            .with_prefix("")
            .with_error_handler(ErrorHandler::new(ErrorMode::Silent))
    }

    fn numbered_files(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_naming() {
        let naming = BackupNaming::from_name("logs\\app.log");
        assert_eq!(naming.base(), "logs/app");
        assert_eq!(naming.suffix(), ".log");
        assert_eq!(naming.path(7), PathBuf::from("logs/app007.log"));

        let naming = BackupNaming::from_name("my.logs/service");
        assert_eq!(naming.base(), "my.logs/service");
        assert_eq!(naming.suffix(), ".log");

        let naming = BackupNaming::from_name(".hidden");
        assert_eq!(naming.base(), ".hidden");
        assert_eq!(naming.suffix(), ".log");
    }

    #[test]
    fn test_new_file_has_header() {
        let dir = tempdir().unwrap();
        let mut sink = quiet(&dir.path().join("app.log"), 10_000, 3);
        assert!(sink.active_path().ends_with("app002.log"));

        sink.append(&record("hello")).unwrap();
        sink.flush().unwrap();

        let content = fs::read_to_string(sink.active_path()).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert!(lines[0].starts_with(HEADER_MARKER));
        assert_eq!(lines[1], "hello");
        assert_eq!(sink.current_size(), content.len() as u64);
    }

    #[test]
    fn test_rollover_keeps_newest_at_highest_index() {
        let dir = tempdir().unwrap();
        let mut sink = quiet(&dir.path().join("roll.log"), 60, 3);

        // Each line is 10 bytes; the header is about 38, so two lines fill a file
        for i in 0..10 {
            sink.append(&record(&format!("line-{:04}", i))).unwrap();
        }
        sink.flush().unwrap();

        assert_eq!(
            numbered_files(dir.path()),
            vec!["roll000.log", "roll001.log", "roll002.log"]
        );

        let newest = fs::read_to_string(dir.path().join("roll002.log")).unwrap();
        assert!(newest.contains("line-0009"));
        let oldest = fs::read_to_string(dir.path().join("roll000.log")).unwrap();
        let middle = fs::read_to_string(dir.path().join("roll001.log")).unwrap();
        assert!(!oldest.contains("line-0009"));
        assert!(!middle.contains("line-0009"));
        assert!(!oldest.contains("line-0000"));
    }

    #[test]
    fn test_restart_renumbers_previous_run() {
        let dir = tempdir().unwrap();
        let name = dir.path().join("run.log");
        {
            let mut sink = quiet(&name, 10_000, 4);
            sink.append(&record("first run")).unwrap();
            sink.close().unwrap();
        }
        let sink = quiet(&name, 10_000, 4);

        assert_eq!(numbered_files(dir.path()), vec!["run000.log", "run003.log"]);
        let previous = fs::read_to_string(dir.path().join("run000.log")).unwrap();
        assert!(previous.contains("first run"));
        drop(sink);
    }

    #[test]
    fn test_single_slot_truncates() {
        let dir = tempdir().unwrap();
        let mut sink = quiet(&dir.path().join("one.log"), 50, 1);
        for i in 0..5 {
            sink.append(&record(&format!("entry {}", i))).unwrap();
        }
        sink.flush().unwrap();
        assert_eq!(numbered_files(dir.path()), vec!["one000.log"]);
    }

    #[test]
    fn test_no_rollover_after_shutdown_notice() {
        let dir = tempdir().unwrap();
        let mut sink = quiet(&dir.path().join("drain.log"), 60, 3);
        sink.notify_shutdown();
        for i in 0..10 {
            sink.append(&record(&format!("line-{:04}", i))).unwrap();
        }
        sink.close().unwrap();

        assert_eq!(numbered_files(dir.path()), vec!["drain002.log"]);
        let content = fs::read_to_string(dir.path().join("drain002.log")).unwrap();
        assert_eq!(content.lines().count(), 11);
    }

    #[test]
    fn test_oversized_line_gets_its_own_file() {
        let dir = tempdir().unwrap();
        let mut sink = quiet(&dir.path().join("big.log"), 10, 5);
        sink.append(&record("a line far longer than ten bytes")).unwrap();
        sink.append(&record("another long line")).unwrap();
        sink.flush().unwrap();
        assert_eq!(numbered_files(dir.path()), vec!["big000.log", "big004.log"]);
    }

    /// Occupy the move-aside path of `index` so renaming onto it fails
    fn block_move_aside(naming: &BackupNaming, index: usize) {
        let blocker = naming.rollover_path(index);
        fs::create_dir_all(&blocker).unwrap();
        fs::write(blocker.join("keep"), "x").unwrap();
    }

    #[test]
    fn test_unmovable_file_is_not_overwritten() {
        let dir = tempdir().unwrap();
        let name = dir.path().join("pin.log");
        let naming = BackupNaming::from_name(name.to_str().unwrap());

        // pin001 is older than pin000, so it would be renumbered onto index 0
        let older = OpenOptions::new()
            .create(true)
            .write(true)
            .open(naming.path(1))
            .unwrap();
        std::io::Write::write_all(&mut &older, b"older backup\n").unwrap();
        older
            .set_modified(SystemTime::now() - std::time::Duration::from_secs(120))
            .unwrap();
        drop(older);
        fs::write(naming.path(0), "pinned backup\n").unwrap();
        block_move_aside(&naming, 0);

        let sink = quiet(&name, 10_000, 4);

        let pinned = fs::read_to_string(naming.path(0)).unwrap();
        assert_eq!(pinned, "pinned backup\n");
        let moved = fs::read_to_string(naming.path(1)).unwrap();
        assert_eq!(moved, "older backup\n");
        assert!(sink.active_path().exists());
    }

    #[test]
    fn test_exception_mode_rollover_completes_then_escalates() {
        let dir = tempdir().unwrap();
        let name = dir.path().join("esc.log");
        let mut sink = RotatingFileSink::new(name.to_str().unwrap(), 50, 3)
            .unwrap()
            .with_prefix("")
            .with_error_handler(ErrorHandler::new(ErrorMode::Exception));

        // Header is about 38 bytes, so each entry fills a file
        sink.append(&record("entry 1")).unwrap();
        sink.append(&record("entry 2")).unwrap();
        assert!(fs::read_to_string(sink.naming().path(0))
            .unwrap()
            .contains("entry 1"));

        block_move_aside(sink.naming(), 0);
        let result = sink.append(&record("entry 3"));
        assert!(matches!(result, Err(LoggerError::Escalated(_))));
        sink.flush().unwrap();

        let naming = sink.naming().clone();
        assert!(fs::read_to_string(naming.path(0))
            .unwrap()
            .contains("entry 1"));
        assert!(fs::read_to_string(naming.path(1))
            .unwrap()
            .contains("entry 2"));
        let active = fs::read_to_string(sink.active_path()).unwrap();
        assert!(active.starts_with(HEADER_MARKER));
        assert!(active.contains("entry 3"));
        assert!(!active.contains("entry 2"));
    }

    #[test]
    fn test_from_config() {
        let dir = tempdir().unwrap();
        let name = dir.path().join("nested").join("svc");
        let config = MapConfig::new()
            .set(keys::LOGFILE_NAME, name.to_str().unwrap())
            .set(keys::LOGFILE_KMAXSIZE, "2")
            .set(keys::LOGFILE_BACKUPS, "9999");
        let sink = RotatingFileSink::from_config(&config).unwrap();
        assert_eq!(sink.max_size(), 2048);
        assert_eq!(sink.backups(), MAX_BACKUPS);
        assert!(sink.active_path().ends_with("svc499.log"));
        assert!(sink.active_path().exists());
    }
}
