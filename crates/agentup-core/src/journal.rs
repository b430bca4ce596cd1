use std::fmt::Display;
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use log::debug;

/// Files larger than this are cut to their newest half before appending.
pub const DEFAULT_MAX_JOURNAL_SIZE: u64 = 1024 * 1024;

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

static WRITE_LOCK: Mutex<()> = Mutex::new(());

/// Human-readable record of update lifecycle events.
///
/// Each entry is one `YYYY-MM-DD HH:MM:SS message` line, echoed to stdout
/// and appended to the journal file when one is configured. The file is
/// opened and closed per line so external rotation and deletion are safe.
#[derive(Debug, Clone)]
pub struct UpdateJournal {
    file: Option<PathBuf>,
    stdout: bool,
    max_size: u64,
}

impl Default for UpdateJournal {
    fn default() -> Self {
        Self {
            file: None,
            stdout: true,
            max_size: DEFAULT_MAX_JOURNAL_SIZE,
        }
    }
}

impl UpdateJournal {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Journal that does not echo to stdout; a configured file still
    /// receives every line.
    #[must_use]
    pub fn silent() -> Self {
        Self {
            stdout: false,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.file = Some(path.into());
        self
    }

    #[must_use]
    pub fn with_stdout(mut self, enabled: bool) -> Self {
        self.stdout = enabled;
        self
    }

    #[must_use]
    pub fn with_max_size(mut self, max_size: u64) -> Self {
        self.max_size = max_size;
        self
    }

    #[must_use]
    pub fn file(&self) -> Option<&Path> {
        self.file.as_deref()
    }

    pub fn record(&self, message: impl Display) {
        let line = format!("{} {message}\n", chrono::Local::now().format(TIME_FORMAT));

        let _guard = WRITE_LOCK
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);

        if self.stdout {
            let mut stdout = io::stdout().lock();
            let _ = stdout.write_all(line.as_bytes());
            let _ = stdout.flush();
        }

        if let Some(path) = &self.file
            && let Err(error) = append_line(path, &line, self.max_size)
        {
            debug!("Failed to append to journal {}: {error}", path.display());
        }
    }
}

fn append_line(path: &Path, line: &str, max_size: u64) -> io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    trim_if_oversized(path, max_size);

    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    file.write_all(line.as_bytes())
}

fn trim_if_oversized(path: &Path, max_size: u64) {
    if let Ok(metadata) = std::fs::metadata(path)
        && metadata.len() > max_size
        && let Ok(contents) = std::fs::read(path)
    {
        let half = contents.len() / 2;
        let keep_from = contents[half..]
            .iter()
            .position(|&b| b == b'\n')
            .map_or(half, |pos| half + pos + 1);
        let _ = std::fs::write(path, &contents[keep_from..]);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::{UpdateJournal, trim_if_oversized};

    fn assert_timestamped(line: &str, message: &str) {
        let (date, rest) = line.split_at(10);
        let (time, text) = rest[1..].split_at(8);
        assert_eq!(date.len(), 10);
        assert_eq!(date.as_bytes()[4], b'-');
        assert_eq!(time.as_bytes()[2], b':');
        assert_eq!(text, format!(" {message}"));
    }

    #[test]
    fn record_appends_timestamped_lines() {
        let temp = tempfile::tempdir().expect("tempdir should be created");
        let path = temp.path().join("logs").join("agentup.log");
        let journal = UpdateJournal::silent().with_file(&path);

        journal.record("update available: 1.0.0 -> 1.1.0");
        journal.record(format_args!("downloading: {}", "https://example.test/agent"));

        let contents = std::fs::read_to_string(&path).expect("journal should be readable");
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_timestamped(lines[0], "update available: 1.0.0 -> 1.1.0");
        assert_timestamped(lines[1], "downloading: https://example.test/agent");
    }

    #[test]
    fn journal_survives_file_deletion() {
        let temp = tempfile::tempdir().expect("tempdir should be created");
        let path = temp.path().join("agentup.log");
        let journal = UpdateJournal::silent().with_file(&path);

        journal.record("first");
        std::fs::remove_file(&path).expect("journal should be removable");
        journal.record("second");

        let contents = std::fs::read_to_string(&path).expect("journal should be readable");
        assert!(!contents.contains("first"));
        assert!(contents.trim_end().ends_with(" second"));
    }

    #[test]
    fn trim_keeps_recent_half() {
        let temp = tempfile::tempdir().expect("tempdir should be created");
        let path = temp.path().join("agentup.log");
        std::fs::write(&path, "line-1\nline-2\nline-3\nline-4\nline-5\n")
            .expect("journal should be written");

        trim_if_oversized(&path, 10);

        let trimmed = std::fs::read_to_string(&path).expect("journal should be readable");
        assert!(trimmed.starts_with("line-4\n") || trimmed.starts_with("line-3\n"));
        assert!(!trimmed.contains("line-1"));
    }

    #[test]
    fn concurrent_writers_do_not_interleave() {
        let temp = tempfile::tempdir().expect("tempdir should be created");
        let path = temp.path().join("agentup.log");
        let journal = Arc::new(UpdateJournal::silent().with_file(&path));

        let handles: Vec<_> = (0..4)
            .map(|worker| {
                let journal = Arc::clone(&journal);
                std::thread::spawn(move || {
                    for entry in 0..25 {
                        journal.record(format_args!("worker {worker} entry {entry}"));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().expect("writer thread should finish");
        }

        let contents = std::fs::read_to_string(&path).expect("journal should be readable");
        assert_eq!(contents.lines().count(), 100);
        assert!(contents.lines().all(|line| line.contains(" worker ")));
    }
}
