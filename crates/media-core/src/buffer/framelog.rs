//! Frame timestamp trace log
//!
//! With `jb.log` enabled every buffer writes one line per put/get to its own
//! file, which makes playout decisions reproducible offline.

use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{info, warn};
use tracing_appender::rolling::{RollingFileAppender, Rotation};

/// Per-buffer frame log file
#[derive(Debug)]
pub struct FrameLog {
    path: PathBuf,
    writer: RollingFileAppender,
}

impl FrameLog {
    /// File name used for the buffer between `source` and `dest`
    pub fn file_name(impl_name: &str, source: &str, dest: &str) -> String {
        format!(
            "rtpjb_{}_jb_{}--{}.log",
            impl_name,
            source.replace('/', "#"),
            dest.replace('/', "#")
        )
    }

    /// Open the log file in `dir` for appending, or `None` with a warning if
    /// it cannot be opened
    pub fn open(dir: &Path, impl_name: &str, source: &str, dest: &str) -> Option<Self> {
        let file_name = Self::file_name(impl_name, source, dest);
        let path = dir.join(&file_name);
        let appender = RollingFileAppender::builder()
            .rotation(Rotation::NEVER)
            .filename_prefix(file_name)
            .build(dir);
        match appender {
            Ok(writer) => {
                info!("Jitter buffer frame log: {}", path.display());
                Some(Self { path, writer })
            }
            Err(e) => {
                warn!("Failed to open frame log {}: {}", path.display(), e);
                None
            }
        }
    }

    /// Path of the log file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// First frame of a buffer
    pub fn put_first(&mut self, now: i64, ts: i64, len: i64) {
        self.line(format_args!(
            "JB_PUT_FIRST {{now={}}}: Queued frame with ts={} and len={}",
            now, ts, len
        ));
    }

    /// Frame queued
    pub fn queued(&mut self, now: i64, ts: i64, len: i64) {
        self.line(format_args!(
            "JB_PUT {{now={}}}: Queued frame with ts={} and len={}",
            now, ts, len
        ));
    }

    /// Frame discarded on put
    pub fn dropped_on_put(&mut self, now: i64, ts: i64, len: i64) {
        self.line(format_args!(
            "JB_PUT {{now={}}}: Dropped frame with ts={} and len={}",
            now, ts, len
        ));
    }

    /// DTMF seen by a running buffer
    pub fn dtmf_resync(&mut self, now: i64) {
        self.line(format_args!(
            "JB_PUT {{now={}}}: Received DTMF frame. Force resynching jb...",
            now
        ));
    }

    /// Frame released for playout
    pub fn delivered(&mut self, now: i64, ts: i64, len: i64) {
        self.line(format_args!(
            "JB_GET {{now={}}}: Delivered frame with ts={} and len={}",
            now, ts, len
        ));
    }

    /// Due frame discarded on get
    pub fn dropped_on_get(&mut self, now: i64, ts: i64, len: i64) {
        self.line(format_args!(
            "JB_GET {{now={}}}: Dropped frame with ts={} and len={}",
            now, ts, len
        ));
    }

    /// Flush buffered lines to disk
    pub fn flush(&mut self) {
        if let Err(e) = self.writer.flush() {
            warn!("Failed to flush frame log {}: {}", self.path.display(), e);
        }
    }

    fn line(&mut self, args: std::fmt::Arguments<'_>) {
        let line = format!("{}\n", args);
        if let Err(e) = self.writer.write_all(line.as_bytes()) {
            warn!("Failed to write frame log {}: {}", self.path.display(), e);
        }
    }
}

impl Drop for FrameLog {
    fn drop(&mut self) {
        self.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_name_escapes_slashes() {
        assert_eq!(
            FrameLog::file_name("fixed", "SIP/alice-0001", "SIP/bob"),
            "rtpjb_fixed_jb_SIP#alice-0001--SIP#bob.log"
        );
    }

    #[test]
    fn test_lines_written() {
        let dir = std::env::temp_dir();
        let source = format!("test/{}", std::process::id());
        let _ = std::fs::remove_file(dir.join(FrameLog::file_name("fixed", &source, "sink")));
        let mut log = FrameLog::open(&dir, "fixed", &source, "sink").unwrap();
        log.put_first(10, 0, 20);
        log.queued(30, 20, 20);
        log.dropped_on_put(40, 0, 20);
        log.dtmf_resync(50);
        log.delivered(210, 0, 20);
        log.dropped_on_get(230, 20, 20);
        let path = log.path().to_path_buf();
        drop(log);

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(
            lines,
            vec![
                "JB_PUT_FIRST {now=10}: Queued frame with ts=0 and len=20",
                "JB_PUT {now=30}: Queued frame with ts=20 and len=20",
                "JB_PUT {now=40}: Dropped frame with ts=0 and len=20",
                "JB_PUT {now=50}: Received DTMF frame. Force resynching jb...",
                "JB_GET {now=210}: Delivered frame with ts=0 and len=20",
                "JB_GET {now=230}: Dropped frame with ts=20 and len=20",
            ]
        );
        std::fs::remove_file(path).unwrap();
    }

    #[test]
    fn test_open_failure_is_not_fatal() {
        // A directory below a regular file cannot be created, even as root
        let file = std::env::temp_dir().join(format!("rtpjb-framelog-{}", std::process::id()));
        std::fs::write(&file, b"").unwrap();
        assert!(FrameLog::open(&file.join("logs"), "fixed", "a", "b").is_none());
        std::fs::remove_file(file).unwrap();
    }
}
