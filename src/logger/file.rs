//! File persistence for log lines
//!
//! Appends plain (uncolored) lines to `callscope_YYYY-MM-DD.log` in the logs
//! directory. Failures to open or write are reported once on stderr and
//! otherwise ignored so logging never takes the process down.

use chrono::Local;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

struct FileSink {
    writer: BufWriter<File>,
    path: PathBuf,
}

static FILE_SINK: Lazy<Mutex<Option<FileSink>>> = Lazy::new(|| Mutex::new(None));

pub fn log_file_path(logs_dir: &Path) -> PathBuf {
    let date = Local::now().format("%Y-%m-%d");
    logs_dir.join(format!("callscope_{}.log", date))
}

pub fn init_file_logging(logs_dir: &Path) {
    if let Err(e) = fs::create_dir_all(logs_dir) {
        eprintln!("Logger: failed to create {}: {}", logs_dir.display(), e);
        return;
    }

    let path = log_file_path(logs_dir);
    match OpenOptions::new().create(true).append(true).open(&path) {
        Ok(file) => {
            *FILE_SINK.lock() = Some(FileSink {
                writer: BufWriter::new(file),
                path,
            });
        }
        Err(e) => {
            eprintln!("Logger: failed to open {}: {}", path.display(), e);
        }
    }
}

pub fn write_to_file(line: &str) {
    let mut sink = FILE_SINK.lock();
    if let Some(sink) = sink.as_mut() {
        if writeln!(sink.writer, "{}", line).is_err() {
            eprintln!("Logger: write to {} failed", sink.path.display());
        }
    }
}

pub fn flush_file_logging() {
    if let Some(sink) = FILE_SINK.lock().as_mut() {
        let _ = sink.writer.flush();
    }
}
