//! Size-based rotating log file.
//!
//! `app.log` is renamed to `app.log.1` once it would grow past the limit;
//! older backups shift up by one and the oldest is dropped.

use std::io::{self, Write};
use std::path::Path;

use cap_std::ambient_authority;
use cap_std::fs::{Dir, File, OpenOptions};

/// Backups kept next to the active file.
pub const DEFAULT_BACKUPS: usize = 5;

/// Append-only file that rotates when it reaches `max_bytes`.
#[derive(Debug)]
pub struct RotatingFile {
    dir: Dir,
    name: String,
    max_bytes: u64,
    backups: usize,
    file: File,
    written: u64,
}

impl RotatingFile {
    /// Open (creating if needed) `directory/name` for appending.
    ///
    /// A `max_bytes` of zero disables rotation.
    ///
    /// # Errors
    ///
    /// Returns any I/O error raised while creating the directory or file.
    pub fn open(directory: &Path, name: &str, max_bytes: u64, backups: usize) -> io::Result<Self> {
        Dir::create_ambient_dir_all(directory, ambient_authority())?;
        let dir = Dir::open_ambient_dir(directory, ambient_authority())?;
        let file = open_append(&dir, name)?;
        let written = file.metadata()?.len();
        Ok(Self {
            dir,
            name: name.to_owned(),
            max_bytes,
            backups,
            file,
            written,
        })
    }

    fn backup_name(&self, index: usize) -> String {
        format!("{}.{index}", self.name)
    }

    fn rotate(&mut self) -> io::Result<()> {
        self.file.flush()?;
        if self.backups == 0 {
            self.file = truncate(&self.dir, &self.name)?;
            self.written = 0;
            return Ok(());
        }
        for index in (1..self.backups).rev() {
            let from = self.backup_name(index);
            if self.dir.exists(&from) {
                self.dir.rename(&from, &self.dir, self.backup_name(index + 1))?;
            }
        }
        self.dir.rename(&self.name, &self.dir, self.backup_name(1))?;
        self.file = open_append(&self.dir, &self.name)?;
        self.written = 0;
        Ok(())
    }
}

fn open_append(dir: &Dir, name: &str) -> io::Result<File> {
    let mut options = OpenOptions::new();
    options.create(true).append(true);
    dir.open_with(name, &options)
}

fn truncate(dir: &Dir, name: &str) -> io::Result<File> {
    let mut options = OpenOptions::new();
    options.create(true).write(true).truncate(true);
    dir.open_with(name, &options)
}

impl Write for RotatingFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let incoming = u64::try_from(buf.len()).unwrap_or(u64::MAX);
        if self.max_bytes > 0
            && self.written > 0
            && self.written.saturating_add(incoming) > self.max_bytes
        {
            self.rotate()?;
        }
        let n = self.file.write(buf)?;
        self.written = self
            .written
            .saturating_add(u64::try_from(n).unwrap_or(u64::MAX));
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}
