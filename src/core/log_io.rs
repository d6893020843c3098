use std::fs::File;
use std::io::{self, BufRead, BufReader, Seek, SeekFrom};
use std::path::{Path, PathBuf};

/// Follows a growing chat log file, yielding only lines appended since the
/// last read.
pub struct LogTailer {
    file: File,
    position: u64,
    path: PathBuf,
}

impl LogTailer {
    /// Open positioned at the current end of the file.
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let mut tailer = Self::open_from_start(path)?;
        tailer.position = tailer.file.metadata()?.len();
        Ok(tailer)
    }

    pub fn open_from_start(path: impl AsRef<Path>) -> io::Result<Self> {
        let path_ref = path.as_ref();
        let file = File::open(path_ref)?;
        Ok(Self {
            file,
            position: 0,
            path: path_ref.to_path_buf(),
        })
    }

    pub fn read_new_lines(&mut self) -> io::Result<Vec<String>> {
        let mut lines = Vec::new();

        // Truncated or rotated in place: start over.
        let len = self.file.metadata()?.len();
        if len < self.position {
            log::info!("{} was truncated, reading from start", self.path.display());
            self.position = 0;
        }

        self.file.seek(SeekFrom::Start(self.position))?;
        let mut reader = BufReader::new(&self.file);
        let mut buffer = Vec::new();

        loop {
            buffer.clear();
            let bytes_read = reader.read_until(b'\n', &mut buffer)?;
            if bytes_read == 0 {
                break;
            }
            // Leave a partially written line for the next read.
            if !buffer.ends_with(b"\n") {
                break;
            }
            self.position += bytes_read as u64;
            // Invalid UTF-8 becomes U+FFFD; the line is still consumed.
            let line = String::from_utf8_lossy(&buffer);
            lines.push(line.trim_end_matches(&['\r', '\n'][..]).to_string());
        }

        Ok(lines)
    }

    pub fn rewind(&mut self) -> io::Result<()> {
        self.position = 0;
        self.file.seek(SeekFrom::Start(0))?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::OpenOptions;
    use std::io::Write;
    use tempfile::tempdir;

    fn append(path: &Path, text: &str) {
        let mut file = OpenOptions::new().append(true).create(true).open(path).unwrap();
        write!(file, "{}", text).unwrap();
    }

    #[test]
    fn test_open_skips_existing_lines() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("chat.log");
        append(&path, "old line\n");

        let mut tailer = LogTailer::open(&path).unwrap();
        assert!(tailer.read_new_lines().unwrap().is_empty());

        append(&path, "You cast your line on Mist Gate.\r\nsecond\n");
        assert_eq!(
            tailer.read_new_lines().unwrap(),
            vec!["You cast your line on Mist Gate.".to_string(), "second".to_string()]
        );
        assert!(tailer.read_new_lines().unwrap().is_empty());
        assert_eq!(tailer.path(), path.as_path());
    }

    #[test]
    fn test_partial_line_waits_for_newline() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("chat.log");
        append(&path, "");

        let mut tailer = LogTailer::open_from_start(&path).unwrap();
        append(&path, "half a li");
        assert!(tailer.read_new_lines().unwrap().is_empty());
        append(&path, "ne\n");
        assert_eq!(tailer.read_new_lines().unwrap(), vec!["half a line".to_string()]);
    }

    #[test]
    fn test_invalid_utf8_line_does_not_block_later_lines() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("chat.log");
        append(&path, "");

        let mut tailer = LogTailer::open(&path).unwrap();
        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        file.write_all(b"bad \xff line\nYou cast your line on Mist Gate.\n").unwrap();

        let lines = tailer.read_new_lines().unwrap();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], "bad \u{fffd} line");
        assert_eq!(lines[1], "You cast your line on Mist Gate.");
        assert!(tailer.read_new_lines().unwrap().is_empty());
    }

    #[test]
    fn test_rewind_and_truncation() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("chat.log");
        append(&path, "a\nb\n");

        let mut tailer = LogTailer::open_from_start(&path).unwrap();
        assert_eq!(tailer.read_new_lines().unwrap().len(), 2);
        tailer.rewind().unwrap();
        assert_eq!(tailer.read_new_lines().unwrap().len(), 2);

        std::fs::write(&path, "c\n").unwrap();
        assert_eq!(tailer.read_new_lines().unwrap(), vec!["c".to_string()]);
    }
}
