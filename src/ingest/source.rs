//! Line sources: stdin or a serial device read as a byte stream
//!
//! The device is opened like a file; baud rate and line discipline are set
//! outside the process (e.g. `stty -F /dev/ttyUSB0 9600 raw`).

use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

/// Blocking line iterator that ends at EOF or on the first read error.
///
/// Invalid UTF-8 is replaced rather than ending the stream, and line
/// terminators (`\n`, `\r\n`) are stripped.
pub struct LineSource<R> {
    reader: R,
    buf: Vec<u8>,
    finished: bool,
}

impl<R: BufRead> LineSource<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            buf: Vec::with_capacity(64),
            finished: false,
        }
    }
}

impl<R: BufRead> Iterator for LineSource<R> {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        if self.finished {
            return None;
        }

        self.buf.clear();
        match self.reader.read_until(b'\n', &mut self.buf) {
            Ok(0) => {
                self.finished = true;
                None
            }
            Ok(_) => {
                while matches!(self.buf.last(), Some(b'\n') | Some(b'\r')) {
                    self.buf.pop();
                }
                Some(String::from_utf8_lossy(&self.buf).into_owned())
            }
            Err(e) => {
                log::error!("❌ Line source read error: {}", e);
                self.finished = true;
                None
            }
        }
    }
}

pub type BoxedSource = LineSource<Box<dyn BufRead + Send>>;

pub fn stdin_source() -> BoxedSource {
    LineSource::new(Box::new(BufReader::new(io::stdin())))
}

pub fn device_source(port: &Path) -> io::Result<BoxedSource> {
    let file = File::open(port)?;
    log::info!("🔌 Reading from device {}", port.display());
    Ok(LineSource::new(Box::new(BufReader::new(file))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_splits_and_strips_terminators() {
        let lines: Vec<String> = LineSource::new(Cursor::new("22.1\r\n22.2\n\n22.3")).collect();
        assert_eq!(lines, vec!["22.1", "22.2", "", "22.3"]);
    }

    #[test]
    fn test_invalid_utf8_does_not_end_stream() {
        let bytes = b"\xff\xfe21.0\n22.0\n".to_vec();
        let lines: Vec<String> = LineSource::new(Cursor::new(bytes)).collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with("21.0"));
        assert_eq!(lines[1], "22.0");
    }

    #[test]
    fn test_device_source_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tty");
        std::fs::write(&path, "TEMP=20.5\nTEMP=21.5\n").unwrap();

        let lines: Vec<String> = device_source(&path).unwrap().collect();
        assert_eq!(lines, vec!["TEMP=20.5", "TEMP=21.5"]);
        assert!(device_source(&dir.path().join("missing")).is_err());
    }
}
