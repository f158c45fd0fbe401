//! Running a segment's decompression/decryption filter as a subprocess
//! (specification §4.3).
//!
//! Segments are optionally wrapped by an external filter command
//! (`gzip -dc`, `bzip2 -dc`, `cumulus-filter-gpg --decrypt`) chosen by
//! the suffix under which the segment file was found. The filter is run
//! through the shell, exactly as named in the segment filter table; raw
//! segment bytes are pumped into its stdin on a background thread while
//! the caller reads decoded bytes from its stdout, so neither side can
//! deadlock on a full pipe buffer.

#![warn(missing_docs)]

use cumulus_core::CoreError;
use std::io::{self, Read, Write};
use std::process::{Child, ChildStdout, Command, Stdio};
use std::thread::JoinHandle;

const PUMP_BLOCK_SIZE: usize = 4096;

/// Result type alias for filter operations.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Run `filter_cmd` (if any) over `input`, returning a reader over its
/// decoded output.
///
/// `filter_cmd` is interpreted the way the segment filter table names
/// it: a full shell command line. `None` means the segment is stored
/// uncompressed, and `input` is returned unfiltered.
pub fn apply(
    input: Box<dyn Read + Send>,
    filter_cmd: Option<&str>,
) -> Result<Box<dyn Read + Send>> {
    let Some(cmd) = filter_cmd else {
        return Ok(input);
    };

    let mut child = spawn(cmd)?;
    let stdin = child
        .stdin
        .take()
        .ok_or_else(|| CoreError::Corrupt(format!("filter {:?}: no stdin pipe", cmd)))?;
    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| CoreError::Corrupt(format!("filter {:?}: no stdout pipe", cmd)))?;

    let cmd_owned = cmd.to_string();
    let pump = std::thread::spawn(move || pump(input, stdin));

    Ok(Box::new(FilterReader {
        command: cmd_owned,
        child,
        stdout,
        pump: Some(pump),
        finished: false,
    }))
}

fn spawn(cmd: &str) -> Result<Child> {
    Command::new("/bin/sh")
        .arg("-c")
        .arg(cmd)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .spawn()
        .map_err(|e| CoreError::from_io(format!("spawning filter {:?}", cmd), e))
}

fn pump(mut src: Box<dyn Read + Send>, mut dst: impl Write) -> io::Result<()> {
    let mut buf = [0u8; PUMP_BLOCK_SIZE];
    loop {
        let n = src.read(&mut buf)?;
        if n == 0 {
            break;
        }
        dst.write_all(&buf[..n])?;
    }
    Ok(())
}

/// A reader over a filter subprocess's decoded output.
///
/// Dropping this value before reading it to completion leaves the
/// filter's exit status unchecked; call [`FilterReader::finish`] once
/// all output has been consumed to surface a non-zero exit as
/// [`CoreError::Corrupt`].
struct FilterReader {
    command: String,
    child: Child,
    stdout: ChildStdout,
    pump: Option<JoinHandle<io::Result<()>>>,
    finished: bool,
}

impl FilterReader {
    fn finish(&mut self) -> Result<()> {
        if self.finished {
            return Ok(());
        }
        self.finished = true;

        if let Some(handle) = self.pump.take() {
            match handle.join() {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    tracing::warn!(command = %self.command, error = %e, "filter input pump failed");
                }
                Err(_) => {
                    tracing::warn!(command = %self.command, "filter input pump thread panicked");
                }
            }
        }

        let status = self
            .child
            .wait()
            .map_err(|e| CoreError::from_io(format!("waiting for filter {:?}", self.command), e))?;
        if !status.success() {
            return Err(CoreError::Corrupt(format!(
                "filter {:?} exited with {:?}",
                self.command,
                status.code()
            )));
        }
        Ok(())
    }
}

impl Read for FilterReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.stdout.read(buf)?;
        if n == 0 && !self.finished {
            if let Err(e) = self.finish() {
                return Err(io::Error::new(io::ErrorKind::Other, e));
            }
        }
        Ok(n)
    }
}

impl Drop for FilterReader {
    fn drop(&mut self) {
        if !self.finished {
            let _ = self.finish();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn no_filter_returns_input_unchanged() {
        let input: Box<dyn Read + Send> = Box::new(Cursor::new(b"raw bytes".to_vec()));
        let mut out = apply(input, None).unwrap();
        let mut buf = Vec::new();
        out.read_to_end(&mut buf).unwrap();
        assert_eq!(buf, b"raw bytes");
    }

    #[test]
    fn cat_filter_passes_data_through() {
        let input: Box<dyn Read + Send> = Box::new(Cursor::new(b"hello through cat".to_vec()));
        let mut out = apply(input, Some("cat")).unwrap();
        let mut buf = Vec::new();
        out.read_to_end(&mut buf).unwrap();
        assert_eq!(buf, b"hello through cat");
    }

    #[test]
    fn large_input_does_not_deadlock() {
        let data = vec![7u8; 5 * 1024 * 1024];
        let input: Box<dyn Read + Send> = Box::new(Cursor::new(data.clone()));
        let mut out = apply(input, Some("cat")).unwrap();
        let mut buf = Vec::new();
        out.read_to_end(&mut buf).unwrap();
        assert_eq!(buf, data);
    }

    #[test]
    fn nonzero_exit_surfaces_as_corrupt() {
        let input: Box<dyn Read + Send> = Box::new(Cursor::new(b"x".to_vec()));
        let mut out = apply(input, Some("false")).unwrap();
        let mut buf = Vec::new();
        let err = out.read_to_end(&mut buf).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::Other);
    }
}
