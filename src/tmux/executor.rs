use std::borrow::Cow;
use std::ffi::OsStr;
use std::io;
use std::process::{ExitStatus, Stdio};

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;

use crate::error::{Error, Result};

/// Default upper bound for a single captured report
pub const DEFAULT_CAPTURE_LIMIT: usize = 64 * 1024;

/// Exit code reported when the program image cannot be loaded
pub const COMMAND_NOT_FOUND: i32 = 127;

const READ_CHUNK: usize = 4096;

/// errno for an image the kernel refuses to execute
#[cfg(unix)]
const ENOEXEC: i32 = 8;

/// Caller-owned, bounded sink for a child's standard output.
///
/// The buffer never grows past `capacity`; bytes the child writes beyond it
/// are counted but dropped, and [`execute`] turns that into
/// [`Error::OutputTruncated`].
#[derive(Debug, Clone)]
pub struct CapturedOutput {
    buf: Vec<u8>,
    capacity: usize,
}

impl CapturedOutput {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity.min(READ_CHUNK * 4)),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Current write cursor
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    pub fn as_str_lossy(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.buf)
    }

    pub fn clear(&mut self) {
        self.buf.clear();
    }

    /// Append as much of `chunk` as fits, returning the number of bytes kept.
    fn fill(&mut self, chunk: &[u8]) -> usize {
        let room = self.capacity.saturating_sub(self.buf.len());
        let keep = room.min(chunk.len());
        self.buf.extend_from_slice(&chunk[..keep]);
        keep
    }
}

impl Default for CapturedOutput {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPTURE_LIMIT)
    }
}

/// Run `argv[0]` with the remaining arguments and return its exit code.
///
/// With an output buffer, the child's stdout is drained into it while the
/// child is awaited, so a chatty child never blocks on a full pipe. Without
/// one, stdout is discarded. stderr is inherited either way.
///
/// A program image that cannot be loaded (missing, not executable, bad
/// format) yields [`COMMAND_NOT_FOUND`]; any other spawn or wait failure is
/// [`Error::Spawn`].
pub async fn execute<S: AsRef<OsStr>>(
    argv: &[S],
    output: Option<&mut CapturedOutput>,
) -> Result<i32> {
    let (program, args) = argv
        .split_first()
        .ok_or_else(|| Error::InvalidInput("empty argument vector".to_string()))?;
    let program_name = program.as_ref().to_string_lossy().into_owned();

    let mut cmd = Command::new(program);
    cmd.args(args)
        .stdin(Stdio::inherit())
        .stderr(Stdio::inherit())
        .stdout(if output.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        });

    let mut child = match cmd.spawn() {
        Ok(child) => child,
        Err(e) if is_exec_failure(&e) => {
            tracing::warn!("{}: cannot execute: {}", program_name, e);
            if let Some(output) = output {
                output.clear();
            }
            return Ok(COMMAND_NOT_FOUND);
        }
        Err(e) => return Err(Error::spawn(program_name, e)),
    };

    tracing::debug!(
        "spawned {} (pid {:?}) with {} args",
        program_name,
        child.id(),
        args.len()
    );

    let Some(output) = output else {
        let status = child
            .wait()
            .await
            .map_err(|e| Error::spawn(program_name.as_str(), e))?;
        let code = exit_code(status);
        tracing::debug!("{} exited with {}", program_name, code);
        return Ok(code);
    };

    output.clear();
    let stdout = child.stdout.take().ok_or_else(|| {
        Error::spawn(
            program_name.as_str(),
            io::Error::new(io::ErrorKind::BrokenPipe, "stdout was not piped"),
        )
    })?;

    // Reader and waiter run concurrently; both finish before we look at
    // either result, so the whole stream is consumed.
    let (status, received) = tokio::join!(child.wait(), drain(stdout, output));
    let status = status.map_err(|e| Error::spawn(program_name.as_str(), e))?;
    let received = received?;
    let code = exit_code(status);

    tracing::debug!(
        "{} exited with {} after writing {} bytes",
        program_name,
        code,
        received
    );

    if received > output.capacity() {
        return Err(Error::OutputTruncated {
            capacity: output.capacity(),
            received,
        });
    }

    Ok(code)
}

/// Read `reader` to EOF into `output`, returning the total bytes seen.
async fn drain<R: AsyncRead + Unpin>(mut reader: R, output: &mut CapturedOutput) -> Result<usize> {
    let mut chunk = [0u8; READ_CHUNK];
    let mut received = 0usize;
    loop {
        let n = reader.read(&mut chunk).await?;
        if n == 0 {
            return Ok(received);
        }
        received += n;
        output.fill(&chunk[..n]);
    }
}

/// Failures that belong to the program image rather than to process creation
fn is_exec_failure(e: &io::Error) -> bool {
    if matches!(
        e.kind(),
        io::ErrorKind::NotFound | io::ErrorKind::PermissionDenied
    ) {
        return true;
    }
    #[cfg(unix)]
    {
        if e.raw_os_error() == Some(ENOEXEC) {
            return true;
        }
    }
    false
}

fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }
    -1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_exit_code_without_output() {
        let mut out = CapturedOutput::with_capacity(64);
        let code = execute(&["sh", "-c", "exit 7"], Some(&mut out))
            .await
            .unwrap();
        assert_eq!(code, 7);
        assert!(out.is_empty());
        assert_eq!(out.as_str_lossy(), "");
    }

    #[tokio::test]
    async fn test_captures_report_line() {
        let mut out = CapturedOutput::with_capacity(256);
        let code = execute(&["sh", "-c", "printf '0\\tmain\\t/home\\n'"], Some(&mut out))
            .await
            .unwrap();
        assert_eq!(code, 0);
        assert_eq!(out.as_str_lossy(), "0\tmain\t/home\n");

        let windows = crate::tmux::build_window_list(&out.as_str_lossy())
            .unwrap()
            .invert()
            .to_vec();
        assert_eq!(windows, vec![crate::tmux::Window::new(0, "main", "/home")]);
    }

    #[tokio::test]
    async fn test_no_buffer_only_reports_status() {
        let code = execute(&["sh", "-c", "echo ignored; exit 3"], None)
            .await
            .unwrap();
        assert_eq!(code, 3);
    }

    #[tokio::test]
    async fn test_missing_program_is_127() {
        let mut out = CapturedOutput::with_capacity(16);
        let code = execute(&["tss-definitely-not-a-program"], Some(&mut out))
            .await
            .unwrap();
        assert_eq!(code, COMMAND_NOT_FOUND);
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn test_non_executable_program_is_127() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("not-exec");
        tokio::fs::write(&path, "#!/bin/sh\necho hi\n").await.unwrap();

        let mut out = CapturedOutput::with_capacity(16);
        let code = execute(&[path.as_os_str()], Some(&mut out)).await.unwrap();
        assert_eq!(code, COMMAND_NOT_FOUND);
        assert!(out.is_empty());
    }

    #[test]
    fn test_exec_failure_classification() {
        assert!(is_exec_failure(&io::Error::from(io::ErrorKind::NotFound)));
        assert!(is_exec_failure(&io::Error::from(
            io::ErrorKind::PermissionDenied
        )));
        #[cfg(unix)]
        assert!(is_exec_failure(&io::Error::from_raw_os_error(ENOEXEC)));
        // EAGAIN: process creation itself failed
        assert!(!is_exec_failure(&io::Error::from_raw_os_error(11)));
    }

    #[tokio::test]
    async fn test_empty_argv_rejected() {
        let argv: [&str; 0] = [];
        let err = execute(&argv, None).await.unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_overflow_is_reported() {
        let mut out = CapturedOutput::with_capacity(10);
        let err = execute(
            &["sh", "-c", "printf abcdefghijklmnopqrstuvwxyz"],
            Some(&mut out),
        )
        .await
        .unwrap_err();
        match err {
            Error::OutputTruncated { capacity, received } => {
                assert_eq!(capacity, 10);
                assert_eq!(received, 26);
            }
            other => panic!("expected OutputTruncated, got {:?}", other),
        }
        assert_eq!(out.as_bytes(), b"abcdefghij");
    }

    #[tokio::test]
    async fn test_large_output_is_fully_drained() {
        let mut out = CapturedOutput::with_capacity(1024 * 1024);
        let code = execute(&["sh", "-c", "seq 1 50000"], Some(&mut out))
            .await
            .unwrap();
        assert_eq!(code, 0);
        let text = out.as_str_lossy();
        assert_eq!(text.lines().count(), 50000);
        assert!(text.ends_with("50000\n"));
    }

    #[tokio::test]
    async fn test_buffer_reused_between_calls() {
        let mut out = CapturedOutput::with_capacity(64);
        execute(&["sh", "-c", "printf first"], Some(&mut out))
            .await
            .unwrap();
        execute(&["sh", "-c", "printf second"], Some(&mut out))
            .await
            .unwrap();
        assert_eq!(out.as_str_lossy(), "second");
    }
}
