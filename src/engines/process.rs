//! Subprocess plumbing shared by the process-based engines.
//!
//! Output is read line by line and pushed to the caller's log sink as soon as
//! each line arrives. Lines are split on `\n` and decoded lossily, so an
//! engine printing invalid UTF-8 cannot stall the reader. Converters get no
//! timeout; a hung engine blocks its job.

use crate::engine::EngineKind;
use crate::error::Doc2MdError;
use crate::progress::LogSink;
use std::ffi::OsString;
use std::process::{ExitStatus, Stdio};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::Command;
use tokio_stream::wrappers::SplitStream;
use tokio_stream::{Stream, StreamExt};
use tracing::debug;

/// Exit status plus captured output of one engine run.
#[derive(Debug)]
pub struct ProcessOutput {
    pub status: ExitStatus,
    /// Captured stdout; empty when stdout was merged into `log`.
    pub stdout: String,
    /// Log lines in arrival order, newline-terminated.
    pub log: String,
}

/// Shell-like rendering of a command line for logs.
pub fn display_command(program: &str, args: &[OsString]) -> String {
    let mut line = program.to_string();
    for arg in args {
        let arg = arg.to_string_lossy();
        line.push(' ');
        if arg.contains(char::is_whitespace) {
            line.push('\'');
            line.push_str(&arg);
            line.push('\'');
        } else {
            line.push_str(&arg);
        }
    }
    line
}

fn spawn(engine: EngineKind, program: &str, args: &[OsString]) -> Result<tokio::process::Child, Doc2MdError> {
    debug!("Running {}", display_command(program, args));
    Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| Doc2MdError::EngineUnavailable {
            engine: engine.label().to_string(),
            program: program.to_string(),
            detail: e.to_string(),
        })
}

async fn pump_lines<S>(mut lines: S, sink: Option<&LogSink>, log: &mut String)
where
    S: Stream<Item = std::io::Result<Vec<u8>>> + Unpin,
{
    while let Some(item) = lines.next().await {
        match item {
            Ok(bytes) => {
                let text = String::from_utf8_lossy(&bytes);
                let line = text.trim_end_matches('\r');
                if let Some(sink) = sink {
                    sink(line);
                }
                log.push_str(line);
                log.push('\n');
            }
            Err(e) => {
                log.push_str(&format!("[log read error: {}]\n", e));
                break;
            }
        }
    }
}

fn piped_missing(engine: EngineKind) -> Doc2MdError {
    Doc2MdError::Internal(format!("{} output pipe was not captured", engine.label()))
}

/// Run an engine, merging stdout and stderr into one live log.
pub async fn run_logged(
    engine: EngineKind,
    program: &str,
    args: &[OsString],
    sink: Option<&LogSink>,
) -> Result<ProcessOutput, Doc2MdError> {
    let mut child = spawn(engine, program, args)?;
    let stdout = child.stdout.take().ok_or_else(|| piped_missing(engine))?;
    let stderr = child.stderr.take().ok_or_else(|| piped_missing(engine))?;

    let out_lines = SplitStream::new(BufReader::new(stdout).split(b'\n'));
    let err_lines = SplitStream::new(BufReader::new(stderr).split(b'\n'));
    let mut log = String::new();
    pump_lines(out_lines.merge(err_lines), sink, &mut log).await;

    let status = child.wait().await.map_err(|e| {
        Doc2MdError::Internal(format!("Waiting for {} failed: {}", program, e))
    })?;
    Ok(ProcessOutput {
        status,
        stdout: String::new(),
        log,
    })
}

/// Run an engine whose stdout is the Markdown result; only stderr is logged.
pub async fn run_capturing_stdout(
    engine: EngineKind,
    program: &str,
    args: &[OsString],
    sink: Option<&LogSink>,
) -> Result<ProcessOutput, Doc2MdError> {
    let mut child = spawn(engine, program, args)?;
    let mut stdout = child.stdout.take().ok_or_else(|| piped_missing(engine))?;
    let stderr = child.stderr.take().ok_or_else(|| piped_missing(engine))?;

    let read_stdout = async {
        let mut buf = Vec::new();
        stdout.read_to_end(&mut buf).await.map(|_| buf)
    };
    let mut log = String::new();
    let read_stderr = pump_lines(
        SplitStream::new(BufReader::new(stderr).split(b'\n')),
        sink,
        &mut log,
    );
    let (captured, ()) = tokio::join!(read_stdout, read_stderr);
    let captured = captured.map_err(|e| {
        Doc2MdError::Internal(format!("Reading {} output failed: {}", program, e))
    })?;

    let status = child.wait().await.map_err(|e| {
        Doc2MdError::Internal(format!("Waiting for {} failed: {}", program, e))
    })?;
    Ok(ProcessOutput {
        status,
        stdout: String::from_utf8_lossy(&captured).into_owned(),
        log,
    })
}
