//! Running external tools.
//!
//! The converter and the linter are separate executables. Both get the
//! document on stdin and answer on stdout; stderr carries diagnostics that
//! the caller relays into the log.

use std::io::{self, Write};
use std::process::{Command, Output, Stdio};

/// Split a configured program string like `bundle exec asciidoctor` into
/// the executable and its leading arguments.
pub fn command_for(program: &str) -> io::Result<Command> {
    let mut parts = program.split_whitespace();
    let exe = parts.next().ok_or_else(|| {
        io::Error::new(io::ErrorKind::InvalidInput, "empty program name")
    })?;
    let mut command = Command::new(exe);
    command.args(parts);
    Ok(command)
}

/// Run `command` with `input` on stdin and capture stdout and stderr.
///
/// Stdin is written from a scoped thread so a child that starts answering
/// before it has read everything can't deadlock against us.
pub fn run_with_stdin(command: &mut Command, input: &str) -> io::Result<Output> {
    let mut child = command
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()?;

    let stdin = child.stdin.take();
    std::thread::scope(|scope| {
        if let Some(mut stdin) = stdin {
            scope.spawn(move || {
                if let Err(e) = stdin.write_all(input.as_bytes()) {
                    tracing::debug!("Child closed stdin early: {e}");
                }
            });
        }
        child.wait_with_output()
    })
}
