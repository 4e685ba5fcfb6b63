//! Relaying output of external tools into the log.
//!
//! The converter and the linter print human-oriented text, sometimes with
//! colors. [`LogBridge`] takes that text in arbitrary chunks, splits it into
//! lines, strips ANSI escapes when the terminal can't show them and routes
//! each line to a [`LogSink`] at a severity guessed from its markers.
//!
//! Severity is sticky: once a line carries an error marker, the following
//! lines (context, suggestions, underlines) are logged as errors too.

use regex::Regex;
use std::fmt;
use std::io::{self, IsTerminal};
use std::sync::LazyLock;

static ANSI_ESCAPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\x1b\[[;\d]*m").expect("ansi pattern is valid"));

// An optional `program: ` prefix, as in `asciidoctor: WARNING: ...`.
static ERROR_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:[\w.-]+: )?(?:\[ERROR\]|ERROR:)").expect("error pattern is valid")
});
static WARN_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:[\w.-]+: )?(?:\[WARN\]|WARNING:|WARN:)").expect("warn pattern is valid")
});
static INFO_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:[\w.-]+: )?(?:\[INFO\]|INFO:)").expect("info pattern is valid")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Info,
    Warn,
    Error,
}

impl Severity {
    /// Severity announced by a marker at the start of `line`.
    pub fn detect(line: &str) -> Option<Severity> {
        if ERROR_MARKER.is_match(line) {
            Some(Severity::Error)
        } else if WARN_MARKER.is_match(line) {
            Some(Severity::Warn)
        } else if INFO_MARKER.is_match(line) {
            Some(Severity::Info)
        } else {
            None
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Info => "INFO",
            Severity::Warn => "WARN",
            Severity::Error => "ERROR",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Destination for relayed lines.
pub trait LogSink {
    fn emit(&mut self, severity: Severity, line: &str);
}

/// Forwards lines to `tracing` at the matching level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn emit(&mut self, severity: Severity, line: &str) {
        match severity {
            Severity::Error => tracing::error!("{line}"),
            Severity::Warn => tracing::warn!("{line}"),
            Severity::Info => tracing::info!("{line}"),
        }
    }
}

/// Collects lines in memory.
impl LogSink for Vec<(Severity, String)> {
    fn emit(&mut self, severity: Severity, line: &str) {
        self.push((severity, line.to_string()));
    }
}

/// Line-buffering writer that classifies tool output and sends it to a sink.
pub struct LogBridge<S: LogSink> {
    sink: S,
    strip_ansi: bool,
    current: Severity,
    pending: String,
    /// Bytes of a UTF-8 sequence cut off at the end of the last `write`.
    undecoded: Vec<u8>,
}

impl<S: LogSink> LogBridge<S> {
    pub fn new(sink: S, strip_ansi: bool) -> Self {
        Self {
            sink,
            strip_ansi,
            current: Severity::Info,
            pending: String::new(),
            undecoded: Vec::new(),
        }
    }

    /// Force the severity of subsequent lines.
    pub fn set_severity(&mut self, severity: Severity) {
        self.current = severity;
    }

    /// Feed a chunk of output. Complete lines are emitted right away; a
    /// trailing partial line waits for more input or [`flush`](Self::flush).
    pub fn write_str(&mut self, chunk: &str) {
        self.pending.push_str(chunk);
        while let Some(pos) = self.pending.find('\n') {
            let line: String = self.pending.drain(..=pos).collect();
            let line = line.trim_end_matches('\n').trim_end_matches('\r');
            self.process_line(line);
        }
    }

    /// Emit a complete line, flushing any partial one first.
    pub fn write_line(&mut self, line: &str) {
        self.flush_pending();
        self.process_line(line);
    }

    /// Emit whatever partial line is buffered.
    pub fn flush_pending(&mut self) {
        if !self.undecoded.is_empty() {
            let bytes = std::mem::take(&mut self.undecoded);
            self.pending.push_str(&String::from_utf8_lossy(&bytes));
        }
        if !self.pending.is_empty() {
            let tail = std::mem::take(&mut self.pending);
            self.process_line(&tail);
        }
    }

    pub fn into_sink(mut self) -> S {
        self.flush_pending();
        self.sink
    }

    fn process_line(&mut self, raw: &str) {
        let line = if self.strip_ansi {
            ANSI_ESCAPE.replace_all(raw, "")
        } else {
            raw.into()
        };

        if self.current == Severity::Info
            && let Some(severity @ (Severity::Error | Severity::Warn)) = Severity::detect(&line)
        {
            self.current = severity;
        }
        self.sink.emit(self.current, &line);
    }
}

impl<S: LogSink> io::Write for LogBridge<S> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.undecoded.extend_from_slice(buf);
        loop {
            match std::str::from_utf8(&self.undecoded) {
                Ok(text) => {
                    let text = text.to_owned();
                    self.undecoded.clear();
                    self.write_str(&text);
                    break;
                }
                Err(e) => {
                    // An incomplete trailing sequence waits for the next write.
                    let consumed = e.valid_up_to() + e.error_len().unwrap_or(0);
                    let bytes: Vec<u8> = self.undecoded.drain(..consumed).collect();
                    self.write_str(&String::from_utf8_lossy(&bytes));
                    if e.error_len().is_none() {
                        break;
                    }
                }
            }
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.flush_pending();
        Ok(())
    }
}

/// Whether the terminal can show ANSI colors.
///
/// Disabled by `NO_COLOR`, a missing or `dumb` `TERM`, or stderr not being
/// a terminal.
pub fn supports_ansi_colors() -> bool {
    colors_supported(
        std::env::var_os("NO_COLOR").is_some(),
        std::env::var("TERM").ok().as_deref(),
        io::stderr().is_terminal(),
    )
}

fn colors_supported(no_color: bool, term: Option<&str>, is_terminal: bool) -> bool {
    if no_color {
        return false;
    }
    match term {
        None | Some("dumb") => false,
        Some(_) => is_terminal,
    }
}

/// Relay a complete block of tool output through a fresh bridge into
/// `tracing`, stripping colors when they can't be shown.
pub fn relay_to_log(output: &str) {
    let mut bridge = LogBridge::new(TracingSink, !supports_ansi_colors());
    bridge.write_str(output);
    bridge.flush_pending();
}
