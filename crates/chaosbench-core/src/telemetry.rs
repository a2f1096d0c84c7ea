//! Live progress over the OSC 633 terminal-decoration protocol.
//!
//! Sequence shape: `ESC ] 633 ; <code> [ ; <value> ] BEL`
//!
//! | code | meaning                                      |
//! |------|----------------------------------------------|
//! | `A`  | a logical unit of work starts                |
//! | `B`  | the unit ends                                |
//! | `P`  | `Key=Value` property (`ChaosMode=enabled`, …) |
//! | `D`  | completion with a process-style exit code    |
//!
//! Decoration is a side-effecting capability injected as a [`TelemetrySink`].
//! [`for_stdout`] picks the ANSI sink only for an interactive terminal and the
//! no-op sink otherwise, so nothing in the core checks terminal-ness itself.
//! Sinks never fail: write errors are dropped.

use std::fmt::Write as _;
use std::io::{self, IsTerminal, Write};

use crossterm::style::Stylize;

const OSC: &str = "\x1b]633;";
const BEL: char = '\x07';

/// Noise classification against the entropy threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntropyState {
    /// |noise| below the threshold.
    Stable,
    /// |noise| at or above the threshold.
    Warning,
}

impl EntropyState {
    pub fn classify(noise: f64, threshold: f64) -> Self {
        if noise.abs() < threshold {
            Self::Stable
        } else {
            Self::Warning
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Stable => "stable",
            Self::Warning => "warning",
        }
    }
}

impl std::fmt::Display for EntropyState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One protocol event.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Marker<'a> {
    UnitStart,
    UnitEnd,
    Property { key: &'a str, value: &'a str },
    Done(i32),
}

/// Encode a marker as a complete escape sequence.
pub fn encode(marker: Marker<'_>) -> String {
    let mut out = String::from(OSC);
    match marker {
        Marker::UnitStart => out.push('A'),
        Marker::UnitEnd => out.push('B'),
        Marker::Property { key, value } => {
            out.push_str("P;");
            escape_into(&mut out, key);
            out.push('=');
            escape_into(&mut out, value);
        }
        Marker::Done(code) => {
            let _ = write!(out, "D;{code}");
        }
    }
    out.push(BEL);
    out
}

/// Escape `\`, `;` and control characters so a value cannot terminate or
/// split the sequence.
fn escape_into(out: &mut String, raw: &str) {
    for c in raw.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            ';' => out.push_str("\\x3b"),
            c if c.is_control() && (c as u32) < 0x100 => {
                let _ = write!(out, "\\x{:02x}", c as u32);
            }
            c => out.push(c),
        }
    }
}

/// Consumer of lifecycle events.
pub trait TelemetrySink {
    fn emit(&mut self, marker: Marker<'_>);

    /// Coloured one-line status glyph for a finished unit.
    fn status(&mut self, ok: bool, detail: &str);

    fn unit_start(&mut self) {
        self.emit(Marker::UnitStart);
    }

    fn unit_end(&mut self) {
        self.emit(Marker::UnitEnd);
    }

    fn property(&mut self, key: &str, value: &str) {
        self.emit(Marker::Property { key, value });
    }

    fn done(&mut self, exit_code: i32) {
        self.emit(Marker::Done(exit_code));
    }
}

/// Writes escape sequences and coloured glyphs to any writer.
pub struct AnsiTelemetry<W: Write> {
    out: W,
}

impl<W: Write> AnsiTelemetry<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> TelemetrySink for AnsiTelemetry<W> {
    fn emit(&mut self, marker: Marker<'_>) {
        let _ = self.out.write_all(encode(marker).as_bytes());
        let _ = self.out.flush();
    }

    fn status(&mut self, ok: bool, detail: &str) {
        let line = if ok {
            format!("  {} {detail}\n", "✓".green())
        } else {
            format!("  {} {detail}\n", "✗".red())
        };
        let _ = self.out.write_all(line.as_bytes());
        let _ = self.out.flush();
    }
}

/// Discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopTelemetry;

impl TelemetrySink for NoopTelemetry {
    fn emit(&mut self, _marker: Marker<'_>) {}

    fn status(&mut self, _ok: bool, _detail: &str) {}
}

/// ANSI sink on stdout when it is a terminal, no-op otherwise.
pub fn for_stdout() -> Box<dyn TelemetrySink> {
    if io::stdout().is_terminal() {
        Box::new(AnsiTelemetry::new(io::stdout()))
    } else {
        Box::new(NoopTelemetry)
    }
}

/// `enabled` / `disabled` property value.
pub fn toggle(flag: bool) -> &'static str {
    if flag { "enabled" } else { "disabled" }
}
