//! Structured diagnostics: messages, bundles, synthetic-location filtering, and
//! colorized rendering.
//!
//! This module has no dependency on the IR; it is usable for reporting errors from
//! an upstream tokenizer or parser as well as from the passes in [`crate::passes`].

use std::fmt;

/// 1-based line/column position in a source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Position {
    pub line: u32,
    pub column: u32,
}

impl Position {
    pub fn new(line: u32, column: u32) -> Self {
        Position { line, column }
    }
}

/// Span of source text, possibly flagged as inserted by a pass rather than present
/// in the user's source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SourceLocation {
    pub start: Position,
    pub end: Position,
    pub is_synthetic: bool,
}

impl SourceLocation {
    pub fn new(start: Position, end: Position) -> Self {
        SourceLocation {
            start,
            end,
            is_synthetic: false,
        }
    }

    /// A location with no real position, used for nodes inserted by desugaring.
    pub fn synthetic() -> Self {
        SourceLocation {
            start: Position::new(0, 0),
            end: Position::new(0, 0),
            is_synthetic: true,
        }
    }

    pub fn mark_synthetic(&mut self) {
        self.is_synthetic = true;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Error,
    Warning,
    Note,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
            Severity::Note => write!(f, "note"),
        }
    }
}

/// A single diagnostic: one file, one location, one severity, one piece of text.
/// `text` may contain embedded newlines; each line after the first renders with
/// the `note:` severity regardless of `severity`.
#[derive(Debug, Clone)]
pub struct Message {
    pub source_file: String,
    pub location: SourceLocation,
    pub severity: Severity,
    pub text: String,
}

impl Message {
    pub fn error(source_file: impl Into<String>, location: SourceLocation, text: impl Into<String>) -> Self {
        Message {
            source_file: source_file.into(),
            location,
            severity: Severity::Error,
            text: text.into(),
        }
    }

    pub fn warning(source_file: impl Into<String>, location: SourceLocation, text: impl Into<String>) -> Self {
        Message {
            source_file: source_file.into(),
            location,
            severity: Severity::Warning,
            text: text.into(),
        }
    }

    pub fn note(source_file: impl Into<String>, location: SourceLocation, text: impl Into<String>) -> Self {
        Message {
            source_file: source_file.into(),
            location,
            severity: Severity::Note,
            text: text.into(),
        }
    }

    pub fn is_synthetic(&self) -> bool {
        self.location.is_synthetic
    }
}

/// An ordered group of related messages: one primary message plus clarifying notes.
#[derive(Debug, Clone, Default)]
pub struct Bundle {
    pub messages: Vec<Message>,
}

impl Bundle {
    pub fn new(messages: Vec<Message>) -> Self {
        Bundle { messages }
    }

    pub fn single(message: Message) -> Self {
        Bundle { messages: vec![message] }
    }

    pub fn is_synthetic(&self) -> bool {
        self.messages.iter().any(Message::is_synthetic)
    }
}

/// Partitions bundles into (user-facing, synthetic). A bundle is synthetic iff any
/// message within it carries a synthetic location: a pass that reports a bug in a
/// compiler-inserted node should not surface it unless nothing else went wrong.
pub fn split_bundles(bundles: Vec<Bundle>) -> (Vec<Bundle>, Vec<Bundle>) {
    bundles.into_iter().partition(|b| !b.is_synthetic())
}

pub fn filter_user_bundles(bundles: Vec<Bundle>) -> Vec<Bundle> {
    split_bundles(bundles).0
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorMode {
    Always,
    Never,
    IfTty,
}

/// ANSI escapes, matching the eight-color-plus-bright palette used by `error.py`.
mod ansi {
    pub const RESET: &str = "\x1b[0m";
    pub const BOLD: &str = "\x1b[1m";
    pub const RED: &str = "\x1b[31m";
    pub const BRIGHT_RED: &str = "\x1b[91m";
    pub const YELLOW: &str = "\x1b[33m";
    pub const CYAN: &str = "\x1b[36m";
}

fn severity_color(severity: Severity) -> &'static str {
    match severity {
        Severity::Error => ansi::BRIGHT_RED,
        Severity::Warning => ansi::YELLOW,
        Severity::Note => ansi::CYAN,
    }
}

/// Renders a single message as one or more lines of text, optionally colorized.
///
/// Format: `<file>:<line>:<col>: <severity>: <text>` for the first line of `text`;
/// subsequent lines of a multi-line `text` render with the `note` severity label
/// regardless of the message's own severity. Synthetic locations print the literal
/// `[compiler bug]` token in place of `<line>:<col>`.
pub fn render_message(message: &Message, source_line: Option<&str>, color: bool) -> String {
    let mut out = String::new();
    let position = if message.location.is_synthetic {
        "[compiler bug]".to_string()
    } else {
        format!("{}:{}", message.location.start.line, message.location.start.column)
    };

    for (index, line_text) in message.text.split('\n').enumerate() {
        let severity = if index == 0 { message.severity } else { Severity::Note };
        if color {
            out.push_str(ansi::BOLD);
            out.push_str(&format!("{}:{}: ", message.source_file, position));
            out.push_str(ansi::RESET);
            out.push_str(severity_color(severity));
            out.push_str(&format!("{}: ", severity));
            out.push_str(ansi::RESET);
            out.push_str(line_text);
        } else {
            out.push_str(&format!("{}:{}: {}: {}", message.source_file, position, severity, line_text));
        }
        out.push('\n');
    }

    if let Some(line) = source_line {
        if !message.location.is_synthetic {
            out.push_str(line);
            out.push('\n');
            out.push_str(&caret_underline(message, line, color));
            out.push('\n');
        }
    }
    out
}

fn caret_underline(message: &Message, source_line: &str, color: bool) -> String {
    let start_col = message.location.start.column.saturating_sub(1) as usize;
    let width = if message.location.start.line == message.location.end.line {
        (message.location.end.column.saturating_sub(message.location.start.column)).max(1) as usize
    } else {
        source_line.len().saturating_sub(start_col).max(1)
    };
    let mut out = String::new();
    out.push_str(&" ".repeat(start_col));
    if color {
        out.push_str(severity_color(message.severity));
    }
    out.push_str(&"^".repeat(width));
    if color {
        out.push_str(ansi::RESET);
    }
    out
}

/// Renders every message in every bundle, in order, joined with blank lines between
/// bundles.
pub fn format_bundles(bundles: &[Bundle], source_lines: impl Fn(&str, u32) -> Option<String>, color: bool) -> String {
    let mut out = String::new();
    for bundle in bundles {
        for message in &bundle.messages {
            let line = source_lines(&message.source_file, message.location.start.line);
            out.push_str(&render_message(message, line.as_deref(), color));
        }
        out.push('\n');
    }
    out
}

pub fn should_colorize(mode: ColorMode, stdout_is_tty: bool) -> bool {
    match mode {
        ColorMode::Always => true,
        ColorMode::Never => false,
        ColorMode::IfTty => stdout_is_tty,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loc(l1: u32, c1: u32, l2: u32, c2: u32) -> SourceLocation {
        SourceLocation::new(Position::new(l1, c1), Position::new(l2, c2))
    }

    #[test]
    fn synthetic_bundle_is_filtered() {
        let bundles = vec![
            Bundle::single(Message::error("a.emb", loc(1, 1, 1, 2), "real error")),
            Bundle::single(Message::error("a.emb", SourceLocation::synthetic(), "compiler bug")),
        ];
        let (user, synthetic) = split_bundles(bundles);
        assert_eq!(user.len(), 1);
        assert_eq!(synthetic.len(), 1);
    }

    #[test]
    fn bundle_with_any_synthetic_message_is_synthetic() {
        let bundle = Bundle::new(vec![
            Message::error("a.emb", loc(1, 1, 1, 2), "primary"),
            Message::note("a.emb", SourceLocation::synthetic(), "inserted note"),
        ]);
        assert!(bundle.is_synthetic());
    }

    #[test]
    fn render_uses_compiler_bug_marker_for_synthetic_locations() {
        let message = Message::error("a.emb", SourceLocation::synthetic(), "oops");
        let rendered = render_message(&message, None, false);
        assert!(rendered.contains("[compiler bug]"));
    }
}
