// source.rs — Source units and position lookup
//
// A `SourceUnit` is one input file: its text, its parsed syntax, and a line
// table for turning byte offsets into line/column pairs.
//
// Preconditions: text is valid UTF-8.
// Postconditions: a unit is immutable after `SourceUnit::parse` returns.
// Failure modes: syntax errors are stored in the parse result, not raised.
// Side effects: none.

use std::sync::Arc;

use serde::Serialize;

use crate::id::FileId;
use crate::lexer::Comment;
use crate::parser::{self, ParseResult};

// ── Locations ────────────────────────────────────────────────────────────

/// A resolved position in a named source unit. Lines and columns are 1-based;
/// columns count characters, not bytes.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct SourceLocation {
    pub file: Arc<str>,
    pub offset: usize,
    pub line: u32,
    pub column: u32,
}

// ── Line table ───────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct LineIndex {
    line_starts: Vec<usize>,
}

impl LineIndex {
    pub fn new(text: &str) -> Self {
        let mut line_starts = vec![0];
        line_starts.extend(
            text.bytes()
                .enumerate()
                .filter(|(_, b)| *b == b'\n')
                .map(|(i, _)| i + 1),
        );
        Self { line_starts }
    }

    /// Line and column (both 1-based) of `offset` in `text`.
    pub fn line_col(&self, text: &str, offset: usize) -> (u32, u32) {
        let offset = offset.min(text.len());
        let line = self.line_starts.partition_point(|&start| start <= offset) - 1;
        let start = self.line_starts[line];
        let column = text
            .get(start..offset)
            .map(|prefix| prefix.chars().count())
            .unwrap_or(offset - start);
        (line as u32 + 1, column as u32 + 1)
    }

    /// Text of 1-based `line` without its line terminator.
    pub fn line_text<'a>(&self, text: &'a str, line: u32) -> Option<&'a str> {
        let index = (line as usize).checked_sub(1)?;
        let start = *self.line_starts.get(index)?;
        let end = self
            .line_starts
            .get(index + 1)
            .map(|next| next - 1)
            .unwrap_or(text.len());
        text.get(start..end).map(|l| l.trim_end_matches('\r'))
    }
}

// ── Source unit ──────────────────────────────────────────────────────────

#[derive(Debug)]
pub struct SourceUnit {
    pub id: FileId,
    pub name: Arc<str>,
    pub text: String,
    lines: LineIndex,
    syntax: ParseResult,
}

impl SourceUnit {
    /// Lex and parse `text`, keeping the result alongside the line table.
    pub fn parse(id: FileId, name: impl Into<Arc<str>>, text: String) -> Self {
        let lines = LineIndex::new(&text);
        let syntax = parser::parse(&text);
        Self {
            id,
            name: name.into(),
            text,
            lines,
            syntax,
        }
    }

    pub fn syntax(&self) -> &ParseResult {
        &self.syntax
    }

    pub fn location(&self, offset: usize) -> SourceLocation {
        let (line, column) = self.lines.line_col(&self.text, offset);
        SourceLocation {
            file: Arc::clone(&self.name),
            offset,
            line,
            column,
        }
    }

    pub fn line_text(&self, line: u32) -> Option<&str> {
        self.lines.line_text(&self.text, line)
    }

    /// Comments between the end of the last significant token before `offset`
    /// and `offset` itself: the trailing commentary of the previous token plus
    /// the leading commentary of the token starting at `offset`.
    pub fn comments_before(&self, offset: usize) -> &[Comment] {
        let tokens = &self.syntax.token_spans;
        let comments = &self.syntax.comments;
        let index = tokens.partition_point(|span| span.start < offset);
        let prev_end = match index {
            0 => 0,
            i => tokens[i - 1].end,
        };
        let lo = comments.partition_point(|c| c.span.start < prev_end);
        let hi = comments.partition_point(|c| c.span.start < offset);
        &comments[lo..hi.max(lo)]
    }

    /// Comments before the first significant token (all comments if there are
    /// no tokens).
    pub fn leading_comments(&self) -> &[Comment] {
        match self.syntax.token_spans.first() {
            Some(first) => self.comments_before(first.start),
            None => &self.syntax.comments,
        }
    }

    pub fn comments(&self) -> &[Comment] {
        &self.syntax.comments
    }
}
