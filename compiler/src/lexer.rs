// Lexer for Snare .x hook source files.
//
// Tokenizes host-language source with the `logos` crate. Comments are lexed as
// ordinary tokens and then split off into a separate trivia list so directive
// attachment can ask "which comments sit between these two tokens".
//
// Preconditions: input is valid UTF-8.
// Postconditions: returns significant tokens and comments with byte-offset spans,
//   both sorted by start offset, plus any lex errors.
// Failure modes: unrecognized characters produce `LexError`; lexing continues.
// Side effects: none.

use logos::Logos;
use std::fmt;

/// Byte-offset span in source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

/// A lexer error with location.
#[derive(Debug, Clone, PartialEq)]
pub struct LexError {
    pub span: Span,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommentKind {
    Line,
    Block,
}

/// A comment recovered from the token stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Comment {
    pub kind: CommentKind,
    pub span: Span,
}

impl Comment {
    /// Comment text with its delimiters stripped and surrounding whitespace trimmed.
    pub fn body<'a>(&self, source: &'a str) -> &'a str {
        let raw = &source[self.span.start..self.span.end];
        let inner = match self.kind {
            CommentKind::Line => raw.strip_prefix("//").unwrap_or(raw),
            CommentKind::Block => raw
                .strip_prefix("/*")
                .and_then(|s| s.strip_suffix("*/"))
                .unwrap_or(raw),
        };
        inner.trim()
    }
}

/// Result of lexing: tokens and comments plus any errors (non-fatal).
#[derive(Debug)]
pub struct LexResult {
    pub tokens: Vec<(Token, Span)>,
    pub comments: Vec<Comment>,
    pub errors: Vec<LexError>,
}

/// Host-language token types.
///
/// Only the keywords the classifier cares about are distinguished; every
/// other word (modifiers included) is an `Ident` and is recognized by text.
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r\n\f]+")]
pub enum Token {
    // ── Keywords ──
    #[token("import")]
    Import,
    #[token("class")]
    Class,
    #[token("struct")]
    Struct,
    #[token("enum")]
    Enum,
    #[token("extension")]
    Extension,
    #[token("func")]
    Func,
    #[token("where")]
    Where,

    // ── Delimiters ──
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,

    // ── Symbols ──
    #[token("<")]
    Lt,
    #[token(">")]
    Gt,
    #[token(",")]
    Comma,
    #[token(":")]
    Colon,
    #[token(";")]
    Semicolon,
    #[token(".", priority = 3)]
    Dot,
    #[token("@")]
    At,
    #[token("#")]
    Hash,
    #[token("->")]
    Arrow,
    #[token("=", priority = 3)]
    Eq,
    #[token("?", priority = 3)]
    Question,
    #[token("!", priority = 3)]
    Bang,
    #[token("\\")]
    Backslash,

    /// Any other operator run. `<` and `>` are excluded so generic argument
    /// lists always close with a single `Gt`.
    #[regex(r"[-+*/%=!&|^~?.]+")]
    Operator,

    // ── Literals ──
    #[regex(r#""([^"\\\n]|\\.)*""#)]
    StringLit,
    #[regex(r"[0-9][0-9a-zA-Z_]*(\.[0-9][0-9a-zA-Z_]*)?")]
    Number,

    // ── Identifier ──
    // Keyword tokens above take priority over this regex for the same length.
    #[regex(r"[a-zA-Z_][a-zA-Z0-9_]*")]
    #[regex(r"`[a-zA-Z_][a-zA-Z0-9_]*`")]
    #[regex(r"\$[a-zA-Z0-9_]+")]
    Ident,

    // ── Comments (moved to trivia by `lex`) ──
    #[regex(r"//[^\n]*", allow_greedy = true)]
    LineComment,
    #[regex(r"/\*([^*]|\*+[^*/])*\*+/")]
    BlockComment,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Import => write!(f, "'import'"),
            Token::Class => write!(f, "'class'"),
            Token::Struct => write!(f, "'struct'"),
            Token::Enum => write!(f, "'enum'"),
            Token::Extension => write!(f, "'extension'"),
            Token::Func => write!(f, "'func'"),
            Token::Where => write!(f, "'where'"),
            Token::LBrace => write!(f, "'{{'"),
            Token::RBrace => write!(f, "'}}'"),
            Token::LParen => write!(f, "'('"),
            Token::RParen => write!(f, "')'"),
            Token::LBracket => write!(f, "'['"),
            Token::RBracket => write!(f, "']'"),
            Token::Lt => write!(f, "'<'"),
            Token::Gt => write!(f, "'>'"),
            Token::Comma => write!(f, "','"),
            Token::Colon => write!(f, "':'"),
            Token::Semicolon => write!(f, "';'"),
            Token::Dot => write!(f, "'.'"),
            Token::At => write!(f, "'@'"),
            Token::Hash => write!(f, "'#'"),
            Token::Arrow => write!(f, "'->'"),
            Token::Eq => write!(f, "'='"),
            Token::Question => write!(f, "'?'"),
            Token::Bang => write!(f, "'!'"),
            Token::Backslash => write!(f, "'\\'"),
            Token::Operator => write!(f, "<operator>"),
            Token::StringLit => write!(f, "<string>"),
            Token::Number => write!(f, "<number>"),
            Token::Ident => write!(f, "<ident>"),
            Token::LineComment | Token::BlockComment => write!(f, "<comment>"),
        }
    }
}

// ── Public API ──

/// Lex a source string into significant tokens and comments.
///
/// Lexing is non-fatal: errors are collected and the lexer continues past
/// bad characters.
pub fn lex(source: &str) -> LexResult {
    let lexer = Token::lexer(source);
    let mut tokens = Vec::new();
    let mut comments = Vec::new();
    let mut errors = Vec::new();

    for (result, range) in lexer.spanned() {
        let span = Span {
            start: range.start,
            end: range.end,
        };
        match result {
            Ok(Token::LineComment) => comments.push(Comment {
                kind: CommentKind::Line,
                span,
            }),
            Ok(Token::BlockComment) => comments.push(Comment {
                kind: CommentKind::Block,
                span,
            }),
            Ok(token) => tokens.push((token, span)),
            Err(()) => errors.push(LexError {
                span,
                message: format!("unexpected character: {:?}", &source[span.start..span.end]),
            }),
        }
    }

    LexResult {
        tokens,
        comments,
        errors,
    }
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    /// Helper: lex and assert no errors, return token list.
    fn lex_ok(source: &str) -> Vec<Token> {
        let result = lex(source);
        assert!(
            result.errors.is_empty(),
            "unexpected lex errors: {:?}",
            result.errors
        );
        result.tokens.into_iter().map(|(t, _)| t).collect()
    }

    // ── Keywords ──

    #[test]
    fn keywords() {
        let tokens = lex_ok("import class struct enum extension func where");
        assert_eq!(
            tokens,
            vec![
                Token::Import,
                Token::Class,
                Token::Struct,
                Token::Enum,
                Token::Extension,
                Token::Func,
                Token::Where,
            ]
        );
    }

    #[test]
    fn modifiers_are_identifiers() {
        let tokens = lex_ok("private fileprivate final static override");
        assert_eq!(tokens, vec![Token::Ident; 5]);
    }

    #[test]
    fn keyword_prefix_is_identifier() {
        assert_eq!(lex_ok("classes funcs"), vec![Token::Ident, Token::Ident]);
    }

    #[test]
    fn backtick_and_dollar_identifiers() {
        assert_eq!(lex_ok("`init` $0"), vec![Token::Ident, Token::Ident]);
    }

    // ── Symbols ──

    #[test]
    fn arrow_and_generics() {
        let tokens = lex_ok("ClassHook<Dictionary<String, Int>> -> Void");
        assert_eq!(
            tokens,
            vec![
                Token::Ident,
                Token::Lt,
                Token::Ident,
                Token::Lt,
                Token::Ident,
                Token::Comma,
                Token::Ident,
                Token::Gt,
                Token::Gt,
                Token::Arrow,
                Token::Ident,
            ]
        );
    }

    #[test]
    fn operator_runs() {
        assert_eq!(
            lex_ok("a == b ?? c"),
            vec![
                Token::Ident,
                Token::Operator,
                Token::Ident,
                Token::Operator,
                Token::Ident
            ]
        );
        assert_eq!(lex_ok("x = y"), vec![Token::Ident, Token::Eq, Token::Ident]);
    }

    #[test]
    fn string_literal_with_escapes() {
        assert_eq!(
            lex_ok(r#"let s = "a \"quoted\" \(x)""#),
            vec![Token::Ident, Token::Ident, Token::Eq, Token::StringLit]
        );
    }

    // ── Comments ──

    #[test]
    fn comments_move_to_trivia() {
        let source = "// snare:new\nfunc /* inline */ foo()";
        let result = lex(source);
        assert!(result.errors.is_empty());
        let kinds: Vec<Token> = result.tokens.iter().map(|(t, _)| t.clone()).collect();
        assert_eq!(
            kinds,
            vec![Token::Func, Token::Ident, Token::LParen, Token::RParen]
        );
        assert_eq!(result.comments.len(), 2);
        assert_eq!(result.comments[0].kind, CommentKind::Line);
        assert_eq!(result.comments[0].body(source), "snare:new");
        assert_eq!(result.comments[1].kind, CommentKind::Block);
        assert_eq!(result.comments[1].body(source), "inline");
    }

    #[test]
    fn block_comment_with_stars() {
        let source = "/** doc ** comment */ x";
        let result = lex(source);
        assert!(result.errors.is_empty());
        assert_eq!(result.comments.len(), 1);
        assert_eq!(result.comments[0].body(source), "* doc ** comment");
        assert_eq!(result.tokens.len(), 1);
    }

    #[test]
    fn division_is_not_a_comment() {
        let result = lex("a / b");
        assert!(result.comments.is_empty());
        assert_eq!(result.tokens.len(), 3);
    }

    // ── Spans ──

    #[test]
    fn spans_are_byte_offsets() {
        let result = lex("class  Foo");
        assert_eq!(result.tokens[0].1, Span { start: 0, end: 5 });
        assert_eq!(result.tokens[1].1, Span { start: 7, end: 10 });
    }

    // ── Errors ──

    #[test]
    fn unexpected_character_is_recoverable() {
        let result = lex("a ☃ b");
        let kinds: Vec<Token> = result.tokens.iter().map(|(t, _)| t.clone()).collect();
        assert_eq!(kinds, vec![Token::Ident, Token::Ident]);
        assert!(!result.errors.is_empty());
        assert!(result.errors[0].message.contains("unexpected character"));
    }
}
