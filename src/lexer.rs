// SPDX-FileCopyrightText: 2025 Robin Vobruba <hoijui.quaero@gmail.com>
//
// SPDX-License-Identifier: Apache-2.0

//! Hand-instrumented tokenizer built on top of [`logos`]'s generated DFA.
//!
//! Unlike a typical `logos` lexer we do not skip horizontal whitespace
//! silently: the node model needs every token's exact leading spacing, so
//! we recover the skipped text from the gap between consecutive spans and
//! carry it along as [`RawToken::spacing_before`].

use logos::Logos;

use crate::node::Position;

#[derive(Logos, Debug, Clone, PartialEq, Eq)]
#[logos(skip r"[ \t]+")]
pub enum Lex<'src> {
    #[regex(r"\d{4}[-/]\d{2}[-/]\d{2}")]
    Date(&'src str),

    #[regex(r"\d(\d|,\d)*(\.\d+)?")]
    Number(&'src str),

    #[regex(r#""([^"\\]|\\.)*""#)]
    String(&'src str),

    #[regex(r"(Assets|Liabilities|Equity|Income|Expenses)(:[A-Za-z0-9][A-Za-z0-9-]*)+")]
    Account(&'src str),

    #[regex(r"[A-Z][A-Z0-9'._-]+")]
    Currency(&'src str),

    #[regex(r"#[a-zA-Z0-9-_/.]+")]
    Tag(&'src str),

    #[regex(r"\^[a-zA-Z0-9-_/.]+")]
    Link(&'src str),

    #[token("txn")]
    Txn,
    #[token("balance")]
    Balance,
    #[token("open")]
    Open,
    #[token("close")]
    Close,
    #[token("commodity")]
    Commodity,
    #[token("pad")]
    Pad,
    #[token("event")]
    Event,
    #[token("query")]
    Query,
    #[token("note")]
    Note,
    #[token("document")]
    Document,
    #[token("price")]
    Price,
    #[token("custom")]
    Custom,
    #[token("option")]
    OptionKw,
    #[token("include")]
    Include,
    #[token("plugin")]
    Plugin,
    #[token("pushtag")]
    Pushtag,
    #[token("poptag")]
    Poptag,
    #[token("pushmeta")]
    Pushmeta,
    #[token("popmeta")]
    Popmeta,

    #[token("{{")]
    LDoubleBrace,
    #[token("}}")]
    RDoubleBrace,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("@@")]
    AtAt,
    #[token("@")]
    At,
    #[token(":")]
    Colon,
    #[token(",")]
    Comma,
    #[token("~")]
    Tilde,
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,

    #[token("!")]
    Pending,
    #[regex(r"[PSTCURM?%&]")]
    Flag(&'src str),

    #[regex(r"\r?\n")]
    Newline,

    #[regex(r";[^\n\r]*")]
    Comment(&'src str),

    #[regex(r"[a-z][a-z0-9_-]*:")]
    MetaKey(&'src str),
}

/// A raw, un-dispatched token plus position/spacing information, ready to
/// be consumed by [`crate::parser`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawToken {
    pub kind: RawKind,
    pub text: String,
    pub spacing_before: String,
    pub position: Position,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawKind {
    Date,
    Number,
    String,
    Account,
    Currency,
    Tag,
    Link,
    Keyword,
    LDoubleBrace,
    RDoubleBrace,
    LBrace,
    RBrace,
    LParen,
    RParen,
    AtAt,
    At,
    Colon,
    Comma,
    Tilde,
    Plus,
    Minus,
    Star,
    Slash,
    Flag,
    Newline,
    Comment,
    MetaKey,
    /// Lexer could not classify this slice; surfaced as a parse error.
    Error,
    /// Synthetic end-of-file marker carrying any trailing whitespace.
    Eof,
}

fn classify(tok: &Lex<'_>) -> RawKind {
    match tok {
        Lex::Date(_) => RawKind::Date,
        Lex::Number(_) => RawKind::Number,
        Lex::String(_) => RawKind::String,
        Lex::Account(_) => RawKind::Account,
        Lex::Currency(_) => RawKind::Currency,
        Lex::Tag(_) => RawKind::Tag,
        Lex::Link(_) => RawKind::Link,
        Lex::Txn
        | Lex::Balance
        | Lex::Open
        | Lex::Close
        | Lex::Commodity
        | Lex::Pad
        | Lex::Event
        | Lex::Query
        | Lex::Note
        | Lex::Document
        | Lex::Price
        | Lex::Custom
        | Lex::OptionKw
        | Lex::Include
        | Lex::Plugin
        | Lex::Pushtag
        | Lex::Poptag
        | Lex::Pushmeta
        | Lex::Popmeta => RawKind::Keyword,
        Lex::LDoubleBrace => RawKind::LDoubleBrace,
        Lex::RDoubleBrace => RawKind::RDoubleBrace,
        Lex::LBrace => RawKind::LBrace,
        Lex::RBrace => RawKind::RBrace,
        Lex::LParen => RawKind::LParen,
        Lex::RParen => RawKind::RParen,
        Lex::AtAt => RawKind::AtAt,
        Lex::At => RawKind::At,
        Lex::Colon => RawKind::Colon,
        Lex::Comma => RawKind::Comma,
        Lex::Tilde => RawKind::Tilde,
        Lex::Plus => RawKind::Plus,
        Lex::Minus => RawKind::Minus,
        Lex::Star => RawKind::Star,
        Lex::Slash => RawKind::Slash,
        Lex::Pending | Lex::Flag(_) => RawKind::Flag,
        Lex::Newline => RawKind::Newline,
        Lex::Comment(_) => RawKind::Comment,
        Lex::MetaKey(_) => RawKind::MetaKey,
    }
}

fn advance_cursor(source: &str, from: usize, to: usize, line: &mut usize, column: &mut usize) {
    for ch in source.get(from..to).unwrap_or_default().chars() {
        if ch == '\n' {
            *line += 1;
            *column = 0;
        } else {
            *column += 1;
        }
    }
}

/// Tokenizes `source` into a flat stream including a trailing
/// [`RawKind::Eof`] sentinel whose `spacing_before` carries any trailing
/// whitespace after the last real token.
#[must_use]
pub fn tokenize(source: &str) -> Vec<RawToken> {
    let mut out = Vec::new();
    let mut lexer = Lex::lexer(source);
    let mut last_end = 0usize;
    let mut line = 0usize;
    let mut column = 0usize;

    while let Some(result) = lexer.next() {
        let span = lexer.span();
        let spacing_before = source
            .get(last_end..span.start)
            .unwrap_or_default()
            .to_string();
        advance_cursor(source, last_end, span.start, &mut line, &mut column);
        let position = Position { line, column };
        let text = source.get(span.start..span.end).unwrap_or_default().to_string();
        let kind = match &result {
            Ok(tok) => classify(tok),
            Err(()) => RawKind::Error,
        };
        out.push(RawToken {
            kind,
            text,
            spacing_before,
            position,
        });
        advance_cursor(source, span.start, span.end, &mut line, &mut column);
        last_end = span.end;
    }

    let trailing = source.get(last_end..).unwrap_or_default().to_string();
    out.push(RawToken {
        kind: RawKind::Eof,
        text: String::new(),
        spacing_before: trailing,
        position: Position { line, column },
    });
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenize_balance_line() {
        let tokens = tokenize("2000-01-01 balance Assets:Foo 1.23 USD\n");
        let kinds: Vec<_> = tokens.iter().map(|t| t.kind).collect();
        assert_eq!(
            kinds,
            vec![
                RawKind::Date,
                RawKind::Keyword,
                RawKind::Account,
                RawKind::Number,
                RawKind::Currency,
                RawKind::Newline,
                RawKind::Eof,
            ]
        );
        assert_eq!(tokens[2].spacing_before, " ");
        assert_eq!(tokens[2].position.column, 19);
    }

    #[test]
    fn tokenize_preserves_extra_spacing() {
        let tokens = tokenize("2000-01-01      balance\tAssets:Foo  1.23   USD");
        assert_eq!(tokens[1].spacing_before, "      ");
        assert_eq!(tokens[2].spacing_before, "\t");
    }
}
