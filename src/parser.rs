// SPDX-FileCopyrightText: 2025 Robin Vobruba <hoijui.quaero@gmail.com>
//
// SPDX-License-Identifier: Apache-2.0

//! Recursive-descent parser building the [`crate::node`] tree straight
//! from the token stream in [`crate::lexer`].
//!
//! Tree shapes, by [`NodeKind`], named children used throughout
//! [`crate::format`], [`crate::sorting`] and [`crate::time`]:
//!
//! - `File`: repeated `"entity"` (one of the directive kinds or
//!   `BlockComment`), each followed by its own `"eol"`.
//! - Every dated directive: `"date"`, `"keyword"`, directive-specific
//!   payload fields, `"inline_comment"` (may be [`Node::Missing`]),
//!   `"eol"`, repeated `"meta"` (only `Transaction`).
//! - `Transaction`: `"date"`, `"flag"`, `"payee"`, `"narration"`,
//!   repeated `"tag"`, repeated `"link"`, `"inline_comment"`, `"eol"`,
//!   repeated `"body"` (each a `MetaItem` or `Posting`, `indented`).
//! - `Posting`: `"indent"`, `"flag"`, `"account"`, `"number"`,
//!   `"currency"`, `"cost"`, `"price"`, `"inline_comment"`, `"eol"`,
//!   repeated `"meta"` (indented).
//! - `MetaItem`: `"indent"`, `"key"`, `"value"`, `"inline_comment"`, `"eol"`.
//! - `UnitCost`/`TotalCost`: `"open"`, repeated `"component"`, `"close"`.
//! - `NumberExpr` → `NumberAddExpr` → `NumberMulExpr` → `NumberUnaryExpr`
//!   → `NumberParenExpr` | `Number` token, standard precedence climbing
//!   tree, each level storing repeated `"operand"`/`"op"` pairs.

use thiserror::Error;

use crate::decoders::parse_decimal;
use crate::lexer::{tokenize, RawKind, RawToken};
use crate::node::{Child, Node, NodeKind, Position, Token, Tree};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("unexpected end of input at line {0}")]
    UnexpectedEof(usize),

    #[error("unrecognized input at line {}, column {}: {:?}", .position.line + 1, .position.column, .text)]
    LexError { position: Position, text: String },

    #[error("expected {expected} at line {}, column {}, found {found:?}", .position.line + 1, .position.column)]
    UnexpectedToken {
        expected: &'static str,
        found: String,
        position: Position,
    },

    #[error("malformed number at line {}, column {}: {:?}", .position.line + 1, .position.column, .text)]
    InvalidNumber { position: Position, text: String },
}

/// Entry point: parse a whole ledger file into a `File` tree.
pub fn parse(source: &str) -> Result<Node, ParseError> {
    let raw = tokenize(source);
    let mut cursor = Cursor::new(&raw);
    cursor.parse_file()
}

/// Re-parse a single formatted line back into the same directive shape,
/// recovering accurate post-formatting column positions from it. `kind`
/// selects which directive grammar to apply. `format.rs`'s [`crate::format::Writer`]
/// tracks columns directly while emitting instead of calling this (see
/// `DESIGN.md`); kept as a public parser entry point and exercised by its
/// own test, since a reformatted single line re-parsing to the same shape
/// is itself a property worth having checked.
pub fn reparse_as(text: &str, kind: NodeKind) -> Result<Node, ParseError> {
    let raw = tokenize(text);
    let mut cursor = Cursor::new(&raw);
    cursor.parse_directive_of_kind(kind)
}

struct Cursor<'t> {
    tokens: &'t [RawToken],
    pos: usize,
}

impl<'t> Cursor<'t> {
    const fn new(tokens: &'t [RawToken]) -> Self {
        Self { tokens, pos: 0 }
    }

    fn peek(&self) -> &'t RawToken {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek_kind(&self) -> RawKind {
        self.peek().kind
    }

    fn bump(&mut self) -> RawToken {
        let tok = self.tokens[self.pos.min(self.tokens.len() - 1)].clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        tok
    }

    fn at_eof(&self) -> bool {
        matches!(self.peek_kind(), RawKind::Eof)
    }

    fn skip_newlines(&mut self) {
        while matches!(self.peek_kind(), RawKind::Newline) {
            self.bump();
        }
    }

    /// Like [`Self::skip_newlines`], but returns whether it consumed two or
    /// more, i.e. whether a user-authored blank line separated whatever
    /// came before from whatever comes next.
    fn skip_newlines_counting_blank(&mut self) -> bool {
        let mut count = 0usize;
        while matches!(self.peek_kind(), RawKind::Newline) {
            self.bump();
            count += 1;
        }
        count >= 2
    }

    fn text_is(&self, text: &str) -> bool {
        self.peek().text == text
    }

    fn expect(&mut self, kind: RawKind, expected: &'static str) -> Result<RawToken, ParseError> {
        if self.peek_kind() == kind {
            Ok(self.bump())
        } else if self.peek_kind() == RawKind::Error {
            let t = self.peek().clone();
            Err(ParseError::LexError {
                position: t.position,
                text: t.text,
            })
        } else {
            let t = self.peek();
            Err(ParseError::UnexpectedToken {
                expected,
                found: t.text.clone(),
                position: t.position,
            })
        }
    }

    fn token_node(raw: &RawToken, kind: NodeKind) -> Node {
        Node::Token(Token {
            kind,
            text: raw.text.clone(),
            spacing_before: raw.spacing_before.clone(),
            position: raw.position,
        })
    }

    /// Consumes an inline comment if one directly precedes the next
    /// newline/eof, returning [`Node::Missing`] otherwise.
    fn take_inline_comment(&mut self) -> Node {
        if self.peek_kind() == RawKind::Comment {
            let raw = self.bump();
            Self::token_node(&raw, NodeKind::InlineComment)
        } else {
            Node::Missing
        }
    }

    /// Consumes the end-of-line marker: the `Newline` token if present, or
    /// a zero-width sentinel at EOF. Represented as an `Eol` token so
    /// alignment's "drain through Eol" framing has something concrete to
    /// drain to.
    fn take_eol(&mut self) -> Node {
        if self.peek_kind() == RawKind::Newline {
            let raw = self.bump();
            Self::token_node(&raw, NodeKind::Eol)
        } else {
            Node::Token(Token::new(NodeKind::Eol, String::new()))
        }
    }

    fn parse_file(&mut self) -> Result<Node, ParseError> {
        let mut tree = Tree::new(NodeKind::File);
        self.skip_newlines();
        while !self.at_eof() {
            let entity = self.parse_top_level_entity()?;
            let blank_after = self.skip_newlines_counting_blank();
            tree.children.push(Child::new("entity", entity).with_blank_after(blank_after));
        }
        Ok(Node::Tree(Box::new(tree)))
    }

    fn parse_top_level_entity(&mut self) -> Result<Node, ParseError> {
        match self.peek_kind() {
            RawKind::Comment => {
                let raw = self.bump();
                let comment = Self::token_node(&raw, NodeKind::BlockComment);
                let eol = self.take_eol();
                Ok(Node::Tree(Box::new(
                    Tree::new(NodeKind::BlockComment)
                        .push("text", comment)
                        .push("eol", eol),
                )))
            }
            RawKind::Date => self.parse_dated_directive(),
            RawKind::Keyword => self.parse_undated_directive(),
            RawKind::Error => {
                let t = self.peek().clone();
                Err(ParseError::LexError {
                    position: t.position,
                    text: t.text,
                })
            }
            _ => {
                let t = self.peek();
                Err(ParseError::UnexpectedToken {
                    expected: "a directive or comment",
                    found: t.text.clone(),
                    position: t.position,
                })
            }
        }
    }

    fn parse_undated_directive(&mut self) -> Result<Node, ParseError> {
        match self.peek().text.as_str() {
            "include" => self.parse_include(),
            "option" => self.parse_option(),
            "plugin" => self.parse_plugin(),
            "pushtag" => self.parse_push_pop(NodeKind::Pushtag, "pushtag"),
            "poptag" => self.parse_push_pop(NodeKind::Poptag, "poptag"),
            "pushmeta" => self.parse_pushmeta(),
            "popmeta" => self.parse_popmeta(),
            _ => {
                let t = self.peek();
                Err(ParseError::UnexpectedToken {
                    expected: "a top-level keyword directive",
                    found: t.text.clone(),
                    position: t.position,
                })
            }
        }
    }

    fn parse_dated_directive(&mut self) -> Result<Node, ParseError> {
        let date_raw = self.expect(RawKind::Date, "date")?;
        let date = Self::token_node(&date_raw, NodeKind::Date);
        match self.peek().text.as_str() {
            "open" => self.parse_open(date),
            "close" => self.parse_close(date),
            "commodity" => self.parse_commodity(date),
            "pad" => self.parse_pad(date),
            "balance" => self.parse_balance(date),
            "price" => self.parse_price(date),
            "event" => self.parse_event(date),
            "query" => self.parse_query(date),
            "note" => self.parse_note(date),
            "document" => self.parse_document(date),
            "custom" => self.parse_custom(date),
            "txn" => self.parse_transaction(date),
            _ if self.peek_kind() == RawKind::Flag => self.parse_transaction(date),
            _ => {
                let t = self.peek();
                Err(ParseError::UnexpectedToken {
                    expected: "a directive keyword or transaction flag",
                    found: t.text.clone(),
                    position: t.position,
                })
            }
        }
    }

    /// Dispatch for [`reparse_as`]: the raw text handed in is a whole
    /// formatted line, so leading newlines (none expected) are tolerated
    /// but otherwise the same grammar applies.
    fn parse_directive_of_kind(&mut self, kind: NodeKind) -> Result<Node, ParseError> {
        self.skip_newlines();
        match kind {
            NodeKind::Open
            | NodeKind::Close
            | NodeKind::Commodity
            | NodeKind::Pad
            | NodeKind::Balance
            | NodeKind::Price
            | NodeKind::Event
            | NodeKind::Query
            | NodeKind::Note
            | NodeKind::Document
            | NodeKind::Custom
            | NodeKind::Transaction => self.parse_dated_directive(),
            NodeKind::Posting => self.parse_posting(),
            NodeKind::MetaItem => self.parse_meta_item(),
            _ => self.parse_top_level_entity(),
        }
    }

    // --- dated directives ---

    fn parse_open(&mut self, date: Node) -> Result<Node, ParseError> {
        let keyword = Self::token_node(&self.expect(RawKind::Keyword, "open")?, NodeKind::Keyword);
        let account = self.parse_account()?;
        let mut currencies = Vec::new();
        if self.peek_kind() == RawKind::Currency {
            currencies.push(self.parse_currency()?);
            while self.peek_kind() == RawKind::Comma {
                self.bump();
                currencies.push(self.parse_currency()?);
            }
        }
        let booking = if self.peek_kind() == RawKind::String {
            self.parse_string()?
        } else {
            Node::Missing
        };
        let inline_comment = self.take_inline_comment();
        let eol = self.take_eol();
        let mut tree = Tree::new(NodeKind::Open)
            .push("date", date)
            .push("keyword", keyword)
            .push("account", account);
        for c in currencies {
            tree = tree.push("currency", c);
        }
        Ok(Node::Tree(Box::new(
            tree.push("booking", booking)
                .push("inline_comment", inline_comment)
                .push("eol", eol),
        )))
    }

    fn parse_close(&mut self, date: Node) -> Result<Node, ParseError> {
        let keyword = Self::token_node(&self.expect(RawKind::Keyword, "close")?, NodeKind::Keyword);
        let account = self.parse_account()?;
        let inline_comment = self.take_inline_comment();
        let eol = self.take_eol();
        Ok(Node::Tree(Box::new(
            Tree::new(NodeKind::Close)
                .push("date", date)
                .push("keyword", keyword)
                .push("account", account)
                .push("inline_comment", inline_comment)
                .push("eol", eol),
        )))
    }

    fn parse_commodity(&mut self, date: Node) -> Result<Node, ParseError> {
        let keyword = Self::token_node(&self.expect(RawKind::Keyword, "commodity")?, NodeKind::Keyword);
        let currency = self.parse_currency()?;
        let inline_comment = self.take_inline_comment();
        let eol = self.take_eol();
        Ok(Node::Tree(Box::new(
            Tree::new(NodeKind::Commodity)
                .push("date", date)
                .push("keyword", keyword)
                .push("currency", currency)
                .push("inline_comment", inline_comment)
                .push("eol", eol),
        )))
    }

    fn parse_pad(&mut self, date: Node) -> Result<Node, ParseError> {
        let keyword = Self::token_node(&self.expect(RawKind::Keyword, "pad")?, NodeKind::Keyword);
        let account = self.parse_account()?;
        let source_account = self.parse_account()?;
        let inline_comment = self.take_inline_comment();
        let eol = self.take_eol();
        Ok(Node::Tree(Box::new(
            Tree::new(NodeKind::Pad)
                .push("date", date)
                .push("keyword", keyword)
                .push("account", account)
                .push("source_account", source_account)
                .push("inline_comment", inline_comment)
                .push("eol", eol),
        )))
    }

    fn parse_balance(&mut self, date: Node) -> Result<Node, ParseError> {
        let keyword = Self::token_node(&self.expect(RawKind::Keyword, "balance")?, NodeKind::Keyword);
        let account = self.parse_account()?;
        let number = self.parse_number_expr()?;
        let currency = self.parse_currency()?;
        let tolerance = if self.peek_kind() == RawKind::Tilde {
            self.bump();
            self.parse_number_expr()?
        } else {
            Node::Missing
        };
        let inline_comment = self.take_inline_comment();
        let eol = self.take_eol();
        Ok(Node::Tree(Box::new(
            Tree::new(NodeKind::Balance)
                .push("date", date)
                .push("keyword", keyword)
                .push("account", account)
                .push("number", number)
                .push("currency", currency)
                .push("tolerance", tolerance)
                .push("inline_comment", inline_comment)
                .push("eol", eol),
        )))
    }

    fn parse_price(&mut self, date: Node) -> Result<Node, ParseError> {
        let keyword = Self::token_node(&self.expect(RawKind::Keyword, "price")?, NodeKind::Keyword);
        let currency = self.parse_currency()?;
        let number = self.parse_number_expr()?;
        let quote_currency = self.parse_currency()?;
        let inline_comment = self.take_inline_comment();
        let eol = self.take_eol();
        Ok(Node::Tree(Box::new(
            Tree::new(NodeKind::Price)
                .push("date", date)
                .push("keyword", keyword)
                .push("currency", currency)
                .push("number", number)
                .push("quote_currency", quote_currency)
                .push("inline_comment", inline_comment)
                .push("eol", eol),
        )))
    }

    fn parse_event(&mut self, date: Node) -> Result<Node, ParseError> {
        let keyword = Self::token_node(&self.expect(RawKind::Keyword, "event")?, NodeKind::Keyword);
        let event_type = self.parse_string()?;
        let value = self.parse_string()?;
        let inline_comment = self.take_inline_comment();
        let eol = self.take_eol();
        Ok(Node::Tree(Box::new(
            Tree::new(NodeKind::Event)
                .push("date", date)
                .push("keyword", keyword)
                .push("event_type", event_type)
                .push("value", value)
                .push("inline_comment", inline_comment)
                .push("eol", eol),
        )))
    }

    fn parse_query(&mut self, date: Node) -> Result<Node, ParseError> {
        let keyword = Self::token_node(&self.expect(RawKind::Keyword, "query")?, NodeKind::Keyword);
        let name = self.parse_string()?;
        let query = self.parse_string()?;
        let inline_comment = self.take_inline_comment();
        let eol = self.take_eol();
        Ok(Node::Tree(Box::new(
            Tree::new(NodeKind::Query)
                .push("date", date)
                .push("keyword", keyword)
                .push("name", name)
                .push("query", query)
                .push("inline_comment", inline_comment)
                .push("eol", eol),
        )))
    }

    fn parse_note(&mut self, date: Node) -> Result<Node, ParseError> {
        let keyword = Self::token_node(&self.expect(RawKind::Keyword, "note")?, NodeKind::Keyword);
        let account = self.parse_account()?;
        let comment = self.parse_string()?;
        let inline_comment = self.take_inline_comment();
        let eol = self.take_eol();
        Ok(Node::Tree(Box::new(
            Tree::new(NodeKind::Note)
                .push("date", date)
                .push("keyword", keyword)
                .push("account", account)
                .push("comment", comment)
                .push("inline_comment", inline_comment)
                .push("eol", eol),
        )))
    }

    fn parse_document(&mut self, date: Node) -> Result<Node, ParseError> {
        let keyword = Self::token_node(&self.expect(RawKind::Keyword, "document")?, NodeKind::Keyword);
        let account = self.parse_account()?;
        let path = self.parse_string()?;
        let inline_comment = self.take_inline_comment();
        let eol = self.take_eol();
        Ok(Node::Tree(Box::new(
            Tree::new(NodeKind::Document)
                .push("date", date)
                .push("keyword", keyword)
                .push("account", account)
                .push("path", path)
                .push("inline_comment", inline_comment)
                .push("eol", eol),
        )))
    }

    fn parse_custom(&mut self, date: Node) -> Result<Node, ParseError> {
        let keyword = Self::token_node(&self.expect(RawKind::Keyword, "custom")?, NodeKind::Keyword);
        let custom_type = self.parse_string()?;
        let mut values = Vec::new();
        while matches!(
            self.peek_kind(),
            RawKind::String | RawKind::Number | RawKind::Account | RawKind::Currency
        ) {
            values.push(self.parse_custom_value()?);
        }
        let inline_comment = self.take_inline_comment();
        let eol = self.take_eol();
        let mut tree = Tree::new(NodeKind::Custom)
            .push("date", date)
            .push("keyword", keyword)
            .push("custom_type", custom_type);
        for v in values {
            tree = tree.push("value", v);
        }
        Ok(Node::Tree(Box::new(
            tree.push("inline_comment", inline_comment).push("eol", eol),
        )))
    }

    fn parse_custom_value(&mut self) -> Result<Node, ParseError> {
        match self.peek_kind() {
            RawKind::String => self.parse_string(),
            RawKind::Account => self.parse_account(),
            RawKind::Currency => self.parse_currency(),
            _ => self.parse_number_expr(),
        }
    }

    // --- undated directives ---

    fn parse_include(&mut self) -> Result<Node, ParseError> {
        let keyword = Self::token_node(&self.expect(RawKind::Keyword, "include")?, NodeKind::Keyword);
        let glob = self.parse_string()?;
        let inline_comment = self.take_inline_comment();
        let eol = self.take_eol();
        Ok(Node::Tree(Box::new(
            Tree::new(NodeKind::Include)
                .push("keyword", keyword)
                .push("glob", glob)
                .push("inline_comment", inline_comment)
                .push("eol", eol),
        )))
    }

    fn parse_option(&mut self) -> Result<Node, ParseError> {
        let keyword = Self::token_node(&self.expect(RawKind::Keyword, "option")?, NodeKind::Keyword);
        let name = self.parse_string()?;
        let value = self.parse_string()?;
        let inline_comment = self.take_inline_comment();
        let eol = self.take_eol();
        Ok(Node::Tree(Box::new(
            Tree::new(NodeKind::Option)
                .push("keyword", keyword)
                .push("name", name)
                .push("value", value)
                .push("inline_comment", inline_comment)
                .push("eol", eol),
        )))
    }

    fn parse_plugin(&mut self) -> Result<Node, ParseError> {
        let keyword = Self::token_node(&self.expect(RawKind::Keyword, "plugin")?, NodeKind::Keyword);
        let name = self.parse_string()?;
        let config = if self.peek_kind() == RawKind::String {
            self.parse_string()?
        } else {
            Node::Missing
        };
        let inline_comment = self.take_inline_comment();
        let eol = self.take_eol();
        Ok(Node::Tree(Box::new(
            Tree::new(NodeKind::Plugin)
                .push("keyword", keyword)
                .push("name", name)
                .push("config", config)
                .push("inline_comment", inline_comment)
                .push("eol", eol),
        )))
    }

    fn parse_push_pop(&mut self, kind: NodeKind, keyword_text: &'static str) -> Result<Node, ParseError> {
        let keyword =
            Self::token_node(&self.expect(RawKind::Keyword, keyword_text)?, NodeKind::Keyword);
        let tag = Self::token_node(&self.expect(RawKind::Tag, "tag")?, NodeKind::Tag);
        let inline_comment = self.take_inline_comment();
        let eol = self.take_eol();
        Ok(Node::Tree(Box::new(
            Tree::new(kind)
                .push("keyword", keyword)
                .push("tag", tag)
                .push("inline_comment", inline_comment)
                .push("eol", eol),
        )))
    }

    fn parse_pushmeta(&mut self) -> Result<Node, ParseError> {
        let keyword = Self::token_node(&self.expect(RawKind::Keyword, "pushmeta")?, NodeKind::Keyword);
        let key = Self::token_node(&self.expect(RawKind::MetaKey, "meta key")?, NodeKind::MetaKey);
        let value = self.parse_meta_value();
        let inline_comment = self.take_inline_comment();
        let eol = self.take_eol();
        Ok(Node::Tree(Box::new(
            Tree::new(NodeKind::Pushmeta)
                .push("keyword", keyword)
                .push("key", key)
                .push("value", value)
                .push("inline_comment", inline_comment)
                .push("eol", eol),
        )))
    }

    fn parse_popmeta(&mut self) -> Result<Node, ParseError> {
        let keyword = Self::token_node(&self.expect(RawKind::Keyword, "popmeta")?, NodeKind::Keyword);
        let key = Self::token_node(&self.expect(RawKind::MetaKey, "meta key")?, NodeKind::MetaKey);
        let inline_comment = self.take_inline_comment();
        let eol = self.take_eol();
        Ok(Node::Tree(Box::new(
            Tree::new(NodeKind::Popmeta)
                .push("keyword", keyword)
                .push("key", key)
                .push("inline_comment", inline_comment)
                .push("eol", eol),
        )))
    }

    // --- transaction / posting / meta ---

    fn parse_transaction(&mut self, date: Node) -> Result<Node, ParseError> {
        let flag = if self.text_is("txn") {
            self.bump();
            Node::Missing
        } else {
            Self::token_node(&self.expect(RawKind::Flag, "transaction flag")?, NodeKind::Flag)
        };
        let mut strings = Vec::new();
        while self.peek_kind() == RawKind::String {
            strings.push(self.parse_string()?);
        }
        let (payee, narration) = match strings.len() {
            0 => (Node::Missing, Node::Missing),
            1 => (Node::Missing, strings.remove(0)),
            _ => {
                let narration = strings.remove(strings.len() - 1);
                (strings.remove(0), narration)
            }
        };
        let mut tags = Vec::new();
        let mut links = Vec::new();
        loop {
            match self.peek_kind() {
                RawKind::Tag => tags.push(Self::token_node(&self.bump(), NodeKind::Tag)),
                RawKind::Link => links.push(Self::token_node(&self.bump(), NodeKind::Link)),
                _ => break,
            }
        }
        let inline_comment = self.take_inline_comment();
        let eol = self.take_eol();

        let mut tree = Tree::new(NodeKind::Transaction)
            .push("date", date)
            .push("flag", flag)
            .push("payee", payee)
            .push("narration", narration);
        for t in tags {
            tree = tree.push("tag", t);
        }
        for l in links {
            tree = tree.push("link", l);
        }
        tree = tree.push("inline_comment", inline_comment).push("eol", eol);

        while self.at_body_line() {
            let body = if self.peek_kind() == RawKind::MetaKey {
                self.parse_meta_item()?
            } else {
                self.parse_posting()?
            };
            tree = tree.push_indented("body", body);
        }
        Ok(Node::Tree(Box::new(tree)))
    }

    /// Whether the next non-newline token starts an indented body line
    /// (column > 0), as opposed to the next top-level entity.
    fn at_body_line(&self) -> bool {
        let mut i = self.pos;
        while matches!(self.tokens.get(i).map(|t| t.kind), Some(RawKind::Newline)) {
            i += 1;
        }
        match self.tokens.get(i) {
            Some(t) if !matches!(t.kind, RawKind::Eof) => t.position.column > 0,
            _ => false,
        }
    }

    fn at_meta_line(&self) -> bool {
        let mut i = self.pos;
        while matches!(self.tokens.get(i).map(|t| t.kind), Some(RawKind::Newline)) {
            i += 1;
        }
        matches!(self.tokens.get(i).map(|t| t.kind), Some(RawKind::MetaKey))
    }

    fn leading_indent(&mut self) -> Node {
        let raw = self.peek().clone();
        Node::Token(
            Token::new(NodeKind::Indent, String::new()).with_spacing(raw.spacing_before.clone()),
        )
    }

    fn parse_posting(&mut self) -> Result<Node, ParseError> {
        self.skip_newlines();
        let indent = self.leading_indent();
        let flag = if self.peek_kind() == RawKind::Flag {
            Self::token_node(&self.bump(), NodeKind::Flag)
        } else {
            Node::Missing
        };
        let account = self.parse_account()?;
        let (number, currency) = if matches!(
            self.peek_kind(),
            RawKind::Number | RawKind::LParen | RawKind::Plus | RawKind::Minus
        ) {
            let number = self.parse_number_expr()?;
            let currency = if self.peek_kind() == RawKind::Currency {
                self.parse_currency()?
            } else {
                Node::Missing
            };
            (number, currency)
        } else {
            (Node::Missing, Node::Missing)
        };
        let cost = self.parse_cost()?;
        let price = self.parse_price_annotation()?;
        let inline_comment = self.take_inline_comment();
        let eol = self.take_eol();

        let mut tree = Tree::new(NodeKind::Posting)
            .push("indent", indent)
            .push("flag", flag)
            .push("account", account)
            .push("number", number)
            .push("currency", currency)
            .push("cost", cost)
            .push("price", price)
            .push("inline_comment", inline_comment)
            .push("eol", eol);

        while self.at_meta_line() {
            let meta = self.parse_meta_item()?;
            tree = tree.push_indented("meta", meta);
        }
        Ok(Node::Tree(Box::new(tree)))
    }

    fn parse_meta_item(&mut self) -> Result<Node, ParseError> {
        self.skip_newlines();
        let indent = self.leading_indent();
        let key = Self::token_node(&self.expect(RawKind::MetaKey, "meta key")?, NodeKind::MetaKey);
        let value = self.parse_meta_value();
        let inline_comment = self.take_inline_comment();
        let eol = self.take_eol();
        Ok(Node::Tree(Box::new(
            Tree::new(NodeKind::MetaItem)
                .push("indent", indent)
                .push("key", key)
                .push("value", value)
                .push("inline_comment", inline_comment)
                .push("eol", eol),
        )))
    }

    fn parse_meta_value(&mut self) -> Node {
        match self.peek_kind() {
            RawKind::String => self.parse_string().unwrap_or(Node::Missing),
            RawKind::Account => self.parse_account().unwrap_or(Node::Missing),
            RawKind::Currency => self.parse_currency().unwrap_or(Node::Missing),
            RawKind::Date => Self::token_node(&self.bump(), NodeKind::Date),
            RawKind::Tag => Self::token_node(&self.bump(), NodeKind::Tag),
            RawKind::Link => Self::token_node(&self.bump(), NodeKind::Link),
            RawKind::Number | RawKind::LParen | RawKind::Plus | RawKind::Minus => {
                self.parse_number_expr().unwrap_or(Node::Missing)
            }
            _ => Node::Missing,
        }
    }

    fn parse_cost(&mut self) -> Result<Node, ParseError> {
        let (kind, close_kind) = match self.peek_kind() {
            RawKind::LDoubleBrace => (NodeKind::TotalCost, RawKind::RDoubleBrace),
            RawKind::LBrace => (NodeKind::UnitCost, RawKind::RBrace),
            _ => return Ok(Node::Missing),
        };
        let open = self.bump();
        let open_tok = Self::token_node(&open, NodeKind::Punct);
        let mut components = Vec::new();
        if self.peek_kind() != close_kind {
            components.push(self.parse_cost_component()?);
            while self.peek_kind() == RawKind::Comma {
                self.bump();
                components.push(self.parse_cost_component()?);
            }
        }
        let close = self.expect(close_kind, "closing cost brace")?;
        let close_tok = Self::token_node(&close, NodeKind::Punct);
        let mut tree = Tree::new(kind).push("open", open_tok);
        for c in components {
            tree = tree.push("component", c);
        }
        Ok(Node::Tree(Box::new(tree.push("close", close_tok))))
    }

    fn parse_cost_component(&mut self) -> Result<Node, ParseError> {
        match self.peek_kind() {
            RawKind::Date => Ok(Self::token_node(&self.bump(), NodeKind::Date)),
            RawKind::String => self.parse_string(),
            RawKind::Star => Ok(Self::token_node(&self.bump(), NodeKind::Punct)),
            _ => {
                let number = self.parse_number_expr()?;
                let currency = self.parse_currency()?;
                Ok(Node::Tree(Box::new(
                    Tree::new(NodeKind::NumberExpr)
                        .push("number", number)
                        .push("currency", currency),
                )))
            }
        }
    }

    fn parse_price_annotation(&mut self) -> Result<Node, ParseError> {
        if !matches!(self.peek_kind(), RawKind::AtAt | RawKind::At) {
            return Ok(Node::Missing);
        }
        let at = self.bump();
        let at_tok = Self::token_node(&at, NodeKind::Punct);
        let (number, currency) = if matches!(
            self.peek_kind(),
            RawKind::Number | RawKind::LParen | RawKind::Plus | RawKind::Minus
        ) {
            let number = self.parse_number_expr()?;
            let currency = if self.peek_kind() == RawKind::Currency {
                self.parse_currency()?
            } else {
                Node::Missing
            };
            (number, currency)
        } else {
            (Node::Missing, Node::Missing)
        };
        Ok(Node::Tree(Box::new(
            Tree::new(NodeKind::NumberExpr)
                .push("at", at_tok)
                .push("number", number)
                .push("currency", currency),
        )))
    }

    // --- number expressions (precedence climbing) ---

    fn parse_number_expr(&mut self) -> Result<Node, ParseError> {
        let inner = self.parse_add_expr()?;
        Ok(Node::Tree(Box::new(
            Tree::new(NodeKind::NumberExpr).push("inner", inner),
        )))
    }

    fn parse_add_expr(&mut self) -> Result<Node, ParseError> {
        let mut operands = vec![self.parse_mul_expr()?];
        let mut ops = Vec::new();
        while matches!(self.peek_kind(), RawKind::Plus | RawKind::Minus) {
            ops.push(Self::token_node(&self.bump(), NodeKind::AddOp));
            operands.push(self.parse_mul_expr()?);
        }
        if ops.is_empty() {
            return Ok(operands.remove(0));
        }
        let mut tree = Tree::new(NodeKind::NumberAddExpr);
        for o in operands {
            tree = tree.push("operand", o);
        }
        for o in ops {
            tree = tree.push("op", o);
        }
        Ok(Node::Tree(Box::new(tree)))
    }

    fn parse_mul_expr(&mut self) -> Result<Node, ParseError> {
        let mut operands = vec![self.parse_unary_expr()?];
        let mut ops = Vec::new();
        while matches!(self.peek_kind(), RawKind::Star | RawKind::Slash) {
            ops.push(Self::token_node(&self.bump(), NodeKind::MulOp));
            operands.push(self.parse_unary_expr()?);
        }
        if ops.is_empty() {
            return Ok(operands.remove(0));
        }
        let mut tree = Tree::new(NodeKind::NumberMulExpr);
        for o in operands {
            tree = tree.push("operand", o);
        }
        for o in ops {
            tree = tree.push("op", o);
        }
        Ok(Node::Tree(Box::new(tree)))
    }

    fn parse_unary_expr(&mut self) -> Result<Node, ParseError> {
        if matches!(self.peek_kind(), RawKind::Plus | RawKind::Minus) {
            let op = Self::token_node(&self.bump(), NodeKind::UnaryOp);
            let operand = self.parse_unary_expr()?;
            return Ok(Node::Tree(Box::new(
                Tree::new(NodeKind::NumberUnaryExpr)
                    .push("op", op)
                    .push("operand", operand),
            )));
        }
        self.parse_paren_expr()
    }

    fn parse_paren_expr(&mut self) -> Result<Node, ParseError> {
        if self.peek_kind() == RawKind::LParen {
            let lparen = Self::token_node(&self.bump(), NodeKind::LeftParen);
            let inner = self.parse_add_expr()?;
            let rparen = Self::token_node(
                &self.expect(RawKind::RParen, "closing parenthesis")?,
                NodeKind::RightParen,
            );
            return Ok(Node::Tree(Box::new(
                Tree::new(NodeKind::NumberParenExpr)
                    .push("lparen", lparen)
                    .push("inner", inner)
                    .push("rparen", rparen),
            )));
        }
        let raw = self.expect(RawKind::Number, "number")?;
        if parse_decimal(&raw.text).is_none() {
            return Err(ParseError::InvalidNumber {
                position: raw.position,
                text: raw.text.clone(),
            });
        }
        Ok(Self::token_node(&raw, NodeKind::Number))
    }

    // --- leaves ---

    fn parse_account(&mut self) -> Result<Node, ParseError> {
        Ok(Self::token_node(
            &self.expect(RawKind::Account, "account")?,
            NodeKind::Account,
        ))
    }

    fn parse_currency(&mut self) -> Result<Node, ParseError> {
        Ok(Self::token_node(
            &self.expect(RawKind::Currency, "currency")?,
            NodeKind::Currency,
        ))
    }

    fn parse_string(&mut self) -> Result<Node, ParseError> {
        Ok(Self::token_node(
            &self.expect(RawKind::String, "quoted string")?,
            NodeKind::EscapedString,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simple_open() {
        let node = parse("2000-01-01 open Assets:Foo USD\n").unwrap();
        let file = node.as_tree().unwrap();
        assert_eq!(file.children.len(), 1);
        let open = file.children[0].node.as_tree().unwrap();
        assert_eq!(open.kind, NodeKind::Open);
        assert_eq!(open.child("account").unwrap().to_string(), " Assets:Foo");
    }

    #[test]
    fn parses_transaction_with_postings() {
        let node = parse(
            "2000-01-01 * \"Store\" \"Coffee\"\n    Assets:Cash  -1.00 USD\n    Expenses:Coffee\n",
        )
        .unwrap();
        let file = node.as_tree().unwrap();
        let txn = file.children[0].node.as_tree().unwrap();
        assert_eq!(txn.kind, NodeKind::Transaction);
        let postings: Vec<_> = txn.children_named("body").collect();
        assert_eq!(postings.len(), 2);
    }

    #[test]
    fn reparse_as_balance_recovers_positions() {
        let formatted = "2000-01-01 balance Assets:Foo 1.23 USD";
        let node = reparse_as(formatted, NodeKind::Balance).unwrap();
        let currency = node.as_tree().unwrap().child("currency").unwrap();
        assert_eq!(currency.first_token().unwrap().position.column, 35);
    }
}
