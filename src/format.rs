// SPDX-FileCopyrightText: 2025 Robin Vobruba <hoijui.quaero@gmail.com>
//
// SPDX-License-Identifier: Apache-2.0

//! The formatting core: per-construct structural formatters dispatched by
//! node kind, a column-tracking [`Writer`] standing in for the
//! re-parse-the-formatted-line alignment mechanism, and the top-level
//! block partitioner that also drives the prudent sorter.

use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;

use crate::alignment::padding_to;
use crate::context::Context;
use crate::decoders::{add_thousands_separators, remove_thousands_separators};
use crate::error::FmtResult;
use crate::iterating::BufferedIterator;
use crate::node::{Node, NodeKind, Token, Tree};
use crate::options::{FormatOptions, ThousandsSeparator};
use crate::parser;
use crate::sorting::{prudent_sort, OrderedBlock, OrderedEntry};
use crate::time;

/// Parses `source` and renders it per `options`.
pub fn format_source(source: &str, options: &FormatOptions) -> FmtResult<String> {
    let node = parser::parse(source)?;
    let file = node.as_tree().expect("parser::parse always returns a File tree");
    Ok(format_file(file, options))
}

/// An emission sink that tracks the current column, so alignment can be
/// computed directly from what has already been written instead of by
/// re-parsing a formatted header line (see `DESIGN.md`).
#[derive(Debug, Default)]
struct Writer {
    buf: String,
    column: usize,
    /// Whether any content has been written since the last newline; governs
    /// whether [`Self::space_then`] inserts a separating space.
    started: bool,
}

impl Writer {
    fn write_raw(&mut self, s: &str) {
        for ch in s.chars() {
            if ch == '\n' {
                self.column = 0;
            } else {
                self.column += 1;
            }
        }
        self.buf.push_str(s);
    }

    fn newline(&mut self) {
        self.write_raw("\n");
        self.started = false;
    }

    /// Writes `s`, preceded by a single space if this isn't the first
    /// field written since the last newline.
    fn space_then(&mut self, s: &str) {
        if self.started {
            self.write_raw(" ");
        }
        self.write_raw(s);
        self.started = true;
    }

    /// Writes `text` padded so it starts at `target_column`, or preceded by
    /// a single plain space if emission already passed that column —
    /// alignment degrades silently past the target, per the padding-is-
    /// only-ever-added policy.
    fn aligned_field(&mut self, target_column: usize, text: &str) {
        let pad = padding_to(self.column, target_column);
        if pad > 0 {
            self.write_raw(&" ".repeat(pad));
        } else if self.started {
            self.write_raw(" ");
        }
        self.write_raw(text);
        self.started = true;
    }

    fn into_string(self) -> String {
        self.buf
    }
}

fn token_text(node: &Node) -> &str {
    node.as_token().map_or("", |t| t.text.as_str())
}

fn field<'a>(tree: &'a Tree, name: &str) -> &'a str {
    tree.child(name).map_or("", token_text)
}

fn is_present(node: Option<&Node>) -> bool {
    node.is_some_and(|n| !n.is_missing())
}

// --- token / auxiliary formatters (spec §4.2) ---

fn format_number_token(raw: &str, opts: &FormatOptions) -> String {
    match opts.thousands_separator {
        ThousandsSeparator::Add => add_thousands_separators(raw),
        ThousandsSeparator::Remove => remove_thousands_separators(raw),
        ThousandsSeparator::Keep => raw.to_string(),
    }
}

/// Renders a number-expression subtree: unwraps the `NumberExpr` wrapper,
/// interleaves `NumberAddExpr`/`NumberMulExpr` operands with their
/// operators, concatenates unary operators onto their operand, and
/// recurses through parentheses. Only `Number` leaves are ever rewritten
/// (thousands separators); everything above them is copied through.
fn format_number_value(node: &Node, opts: &FormatOptions) -> String {
    match node {
        Node::Token(t) if t.kind == NodeKind::Number => format_number_token(&t.text, opts),
        Node::Tree(tree) => match tree.kind {
            NodeKind::NumberExpr => tree
                .child("inner")
                .map_or_else(String::new, |inner| format_number_value(inner, opts)),
            NodeKind::NumberAddExpr | NodeKind::NumberMulExpr => {
                format_number_chain(tree, opts)
            }
            NodeKind::NumberUnaryExpr => {
                let op = field(tree, "op");
                let operand = tree
                    .child("operand")
                    .map_or_else(String::new, |n| format_number_value(n, opts));
                format!("{op}{operand}")
            }
            NodeKind::NumberParenExpr => {
                let inner = tree
                    .child("inner")
                    .map_or_else(String::new, |n| format_number_value(n, opts));
                format!("({inner})")
            }
            _ => String::new(),
        },
        _ => String::new(),
    }
}

fn format_number_chain(tree: &Tree, opts: &FormatOptions) -> String {
    let operands: Vec<String> = tree
        .children_named("operand")
        .map(|n| format_number_value(n, opts))
        .collect();
    let ops: Vec<&str> = tree.children_named("op").map(token_text).collect();
    let mut out = String::new();
    for (i, operand) in operands.iter().enumerate() {
        if i > 0 {
            if let Some(op) = ops.get(i - 1) {
                out.push(' ');
                out.push_str(op);
                out.push(' ');
            }
        }
        out.push_str(operand);
    }
    out
}

fn format_meta_value(node: &Node, opts: &FormatOptions) -> String {
    match node {
        Node::Token(t) => t.text.clone(),
        Node::Tree(_) => format_number_value(node, opts),
        Node::Missing => String::new(),
    }
}

static NARRATION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(.*?)(?:;(.*))?$").expect("valid regex"));

/// Normalizes an inline comment token. The default form is `; ` plus the
/// trimmed body; the double-semicolon narration form (`;;narration;comment`)
/// keeps narration and trailing comment separated by a lone `;`, per the
/// original's worked example `;;foo;bar;baz` -> `;; foo ; bar;baz`.
fn format_inline_comment(token: &Token) -> String {
    let raw = token.text.as_str();
    if let Some(rest) = raw.strip_prefix(";;") {
        let caps = NARRATION_RE.captures(rest).expect("always matches, pattern is total");
        let narration = caps.get(1).map_or("", |m| m.as_str());
        let mut out = String::from(";;");
        if !narration.is_empty() {
            out.push(' ');
            out.push_str(narration);
        }
        if let Some(comment) = caps.get(2) {
            out.push_str(" ;");
            let comment = comment.as_str();
            if !comment.is_empty() {
                out.push(' ');
                out.push_str(comment);
            }
        }
        out
    } else {
        let body = raw.strip_prefix(';').unwrap_or(raw).trim();
        format!("; {body}")
    }
}

fn write_inline_comment(w: &mut Writer, tree: &Tree, ctx: Context) {
    let Some(node) = tree.child("inline_comment") else {
        return;
    };
    let Some(token) = node.as_token() else {
        return;
    };
    let text = format_inline_comment(token);
    if ctx.options.inline_comment_alignment_enabled() {
        w.aligned_field(ctx.options.inline_comment_column, &text);
    } else {
        w.space_then(&text);
    }
}

fn format_block_comment(tree: &Tree, ctx: Context) -> String {
    format!("{}{}", ctx.get_indent(), field(tree, "text"))
}

/// Pads `number_text` so its right edge lands one column before
/// `currency_column` (i.e. the following currency, if any, starts exactly
/// at `currency_column`), then appends ` CURRENCY` if one is given.
fn align_number_currency(w: &mut Writer, number_text: &str, currency_text: Option<&str>, currency_column: usize) {
    let target_start = currency_column.saturating_sub(1 + number_text.chars().count());
    w.aligned_field(target_start, number_text);
    if let Some(cur) = currency_text {
        w.space_then(cur);
    }
}

// --- cost / price annotation (spec §4.5) ---

fn format_cost(tree: &Tree, opts: &FormatOptions) -> String {
    let (open, close) = match tree.kind {
        NodeKind::TotalCost => ("{{", "}}"),
        _ => ("{", "}"),
    };
    let components: Vec<String> = tree
        .children_named("component")
        .map(|c| format_cost_component(c, opts))
        .collect();
    if components.is_empty() {
        return format!("{open}{close}");
    }
    let pad = if opts.spaces_in_braces { " " } else { "" };
    format!("{open}{pad}{}{pad}{close}", components.join(", "))
}

fn format_cost_component(node: &Node, opts: &FormatOptions) -> String {
    match node {
        Node::Token(t) => t.text.clone(),
        Node::Tree(tree) => {
            let number = tree
                .child("number")
                .map_or_else(String::new, |n| format_number_value(n, opts));
            let currency = field(tree, "currency");
            format!("{number} {currency}")
        }
        Node::Missing => String::new(),
    }
}

fn format_price_annotation(node: &Node, opts: &FormatOptions) -> String {
    let Some(tree) = node.as_tree() else {
        return String::new();
    };
    let mut out = field(tree, "at").to_string();
    if is_present(tree.child("number")) {
        out.push(' ');
        out.push_str(&format_number_value(tree.child("number").expect("checked present"), opts));
        if is_present(tree.child("currency")) {
            out.push(' ');
            out.push_str(field(tree, "currency"));
        }
    }
    out
}

// --- directive formatters (spec §4.3) ---

fn format_open(tree: &Tree, ctx: Context) -> String {
    let mut w = Writer::default();
    w.write_raw(&ctx.get_indent());
    w.space_then(field(tree, "date"));
    w.space_then("open");
    w.space_then(field(tree, "account"));
    let currencies: Vec<&str> = tree.children_named("currency").map(token_text).collect();
    for (i, currency) in currencies.iter().enumerate() {
        if i == 0 {
            w.aligned_field(ctx.options.currency_column, currency);
        } else {
            w.write_raw(", ");
            w.write_raw(currency);
        }
    }
    if is_present(tree.child("booking")) {
        w.space_then(field(tree, "booking"));
    }
    write_inline_comment(&mut w, tree, ctx);
    w.into_string()
}

fn format_close(tree: &Tree, ctx: Context) -> String {
    let mut w = Writer::default();
    w.write_raw(&ctx.get_indent());
    w.space_then(field(tree, "date"));
    w.space_then("close");
    w.space_then(field(tree, "account"));
    write_inline_comment(&mut w, tree, ctx);
    w.into_string()
}

fn format_commodity(tree: &Tree, ctx: Context) -> String {
    let mut w = Writer::default();
    w.write_raw(&ctx.get_indent());
    w.space_then(field(tree, "date"));
    w.space_then("commodity");
    w.space_then(field(tree, "currency"));
    write_inline_comment(&mut w, tree, ctx);
    w.into_string()
}

fn format_pad(tree: &Tree, ctx: Context) -> String {
    let mut w = Writer::default();
    w.write_raw(&ctx.get_indent());
    w.space_then(field(tree, "date"));
    w.space_then("pad");
    w.space_then(field(tree, "account"));
    w.space_then(field(tree, "source_account"));
    write_inline_comment(&mut w, tree, ctx);
    w.into_string()
}

fn format_balance(tree: &Tree, ctx: Context) -> String {
    let mut w = Writer::default();
    w.write_raw(&ctx.get_indent());
    w.space_then(field(tree, "date"));
    w.space_then("balance");
    w.space_then(field(tree, "account"));
    let number = tree
        .child("number")
        .map_or_else(String::new, |n| format_number_value(n, ctx.options));
    let currency = field(tree, "currency");
    align_number_currency(&mut w, &number, Some(currency), ctx.options.currency_column);
    if is_present(tree.child("tolerance")) {
        w.space_then("~");
        let tolerance = format_number_value(tree.child("tolerance").expect("checked present"), ctx.options);
        w.space_then(&tolerance);
    }
    write_inline_comment(&mut w, tree, ctx);
    w.into_string()
}

fn format_price(tree: &Tree, ctx: Context) -> String {
    let mut w = Writer::default();
    w.write_raw(&ctx.get_indent());
    w.space_then(field(tree, "date"));
    w.space_then("price");
    w.space_then(field(tree, "currency"));
    let number = tree
        .child("number")
        .map_or_else(String::new, |n| format_number_value(n, ctx.options));
    w.aligned_field(ctx.options.currency_column, &number);
    w.space_then(field(tree, "quote_currency"));
    write_inline_comment(&mut w, tree, ctx);
    w.into_string()
}

fn format_event(tree: &Tree, ctx: Context) -> String {
    let mut w = Writer::default();
    w.write_raw(&ctx.get_indent());
    w.space_then(field(tree, "date"));
    w.space_then("event");
    w.space_then(field(tree, "event_type"));
    w.space_then(field(tree, "value"));
    write_inline_comment(&mut w, tree, ctx);
    w.into_string()
}

fn format_query(tree: &Tree, ctx: Context) -> String {
    let mut w = Writer::default();
    w.write_raw(&ctx.get_indent());
    w.space_then(field(tree, "date"));
    w.space_then("query");
    w.space_then(field(tree, "name"));
    w.space_then(field(tree, "query"));
    write_inline_comment(&mut w, tree, ctx);
    w.into_string()
}

fn format_note(tree: &Tree, ctx: Context) -> String {
    let mut w = Writer::default();
    w.write_raw(&ctx.get_indent());
    w.space_then(field(tree, "date"));
    w.space_then("note");
    w.space_then(field(tree, "account"));
    w.space_then(field(tree, "comment"));
    write_inline_comment(&mut w, tree, ctx);
    w.into_string()
}

fn format_document(tree: &Tree, ctx: Context) -> String {
    let mut w = Writer::default();
    w.write_raw(&ctx.get_indent());
    w.space_then(field(tree, "date"));
    w.space_then("document");
    w.space_then(field(tree, "account"));
    w.space_then(field(tree, "path"));
    write_inline_comment(&mut w, tree, ctx);
    w.into_string()
}

fn format_custom_value(node: &Node, opts: &FormatOptions) -> String {
    match node {
        Node::Token(t) => t.text.clone(),
        Node::Tree(_) => format_number_value(node, opts),
        Node::Missing => String::new(),
    }
}

fn format_custom(tree: &Tree, ctx: Context) -> String {
    let mut w = Writer::default();
    w.write_raw(&ctx.get_indent());
    w.space_then(field(tree, "date"));
    w.space_then("custom");
    w.space_then(field(tree, "custom_type"));
    for value in tree.children_named("value") {
        let text = format_custom_value(value, ctx.options);
        w.space_then(&text);
    }
    write_inline_comment(&mut w, tree, ctx);
    w.into_string()
}

fn format_include(tree: &Tree, ctx: Context) -> String {
    let mut w = Writer::default();
    w.write_raw(&ctx.get_indent());
    w.space_then("include");
    w.space_then(field(tree, "glob"));
    write_inline_comment(&mut w, tree, ctx);
    w.into_string()
}

fn format_option(tree: &Tree, ctx: Context) -> String {
    let mut w = Writer::default();
    w.write_raw(&ctx.get_indent());
    w.space_then("option");
    w.space_then(field(tree, "name"));
    w.space_then(field(tree, "value"));
    write_inline_comment(&mut w, tree, ctx);
    w.into_string()
}

fn format_plugin(tree: &Tree, ctx: Context) -> String {
    let mut w = Writer::default();
    w.write_raw(&ctx.get_indent());
    w.space_then("plugin");
    w.space_then(field(tree, "name"));
    if is_present(tree.child("config")) {
        w.space_then(field(tree, "config"));
    }
    write_inline_comment(&mut w, tree, ctx);
    w.into_string()
}

fn format_push_pop(tree: &Tree, ctx: Context, keyword: &str) -> String {
    let mut w = Writer::default();
    w.write_raw(&ctx.get_indent());
    w.space_then(keyword);
    w.space_then(field(tree, "tag"));
    write_inline_comment(&mut w, tree, ctx);
    w.into_string()
}

fn format_pushmeta(tree: &Tree, ctx: Context) -> String {
    let mut w = Writer::default();
    w.write_raw(&ctx.get_indent());
    w.space_then("pushmeta");
    w.space_then(field(tree, "key"));
    if is_present(tree.child("value")) {
        let value = format_meta_value(tree.child("value").expect("checked present"), ctx.options);
        w.space_then(&value);
    }
    write_inline_comment(&mut w, tree, ctx);
    w.into_string()
}

fn format_popmeta(tree: &Tree, ctx: Context) -> String {
    let mut w = Writer::default();
    w.write_raw(&ctx.get_indent());
    w.space_then("popmeta");
    w.space_then(field(tree, "key"));
    write_inline_comment(&mut w, tree, ctx);
    w.into_string()
}

fn format_transaction_flag(node: Option<&Node>) -> String {
    match node {
        Some(n) if !n.is_missing() => token_text(n).to_string(),
        _ => "txn".to_string(),
    }
}

fn format_transaction(tree: &Tree, ctx: Context) -> String {
    let mut w = Writer::default();
    w.write_raw(&ctx.get_indent());
    w.space_then(field(tree, "date"));
    let flag = format_transaction_flag(tree.child("flag"));
    w.space_then(&flag);
    if is_present(tree.child("payee")) {
        w.space_then(field(tree, "payee"));
    }
    if is_present(tree.child("narration")) {
        w.space_then(field(tree, "narration"));
    }
    for tag in tree.children_named("tag") {
        w.space_then(token_text(tag));
    }
    for link in tree.children_named("link") {
        w.space_then(token_text(link));
    }
    write_inline_comment(&mut w, tree, ctx);
    let body_ctx = ctx.indented();
    for body in tree.children_named("body") {
        w.newline();
        w.write_raw(&format_body_item(body, body_ctx));
    }
    w.into_string()
}

fn format_body_item(node: &Node, ctx: Context) -> String {
    let tree = node.as_tree().expect("transaction body item is a tree");
    if tree.kind == NodeKind::MetaItem {
        format_meta_item(tree, ctx)
    } else {
        format_posting(tree, ctx)
    }
}

fn format_meta_item(tree: &Tree, ctx: Context) -> String {
    let mut w = Writer::default();
    w.write_raw(&ctx.get_indent());
    w.space_then(field(tree, "key"));
    if is_present(tree.child("value")) {
        let value = format_meta_value(tree.child("value").expect("checked present"), ctx.options);
        w.space_then(&value);
    }
    write_inline_comment(&mut w, tree, ctx);
    w.into_string()
}

fn format_posting(tree: &Tree, ctx: Context) -> String {
    let mut w = Writer::default();
    w.write_raw(&ctx.get_indent());
    if is_present(tree.child("flag")) {
        w.space_then(field(tree, "flag"));
    }
    w.space_then(field(tree, "account"));

    if is_present(tree.child("number")) {
        let number = format_number_value(tree.child("number").expect("checked present"), ctx.options);
        let currency = tree
            .child("currency")
            .filter(|n| !n.is_missing())
            .map(token_text);
        align_number_currency(&mut w, &number, currency, ctx.options.currency_column);
    }

    let cost = tree.child("cost").filter(|n| !n.is_missing());
    let price = tree.child("price").filter(|n| !n.is_missing());
    match (cost, price) {
        (Some(cost), Some(price)) => {
            let cost_text = format_cost(cost.as_tree().expect("cost is a tree"), ctx.options);
            w.aligned_field(ctx.options.cost_column, &cost_text);
            let price_text = format_price_annotation(price, ctx.options);
            w.space_then(&price_text);
        }
        (Some(cost), None) => {
            let cost_text = format_cost(cost.as_tree().expect("cost is a tree"), ctx.options);
            w.aligned_field(ctx.options.cost_column, &cost_text);
        }
        (None, Some(price)) => {
            let price_text = format_price_annotation(price, ctx.options);
            w.aligned_field(ctx.options.cost_column, &price_text);
        }
        (None, None) => {}
    }

    write_inline_comment(&mut w, tree, ctx);

    let meta_ctx = ctx.indented();
    for meta in tree.children_named("meta") {
        w.newline();
        let meta_tree = meta.as_tree().expect("posting meta is a tree");
        w.write_raw(&format_meta_item(meta_tree, meta_ctx));
    }
    w.into_string()
}

fn format_entity(node: &Node, ctx: Context) -> String {
    let Some(tree) = node.as_tree() else {
        return node.to_string();
    };
    match tree.kind {
        NodeKind::BlockComment => format_block_comment(tree, ctx),
        NodeKind::Open => format_open(tree, ctx),
        NodeKind::Close => format_close(tree, ctx),
        NodeKind::Commodity => format_commodity(tree, ctx),
        NodeKind::Pad => format_pad(tree, ctx),
        NodeKind::Balance => format_balance(tree, ctx),
        NodeKind::Price => format_price(tree, ctx),
        NodeKind::Event => format_event(tree, ctx),
        NodeKind::Query => format_query(tree, ctx),
        NodeKind::Note => format_note(tree, ctx),
        NodeKind::Document => format_document(tree, ctx),
        NodeKind::Custom => format_custom(tree, ctx),
        NodeKind::Transaction => format_transaction(tree, ctx),
        NodeKind::Include => format_include(tree, ctx),
        NodeKind::Option => format_option(tree, ctx),
        NodeKind::Plugin => format_plugin(tree, ctx),
        NodeKind::Pushtag => format_push_pop(tree, ctx, "pushtag"),
        NodeKind::Poptag => format_push_pop(tree, ctx, "poptag"),
        NodeKind::Pushmeta => format_pushmeta(tree, ctx),
        NodeKind::Popmeta => format_popmeta(tree, ctx),
        _ => node.to_string(),
    }
}

// --- file formatter / block partitioner (spec §4.6) ---

#[derive(Debug, Clone, Copy)]
struct Entity<'a> {
    node: &'a Node,
    kind: Option<NodeKind>,
    blank_after: bool,
}

fn collect_entities(file: &Tree) -> Vec<Entity<'_>> {
    file.children
        .iter()
        .filter(|c| c.name == "entity")
        .map(|c| Entity {
            node: &c.node,
            kind: c.node.kind(),
            blank_after: c.blank_after,
        })
        .collect()
}

fn category_of(kind: Option<NodeKind>) -> &'static str {
    kind.map_or("other", NodeKind::category)
}

/// The boundary predicate from spec §4.6, with one simplification: a
/// `BlockComment` glued (no blank line) to whatever follows is treated as
/// that entity's claimed leading comment rather than a free-floating
/// top-level entity, so it joins the following entity's block instead of
/// always forcing a split — see `DESIGN.md`.
fn is_boundary(prev: &Entity<'_>, curr: &Entity<'_>) -> bool {
    if !prev.blank_after && prev.kind == Some(NodeKind::BlockComment) {
        return false;
    }
    if prev.blank_after {
        return true;
    }
    if prev.kind.is_some_and(NodeKind::always_surrounded) || curr.kind.is_some_and(NodeKind::always_surrounded) {
        return true;
    }
    category_of(prev.kind) != category_of(curr.kind)
}

fn partition_blocks(entities: Vec<Entity<'_>>) -> Vec<Vec<Entity<'_>>> {
    let mut it = BufferedIterator::new(entities.into_iter());
    let mut blocks = Vec::new();
    while let Some(first) = it.next() {
        let mut block = vec![first];
        loop {
            let prev = *block.last().expect("just pushed");
            let stop = match it.peek() {
                Some(next) => is_boundary(&prev, next),
                None => true,
            };
            if stop {
                break;
            }
            block.push(it.next().expect("just peeked"));
        }
        blocks.push(block);
    }
    blocks
}

fn entity_date(node: &Node) -> Option<NaiveDate> {
    let raw = node.as_tree()?.child("date")?.as_token()?.text.as_str();
    NaiveDate::parse_from_str(&raw.replace('/', "-"), "%Y-%m-%d").ok()
}

/// Extracts a `Transaction`'s `time:` meta value, if any, normalized to
/// microseconds for use as a sort tie-breaker.
fn entity_time(node: &Node, date: NaiveDate) -> Option<i64> {
    let tree = node.as_tree()?;
    if tree.kind != NodeKind::Transaction {
        return None;
    }
    tree.children_named("body").find_map(|body| {
        let meta = body.as_tree()?;
        if meta.kind != NodeKind::MetaItem || field(meta, "key") != "time:" {
            return None;
        }
        let raw = meta.child("value")?.plain_text();
        let normalized = time::normalize(&raw, date);
        if normalized.is_none() {
            tracing::warn!(value = %raw, "time meta did not normalize to a timestamp; ignoring for sort");
        }
        normalized
    })
}

/// Compartment-splitter test (spec §1/§4.8): a block whose first entity
/// is a push/pop tag *or meta* directive, or a block comment, forms a
/// hard barrier the sorter never reorders across.
fn is_splitter(block: &[Entity<'_>]) -> bool {
    block.first().and_then(|e| e.kind).is_some_and(|k| {
        matches!(
            k,
            NodeKind::Pushtag | NodeKind::Poptag | NodeKind::Pushmeta | NodeKind::Popmeta | NodeKind::BlockComment
        )
    })
}

fn sort_compartment<'a>(compartment: Vec<Vec<Entity<'a>>>) -> Vec<Vec<Entity<'a>>> {
    if compartment.len() <= 1 {
        return compartment;
    }
    let mut index = 0usize;
    let ordered_blocks: Vec<OrderedBlock> = compartment
        .iter()
        .enumerate()
        .map(|(block_index, block)| {
            let first_entry_index = index;
            let mut entries = Vec::new();
            for entity in block {
                if let Some(date) = entity_date(entity.node) {
                    let time = entity_time(entity.node, date);
                    entries.push(OrderedEntry { date, time, index });
                    index += 1;
                }
            }
            OrderedBlock {
                entries,
                first_entry_index,
                block_index,
            }
        })
        .collect();
    prudent_sort(ordered_blocks)
        .into_iter()
        .map(|ob| compartment[ob.block_index].clone())
        .collect()
}

fn sort_blocks(blocks: Vec<Vec<Entity<'_>>>) -> Vec<Vec<Entity<'_>>> {
    let mut result = Vec::with_capacity(blocks.len());
    let mut compartment = Vec::new();
    for block in blocks {
        if is_splitter(&block) {
            result.append(&mut sort_compartment(std::mem::take(&mut compartment)));
            result.push(block);
        } else {
            compartment.push(block);
        }
    }
    result.append(&mut sort_compartment(compartment));
    result
}

fn format_file(file: &Tree, options: &FormatOptions) -> String {
    let ctx = Context::new(options);
    let entities = collect_entities(file);
    let mut blocks = partition_blocks(entities);
    if options.sort {
        blocks = sort_blocks(blocks);
    }
    let rendered: Vec<String> = blocks
        .iter()
        .map(|block| {
            block
                .iter()
                .map(|entity| format_entity(entity.node, ctx))
                .collect::<Vec<_>>()
                .join("\n")
        })
        .collect();
    if rendered.is_empty() {
        return String::new();
    }
    let mut out = rendered.join("\n\n");
    out.push('\n');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opts() -> FormatOptions {
        FormatOptions::default()
    }

    #[test]
    fn aligns_balance_currency_column() {
        let source = "2000-01-01      balance\tAssets:Foo  1.23   USD\n";
        let formatted = format_source(source, &opts()).unwrap();
        assert_eq!(
            formatted,
            "2000-01-01 balance Assets:Foo                                              1.23 USD\n"
        );
    }

    #[test]
    fn aligns_open_currency_list() {
        let source = "2000-01-01 open Assets:Foo   USD,GBP,  EUR\n";
        let formatted = format_source(source, &opts()).unwrap();
        assert_eq!(
            formatted,
            "2000-01-01 open Assets:Foo                                                      USD, GBP, EUR\n"
        );
    }

    #[test]
    fn aligns_posting_cost_and_price() {
        let mut o = opts();
        o.currency_column = 80;
        o.cost_column = 85;
        let source =
            "2000-01-01 * \"x\"\n    Assets:Foo  1.00 GBP   {1.23 USD}   @ 1.23 USD  \n";
        let formatted = format_source(source, &o).unwrap();
        let posting_line = formatted.lines().nth(1).unwrap();
        assert_eq!(
            posting_line,
            "    Assets:Foo                                                             1.00 GBP  {1.23 USD} @ 1.23 USD"
        );
    }

    #[test]
    fn files_paragraph_between_blank_separated_includes() {
        let source = "include \"foo.bean\"\n\n\n\n\n\ninclude \"bar.bean\"\n\n\n\n\n";
        let formatted = format_source(source, &opts()).unwrap();
        assert_eq!(formatted, "include \"foo.bean\"\n\ninclude \"bar.bean\"\n");
    }

    #[test]
    fn empty_file_stays_empty() {
        assert_eq!(format_source("", &opts()).unwrap(), "");
    }

    #[test]
    fn narration_comment_splits_on_lone_semicolon() {
        let token = Token::new(NodeKind::InlineComment, ";;foo;bar;baz");
        assert_eq!(format_inline_comment(&token), ";; foo ; bar;baz");
    }

    #[test]
    fn default_comment_is_trimmed_and_spaced() {
        let token = Token::new(NodeKind::InlineComment, ";   hello world  ");
        assert_eq!(format_inline_comment(&token), "; hello world");
    }

    #[test]
    fn thousands_separator_add_groups_digits() {
        let mut o = opts();
        o.thousands_separator = ThousandsSeparator::Add;
        let source = "2000-01-01 * \"x\"\n    Assets:Foo  1234567890.0987654321 USD\n    Equity:Foo\n";
        let formatted = format_source(source, &o).unwrap();
        assert!(formatted.contains("1,234,567,890.0987654321"));
    }

    #[test]
    fn idempotent_on_already_formatted_input() {
        let source = "2000-01-01 open Assets:Foo USD\n";
        let once = format_source(source, &opts()).unwrap();
        let twice = format_source(&once, &opts()).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn sort_reorders_blocks_within_a_compartment() {
        let source = "\
2000-02-02 open Assets:B USD

2000-02-01 open Assets:A USD
";
        let mut o = opts();
        o.sort = true;
        let formatted = format_source(source, &o).unwrap();
        let first_date = formatted.lines().next().unwrap();
        assert!(first_date.starts_with("2000-02-01"));
    }

    #[test]
    fn sort_never_crosses_a_pushtag_compartment_barrier() {
        let source = "\
2000-02-02 open Assets:B USD
2000-02-01 open Assets:A USD

pushtag #foo

2000-01-02 open Assets:D USD
2000-01-01 open Assets:C USD
";
        let mut o = opts();
        o.sort = true;
        let formatted = format_source(source, &o).unwrap();
        let pushtag_pos = formatted.find("pushtag").unwrap();
        let before = &formatted[..pushtag_pos];
        let after = &formatted[pushtag_pos..];
        assert!(before.contains("Assets:A") && before.contains("Assets:B"));
        assert!(after.contains("Assets:C") && after.contains("Assets:D"));
    }

    #[test]
    fn sort_never_crosses_a_pushmeta_compartment_barrier() {
        let source = "\
2000-02-02 open Assets:B USD
2000-02-01 open Assets:A USD

pushmeta foo: \"bar\"

2000-01-02 open Assets:D USD
2000-01-01 open Assets:C USD
";
        let mut o = opts();
        o.sort = true;
        let formatted = format_source(source, &o).unwrap();
        let pushmeta_pos = formatted.find("pushmeta").unwrap();
        let before = &formatted[..pushmeta_pos];
        let after = &formatted[pushmeta_pos..];
        assert!(before.contains("Assets:A") && before.contains("Assets:B"));
        assert!(after.contains("Assets:C") && after.contains("Assets:D"));
    }

    #[test]
    fn claimed_leading_comment_joins_following_directive_block() {
        let source = "; a note\n2000-01-01 open Assets:Foo USD\n";
        let formatted = format_source(source, &opts()).unwrap();
        assert_eq!(formatted, "; a note\n2000-01-01 open Assets:Foo USD\n");
    }

    #[test]
    fn undated_directives_keep_their_inline_comment() {
        let source = "\
include \"accounts.bean\" ; third-party import
pushtag #trip ; business travel
pushmeta location: \"office\" ; default
popmeta location: ; done
poptag #trip ; end trip
option \"operating_currency\" \"USD\" ; base currency
plugin \"beancount.plugin.auto\" ; auto
";
        let formatted = format_source(source, &opts()).unwrap();
        assert_eq!(formatted, source);
    }
}
