// SPDX-FileCopyrightText: 2025 Robin Vobruba <hoijui.quaero@gmail.com>
//
// SPDX-License-Identifier: Apache-2.0

//! `ledger-fmt` — an opinionated auto-formatter for a plain-text,
//! line-oriented double-entry bookkeeping ledger language.
//!
//! The crate is organized leaves-first, the way the core's own component
//! list (see `SPEC_FULL.md` §2) is laid out:
//!
//! - [`lexer`] tokenizes raw source into a flat, position-annotated
//!   token stream.
//! - [`parser`] builds the [`node`] tree from that stream.
//! - [`alignment`] and [`iterating`] are small, shared primitives the
//!   formatter leans on.
//! - [`decoders`] and [`time`] normalize leaf values (numbers, `time`
//!   metadata) without touching the tree shape.
//! - [`sorting`] implements the order-preserving "prudent sort".
//! - [`format`] is the dispatch-over-variants formatter and the
//!   top-level block partitioner, tying all of the above together.
//! - [`options`], [`error`] and [`context`] are the ambient plumbing:
//!   the `FormatOptions` record, the crate-wide `Error`/`FmtResult`, and
//!   the rendering `Context` threaded through dispatch.
//! - [`cli`] is the `clap`-derived argument surface for the binary in
//!   `main.rs`; it depends on nothing else in this list and could be
//!   lifted into a separate binary-only crate without disturbing the
//!   formatting core.

pub mod alignment;
pub mod cli;
pub mod context;
pub mod decoders;
pub mod error;
pub mod format;
pub mod iterating;
pub mod lexer;
pub mod node;
pub mod options;
pub mod parser;
pub mod sorting;
pub mod time;

pub use error::{Error, FmtResult};
pub use format::format_source;
pub use options::FormatOptions;

/// The crate's own version, exposed for `--version` output in `main.rs`.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
