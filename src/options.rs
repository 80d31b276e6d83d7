// SPDX-FileCopyrightText: 2025 Robin Vobruba <hoijui.quaero@gmail.com>
//
// SPDX-License-Identifier: Apache-2.0

/// How numeric tokens should be rewritten with respect to thousands
/// separators (`,` inserted every three integer digits).
///
/// Derives `clap::ValueEnum` directly rather than duplicating this as a
/// CLI-local type: `--thousands-separator` parses straight into it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum ThousandsSeparator {
    /// Insert grouping commas.
    Add,
    /// Strip any grouping commas present in the input.
    Remove,
    /// Leave the raw digit text untouched.
    #[default]
    Keep,
}

/// Where the formatted output of a single file should end up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputMode {
    /// Write to standard output.
    #[default]
    Stdout,
    /// Print a unified diff between the original and the formatted text.
    Diff,
    /// Overwrite the input file in place.
    Inplace,
}

/// All knobs the formatting core reads from. Constructed once per CLI
/// invocation and threaded by reference through [`crate::context::Context`];
/// never mutated after construction.
#[derive(Debug, Clone)]
pub struct FormatOptions {
    /// Spaces or tabs representing one level of indentation.
    pub indent: String,
    /// Column (0-indexed) at which a directive's currency/amount should be
    /// left-aligned, when the line is short enough to make room for it.
    pub currency_column: usize,
    /// Column (0-indexed) at which a posting's cost or price annotation
    /// should be aligned.
    pub cost_column: usize,
    /// Column (0-indexed) at which an inline comment should be aligned.
    /// `0` means "alignment disabled".
    pub inline_comment_column: usize,
    /// How to rewrite numeric literals.
    pub thousands_separator: ThousandsSeparator,
    /// Whether to insert a padding space just inside non-empty cost braces.
    pub spaces_in_braces: bool,
    /// Whether to run the prudent sorter over each compartment of blocks.
    pub sort: bool,
    /// Whether to recursively follow `include` directives.
    pub recursive: bool,
    /// Where to send the formatted result.
    pub output_mode: OutputMode,
}

impl Default for FormatOptions {
    fn default() -> Self {
        Self {
            indent: "    ".to_string(),
            currency_column: 80,
            cost_column: 85,
            inline_comment_column: 0,
            thousands_separator: ThousandsSeparator::Keep,
            spaces_in_braces: false,
            sort: false,
            recursive: false,
            output_mode: OutputMode::Stdout,
        }
    }
}

impl FormatOptions {
    /// Whether the inline comment column target is actually active.
    #[must_use]
    pub const fn inline_comment_alignment_enabled(&self) -> bool {
        self.inline_comment_column > 0
    }
}
