// SPDX-FileCopyrightText: 2025 Robin Vobruba <hoijui.quaero@gmail.com>
//
// SPDX-License-Identifier: Apache-2.0

//! Argument parsing and logging bootstrap for the `ledger-fmt` binary.
//! The flag set is exactly spec §6.2; everything else (file I/O, the
//! recursive `include` walk, diff/inplace output) lives in `main.rs`.

use std::path::PathBuf;

use clap::{crate_name, Parser};
use cli_utils::logging;
use const_format::formatcp;
use tracing_subscriber::filter::LevelFilter;

use crate::error::{Error, FmtResult};
use crate::options::{FormatOptions, OutputMode, ThousandsSeparator};

const A_S_QUIET: char = 'q';
const A_L_QUIET: &str = "quiet";
const A_S_VERBOSE: char = 'v';
const A_L_VERBOSE: &str = "verbose";

/// Pretty-prints plain-text double-entry bookkeeping ledger files.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Ledger file to format. Pass `-` to read from standard input, in
    /// which case `--recursive` and `--output-mode=inplace` are rejected.
    #[arg(value_name = "FILE")]
    pub filename: PathBuf,

    /// Spaces or tabs used for one level of indentation.
    #[arg(long, default_value = "    ")]
    pub indent: String,

    /// Column at which a directive's currency/amount is left-aligned,
    /// when the line is short enough to make room for it.
    #[arg(long, default_value_t = 80)]
    pub currency_column: usize,

    /// Column at which a posting's cost or price annotation is aligned.
    #[arg(long, default_value_t = 85)]
    pub cost_column: usize,

    /// Column at which an inline comment is aligned. `0` disables it.
    #[arg(long, default_value_t = 0)]
    pub inline_comment_column: usize,

    /// Where to send the formatted result.
    #[arg(long, value_enum, default_value = "stdout")]
    pub output_mode: OutputMode,

    /// How to rewrite the thousands-grouping of numeric literals.
    #[arg(long, value_enum, default_value = "keep")]
    pub thousands_separator: ThousandsSeparator,

    /// Insert a padding space just inside non-empty cost braces.
    #[arg(long)]
    pub spaces_in_braces: bool,

    /// Run the prudent sorter over each compartment of top-level blocks.
    #[arg(long)]
    pub sort: bool,

    /// Follow `include` globs, relative to each visited file, and format
    /// every file they match too.
    #[arg(long)]
    pub recursive: bool,

    /// Minimize or suppress log output to stderr.
    #[arg(
        short = A_S_QUIET,
        long = A_L_QUIET,
        conflicts_with = A_L_VERBOSE,
        help = formatcp!("Minimize or suppress log output to stderr. Conflicts with -{A_S_VERBOSE},--{A_L_VERBOSE}.")
    )]
    pub quiet: bool,

    /// More verbose log output, useful for debugging.
    #[arg(
        short = A_S_VERBOSE,
        long = A_L_VERBOSE,
        help = formatcp!("More verbose log output, useful for debugging. Conflicts with -{A_S_QUIET},--{A_L_QUIET}.")
    )]
    pub verbose: bool,
}

impl Args {
    /// The formatting-core subset of these flags.
    #[must_use]
    pub fn format_options(&self) -> FormatOptions {
        FormatOptions {
            indent: self.indent.clone(),
            currency_column: self.currency_column,
            cost_column: self.cost_column,
            inline_comment_column: self.inline_comment_column,
            thousands_separator: self.thousands_separator,
            spaces_in_braces: self.spaces_in_braces,
            sort: self.sort,
            recursive: self.recursive,
            output_mode: self.output_mode,
        }
    }

    fn is_stdin(&self) -> bool {
        self.filename.as_os_str() == "-"
    }

    /// Validates the driver-level constraints from spec §7 that the
    /// formatting core itself does not know about: stdin input is
    /// incompatible with `--recursive` and in-place writing, and
    /// `--indent` must be homogeneous whitespace.
    fn validate(&self) -> FmtResult<()> {
        if self.is_stdin() {
            if self.recursive {
                return Err(Error::IncompatibleFlags("--recursive"));
            }
            if matches!(self.output_mode, OutputMode::Inplace) {
                return Err(Error::IncompatibleFlags("--output-mode=inplace"));
            }
        }
        let all_spaces = self.indent.chars().all(|c| c == ' ');
        let all_tabs = self.indent.chars().all(|c| c == '\t');
        if !self.indent.is_empty() && !all_spaces && !all_tabs {
            return Err(Error::InvalidIndentArg(self.indent.clone()));
        }
        Ok(())
    }
}

/// Parses arguments, validates the driver-level constraints, and brings
/// up logging. Called once at the top of `main`.
pub fn init() -> FmtResult<Args> {
    let log_reload_handle = logging::setup(crate_name!())?;
    let args = Args::parse();

    let log_level = if args.verbose {
        LevelFilter::TRACE
    } else if args.quiet {
        LevelFilter::WARN
    } else {
        LevelFilter::INFO
    };
    logging::set_log_level_tracing(&log_reload_handle, log_level)?;

    args.validate()?;
    Ok(args)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn command_is_well_formed() {
        Args::command().debug_assert();
    }

    #[test]
    fn stdin_rejects_recursive() {
        let args = Args {
            filename: PathBuf::from("-"),
            recursive: true,
            ..Args::parse_from(["ledger-fmt", "-"])
        };
        assert!(matches!(args.validate(), Err(Error::IncompatibleFlags(_))));
    }

    #[test]
    fn stdin_rejects_inplace() {
        let args = Args {
            filename: PathBuf::from("-"),
            output_mode: OutputMode::Inplace,
            ..Args::parse_from(["ledger-fmt", "-"])
        };
        assert!(matches!(args.validate(), Err(Error::IncompatibleFlags(_))));
    }

    #[test]
    fn mixed_indent_is_rejected() {
        let args = Args {
            indent: " \t".to_string(),
            ..Args::parse_from(["ledger-fmt", "foo.bean"])
        };
        assert!(matches!(args.validate(), Err(Error::InvalidIndentArg(_))));
    }

    #[test]
    fn default_indent_is_accepted() {
        let args = Args::parse_from(["ledger-fmt", "foo.bean"]);
        assert!(args.validate().is_ok());
    }
}
