// SPDX-FileCopyrightText: 2025 Robin Vobruba <hoijui.quaero@gmail.com>
//
// SPDX-License-Identifier: Apache-2.0

//! Driver: reads one input (file or stdin), parses it, runs the
//! formatting core, and writes the result per `--output-mode`. When
//! `--recursive` is set, also walks every `include` glob reachable from
//! the entry file and formats each matched file in turn.
//!
//! Everything here is an "external collaborator" in the core's own
//! framing (spec §1): flag parsing lives in [`ledger_fmt::cli`], the
//! parser and formatting core live in the library; this binary only
//! wires file I/O and traversal around them.

use std::collections::HashSet;
use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use diffy::{create_patch, PatchFormatter};
use glob::glob;

use ledger_fmt::error::{Error, FmtResult};
use ledger_fmt::node::{Node, NodeKind};
use ledger_fmt::options::{FormatOptions, OutputMode};
use ledger_fmt::{cli, format, parser};

fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(err) => {
            tracing::error!("{err}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> FmtResult<ExitCode> {
    let args = cli::init()?;
    let options = args.format_options();
    let mut visited = HashSet::new();
    format_target(&args.filename, &options, &mut visited)
}

fn is_stdin(path: &Path) -> bool {
    path.as_os_str() == "-"
}

fn read_source(path: &Path) -> FmtResult<String> {
    if is_stdin(path) {
        let mut buf = String::new();
        io::stdin().read_to_string(&mut buf)?;
        Ok(buf)
    } else {
        fs::read_to_string(path)
            .map_err(|source| Error::FailedToReadTargetFile(path.to_path_buf(), source))
    }
}

/// Strips the surrounding quotes and unescapes a parsed `EscapedString`
/// token's raw text, recovering the glob pattern an `include` directive
/// names.
fn unquote(raw: &str) -> String {
    raw.trim_matches('"').replace("\\\"", "\"").replace("\\\\", "\\")
}

/// Every `include` directive's glob text plus its 1-indexed source line,
/// for `--recursive` traversal and `UnknownInclude` error reporting.
fn include_globs(node: &Node) -> Vec<(String, usize)> {
    let Some(file) = node.as_tree() else {
        return Vec::new();
    };
    file.children_named("entity")
        .filter_map(|entity| entity.as_tree())
        .filter(|tree| tree.kind == NodeKind::Include)
        .filter_map(|tree| {
            let token = tree.child("glob")?.as_token()?;
            Some((unquote(&token.text), token.position.line + 1))
        })
        .collect()
}

fn format_target(
    path: &Path,
    options: &FormatOptions,
    visited: &mut HashSet<PathBuf>,
) -> FmtResult<ExitCode> {
    if !is_stdin(path) {
        let canonical = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
        if !visited.insert(canonical) {
            return Ok(ExitCode::SUCCESS);
        }
    }

    tracing::debug!(path = %path.display(), "formatting file");
    let original = read_source(path)?;
    let formatted = format::format_source(&original, options)?;
    let mut exit_code = write_output(path, &original, &formatted, options)?;

    if options.recursive && !is_stdin(path) {
        let node = parser::parse(&original)?;
        let dir = path.parent().map_or_else(|| PathBuf::from("."), Path::to_path_buf);
        for (raw_glob, line) in include_globs(&node) {
            let child_code = follow_include(path, &dir, &raw_glob, line, options, visited)?;
            if child_code != ExitCode::SUCCESS {
                exit_code = child_code;
            }
        }
    }

    Ok(exit_code)
}

fn follow_include(
    referrer: &Path,
    dir: &Path,
    raw_glob: &str,
    line: usize,
    options: &FormatOptions,
    visited: &mut HashSet<PathBuf>,
) -> FmtResult<ExitCode> {
    let unknown = || Error::UnknownInclude {
        referrer: referrer.to_path_buf(),
        line,
        glob: raw_glob.to_string(),
    };
    let pattern = dir.join(raw_glob);
    let pattern_str = pattern.to_string_lossy().into_owned();
    let mut exit_code = ExitCode::SUCCESS;
    let mut matched_any = false;
    for entry in glob(&pattern_str).map_err(|_| unknown())? {
        let entry = entry.map_err(|_| unknown())?;
        matched_any = true;
        let child_code = format_target(&entry, options, visited)?;
        if child_code != ExitCode::SUCCESS {
            exit_code = child_code;
        }
    }
    if matched_any {
        Ok(exit_code)
    } else {
        tracing::warn!(referrer = %referrer.display(), line, glob = raw_glob, "include matched no file");
        Err(unknown())
    }
}

fn write_output(
    path: &Path,
    original: &str,
    formatted: &str,
    options: &FormatOptions,
) -> FmtResult<ExitCode> {
    match options.output_mode {
        OutputMode::Stdout => {
            print!("{formatted}");
            io::stdout().flush()?;
            Ok(ExitCode::SUCCESS)
        }
        OutputMode::Diff => {
            if original == formatted {
                return Ok(ExitCode::SUCCESS);
            }
            eprintln!("{} is not formatted", path.display());
            let patch = create_patch(original, formatted);
            println!("{}", PatchFormatter::new().fmt_patch(&patch));
            Ok(ExitCode::from(1))
        }
        OutputMode::Inplace => {
            if original != formatted {
                fs::write(path, formatted)
                    .map_err(|source| Error::FailedToWriteFormattedFile(path.to_path_buf(), source))?;
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}
