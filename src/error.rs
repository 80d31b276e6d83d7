// SPDX-FileCopyrightText: 2025 Robin Vobruba <hoijui.quaero@gmail.com>
//
// SPDX-License-Identifier: Apache-2.0

use std::path::PathBuf;
use thiserror::Error;

use crate::parser;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Failed to parse input as a ledger file: {0}")]
    ParseError(#[from] parser::ParseError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Error while reading {0}")]
    FailedToReadTargetFile(PathBuf, #[source] std::io::Error),

    #[error("Error while writing {0}")]
    FailedToWriteFormattedFile(PathBuf, #[source] std::io::Error),

    #[error(
        "`{glob}`, included from {referrer} at line {line}, did not match any file"
    )]
    UnknownInclude {
        referrer: PathBuf,
        line: usize,
        glob: String,
    },

    #[error("--indent must consist only of spaces or only of tabs, got {0:?}")]
    InvalidIndentArg(String),

    #[error("input from stdin (`-`) is incompatible with {0}")]
    IncompatibleFlags(&'static str),

    #[error("Failed to init logging system: {0}")]
    LogInit(#[from] tracing_subscriber::util::TryInitError),

    #[error("Failed to change the logging level: {0}")]
    LogChangeLevel(#[from] tracing_subscriber::reload::Error),
}

pub type FmtResult<T> = std::result::Result<T, Error>;
