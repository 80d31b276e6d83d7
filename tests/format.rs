// SPDX-FileCopyrightText: 2025 Robin Vobruba <hoijui.quaero@gmail.com>
//
// SPDX-License-Identifier: Apache-2.0

//! Whole-file formatting behavior, exercised through the public
//! `format_source` entry point rather than any single module's internals.
//! Replaces the turtle/RDF-specific `w3c_testsuite.rs` network-fetch
//! suite, which has no counterpart in this domain.

use pretty_assertions::assert_eq;

use ledger_fmt::options::ThousandsSeparator;
use ledger_fmt::{format_source, FormatOptions};

fn opts() -> FormatOptions {
    FormatOptions::default()
}

#[test]
fn formats_a_whole_file_of_mixed_directives() {
    let source = "\
2000-01-01 open Assets:Checking USD

2000-01-01 open Expenses:Groceries USD

2000-01-15 * \"Market\" \"Groceries\"
    Assets:Checking  -42.17 USD
    Expenses:Groceries
";
    let formatted = format_source(source, &opts()).unwrap();
    assert_eq!(formatted, source);
}

#[test]
fn reformats_misaligned_postings_and_header() {
    let source =
        "2000-01-15 *  \"Market\"   \"Groceries\"\n  Assets:Checking -42.17   USD\n  Expenses:Groceries\n";
    let formatted = format_source(source, &opts()).unwrap();
    assert_eq!(
        formatted,
        "2000-01-15 * \"Market\" \"Groceries\"\n    Assets:Checking                                                      -42.17 USD\n    Expenses:Groceries\n"
    );
}

#[test]
fn is_idempotent_across_the_whole_file() {
    let source = "\
2000-02-02 open Assets:B USD
2000-02-01 open Assets:A USD

2000-03-01 * \"x\"
    Assets:A  1.00 USD
    Assets:B
";
    let once = format_source(source, &opts()).unwrap();
    let twice = format_source(&once, &opts()).unwrap();
    assert_eq!(once, twice);
}

#[test]
fn thousands_separator_remove_strips_existing_grouping() {
    let mut o = opts();
    o.thousands_separator = ThousandsSeparator::Remove;
    let source = "2000-01-01 * \"x\"\n    Assets:Foo  1,234,567.89 USD\n    Equity:Foo\n";
    let formatted = format_source(source, &o).unwrap();
    assert!(formatted.contains("1234567.89"));
    assert!(!formatted.contains(','));
}

#[test]
fn custom_indent_is_honored_for_posting_lines() {
    let mut o = opts();
    o.indent = "\t".to_string();
    let source = "2000-01-01 * \"x\"\n Assets:Foo  1.00 USD\n Equity:Foo\n";
    let formatted = format_source(source, &o).unwrap();
    assert!(formatted.lines().nth(1).unwrap().starts_with('\t'));
}

#[test]
fn sort_option_reorders_a_whole_file_compartment() {
    let source = "\
2000-02-02 open Assets:B USD

2000-02-01 open Assets:A USD
";
    let mut o = opts();
    o.sort = true;
    let formatted = format_source(source, &o).unwrap();
    let dates: Vec<&str> = formatted
        .lines()
        .filter(|l| l.starts_with("200"))
        .collect();
    assert_eq!(dates, vec!["2000-02-01 open Assets:A USD", "2000-02-02 open Assets:B USD"]);
}

#[test]
fn malformed_input_surfaces_a_parse_error_rather_than_panicking() {
    let source = "2000-01-01 open\n";
    let result = format_source(source, &opts());
    assert!(result.is_err());
}
