//! Terminal output for tailed records and fatal errors.
//!
//! Records go to stdout one per line; diagnostics go to stderr so that the
//! record stream can be piped.

use std::io::{self, Write};

use owo_colors::OwoColorize;

/// Write rendered records, one per line, and flush.
///
/// # Errors
///
/// Returns an error if the writer fails, e.g. on a closed pipe.
pub fn write_lines<W: Write>(out: &mut W, lines: &[String]) -> io::Result<()> {
    for line in lines {
        writeln!(out, "{line}")?;
    }
    out.flush()
}

/// Print a fatal error to stderr.
pub fn print_fatal(message: &str) {
    eprintln!("{} {}", "[ERROR]".red().bold(), message.red());
    let _ = io::stderr().flush();
}
