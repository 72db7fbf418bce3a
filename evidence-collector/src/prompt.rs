//! Interactive "press ENTER" pauses around a collection run.

use std::io::{self, BufRead, Write};

pub const CONTINUE_PROMPT: &str = "Press ENTER key to continue";
pub const EXIT_PROMPT: &str = "Press ENTER key to exit";

/// Print `message` and block until a line (or end of input) is read.
pub fn acknowledge<R: BufRead, W: Write>(
    input: &mut R,
    output: &mut W,
    message: &str,
) -> io::Result<()> {
    write!(output, "{message}")?;
    output.flush()?;
    let mut line = String::new();
    input.read_line(&mut line)?;
    Ok(())
}
