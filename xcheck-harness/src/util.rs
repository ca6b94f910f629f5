//! Utility functions for the harness.

/// Converts `\r\n` line endings to `\n`.
pub fn normalize_line_endings(text: &[u8]) -> Vec<u8> {
    let mut result = Vec::with_capacity(text.len());
    let mut iter = text.iter().peekable();

    while let Some(&b) = iter.next() {
        if b == b'\r' && iter.peek() == Some(&&b'\n') {
            continue;
        }
        result.push(b);
    }

    result
}

/// Counts the lines of the given text, the way a line-based reader would: a
/// trailing newline doesn't start another line.
pub fn count_lines(text: &[u8]) -> usize {
    text.split_inclusive(|b| *b == b'\n').count()
}

/// Writes a colored line diff between two texts to a writer.
pub fn write_diff(
    writer: &mut impl std::io::Write,
    indent: usize,
    left: &[u8],
    right: &[u8],
) -> std::io::Result<()> {
    use colored::Colorize;

    let indent_str = " ".repeat(indent);
    let left = String::from_utf8_lossy(left);
    let right = String::from_utf8_lossy(right);

    for d in diff::lines(&left, &right) {
        let formatted = match d {
            diff::Result::Left(l) => std::format!("{indent_str}- {l}").red(),
            diff::Result::Both(l, _) => std::format!("{indent_str}  {l}").bright_black(),
            diff::Result::Right(r) => std::format!("{indent_str}+ {r}").green(),
        };

        writeln!(writer, "{formatted}")?;
    }

    Ok(())
}
