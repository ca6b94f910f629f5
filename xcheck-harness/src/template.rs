//! Expected-output templates and normalization of actual output against them.

use crate::pattern::LineMatcher;

/// Template line that matches zero or more whole lines of actual output.
pub const WILDCARD_LINE: &[u8] = b"########\n";

/// Line substituted into normalized output where a wildcard found no anchor.
pub const WILDCARD_FAIL_LINE: &[u8] = b"######## FAIL\n";

/// One entry of a parsed template.
#[derive(Clone, Debug)]
pub enum ExpectedLine {
    /// Matches a run of zero or more actual lines.
    Wildcard,
    /// Matches a single actual line.
    Pattern {
        /// The line as stored in the template; replaces a matching actual line.
        canonical: Vec<u8>,
        /// Predicate compiled from `canonical`.
        matcher: LineMatcher,
    },
}

impl ExpectedLine {
    /// Parses a single template line (including its newline, if any).
    pub fn parse(line: &[u8]) -> Self {
        if line == WILDCARD_LINE {
            Self::Wildcard
        } else {
            Self::Pattern {
                canonical: line.to_vec(),
                matcher: LineMatcher::compile(line),
            }
        }
    }

    /// Returns the text this entry contributes to the template's literal form.
    pub const fn canonical(&self) -> &[u8] {
        match self {
            Self::Wildcard => WILDCARD_LINE,
            Self::Pattern { canonical, .. } => canonical.as_slice(),
        }
    }
}

/// A parsed expected-output template.
#[derive(Clone, Debug, Default)]
pub struct Template {
    lines: Vec<ExpectedLine>,
}

impl From<Vec<ExpectedLine>> for Template {
    fn from(lines: Vec<ExpectedLine>) -> Self {
        Self { lines }
    }
}

impl Template {
    /// Parses a stored template.
    ///
    /// # Arguments
    ///
    /// * `text` - Template contents, with `\n` line endings.
    pub fn parse(text: &[u8]) -> Self {
        let lines = split_lines_inclusive(text)
            .into_iter()
            .map(ExpectedLine::parse)
            .collect();

        Self { lines }
    }

    /// Returns the parsed entries, in order.
    pub const fn lines(&self) -> &[ExpectedLine] {
        self.lines.as_slice()
    }

    /// Reconstructs the literal text of the template.
    pub fn literal(&self) -> Vec<u8> {
        self.lines.iter().flat_map(|l| l.canonical()).copied().collect()
    }

    /// Canonicalizes actual output against this template.
    ///
    /// Every actual line accepted by its corresponding pattern is replaced by
    /// the pattern's canonical text, and every run of lines absorbed by a
    /// wildcard is replaced by a single wildcard line. The result equals
    /// [`Template::literal`] iff the actual output conforms to the template.
    ///
    /// The wildcard search is greedy and never backtracks: if no line after
    /// the cursor satisfies a wildcard's anchor, a failure marker is written at
    /// the cursor and the remaining output is left as-is.
    ///
    /// # Arguments
    ///
    /// * `actual` - Captured output, with `\n` line endings.
    pub fn normalize(&self, actual: &[u8]) -> Vec<u8> {
        let mut lines: Vec<Vec<u8>> = split_output_lines(actual);
        let mut cursor = 0;

        for (i, entry) in self.lines.iter().enumerate() {
            let anchor = self.lines.get(i + 1);

            if matches!(entry, ExpectedLine::Wildcard) && anchor.is_none() {
                // Nothing to anchor on; swallow everything that's left.
                tracing::debug!(target: "matcher", "trailing wildcard absorbs the rest of the output");
                lines.truncate(cursor);
                lines.push(WILDCARD_LINE.to_vec());
                break;
            }

            if cursor >= lines.len() {
                break;
            }

            match (entry, anchor) {
                (ExpectedLine::Wildcard, Some(anchor)) => {
                    let Some(skip) = lines[cursor..]
                        .iter()
                        .position(|line| entry_matches(anchor, line))
                    else {
                        tracing::debug!(target: "matcher", "wildcard anchor not found after line {cursor}");
                        lines[cursor] = WILDCARD_FAIL_LINE.to_vec();
                        break;
                    };

                    lines.splice(cursor..cursor + skip, [WILDCARD_LINE.to_vec()]);
                    cursor += 1;
                }
                (ExpectedLine::Pattern { canonical, matcher }, _) => {
                    if matcher.is_match(&lines[cursor]) {
                        lines[cursor].clone_from(canonical);
                    } else {
                        tracing::debug!(
                            target: "matcher",
                            "line {cursor} does not match {}",
                            matcher.as_str()
                        );
                    }
                    cursor += 1;
                }
                (ExpectedLine::Wildcard, None) => break,
            }
        }

        lines.concat()
    }
}

fn entry_matches(entry: &ExpectedLine, line: &[u8]) -> bool {
    match entry {
        // Two wildcards in a row can't be produced by a well-formed template;
        // treat the second as matching immediately.
        ExpectedLine::Wildcard => true,
        ExpectedLine::Pattern { matcher, .. } => matcher.is_match(line),
    }
}

/// Splits text into lines, each keeping its `\n` terminator. The last line is
/// returned unterminated if the text doesn't end in a newline.
fn split_lines_inclusive(text: &[u8]) -> Vec<&[u8]> {
    text.split_inclusive(|b| *b == b'\n').collect()
}

/// Splits captured output into lines, each terminated with `\n` (including a
/// final line the target left unterminated).
fn split_output_lines(output: &[u8]) -> Vec<Vec<u8>> {
    split_lines_inclusive(output)
        .into_iter()
        .map(|line| {
            let mut line = line.to_vec();
            if !line.ends_with(b"\n") {
                line.push(b'\n');
            }
            line
        })
        .collect()
}
