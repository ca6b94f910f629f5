//! Compilation of expected-output lines into line matchers.
//!
//! A template line is literal text, except that the characters
//! `( ) [ ] { } . * + ^ $` keep their regular-expression meaning. This lets a
//! test author mark exactly the positions of a line that are allowed to vary
//! between runs, e.g. `<object at 0x........>`. Prefixing one of those
//! characters with a backslash asks for the literal character instead.

/// Line terminator accepted after a newline-terminated template line. Targets
/// may emit any number of carriage returns before the newline.
const RELAXED_NEWLINE: &str = r"\r*\n";

/// What a bare `.` compiles to: any character, or any single byte that isn't
/// part of valid UTF-8.
const ANY_CHAR: &str = r"(?:.|(?-u:[\x80-\xFF]))";

/// Compiled predicate for a single expected-output line.
#[derive(Clone, Debug)]
pub struct LineMatcher {
    regex: regex::bytes::Regex,
}

impl LineMatcher {
    /// Compiles the given template line (including its trailing newline, if any).
    ///
    /// If the line's intentional metacharacters don't form a valid regular
    /// expression, the line is matched literally instead.
    ///
    /// # Arguments
    ///
    /// * `line` - The raw template line.
    pub fn compile(line: &[u8]) -> Self {
        let regex_str = template_line_to_regex_str(line);

        match compile_regex(regex_str.as_str()) {
            Ok(regex) => Self { regex },
            Err(err) => {
                tracing::warn!(
                    target: "matcher",
                    "template line {:?} is not a valid pattern ({err}); matching it literally",
                    String::from_utf8_lossy(line)
                );

                Self::literal(line)
            }
        }
    }

    /// Creates a matcher that accepts only the given line, verbatim (modulo
    /// carriage returns before the final newline).
    ///
    /// # Arguments
    ///
    /// * `line` - The raw template line.
    pub fn literal(line: &[u8]) -> Self {
        let (body, terminated) = split_terminator(line);

        let mut regex_str = String::from(r"\A");
        for piece in body.utf8_chunks() {
            regex_str.push_str(regex::escape(piece.valid()).as_str());
            push_raw_bytes(&mut regex_str, piece.invalid());
        }
        push_line_end(&mut regex_str, terminated);

        // An escaped literal can always be compiled, barring a size limit on
        // absurdly long lines; at that point nothing can match.
        let regex = compile_regex(regex_str.as_str()).unwrap_or_else(|_| never_matches());
        Self { regex }
    }

    /// Returns whether the given actual-output line is accepted.
    ///
    /// # Arguments
    ///
    /// * `actual` - The actual line, including its trailing newline.
    pub fn is_match(&self, actual: &[u8]) -> bool {
        self.regex.is_match(actual)
    }

    /// Returns the regular expression this matcher was compiled to.
    pub fn as_str(&self) -> &str {
        self.regex.as_str()
    }
}

/// Translates a template line into an anchored regular expression.
pub(crate) fn template_line_to_regex_str(line: &[u8]) -> String {
    let (body, terminated) = split_terminator(line);

    let mut result = String::from(r"\A");
    let mut escaped = false;
    let mut in_class = false;

    for piece in body.utf8_chunks() {
        for c in piece.valid().chars() {
            if escaped {
                escaped = false;
                if template_char_is_special(c) {
                    // The author asked for the literal character.
                    result.push('\\');
                    result.push(c);
                } else {
                    // Not an escape we know about; keep the backslash.
                    result.push_str(r"\\");
                    push_literal_char(&mut result, c, in_class);
                }
            } else if c == '\\' {
                escaped = true;
            } else if template_char_is_special(c) {
                match c {
                    '[' => in_class = true,
                    ']' => in_class = false,
                    _ => (),
                }

                if c == '.' && !in_class {
                    result.push_str(ANY_CHAR);
                } else {
                    result.push(c);
                }
            } else {
                push_literal_char(&mut result, c, in_class);
            }
        }

        if !piece.invalid().is_empty() {
            if escaped {
                escaped = false;
                result.push_str(r"\\");
            }
            push_raw_bytes(&mut result, piece.invalid());
        }
    }

    if escaped {
        result.push_str(r"\\");
    }

    push_line_end(&mut result, terminated);

    result
}

const fn template_char_is_special(c: char) -> bool {
    matches!(
        c,
        '(' | ')' | '[' | ']' | '{' | '}' | '.' | '*' | '+' | '^' | '$'
    )
}

fn split_terminator(line: &[u8]) -> (&[u8], bool) {
    match line.strip_suffix(b"\n") {
        Some(body) => (body, true),
        None => (line, false),
    }
}

fn push_literal_char(result: &mut String, c: char, in_class: bool) {
    if in_class && c != '&' && c != '~' {
        // Ranges like `[0-9]` need their `-` left alone.
        result.push(c);
    } else {
        let mut buf = [0; 4];
        result.push_str(regex::escape(c.encode_utf8(&mut buf)).as_str());
    }
}

fn push_raw_bytes(result: &mut String, bytes: &[u8]) {
    const HEX_DIGITS: &[u8; 16] = b"0123456789ABCDEF";

    for b in bytes {
        result.push_str(r"(?-u:\x");
        result.push(char::from(HEX_DIGITS[usize::from(b >> 4)]));
        result.push(char::from(HEX_DIGITS[usize::from(b & 0x0F)]));
        result.push(')');
    }
}

fn push_line_end(result: &mut String, terminated: bool) {
    if terminated {
        result.push_str(RELAXED_NEWLINE);
    } else {
        // Only the very last template line may lack a newline; accept the
        // actual line either way.
        result.push_str("(?:");
        result.push_str(RELAXED_NEWLINE);
        result.push_str(")?");
    }
    result.push_str(r"\z");
}

fn compile_regex(regex_str: &str) -> Result<regex::bytes::Regex, regex::Error> {
    regex::bytes::Regex::new(regex_str)
}

#[expect(clippy::unwrap_used)]
fn never_matches() -> regex::bytes::Regex {
    // Nothing can follow the end of the text.
    regex::bytes::Regex::new(r"\z.").unwrap()
}
