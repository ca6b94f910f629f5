//! Comparison of expected and actual output.

use crate::channel::TargetOutput;
use crate::template::Template;

/// Text recorded in failure artifacts in place of expected output when the
/// oracle failed.
pub const ORACLE_CRASH_OUTPUT: &[u8] = b"ORACLE CRASH";

/// Text recorded in failure artifacts in place of expected output when the
/// stored template exists but could not be read.
pub const UNREADABLE_TEMPLATE_OUTPUT: &[u8] = b"UNREADABLE TEMPLATE";

/// Where a test's expected output came from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ExpectedOutput {
    /// Read from the test's stored template.
    Template(Vec<u8>),
    /// Computed by running the oracle.
    Oracle(Vec<u8>),
    /// The oracle failed.
    OracleCrash(String),
    /// The stored template exists but could not be read.
    UnreadableTemplate(String),
}

impl ExpectedOutput {
    /// Returns the expected text (and the text persisted on failure).
    pub const fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Template(text) | Self::Oracle(text) => text.as_slice(),
            Self::OracleCrash(_) => ORACLE_CRASH_OUTPUT,
            Self::UnreadableTemplate(_) => UNREADABLE_TEMPLATE_OUTPUT,
        }
    }

    /// Returns the number of individual assertions (expected lines) this
    /// output represents.
    pub fn assertion_count(&self) -> usize {
        crate::util::count_lines(self.as_bytes())
    }
}

/// Comparison of one test's output.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OutputComparison {
    /// Outputs match.
    Same,
    /// Outputs differ.
    TestDiffers {
        /// Expected text, as compared.
        expected: Vec<u8>,
        /// Actual text, as compared (normalized, for special tests).
        actual: Vec<u8>,
    },
}

impl OutputComparison {
    /// Returns whether this comparison indicates a failure.
    pub const fn is_failure(&self) -> bool {
        matches!(self, Self::TestDiffers { .. })
    }
}

/// Compares a test's actual output against its expected output.
///
/// Both are assumed to use `\n` line endings already. Special tests have
/// their actual output normalized against the expected output (read as a
/// template) first; other tests must match exactly.
///
/// # Arguments
///
/// * `expected` - The expected output.
/// * `actual` - What the target produced; must not be [`TargetOutput::Skip`].
/// * `special` - Whether to normalize before comparing.
pub fn compare_output(
    expected: &ExpectedOutput,
    actual: &TargetOutput,
    special: bool,
) -> OutputComparison {
    let differs = |actual: Vec<u8>| OutputComparison::TestDiffers {
        expected: expected.as_bytes().to_vec(),
        actual,
    };

    let (ExpectedOutput::Template(expected_text) | ExpectedOutput::Oracle(expected_text)) =
        expected
    else {
        return differs(actual.as_bytes().to_vec());
    };

    let TargetOutput::Output(actual_text) = actual else {
        return differs(actual.as_bytes().to_vec());
    };

    // A template's literal form is the expected text itself, so normalized
    // output can be compared against it directly.
    let actual_text = if special {
        Template::parse(expected_text).normalize(actual_text)
    } else {
        actual_text.clone()
    };

    if actual_text == *expected_text {
        OutputComparison::Same
    } else {
        differs(actual_text)
    }
}
