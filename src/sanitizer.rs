//! Cleanup of raw model output before it is shown or stored.
//!
//! The rules run in a fixed order and each one sees the output of the
//! previous one:
//!
//! 1. reasoning blocks (`<think>`, `<thinking>`, `<reasoning>`) are removed
//!    together with their contents, shortest match first; a start tag
//!    without a matching end tag is left for the next rule, and a
//!    self-closing marker such as `<think/>` never opens a block,
//! 2. every remaining `<...>` tag is stripped,
//! 3. runs of two or more blank lines collapse to a single blank line,
//! 4. surrounding whitespace is trimmed.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    // No backreferences in `regex`, so each marker pair is spelled out.
    static ref REASONING_BLOCK: Regex = Regex::new(
        r"(?is)<think\b[^>/]*>.*?</think\s*>|<thinking\b[^>/]*>.*?</thinking\s*>|<reasoning\b[^>/]*>.*?</reasoning\s*>"
    )
    .expect("reasoning block pattern is valid");
    static ref MARKUP_TAG: Regex = Regex::new(r"<[^>]*>").expect("tag pattern is valid");
    static ref BLANK_LINE_RUN: Regex =
        Regex::new(r"\n(?:[^\S\n]*\n){2,}").expect("blank line pattern is valid");
}

/// Strip reasoning blocks and markup from `raw`, collapse blank-line runs and
/// trim. Never fails; markup-only input produces an empty string.
pub fn sanitize(raw: &str) -> String {
    let without_reasoning = REASONING_BLOCK.replace_all(raw, "");
    let without_tags = MARKUP_TAG.replace_all(&without_reasoning, "");
    let collapsed = BLANK_LINE_RUN.replace_all(&without_tags, "\n\n");
    collapsed.trim().to_string()
}
