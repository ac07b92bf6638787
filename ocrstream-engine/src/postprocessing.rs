//! Deterministic, order-sensitive text cleanup applied to every recognizer
//! result. Specified precisely (rather than left to the recognizer) so
//! output is byte-equal across runs for a fixed input and engine version.

/// Leading/trailing characters trimmed after whitespace collapse.
const TRIM_CHARS: &[char] = &['.', ',', '!', '?', '*', '-', '|', ' ', '\'', '"'];

/// Runs the full pipeline: strip, collapse multi-space runs, trim punctuation.
/// May return an empty string.
pub fn postprocess(raw: &str) -> String {
    let stripped = raw.trim();
    let collapsed = collapse_spaces(stripped);
    collapsed.trim_matches(TRIM_CHARS).to_string()
}

/// Replaces every run of two or more ASCII spaces with a single space.
/// Other whitespace (tabs, newlines) is left untouched.
fn collapse_spaces(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        if c == ' ' {
            while chars.peek() == Some(&' ') {
                chars.next();
            }
        }
        out.push(c);
    }
    out
}
