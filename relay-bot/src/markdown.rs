//! Text normalization applied to every snapshot before it is shown.

const FENCE: &str = "```";

/// Closes an unterminated ``` code block so partial replies render as markup.
///
/// Streamed text is cut at arbitrary points; an odd number of fences means the reply is
/// currently inside a code block.
pub fn ensure_formatting(text: &str) -> String {
    if text.matches(FENCE).count() % 2 == 0 {
        return text.to_string();
    }
    if text.ends_with('\n') {
        format!("{}{}", text, FENCE)
    } else {
        format!("{}\n{}", text, FENCE)
    }
}
