use once_cell::sync::Lazy;
use regex::Regex;

// @module: Script-specific whitespace cleanup before line translation

// @const: Any hiragana, katakana or CJK unified ideograph
static CJK_CHAR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\x{3040}-\x{309F}\x{30A0}-\x{30FF}\x{4E00}-\x{9FAF}]").unwrap());

// @const: Whitespace run sitting between two CJK characters
static CJK_GAP: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"([\x{3040}-\x{309F}\x{30A0}-\x{30FF}\x{4E00}-\x{9FAF}])\s+([\x{3040}-\x{309F}\x{30A0}-\x{30FF}\x{4E00}-\x{9FAF}])")
        .unwrap()
});

static WHITESPACE_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Remove spurious spaces between CJK characters, then collapse remaining runs.
///
/// Text without any CJK character is returned untouched.
pub fn normalize_cjk_spacing(text: &str) -> String {
    if !CJK_CHAR.is_match(text) {
        return text.to_string();
    }

    // Matches overlap on the shared character ("あ い う"), so repeat until stable
    let mut current = text.to_string();
    loop {
        let next = CJK_GAP.replace_all(&current, "${1}${2}").into_owned();
        if next == current {
            break;
        }
        current = next;
    }

    WHITESPACE_RUN.replace_all(&current, " ").trim().to_string()
}
