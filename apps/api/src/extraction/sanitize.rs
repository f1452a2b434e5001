//! Whitespace and punctuation cleanup applied to every extractor's output.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    /// Bullet glyphs that should open their own line. `-` and `*` are left
    /// alone because they appear inline far more often than as bullets.
    static ref INLINE_BULLET: Regex =
        Regex::new(r"([^\n])[ \t]*([•◦▪▫●○■□►▸‣⁃])").expect("valid bullet regex");
    static ref HORIZONTAL_WS: Regex =
        Regex::new(r"[ \t\u{00A0}\u{2000}-\u{200B}\u{3000}]+").expect("valid whitespace regex");
    static ref SPACE_BEFORE_PUNCT: Regex = Regex::new(r" +([,.;:!?])").expect("valid regex");
    static ref MISSING_SPACE_AFTER: Regex =
        Regex::new(r"([,;])(\p{L})").expect("valid regex");
    static ref EXCESS_NEWLINES: Regex = Regex::new(r"\n{3,}").expect("valid regex");
}

/// Collapses whitespace runs, limits blank lines to one, tidies spacing
/// around punctuation and moves bullet glyphs onto their own line.
/// Idempotent.
pub fn sanitize(raw: &str) -> String {
    let text = raw.replace("\r\n", "\n").replace(['\r', '\u{000C}'], "\n");
    let text = INLINE_BULLET.replace_all(&text, "$1\n$2");
    let text = HORIZONTAL_WS.replace_all(&text, " ");
    let text = SPACE_BEFORE_PUNCT.replace_all(&text, "$1");
    let text = MISSING_SPACE_AFTER.replace_all(&text, "$1 $2");

    let lines: Vec<&str> = text.lines().map(str::trim).collect();
    let joined = lines.join("\n");
    EXCESS_NEWLINES
        .replace_all(&joined, "\n\n")
        .trim()
        .to_string()
}
