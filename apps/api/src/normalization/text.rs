//! Text-level EHS rules: capitalization, redundant phrases, common mistakes
//! and bullet conversion. Every function here is pure and idempotent.

use lazy_static::lazy_static;
use regex::{Captures, Regex};

/// Words kept lowercase inside a title unless they open it.
const MINOR_WORDS: &[&str] = &["of", "in", "at", "on", "by", "for", "to", "with", "a", "an", "the"];

/// Self-referential lead-ins and the neutral phrasing they collapse to.
/// An empty replacement removes the phrase outright.
const REDUNDANT_PHRASES: &[(&str, &str)] = &[
    ("I am responsible for", "Responsible for"),
    ("I was responsible for", "Responsible for"),
    ("I am in charge of", "In charge of"),
    ("I was in charge of", "In charge of"),
    ("I am tasked with", "Tasked with"),
    ("I was tasked with", "Tasked with"),
    ("My role involves", ""),
    ("My role involved", ""),
    ("My responsibilities include", ""),
    ("My responsibilities included", ""),
    ("My duties include", ""),
    ("My duties included", ""),
    ("I have experience in", "Experienced in"),
    ("References available upon request", ""),
];

/// Word-level confusables and misspellings. No replacement is itself a key.
const COMMON_MISTAKES: &[(&str, &str)] = &[
    ("principle", "principal"),
    ("discrete", "discreet"),
    ("liase", "liaise"),
    ("liasing", "liaising"),
    ("seperate", "separate"),
    ("recieve", "receive"),
    ("acheive", "achieve"),
    ("acheived", "achieved"),
    ("occured", "occurred"),
    ("managment", "management"),
    ("enviroment", "environment"),
    ("experiance", "experience"),
    ("comittee", "committee"),
    ("accomodate", "accommodate"),
    ("succesful", "successful"),
    ("definately", "definitely"),
];

/// Free text longer than this (in chars) is split into sentence bullets.
pub const BULLET_SPLIT_THRESHOLD: usize = 200;

const BULLET_GLYPHS: &[char] = &['•', '◦', '▪', '▫', '●', '○', '■', '□', '►', '▸', '‣', '⁃', '*', '-', '–', '—'];

lazy_static! {
    static ref PHRASE_PATTERNS: Vec<(Regex, &'static str)> = REDUNDANT_PHRASES
        .iter()
        .map(|(phrase, replacement)| {
            let pattern = phrase
                .split_whitespace()
                .map(regex::escape)
                .collect::<Vec<_>>()
                .join(r"\s+");
            (
                Regex::new(&format!(r"(?i)\b{pattern}\b[ \t]*")).expect("valid phrase regex"),
                *replacement,
            )
        })
        .collect();
    static ref MISTAKE_PATTERNS: Vec<(Regex, &'static str)> = COMMON_MISTAKES
        .iter()
        .map(|(wrong, right)| {
            (
                Regex::new(&format!(r"(?i)\b{}\b", regex::escape(wrong))).expect("valid mistake regex"),
                *right,
            )
        })
        .collect();
    static ref MULTI_SPACE: Regex = Regex::new(r"[ \t]{2,}").expect("valid regex");
    static ref SPACE_BEFORE_PUNCT: Regex = Regex::new(r"[ \t]+([,.;:!?])").expect("valid regex");
}

// ────────────────────────────────────────────────────────────────────────────
// Capitalization
// ────────────────────────────────────────────────────────────────────────────

/// Title-cases a name or job title. Minor words stay lowercase except as the
/// first word.
pub fn capitalize_title(text: &str) -> String {
    text.split_whitespace()
        .enumerate()
        .map(|(i, word)| {
            let lower = word.to_lowercase();
            let bare = lower.trim_matches(|c: char| !c.is_alphanumeric());
            if i > 0 && MINOR_WORDS.contains(&bare) {
                lower
            } else {
                capitalize_word(&lower)
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Uppercases the first letter of an already-lowercased word and of every
/// hyphenated part (`mary-jane` → `Mary-Jane`). An apostrophe after a single
/// letter starts a new part too (`o'neil` → `O'Neil`), so `manager's` is left
/// alone.
fn capitalize_word(lower: &str) -> String {
    let mut out = String::with_capacity(lower.len());
    let mut at_start = true;
    let mut letters = 0;
    for c in lower.chars() {
        if c.is_alphabetic() {
            if at_start {
                push_title_case(&mut out, c);
                at_start = false;
            } else {
                out.push(c);
            }
            letters += 1;
            continue;
        }
        out.push(c);
        if c == '-' || (matches!(c, '\'' | '’') && letters == 1) {
            at_start = true;
            letters = 0;
        }
    }
    out
}

/// Pushes the title-case form of `c`. Chars whose uppercase expands to
/// several chars (ligatures such as `ﬁ`, `ß`) keep only the first one
/// uppercase, so a second pass over the output yields the same text.
fn push_title_case(out: &mut String, c: char) {
    let mut upper = c.to_uppercase();
    if let Some(first) = upper.next() {
        out.push(first);
    }
    for rest in upper {
        out.extend(rest.to_lowercase());
    }
}

fn uppercase_first_letter(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut done = false;
    for c in text.chars() {
        if !done && c.is_alphabetic() {
            push_title_case(&mut out, c);
            done = true;
        } else {
            out.push(c);
        }
    }
    out
}

fn lowercase_first_letter(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Redundant phrases
// ────────────────────────────────────────────────────────────────────────────

/// Strips self-referential phrases. Returns the original text when nothing
/// matched, or when stripping would leave nothing behind.
pub fn strip_redundant_phrases(text: &str) -> String {
    let mut current = text.to_string();
    for (pattern, replacement) in PHRASE_PATTERNS.iter() {
        if pattern.is_match(&current) {
            current = replace_phrase(&current, pattern, replacement);
        }
    }
    if current == text {
        return current;
    }

    let tidied = tidy_spacing(&current);
    if tidied.is_empty() {
        text.to_string()
    } else {
        tidied
    }
}

fn replace_phrase(text: &str, pattern: &Regex, replacement: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    let mut capitalize_next = false;

    for m in pattern.find_iter(text) {
        push_segment(&mut out, &text[last..m.start()], &mut capitalize_next);
        let at_sentence_start = is_sentence_start(&out);
        if replacement.is_empty() {
            capitalize_next = at_sentence_start;
        } else {
            if at_sentence_start {
                out.push_str(&uppercase_first_letter(replacement));
            } else {
                out.push_str(&lowercase_first_letter(replacement));
            }
            if m.end() < text.len() {
                out.push(' ');
            }
        }
        last = m.end();
    }
    push_segment(&mut out, &text[last..], &mut capitalize_next);
    out
}

fn push_segment(out: &mut String, segment: &str, capitalize_next: &mut bool) {
    if *capitalize_next && !segment.is_empty() {
        out.push_str(&uppercase_first_letter(segment));
        *capitalize_next = false;
    } else {
        out.push_str(segment);
    }
}

fn is_sentence_start(preceding: &str) -> bool {
    let trimmed = preceding.trim_end_matches([' ', '\t']);
    match trimmed.chars().last() {
        None => true,
        Some(c) => matches!(c, '.' | '!' | '?' | ':' | '\n') || BULLET_GLYPHS.contains(&c),
    }
}

fn tidy_spacing(text: &str) -> String {
    let collapsed = MULTI_SPACE.replace_all(text, " ");
    let attached = SPACE_BEFORE_PUNCT.replace_all(&collapsed, "$1");
    attached.trim().to_string()
}

/// True when any redundant phrase survives in `text`.
pub fn contains_redundant_phrase(text: &str) -> bool {
    PHRASE_PATTERNS.iter().any(|(p, _)| p.is_match(text))
}

// ────────────────────────────────────────────────────────────────────────────
// Common mistakes
// ────────────────────────────────────────────────────────────────────────────

/// Applies the substitution table with word-boundary, case-insensitive
/// matching; the replacement copies the casing shape of the matched word.
pub fn correct_common_mistakes(text: &str) -> String {
    let mut current = text.to_string();
    for (pattern, right) in MISTAKE_PATTERNS.iter() {
        if pattern.is_match(&current) {
            current = pattern
                .replace_all(&current, |caps: &Captures| match_case(&caps[0], right))
                .into_owned();
        }
    }
    current
}

fn match_case(matched: &str, replacement: &str) -> String {
    let letters: Vec<char> = matched.chars().filter(|c| c.is_alphabetic()).collect();
    if letters.len() > 1 && letters.iter().all(|c| c.is_uppercase()) {
        replacement.to_uppercase()
    } else if letters.first().is_some_and(|c| c.is_uppercase()) {
        uppercase_first_letter(replacement)
    } else {
        replacement.to_string()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Bullet conversion
// ────────────────────────────────────────────────────────────────────────────

/// Splits long free text into sentence-level bullet items. Text at or under
/// [`BULLET_SPLIT_THRESHOLD`] chars stays a single (glyph-stripped) item.
pub fn split_into_bullets(text: &str) -> Vec<String> {
    if text.chars().count() <= BULLET_SPLIT_THRESHOLD {
        let single = strip_bullet_glyph(text);
        return vec![if single.is_empty() {
            text.trim().to_string()
        } else {
            single
        }];
    }

    let items: Vec<String> = text
        .lines()
        .flat_map(split_sentences)
        .map(|s| strip_bullet_glyph(&s))
        .filter(|s| !s.is_empty())
        .collect();

    if items.is_empty() {
        vec![text.trim().to_string()]
    } else {
        items
    }
}

/// Splits after `.`, `!` or `?` when followed by whitespace and then an
/// uppercase letter, digit or bullet glyph.
fn split_sentences(line: &str) -> Vec<String> {
    let chars: Vec<(usize, char)> = line.char_indices().collect();
    let mut out = Vec::new();
    let mut start = 0;

    for (i, &(pos, c)) in chars.iter().enumerate() {
        if !matches!(c, '.' | '!' | '?') {
            continue;
        }
        let mut j = i + 1;
        let mut saw_space = false;
        while j < chars.len() && chars[j].1.is_whitespace() {
            saw_space = true;
            j += 1;
        }
        if !saw_space || j >= chars.len() {
            continue;
        }
        let next = chars[j].1;
        if next.is_uppercase() || next.is_ascii_digit() || BULLET_GLYPHS.contains(&next) {
            let end = pos + c.len_utf8();
            out.push(line[start..end].trim().to_string());
            start = chars[j].0;
        }
    }
    let tail = line[start..].trim();
    if !tail.is_empty() {
        out.push(tail.to_string());
    }
    out
}

/// Removes leading bullet glyphs (and the whitespace after each).
pub fn strip_bullet_glyph(text: &str) -> String {
    let mut rest = text.trim();
    while let Some(c) = rest.chars().next() {
        if !BULLET_GLYPHS.contains(&c) {
            break;
        }
        let after = &rest[c.len_utf8()..];
        // "-5% churn" is content, not a bullet.
        if c == '-' && !after.starts_with(char::is_whitespace) {
            break;
        }
        rest = after.trim_start();
    }
    rest.to_string()
}

/// True when text carries typography the EHS template does not allow:
/// doubled spaces or an embedded bullet glyph at a line start.
pub fn has_typography_issue(text: &str) -> bool {
    text.contains("  ")
        || text.lines().any(|l| {
            l.trim_start()
                .chars()
                .next()
                .is_some_and(|c| c != '-' && c != '*' && BULLET_GLYPHS.contains(&c))
        })
}
