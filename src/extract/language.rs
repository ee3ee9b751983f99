//! Code language detection and tokenization
//!
//! Detection first honors `language-*` / `lang-*` class hints as written by
//! common highlighters, then falls back to keyword scoring over a fixed set
//! of languages.

/// Languages the keyword heuristics can recognize
pub const KNOWN_LANGUAGES: &[&str] = &[
    "python",
    "solidity",
    "rust",
    "javascript",
    "typescript",
    "nextjs",
    "react",
    "nodejs",
];

/// Label for code no rule recognized
pub const UNKNOWN_LANGUAGE: &str = "unknown";

/// Marker substrings per language, most specific languages first
///
/// Ties are broken by this order, so frameworks win over the plain language
/// they are written in.
const MARKERS: &[(&str, &[&str])] = &[
    (
        "solidity",
        &["pragma solidity", "contract ", "msg.sender", "uint256", "address public"],
    ),
    (
        "nextjs",
        &["next/", "getServerSideProps", "getStaticProps", "useRouter", "NextPage"],
    ),
    (
        "react",
        &["useState", "useEffect", "React.", "from 'react'", "from \"react\"", "className="],
    ),
    (
        "nodejs",
        &["require(", "module.exports", "process.env", "__dirname", "createServer"],
    ),
    (
        "typescript",
        &[": string", ": number", ": boolean", "interface ", "as const", "<T>"],
    ),
    (
        "rust",
        &["fn ", "let mut ", "impl ", "pub fn", "#[derive", "println!", "::new("],
    ),
    (
        "python",
        &["def ", "import ", "self.", "elif ", "print(", "__init__", "None"],
    ),
    (
        "javascript",
        &["function ", "const ", "=>", "console.log", "var ", "document."],
    ),
];

/// Maps a highlighter class suffix to a language name
fn canonical_language(name: &str) -> String {
    let name = name.to_ascii_lowercase();
    let canonical = match name.as_str() {
        "py" | "python3" => "python",
        "js" | "mjs" | "cjs" => "javascript",
        "ts" => "typescript",
        "rs" => "rust",
        "sol" => "solidity",
        "jsx" | "tsx" => "react",
        "node" => "nodejs",
        "next" => "nextjs",
        _ => return name,
    };
    canonical.to_string()
}

/// Reads a language out of a class attribute like `language-rust hljs`
fn language_from_classes(classes: &str) -> Option<String> {
    classes.split_whitespace().find_map(|class| {
        let name = class
            .strip_prefix("language-")
            .or_else(|| class.strip_prefix("lang-"))?;
        (!name.is_empty()).then(|| canonical_language(name))
    })
}

/// Detects the language of a code sample
///
/// Returns the class hint's language when one is present, otherwise the
/// best-scoring entry of [`KNOWN_LANGUAGES`], or [`UNKNOWN_LANGUAGE`].
pub fn detect_language(code: &str, class_hint: Option<&str>) -> String {
    if let Some(language) = class_hint.and_then(language_from_classes) {
        return language;
    }

    let mut best: Option<(&str, usize)> = None;
    for (language, markers) in MARKERS {
        let score = markers.iter().filter(|m| code.contains(*m)).count();
        if score > 0 && best.map_or(true, |(_, top)| score > top) {
            best = Some((language, score));
        }
    }

    best.map_or(UNKNOWN_LANGUAGE, |(language, _)| language)
        .to_string()
}

/// Splits code into lexical tokens
///
/// Identifier / number runs form one token; string literals stay whole;
/// every other non-whitespace character is its own token.
pub fn tokenize(code: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut chars = code.char_indices().peekable();

    while let Some((start, c)) = chars.next() {
        if c.is_whitespace() {
            continue;
        }

        let mut end = start + c.len_utf8();

        if c.is_alphanumeric() || c == '_' {
            while let Some(&(i, next)) = chars.peek() {
                if !(next.is_alphanumeric() || next == '_') {
                    break;
                }
                end = i + next.len_utf8();
                chars.next();
            }
        } else if c == '"' || c == '\'' || c == '`' {
            let mut escaped = false;
            for (i, next) in chars.by_ref() {
                end = i + next.len_utf8();
                if escaped {
                    escaped = false;
                } else if next == '\\' {
                    escaped = true;
                } else if next == c || next == '\n' {
                    break;
                }
            }
        }

        tokens.push(code[start..end].to_string());
    }

    tokens
}
