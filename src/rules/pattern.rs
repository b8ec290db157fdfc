use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};
use tracing::trace;

// (?=  (?!  (?<=  (?<!
static LOOKAROUND_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"\(\?<?[=!]").unwrap());

const FLEXIBLE_WHITESPACE: &str = r"[\s._-]+";
const STRICT_WHITESPACE: &str = r"\s+";
const OPTIONAL_CHAR: &str = ".?";

/// Build a regex matching `title` in release names.
///
/// Whitespace runs become `[\s._-]+` when `flexible_whitespace` is set, so
/// "Spy x Family" also matches "Spy.x.Family". With `flexible_punctuation`
/// every punctuation character becomes optional (`.?`).
pub fn title_to_regex(title: &str, flexible_whitespace: bool, flexible_punctuation: bool) -> String {
    let mut pattern = String::with_capacity(title.len() * 2);
    let mut in_whitespace = false;

    for c in title.trim().chars() {
        if c.is_whitespace() {
            if !in_whitespace {
                pattern.push_str(if flexible_whitespace {
                    FLEXIBLE_WHITESPACE
                } else {
                    STRICT_WHITESPACE
                });
            }
            in_whitespace = true;
            continue;
        }
        in_whitespace = false;

        if flexible_punctuation && !c.is_alphanumeric() {
            pattern.push_str(OPTIONAL_CHAR);
        } else {
            let mut buf = [0u8; 4];
            pattern.push_str(&regex::escape(c.encode_utf8(&mut buf)));
        }
    }

    pattern
}

/// qBittorrent regexes are case-insensitive
pub fn compile(pattern: &str) -> Result<Regex, regex::Error> {
    RegexBuilder::new(pattern).case_insensitive(true).build()
}

/// Whether `pattern` uses lookaround groups, which qBittorrent's PCRE engine
/// accepts but [`compile`] cannot
pub fn uses_lookaround(pattern: &str) -> bool {
    LOOKAROUND_REGEX.is_match(pattern)
}

/// Split a qBittorrent expression into its `|` alternatives
pub fn alternatives(expression: &str) -> impl Iterator<Item = &str> {
    expression.split('|').map(str::trim).filter(|alt| !alt.is_empty())
}

fn wildcard_to_regex(word: &str) -> String {
    regex::escape(word).replace(r"\*", ".*").replace(r"\?", ".")
}

/// Non-regex expression: any alternative whose words all occur in `text`.
///
/// Words may use `*` and `?` wildcards. An empty expression matches everything.
pub fn matches_wildcard_expression(expression: &str, text: &str) -> bool {
    let mut alts = alternatives(expression).peekable();
    if alts.peek().is_none() {
        return true;
    }

    alts.any(|alt| {
        alt.split_whitespace().all(|word| match compile(&wildcard_to_regex(word)) {
            Ok(re) => re.is_match(text),
            Err(e) => {
                trace!(word = %word, error = %e, "Unusable wildcard word");
                false
            }
        })
    })
}

/// Regex expression: an empty expression matches everything, an invalid one nothing
pub fn matches_regex_expression(expression: &str, text: &str) -> bool {
    if expression.trim().is_empty() {
        return true;
    }
    match compile(expression) {
        Ok(re) => re.is_match(text),
        Err(e) => {
            trace!(pattern = %expression, error = %e, "Invalid rule regex");
            false
        }
    }
}
