//! Whitespace tokenizer for command-line style argument strings (§4.7).
//!
//! Splits on top-level whitespace, treating whitespace inside `"`/`'`
//! quotes or balanced `{}`/`[]`/`()` brackets as part of the current token.
//! A backslash escapes the following character, which is copied into the
//! token literally and never treated as a delimiter or bracket.

/// Split `input` into tokens per the rules above. An unterminated quote or
/// bracket run simply consumes the rest of the input into the final token
/// rather than erroring — the caller (JSON/argument parsing) surfaces any
/// resulting malformed-value error instead.
#[must_use]
pub fn tokenize(input: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut chars = input.chars().peekable();
    let mut quote: Option<char> = None;
    let mut bracket_stack: Vec<char> = Vec::new();
    let mut in_token = false;

    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                current.push(next);
                in_token = true;
            }
            continue;
        }

        if let Some(q) = quote {
            current.push(c);
            if c == q {
                quote = None;
            }
            continue;
        }

        if !bracket_stack.is_empty() {
            current.push(c);
            match c {
                '{' | '[' | '(' => bracket_stack.push(closing_for(c)),
                '}' | ']' | ')' if bracket_stack.last() == Some(&c) => {
                    bracket_stack.pop();
                },
                _ => {},
            }
            continue;
        }

        match c {
            '"' | '\'' => {
                quote = Some(c);
                current.push(c);
                in_token = true;
            },
            '{' | '[' | '(' => {
                bracket_stack.push(closing_for(c));
                current.push(c);
                in_token = true;
            },
            c if c.is_whitespace() => {
                if in_token {
                    tokens.push(std::mem::take(&mut current));
                    in_token = false;
                }
            },
            c => {
                current.push(c);
                in_token = true;
            },
        }
    }

    if in_token || !current.is_empty() {
        tokens.push(current);
    }

    tokens
}

fn closing_for(open: char) -> char {
    match open {
        '{' => '}',
        '[' => ']',
        '(' => ')',
        _ => unreachable!("closing_for called with non-bracket char"),
    }
}

/// Strip a single layer of matching surrounding quotes, if present.
#[must_use]
pub fn unquote(token: &str) -> String {
    let bytes = token.as_bytes();
    if bytes.len() >= 2 {
        let first = bytes[0];
        let last = bytes[bytes.len() - 1];
        if (first == b'"' || first == b'\'') && first == last {
            return token[1..token.len() - 1].to_string();
        }
    }
    token.to_string()
}

/// Find the index of the first top-level (not inside quotes/brackets) `=`
/// in `token`, used to detect and split `key=value` style arguments (§4.7
/// style 2).
#[must_use]
pub fn top_level_eq(token: &str) -> Option<usize> {
    let mut quote: Option<char> = None;
    let mut bracket_stack: Vec<char> = Vec::new();
    let mut chars = token.char_indices().peekable();

    while let Some((idx, c)) = chars.next() {
        if c == '\\' {
            chars.next();
            continue;
        }
        if let Some(q) = quote {
            if c == q {
                quote = None;
            }
            continue;
        }
        if !bracket_stack.is_empty() {
            match c {
                '{' | '[' | '(' => bracket_stack.push(closing_for(c)),
                '}' | ']' | ')' if bracket_stack.last() == Some(&c) => {
                    bracket_stack.pop();
                },
                _ => {},
            }
            continue;
        }
        match c {
            '"' | '\'' => quote = Some(c),
            '{' | '[' | '(' => bracket_stack.push(closing_for(c)),
            '=' => return Some(idx),
            _ => {},
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_plain_whitespace() {
        assert_eq!(tokenize("London 3"), vec!["London", "3"]);
    }

    #[test]
    fn keeps_quoted_whitespace_together() {
        assert_eq!(tokenize(r#""New York" 5"#), vec![r#""New York""#, "5"]);
    }

    #[test]
    fn keeps_bracketed_whitespace_together() {
        assert_eq!(tokenize("coords=[1, 2] label=x"), vec!["coords=[1, 2]", "label=x"]);
    }

    #[test]
    fn backslash_escapes_a_space() {
        assert_eq!(tokenize(r"New\ York 5"), vec!["New York", "5"]);
    }

    #[test]
    fn unquote_strips_matching_quotes_only() {
        assert_eq!(unquote(r#""London""#), "London");
        assert_eq!(unquote("London"), "London");
        assert_eq!(unquote("\"mismatched'"), "\"mismatched'");
    }

    #[test]
    fn top_level_eq_ignores_equals_inside_brackets() {
        assert_eq!(top_level_eq("coords=[a=1]"), Some(6));
        assert_eq!(top_level_eq("[a=1]"), None);
    }

    #[test]
    fn top_level_eq_ignores_equals_inside_quotes() {
        assert_eq!(top_level_eq(r#"label="a=b""#), Some(5));
    }
}
