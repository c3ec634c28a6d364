use alloc::vec::Vec;

/// Matches `text` against a glob `pattern`.
///
/// `*` matches any run of characters (including none), `?` matches exactly
/// one character, and `\` makes the next character literal. Ids are matched
/// as a whole, so `"db.*"` matches `"db.timeout"` but not `"app.db.timeout"`.
pub(super) fn matches(pattern: &str, text: &str) -> bool {
    let pattern: Vec<Token> = tokenize(pattern);
    let text: Vec<char> = text.chars().collect();

    let (mut p, mut t) = (0usize, 0usize);
    // Position of the last `*` seen and the text index it was tried at.
    let mut backtrack: Option<(usize, usize)> = None;

    while t < text.len() {
        match pattern.get(p) {
            Some(Token::Any) => {
                backtrack = Some((p, t));
                p += 1;
                continue;
            }
            Some(Token::One) => {
                p += 1;
                t += 1;
                continue;
            }
            Some(Token::Literal(c)) if *c == text[t] => {
                p += 1;
                t += 1;
                continue;
            }
            _ => {}
        }
        match backtrack {
            Some((star, tried)) => {
                p = star + 1;
                t = tried + 1;
                backtrack = Some((star, tried + 1));
            }
            None => return false,
        }
    }

    pattern[p..].iter().all(|token| matches!(token, Token::Any))
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Token {
    Any,
    One,
    Literal(char),
}

fn tokenize(pattern: &str) -> Vec<Token> {
    let mut tokens = Vec::with_capacity(pattern.len());
    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        tokens.push(match c {
            '*' => {
                // Consecutive stars behave like one.
                if tokens.last() == Some(&Token::Any) {
                    continue;
                }
                Token::Any
            }
            '?' => Token::One,
            '\\' => Token::Literal(chars.next().unwrap_or('\\')),
            c => Token::Literal(c),
        });
    }
    tokens
}

#[cfg(test)]
mod tests {
    use super::matches;

    #[test]
    fn test_literal() {
        assert!(matches("db.timeout", "db.timeout"));
        assert!(!matches("db.timeout", "db.timeouts"));
        assert!(!matches("db.timeout", "db"));
        assert!(matches("", ""));
        assert!(!matches("", "x"));
    }

    #[test]
    fn test_star() {
        assert!(matches("db.*", "db.timeout"));
        assert!(matches("db.*", "db."));
        assert!(!matches("db.*", "app.db.timeout"));
        assert!(matches("*.timeout", "http.client.timeout"));
        assert!(matches("*", ""));
        assert!(matches("a**b", "axxb"));
        assert!(matches("*a*b*", "xxaxxbxx"));
        assert!(!matches("*a*b", "xxbxxa"));
    }

    #[test]
    fn test_question_mark_and_escape() {
        assert!(matches("v?.api", "v1.api"));
        assert!(!matches("v?.api", "v10.api"));
        assert!(matches(r"what\?", "what?"));
        assert!(!matches(r"what\?", "whatx"));
        assert!(matches(r"\*", "*"));
        assert!(!matches(r"\*", "x"));
    }

    #[test]
    fn test_unicode() {
        assert!(matches("ユーザー.*", "ユーザー.not_found"));
        assert!(matches("?.x", "é.x"));
    }
}
