//! If-feature expressions.
//!
//! An expression is a sequence of feature names combined with `not`, `and`,
//! `or` and parentheses. Precedence, from strongest: parentheses, `not`,
//! `and`, `or`; operators of equal precedence bind left to right.
//!
//! # Examples
//!
//! ```
//! use yang_resolver_core::if_feature::{evaluate, tokenize, validate};
//!
//! let tokens = tokenize("(a or c) and not b");
//! assert!(validate(&tokens).is_ok());
//! let supported = ["a", "c"];
//! assert!(evaluate(&tokens, |name| supported.contains(&name)));
//! ```

use std::fmt;

/// One lexical element of an expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// A feature name, possibly prefixed.
    Name(String),
    And,
    Or,
    Not,
    LeftParen,
    RightParen,
}

impl Token {
    fn class(&self) -> TokenClass {
        match self {
            Self::Name(_) => TokenClass::Name,
            Self::And | Self::Or => TokenClass::Binary,
            Self::Not => TokenClass::Not,
            Self::LeftParen => TokenClass::LeftParen,
            Self::RightParen => TokenClass::RightParen,
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Name(name) => f.write_str(name),
            Self::And => f.write_str("and"),
            Self::Or => f.write_str("or"),
            Self::Not => f.write_str("not"),
            Self::LeftParen => f.write_str("("),
            Self::RightParen => f.write_str(")"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TokenClass {
    Name,
    Binary,
    Not,
    LeftParen,
    RightParen,
}

/// Splits an expression into tokens. Whitespace separates words;
/// parentheses are tokens of their own.
pub fn tokenize(input: &str) -> Vec<Token> {
    fn word(buf: &mut String, tokens: &mut Vec<Token>) {
        if buf.is_empty() {
            return;
        }
        let token = match buf.as_str() {
            "and" => Token::And,
            "or" => Token::Or,
            "not" => Token::Not,
            other => Token::Name(other.to_string()),
        };
        tokens.push(token);
        buf.clear();
    }

    let mut tokens = Vec::new();
    let mut buf = String::new();
    for c in input.chars() {
        match c {
            ' ' | '\t' | '\n' | '\r' => word(&mut buf, &mut tokens),
            '(' => {
                word(&mut buf, &mut tokens);
                tokens.push(Token::LeftParen);
            }
            ')' => {
                word(&mut buf, &mut tokens);
                tokens.push(Token::RightParen);
            }
            _ => buf.push(c),
        }
    }
    word(&mut buf, &mut tokens);
    tokens
}

fn allowed_after(previous: Option<TokenClass>) -> &'static [TokenClass] {
    use TokenClass::*;
    match previous {
        None => &[Name, LeftParen, Not],
        Some(Name) | Some(RightParen) => &[Binary, RightParen],
        Some(Binary) => &[Name, Not, LeftParen],
        Some(Not) => &[Name, LeftParen],
        Some(LeftParen) => &[Name, Not, LeftParen],
    }
}

/// Checks token adjacency, parenthesis balance and that at least one
/// feature name is present.
///
/// # Errors
///
/// Returns the message describing the first problem found.
pub fn validate(tokens: &[Token]) -> Result<(), String> {
    if tokens.is_empty() {
        return Err("Missing feature name.".to_string());
    }

    let mut open = 0usize;
    let mut names = 0usize;
    let mut previous = None;

    for token in tokens {
        match token {
            Token::LeftParen => open += 1,
            Token::RightParen => {
                if open == 0 {
                    return Err("Unexpected closing parenthesis.".to_string());
                }
                open -= 1;
            }
            Token::Name(_) => names += 1,
            _ => {}
        }
        if !allowed_after(previous).contains(&token.class()) {
            return Err(format!("Illegal syntax '{token}'."));
        }
        previous = Some(token.class());
    }

    if !matches!(previous, Some(TokenClass::Name) | Some(TokenClass::RightParen)) {
        return Err("Unexpected end of if-feature expression.".to_string());
    }
    if names == 0 {
        return Err("Missing feature name.".to_string());
    }
    if open != 0 {
        return Err("Parenthesis not balanced.".to_string());
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operand {
    Value(bool),
    Not,
    And,
    Or,
}

/// Evaluates a validated expression, asking `is_supported` for the value of
/// every feature name. Every name is resolved exactly once, in order.
///
/// Returns `false` for expressions that fail [`validate`].
pub fn evaluate(tokens: &[Token], mut is_supported: impl FnMut(&str) -> bool) -> bool {
    if validate(tokens).is_err() {
        return false;
    }

    // Each open parenthesis starts a new frame; a closing one reduces it.
    let mut frames: Vec<Vec<Operand>> = vec![Vec::new()];
    for token in tokens {
        match token {
            Token::LeftParen => frames.push(Vec::new()),
            Token::RightParen => {
                let Some(inner) = frames.pop() else {
                    return false;
                };
                let value = reduce(inner);
                match (value, frames.last_mut()) {
                    (Some(v), Some(outer)) => outer.push(Operand::Value(v)),
                    _ => return false,
                }
            }
            Token::Name(name) => {
                let value = is_supported(name);
                if let Some(frame) = frames.last_mut() {
                    frame.push(Operand::Value(value));
                }
            }
            Token::Not => push(&mut frames, Operand::Not),
            Token::And => push(&mut frames, Operand::And),
            Token::Or => push(&mut frames, Operand::Or),
        }
    }

    match frames.pop() {
        Some(top) if frames.is_empty() => reduce(top).unwrap_or(false),
        _ => false,
    }
}

fn push(frames: &mut [Vec<Operand>], operand: Operand) {
    if let Some(frame) = frames.last_mut() {
        frame.push(operand);
    }
}

/// Reduces a parenthesis-free operand list: all `not`, then all `and`, then
/// all `or`, each left to right.
fn reduce(mut list: Vec<Operand>) -> Option<bool> {
    while let Some(i) = list.iter().position(|o| *o == Operand::Not) {
        list.remove(i);
        match list.get_mut(i) {
            Some(Operand::Value(v)) => *v = !*v,
            _ => return None,
        }
    }
    for op in [Operand::And, Operand::Or] {
        while let Some(i) = list.iter().position(|o| *o == op) {
            let (Some(Operand::Value(lhs)), Some(Operand::Value(rhs))) =
                (i.checked_sub(1).and_then(|j| list.get(j)), list.get(i + 1))
            else {
                return None;
            };
            let value = if op == Operand::And {
                *lhs && *rhs
            } else {
                *lhs || *rhs
            };
            list.remove(i + 1);
            list.remove(i);
            list[i - 1] = Operand::Value(value);
        }
    }
    match list.as_slice() {
        [Operand::Value(v)] => Some(*v),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eval(expr: &str) -> bool {
        let supported = ["a", "b"];
        evaluate(&tokenize(expr), |name| supported.contains(&name))
    }

    #[test]
    fn test_tokenize() {
        assert_eq!(
            tokenize("not(x:a or b)"),
            vec![
                Token::Not,
                Token::LeftParen,
                Token::Name("x:a".into()),
                Token::Or,
                Token::Name("b".into()),
                Token::RightParen,
            ]
        );
        assert!(tokenize("  \t").is_empty());
    }

    #[test]
    fn test_literal_cases() {
        assert!(eval("a"));
        assert!(!eval("not a"));
        assert!(!eval("a and c"));
        assert!(eval("a or c"));
        assert!(eval("(a or c) and b"));
        assert!(eval("not (a and c)"));
    }

    #[test]
    fn test_precedence() {
        // and binds tighter than or
        assert!(eval("c and a or b"));
        assert!(!eval("c and (a or b)"));
        assert!(eval("not c and a"));
        assert!(eval("((a))"));
    }

    #[test]
    fn test_validation_messages() {
        assert_eq!(validate(&tokenize("a and")), Err("Unexpected end of if-feature expression.".into()));
        assert_eq!(validate(&tokenize("")), Err("Missing feature name.".into()));
        assert_eq!(validate(&tokenize("a )")), Err("Unexpected closing parenthesis.".into()));
        assert_eq!(validate(&tokenize("(a")), Err("Parenthesis not balanced.".into()));
        assert_eq!(validate(&tokenize("a b")), Err("Illegal syntax 'b'.".into()));
        assert_eq!(validate(&tokenize("or a")), Err("Illegal syntax 'or'.".into()));
        assert_eq!(validate(&tokenize("not and a")), Err("Illegal syntax 'and'.".into()));
    }

    #[test]
    fn test_malformed_evaluates_false_without_panic() {
        assert!(!eval("a and"));
        assert!(!eval(")("));
        assert!(!eval("not"));
    }

    #[test]
    fn test_each_name_resolved_once() {
        let mut seen = Vec::new();
        evaluate(&tokenize("a or (b and not c)"), |name| {
            seen.push(name.to_string());
            false
        });
        assert_eq!(seen, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_deep_nesting() {
        let depth = 10_000;
        let expr = format!("{}a{}", "(".repeat(depth), ")".repeat(depth));
        assert!(eval(&expr));
    }
}
