//! The lexer: an ordered table of `(kind, pattern)` rules.
//!
//! At each offset the rules are tried in table order and the first match
//! wins. Skip rules (whitespace and comments) produce no token. Number rules
//! come before word rules, `Hex` before `Int` so `0x2A` lexes as one token,
//! and two-character operators before their one-character prefixes.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::{Error, Result};
use crate::token::{keyword, Pos, Token, TokenKind};

enum Rule {
    /// Consumed without producing a token.
    Skip,
    /// Produces a token of the given kind; word matches are reclassified
    /// through the keyword table.
    Emit(TokenKind),
    Word,
}

static TABLE: LazyLock<Vec<(Rule, Regex)>> = LazyLock::new(|| {
    let rule = |r: Rule, pat: &str| (r, Regex::new(pat).expect("lexer rule"));
    vec![
        rule(Rule::Skip, r"^\s+"),
        rule(Rule::Skip, r"^//[^\n]*"),
        rule(Rule::Skip, r"(?s)^/\*.*?\*/"),
        rule(Rule::Emit(TokenKind::Hex), r"^0x[0-9a-fA-F]+"),
        rule(Rule::Emit(TokenKind::Float), r"^\d*\.\d+"),
        rule(Rule::Emit(TokenKind::Int), r"^\d+"),
        rule(Rule::Emit(TokenKind::Str), r#"^("[^"\n]*"|'[^'\n]*')"#),
        rule(Rule::Emit(TokenKind::Regex), r"^`[^`\n]*`"),
        rule(Rule::Word, r"^\w+"),
        rule(Rule::Emit(TokenKind::QuestionDot), r"^\?\."),
        rule(Rule::Emit(TokenKind::EqEq), r"^=="),
        rule(Rule::Emit(TokenKind::NotEq), r"^!="),
        rule(Rule::Emit(TokenKind::Le), r"^<="),
        rule(Rule::Emit(TokenKind::Ge), r"^>="),
        rule(Rule::Emit(TokenKind::AndAnd), r"^&&"),
        rule(Rule::Emit(TokenKind::OrOr), r"^\|\|"),
        rule(Rule::Emit(TokenKind::Dot), r"^\."),
        rule(Rule::Emit(TokenKind::Comma), r"^,"),
        rule(Rule::Emit(TokenKind::Colon), r"^:"),
        rule(Rule::Emit(TokenKind::LParen), r"^\("),
        rule(Rule::Emit(TokenKind::RParen), r"^\)"),
        rule(Rule::Emit(TokenKind::LBrace), r"^\{"),
        rule(Rule::Emit(TokenKind::RBrace), r"^\}"),
        rule(Rule::Emit(TokenKind::LBracket), r"^\["),
        rule(Rule::Emit(TokenKind::RBracket), r"^\]"),
        rule(Rule::Emit(TokenKind::Plus), r"^\+"),
        rule(Rule::Emit(TokenKind::Minus), r"^-"),
        rule(Rule::Emit(TokenKind::Star), r"^\*"),
        rule(Rule::Emit(TokenKind::Slash), r"^/"),
        rule(Rule::Emit(TokenKind::Percent), r"^%"),
        rule(Rule::Emit(TokenKind::Lt), r"^<"),
        rule(Rule::Emit(TokenKind::Gt), r"^>"),
        rule(Rule::Emit(TokenKind::Bang), r"^!"),
        rule(Rule::Emit(TokenKind::Eq), r"^="),
    ]
});

/// Tokenize a source string.
///
/// Returns the token stream, or [`Error::Lex`] at the first offset no rule
/// matches.
pub fn lex(src: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut offset = 0;
    let mut line: u32 = 1;
    let mut column: u32 = 1;

    'outer: while offset < src.len() {
        let rest = &src[offset..];
        for (rule, re) in TABLE.iter() {
            let Some(m) = re.find(rest) else { continue };
            let text = m.as_str();
            let pos = Pos::new(line, column);

            match rule {
                Rule::Skip => {}
                Rule::Emit(kind) => tokens.push(Token::new(*kind, text, pos)),
                Rule::Word => tokens.push(Token::new(keyword(text), text, pos)),
            }

            // Only skip rules can span lines, but track uniformly.
            for ch in text.chars() {
                if ch == '\n' {
                    line += 1;
                    column = 1;
                } else {
                    column += 1;
                }
            }
            offset += text.len();
            continue 'outer;
        }

        let found = rest.chars().next().unwrap_or(' ');
        return Err(Error::Lex {
            msg: format!("Unexpected syntax '{found}'"),
            pos: Pos::new(line, column),
        });
    }

    Ok(tokens)
}
