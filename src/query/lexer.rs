//! Query source lexer.
//!
//! Tokenizes s-expression pattern text like
//! `(function_item name: (identifier) @function (#match? @function "^[a-z]"))`.

use super::QuerySyntaxError;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    LParen,
    RParen,
    LBracket,              // [
    RBracket,              // ]
    Question,              // ? quantifier
    Star,                  // * quantifier
    Plus,                  // + quantifier
    Anchor,                // . sibling anchor
    Wildcard,              // _
    Capture(String),       // @name (dotted)
    Predicate(String),     // #name? (name keeps the trailing ? or !)
    Field(String),         // name:
    NegatedField(String),  // !name
    StringLiteral(String), // "..." with \" and \\ escapes
    Ident(String),         // node kind names
}

/// A token plus the byte offset where it started, for error reporting.
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned {
    pub token: Token,
    pub offset: usize,
}

pub struct Lexer<'a> {
    input: &'a [u8],
    pos: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            input: input.as_bytes(),
            pos: 0,
        }
    }

    fn peek(&self) -> Option<u8> {
        self.input.get(self.pos).copied()
    }

    fn advance(&mut self) -> Option<u8> {
        let ch = self.input.get(self.pos).copied()?;
        self.pos += 1;
        Some(ch)
    }

    fn skip_trivia(&mut self) {
        while let Some(ch) = self.peek() {
            match ch {
                b' ' | b'\t' | b'\n' | b'\r' => {
                    self.pos += 1;
                }
                // Line comment
                b';' => {
                    while self.peek().is_some_and(|c| c != b'\n') {
                        self.pos += 1;
                    }
                }
                _ => break,
            }
        }
    }

    fn read_while(&mut self, pred: impl Fn(u8) -> bool) -> String {
        let start = self.pos;
        while self.pos < self.input.len() && pred(self.input[self.pos]) {
            self.pos += 1;
        }
        String::from_utf8_lossy(&self.input[start..self.pos]).into_owned()
    }

    fn is_ident_char(ch: u8) -> bool {
        ch.is_ascii_alphanumeric() || ch == b'_' || ch == b'-'
    }

    fn read_string(&mut self, start: usize) -> Result<String, QuerySyntaxError> {
        // Accumulate bytes and decode once at the closing quote, so multi-byte
        // UTF-8 sequences in the literal survive intact.
        let mut out: Vec<u8> = Vec::new();
        loop {
            match self.advance() {
                Some(b'"') => {
                    return String::from_utf8(out).map_err(|_| {
                        QuerySyntaxError::new("invalid UTF-8 in string literal", start)
                    });
                }
                Some(b'\\') => match self.advance() {
                    Some(b'"') => out.push(b'"'),
                    Some(b'\\') => out.push(b'\\'),
                    Some(b'n') => out.push(b'\n'),
                    Some(b't') => out.push(b'\t'),
                    Some(other) => out.push(other),
                    None => {
                        return Err(QuerySyntaxError::new("unterminated string literal", start));
                    }
                },
                Some(other) => out.push(other),
                None => return Err(QuerySyntaxError::new("unterminated string literal", start)),
            }
        }
    }

    pub fn tokenize(&mut self) -> Result<Vec<Spanned>, QuerySyntaxError> {
        let mut tokens = Vec::new();

        loop {
            self.skip_trivia();
            let offset = self.pos;
            let Some(ch) = self.peek() else { break };

            let token = match ch {
                b'(' => {
                    self.advance();
                    Token::LParen
                }
                b')' => {
                    self.advance();
                    Token::RParen
                }
                b'[' => {
                    self.advance();
                    Token::LBracket
                }
                b']' => {
                    self.advance();
                    Token::RBracket
                }
                b'?' => {
                    self.advance();
                    Token::Question
                }
                b'*' => {
                    self.advance();
                    Token::Star
                }
                b'+' => {
                    self.advance();
                    Token::Plus
                }
                b'.' => {
                    self.advance();
                    Token::Anchor
                }
                b'@' => {
                    self.advance();
                    let name = self.read_while(|c| Self::is_ident_char(c) || c == b'.');
                    if name.is_empty() {
                        return Err(QuerySyntaxError::new("empty capture name", offset));
                    }
                    Token::Capture(name)
                }
                b'#' => {
                    self.advance();
                    let name = self.read_while(|c| Self::is_ident_char(c) || c == b'?' || c == b'!');
                    if name.is_empty() {
                        return Err(QuerySyntaxError::new("empty predicate name", offset));
                    }
                    Token::Predicate(name)
                }
                b'!' => {
                    self.advance();
                    let name = self.read_while(Self::is_ident_char);
                    if name.is_empty() {
                        return Err(QuerySyntaxError::new("expected field name after `!`", offset));
                    }
                    Token::NegatedField(name)
                }
                b'"' => {
                    self.advance();
                    Token::StringLiteral(self.read_string(offset)?)
                }
                b'_' => {
                    let word = self.read_while(Self::is_ident_char);
                    if word == "_" {
                        Token::Wildcard
                    } else {
                        self.ident_or_field(word)
                    }
                }
                _ if ch.is_ascii_alphabetic() => {
                    let word = self.read_while(Self::is_ident_char);
                    self.ident_or_field(word)
                }
                _ => {
                    return Err(QuerySyntaxError::new(
                        format!("unexpected character `{}`", ch as char),
                        offset,
                    ));
                }
            };
            tokens.push(Spanned { token, offset });
        }

        Ok(tokens)
    }

    /// An identifier immediately followed by `:` is a field label.
    fn ident_or_field(&mut self, word: String) -> Token {
        if self.peek() == Some(b':') {
            self.advance();
            Token::Field(word)
        } else {
            Token::Ident(word)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex(input: &str) -> Vec<Token> {
        Lexer::new(input)
            .tokenize()
            .unwrap()
            .into_iter()
            .map(|s| s.token)
            .collect()
    }

    #[test]
    fn lexer_basic() {
        let tokens = lex("(function_item name: (identifier) @function)");
        assert_eq!(
            tokens,
            vec![
                Token::LParen,
                Token::Ident("function_item".to_string()),
                Token::Field("name".to_string()),
                Token::LParen,
                Token::Ident("identifier".to_string()),
                Token::RParen,
                Token::Capture("function".to_string()),
                Token::RParen,
            ]
        );
    }

    #[test]
    fn lexer_alternation_of_literals() {
        let tokens = lex(r#"["fn" "let"] @keyword"#);
        assert_eq!(
            tokens,
            vec![
                Token::LBracket,
                Token::StringLiteral("fn".to_string()),
                Token::StringLiteral("let".to_string()),
                Token::RBracket,
                Token::Capture("keyword".to_string()),
            ]
        );
    }

    #[test]
    fn lexer_dotted_capture() {
        let tokens = lex("@local.definition.var");
        assert_eq!(
            tokens,
            vec![Token::Capture("local.definition.var".to_string())]
        );
    }

    #[test]
    fn lexer_predicate_clause() {
        let tokens = lex(r#"(#any-of? @name "print" "assert")"#);
        assert_eq!(
            tokens,
            vec![
                Token::LParen,
                Token::Predicate("any-of?".to_string()),
                Token::Capture("name".to_string()),
                Token::StringLiteral("print".to_string()),
                Token::StringLiteral("assert".to_string()),
                Token::RParen,
            ]
        );
    }

    #[test]
    fn lexer_quantifiers_and_anchor() {
        let tokens = lex("(block . (statement)* (comment)? (item)+ .)");
        assert_eq!(
            tokens,
            vec![
                Token::LParen,
                Token::Ident("block".to_string()),
                Token::Anchor,
                Token::LParen,
                Token::Ident("statement".to_string()),
                Token::RParen,
                Token::Star,
                Token::LParen,
                Token::Ident("comment".to_string()),
                Token::RParen,
                Token::Question,
                Token::LParen,
                Token::Ident("item".to_string()),
                Token::RParen,
                Token::Plus,
                Token::Anchor,
                Token::RParen,
            ]
        );
    }

    #[test]
    fn lexer_negated_field() {
        let tokens = lex("(call !receiver)");
        assert_eq!(
            tokens,
            vec![
                Token::LParen,
                Token::Ident("call".to_string()),
                Token::NegatedField("receiver".to_string()),
                Token::RParen,
            ]
        );
    }

    #[test]
    fn lexer_wildcard_vs_underscore_ident() {
        assert_eq!(lex("_"), vec![Token::Wildcard]);
        assert_eq!(lex("_expr"), vec![Token::Ident("_expr".to_string())]);
    }

    #[test]
    fn lexer_comments_skipped() {
        let tokens = lex("; highlight functions\n(identifier) @x ; trailing\n");
        assert_eq!(
            tokens,
            vec![
                Token::LParen,
                Token::Ident("identifier".to_string()),
                Token::RParen,
                Token::Capture("x".to_string()),
            ]
        );
    }

    #[test]
    fn lexer_string_escapes() {
        assert_eq!(
            lex(r#""a\"b\\c\n""#),
            vec![Token::StringLiteral("a\"b\\c\n".to_string())]
        );
    }

    #[test]
    fn lexer_multibyte_string_literal() {
        assert_eq!(
            lex(r#""café""#),
            vec![Token::StringLiteral("café".to_string())]
        );
        assert_eq!(
            lex(r#""日本語""#),
            vec![Token::StringLiteral("日本語".to_string())]
        );
    }

    #[test]
    fn lexer_rejects_unknown_characters() {
        let err = Lexer::new("(identifier) @x $%^").tokenize().unwrap_err();
        assert_eq!(err.message, "unexpected character `$`");
        assert_eq!(err.offset, 16);
    }

    #[test]
    fn lexer_unterminated_string() {
        let err = Lexer::new(r#"(x "abc"#).tokenize().unwrap_err();
        assert_eq!(err.message, "unterminated string literal");
        assert_eq!(err.offset, 3);
    }

    #[test]
    fn lexer_offsets() {
        let spanned = Lexer::new("(a) @b").tokenize().unwrap();
        let offsets: Vec<usize> = spanned.iter().map(|s| s.offset).collect();
        assert_eq!(offsets, vec![0, 1, 2, 4]);
    }
}
