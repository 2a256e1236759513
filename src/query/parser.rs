//! Query parser.
//!
//! Turns a token stream into an ordered list of pattern trees plus their raw
//! predicate clauses. Predicate clauses are resolved into typed form by the
//! predicate module after parsing.

use super::QuerySyntaxError;
use super::lexer::{Spanned, Token};
use super::predicate::{PredicateClause, RawArg, RawClause};

/// What a single step matches at one tree position.
#[derive(Debug, Clone, PartialEq)]
pub enum StepMatcher {
    /// `(kind ...)` — named node kind.
    Kind(String),
    /// `"text"` — literal leaf token (punctuation, keyword).
    Literal(String),
    /// `_` or `(_ ...)` — any node.
    Wildcard,
    /// `[a b c]` — matches if any branch matches.
    Alternation(Vec<Step>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quantifier {
    One,
    /// `?`
    Optional,
    /// `*`
    ZeroOrMore,
    /// `+`
    OneOrMore,
}

impl Quantifier {
    pub fn allows_zero(self) -> bool {
        matches!(self, Quantifier::Optional | Quantifier::ZeroOrMore)
    }

    pub fn allows_many(self) -> bool {
        matches!(self, Quantifier::ZeroOrMore | Quantifier::OneOrMore)
    }
}

/// One matcher position in a pattern tree.
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    pub matcher: StepMatcher,
    /// Field label this step must carry in its parent (`name: (identifier)`).
    pub field: Option<String>,
    /// Fields that must be absent among the node's children (`!receiver`).
    pub negated_fields: Vec<String>,
    /// Captures bound to the node(s) this step matches. May repeat across a
    /// pattern; quantified steps accumulate a sequence.
    pub captures: Vec<String>,
    pub quantifier: Quantifier,
    pub children: Vec<Step>,
    /// `.` before the first child: it must be the node's first child.
    pub anchor_first: bool,
    /// `.` after the last child: it must be the node's last child.
    pub anchor_last: bool,
}

impl Step {
    pub fn new(matcher: StepMatcher) -> Self {
        Self {
            matcher,
            field: None,
            negated_fields: Vec::new(),
            captures: Vec::new(),
            quantifier: Quantifier::One,
            children: Vec::new(),
            anchor_first: false,
            anchor_last: false,
        }
    }
}

/// A parsed pattern before predicate resolution.
#[derive(Debug)]
pub struct RawPattern {
    pub root: Step,
    pub predicates: Vec<RawClause>,
}

/// A fully compiled pattern: matcher tree plus typed predicate clauses.
#[derive(Debug, Clone)]
pub struct Pattern {
    /// Declaration order within the query set. Later patterns override
    /// earlier ones during classification.
    pub index: usize,
    pub root: Step,
    pub predicates: Vec<PredicateClause>,
}

pub struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
}

impl Parser {
    pub fn new(tokens: Vec<Spanned>) -> Self {
        Self { tokens, pos: 0 }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|s| &s.token)
    }

    fn peek_ahead(&self, n: usize) -> Option<&Token> {
        self.tokens.get(self.pos + n).map(|s| &s.token)
    }

    fn advance(&mut self) -> Option<Spanned> {
        let tok = self.tokens.get(self.pos).cloned()?;
        self.pos += 1;
        Some(tok)
    }

    fn offset(&self) -> usize {
        match self.tokens.get(self.pos) {
            Some(s) => s.offset,
            None => self.tokens.last().map(|s| s.offset + 1).unwrap_or(0),
        }
    }

    fn expect(&mut self, expected: &Token, what: &str) -> Result<(), QuerySyntaxError> {
        if self.peek() == Some(expected) {
            self.advance();
            Ok(())
        } else {
            Err(QuerySyntaxError::new(
                format!("expected {what}"),
                self.offset(),
            ))
        }
    }

    /// Parse the whole query: an ordered list of top-level patterns.
    ///
    /// A predicate clause at top level attaches to the pattern preceding it;
    /// clauses inside a pattern attach to that pattern.
    pub fn parse_query(mut self) -> Result<Vec<RawPattern>, QuerySyntaxError> {
        let mut patterns: Vec<RawPattern> = Vec::new();

        while self.peek().is_some() {
            if self.at_clause_start() {
                let clause = self.parse_clause()?;
                match patterns.last_mut() {
                    Some(pattern) => pattern.predicates.push(clause),
                    None => {
                        return Err(QuerySyntaxError::new(
                            "predicate clause before any pattern",
                            clause.offset,
                        ));
                    }
                }
                continue;
            }

            let mut predicates = Vec::new();
            let root = self.parse_step(&mut predicates)?;
            patterns.push(RawPattern { root, predicates });
        }

        Ok(patterns)
    }

    fn at_clause_start(&self) -> bool {
        self.peek() == Some(&Token::LParen)
            && matches!(self.peek_ahead(1), Some(Token::Predicate(_)))
    }

    fn parse_step(&mut self, clauses: &mut Vec<RawClause>) -> Result<Step, QuerySyntaxError> {
        let offset = self.offset();
        let Some(tok) = self.peek().cloned() else {
            return Err(QuerySyntaxError::new("expected pattern", offset));
        };

        let mut step = match tok {
            // `(` opening another `(` or `[` is a grouped pattern, not a node
            // head: `((identifier) @x (#eq? @x "print"))`.
            Token::LParen
                if matches!(self.peek_ahead(1), Some(Token::LParen | Token::LBracket)) =>
            {
                self.parse_group(clauses)?
            }
            Token::LParen => self.parse_node(clauses)?,
            Token::LBracket => self.parse_alternation(clauses)?,
            Token::StringLiteral(text) => {
                self.advance();
                Step::new(StepMatcher::Literal(text))
            }
            Token::Wildcard => {
                self.advance();
                Step::new(StepMatcher::Wildcard)
            }
            _ => {
                return Err(QuerySyntaxError::new("expected pattern", offset));
            }
        };

        // Suffixes: quantifier and capture annotations, in any order.
        loop {
            match self.peek() {
                Some(Token::Question) => {
                    self.advance();
                    step.quantifier = Quantifier::Optional;
                }
                Some(Token::Star) => {
                    self.advance();
                    step.quantifier = Quantifier::ZeroOrMore;
                }
                Some(Token::Plus) => {
                    self.advance();
                    step.quantifier = Quantifier::OneOrMore;
                }
                Some(Token::Capture(name)) => {
                    let name = name.clone();
                    self.advance();
                    step.captures.push(name);
                }
                _ => break,
            }
        }

        Ok(step)
    }

    /// `((pattern) (#clause)...)` — a sub-pattern wrapped in parentheses so
    /// predicate clauses can sit alongside it. The group is transparent; it
    /// contributes no matcher of its own.
    fn parse_group(&mut self, clauses: &mut Vec<RawClause>) -> Result<Step, QuerySyntaxError> {
        self.expect(&Token::LParen, "`(`")?;
        let step = self.parse_step(clauses)?;

        loop {
            match self.peek() {
                None => {
                    return Err(QuerySyntaxError::new("expected `)`", self.offset()));
                }
                Some(Token::RParen) => {
                    self.advance();
                    break;
                }
                Some(Token::LParen) if self.at_clause_start() => {
                    let clause = self.parse_clause()?;
                    clauses.push(clause);
                }
                _ => {
                    return Err(QuerySyntaxError::new(
                        "expected predicate clause or `)` in group",
                        self.offset(),
                    ));
                }
            }
        }

        Ok(step)
    }

    /// `(kind child...)` — the parenthesized node matcher form.
    fn parse_node(&mut self, clauses: &mut Vec<RawClause>) -> Result<Step, QuerySyntaxError> {
        self.expect(&Token::LParen, "`(`")?;

        let head_offset = self.offset();
        let matcher = match self.peek().cloned() {
            Some(Token::Ident(kind)) => {
                self.advance();
                StepMatcher::Kind(kind)
            }
            Some(Token::Wildcard) => {
                self.advance();
                StepMatcher::Wildcard
            }
            Some(Token::StringLiteral(text)) => {
                self.advance();
                StepMatcher::Literal(text)
            }
            _ => {
                return Err(QuerySyntaxError::new(
                    "expected node kind, `_`, or string literal after `(`",
                    head_offset,
                ));
            }
        };

        let mut step = Step::new(matcher);
        let mut pending_anchor = false;

        loop {
            match self.peek() {
                None => {
                    return Err(QuerySyntaxError::new("expected `)`", self.offset()));
                }
                Some(Token::RParen) => {
                    self.advance();
                    break;
                }
                Some(Token::Anchor) => {
                    self.advance();
                    if step.children.is_empty() {
                        step.anchor_first = true;
                    } else {
                        pending_anchor = true;
                    }
                }
                Some(Token::Field(name)) => {
                    let name = name.clone();
                    self.advance();
                    let mut child = self.parse_step(clauses)?;
                    child.field = Some(name);
                    step.children.push(child);
                    pending_anchor = false;
                }
                Some(Token::NegatedField(name)) => {
                    let name = name.clone();
                    self.advance();
                    step.negated_fields.push(name);
                }
                Some(Token::LParen) if self.at_clause_start() => {
                    let clause = self.parse_clause()?;
                    clauses.push(clause);
                }
                _ => {
                    step.children.push(self.parse_step(clauses)?);
                    pending_anchor = false;
                }
            }
        }

        // A `.` with no child after it anchors the last pattern child.
        if pending_anchor {
            step.anchor_last = true;
        }

        Ok(step)
    }

    /// `[a b c]` — alternation of full sub-patterns.
    fn parse_alternation(
        &mut self,
        clauses: &mut Vec<RawClause>,
    ) -> Result<Step, QuerySyntaxError> {
        let offset = self.offset();
        self.expect(&Token::LBracket, "`[`")?;

        let mut alternatives = Vec::new();
        loop {
            match self.peek() {
                None => {
                    return Err(QuerySyntaxError::new("expected `]`", self.offset()));
                }
                Some(Token::RBracket) => {
                    self.advance();
                    break;
                }
                _ => alternatives.push(self.parse_step(clauses)?),
            }
        }

        if alternatives.is_empty() {
            return Err(QuerySyntaxError::new("empty alternation", offset));
        }

        Ok(Step::new(StepMatcher::Alternation(alternatives)))
    }

    /// `(#name? args...)` — a predicate clause.
    fn parse_clause(&mut self) -> Result<RawClause, QuerySyntaxError> {
        let offset = self.offset();
        self.expect(&Token::LParen, "`(`")?;

        let name = match self.advance() {
            Some(Spanned {
                token: Token::Predicate(name),
                ..
            }) => name,
            _ => {
                return Err(QuerySyntaxError::new("expected predicate name", offset));
            }
        };

        let mut args = Vec::new();
        loop {
            match self.peek() {
                None => {
                    return Err(QuerySyntaxError::new("expected `)`", self.offset()));
                }
                Some(Token::RParen) => {
                    self.advance();
                    break;
                }
                Some(Token::Capture(name)) => {
                    let name = name.clone();
                    self.advance();
                    args.push(RawArg::Capture(name));
                }
                Some(Token::StringLiteral(text)) => {
                    let text = text.clone();
                    self.advance();
                    args.push(RawArg::Literal(text));
                }
                Some(Token::Ident(word)) => {
                    let word = word.clone();
                    self.advance();
                    args.push(RawArg::Literal(word));
                }
                _ => {
                    return Err(QuerySyntaxError::new(
                        "unexpected token in predicate clause",
                        self.offset(),
                    ));
                }
            }
        }

        Ok(RawClause { name, args, offset })
    }
}
