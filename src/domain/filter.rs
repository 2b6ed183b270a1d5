//! Event filter predicates.
//!
//! A small recursive descent parser for expressions such as
//! `goldenMACD < 3 AND deathMACD > -1`. Grammar:
//!
//! ```text
//! predicate  := conjunction ("OR" conjunction)*
//! conjunction := term ("AND" term)*
//! term       := "(" predicate ")" | FIELD OP NUMBER
//! OP         := "<" | "<=" | ">" | ">=" | "==" | "!="
//! ```
//!
//! Keywords are case-sensitive. A comparison against a field the event does
//! not carry is false.

use crate::domain::error::ParseError;
use crate::domain::event::NumericFields;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    Equal,
    NotEqual,
}

impl Comparison {
    fn holds(self, left: f64, right: f64) -> bool {
        match self {
            Comparison::Less => left < right,
            Comparison::LessEqual => left <= right,
            Comparison::Greater => left > right,
            Comparison::GreaterEqual => left >= right,
            Comparison::Equal => left == right,
            Comparison::NotEqual => left != right,
        }
    }

    fn symbol(self) -> &'static str {
        match self {
            Comparison::Less => "<",
            Comparison::LessEqual => "<=",
            Comparison::Greater => ">",
            Comparison::GreaterEqual => ">=",
            Comparison::Equal => "==",
            Comparison::NotEqual => "!=",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Compare {
        field: String,
        op: Comparison,
        value: f64,
    },
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
}

impl Predicate {
    pub fn matches<T: NumericFields>(&self, item: &T) -> bool {
        match self {
            Predicate::Compare { field, op, value } => item
                .field(field)
                .map(|v| op.holds(v, *value))
                .unwrap_or(false),
            Predicate::And(terms) => terms.iter().all(|t| t.matches(item)),
            Predicate::Or(terms) => terms.iter().any(|t| t.matches(item)),
        }
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Predicate::Compare { field, op, value } => {
                write!(f, "{} {} {}", field, op.symbol(), value)
            }
            Predicate::And(terms) => write_joined(f, terms, " AND "),
            Predicate::Or(terms) => write_joined(f, terms, " OR "),
        }
    }
}

fn write_joined(f: &mut fmt::Formatter<'_>, terms: &[Predicate], sep: &str) -> fmt::Result {
    write!(f, "(")?;
    for (i, term) in terms.iter().enumerate() {
        if i > 0 {
            write!(f, "{}", sep)?;
        }
        write!(f, "{}", term)?;
    }
    write!(f, ")")
}

/// Keep the items matching `predicate`, in input order.
pub fn filter<T: NumericFields + Clone>(items: &[T], predicate: &Predicate) -> Vec<T> {
    items
        .iter()
        .filter(|item| predicate.matches(*item))
        .cloned()
        .collect()
}

struct Parser<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn remaining(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.remaining().chars().next()
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += ch.len_utf8();
        Some(ch)
    }

    fn skip_whitespace(&mut self) {
        while let Some(ch) = self.peek() {
            if ch.is_whitespace() {
                self.advance();
            } else {
                break;
            }
        }
    }

    fn consume_keyword(&mut self, keyword: &str) -> bool {
        self.skip_whitespace();
        let remaining = self.remaining();
        if !remaining.starts_with(keyword) {
            return false;
        }
        let at_boundary = remaining[keyword.len()..]
            .chars()
            .next()
            .map(|c| !(c.is_alphanumeric() || c == '_'))
            .unwrap_or(true);
        if at_boundary {
            self.pos += keyword.len();
            true
        } else {
            false
        }
    }

    fn peek_word(&self) -> String {
        let word: String = self
            .remaining()
            .chars()
            .take_while(|c| c.is_alphanumeric() || *c == '_')
            .collect();
        if word.is_empty() {
            self.peek()
                .map(|c| c.to_string())
                .unwrap_or_else(|| "end of input".to_string())
        } else {
            word
        }
    }

    fn parse_predicate(&mut self) -> Result<Predicate, ParseError> {
        let mut terms = vec![self.parse_conjunction()?];
        while self.consume_keyword("OR") {
            terms.push(self.parse_conjunction()?);
        }
        Ok(collapse(terms, Predicate::Or))
    }

    fn parse_conjunction(&mut self) -> Result<Predicate, ParseError> {
        let mut terms = vec![self.parse_term()?];
        while self.consume_keyword("AND") {
            terms.push(self.parse_term()?);
        }
        Ok(collapse(terms, Predicate::And))
    }

    fn parse_term(&mut self) -> Result<Predicate, ParseError> {
        self.skip_whitespace();
        if self.peek() == Some('(') {
            self.advance();
            let inner = self.parse_predicate()?;
            self.skip_whitespace();
            return match self.peek() {
                Some(')') => {
                    self.advance();
                    Ok(inner)
                }
                _ => Err(ParseError {
                    message: format!("expected ')', found '{}'", self.peek_word()),
                    position: self.pos,
                }),
            };
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> Result<Predicate, ParseError> {
        let field = self.parse_field()?;
        let op = self.parse_operator()?;
        let value = self.parse_number()?;
        Ok(Predicate::Compare { field, op, value })
    }

    fn parse_field(&mut self) -> Result<String, ParseError> {
        self.skip_whitespace();
        let start = self.pos;
        match self.peek() {
            Some(c) if c.is_alphabetic() || c == '_' => {}
            _ => {
                return Err(ParseError {
                    message: format!("expected field name, found '{}'", self.peek_word()),
                    position: start,
                });
            }
        }
        while let Some(c) = self.peek() {
            if c.is_alphanumeric() || c == '_' {
                self.advance();
            } else {
                break;
            }
        }
        let field = &self.input[start..self.pos];
        if field == "AND" || field == "OR" {
            return Err(ParseError {
                message: format!("expected field name, found keyword '{}'", field),
                position: start,
            });
        }
        Ok(field.to_string())
    }

    fn parse_operator(&mut self) -> Result<Comparison, ParseError> {
        self.skip_whitespace();
        let ops = [
            ("<=", Comparison::LessEqual),
            (">=", Comparison::GreaterEqual),
            ("==", Comparison::Equal),
            ("!=", Comparison::NotEqual),
            ("<", Comparison::Less),
            (">", Comparison::Greater),
        ];
        for (text, op) in ops {
            if self.remaining().starts_with(text) {
                self.pos += text.len();
                return Ok(op);
            }
        }
        Err(ParseError {
            message: format!(
                "expected comparison operator (<, <=, >, >=, ==, !=), found '{}'",
                self.peek_word()
            ),
            position: self.pos,
        })
    }

    fn parse_number(&mut self) -> Result<f64, ParseError> {
        self.skip_whitespace();
        let start = self.pos;
        let mut has_dot = false;
        let mut digits = 0;

        if self.peek() == Some('-') {
            self.advance();
        }

        while let Some(ch) = self.peek() {
            if ch.is_ascii_digit() {
                digits += 1;
                self.advance();
            } else if ch == '.' && !has_dot {
                has_dot = true;
                self.advance();
            } else {
                break;
            }
        }

        if digits == 0 {
            return Err(ParseError {
                message: "expected number".to_string(),
                position: start,
            });
        }

        let num_str = &self.input[start..self.pos];
        num_str.parse::<f64>().map_err(|_| ParseError {
            message: format!("invalid number: {}", num_str),
            position: start,
        })
    }

    fn parse(&mut self) -> Result<Predicate, ParseError> {
        self.skip_whitespace();
        if self.remaining().is_empty() {
            return Err(ParseError {
                message: "empty predicate".to_string(),
                position: self.pos,
            });
        }
        let predicate = self.parse_predicate()?;
        self.skip_whitespace();
        if self.pos < self.input.len() {
            return Err(ParseError {
                message: format!("unexpected input after predicate: '{}'", self.remaining()),
                position: self.pos,
            });
        }
        Ok(predicate)
    }
}

fn collapse(mut terms: Vec<Predicate>, wrap: fn(Vec<Predicate>) -> Predicate) -> Predicate {
    if terms.len() == 1 {
        terms.remove(0)
    } else {
        wrap(terms)
    }
}

pub fn parse(input: &str) -> Result<Predicate, ParseError> {
    let mut parser = Parser::new(input);
    parser.parse()
}
