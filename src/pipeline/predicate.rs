//! Row filter expressions.
//!
//! Parses query strings such as `month == 1 or month == 7` or
//! `sector == 'Residential' & app_status == 'Completed'` into a
//! [`Predicate`] tree.
//!
//! Grammar (lowest to highest precedence):
//!
//! ```text
//! expr       := and_expr (("or" | "|") and_expr)*
//! and_expr   := unary (("and" | "&") unary)*
//! unary      := ("not" | "~") unary | primary
//! primary    := "(" expr ")" | membership | comparison
//! membership := IDENT ["not"] "in" "[" literal ("," literal)* "]"
//! comparison := operand ("==" | "!=" | "<" | "<=" | ">" | ">=") operand
//! operand    := IDENT | `quoted ident` | NUMBER | 'string' | "string"
//! ```

use crate::error::{PipelineError, PipelineResult};
use crate::table::{Table, Value};
use std::cmp::Ordering;
use std::str::FromStr;

static MISSING: Value = Value::Missing;

/// Deepest allowed nesting of parentheses and `not`.
const MAX_NESTING: usize = 64;

/// Comparison operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CompareOp {
    fn holds(self, ordering: Ordering) -> bool {
        match self {
            CompareOp::Eq => ordering == Ordering::Equal,
            CompareOp::Ne => ordering != Ordering::Equal,
            CompareOp::Lt => ordering == Ordering::Less,
            CompareOp::Le => ordering != Ordering::Greater,
            CompareOp::Gt => ordering == Ordering::Greater,
            CompareOp::Ge => ordering != Ordering::Less,
        }
    }

    /// Applies the operator with filter semantics.
    ///
    /// Numbers compare with numbers and text with text. Any other pairing,
    /// or a missing operand, is false for every operator except `!=`.
    pub fn apply(self, left: &Value, right: &Value) -> bool {
        let ordering = match (left, right) {
            (l, r) if l.is_missing() || r.is_missing() => None,
            (l, r) if l.is_numeric() && r.is_numeric() => Some(l.cmp(r)),
            (Value::Text(l), Value::Text(r)) => Some(l.cmp(r)),
            _ => None,
        };

        match ordering {
            Some(o) => self.holds(o),
            None => self == CompareOp::Ne,
        }
    }
}

/// One side of a comparison.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// Column reference.
    Column(String),
    /// Constant.
    Literal(Value),
}

impl Operand {
    fn resolve<'a>(&'a self, table: &Table, row: &'a [Value]) -> &'a Value {
        match self {
            Operand::Literal(v) => v,
            Operand::Column(name) => table
                .column_index(name)
                .map(|ci| &row[ci])
                .unwrap_or(&MISSING),
        }
    }
}

/// A boolean expression over one record's values.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Compare {
        left: Operand,
        op: CompareOp,
        right: Operand,
    },
    In {
        column: String,
        values: Vec<Value>,
        negated: bool,
    },
    And(Box<Predicate>, Box<Predicate>),
    Or(Box<Predicate>, Box<Predicate>),
    Not(Box<Predicate>),
}

impl Predicate {
    /// Parses a query string.
    pub fn parse(query: &str) -> PipelineResult<Self> {
        let tokens = tokenize(query)?;
        if tokens.is_empty() {
            return Err(PipelineError::InvalidPredicate("empty expression".to_string()));
        }

        let mut parser = Parser {
            tokens,
            pos: 0,
            depth: 0,
        };
        let predicate = parser.expr()?;

        if let Some(token) = parser.peek() {
            return Err(PipelineError::InvalidPredicate(format!(
                "unexpected {} after expression",
                token.describe()
            )));
        }

        Ok(predicate)
    }

    /// `column == value`.
    #[cfg(test)]
    pub fn equals(column: &str, value: impl Into<Value>) -> Self {
        Predicate::Compare {
            left: Operand::Column(column.to_string()),
            op: CompareOp::Eq,
            right: Operand::Literal(value.into()),
        }
    }

    /// Conjunction.
    pub fn and(self, other: Predicate) -> Self {
        Predicate::And(Box::new(self), Box::new(other))
    }

    /// Disjunction.
    pub fn or(self, other: Predicate) -> Self {
        Predicate::Or(Box::new(self), Box::new(other))
    }

    /// Column names the expression refers to.
    pub fn columns(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_columns(&mut out);
        out
    }

    fn collect_columns<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Predicate::Compare { left, right, .. } => {
                for operand in [left, right] {
                    if let Operand::Column(name) = operand {
                        if !out.contains(&name.as_str()) {
                            out.push(name);
                        }
                    }
                }
            }
            Predicate::In { column, .. } => {
                if !out.contains(&column.as_str()) {
                    out.push(column);
                }
            }
            Predicate::And(a, b) | Predicate::Or(a, b) => {
                a.collect_columns(out);
                b.collect_columns(out);
            }
            Predicate::Not(inner) => inner.collect_columns(out),
        }
    }

    /// Checks that every referenced column exists in `table`.
    pub fn validate(&self, table: &Table) -> PipelineResult<()> {
        for column in self.columns() {
            if table.column_index(column).is_none() {
                return Err(PipelineError::InvalidPredicate(format!(
                    "unknown column '{}' (available: {})",
                    column,
                    table.columns().join(", ")
                )));
            }
        }
        Ok(())
    }

    /// Evaluates the predicate against one record of `table`.
    pub fn matches(&self, table: &Table, row: &[Value]) -> bool {
        match self {
            Predicate::Compare { left, op, right } => {
                op.apply(left.resolve(table, row), right.resolve(table, row))
            }
            Predicate::In {
                column,
                values,
                negated,
            } => {
                let value = table
                    .column_index(column)
                    .map(|ci| &row[ci])
                    .unwrap_or(&MISSING);
                let found = values.iter().any(|v| CompareOp::Eq.apply(value, v));
                found != *negated
            }
            Predicate::And(a, b) => a.matches(table, row) && b.matches(table, row),
            Predicate::Or(a, b) => a.matches(table, row) || b.matches(table, row),
            Predicate::Not(inner) => !inner.matches(table, row),
        }
    }
}

impl FromStr for Predicate {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Predicate::parse(s)
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Literal(Value),
    Op(CompareOp),
    And,
    Or,
    Not,
    In,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
}

impl Token {
    fn describe(&self) -> String {
        match self {
            Token::Ident(name) => format!("identifier '{}'", name),
            Token::Literal(v) => format!("literal '{}'", v),
            Token::Op(op) => format!("operator {:?}", op),
            Token::And => "'and'".to_string(),
            Token::Or => "'or'".to_string(),
            Token::Not => "'not'".to_string(),
            Token::In => "'in'".to_string(),
            Token::LParen => "'('".to_string(),
            Token::RParen => "')'".to_string(),
            Token::LBracket => "'['".to_string(),
            Token::RBracket => "']'".to_string(),
            Token::Comma => "','".to_string(),
        }
    }
}

fn invalid(msg: impl Into<String>) -> PipelineError {
    PipelineError::InvalidPredicate(msg.into())
}

fn tokenize(input: &str) -> PipelineResult<Vec<Token>> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let next = chars.get(i + 1).copied();

        match c {
            c if c.is_whitespace() => i += 1,
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            '[' => {
                tokens.push(Token::LBracket);
                i += 1;
            }
            ']' => {
                tokens.push(Token::RBracket);
                i += 1;
            }
            ',' => {
                tokens.push(Token::Comma);
                i += 1;
            }
            '&' => {
                tokens.push(Token::And);
                i += if next == Some('&') { 2 } else { 1 };
            }
            '|' => {
                tokens.push(Token::Or);
                i += if next == Some('|') { 2 } else { 1 };
            }
            '~' => {
                tokens.push(Token::Not);
                i += 1;
            }
            '=' if next == Some('=') => {
                tokens.push(Token::Op(CompareOp::Eq));
                i += 2;
            }
            '!' if next == Some('=') => {
                tokens.push(Token::Op(CompareOp::Ne));
                i += 2;
            }
            '!' => {
                tokens.push(Token::Not);
                i += 1;
            }
            '<' | '>' => {
                let inclusive = next == Some('=');
                let op = match (c, inclusive) {
                    ('<', false) => CompareOp::Lt,
                    ('<', true) => CompareOp::Le,
                    ('>', false) => CompareOp::Gt,
                    _ => CompareOp::Ge,
                };
                tokens.push(Token::Op(op));
                i += if inclusive { 2 } else { 1 };
            }
            '=' => return Err(invalid("use '==' for equality")),
            '\'' | '"' | '`' => {
                let end = chars[i + 1..]
                    .iter()
                    .position(|&ch| ch == c)
                    .ok_or_else(|| invalid(format!("unterminated {} quote", c)))?;
                let text: String = chars[i + 1..i + 1 + end].iter().collect();
                if c == '`' {
                    tokens.push(Token::Ident(text));
                } else {
                    tokens.push(Token::Literal(Value::Text(text)));
                }
                i += end + 2;
            }
            c if c.is_ascii_digit()
                || (c == '.' && next.is_some_and(|n| n.is_ascii_digit()))
                || (c == '-' && next.is_some_and(|n| n.is_ascii_digit() || n == '.')) =>
            {
                let start = i;
                i += 1;
                while i < chars.len() {
                    let ch = chars[i];
                    let exponent_sign =
                        (ch == '-' || ch == '+') && matches!(chars[i - 1], 'e' | 'E');
                    if ch.is_ascii_alphanumeric() || ch == '.' || exponent_sign {
                        i += 1;
                    } else {
                        break;
                    }
                }
                let raw: String = chars[start..i].iter().collect();
                match Value::parse(&raw) {
                    v @ (Value::Int(_) | Value::Float(_)) => tokens.push(Token::Literal(v)),
                    _ => return Err(invalid(format!("malformed number '{}'", raw))),
                }
            }
            c if c.is_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                let word: String = chars[start..i].iter().collect();
                tokens.push(match word.as_str() {
                    "and" => Token::And,
                    "or" => Token::Or,
                    "not" => Token::Not,
                    "in" => Token::In,
                    _ => Token::Ident(word),
                });
            }
            other => return Err(invalid(format!("unexpected character '{}'", other))),
        }
    }

    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn peek_at(&self, offset: usize) -> Option<&Token> {
        self.tokens.get(self.pos + offset)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn expect(&mut self, expected: Token) -> PipelineResult<()> {
        match self.next() {
            Some(ref t) if *t == expected => Ok(()),
            Some(t) => Err(invalid(format!(
                "expected {}, found {}",
                expected.describe(),
                t.describe()
            ))),
            None => Err(invalid(format!(
                "expected {}, found end of expression",
                expected.describe()
            ))),
        }
    }

    fn descend(&mut self) -> PipelineResult<()> {
        self.depth += 1;
        if self.depth > MAX_NESTING {
            return Err(invalid(format!(
                "expression nested deeper than {} levels",
                MAX_NESTING
            )));
        }
        Ok(())
    }

    fn expr(&mut self) -> PipelineResult<Predicate> {
        let mut left = self.and_expr()?;
        while self.peek() == Some(&Token::Or) {
            self.pos += 1;
            let right = self.and_expr()?;
            left = left.or(right);
        }
        Ok(left)
    }

    fn and_expr(&mut self) -> PipelineResult<Predicate> {
        let mut left = self.unary()?;
        while self.peek() == Some(&Token::And) {
            self.pos += 1;
            let right = self.unary()?;
            left = left.and(right);
        }
        Ok(left)
    }

    fn unary(&mut self) -> PipelineResult<Predicate> {
        if self.peek() == Some(&Token::Not) {
            self.pos += 1;
            self.descend()?;
            let inner = self.unary()?;
            self.depth -= 1;
            return Ok(Predicate::Not(Box::new(inner)));
        }
        self.primary()
    }

    fn primary(&mut self) -> PipelineResult<Predicate> {
        if self.peek() == Some(&Token::LParen) {
            self.pos += 1;
            self.descend()?;
            let inner = self.expr()?;
            self.expect(Token::RParen)?;
            self.depth -= 1;
            return Ok(inner);
        }

        if matches!(self.peek(), Some(Token::Ident(_))) {
            let membership = match (self.peek_at(1), self.peek_at(2)) {
                (Some(Token::In), _) => Some(false),
                (Some(Token::Not), Some(Token::In)) => Some(true),
                _ => None,
            };
            if let Some(negated) = membership {
                return self.membership(negated);
            }
        }

        let left = self.operand()?;
        let op = match self.next() {
            Some(Token::Op(op)) => op,
            Some(t) => {
                return Err(invalid(format!(
                    "expected comparison operator, found {}",
                    t.describe()
                )))
            }
            None => return Err(invalid("expected comparison operator, found end of expression")),
        };
        let right = self.operand()?;

        if matches!((&left, &right), (Operand::Literal(_), Operand::Literal(_))) {
            return Err(invalid("comparison must reference at least one column"));
        }

        Ok(Predicate::Compare { left, op, right })
    }

    fn membership(&mut self, negated: bool) -> PipelineResult<Predicate> {
        let column = match self.next() {
            Some(Token::Ident(name)) => name,
            _ => return Err(invalid("expected column before 'in'")),
        };
        if negated {
            self.expect(Token::Not)?;
        }
        self.expect(Token::In)?;
        self.expect(Token::LBracket)?;

        let mut values = Vec::new();
        loop {
            match self.next() {
                Some(Token::Literal(v)) => values.push(v),
                Some(Token::RBracket) if values.is_empty() => break,
                Some(t) => {
                    return Err(invalid(format!(
                        "expected literal in list, found {}",
                        t.describe()
                    )))
                }
                None => return Err(invalid("unterminated list")),
            }
            match self.next() {
                Some(Token::Comma) => continue,
                Some(Token::RBracket) => break,
                Some(t) => {
                    return Err(invalid(format!(
                        "expected ',' or ']', found {}",
                        t.describe()
                    )))
                }
                None => return Err(invalid("unterminated list")),
            }
        }

        Ok(Predicate::In {
            column,
            values,
            negated,
        })
    }

    fn operand(&mut self) -> PipelineResult<Operand> {
        match self.next() {
            Some(Token::Ident(name)) => Ok(Operand::Column(name)),
            Some(Token::Literal(v)) => Ok(Operand::Literal(v)),
            Some(t) => Err(invalid(format!(
                "expected column or literal, found {}",
                t.describe()
            ))),
            None => Err(invalid("expected column or literal, found end of expression")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::table_of;

    fn solar() -> Table {
        table_of(
            &["sector", "app_status", "nameplate", "total_cost"],
            vec![
                vec!["Residential".into(), "Completed".into(), Value::Float(5.5), Value::Int(30000)],
                vec!["Commercial".into(), "Completed".into(), Value::Float(120.0), Value::Int(900000)],
                vec!["Residential".into(), "Cancelled".into(), Value::Float(4.0), Value::Missing],
            ],
        )
    }

    fn matching(query: &str, table: &Table) -> Vec<usize> {
        let predicate = Predicate::parse(query).unwrap();
        table
            .rows()
            .iter()
            .enumerate()
            .filter(|(_, row)| predicate.matches(table, row))
            .map(|(i, _)| i)
            .collect()
    }

    #[test]
    fn test_parse_or_of_equalities() {
        let p = Predicate::parse("month == 1 or month == 7").unwrap();
        assert_eq!(p, Predicate::equals("month", Value::Int(1)).or(Predicate::equals("month", Value::Int(7))));
    }

    #[test]
    fn test_and_binds_tighter_than_or() {
        let p = Predicate::parse("a == 1 or b == 2 and c == 3").unwrap();
        let expected = Predicate::equals("a", Value::Int(1))
            .or(Predicate::equals("b", Value::Int(2)).and(Predicate::equals("c", Value::Int(3))));
        assert_eq!(p, expected);
    }

    #[test]
    fn test_ampersand_and_quoted_strings() {
        let table = solar();
        assert_eq!(
            matching("sector == 'Residential' & app_status == \"Completed\"", &table),
            vec![0]
        );
    }

    #[test]
    fn test_numeric_range_skips_missing() {
        let table = solar();
        assert_eq!(matching("nameplate < 20 and total_cost < 160000", &table), vec![0]);
        assert_eq!(matching("total_cost != 30000", &table), vec![1, 2]);
    }

    #[test]
    fn test_membership() {
        let table = table_of(
            &["hour"],
            (0..24).map(|h| vec![Value::Int(h)]).collect(),
        );
        assert_eq!(matching("hour in [8, 12, 20]", &table), vec![8, 12, 20]);
        assert_eq!(matching("hour not in [8, 12, 20]", &table).len(), 21);
    }

    #[test]
    fn test_negation_and_parentheses() {
        let table = solar();
        assert_eq!(matching("not (sector == 'Residential')", &table), vec![1]);
        assert_eq!(matching("~(nameplate >= 5)", &table), vec![2]);
    }

    #[test]
    fn test_backtick_identifier() {
        let table = table_of(&["total cost"], vec![vec![Value::Int(5)], vec![Value::Int(50)]]);
        assert_eq!(matching("`total cost` > 10", &table), vec![1]);
    }

    #[test]
    fn test_text_never_equals_number() {
        let table = table_of(&["year"], vec![vec!["2010".into()], vec![Value::Int(2010)]]);
        assert_eq!(matching("year == 2010", &table), vec![1]);
    }

    #[test]
    fn test_malformed_queries() {
        for query in [
            "",
            "month = 1",
            "month ==",
            "(month == 1",
            "month == 1 month",
            "1 == 2",
            "hour in [8, 12",
            "sector == 'Residential",
            "month == 1 @",
        ] {
            assert!(
                matches!(Predicate::parse(query), Err(PipelineError::InvalidPredicate(_))),
                "query should fail: {query}"
            );
        }
    }

    #[test]
    fn test_nesting_limit() {
        let deep = format!("{}month == 1{}", "(".repeat(10_000), ")".repeat(10_000));
        assert!(matches!(Predicate::parse(&deep), Err(PipelineError::InvalidPredicate(_))));

        let nots = format!("{}month == 1", "not ".repeat(10_000));
        assert!(matches!(Predicate::parse(&nots), Err(PipelineError::InvalidPredicate(_))));

        let shallow = format!("{}month == 1{}", "(".repeat(MAX_NESTING), ")".repeat(MAX_NESTING));
        assert!(Predicate::parse(&shallow).is_ok());

        // Depth is released when a group closes
        let siblings = vec!["(month == 1)"; MAX_NESTING * 2].join(" or ");
        assert!(siblings.parse::<Predicate>().is_ok());
    }

    #[test]
    fn test_validate_reports_unknown_column() {
        let table = solar();
        let p = Predicate::parse("state == 'CA'").unwrap();
        assert!(matches!(p.validate(&table), Err(PipelineError::InvalidPredicate(_))));
        assert!(Predicate::parse("nameplate > 1").unwrap().validate(&table).is_ok());
    }

    #[test]
    fn test_columns_deduplicated() {
        let p = Predicate::parse("month == 1 or month == 7 and hour > 3").unwrap();
        assert_eq!(p.columns(), vec!["month", "hour"]);
    }

    #[test]
    fn test_negative_and_exponent_numbers() {
        let table = table_of(&["x"], vec![vec![Value::Float(-2.5)], vec![Value::Float(2e3)]]);
        assert_eq!(matching("x < -1", &table), vec![0]);
        assert_eq!(matching("x >= 1.5e3", &table), vec![1]);
    }
}
