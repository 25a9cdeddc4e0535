//! Boolean cut expressions over per-event scalar columns.
//!
//! Supports arithmetic (`+ - * /`), comparisons (`== != < <= > >=`), boolean
//! operators (`&& || !`), parentheses and the functions `abs`, `sqrt`, `min`,
//! `max`. An event passes when the expression evaluates to a non-zero value.

use crate::error::{NtupleError, Result};
use crate::types::EventColumns;

#[derive(Debug, Clone)]
enum Node {
    Number(f64),
    Column(usize),
    Neg(Box<Node>),
    Not(Box<Node>),
    Binary(BinOp, Box<Node>, Box<Node>),
    Call(Func, Vec<Node>),
}

#[derive(Debug, Clone, Copy)]
enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

#[derive(Debug, Clone, Copy)]
enum Func {
    Abs,
    Sqrt,
    Min,
    Max,
}

impl Func {
    fn lookup(name: &str) -> Option<(Self, usize)> {
        match name {
            "abs" => Some((Self::Abs, 1)),
            "sqrt" => Some((Self::Sqrt, 1)),
            "min" => Some((Self::Min, 2)),
            "max" => Some((Self::Max, 2)),
            _ => None,
        }
    }
}

/// A parsed cut ready for evaluation.
#[derive(Debug, Clone)]
pub struct CutExpr {
    ast: Node,
    /// Column names referenced by the expression, in order of first use.
    pub required_columns: Vec<String>,
}

impl CutExpr {
    /// Parse a cut expression.
    pub fn compile(input: &str) -> Result<Self> {
        let tokens = tokenize(input)?;
        if tokens.is_empty() {
            return Err(NtupleError::Cut("empty expression".into()));
        }
        let mut parser = Parser {
            tokens: &tokens,
            pos: 0,
            columns: Vec::new(),
        };
        let ast = parser.parse_or()?;
        if let Some(tok) = parser.tokens.get(parser.pos) {
            return Err(NtupleError::Cut(format!(
                "unexpected token after expression: {tok:?}"
            )));
        }
        Ok(Self {
            ast,
            required_columns: parser.columns,
        })
    }

    /// Evaluate for one event. `values` follows `required_columns` order.
    pub fn eval_row(&self, values: &[f64]) -> f64 {
        eval(&self.ast, values)
    }

    /// Indices of the events that pass, in ascending order.
    ///
    /// Every referenced column must be a scalar column of `columns`.
    pub fn select(&self, columns: &EventColumns) -> Result<Vec<usize>> {
        let mut inputs = Vec::with_capacity(self.required_columns.len());
        for name in &self.required_columns {
            let column = columns
                .get(name)
                .ok_or_else(|| NtupleError::MissingColumn(name.clone()))?;
            let values = column.scalar_values().ok_or_else(|| {
                NtupleError::Cut(format!(
                    "column '{name}' is {} and cannot be used in a cut",
                    column.kind()
                ))
            })?;
            inputs.push(values);
        }

        let mut row = vec![0.0; inputs.len()];
        let mut keep = Vec::new();
        for event in 0..columns.num_events() {
            for (slot, values) in row.iter_mut().zip(&inputs) {
                *slot = values[event];
            }
            if self.eval_row(&row) != 0.0 {
                keep.push(event);
            }
        }
        Ok(keep)
    }
}

fn truth(b: bool) -> f64 {
    if b {
        1.0
    } else {
        0.0
    }
}

fn eval(node: &Node, vals: &[f64]) -> f64 {
    match node {
        Node::Number(n) => *n,
        Node::Column(i) => vals[*i],
        Node::Neg(a) => -eval(a, vals),
        Node::Not(a) => truth(eval(a, vals) == 0.0),
        Node::Binary(op, a, b) => {
            let lhs = eval(a, vals);
            let rhs = eval(b, vals);
            match op {
                BinOp::Add => lhs + rhs,
                BinOp::Sub => lhs - rhs,
                BinOp::Mul => lhs * rhs,
                BinOp::Div => lhs / rhs,
                BinOp::Eq => truth(lhs == rhs),
                BinOp::Ne => truth(lhs != rhs),
                BinOp::Lt => truth(lhs < rhs),
                BinOp::Le => truth(lhs <= rhs),
                BinOp::Gt => truth(lhs > rhs),
                BinOp::Ge => truth(lhs >= rhs),
                BinOp::And => truth(lhs != 0.0 && rhs != 0.0),
                BinOp::Or => truth(lhs != 0.0 || rhs != 0.0),
            }
        }
        Node::Call(func, args) => match func {
            Func::Abs => eval(&args[0], vals).abs(),
            Func::Sqrt => eval(&args[0], vals).sqrt(),
            Func::Min => eval(&args[0], vals).min(eval(&args[1], vals)),
            Func::Max => eval(&args[0], vals).max(eval(&args[1], vals)),
        },
    }
}

// ── Tokenizer ──────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Ident(String),
    Op(&'static str),
    LParen,
    RParen,
    Comma,
}

const TWO_CHAR_OPS: [&str; 6] = ["==", "!=", "<=", ">=", "&&", "||"];
const ONE_CHAR_OPS: [&str; 7] = ["<", ">", "+", "-", "*", "/", "!"];

fn tokenize(input: &str) -> Result<Vec<Token>> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            i += 1;
            continue;
        }
        if c.is_ascii_digit()
            || (c == '.' && chars.get(i + 1).is_some_and(|d| d.is_ascii_digit()))
        {
            let start = i;
            while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                i += 1;
            }
            if i < chars.len() && (chars[i] == 'e' || chars[i] == 'E') {
                i += 1;
                if i < chars.len() && (chars[i] == '+' || chars[i] == '-') {
                    i += 1;
                }
                while i < chars.len() && chars[i].is_ascii_digit() {
                    i += 1;
                }
            }
            let text: String = chars[start..i].iter().collect();
            let value = text
                .parse::<f64>()
                .map_err(|_| NtupleError::Cut(format!("invalid number '{text}'")))?;
            tokens.push(Token::Number(value));
            continue;
        }
        if c.is_ascii_alphabetic() || c == '_' {
            let start = i;
            while i < chars.len()
                && (chars[i].is_ascii_alphanumeric() || chars[i] == '_' || chars[i] == '.')
            {
                i += 1;
            }
            tokens.push(Token::Ident(chars[start..i].iter().collect()));
            continue;
        }
        match c {
            '(' => tokens.push(Token::LParen),
            ')' => tokens.push(Token::RParen),
            ',' => tokens.push(Token::Comma),
            _ => {
                let pair: String = chars[i..chars.len().min(i + 2)].iter().collect();
                if let Some(op) = TWO_CHAR_OPS.iter().find(|op| **op == pair) {
                    tokens.push(Token::Op(*op));
                    i += 2;
                    continue;
                }
                let single = c.to_string();
                match ONE_CHAR_OPS.iter().find(|op| **op == single) {
                    Some(op) => tokens.push(Token::Op(*op)),
                    None => {
                        return Err(NtupleError::Cut(format!(
                            "unexpected character '{c}' at position {i}"
                        )))
                    }
                }
            }
        }
        i += 1;
    }
    Ok(tokens)
}

// ── Parser ─────────────────────────────────────────────────────
//
// Precedence, loosest first: ||, &&, comparison, additive, multiplicative,
// unary (! and -), primary.

struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
    columns: Vec<String>,
}

impl Parser<'_> {
    fn peek_op(&self) -> Option<&'static str> {
        match self.tokens.get(self.pos) {
            Some(Token::Op(op)) => Some(*op),
            _ => None,
        }
    }

    fn binary_level(
        &mut self,
        ops: &[(&str, BinOp)],
        next: fn(&mut Self) -> Result<Node>,
    ) -> Result<Node> {
        let mut lhs = next(self)?;
        while let Some(op) = self.peek_op() {
            let Some((_, bin)) = ops.iter().find(|(text, _)| *text == op) else {
                break;
            };
            self.pos += 1;
            let rhs = next(self)?;
            lhs = Node::Binary(*bin, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_or(&mut self) -> Result<Node> {
        self.binary_level(&[("||", BinOp::Or)], Self::parse_and)
    }

    fn parse_and(&mut self) -> Result<Node> {
        self.binary_level(&[("&&", BinOp::And)], Self::parse_cmp)
    }

    fn parse_cmp(&mut self) -> Result<Node> {
        self.binary_level(
            &[
                ("==", BinOp::Eq),
                ("!=", BinOp::Ne),
                ("<", BinOp::Lt),
                ("<=", BinOp::Le),
                (">", BinOp::Gt),
                (">=", BinOp::Ge),
            ],
            Self::parse_additive,
        )
    }

    fn parse_additive(&mut self) -> Result<Node> {
        self.binary_level(&[("+", BinOp::Add), ("-", BinOp::Sub)], Self::parse_term)
    }

    fn parse_term(&mut self) -> Result<Node> {
        self.binary_level(&[("*", BinOp::Mul), ("/", BinOp::Div)], Self::parse_unary)
    }

    fn parse_unary(&mut self) -> Result<Node> {
        match self.peek_op() {
            Some("!") => {
                self.pos += 1;
                Ok(Node::Not(Box::new(self.parse_unary()?)))
            }
            Some("-") => {
                self.pos += 1;
                Ok(Node::Neg(Box::new(self.parse_unary()?)))
            }
            Some("+") => {
                self.pos += 1;
                self.parse_unary()
            }
            _ => self.parse_primary(),
        }
    }

    fn expect(&mut self, token: Token) -> Result<()> {
        match self.tokens.get(self.pos) {
            Some(t) if *t == token => {
                self.pos += 1;
                Ok(())
            }
            other => Err(NtupleError::Cut(format!("expected {token:?}, found {other:?}"))),
        }
    }

    fn parse_primary(&mut self) -> Result<Node> {
        let token = self
            .tokens
            .get(self.pos)
            .cloned()
            .ok_or_else(|| NtupleError::Cut("unexpected end of expression".into()))?;
        self.pos += 1;
        match token {
            Token::Number(n) => Ok(Node::Number(n)),
            Token::LParen => {
                let inner = self.parse_or()?;
                self.expect(Token::RParen)?;
                Ok(inner)
            }
            Token::Ident(name) => {
                if self.tokens.get(self.pos) == Some(&Token::LParen) {
                    return self.parse_call(&name);
                }
                let index = match self.columns.iter().position(|c| *c == name) {
                    Some(i) => i,
                    None => {
                        self.columns.push(name);
                        self.columns.len() - 1
                    }
                };
                Ok(Node::Column(index))
            }
            other => Err(NtupleError::Cut(format!("unexpected token {other:?}"))),
        }
    }

    fn parse_call(&mut self, name: &str) -> Result<Node> {
        let (func, arity) = Func::lookup(name)
            .ok_or_else(|| NtupleError::Cut(format!("unknown function '{name}'")))?;
        self.expect(Token::LParen)?;
        let mut args = vec![self.parse_or()?];
        while self.tokens.get(self.pos) == Some(&Token::Comma) {
            self.pos += 1;
            args.push(self.parse_or()?);
        }
        self.expect(Token::RParen)?;
        if args.len() != arity {
            return Err(NtupleError::Cut(format!(
                "{name}() takes {arity} argument(s), got {}",
                args.len()
            )));
        }
        Ok(Node::Call(func, args))
    }
}
