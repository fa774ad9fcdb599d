//! Recursive-descent parser and evaluator for single-variable expressions.
//!
//! Grammar (lowest to highest precedence):
//!
//! ```text
//! expr  := term (('+' | '-') term)*
//! term  := unary (('*' | '/' | '%') unary)*
//! unary := ('-' | '+') unary | power
//! power := atom ('^' unary)?
//! atom  := number | constant | variable | func atom | '(' expr ')'
//! ```
//!
//! Implicit multiplication is accepted between a number, variable or closing
//! parenthesis and a following identifier or opening parenthesis (`2x`,
//! `3(x+1)`, `(x+1)(x-1)`).

use std::collections::BTreeSet;
use std::fmt;

use super::MathError;
use crate::utils::math::round_to;

/// Names recognized as functions, including aliases.
pub const FUNCTION_NAMES: &[&str] = &[
    "sin", "cos", "tan", "asin", "arcsin", "acos", "arccos", "atan", "arctan", "sinh", "cosh",
    "tanh", "ln", "log", "log10", "log2", "sqrt", "abs", "exp", "floor", "ceil", "round",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Pow,
}

impl BinOp {
    fn symbol(self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Rem => "%",
            BinOp::Pow => "^",
        }
    }

    fn precedence(self) -> u8 {
        match self {
            BinOp::Add | BinOp::Sub => 1,
            BinOp::Mul | BinOp::Div | BinOp::Rem => 2,
            BinOp::Pow => 4,
        }
    }

    fn apply(self, a: f64, b: f64) -> f64 {
        match self {
            BinOp::Add => a + b,
            BinOp::Sub => a - b,
            BinOp::Mul => a * b,
            BinOp::Div => a / b,
            BinOp::Rem => a % b,
            BinOp::Pow => a.powf(b),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Func {
    Sin,
    Cos,
    Tan,
    Asin,
    Acos,
    Atan,
    Sinh,
    Cosh,
    Tanh,
    Ln,
    Log10,
    Log2,
    Sqrt,
    Abs,
    Exp,
    Floor,
    Ceil,
    Round,
}

impl Func {
    pub fn from_name(name: &str) -> Option<Self> {
        let func = match name {
            "sin" => Func::Sin,
            "cos" => Func::Cos,
            "tan" => Func::Tan,
            "asin" | "arcsin" => Func::Asin,
            "acos" | "arccos" => Func::Acos,
            "atan" | "arctan" => Func::Atan,
            "sinh" => Func::Sinh,
            "cosh" => Func::Cosh,
            "tanh" => Func::Tanh,
            "ln" => Func::Ln,
            "log" | "log10" => Func::Log10,
            "log2" => Func::Log2,
            "sqrt" => Func::Sqrt,
            "abs" => Func::Abs,
            "exp" => Func::Exp,
            "floor" => Func::Floor,
            "ceil" => Func::Ceil,
            "round" => Func::Round,
            _ => return None,
        };
        Some(func)
    }

    pub fn name(self) -> &'static str {
        match self {
            Func::Sin => "sin",
            Func::Cos => "cos",
            Func::Tan => "tan",
            Func::Asin => "asin",
            Func::Acos => "acos",
            Func::Atan => "atan",
            Func::Sinh => "sinh",
            Func::Cosh => "cosh",
            Func::Tanh => "tanh",
            Func::Ln => "ln",
            Func::Log10 => "log",
            Func::Log2 => "log2",
            Func::Sqrt => "sqrt",
            Func::Abs => "abs",
            Func::Exp => "exp",
            Func::Floor => "floor",
            Func::Ceil => "ceil",
            Func::Round => "round",
        }
    }

    pub fn apply(self, x: f64) -> f64 {
        match self {
            Func::Sin => x.sin(),
            Func::Cos => x.cos(),
            Func::Tan => x.tan(),
            Func::Asin => x.asin(),
            Func::Acos => x.acos(),
            Func::Atan => x.atan(),
            Func::Sinh => x.sinh(),
            Func::Cosh => x.cosh(),
            Func::Tanh => x.tanh(),
            Func::Ln => x.ln(),
            Func::Log10 => x.log10(),
            Func::Log2 => x.log2(),
            Func::Sqrt => x.sqrt(),
            Func::Abs => x.abs(),
            Func::Exp => x.exp(),
            Func::Floor => x.floor(),
            Func::Ceil => x.ceil(),
            Func::Round => x.round(),
        }
    }
}

/// Expression tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Num(f64),
    Var(String),
    Neg(Box<Expr>),
    Binary(BinOp, Box<Expr>, Box<Expr>),
    Call(Func, Box<Expr>),
}

impl Expr {
    /// Parse an expression string.
    pub fn parse(input: &str) -> Result<Expr, MathError> {
        let tokens = insert_implicit_multiplication(lex(input)?);
        if tokens.is_empty() {
            return Err(MathError::Syntax("empty expression".into()));
        }
        let mut parser = Parser { tokens, pos: 0 };
        let expr = parser.parse_expr()?;
        match parser.peek() {
            None => Ok(expr),
            Some(tok) => Err(MathError::Syntax(format!("unexpected {}", tok))),
        }
    }

    /// Evaluate with the given variable bindings. Any non-finite intermediate
    /// value (division by zero, `sqrt(-1)`, overflow) is an error.
    pub fn eval(&self, bindings: &[(&str, f64)]) -> Result<f64, MathError> {
        let value = match self {
            Expr::Num(n) => *n,
            Expr::Var(name) => bindings
                .iter()
                .find(|(k, _)| *k == name.as_str())
                .map(|(_, v)| *v)
                .ok_or_else(|| MathError::UndefinedSymbol(name.clone()))?,
            Expr::Neg(inner) => -inner.eval(bindings)?,
            Expr::Binary(op, lhs, rhs) => op.apply(lhs.eval(bindings)?, rhs.eval(bindings)?),
            Expr::Call(func, arg) => func.apply(arg.eval(bindings)?),
        };
        if value.is_finite() {
            Ok(value)
        } else {
            Err(MathError::NonFinite)
        }
    }

    /// Evaluate with a single variable bound.
    pub fn eval_at(&self, var: &str, x: f64) -> Result<f64, MathError> {
        self.eval(&[(var, x)])
    }

    /// Free variable names.
    pub fn variables(&self) -> BTreeSet<String> {
        let mut vars = BTreeSet::new();
        self.collect_variables(&mut vars);
        vars
    }

    fn collect_variables(&self, vars: &mut BTreeSet<String>) {
        match self {
            Expr::Num(_) => {}
            Expr::Var(name) => {
                vars.insert(name.clone());
            }
            Expr::Neg(inner) | Expr::Call(_, inner) => inner.collect_variables(vars),
            Expr::Binary(_, lhs, rhs) => {
                lhs.collect_variables(vars);
                rhs.collect_variables(vars);
            }
        }
    }

    pub fn contains_var(&self, var: &str) -> bool {
        match self {
            Expr::Num(_) => false,
            Expr::Var(name) => name == var,
            Expr::Neg(inner) | Expr::Call(_, inner) => inner.contains_var(var),
            Expr::Binary(_, lhs, rhs) => lhs.contains_var(var) || rhs.contains_var(var),
        }
    }

    fn precedence(&self) -> u8 {
        match self {
            Expr::Binary(op, _, _) => op.precedence(),
            Expr::Neg(_) => 3,
            _ => 5,
        }
    }

    fn fmt_child(&self, parent: u8, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.precedence() < parent {
            write!(f, "({})", self)
        } else {
            write!(f, "{}", self)
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Num(n) => {
                let rounded = round_to(*n, 6);
                if rounded.fract() == 0.0 && rounded.abs() < 1e15 {
                    write!(f, "{}", rounded as i64)
                } else {
                    write!(f, "{}", rounded)
                }
            }
            Expr::Var(name) => write!(f, "{}", name),
            Expr::Neg(inner) => {
                write!(f, "-")?;
                inner.fmt_child(4, f)
            }
            Expr::Binary(op, lhs, rhs) => {
                let prec = op.precedence();
                // Left-associative operators need parentheses on an equal-precedence
                // right operand; power is right-associative.
                let (left_min, right_min) = if *op == BinOp::Pow {
                    (prec + 1, prec)
                } else {
                    (prec, prec + 1)
                };
                lhs.fmt_child(left_min, f)?;
                if *op == BinOp::Pow {
                    write!(f, "^")?;
                } else {
                    write!(f, " {} ", op.symbol())?;
                }
                rhs.fmt_child(right_min, f)
            }
            Expr::Call(func, arg) => write!(f, "{}({})", func.name(), arg),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Num(f64),
    Ident(String),
    Op(char),
    LParen,
    RParen,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Num(n) => write!(f, "number {}", n),
            Token::Ident(name) => write!(f, "'{}'", name),
            Token::Op(c) => write!(f, "'{}'", c),
            Token::LParen => write!(f, "'('"),
            Token::RParen => write!(f, "')'"),
        }
    }
}

fn lex(input: &str) -> Result<Vec<Token>, MathError> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();

    while let Some(&c) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            '0'..='9' | '.' => {
                let mut literal = String::new();
                while let Some(&d) = chars.peek() {
                    if d.is_ascii_digit() || d == '.' {
                        literal.push(d);
                        chars.next();
                    } else {
                        break;
                    }
                }
                let value = literal
                    .parse::<f64>()
                    .map_err(|_| MathError::Syntax(format!("invalid number '{}'", literal)))?;
                tokens.push(Token::Num(value));
            }
            'π' => {
                chars.next();
                tokens.push(Token::Num(std::f64::consts::PI));
            }
            c if c.is_alphabetic() => {
                let mut name = String::new();
                while let Some(&d) = chars.peek() {
                    if d.is_alphanumeric() || d == '_' {
                        name.push(d);
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(Token::Ident(name.to_lowercase()));
            }
            '*' => {
                chars.next();
                if chars.peek() == Some(&'*') {
                    chars.next();
                    tokens.push(Token::Op('^'));
                } else {
                    tokens.push(Token::Op('*'));
                }
            }
            '+' | '-' | '/' | '^' | '%' => {
                chars.next();
                tokens.push(Token::Op(c));
            }
            '×' | '·' => {
                chars.next();
                tokens.push(Token::Op('*'));
            }
            '÷' | ':' => {
                chars.next();
                tokens.push(Token::Op('/'));
            }
            '−' => {
                chars.next();
                tokens.push(Token::Op('-'));
            }
            '(' | '[' => {
                chars.next();
                tokens.push(Token::LParen);
            }
            ')' | ']' => {
                chars.next();
                tokens.push(Token::RParen);
            }
            other => return Err(MathError::UnexpectedChar(other)),
        }
    }

    Ok(tokens)
}

fn is_function(token: &Token) -> bool {
    matches!(token, Token::Ident(name) if Func::from_name(name).is_some())
}

fn insert_implicit_multiplication(tokens: Vec<Token>) -> Vec<Token> {
    let mut out: Vec<Token> = Vec::with_capacity(tokens.len());
    for token in tokens {
        if let Some(prev) = out.last() {
            let prev_is_operand = matches!(prev, Token::Num(_) | Token::RParen)
                || (matches!(prev, Token::Ident(_)) && !is_function(prev));
            let next_starts_operand = match &token {
                Token::Ident(_) | Token::LParen => true,
                Token::Num(_) => matches!(prev, Token::RParen),
                _ => false,
            };
            if prev_is_operand && next_starts_operand {
                out.push(Token::Op('*'));
            }
        }
        out.push(token);
    }
    out
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn eat_op(&mut self, ops: &[char]) -> Option<char> {
        match self.peek() {
            Some(Token::Op(c)) if ops.contains(c) => {
                let c = *c;
                self.pos += 1;
                Some(c)
            }
            _ => None,
        }
    }

    fn parse_expr(&mut self) -> Result<Expr, MathError> {
        let mut lhs = self.parse_term()?;
        while let Some(op) = self.eat_op(&['+', '-']) {
            let rhs = self.parse_term()?;
            let op = if op == '+' { BinOp::Add } else { BinOp::Sub };
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_term(&mut self) -> Result<Expr, MathError> {
        let mut lhs = self.parse_unary()?;
        while let Some(op) = self.eat_op(&['*', '/', '%']) {
            let rhs = self.parse_unary()?;
            let op = match op {
                '*' => BinOp::Mul,
                '/' => BinOp::Div,
                _ => BinOp::Rem,
            };
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<Expr, MathError> {
        match self.eat_op(&['-', '+']) {
            Some('-') => Ok(Expr::Neg(Box::new(self.parse_unary()?))),
            Some(_) => self.parse_unary(),
            None => self.parse_power(),
        }
    }

    fn parse_power(&mut self) -> Result<Expr, MathError> {
        let base = self.parse_atom()?;
        if self.eat_op(&['^']).is_some() {
            let exponent = self.parse_unary()?;
            return Ok(Expr::Binary(BinOp::Pow, Box::new(base), Box::new(exponent)));
        }
        Ok(base)
    }

    fn parse_atom(&mut self) -> Result<Expr, MathError> {
        match self.next() {
            Some(Token::Num(n)) => Ok(Expr::Num(n)),
            Some(Token::Ident(name)) => {
                if let Some(func) = Func::from_name(&name) {
                    let arg = self.parse_atom()?;
                    return Ok(Expr::Call(func, Box::new(arg)));
                }
                match name.as_str() {
                    "pi" => Ok(Expr::Num(std::f64::consts::PI)),
                    "e" => Ok(Expr::Num(std::f64::consts::E)),
                    _ => Ok(Expr::Var(name)),
                }
            }
            Some(Token::LParen) => {
                let inner = self.parse_expr()?;
                match self.next() {
                    Some(Token::RParen) => Ok(inner),
                    Some(tok) => Err(MathError::Syntax(format!("expected ')', found {}", tok))),
                    None => Err(MathError::Syntax("missing ')'".into())),
                }
            }
            Some(tok) => Err(MathError::Syntax(format!("unexpected {}", tok))),
            None => Err(MathError::Syntax("unexpected end of expression".into())),
        }
    }
}
