//! Formula resolution for template-defined components.
//!
//! Formulas are parsed into a small typed AST (arithmetic, named references
//! and the `min`/`max`/`round` functions) and evaluated by an interpreter.
//! Nothing outside that grammar can be expressed.
//!
//! Identifiers are looked up first in the evaluation context and then as
//! other formula codes, which are resolved recursively. Each evaluation
//! session memoizes resolved codes and tracks the resolution stack to detect
//! cycles; sessions share no state.

use std::collections::{BTreeMap, HashMap};
use std::str::FromStr;

use rust_decimal::Decimal;

use crate::error::{EngineError, EngineResult};

use super::round_currency;

/// Longest formula source accepted, in characters.
pub const MAX_FORMULA_LENGTH: usize = 1024;

/// Deepest nesting of parentheses, calls and unary signs accepted.
pub const MAX_NESTING_DEPTH: usize = 64;

/// Binary arithmetic operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    /// `+`
    Add,
    /// `-`
    Sub,
    /// `*`
    Mul,
    /// `/`
    Div,
}

/// Built-in functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Function {
    /// Smallest argument.
    Min,
    /// Largest argument.
    Max,
    /// Currency rounding of a single argument.
    Round,
}

impl Function {
    fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "min" => Some(Function::Min),
            "max" => Some(Function::Max),
            "round" => Some(Function::Round),
            _ => None,
        }
    }
}

/// A parsed formula expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    /// A numeric literal.
    Number(Decimal),
    /// A reference to a context value or another component.
    Ident(String),
    /// Unary negation.
    Neg(Box<Expr>),
    /// A binary operation.
    Binary {
        /// The operator.
        op: BinaryOp,
        /// Left operand.
        lhs: Box<Expr>,
        /// Right operand.
        rhs: Box<Expr>,
    },
    /// A function call.
    Call {
        /// The function.
        function: Function,
        /// Its arguments.
        args: Vec<Expr>,
    },
}

impl Expr {
    /// Identifiers referenced anywhere in the expression.
    pub fn references(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_references(&mut out);
        out
    }

    fn collect_references<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Expr::Number(_) => {}
            Expr::Ident(name) => out.push(name),
            Expr::Neg(inner) => inner.collect_references(out),
            Expr::Binary { lhs, rhs, .. } => {
                lhs.collect_references(out);
                rhs.collect_references(out);
            }
            Expr::Call { args, .. } => args.iter().for_each(|a| a.collect_references(out)),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(Decimal),
    Ident(String),
    Plus,
    Minus,
    Star,
    Slash,
    LParen,
    RParen,
    Comma,
}

fn tokenize(code: &str, source: &str) -> EngineResult<Vec<Token>> {
    let syntax = |message: String| EngineError::FormulaSyntax {
        code: code.to_string(),
        message,
    };
    let chars: Vec<char> = source.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while let Some(&c) = chars.get(i) {
        match c {
            ' ' | '\t' | '\n' | '\r' => i += 1,
            '+' => {
                tokens.push(Token::Plus);
                i += 1;
            }
            '-' => {
                tokens.push(Token::Minus);
                i += 1;
            }
            '*' => {
                tokens.push(Token::Star);
                i += 1;
            }
            '/' => {
                tokens.push(Token::Slash);
                i += 1;
            }
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            ',' => {
                tokens.push(Token::Comma);
                i += 1;
            }
            c if c.is_ascii_digit() || c == '.' => {
                let start = i;
                while chars
                    .get(i)
                    .is_some_and(|ch| ch.is_ascii_digit() || *ch == '.')
                {
                    i += 1;
                }
                let literal: String = chars[start..i].iter().collect();
                let value = Decimal::from_str(&literal)
                    .map_err(|_| syntax(format!("invalid number '{}'", literal)))?;
                tokens.push(Token::Number(value));
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let start = i;
                while chars
                    .get(i)
                    .is_some_and(|ch| ch.is_ascii_alphanumeric() || *ch == '_')
                {
                    i += 1;
                }
                tokens.push(Token::Ident(chars[start..i].iter().collect()));
            }
            other => {
                return Err(syntax(format!(
                    "unexpected character '{}' at position {}",
                    other, i
                )));
            }
        }
    }

    Ok(tokens)
}

struct Parser<'a> {
    code: &'a str,
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

impl<'a> Parser<'a> {
    fn syntax(&self, message: impl Into<String>) -> EngineError {
        EngineError::FormulaSyntax {
            code: self.code.to_string(),
            message: message.into(),
        }
    }

    fn enter(&mut self) -> EngineResult<()> {
        if self.depth >= MAX_NESTING_DEPTH {
            return Err(self.syntax("formula nested too deeply"));
        }
        self.depth += 1;
        Ok(())
    }

    fn leave(&mut self) {
        self.depth -= 1;
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn expect(&mut self, expected: Token) -> EngineResult<()> {
        match self.next() {
            Some(ref t) if *t == expected => Ok(()),
            Some(t) => Err(self.syntax(format!("expected {:?}, found {:?}", expected, t))),
            None => Err(self.syntax(format!("expected {:?}, found end of formula", expected))),
        }
    }

    fn parse_expr(&mut self) -> EngineResult<Expr> {
        let mut lhs = self.parse_term()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinaryOp::Add,
                Some(Token::Minus) => BinaryOp::Sub,
                _ => return Ok(lhs),
            };
            self.pos += 1;
            let rhs = self.parse_term()?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
    }

    fn parse_term(&mut self) -> EngineResult<Expr> {
        let mut lhs = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => BinaryOp::Mul,
                Some(Token::Slash) => BinaryOp::Div,
                _ => return Ok(lhs),
            };
            self.pos += 1;
            let rhs = self.parse_unary()?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
    }

    fn parse_unary(&mut self) -> EngineResult<Expr> {
        match self.peek() {
            Some(Token::Minus) => {
                self.pos += 1;
                self.enter()?;
                let inner = self.parse_unary();
                self.leave();
                Ok(Expr::Neg(Box::new(inner?)))
            }
            Some(Token::Plus) => {
                self.pos += 1;
                self.enter()?;
                let inner = self.parse_unary();
                self.leave();
                inner
            }
            _ => self.parse_primary(),
        }
    }

    fn parse_args(&mut self) -> EngineResult<Vec<Expr>> {
        let mut args = vec![self.parse_expr()?];
        while self.peek() == Some(&Token::Comma) {
            self.pos += 1;
            args.push(self.parse_expr()?);
        }
        self.expect(Token::RParen)?;
        Ok(args)
    }

    fn parse_primary(&mut self) -> EngineResult<Expr> {
        match self.next() {
            Some(Token::Number(value)) => Ok(Expr::Number(value)),
            Some(Token::Ident(name)) => {
                if self.peek() != Some(&Token::LParen) {
                    return Ok(Expr::Ident(name));
                }
                let function = Function::from_name(&name)
                    .ok_or_else(|| self.syntax(format!("unknown function '{}'", name)))?;
                self.pos += 1;
                self.enter()?;
                let args = self.parse_args();
                self.leave();
                let args = args?;
                if function == Function::Round && args.len() != 1 {
                    return Err(self.syntax("round() takes exactly one argument"));
                }
                Ok(Expr::Call { function, args })
            }
            Some(Token::LParen) => {
                self.enter()?;
                let inner = self.parse_expr().and_then(|e| {
                    self.expect(Token::RParen)?;
                    Ok(e)
                });
                self.leave();
                inner
            }
            Some(t) => Err(self.syntax(format!("unexpected {:?}", t))),
            None => Err(self.syntax("unexpected end of formula")),
        }
    }
}

/// Parses a formula into an expression tree.
///
/// `code` is the component the formula belongs to and is only used for
/// error reporting. Sources longer than [`MAX_FORMULA_LENGTH`] or nested
/// deeper than [`MAX_NESTING_DEPTH`] are rejected with `FormulaSyntax`.
///
/// # Examples
///
/// ```
/// use payroll_engine::calculation::formula::{parse, Expr};
///
/// let expr = parse("LTA", "BASIC * 0.1").unwrap();
/// assert_eq!(expr.references(), vec!["BASIC"]);
/// assert!(parse("LTA", "BASIC *").is_err());
/// ```
pub fn parse(code: &str, source: &str) -> EngineResult<Expr> {
    if source.chars().count() > MAX_FORMULA_LENGTH {
        return Err(EngineError::FormulaSyntax {
            code: code.to_string(),
            message: format!("formula longer than {} characters", MAX_FORMULA_LENGTH),
        });
    }
    let tokens = tokenize(code, source)?;
    if tokens.is_empty() {
        return Err(EngineError::FormulaSyntax {
            code: code.to_string(),
            message: "formula is empty".to_string(),
        });
    }
    let mut parser = Parser {
        code,
        tokens,
        pos: 0,
        depth: 0,
    };
    let expr = parser.parse_expr()?;
    if let Some(token) = parser.peek() {
        return Err(parser.syntax(format!("unexpected trailing {:?}", token)));
    }
    Ok(expr)
}

/// A set of named formulas, parsed once and evaluated on demand.
///
/// # Examples
///
/// ```
/// use payroll_engine::calculation::formula::FormulaResolver;
/// use rust_decimal_macros::dec;
/// use std::collections::HashMap;
///
/// let resolver = FormulaResolver::new([
///     ("LTA", "BASIC * 0.1"),
///     ("BONUS", "LTA / 2 + 100"),
/// ]).unwrap();
///
/// let context = HashMap::from([("BASIC".to_string(), dec!(20000))]);
/// assert_eq!(resolver.evaluate("BONUS", &context).unwrap(), dec!(1100));
/// ```
#[derive(Debug, Clone, Default)]
pub struct FormulaResolver {
    formulas: BTreeMap<String, Expr>,
}

impl FormulaResolver {
    /// Parses every formula, failing on the first malformed one.
    pub fn new<I, K, V>(formulas: I) -> EngineResult<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: AsRef<str>,
    {
        let mut parsed = BTreeMap::new();
        for (code, source) in formulas {
            let code = code.into();
            let expr = parse(&code, source.as_ref())?;
            parsed.insert(code, expr);
        }
        Ok(Self { formulas: parsed })
    }

    /// The codes this resolver can evaluate.
    pub fn codes(&self) -> impl Iterator<Item = &str> {
        self.formulas.keys().map(String::as_str)
    }

    /// Whether the resolver has no formulas.
    pub fn is_empty(&self) -> bool {
        self.formulas.is_empty()
    }

    /// Evaluates one code in a fresh session.
    pub fn evaluate(&self, code: &str, context: &HashMap<String, Decimal>) -> EngineResult<Decimal> {
        Session::new(self, context).resolve(code, None)
    }

    /// Evaluates every code in one memoized session.
    pub fn evaluate_all(
        &self,
        context: &HashMap<String, Decimal>,
    ) -> EngineResult<BTreeMap<String, Decimal>> {
        let mut session = Session::new(self, context);
        let mut results = BTreeMap::new();
        for code in self.formulas.keys() {
            let value = session.resolve(code, None)?;
            results.insert(code.clone(), value);
        }
        Ok(results)
    }
}

struct Session<'a> {
    resolver: &'a FormulaResolver,
    context: &'a HashMap<String, Decimal>,
    memo: HashMap<String, Decimal>,
    stack: Vec<String>,
}

impl<'a> Session<'a> {
    fn new(resolver: &'a FormulaResolver, context: &'a HashMap<String, Decimal>) -> Self {
        Self {
            resolver,
            context,
            memo: HashMap::new(),
            stack: Vec::new(),
        }
    }

    fn resolve(&mut self, code: &str, referenced_by: Option<&str>) -> EngineResult<Decimal> {
        if let Some(value) = self.context.get(code) {
            return Ok(*value);
        }
        if let Some(value) = self.memo.get(code) {
            return Ok(*value);
        }
        if let Some(start) = self.stack.iter().position(|c| c == code) {
            let mut path = self.stack[start..].to_vec();
            path.push(code.to_string());
            return Err(EngineError::CircularReference { path });
        }
        if self.stack.len() >= MAX_NESTING_DEPTH {
            return Err(EngineError::InvalidResult {
                code: code.to_string(),
                reason: format!("reference chain deeper than {}", MAX_NESTING_DEPTH),
            });
        }
        let expr = self
            .resolver
            .formulas
            .get(code)
            .ok_or_else(|| EngineError::UnknownComponent {
                name: code.to_string(),
                referenced_by: referenced_by.unwrap_or("<root>").to_string(),
            })?;

        self.stack.push(code.to_string());
        let result = self.eval(code, expr);
        self.stack.pop();

        let value = round_currency(result?);
        if value < Decimal::ZERO {
            return Err(EngineError::InvalidResult {
                code: code.to_string(),
                reason: format!("negative amount {}", value),
            });
        }
        self.memo.insert(code.to_string(), value);
        Ok(value)
    }

    fn eval(&mut self, code: &str, expr: &Expr) -> EngineResult<Decimal> {
        let invalid = |reason: &str| EngineError::InvalidResult {
            code: code.to_string(),
            reason: reason.to_string(),
        };

        match expr {
            Expr::Number(value) => Ok(*value),
            Expr::Ident(name) => self.resolve(name, Some(code)),
            Expr::Neg(inner) => Ok(-self.eval(code, inner)?),
            Expr::Binary { op, lhs, rhs } => {
                let l = self.eval(code, lhs)?;
                let r = self.eval(code, rhs)?;
                match op {
                    BinaryOp::Add => l.checked_add(r).ok_or_else(|| invalid("arithmetic overflow")),
                    BinaryOp::Sub => l.checked_sub(r).ok_or_else(|| invalid("arithmetic overflow")),
                    BinaryOp::Mul => l.checked_mul(r).ok_or_else(|| invalid("arithmetic overflow")),
                    BinaryOp::Div => {
                        if r.is_zero() {
                            return Err(invalid("division by zero"));
                        }
                        l.checked_div(r).ok_or_else(|| invalid("arithmetic overflow"))
                    }
                }
            }
            Expr::Call { function, args } => {
                let mut values = Vec::with_capacity(args.len());
                for arg in args {
                    values.push(self.eval(code, arg)?);
                }
                match function {
                    Function::Min => values
                        .into_iter()
                        .reduce(Decimal::min)
                        .ok_or_else(|| invalid("min() of nothing")),
                    Function::Max => values
                        .into_iter()
                        .reduce(Decimal::max)
                        .ok_or_else(|| invalid("max() of nothing")),
                    Function::Round => values
                        .first()
                        .map(|v| round_currency(*v))
                        .ok_or_else(|| invalid("round() of nothing")),
                }
            }
        }
    }
}
