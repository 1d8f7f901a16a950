//! The closed workflow-step expression language (spec §4.5 point 3, §9
//! design note "Expression language").
//!
//! A hand-rolled recursive-descent parser and tree-walking evaluator over a
//! deliberately small, total grammar: literals, numeric ops, comparisons,
//! boolean connectives, member access, a closed set of builtins, and a
//! ternary conditional. No function definitions, no loops, no I/O — the
//! grammar cannot express anything unbounded, so the only caps needed are
//! wall-clock and result-size, both enforced by the evaluator.

pub mod cron;

use std::collections::HashMap;
use std::time::{Duration, Instant};

use serde_json::Value;
use thiserror::Error;

/// Evaluation is time-bounded to 50ms (spec §4.5 point 3, §8 invariant 4).
pub const EVAL_TIME_BUDGET: Duration = Duration::from_millis(50);
/// Evaluation result is memory-bounded to 4 KiB serialized (spec §4.5
/// point 3).
pub const EVAL_RESULT_BUDGET_BYTES: usize = 4096;

#[derive(Debug, Error, PartialEq)]
pub enum ExprError {
    #[error("parse error: {0}")]
    Parse(String),
    #[error("ExpressionBudgetExceeded: wall time exceeded 50ms")]
    TimeBudgetExceeded,
    #[error("ExpressionBudgetExceeded: result exceeds 4KiB")]
    ResultBudgetExceeded,
    #[error("undefined name: {0}")]
    UndefinedName(String),
    #[error("type error: {0}")]
    Type(String),
    #[error("unknown builtin: {0}")]
    UnknownBuiltin(String),
}

/// The evaluation context: the three named roots the grammar allows member
/// access into, plus a single `env` scalar map for ambient values (e.g.
/// `now` from the Clock service).
#[derive(Debug, Default, Clone)]
pub struct EvalContext {
    pub state: HashMap<String, Value>,
    pub source: HashMap<String, Value>,
    pub env: HashMap<String, Value>,
}

impl EvalContext {
    fn root(&self, name: &str) -> Option<Value> {
        match name {
            "state" => Some(Value::Object(self.state.clone().into_iter().collect())),
            "source" => Some(Value::Object(self.source.clone().into_iter().collect())),
            "env" => Some(Value::Object(self.env.clone().into_iter().collect())),
            "true" => Some(Value::Bool(true)),
            "false" => Some(Value::Bool(false)),
            "null" => Some(Value::Null),
            _ => None,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────
// AST
// ─────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
enum Expr {
    Literal(Value),
    Name(String),
    Member(Box<Expr>, String),
    Index(Box<Expr>, Box<Expr>),
    Unary(UnaryOp, Box<Expr>),
    Binary(BinOp, Box<Expr>, Box<Expr>),
    Call(String, Vec<Expr>),
    Ternary(Box<Expr>, Box<Expr>, Box<Expr>),
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum UnaryOp {
    Neg,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

/// Parse a grammar-restricted expression string into an AST.
pub fn parse(src: &str) -> Result<CompiledExpr, ExprError> {
    let tokens = lex(src)?;
    let mut p = Parser { tokens, pos: 0 };
    let expr = p.parse_ternary()?;
    if p.pos != p.tokens.len() {
        return Err(ExprError::Parse(format!(
            "unexpected trailing tokens near position {}",
            p.pos
        )));
    }
    Ok(CompiledExpr(expr))
}

/// A parsed expression, ready to evaluate any number of times against
/// different contexts.
#[derive(Debug, Clone)]
pub struct CompiledExpr(Expr);

impl CompiledExpr {
    pub fn eval(&self, ctx: &EvalContext) -> Result<Value, ExprError> {
        let deadline = Instant::now() + EVAL_TIME_BUDGET;
        let value = eval_node(&self.0, ctx, deadline)?;
        let size = serde_json::to_vec(&value).map(|v| v.len()).unwrap_or(usize::MAX);
        if size > EVAL_RESULT_BUDGET_BYTES {
            return Err(ExprError::ResultBudgetExceeded);
        }
        Ok(value)
    }
}

/// Parse and evaluate in one call — convenient for one-shot workflow steps.
pub fn eval(src: &str, ctx: &EvalContext) -> Result<Value, ExprError> {
    parse(src)?.eval(ctx)
}

// ─────────────────────────────────────────────────────────────────────────
// Lexer
// ─────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Str(String),
    Ident(String),
    Symbol(&'static str),
}

fn lex(src: &str) -> Result<Vec<Token>, ExprError> {
    let chars: Vec<char> = src.chars().collect();
    let mut i = 0;
    let mut tokens = Vec::new();

    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            i += 1;
            continue;
        }
        if c.is_ascii_digit() || (c == '.' && i + 1 < chars.len() && chars[i + 1].is_ascii_digit()) {
            let start = i;
            while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                i += 1;
            }
            let text: String = chars[start..i].iter().collect();
            let n: f64 = text
                .parse()
                .map_err(|_| ExprError::Parse(format!("invalid number literal: {text}")))?;
            tokens.push(Token::Number(n));
            continue;
        }
        if c == '"' || c == '\'' {
            let quote = c;
            i += 1;
            let start = i;
            while i < chars.len() && chars[i] != quote {
                i += 1;
            }
            if i >= chars.len() {
                return Err(ExprError::Parse("unterminated string literal".into()));
            }
            let text: String = chars[start..i].iter().collect();
            i += 1;
            tokens.push(Token::Str(text));
            continue;
        }
        if c.is_alphabetic() || c == '_' {
            let start = i;
            while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                i += 1;
            }
            let text: String = chars[start..i].iter().collect();
            tokens.push(Token::Ident(text));
            continue;
        }
        let two: String = chars[i..(i + 2).min(chars.len())].iter().collect();
        let sym = match two.as_str() {
            "==" => Some("=="),
            "!=" => Some("!="),
            "<=" => Some("<="),
            ">=" => Some(">="),
            _ => None,
        };
        if let Some(s) = sym {
            tokens.push(Token::Symbol(s));
            i += 2;
            continue;
        }
        let one = match c {
            '+' => Some("+"),
            '-' => Some("-"),
            '*' => Some("*"),
            '/' => Some("/"),
            '%' => Some("%"),
            '<' => Some("<"),
            '>' => Some(">"),
            '(' => Some("("),
            ')' => Some(")"),
            '[' => Some("["),
            ']' => Some("]"),
            '.' => Some("."),
            ',' => Some(","),
            '?' => Some("?"),
            ':' => Some(":"),
            _ => None,
        };
        match one {
            Some(s) => {
                tokens.push(Token::Symbol(s));
                i += 1;
            }
            None => return Err(ExprError::Parse(format!("unexpected character: {c:?}"))),
        }
    }

    Ok(tokens)
}

// ─────────────────────────────────────────────────────────────────────────
// Parser (recursive descent, precedence climbing)
// ─────────────────────────────────────────────────────────────────────────

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn bump(&mut self) -> Option<Token> {
        let t = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        t
    }

    fn eat_symbol(&mut self, s: &str) -> Result<(), ExprError> {
        match self.bump() {
            Some(Token::Symbol(sym)) if sym == s => Ok(()),
            other => Err(ExprError::Parse(format!("expected '{s}', got {other:?}"))),
        }
    }

    fn is_symbol(&self, s: &str) -> bool {
        matches!(self.peek(), Some(Token::Symbol(sym)) if *sym == s)
    }

    fn is_ident(&self, kw: &str) -> bool {
        matches!(self.peek(), Some(Token::Ident(name)) if name == kw)
    }

    fn parse_ternary(&mut self) -> Result<Expr, ExprError> {
        let cond = self.parse_or()?;
        if self.is_symbol("?") {
            self.bump();
            let then_branch = self.parse_ternary()?;
            self.eat_symbol(":")?;
            let else_branch = self.parse_ternary()?;
            return Ok(Expr::Ternary(Box::new(cond), Box::new(then_branch), Box::new(else_branch)));
        }
        Ok(cond)
    }

    fn parse_or(&mut self) -> Result<Expr, ExprError> {
        let mut lhs = self.parse_and()?;
        while self.is_ident("or") {
            self.bump();
            let rhs = self.parse_and()?;
            lhs = Expr::Binary(BinOp::Or, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<Expr, ExprError> {
        let mut lhs = self.parse_not()?;
        while self.is_ident("and") {
            self.bump();
            let rhs = self.parse_not()?;
            lhs = Expr::Binary(BinOp::And, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_not(&mut self) -> Result<Expr, ExprError> {
        if self.is_ident("not") {
            self.bump();
            let inner = self.parse_not()?;
            return Ok(Expr::Unary(UnaryOp::Not, Box::new(inner)));
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> Result<Expr, ExprError> {
        let lhs = self.parse_additive()?;
        let op = match self.peek() {
            Some(Token::Symbol("==")) => Some(BinOp::Eq),
            Some(Token::Symbol("!=")) => Some(BinOp::Ne),
            Some(Token::Symbol("<")) => Some(BinOp::Lt),
            Some(Token::Symbol("<=")) => Some(BinOp::Le),
            Some(Token::Symbol(">")) => Some(BinOp::Gt),
            Some(Token::Symbol(">=")) => Some(BinOp::Ge),
            _ => None,
        };
        if let Some(op) = op {
            self.bump();
            let rhs = self.parse_additive()?;
            return Ok(Expr::Binary(op, Box::new(lhs), Box::new(rhs)));
        }
        Ok(lhs)
    }

    fn parse_additive(&mut self) -> Result<Expr, ExprError> {
        let mut lhs = self.parse_multiplicative()?;
        loop {
            let op = match self.peek() {
                Some(Token::Symbol("+")) => BinOp::Add,
                Some(Token::Symbol("-")) => BinOp::Sub,
                _ => break,
            };
            self.bump();
            let rhs = self.parse_multiplicative()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, ExprError> {
        let mut lhs = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                Some(Token::Symbol("*")) => BinOp::Mul,
                Some(Token::Symbol("/")) => BinOp::Div,
                Some(Token::Symbol("%")) => BinOp::Mod,
                _ => break,
            };
            self.bump();
            let rhs = self.parse_unary()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<Expr, ExprError> {
        if self.is_symbol("-") {
            self.bump();
            let inner = self.parse_unary()?;
            return Ok(Expr::Unary(UnaryOp::Neg, Box::new(inner)));
        }
        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> Result<Expr, ExprError> {
        let mut expr = self.parse_primary()?;
        loop {
            if self.is_symbol(".") {
                self.bump();
                match self.bump() {
                    Some(Token::Ident(name)) => expr = Expr::Member(Box::new(expr), name),
                    other => return Err(ExprError::Parse(format!("expected member name, got {other:?}"))),
                }
            } else if self.is_symbol("[") {
                self.bump();
                let index = self.parse_ternary()?;
                self.eat_symbol("]")?;
                expr = Expr::Index(Box::new(expr), Box::new(index));
            } else {
                break;
            }
        }
        Ok(expr)
    }

    fn parse_primary(&mut self) -> Result<Expr, ExprError> {
        match self.bump() {
            Some(Token::Number(n)) => Ok(Expr::Literal(Value::from(n))),
            Some(Token::Str(s)) => Ok(Expr::Literal(Value::String(s))),
            Some(Token::Symbol("(")) => {
                let inner = self.parse_ternary()?;
                self.eat_symbol(")")?;
                Ok(inner)
            }
            Some(Token::Ident(name)) => {
                if self.is_symbol("(") {
                    self.bump();
                    let mut args = Vec::new();
                    if !self.is_symbol(")") {
                        args.push(self.parse_ternary()?);
                        while self.is_symbol(",") {
                            self.bump();
                            args.push(self.parse_ternary()?);
                        }
                    }
                    self.eat_symbol(")")?;
                    return Ok(Expr::Call(name, args));
                }
                match name.as_str() {
                    "true" => Ok(Expr::Literal(Value::Bool(true))),
                    "false" => Ok(Expr::Literal(Value::Bool(false))),
                    "null" => Ok(Expr::Literal(Value::Null)),
                    _ => Ok(Expr::Name(name)),
                }
            }
            other => Err(ExprError::Parse(format!("unexpected token: {other:?}"))),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────
// Evaluator
// ─────────────────────────────────────────────────────────────────────────

fn check_deadline(deadline: Instant) -> Result<(), ExprError> {
    if Instant::now() >= deadline {
        Err(ExprError::TimeBudgetExceeded)
    } else {
        Ok(())
    }
}

fn eval_node(expr: &Expr, ctx: &EvalContext, deadline: Instant) -> Result<Value, ExprError> {
    check_deadline(deadline)?;
    match expr {
        Expr::Literal(v) => Ok(v.clone()),
        Expr::Name(name) => ctx.root(name).ok_or_else(|| ExprError::UndefinedName(name.clone())),
        Expr::Member(base, field) => {
            let v = eval_node(base, ctx, deadline)?;
            Ok(v.get(field).cloned().unwrap_or(Value::Null))
        }
        Expr::Index(base, index) => {
            let v = eval_node(base, ctx, deadline)?;
            let idx = eval_node(index, ctx, deadline)?;
            match idx {
                Value::String(key) => Ok(v.get(&key).cloned().unwrap_or(Value::Null)),
                Value::Number(n) => {
                    let i = n.as_u64().ok_or_else(|| ExprError::Type("index must be a non-negative integer".into()))? as usize;
                    Ok(v.get(i).cloned().unwrap_or(Value::Null))
                }
                other => Err(ExprError::Type(format!("invalid index type: {other:?}"))),
            }
        }
        Expr::Unary(UnaryOp::Neg, inner) => {
            let v = as_f64(&eval_node(inner, ctx, deadline)?)?;
            Ok(Value::from(-v))
        }
        Expr::Unary(UnaryOp::Not, inner) => {
            let v = eval_node(inner, ctx, deadline)?;
            Ok(Value::Bool(!truthy(&v)))
        }
        Expr::Binary(BinOp::And, lhs, rhs) => {
            let l = eval_node(lhs, ctx, deadline)?;
            if !truthy(&l) {
                return Ok(l);
            }
            eval_node(rhs, ctx, deadline)
        }
        Expr::Binary(BinOp::Or, lhs, rhs) => {
            let l = eval_node(lhs, ctx, deadline)?;
            if truthy(&l) {
                return Ok(l);
            }
            eval_node(rhs, ctx, deadline)
        }
        Expr::Binary(op, lhs, rhs) => {
            let l = eval_node(lhs, ctx, deadline)?;
            let r = eval_node(rhs, ctx, deadline)?;
            eval_binary(*op, &l, &r)
        }
        Expr::Ternary(cond, then_branch, else_branch) => {
            let c = eval_node(cond, ctx, deadline)?;
            if truthy(&c) {
                eval_node(then_branch, ctx, deadline)
            } else {
                eval_node(else_branch, ctx, deadline)
            }
        }
        Expr::Call(name, args) => {
            let values: Result<Vec<Value>, ExprError> =
                args.iter().map(|a| eval_node(a, ctx, deadline)).collect();
            eval_builtin(name, &values?)
        }
    }
}

fn truthy(v: &Value) -> bool {
    match v {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

fn as_f64(v: &Value) -> Result<f64, ExprError> {
    match v {
        Value::Number(n) => n.as_f64().ok_or_else(|| ExprError::Type("not a finite number".into())),
        Value::String(s) => s.parse::<f64>().map_err(|_| ExprError::Type(format!("cannot convert {s:?} to number"))),
        Value::Bool(b) => Ok(if *b { 1.0 } else { 0.0 }),
        other => Err(ExprError::Type(format!("cannot convert {other:?} to number"))),
    }
}

fn eval_binary(op: BinOp, l: &Value, r: &Value) -> Result<Value, ExprError> {
    use BinOp::*;
    match op {
        Add => {
            if let (Value::String(a), Value::String(b)) = (l, r) {
                return Ok(Value::String(format!("{a}{b}")));
            }
            Ok(Value::from(as_f64(l)? + as_f64(r)?))
        }
        Sub => Ok(Value::from(as_f64(l)? - as_f64(r)?)),
        Mul => Ok(Value::from(as_f64(l)? * as_f64(r)?)),
        Div => {
            let divisor = as_f64(r)?;
            if divisor == 0.0 {
                return Err(ExprError::Type("division by zero".into()));
            }
            Ok(Value::from(as_f64(l)? / divisor))
        }
        Mod => {
            let divisor = as_f64(r)?;
            if divisor == 0.0 {
                return Err(ExprError::Type("modulo by zero".into()));
            }
            Ok(Value::from(as_f64(l)? % divisor))
        }
        Eq => Ok(Value::Bool(values_equal(l, r))),
        Ne => Ok(Value::Bool(!values_equal(l, r))),
        Lt => Ok(Value::Bool(as_f64(l)? < as_f64(r)?)),
        Le => Ok(Value::Bool(as_f64(l)? <= as_f64(r)?)),
        Gt => Ok(Value::Bool(as_f64(l)? > as_f64(r)?)),
        Ge => Ok(Value::Bool(as_f64(l)? >= as_f64(r)?)),
        And | Or => unreachable!("short-circuited above"),
    }
}

fn values_equal(l: &Value, r: &Value) -> bool {
    if let (Ok(a), Ok(b)) = (as_f64(l), as_f64(r)) {
        if matches!(l, Value::String(_)) != matches!(r, Value::String(_)) {
            return a == b;
        }
    }
    l == r
}

fn eval_builtin(name: &str, args: &[Value]) -> Result<Value, ExprError> {
    match name {
        "len" => {
            let v = args.first().ok_or_else(|| ExprError::Type("len() requires 1 argument".into()))?;
            let n = match v {
                Value::String(s) => s.chars().count(),
                Value::Array(a) => a.len(),
                Value::Object(o) => o.len(),
                other => return Err(ExprError::Type(format!("len() unsupported for {other:?}"))),
            };
            Ok(Value::from(n as u64))
        }
        "float" => {
            let v = args.first().ok_or_else(|| ExprError::Type("float() requires 1 argument".into()))?;
            Ok(Value::from(as_f64(v)?))
        }
        "int" => {
            let v = args.first().ok_or_else(|| ExprError::Type("int() requires 1 argument".into()))?;
            Ok(Value::from(as_f64(v)?.trunc() as i64))
        }
        "str" => {
            let v = args.first().ok_or_else(|| ExprError::Type("str() requires 1 argument".into()))?;
            let s = match v {
                Value::String(s) => s.clone(),
                Value::Null => String::new(),
                other => other.to_string(),
            };
            Ok(Value::String(s))
        }
        "abs" => {
            let v = args.first().ok_or_else(|| ExprError::Type("abs() requires 1 argument".into()))?;
            Ok(Value::from(as_f64(v)?.abs()))
        }
        "min" | "max" => {
            if args.is_empty() {
                return Err(ExprError::Type(format!("{name}() requires at least 1 argument")));
            }
            let mut nums: Vec<f64> = Vec::with_capacity(args.len());
            for a in args {
                nums.push(as_f64(a)?);
            }
            let result = if name == "min" {
                nums.into_iter().fold(f64::INFINITY, f64::min)
            } else {
                nums.into_iter().fold(f64::NEG_INFINITY, f64::max)
            };
            Ok(Value::from(result))
        }
        other => Err(ExprError::UnknownBuiltin(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx_with_price(usd: f64) -> EvalContext {
        let mut source = HashMap::new();
        let mut bitcoin = serde_json::Map::new();
        bitcoin.insert("usd".into(), Value::from(usd));
        source.insert("bitcoin".into(), Value::Object(bitcoin));
        EvalContext {
            state: HashMap::new(),
            source,
            env: HashMap::new(),
        }
    }

    #[test]
    fn btc_rule_set_step_extracts_price() {
        let ctx = ctx_with_price(51500.0);
        let v = eval(r#"float(source["bitcoin"]["usd"])"#, &ctx).unwrap();
        assert_eq!(v, Value::from(51500.0));
    }

    #[test]
    fn btc_rule_notify_guard_matches_scenario_1() {
        let mut ctx = ctx_with_price(51500.0);
        ctx.state.insert("last_price".into(), Value::from(50000.0));
        let v = eval(
            r#"state["last_price"] and ((51500.0-float(state["last_price"]))/float(state["last_price"])*100)>=2"#,
            &ctx,
        )
        .unwrap();
        assert_eq!(v, Value::Bool(true));
    }

    #[test]
    fn notify_guard_false_below_threshold() {
        let mut ctx = EvalContext::default();
        ctx.state.insert("last_price".into(), Value::from(50000.0));
        let v = eval(
            r#"state["last_price"] and ((50100.0-float(state["last_price"]))/float(state["last_price"])*100)>=2"#,
            &ctx,
        )
        .unwrap();
        assert_eq!(v, Value::Bool(false));
    }

    #[test]
    fn ternary_conditional() {
        let ctx = EvalContext::default();
        assert_eq!(eval("1 < 2 ? 10 : 20", &ctx).unwrap(), Value::from(10.0));
        assert_eq!(eval("1 > 2 ? 10 : 20", &ctx).unwrap(), Value::from(20.0));
    }

    #[test]
    fn member_access_dot_and_index_agree() {
        let mut ctx = EvalContext::default();
        let mut obj = serde_json::Map::new();
        obj.insert("k".into(), Value::from(7.0));
        ctx.state.insert("obj".into(), Value::Object(obj));
        assert_eq!(eval(r#"state.obj.k"#, &ctx).unwrap(), Value::from(7.0));
        assert_eq!(eval(r#"state["obj"]["k"]"#, &ctx).unwrap(), Value::from(7.0));
    }

    #[test]
    fn builtins_cover_closed_set() {
        let ctx = EvalContext::default();
        assert_eq!(eval("len(\"hello\")", &ctx).unwrap(), Value::from(5u64));
        assert_eq!(eval("min(3, 1, 2)", &ctx).unwrap(), Value::from(1.0));
        assert_eq!(eval("max(3, 1, 2)", &ctx).unwrap(), Value::from(3.0));
        assert_eq!(eval("abs(-5)", &ctx).unwrap(), Value::from(5.0));
        assert_eq!(eval("int(3.9)", &ctx).unwrap(), Value::from(3));
        assert_eq!(eval("str(3)", &ctx).unwrap(), Value::String("3".into()));
    }

    #[test]
    fn undefined_name_errors() {
        let ctx = EvalContext::default();
        assert!(matches!(eval("nope", &ctx), Err(ExprError::UndefinedName(_))));
    }

    #[test]
    fn division_by_zero_errors() {
        let ctx = EvalContext::default();
        assert!(eval("1 / 0", &ctx).is_err());
    }

    #[test]
    fn unknown_builtin_errors() {
        let ctx = EvalContext::default();
        assert!(matches!(eval("eval(1)", &ctx), Err(ExprError::UnknownBuiltin(_))));
    }

    #[test]
    fn result_budget_exceeded_for_huge_string() {
        let mut ctx = EvalContext::default();
        ctx.state.insert("big".into(), Value::String("x".repeat(5000)));
        assert_eq!(eval("state.big", &ctx), Err(ExprError::ResultBudgetExceeded));
    }
}
