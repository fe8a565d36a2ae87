//! A small expression language for templates.
//!
//! Supports literals (numbers, quoted strings, `true`, `false`, `null`),
//! array and object literals, scope names, member access (`a.b`, `a[0]`),
//! calls of function bindings, `!` and unary `-`, arithmetic, comparisons,
//! `==`/`!=` (and their triple forms), `&&`/`||` with JavaScript's
//! operand-returning semantics, `cond ? a : b`, and a top-level assignment
//! `path = expr` that writes through [`Scope::assign`].

use serde_json::Map;

use super::Evaluator;
use crate::error::EvalError;
use crate::scope::Scope;
use crate::value::{self, Value};

/// The default [`Evaluator`].
#[derive(Debug, Clone, Copy, Default)]
pub struct BasicEvaluator;

impl BasicEvaluator {
    pub fn new() -> Self {
        Self
    }
}

impl Evaluator for BasicEvaluator {
    fn evaluate(&self, expression: &str, scope: &Scope) -> Result<Value, EvalError> {
        let tokens = lex(expression)?;
        let mut parser = Parser {
            source: expression,
            tokens,
            pos: 0,
        };
        let expr = parser.parse_top()?;
        parser.expect_end()?;
        eval(&expr, scope)
    }
}

// ----------------------------------------------------------------------------
// Lexer
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
enum Tok {
    Num(f64),
    Str(String),
    Ident(String),
    Punct(&'static str),
}

#[derive(Debug, Clone)]
struct Token {
    tok: Tok,
    offset: usize,
}

const PUNCTUATION: &[&str] = &[
    "===", "!==", "==", "!=", "<=", ">=", "&&", "||", "(", ")", "[", "]", "{", "}", ",", ".", "!",
    "?", ":", "+", "-", "*", "/", "%", "<", ">", "=",
];

fn syntax(expression: &str, offset: usize, message: impl Into<String>) -> EvalError {
    EvalError::Syntax {
        expression: expression.to_string(),
        offset,
        message: message.into(),
    }
}

fn lex(source: &str) -> Result<Vec<Token>, EvalError> {
    let mut tokens = Vec::new();
    let bytes = source.as_bytes();
    let mut i = 0;

    while i < bytes.len() {
        let c = bytes[i];
        if c.is_ascii_whitespace() {
            i += 1;
            continue;
        }

        if c.is_ascii_digit() {
            let start = i;
            while i < bytes.len() && (bytes[i].is_ascii_digit() || bytes[i] == b'.') {
                i += 1;
            }
            let text = &source[start..i];
            let n = text
                .parse::<f64>()
                .map_err(|_| syntax(source, start, format!("invalid number `{text}`")))?;
            tokens.push(Token {
                tok: Tok::Num(n),
                offset: start,
            });
            continue;
        }

        if c == b'\'' || c == b'"' {
            let start = i;
            let mut text = String::new();
            i += 1;
            let mut closed = false;
            let mut chars = source[i..].char_indices();
            while let Some((rel, ch)) = chars.next() {
                match ch {
                    '\\' => {
                        if let Some((_, escaped)) = chars.next() {
                            text.push(match escaped {
                                'n' => '\n',
                                't' => '\t',
                                other => other,
                            });
                        }
                    }
                    ch if ch as u32 == u32::from(c) => {
                        i += rel + 1;
                        closed = true;
                        break;
                    }
                    ch => text.push(ch),
                }
            }
            if !closed {
                return Err(syntax(source, start, "unterminated string"));
            }
            tokens.push(Token {
                tok: Tok::Str(text),
                offset: start,
            });
            continue;
        }

        if c.is_ascii_alphabetic() || c == b'_' || c == b'$' {
            let start = i;
            while i < bytes.len()
                && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_' || bytes[i] == b'$')
            {
                i += 1;
            }
            tokens.push(Token {
                tok: Tok::Ident(source[start..i].to_string()),
                offset: start,
            });
            continue;
        }

        let rest = &source[i..];
        let Some(punct) = PUNCTUATION.iter().find(|p| rest.starts_with(**p)) else {
            return Err(syntax(
                source,
                i,
                format!("unexpected character `{}`", rest.chars().next().unwrap_or('?')),
            ));
        };
        tokens.push(Token {
            tok: Tok::Punct(punct),
            offset: i,
        });
        i += punct.len();
    }

    Ok(tokens)
}

// ----------------------------------------------------------------------------
// Parser
// ----------------------------------------------------------------------------

#[derive(Debug, Clone)]
enum Expr {
    Literal(Value),
    Array(Vec<Expr>),
    Object(Vec<(String, Expr)>),
    Name(String),
    Member(Box<Expr>, String),
    Index(Box<Expr>, Box<Expr>),
    Call(Box<Expr>, Vec<Expr>),
    Not(Box<Expr>),
    Neg(Box<Expr>),
    Binary(&'static str, Box<Expr>, Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Conditional(Box<Expr>, Box<Expr>, Box<Expr>),
    Assign(Box<Expr>, Box<Expr>),
}

struct Parser<'a> {
    source: &'a str,
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser<'_> {
    fn peek(&self) -> Option<&Tok> {
        self.tokens.get(self.pos).map(|t| &t.tok)
    }

    fn offset(&self) -> usize {
        self.tokens
            .get(self.pos)
            .map_or(self.source.len(), |t| t.offset)
    }

    fn eat(&mut self, punct: &str) -> bool {
        if matches!(self.peek(), Some(Tok::Punct(p)) if *p == punct) {
            self.pos += 1;
            return true;
        }
        false
    }

    fn expect(&mut self, punct: &str) -> Result<(), EvalError> {
        if self.eat(punct) {
            Ok(())
        } else {
            Err(syntax(self.source, self.offset(), format!("expected `{punct}`")))
        }
    }

    fn expect_end(&self) -> Result<(), EvalError> {
        if self.pos < self.tokens.len() {
            return Err(syntax(self.source, self.offset(), "unexpected trailing input"));
        }
        Ok(())
    }

    fn parse_top(&mut self) -> Result<Expr, EvalError> {
        if self.tokens.is_empty() {
            return Err(syntax(self.source, 0, "empty expression"));
        }
        let target = self.parse_conditional()?;
        if self.eat("=") {
            if !is_assignable(&target) {
                return Err(syntax(self.source, 0, "invalid assignment target"));
            }
            let value = self.parse_top()?;
            return Ok(Expr::Assign(Box::new(target), Box::new(value)));
        }
        Ok(target)
    }

    fn parse_conditional(&mut self) -> Result<Expr, EvalError> {
        let cond = self.parse_or()?;
        if !self.eat("?") {
            return Ok(cond);
        }
        let then = self.parse_conditional()?;
        self.expect(":")?;
        let otherwise = self.parse_conditional()?;
        Ok(Expr::Conditional(
            Box::new(cond),
            Box::new(then),
            Box::new(otherwise),
        ))
    }

    fn parse_or(&mut self) -> Result<Expr, EvalError> {
        let mut lhs = self.parse_and()?;
        while self.eat("||") {
            let rhs = self.parse_and()?;
            lhs = Expr::Or(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<Expr, EvalError> {
        let mut lhs = self.parse_binary(0)?;
        while self.eat("&&") {
            let rhs = self.parse_binary(0)?;
            lhs = Expr::And(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    /// Precedence climbing over equality, comparison, additive and
    /// multiplicative operators.
    fn parse_binary(&mut self, level: usize) -> Result<Expr, EvalError> {
        const LEVELS: &[&[&str]] = &[
            &["===", "!==", "==", "!="],
            &["<=", ">=", "<", ">"],
            &["+", "-"],
            &["*", "/", "%"],
        ];
        if level == LEVELS.len() {
            return self.parse_unary();
        }

        let mut lhs = self.parse_binary(level + 1)?;
        loop {
            let op = match self.peek() {
                Some(Tok::Punct(p)) if LEVELS[level].contains(p) => *p,
                _ => break,
            };
            self.pos += 1;
            let rhs = self.parse_binary(level + 1)?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<Expr, EvalError> {
        if self.eat("!") {
            return Ok(Expr::Not(Box::new(self.parse_unary()?)));
        }
        if self.eat("-") {
            return Ok(Expr::Neg(Box::new(self.parse_unary()?)));
        }
        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> Result<Expr, EvalError> {
        let mut expr = self.parse_primary()?;
        loop {
            if self.eat(".") {
                match self.tokens.get(self.pos).map(|t| t.tok.clone()) {
                    Some(Tok::Ident(name)) => {
                        self.pos += 1;
                        expr = Expr::Member(Box::new(expr), name);
                    }
                    Some(Tok::Num(n)) if n.fract() == 0.0 => {
                        self.pos += 1;
                        expr = Expr::Member(Box::new(expr), format!("{}", n as u64));
                    }
                    _ => return Err(syntax(self.source, self.offset(), "expected property name")),
                }
            } else if self.eat("[") {
                let index = self.parse_top()?;
                self.expect("]")?;
                expr = Expr::Index(Box::new(expr), Box::new(index));
            } else if self.eat("(") {
                let args = self.parse_list(")")?;
                expr = Expr::Call(Box::new(expr), args);
            } else {
                return Ok(expr);
            }
        }
    }

    fn parse_list(&mut self, close: &str) -> Result<Vec<Expr>, EvalError> {
        let mut items = Vec::new();
        if self.eat(close) {
            return Ok(items);
        }
        loop {
            items.push(self.parse_top()?);
            if self.eat(close) {
                return Ok(items);
            }
            self.expect(",")?;
        }
    }

    fn parse_primary(&mut self) -> Result<Expr, EvalError> {
        let offset = self.offset();
        let Some(token) = self.tokens.get(self.pos).map(|t| t.tok.clone()) else {
            return Err(syntax(self.source, offset, "unexpected end of expression"));
        };
        self.pos += 1;

        match token {
            Tok::Num(n) => Ok(Expr::Literal(value::number(n))),
            Tok::Str(s) => Ok(Expr::Literal(Value::String(s))),
            Tok::Ident(name) => Ok(match name.as_str() {
                "true" => Expr::Literal(Value::Bool(true)),
                "false" => Expr::Literal(Value::Bool(false)),
                "null" | "undefined" => Expr::Literal(Value::Null),
                _ => Expr::Name(name),
            }),
            Tok::Punct("(") => {
                let inner = self.parse_top()?;
                self.expect(")")?;
                Ok(inner)
            }
            Tok::Punct("[") => Ok(Expr::Array(self.parse_list("]")?)),
            Tok::Punct("{") => self.parse_object(),
            Tok::Punct(p) => Err(syntax(self.source, offset, format!("unexpected `{p}`"))),
        }
    }

    fn parse_object(&mut self) -> Result<Expr, EvalError> {
        let mut entries = Vec::new();
        if self.eat("}") {
            return Ok(Expr::Object(entries));
        }
        loop {
            let offset = self.offset();
            let key = match self.tokens.get(self.pos).map(|t| t.tok.clone()) {
                Some(Tok::Ident(name)) => name,
                Some(Tok::Str(s)) => s,
                _ => return Err(syntax(self.source, offset, "expected object key")),
            };
            self.pos += 1;
            let value = if self.eat(":") {
                self.parse_top()?
            } else {
                Expr::Name(key.clone())
            };
            entries.push((key, value));
            if self.eat("}") {
                return Ok(Expr::Object(entries));
            }
            self.expect(",")?;
        }
    }
}

fn is_assignable(expr: &Expr) -> bool {
    match expr {
        Expr::Name(_) => true,
        Expr::Member(base, _) | Expr::Index(base, _) => is_assignable(base),
        _ => false,
    }
}

// ----------------------------------------------------------------------------
// Evaluation
// ----------------------------------------------------------------------------

fn eval(expr: &Expr, scope: &Scope) -> Result<Value, EvalError> {
    match expr {
        Expr::Literal(v) => Ok(v.clone()),
        Expr::Array(items) => items
            .iter()
            .map(|item| eval(item, scope))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        Expr::Object(entries) => {
            let mut map = Map::new();
            for (key, item) in entries {
                map.insert(key.clone(), eval(item, scope)?);
            }
            Ok(Value::Object(map))
        }
        Expr::Name(name) => scope.get(name),
        Expr::Member(base, name) => member(&eval(base, scope)?, name),
        Expr::Index(base, index) => {
            let base = eval(base, scope)?;
            let index = eval(index, scope)?;
            member(&base, &value::display(&index))
        }
        Expr::Call(callee, args) => call(callee, args, scope),
        Expr::Not(inner) => Ok(Value::Bool(!value::truthy(&eval(inner, scope)?))),
        Expr::Neg(inner) => Ok(value::number(-to_number(&eval(inner, scope)?)?)),
        Expr::And(lhs, rhs) => {
            let lhs = eval(lhs, scope)?;
            if value::truthy(&lhs) {
                eval(rhs, scope)
            } else {
                Ok(lhs)
            }
        }
        Expr::Or(lhs, rhs) => {
            let lhs = eval(lhs, scope)?;
            if value::truthy(&lhs) {
                Ok(lhs)
            } else {
                eval(rhs, scope)
            }
        }
        Expr::Conditional(cond, then, otherwise) => {
            if value::truthy(&eval(cond, scope)?) {
                eval(then, scope)
            } else {
                eval(otherwise, scope)
            }
        }
        Expr::Binary(op, lhs, rhs) => binary(op, &eval(lhs, scope)?, &eval(rhs, scope)?),
        Expr::Assign(target, rhs) => {
            let value = eval(rhs, scope)?;
            let path = assign_path(target, scope)?;
            scope.assign(&path, value.clone())?;
            Ok(value)
        }
    }
}

fn member(base: &Value, name: &str) -> Result<Value, EvalError> {
    if base.is_null() {
        return Err(EvalError::Type(format!("cannot read `{name}` of null")));
    }
    if name == "length" {
        match base {
            Value::Array(items) => return Ok(Value::from(items.len())),
            Value::String(s) => return Ok(Value::from(s.chars().count())),
            _ => {}
        }
    }
    Ok(value::member(base, name).cloned().unwrap_or(Value::Null))
}

fn assign_path(target: &Expr, scope: &Scope) -> Result<String, EvalError> {
    match target {
        Expr::Name(name) => Ok(name.clone()),
        Expr::Member(base, name) => Ok(format!("{}.{}", assign_path(base, scope)?, name)),
        Expr::Index(base, index) => Ok(format!(
            "{}.{}",
            assign_path(base, scope)?,
            value::display(&eval(index, scope)?)
        )),
        _ => Err(EvalError::Type("invalid assignment target".into())),
    }
}

fn call(callee: &Expr, args: &[Expr], scope: &Scope) -> Result<Value, EvalError> {
    let Expr::Name(name) = callee else {
        return Err(EvalError::NotCallable {
            name: format!("{callee:?}"),
        });
    };
    let function = scope.function(name).ok_or_else(|| {
        if scope.lookup(name).is_some() {
            EvalError::NotCallable { name: name.clone() }
        } else {
            EvalError::UnknownName { name: name.clone() }
        }
    })?;
    let args = args
        .iter()
        .map(|arg| eval(arg, scope))
        .collect::<Result<Vec<_>, _>>()?;
    function.call(&args)
}

fn to_number(value: &Value) -> Result<f64, EvalError> {
    match value {
        Value::Number(n) => Ok(n.as_f64().unwrap_or(0.0)),
        Value::Bool(b) => Ok(if *b { 1.0 } else { 0.0 }),
        Value::Null => Ok(0.0),
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| EvalError::Type(format!("`{s}` is not a number"))),
        other => Err(EvalError::Type(format!("{other} is not a number"))),
    }
}

fn loose_eq(lhs: &Value, rhs: &Value) -> bool {
    match (lhs, rhs) {
        (Value::Number(a), Value::Number(b)) => a.as_f64() == b.as_f64(),
        _ => lhs == rhs,
    }
}

fn binary(op: &str, lhs: &Value, rhs: &Value) -> Result<Value, EvalError> {
    let result = match op {
        "==" | "===" => Value::Bool(loose_eq(lhs, rhs)),
        "!=" | "!==" => Value::Bool(!loose_eq(lhs, rhs)),
        "+" => {
            if lhs.is_string() || rhs.is_string() {
                Value::String(format!("{}{}", value::display(lhs), value::display(rhs)))
            } else {
                value::number(to_number(lhs)? + to_number(rhs)?)
            }
        }
        "-" => value::number(to_number(lhs)? - to_number(rhs)?),
        "*" => value::number(to_number(lhs)? * to_number(rhs)?),
        "/" => value::number(to_number(lhs)? / to_number(rhs)?),
        "%" => value::number(to_number(lhs)? % to_number(rhs)?),
        "<" | "<=" | ">" | ">=" => {
            let ordering = match (lhs, rhs) {
                (Value::String(a), Value::String(b)) => a.partial_cmp(b),
                _ => to_number(lhs)?.partial_cmp(&to_number(rhs)?),
            };
            let Some(ordering) = ordering else {
                return Ok(Value::Bool(false));
            };
            Value::Bool(match op {
                "<" => ordering.is_lt(),
                "<=" => ordering.is_le(),
                ">" => ordering.is_gt(),
                _ => ordering.is_ge(),
            })
        }
        other => return Err(EvalError::Type(format!("unsupported operator `{other}`"))),
    };
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::Signal;
    use crate::scope::{Binding, Callback};
    use serde_json::json;

    fn eval_str(expression: &str, scope: &Scope) -> Result<Value, EvalError> {
        BasicEvaluator.evaluate(expression, scope)
    }

    fn sample_scope() -> Scope {
        let scope = Scope::new();
        scope.define("count", json!(3));
        scope.define("name", json!("Ada"));
        scope.define("user", json!({"tags": ["x", "y"], "age": 36}));
        scope.define(
            "add",
            Callback::new(|args| {
                let sum: i64 = args.iter().filter_map(Value::as_i64).sum();
                Ok(json!(sum))
            }),
        );
        scope
    }

    #[test]
    fn literals_and_paths() {
        let scope = sample_scope();
        assert_eq!(eval_str("42", &scope).unwrap(), json!(42));
        assert_eq!(eval_str("'hi'", &scope).unwrap(), json!("hi"));
        assert_eq!(eval_str("user.tags[1]", &scope).unwrap(), json!("y"));
        assert_eq!(eval_str("user.tags.0", &scope).unwrap(), json!("x"));
        assert_eq!(eval_str("user.tags.length", &scope).unwrap(), json!(2));
        assert_eq!(eval_str("user.missing", &scope).unwrap(), json!(null));
    }

    #[test]
    fn operators() {
        let scope = sample_scope();
        assert_eq!(eval_str("count * 2 + 1", &scope).unwrap(), json!(7));
        assert_eq!(eval_str("(count + 1) * 2", &scope).unwrap(), json!(8));
        assert_eq!(eval_str("'Hi ' + name", &scope).unwrap(), json!("Hi Ada"));
        assert_eq!(eval_str("count > 2 && count <= 3", &scope).unwrap(), json!(true));
        assert_eq!(eval_str("!count", &scope).unwrap(), json!(false));
        assert_eq!(eval_str("count === 3 ? 'three' : 'other'", &scope).unwrap(), json!("three"));
        assert_eq!(eval_str("null || name", &scope).unwrap(), json!("Ada"));
        assert_eq!(eval_str("-count", &scope).unwrap(), json!(-3));
    }

    #[test]
    fn object_and_array_literals() {
        let scope = sample_scope();
        assert_eq!(
            eval_str("{ active: count > 1, 'big': false, name }", &scope).unwrap(),
            json!({"active": true, "big": false, "name": "Ada"})
        );
        assert_eq!(eval_str("[1, name]", &scope).unwrap(), json!([1, "Ada"]));
    }

    #[test]
    fn calls_invoke_function_bindings() {
        let scope = sample_scope();
        assert_eq!(eval_str("add(count, 4)", &scope).unwrap(), json!(7));
        assert!(matches!(
            eval_str("name()", &scope),
            Err(EvalError::NotCallable { .. })
        ));
    }

    #[test]
    fn errors() {
        let scope = sample_scope();
        assert!(matches!(
            eval_str("missing + 1", &scope),
            Err(EvalError::UnknownName { .. })
        ));
        assert!(matches!(eval_str("count +", &scope), Err(EvalError::Syntax { .. })));
        assert!(matches!(eval_str("'open", &scope), Err(EvalError::Syntax { .. })));
        assert!(matches!(eval_str("user.none.deeper", &scope), Err(EvalError::Type(_))));
        assert!(matches!(eval_str("", &scope), Err(EvalError::Syntax { .. })));
    }

    #[test]
    fn assignment_writes_cells() {
        let open = Signal::new(json!(false));
        let scope = Scope::from_bindings([("open", Binding::cell(&open))]);

        assert_eq!(eval_str("open = !open", &scope).unwrap(), json!(true));
        assert_eq!(open.get_untracked(), json!(true));
    }

    #[test]
    fn closures_are_evaluators() {
        let evaluator = |expr: &str, _: &Scope| Ok(Value::String(expr.to_uppercase()));
        assert_eq!(evaluator.evaluate("abc", &Scope::new()).unwrap(), json!("ABC"));
    }
}
