//! Narrow expression evaluator over JSON frame bindings.
//!
//! Grammar:
//!
//! ```text
//! expr    := "len" "(" expr ")" | name postfix*
//! postfix := "." name | "[" int "]" | "[" string "]"
//! ```
//!
//! Nothing else is executed. Values render with Python-style literals so
//! they read the way a Python debugger would print them.

use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EvalError {
    #[error("SyntaxError: {0}")]
    Syntax(String),
    #[error("NameError: name '{0}' is not defined")]
    UnknownName(String),
    #[error("AttributeError: '{type_name}' object has no attribute '{attribute}'")]
    Attribute {
        type_name: &'static str,
        attribute: String,
    },
    #[error("IndexError: index {0} out of range")]
    Index(i64),
    #[error("KeyError: '{0}'")]
    Key(String),
    #[error("TypeError: {0}")]
    Type(String),
}

#[derive(Debug, Clone, PartialEq)]
enum Expr {
    Name(String),
    Attr(Box<Expr>, String),
    Index(Box<Expr>, i64),
    Key(Box<Expr>, String),
    Len(Box<Expr>),
}

// ── Parsing ────────────────────────────────────────────────────────

/// Deepest expression tree the parser will build. Evaluation recurses once
/// per level.
const MAX_NESTING: usize = 64;

struct Parser {
    chars: Vec<char>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn new(source: &str) -> Self {
        Self {
            chars: source.chars().collect(),
            pos: 0,
            depth: 0,
        }
    }

    fn nest(&mut self) -> Result<(), EvalError> {
        self.depth += 1;
        if self.depth > MAX_NESTING {
            return Err(EvalError::Syntax("expression is nested too deeply".into()));
        }
        Ok(())
    }

    fn skip_ws(&mut self) {
        while self.chars.get(self.pos).is_some_and(|c| c.is_whitespace()) {
            self.pos += 1;
        }
    }

    fn peek(&mut self) -> Option<char> {
        self.skip_ws();
        self.chars.get(self.pos).copied()
    }

    fn expect(&mut self, want: char) -> Result<(), EvalError> {
        match self.peek() {
            Some(c) if c == want => {
                self.pos += 1;
                Ok(())
            }
            Some(c) => Err(EvalError::Syntax(format!("expected '{want}', found '{c}'"))),
            None => Err(EvalError::Syntax(format!("expected '{want}', found end of input"))),
        }
    }

    fn name(&mut self) -> Result<String, EvalError> {
        self.skip_ws();
        let start = self.pos;
        while let Some(&c) = self.chars.get(self.pos) {
            let ok = if self.pos == start {
                c.is_alphabetic() || c == '_'
            } else {
                c.is_alphanumeric() || c == '_'
            };
            if !ok {
                break;
            }
            self.pos += 1;
        }
        if start == self.pos {
            return Err(match self.chars.get(self.pos) {
                Some(c) => EvalError::Syntax(format!("unexpected '{c}'")),
                None => EvalError::Syntax("unexpected end of input".into()),
            });
        }
        Ok(self.chars[start..self.pos].iter().collect())
    }

    fn integer(&mut self) -> Result<i64, EvalError> {
        self.skip_ws();
        let start = self.pos;
        if self.chars.get(self.pos) == Some(&'-') {
            self.pos += 1;
        }
        while self.chars.get(self.pos).is_some_and(|c| c.is_ascii_digit()) {
            self.pos += 1;
        }
        let text: String = self.chars[start..self.pos].iter().collect();
        text.parse()
            .map_err(|_| EvalError::Syntax(format!("invalid index `{text}`")))
    }

    fn string(&mut self) -> Result<String, EvalError> {
        self.skip_ws();
        let Some(&quote) = self.chars.get(self.pos) else {
            return Err(EvalError::Syntax("unexpected end of input".into()));
        };
        self.pos += 1;
        let mut out = String::new();
        loop {
            match self.chars.get(self.pos).copied() {
                None => return Err(EvalError::Syntax("unterminated string literal".into())),
                Some('\\') => {
                    let escaped = self.chars.get(self.pos + 1).copied().ok_or_else(|| {
                        EvalError::Syntax("unterminated string literal".into())
                    })?;
                    out.push(escaped);
                    self.pos += 2;
                }
                Some(c) if c == quote => {
                    self.pos += 1;
                    return Ok(out);
                }
                Some(c) => {
                    out.push(c);
                    self.pos += 1;
                }
            }
        }
    }

    fn expr(&mut self) -> Result<Expr, EvalError> {
        let name = self.name()?;
        if self.peek() == Some('(') {
            if name != "len" {
                return Err(EvalError::Syntax(format!(
                    "calling `{name}` is not supported; only len() may be called"
                )));
            }
            self.expect('(')?;
            self.nest()?;
            let inner = self.expr()?;
            self.expect(')')?;
            return self.postfix(Expr::Len(Box::new(inner)));
        }
        self.postfix(Expr::Name(name))
    }

    fn postfix(&mut self, mut expr: Expr) -> Result<Expr, EvalError> {
        loop {
            match self.peek() {
                Some('.') => {
                    self.nest()?;
                    self.pos += 1;
                    let attr = self.name()?;
                    expr = Expr::Attr(Box::new(expr), attr);
                }
                Some('[') => {
                    self.nest()?;
                    self.pos += 1;
                    expr = match self.peek() {
                        Some('"' | '\'') => Expr::Key(Box::new(expr), self.string()?),
                        _ => Expr::Index(Box::new(expr), self.integer()?),
                    };
                    self.expect(']')?;
                }
                _ => return Ok(expr),
            }
        }
    }
}

fn parse(source: &str) -> Result<Expr, EvalError> {
    let mut parser = Parser::new(source);
    let expr = parser.expr()?;
    match parser.peek() {
        None => Ok(expr),
        Some(c) => Err(EvalError::Syntax(format!("unexpected '{c}'"))),
    }
}

// ── Evaluation ─────────────────────────────────────────────────────

/// Python-style type name of a JSON value.
pub fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "NoneType",
        Value::Bool(_) => "bool",
        Value::Number(n) if n.is_f64() => "float",
        Value::Number(_) => "int",
        Value::String(_) => "str",
        Value::Array(_) => "list",
        Value::Object(_) => "dict",
    }
}

/// Evaluate `source` with `scope` resolving bare names.
pub fn evaluate<'v>(
    source: &str,
    scope: &dyn Fn(&str) -> Option<&'v Value>,
) -> Result<Value, EvalError> {
    let expr = parse(source)?;
    eval(&expr, scope)
}

fn eval<'v>(expr: &Expr, scope: &dyn Fn(&str) -> Option<&'v Value>) -> Result<Value, EvalError> {
    match expr {
        Expr::Name(name) => scope(name)
            .cloned()
            .ok_or_else(|| EvalError::UnknownName(name.clone())),
        Expr::Attr(base, attr) => {
            let value = eval(base, scope)?;
            match &value {
                Value::Object(map) => map.get(attr).cloned().ok_or_else(|| EvalError::Attribute {
                    type_name: "object",
                    attribute: attr.clone(),
                }),
                other => Err(EvalError::Attribute {
                    type_name: type_name(other),
                    attribute: attr.clone(),
                }),
            }
        }
        Expr::Index(base, index) => {
            let value = eval(base, scope)?;
            match &value {
                Value::Array(items) => {
                    let len = items.len() as i64;
                    let resolved = if *index < 0 { len + index } else { *index };
                    usize::try_from(resolved)
                        .ok()
                        .and_then(|i| items.get(i))
                        .cloned()
                        .ok_or(EvalError::Index(*index))
                }
                Value::String(s) => {
                    let chars: Vec<char> = s.chars().collect();
                    let len = chars.len() as i64;
                    let resolved = if *index < 0 { len + index } else { *index };
                    usize::try_from(resolved)
                        .ok()
                        .and_then(|i| chars.get(i))
                        .map(|c| Value::String(c.to_string()))
                        .ok_or(EvalError::Index(*index))
                }
                Value::Object(map) => map
                    .get(&index.to_string())
                    .cloned()
                    .ok_or_else(|| EvalError::Key(index.to_string())),
                other => Err(EvalError::Type(format!(
                    "'{}' object is not subscriptable",
                    type_name(other)
                ))),
            }
        }
        Expr::Key(base, key) => {
            let value = eval(base, scope)?;
            match &value {
                Value::Object(map) => map
                    .get(key)
                    .cloned()
                    .ok_or_else(|| EvalError::Key(key.clone())),
                Value::Array(_) | Value::String(_) => Err(EvalError::Type(format!(
                    "{} indices must be integers, not str",
                    type_name(&value)
                ))),
                other => Err(EvalError::Type(format!(
                    "'{}' object is not subscriptable",
                    type_name(other)
                ))),
            }
        }
        Expr::Len(inner) => {
            let value = eval(inner, scope)?;
            let len = match &value {
                Value::Array(items) => items.len(),
                Value::Object(map) => map.len(),
                Value::String(s) => s.chars().count(),
                other => {
                    return Err(EvalError::Type(format!(
                        "object of type '{}' has no len()",
                        type_name(other)
                    )));
                }
            };
            Ok(Value::from(len))
        }
    }
}

// ── Rendering ──────────────────────────────────────────────────────

/// Render a value with Python literal syntax.
pub fn render(value: &Value) -> String {
    let mut out = String::new();
    render_into(value, &mut out);
    out
}

fn render_into(value: &Value, out: &mut String) {
    match value {
        Value::Null => out.push_str("None"),
        Value::Bool(true) => out.push_str("True"),
        Value::Bool(false) => out.push_str("False"),
        Value::Number(n) => out.push_str(&n.to_string()),
        Value::String(s) => render_str(s, out),
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                render_into(item, out);
            }
            out.push(']');
        }
        Value::Object(map) => {
            out.push('{');
            for (i, (key, item)) in map.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                render_str(key, out);
                out.push_str(": ");
                render_into(item, out);
            }
            out.push('}');
        }
    }
}

fn render_str(s: &str, out: &mut String) {
    out.push('\'');
    for c in s.chars() {
        match c {
            '\'' => out.push_str("\\'"),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            c => out.push(c),
        }
    }
    out.push('\'');
}
