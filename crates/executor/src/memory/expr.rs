//! Expression evaluation for the in-memory driver.
//!
//! Grammar, loosest binding first:
//!
//! ```text
//! or      := and (("OR" | "||") and)*
//! and     := not (("AND" | "&&") not)*
//! not     := "NOT" not | cmp
//! cmp     := sum (("=" | "==" | "!=" | "<>" | "<" | "<=" | ">" | ">=") sum
//!            | "IS" ["NOT"] "NULL" | ["NOT"] "LIKE" sum)?
//! sum     := product (("+" | "-") product)*
//! product := unary (("*" | "/") unary)*
//! unary   := "-" unary | primary
//! primary := number | 'text' | "text" | TRUE | FALSE | NULL
//!          | :name | ? | field | "(" or ")"
//! ```
//!
//! Fields are column names for tables and document paths (`$.a.b`, `a[1]`)
//! for collections. Values are evaluated as JSON; NULL compares unequal to
//! everything.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde_json::{Number, Value as JsonValue};
use xapi_core::Value;

use super::codes;

type Result<T> = xapi_core::Result<T>;

fn syntax(msg: impl Into<String>) -> xapi_core::Error {
    xapi_core::Error::server(codes::PARSE_ERROR, msg)
}

/// Resolves field references.
pub(crate) trait Scope {
    fn field(&self, name: &str) -> Result<JsonValue>;
}

/// Placeholder values.
#[derive(Default)]
pub(crate) struct Bindings<'a> {
    pub named: Option<&'a BTreeMap<String, Value>>,
    pub positional: &'a [Value],
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum BinOp {
    Or,
    And,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Like,
    Add,
    Sub,
    Mul,
    Div,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Expr {
    Literal(JsonValue),
    Field(String),
    Named(String),
    Positional(usize),
    Not(Box<Expr>),
    Neg(Box<Expr>),
    IsNull(Box<Expr>, bool),
    Binary(BinOp, Box<Expr>, Box<Expr>),
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(JsonValue),
    Text(String),
    Word(String),
    Named(String),
    Question,
    Op(&'static str),
    Open,
    Close,
}

fn is_field_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '$' | '.' | '[' | ']' | '@')
}

fn tokenize(text: &str) -> Result<Vec<Token>> {
    let chars: Vec<char> = text.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            i += 1;
            continue;
        }
        let two: String = chars[i..chars.len().min(i + 2)].iter().collect();
        let op = match two.as_str() {
            "==" => Some(("=", 2)),
            "!=" | "<>" => Some(("!=", 2)),
            "<=" => Some(("<=", 2)),
            ">=" => Some((">=", 2)),
            "&&" => Some(("AND", 2)),
            "||" => Some(("OR", 2)),
            _ => match c {
                '=' => Some(("=", 1)),
                '<' => Some(("<", 1)),
                '>' => Some((">", 1)),
                '+' => Some(("+", 1)),
                '-' => Some(("-", 1)),
                '*' => Some(("*", 1)),
                '/' => Some(("/", 1)),
                '!' => Some(("NOT", 1)),
                _ => None,
            },
        };
        if let Some((op, len)) = op {
            tokens.push(Token::Op(op));
            i += len;
            continue;
        }
        match c {
            '(' => {
                tokens.push(Token::Open);
                i += 1;
            }
            ')' => {
                tokens.push(Token::Close);
                i += 1;
            }
            '?' => {
                tokens.push(Token::Question);
                i += 1;
            }
            '\'' | '"' | '`' => {
                let mut out = String::new();
                i += 1;
                loop {
                    match chars.get(i) {
                        None => return Err(syntax(format!("Unterminated quote in '{}'", text))),
                        Some('\\') => {
                            if let Some(next) = chars.get(i + 1) {
                                out.push(*next);
                            }
                            i += 2;
                        }
                        Some(q) if *q == c => {
                            i += 1;
                            break;
                        }
                        Some(other) => {
                            out.push(*other);
                            i += 1;
                        }
                    }
                }
                tokens.push(if c == '`' {
                    Token::Word(out)
                } else {
                    Token::Text(out)
                });
            }
            ':' => {
                let start = i + 1;
                let mut end = start;
                while end < chars.len() && (chars[end].is_ascii_alphanumeric() || chars[end] == '_') {
                    end += 1;
                }
                if end == start {
                    return Err(syntax(format!("Empty placeholder name in '{}'", text)));
                }
                tokens.push(Token::Named(chars[start..end].iter().collect()));
                i = end;
            }
            c if c.is_ascii_digit() => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                let lexeme: String = chars[start..i].iter().collect();
                let number = if lexeme.contains('.') {
                    lexeme
                        .parse::<f64>()
                        .ok()
                        .and_then(Number::from_f64)
                        .map(JsonValue::Number)
                } else {
                    lexeme.parse::<i64>().ok().map(|n| JsonValue::Number(n.into()))
                };
                tokens.push(Token::Number(
                    number.ok_or_else(|| syntax(format!("Invalid number '{}'", lexeme)))?,
                ));
            }
            c if is_field_char(c) => {
                let start = i;
                while i < chars.len() && is_field_char(chars[i]) {
                    i += 1;
                }
                tokens.push(Token::Word(chars[start..i].iter().collect()));
            }
            other => return Err(syntax(format!("Unexpected '{}' in '{}'", other, text))),
        }
    }
    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    positional: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn keyword(&self, word: &str) -> bool {
        match self.peek() {
            Some(Token::Word(w)) => w.eq_ignore_ascii_case(word),
            Some(Token::Op(op)) => *op == word,
            _ => false,
        }
    }

    fn eat(&mut self, word: &str) -> bool {
        if self.keyword(word) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn or(&mut self) -> Result<Expr> {
        let mut lhs = self.and()?;
        while self.eat("OR") {
            lhs = Expr::Binary(BinOp::Or, Box::new(lhs), Box::new(self.and()?));
        }
        Ok(lhs)
    }

    fn and(&mut self) -> Result<Expr> {
        let mut lhs = self.not()?;
        while self.eat("AND") {
            lhs = Expr::Binary(BinOp::And, Box::new(lhs), Box::new(self.not()?));
        }
        Ok(lhs)
    }

    fn not(&mut self) -> Result<Expr> {
        if self.eat("NOT") {
            return Ok(Expr::Not(Box::new(self.not()?)));
        }
        self.cmp()
    }

    fn cmp(&mut self) -> Result<Expr> {
        let lhs = self.sum()?;
        if self.eat("IS") {
            let negated = self.eat("NOT");
            if !self.eat("NULL") {
                return Err(syntax("Expected NULL after IS"));
            }
            return Ok(Expr::IsNull(Box::new(lhs), negated));
        }
        if self.eat("NOT") {
            if !self.eat("LIKE") {
                return Err(syntax("Expected LIKE after NOT"));
            }
            let like = Expr::Binary(BinOp::Like, Box::new(lhs), Box::new(self.sum()?));
            return Ok(Expr::Not(Box::new(like)));
        }
        let op = [
            ("=", BinOp::Eq),
            ("!=", BinOp::Ne),
            ("<=", BinOp::Le),
            (">=", BinOp::Ge),
            ("<", BinOp::Lt),
            (">", BinOp::Gt),
            ("LIKE", BinOp::Like),
        ]
        .into_iter()
        .find(|(word, _)| self.keyword(word));
        match op {
            Some((_, op)) => {
                self.pos += 1;
                Ok(Expr::Binary(op, Box::new(lhs), Box::new(self.sum()?)))
            }
            None => Ok(lhs),
        }
    }

    fn sum(&mut self) -> Result<Expr> {
        let mut lhs = self.product()?;
        loop {
            let op = if self.eat("+") {
                BinOp::Add
            } else if self.eat("-") {
                BinOp::Sub
            } else {
                return Ok(lhs);
            };
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(self.product()?));
        }
    }

    fn product(&mut self) -> Result<Expr> {
        let mut lhs = self.unary()?;
        loop {
            let op = if self.eat("*") {
                BinOp::Mul
            } else if self.eat("/") {
                BinOp::Div
            } else {
                return Ok(lhs);
            };
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(self.unary()?));
        }
    }

    fn unary(&mut self) -> Result<Expr> {
        if self.eat("-") {
            return Ok(Expr::Neg(Box::new(self.unary()?)));
        }
        self.primary()
    }

    fn primary(&mut self) -> Result<Expr> {
        let token = self
            .tokens
            .get(self.pos)
            .cloned()
            .ok_or_else(|| syntax("Unexpected end of expression"))?;
        self.pos += 1;
        Ok(match token {
            Token::Number(n) => Expr::Literal(n),
            Token::Text(s) => Expr::Literal(JsonValue::String(s)),
            Token::Named(name) => Expr::Named(name),
            Token::Question => {
                self.positional += 1;
                Expr::Positional(self.positional - 1)
            }
            Token::Open => {
                let inner = self.or()?;
                if self.peek() != Some(&Token::Close) {
                    return Err(syntax("Missing closing parenthesis"));
                }
                self.pos += 1;
                inner
            }
            Token::Word(w) if w.eq_ignore_ascii_case("true") => Expr::Literal(JsonValue::Bool(true)),
            Token::Word(w) if w.eq_ignore_ascii_case("false") => {
                Expr::Literal(JsonValue::Bool(false))
            }
            Token::Word(w) if w.eq_ignore_ascii_case("null") => Expr::Literal(JsonValue::Null),
            Token::Word(w) => Expr::Field(w),
            other => return Err(syntax(format!("Unexpected {:?}", other))),
        })
    }
}

impl Expr {
    /// Parse a complete expression.
    pub(crate) fn parse(text: &str) -> Result<Self> {
        let mut parser = Parser {
            tokens: tokenize(text)?,
            pos: 0,
            positional: 0,
        };
        let expr = parser.or()?;
        if parser.pos != parser.tokens.len() {
            return Err(syntax(format!("Unexpected trailing input in '{}'", text)));
        }
        Ok(expr)
    }

    /// Evaluate against one record.
    pub(crate) fn eval(&self, scope: &dyn Scope, binds: &Bindings<'_>) -> Result<JsonValue> {
        Ok(match self {
            Expr::Literal(v) => v.clone(),
            Expr::Field(name) => scope.field(name)?,
            Expr::Named(name) => binds
                .named
                .and_then(|named| named.get(name))
                .cloned()
                .map(JsonValue::from)
                .ok_or_else(|| {
                    xapi_core::Error::server(
                        codes::UNBOUND_PLACEHOLDER,
                        format!("Placeholder ':{}' is not bound", name),
                    )
                })?,
            Expr::Positional(i) => binds
                .positional
                .get(*i)
                .cloned()
                .map(JsonValue::from)
                .ok_or_else(|| {
                    xapi_core::Error::server(
                        codes::UNBOUND_PLACEHOLDER,
                        format!("Placeholder {} is not bound", i + 1),
                    )
                })?,
            Expr::Not(inner) => match inner.eval(scope, binds)? {
                JsonValue::Null => JsonValue::Null,
                v => JsonValue::Bool(!truthy(&v)),
            },
            Expr::Neg(inner) => arithmetic(BinOp::Sub, &JsonValue::from(0), &inner.eval(scope, binds)?),
            Expr::IsNull(inner, negated) => {
                JsonValue::Bool(inner.eval(scope, binds)?.is_null() != *negated)
            }
            Expr::Binary(BinOp::And, lhs, rhs) => {
                JsonValue::Bool(truthy(&lhs.eval(scope, binds)?) && truthy(&rhs.eval(scope, binds)?))
            }
            Expr::Binary(BinOp::Or, lhs, rhs) => {
                JsonValue::Bool(truthy(&lhs.eval(scope, binds)?) || truthy(&rhs.eval(scope, binds)?))
            }
            Expr::Binary(op, lhs, rhs) => {
                let l = lhs.eval(scope, binds)?;
                let r = rhs.eval(scope, binds)?;
                if l.is_null() || r.is_null() {
                    return Ok(JsonValue::Null);
                }
                match op {
                    BinOp::Like => match (&l, &r) {
                        (JsonValue::String(s), JsonValue::String(p)) => JsonValue::Bool(like(s, p)),
                        _ => JsonValue::Bool(like(&plain(&l), &plain(&r))),
                    },
                    BinOp::Add | BinOp::Sub | BinOp::Mul | BinOp::Div => arithmetic(*op, &l, &r),
                    _ => {
                        let ord = compare(&l, &r);
                        JsonValue::Bool(match op {
                            BinOp::Eq => ord == Some(Ordering::Equal),
                            BinOp::Ne => ord.map_or(true, |o| o != Ordering::Equal),
                            BinOp::Lt => ord == Some(Ordering::Less),
                            BinOp::Le => matches!(ord, Some(Ordering::Less | Ordering::Equal)),
                            BinOp::Gt => ord == Some(Ordering::Greater),
                            BinOp::Ge => matches!(ord, Some(Ordering::Greater | Ordering::Equal)),
                            _ => false,
                        })
                    }
                }
            }
        })
    }

    /// Evaluate as a condition.
    pub(crate) fn matches(&self, scope: &dyn Scope, binds: &Bindings<'_>) -> Result<bool> {
        Ok(truthy(&self.eval(scope, binds)?))
    }
}

fn plain(v: &JsonValue) -> String {
    match v {
        JsonValue::String(s) => s.clone(),
        other => other.to_string(),
    }
}

pub(crate) fn truthy(v: &JsonValue) -> bool {
    match v {
        JsonValue::Null => false,
        JsonValue::Bool(b) => *b,
        JsonValue::Number(n) => n.as_f64().map_or(false, |f| f != 0.0),
        JsonValue::String(s) => !s.is_empty(),
        JsonValue::Array(a) => !a.is_empty(),
        JsonValue::Object(o) => !o.is_empty(),
    }
}

fn as_number(v: &JsonValue) -> Option<f64> {
    match v {
        JsonValue::Number(n) => n.as_f64(),
        JsonValue::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        JsonValue::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Order two non-null values; `None` when they are not comparable.
pub(crate) fn compare(l: &JsonValue, r: &JsonValue) -> Option<Ordering> {
    match (l, r) {
        (JsonValue::String(a), JsonValue::String(b)) => Some(a.cmp(b)),
        (JsonValue::Number(a), JsonValue::Number(b)) => match (a.as_i64(), b.as_i64()) {
            (Some(x), Some(y)) => Some(x.cmp(&y)),
            _ => a.as_f64()?.partial_cmp(&b.as_f64()?),
        },
        (JsonValue::Array(_) | JsonValue::Object(_), _) | (_, JsonValue::Array(_) | JsonValue::Object(_)) => {
            (l == r).then_some(Ordering::Equal)
        }
        _ => as_number(l)?.partial_cmp(&as_number(r)?),
    }
}

fn arithmetic(op: BinOp, l: &JsonValue, r: &JsonValue) -> JsonValue {
    if let (Some(a), Some(b)) = (l.as_i64(), r.as_i64()) {
        let exact = match op {
            BinOp::Add => a.checked_add(b),
            BinOp::Sub => a.checked_sub(b),
            BinOp::Mul => a.checked_mul(b),
            _ => None,
        };
        if let Some(v) = exact {
            return JsonValue::from(v);
        }
    }
    let (Some(a), Some(b)) = (as_number(l), as_number(r)) else {
        return JsonValue::Null;
    };
    let v = match op {
        BinOp::Add => a + b,
        BinOp::Sub => a - b,
        BinOp::Mul => a * b,
        BinOp::Div if b != 0.0 => a / b,
        _ => return JsonValue::Null,
    };
    Number::from_f64(v).map_or(JsonValue::Null, JsonValue::Number)
}

/// SQL `LIKE` with `%` and `_` wildcards and `\` escapes.
pub(crate) fn like(text: &str, pattern: &str) -> bool {
    fn go(t: &[char], p: &[char]) -> bool {
        match p.split_first() {
            None => t.is_empty(),
            Some(('%', rest)) => (0..=t.len()).any(|skip| go(&t[skip..], rest)),
            Some(('_', rest)) => !t.is_empty() && go(&t[1..], rest),
            Some(('\\', rest)) if !rest.is_empty() => {
                t.first() == rest.first() && go(&t[1..], &rest[1..])
            }
            Some((c, rest)) => t.first() == Some(c) && go(&t[1..], rest),
        }
    }
    let t: Vec<char> = text.chars().collect();
    let p: Vec<char> = pattern.chars().collect();
    go(&t, &p)
}

/// Split a comma separated list, ignoring commas inside quotes and
/// parentheses.
pub(crate) fn split_list(text: &str) -> Vec<&str> {
    let mut items = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut start = 0;
    for (i, c) in text.char_indices() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '\'' | '"' | '`') => quote = Some(c),
            (None, '(') => depth += 1,
            (None, ')') => depth = depth.saturating_sub(1),
            (None, ',') if depth == 0 => {
                items.push(text[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    items.push(text[start..].trim());
    items.retain(|item| !item.is_empty());
    items
}

/// Split `expr AS alias` into its parts.
pub(crate) fn split_alias(item: &str) -> (&str, Option<&str>) {
    let upper = item.to_ascii_uppercase();
    match upper.rfind(" AS ") {
        Some(at) => (item[..at].trim(), Some(item[at + 4..].trim().trim_matches('`'))),
        None => (item.trim(), None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Row(JsonValue);

    impl Scope for Row {
        fn field(&self, name: &str) -> Result<JsonValue> {
            Ok(self.0.get(name).cloned().unwrap_or(JsonValue::Null))
        }
    }

    fn check(expr: &str, row: JsonValue) -> bool {
        Expr::parse(expr)
            .unwrap()
            .matches(&Row(row), &Bindings::default())
            .unwrap()
    }

    #[test]
    fn comparisons_and_logic() {
        let row = json!({"id": 7, "name": "bob", "age": null});
        assert!(check("id > 5", row.clone()));
        assert!(check("id > 5 AND name = 'bob'", row.clone()));
        assert!(!check("id > 5 && name == \"alice\"", row.clone()));
        assert!(check("id < 5 OR name <> 'alice'", row.clone()));
        assert!(check("NOT (id = 1)", row.clone()));
        assert!(check("age IS NULL", row.clone()));
        assert!(!check("age = 0", row.clone()));
        assert!(check("id + 1 = 8", row.clone()));
        assert!(check("true", row));
    }

    #[test]
    fn like_patterns() {
        assert!(like("users", "us%"));
        assert!(like("users", "_sers"));
        assert!(!like("users", "user"));
        assert!(like("a%b", "a\\%b"));
        assert!(check("name LIKE 'b%'", json!({"name": "bob"})));
        assert!(check("name NOT LIKE 'a%'", json!({"name": "bob"})));
    }

    #[test]
    fn placeholders() {
        let named: BTreeMap<String, Value> = [("min".to_string(), Value::Sint(3))].into();
        let positional = [Value::from("x")];
        let binds = Bindings {
            named: Some(&named),
            positional: &positional,
        };
        let expr = Expr::parse("id >= :min AND tag = ?").unwrap();
        assert!(expr.matches(&Row(json!({"id": 3, "tag": "x"})), &binds).unwrap());

        let unbound = Expr::parse("id = :max").unwrap();
        let err = unbound.matches(&Row(json!({})), &binds).unwrap_err();
        assert_eq!(err.code(), codes::UNBOUND_PLACEHOLDER);
    }

    #[test]
    fn projection_lists() {
        assert_eq!(split_list("id, name AS n, 'a,b', f(1, 2)"), vec!["id", "name AS n", "'a,b'", "f(1, 2)"]);
        assert_eq!(split_alias("name as n"), ("name", Some("n")));
        assert_eq!(split_alias("$.age"), ("$.age", None));
    }

    #[test]
    fn syntax_errors() {
        for bad in ["id >", "(id = 1", "name = 'open", "id = 1 1", ":"] {
            let err = Expr::parse(bad).unwrap_err();
            assert_eq!(err.code(), codes::PARSE_ERROR, "{}", bad);
        }
    }

    proptest::proptest! {
        #[test]
        fn like_literal_and_wildcards(text in "[a-z_]{0,12}") {
            let literal: String = text.chars().flat_map(|c| {
                if c == '_' { vec!['\\', c] } else { vec![c] }
            }).collect();
            proptest::prop_assert!(like(&text, &literal));
            proptest::prop_assert!(like(&text, "%"));
            let underscores = "_".repeat(text.chars().count());
            proptest::prop_assert!(like(&text, &underscores));
            let longer = format!("{}x", text);
            proptest::prop_assert!(!like(&longer, &literal));
        }
    }
}
