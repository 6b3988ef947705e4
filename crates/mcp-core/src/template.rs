//! Secret template rendering.
//!
//! Renders the env-file template embedded in the deployment descriptor the
//! way the scheduler does at task start, against a local [`SecretStore`].
//! Only the subset of the template language the descriptor uses is
//! supported: field output, `if`, `with`, `with secret`, `else`, `end`, `or`
//! and the `{{-` / `-}}` whitespace trim markers.
//!
//! A key absent from the store is falsy in `if`, `with` and `or`. Printing an
//! absent key is a [`TemplateError::MissingKey`] so a required variable can
//! never render as an empty assignment.

use crate::error::{McpError, Result};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum TemplateError {
    #[error("unclosed action starting at byte {0}")]
    Unclosed(usize),

    #[error("empty action at byte {0}")]
    EmptyAction(usize),

    #[error("unterminated string in action '{0}'")]
    UnterminatedString(String),

    #[error("unexpected token '{token}' in action '{action}'")]
    UnexpectedToken { token: String, action: String },

    #[error("'{0}' without a matching block")]
    Unmatched(&'static str),

    #[error("missing {{{{ end }}}} for '{0}'")]
    MissingEnd(String),

    #[error("no value for {0}")]
    MissingKey(String),

    #[error("secret '{0}' not found in the secret store")]
    SecretNotFound(String),
}

type TemplateResult<T> = std::result::Result<T, TemplateError>;

// ---------------------------------------------------------------------------
// Secret store
// ---------------------------------------------------------------------------

/// Secret paths mapped to key/value data, e.g.
///
/// ```yaml
/// secret/data/mattermost-mcp:
///   mattermost_url: https://chat.example.com
///   mattermost_token: xxxx
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SecretStore {
    secrets: BTreeMap<String, serde_json::Map<String, Value>>,
}

impl SecretStore {
    /// Load a YAML or JSON secret document.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(McpError::SecretStoreNotFound(path.display().to_string()));
        }
        let data = std::fs::read_to_string(path)?;
        Self::from_yaml(&data)
    }

    pub fn from_yaml(data: &str) -> Result<Self> {
        if data.trim().is_empty() {
            return Ok(Self::default());
        }
        let secrets = serde_yaml::from_str::<Option<_>>(data)?.unwrap_or_default();
        Ok(Self { secrets })
    }

    pub fn insert(&mut self, path: impl Into<String>, key: impl Into<String>, value: Value) {
        self.secrets
            .entry(path.into())
            .or_default()
            .insert(key.into(), value);
    }

    pub fn get(&self, path: &str) -> Option<&serde_json::Map<String, Value>> {
        self.secrets.get(path)
    }
}

// ---------------------------------------------------------------------------
// Lexing
// ---------------------------------------------------------------------------

enum Segment {
    Text(String),
    Action { body: String, offset: usize },
}

fn lex(src: &str) -> TemplateResult<Vec<Segment>> {
    let mut segments = Vec::new();
    let mut rest = src;
    let mut offset = 0;
    let mut trim_next = false;

    while let Some(open) = rest.find("{{") {
        let mut text = &rest[..open];
        if trim_next {
            text = text.trim_start();
        }
        let after_open = &rest[open + 2..];
        let trim_left = after_open.starts_with('-')
            && after_open[1..].starts_with(|c: char| c.is_whitespace());
        if trim_left {
            text = text.trim_end();
        }
        if !text.is_empty() {
            segments.push(Segment::Text(text.to_string()));
        }

        let close = after_open
            .find("}}")
            .ok_or(TemplateError::Unclosed(offset + open))?;
        let mut body = &after_open[..close];
        if trim_left {
            body = &body[1..];
        }
        trim_next = body.ends_with('-') && body[..body.len() - 1].ends_with(char::is_whitespace);
        if trim_next {
            body = &body[..body.len() - 1];
        }
        segments.push(Segment::Action {
            body: body.trim().to_string(),
            offset: offset + open,
        });

        let consumed = open + 2 + close + 2;
        offset += consumed;
        rest = &rest[consumed..];
    }

    let tail = if trim_next { rest.trim_start() } else { rest };
    if !tail.is_empty() {
        segments.push(Segment::Text(tail.to_string()));
    }
    Ok(segments)
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Str(String),
    Field(Vec<String>),
}

fn tokenize(action: &str) -> TemplateResult<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = action.char_indices().peekable();
    while let Some(&(start, c)) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            continue;
        }
        if c == '"' {
            chars.next();
            let mut value = String::new();
            let mut closed = false;
            while let Some((_, c)) = chars.next() {
                match c {
                    '"' => {
                        closed = true;
                        break;
                    }
                    '\\' => {
                        if let Some((_, escaped)) = chars.next() {
                            value.push(match escaped {
                                'n' => '\n',
                                't' => '\t',
                                other => other,
                            });
                        }
                    }
                    other => value.push(other),
                }
            }
            if !closed {
                return Err(TemplateError::UnterminatedString(action.to_string()));
            }
            tokens.push(Token::Str(value));
            continue;
        }
        let mut end = start;
        while let Some(&(i, c)) = chars.peek() {
            if c.is_whitespace() || c == '"' {
                break;
            }
            end = i + c.len_utf8();
            chars.next();
        }
        let word = &action[start..end];
        if let Some(path) = word.strip_prefix('.') {
            let parts = if path.is_empty() {
                Vec::new()
            } else {
                path.split('.').map(str::to_string).collect()
            };
            tokens.push(Token::Field(parts));
        } else {
            tokens.push(Token::Ident(word.to_string()));
        }
    }
    Ok(tokens)
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
enum Expr {
    Field(Vec<String>),
    Str(String),
    Or(Vec<Expr>),
    Secret(String),
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Field(path) if path.is_empty() => write!(f, "."),
            Expr::Field(path) => write!(f, ".{}", path.join(".")),
            Expr::Str(s) => write!(f, "{s:?}"),
            Expr::Or(args) => {
                write!(f, "or")?;
                for arg in args {
                    write!(f, " {arg}")?;
                }
                Ok(())
            }
            Expr::Secret(path) => write!(f, "secret {path:?}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Node {
    Text(String),
    Print(Expr),
    If {
        cond: Expr,
        then: Vec<Node>,
        otherwise: Vec<Node>,
    },
    With {
        value: Expr,
        then: Vec<Node>,
        otherwise: Vec<Node>,
    },
}

enum Action {
    Print(Expr),
    If(Expr),
    With(Expr),
    Else,
    End,
}

fn parse_action(body: &str, offset: usize) -> TemplateResult<Action> {
    let tokens = tokenize(body)?;
    let unexpected = |token: &Token| TemplateError::UnexpectedToken {
        token: format!("{token:?}"),
        action: body.to_string(),
    };
    let Some(first) = tokens.first() else {
        return Err(TemplateError::EmptyAction(offset));
    };
    let keyword_only = |action: Action| match tokens.get(1) {
        Some(extra) => Err(unexpected(extra)),
        None => Ok(action),
    };
    match first {
        Token::Ident(kw) if kw == "if" => Ok(Action::If(parse_expr(&tokens[1..], body)?)),
        Token::Ident(kw) if kw == "with" => Ok(Action::With(parse_expr(&tokens[1..], body)?)),
        Token::Ident(kw) if kw == "else" => keyword_only(Action::Else),
        Token::Ident(kw) if kw == "end" => keyword_only(Action::End),
        _ => Ok(Action::Print(parse_expr(&tokens, body)?)),
    }
}

fn parse_expr(tokens: &[Token], action: &str) -> TemplateResult<Expr> {
    let unexpected = |token: Option<&Token>| TemplateError::UnexpectedToken {
        token: token.map(|t| format!("{t:?}")).unwrap_or_else(|| "<end>".into()),
        action: action.to_string(),
    };
    match tokens {
        [Token::Ident(f), args @ ..] if f == "or" => {
            if args.is_empty() {
                return Err(unexpected(None));
            }
            let terms = args
                .iter()
                .map(|t| parse_term(t).ok_or_else(|| unexpected(Some(t))))
                .collect::<TemplateResult<Vec<_>>>()?;
            Ok(Expr::Or(terms))
        }
        [Token::Ident(f), Token::Str(path)] if f == "secret" => Ok(Expr::Secret(path.clone())),
        [Token::Ident(f), rest @ ..] if f == "secret" => Err(unexpected(rest.first())),
        [single] => parse_term(single).ok_or_else(|| unexpected(Some(single))),
        [] => Err(unexpected(None)),
        [_, extra, ..] => Err(unexpected(Some(extra))),
    }
}

fn parse_term(token: &Token) -> Option<Expr> {
    match token {
        Token::Field(path) => Some(Expr::Field(path.clone())),
        Token::Str(s) => Some(Expr::Str(s.clone())),
        Token::Ident(_) => None,
    }
}

enum Terminator {
    Else,
    End,
    Eof,
}

struct Parser {
    segments: std::vec::IntoIter<Segment>,
}

impl Parser {
    fn block(&mut self) -> TemplateResult<(Vec<Node>, Terminator)> {
        let mut nodes = Vec::new();
        while let Some(segment) = self.segments.next() {
            let (body, offset) = match segment {
                Segment::Text(text) => {
                    nodes.push(Node::Text(text));
                    continue;
                }
                Segment::Action { body, offset } => (body, offset),
            };
            match parse_action(&body, offset)? {
                Action::Print(expr) => nodes.push(Node::Print(expr)),
                Action::Else => return Ok((nodes, Terminator::Else)),
                Action::End => return Ok((nodes, Terminator::End)),
                Action::If(cond) => {
                    let (then, otherwise) = self.branches(&body)?;
                    nodes.push(Node::If {
                        cond,
                        then,
                        otherwise,
                    });
                }
                Action::With(value) => {
                    let (then, otherwise) = self.branches(&body)?;
                    nodes.push(Node::With {
                        value,
                        then,
                        otherwise,
                    });
                }
            }
        }
        Ok((nodes, Terminator::Eof))
    }

    fn branches(&mut self, opener: &str) -> TemplateResult<(Vec<Node>, Vec<Node>)> {
        let (then, term) = self.block()?;
        match term {
            Terminator::End => Ok((then, Vec::new())),
            Terminator::Eof => Err(TemplateError::MissingEnd(opener.to_string())),
            Terminator::Else => match self.block()? {
                (otherwise, Terminator::End) => Ok((then, otherwise)),
                (_, Terminator::Else) => Err(TemplateError::Unmatched("else")),
                (_, Terminator::Eof) => Err(TemplateError::MissingEnd(opener.to_string())),
            },
        }
    }
}

/// A parsed template, ready to render any number of times.
#[derive(Debug, Clone, PartialEq)]
pub struct Template {
    nodes: Vec<Node>,
}

impl Template {
    pub fn parse(src: &str) -> std::result::Result<Self, TemplateError> {
        let mut parser = Parser {
            segments: lex(src)?.into_iter(),
        };
        match parser.block()? {
            (nodes, Terminator::Eof) => Ok(Self { nodes }),
            (_, Terminator::Else) => Err(TemplateError::Unmatched("else")),
            (_, Terminator::End) => Err(TemplateError::Unmatched("end")),
        }
    }

    pub fn render(&self, store: &SecretStore) -> std::result::Result<String, TemplateError> {
        let mut out = String::new();
        Renderer { store }.nodes(&self.nodes, &Value::Null, &mut out)?;
        Ok(out)
    }
}

/// Parse and render in one step.
pub fn render(src: &str, store: &SecretStore) -> Result<String> {
    Ok(Template::parse(src)?.render(store)?)
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

struct Renderer<'a> {
    store: &'a SecretStore,
}

impl Renderer<'_> {
    fn nodes(&self, nodes: &[Node], dot: &Value, out: &mut String) -> TemplateResult<()> {
        for node in nodes {
            match node {
                Node::Text(text) => out.push_str(text),
                Node::Print(expr) => match self.eval(expr, dot)? {
                    Some(value) if !value.is_null() => out.push_str(&display(&value)),
                    _ => return Err(TemplateError::MissingKey(expr.to_string())),
                },
                Node::If {
                    cond,
                    then,
                    otherwise,
                } => {
                    let branch = if truthy(self.eval(cond, dot)?.as_ref()) {
                        then
                    } else {
                        otherwise
                    };
                    self.nodes(branch, dot, out)?;
                }
                Node::With {
                    value,
                    then,
                    otherwise,
                } => match self.eval(value, dot)? {
                    Some(v) if truthy(Some(&v)) => self.nodes(then, &v, out)?,
                    _ => self.nodes(otherwise, dot, out)?,
                },
            }
        }
        Ok(())
    }

    fn eval(&self, expr: &Expr, dot: &Value) -> TemplateResult<Option<Value>> {
        match expr {
            Expr::Str(s) => Ok(Some(Value::String(s.clone()))),
            Expr::Field(path) => Ok(path
                .iter()
                .try_fold(dot, |v, key| v.get(key.as_str()))
                .cloned()),
            Expr::Or(args) => {
                let mut last = None;
                for arg in args {
                    last = self.eval(arg, dot)?;
                    if truthy(last.as_ref()) {
                        break;
                    }
                }
                Ok(last)
            }
            Expr::Secret(path) => {
                let data = self
                    .store
                    .get(path)
                    .ok_or_else(|| TemplateError::SecretNotFound(path.clone()))?;
                Ok(Some(serde_json::json!({ "Data": { "data": data } })))
            }
        }
    }
}

fn truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
        Some(Value::Array(a)) => !a.is_empty(),
        Some(Value::Object(o)) => !o.is_empty(),
    }
}

fn display(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
