//! Program syntax tree.
//!
//! A deliberately small subset of JavaScript: just the expression and
//! statement forms the emitters produce. The printer in [`crate::printer`]
//! turns a [`Program`] into source text.

use conduit_config::Operator;

/// Key of an object literal property.
#[derive(Debug, Clone, PartialEq)]
pub enum PropKey {
  Ident(String),
  Str(String),
}

impl PropKey {
  /// A bare key when `name` is an identifier, a quoted one otherwise.
  pub fn from_name(name: &str) -> Self {
    if is_identifier(name) {
      PropKey::Ident(name.to_string())
    } else {
      PropKey::Str(name.to_string())
    }
  }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
  Ident(String),
  Str(String),
  /// Numeric literal, kept as its source spelling (`12`, `-3.5`, `1e3`, `NaN`).
  Num(String),
  Bool(bool),
  Null,
  Array(Vec<Expr>),
  Object(Vec<(PropKey, Expr)>),
  Member(Box<Expr>, String),
  Call { callee: Box<Expr>, args: Vec<Expr> },
  Await(Box<Expr>),
  Binary {
    op: Operator,
    left: Box<Expr>,
    right: Box<Expr>,
  },
  /// `async function () { ... }`
  AsyncFunction(Vec<Stmt>),
}

impl Expr {
  pub fn ident(name: impl Into<String>) -> Self {
    Expr::Ident(name.into())
  }

  pub fn str(value: impl Into<String>) -> Self {
    Expr::Str(value.into())
  }

  pub fn undefined() -> Self {
    Expr::Ident("undefined".to_string())
  }

  pub fn member(self, property: impl Into<String>) -> Self {
    Expr::Member(Box::new(self), property.into())
  }

  pub fn call(self, args: Vec<Expr>) -> Self {
    Expr::Call {
      callee: Box::new(self),
      args,
    }
  }

  pub fn await_(self) -> Self {
    Expr::Await(Box::new(self))
  }

  /// `require("<path>")`
  pub fn require(path: impl Into<String>) -> Self {
    Expr::ident("require").call(vec![Expr::str(path)])
  }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
  Const { name: String, init: Expr },
  Let { name: String, init: Expr },
  Assign { name: String, value: Expr },
  Expr(Expr),
  If {
    test: Expr,
    consequent: Vec<Stmt>,
    alternate: Option<Box<Stmt>>,
  },
  Block(Vec<Stmt>),
  ForOf {
    binding: String,
    iterable: Expr,
    body: Vec<Stmt>,
  },
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Program {
  pub body: Vec<Stmt>,
}

const RESERVED: &[&str] = &[
  "await",
  "break",
  "case",
  "catch",
  "class",
  "const",
  "continue",
  "debugger",
  "default",
  "delete",
  "do",
  "else",
  "enum",
  "export",
  "extends",
  "false",
  "finally",
  "for",
  "function",
  "if",
  "import",
  "in",
  "instanceof",
  "let",
  "new",
  "null",
  "return",
  "super",
  "switch",
  "this",
  "throw",
  "true",
  "try",
  "typeof",
  "var",
  "void",
  "while",
  "with",
  "yield",
];

/// Whether `name` can be used as a binding or bare property name.
pub fn is_identifier(name: &str) -> bool {
  let mut chars = name.chars();
  let starts_ok = chars
    .next()
    .is_some_and(|c| c.is_alphabetic() || c == '_' || c == '$');
  starts_ok && chars.all(|c| c.is_alphanumeric() || c == '_' || c == '$') && !RESERVED.contains(&name)
}

/// Turn an arbitrary string into an identifier by replacing every character
/// that may not appear in one with `_`.
pub fn sanitize_identifier(raw: &str) -> String {
  let mut out: String = raw
    .chars()
    .map(|c| {
      if c.is_alphanumeric() || c == '_' || c == '$' {
        c
      } else {
        '_'
      }
    })
    .collect();
  if out.chars().next().is_none_or(|c| c.is_numeric()) {
    out.insert(0, '_');
  }
  out
}
