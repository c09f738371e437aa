//! Source text generation for [`Program`] trees.

use crate::ast::{Expr, Program, PropKey, Stmt};

const INDENT: &str = "  ";

/// Render a program as source text. Output is stable: the same tree always
/// prints to the same bytes.
pub fn print_program(program: &Program) -> String {
  let mut printer = Printer::default();
  for stmt in &program.body {
    printer.stmt(stmt);
    printer.out.push('\n');
  }
  printer.out
}

/// Render a single expression.
pub fn print_expr(expr: &Expr) -> String {
  let mut printer = Printer::default();
  printer.expr(expr);
  printer.out
}

#[derive(Default)]
struct Printer {
  out: String,
  depth: usize,
}

impl Printer {
  fn indent(&mut self) {
    for _ in 0..self.depth {
      self.out.push_str(INDENT);
    }
  }

  fn block(&mut self, body: &[Stmt]) {
    if body.is_empty() {
      self.out.push_str("{}");
      return;
    }
    self.out.push_str("{\n");
    self.depth += 1;
    for stmt in body {
      self.indent();
      self.stmt(stmt);
      self.out.push('\n');
    }
    self.depth -= 1;
    self.indent();
    self.out.push('}');
  }

  fn stmt(&mut self, stmt: &Stmt) {
    match stmt {
      Stmt::Const { name, init } => {
        self.out.push_str("const ");
        self.out.push_str(name);
        self.out.push_str(" = ");
        self.expr(init);
        self.out.push(';');
      }
      Stmt::Let { name, init } => {
        self.out.push_str("let ");
        self.out.push_str(name);
        self.out.push_str(" = ");
        self.expr(init);
        self.out.push(';');
      }
      Stmt::Assign { name, value } => {
        self.out.push_str(name);
        self.out.push_str(" = ");
        self.expr(value);
        self.out.push(';');
      }
      Stmt::Expr(expr) => {
        self.expr(expr);
        self.out.push(';');
      }
      Stmt::If {
        test,
        consequent,
        alternate,
      } => {
        self.out.push_str("if (");
        self.expr(test);
        self.out.push_str(") ");
        self.block(consequent);
        if let Some(alternate) = alternate {
          self.out.push_str(" else ");
          self.stmt(alternate);
        }
      }
      Stmt::Block(body) => self.block(body),
      Stmt::ForOf {
        binding,
        iterable,
        body,
      } => {
        self.out.push_str("for (const ");
        self.out.push_str(binding);
        self.out.push_str(" of ");
        self.expr(iterable);
        self.out.push_str(") ");
        self.block(body);
      }
    }
  }

  fn expr(&mut self, expr: &Expr) {
    match expr {
      Expr::Ident(name) => self.out.push_str(name),
      Expr::Str(value) => self.string(value),
      Expr::Num(raw) => self.out.push_str(raw),
      Expr::Bool(value) => self.out.push_str(if *value { "true" } else { "false" }),
      Expr::Null => self.out.push_str("null"),
      Expr::Array(items) => {
        self.out.push('[');
        for (i, item) in items.iter().enumerate() {
          if i > 0 {
            self.out.push_str(", ");
          }
          self.expr(item);
        }
        self.out.push(']');
      }
      Expr::Object(props) => {
        if props.is_empty() {
          self.out.push_str("{}");
          return;
        }
        self.out.push_str("{ ");
        for (i, (key, value)) in props.iter().enumerate() {
          if i > 0 {
            self.out.push_str(", ");
          }
          match key {
            PropKey::Ident(name) => self.out.push_str(name),
            PropKey::Str(name) => self.string(name),
          }
          self.out.push_str(": ");
          self.expr(value);
        }
        self.out.push_str(" }");
      }
      Expr::Member(object, property) => {
        self.operand(object);
        self.out.push('.');
        self.out.push_str(property);
      }
      Expr::Call { callee, args } => {
        self.operand(callee);
        self.out.push('(');
        for (i, arg) in args.iter().enumerate() {
          if i > 0 {
            self.out.push_str(", ");
          }
          self.expr(arg);
        }
        self.out.push(')');
      }
      Expr::Await(inner) => {
        self.out.push_str("await ");
        self.operand(inner);
      }
      Expr::Binary { op, left, right } => {
        self.operand(left);
        self.out.push(' ');
        self.out.push_str(op.as_str());
        self.out.push(' ');
        self.operand(right);
      }
      Expr::AsyncFunction(body) => {
        self.out.push_str("async function () ");
        self.block(body);
      }
    }
  }

  /// Print a sub-expression, parenthesized when it would otherwise bind
  /// looser than its parent.
  fn operand(&mut self, expr: &Expr) {
    let needs_parens = matches!(
      expr,
      Expr::Await(_) | Expr::Binary { .. } | Expr::AsyncFunction(_) | Expr::Object(_)
    );
    if needs_parens {
      self.out.push('(');
      self.expr(expr);
      self.out.push(')');
    } else {
      self.expr(expr);
    }
  }

  fn string(&mut self, value: &str) {
    // JSON string syntax is valid string literal syntax.
    match serde_json::to_string(value) {
      Ok(quoted) => self.out.push_str(&quoted),
      Err(_) => {
        self.out.push('"');
        self.out.push_str(&value.replace('\\', "\\\\").replace('"', "\\\""));
        self.out.push('"');
      }
    }
  }
}
