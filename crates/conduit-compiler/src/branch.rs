//! Branch chain merging.
//!
//! Sibling `if`, `elseif` and `else` nodes are compiled one by one into
//! [`Link`]s and buffered here until the chain is complete. Flushing nests
//! each link into the `else` of the previous one, producing a single
//! `if / else if / else` statement.

use crate::ast::{Expr, Stmt};

pub(crate) enum Link {
  Cond { test: Expr, body: Vec<Stmt> },
  Otherwise(Vec<Stmt>),
}

#[derive(Default)]
pub(crate) struct BranchMerger {
  buffer: Vec<Link>,
}

impl BranchMerger {
  /// Start a new chain, flushing the previous one into `out`.
  pub fn open(&mut self, test: Expr, body: Vec<Stmt>, out: &mut Vec<Stmt>) {
    self.flush(out);
    self.buffer.push(Link::Cond { test, body });
  }

  /// Append an `else if` link. Returns `false` when no chain is open.
  pub fn extend(&mut self, test: Expr, body: Vec<Stmt>) -> bool {
    if self.buffer.is_empty() {
      return false;
    }
    self.buffer.push(Link::Cond { test, body });
    true
  }

  /// Append the final `else` link and flush. Returns `false` when no chain
  /// is open.
  pub fn close(&mut self, body: Vec<Stmt>, out: &mut Vec<Stmt>) -> bool {
    if self.buffer.is_empty() {
      return false;
    }
    self.buffer.push(Link::Otherwise(body));
    self.flush(out);
    true
  }

  /// Emit the buffered chain, if any, as one statement.
  pub fn flush(&mut self, out: &mut Vec<Stmt>) {
    let mut tail: Option<Stmt> = None;
    for link in self.buffer.drain(..).rev() {
      tail = Some(match link {
        Link::Cond { test, body } => Stmt::If {
          test,
          consequent: body,
          alternate: tail.map(Box::new),
        },
        Link::Otherwise(body) => Stmt::Block(body),
      });
    }
    if let Some(head) = tail {
      out.push(head);
    }
  }
}
