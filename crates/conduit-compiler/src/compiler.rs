use std::collections::HashSet;
use std::path::PathBuf;

use conduit_config::CommandNode;
use indexmap::IndexMap;
use tracing::debug;

use crate::ast::{Expr, Program, Stmt};
use crate::branch::BranchMerger;
use crate::emit;
use crate::error::CompileError;
use crate::manifest::{CompiledProgram, DependencyManifest, GroupDependency, InlineCode};
use crate::printer::print_program;
use crate::resolver::GLOBAL_BINDING;

/// Directory inline code modules are materialized under, relative to the
/// program.
pub const COMPONENTS_DIR: &str = "components";

/// File the global registry is loaded from, relative to the program.
pub const GLOBAL_FILE: &str = "global.json";

#[derive(Debug, Clone, Default)]
pub struct CompilerConfig {
  /// Root of installed component groups (`<root>/<groupKey>/v<version>`).
  pub group_root: PathBuf,
}

/// Compiles flows into programs.
///
/// Holds no state between calls; every `compile` works on a fresh
/// [`CompilationContext`].
#[derive(Debug, Clone, Default)]
pub struct FlowCompiler {
  config: CompilerConfig,
}

impl FlowCompiler {
  pub fn new(config: CompilerConfig) -> Self {
    Self { config }
  }

  pub fn config(&self) -> &CompilerConfig {
    &self.config
  }

  pub fn compile(&self, nodes: &[CommandNode]) -> Result<CompiledProgram, CompileError> {
    let mut ctx = CompilationContext::new(&self.config);
    let body = compile_list(&mut ctx, nodes)?;
    let dependencies = ctx.finish();

    let mut program = Program::default();
    for group in &dependencies.groups {
      program.body.push(Stmt::Const {
        name: group.alias.clone(),
        init: Expr::require(group.local_path.to_string_lossy()),
      });
    }
    for (id, code) in &dependencies.inline_code {
      program.body.push(Stmt::Const {
        name: code.alias.clone(),
        init: Expr::require(format!("./{}/{}", COMPONENTS_DIR, id)),
      });
    }
    program.body.push(Stmt::Const {
      name: GLOBAL_BINDING.to_string(),
      init: Expr::require(format!("./{}", GLOBAL_FILE)),
    });
    program.body.push(entry_point(body));

    debug!(
      nodes = nodes.len(),
      groups = dependencies.groups.len(),
      inline_code = dependencies.inline_code.len(),
      "flow compiled"
    );

    Ok(CompiledProgram {
      source: print_program(&program),
      dependencies,
    })
  }
}

/// `(async function () { <body>; process.exit(0); })();`
fn entry_point(mut body: Vec<Stmt>) -> Stmt {
  body.push(Stmt::Expr(
    Expr::ident("process")
      .member("exit")
      .call(vec![Expr::Num("0".to_string())]),
  ));
  Stmt::Expr(Expr::AsyncFunction(body).call(vec![]))
}

/// Accumulation state of one compile call.
pub(crate) struct CompilationContext<'a> {
  config: &'a CompilerConfig,
  declared_outputs: HashSet<String>,
  groups: IndexMap<(String, String), GroupDependency>,
  inline_code: IndexMap<String, InlineCode>,
}

impl<'a> CompilationContext<'a> {
  fn new(config: &'a CompilerConfig) -> Self {
    Self {
      config,
      declared_outputs: HashSet::new(),
      groups: IndexMap::new(),
      inline_code: IndexMap::new(),
    }
  }

  pub fn config(&self) -> &CompilerConfig {
    self.config
  }

  /// Record an output binding. Returns `true` the first time `key` is seen.
  pub fn declare_output(&mut self, key: &str) -> bool {
    self.declared_outputs.insert(key.to_string())
  }

  pub fn add_group(&mut self, dependency: GroupDependency) {
    let key = (dependency.group_key.clone(), dependency.version.clone());
    self.groups.entry(key).or_insert(dependency);
  }

  pub fn add_inline_code(&mut self, id: &str, code: InlineCode) {
    self.inline_code.insert(id.to_string(), code);
  }

  fn finish(self) -> DependencyManifest {
    DependencyManifest {
      groups: self.groups.into_values().collect(),
      inline_code: self.inline_code,
    }
  }
}

/// Compile one sibling list, merging branch chains as they close.
fn compile_list(
  ctx: &mut CompilationContext<'_>,
  nodes: &[CommandNode],
) -> Result<Vec<Stmt>, CompileError> {
  let mut out = Vec::with_capacity(nodes.len());
  let mut merger = BranchMerger::default();

  for node in nodes {
    match node {
      CommandNode::If(cond) => {
        let test = emit::condition_test(cond)?;
        let body = compile_list(ctx, &cond.body)?;
        merger.open(test, body, &mut out);
      }
      CommandNode::ElseIf(cond) => {
        let test = emit::condition_test(cond)?;
        let body = compile_list(ctx, &cond.body)?;
        if !merger.extend(test, body) {
          return Err(branch_order(node));
        }
      }
      CommandNode::Else(otherwise) => {
        let body = compile_list(ctx, &otherwise.body)?;
        if !merger.close(body, &mut out) {
          return Err(branch_order(node));
        }
      }
      CommandNode::ForEach(each) => {
        merger.flush(&mut out);
        let body = compile_list(ctx, &each.body)?;
        out.push(emit::for_each(each, body)?);
      }
      CommandNode::Component(component) => {
        merger.flush(&mut out);
        out.push(emit::component(ctx, component)?);
      }
      CommandNode::Code(code) => {
        merger.flush(&mut out);
        out.push(emit::code(ctx, code)?);
      }
    }
  }

  merger.flush(&mut out);
  Ok(out)
}

fn branch_order(node: &CommandNode) -> CompileError {
  CompileError::BranchOrder {
    node_id: node.id().map(str::to_string),
  }
}
