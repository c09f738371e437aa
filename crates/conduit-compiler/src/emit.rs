//! Node emitters: one statement (or chain link) per node.

use conduit_config::{
  CodeNode, ComponentNode, ConditionNode, ErrorPolicy, ForEachNode, InputArg, OutputArg,
  ValueType,
};

use crate::ast::{Expr, PropKey, Stmt, is_identifier, sanitize_identifier};
use crate::compiler::CompilationContext;
use crate::error::CompileError;
use crate::manifest::{GroupDependency, InlineCode, StepMeta};
use crate::resolver::{invalid_identifier, resolve_value};

/// Alias a group module is loaded under.
pub fn group_alias(group_key: &str, version: &str) -> String {
  sanitize_identifier(&format!("{}_v{}", group_key, version))
}

/// Alias an inline code module is loaded under.
pub fn code_alias(id: &str) -> String {
  sanitize_identifier(&format!("code_{}", id))
}

pub(crate) fn component(
  ctx: &mut CompilationContext<'_>,
  node: &ComponentNode,
) -> Result<Stmt, CompileError> {
  let node_id = non_empty(&node.id);
  if node.group_key.is_empty() {
    return Err(missing(node_id, "group"));
  }
  if node.version.is_empty() {
    return Err(missing(node_id, "version"));
  }
  if !is_identifier(&node.function_name) {
    return Err(invalid_identifier(&node.function_name, node_id));
  }

  let alias = group_alias(&node.group_key, &node.version);
  let local_path = ctx
    .config()
    .group_root
    .join(&node.group_key)
    .join(format!("v{}", node.version));
  ctx.add_group(GroupDependency {
    group_key: node.group_key.clone(),
    version: node.version.clone(),
    alias: alias.clone(),
    local_path,
  });

  let callee = Expr::ident(alias).member(&node.function_name);
  step_call(
    ctx,
    callee,
    StepCall {
      id: &node.id,
      name: &node.name,
      error_policy: node.error_policy,
      inputs: &node.inputs,
      output: node.output.as_ref(),
    },
  )
}

pub(crate) fn code(
  ctx: &mut CompilationContext<'_>,
  node: &CodeNode,
) -> Result<Stmt, CompileError> {
  let Some(id) = non_empty(&node.id) else {
    return Err(missing(None, "id"));
  };

  let alias = code_alias(id);
  ctx.add_inline_code(
    id,
    InlineCode {
      alias: alias.clone(),
      source: node.source.clone(),
      meta: StepMeta {
        id: node.id.clone(),
        name: node.name.clone(),
        error_policy: node.error_policy,
        inputs: node.inputs.clone(),
        output: node.output.clone(),
      },
    },
  );

  step_call(
    ctx,
    Expr::ident(alias),
    StepCall {
      id: &node.id,
      name: &node.name,
      error_policy: node.error_policy,
      inputs: &node.inputs,
      output: node.output.as_ref(),
    },
  )
}

struct StepCall<'a> {
  id: &'a str,
  name: &'a str,
  error_policy: ErrorPolicy,
  inputs: &'a [InputArg],
  output: Option<&'a OutputArg>,
}

/// `[let] <output> = await <target>.run({inputs}, {info})`
fn step_call(
  ctx: &mut CompilationContext<'_>,
  target: Expr,
  step: StepCall<'_>,
) -> Result<Stmt, CompileError> {
  let node_id = non_empty(step.id);

  let mut inputs = Vec::with_capacity(step.inputs.len());
  for input in step.inputs {
    let value = resolve_value(input.source, input.value_type, &input.value, node_id)?;
    inputs.push((PropKey::from_name(&input.key), value));
  }
  let info = Expr::Object(vec![
    (PropKey::from_name("id"), Expr::str(step.id)),
    (PropKey::from_name("name"), Expr::str(step.name)),
    (
      PropKey::from_name("errorPolicy"),
      Expr::str(step.error_policy.as_str()),
    ),
  ]);

  let call = target
    .member("run")
    .call(vec![Expr::Object(inputs), info])
    .await_();

  let Some(output) = step.output else {
    return Ok(Stmt::Expr(call));
  };
  let key = output.key();
  if !is_identifier(key) {
    return Err(invalid_identifier(key, node_id));
  }
  if ctx.declare_output(key) {
    Ok(Stmt::Let {
      name: key.to_string(),
      init: call,
    })
  } else {
    Ok(Stmt::Assign {
      name: key.to_string(),
      value: call,
    })
  }
}

/// `<left> <op> <right>` of an `if` / `elseif` node.
pub(crate) fn condition_test(node: &ConditionNode) -> Result<Expr, CompileError> {
  let node_id = non_empty(&node.id);
  let left = resolve_value(node.left_source, ValueType::String, &node.left_value, node_id)?;
  let right = resolve_value(node.right_source, ValueType::String, &node.right_value, node_id)?;
  Ok(Expr::Binary {
    op: node.operator,
    left: Box::new(left),
    right: Box::new(right),
  })
}

/// `for (const <binding> of <iterable>) { body }`
pub(crate) fn for_each(node: &ForEachNode, body: Vec<Stmt>) -> Result<Stmt, CompileError> {
  let node_id = non_empty(&node.id);
  if node.iterable_value.is_empty() {
    return Err(missing(node_id, "items"));
  }
  let Some(binding) = node.binding.as_ref().map(OutputArg::key) else {
    return Err(missing(node_id, "output"));
  };
  if !is_identifier(binding) {
    return Err(invalid_identifier(binding, node_id));
  }

  let iterable = resolve_value(
    node.iterable_source,
    ValueType::List,
    &node.iterable_value,
    node_id,
  )?;
  Ok(Stmt::ForOf {
    binding: binding.to_string(),
    iterable,
    body,
  })
}

pub(crate) fn non_empty(id: &str) -> Option<&str> {
  (!id.is_empty()).then_some(id)
}

fn missing(node_id: Option<&str>, field: &'static str) -> CompileError {
  CompileError::MissingField {
    node_id: node_id.map(str::to_string),
    field,
  }
}
