//! Conduit Compiler
//!
//! Turns a flow (a tree of [`CommandNode`](conduit_config::CommandNode)s)
//! into the source of a runnable program plus the manifest of modules that
//! program loads.
//!
//! The pipeline per sibling list:
//! - each node goes through its emitter, with string-typed values resolved
//!   into expressions
//! - `if` / `elseif` / `else` siblings are merged into one conditional chain
//! - nested bodies are compiled recursively
//!
//! The result is wrapped in an async entry point and prefixed with one
//! `require` per group dependency, per inline code step, and for the global
//! registry.
//!
//! ```ignore
//! let compiler = FlowCompiler::new(CompilerConfig { group_root: "/opt/groups".into() });
//! let program = compiler.compile(&conduit_config::parse_flow(json)?)?;
//! std::fs::write("index.js", &program.source)?;
//! ```

pub mod ast;
mod branch;
mod compiler;
mod emit;
mod error;
pub mod literal;
mod manifest;
mod module;
pub mod printer;
mod resolver;

pub use compiler::{COMPONENTS_DIR, CompilerConfig, FlowCompiler, GLOBAL_FILE};
pub use emit::{code_alias, group_alias};
pub use error::CompileError;
pub use manifest::{CompiledProgram, DependencyManifest, GroupDependency, InlineCode, StepMeta};
pub use module::{STEP_CODE_FILE, STEP_INDEX_FILE, render_step_module};
pub use resolver::{GLOBAL_BINDING, resolve_value};
