use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use serde_json::Value;
use tracing::warn;

use conduit_compiler::{CompilerConfig, FlowCompiler};
use conduit_config::{CommandNode, parse_flow};
use conduit_engine::{ChannelNotifier, EngineConfig, ExecutionCoordinator, RunRequest};
use conduit_process::{RunContext, RunState};

/// Conduit - compiles visual automation flows into programs and runs them
#[derive(Parser)]
#[command(name = "conduit")]
#[command(version, about, long_about = None)]
struct Cli {
  /// Path to the data directory (default: ~/.conduit)
  #[arg(long, global = true)]
  data_dir: Option<PathBuf>,

  #[command(subcommand)]
  command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
  /// Compile a flow and print the program and its dependency manifest
  Compile {
    /// Path to the flow file (JSON array of nodes)
    flow_file: PathBuf,

    /// Write the program to `<dir>/index.js` instead of stdout
    #[arg(long)]
    out: Option<PathBuf>,
  },

  /// Compile, materialize and run a flow, printing events as JSON lines
  Run {
    /// Path to the flow file (JSON array of nodes)
    flow_file: PathBuf,

    /// App the run belongs to; its workspace is `<data-dir>/apps/<app>`
    #[arg(long)]
    app: String,

    /// Time the run out after this many milliseconds
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Program argument as key=value (repeatable)
    #[arg(long = "context", value_parser = parse_context_pair)]
    context: Vec<(String, Value)>,

    /// Interpreter used to run the program
    #[arg(long, default_value = "node")]
    interpreter: PathBuf,
  },
}

fn main() -> Result<()> {
  let cli = Cli::parse();

  tracing_subscriber::fmt()
    .with_env_filter(
      tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
    )
    .with_writer(std::io::stderr)
    .init();

  let data_dir = match cli.data_dir {
    Some(dir) => dir,
    None => dirs::home_dir()
      .context("could not determine home directory")?
      .join(".conduit"),
  };

  match cli.command {
    Some(Commands::Compile { flow_file, out }) => {
      let rt = tokio::runtime::Runtime::new()?;
      rt.block_on(async { compile_flow(&flow_file, out.as_deref(), &data_dir).await })?;
    }
    Some(Commands::Run {
      flow_file,
      app,
      timeout_ms,
      context,
      interpreter,
    }) => {
      let mut config = EngineConfig::with_data_dir(&data_dir);
      config.interpreter = interpreter;
      let context: RunContext = context.into_iter().collect();
      let request = RunRequest {
        app_id: app,
        nodes: Vec::new(),
        context,
        timeout_ms,
      };
      let rt = tokio::runtime::Runtime::new()?;
      rt.block_on(async { run_flow(&flow_file, config, request).await })?;
    }
    None => {
      println!("conduit - use --help to see available commands");
    }
  }

  Ok(())
}

async fn load_flow(flow_file: &Path) -> Result<Vec<CommandNode>> {
  let content = tokio::fs::read_to_string(flow_file)
    .await
    .with_context(|| format!("failed to read flow file: {}", flow_file.display()))?;
  parse_flow(&content)
    .with_context(|| format!("failed to parse flow file: {}", flow_file.display()))
}

async fn compile_flow(flow_file: &Path, out: Option<&Path>, data_dir: &Path) -> Result<()> {
  let nodes = load_flow(flow_file).await?;
  let config = EngineConfig::with_data_dir(data_dir);
  let compiler = FlowCompiler::new(CompilerConfig {
    group_root: config.group_root,
  });
  let program = compiler.compile(&nodes).context("failed to compile flow")?;
  let manifest = serde_json::to_string_pretty(&program.dependencies)?;

  match out {
    Some(dir) => {
      tokio::fs::create_dir_all(dir)
        .await
        .with_context(|| format!("failed to create {}", dir.display()))?;
      let path = dir.join(conduit_engine::PROGRAM_FILE);
      tokio::fs::write(&path, &program.source)
        .await
        .with_context(|| format!("failed to write {}", path.display()))?;
      eprintln!("Wrote program: {}", path.display());
      println!("{}", manifest);
    }
    None => {
      print!("{}", program.source);
      eprintln!("{}", manifest);
    }
  }

  Ok(())
}

async fn run_flow(flow_file: &Path, config: EngineConfig, mut request: RunRequest) -> Result<()> {
  request.nodes = load_flow(flow_file).await?;

  let (notifier, mut events) = ChannelNotifier::channel();
  let coordinator = ExecutionCoordinator::new(config).with_notifier(notifier);

  let printer = tokio::spawn(async move {
    while let Some(event) = events.recv().await {
      match serde_json::to_string(&event) {
        Ok(line) => println!("{}", line),
        Err(e) => warn!(error = %e, "failed to serialize event"),
      }
    }
  });

  // Ctrl-C stops the run instead of abandoning the process.
  let stopper = tokio::spawn({
    let coordinator = coordinator.clone();
    async move {
      if tokio::signal::ctrl_c().await.is_ok() {
        eprintln!("Stopping run");
        if let Err(e) = coordinator.stop().await {
          warn!(error = %e, "failed to stop run");
        }
      }
    }
  });

  let result = coordinator.run(request).await;
  stopper.abort();
  let _ = stopper.await;
  drop(coordinator);
  printer.await.context("event printer failed")?;

  let outcome = result.context("run failed")?;
  eprintln!("Run {} finished: {}", outcome.run_id, outcome.state);
  if outcome.state != RunState::Success {
    bail!("run ended in state {}", outcome.state);
  }
  Ok(())
}

/// Parse `key=value`. The value is read as JSON when it is valid JSON and
/// as a plain string otherwise.
fn parse_context_pair(raw: &str) -> Result<(String, Value), String> {
  let (key, value) = raw
    .split_once('=')
    .ok_or_else(|| format!("expected key=value, got '{}'", raw))?;
  if key.is_empty() {
    return Err(format!("missing key in '{}'", raw));
  }
  let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
  Ok((key.to_string(), value))
}
