//! crybro CLI - local node + script shell
//!
//!   crybro                       → start the node, print its variables, open the shell
//!   crybro start [--port N]      → start the node in the foreground until Ctrl+C
//!   crybro start --interactive   → start the node, then open the shell
//!   crybro list [--dir D]        → list runnable scripts
//!   crybro env                   → print node variables exported in this environment
//!   crybro run <ref>             → run one script without starting a node
//!
//! Configuration: CLI flags > environment > `.env` in the working directory > defaults.
//! See `CRYBRO_*` in `crybro::core::paths::config`.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use crybro::logging::init_logging;
use crybro::shell::render_catalog;
use crybro::{
    discover, EnvRegistry, Interrupt, Interrupts, NodeConfig, Runner, RunnerConfig, Shell, Supervisor,
};
use serde_json::json;
use std::path::{Path, PathBuf};
use std::process::ExitStatus;
use tokio::io::BufReader;

/// Exit code reported when a run is cut short by Ctrl+C
const INTERRUPTED: i32 = 130;

#[derive(Parser, Debug)]
#[command(name = "crybro", version, about = "Local dev node launcher and script shell")]
struct Cli {
    /// Machine-readable JSON output
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the node and export its first account
    Start(StartArgs),

    /// List runnable scripts
    #[command(alias = "ls")]
    List {
        /// Directory to search (default: current directory)
        #[arg(long, short)]
        dir: Option<PathBuf>,
    },

    /// Print the node variables visible to scripts
    Env,

    /// Run one script by index, name or path
    Run {
        reference: String,

        /// Directory the catalog is built from and the script runs in
        #[arg(long, short)]
        dir: Option<PathBuf>,
    },
}

#[derive(Args, Debug, Default)]
struct StartArgs {
    /// RPC port (default 8545)
    #[arg(long, short, env = "CRYBRO_PORT")]
    port: Option<u16>,

    /// Open the shell once the node is ready
    #[arg(long, overrides_with = "no_interactive")]
    interactive: bool,

    /// Keep the node in the foreground without a shell (default)
    #[arg(long)]
    no_interactive: bool,

    /// Extra node arguments, after `--`
    #[arg(last = true)]
    node_args: Vec<String>,
}

fn main() {
    // Before parsing and before any runtime thread exists
    if let Err(e) = load_dotenv(Path::new(".env")) {
        eprintln!("Warning: {:#}", e);
    }
    init_logging();

    let cli = Cli::parse();
    let json = cli.json;

    let code = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(rt) => {
            let result = rt.block_on(dispatch(cli));
            // A pending stdin read would otherwise hold shutdown
            rt.shutdown_background();
            result
        }
        Err(e) => Err(anyhow::Error::new(e).context("start async runtime")),
    };

    match code {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            if json {
                eprintln!("{}", json!({ "error": format!("{:#}", e) }));
            } else {
                eprintln!("Error: {:#}", e);
            }
            std::process::exit(1);
        }
    }
}

async fn dispatch(cli: Cli) -> Result<i32> {
    match cli.command {
        None => cmd_start(StartArgs::default(), true, cli.json).await,
        Some(Command::Start(args)) => {
            let interactive = args.interactive && !args.no_interactive;
            cmd_start(args, interactive, cli.json).await
        }
        Some(Command::List { dir }) => cmd_list(dir, cli.json),
        Some(Command::Env) => cmd_env(cli.json),
        Some(Command::Run { reference, dir }) => cmd_run(&reference, dir).await,
    }
}

/// Variables from `path`, never overriding what the environment already has
fn load_dotenv(path: &Path) -> Result<()> {
    if !path.exists() {
        return Ok(());
    }
    for item in dotenvy::from_path_iter(path).context("load .env")? {
        let (key, value) = item.context("parse .env")?;
        if std::env::var_os(&key).is_none() {
            std::env::set_var(&key, &value);
        }
    }
    Ok(())
}

fn working_dir(dir: Option<PathBuf>) -> Result<PathBuf> {
    match dir {
        Some(dir) => Ok(dir),
        None => std::env::current_dir().context("resolve working directory"),
    }
}

enum Started<T> {
    Done(T),
    Interrupted,
}

enum Foreground {
    Interrupted(Interrupt),
    Exited(std::result::Result<ExitStatus, crybro::NodeError>),
}

async fn cmd_start(args: StartArgs, interactive: bool, json: bool) -> Result<i32> {
    let mut config = NodeConfig::from_env();
    if let Some(port) = args.port {
        config = config.with_port(port);
    }
    if !args.node_args.is_empty() {
        config = config.with_args(args.node_args);
    }

    let mut interrupts = Interrupts::install().context("install signal handlers")?;
    let mut registry = EnvRegistry::new();
    let mut node = Supervisor::new(config);

    if !json {
        println!("Starting {} on port {}...", node.config().bin, node.config().port);
    }

    // Dropping the start future on interrupt kills the half-started node
    let started = tokio::select! {
        result = async { node.start(&mut registry).await.cloned() } => Started::Done(result),
        _ = interrupts.recv() => Started::Interrupted,
    };
    let credentials = match started {
        Started::Done(result) => result?,
        Started::Interrupted => {
            node.stop().await?;
            return Ok(INTERRUPTED);
        }
    };

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&json!({
                "rpc_url": credentials.rpc_url,
                "port": credentials.port,
                "env": registry.get_all(),
            }))?
        );
    } else {
        println!("Node ready at {}\n", credentials.rpc_url);
        println!("{}\n", registry.format_masked());
    }

    if interactive {
        let root = working_dir(None)?;
        let runner = Runner::new(RunnerConfig::from_env()).with_workdir(&root);
        let mut shell = Shell::new(node, registry, runner, root, std::io::stdout());
        shell.run(BufReader::new(tokio::io::stdin()), &mut interrupts).await?;
        return Ok(0);
    }

    if !json {
        println!("Press Ctrl+C to stop.");
    }
    let event = tokio::select! {
        interrupt = interrupts.recv() => Foreground::Interrupted(interrupt),
        status = node.wait() => Foreground::Exited(status),
    };
    match event {
        Foreground::Interrupted(interrupt) => tracing::info!("{:?}, stopping node", interrupt),
        Foreground::Exited(Ok(status)) => tracing::warn!("Node exited on its own ({})", status),
        Foreground::Exited(Err(e)) => tracing::warn!("Lost track of node: {}", e),
    }
    node.stop().await?;
    if !json {
        println!("Node stopped.");
    }
    Ok(0)
}

fn cmd_list(dir: Option<PathBuf>, json: bool) -> Result<i32> {
    let root = working_dir(dir)?;
    let catalog = discover(&root)?;
    if json {
        println!("{}", serde_json::to_string_pretty(catalog.entries())?);
    } else {
        print!("{}", render_catalog(&catalog));
    }
    Ok(0)
}

fn cmd_env(json: bool) -> Result<i32> {
    let registry = EnvRegistry::from_process();
    if json {
        println!("{}", serde_json::to_string_pretty(&registry.get_all())?);
    } else if registry.is_empty() {
        println!("(no variables set)");
    } else {
        println!("{}", registry.format_for_display());
    }
    Ok(0)
}

async fn cmd_run(reference: &str, dir: Option<PathBuf>) -> Result<i32> {
    let root = working_dir(dir)?;
    let catalog = discover(&root)?;
    let entry = catalog.resolve(reference)?;

    let registry = EnvRegistry::from_process();
    let runner = Runner::new(RunnerConfig::from_env()).with_workdir(&root);
    let mut interrupts = Interrupts::install().context("install signal handlers")?;

    eprintln!("Running: {}", entry.display_path());
    let outcome = runner.execute(&entry, &registry, &mut interrupts).await?;
    Ok(match (outcome.code, outcome.interrupt) {
        (Some(code), _) => code,
        (None, Some(_)) => INTERRUPTED,
        (None, None) => 1,
    })
}
