//! Shell - the interactive command loop of a session
//!
//! | Command | Effect |
//! |---------|--------|
//! | `list`, `ls` | Rebuild the catalog and print it |
//! | `run <ref>` | Resolve `<ref>` (index, name, path) and run it in the foreground |
//! | `env` | Print the registry, private key shortened |
//! | `env add NAME=VALUE` | Insert or overwrite a variable |
//! | `help`, `?` | Command summary |
//! | `exit`, `quit`, `q` | Stop the node and leave |
//!
//! End of input and Ctrl+C at the prompt also leave. Leaving always stops the
//! node exactly once.

use crate::node::{NodeControl, NodeError};
use crate::registry::EnvRegistry;
use crate::runtime::{Interrupt, Interrupts};
use crate::scripts::{self, Catalog, Runner};
use std::io::{self, Write};
use std::path::PathBuf;
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

const PROMPT: &str = "crybro> ";

#[derive(Error, Debug)]
pub enum ShellError {
    #[error("Shell output: {0}")]
    Io(#[from] io::Error),

    #[error(transparent)]
    Node(#[from] NodeError),
}

/// What the loop does after a command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Exit,
}

enum Event {
    Line(io::Result<Option<String>>),
    Interrupt(Interrupt),
}

pub struct Shell<N, W> {
    node: N,
    registry: EnvRegistry,
    catalog: Option<Catalog>,
    runner: Runner,
    root: PathBuf,
    out: W,
}

impl<N: NodeControl, W: Write> Shell<N, W> {
    /// `root` is the directory scripts are discovered in and run from
    pub fn new(node: N, registry: EnvRegistry, runner: Runner, root: impl Into<PathBuf>, out: W) -> Self {
        Self { node, registry, catalog: None, runner, root: root.into(), out }
    }

    pub fn registry(&self) -> &EnvRegistry {
        &self.registry
    }

    pub fn node(&self) -> &N {
        &self.node
    }

    pub fn output(&self) -> &W {
        &self.out
    }

    /// Read commands until a terminating condition, then stop the node.
    pub async fn run<R>(&mut self, input: R, interrupts: &mut Interrupts) -> Result<(), ShellError>
    where
        R: AsyncBufRead + Unpin,
    {
        let session = self.session(input, interrupts).await;
        let stopped = self.node.stop().await;
        session?;
        stopped?;
        writeln!(self.out, "Goodbye!")?;
        Ok(())
    }

    async fn session<R>(&mut self, input: R, interrupts: &mut Interrupts) -> Result<(), ShellError>
    where
        R: AsyncBufRead + Unpin,
    {
        writeln!(self.out, "crybro shell - type 'help' or 'exit'")?;
        let mut lines = input.lines();

        loop {
            write!(self.out, "{}", PROMPT)?;
            self.out.flush()?;

            let event = tokio::select! {
                line = lines.next_line() => Event::Line(line),
                interrupt = interrupts.recv() => Event::Interrupt(interrupt),
            };

            let line = match event {
                Event::Line(Ok(Some(line))) => line,
                Event::Line(Ok(None)) => {
                    writeln!(self.out)?;
                    tracing::debug!("End of input");
                    return Ok(());
                }
                Event::Line(Err(e)) => return Err(e.into()),
                Event::Interrupt(interrupt) => {
                    writeln!(self.out)?;
                    tracing::debug!("{:?} at prompt", interrupt);
                    return Ok(());
                }
            };

            if self.execute(&line, interrupts).await? == Flow::Exit {
                return Ok(());
            }
        }
    }

    /// Dispatch one command line
    pub async fn execute(&mut self, line: &str, interrupts: &mut Interrupts) -> Result<Flow, ShellError> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(Flow::Continue);
        }

        let (verb, rest) = match line.split_once(char::is_whitespace) {
            Some((verb, rest)) => (verb, rest.trim()),
            None => (line, ""),
        };

        match verb.to_ascii_lowercase().as_str() {
            "exit" | "quit" | "q" => return Ok(Flow::Exit),
            "help" | "?" => self.help()?,
            "list" | "ls" => self.list()?,
            "env" => self.env(rest)?,
            "run" => return self.run_script(rest, interrupts).await,
            _ => writeln!(self.out, "Unknown command: {}. Type 'help'.", verb)?,
        }
        Ok(Flow::Continue)
    }

    fn help(&mut self) -> io::Result<()> {
        writeln!(self.out, "Commands:")?;
        writeln!(self.out, "  list, ls              - List scripts")?;
        writeln!(self.out, "  run <index|name|path> - Run a script")?;
        writeln!(self.out, "  env                   - Show environment")?;
        writeln!(self.out, "  env add NAME=VALUE    - Set a variable")?;
        writeln!(self.out, "  help, ?               - This help")?;
        writeln!(self.out, "  exit, quit, q         - Stop the node and exit")
    }

    fn list(&mut self) -> io::Result<()> {
        match scripts::discover(&self.root) {
            Ok(catalog) => {
                write!(self.out, "{}", render_catalog(&catalog))?;
                self.catalog = Some(catalog);
                Ok(())
            }
            Err(e) => writeln!(self.out, "Error: {}", e),
        }
    }

    fn env(&mut self, args: &str) -> io::Result<()> {
        let (sub, rest) = match args.split_once(char::is_whitespace) {
            Some((sub, rest)) => (sub, rest.trim()),
            None => (args, ""),
        };

        match sub {
            "" => {
                if self.registry.is_empty() {
                    writeln!(self.out, "(no variables set)")
                } else {
                    writeln!(self.out, "{}", self.registry.format_masked())
                }
            }
            "add" if !rest.is_empty() => match self.registry.parse_assignment(rest) {
                Ok((name, value)) => writeln!(self.out, "Set {}={}", name, value),
                Err(e) => writeln!(self.out, "Error: {}", e),
            },
            _ => writeln!(self.out, "Usage: env | env add NAME=VALUE"),
        }
    }

    async fn run_script(&mut self, reference: &str, interrupts: &mut Interrupts) -> Result<Flow, ShellError> {
        if reference.is_empty() {
            writeln!(self.out, "Usage: run <index|name|path>")?;
            return Ok(Flow::Continue);
        }

        let catalog = match self.catalog.take() {
            Some(catalog) => catalog,
            None => match scripts::discover(&self.root) {
                Ok(catalog) => catalog,
                Err(e) => {
                    writeln!(self.out, "Error: {}", e)?;
                    return Ok(Flow::Continue);
                }
            },
        };
        let resolved = catalog.resolve(reference);
        self.catalog = Some(catalog);

        let entry = match resolved {
            Ok(entry) => entry,
            Err(e) => {
                writeln!(self.out, "Error: {}", e)?;
                return Ok(Flow::Continue);
            }
        };

        if self.node.credentials().is_some() && !self.node.is_running() {
            writeln!(self.out, "Warning: the node is no longer running")?;
        }

        let invocation = match self.runner.plan(&entry, &self.registry) {
            Ok(invocation) => invocation,
            Err(e) => {
                writeln!(self.out, "Error: {}", e)?;
                return Ok(Flow::Continue);
            }
        };

        writeln!(self.out, "Running: {}", entry.display_path())?;
        self.out.flush()?;

        match self.runner.run(&invocation, interrupts).await {
            Ok(outcome) => {
                match outcome.code {
                    Some(0) => writeln!(self.out, "Done.")?,
                    Some(code) => writeln!(self.out, "Exited with code {}", code)?,
                    None => writeln!(self.out, "Terminated by signal")?,
                }
                if outcome.interrupt == Some(Interrupt::Terminate) {
                    return Ok(Flow::Exit);
                }
            }
            Err(e) => writeln!(self.out, "Error: {}", e)?,
        }
        Ok(Flow::Continue)
    }
}

/// `idx  path  type  size` table, or a hint when nothing was found
pub fn render_catalog(catalog: &Catalog) -> String {
    if catalog.is_empty() {
        return format!(
            "No scripts found in {}\nLooking for: {}\n",
            catalog.root().display(),
            crate::core::paths::scripts::EXTENSIONS
                .iter()
                .map(|e| format!(".{}", e))
                .collect::<Vec<_>>()
                .join(", ")
        );
    }

    let width = catalog
        .entries()
        .iter()
        .map(|e| e.display_path().len())
        .max()
        .unwrap_or(0)
        .max("Path".len());

    let mut table = format!("{:>3}  {:<width$}  {:<10}  {}\n", "#", "Path", "Type", "Size", width = width);
    for entry in catalog.entries() {
        table.push_str(&format!(
            "{:>3}  {:<width$}  {:<10}  {}\n",
            entry.index,
            entry.display_path(),
            entry.kind.as_str(),
            format_size(entry.size),
            width = width
        ));
    }
    table.push_str(&format!("({} scripts)\n", catalog.len()));
    table
}

fn format_size(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    }
}
