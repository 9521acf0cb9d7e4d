//! codebench CLI - Command line interface for the workspace daemon

use clap::{Parser, Subcommand};
use codebench_core::config::default_socket_path;
use codebench_core::protocol::{Request, Response};
use codebench_core::{
    ExecutionRequest, ExecutionResult, FileNode, InstallRequest, ProcessRunner, WorkspaceConfig,
    WorkspaceRoot,
};
use std::io::{Read, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

mod client;

use client::Client;

#[derive(Parser)]
#[command(name = "codebench")]
#[command(author, version, about = "Workspace file and code execution client")]
struct Cli {
    /// Socket path (defaults to CODEBENCH_SOCKET env var or /run/codebench/codebench.sock)
    #[arg(short, long, global = true)]
    socket: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the workspace tree
    Tree,

    /// Print a workspace file
    Cat { path: String },

    /// Write a workspace file from a local file or stdin
    Write {
        path: String,

        /// Local file to read content from (stdin if omitted)
        #[arg(short, long)]
        from: Option<PathBuf>,
    },

    /// Delete a workspace file or directory
    Rm { path: String },

    /// Create a workspace directory
    Mkdir { path: String },

    /// Upload local files to the workspace root
    Upload {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Install packages into the workspace environment
    Install {
        #[arg(required = true)]
        packages: Vec<String>,

        /// Package ecosystem
        #[arg(short, long, default_value = "python")]
        ecosystem: String,

        /// Print the raw result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Execute code via the daemon
    Exec {
        /// Code to execute (or - for stdin)
        code: String,

        /// Language of the code
        #[arg(short, long, default_value = "python")]
        language: String,

        /// Save the code to this workspace path before running it
        #[arg(long)]
        target: Option<String>,

        /// Timeout in seconds
        #[arg(short, long)]
        timeout: Option<u64>,

        /// Print the raw result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Run code directly (without daemon, for testing)
    Run {
        /// Code to execute (or - for stdin)
        code: String,

        /// Language of the code
        #[arg(short, long, default_value = "python")]
        language: String,

        /// Workspace root to run in
        #[arg(short, long)]
        workspace: Option<PathBuf>,

        /// Timeout in seconds
        #[arg(short, long, default_value = "30")]
        timeout: u64,
    },

    /// Ping the daemon
    Ping,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("codebench=warn".parse()?),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let socket = cli.socket.unwrap_or_else(default_socket_path);

    let result = match cli.command {
        Commands::Run {
            code,
            language,
            workspace,
            timeout,
        } => {
            let mut builder = WorkspaceConfig::builder().exec_timeout_secs(timeout);
            if let Some(root) = workspace {
                builder = builder.root(root);
            }
            let config = builder.build();
            let root = Arc::new(WorkspaceRoot::new(&config.root)?);
            let runner = ProcessRunner::new(root, Arc::new(config));
            runner
                .execute(&ExecutionRequest::new(language, read_code(code)?))
                .await?
        }

        Commands::Exec {
            code,
            language,
            target,
            timeout,
            json,
        } => {
            let request = ExecutionRequest {
                source_code: read_code(code)?,
                language,
                target_path: target,
                timeout: timeout.map(Duration::from_secs),
            };
            let result = expect_execution(call(&socket, Request::Execute(request)).await?)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
                return Ok(());
            }
            result
        }

        Commands::Install {
            packages,
            ecosystem,
            json,
        } => {
            let request = InstallRequest {
                packages,
                ecosystem,
            };
            let result = expect_execution(call(&socket, Request::Install(request)).await?)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
                return Ok(());
            }
            result
        }

        Commands::Tree => {
            let Response::Tree { nodes } = call(&socket, Request::Tree).await? else {
                return Err(unexpected("tree"));
            };
            let mut out = String::new();
            render_tree(&nodes, 0, &mut out);
            print!("{out}");
            return Ok(());
        }

        Commands::Cat { path } => {
            let Response::File { content } = call(&socket, Request::ReadFile { path }).await?
            else {
                return Err(unexpected("file contents"));
            };
            std::io::stdout().write_all(&content)?;
            return Ok(());
        }

        Commands::Write { path, from } => {
            let content = match from {
                Some(local) => std::fs::read(local)?,
                None => {
                    let mut buf = Vec::new();
                    std::io::stdin().read_to_end(&mut buf)?;
                    buf
                }
            };
            expect_ok(call(&socket, Request::WriteFile { path, content }).await?)?;
            return Ok(());
        }

        Commands::Rm { path } => {
            expect_ok(call(&socket, Request::DeleteFile { path }).await?)?;
            return Ok(());
        }

        Commands::Mkdir { path } => {
            expect_ok(call(&socket, Request::MakeDirectory { path }).await?)?;
            return Ok(());
        }

        Commands::Upload { files } => {
            let mut payload = Vec::with_capacity(files.len());
            for local in files {
                let name = local
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                payload.push((name, std::fs::read(&local)?));
            }
            let Response::Uploaded { files } =
                call(&socket, Request::Upload { files: payload }).await?
            else {
                return Err(unexpected("stored file names"));
            };
            for name in files {
                println!("{name}");
            }
            return Ok(());
        }

        Commands::Ping => {
            let Response::Pong = call(&socket, Request::Ping).await? else {
                return Err(unexpected("pong"));
            };
            println!("pong");
            return Ok(());
        }
    };

    print_result(&result);
    Ok(())
}

async fn call(socket: &std::path::Path, request: Request) -> codebench_core::Result<Response> {
    let mut client = Client::connect(socket).await?;
    client.call(&request).await
}

fn expect_execution(response: Response) -> Result<ExecutionResult, Box<dyn std::error::Error>> {
    match response {
        Response::Execution(result) => Ok(result),
        _ => Err(unexpected("an execution result")),
    }
}

fn expect_ok(response: Response) -> Result<(), Box<dyn std::error::Error>> {
    match response {
        Response::Ok => Ok(()),
        _ => Err(unexpected("an acknowledgement")),
    }
}

fn unexpected(wanted: &str) -> Box<dyn std::error::Error> {
    format!("unexpected response from daemon, expected {wanted}").into()
}

/// `-` reads the code from stdin
fn read_code(code: String) -> std::io::Result<String> {
    if code == "-" {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf)?;
        Ok(buf)
    } else {
        Ok(code)
    }
}

fn print_result(result: &ExecutionResult) {
    print!("{}", result.combined_output);
    if !result.combined_output.ends_with('\n') && !result.combined_output.is_empty() {
        println!();
    }
    if result.timed_out {
        eprintln!("timed out after {:?}", result.duration);
    }
}

fn render_tree(nodes: &[FileNode], depth: usize, out: &mut String) {
    for node in nodes {
        out.push_str(&"  ".repeat(depth));
        out.push_str(&node.name);
        if node.is_dir() {
            out.push('/');
        }
        out.push('\n');
        render_tree(&node.children, depth + 1, out);
    }
}
