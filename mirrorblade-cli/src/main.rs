//! MirrorBlade CLI - command-line interface to the sidecar.
//!
//! `serve` runs the sidecar in the foreground; the other commands act as
//! RPC clients against a running instance over the same local endpoint.

mod commands;
mod error;

use clap::{Parser, Subcommand};
use commands::{call, config, diag, init, serve};
use error::CliError;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "mirrorblade")]
#[command(version = mirrorblade::VERSION)]
#[command(about = "Local control-plane sidecar", long_about = None)]
struct Cli {
    /// Host root directory (config lives at <root>/r6/config/)
    #[arg(long, global = true, default_value = ".")]
    root: PathBuf,

    /// Override the endpoint pipe name (default: from config)
    #[arg(long, global = true)]
    pipe: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the default configuration file
    Init,

    /// Run the sidecar in the foreground
    Serve {
        /// Worker thread count (default: available parallelism)
        #[arg(long)]
        workers: Option<usize>,

        /// Discard queued tasks on shutdown instead of draining
        #[arg(long)]
        no_drain: bool,

        /// Skip the onLoad boot script
        #[arg(long)]
        no_boot: bool,
    },

    /// Send one operation to a running sidecar
    Call {
        /// Operation name, e.g. `ping` or `traffic.mul`
        #[arg(long)]
        op: String,

        /// Arguments as a JSON object, e.g. `{"mult": 2.0}`
        #[arg(long)]
        args: Option<String>,

        /// Correlation id echoed in the reply
        #[arg(long)]
        id: Option<String>,
    },

    /// Inspect or mutate configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Fetch the diagnostic snapshot from a running sidecar
    Diag,
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the config file path
    Path,
    /// Print the on-disk configuration
    Show,
    /// Read one live value from a running sidecar
    Get { key: String },
    /// Write one value through a running sidecar and persist it
    Set { key: String, value: String },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let pipe = cli.pipe.as_deref();

    let result: Result<(), CliError> = match cli.command {
        Commands::Init => init::run(&cli.root),
        Commands::Serve {
            workers,
            no_drain,
            no_boot,
        } => {
            serve::run(serve::ServeArgs {
                root: &cli.root,
                workers,
                no_drain,
                no_boot,
            })
            .await
        }
        Commands::Call { op, args, id } => {
            call::run(call::CallArgs {
                root: &cli.root,
                pipe,
                op: &op,
                args_json: args.as_deref(),
                id: id.as_deref(),
            })
            .await
        }
        Commands::Config { action } => match action {
            ConfigAction::Path => config::path(&cli.root),
            ConfigAction::Show => config::show(&cli.root),
            ConfigAction::Get { key } => config::get(&cli.root, pipe, &key).await,
            ConfigAction::Set { key, value } => config::set(&cli.root, pipe, &key, &value).await,
        },
        Commands::Diag => diag::run(&cli.root, pipe).await,
    };

    if let Err(e) = result {
        e.exit();
    }
}
