use clap::{Parser, Subcommand};

mod commands;

use commands::{CliError, run_agents, run_query, run_serve, run_specialist};

#[derive(Parser, Debug)]
#[command(name = "concierge", version)]
#[command(about = "Concierge - routes free-text requests to specialist agents")]
struct Cli {
    /// Human-readable logs instead of JSON
    #[arg(long, global = true)]
    pretty: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the coordinator HTTP service
    Serve {
        /// Listen address (overrides CONCIERGE_BIND_ADDR)
        #[arg(long)]
        bind: Option<String>,
        /// Do not serve the built-in specialists on the same port
        #[arg(long)]
        no_specialists: bool,
    },
    /// Serve one specialist over HTTP for remote transport
    Specialist {
        /// Registered specialist id
        #[arg(long)]
        id: String,
        /// Listen address (default: the port of the registered endpoint)
        #[arg(long)]
        bind: Option<String>,
    },
    /// Answer one request and exit
    Query {
        /// Free-text request
        text: String,
        /// Print the full outcome as JSON
        #[arg(long)]
        json: bool,
        /// Print the coordination trail after the answer
        #[arg(long)]
        trail: bool,
    },
    /// List registered specialists
    Agents {
        /// Print registry entries as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.pretty);

    let result: Result<(), CliError> = match cli.command {
        Commands::Serve {
            bind,
            no_specialists,
        } => run_serve(bind, !no_specialists).await,
        Commands::Specialist { id, bind } => run_specialist(&id, bind).await,
        Commands::Query { text, json, trail } => run_query(&text, json, trail).await,
        Commands::Agents { json } => run_agents(json),
    };

    if let Err(e) = result {
        tracing::error!(error = %e, code = e.code(), "Command failed");
        eprintln!("Error: {e}");
        std::process::exit(e.exit_code());
    }
}

/// Logs go to stderr so query answers stay alone on stdout.
fn init_logging(pretty: bool) {
    let env_filter = tracing_subscriber::EnvFilter::from_default_env();
    let env_filter = match "info".parse() {
        Ok(directive) => env_filter.add_directive(directive),
        Err(_) => env_filter,
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr);
    let _ = if pretty {
        builder.try_init()
    } else {
        builder.json().try_init()
    };
}
