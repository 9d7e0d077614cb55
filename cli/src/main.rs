use clap::{Parser, Subcommand};

mod commands;
mod util;

#[derive(Parser)]
#[command(name = "careline", version, about = "Careline CLI for the health-advisory API")]
struct Cli {
    /// API base URL
    #[arg(long, env = "CARELINE_API_URL", default_value = "http://localhost:3000")]
    api_url: String,

    /// Skip pretty-printing (raw JSON for piping)
    #[arg(long, global = true)]
    raw: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check that the API can reach its generative backend
    Health,
    /// Ask a health question
    Ask(commands::ask::AskArgs),
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let code = match cli.command {
        Commands::Health => commands::health::run(&cli.api_url, cli.raw).await,
        Commands::Ask(args) => commands::ask::run(&cli.api_url, args, cli.raw).await,
    };
    std::process::exit(code);
}
