use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod util;

use commands::admin::AdminCommands;
use commands::event::EventCommands;
use commands::person::PersonArgs;

const DEFAULT_API_URL: &str = "http://localhost:3000";

#[derive(Parser)]
#[command(
    name = "affinity",
    version,
    about = "Affinity CLI: inspect and adjust per-person favorability"
)]
struct Cli {
    /// API base URL (falls back to the stored config, then http://localhost:3000)
    #[arg(long, env = "AFFINITY_API_URL")]
    api_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check API health
    Health,
    /// Compute a person id from a platform identity (offline)
    PersonId {
        platform: String,
        user_id: String,
    },
    /// Show a person's favorability
    Show {
        #[command(flatten)]
        person: PersonArgs,
    },
    /// Render the tone directive for a person's next reply
    Tone {
        #[command(flatten)]
        person: PersonArgs,
        #[arg(long)]
        display_name: Option<String>,
        /// The person's latest message
        #[arg(long, default_value = "")]
        last_text: String,
        /// Prompt to append the directive to
        #[arg(long)]
        prompt: Option<String>,
    },
    /// Send or classify messages
    Event {
        #[command(subcommand)]
        command: EventCommands,
    },
    /// Admin operations (require an admin token)
    Admin {
        #[command(subcommand)]
        command: AdminCommands,
    },
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();

    // Diagnostics go to stderr; stdout stays pure JSON
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("AFFINITY_LOG").unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let api_url = cli
        .api_url
        .or_else(util::stored_api_url)
        .unwrap_or_else(|| DEFAULT_API_URL.to_string());
    let api_url = api_url.trim_end_matches('/');

    let code = match cli.command {
        Commands::Health => commands::health::run(api_url).await,
        Commands::PersonId { platform, user_id } => {
            commands::person::print_person_id(&platform, &user_id)
        }
        Commands::Show { person } => commands::person::show(api_url, &person).await,
        Commands::Tone {
            person,
            display_name,
            last_text,
            prompt,
        } => {
            commands::person::tone(
                api_url,
                &person,
                display_name.as_deref(),
                &last_text,
                prompt.as_deref(),
            )
            .await
        }
        Commands::Event { command } => commands::event::run(api_url, command).await,
        Commands::Admin { command } => commands::admin::run(api_url, command).await,
    };

    std::process::exit(code);
}
