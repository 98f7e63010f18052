use clap::Subcommand;
use serde_json::json;

use crate::commands::person::PersonArgs;
use crate::util::{
    api_request, config_path, exit_error, load_config, resolve_admin_token, save_config,
};

#[derive(Subcommand)]
pub enum AdminCommands {
    /// Store the admin token (and optionally the API URL) in the CLI config
    Login {
        /// Admin bearer token (the server's AFFINITY_ADMIN_TOKEN)
        #[arg(long)]
        token: String,
        /// Remember this API URL as the default
        #[arg(long)]
        remember_url: bool,
    },
    /// List all stored persons, highest score first
    List {
        /// Skip pretty-printing (raw JSON for piping)
        #[arg(long)]
        raw: bool,
    },
    /// Persons whose id contains a fragment (case-insensitive)
    Search {
        fragment: String,
        #[arg(long)]
        raw: bool,
    },
    /// Overwrite a person's score (clamped to [-50, 150])
    Set {
        #[command(flatten)]
        person: PersonArgs,
        #[arg(long, allow_negative_numbers = true)]
        score: i64,
    },
    /// Band distribution and average score
    Stats,
}

pub async fn run(api_url: &str, command: AdminCommands) -> i32 {
    match command {
        AdminCommands::Login {
            token,
            remember_url,
        } => login(api_url, &token, remember_url),
        other => run_authenticated(api_url, other).await,
    }
}

async fn run_authenticated(api_url: &str, command: AdminCommands) -> i32 {
    let token = resolve_admin_token().unwrap_or_else(|e| {
        exit_error(
            &e,
            Some("The token must match AFFINITY_ADMIN_TOKEN on the server"),
        )
    });

    match command {
        AdminCommands::List { raw } => list(api_url, &token, &[], raw).await,
        AdminCommands::Search { fragment, raw } => {
            list(api_url, &token, &[("search".to_string(), fragment)], raw).await
        }
        AdminCommands::Set { person, score } => {
            let person_id = person.resolve();
            api_request(
                api_url,
                reqwest::Method::PUT,
                &format!("/v1/admin/favorability/{person_id}"),
                Some(&token),
                Some(json!({ "score": score })),
                &[],
                false,
            )
            .await
        }
        AdminCommands::Stats => {
            api_request(
                api_url,
                reqwest::Method::GET,
                "/v1/admin/favorability/stats",
                Some(&token),
                None,
                &[],
                false,
            )
            .await
        }
        AdminCommands::Login { .. } => 4,
    }
}

async fn list(api_url: &str, token: &str, query: &[(String, String)], raw: bool) -> i32 {
    api_request(
        api_url,
        reqwest::Method::GET,
        "/v1/admin/favorability",
        Some(token),
        None,
        query,
        raw,
    )
    .await
}

fn login(api_url: &str, token: &str, remember_url: bool) -> i32 {
    let token = token.trim();
    if token.is_empty() {
        exit_error("--token must not be empty", None);
    }

    let mut config = load_config().unwrap_or_default();
    config.admin_token = Some(token.to_string());
    if remember_url {
        config.api_url = Some(api_url.to_string());
    }

    if let Err(e) = save_config(&config) {
        exit_error(&format!("Failed to save config: {e}"), None);
    }

    println!(
        "{}",
        json!({
            "status": "saved",
            "path": config_path().display().to_string(),
        })
    );
    0
}
