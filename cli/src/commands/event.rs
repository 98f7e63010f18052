use affinity_core::{EventPhase, FavorabilityConfig, SignalInput, classify};
use clap::{Subcommand, ValueEnum};
use serde_json::json;

use crate::commands::person::PersonArgs;
use crate::util::{api_request, exit_error, print_json, read_text};

#[derive(Clone, Copy, ValueEnum)]
pub enum PhaseArg {
    /// Only the user's message is known (severe abuse only)
    Pre,
    /// After the reply was generated; the full rule set
    Post,
}

impl From<PhaseArg> for EventPhase {
    fn from(phase: PhaseArg) -> Self {
        match phase {
            PhaseArg::Pre => EventPhase::PreResponse,
            PhaseArg::Post => EventPhase::PostResponse,
        }
    }
}

#[derive(Subcommand)]
pub enum EventCommands {
    /// Send one message to the API for scoring
    Send {
        #[command(flatten)]
        person: PersonArgs,
        /// Message text
        #[arg(long, required_unless_present = "text_file")]
        text: Option<String>,
        /// Read the message from a file (use '-' for stdin)
        #[arg(long, short = 'f', conflicts_with = "text")]
        text_file: Option<String>,
        /// Display name of the sender
        #[arg(long)]
        display_name: Option<String>,
        /// Reasoning produced while generating the reply
        #[arg(long)]
        reasoning: Option<String>,
        /// Reasoning from the planning step
        #[arg(long)]
        planner_reasoning: Option<String>,
        #[arg(long, value_enum, default_value = "post")]
        phase: PhaseArg,
    },
    /// Classify a message locally, without touching any score
    Classify {
        /// Message text
        text: String,
        #[arg(long)]
        reasoning: Option<String>,
        #[arg(long)]
        planner_reasoning: Option<String>,
        #[arg(long, value_enum, default_value = "post")]
        phase: PhaseArg,
    },
}

pub async fn run(api_url: &str, command: EventCommands) -> i32 {
    match command {
        EventCommands::Send {
            person,
            text,
            text_file,
            display_name,
            reasoning,
            planner_reasoning,
            phase,
        } => {
            let text = match (text, text_file) {
                (Some(t), _) => t,
                (None, Some(path)) => read_text(&path).unwrap_or_else(|e| exit_error(&e, None)),
                (None, None) => exit_error("Either --text or --text-file is required", None),
            };
            let body = json!({
                "person_id": person.resolve(),
                "display_name": display_name,
                "text": text,
                "reasoning": reasoning,
                "planner_reasoning": planner_reasoning,
                "phase": EventPhase::from(phase),
            });
            api_request(
                api_url,
                reqwest::Method::POST,
                "/v1/events",
                None,
                Some(body),
                &[],
                false,
            )
            .await
        }
        EventCommands::Classify {
            text,
            reasoning,
            planner_reasoning,
            phase,
        } => classify_locally(
            &text,
            reasoning.as_deref(),
            planner_reasoning.as_deref(),
            phase.into(),
        ),
    }
}

/// Uses the same configuration sources as the server (AFFINITY_* env, config file).
fn classify_locally(
    text: &str,
    reasoning: Option<&str>,
    planner_reasoning: Option<&str>,
    phase: EventPhase,
) -> i32 {
    let config = FavorabilityConfig::load();
    let input = SignalInput {
        text,
        reasoning,
        planner_reasoning,
        phase,
    };
    let outcome = classify(&input, &config);
    let base_delta = outcome.base_delta(&config);
    print_json(
        &json!({
            "outcome": outcome,
            "base_delta": base_delta,
        }),
        false,
        false,
    );
    0
}
