use clap::Args;
use serde_json::json;

use crate::util::{api_request, exit_error, print_json};

/// Which person a command targets: a precomputed id or a platform identity.
#[derive(Args)]
pub struct PersonArgs {
    /// Person id (hex SHA-256 of "{platform}_{user_id}")
    #[arg(long, conflicts_with_all = ["platform", "user_id"])]
    pub person_id: Option<String>,
    /// Chat platform name (e.g. "qq", "discord")
    #[arg(long, requires = "user_id")]
    pub platform: Option<String>,
    /// User id on that platform
    #[arg(long, requires = "platform")]
    pub user_id: Option<String>,
}

impl PersonArgs {
    pub fn resolve(&self) -> String {
        match (&self.person_id, &self.platform, &self.user_id) {
            (Some(id), _, _) if !id.trim().is_empty() => id.trim().to_string(),
            (_, Some(platform), Some(user_id)) => affinity_core::person_id(platform, user_id),
            _ => exit_error(
                "A person is required",
                Some("Pass --person-id, or --platform together with --user-id"),
            ),
        }
    }
}

/// Print the person id for a platform identity (computed locally).
pub fn print_person_id(platform: &str, user_id: &str) -> i32 {
    print_json(
        &json!({
            "platform": platform,
            "user_id": user_id,
            "person_id": affinity_core::person_id(platform, user_id),
        }),
        false,
        false,
    );
    0
}

pub async fn show(api_url: &str, person: &PersonArgs) -> i32 {
    let person_id = person.resolve();
    api_request(
        api_url,
        reqwest::Method::GET,
        &format!("/v1/persons/{person_id}/favorability"),
        None,
        None,
        &[],
        false,
    )
    .await
}

pub async fn tone(
    api_url: &str,
    person: &PersonArgs,
    display_name: Option<&str>,
    last_text: &str,
    prompt: Option<&str>,
) -> i32 {
    let person_id = person.resolve();
    let mut body = json!({ "last_text": last_text });
    if let Some(name) = display_name {
        body["display_name"] = json!(name);
    }
    if let Some(p) = prompt {
        body["prompt"] = json!(p);
    }
    api_request(
        api_url,
        reqwest::Method::POST,
        &format!("/v1/persons/{person_id}/tone"),
        None,
        Some(body),
        &[],
        false,
    )
    .await
}
