use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::band::Band;
use crate::classifier::{ClassificationOutcome, EventPhase, SignalInput};
use crate::identity::person_id;
use crate::rate_limit::SuppressReason;

/// One observed message, already attributed to a person.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignalEvent {
    pub person_id: String,
    /// Nickname for logs and tone directives; not used for scoring
    pub display_name: Option<String>,
    pub text: String,
    pub reasoning: Option<String>,
    pub planner_reasoning: Option<String>,
    pub phase: EventPhase,
}

impl SignalEvent {
    pub fn new(person_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            person_id: person_id.into(),
            display_name: None,
            text: text.into(),
            reasoning: None,
            planner_reasoning: None,
            phase: EventPhase::PostResponse,
        }
    }

    pub fn with_reasoning(mut self, reasoning: impl Into<String>) -> Self {
        self.reasoning = Some(reasoning.into());
        self
    }

    pub fn with_planner_reasoning(mut self, reasoning: impl Into<String>) -> Self {
        self.planner_reasoning = Some(reasoning.into());
        self
    }

    pub fn with_phase(mut self, phase: EventPhase) -> Self {
        self.phase = phase;
        self
    }

    pub fn input(&self) -> SignalInput<'_> {
        SignalInput {
            text: &self.text,
            reasoning: self.reasoning.as_deref(),
            planner_reasoning: self.planner_reasoning.as_deref(),
            phase: self.phase,
        }
    }
}

/// Request to ingest one message event.
/// Identify the person either by `person_id` or by `platform` + `user_id`.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct IngestEventRequest {
    #[serde(default)]
    pub person_id: Option<String>,
    #[serde(default)]
    pub platform: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    /// Raw message text as the user sent it
    pub text: String,
    /// The agent's reasoning about the message
    #[serde(default)]
    pub reasoning: Option<String>,
    /// The planner's reasoning about the message
    #[serde(default)]
    pub planner_reasoning: Option<String>,
    #[serde(default)]
    pub phase: EventPhase,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("event must carry person_id or both platform and user_id (missing {field})")]
pub struct MissingIdentity {
    pub field: &'static str,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl IngestEventRequest {
    pub fn into_signal_event(self) -> Result<SignalEvent, MissingIdentity> {
        let person_id = match non_blank(self.person_id) {
            Some(id) => id.trim().to_string(),
            None => {
                let platform =
                    non_blank(self.platform).ok_or(MissingIdentity { field: "platform" })?;
                let user_id = non_blank(self.user_id).ok_or(MissingIdentity { field: "user_id" })?;
                person_id(platform.trim(), user_id.trim())
            }
        };
        Ok(SignalEvent {
            person_id,
            display_name: non_blank(self.display_name),
            text: self.text,
            reasoning: self.reasoning,
            planner_reasoning: self.planner_reasoning,
            phase: self.phase,
        })
    }
}

/// What processing one event did to the person's score.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Effect {
    Applied {
        delta: i32,
        previous: i32,
        score: i32,
        band: Band,
        /// Harassment escalation replaced the tier delta
        escalated: bool,
    },
    Suppressed {
        reason: SuppressReason,
    },
    /// Nothing in the event is scored
    Ignored,
    /// The engine is switched off
    Disabled,
    /// Scoring was allowed but the store could not be read or written
    StoreUnavailable,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct EventReport {
    pub person_id: String,
    pub outcome: ClassificationOutcome,
    pub effect: Effect,
}
