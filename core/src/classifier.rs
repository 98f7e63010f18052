//! Signal classification: one message (plus the agent's reasoning about it)
//! becomes exactly one [`ClassificationOutcome`].
//!
//! Rules are evaluated in a fixed order and the first rule that produces an
//! outcome wins. Rules never look at score or rate state.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::config::FavorabilityConfig;
use crate::keywords::{
    AFFECTIONATE_KEYWORDS, MILD_NEGATIVE_KEYWORDS, NEGATIVE_KEYWORDS, NOT_TALKING_TO_ME_KEYWORDS,
    POSITIVE_KEYWORDS, REASONING_BEHAVIOR_LABELS, REASONING_HEDGE_KEYWORDS,
    REASONING_OTHERS_TARGET, REASONING_POSITIVE_LABELS, SEVERE_KEYWORDS,
    SOFTEN_NEGATIVE_KEYWORDS, contains_any, first_match,
};

/// Misbehavior named in the agent's reasoning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Behavior {
    Insult,
    Harassment,
    Threat,
    Rude,
}

impl Behavior {
    pub fn as_str(self) -> &'static str {
        match self {
            Behavior::Insult => "insult",
            Behavior::Harassment => "harassment",
            Behavior::Threat => "threat",
            Behavior::Rude => "rude",
        }
    }

    /// Behaviors that still count when aimed at someone other than the agent.
    pub fn targets_others(self) -> bool {
        matches!(
            self,
            Behavior::Insult | Behavior::Harassment | Behavior::Threat
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum PositiveTier {
    High,
    Mid,
    Low,
}

impl PositiveTier {
    pub fn as_str(self) -> &'static str {
        match self {
            PositiveTier::High => "high",
            PositiveTier::Mid => "mid",
            PositiveTier::Low => "low",
        }
    }
}

/// When in the conversation the event was observed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum EventPhase {
    /// The user's message just arrived; the agent has not answered yet.
    PreResponse,
    /// The agent has produced its reply, so its reasoning is available.
    #[default]
    PostResponse,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SignalInput<'a> {
    pub text: &'a str,
    pub reasoning: Option<&'a str>,
    pub planner_reasoning: Option<&'a str>,
    pub phase: EventPhase,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ClassificationOutcome {
    NotAddressedToAgent,
    ReasoningNegative {
        behavior: Behavior,
        hedged: bool,
        third_party: bool,
    },
    ReasoningPositive {
        tier: PositiveTier,
    },
    SevereNegative {
        keyword: String,
    },
    MildNegative {
        keyword: String,
    },
    OrdinaryNegative {
        keyword: String,
        softened: bool,
    },
    Affectionate {
        keyword: String,
    },
    Positive {
        keyword: String,
        long_content: bool,
    },
    NormalInteraction,
    NoSignal,
}

/// Sign family used for cooldown gating.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Family {
    Positive,
    Negative,
    Normal,
    /// Outcomes that never touch the score.
    None,
}

impl ClassificationOutcome {
    pub fn kind(&self) -> &'static str {
        match self {
            ClassificationOutcome::NotAddressedToAgent => "not_addressed_to_agent",
            ClassificationOutcome::ReasoningNegative { .. } => "reasoning_negative",
            ClassificationOutcome::ReasoningPositive { .. } => "reasoning_positive",
            ClassificationOutcome::SevereNegative { .. } => "severe_negative",
            ClassificationOutcome::MildNegative { .. } => "mild_negative",
            ClassificationOutcome::OrdinaryNegative { .. } => "ordinary_negative",
            ClassificationOutcome::Affectionate { .. } => "affectionate",
            ClassificationOutcome::Positive { .. } => "positive",
            ClassificationOutcome::NormalInteraction => "normal_interaction",
            ClassificationOutcome::NoSignal => "no_signal",
        }
    }

    pub fn family(&self) -> Family {
        match self {
            ClassificationOutcome::ReasoningNegative { hedged: true, .. } => Family::None,
            ClassificationOutcome::ReasoningNegative { .. }
            | ClassificationOutcome::SevereNegative { .. }
            | ClassificationOutcome::MildNegative { .. }
            | ClassificationOutcome::OrdinaryNegative { .. } => Family::Negative,
            ClassificationOutcome::ReasoningPositive { .. }
            | ClassificationOutcome::Affectionate { .. }
            | ClassificationOutcome::Positive { .. } => Family::Positive,
            ClassificationOutcome::NormalInteraction => Family::Normal,
            ClassificationOutcome::NotAddressedToAgent | ClassificationOutcome::NoSignal => {
                Family::None
            }
        }
    }

    /// Whether this outcome feeds the harassment window.
    pub fn counts_toward_harassment(&self) -> bool {
        matches!(
            self,
            ClassificationOutcome::SevereNegative { .. }
                | ClassificationOutcome::OrdinaryNegative { .. }
        )
    }

    pub fn keyword(&self) -> Option<&str> {
        match self {
            ClassificationOutcome::SevereNegative { keyword }
            | ClassificationOutcome::MildNegative { keyword }
            | ClassificationOutcome::OrdinaryNegative { keyword, .. }
            | ClassificationOutcome::Affectionate { keyword }
            | ClassificationOutcome::Positive { keyword, .. } => Some(keyword.as_str()),
            _ => None,
        }
    }

    /// Unescalated score change for this outcome. `None` when the outcome is
    /// never scored; `Some(0)` means scoring is disabled for the tier.
    pub fn base_delta(&self, config: &FavorabilityConfig) -> Option<i32> {
        let delta = match self {
            ClassificationOutcome::ReasoningNegative { hedged: true, .. } => return None,
            ClassificationOutcome::ReasoningNegative {
                behavior: Behavior::Rude,
                ..
            } => config.mild_negative_delta,
            ClassificationOutcome::ReasoningNegative { .. } => config.negative_delta,
            ClassificationOutcome::ReasoningPositive { tier } => {
                let bonus = match tier {
                    PositiveTier::High => config.reasoning_positive_bonus_high,
                    PositiveTier::Mid => config.reasoning_positive_bonus_mid,
                    PositiveTier::Low => config.reasoning_positive_bonus_low,
                };
                config
                    .reasoning_positive_delta
                    .saturating_add(bonus)
                    .saturating_sub(1)
            }
            ClassificationOutcome::SevereNegative { .. } => config.severe_delta,
            ClassificationOutcome::MildNegative { .. } => config.mild_negative_delta,
            ClassificationOutcome::OrdinaryNegative { softened: true, .. } => {
                softened_delta(config.negative_delta)
            }
            ClassificationOutcome::OrdinaryNegative { .. } => config.negative_delta,
            ClassificationOutcome::Affectionate { .. } => config.affectionate_delta,
            ClassificationOutcome::Positive { long_content, .. } => {
                if *long_content {
                    config
                        .positive_delta
                        .saturating_add(config.positive_bonus_delta)
                } else {
                    config.positive_delta
                }
            }
            ClassificationOutcome::NormalInteraction => config.normal_delta,
            ClassificationOutcome::NotAddressedToAgent | ClassificationOutcome::NoSignal => {
                return None;
            }
        };
        Some(delta)
    }
}

/// Half of the ordinary penalty, truncated toward zero, never weaker than -1.
pub fn softened_delta(negative_delta: i32) -> i32 {
    (negative_delta / 2).min(-1)
}

static QUOTED_REPLY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\[(?:回复<[^>]*>\s*的消息[：:]|replying to <[^>]*>\s*:)[^\]]*\]")
        .expect("valid quoted reply regex")
});

/// Strip quoted-reply fragments so the quoted message is not scored twice.
pub fn sanitize_quoted_reply(text: &str) -> String {
    QUOTED_REPLY_RE.replace_all(text, "").trim().to_string()
}

/// Character count with every whitespace character removed.
pub fn visible_length(text: &str) -> usize {
    text.chars().filter(|c| !c.is_whitespace()).count()
}

/// One step of the classification pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rule {
    NotAddressedGuard,
    ReasoningLabels,
    Severe,
    MildNegative,
    OrdinaryNegative,
    Affectionate,
    Positive,
    NormalInteraction,
}

pub const POST_RESPONSE_RULES: &[Rule] = &[
    Rule::NotAddressedGuard,
    Rule::ReasoningLabels,
    Rule::Severe,
    Rule::MildNegative,
    Rule::OrdinaryNegative,
    Rule::Affectionate,
    Rule::Positive,
    Rule::NormalInteraction,
];

/// Before the agent answers only outright abuse is acted on.
pub const PRE_RESPONSE_RULES: &[Rule] = &[Rule::Severe];

pub fn rules_for(phase: EventPhase) -> &'static [Rule] {
    match phase {
        EventPhase::PreResponse => PRE_RESPONSE_RULES,
        EventPhase::PostResponse => POST_RESPONSE_RULES,
    }
}

/// Normalized view of one input shared by every rule.
struct Prepared {
    text: String,
    length: usize,
    reasoning: String,
}

impl Rule {
    fn evaluate(
        self,
        input: &Prepared,
        config: &FavorabilityConfig,
    ) -> Option<ClassificationOutcome> {
        match self {
            Rule::NotAddressedGuard => {
                if !config.skip_penalty_when_not_talking_to_me {
                    return None;
                }
                let marker = first_match(&input.reasoning, NOT_TALKING_TO_ME_KEYWORDS)?;
                if config.debug_log_reasoning_detection {
                    tracing::debug!(marker, "reasoning says the message was not for the agent");
                }
                let others_targeted = contains_any(&input.reasoning, REASONING_OTHERS_TARGET);
                match behavior_label(&input.reasoning) {
                    Some(behavior) if others_targeted && behavior.targets_others() => {
                        Some(ClassificationOutcome::ReasoningNegative {
                            behavior,
                            hedged: false,
                            third_party: true,
                        })
                    }
                    _ => Some(ClassificationOutcome::NotAddressedToAgent),
                }
            }
            Rule::ReasoningLabels => {
                if !config.reasoning_detection_enabled || input.reasoning.trim().is_empty() {
                    return None;
                }
                if let Some(behavior) = behavior_label(&input.reasoning) {
                    let hedged = contains_any(&input.reasoning, REASONING_HEDGE_KEYWORDS);
                    if config.debug_log_reasoning_detection {
                        tracing::debug!(
                            behavior = behavior.as_str(),
                            hedged,
                            "behavior label found in reasoning"
                        );
                    }
                    return Some(ClassificationOutcome::ReasoningNegative {
                        behavior,
                        hedged,
                        third_party: false,
                    });
                }
                let tier = REASONING_POSITIVE_LABELS
                    .iter()
                    .find(|(_, labels)| contains_any(&input.reasoning, labels))
                    .map(|(tier, _)| *tier)?;
                if config.debug_log_reasoning_detection {
                    tracing::debug!(tier = tier.as_str(), "positive label found in reasoning");
                }
                Some(ClassificationOutcome::ReasoningPositive { tier })
            }
            Rule::Severe => first_match(&input.text, SEVERE_KEYWORDS).map(|keyword| {
                ClassificationOutcome::SevereNegative {
                    keyword: keyword.to_string(),
                }
            }),
            Rule::MildNegative => first_match(&input.text, MILD_NEGATIVE_KEYWORDS).map(|keyword| {
                ClassificationOutcome::MildNegative {
                    keyword: keyword.to_string(),
                }
            }),
            Rule::OrdinaryNegative => first_match(&input.text, NEGATIVE_KEYWORDS).map(|keyword| {
                ClassificationOutcome::OrdinaryNegative {
                    keyword: keyword.to_string(),
                    softened: contains_any(&input.text, SOFTEN_NEGATIVE_KEYWORDS),
                }
            }),
            Rule::Affectionate => {
                let keyword = first_match(&input.text, AFFECTIONATE_KEYWORDS)?;
                if input.length < config.min_positive_length {
                    return Some(ClassificationOutcome::NoSignal);
                }
                Some(ClassificationOutcome::Affectionate {
                    keyword: keyword.to_string(),
                })
            }
            Rule::Positive => {
                let keyword = first_match(&input.text, POSITIVE_KEYWORDS)?;
                if input.length < config.min_positive_length {
                    return Some(ClassificationOutcome::NoSignal);
                }
                Some(ClassificationOutcome::Positive {
                    keyword: keyword.to_string(),
                    long_content: input.length >= config.min_positive_length.saturating_mul(3),
                })
            }
            Rule::NormalInteraction => {
                if input.length >= config.min_normal_length {
                    Some(ClassificationOutcome::NormalInteraction)
                } else {
                    Some(ClassificationOutcome::NoSignal)
                }
            }
        }
    }
}

fn behavior_label(reasoning: &str) -> Option<Behavior> {
    REASONING_BEHAVIOR_LABELS
        .iter()
        .find(|(_, labels)| contains_any(reasoning, labels))
        .map(|(behavior, _)| *behavior)
}

pub fn classify(input: &SignalInput<'_>, config: &FavorabilityConfig) -> ClassificationOutcome {
    let text = sanitize_quoted_reply(input.text);
    if text.is_empty() {
        return ClassificationOutcome::NoSignal;
    }
    let reasoning = format!(
        "{} {}",
        input.reasoning.unwrap_or_default(),
        input.planner_reasoning.unwrap_or_default()
    )
    .to_lowercase();
    let prepared = Prepared {
        length: visible_length(&text),
        text: text.to_lowercase(),
        reasoning,
    };

    rules_for(input.phase)
        .iter()
        .find_map(|rule| rule.evaluate(&prepared, config))
        .unwrap_or(ClassificationOutcome::NoSignal)
}
