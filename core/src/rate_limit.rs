//! Per-person cooldowns, harassment escalation and the daily normal-gain cap.
//!
//! State lives only in memory. Losing it (restart, sweep) relaxes limits for
//! a while and never affects stored scores.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use utoipa::ToSchema;

use crate::classifier::{ClassificationOutcome, EventPhase, Family};
use crate::config::FavorabilityConfig;

const PRE_RESPONSE_TAG_PREFIX: &str = "user_input:";

/// Why an otherwise scorable outcome did not change the score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SuppressReason {
    PositiveCooldown,
    NegativeCooldown,
    NormalCooldown,
    DailyLimit,
    /// The configured delta for this tier is zero.
    ScoringDisabled,
}

impl SuppressReason {
    pub fn as_str(self) -> &'static str {
        match self {
            SuppressReason::PositiveCooldown => "positive_cooldown",
            SuppressReason::NegativeCooldown => "negative_cooldown",
            SuppressReason::NormalCooldown => "normal_cooldown",
            SuppressReason::DailyLimit => "daily_limit",
            SuppressReason::ScoringDisabled => "scoring_disabled",
        }
    }
}

/// Permission to apply `delta`, to be committed once the write has landed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Grant {
    pub delta: i32,
    pub escalated: bool,
    /// Number of negative events inside the harassment window.
    pub recent_negatives: usize,
    family: Family,
    day: NaiveDate,
}

impl Grant {
    pub fn family(&self) -> Family {
        self.family
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gate {
    Allow(Grant),
    Suppress(SuppressReason),
    /// The outcome never scores.
    Ignore,
}

#[derive(Debug, Default)]
pub struct PersonRateState {
    last_positive_at: Option<DateTime<Utc>>,
    last_negative_at: Option<DateTime<Utc>>,
    last_normal_at: Option<DateTime<Utc>>,
    negative_events: VecDeque<(DateTime<Utc>, String)>,
    daily_gain: Option<(NaiveDate, i32)>,
}

fn within(last: Option<DateTime<Utc>>, now: DateTime<Utc>, window: chrono::Duration) -> bool {
    last.is_some_and(|at| now - at < window)
}

impl PersonRateState {
    /// Decide whether `outcome` may change the score right now.
    ///
    /// Harassment bookkeeping happens here even when the result is a
    /// suppression; cooldown timestamps and the daily counter only move in
    /// [`PersonRateState::commit`].
    pub fn assess(
        &mut self,
        outcome: &ClassificationOutcome,
        phase: EventPhase,
        config: &FavorabilityConfig,
        now: DateTime<Utc>,
    ) -> Gate {
        if outcome.counts_toward_harassment() {
            let keyword = outcome.keyword().unwrap_or_default();
            let tag = match phase {
                EventPhase::PreResponse => format!("{PRE_RESPONSE_TAG_PREFIX}{keyword}"),
                EventPhase::PostResponse => keyword.to_string(),
            };
            self.negative_events.push_back((now, tag));
        }
        self.prune(now, config);

        let Some(base) = outcome.base_delta(config) else {
            return Gate::Ignore;
        };
        let family = outcome.family();
        let day = now.with_timezone(&config.timezone).date_naive();
        let recent_negatives = self.negative_events.len();
        let mut escalated = false;

        let delta = match family {
            Family::None => return Gate::Ignore,
            Family::Negative => {
                if outcome.counts_toward_harassment()
                    && recent_negatives >= config.harassment_threshold
                {
                    escalated = true;
                    config.harassment_delta
                } else if within(self.last_negative_at, now, config.negative_cooldown()) {
                    return Gate::Suppress(SuppressReason::NegativeCooldown);
                } else {
                    base
                }
            }
            Family::Positive => {
                if within(self.last_positive_at, now, config.positive_cooldown()) {
                    return Gate::Suppress(SuppressReason::PositiveCooldown);
                }
                base
            }
            Family::Normal => {
                if within(self.last_normal_at, now, config.normal_cooldown()) {
                    return Gate::Suppress(SuppressReason::NormalCooldown);
                }
                if self.daily_count(day) >= config.daily_normal_limit {
                    return Gate::Suppress(SuppressReason::DailyLimit);
                }
                base
            }
        };

        if delta == 0 {
            return Gate::Suppress(SuppressReason::ScoringDisabled);
        }
        Gate::Allow(Grant {
            delta,
            escalated,
            recent_negatives,
            family,
            day,
        })
    }

    /// Record a grant whose score change has been persisted.
    pub fn commit(&mut self, grant: &Grant, now: DateTime<Utc>) {
        match grant.family {
            Family::Positive => self.last_positive_at = Some(now),
            Family::Negative => self.last_negative_at = Some(now),
            Family::Normal => {
                self.last_normal_at = Some(now);
                let count = self.daily_count(grant.day).saturating_add(grant.delta);
                self.daily_gain = Some((grant.day, count));
            }
            Family::None => {}
        }
    }

    /// A message that was not meant for the agent still counts as presence.
    pub fn note_not_addressed(&mut self, config: &FavorabilityConfig, now: DateTime<Utc>) {
        if !within(self.last_normal_at, now, config.interaction_cooldown()) {
            self.last_normal_at = Some(now);
        }
    }

    /// Points granted for normal interaction on `day`.
    pub fn daily_count(&self, day: NaiveDate) -> i32 {
        match self.daily_gain {
            Some((date, count)) if date == day => count,
            _ => 0,
        }
    }

    pub fn recent_negative_events(&self) -> impl Iterator<Item = &(DateTime<Utc>, String)> {
        self.negative_events.iter()
    }

    fn prune(&mut self, now: DateTime<Utc>, config: &FavorabilityConfig) {
        let window = config.harassment_window();
        self.negative_events.retain(|(at, _)| now - *at < window);
    }

    /// True when dropping this entry cannot change any future decision.
    pub fn is_idle(&self, config: &FavorabilityConfig, now: DateTime<Utc>) -> bool {
        let horizon = config.longest_window();
        let stale = |at: Option<DateTime<Utc>>| at.is_none_or(|at| now - at >= horizon);
        let today = now.with_timezone(&config.timezone).date_naive();
        stale(self.last_positive_at)
            && stale(self.last_negative_at)
            && stale(self.last_normal_at)
            && self
                .negative_events
                .iter()
                .all(|(at, _)| now - *at >= config.harassment_window())
            && self.daily_count(today) == 0
    }
}

/// Owner of every person's rate state. One mutex per person; the outer map
/// lock is only held to find or insert an entry.
#[derive(Debug, Default)]
pub struct RateLimiter {
    entries: RwLock<HashMap<String, Arc<Mutex<PersonRateState>>>>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lock the rate state of one person, creating it on first use. Holding
    /// the guard serializes every scoring decision for that person.
    pub async fn lock(&self, person_id: &str) -> OwnedMutexGuard<PersonRateState> {
        let existing = self.entries.read().await.get(person_id).cloned();
        let entry = match existing {
            Some(entry) => entry,
            None => self
                .entries
                .write()
                .await
                .entry(person_id.to_string())
                .or_default()
                .clone(),
        };
        entry.lock_owned().await
    }

    /// Drop idle entries nobody is using. Returns how many were removed.
    pub async fn sweep(&self, config: &FavorabilityConfig, now: DateTime<Utc>) -> usize {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| {
            if Arc::strong_count(entry) > 1 {
                return true;
            }
            match entry.try_lock() {
                Ok(state) => !state.is_idle(config, now),
                Err(_) => true,
            }
        });
        before - entries.len()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};

    use super::*;
    use crate::classifier::{Behavior, PositiveTier};

    fn at(seconds: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + seconds, 0).unwrap()
    }

    fn ordinary(keyword: &str) -> ClassificationOutcome {
        ClassificationOutcome::OrdinaryNegative {
            keyword: keyword.to_string(),
            softened: false,
        }
    }

    fn positive() -> ClassificationOutcome {
        ClassificationOutcome::Positive {
            keyword: "thanks".to_string(),
            long_content: false,
        }
    }

    fn allow(gate: Gate) -> Grant {
        match gate {
            Gate::Allow(grant) => grant,
            other => panic!("expected a grant, got {other:?}"),
        }
    }

    #[test]
    fn positive_cooldown_suppresses_second_hit() {
        let config = FavorabilityConfig::default();
        let mut state = PersonRateState::default();
        let grant = allow(state.assess(&positive(), EventPhase::PostResponse, &config, at(0)));
        state.commit(&grant, at(0));

        let second = state.assess(
            &ClassificationOutcome::ReasoningPositive {
                tier: PositiveTier::Low,
            },
            EventPhase::PostResponse,
            &config,
            at(60),
        );
        assert_eq!(second, Gate::Suppress(SuppressReason::PositiveCooldown));

        let later = state.assess(&positive(), EventPhase::PostResponse, &config, at(120));
        assert!(matches!(later, Gate::Allow(_)));
    }

    #[test]
    fn uncommitted_grant_does_not_start_a_cooldown() {
        let config = FavorabilityConfig::default();
        let mut state = PersonRateState::default();
        let first = state.assess(&positive(), EventPhase::PostResponse, &config, at(0));
        assert!(matches!(first, Gate::Allow(_)));
        let retry = state.assess(&positive(), EventPhase::PostResponse, &config, at(1));
        assert!(matches!(retry, Gate::Allow(_)));
    }

    #[test]
    fn escalation_bypasses_negative_cooldown() {
        let config = FavorabilityConfig::default();
        let mut state = PersonRateState::default();

        let first = allow(state.assess(&ordinary("idiot"), EventPhase::PostResponse, &config, at(0)));
        assert!(!first.escalated);
        assert_eq!(first.delta, -5);
        state.commit(&first, at(0));

        let second = state.assess(&ordinary("idiot"), EventPhase::PostResponse, &config, at(10));
        assert_eq!(second, Gate::Suppress(SuppressReason::NegativeCooldown));

        let third = allow(state.assess(&ordinary("moron"), EventPhase::PostResponse, &config, at(20)));
        assert!(third.escalated);
        assert_eq!(third.delta, config.harassment_delta);
        assert_eq!(third.recent_negatives, 3);
    }

    #[test]
    fn harassment_window_expires_old_events() {
        let config = FavorabilityConfig::default();
        let mut state = PersonRateState::default();
        state.assess(&ordinary("idiot"), EventPhase::PostResponse, &config, at(0));
        state.assess(&ordinary("idiot"), EventPhase::PostResponse, &config, at(100));
        let grant = allow(state.assess(&ordinary("idiot"), EventPhase::PostResponse, &config, at(300)));
        assert!(!grant.escalated);
        assert_eq!(grant.recent_negatives, 2);
    }

    #[test]
    fn mild_and_reasoning_negatives_do_not_feed_the_window() {
        let config = FavorabilityConfig::default();
        let mut state = PersonRateState::default();
        let mild = ClassificationOutcome::MildNegative {
            keyword: "meh".to_string(),
        };
        let reasoning = ClassificationOutcome::ReasoningNegative {
            behavior: Behavior::Insult,
            hedged: false,
            third_party: false,
        };
        for second in 0..5 {
            state.assess(&mild, EventPhase::PostResponse, &config, at(second));
            state.assess(&reasoning, EventPhase::PostResponse, &config, at(second));
        }
        assert_eq!(state.recent_negative_events().count(), 0);
    }

    #[test]
    fn pre_response_tags_are_prefixed() {
        let config = FavorabilityConfig::default();
        let mut state = PersonRateState::default();
        let severe = ClassificationOutcome::SevereNegative {
            keyword: "kys".to_string(),
        };
        state.assess(&severe, EventPhase::PreResponse, &config, at(0));
        state.assess(&severe, EventPhase::PostResponse, &config, at(1));
        let tags: Vec<&str> = state
            .recent_negative_events()
            .map(|(_, tag)| tag.as_str())
            .collect();
        assert_eq!(tags, ["user_input:kys", "kys"]);
    }

    #[test]
    fn daily_limit_blocks_without_touching_cooldown() {
        let config = FavorabilityConfig {
            daily_normal_limit: 2,
            normal_cooldown_seconds: 10,
            ..FavorabilityConfig::default()
        };
        let normal = ClassificationOutcome::NormalInteraction;
        let mut state = PersonRateState::default();

        for second in [0, 20] {
            let grant = allow(state.assess(&normal, EventPhase::PostResponse, &config, at(second)));
            state.commit(&grant, at(second));
        }
        assert_eq!(
            state.assess(&normal, EventPhase::PostResponse, &config, at(25)),
            Gate::Suppress(SuppressReason::NormalCooldown)
        );
        assert_eq!(
            state.assess(&normal, EventPhase::PostResponse, &config, at(40)),
            Gate::Suppress(SuppressReason::DailyLimit)
        );
        assert_eq!(state.last_normal_at, Some(at(20)));

        let tomorrow = at(0) + Duration::days(1);
        assert!(matches!(
            state.assess(&normal, EventPhase::PostResponse, &config, tomorrow),
            Gate::Allow(_)
        ));
    }

    #[test]
    fn daily_date_follows_configured_timezone() {
        let config = FavorabilityConfig {
            timezone: chrono_tz::Asia::Shanghai,
            ..FavorabilityConfig::default()
        };
        let mut state = PersonRateState::default();
        // 16:30 UTC is already the next day in Shanghai.
        let late = Utc.with_ymd_and_hms(2024, 3, 1, 16, 30, 0).unwrap();
        let grant = allow(state.assess(
            &ClassificationOutcome::NormalInteraction,
            EventPhase::PostResponse,
            &config,
            late,
        ));
        state.commit(&grant, late);
        let shanghai_day = NaiveDate::from_ymd_opt(2024, 3, 2).unwrap();
        assert_eq!(state.daily_count(shanghai_day), 1);
    }

    #[test]
    fn zero_delta_tier_is_reported_as_disabled() {
        let config = FavorabilityConfig {
            mild_negative_delta: 0,
            ..FavorabilityConfig::default()
        };
        let mut state = PersonRateState::default();
        let gate = state.assess(
            &ClassificationOutcome::MildNegative {
                keyword: "meh".to_string(),
            },
            EventPhase::PostResponse,
            &config,
            at(0),
        );
        assert_eq!(gate, Gate::Suppress(SuppressReason::ScoringDisabled));
    }

    #[test]
    fn not_addressed_refreshes_presence_at_most_once_per_cooldown() {
        let config = FavorabilityConfig::default();
        let mut state = PersonRateState::default();
        state.note_not_addressed(&config, at(0));
        state.note_not_addressed(&config, at(60));
        assert_eq!(state.last_normal_at, Some(at(0)));
        state.note_not_addressed(&config, at(120));
        assert_eq!(state.last_normal_at, Some(at(120)));
    }

    #[test]
    fn unscored_outcomes_are_ignored() {
        let config = FavorabilityConfig::default();
        let mut state = PersonRateState::default();
        for outcome in [
            ClassificationOutcome::NoSignal,
            ClassificationOutcome::NotAddressedToAgent,
            ClassificationOutcome::ReasoningNegative {
                behavior: Behavior::Threat,
                hedged: true,
                third_party: false,
            },
        ] {
            assert_eq!(
                state.assess(&outcome, EventPhase::PostResponse, &config, at(0)),
                Gate::Ignore
            );
        }
    }

    #[tokio::test]
    async fn lock_serializes_access_per_person() {
        let limiter = RateLimiter::new();
        let guard = limiter.lock("p1").await;
        let other = limiter.lock("p2").await;
        drop(other);
        assert_eq!(limiter.len().await, 2);

        let pending = tokio::time::timeout(
            std::time::Duration::from_millis(20),
            limiter.lock("p1"),
        )
        .await;
        assert!(pending.is_err(), "second lock on the same person must wait");
        drop(guard);
        let _again = limiter.lock("p1").await;
    }

    #[tokio::test]
    async fn sweep_drops_only_idle_unlocked_entries() {
        let config = FavorabilityConfig::default();
        let limiter = RateLimiter::new();
        {
            let mut busy = limiter.lock("recent").await;
            let grant = allow(busy.assess(&positive(), EventPhase::PostResponse, &config, at(0)));
            busy.commit(&grant, at(0));
        }
        drop(limiter.lock("idle").await);
        let held = limiter.lock("held").await;

        let removed = limiter.sweep(&config, at(60)).await;
        assert_eq!(removed, 1);
        assert_eq!(limiter.len().await, 2);

        drop(held);
        let removed = limiter.sweep(&config, at(60) + config.longest_window()).await;
        assert_eq!(removed, 2);
        assert!(limiter.is_empty().await);
    }
}
