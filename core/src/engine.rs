//! Scoring orchestrator: classify, gate, mutate, report.

use chrono::{DateTime, Utc};

use crate::band::band_for_score;
use crate::classifier::{ClassificationOutcome, Family, classify};
use crate::config::FavorabilityConfig;
use crate::error::StoreError;
use crate::events::{Effect, EventReport, SignalEvent};
use crate::identity::fallback_display_name;
use crate::rate_limit::{Gate, RateLimiter};
use crate::record::{
    FavorabilityStats, FavorabilitySummary, InteractionKind, ScoreRecord, compute_stats,
};
use crate::store::ScoreStore;
use crate::tone::render_tone_directive;

pub struct Engine<S> {
    store: S,
    limiter: RateLimiter,
    config: FavorabilityConfig,
}

impl<S: ScoreStore> Engine<S> {
    pub fn new(store: S, config: FavorabilityConfig) -> Self {
        Self {
            store,
            limiter: RateLimiter::new(),
            config,
        }
    }

    pub fn config(&self) -> &FavorabilityConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn rate_limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    pub async fn handle_event(&self, event: &SignalEvent) -> EventReport {
        self.handle_event_at(event, Utc::now()).await
    }

    /// Process one event as if it happened at `now`.
    pub async fn handle_event_at(&self, event: &SignalEvent, now: DateTime<Utc>) -> EventReport {
        let person_id = event.person_id.clone();
        if !self.config.enabled {
            return EventReport {
                person_id,
                outcome: ClassificationOutcome::NoSignal,
                effect: Effect::Disabled,
            };
        }

        let outcome = classify(&event.input(), &self.config);
        let effect = self.score_outcome(event, &outcome, now).await;
        EventReport {
            person_id,
            outcome,
            effect,
        }
    }

    async fn score_outcome(
        &self,
        event: &SignalEvent,
        outcome: &ClassificationOutcome,
        now: DateTime<Utc>,
    ) -> Effect {
        let person_id = event.person_id.as_str();
        match outcome {
            ClassificationOutcome::NoSignal => return Effect::Ignored,
            ClassificationOutcome::NotAddressedToAgent => {
                let mut state = self.limiter.lock(person_id).await;
                state.note_not_addressed(&self.config, now);
                return Effect::Ignored;
            }
            ClassificationOutcome::ReasoningNegative {
                behavior,
                hedged: true,
                ..
            } => {
                tracing::info!(
                    person_id = %person_id,
                    behavior = behavior.as_str(),
                    "behavior judgment is hedged; not scored"
                );
                return Effect::Ignored;
            }
            _ => {}
        }

        let mut state = self.limiter.lock(person_id).await;
        let grant = match state.assess(outcome, event.phase, &self.config, now) {
            Gate::Allow(grant) => grant,
            Gate::Suppress(reason) => {
                tracing::debug!(
                    person_id = %person_id,
                    outcome = outcome.kind(),
                    reason = reason.as_str(),
                    "score change suppressed"
                );
                return Effect::Suppressed { reason };
            }
            Gate::Ignore => return Effect::Ignored,
        };

        let mut record = match self.store.get_or_create(person_id, now).await {
            Ok(record) => record,
            Err(err) => {
                tracing::error!(error = %err, person_id = %person_id, "favorability read failed");
                return Effect::StoreUnavailable;
            }
        };
        let previous = record.score();
        let kind = match grant.family() {
            Family::Positive => InteractionKind::Positive,
            Family::Negative => InteractionKind::Negative,
            Family::Normal | Family::None => InteractionKind::Neutral,
        };
        let score = record.apply_delta(grant.delta, kind, now);

        if let Err(err) = self.store.save(&record).await {
            tracing::error!(error = %err, person_id = %person_id, "favorability write failed");
            return Effect::StoreUnavailable;
        }
        state.commit(&grant, now);

        let band = band_for_score(score);
        let display_name = event
            .display_name
            .clone()
            .unwrap_or_else(|| fallback_display_name(person_id));
        if grant.escalated {
            tracing::warn!(
                person_id = %person_id,
                display_name = %display_name,
                recent_negatives = grant.recent_negatives,
                window_seconds = self.config.harassment_window_seconds,
                delta = grant.delta,
                score,
                band = %band,
                "sustained harassment detected"
            );
        } else {
            tracing::info!(
                person_id = %person_id,
                display_name = %display_name,
                outcome = outcome.kind(),
                keyword = outcome.keyword().unwrap_or_default(),
                delta = grant.delta,
                score,
                band = %band,
                "favorability changed"
            );
        }

        Effect::Applied {
            delta: grant.delta,
            previous,
            score,
            band,
            escalated: grant.escalated,
        }
    }

    /// Current standing of a person. Never fails: an unreachable store reads
    /// as a fresh record at the default score.
    pub async fn summary(&self, person_id: &str) -> FavorabilitySummary {
        self.summary_at(person_id, Utc::now()).await
    }

    pub async fn summary_at(&self, person_id: &str, now: DateTime<Utc>) -> FavorabilitySummary {
        let record = match self.store.get_or_create(person_id, now).await {
            Ok(record) => record,
            Err(err) => {
                tracing::error!(
                    error = %err,
                    person_id = %person_id,
                    "favorability read failed; using default record"
                );
                ScoreRecord::new(person_id, now)
            }
        };
        FavorabilitySummary::from(&record)
    }

    /// Tone directive for the next reply to this person, or `None` when prompt
    /// injection is switched off.
    pub async fn tone_directive(
        &self,
        person_id: &str,
        display_name: Option<&str>,
        last_text: &str,
    ) -> Option<String> {
        if !self.config.enabled || !self.config.inject_prompt_enabled {
            return None;
        }
        let summary = self.summary(person_id).await;
        let name = display_name
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| fallback_display_name(person_id));

        if self.config.debug_log_prompt_injection {
            tracing::info!(
                person_id = %person_id,
                display_name = %name,
                score = summary.score,
                band = %summary.band,
                tone = %summary.band.tone_summary(),
                "tone directive rendered"
            );
        }
        Some(render_tone_directive(summary.score, &name, last_text))
    }

    /// Every stored record, highest score first.
    pub async fn list_records(&self) -> Result<Vec<FavorabilitySummary>, StoreError> {
        let mut records = self.store.list_all().await?;
        records.sort_by(|a, b| {
            b.score()
                .cmp(&a.score())
                .then_with(|| a.person_id.cmp(&b.person_id))
        });
        Ok(records.iter().map(FavorabilitySummary::from).collect())
    }

    /// Records whose person id contains `fragment` (case-insensitive).
    pub async fn search(&self, fragment: &str) -> Result<Vec<FavorabilitySummary>, StoreError> {
        let needle = fragment.trim().to_lowercase();
        let mut matches = self.list_records().await?;
        matches.retain(|summary| summary.person_id.to_lowercase().contains(&needle));
        Ok(matches)
    }

    /// Administrative override. The value is clamped into range; counters and
    /// the last interaction time are left as they were.
    pub async fn set_score(
        &self,
        person_id: &str,
        value: i64,
    ) -> Result<FavorabilitySummary, StoreError> {
        let now = Utc::now();
        let _state = self.limiter.lock(person_id).await;
        let mut record = self.store.get_or_create(person_id, now).await?;
        let previous = record.score();
        let score = record.set_score(value);
        self.store.save(&record).await?;
        tracing::info!(
            person_id = %person_id,
            previous,
            requested = value,
            score,
            band = %record.band(),
            "favorability set by administrator"
        );
        Ok(FavorabilitySummary::from(&record))
    }

    pub async fn stats(&self) -> Result<FavorabilityStats, StoreError> {
        let records = self.store.list_all().await?;
        Ok(compute_stats(&records))
    }

    /// Forget rate state that can no longer influence any decision.
    pub async fn sweep_rate_state(&self, now: DateTime<Utc>) -> usize {
        self.limiter.sweep(&self.config, now).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    use chrono::{Duration, TimeZone, Utc};

    use super::*;
    use crate::band::Band;
    use crate::classifier::{Behavior, EventPhase};
    use crate::rate_limit::SuppressReason;
    use crate::store::MemoryScoreStore;

    fn at(seconds: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap() + Duration::seconds(seconds)
    }

    fn engine() -> Engine<MemoryScoreStore> {
        Engine::new(MemoryScoreStore::new(), FavorabilityConfig::default())
    }

    fn engine_with(config: FavorabilityConfig) -> Engine<MemoryScoreStore> {
        Engine::new(MemoryScoreStore::new(), config)
    }

    async fn seed(engine: &Engine<MemoryScoreStore>, person_id: &str, score: i64) {
        let mut record = ScoreRecord::new(person_id, at(-3600));
        record.set_score(score);
        engine.store().save(&record).await.unwrap();
    }

    fn applied(report: &EventReport) -> (i32, i32, Band, bool) {
        match &report.effect {
            Effect::Applied {
                delta,
                score,
                band,
                escalated,
                ..
            } => (*delta, *score, *band, *escalated),
            other => panic!("expected an applied effect, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn long_positive_message_lifts_new_person_to_52() {
        let engine = engine();
        let event = SignalEvent::new("p1", "thank you so much, this really helped me a lot");
        let report = engine.handle_event_at(&event, at(0)).await;

        assert!(matches!(
            report.outcome,
            ClassificationOutcome::Positive {
                long_content: true,
                ..
            }
        ));
        assert_eq!(applied(&report), (2, 52, Band::Acquaintance, false));

        let summary = engine.summary_at("p1", at(1)).await;
        assert_eq!(summary.total_interactions, 1);
        assert_eq!(summary.positive_interactions, 1);
        assert_eq!(summary.negative_interactions, 0);
    }

    #[tokio::test]
    async fn severe_insult_drops_ten_to_five() {
        let engine = engine();
        seed(&engine, "p1", 10).await;
        let report = engine
            .handle_event_at(&SignalEvent::new("p1", "just kill yourself"), at(0))
            .await;
        assert_eq!(applied(&report), (-5, 5, Band::Disliked, false));
    }

    #[tokio::test]
    async fn positive_family_scores_once_per_cooldown() {
        let engine = engine();
        let first = engine
            .handle_event_at(&SignalEvent::new("p1", "thanks a lot"), at(0))
            .await;
        assert_eq!(applied(&first).1, 51);

        let second = engine
            .handle_event_at(&SignalEvent::new("p1", "love you lots"), at(30))
            .await;
        assert_eq!(
            second.effect,
            Effect::Suppressed {
                reason: SuppressReason::PositiveCooldown
            }
        );
        assert_eq!(engine.summary_at("p1", at(31)).await.score, 51);
    }

    #[tokio::test]
    async fn fourth_ordinary_negative_in_window_escalates() {
        let engine = engine();
        seed(&engine, "p1", 60).await;
        let hit = |seconds| {
            let engine = &engine;
            async move {
                engine
                    .handle_event_at(&SignalEvent::new("p1", "you are useless"), at(seconds))
                    .await
            }
        };

        let first = hit(0).await;
        assert_eq!(applied(&first), (-5, 55, Band::Acquaintance, false));

        let second = hit(10).await;
        assert_eq!(
            second.effect,
            Effect::Suppressed {
                reason: SuppressReason::NegativeCooldown
            }
        );

        let third = hit(20).await;
        assert_eq!(applied(&third), (-25, 30, Band::Known, true));

        let fourth = hit(30).await;
        assert_eq!(applied(&fourth), (-25, 5, Band::Disliked, true));
    }

    #[tokio::test]
    async fn escalated_penalty_is_floored() {
        let engine = engine();
        seed(&engine, "p1", -40).await;
        for seconds in [0, 10] {
            engine
                .handle_event_at(&SignalEvent::new("p1", "idiot"), at(seconds))
                .await;
        }
        let report = engine
            .handle_event_at(&SignalEvent::new("p1", "idiot"), at(20))
            .await;
        let (_, score, band, escalated) = applied(&report);
        assert!(escalated);
        assert_eq!(score, -50);
        assert_eq!(band, Band::Nemesis);
    }

    #[tokio::test]
    async fn softened_negative_costs_half() {
        let engine = engine();
        let report = engine
            .handle_event_at(&SignalEvent::new("p1", "sorry, that was stupid"), at(0))
            .await;
        assert_eq!(applied(&report), (-2, 48, Band::Known, false));
    }

    #[tokio::test]
    async fn normal_gains_stop_at_daily_limit_and_resume_next_day() {
        let engine = engine_with(FavorabilityConfig {
            daily_normal_limit: 3,
            normal_cooldown_seconds: 60,
            ..FavorabilityConfig::default()
        });
        let chat = SignalEvent::new("p1", "what are we doing this weekend");

        let mut granted = 0;
        for step in 0..6 {
            let report = engine.handle_event_at(&chat, at(step * 61)).await;
            if matches!(report.effect, Effect::Applied { .. }) {
                granted += 1;
            } else {
                assert_eq!(
                    report.effect,
                    Effect::Suppressed {
                        reason: SuppressReason::DailyLimit
                    }
                );
            }
        }
        assert_eq!(granted, 3);
        let summary = engine.summary_at("p1", at(400)).await;
        assert_eq!(summary.score, 53);
        assert_eq!(summary.total_interactions, 3);
        assert_eq!(summary.positive_interactions, 0);

        let next_day = engine
            .handle_event_at(&chat, at(0) + Duration::days(1))
            .await;
        assert_eq!(applied(&next_day).1, 54);
    }

    #[tokio::test]
    async fn hedged_and_unaddressed_events_do_not_score() {
        let engine = engine_with(FavorabilityConfig {
            reasoning_detection_enabled: true,
            ..FavorabilityConfig::default()
        });
        let hedged = engine
            .handle_event_at(
                &SignalEvent::new("p1", "hmm ok").with_reasoning("maybe an insult"),
                at(0),
            )
            .await;
        assert_eq!(hedged.effect, Effect::Ignored);

        let aside = engine
            .handle_event_at(
                &SignalEvent::new("p1", "you idiot").with_reasoning("not talking to me"),
                at(1),
            )
            .await;
        assert_eq!(aside.outcome, ClassificationOutcome::NotAddressedToAgent);
        assert_eq!(aside.effect, Effect::Ignored);
        assert!(engine.store().get("p1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn unaddressed_message_counts_as_normal_presence() {
        let engine = engine();
        engine
            .handle_event_at(
                &SignalEvent::new("p1", "that is a fine plan")
                    .with_planner_reasoning("they are chatting between themselves"),
                at(0),
            )
            .await;
        let report = engine
            .handle_event_at(&SignalEvent::new("p1", "what do you think about it"), at(60))
            .await;
        assert_eq!(
            report.effect,
            Effect::Suppressed {
                reason: SuppressReason::NormalCooldown
            }
        );
    }

    #[tokio::test]
    async fn third_party_abuse_is_scored_with_negative_delta() {
        let engine = engine();
        let report = engine
            .handle_event_at(
                &SignalEvent::new("p1", "lol").with_reasoning(
                    "not talking to me; a personal attack toward another member",
                ),
                at(0),
            )
            .await;
        assert_eq!(
            report.outcome,
            ClassificationOutcome::ReasoningNegative {
                behavior: Behavior::Insult,
                hedged: false,
                third_party: true,
            }
        );
        assert_eq!(applied(&report), (-5, 45, Band::Known, false));
    }

    #[tokio::test]
    async fn pre_response_severe_is_tagged_and_counted() {
        let engine = engine();
        let severe = SignalEvent::new("p1", "去死").with_phase(EventPhase::PreResponse);
        let report = engine.handle_event_at(&severe, at(0)).await;
        assert_eq!(applied(&report).1, 45);

        let state = engine.rate_limiter().lock("p1").await;
        let tags: Vec<&str> = state
            .recent_negative_events()
            .map(|(_, tag)| tag.as_str())
            .collect();
        assert_eq!(tags, ["user_input:去死"]);
    }

    #[tokio::test]
    async fn softened_negative_costs_one_even_with_zero_base_penalty() {
        let engine = engine_with(FavorabilityConfig {
            negative_delta: 0,
            ..FavorabilityConfig::default()
        });
        let report = engine
            .handle_event_at(&SignalEvent::new("p1", "sorry, that was stupid"), at(0))
            .await;
        assert_eq!(applied(&report), (-1, 49, Band::Known, false));
    }

    #[tokio::test]
    async fn zero_delta_means_no_mutation() {
        let engine = engine_with(FavorabilityConfig {
            mild_negative_delta: 0,
            ..FavorabilityConfig::default()
        });
        let report = engine
            .handle_event_at(&SignalEvent::new("p1", "kinda annoying tbh"), at(0))
            .await;
        assert_eq!(
            report.effect,
            Effect::Suppressed {
                reason: SuppressReason::ScoringDisabled
            }
        );
        assert!(engine.store().get("p1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn everyday_words_containing_abbreviations_are_not_abuse() {
        let engine = engine();
        for (person, text) in [
            ("p1", "look at that skyscraper downtown"),
            ("p2", "my husband says hi"),
        ] {
            let report = engine
                .handle_event_at(&SignalEvent::new(person, text), at(0))
                .await;
            assert_ne!(report.outcome.family(), Family::Negative, "{text}");
            assert!(engine.summary_at(person, at(1)).await.score >= 50, "{text}");
        }
    }

    #[tokio::test]
    async fn oversized_window_setting_keeps_engine_running() {
        let mut config = FavorabilityConfig::default();
        config.apply_source(|key| {
            (key == "harassment_window_seconds")
                .then(|| crate::config::RawValue::Text(i64::MAX.to_string()))
        });
        assert_eq!(config.harassment_window_seconds, 300);

        let engine = engine_with(config);
        let report = engine
            .handle_event_at(&SignalEvent::new("p1", "hello there friend"), at(0))
            .await;
        assert!(!matches!(report.effect, Effect::StoreUnavailable));
        let tracked = engine.rate_limiter().len().await;
        assert_eq!(engine.sweep_rate_state(at(86_400 * 400)).await, tracked);
    }

    #[tokio::test]
    async fn disabled_engine_reports_disabled() {
        let engine = engine_with(FavorabilityConfig {
            enabled: false,
            ..FavorabilityConfig::default()
        });
        let report = engine
            .handle_event_at(&SignalEvent::new("p1", "kill yourself"), at(0))
            .await;
        assert_eq!(report.effect, Effect::Disabled);
        assert!(engine.tone_directive("p1", None, "hi").await.is_none());
    }

    #[tokio::test]
    async fn tone_directive_uses_fallback_name_and_respects_flag() {
        let engine = engine();
        let directive = engine
            .tone_directive("abcdef", None, "please help")
            .await
            .unwrap();
        assert!(directive.contains("Current relationship with userabcd: acquaintance"));
        assert!(directive.contains("soften noticeably"));

        let muted = engine_with(FavorabilityConfig {
            inject_prompt_enabled: false,
            ..FavorabilityConfig::default()
        });
        assert!(muted.tone_directive("abcdef", Some("Ann"), "").await.is_none());
    }

    #[tokio::test]
    async fn admin_listing_search_set_and_stats() {
        let engine = engine();
        seed(&engine, "aaa1", 10).await;
        seed(&engine, "bbb2", 120).await;
        seed(&engine, "ccc3", 120).await;

        let listed: Vec<String> = engine
            .list_records()
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.person_id)
            .collect();
        assert_eq!(listed, ["bbb2", "ccc3", "aaa1"]);

        let found = engine.search("B2").await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].person_id, "bbb2");

        let updated = engine.set_score("aaa1", 500).await.unwrap();
        assert_eq!(updated.score, 150);
        assert_eq!(updated.band, Band::Kin);
        assert_eq!(updated.total_interactions, 0);
        assert!(updated.last_interaction_at.is_none());
        assert_eq!(engine.set_score("aaa1", -999).await.unwrap().score, -50);

        let stats = engine.stats().await.unwrap();
        assert_eq!(stats.total_persons, 3);
        assert_eq!(stats.average_score, 63.3);
    }

    /// Store whose writes fail on demand.
    #[derive(Default)]
    struct FlakyStore {
        inner: MemoryScoreStore,
        broken: Arc<AtomicBool>,
    }

    impl FlakyStore {
        fn check(&self) -> Result<(), StoreError> {
            if self.broken.load(Ordering::SeqCst) {
                Err(StoreError::backend("connection refused"))
            } else {
                Ok(())
            }
        }
    }

    impl ScoreStore for FlakyStore {
        async fn get(&self, person_id: &str) -> Result<Option<ScoreRecord>, StoreError> {
            self.check()?;
            self.inner.get(person_id).await
        }

        async fn get_or_create(
            &self,
            person_id: &str,
            now: DateTime<Utc>,
        ) -> Result<ScoreRecord, StoreError> {
            self.check()?;
            self.inner.get_or_create(person_id, now).await
        }

        async fn save(&self, record: &ScoreRecord) -> Result<(), StoreError> {
            self.check()?;
            self.inner.save(record).await
        }

        async fn list_all(&self) -> Result<Vec<ScoreRecord>, StoreError> {
            self.check()?;
            self.inner.list_all().await
        }
    }

    #[tokio::test]
    async fn store_failure_degrades_without_burning_cooldown() {
        let store = FlakyStore::default();
        let broken = store.broken.clone();
        let engine = Engine::new(store, FavorabilityConfig::default());

        broken.store(true, Ordering::SeqCst);
        let failed = engine
            .handle_event_at(&SignalEvent::new("p1", "thanks a lot"), at(0))
            .await;
        assert_eq!(failed.effect, Effect::StoreUnavailable);
        let fallback = engine.summary_at("p1", at(1)).await;
        assert_eq!(fallback.score, 50);
        assert!(engine.stats().await.is_err());

        broken.store(false, Ordering::SeqCst);
        let retried = engine
            .handle_event_at(&SignalEvent::new("p1", "thanks a lot"), at(2))
            .await;
        assert_eq!(applied(&retried).1, 51);
    }

    #[tokio::test]
    async fn concurrent_events_for_one_person_serialize() {
        let engine = Arc::new(engine_with(FavorabilityConfig {
            normal_cooldown_seconds: 0,
            daily_normal_limit: 1_000,
            ..FavorabilityConfig::default()
        }));
        let mut tasks = Vec::new();
        for _ in 0..20 {
            let engine = engine.clone();
            tasks.push(tokio::spawn(async move {
                engine
                    .handle_event_at(&SignalEvent::new("p1", "tell me a long story"), at(0))
                    .await
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }
        let summary = engine.summary_at("p1", at(1)).await;
        assert_eq!(summary.score, 70);
        assert_eq!(summary.total_interactions, 20);
    }
}
