use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::band::{Band, DEFAULT_SCORE, SCORE_MAX, SCORE_MIN, band_for_score, clamp_score};
use crate::error::StoreError;

/// Which interaction counter an applied delta feeds besides the total.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum InteractionKind {
    Positive,
    Negative,
    Neutral,
}

/// Durable favorability state of one person.
///
/// The score is private so every write goes through the clamping setter; the
/// band is derived on demand and never stored next to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoreRecord {
    pub person_id: String,
    score: i32,
    pub total_interactions: u64,
    pub positive_interactions: u64,
    pub negative_interactions: u64,
    pub last_interaction_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl ScoreRecord {
    pub fn new(person_id: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            person_id: person_id.into(),
            score: DEFAULT_SCORE,
            total_interactions: 0,
            positive_interactions: 0,
            negative_interactions: 0,
            last_interaction_at: None,
            created_at: now,
        }
    }

    /// Rebuild a record from stored columns, rejecting values no engine write
    /// could have produced.
    pub fn restore(
        person_id: String,
        score: i64,
        total_interactions: i64,
        positive_interactions: i64,
        negative_interactions: i64,
        last_interaction_at: Option<DateTime<Utc>>,
        created_at: DateTime<Utc>,
    ) -> Result<Self, StoreError> {
        if !(SCORE_MIN as i64..=SCORE_MAX as i64).contains(&score) {
            return Err(StoreError::Malformed {
                person_id,
                reason: format!("score {score} outside [{SCORE_MIN}, {SCORE_MAX}]"),
            });
        }
        let counter = |name: &str, value: i64| {
            u64::try_from(value).map_err(|_| StoreError::Malformed {
                person_id: person_id.clone(),
                reason: format!("{name} is negative ({value})"),
            })
        };
        let total_interactions = counter("total_interactions", total_interactions)?;
        let positive_interactions = counter("positive_interactions", positive_interactions)?;
        let negative_interactions = counter("negative_interactions", negative_interactions)?;

        Ok(Self {
            person_id,
            score: score as i32,
            total_interactions,
            positive_interactions,
            negative_interactions,
            last_interaction_at,
            created_at,
        })
    }

    pub fn score(&self) -> i32 {
        self.score
    }

    pub fn band(&self) -> Band {
        band_for_score(self.score)
    }

    /// Clamp `score` into range and store it. Counters are untouched.
    pub fn set_score(&mut self, score: i64) -> i32 {
        self.score = clamp_score(score);
        self.score
    }

    /// Add `delta` (clamped), bump the counters and stamp the interaction time.
    /// Returns the new score.
    pub fn apply_delta(&mut self, delta: i32, kind: InteractionKind, now: DateTime<Utc>) -> i32 {
        self.set_score(self.score as i64 + delta as i64);
        self.total_interactions = self.total_interactions.saturating_add(1);
        match kind {
            InteractionKind::Positive => {
                self.positive_interactions = self.positive_interactions.saturating_add(1)
            }
            InteractionKind::Negative => {
                self.negative_interactions = self.negative_interactions.saturating_add(1)
            }
            InteractionKind::Neutral => {}
        }
        self.last_interaction_at = Some(now);
        self.score
    }
}

/// Read model of one person's favorability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct FavorabilitySummary {
    pub person_id: String,
    /// Current score in [-50, 150]
    pub score: i32,
    pub band: Band,
    pub total_interactions: u64,
    pub positive_interactions: u64,
    pub negative_interactions: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_interaction_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<&ScoreRecord> for FavorabilitySummary {
    fn from(record: &ScoreRecord) -> Self {
        Self {
            person_id: record.person_id.clone(),
            score: record.score(),
            band: record.band(),
            total_interactions: record.total_interactions,
            positive_interactions: record.positive_interactions,
            negative_interactions: record.negative_interactions,
            last_interaction_at: record.last_interaction_at,
            created_at: record.created_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct BandCount {
    pub band: Band,
    pub count: usize,
}

/// Aggregate view over every stored record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct FavorabilityStats {
    pub total_persons: usize,
    /// Mean score rounded to one decimal; 0.0 when nobody is stored
    pub average_score: f64,
    /// Every band from highest to lowest, including empty ones
    pub bands: Vec<BandCount>,
}

pub fn compute_stats(records: &[ScoreRecord]) -> FavorabilityStats {
    let bands = Band::ALL
        .iter()
        .map(|band| BandCount {
            band: *band,
            count: records.iter().filter(|r| r.band() == *band).count(),
        })
        .collect();

    let average_score = if records.is_empty() {
        0.0
    } else {
        let sum: i64 = records.iter().map(|r| r.score() as i64).sum();
        let mean = sum as f64 / records.len() as f64;
        (mean * 10.0).round() / 10.0
    };

    FavorabilityStats {
        total_persons: records.len(),
        average_score,
        bands,
    }
}
