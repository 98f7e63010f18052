use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub const SCORE_MIN: i32 = -50;
pub const SCORE_MAX: i32 = 150;
pub const DEFAULT_SCORE: i32 = 50;

/// Relationship band derived from a favorability score. Ordered from the
/// lowest band to the highest.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum Band {
    Nemesis,
    Hostile,
    Disliked,
    Stranger,
    Known,
    Acquaintance,
    Friend,
    Bestfriend,
    Kin,
}

impl Band {
    pub const ALL: [Band; 9] = [
        Band::Kin,
        Band::Bestfriend,
        Band::Friend,
        Band::Acquaintance,
        Band::Known,
        Band::Stranger,
        Band::Disliked,
        Band::Hostile,
        Band::Nemesis,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Band::Kin => "kin",
            Band::Bestfriend => "bestfriend",
            Band::Friend => "friend",
            Band::Acquaintance => "acquaintance",
            Band::Known => "known",
            Band::Stranger => "stranger",
            Band::Disliked => "disliked",
            Band::Hostile => "hostile",
            Band::Nemesis => "nemesis",
        }
    }

    /// Inclusive score range covered by this band.
    pub fn range(self) -> (i32, i32) {
        match self {
            Band::Kin => (120, 150),
            Band::Bestfriend => (90, 119),
            Band::Friend => (70, 89),
            Band::Acquaintance => (50, 69),
            Band::Known => (30, 49),
            Band::Stranger => (10, 29),
            Band::Disliked => (-10, 9),
            Band::Hostile => (-30, -11),
            Band::Nemesis => (-50, -31),
        }
    }

    /// One-line summary of the band's conversational register, for debug logs.
    pub fn tone_summary(self) -> String {
        let (low, high) = self.range();
        let register = match self {
            Band::Kin => "complete trust, doting",
            Band::Bestfriend => "affectionate, relies on them warmly",
            Band::Friend => "friendly with a little teasing, relaxed",
            Band::Acquaintance => "standard reserve, keeps a polite distance",
            Band::Known => "cool and distant, perfunctory",
            Band::Stranger => "impatient, slightly sarcastic",
            Band::Disliked => "openly displeased, sets hard boundaries",
            Band::Hostile => "hostile, disengages",
            Band::Nemesis => "blocked in spirit, ignores or answers curtly",
        };
        format!("{low}-{high} ({}): {register}", self.as_str())
    }
}

impl std::fmt::Display for Band {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

pub fn clamp_score(score: i64) -> i32 {
    score.clamp(SCORE_MIN as i64, SCORE_MAX as i64) as i32
}

/// Map a score onto its band. Out-of-range input is clamped first.
pub fn band_for_score(score: i32) -> Band {
    match score.clamp(SCORE_MIN, SCORE_MAX) {
        120..=SCORE_MAX => Band::Kin,
        90..=119 => Band::Bestfriend,
        70..=89 => Band::Friend,
        50..=69 => Band::Acquaintance,
        30..=49 => Band::Known,
        10..=29 => Band::Stranger,
        -10..=9 => Band::Disliked,
        -30..=-11 => Band::Hostile,
        _ => Band::Nemesis,
    }
}
