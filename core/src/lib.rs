pub mod band;
pub mod classifier;
pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod identity;
pub mod keywords;
pub mod rate_limit;
pub mod record;
pub mod store;
pub mod tone;

pub use band::{Band, band_for_score};
pub use classifier::{ClassificationOutcome, EventPhase, SignalInput, classify};
pub use config::FavorabilityConfig;
pub use engine::Engine;
pub use events::{Effect, EventReport, IngestEventRequest, SignalEvent};
pub use identity::person_id;
pub use record::{FavorabilityStats, FavorabilitySummary, ScoreRecord};
pub use store::{MemoryScoreStore, ScoreStore};
