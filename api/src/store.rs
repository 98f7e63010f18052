use affinity_core::error::StoreError;
use affinity_core::record::ScoreRecord;
use affinity_core::store::ScoreStore;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

/// PostgreSQL-backed favorability store (table `favorability`).
#[derive(Clone)]
pub struct PgScoreStore {
    pool: PgPool,
}

impl PgScoreStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct FavorabilityRow {
    person_id: String,
    score: i32,
    total_interactions: i64,
    positive_interactions: i64,
    negative_interactions: i64,
    last_interaction_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl TryFrom<FavorabilityRow> for ScoreRecord {
    type Error = StoreError;

    fn try_from(row: FavorabilityRow) -> Result<Self, Self::Error> {
        ScoreRecord::restore(
            row.person_id,
            row.score as i64,
            row.total_interactions,
            row.positive_interactions,
            row.negative_interactions,
            row.last_interaction_at,
            row.created_at,
        )
    }
}

const SELECT_COLUMNS: &str = "SELECT person_id, score, total_interactions, positive_interactions, \
     negative_interactions, last_interaction_at, created_at FROM favorability";

fn counter(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

impl ScoreStore for PgScoreStore {
    async fn get(&self, person_id: &str) -> Result<Option<ScoreRecord>, StoreError> {
        let row = sqlx::query_as::<_, FavorabilityRow>(&format!(
            "{SELECT_COLUMNS} WHERE person_id = $1"
        ))
        .bind(person_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::backend)?;
        row.map(ScoreRecord::try_from).transpose()
    }

    async fn get_or_create(
        &self,
        person_id: &str,
        now: DateTime<Utc>,
    ) -> Result<ScoreRecord, StoreError> {
        let fresh = ScoreRecord::new(person_id, now);
        sqlx::query(
            "INSERT INTO favorability (person_id, score, band, created_at) \
             VALUES ($1, $2, $3, $4) \
             ON CONFLICT (person_id) DO NOTHING",
        )
        .bind(person_id)
        .bind(fresh.score())
        .bind(fresh.band().as_str())
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(StoreError::backend)?;

        let row = sqlx::query_as::<_, FavorabilityRow>(&format!(
            "{SELECT_COLUMNS} WHERE person_id = $1"
        ))
        .bind(person_id)
        .fetch_one(&self.pool)
        .await
        .map_err(StoreError::backend)?;
        ScoreRecord::try_from(row)
    }

    async fn save(&self, record: &ScoreRecord) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO favorability \
             (person_id, score, band, total_interactions, positive_interactions, \
              negative_interactions, last_interaction_at, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             ON CONFLICT (person_id) DO UPDATE SET \
               score = EXCLUDED.score, \
               band = EXCLUDED.band, \
               total_interactions = EXCLUDED.total_interactions, \
               positive_interactions = EXCLUDED.positive_interactions, \
               negative_interactions = EXCLUDED.negative_interactions, \
               last_interaction_at = EXCLUDED.last_interaction_at",
        )
        .bind(&record.person_id)
        .bind(record.score())
        .bind(record.band().as_str())
        .bind(counter(record.total_interactions))
        .bind(counter(record.positive_interactions))
        .bind(counter(record.negative_interactions))
        .bind(record.last_interaction_at)
        .bind(record.created_at)
        .execute(&self.pool)
        .await
        .map_err(StoreError::backend)?;
        Ok(())
    }

    async fn list_all(&self) -> Result<Vec<ScoreRecord>, StoreError> {
        let rows = sqlx::query_as::<_, FavorabilityRow>(&format!(
            "{SELECT_COLUMNS} ORDER BY score DESC, person_id"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::backend)?;

        rows.into_iter().map(ScoreRecord::try_from).collect()
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    #[test]
    fn row_conversion_validates_ranges() {
        let now = Utc::now();
        let row = FavorabilityRow {
            person_id: "p1".to_string(),
            score: 75,
            total_interactions: 3,
            positive_interactions: 2,
            negative_interactions: 1,
            last_interaction_at: Some(now),
            created_at: now,
        };
        let record = ScoreRecord::try_from(row).unwrap();
        assert_eq!(record.score(), 75);
        assert_eq!(record.band().as_str(), "friend");

        let broken = FavorabilityRow {
            person_id: "p2".to_string(),
            score: -80,
            total_interactions: 0,
            positive_interactions: 0,
            negative_interactions: 0,
            last_interaction_at: None,
            created_at: now,
        };
        assert!(matches!(
            ScoreRecord::try_from(broken),
            Err(StoreError::Malformed { .. })
        ));
    }

    #[test]
    fn oversized_counters_saturate() {
        assert_eq!(counter(u64::MAX), i64::MAX);
        assert_eq!(counter(7), 7);
    }
}
