use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Group {
    pub id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// Group row as shown on the admin listing, with its table sizes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupSummary {
    pub id: String,
    pub name: String,
    pub participant_count: i64,
    pub match_count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Participant {
    pub id: String,
    pub group_id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Match {
    pub id: String,
    pub group_id: String,
    /// Opaque fixture identifier from the provider; not unique across groups.
    pub match_id: String,
    pub home_team: String,
    pub away_team: String,
    /// Display kickoff, `DD/MM/YYYY HH:MM`. Also the string key predictions
    /// are matched on during import, so it must never be reformatted.
    pub match_date: String,
    pub status: String,
    pub winner: Option<String>,
    pub home_score: Option<i32>,
    pub away_score: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Prediction {
    pub id: String,
    pub participant_id: String,
    /// NULL when an imported row matched no stored fixture.
    pub match_id: Option<String>,
    pub match_date: String,
    pub home_team: String,
    pub away_team: String,
    /// "1", "X", "2", or "-" for no prediction yet.
    pub prediction: String,
}

/// One ingested fixture, already normalized for storage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fixture {
    pub external_id: String,
    pub home_team: String,
    pub away_team: String,
    pub match_date: String,
    pub status: String,
    pub winner: Option<String>,
    pub home_score: Option<i32>,
    pub away_score: Option<i32>,
}

/// A match joined with one participant's prediction (LEFT JOIN, so the
/// prediction is absent when no row was ever seeded or imported).
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct MatchPrediction {
    pub home_team: String,
    pub away_team: String,
    pub match_date: String,
    pub status: String,
    pub winner: Option<String>,
    pub prediction: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Standing {
    pub participant_id: String,
    pub name: String,
    pub points: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportOutcome {
    pub participant: String,
    /// Data rows processed (header excluded).
    pub rows_seen: usize,
    /// Rows carrying a syntactically valid pick.
    pub rows_applied: usize,
}

// API Response types
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            timestamp: Utc::now(),
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
            timestamp: Utc::now(),
        }
    }
}
