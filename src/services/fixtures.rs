use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use std::env;
use std::time::Duration;

use crate::models::Fixture;
use crate::utils::format_kickoff;

// ── football-data.org structures ────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CompetitionMatches {
    pub matches: Vec<ProviderMatch>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderMatch {
    pub id: u64,
    pub utc_date: String,
    pub status: String,
    pub home_team: Option<ProviderTeam>,
    pub away_team: Option<ProviderTeam>,
    pub score: Option<ProviderScore>,
}

#[derive(Debug, Deserialize)]
pub struct ProviderTeam {
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderScore {
    pub winner: Option<String>,
    pub full_time: Option<FullTime>,
}

#[derive(Debug, Deserialize)]
pub struct FullTime {
    pub home: Option<i32>,
    pub away: Option<i32>,
}

// ── FixtureClient ───────────────────────────────────────────────────────────

/// Fetches the fixture list for one competition. The fetch is best-effort:
/// every failure degrades to an empty list so group creation never depends on
/// the provider being up.
pub struct FixtureClient {
    client: Client,
    api_key: Option<String>,
    competition: String,
}

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

impl FixtureClient {
    pub fn new() -> Self {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            api_key: env::var("FOOTBALL_DATA_API_KEY").ok(),
            competition: env::var("FOOTBALL_DATA_COMPETITION").unwrap_or_else(|_| "EC".to_string()),
        }
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    async fn request_matches(&self) -> Result<Vec<ProviderMatch>> {
        let api_key = self
            .api_key
            .as_ref()
            .ok_or_else(|| anyhow!("FOOTBALL_DATA_API_KEY not set"))?;

        let url = format!(
            "https://api.football-data.org/v4/competitions/{}/matches",
            self.competition
        );

        tracing::info!("Fetching {} fixtures from football-data.org…", self.competition);

        let response = self
            .client
            .get(&url)
            .header("X-Auth-Token", api_key)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("fixtures API error {}: {}", status, body));
        }

        let data: CompetitionMatches = response.json().await?;
        Ok(data.matches)
    }

    /// Current fixture list, normalized for storage. Returns an empty vector
    /// on any transport or provider failure; callers surface "no matches"
    /// instead of failing.
    pub async fn fetch_fixtures(&self) -> Vec<Fixture> {
        let raw = match self.request_matches().await {
            Ok(matches) => matches,
            Err(e) => {
                tracing::warn!("Failed to fetch fixtures: {}", e);
                return Vec::new();
            }
        };

        let total = raw.len();
        let fixtures: Vec<Fixture> = raw.into_iter().filter_map(normalize).collect();
        if fixtures.len() < total {
            tracing::warn!("Dropped {} malformed fixtures from provider payload", total - fixtures.len());
        }

        fixtures
    }
}

/// Map a provider match to a storable fixture. Fixtures missing a team name
/// on either side, or carrying an unparseable kickoff, are dropped.
fn normalize(m: ProviderMatch) -> Option<Fixture> {
    let home_team = m.home_team.and_then(|t| t.name)?;
    let away_team = m.away_team.and_then(|t| t.name)?;

    let match_date = match DateTime::parse_from_rfc3339(&m.utc_date) {
        Ok(d) => format_kickoff(d.with_timezone(&Utc)),
        Err(e) => {
            tracing::warn!("Bad kickoff date '{}': {}", m.utc_date, e);
            return None;
        }
    };

    let (winner, home_score, away_score) = match m.score {
        Some(score) => {
            let (home, away) = match score.full_time {
                Some(full_time) => (full_time.home, full_time.away),
                None => (None, None),
            };
            (score.winner, home, away)
        }
        None => (None, None, None),
    };

    Some(Fixture {
        external_id: m.id.to_string(),
        home_team,
        away_team,
        match_date,
        status: m.status,
        winner,
        home_score,
        away_score,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider_match(json: &str) -> ProviderMatch {
        serde_json::from_str(json).expect("provider match json")
    }

    #[test]
    fn normalizes_a_full_payload_entry() {
        let m = provider_match(
            r#"{
                "id": 444361,
                "utcDate": "2024-06-01T20:00:00Z",
                "status": "FINISHED",
                "homeTeam": {"name": "HomeA"},
                "awayTeam": {"name": "AwayB"},
                "score": {"winner": "HOME_TEAM", "fullTime": {"home": 2, "away": 0}}
            }"#,
        );

        let fixture = normalize(m).expect("fixture");
        assert_eq!(fixture.external_id, "444361");
        assert_eq!(fixture.home_team, "HomeA");
        assert_eq!(fixture.away_team, "AwayB");
        assert_eq!(fixture.match_date, "01/06/2024 20:00");
        assert_eq!(fixture.winner.as_deref(), Some("HOME_TEAM"));
        assert_eq!(fixture.home_score, Some(2));
        assert_eq!(fixture.away_score, Some(0));
    }

    #[test]
    fn drops_fixtures_missing_a_team_name() {
        let m = provider_match(
            r#"{
                "id": 1,
                "utcDate": "2024-06-01T20:00:00Z",
                "status": "TIMED",
                "homeTeam": {"name": null},
                "awayTeam": {"name": "AwayB"},
                "score": null
            }"#,
        );
        assert!(normalize(m).is_none());

        let m = provider_match(
            r#"{
                "id": 2,
                "utcDate": "2024-06-01T20:00:00Z",
                "status": "TIMED",
                "homeTeam": {"name": "HomeA"},
                "awayTeam": null,
                "score": null
            }"#,
        );
        assert!(normalize(m).is_none());
    }

    #[test]
    fn drops_fixtures_with_unparseable_dates() {
        let m = provider_match(
            r#"{
                "id": 3,
                "utcDate": "yesterday",
                "status": "TIMED",
                "homeTeam": {"name": "HomeA"},
                "awayTeam": {"name": "AwayB"},
                "score": null
            }"#,
        );
        assert!(normalize(m).is_none());
    }

    #[test]
    fn scheduled_fixtures_have_no_result_fields() {
        let m = provider_match(
            r#"{
                "id": 4,
                "utcDate": "2024-06-03T20:00:00Z",
                "status": "TIMED",
                "homeTeam": {"name": "HomeE"},
                "awayTeam": {"name": "AwayF"},
                "score": {"winner": null, "fullTime": {"home": null, "away": null}}
            }"#,
        );

        let fixture = normalize(m).expect("fixture");
        assert_eq!(fixture.status, "TIMED");
        assert!(fixture.winner.is_none());
        assert!(fixture.home_score.is_none());
        assert!(fixture.away_score.is_none());
    }
}
