use anyhow::Result;
use sqlx::SqlitePool;
use thiserror::Error;

use crate::db;
use crate::models::{ImportOutcome, MatchPrediction, Participant};
use crate::services::scoring::is_pick;
use crate::utils::participant_from_filename;

pub const EXPORT_HEADERS: [&str; 3] = ["Match", "Match Date", "Prediction"];

/// Whole-import failures. Row-level problems never land here; they are
/// folded into the seen/applied counters instead.
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("No file uploaded")]
    MissingFile,
    #[error("No participants in the group")]
    NoParticipants,
    #[error("Participant '{0}' not found")]
    UnknownParticipant(String),
    #[error("{0}")]
    Store(anyhow::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportRow {
    pub home_team: String,
    pub away_team: String,
    pub match_date: String,
    pub prediction: String,
}

/// Parse one data row: `"{home} vs {away};{date};{prediction}"`. The
/// prediction is the last semicolon field, trimmed. None when the row has
/// fewer than three fields or no " vs " separator.
fn parse_line(line: &str) -> Option<ImportRow> {
    let fields: Vec<&str> = line.split(';').collect();
    if fields.len() < 3 {
        return None;
    }

    let (home_team, away_team) = fields[0].split_once(" vs ")?;
    let prediction = fields[fields.len() - 1].trim();

    Some(ImportRow {
        home_team: home_team.to_string(),
        away_team: away_team.to_string(),
        match_date: fields[1].to_string(),
        prediction: prediction.to_string(),
    })
}

/// Import an uploaded prediction file for the participant named by the
/// filename prefix. The first line is a header and is skipped; each further
/// line is one match row. Rows without a valid pick count as seen but are
/// not applied; valid rows are upserted by the natural key
/// (participant, date, home, away).
pub async fn import_predictions(
    pool: &SqlitePool,
    group_id: &str,
    filename: &str,
    body: &str,
) -> Result<ImportOutcome, ImportError> {
    let participants = db::participants_for_group(pool, group_id)
        .await
        .map_err(ImportError::Store)?;
    if participants.is_empty() {
        return Err(ImportError::NoParticipants);
    }

    let name = participant_from_filename(filename);
    let Some(participant) = participants.into_iter().find(|p| p.name == name) else {
        return Err(ImportError::UnknownParticipant(name.to_string()));
    };

    let mut rows_seen = 0usize;
    let mut rows_applied = 0usize;

    for line in body.lines().skip(1) {
        if line.trim().is_empty() {
            continue;
        }
        rows_seen += 1;

        let Some(row) = parse_line(line) else {
            continue;
        };
        if !is_pick(&row.prediction) {
            continue;
        }

        rows_applied += 1;
        upsert(pool, &participant, &row)
            .await
            .map_err(ImportError::Store)?;
    }

    tracing::info!(
        "Imported predictions for '{}': {} applied out of {} rows",
        participant.name,
        rows_applied,
        rows_seen
    );

    Ok(ImportOutcome {
        participant: participant.name,
        rows_seen,
        rows_applied,
    })
}

async fn upsert(pool: &SqlitePool, participant: &Participant, row: &ImportRow) -> Result<()> {
    // re-link the denormalized row: store the real fixture id whenever the
    // teams and kickoff match a stored match
    let match_id = db::resolve_match_id(
        pool,
        &participant.group_id,
        &row.home_team,
        &row.away_team,
        &row.match_date,
    )
    .await?;

    let existing = db::find_prediction(
        pool,
        &participant.id,
        &row.match_date,
        &row.home_team,
        &row.away_team,
    )
    .await?;

    match existing {
        Some(prediction) => {
            db::update_prediction(pool, &prediction.id, &row.prediction, match_id.as_deref()).await
        }
        None => {
            db::insert_prediction(
                pool,
                &participant.id,
                match_id.as_deref(),
                &row.match_date,
                &row.home_team,
                &row.away_team,
                &row.prediction,
            )
            .await
        }
    }
}

/// Serialize a participant's prediction lines into the attachment body.
/// Unset picks (missing row or "-") export as an empty field. The delimiter
/// is the same ";" the import format uses, so an exported file re-imports
/// cleanly.
pub fn export_csv(lines: &[MatchPrediction]) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    {
        let mut writer = csv::WriterBuilder::new().delimiter(b';').from_writer(&mut buf);
        writer.write_record(EXPORT_HEADERS)?;

        for line in lines {
            let prediction = match line.prediction.as_deref() {
                None | Some("-") => "",
                Some(pick) => pick,
            };
            writer.write_record([
                format!("{} vs {}", line.home_team, line.away_team),
                line.match_date.clone(),
                prediction.to_string(),
            ])?;
        }

        writer.flush()?;
    }
    Ok(buf)
}

pub fn export_filename(participant: &str) -> String {
    format!("{}_predictions.csv", participant)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{sample_fixtures, test_pool};
    use crate::models::Group;

    const IMPORT_BODY: &str = "Match;Match Date;Prediction\n\
                               HomeA vs AwayB;01/06/2024 20:00;1\n\
                               HomeC vs AwayD;02/06/2024 17:00;X\n\
                               HomeE vs AwayF;03/06/2024 20:00;\n";

    #[test]
    fn parses_a_data_row() {
        let row = parse_line("HomeA vs AwayB;01/06/2024 20:00;1").unwrap();
        assert_eq!(row.home_team, "HomeA");
        assert_eq!(row.away_team, "AwayB");
        assert_eq!(row.match_date, "01/06/2024 20:00");
        assert_eq!(row.prediction, "1");
    }

    #[test]
    fn trims_the_prediction_field() {
        let row = parse_line("HomeA vs AwayB;01/06/2024 20:00; X ").unwrap();
        assert_eq!(row.prediction, "X");
    }

    #[test]
    fn rejects_malformed_rows() {
        assert!(parse_line("HomeA-AwayB;01/06/2024 20:00;1").is_none());
        assert!(parse_line("HomeA vs AwayB;1").is_none());
        assert!(parse_line("").is_none());
    }

    #[test]
    fn exports_blank_for_unset_picks() {
        let lines = vec![
            MatchPrediction {
                home_team: "HomeA".to_string(),
                away_team: "AwayB".to_string(),
                match_date: "01/06/2024 20:00".to_string(),
                status: "FINISHED".to_string(),
                winner: Some("HOME_TEAM".to_string()),
                prediction: Some("1".to_string()),
            },
            MatchPrediction {
                home_team: "HomeC".to_string(),
                away_team: "AwayD".to_string(),
                match_date: "02/06/2024 17:00".to_string(),
                status: "TIMED".to_string(),
                winner: None,
                prediction: Some("-".to_string()),
            },
            MatchPrediction {
                home_team: "HomeE".to_string(),
                away_team: "AwayF".to_string(),
                match_date: "03/06/2024 20:00".to_string(),
                status: "TIMED".to_string(),
                winner: None,
                prediction: None,
            },
        ];

        let body = String::from_utf8(export_csv(&lines).unwrap()).unwrap();
        let rows: Vec<&str> = body.lines().collect();
        assert_eq!(rows[0], "Match;Match Date;Prediction");
        assert_eq!(rows[1], "HomeA vs AwayB;01/06/2024 20:00;1");
        assert_eq!(rows[2], "HomeC vs AwayD;02/06/2024 17:00;");
        assert_eq!(rows[3], "HomeE vs AwayF;03/06/2024 20:00;");
    }

    async fn group_with_alice(pool: &sqlx::SqlitePool) -> (Group, Participant) {
        let group = db::insert_group(pool, "Euro").await.unwrap();
        db::insert_matches(pool, &group.id, &sample_fixtures()).await.unwrap();
        let (alice, _) = db::add_participant(pool, &group.id, "Alice").await.unwrap();
        (group, alice)
    }

    #[tokio::test]
    async fn applies_valid_rows_and_counts_the_rest() {
        let pool = test_pool().await;
        let (group, alice) = group_with_alice(&pool).await;

        let outcome = import_predictions(&pool, &group.id, "Alice_predictions.csv", IMPORT_BODY)
            .await
            .unwrap();

        assert_eq!(outcome.participant, "Alice");
        assert_eq!(outcome.rows_seen, 3);
        assert_eq!(outcome.rows_applied, 2);

        let first = db::find_prediction(&pool, &alice.id, "01/06/2024 20:00", "HomeA", "AwayB")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(first.prediction, "1");
        assert_eq!(first.match_id.as_deref(), Some("1001"));

        // the blank row left the placeholder untouched
        let third = db::find_prediction(&pool, &alice.id, "03/06/2024 20:00", "HomeE", "AwayF")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(third.prediction, "-");
    }

    #[tokio::test]
    async fn single_row_scenario() {
        let pool = test_pool().await;
        let (group, alice) = group_with_alice(&pool).await;

        let body = "Match;Match Date;Prediction\nHomeA vs AwayB;01/06/2024 20:00;1\n";
        let outcome = import_predictions(&pool, &group.id, "Alice_predictions.csv", body)
            .await
            .unwrap();

        assert_eq!(outcome.rows_seen, 1);
        assert_eq!(outcome.rows_applied, 1);
        let row = db::find_prediction(&pool, &alice.id, "01/06/2024 20:00", "HomeA", "AwayB")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(row.prediction, "1");
    }

    #[tokio::test]
    async fn overwrites_an_existing_prediction() {
        let pool = test_pool().await;
        let (group, alice) = group_with_alice(&pool).await;

        let first = "Match;Match Date;Prediction\nHomeA vs AwayB;01/06/2024 20:00;1\n";
        let second = "Match;Match Date;Prediction\nHomeA vs AwayB;01/06/2024 20:00;2\n";
        import_predictions(&pool, &group.id, "Alice_predictions.csv", first).await.unwrap();
        import_predictions(&pool, &group.id, "Alice_predictions.csv", second).await.unwrap();

        let row = db::find_prediction(&pool, &alice.id, "01/06/2024 20:00", "HomeA", "AwayB")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(row.prediction, "2");
        // upsert, not insert: still one row per match
        assert_eq!(db::predictions_for_participant(&pool, &alice.id).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn unknown_participant_fails_without_writing() {
        let pool = test_pool().await;
        let (group, alice) = group_with_alice(&pool).await;

        let result =
            import_predictions(&pool, &group.id, "Mallory_predictions.csv", IMPORT_BODY).await;
        assert!(matches!(result, Err(ImportError::UnknownParticipant(name)) if name == "Mallory"));

        let predictions = db::predictions_for_participant(&pool, &alice.id).await.unwrap();
        assert!(predictions.iter().all(|p| p.prediction == "-"));
    }

    #[tokio::test]
    async fn empty_group_fails_before_any_parsing() {
        let pool = test_pool().await;
        let group = db::insert_group(&pool, "Euro").await.unwrap();

        let result =
            import_predictions(&pool, &group.id, "Alice_predictions.csv", IMPORT_BODY).await;
        assert!(matches!(result, Err(ImportError::NoParticipants)));
    }

    #[tokio::test]
    async fn row_without_a_stored_fixture_keeps_a_null_match_id() {
        let pool = test_pool().await;
        let (group, alice) = group_with_alice(&pool).await;

        let body = "Match;Match Date;Prediction\nGhost vs Phantom;09/09/2024 10:00;2\n";
        let outcome = import_predictions(&pool, &group.id, "Alice_predictions.csv", body)
            .await
            .unwrap();
        assert_eq!(outcome.rows_applied, 1);

        let orphan = db::find_prediction(&pool, &alice.id, "09/09/2024 10:00", "Ghost", "Phantom")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(orphan.prediction, "2");
        assert!(orphan.match_id.is_none());

        // invisible to the fixture-id join used by grid and export
        let lines = db::prediction_lines(&pool, &alice.id, &group.id).await.unwrap();
        assert_eq!(lines.len(), 3);
    }

    #[tokio::test]
    async fn export_then_import_leaves_predictions_unchanged() {
        let pool = test_pool().await;
        let (group, alice) = group_with_alice(&pool).await;

        import_predictions(&pool, &group.id, "Alice_predictions.csv", IMPORT_BODY)
            .await
            .unwrap();
        let before = db::predictions_for_participant(&pool, &alice.id).await.unwrap();

        let lines = db::prediction_lines(&pool, &alice.id, &group.id).await.unwrap();
        let body = String::from_utf8(export_csv(&lines).unwrap()).unwrap();
        let outcome = import_predictions(&pool, &group.id, &export_filename("Alice"), &body)
            .await
            .unwrap();

        assert_eq!(outcome.rows_seen, 3);
        assert_eq!(outcome.rows_applied, 2);

        let after = db::predictions_for_participant(&pool, &alice.id).await.unwrap();
        assert_eq!(before.len(), after.len());
        for (b, a) in before.iter().zip(after.iter()) {
            assert_eq!(b.id, a.id);
            assert_eq!(b.prediction, a.prediction);
        }
    }
}
