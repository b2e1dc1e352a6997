use anyhow::Result;
use chrono::Utc;
use sqlx::{sqlite::SqliteConnectOptions, Row, SqlitePool};
use std::env;
use std::str::FromStr;
use uuid::Uuid;

use crate::models::*;

pub async fn create_pool() -> Result<SqlitePool> {
    let database_url =
        env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite:data/matchpool.db".to_string());

    // Strip the "sqlite:" prefix to get the file path, create parent dir if needed
    let file_path = database_url
        .strip_prefix("sqlite:///")
        .or_else(|| database_url.strip_prefix("sqlite://"))
        .or_else(|| database_url.strip_prefix("sqlite:"))
        .unwrap_or(&database_url);

    if let Some(parent) = std::path::Path::new(file_path).parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await.ok();
        }
    }

    let options = SqliteConnectOptions::from_str(&database_url)?
        .create_if_missing(true)
        .foreign_keys(true);

    let pool = SqlitePool::connect_with(options).await?;
    Ok(pool)
}

/// Called from the CLI where no pool exists yet.
pub async fn init_database() -> Result<()> {
    let pool = create_pool().await?;
    init_database_with_pool(&pool).await
}

/// Called from the server so schema creation shares the main pool.
pub async fn init_database_with_pool(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS groups (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS participants (
            id TEXT PRIMARY KEY,
            group_id TEXT NOT NULL,
            name TEXT NOT NULL,
            created_at TEXT NOT NULL,
            FOREIGN KEY (group_id) REFERENCES groups (id) ON DELETE CASCADE
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS matches (
            id TEXT PRIMARY KEY,
            group_id TEXT NOT NULL,
            match_id TEXT NOT NULL,
            home_team TEXT NOT NULL,
            away_team TEXT NOT NULL,
            match_date TEXT NOT NULL,
            status TEXT NOT NULL,
            winner TEXT,
            home_score INTEGER,
            away_score INTEGER,
            FOREIGN KEY (group_id) REFERENCES groups (id) ON DELETE CASCADE
        )
        "#,
    )
    .execute(pool)
    .await?;

    // match_id is nullable: imported rows that match no stored fixture keep NULL
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS predictions (
            id TEXT PRIMARY KEY,
            participant_id TEXT NOT NULL,
            match_id TEXT,
            match_date TEXT NOT NULL,
            home_team TEXT NOT NULL,
            away_team TEXT NOT NULL,
            prediction TEXT NOT NULL DEFAULT '-',
            FOREIGN KEY (participant_id) REFERENCES participants (id) ON DELETE CASCADE
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_participants_group ON participants(group_id)")
        .execute(pool)
        .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_matches_group ON matches(group_id)")
        .execute(pool)
        .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_predictions_participant ON predictions(participant_id)")
        .execute(pool)
        .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_predictions_natural \
         ON predictions(participant_id, match_date, home_team, away_team)",
    )
    .execute(pool)
    .await?;

    tracing::info!("Database initialized successfully");
    Ok(())
}

// Group operations

pub async fn insert_group(pool: &SqlitePool, name: &str) -> Result<Group> {
    let group = Group {
        id: Uuid::new_v4().to_string(),
        name: name.to_string(),
        created_at: Utc::now(),
    };

    sqlx::query("INSERT INTO groups (id, name, created_at) VALUES (?, ?, ?)")
        .bind(&group.id)
        .bind(&group.name)
        .bind(group.created_at.to_rfc3339())
        .execute(pool)
        .await?;

    Ok(group)
}

pub async fn get_group(pool: &SqlitePool, group_id: &str) -> Result<Option<Group>> {
    let row = sqlx::query("SELECT * FROM groups WHERE id = ?")
        .bind(group_id)
        .fetch_optional(pool)
        .await?;

    if let Some(row) = row {
        Ok(Some(Group {
            id: row.get("id"),
            name: row.get("name"),
            created_at: chrono::DateTime::parse_from_rfc3339(&row.get::<String, _>("created_at"))?
                .with_timezone(&Utc),
        }))
    } else {
        Ok(None)
    }
}

pub async fn find_group_by_name(pool: &SqlitePool, name: &str) -> Result<Option<Group>> {
    let row = sqlx::query("SELECT * FROM groups WHERE name = ?")
        .bind(name)
        .fetch_optional(pool)
        .await?;

    if let Some(row) = row {
        Ok(Some(Group {
            id: row.get("id"),
            name: row.get("name"),
            created_at: chrono::DateTime::parse_from_rfc3339(&row.get::<String, _>("created_at"))?
                .with_timezone(&Utc),
        }))
    } else {
        Ok(None)
    }
}

pub async fn list_groups(pool: &SqlitePool) -> Result<Vec<GroupSummary>> {
    let rows = sqlx::query(
        r#"
        SELECT groups.id, groups.name,
               (SELECT COUNT(*) FROM participants WHERE group_id = groups.id) AS participant_count,
               (SELECT COUNT(*) FROM matches WHERE group_id = groups.id) AS match_count
        FROM groups
        ORDER BY groups.rowid
        "#,
    )
    .fetch_all(pool)
    .await?;

    let mut groups = Vec::new();
    for row in rows {
        groups.push(GroupSummary {
            id: row.get("id"),
            name: row.get("name"),
            participant_count: row.get("participant_count"),
            match_count: row.get("match_count"),
        });
    }

    Ok(groups)
}

/// Delete a group and everything under it. The schema carries ON DELETE
/// CASCADE, but the two-level chain (group -> participant -> prediction) is
/// deleted explicitly inside one transaction so no orphans survive even on a
/// store without recursive cascade support.
pub async fn delete_group(pool: &SqlitePool, group_id: &str) -> Result<bool> {
    let mut tx = pool.begin().await?;

    sqlx::query(
        "DELETE FROM predictions WHERE participant_id IN \
         (SELECT id FROM participants WHERE group_id = ?)",
    )
    .bind(group_id)
    .execute(&mut *tx)
    .await?;

    sqlx::query("DELETE FROM participants WHERE group_id = ?")
        .bind(group_id)
        .execute(&mut *tx)
        .await?;

    sqlx::query("DELETE FROM matches WHERE group_id = ?")
        .bind(group_id)
        .execute(&mut *tx)
        .await?;

    let result = sqlx::query("DELETE FROM groups WHERE id = ?")
        .bind(group_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(result.rows_affected() > 0)
}

// Match operations

pub async fn insert_matches(pool: &SqlitePool, group_id: &str, fixtures: &[Fixture]) -> Result<usize> {
    let mut tx = pool.begin().await?;

    for fixture in fixtures {
        sqlx::query(
            r#"
            INSERT INTO matches
            (id, group_id, match_id, home_team, away_team, match_date, status, winner, home_score, away_score)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(group_id)
        .bind(&fixture.external_id)
        .bind(&fixture.home_team)
        .bind(&fixture.away_team)
        .bind(&fixture.match_date)
        .bind(&fixture.status)
        .bind(&fixture.winner)
        .bind(fixture.home_score)
        .bind(fixture.away_score)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(fixtures.len())
}

fn match_from_row(row: &sqlx::sqlite::SqliteRow) -> Match {
    Match {
        id: row.get("id"),
        group_id: row.get("group_id"),
        match_id: row.get("match_id"),
        home_team: row.get("home_team"),
        away_team: row.get("away_team"),
        match_date: row.get("match_date"),
        status: row.get("status"),
        winner: row.get("winner"),
        home_score: row.get("home_score"),
        away_score: row.get("away_score"),
    }
}

/// Matches in insertion order. match_date is a display string, so it is
/// useless as a sort key.
pub async fn matches_for_group(pool: &SqlitePool, group_id: &str) -> Result<Vec<Match>> {
    let rows = sqlx::query("SELECT * FROM matches WHERE group_id = ? ORDER BY rowid")
        .bind(group_id)
        .fetch_all(pool)
        .await?;

    Ok(rows.iter().map(match_from_row).collect())
}

// Participant operations

fn participant_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Participant> {
    Ok(Participant {
        id: row.get("id"),
        group_id: row.get("group_id"),
        name: row.get("name"),
        created_at: chrono::DateTime::parse_from_rfc3339(&row.get::<String, _>("created_at"))?
            .with_timezone(&Utc),
    })
}

pub async fn participants_for_group(pool: &SqlitePool, group_id: &str) -> Result<Vec<Participant>> {
    let rows = sqlx::query("SELECT * FROM participants WHERE group_id = ? ORDER BY rowid")
        .bind(group_id)
        .fetch_all(pool)
        .await?;

    let mut participants = Vec::new();
    for row in rows {
        participants.push(participant_from_row(&row)?);
    }

    Ok(participants)
}

pub async fn get_participant(pool: &SqlitePool, participant_id: &str) -> Result<Option<Participant>> {
    let row = sqlx::query("SELECT * FROM participants WHERE id = ?")
        .bind(participant_id)
        .fetch_optional(pool)
        .await?;

    match row {
        Some(row) => Ok(Some(participant_from_row(&row)?)),
        None => Ok(None),
    }
}

pub async fn find_participant_by_name(
    pool: &SqlitePool,
    group_id: &str,
    name: &str,
) -> Result<Option<Participant>> {
    let row = sqlx::query("SELECT * FROM participants WHERE group_id = ? AND name = ?")
        .bind(group_id)
        .bind(name)
        .fetch_optional(pool)
        .await?;

    match row {
        Some(row) => Ok(Some(participant_from_row(&row)?)),
        None => Ok(None),
    }
}

/// Add a participant and seed a "-" prediction per existing match.
/// A duplicate name within the group is a silent no-op: the existing row is
/// returned with `false`. Seeding failure does not roll the participant back;
/// missing rows score as unpredicted.
pub async fn add_participant(
    pool: &SqlitePool,
    group_id: &str,
    name: &str,
) -> Result<(Participant, bool)> {
    if let Some(existing) = find_participant_by_name(pool, group_id, name).await? {
        return Ok((existing, false));
    }

    let participant = Participant {
        id: Uuid::new_v4().to_string(),
        group_id: group_id.to_string(),
        name: name.to_string(),
        created_at: Utc::now(),
    };

    sqlx::query("INSERT INTO participants (id, group_id, name, created_at) VALUES (?, ?, ?, ?)")
        .bind(&participant.id)
        .bind(&participant.group_id)
        .bind(&participant.name)
        .bind(participant.created_at.to_rfc3339())
        .execute(pool)
        .await?;

    match seed_predictions(pool, &participant.id, group_id).await {
        Ok(seeded) => {
            tracing::info!("Seeded {} placeholder predictions for '{}'", seeded, participant.name)
        }
        Err(e) => tracing::warn!(
            "Participant '{}' created but prediction seeding failed: {}",
            participant.name,
            e
        ),
    }

    Ok((participant, true))
}

pub async fn rename_participant(pool: &SqlitePool, participant_id: &str, name: &str) -> Result<bool> {
    let result = sqlx::query("UPDATE participants SET name = ? WHERE id = ?")
        .bind(name)
        .bind(participant_id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn delete_participant(pool: &SqlitePool, participant_id: &str) -> Result<bool> {
    let mut tx = pool.begin().await?;

    sqlx::query("DELETE FROM predictions WHERE participant_id = ?")
        .bind(participant_id)
        .execute(&mut *tx)
        .await?;

    let result = sqlx::query("DELETE FROM participants WHERE id = ?")
        .bind(participant_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(result.rows_affected() > 0)
}

// Prediction operations

async fn seed_predictions(pool: &SqlitePool, participant_id: &str, group_id: &str) -> Result<u64> {
    let matches = matches_for_group(pool, group_id).await?;
    let mut tx = pool.begin().await?;

    for m in &matches {
        sqlx::query(
            r#"
            INSERT INTO predictions (id, participant_id, match_id, match_date, home_team, away_team, prediction)
            VALUES (?, ?, ?, ?, ?, ?, '-')
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(participant_id)
        .bind(&m.match_id)
        .bind(&m.match_date)
        .bind(&m.home_team)
        .bind(&m.away_team)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(matches.len() as u64)
}

/// One row per match in the group (insertion order), left-joined against the
/// participant's predictions by fixture id. Feeds both the grid and the
/// export.
pub async fn prediction_lines(
    pool: &SqlitePool,
    participant_id: &str,
    group_id: &str,
) -> Result<Vec<MatchPrediction>> {
    let rows = sqlx::query(
        r#"
        SELECT m.home_team, m.away_team, m.match_date, m.status, m.winner, p.prediction
        FROM matches m
        LEFT JOIN predictions p ON p.match_id = m.match_id AND p.participant_id = ?
        WHERE m.group_id = ?
        ORDER BY m.rowid
        "#,
    )
    .bind(participant_id)
    .bind(group_id)
    .fetch_all(pool)
    .await?;

    let mut lines = Vec::new();
    for row in rows {
        lines.push(MatchPrediction {
            home_team: row.get("home_team"),
            away_team: row.get("away_team"),
            match_date: row.get("match_date"),
            status: row.get("status"),
            winner: row.get("winner"),
            prediction: row.get("prediction"),
        });
    }

    Ok(lines)
}

/// Fixture id for the group's match with these teams and kickoff, if any.
pub async fn resolve_match_id(
    pool: &SqlitePool,
    group_id: &str,
    home_team: &str,
    away_team: &str,
    match_date: &str,
) -> Result<Option<String>> {
    let row = sqlx::query(
        "SELECT match_id FROM matches \
         WHERE group_id = ? AND home_team = ? AND away_team = ? AND match_date = ?",
    )
    .bind(group_id)
    .bind(home_team)
    .bind(away_team)
    .bind(match_date)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|r| r.get("match_id")))
}

fn prediction_from_row(row: &sqlx::sqlite::SqliteRow) -> Prediction {
    Prediction {
        id: row.get("id"),
        participant_id: row.get("participant_id"),
        match_id: row.get("match_id"),
        match_date: row.get("match_date"),
        home_team: row.get("home_team"),
        away_team: row.get("away_team"),
        prediction: row.get("prediction"),
    }
}

/// Lookup by the import natural key.
pub async fn find_prediction(
    pool: &SqlitePool,
    participant_id: &str,
    match_date: &str,
    home_team: &str,
    away_team: &str,
) -> Result<Option<Prediction>> {
    let row = sqlx::query(
        "SELECT * FROM predictions \
         WHERE participant_id = ? AND match_date = ? AND home_team = ? AND away_team = ?",
    )
    .bind(participant_id)
    .bind(match_date)
    .bind(home_team)
    .bind(away_team)
    .fetch_optional(pool)
    .await?;

    Ok(row.as_ref().map(prediction_from_row))
}

/// Overwrite the pick, backfilling the fixture id when it resolved.
pub async fn update_prediction(
    pool: &SqlitePool,
    prediction_id: &str,
    prediction: &str,
    match_id: Option<&str>,
) -> Result<()> {
    sqlx::query("UPDATE predictions SET prediction = ?, match_id = COALESCE(?, match_id) WHERE id = ?")
        .bind(prediction)
        .bind(match_id)
        .bind(prediction_id)
        .execute(pool)
        .await?;

    Ok(())
}

pub async fn insert_prediction(
    pool: &SqlitePool,
    participant_id: &str,
    match_id: Option<&str>,
    match_date: &str,
    home_team: &str,
    away_team: &str,
    prediction: &str,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO predictions (id, participant_id, match_id, match_date, home_team, away_team, prediction)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(Uuid::new_v4().to_string())
    .bind(participant_id)
    .bind(match_id)
    .bind(match_date)
    .bind(home_team)
    .bind(away_team)
    .bind(prediction)
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn predictions_for_participant(
    pool: &SqlitePool,
    participant_id: &str,
) -> Result<Vec<Prediction>> {
    let rows = sqlx::query("SELECT * FROM predictions WHERE participant_id = ? ORDER BY rowid")
        .bind(participant_id)
        .fetch_all(pool)
        .await?;

    Ok(rows.iter().map(prediction_from_row).collect())
}

#[cfg(test)]
pub(crate) async fn test_pool() -> SqlitePool {
    use sqlx::sqlite::SqlitePoolOptions;

    // every new connection to :memory: is a fresh empty database, so the
    // pool must be capped at a single connection
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("in-memory pool");
    init_database_with_pool(&pool).await.expect("schema init");
    pool
}

#[cfg(test)]
pub(crate) fn sample_fixtures() -> Vec<Fixture> {
    vec![
        Fixture {
            external_id: "1001".to_string(),
            home_team: "HomeA".to_string(),
            away_team: "AwayB".to_string(),
            match_date: "01/06/2024 20:00".to_string(),
            status: "FINISHED".to_string(),
            winner: Some("HOME_TEAM".to_string()),
            home_score: Some(2),
            away_score: Some(0),
        },
        Fixture {
            external_id: "1002".to_string(),
            home_team: "HomeC".to_string(),
            away_team: "AwayD".to_string(),
            match_date: "02/06/2024 17:00".to_string(),
            status: "FINISHED".to_string(),
            winner: Some("DRAW".to_string()),
            home_score: Some(1),
            away_score: Some(1),
        },
        Fixture {
            external_id: "1003".to_string(),
            home_team: "HomeE".to_string(),
            away_team: "AwayF".to_string(),
            match_date: "03/06/2024 20:00".to_string(),
            status: "TIMED".to_string(),
            winner: None,
            home_score: None,
            away_score: None,
        },
    ]
}
