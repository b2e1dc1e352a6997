use anyhow::Result;

use crate::db;
use crate::services::{scoring, FixtureClient};

pub async fn list_groups() -> Result<()> {
    let pool = db::create_pool().await?;

    let groups = db::list_groups(&pool).await?;
    if groups.is_empty() {
        println!("📭 No groups found.");
        return Ok(());
    }

    println!("🏟️  Groups:\n");
    for group in groups {
        println!(
            "   • {}: {} participants, {} matches (id {})",
            group.name, group.participant_count, group.match_count, group.id
        );
    }

    Ok(())
}

pub async fn show_standings(group_ref: &str) -> Result<()> {
    let pool = db::create_pool().await?;

    // accept either a group id or its exact name
    let group = match db::get_group(&pool, group_ref).await? {
        Some(group) => Some(group),
        None => db::find_group_by_name(&pool, group_ref).await?,
    };
    let Some(group) = group else {
        println!("❌ No group matching '{}'", group_ref);
        return Ok(());
    };

    let matches = db::matches_for_group(&pool, &group.id).await?;
    let participants = db::participants_for_group(&pool, &group.id).await?;
    if participants.is_empty() {
        println!("📭 No participants in '{}' yet.", group.name);
        return Ok(());
    }

    let mut rows = Vec::new();
    for participant in &participants {
        let lines = db::prediction_lines(&pool, &participant.id, &group.id).await?;
        rows.push(scoring::grid_row(participant, &lines));
    }

    println!("🏆 Standings for {} ({} matches):\n", group.name, matches.len());
    for (i, standing) in scoring::standings(&rows).iter().enumerate() {
        println!("{:>2}. {:<24} {} pts", i + 1, standing.name, standing.points);
    }

    Ok(())
}

pub async fn preview_fixtures() -> Result<()> {
    let client = FixtureClient::new();
    if !client.has_api_key() {
        println!("❌ FOOTBALL_DATA_API_KEY not set");
        return Ok(());
    }

    let fixtures = client.fetch_fixtures().await;
    if fixtures.is_empty() {
        println!("📭 Provider returned no fixtures.");
        return Ok(());
    }

    println!("📅 {} fixtures:\n", fixtures.len());
    for fixture in fixtures.iter().take(20) {
        let score = match (fixture.home_score, fixture.away_score) {
            (Some(home), Some(away)) => format!("{} : {}", home, away),
            _ => "- : -".to_string(),
        };
        println!(
            "   {}  {} vs {}  [{}]  {}",
            fixture.match_date, fixture.home_team, fixture.away_team, fixture.status, score
        );
    }
    if fixtures.len() > 20 {
        println!("   … and {} more", fixtures.len() - 20);
    }

    Ok(())
}
