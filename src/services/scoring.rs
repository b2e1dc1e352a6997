use serde::Serialize;

use crate::models::{MatchPrediction, Participant, Standing};

/// A concrete pick, as opposed to the "-" placeholder.
pub fn is_pick(value: &str) -> bool {
    matches!(value, "1" | "X" | "2")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Correct,
    Incorrect,
    /// Match not finished; contributes to nobody's total.
    Neutral,
}

/// Score one pick against one match. Only FINISHED matches produce a
/// non-neutral verdict; on a finished match anything but the winning pick
/// (including the "-" placeholder) is incorrect.
pub fn verdict(status: &str, winner: Option<&str>, pick: &str) -> Verdict {
    if status != "FINISHED" {
        return Verdict::Neutral;
    }

    let correct = matches!(
        (winner, pick),
        (Some("HOME_TEAM"), "1") | (Some("DRAW"), "X") | (Some("AWAY_TEAM"), "2")
    );

    if correct {
        Verdict::Correct
    } else {
        Verdict::Incorrect
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct GridCell {
    pub prediction: String,
    pub verdict: Verdict,
}

/// One participant's row in the group grid.
#[derive(Debug, Clone, Serialize)]
pub struct GridRow {
    pub participant_id: String,
    pub participant: String,
    pub cells: Vec<GridCell>,
    pub points: u32,
    /// Every cell holds a concrete pick.
    pub complete: bool,
}

/// Build a participant's grid row from their joined prediction lines.
/// A missing prediction row scores exactly like the "-" placeholder.
pub fn grid_row(participant: &Participant, lines: &[MatchPrediction]) -> GridRow {
    let mut points = 0u32;

    let cells: Vec<GridCell> = lines
        .iter()
        .map(|line| {
            let pick = line.prediction.clone().unwrap_or_else(|| "-".to_string());
            let verdict = verdict(&line.status, line.winner.as_deref(), &pick);
            if verdict == Verdict::Correct {
                points += 1;
            }
            GridCell {
                prediction: pick,
                verdict,
            }
        })
        .collect();

    let complete = cells.iter().all(|cell| is_pick(&cell.prediction));

    GridRow {
        participant_id: participant.id.clone(),
        participant: participant.name.clone(),
        cells,
        points,
        complete,
    }
}

/// Rank rows by points, descending. The sort is stable and has no secondary
/// key: ties keep insertion order.
pub fn standings(rows: &[GridRow]) -> Vec<Standing> {
    let mut table: Vec<Standing> = rows
        .iter()
        .map(|row| Standing {
            participant_id: row.participant_id.clone(),
            name: row.participant.clone(),
            points: row.points,
        })
        .collect();

    table.sort_by(|a, b| b.points.cmp(&a.points));
    table
}
