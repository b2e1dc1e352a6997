use chrono::{DateTime, Utc};

/// Validate a group or participant name
pub fn validate_name(name: &str) -> bool {
    !name.trim().is_empty() && name.len() <= 100
}

/// Render a UTC kickoff in the display format stored on matches.
/// Import matching is an exact string comparison against this output.
pub fn format_kickoff(kickoff: DateTime<Utc>) -> String {
    kickoff.format("%d/%m/%Y %H:%M").to_string()
}

/// Derive the participant name from an upload filename.
/// Files are named `{participant}_predictions.csv`; everything before the
/// first underscore is the name. A filename without an underscore is used
/// as-is (and will simply fail to resolve).
pub fn participant_from_filename(filename: &str) -> &str {
    match filename.split_once('_') {
        Some((name, _)) => name,
        None => filename,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_validate_name() {
        assert!(validate_name("Euro 2024"));
        assert!(!validate_name(""));
        assert!(!validate_name("   "));
        assert!(!validate_name(&"x".repeat(101)));
    }

    #[test]
    fn test_format_kickoff() {
        let kickoff = Utc.with_ymd_and_hms(2024, 6, 1, 20, 0, 0).unwrap();
        assert_eq!(format_kickoff(kickoff), "01/06/2024 20:00");
    }

    #[test]
    fn test_participant_from_filename() {
        assert_eq!(participant_from_filename("Alice_predictions.csv"), "Alice");
        assert_eq!(participant_from_filename("Bob_euro_2024.csv"), "Bob");
        assert_eq!(participant_from_filename("noprefix.csv"), "noprefix.csv");
    }
}
