//! Climb metadata submitted with an upload.
//!
//! The pipeline never interprets these fields; they are validated at intake
//! and stored alongside the job unchanged.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Title used when the caller leaves it blank.
pub const DEFAULT_TITLE: &str = "Untitled";

/// Descriptive fields of a climbing video.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct ClimbMetadata {
    /// Owner identity
    #[validate(length(min = 1, max = 128))]
    pub user_id: String,

    /// Display title
    #[validate(length(min = 1, max = 200))]
    pub title: String,

    /// Date of the climb
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub climbed_date: Option<NaiveDate>,

    /// Climb type (e.g. "boulder", "sport")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(length(max = 64))]
    pub climb_type: Option<String>,

    /// Board type (e.g. "kilter", "moon")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(length(max = 64))]
    pub board_type: Option<String>,

    /// Board angle in degrees
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 0, max = 90))]
    pub board_angle: Option<i32>,

    /// Numeric V-grade
    #[serde(default)]
    #[validate(range(min = 0, max = 17))]
    pub grade: i32,

    /// Free-form tags
    #[serde(default)]
    pub tags: Vec<String>,

    /// Free-text description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(length(max = 4000))]
    pub description: Option<String>,

    /// External climb reference
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(url)]
    pub climb_url: Option<String>,

    /// Whether the climb was sent (flagged)
    #[serde(default)]
    pub is_send: bool,
}

impl ClimbMetadata {
    /// Create metadata with only the owner and title set.
    pub fn new(user_id: impl Into<String>, title: impl Into<String>) -> Self {
        let title = title.into();
        Self {
            user_id: user_id.into(),
            title: if title.trim().is_empty() {
                DEFAULT_TITLE.to_string()
            } else {
                title
            },
            climbed_date: None,
            climb_type: None,
            board_type: None,
            board_angle: None,
            grade: 0,
            tags: Vec::new(),
            description: None,
            climb_url: None,
            is_send: false,
        }
    }

    /// Set the grade.
    pub fn with_grade(mut self, grade: i32) -> Self {
        self.grade = grade;
        self
    }

    /// Set tags from a comma-separated string.
    pub fn with_tags(mut self, raw: &str) -> Self {
        self.tags = parse_tags(raw);
        self
    }
}

/// Split a comma-separated tag string, trimming blanks and dropping
/// empty entries. Order is preserved and duplicates are removed.
pub fn parse_tags(raw: &str) -> Vec<String> {
    let mut tags: Vec<String> = Vec::new();
    for tag in raw.split(',').map(str::trim).filter(|t| !t.is_empty()) {
        if !tags.iter().any(|t| t == tag) {
            tags.push(tag.to_string());
        }
    }
    tags
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_tags() {
        assert_eq!(parse_tags("board,comp"), vec!["board", "comp"]);
        assert_eq!(parse_tags(" board , ,comp,"), vec!["board", "comp"]);
        assert_eq!(parse_tags("crimp,crimp,sloper"), vec!["crimp", "sloper"]);
        assert!(parse_tags("").is_empty());
        assert!(parse_tags(" , ").is_empty());
    }

    #[test]
    fn test_blank_title_defaults() {
        let meta = ClimbMetadata::new("user-1", "   ");
        assert_eq!(meta.title, DEFAULT_TITLE);
    }

    #[test]
    fn test_validation() {
        let meta = ClimbMetadata::new("user-1", "Warm up").with_grade(5);
        assert!(meta.validate().is_ok());

        let bad_grade = ClimbMetadata::new("user-1", "Warm up").with_grade(42);
        assert!(bad_grade.validate().is_err());

        let mut bad_angle = ClimbMetadata::new("user-1", "Warm up");
        bad_angle.board_angle = Some(120);
        assert!(bad_angle.validate().is_err());

        let mut bad_url = ClimbMetadata::new("user-1", "Warm up");
        bad_url.climb_url = Some("not a url".to_string());
        assert!(bad_url.validate().is_err());

        let no_owner = ClimbMetadata::new("", "Warm up");
        assert!(no_owner.validate().is_err());
    }
}
