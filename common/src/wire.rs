use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::MAX_SCORE;

/// Body of `PUT|POST /game/{game}/player/{player}/score`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScoreSubmission {
    pub score: u64,
}

#[derive(Debug, Error)]
pub enum SubmissionError {
    #[error("request body is empty, expected {{\"score\": <non-negative integer>}}")]
    EmptyBody,
    #[error("invalid score payload: {0}")]
    Invalid(#[from] serde_json::Error),
    #[error("score {0} exceeds the maximum score")]
    ScoreOutOfRange(u64),
}

impl ScoreSubmission {
    /// Parse and validate a raw request body
    pub fn parse(body: &[u8]) -> Result<Self, SubmissionError> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Err(SubmissionError::EmptyBody);
        }
        let submission: ScoreSubmission = serde_json::from_slice(body)?;
        if submission.score > MAX_SCORE {
            return Err(SubmissionError::ScoreOutOfRange(submission.score));
        }
        Ok(submission)
    }
}

/// One row of a scoreboard page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToplistEntry {
    pub rank: u64,
    pub player: String,
    pub score: u64,
}

/// Response of `GET /game/{game}/scoreboard`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreboardResponse {
    pub game: String,
    pub toplist: Vec<ToplistEntry>,
    /// Rank of the last row on this page, to be sent back as `last_rank`
    pub last_rank: u64,
    /// Encoded [`crate::PageCursor`]; absent on the last page
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_page: Option<String>,
}

/// Response of `GET /game/{game}/player/{player}/score`.
///
/// `rank` is derived from tier aggregates that are refreshed periodically, so
/// it may lag recent score changes of other players by up to one aggregation
/// interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerRankResponse {
    pub score: u64,
    pub rank: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_submission() {
        let submission = ScoreSubmission::parse(br#"{"score": 1500}"#).unwrap();
        assert_eq!(submission.score, 1500);
    }

    #[test]
    fn test_parse_rejects_invalid_submissions() {
        assert!(matches!(ScoreSubmission::parse(b""), Err(SubmissionError::EmptyBody)));
        assert!(matches!(ScoreSubmission::parse(b"  \n"), Err(SubmissionError::EmptyBody)));

        for body in [
            &br#"{}"#[..],
            br#"{"score": -1}"#,
            br#"{"score": 12.5}"#,
            br#"{"score": "12"}"#,
            br#"{"score": null}"#,
            br#"{"score": 1, "player": "x"}"#,
            br#"42"#,
        ] {
            assert!(
                matches!(ScoreSubmission::parse(body), Err(SubmissionError::Invalid(_))),
                "expected {:?} to be rejected",
                String::from_utf8_lossy(body)
            );
        }
    }

    #[test]
    fn test_parse_rejects_score_above_max() {
        let body = format!(r#"{{"score": {}}}"#, MAX_SCORE + 1);
        assert!(matches!(
            ScoreSubmission::parse(body.as_bytes()),
            Err(SubmissionError::ScoreOutOfRange(_))
        ));
    }

    #[test]
    fn test_scoreboard_response_omits_missing_cursor() {
        let response = ScoreboardResponse {
            game: "g".to_string(),
            toplist: vec![],
            last_rank: 0,
            next_page: None,
        };
        let json = serde_json::to_value(&response).unwrap();
        assert!(json.get("next_page").is_none());
    }
}
