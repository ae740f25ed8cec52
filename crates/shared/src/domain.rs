use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(pub i64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_newtype!(AlumniId);
id_newtype!(TagId);
id_newtype!(ThreadId);
id_newtype!(SurveyId);
id_newtype!(SectionId);
id_newtype!(QuestionId);
id_newtype!(OptionId);
id_newtype!(ResponseId);

/// Direction of a single vote click.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VoteDirection {
    #[serde(rename = "upvote")]
    Up,
    #[serde(rename = "downvote")]
    Down,
}

impl VoteDirection {
    pub fn as_str(self) -> &'static str {
        match self {
            VoteDirection::Up => "upvote",
            VoteDirection::Down => "downvote",
        }
    }
}

impl FromStr for VoteDirection {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "upvote" | "up" => Ok(VoteDirection::Up),
            "downvote" | "down" => Ok(VoteDirection::Down),
            other => Err(format!("unknown vote direction '{other}'")),
        }
    }
}

/// Standing vote of one alumnus on one thread.
///
/// On the wire a retraction is the string `"null"`, never a missing field, so
/// the aggregator can tell "never voted" from "vote removed".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Vote {
    #[default]
    #[serde(rename = "null")]
    None,
    #[serde(rename = "upvote")]
    Up,
    #[serde(rename = "downvote")]
    Down,
}

impl Vote {
    /// Contribution of this vote to a net score.
    pub fn weight(self) -> i64 {
        match self {
            Vote::None => 0,
            Vote::Up => 1,
            Vote::Down => -1,
        }
    }

    pub fn direction(self) -> Option<VoteDirection> {
        match self {
            Vote::None => None,
            Vote::Up => Some(VoteDirection::Up),
            Vote::Down => Some(VoteDirection::Down),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Vote::None => "null",
            Vote::Up => "upvote",
            Vote::Down => "downvote",
        }
    }
}

impl From<VoteDirection> for Vote {
    fn from(direction: VoteDirection) -> Self {
        match direction {
            VoteDirection::Up => Vote::Up,
            VoteDirection::Down => Vote::Down,
        }
    }
}

impl From<Option<VoteDirection>> for Vote {
    fn from(direction: Option<VoteDirection>) -> Self {
        direction.map(Vote::from).unwrap_or(Vote::None)
    }
}

impl fmt::Display for Vote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QuestionType {
    #[serde(rename = "Multiple Choice")]
    MultipleChoice,
    #[serde(rename = "Open-ended")]
    OpenEnded,
    #[serde(rename = "Rating")]
    Rating,
}

impl QuestionType {
    pub fn as_str(self) -> &'static str {
        match self {
            QuestionType::MultipleChoice => "Multiple Choice",
            QuestionType::OpenEnded => "Open-ended",
            QuestionType::Rating => "Rating",
        }
    }

    /// Only choice-style questions keep their option list.
    pub fn accepts_options(self) -> bool {
        matches!(self, QuestionType::MultipleChoice | QuestionType::Rating)
    }
}

impl FromStr for QuestionType {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "Multiple Choice" => Ok(QuestionType::MultipleChoice),
            "Open-ended" => Ok(QuestionType::OpenEnded),
            "Rating" => Ok(QuestionType::Rating),
            other => Err(format!("unknown question type '{other}'")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retracted_vote_uses_null_sentinel_string() {
        assert_eq!(serde_json::to_string(&Vote::None).expect("json"), "\"null\"");
        assert_eq!(
            serde_json::from_str::<Vote>("\"downvote\"").expect("vote"),
            Vote::Down
        );
    }

    #[test]
    fn missing_user_vote_maps_to_none() {
        let seeded: Option<VoteDirection> = serde_json::from_str("null").expect("json");
        assert_eq!(Vote::from(seeded), Vote::None);
    }

    #[test]
    fn question_type_keeps_display_labels() {
        let parsed: QuestionType = serde_json::from_str("\"Open-ended\"").expect("json");
        assert_eq!(parsed, QuestionType::OpenEnded);
        assert!(!parsed.accepts_options());
        assert!(QuestionType::Rating.accepts_options());
    }
}
