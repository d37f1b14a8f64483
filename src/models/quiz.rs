//! Quiz models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Default passing score in percent
pub const DEFAULT_PASS_SCORE: i32 = 60;

/// Quiz attached to a course unit
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Quiz {
    pub id: i64,
    pub unit_id: i64,
    pub title: String,
    /// Minimum score (percent) for an attempt to pass
    pub pass_score: i32,
    pub created_at: DateTime<Utc>,
}

/// Answer options of a multiple-choice question, stored as a JSON array
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QuestionOptions(pub Vec<String>);

#[derive(Debug, thiserror::Error)]
#[error("Invalid question options: {0}")]
pub struct ParseOptionsError(#[from] serde_json::Error);

impl TryFrom<String> for QuestionOptions {
    type Error = ParseOptionsError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Ok(Self(serde_json::from_str(&value)?))
    }
}

impl QuestionOptions {
    pub fn to_json(&self) -> String {
        serde_json::to_string(&self.0).unwrap_or_else(|_| "[]".to_string())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Question {
    pub id: i64,
    pub quiz_id: i64,
    pub prompt: String,
    #[sqlx(try_from = "String")]
    pub options: QuestionOptions,
    /// Index into `options` of the right answer
    pub correct_index: i32,
    pub position: i32,
}

/// Question as shown to a learner, without the answer
#[derive(Debug, Clone, Serialize)]
pub struct PublicQuestion {
    pub id: i64,
    pub prompt: String,
    pub options: QuestionOptions,
    pub position: i32,
}

impl From<Question> for PublicQuestion {
    fn from(q: Question) -> Self {
        Self {
            id: q.id,
            prompt: q.prompt,
            options: q.options,
            position: q.position,
        }
    }
}

/// A scored submission of a quiz by a user
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct QuizAttempt {
    pub id: i64,
    pub quiz_id: i64,
    pub user_id: i64,
    pub score: i32,
    pub passed: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateQuizInput {
    pub title: String,
    #[serde(default)]
    pub pass_score: Option<i32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateQuizInput {
    pub title: Option<String>,
    pub pass_score: Option<i32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateQuestionInput {
    pub prompt: String,
    pub options: Vec<String>,
    pub correct_index: i32,
    #[serde(default)]
    pub position: Option<i32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateQuestionInput {
    pub prompt: Option<String>,
    pub options: Option<Vec<String>>,
    pub correct_index: Option<i32>,
    pub position: Option<i32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubmitAttemptInput {
    pub answers: Vec<i32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_options_from_json_text() {
        let options = QuestionOptions::try_from(r#"["a","b","c"]"#.to_string()).unwrap();
        assert_eq!(options.len(), 3);
        assert_eq!(options.to_json(), r#"["a","b","c"]"#);
        assert!(QuestionOptions::try_from("not json".to_string()).is_err());
    }

    #[test]
    fn test_public_question_hides_answer() {
        let q = Question {
            id: 3,
            quiz_id: 1,
            prompt: "2 + 2?".into(),
            options: QuestionOptions(vec!["3".into(), "4".into()]),
            correct_index: 1,
            position: 0,
        };
        let json = serde_json::to_value(PublicQuestion::from(q)).unwrap();
        assert!(json.get("correct_index").is_none());
        assert_eq!(json["options"][1], "4");
    }
}
