//! Mock interview data model: a session owns an append-only conversation of
//! turns and a monotonic `active → completed` status.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Active,
    Completed,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Active => "active",
            SessionStatus::Completed => "completed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    Interviewer,
    Candidate,
}

/// One entry in the conversation timeline. `feedback` and `rating` are only
/// present on candidate turns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    pub speaker: Speaker,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feedback: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<i32>,
    pub timestamp: DateTime<Utc>,
}

impl Turn {
    pub fn interviewer(content: impl Into<String>) -> Self {
        Turn {
            speaker: Speaker::Interviewer,
            content: content.into(),
            feedback: None,
            rating: None,
            timestamp: Utc::now(),
        }
    }

    pub fn candidate(content: impl Into<String>, feedback: String, rating: i32) -> Self {
        Turn {
            speaker: Speaker::Candidate,
            content: content.into(),
            feedback: Some(feedback),
            rating: Some(rating),
            timestamp: Utc::now(),
        }
    }
}

/// One mock interview. The conversation is ordered and append-only; it is
/// never reordered or rewritten, only extended (and trimmed of a trailing
/// unanswered question at completion).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterviewSession {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub role: String,
    pub experience_years: i32,
    pub topics: String,
    pub status: SessionStatus,
    pub conversation: Vec<Turn>,
    pub overall_feedback: Option<String>,
    pub overall_score: Option<i32>,
    /// Optimistic-concurrency counter; bumped on every persisted mutation.
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl InterviewSession {
    pub fn new(
        owner_id: Uuid,
        role: impl Into<String>,
        experience_years: i32,
        topics: impl Into<String>,
        opening_question: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        InterviewSession {
            id: Uuid::new_v4(),
            owner_id,
            role: role.into(),
            experience_years,
            topics: topics.into(),
            status: SessionStatus::Active,
            conversation: vec![Turn::interviewer(opening_question)],
            overall_feedback: None,
            overall_score: None,
            version: 1,
            created_at: now,
            updated_at: now,
        }
    }

    /// The most recent interviewer turn — the question the candidate is
    /// expected to answer next. `None` means the record is corrupt.
    pub fn pending_question(&self) -> Option<&Turn> {
        self.conversation
            .iter()
            .rev()
            .find(|t| t.speaker == Speaker::Interviewer)
    }

    pub fn push_candidate(&mut self, answer: impl Into<String>, feedback: String, rating: i32) {
        self.conversation
            .push(Turn::candidate(answer, feedback, rating));
        self.touch();
    }

    pub fn push_interviewer(&mut self, question: impl Into<String>) {
        self.conversation.push(Turn::interviewer(question));
        self.touch();
    }

    /// Transitions to `completed`, recording the summary fields and dropping
    /// a trailing unanswered interviewer question if one exists. There is no
    /// reverse transition.
    pub fn complete(&mut self, overall_feedback: String, overall_score: i32) {
        if matches!(
            self.conversation.last(),
            Some(t) if t.speaker == Speaker::Interviewer
        ) {
            self.conversation.pop();
        }
        self.status = SessionStatus::Completed;
        self.overall_feedback = Some(overall_feedback);
        self.overall_score = Some(overall_score);
        self.touch();
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> InterviewSession {
        InterviewSession::new(
            Uuid::new_v4(),
            "Backend Engineer",
            3,
            "APIs, Databases",
            "What is REST?",
        )
    }

    #[test]
    fn test_new_session_is_active_with_one_interviewer_turn() {
        let s = session();
        assert_eq!(s.status, SessionStatus::Active);
        assert_eq!(s.conversation.len(), 1);
        assert_eq!(s.conversation[0].speaker, Speaker::Interviewer);
        assert_eq!(s.conversation[0].content, "What is REST?");
        assert_eq!(s.version, 1);
    }

    #[test]
    fn test_pending_question_is_most_recent_interviewer_turn() {
        let mut s = session();
        s.push_candidate("An architectural style", "Good".to_string(), 7);
        s.push_interviewer("What is statelessness?");
        assert_eq!(
            s.pending_question().unwrap().content,
            "What is statelessness?"
        );
    }

    #[test]
    fn test_complete_strips_trailing_unanswered_question() {
        let mut s = session();
        s.push_candidate("An architectural style", "Good".to_string(), 7);
        s.push_interviewer("What is statelessness?");
        s.complete("Solid fundamentals".to_string(), 80);
        assert_eq!(s.status, SessionStatus::Completed);
        assert_eq!(s.conversation.len(), 2);
        assert_eq!(s.conversation.last().unwrap().speaker, Speaker::Candidate);
        assert_eq!(s.overall_score, Some(80));
    }

    #[test]
    fn test_complete_keeps_conversation_ending_in_candidate_turn() {
        let mut s = session();
        s.push_candidate("An architectural style", "Good".to_string(), 7);
        s.complete("Short but fine".to_string(), 60);
        assert_eq!(s.conversation.len(), 2);
    }

    #[test]
    fn test_turn_serialization_omits_absent_feedback() {
        let turn = Turn::interviewer("What is REST?");
        let json = serde_json::to_value(&turn).unwrap();
        assert!(json.get("feedback").is_none());
        assert!(json.get("rating").is_none());
        assert_eq!(json["speaker"], "interviewer");
    }

    #[test]
    fn test_session_round_trips_through_json() {
        let mut s = session();
        s.push_candidate("An answer", "Decent".to_string(), 6);
        let json = serde_json::to_string(&s).unwrap();
        let recovered: InterviewSession = serde_json::from_str(&json).unwrap();
        assert_eq!(recovered.id, s.id);
        assert_eq!(recovered.conversation.len(), 2);
        assert_eq!(recovered.conversation[1].rating, Some(6));
    }
}
