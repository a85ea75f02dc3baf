//! Interview state machine — orchestrates provider calls and persistence for
//! one mock interview.
//!
//! Flow per chat turn: pending question → candidate answer → feedback call →
//! durable append → next-question call → append → persist.
//!
//! Durability policy: the candidate turn (answer + feedback + rating) is
//! persisted BEFORE the next-question call is attempted. A failure of that
//! second call surfaces as a generation error, but the answer is never lost
//! and never needs re-submitting.

use serde::Deserialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::cache::{sessions_key, ResponseCache, SESSIONS_TTL_SECS};
use crate::errors::AppError;
use crate::genai::{parse_lenient, Parsed, TextGenerator};
use crate::interview::models::{InterviewSession, SessionStatus, Speaker};
use crate::interview::prompts::{
    feedback_prompt, final_summary_prompt, next_question_prompt, opening_question_prompt,
};
use crate::interview::store::SessionStore;

/// Shape requested from the feedback call. A missing rating (or one the
/// model emits as something other than an integer, which fails the whole
/// parse) defaults to 0 — out-of-range integers are stored verbatim.
#[derive(Debug, Deserialize)]
struct FeedbackPayload {
    feedback: String,
    #[serde(default)]
    rating: i32,
}

/// Shape requested from the final summary call.
#[derive(Debug, Deserialize)]
struct SummaryPayload {
    #[serde(rename = "overallFeedback")]
    overall_feedback: String,
    #[serde(rename = "overallScore", default)]
    overall_score: i32,
}

/// Creates a session seeded with one AI-generated opening question.
pub async fn start_interview(
    store: &dyn SessionStore,
    provider: &dyn TextGenerator,
    cache: &dyn ResponseCache,
    owner_id: Uuid,
    role: &str,
    experience_years: i32,
    topics: &str,
) -> Result<InterviewSession, AppError> {
    let role = role.trim();
    let topics = topics.trim();
    if role.is_empty() || topics.is_empty() {
        return Err(AppError::Validation(
            "Missing required fields: role, experience, or topics".to_string(),
        ));
    }
    if experience_years < 0 {
        return Err(AppError::Validation(
            "experience_years must be zero or greater".to_string(),
        ));
    }

    let raw = provider
        .generate(&opening_question_prompt(role, experience_years, topics))
        .await?;
    let question = raw.trim();
    if question.is_empty() {
        return Err(AppError::Generation(
            "provider returned an empty opening question".to_string(),
        ));
    }

    let session = InterviewSession::new(owner_id, role, experience_years, topics, question);
    store.insert(&session).await?;
    cache.delete(&sessions_key(owner_id)).await;

    info!("Started interview {} for owner {}", session.id, owner_id);
    Ok(session)
}

/// One logical chat turn: evaluate the answer, then ask the next question.
pub async fn chat(
    store: &dyn SessionStore,
    provider: &dyn TextGenerator,
    id: Uuid,
    owner_id: Uuid,
    answer: &str,
) -> Result<InterviewSession, AppError> {
    let answer = answer.trim();
    if answer.is_empty() {
        return Err(AppError::Validation("Answer is required".to_string()));
    }

    let mut session = store
        .load(id, owner_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Interview not found".to_string()))?;

    if session.status == SessionStatus::Completed {
        return Err(AppError::InvalidState(
            "Interview is already completed".to_string(),
        ));
    }

    let pending = session
        .pending_question()
        .ok_or_else(|| AppError::InvalidState("Invalid conversation state".to_string()))?
        .content
        .clone();

    // Call 1: evaluate the answer. Malformed output degrades to raw text,
    // rating 0 — the turn must still progress.
    let raw = provider.generate(&feedback_prompt(&pending, answer)).await?;
    let (feedback, rating) = match parse_lenient::<FeedbackPayload>(&raw) {
        Parsed::Structured(p) => (p.feedback, p.rating),
        Parsed::Raw(text) => {
            warn!("Feedback response for interview {id} was not structured JSON; storing raw text");
            (text, 0)
        }
    };

    session.push_candidate(answer, feedback, rating);
    let expected = session.version;
    session.version += 1;
    // The answer is durable from here on; a next-question failure must not
    // roll it back.
    store.save(&session, expected).await?;

    // Call 2: next question over the full transcript so far.
    let raw = provider
        .generate(&next_question_prompt(&transcript(&session, false)))
        .await?;
    let next_question = raw.trim();
    if next_question.is_empty() {
        return Err(AppError::Generation(
            "provider returned an empty next question".to_string(),
        ));
    }

    session.push_interviewer(next_question);
    let expected = session.version;
    session.version += 1;
    store.save(&session, expected).await?;

    info!(
        "Interview {} advanced to {} turns",
        session.id,
        session.conversation.len()
    );
    Ok(session)
}

/// Completes the interview with an overall summary. Idempotent: calling it
/// on a completed session returns the stored result unchanged.
pub async fn end_interview(
    store: &dyn SessionStore,
    provider: &dyn TextGenerator,
    cache: &dyn ResponseCache,
    id: Uuid,
    owner_id: Uuid,
) -> Result<InterviewSession, AppError> {
    let mut session = store
        .load(id, owner_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Interview not found".to_string()))?;

    if session.status == SessionStatus::Completed {
        return Ok(session);
    }

    let raw = provider
        .generate(&final_summary_prompt(&transcript(&session, true)))
        .await?;
    let (overall_feedback, overall_score) = match parse_lenient::<SummaryPayload>(&raw) {
        Parsed::Structured(p) => (p.overall_feedback, p.overall_score),
        Parsed::Raw(text) => {
            warn!("Summary response for interview {id} was not structured JSON; storing raw text");
            (text, 0)
        }
    };

    session.complete(overall_feedback, overall_score);
    let expected = session.version;
    session.version += 1;
    store.save(&session, expected).await?;
    cache.delete(&sessions_key(owner_id)).await;

    info!(
        "Completed interview {} with score {:?}",
        session.id, session.overall_score
    );
    Ok(session)
}

/// Pure read.
pub async fn get_interview(
    store: &dyn SessionStore,
    id: Uuid,
    owner_id: Uuid,
) -> Result<InterviewSession, AppError> {
    store
        .load(id, owner_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Interview not found".to_string()))
}

/// Lists the owner's interviews, memoized for a few minutes. The cache is
/// invalidated on create/end/delete, never on read.
pub async fn list_interviews(
    store: &dyn SessionStore,
    cache: &dyn ResponseCache,
    owner_id: Uuid,
) -> Result<Vec<InterviewSession>, AppError> {
    let key = sessions_key(owner_id);

    if let Some(cached) = cache.get(&key).await {
        if let Ok(sessions) = serde_json::from_value::<Vec<InterviewSession>>(cached) {
            return Ok(sessions);
        }
    }

    let sessions = store.list_by_owner(owner_id).await?;
    if let Ok(value) = serde_json::to_value(&sessions) {
        cache.set(&key, &value, SESSIONS_TTL_SECS).await;
    }
    Ok(sessions)
}

pub async fn delete_interview(
    store: &dyn SessionStore,
    cache: &dyn ResponseCache,
    id: Uuid,
    owner_id: Uuid,
) -> Result<(), AppError> {
    let removed = store.delete(id, owner_id).await?;
    if !removed {
        return Err(AppError::NotFound("Interview not found".to_string()));
    }
    cache.delete(&sessions_key(owner_id)).await;
    info!("Deleted interview {id} for owner {owner_id}");
    Ok(())
}

/// Renders the conversation as a plain-text transcript with a context
/// header. For the final summary the trailing unanswered question is skipped
/// and candidate ratings are annotated.
fn transcript(session: &InterviewSession, for_summary: bool) -> String {
    let mut out = format!(
        "Interview Context: Role: {}, Experience: {} years, Topics: {}.\n\n",
        session.role, session.experience_years, session.topics
    );

    let mut turns = &session.conversation[..];
    if for_summary {
        if let Some((last, rest)) = turns.split_last() {
            if last.speaker == Speaker::Interviewer {
                turns = rest;
            }
        }
    }

    for turn in turns {
        let label = match turn.speaker {
            Speaker::Interviewer => "Interviewer",
            Speaker::Candidate => "Candidate",
        };
        out.push_str(&format!("{label}: {}\n", turn.content));
        if for_summary {
            if let Some(rating) = turn.rating.filter(|r| *r != 0) {
                out.push_str(&format!("(Rating: {rating}/10)\n"));
            }
        }
    }
    out
}
