//! Per-principal questionnaire session: ordered questions and answers.

use serde::{Deserialize, Serialize};

use crate::error::SessionError;

/// One principal's question/answer transcript.
///
/// The cursor is always `questions.len()`. Answers never outnumber
/// questions, and `answers[i]` answers `questions[i]`.
#[derive(Debug, Clone, Default)]
pub struct Session {
    questions: Vec<String>,
    answers: Vec<String>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn questions(&self) -> &[String] {
        &self.questions
    }

    pub fn answers(&self) -> &[String] {
        &self.answers
    }

    /// Position of the next question to generate.
    pub fn cursor(&self) -> usize {
        self.questions.len()
    }

    pub(crate) fn push_question(&mut self, question: String) {
        self.questions.push(question);
    }

    /// Append an answer if `position` is exactly the next unanswered question.
    /// On error the session is untouched.
    pub fn record_answer(&mut self, position: usize, answer: String) -> Result<usize, SessionError> {
        let expected = self.answers.len();
        if position != expected {
            return Err(SessionError::OutOfOrderAnswer {
                claimed: position,
                expected,
            });
        }
        if position >= self.questions.len() {
            return Err(SessionError::NoMatchingQuestion { position });
        }
        self.answers.push(answer);
        Ok(position + 1)
    }

    /// Questions that already have answers, paired with them.
    pub fn answered_pairs(&self) -> Vec<(String, String)> {
        self.questions
            .iter()
            .cloned()
            .zip(self.answers.iter().cloned())
            .collect()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            questions: self.questions.clone(),
            answers: self.answers.clone(),
            current_num: self.cursor(),
        }
    }
}

/// Point-in-time copy of a session, as returned to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub questions: Vec<String>,
    pub answers: Vec<String>,
    pub current_num: usize,
}

impl SessionSnapshot {
    /// Every question asked so far, with `None` for those not yet answered.
    pub fn transcript(&self) -> Vec<(String, Option<String>)> {
        self.questions
            .iter()
            .enumerate()
            .map(|(i, q)| (q.clone(), self.answers.get(i).cloned()))
            .collect()
    }
}
