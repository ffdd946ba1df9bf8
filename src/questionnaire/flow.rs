//! QuestionFlow: strictly ordered question generation and answer recording.

use std::sync::Arc;

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::QuestionnaireConfig;
use crate::error::SessionError;
use crate::llm::{CompletionRequest, LlmProvider, complete_within};

use super::prompts::{plausible_question, question_messages};
use super::store::SessionStore;
use super::topics::topic_for;

/// Where a returned question came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuestionSource {
    /// Generated by the provider.
    Provider,
    /// The topic's fixed question, because the provider failed.
    Fallback,
    /// Already in the session; returned again unchanged.
    Replay,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedQuestion {
    pub question: String,
    pub next_cursor: usize,
    pub total: usize,
    pub source: QuestionSource,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnswerAck {
    pub next_cursor: usize,
}

/// Drives each principal through the questionnaire.
pub struct QuestionFlow {
    llm: Arc<dyn LlmProvider>,
    sessions: Arc<SessionStore>,
    config: QuestionnaireConfig,
}

impl QuestionFlow {
    pub fn new(
        llm: Arc<dyn LlmProvider>,
        sessions: Arc<SessionStore>,
        config: QuestionnaireConfig,
    ) -> Self {
        Self {
            llm,
            sessions,
            config,
        }
    }

    /// Produce the question at `cursor` of a `total`-question run.
    ///
    /// The principal's session stays locked for the whole call, including
    /// the provider round-trip, so concurrent requests for one principal
    /// are serialized. A question already present at `cursor` is returned
    /// as-is. The provider never causes an error here; whenever it fails or
    /// its output is implausible, the topic's fallback question is used.
    pub async fn next_question(
        &self,
        principal_id: Uuid,
        cursor: usize,
        total: usize,
    ) -> Result<GeneratedQuestion, SessionError> {
        if total == 0 {
            return Err(SessionError::InvalidQuestionCount {
                total,
                max: self.config.max_questions,
            });
        }
        if cursor >= total {
            return Err(SessionError::QuestionLimitReached { cursor, total });
        }
        if total > self.config.max_questions {
            return Err(SessionError::InvalidQuestionCount {
                total,
                max: self.config.max_questions,
            });
        }

        let handle = self.sessions.get_or_create(principal_id).await;
        let mut session = handle.lock().await;

        let expected = session.cursor();
        if cursor < expected {
            debug!(principal_id = %principal_id, cursor, "Replaying existing question");
            return Ok(GeneratedQuestion {
                question: session.questions()[cursor].clone(),
                next_cursor: cursor + 1,
                total,
                source: QuestionSource::Replay,
            });
        }
        if cursor > expected {
            return Err(SessionError::QuestionOutOfOrder { cursor, expected });
        }

        let topic = topic_for(cursor);
        let request = CompletionRequest::new(question_messages(
            topic,
            cursor,
            total,
            &session.answered_pairs(),
        ))
        .with_temperature(self.config.temperature)
        .with_max_tokens(self.config.max_tokens);

        let (question, source) =
            match complete_within(self.llm.as_ref(), request, self.config.provider_timeout).await {
                Ok(response) => match plausible_question(&response.content) {
                    Some(q) => (q, QuestionSource::Provider),
                    None => {
                        warn!(
                            principal_id = %principal_id,
                            topic = topic.slug,
                            "Provider returned an implausible question, using fallback"
                        );
                        (topic.fallback_question.to_string(), QuestionSource::Fallback)
                    }
                },
                Err(e) => {
                    warn!(
                        principal_id = %principal_id,
                        topic = topic.slug,
                        error = %e,
                        "Question generation failed, using fallback"
                    );
                    (topic.fallback_question.to_string(), QuestionSource::Fallback)
                }
            };

        session.push_question(question.clone());
        info!(
            principal_id = %principal_id,
            position = cursor,
            total,
            topic = topic.slug,
            source = ?source,
            "Question generated"
        );

        Ok(GeneratedQuestion {
            question,
            next_cursor: cursor + 1,
            total,
            source,
        })
    }

    /// Record the answer to the question at `position`.
    pub async fn record_answer(
        &self,
        principal_id: Uuid,
        position: usize,
        answer: String,
    ) -> Result<AnswerAck, SessionError> {
        let handle = self.sessions.get_or_create(principal_id).await;
        let next_cursor = handle.lock().await.record_answer(position, answer)?;
        debug!(principal_id = %principal_id, position, "Answer recorded");
        Ok(AnswerAck { next_cursor })
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::llm::mock::{Behavior, ScriptedProvider};
    use crate::questionnaire::prompts::MIN_QUESTION_CHARS;
    use crate::questionnaire::topics::TOPICS;

    const GOOD: &str = "朝の時間に本を読む習慣がありますか？";

    fn flow_with(provider: Arc<ScriptedProvider>) -> (QuestionFlow, Arc<SessionStore>) {
        let sessions = Arc::new(SessionStore::new());
        let flow = QuestionFlow::new(
            provider,
            Arc::clone(&sessions),
            QuestionnaireConfig::default(),
        );
        (flow, sessions)
    }

    #[tokio::test]
    async fn provider_question_is_appended() {
        let provider = Arc::new(ScriptedProvider::replying(&format!("  {GOOD}\n")));
        let (flow, sessions) = flow_with(Arc::clone(&provider));
        let id = Uuid::new_v4();

        let q = flow.next_question(id, 0, 5).await.unwrap();
        assert_eq!(q.question, GOOD);
        assert_eq!(q.next_cursor, 1);
        assert_eq!(q.total, 5);
        assert_eq!(q.source, QuestionSource::Provider);
        assert_eq!(sessions.snapshot(id).await.questions, [GOOD]);
    }

    #[tokio::test]
    async fn provider_failure_falls_back_to_topic_question() {
        let (flow, _) = flow_with(Arc::new(ScriptedProvider::failing()));
        let id = Uuid::new_v4();

        for i in 0..5 {
            let q = flow.next_question(id, i, 5).await.unwrap();
            assert_eq!(q.question, TOPICS[i].fallback_question);
            assert_eq!(q.source, QuestionSource::Fallback);
            flow.record_answer(id, i, "はい".into()).await.unwrap();
        }
    }

    #[tokio::test]
    async fn short_output_falls_back() {
        let short: String = "あ".repeat(MIN_QUESTION_CHARS - 1);
        let (flow, _) = flow_with(Arc::new(ScriptedProvider::replying(&short)));
        let q = flow.next_question(Uuid::new_v4(), 0, 5).await.unwrap();
        assert_eq!(q.question, TOPICS[0].fallback_question);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_provider_times_out_to_fallback() {
        let provider = Arc::new(ScriptedProvider::new(Behavior::Slow(
            Duration::from_secs(600),
            GOOD.to_string(),
        )));
        let (flow, sessions) = flow_with(provider);
        let id = Uuid::new_v4();

        let q = flow.next_question(id, 0, 5).await.unwrap();
        assert_eq!(q.source, QuestionSource::Fallback);
        assert_eq!(sessions.snapshot(id).await.questions.len(), 1);
    }

    #[tokio::test]
    async fn positions_past_topic_list_use_general_fallback() {
        let (flow, _) = flow_with(Arc::new(ScriptedProvider::failing()));
        let id = Uuid::new_v4();
        for i in 0..6 {
            let q = flow.next_question(id, i, 7).await.unwrap();
            if i == 5 {
                assert_eq!(q.question, "自分をより良くしたいと思っていますか？");
            }
        }
    }

    #[tokio::test]
    async fn limit_is_enforced_after_total_questions() {
        let (flow, sessions) = flow_with(Arc::new(ScriptedProvider::replying(GOOD)));
        let id = Uuid::new_v4();

        for i in 0..3 {
            flow.next_question(id, i, 3).await.unwrap();
            flow.record_answer(id, i, "いいえ".into()).await.unwrap();
        }
        assert_eq!(
            flow.next_question(id, 3, 3).await,
            Err(SessionError::QuestionLimitReached {
                cursor: 3,
                total: 3
            })
        );
        let snap = sessions.snapshot(id).await;
        assert_eq!(snap.questions.len(), 3);
        assert_eq!(snap.answers.len(), 3);
    }

    #[tokio::test]
    async fn total_above_maximum_is_rejected() {
        let provider = Arc::new(ScriptedProvider::replying(GOOD));
        let (flow, sessions) = flow_with(Arc::clone(&provider));
        let id = Uuid::new_v4();
        assert_eq!(
            flow.next_question(id, 0, 21).await,
            Err(SessionError::InvalidQuestionCount { total: 21, max: 20 })
        );
        assert_eq!(provider.calls(), 0);
        assert!(sessions.is_empty().await);
    }

    #[tokio::test]
    async fn zero_total_is_rejected() {
        let provider = Arc::new(ScriptedProvider::replying(GOOD));
        let (flow, sessions) = flow_with(Arc::clone(&provider));
        assert_eq!(
            flow.next_question(Uuid::new_v4(), 0, 0).await,
            Err(SessionError::InvalidQuestionCount { total: 0, max: 20 })
        );
        assert_eq!(provider.calls(), 0);
        assert!(sessions.is_empty().await);
    }

    #[tokio::test]
    async fn skipping_ahead_is_out_of_order() {
        let provider = Arc::new(ScriptedProvider::replying(GOOD));
        let (flow, sessions) = flow_with(Arc::clone(&provider));
        let id = Uuid::new_v4();
        assert_eq!(
            flow.next_question(id, 2, 5).await,
            Err(SessionError::QuestionOutOfOrder {
                cursor: 2,
                expected: 0
            })
        );
        assert_eq!(provider.calls(), 0);
        assert_eq!(sessions.snapshot(id).await.current_num, 0);
    }

    #[tokio::test]
    async fn repeated_cursor_replays_without_calling_provider() {
        let provider = Arc::new(ScriptedProvider::replying(GOOD));
        let (flow, sessions) = flow_with(Arc::clone(&provider));
        let id = Uuid::new_v4();

        let first = flow.next_question(id, 0, 5).await.unwrap();
        let again = flow.next_question(id, 0, 5).await.unwrap();
        assert_eq!(again.question, first.question);
        assert_eq!(again.source, QuestionSource::Replay);
        assert_eq!(provider.calls(), 1);
        assert_eq!(sessions.snapshot(id).await.questions.len(), 1);
    }

    #[tokio::test]
    async fn later_prompts_see_only_earlier_answers() {
        let provider = Arc::new(ScriptedProvider::replying(GOOD));
        let (flow, _) = flow_with(Arc::clone(&provider));
        let id = Uuid::new_v4();

        flow.next_question(id, 0, 5).await.unwrap();
        flow.record_answer(id, 0, "わからない".into()).await.unwrap();
        flow.next_question(id, 1, 5).await.unwrap();

        let prompts = provider.prompts();
        assert!(!prompts[0].contains("回答1"));
        assert!(prompts[1].contains("回答1: わからない"));
        assert!(!prompts[1].contains("回答2"));
    }

    #[tokio::test]
    async fn wrong_answer_position_leaves_session_unchanged() {
        let (flow, sessions) = flow_with(Arc::new(ScriptedProvider::replying(GOOD)));
        let id = Uuid::new_v4();
        flow.next_question(id, 0, 5).await.unwrap();
        flow.record_answer(id, 0, "はい".into()).await.unwrap();

        let before = sessions.snapshot(id).await;
        assert_eq!(
            flow.record_answer(id, 0, "いいえ".into()).await,
            Err(SessionError::OutOfOrderAnswer {
                claimed: 0,
                expected: 1
            })
        );
        assert_eq!(
            flow.record_answer(id, 1, "いいえ".into()).await,
            Err(SessionError::NoMatchingQuestion { position: 1 })
        );
        assert_eq!(sessions.snapshot(id).await, before);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_requests_at_same_cursor_append_once() {
        let provider = Arc::new(ScriptedProvider::new(Behavior::Slow(
            Duration::from_millis(50),
            GOOD.to_string(),
        )));
        let (flow, sessions) = flow_with(Arc::clone(&provider));
        let flow = Arc::new(flow);
        let id = Uuid::new_v4();

        let a = tokio::spawn({
            let flow = Arc::clone(&flow);
            async move { flow.next_question(id, 0, 5).await }
        });
        let b = tokio::spawn({
            let flow = Arc::clone(&flow);
            async move { flow.next_question(id, 0, 5).await }
        });
        let (a, b) = (a.await.unwrap().unwrap(), b.await.unwrap().unwrap());

        assert_eq!(a.question, b.question);
        assert_eq!(provider.calls(), 1);
        let snap = sessions.snapshot(id).await;
        assert_eq!(snap.questions, [GOOD]);
        assert!(snap.answers.len() <= snap.questions.len());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn principals_do_not_block_each_other() {
        let provider = Arc::new(ScriptedProvider::new(Behavior::Slow(
            Duration::from_millis(200),
            GOOD.to_string(),
        )));
        let (flow, _) = flow_with(provider);
        let flow = Arc::new(flow);

        let started = std::time::Instant::now();
        let tasks: Vec<_> = (0..4)
            .map(|_| {
                let flow = Arc::clone(&flow);
                tokio::spawn(async move { flow.next_question(Uuid::new_v4(), 0, 5).await })
            })
            .collect();
        for t in tasks {
            t.await.unwrap().unwrap();
        }
        assert!(started.elapsed() < Duration::from_millis(700));
    }
}
