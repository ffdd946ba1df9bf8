//! ProposalSynthesizer: the closing recommendation over a transcript.

use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;

use crate::config::QuestionnaireConfig;
use crate::error::SessionError;
use crate::llm::{CompletionRequest, LlmProvider, complete_within};

use super::prompts::{FALLBACK_PROPOSAL, plausible_proposal, proposal_messages};
use super::store::SessionStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProposalSource {
    Provider,
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Proposal {
    pub text: String,
    pub source: ProposalSource,
}

pub struct ProposalSynthesizer {
    llm: Arc<dyn LlmProvider>,
    sessions: Arc<SessionStore>,
    config: QuestionnaireConfig,
}

impl ProposalSynthesizer {
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

    /// Recommend next steps from everything the principal has answered.
    ///
    /// Works on a copy of the session, so the session is not locked while
    /// the provider runs. Provider failure yields the fixed fallback text.
    pub async fn synthesize(&self, principal_id: Uuid) -> Result<Proposal, SessionError> {
        let snapshot = self.sessions.snapshot(principal_id).await;
        if snapshot.questions.is_empty() {
            return Err(SessionError::NoQuestionsYet);
        }
        if snapshot.answers.is_empty() {
            return Err(SessionError::NoAnswersYet);
        }

        let request = CompletionRequest::new(proposal_messages(&snapshot.transcript()))
            .with_temperature(self.config.temperature)
            .with_max_tokens(self.config.max_tokens);

        let outcome = complete_within(self.llm.as_ref(), request, self.config.provider_timeout)
            .await
            .map(|response| plausible_proposal(&response.content));

        let proposal = match outcome {
            Ok(Some(text)) => Proposal {
                text,
                source: ProposalSource::Provider,
            },
            Ok(None) => {
                warn!(principal_id = %principal_id, "Provider returned an empty proposal, using fallback");
                Proposal::fallback()
            }
            Err(e) => {
                warn!(principal_id = %principal_id, error = %e, "Proposal generation failed, using fallback");
                Proposal::fallback()
            }
        };

        info!(
            principal_id = %principal_id,
            questions = snapshot.questions.len(),
            answers = snapshot.answers.len(),
            source = ?proposal.source,
            "Proposal generated"
        );
        Ok(proposal)
    }
}

impl Proposal {
    fn fallback() -> Self {
        Self {
            text: FALLBACK_PROPOSAL.to_string(),
            source: ProposalSource::Fallback,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::llm::mock::{Behavior, ScriptedProvider};
    use crate::questionnaire::QuestionFlow;

    struct Fixture {
        flow: QuestionFlow,
        synth: ProposalSynthesizer,
        sessions: Arc<SessionStore>,
    }

    fn fixture(provider: Arc<ScriptedProvider>) -> Fixture {
        let sessions = Arc::new(SessionStore::new());
        let config = QuestionnaireConfig::default();
        Fixture {
            flow: QuestionFlow::new(provider.clone(), Arc::clone(&sessions), config.clone()),
            synth: ProposalSynthesizer::new(provider, Arc::clone(&sessions), config),
            sessions,
        }
    }

    #[tokio::test]
    async fn requires_questions_then_answers() {
        let f = fixture(Arc::new(ScriptedProvider::failing()));
        let id = Uuid::new_v4();
        assert_eq!(f.synth.synthesize(id).await, Err(SessionError::NoQuestionsYet));

        f.flow.next_question(id, 0, 5).await.unwrap();
        assert_eq!(f.synth.synthesize(id).await, Err(SessionError::NoAnswersYet));
    }

    #[tokio::test]
    async fn failing_provider_yields_fallback() {
        let f = fixture(Arc::new(ScriptedProvider::failing()));
        let id = Uuid::new_v4();
        for i in 0..5 {
            f.flow.next_question(id, i, 5).await.unwrap();
            f.flow.record_answer(id, i, "はい".into()).await.unwrap();
        }

        let proposal = f.synth.synthesize(id).await.unwrap();
        assert_eq!(proposal.text, FALLBACK_PROPOSAL);
        assert_eq!(proposal.source, ProposalSource::Fallback);
    }

    #[tokio::test]
    async fn provider_text_is_trimmed_and_returned() {
        let provider = Arc::new(ScriptedProvider::replying("  毎朝10分の読書から始めましょう。\n"));
        let f = fixture(Arc::clone(&provider));
        let id = Uuid::new_v4();
        f.flow.next_question(id, 0, 5).await.unwrap();
        f.flow.record_answer(id, 0, "いいえ".into()).await.unwrap();
        f.flow.next_question(id, 1, 5).await.unwrap();

        let proposal = f.synth.synthesize(id).await.unwrap();
        assert_eq!(proposal.text, "毎朝10分の読書から始めましょう。");
        assert_eq!(proposal.source, ProposalSource::Provider);

        let last_prompt = provider.prompts().pop().unwrap();
        assert!(last_prompt.contains("回答1: いいえ"));
        assert!(last_prompt.contains("回答2: 未回答"));
    }

    #[tokio::test]
    async fn empty_output_yields_fallback() {
        let f = fixture(Arc::new(ScriptedProvider::replying("   ")));
        let id = Uuid::new_v4();
        f.flow.next_question(id, 0, 5).await.unwrap();
        f.flow.record_answer(id, 0, "はい".into()).await.unwrap();
        assert_eq!(f.synth.synthesize(id).await.unwrap().text, FALLBACK_PROPOSAL);
    }

    #[tokio::test(start_paused = true)]
    async fn synthesis_does_not_hold_the_session_lock() {
        let provider = Arc::new(ScriptedProvider::new(Behavior::Slow(
            Duration::from_secs(5),
            "ゆっくり考えた提案です。".to_string(),
        )));
        let f = Arc::new(fixture(provider));
        let id = Uuid::new_v4();
        {
            let handle = f.sessions.get_or_create(id).await;
            let mut s = handle.lock().await;
            s.push_question("q0".into());
            s.record_answer(0, "はい".into()).unwrap();
        }

        let pending = tokio::spawn({
            let f = Arc::clone(&f);
            async move { f.synth.synthesize(id).await }
        });
        tokio::task::yield_now().await;

        // The session stays usable while the provider is working.
        let handle = f.sessions.get_or_create(id).await;
        assert!(handle.try_lock().is_ok());

        assert_eq!(pending.await.unwrap().unwrap().source, ProposalSource::Provider);
    }
}
