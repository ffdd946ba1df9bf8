//! Guided self-improvement questionnaire.
//!
//! Each principal walks a fixed sequence of topics. Questions come from the
//! LLM provider, one at a time and strictly in order, with a fixed fallback
//! question per topic whenever the provider fails. After answering, the
//! principal asks for a proposal synthesized from the whole transcript.
//!
//! Sessions live in memory only and are lost on restart.

pub mod flow;
pub mod prompts;
pub mod proposal;
pub mod routes;
pub mod session;
pub mod store;
pub mod topics;

pub use flow::{AnswerAck, GeneratedQuestion, QuestionFlow, QuestionSource};
pub use proposal::{Proposal, ProposalSource, ProposalSynthesizer};
pub use session::{Session, SessionSnapshot};
pub use store::{SessionHandle, SessionStore};
