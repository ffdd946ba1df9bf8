//! Prompt builders and output checks for question and proposal generation.

use crate::llm::ChatMessage;

use super::topics::Topic;

/// Generated questions shorter than this (in characters, after trimming)
/// are discarded in favor of the fallback.
pub const MIN_QUESTION_CHARS: usize = 10;

/// Recommendation served when the provider cannot produce one.
pub const FALLBACK_PROPOSAL: &str = "あなたの回答を基に、読書習慣の改善、定期的な運動、健康的な生活習慣の確立をお勧めします。小さな一歩から始めて、継続することが大切です。応援しています！";

/// Placeholder for a question that has no answer yet.
const UNANSWERED: &str = "未回答";

const QUESTION_PERSONA: &str = "あなたは自分磨きの専門家です。";

const PROPOSAL_PERSONA: &str = "あなたは経験豊富な自分磨きのアドバイザーです。";

/// Messages asking for the question at `position` of `total`, given the
/// answered pairs that precede it.
pub fn question_messages(
    topic: Topic,
    position: usize,
    total: usize,
    answered: &[(String, String)],
) -> Vec<ChatMessage> {
    let mut prompt = String::new();

    if !answered.is_empty() {
        prompt.push_str("これまでの質問と回答:\n");
        for (i, (q, a)) in answered.iter().enumerate() {
            prompt.push_str(&format!("質問{n}: {q}\n回答{n}: {a}\n", n = i + 1));
        }
        prompt.push_str("\n前回の回答を踏まえて、次の質問を生成してください。\n\n");
    }

    prompt.push_str(&format!(
        "回答者に最適な自分磨きを提案するために、{label}に関する質問を1つ出してください。\n\n\
         質問の条件:\n\
         - 「はい」「いいえ」「わからない」で答えられるもの\n\
         - 具体的で分かりやすい内容\n\
         - 回答者の状況を把握するのに役立つ内容\n\
         - 質問文のみを出力（説明は不要）\n\n\
         現在は{n}回目の質問です（全{total}問）。",
        label = topic.label,
        n = position + 1,
    ));

    vec![ChatMessage::system(QUESTION_PERSONA), ChatMessage::user(prompt)]
}

/// Messages asking for the final recommendation over `transcript`.
/// Unanswered questions are rendered with a placeholder.
pub fn proposal_messages(transcript: &[(String, Option<String>)]) -> Vec<ChatMessage> {
    let mut prompt = String::from(
        "以下の質問と回答を参考に、回答者に最適な自分磨きの提案をしてください。\n\n\
         提案の条件:\n\
         - 具体的で実践可能な内容\n\
         - 回答者の状況に合わせた提案\n\
         - 読書、運動、美容、人間関係、目標設定などの分野を含む\n\
         - 100-150文字程度で簡潔に\n\
         - 励ましの言葉も含める\n\n\
         質問と回答:\n",
    );
    for (i, (q, a)) in transcript.iter().enumerate() {
        let a = a.as_deref().unwrap_or(UNANSWERED);
        prompt.push_str(&format!("質問{n}: {q}\n回答{n}: {a}\n", n = i + 1));
    }

    vec![ChatMessage::system(PROPOSAL_PERSONA), ChatMessage::user(prompt)]
}

/// Trim provider output and keep it only if it is long enough to be a
/// real question.
pub fn plausible_question(raw: &str) -> Option<String> {
    let text = raw.trim();
    (text.chars().count() >= MIN_QUESTION_CHARS).then(|| text.to_string())
}

/// Trim provider output and keep it only if it is non-empty.
pub fn plausible_proposal(raw: &str) -> Option<String> {
    let text = raw.trim();
    (!text.is_empty()).then(|| text.to_string())
}
