//! The fixed topic sequence and its fallback questions.

/// A questionnaire topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Topic {
    /// Stable identifier used in logs.
    pub slug: &'static str,
    /// Phrase interpolated into the generation prompt.
    pub label: &'static str,
    /// Question served when the provider cannot produce one.
    pub fallback_question: &'static str,
}

/// Topics in the order they are asked.
pub const TOPICS: [Topic; 5] = [
    Topic {
        slug: "reading",
        label: "読書習慣について",
        fallback_question: "あなたは毎日読書をしていますか？",
    },
    Topic {
        slug: "exercise",
        label: "運動習慣について",
        fallback_question: "週に3回以上運動をしていますか？",
    },
    Topic {
        slug: "beauty_health",
        label: "美容・健康について",
        fallback_question: "自分の外見や健康に気を使っていますか？",
    },
    Topic {
        slug: "relationships",
        label: "人間関係について",
        fallback_question: "新しい人との出会いを積極的に求めていますか？",
    },
    Topic {
        slug: "goals",
        label: "目標設定について",
        fallback_question: "将来の目標を明確に持っていますか？",
    },
];

/// Used for every position past the end of [`TOPICS`].
pub const GENERAL: Topic = Topic {
    slug: "general",
    label: "全般的な自己改善について",
    fallback_question: "自分をより良くしたいと思っていますか？",
};

/// Topic for the question at `position` (0-based).
pub fn topic_for(position: usize) -> Topic {
    TOPICS.get(position).copied().unwrap_or(GENERAL)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_five_positions_follow_topic_order() {
        let slugs: Vec<_> = (0..5).map(|i| topic_for(i).slug).collect();
        assert_eq!(
            slugs,
            ["reading", "exercise", "beauty_health", "relationships", "goals"]
        );
    }

    #[test]
    fn later_positions_use_general_topic() {
        assert_eq!(topic_for(5), GENERAL);
        assert_eq!(topic_for(19), GENERAL);
    }
}
