use docrag_core::types::{Prompt, ScoredChunk};

pub const DEFAULT_SYSTEM_PROMPT: &str = "あなたは日本語のアシスタントです。以下のコンテキストに厳密に基づき、\
根拠を示しながら簡潔に回答してください。わからない場合は無理に推測せず「不明」と答えてください。\
必要に応じて箇条書きで。";

/// Keep hits in order until `max_chars` of chunk text is used; the last kept hit may be cut short.
pub fn bound_context(hits: Vec<ScoredChunk>, max_chars: usize) -> Vec<ScoredChunk> {
    let mut remaining = max_chars;
    let mut out = Vec::new();
    for mut hit in hits {
        if remaining == 0 {
            break;
        }
        let len = hit.text.chars().count();
        if len > remaining {
            hit.text = hit.text.chars().take(remaining).collect();
            remaining = 0;
        } else {
            remaining -= len;
        }
        out.push(hit);
    }
    out
}

pub fn build_prompt(system: &str, question: &str, contexts: &[ScoredChunk]) -> Prompt {
    let context_block = if contexts.is_empty() {
        "(なし)".to_string()
    } else {
        contexts.iter().map(|c| format!("- {}", c.text)).collect::<Vec<_>>().join("\n\n")
    };
    Prompt { system: system.to_string(), user: format!("ユーザー質問:\n{question}\n\n参照コンテキスト:\n{context_block}") }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(text: &str) -> ScoredChunk {
        ScoredChunk { doc_id: "d".into(), chunk_index: 0, score: 1.0, text: text.into() }
    }

    #[test]
    fn context_is_truncated_at_the_boundary() {
        let kept = bound_context(vec![hit("あいうえお"), hit("かきくけこ"), hit("さしすせそ")], 7);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].text, "あいうえお");
        assert_eq!(kept[1].text, "かき");
    }

    #[test]
    fn exact_fit_drops_the_rest() {
        let kept = bound_context(vec![hit("abc"), hit("def")], 3);
        assert_eq!(kept.len(), 1);
    }

    #[test]
    fn prompt_lists_contexts_after_question() {
        let p = build_prompt("sys", "RAGとは？", &[hit("一つ目"), hit("二つ目")]);
        assert_eq!(p.system, "sys");
        assert_eq!(p.user, "ユーザー質問:\nRAGとは？\n\n参照コンテキスト:\n- 一つ目\n\n- 二つ目");
        assert!(build_prompt("sys", "q", &[]).user.ends_with("(なし)"));
    }
}
