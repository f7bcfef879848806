//! Picks which search tool answers a `tools/find` request.
//!
//! Ported from the reference harness' `_select_search_tool`: keyword search
//! is explicit and always available; `auto` with advanced search prefers
//! keyword, then the embedding-based finder, then the LLM finder; any other
//! requested method that isn't actually registered falls back to keyword.

use std::collections::HashSet;

pub const FINDER_KEYWORD: &str = "Tool_Finder_Keyword";
pub const FINDER_EMBEDDING: &str = "Tool_Finder";
pub const FINDER_LLM: &str = "Tool_Finder_LLM";

pub fn select_search_tool(
    search_method: &str,
    use_advanced_search: bool,
    available: &HashSet<String>,
) -> Option<&'static str> {
    match search_method {
        "keyword" => Some(FINDER_KEYWORD),
        "llm" if available.contains(FINDER_LLM) => Some(FINDER_LLM),
        "embedding" if available.contains(FINDER_EMBEDDING) => Some(FINDER_EMBEDDING),
        "auto" => {
            if !use_advanced_search {
                return None;
            }
            if available.contains(FINDER_KEYWORD) {
                Some(FINDER_KEYWORD)
            } else if available.contains(FINDER_EMBEDDING) {
                Some(FINDER_EMBEDDING)
            } else if available.contains(FINDER_LLM) {
                Some(FINDER_LLM)
            } else {
                None
            }
        }
        _ => Some(FINDER_KEYWORD),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(names: &[&str]) -> HashSet<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn keyword_is_always_selected_when_requested() {
        assert_eq!(select_search_tool("keyword", true, &set(&[])), Some(FINDER_KEYWORD));
    }

    #[test]
    fn auto_prefers_keyword_over_embedding_and_llm() {
        let available = set(&[FINDER_KEYWORD, FINDER_EMBEDDING, FINDER_LLM]);
        assert_eq!(select_search_tool("auto", true, &available), Some(FINDER_KEYWORD));
    }

    #[test]
    fn auto_falls_back_to_embedding_then_llm() {
        let embedding_only = set(&[FINDER_EMBEDDING]);
        assert_eq!(select_search_tool("auto", true, &embedding_only), Some(FINDER_EMBEDDING));

        let llm_only = set(&[FINDER_LLM]);
        assert_eq!(select_search_tool("auto", true, &llm_only), Some(FINDER_LLM));
    }

    #[test]
    fn auto_without_advanced_search_yields_no_tool() {
        let available = set(&[FINDER_KEYWORD]);
        assert_eq!(select_search_tool("auto", false, &available), None);
    }

    #[test]
    fn llm_falls_back_to_keyword_when_unavailable() {
        assert_eq!(select_search_tool("llm", true, &set(&[])), Some(FINDER_KEYWORD));
    }

    #[test]
    fn embedding_falls_back_to_keyword_when_unavailable() {
        assert_eq!(select_search_tool("embedding", true, &set(&[])), Some(FINDER_KEYWORD));
    }

    #[test]
    fn unknown_method_falls_back_to_keyword() {
        assert_eq!(select_search_tool("bogus", true, &set(&[])), Some(FINDER_KEYWORD));
    }
}
