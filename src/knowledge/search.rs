use std::sync::Arc;

use tracing::debug;

use crate::error::AppError;
use crate::model::knowledge::{Category, KnowledgeArticle};
use crate::store::KnowledgeStore;

/// Result cap when the assistant searches on the user's behalf.
pub const ASSISTANT_RESULT_LIMIT: u32 = 3;
/// Result cap for the search endpoint.
pub const ENDPOINT_RESULT_LIMIT: u32 = 5;

/// Substring search over title and content, optionally narrowed to one
/// category. Result order is whatever the store returns.
#[derive(Clone)]
pub struct KnowledgeSearch {
    store: Arc<dyn KnowledgeStore>,
}

impl KnowledgeSearch {
    pub fn new(store: Arc<dyn KnowledgeStore>) -> Self {
        Self { store }
    }

    pub async fn search(
        &self,
        query: &str,
        category: Option<Category>,
        limit: u32,
    ) -> Result<Vec<KnowledgeArticle>, AppError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(AppError::InvalidInput("Search query is required".into()));
        }

        let results = self.store.search(query, category, limit).await?;
        debug!(query, ?category, hits = results.len(), "Knowledge search");
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;

    fn corpus() -> KnowledgeSearch {
        let store = Arc::new(MemoryStore::new());
        store.add_article(
            "Remote Work Policy",
            "Employees may work from home up to three days a week.",
            Category::Policies,
        );
        store.add_article(
            "Health Insurance",
            "Coverage starts on the first day. Remote employees are included.",
            Category::Benefits,
        );
        store.add_article("Expense Claims", "Submit receipts within 30 days.", Category::Procedures);
        store.add_article("Parking", "Ask facilities for a badge.", Category::Faq);
        KnowledgeSearch::new(store)
    }

    #[actix_web::test]
    async fn finds_title_match_case_insensitively() {
        let results = corpus()
            .search("remote work", None, ASSISTANT_RESULT_LIMIT)
            .await
            .unwrap();
        assert!(results.iter().any(|a| a.title == "Remote Work Policy"));
        assert!(results.len() <= ASSISTANT_RESULT_LIMIT as usize);
    }

    #[actix_web::test]
    async fn matches_content_as_well_as_title() {
        let results = corpus().search("REMOTE", None, 5).await.unwrap();
        assert_eq!(results.len(), 2);
    }

    #[actix_web::test]
    async fn category_filter_narrows_results() {
        let results = corpus()
            .search("remote", Some(Category::Benefits), 5)
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].title, "Health Insurance");
    }

    #[actix_web::test]
    async fn limit_caps_results() {
        let results = corpus().search("a", None, 3).await.unwrap();
        assert_eq!(results.len(), 3);
    }

    #[actix_web::test]
    async fn blank_query_is_rejected() {
        let err = corpus().search("   ", None, 5).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
    }
}
