use std::sync::Arc;

use crate::chat::{ChatModel, ChatOrchestrator, FunctionRegistry};
use crate::knowledge::KnowledgeSearch;
use crate::leave::LeaveLedger;
use crate::store::{AnalyticsStore, ConversationStore, KnowledgeStore, LeaveStore};

pub mod analytics;
pub mod chat;
pub mod knowledge;
pub mod leave;
pub mod users;

/// Services shared by the handlers. User and analytics reporting queries go
/// straight to the pool; everything else goes through these.
pub struct AppState {
    pub ledger: LeaveLedger,
    pub knowledge: KnowledgeSearch,
    pub articles: Arc<dyn KnowledgeStore>,
    pub analytics: Arc<dyn AnalyticsStore>,
    pub chat: ChatOrchestrator,
}

impl AppState {
    pub fn new<S>(store: Arc<S>, model: Arc<dyn ChatModel>, history_limit: u32) -> Self
    where
        S: ConversationStore + LeaveStore + KnowledgeStore + AnalyticsStore + 'static,
    {
        let ledger = LeaveLedger::new(store.clone(), store.clone());
        let knowledge = KnowledgeSearch::new(store.clone());
        let registry = FunctionRegistry::new(ledger.clone(), knowledge.clone());
        let chat = ChatOrchestrator::new(
            store.clone(),
            store.clone(),
            registry,
            model,
            history_limit,
        );

        Self {
            ledger,
            knowledge,
            articles: store.clone(),
            analytics: store,
            chat,
        }
    }
}
