//! In-process store used by unit and handler tests.

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;

use crate::error::AppError;
use crate::model::analytics::LogEntry;
use crate::model::conversation::{ConversationSummary, Message, NewMessage};
use crate::model::knowledge::{ArticlePatch, Category, CategoryCount, KnowledgeArticle, NewArticle};
use crate::model::leave_request::{
    Decision, LeaveBalance, LeaveRequest, LeaveRequestView, LeaveStatus, LeaveType,
    NewLeaveRequest,
};
use crate::store::{AnalyticsStore, ConversationStore, KnowledgeStore, LeaveStore};

#[derive(Clone)]
struct MemUser {
    name: String,
    department: Option<String>,
    balance: LeaveBalance,
}

#[derive(Clone)]
struct MemConversation {
    user_id: u64,
    title: String,
    last_message_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
}

#[derive(Default)]
struct Inner {
    next_id: u64,
    users: BTreeMap<u64, MemUser>,
    conversations: BTreeMap<u64, MemConversation>,
    messages: Vec<Message>,
    leave_requests: BTreeMap<u64, LeaveRequest>,
    articles: BTreeMap<u64, KnowledgeArticle>,
    logs: Vec<LogEntry>,
}

impl Inner {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn view(&self, request: &LeaveRequest) -> LeaveRequestView {
        let user = self.users.get(&request.user_id);
        LeaveRequestView {
            request: request.clone(),
            employee_name: user.map(|u| u.name.clone()),
            department: user.and_then(|u| u.department.clone()),
            approver_name: request
                .approved_by
                .and_then(|id| self.users.get(&id))
                .map(|u| u.name.clone()),
        }
    }
}

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_user(&self, id: u64, name: &str, sick: i32, vacation: i32) {
        let mut inner = self.inner.lock().unwrap();
        inner.next_id = inner.next_id.max(id);
        inner.users.insert(
            id,
            MemUser {
                name: name.to_string(),
                department: Some("Engineering".into()),
                balance: LeaveBalance {
                    sick_leave_balance: sick,
                    vacation_balance: vacation,
                },
            },
        );
    }

    pub fn add_article(&self, title: &str, content: &str, category: Category) -> u64 {
        let mut inner = self.inner.lock().unwrap();
        let id = inner.next_id();
        let now = Utc::now();
        inner.articles.insert(
            id,
            KnowledgeArticle {
                id,
                title: title.to_string(),
                content: content.to_string(),
                category,
                tags: Json(Vec::new()),
                created_by: None,
                created_at: now,
                updated_at: now,
            },
        );
        id
    }

    pub fn user_balance(&self, user_id: u64) -> LeaveBalance {
        self.inner.lock().unwrap().users[&user_id].balance
    }

    pub fn leave_requests(&self) -> Vec<LeaveRequest> {
        self.inner.lock().unwrap().leave_requests.values().cloned().collect()
    }

    pub fn conversation_messages(&self, conversation_id: u64) -> Vec<Message> {
        self.inner
            .lock()
            .unwrap()
            .messages
            .iter()
            .filter(|m| m.conversation_id == conversation_id)
            .cloned()
            .collect()
    }

    pub fn logs(&self) -> Vec<LogEntry> {
        self.inner.lock().unwrap().logs.clone()
    }
}

#[async_trait]
impl ConversationStore for MemoryStore {
    async fn create_conversation(&self, user_id: u64, title: &str) -> Result<u64, AppError> {
        let mut inner = self.inner.lock().unwrap();
        let id = inner.next_id();
        let now = Utc::now();
        inner.conversations.insert(
            id,
            MemConversation {
                user_id,
                title: title.to_string(),
                last_message_at: now,
                created_at: now,
            },
        );
        Ok(id)
    }

    async fn conversation_owner(&self, conversation_id: u64) -> Result<Option<u64>, AppError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.conversations.get(&conversation_id).map(|c| c.user_id))
    }

    async fn append_message(
        &self,
        conversation_id: u64,
        message: NewMessage,
    ) -> Result<Message, AppError> {
        let mut inner = self.inner.lock().unwrap();
        if !inner.conversations.contains_key(&conversation_id) {
            return Err(AppError::InvalidReference);
        }
        let id = inner.next_id();
        let saved = Message {
            id,
            conversation_id,
            role: message.role,
            content: message.content,
            function_call: message.function_call.map(Json),
            created_at: Utc::now(),
        };
        inner.messages.push(saved.clone());
        Ok(saved)
    }

    async fn recent_messages(
        &self,
        conversation_id: u64,
        limit: u32,
    ) -> Result<Vec<Message>, AppError> {
        let inner = self.inner.lock().unwrap();
        let mut newest: Vec<Message> = inner
            .messages
            .iter()
            .rev()
            .filter(|m| m.conversation_id == conversation_id)
            .take(limit as usize)
            .cloned()
            .collect();
        newest.reverse();
        Ok(newest)
    }

    async fn touch_conversation(&self, conversation_id: u64) -> Result<(), AppError> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(conversation) = inner.conversations.get_mut(&conversation_id) {
            conversation.last_message_at = Utc::now();
        }
        Ok(())
    }

    async fn list_conversations(
        &self,
        user_id: u64,
    ) -> Result<Vec<ConversationSummary>, AppError> {
        let inner = self.inner.lock().unwrap();
        let mut rows: Vec<ConversationSummary> = inner
            .conversations
            .iter()
            .filter(|(_, c)| c.user_id == user_id)
            .map(|(id, c)| ConversationSummary {
                id: *id,
                title: c.title.clone(),
                last_message_at: c.last_message_at,
                created_at: c.created_at,
                last_message: inner
                    .messages
                    .iter()
                    .rev()
                    .find(|m| m.conversation_id == *id)
                    .map(|m| m.content.clone()),
            })
            .collect();
        rows.sort_by(|a, b| b.last_message_at.cmp(&a.last_message_at));
        Ok(rows)
    }

    async fn messages(&self, conversation_id: u64) -> Result<Vec<Message>, AppError> {
        Ok(self.conversation_messages(conversation_id))
    }

    async fn delete_conversation(
        &self,
        conversation_id: u64,
        user_id: u64,
    ) -> Result<bool, AppError> {
        let mut inner = self.inner.lock().unwrap();
        let owned = inner
            .conversations
            .get(&conversation_id)
            .is_some_and(|c| c.user_id == user_id);
        if owned {
            inner.conversations.remove(&conversation_id);
            inner.messages.retain(|m| m.conversation_id != conversation_id);
        }
        Ok(owned)
    }
}

#[async_trait]
impl LeaveStore for MemoryStore {
    async fn balance(&self, user_id: u64) -> Result<Option<LeaveBalance>, AppError> {
        Ok(self.inner.lock().unwrap().users.get(&user_id).map(|u| u.balance))
    }

    async fn insert_request(&self, request: NewLeaveRequest) -> Result<LeaveRequest, AppError> {
        let mut inner = self.inner.lock().unwrap();
        if !inner.users.contains_key(&request.user_id) {
            return Err(AppError::InvalidReference);
        }
        let id = inner.next_id();
        let saved = LeaveRequest {
            id,
            user_id: request.user_id,
            leave_type: request.leave_type,
            start_date: request.start_date,
            end_date: request.end_date,
            days: request.days,
            reason: request.reason,
            status: LeaveStatus::Pending,
            approved_by: None,
            approved_at: None,
            created_at: Utc::now(),
        };
        inner.leave_requests.insert(id, saved.clone());
        Ok(saved)
    }

    async fn find_request(&self, id: u64) -> Result<Option<LeaveRequest>, AppError> {
        Ok(self.inner.lock().unwrap().leave_requests.get(&id).cloned())
    }

    async fn decide(
        &self,
        id: u64,
        approver_id: u64,
        decision: Decision,
    ) -> Result<LeaveRequest, AppError> {
        // The whole read-check-write runs under one lock, like the row lock in MySQL.
        let mut inner = self.inner.lock().unwrap();
        let request = inner
            .leave_requests
            .get(&id)
            .cloned()
            .ok_or_else(|| AppError::not_found("Leave request"))?;
        if request.status != LeaveStatus::Pending {
            return Err(AppError::AlreadyProcessed);
        }

        if decision == Decision::Approved {
            let user = inner
                .users
                .get_mut(&request.user_id)
                .ok_or(AppError::InvalidReference)?;
            match request.leave_type {
                LeaveType::Sick => user.balance.sick_leave_balance -= request.days,
                LeaveType::Vacation | LeaveType::Personal => {
                    user.balance.vacation_balance -= request.days
                }
            }
        }

        let updated = LeaveRequest {
            status: decision.into(),
            approved_by: Some(approver_id),
            approved_at: Some(Utc::now()),
            ..request
        };
        inner.leave_requests.insert(id, updated.clone());
        Ok(updated)
    }

    async fn requests_for_user(&self, user_id: u64) -> Result<Vec<LeaveRequestView>, AppError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .leave_requests
            .values()
            .rev()
            .filter(|r| r.user_id == user_id)
            .map(|r| inner.view(r))
            .collect())
    }

    async fn all_requests(
        &self,
        status: Option<LeaveStatus>,
    ) -> Result<Vec<LeaveRequestView>, AppError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .leave_requests
            .values()
            .rev()
            .filter(|r| status.is_none_or(|s| r.status == s))
            .map(|r| inner.view(r))
            .collect())
    }
}

fn matches_text(article: &KnowledgeArticle, needle: &str) -> bool {
    let needle = needle.to_lowercase();
    article.title.to_lowercase().contains(&needle)
        || article.content.to_lowercase().contains(&needle)
}

#[async_trait]
impl KnowledgeStore for MemoryStore {
    async fn search(
        &self,
        query: &str,
        category: Option<Category>,
        limit: u32,
    ) -> Result<Vec<KnowledgeArticle>, AppError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .articles
            .values()
            .filter(|a| matches_text(a, query))
            .filter(|a| category.is_none_or(|c| a.category == c))
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn list(
        &self,
        category: Option<Category>,
        search: Option<&str>,
    ) -> Result<Vec<KnowledgeArticle>, AppError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .articles
            .values()
            .rev()
            .filter(|a| category.is_none_or(|c| a.category == c))
            .filter(|a| search.is_none_or(|s| matches_text(a, s)))
            .cloned()
            .collect())
    }

    async fn get(&self, id: u64) -> Result<Option<KnowledgeArticle>, AppError> {
        Ok(self.inner.lock().unwrap().articles.get(&id).cloned())
    }

    async fn create(
        &self,
        article: NewArticle,
        author_id: u64,
    ) -> Result<KnowledgeArticle, AppError> {
        let mut inner = self.inner.lock().unwrap();
        let id = inner.next_id();
        let now = Utc::now();
        let saved = KnowledgeArticle {
            id,
            title: article.title,
            content: article.content,
            category: article.category.unwrap_or(Category::Faq),
            tags: Json(article.tags),
            created_by: Some(author_id),
            created_at: now,
            updated_at: now,
        };
        inner.articles.insert(id, saved.clone());
        Ok(saved)
    }

    async fn update(
        &self,
        id: u64,
        patch: ArticlePatch,
    ) -> Result<Option<KnowledgeArticle>, AppError> {
        let mut inner = self.inner.lock().unwrap();
        let Some(article) = inner.articles.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(title) = patch.title {
            article.title = title;
        }
        if let Some(content) = patch.content {
            article.content = content;
        }
        if let Some(category) = patch.category {
            article.category = category;
        }
        if let Some(tags) = patch.tags {
            article.tags = Json(tags);
        }
        article.updated_at = Utc::now();
        Ok(Some(article.clone()))
    }

    async fn delete(&self, id: u64) -> Result<bool, AppError> {
        Ok(self.inner.lock().unwrap().articles.remove(&id).is_some())
    }

    async fn categories(&self) -> Result<Vec<CategoryCount>, AppError> {
        let inner = self.inner.lock().unwrap();
        let mut counts: BTreeMap<String, i64> = BTreeMap::new();
        for article in inner.articles.values() {
            *counts.entry(article.category.to_string()).or_default() += 1;
        }
        Ok(counts
            .into_iter()
            .map(|(category, count)| CategoryCount { category, count })
            .collect())
    }
}

#[async_trait]
impl AnalyticsStore for MemoryStore {
    async fn record(&self, entry: LogEntry) -> Result<(), AppError> {
        self.inner.lock().unwrap().logs.push(entry);
        Ok(())
    }
}
