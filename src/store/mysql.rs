use async_trait::async_trait;
use sqlx::types::Json;
use sqlx::{MySql, MySqlPool, QueryBuilder};
use tracing::{debug, instrument};

use crate::error::AppError;
use crate::model::analytics::LogEntry;
use crate::model::conversation::{ConversationSummary, Message, NewMessage};
use crate::model::knowledge::{ArticlePatch, Category, CategoryCount, KnowledgeArticle, NewArticle};
use crate::model::leave_request::{
    Decision, LeaveBalance, LeaveRequest, LeaveRequestView, LeaveStatus, LeaveType,
    NewLeaveRequest,
};
use crate::store::{
    AnalyticsStore, ConversationStore, KnowledgeStore, LeaveStore, contains_pattern,
};

const MESSAGE_COLUMNS: &str =
    "SELECT id, conversation_id, role, content, function_call, created_at FROM messages";

const LEAVE_COLUMNS: &str = r#"
    SELECT id, user_id, type, start_date, end_date, days, reason,
           status, approved_by, approved_at, created_at
    FROM leave_requests
"#;

const LEAVE_VIEW_COLUMNS: &str = r#"
    SELECT lr.id, lr.user_id, lr.type, lr.start_date, lr.end_date, lr.days, lr.reason,
           lr.status, lr.approved_by, lr.approved_at, lr.created_at,
           u.name AS employee_name, u.department, approver.name AS approver_name
    FROM leave_requests lr
    JOIN users u ON lr.user_id = u.id
    LEFT JOIN users approver ON lr.approved_by = approver.id
"#;

const ARTICLE_COLUMNS: &str = r#"
    SELECT id, title, content, category, tags, created_by, created_at, updated_at
    FROM knowledge_base
"#;

/// MySQL-backed implementation of every store trait.
#[derive(Clone)]
pub struct MySqlStore {
    pool: MySqlPool,
}

impl MySqlStore {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    async fn message_by_id(&self, id: u64) -> Result<Message, AppError> {
        let sql = format!("{MESSAGE_COLUMNS} WHERE id = ?");
        let message = sqlx::query_as::<_, Message>(&sql)
            .bind(id)
            .fetch_one(&self.pool)
            .await?;
        Ok(message)
    }
}

#[async_trait]
impl ConversationStore for MySqlStore {
    async fn create_conversation(&self, user_id: u64, title: &str) -> Result<u64, AppError> {
        let result = sqlx::query("INSERT INTO conversations (user_id, title) VALUES (?, ?)")
            .bind(user_id)
            .bind(title)
            .execute(&self.pool)
            .await?;
        Ok(result.last_insert_id())
    }

    async fn conversation_owner(&self, conversation_id: u64) -> Result<Option<u64>, AppError> {
        let owner = sqlx::query_scalar::<_, u64>("SELECT user_id FROM conversations WHERE id = ?")
            .bind(conversation_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(owner)
    }

    async fn append_message(
        &self,
        conversation_id: u64,
        message: NewMessage,
    ) -> Result<Message, AppError> {
        let result = sqlx::query(
            r#"
            INSERT INTO messages (conversation_id, role, content, function_call)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(conversation_id)
        .bind(message.role.as_ref())
        .bind(&message.content)
        .bind(message.function_call.map(Json))
        .execute(&self.pool)
        .await?;

        self.message_by_id(result.last_insert_id()).await
    }

    async fn recent_messages(
        &self,
        conversation_id: u64,
        limit: u32,
    ) -> Result<Vec<Message>, AppError> {
        let sql = format!(
            "{MESSAGE_COLUMNS} WHERE conversation_id = ? ORDER BY created_at DESC, id DESC LIMIT ?"
        );
        let mut messages = sqlx::query_as::<_, Message>(&sql)
            .bind(conversation_id)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        messages.reverse();
        Ok(messages)
    }

    async fn touch_conversation(&self, conversation_id: u64) -> Result<(), AppError> {
        sqlx::query("UPDATE conversations SET last_message_at = CURRENT_TIMESTAMP WHERE id = ?")
            .bind(conversation_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn list_conversations(
        &self,
        user_id: u64,
    ) -> Result<Vec<ConversationSummary>, AppError> {
        let rows = sqlx::query_as::<_, ConversationSummary>(
            r#"
            SELECT c.id, c.title, c.last_message_at, c.created_at,
                   (SELECT m.content FROM messages m
                    WHERE m.conversation_id = c.id
                    ORDER BY m.created_at DESC, m.id DESC LIMIT 1) AS last_message
            FROM conversations c
            WHERE c.user_id = ?
            ORDER BY c.last_message_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn messages(&self, conversation_id: u64) -> Result<Vec<Message>, AppError> {
        let sql = format!("{MESSAGE_COLUMNS} WHERE conversation_id = ? ORDER BY created_at, id");
        let messages = sqlx::query_as::<_, Message>(&sql)
            .bind(conversation_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(messages)
    }

    async fn delete_conversation(
        &self,
        conversation_id: u64,
        user_id: u64,
    ) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM conversations WHERE id = ? AND user_id = ?")
            .bind(conversation_id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl LeaveStore for MySqlStore {
    async fn balance(&self, user_id: u64) -> Result<Option<LeaveBalance>, AppError> {
        let balance = sqlx::query_as::<_, LeaveBalance>(
            "SELECT sick_leave_balance, vacation_balance FROM users WHERE id = ?",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(balance)
    }

    async fn insert_request(&self, request: NewLeaveRequest) -> Result<LeaveRequest, AppError> {
        let result = sqlx::query(
            r#"
            INSERT INTO leave_requests (user_id, type, start_date, end_date, days, reason, status)
            VALUES (?, ?, ?, ?, ?, ?, 'pending')
            "#,
        )
        .bind(request.user_id)
        .bind(request.leave_type.as_ref())
        .bind(request.start_date)
        .bind(request.end_date)
        .bind(request.days)
        .bind(&request.reason)
        .execute(&self.pool)
        .await?;

        self.find_request(result.last_insert_id())
            .await?
            .ok_or_else(|| AppError::Storage("inserted leave request vanished".into()))
    }

    async fn find_request(&self, id: u64) -> Result<Option<LeaveRequest>, AppError> {
        let sql = format!("{LEAVE_COLUMNS} WHERE id = ?");
        let request = sqlx::query_as::<_, LeaveRequest>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(request)
    }

    #[instrument(skip(self))]
    async fn decide(
        &self,
        id: u64,
        approver_id: u64,
        decision: Decision,
    ) -> Result<LeaveRequest, AppError> {
        let mut tx = self.pool.begin().await?;

        // Row lock: a concurrent decision waits here and then sees the new status.
        let locked = format!("{LEAVE_COLUMNS} WHERE id = ? FOR UPDATE");
        let request = sqlx::query_as::<_, LeaveRequest>(&locked)
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| AppError::not_found("Leave request"))?;

        if request.status != LeaveStatus::Pending {
            return Err(AppError::AlreadyProcessed);
        }

        let status = LeaveStatus::from(decision);
        sqlx::query(
            r#"
            UPDATE leave_requests
            SET status = ?, approved_by = ?, approved_at = CURRENT_TIMESTAMP
            WHERE id = ?
            "#,
        )
        .bind(status.as_ref())
        .bind(approver_id)
        .bind(id)
        .execute(&mut *tx)
        .await?;

        if decision == Decision::Approved {
            // Personal days come out of the vacation allowance.
            let debit = match request.leave_type {
                LeaveType::Sick => {
                    "UPDATE users SET sick_leave_balance = sick_leave_balance - ? WHERE id = ?"
                }
                LeaveType::Vacation | LeaveType::Personal => {
                    "UPDATE users SET vacation_balance = vacation_balance - ? WHERE id = ?"
                }
            };
            sqlx::query(debit)
                .bind(request.days)
                .bind(request.user_id)
                .execute(&mut *tx)
                .await?;
            debug!(days = request.days, user_id = request.user_id, "Balance debited");
        }

        let select = format!("{LEAVE_COLUMNS} WHERE id = ?");
        let updated = sqlx::query_as::<_, LeaveRequest>(&select)
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(updated)
    }

    async fn requests_for_user(&self, user_id: u64) -> Result<Vec<LeaveRequestView>, AppError> {
        let sql = format!("{LEAVE_VIEW_COLUMNS} WHERE lr.user_id = ? ORDER BY lr.created_at DESC");
        let rows = sqlx::query_as::<_, LeaveRequestView>(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn all_requests(
        &self,
        status: Option<LeaveStatus>,
    ) -> Result<Vec<LeaveRequestView>, AppError> {
        let mut qb = QueryBuilder::<MySql>::new(LEAVE_VIEW_COLUMNS);
        if let Some(status) = status {
            qb.push(" WHERE lr.status = ").push_bind(status.to_string());
        }
        qb.push(" ORDER BY lr.created_at DESC");

        let rows = qb
            .build_query_as::<LeaveRequestView>()
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }
}

#[async_trait]
impl KnowledgeStore for MySqlStore {
    async fn search(
        &self,
        query: &str,
        category: Option<Category>,
        limit: u32,
    ) -> Result<Vec<KnowledgeArticle>, AppError> {
        let pattern = contains_pattern(&query.to_lowercase());

        let mut qb = QueryBuilder::<MySql>::new(ARTICLE_COLUMNS);
        qb.push(" WHERE (LOWER(title) LIKE ")
            .push_bind(pattern.clone())
            .push(" OR LOWER(content) LIKE ")
            .push_bind(pattern)
            .push(")");
        if let Some(category) = category {
            qb.push(" AND category = ").push_bind(category.to_string());
        }
        qb.push(" LIMIT ").push_bind(limit);

        let rows = qb
            .build_query_as::<KnowledgeArticle>()
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn list(
        &self,
        category: Option<Category>,
        search: Option<&str>,
    ) -> Result<Vec<KnowledgeArticle>, AppError> {
        let mut qb = QueryBuilder::<MySql>::new(ARTICLE_COLUMNS);
        qb.push(" WHERE 1=1");
        if let Some(category) = category {
            qb.push(" AND category = ").push_bind(category.to_string());
        }
        if let Some(search) = search {
            let pattern = contains_pattern(&search.to_lowercase());
            qb.push(" AND (LOWER(title) LIKE ")
                .push_bind(pattern.clone())
                .push(" OR LOWER(content) LIKE ")
                .push_bind(pattern)
                .push(")");
        }
        qb.push(" ORDER BY created_at DESC");

        let rows = qb
            .build_query_as::<KnowledgeArticle>()
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn get(&self, id: u64) -> Result<Option<KnowledgeArticle>, AppError> {
        let sql = format!("{ARTICLE_COLUMNS} WHERE id = ?");
        let article = sqlx::query_as::<_, KnowledgeArticle>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(article)
    }

    async fn create(
        &self,
        article: NewArticle,
        author_id: u64,
    ) -> Result<KnowledgeArticle, AppError> {
        let category = article.category.unwrap_or(Category::Faq);
        let result = sqlx::query(
            r#"
            INSERT INTO knowledge_base (title, content, category, tags, created_by)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&article.title)
        .bind(&article.content)
        .bind(category.as_ref())
        .bind(Json(&article.tags))
        .bind(author_id)
        .execute(&self.pool)
        .await?;

        self.get(result.last_insert_id())
            .await?
            .ok_or_else(|| AppError::Storage("inserted article vanished".into()))
    }

    async fn update(
        &self,
        id: u64,
        patch: ArticlePatch,
    ) -> Result<Option<KnowledgeArticle>, AppError> {
        sqlx::query(
            r#"
            UPDATE knowledge_base
            SET title = COALESCE(?, title),
                content = COALESCE(?, content),
                category = COALESCE(?, category),
                tags = COALESCE(?, tags)
            WHERE id = ?
            "#,
        )
        .bind(patch.title)
        .bind(patch.content)
        .bind(patch.category.map(|c| c.to_string()))
        .bind(patch.tags.map(Json))
        .bind(id)
        .execute(&self.pool)
        .await?;

        self.get(id).await
    }

    async fn delete(&self, id: u64) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM knowledge_base WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn categories(&self) -> Result<Vec<CategoryCount>, AppError> {
        let rows = sqlx::query_as::<_, CategoryCount>(
            r#"
            SELECT category, COUNT(*) AS count
            FROM knowledge_base
            GROUP BY category
            ORDER BY category
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}

#[async_trait]
impl AnalyticsStore for MySqlStore {
    async fn record(&self, entry: LogEntry) -> Result<(), AppError> {
        sqlx::query(
            "INSERT INTO analytics_logs (user_id, action_type, query, metadata) VALUES (?, ?, ?, ?)",
        )
        .bind(entry.user_id)
        .bind(entry.action.as_ref())
        .bind(entry.query)
        .bind(entry.metadata.map(Json))
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
