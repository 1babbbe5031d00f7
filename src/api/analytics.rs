use actix_web::{HttpResponse, web};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::{MySql, MySqlPool, QueryBuilder};
use utoipa::{IntoParams, ToSchema};

use crate::auth::auth::AuthUser;
use crate::auth::policy::{self, Action, Actor, Resource};
use crate::error::AppError;

const DEFAULT_ACTIVITY_DAYS: i64 = 30;
const MAX_ACTIVITY_DAYS: i64 = 365;
const TOP_QUERY_LIMIT: i64 = 10;

#[derive(Debug, Serialize, ToSchema)]
pub struct DashboardStats {
    pub total_users: i64,
    pub pending_leave_requests: i64,
    pub total_conversations: i64,
    pub total_knowledge_articles: i64,
}

#[derive(Debug, Serialize, sqlx::FromRow, ToSchema)]
pub struct DailyCount {
    #[schema(value_type = String, format = "date")]
    pub date: NaiveDate,
    pub count: i64,
}

#[derive(Debug, Serialize, sqlx::FromRow, ToSchema)]
pub struct QueryCount {
    pub query: String,
    pub count: i64,
}

#[derive(Debug, Serialize, sqlx::FromRow, ToSchema)]
pub struct LeaveTypeCount {
    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub leave_type: String,
    pub count: i64,
}

#[derive(Debug, Serialize, sqlx::FromRow, ToSchema)]
pub struct ActionCount {
    pub action_type: String,
    #[schema(value_type = String, format = "date")]
    pub date: NaiveDate,
    pub count: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct Dashboard {
    pub stats: DashboardStats,
    pub chat_activity: Vec<DailyCount>,
    pub top_queries: Vec<QueryCount>,
    pub leave_distribution: Vec<LeaveTypeCount>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct ActivityQuery {
    /// Look-back window in days (1 to 365, default 30)
    pub days: Option<i64>,
}

/// Whose rows a dashboard query covers.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
enum Scope {
    Organization,
    User(u64),
}

impl Scope {
    fn for_actor(actor: Actor) -> Self {
        if policy::authorize(actor, Action::ViewOrganizationAnalytics, Resource::Organization)
            .is_allowed()
        {
            Scope::Organization
        } else {
            Scope::User(actor.user_id)
        }
    }

    fn push_filter(self, qb: &mut QueryBuilder<MySql>) {
        if let Scope::User(user_id) = self {
            qb.push(" AND user_id = ").push_bind(user_id);
        }
    }
}

fn activity_window(days: Option<i64>) -> i64 {
    days.unwrap_or(DEFAULT_ACTIVITY_DAYS).clamp(1, MAX_ACTIVITY_DAYS)
}

async fn count(pool: &MySqlPool, sql: &str) -> Result<i64, AppError> {
    Ok(sqlx::query_scalar::<_, i64>(sql).fetch_one(pool).await?)
}

#[utoipa::path(
    get,
    path = "/api/analytics/dashboard",
    responses((status = 200, description = "Dashboard figures", body = Dashboard)),
    security(("bearer_auth" = [])),
    tag = "Analytics"
)]
pub async fn dashboard(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
) -> Result<HttpResponse, AppError> {
    let pool = pool.get_ref();
    let scope = Scope::for_actor(auth.actor());

    let total_users = match scope {
        Scope::Organization => count(pool, "SELECT COUNT(*) FROM users").await?,
        Scope::User(_) => 0,
    };

    let mut qb: QueryBuilder<MySql> =
        QueryBuilder::new("SELECT COUNT(*) FROM leave_requests WHERE status = 'pending'");
    scope.push_filter(&mut qb);
    let pending_leave_requests = qb
        .build_query_scalar::<i64>()
        .fetch_one(pool)
        .await?;

    let total_conversations =
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM conversations WHERE user_id = ?")
            .bind(auth.user_id)
            .fetch_one(pool)
            .await?;

    let total_knowledge_articles = count(pool, "SELECT COUNT(*) FROM knowledge_base").await?;

    let mut qb: QueryBuilder<MySql> = QueryBuilder::new(
        "SELECT DATE(created_at) AS date, COUNT(*) AS count FROM analytics_logs \
         WHERE action_type = 'chat_message' AND created_at >= CURRENT_DATE - INTERVAL 7 DAY",
    );
    scope.push_filter(&mut qb);
    qb.push(" GROUP BY DATE(created_at) ORDER BY date ASC");
    let chat_activity = qb.build_query_as::<DailyCount>().fetch_all(pool).await?;

    let (top_queries, leave_distribution) = match scope {
        Scope::Organization => (
            sqlx::query_as::<_, QueryCount>(
                r#"
                SELECT query, COUNT(*) AS count
                FROM analytics_logs
                WHERE action_type = 'chat_message' AND query IS NOT NULL
                GROUP BY query
                ORDER BY count DESC
                LIMIT ?
                "#,
            )
            .bind(TOP_QUERY_LIMIT)
            .fetch_all(pool)
            .await?,
            sqlx::query_as::<_, LeaveTypeCount>(
                "SELECT type, COUNT(*) AS count FROM leave_requests GROUP BY type",
            )
            .fetch_all(pool)
            .await?,
        ),
        Scope::User(_) => (Vec::new(), Vec::new()),
    };

    Ok(HttpResponse::Ok().json(Dashboard {
        stats: DashboardStats {
            total_users,
            pending_leave_requests,
            total_conversations,
            total_knowledge_articles,
        },
        chat_activity,
        top_queries,
        leave_distribution,
    }))
}

#[utoipa::path(
    get,
    path = "/api/analytics/activity",
    params(ActivityQuery),
    responses((status = 200, description = "Caller's actions per type per day", body = Object)),
    security(("bearer_auth" = [])),
    tag = "Analytics"
)]
pub async fn activity(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<ActivityQuery>,
) -> Result<HttpResponse, AppError> {
    let days = activity_window(query.days);

    let activity = sqlx::query_as::<_, ActionCount>(
        r#"
        SELECT action_type, DATE(created_at) AS date, COUNT(*) AS count
        FROM analytics_logs
        WHERE user_id = ? AND created_at >= CURRENT_DATE - INTERVAL ? DAY
        GROUP BY action_type, DATE(created_at)
        ORDER BY date ASC
        "#,
    )
    .bind(auth.user_id)
    .bind(days)
    .fetch_all(pool.get_ref())
    .await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({ "activity": activity })))
}
