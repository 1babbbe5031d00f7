use crate::api::analytics::{ActionCount, DailyCount, Dashboard, DashboardStats, LeaveTypeCount, QueryCount};
use crate::api::chat::SendMessage;
use crate::api::leave::{CreateLeave, UpdateStatus};
use crate::api::users::UpdateUser;
use crate::auth::handlers::{AuthResponse, LoginRequest, RegisterRequest, TokenPair};
use crate::chat::ChatReply;
use crate::model::conversation::{ConversationSummary, FunctionCallRecord, Message, MessageRole};
use crate::model::knowledge::{ArticlePatch, Category, CategoryCount, KnowledgeArticle, NewArticle};
use crate::model::leave_request::{LeaveBalance, LeaveRequest, LeaveRequestView, LeaveStatus, LeaveType};
use crate::model::role::Role;
use crate::model::user::User;
use utoipa::Modify;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{OpenApi, openapi};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "HR Assistant API",
        version = "1.0.0",
        description = r#"
## HR Assistant

Conversational HR help desk for employees, HR staff and administrators.

### Features
- **Chat**: ask the assistant questions; it can check leave balances,
  file leave requests and search the knowledge base on your behalf
- **Leave**: request leave, view balances, approve or reject requests
- **Knowledge base**: policies, benefits, procedures and FAQs
- **Users** and **Analytics** for HR staff

### Security
Endpoints under `/api` require a JWT access token from `/auth/login`.
"#,
    ),
    paths(
        crate::auth::handlers::register,
        crate::auth::handlers::login,
        crate::auth::handlers::refresh_token,
        crate::auth::handlers::logout,
        crate::auth::handlers::me,

        crate::api::chat::send_message,
        crate::api::chat::list_conversations,
        crate::api::chat::get_conversation,
        crate::api::chat::delete_conversation,

        crate::api::leave::my_requests,
        crate::api::leave::all_requests,
        crate::api::leave::create_request,
        crate::api::leave::update_status,
        crate::api::leave::balance,

        crate::api::knowledge::list_articles,
        crate::api::knowledge::search,
        crate::api::knowledge::categories,
        crate::api::knowledge::get_article,
        crate::api::knowledge::create_article,
        crate::api::knowledge::update_article,
        crate::api::knowledge::delete_article,

        crate::api::users::list_users,
        crate::api::users::get_user,
        crate::api::users::update_user,

        crate::api::analytics::dashboard,
        crate::api::analytics::activity
    ),
    components(
        schemas(
            RegisterRequest,
            LoginRequest,
            AuthResponse,
            TokenPair,
            User,
            Role,
            SendMessage,
            ChatReply,
            Message,
            MessageRole,
            FunctionCallRecord,
            ConversationSummary,
            CreateLeave,
            UpdateStatus,
            LeaveRequest,
            LeaveRequestView,
            LeaveBalance,
            LeaveType,
            LeaveStatus,
            KnowledgeArticle,
            NewArticle,
            ArticlePatch,
            Category,
            CategoryCount,
            UpdateUser,
            Dashboard,
            DashboardStats,
            DailyCount,
            QueryCount,
            LeaveTypeCount,
            ActionCount
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Auth", description = "Registration, login and token rotation"),
        (name = "Chat", description = "Assistant conversations"),
        (name = "Leave", description = "Leave requests and balances"),
        (name = "Knowledge", description = "Knowledge base articles"),
        (name = "Users", description = "User profiles"),
        (name = "Analytics", description = "Usage statistics"),
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}
