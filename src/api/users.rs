use actix_web::{HttpResponse, web};
use serde::Deserialize;
use serde_json::json;
use sqlx::{MySql, MySqlPool, QueryBuilder};
use tracing::{info, instrument};
use utoipa::{IntoParams, ToSchema};

use crate::auth::auth::AuthUser;
use crate::auth::policy::{self, Action, Actor, Resource};
use crate::error::AppError;
use crate::model::role::Role;
use crate::model::user::User;

const USER_COLUMNS: &str = "id, email, name, department, role, hire_date, \
     sick_leave_balance, vacation_balance, created_at";

pub async fn find_user(pool: &MySqlPool, id: u64) -> Result<Option<User>, AppError> {
    let user = sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?"))
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(user)
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct UserFilter {
    /// Exact department name
    pub department: Option<String>,
    pub role: Option<Role>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct UpdateUser {
    #[schema(example = "Jane Doe")]
    pub name: Option<String>,
    #[schema(example = "Engineering")]
    pub department: Option<String>,
    pub role: Option<Role>,
    #[schema(example = 10)]
    pub sick_leave_balance: Option<i32>,
    #[schema(example = 15)]
    pub vacation_balance: Option<i32>,
}

/// One column assignment the caller is allowed to make.
#[derive(Debug, Clone, PartialEq, Eq)]
enum UserChange {
    Name(String),
    Department(String),
    Role(Role),
    SickLeaveBalance(i32),
    VacationBalance(i32),
}

/// Keeps the fields `actor` may change on `target`; the rest are dropped.
fn permitted_changes(
    actor: Actor,
    target: u64,
    update: UpdateUser,
) -> Result<Vec<UserChange>, AppError> {
    policy::require(actor, Action::UpdateProfile, Resource::OwnedBy(target))?;

    let allowed = |action| policy::authorize(actor, action, Resource::OwnedBy(target)).is_allowed();
    let mut changes = Vec::new();

    if let Some(name) = update.name.filter(|n| !n.trim().is_empty()) {
        changes.push(UserChange::Name(name.trim().to_string()));
    }
    if let Some(department) = update.department.filter(|d| !d.trim().is_empty()) {
        if allowed(Action::UpdateDepartment) {
            changes.push(UserChange::Department(department));
        }
    }
    if let Some(role) = update.role {
        if allowed(Action::UpdateRole) {
            changes.push(UserChange::Role(role));
        }
    }
    if allowed(Action::UpdateBalances) {
        if let Some(days) = update.sick_leave_balance {
            changes.push(UserChange::SickLeaveBalance(days));
        }
        if let Some(days) = update.vacation_balance {
            changes.push(UserChange::VacationBalance(days));
        }
    }

    if changes.is_empty() {
        return Err(AppError::InvalidInput("No valid fields to update".into()));
    }
    Ok(changes)
}

#[utoipa::path(
    get,
    path = "/api/users",
    params(UserFilter),
    responses(
        (status = 200, description = "Users ordered by name", body = Object),
        (status = 403, description = "HR/Admin only")
    ),
    security(("bearer_auth" = [])),
    tag = "Users"
)]
pub async fn list_users(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<UserFilter>,
) -> Result<HttpResponse, AppError> {
    policy::require(auth.actor(), Action::ListUsers, Resource::Organization)?;

    let mut qb: QueryBuilder<MySql> =
        QueryBuilder::new(format!("SELECT {USER_COLUMNS} FROM users WHERE 1=1"));

    if let Some(department) = &query.department {
        qb.push(" AND department = ").push_bind(department.clone());
    }
    if let Some(role) = query.role {
        qb.push(" AND role = ").push_bind(role.to_string());
    }
    qb.push(" ORDER BY name ASC");

    let users = qb
        .build_query_as::<User>()
        .fetch_all(pool.get_ref())
        .await?;

    Ok(HttpResponse::Ok().json(json!({ "users": users })))
}

#[utoipa::path(
    get,
    path = "/api/users/{id}",
    params(("id" = u64, Path, description = "User id")),
    responses(
        (status = 200, description = "User profile", body = Object),
        (status = 403, description = "Not self and not HR/Admin"),
        (status = 404, description = "User not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Users"
)]
pub async fn get_user(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> Result<HttpResponse, AppError> {
    let id = path.into_inner();
    policy::require(auth.actor(), Action::ReadUser, Resource::OwnedBy(id))?;

    let user = find_user(pool.get_ref(), id)
        .await?
        .ok_or_else(|| AppError::not_found("User"))?;
    Ok(HttpResponse::Ok().json(json!({ "user": user })))
}

#[utoipa::path(
    put,
    path = "/api/users/{id}",
    params(("id" = u64, Path, description = "User id")),
    request_body = UpdateUser,
    responses(
        (status = 200, description = "User updated", body = Object),
        (status = 400, description = "No valid fields to update"),
        (status = 403, description = "Not self and not HR/Admin"),
        (status = 404, description = "User not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Users"
)]
#[instrument(skip(auth, pool, payload), fields(actor = auth.user_id))]
pub async fn update_user(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: web::Json<UpdateUser>,
) -> Result<HttpResponse, AppError> {
    let id = path.into_inner();
    let changes = permitted_changes(auth.actor(), id, payload.into_inner())?;

    if find_user(pool.get_ref(), id).await?.is_none() {
        return Err(AppError::not_found("User"));
    }

    let mut qb: QueryBuilder<MySql> = QueryBuilder::new("UPDATE users SET ");
    let mut set = qb.separated(", ");
    for change in changes {
        match change {
            UserChange::Name(name) => {
                set.push("name = ");
                set.push_bind_unseparated(name);
            }
            UserChange::Department(department) => {
                set.push("department = ");
                set.push_bind_unseparated(department);
            }
            UserChange::Role(role) => {
                set.push("role = ");
                set.push_bind_unseparated(role.to_string());
            }
            UserChange::SickLeaveBalance(days) => {
                set.push("sick_leave_balance = ");
                set.push_bind_unseparated(days);
            }
            UserChange::VacationBalance(days) => {
                set.push("vacation_balance = ");
                set.push_bind_unseparated(days);
            }
        }
    }
    qb.push(" WHERE id = ").push_bind(id);
    qb.build().execute(pool.get_ref()).await?;

    let user = find_user(pool.get_ref(), id)
        .await?
        .ok_or_else(|| AppError::not_found("User"))?;

    info!(user_id = id, "User updated");
    Ok(HttpResponse::Ok().json(json!({
        "message": "User updated successfully",
        "user": user,
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    const EMPLOYEE: Actor = Actor {
        user_id: 1,
        role: Role::Employee,
    };
    const HR: Actor = Actor {
        user_id: 2,
        role: Role::Hr,
    };
    const ADMIN: Actor = Actor {
        user_id: 3,
        role: Role::Admin,
    };

    fn everything() -> UpdateUser {
        UpdateUser {
            name: Some("New Name".into()),
            department: Some("Sales".into()),
            role: Some(Role::Admin),
            sick_leave_balance: Some(99),
            vacation_balance: Some(99),
        }
    }

    #[test]
    fn employee_may_only_rename_self() {
        let changes = permitted_changes(EMPLOYEE, 1, everything()).unwrap();
        assert_eq!(changes, vec![UserChange::Name("New Name".into())]);
    }

    #[test]
    fn employee_cannot_touch_others() {
        assert!(matches!(
            permitted_changes(EMPLOYEE, 2, everything()),
            Err(AppError::AccessDenied(_))
        ));
    }

    #[test]
    fn hr_edits_everything_but_role() {
        let changes = permitted_changes(HR, 1, everything()).unwrap();
        assert!(!changes.iter().any(|c| matches!(c, UserChange::Role(_))));
        assert!(changes.contains(&UserChange::Department("Sales".into())));
        assert!(changes.contains(&UserChange::SickLeaveBalance(99)));
        assert!(changes.contains(&UserChange::VacationBalance(99)));
    }

    #[test]
    fn admin_may_change_roles() {
        let changes = permitted_changes(ADMIN, 1, everything()).unwrap();
        assert!(changes.contains(&UserChange::Role(Role::Admin)));
        assert_eq!(changes.len(), 5);
    }

    #[test]
    fn nothing_left_is_invalid_input() {
        let update = UpdateUser {
            role: Some(Role::Admin),
            vacation_balance: Some(50),
            ..Default::default()
        };
        assert!(matches!(
            permitted_changes(EMPLOYEE, 1, update),
            Err(AppError::InvalidInput(msg)) if msg == "No valid fields to update"
        ));
    }
}
