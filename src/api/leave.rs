use actix_web::{HttpResponse, web};
use serde::Deserialize;
use serde_json::json;
use utoipa::{IntoParams, ToSchema};

use crate::api::AppState;
use crate::auth::auth::AuthUser;
use crate::auth::policy::{self, Action, Resource};
use crate::error::AppError;
use crate::model::leave_request::{Decision, LeaveStatus, LeaveType, parse_date};

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateLeave {
    #[serde(rename = "type")]
    #[schema(example = "vacation")]
    pub leave_type: Option<String>,
    #[schema(example = "2024-07-01", format = "date")]
    pub start_date: Option<String>,
    #[schema(example = "2024-07-05", format = "date")]
    pub end_date: Option<String>,
    #[schema(example = "Family trip")]
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateStatus {
    #[schema(example = "approved")]
    pub status: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct LeaveFilter {
    /// Only requests with this status
    pub status: Option<LeaveStatus>,
}

fn parse_decision(status: Option<&str>) -> Result<Decision, AppError> {
    match status {
        Some("approved") => Ok(Decision::Approved),
        Some("rejected") => Ok(Decision::Rejected),
        _ => Err(AppError::InvalidInput(
            "Status must be approved or rejected".into(),
        )),
    }
}

#[utoipa::path(
    get,
    path = "/api/leave/my-requests",
    responses((status = 200, description = "Caller's requests, newest first", body = Object)),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn my_requests(
    auth: AuthUser,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let requests = state.ledger.requests_for_user(auth.user_id).await?;
    Ok(HttpResponse::Ok().json(json!({ "leave_requests": requests })))
}

#[utoipa::path(
    get,
    path = "/api/leave/all-requests",
    params(LeaveFilter),
    responses(
        (status = 200, description = "All requests, newest first", body = Object),
        (status = 403, description = "HR/Admin only")
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn all_requests(
    auth: AuthUser,
    state: web::Data<AppState>,
    query: web::Query<LeaveFilter>,
) -> Result<HttpResponse, AppError> {
    policy::require(auth.actor(), Action::ListAllLeave, Resource::Organization)?;
    let requests = state.ledger.all_requests(query.status).await?;
    Ok(HttpResponse::Ok().json(json!({ "leave_requests": requests })))
}

#[utoipa::path(
    post,
    path = "/api/leave/request",
    request_body = CreateLeave,
    responses(
        (status = 201, description = "Request created as pending", body = Object),
        (status = 400, description = "Invalid input or insufficient balance")
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn create_request(
    auth: AuthUser,
    state: web::Data<AppState>,
    payload: web::Json<CreateLeave>,
) -> Result<HttpResponse, AppError> {
    let payload = payload.into_inner();
    let (Some(leave_type), Some(start), Some(end)) =
        (payload.leave_type, payload.start_date, payload.end_date)
    else {
        return Err(AppError::InvalidInput(
            "Type, start_date, and end_date are required".into(),
        ));
    };

    let leave_type: LeaveType = leave_type
        .parse()
        .map_err(|_| AppError::InvalidInput("Invalid leave type".into()))?;

    let created = state
        .ledger
        .create_request(
            auth.user_id,
            leave_type,
            parse_date("start_date", &start)?,
            parse_date("end_date", &end)?,
            payload.reason,
        )
        .await?;

    Ok(HttpResponse::Created().json(json!({
        "message": "Leave request submitted successfully",
        "leave_request": created,
    })))
}

#[utoipa::path(
    patch,
    path = "/api/leave/{id}/status",
    params(("id" = u64, Path, description = "Leave request id")),
    request_body = UpdateStatus,
    responses(
        (status = 200, description = "Request decided", body = Object),
        (status = 400, description = "Bad status or already processed"),
        (status = 403, description = "HR/Admin only"),
        (status = 404, description = "Leave request not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn update_status(
    auth: AuthUser,
    state: web::Data<AppState>,
    path: web::Path<u64>,
    payload: web::Json<UpdateStatus>,
) -> Result<HttpResponse, AppError> {
    policy::require(auth.actor(), Action::DecideLeave, Resource::Organization)?;
    let decision = parse_decision(payload.status.as_deref())?;

    let updated = state
        .ledger
        .set_status(path.into_inner(), auth.user_id, decision)
        .await?;

    Ok(HttpResponse::Ok().json(json!({
        "message": format!("Leave request {} successfully", updated.status),
        "leave_request": updated,
    })))
}

#[utoipa::path(
    get,
    path = "/api/leave/balance",
    responses((status = 200, description = "Remaining days", body = Object)),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn balance(auth: AuthUser, state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    let balance = state.ledger.balance(auth.user_id).await?;
    Ok(HttpResponse::Ok().json(json!({ "balance": balance })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use actix_web::{App, http::StatusCode, middleware::from_fn, test as actix_test};
    use serde_json::Value;

    use crate::api::testing::{bearer, config};
    use crate::auth::middleware::auth_middleware;
    use crate::chat::testing::ScriptedModel;
    use crate::model::role::Role;
    use crate::store::memory::MemoryStore;

    const EMPLOYEE: u64 = 1;
    const HR: u64 = 2;

    #[actix_web::test]
    async fn request_then_approve_debits_once() {
        let store = Arc::new(MemoryStore::new());
        store.add_user(EMPLOYEE, "Eve", 10, 15);
        store.add_user(HR, "Hank", 10, 15);
        let state = web::Data::new(AppState::new(
            store.clone(),
            Arc::new(ScriptedModel::default()),
            10,
        ));

        let app = actix_test::init_service(
            App::new().app_data(config()).app_data(state).service(
                web::scope("/api/leave")
                    .wrap(from_fn(auth_middleware))
                    .route("/request", web::post().to(create_request))
                    .route("/all-requests", web::get().to(all_requests))
                    .route("/{id}/status", web::patch().to(update_status))
                    .route("/balance", web::get().to(balance)),
            ),
        )
        .await;

        let req = actix_test::TestRequest::post()
            .uri("/api/leave/request")
            .insert_header(bearer(EMPLOYEE, Role::Employee))
            .set_json(json!({
                "type": "vacation",
                "start_date": "2024-07-01",
                "end_date": "2024-07-05",
            }))
            .to_request();
        let resp = actix_test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CREATED);
        let body: Value = actix_test::read_body_json(resp).await;
        assert_eq!(body["leave_request"]["days"], 5);
        let id = body["leave_request"]["id"].as_u64().unwrap();

        let req = actix_test::TestRequest::patch()
            .uri(&format!("/api/leave/{id}/status"))
            .insert_header(bearer(EMPLOYEE, Role::Employee))
            .set_json(json!({ "status": "approved" }))
            .to_request();
        let resp = actix_test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);

        let req = actix_test::TestRequest::patch()
            .uri(&format!("/api/leave/{id}/status"))
            .insert_header(bearer(HR, Role::Hr))
            .set_json(json!({ "status": "maybe" }))
            .to_request();
        let resp = actix_test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let approve = || {
            actix_test::TestRequest::patch()
                .uri(&format!("/api/leave/{id}/status"))
                .insert_header(bearer(HR, Role::Hr))
                .set_json(json!({ "status": "approved" }))
                .to_request()
        };
        let resp = actix_test::call_service(&app, approve()).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body: Value = actix_test::read_body_json(resp).await;
        assert_eq!(body["message"], "Leave request approved successfully");
        assert_eq!(body["leave_request"]["approved_by"], HR);

        let resp = actix_test::call_service(&app, approve()).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: Value = actix_test::read_body_json(resp).await;
        assert_eq!(body["error"], "Leave request has already been processed");

        assert_eq!(store.user_balance(EMPLOYEE).vacation_balance, 10);

        let req = actix_test::TestRequest::get()
            .uri("/api/leave/balance")
            .insert_header(bearer(EMPLOYEE, Role::Employee))
            .to_request();
        let body: Value = actix_test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["balance"]["vacation_balance"], 10);

        let req = actix_test::TestRequest::get()
            .uri("/api/leave/all-requests?status=approved")
            .insert_header(bearer(HR, Role::Hr))
            .to_request();
        let body: Value = actix_test::call_and_read_body_json(&app, req).await;
        let rows = body["leave_requests"].as_array().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["employee_name"], "Eve");
        assert_eq!(rows[0]["approver_name"], "Hank");
    }

    #[actix_web::test]
    async fn insufficient_balance_reports_numbers() {
        let store = Arc::new(MemoryStore::new());
        store.add_user(EMPLOYEE, "Eve", 2, 15);
        let state = web::Data::new(AppState::new(store, Arc::new(ScriptedModel::default()), 10));
        let app = actix_test::init_service(
            App::new().app_data(config()).app_data(state).service(
                web::scope("/api/leave")
                    .wrap(from_fn(auth_middleware))
                    .route("/request", web::post().to(create_request)),
            ),
        )
        .await;

        let req = actix_test::TestRequest::post()
            .uri("/api/leave/request")
            .insert_header(bearer(EMPLOYEE, Role::Employee))
            .set_json(json!({
                "type": "sick",
                "start_date": "2024-03-01",
                "end_date": "2024-03-05",
            }))
            .to_request();
        let resp = actix_test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: Value = actix_test::read_body_json(resp).await;
        assert_eq!(body["current_balance"], 2);
        assert_eq!(body["requested_days"], 5);

        let req = actix_test::TestRequest::post()
            .uri("/api/leave/request")
            .insert_header(bearer(EMPLOYEE, Role::Employee))
            .set_json(json!({ "type": "sabbatical", "start_date": "2024-03-01", "end_date": "2024-03-02" }))
            .to_request();
        let body: Value = actix_test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["error"], "Invalid leave type");
    }

    #[test]
    fn only_terminal_statuses_are_decisions() {
        assert_eq!(parse_decision(Some("rejected")).unwrap(), Decision::Rejected);
        assert!(parse_decision(Some("pending")).is_err());
        assert!(parse_decision(None).is_err());
    }
}
