//! API service routes

use axum::{
    Extension, Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::{get, post},
};
use chrono::Utc;
use exchange::{
    ExchangeError, Ledger,
    models::{LedgerEntry, NewRequest, User, normalize_email},
    notifications,
    repositories::{RequestRepository, SessionRepository},
};
use serde_json::json;
use tower_http::trace::TraceLayer;
use tracing::info;
use uuid::Uuid;

use crate::{
    AppState,
    error::{ApiError, ApiResult},
    middleware::{AuthUser, auth_middleware},
    models::{
        ActingRequest, AdjustRequest, CreateExchangeRequest, EmailQuery, LedgerResponse, Mailbox,
        RequestListQuery, ScheduleRequest, TokensResponse, UpsertUserRequest,
    },
};

type Principal = Option<Extension<AuthUser>>;

/// Create the router for the API service
pub fn create_router(state: AppState) -> Router {
    let protected_routes = Router::new()
        .route("/users", post(upsert_user))
        .route("/users/:id", get(get_user))
        .route("/requests", post(send_request).get(list_requests))
        .route("/requests/:id/accept", post(accept_request))
        .route("/requests/:id/decline", post(decline_request))
        .route("/requests/:id/cancel", post(cancel_request))
        .route("/sessions", get(list_sessions))
        .route("/sessions/:id/schedule", post(schedule_session))
        .route("/sessions/:id/done", post(complete_session))
        .route("/ledger", get(get_ledger))
        .route("/tokens", get(get_tokens))
        .route("/notifications", get(get_notifications))
        .route("/admin/ledger/adjust", post(adjust_ledger))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    Router::new()
        .route("/health", get(health_check))
        .merge(protected_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let db_healthy = common::database::health_check(&state.db_pool).await?;
    let (status, label) = if db_healthy {
        (StatusCode::OK, "ok")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "degraded")
    };

    Ok((
        status,
        Json(json!({
            "status": label,
            "service": "swap-api",
            "db_healthy": db_healthy,
        })),
    ))
}

/// The user performing a write.
///
/// With a bearer token the principal is the token subject and a claimed
/// email must match it. In email-trust mode the claimed email is the actor.
async fn resolve_actor(
    state: &AppState,
    principal: Option<&AuthUser>,
    claimed_email: Option<&str>,
    field: &str,
) -> ApiResult<User> {
    let Some(principal) = principal else {
        let email = claimed_email
            .ok_or_else(|| ExchangeError::Validation(format!("{field} is required")))?;
        return Ok(state.accounts.require_by_email(email).await?);
    };

    let user = state
        .accounts
        .require_by_id(principal.id)
        .await
        .map_err(|e| match e {
            ExchangeError::NotFound { .. } => ApiError::Unauthorized,
            other => other.into(),
        })?;

    if let Some(email) = claimed_email {
        if normalize_email(email)? != user.email {
            return Err(ExchangeError::NotAuthorized(format!(
                "{field} does not match the authenticated user"
            ))
            .into());
        }
    }

    Ok(user)
}

/// The user whose data a read endpoint returns; admins may read anyone's
async fn resolve_subject(
    state: &AppState,
    principal: Option<&AuthUser>,
    email: Option<&str>,
) -> ApiResult<User> {
    match (principal, email) {
        (Some(p), Some(email)) if p.is_admin() => {
            Ok(state.accounts.require_by_email(email).await?)
        }
        _ => resolve_actor(state, principal, email, "email").await,
    }
}

fn principal(auth: &Principal) -> Option<&AuthUser> {
    auth.as_ref().map(|Extension(user)| user)
}

fn acting_email(body: &Option<Json<ActingRequest>>) -> Option<&str> {
    body.as_ref().and_then(|Json(b)| b.acting_email.as_deref())
}

/// Create a user on first sign-in, or refresh their profile
pub async fn upsert_user(
    State(state): State<AppState>,
    auth: Principal,
    Json(payload): Json<UpsertUserRequest>,
) -> ApiResult<impl IntoResponse> {
    if state.jwt.is_some() && !principal(&auth).is_some_and(AuthUser::is_admin) {
        return Err(ApiError::Forbidden(
            "user provisioning requires the admin role".to_string(),
        ));
    }

    let user = state.accounts.upsert(payload.into()).await?;
    Ok(Json(user))
}

/// Get a user by ID
pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let user = state.accounts.require_by_id(id).await?;
    Ok(Json(user))
}

/// Send a tutoring request, spending one token
pub async fn send_request(
    State(state): State<AppState>,
    auth: Principal,
    Json(payload): Json<CreateExchangeRequest>,
) -> ApiResult<impl IntoResponse> {
    let sender = resolve_actor(
        &state,
        principal(&auth),
        payload.from_email.as_deref(),
        "fromEmail",
    )
    .await?;
    let recipient = state.accounts.require_by_email(&payload.to_email).await?;

    let request = state
        .engine
        .send_request(NewRequest {
            from_user_id: sender.id,
            to_user_id: recipient.id,
            course_code: payload.course_code,
            minutes: payload.minutes,
            note: payload.note,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(request)))
}

/// Inbox or outbox of a user
pub async fn list_requests(
    State(state): State<AppState>,
    auth: Principal,
    Query(query): Query<RequestListQuery>,
) -> ApiResult<impl IntoResponse> {
    let user = resolve_subject(&state, principal(&auth), query.email.as_deref()).await?;

    let requests = match query.mailbox {
        Mailbox::Inbox => RequestRepository::list_inbox(&state.db_pool, user.id).await?,
        Mailbox::Outbox => RequestRepository::list_outbox(&state.db_pool, user.id).await?,
    };

    Ok(Json(requests))
}

pub async fn accept_request(
    State(state): State<AppState>,
    auth: Principal,
    Path(id): Path<Uuid>,
    body: Option<Json<ActingRequest>>,
) -> ApiResult<impl IntoResponse> {
    let actor = resolve_actor(&state, principal(&auth), acting_email(&body), "actingEmail").await?;
    let acceptance = state.engine.accept_request(id, actor.id).await?;
    Ok(Json(acceptance))
}

pub async fn decline_request(
    State(state): State<AppState>,
    auth: Principal,
    Path(id): Path<Uuid>,
    body: Option<Json<ActingRequest>>,
) -> ApiResult<impl IntoResponse> {
    let actor = resolve_actor(&state, principal(&auth), acting_email(&body), "actingEmail").await?;
    let request = state.engine.decline_request(id, actor.id).await?;
    Ok(Json(request))
}

pub async fn cancel_request(
    State(state): State<AppState>,
    auth: Principal,
    Path(id): Path<Uuid>,
    body: Option<Json<ActingRequest>>,
) -> ApiResult<impl IntoResponse> {
    let actor = resolve_actor(&state, principal(&auth), acting_email(&body), "actingEmail").await?;
    let request = state.engine.cancel_request(id, actor.id).await?;
    Ok(Json(request))
}

/// Sessions where the user teaches or learns
pub async fn list_sessions(
    State(state): State<AppState>,
    auth: Principal,
    Query(query): Query<EmailQuery>,
) -> ApiResult<impl IntoResponse> {
    let user = resolve_subject(&state, principal(&auth), query.email.as_deref()).await?;
    let sessions = SessionRepository::list_for_user(&state.db_pool, user.id).await?;
    Ok(Json(sessions))
}

pub async fn schedule_session(
    State(state): State<AppState>,
    auth: Principal,
    Path(id): Path<Uuid>,
    Json(payload): Json<ScheduleRequest>,
) -> ApiResult<impl IntoResponse> {
    let actor = resolve_actor(
        &state,
        principal(&auth),
        payload.acting_email.as_deref(),
        "actingEmail",
    )
    .await?;
    let session = state
        .engine
        .schedule_session(id, actor.id, payload.start_at)
        .await?;
    Ok(Json(session))
}

/// Mark a session done, crediting the teacher
pub async fn complete_session(
    State(state): State<AppState>,
    auth: Principal,
    Path(id): Path<Uuid>,
    body: Option<Json<ActingRequest>>,
) -> ApiResult<impl IntoResponse> {
    let actor = resolve_actor(&state, principal(&auth), acting_email(&body), "actingEmail").await?;
    let session = state.engine.complete_session(id, actor.id).await?;
    Ok(Json(session))
}

/// Balance and entries read from one snapshot
async fn ledger_snapshot(state: &AppState, user_id: Uuid) -> ApiResult<(i64, Vec<LedgerEntry>)> {
    let mut tx = state.db_pool.begin().await?;
    sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ")
        .execute(&mut *tx)
        .await?;

    let balance = Ledger::balance_of(&mut *tx, user_id).await?;
    let entries = Ledger::entries(&mut *tx, user_id).await?;
    tx.commit().await?;

    Ok((balance, entries))
}

/// Ledger in minutes of teaching
pub async fn get_ledger(
    State(state): State<AppState>,
    auth: Principal,
    Query(query): Query<EmailQuery>,
) -> ApiResult<impl IntoResponse> {
    let user = resolve_subject(&state, principal(&auth), query.email.as_deref()).await?;
    let (balance, entries) = ledger_snapshot(&state, user.id).await?;
    Ok(Json(LedgerResponse::in_minutes(
        balance,
        entries,
        state.engine.policy(),
    )))
}

/// Ledger in tokens
pub async fn get_tokens(
    State(state): State<AppState>,
    auth: Principal,
    Query(query): Query<EmailQuery>,
) -> ApiResult<impl IntoResponse> {
    let user = resolve_subject(&state, principal(&auth), query.email.as_deref()).await?;
    let (tokens, entries) = ledger_snapshot(&state, user.id).await?;
    Ok(Json(TokensResponse { tokens, entries }))
}

/// Badge counts for the user's inbox and sessions
pub async fn get_notifications(
    State(state): State<AppState>,
    auth: Principal,
    Query(query): Query<EmailQuery>,
) -> ApiResult<impl IntoResponse> {
    let user = resolve_subject(&state, principal(&auth), query.email.as_deref()).await?;

    let inbox = RequestRepository::list_inbox(&state.db_pool, user.id).await?;
    let sessions = SessionRepository::list_for_user(&state.db_pool, user.id).await?;

    let counts = notifications::aggregate_within(
        Some(&inbox),
        Some(&sessions),
        Utc::now(),
        state.engine.policy().upcoming_window,
    );
    Ok(Json(counts))
}

/// Signed balance correction; admin principals only
pub async fn adjust_ledger(
    State(state): State<AppState>,
    auth: Principal,
    Json(payload): Json<AdjustRequest>,
) -> ApiResult<impl IntoResponse> {
    let admin = principal(&auth)
        .filter(|p| p.is_admin())
        .ok_or_else(|| ApiError::Forbidden("ledger adjustment requires the admin role".into()))?;

    let user = state.accounts.require_by_email(&payload.email).await?;
    let entry = state
        .accounts
        .adjust(user.id, payload.delta, payload.note)
        .await?;

    info!(
        admin_id = %admin.id,
        user_id = %user.id,
        delta = payload.delta,
        "admin ledger adjustment"
    );
    Ok((StatusCode::CREATED, Json(entry)))
}
