use axum::{
    extract::State,
    http::{header::SET_COOKIE, HeaderMap, StatusCode},
    Json,
};
use chrono::{DateTime, Utc};
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    auth::{password, session, AuthenticatedUser, Role},
    error::{AppError, AppResult},
    models::{NewUser, User},
    schema::users::dsl,
    state::AppState,
};

const MAX_USERNAME_LENGTH: usize = 100;
const MAX_FULL_NAME_LENGTH: usize = 255;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
    pub full_name: String,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub token: String,
    pub token_type: String,
    pub expires_in: i64,
    pub user: AuthenticatedUser,
}

pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> AppResult<(StatusCode, HeaderMap, Json<SessionResponse>)> {
    let username = payload.username.trim().to_string();
    let full_name = payload.full_name.trim().to_string();
    if username.is_empty() || username.chars().count() > MAX_USERNAME_LENGTH {
        return Err(AppError::bad_request("username must be 1-100 characters"));
    }
    if full_name.is_empty() || full_name.chars().count() > MAX_FULL_NAME_LENGTH {
        return Err(AppError::bad_request("full name must be 1-255 characters"));
    }
    if payload.password.is_empty() {
        return Err(AppError::bad_request("password must not be empty"));
    }

    let new_user = NewUser {
        id: Uuid::new_v4(),
        username,
        password_hash: password::hash_password(&payload.password)?,
        full_name,
        role: Role::User.as_str().to_string(),
    };

    let mut conn = state.db()?;
    let user: User = match diesel::insert_into(dsl::users)
        .values(&new_user)
        .get_result(&mut conn)
    {
        Ok(user) => user,
        Err(DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _)) => {
            return Err(AppError::bad_request("username already exists"));
        }
        Err(err) => return Err(AppError::from(err)),
    };

    info!(user_id = %user.id, username = %user.username, "user registered");

    let (headers, body) = start_session(&state, &mut conn, user)?;
    Ok((StatusCode::CREATED, headers, body))
}

pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> AppResult<(HeaderMap, Json<SessionResponse>)> {
    let mut conn = state.db()?;

    let user: User = dsl::users
        .filter(dsl::username.eq(payload.username.trim()))
        .first(&mut conn)
        .optional()?
        .ok_or_else(AppError::unauthorized)?;

    let valid = password::verify_password(&payload.password, &user.password_hash)
        .map_err(|_| AppError::unauthorized())?;

    if !valid {
        warn!(username = %user.username, "login rejected: bad credentials");
        return Err(AppError::unauthorized());
    }

    start_session(&state, &mut conn, user)
}

pub async fn logout(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> AppResult<(HeaderMap, StatusCode)> {
    if let Some(session_id) = user.session_id {
        let mut conn = state.db()?;
        session::close_session(&mut conn, session_id)?;
    }

    let mut headers = HeaderMap::new();
    if let Some(cookie) = session::build_clear_session_cookie(&state.config) {
        headers.insert(SET_COOKIE, cookie);
    }
    Ok((headers, StatusCode::NO_CONTENT))
}

pub async fn me(user: AuthenticatedUser) -> Json<AuthenticatedUser> {
    Json(user)
}

fn start_session(
    state: &AppState,
    conn: &mut PgConnection,
    user: User,
) -> AppResult<(HeaderMap, Json<SessionResponse>)> {
    let ttl = session::session_ttl(&state.config);
    let mut identity = AuthenticatedUser::from_user(user, None)?;
    let issued = session::open_session(conn, identity.user_id, ttl)?;
    identity.session_id = Some(issued.session.id);

    let expires_at = DateTime::<Utc>::from_naive_utc_and_offset(issued.session.expires_at, Utc);
    let mut headers = HeaderMap::new();
    if let Some(cookie) = session::build_session_cookie(&state.config, &issued.token, expires_at)
    {
        headers.insert(SET_COOKIE, cookie);
    }

    Ok((
        headers,
        Json(SessionResponse {
            token: issued.token,
            token_type: "Bearer".to_string(),
            expires_in: ttl.num_seconds(),
            user: identity,
        }),
    ))
}
