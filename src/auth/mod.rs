pub mod password;
pub mod role;
pub mod session;

use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::{request::Parts, HeaderMap},
    middleware::Next,
    response::Response,
};
use axum_extra::headers::{authorization::Bearer, Authorization, Cookie, HeaderMapExt};
use serde::Serialize;
use tracing::{error, warn};
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::User,
    state::AppState,
};

pub use role::{Permission, Role};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticatedUser {
    pub user_id: Uuid,
    pub username: String,
    pub full_name: String,
    pub role: Role,
    #[serde(skip)]
    pub session_id: Option<Uuid>,
}

impl AuthenticatedUser {
    /// Builds the identity for a stored user, refusing roles outside the closed set.
    pub fn from_user(user: User, session_id: Option<Uuid>) -> AppResult<Self> {
        let role = user.role.parse::<Role>().map_err(|err| {
            warn!(user_id = %user.id, error = %err, "user has unrecognised role");
            AppError::forbidden()
        })?;

        Ok(Self {
            user_id: user.id,
            username: user.username,
            full_name: user.full_name,
            role,
            session_id,
        })
    }
}

/// Session token from `Authorization: Bearer …`, falling back to the session cookie.
fn session_token(headers: &HeaderMap) -> Option<String> {
    if let Some(Authorization(bearer)) = headers.typed_get::<Authorization<Bearer>>() {
        return Some(bearer.token().to_owned());
    }

    headers
        .typed_get::<Cookie>()
        .and_then(|cookies| cookies.get(session::SESSION_COOKIE_NAME).map(str::to_owned))
}

fn resolve_identity(state: &AppState, headers: &HeaderMap) -> AppResult<AuthenticatedUser> {
    let token = session_token(headers).ok_or_else(AppError::unauthorized)?;

    let mut conn = state.db()?;
    let (session, user) =
        session::find_active(&mut conn, &token)?.ok_or_else(AppError::unauthorized)?;
    drop(conn);

    AuthenticatedUser::from_user(user, Some(session.id))
}

/// Establishes the caller's identity and stores it in the request extensions.
pub async fn authenticate(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let user = resolve_identity(&state, request.headers())?;
    request.extensions_mut().insert(user);
    Ok(next.run(request).await)
}

pub fn ensure_permission(user: &AuthenticatedUser, permission: Permission) -> AppResult<()> {
    if user.role.permits(permission) {
        Ok(())
    } else {
        warn!(
            user_id = %user.user_id,
            role = %user.role,
            permission = %permission,
            "request rejected by permission gate"
        );
        Err(AppError::forbidden())
    }
}

/// Permission gate layered inside `authenticate`; the required permission is the middleware state.
pub async fn require_permission(
    State(permission): State<Permission>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let Some(user) = request.extensions().get::<AuthenticatedUser>() else {
        error!(path = %request.uri().path(), "permission gate reached without an authenticated user");
        return Err(AppError::unauthorized());
    };

    ensure_permission(user, permission)?;
    Ok(next.run(request).await)
}

#[async_trait]
impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        if let Some(user) = parts.extensions.get::<AuthenticatedUser>() {
            return Ok(user.clone());
        }

        resolve_identity(state, &parts.headers)
    }
}
