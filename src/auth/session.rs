use axum::http::HeaderValue;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use diesel::pg::PgConnection;
use diesel::prelude::*;
use rand::{rngs::OsRng, RngCore};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::config::AppConfig;
use crate::models::{NewSession, Session, User};
use crate::schema::{sessions, users};

pub const SESSION_COOKIE_NAME: &str = "session";

/// A freshly opened session. `token` is only ever shown to the client; the
/// database keeps its SHA-256 digest.
pub struct IssuedSession {
    pub token: String,
    pub session: Session,
}

pub fn open_session(
    conn: &mut PgConnection,
    user_id: Uuid,
    ttl: ChronoDuration,
) -> QueryResult<IssuedSession> {
    let token = generate_token();
    let new_session = NewSession {
        id: Uuid::new_v4(),
        user_id,
        token_hash: hash_token(&token),
        expires_at: (Utc::now() + ttl).naive_utc(),
    };

    let session = diesel::insert_into(sessions::table)
        .values(&new_session)
        .get_result::<Session>(conn)?;

    Ok(IssuedSession { token, session })
}

/// Looks up an unexpired session for `token` together with its user.
pub fn find_active(conn: &mut PgConnection, token: &str) -> QueryResult<Option<(Session, User)>> {
    let now = Utc::now().naive_utc();
    sessions::table
        .inner_join(users::table)
        .filter(sessions::token_hash.eq(hash_token(token)))
        .filter(sessions::expires_at.gt(now))
        .select((Session::as_select(), User::as_select()))
        .first(conn)
        .optional()
}

pub fn close_session(conn: &mut PgConnection, session_id: Uuid) -> QueryResult<usize> {
    diesel::delete(sessions::table.find(session_id)).execute(conn)
}

pub fn purge_expired(conn: &mut PgConnection) -> QueryResult<usize> {
    let now = Utc::now().naive_utc();
    diesel::delete(sessions::table.filter(sessions::expires_at.le(now))).execute(conn)
}

pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

fn generate_token() -> String {
    let mut bytes = [0u8; 32];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

pub fn session_ttl(config: &AppConfig) -> ChronoDuration {
    ChronoDuration::hours(config.session_expiry_hours)
}

pub fn build_session_cookie(
    config: &AppConfig,
    token: &str,
    expires_at: DateTime<Utc>,
) -> Option<HeaderValue> {
    let max_age = session_ttl(config).num_seconds();

    let mut parts = vec![format!("{}={}", SESSION_COOKIE_NAME, token)];
    parts.push("Path=/".into());
    parts.push("HttpOnly".into());
    parts.push("SameSite=Strict".into());
    parts.push(format!("Max-Age={}", max_age));
    parts.push(format!("Expires={}", expires_at.to_rfc2822()));
    append_cookie_scope(config, &mut parts);

    HeaderValue::from_str(&parts.join("; ")).ok()
}

pub fn build_clear_session_cookie(config: &AppConfig) -> Option<HeaderValue> {
    let mut parts = vec![format!("{}=", SESSION_COOKIE_NAME)];
    parts.push("Path=/".into());
    parts.push("HttpOnly".into());
    parts.push("SameSite=Strict".into());
    parts.push("Max-Age=0".into());
    parts.push("Expires=Thu, 01 Jan 1970 00:00:00 GMT".into());
    append_cookie_scope(config, &mut parts);

    HeaderValue::from_str(&parts.join("; ")).ok()
}

fn append_cookie_scope(config: &AppConfig, parts: &mut Vec<String>) {
    if config.session_cookie_secure {
        parts.push("Secure".into());
    }
    if let Some(domain) = &config.session_cookie_domain {
        parts.push(format!("Domain={}", domain));
    }
}
