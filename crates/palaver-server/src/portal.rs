//! Management portal: account auth, generic user/post CRUD and the tenant
//! app registry. Thin handlers over the store; the chat engine is not
//! involved here.

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use palaver_shared::claim::SessionClaim;
use palaver_store::{AppClient, PortalUser, Post, StoreError};

use crate::api::{session_claim, AppState};
use crate::error::ApiError;

pub fn routes() -> Router<AppState> {
    Router::new()
        // Portal auth
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        // Portal users
        .route("/user", get(list_users))
        .route("/user/:id", get(get_user).delete(delete_user))
        // Posts
        .route("/post", post(create_post).get(list_posts))
        .route(
            "/post/:id",
            get(get_post).patch(update_post).delete(delete_post),
        )
        // Tenant app registry
        .route("/apps", post(register_app).get(list_apps))
        .route("/apps/:id", get(get_app).delete(delete_app))
}

fn hash_password(password: &str) -> Result<String, ApiError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| ApiError::Internal(format!("password hashing failed: {e}")))
}

fn verify_password(password: &str, stored_hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(stored_hash) else {
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

// ---------------------------------------------------------------------------
// Auth
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct RegisterBody {
    name: String,
    email: String,
    password: String,
}

#[derive(Deserialize)]
struct LoginBody {
    email: String,
    password: String,
}

#[derive(Serialize)]
struct AuthResponse {
    user: PortalUser,
    token: String,
}

async fn register(
    State(state): State<AppState>,
    Json(body): Json<RegisterBody>,
) -> Result<Json<AuthResponse>, ApiError> {
    if body.email.trim().is_empty() || body.password.is_empty() {
        return Err(ApiError::BadRequest(
            "email and password are required".to_string(),
        ));
    }

    let password_hash = hash_password(&body.password)?;

    let user = {
        let db = state.db();
        match db.get_portal_user_by_email(&body.email) {
            Ok(_) => {
                return Err(ApiError::Conflict("email already registered".to_string()));
            }
            Err(StoreError::NotFound) => {}
            Err(other) => return Err(other.into()),
        }
        db.create_portal_user(&body.name, &body.email, &password_hash)?
    };

    let token = state
        .signer
        .issue(&SessionClaim::issue(user.id, user.email.clone()))
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    Ok(Json(AuthResponse { user, token }))
}

async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginBody>,
) -> Result<Json<AuthResponse>, ApiError> {
    let user = state
        .db()
        .get_portal_user_by_email(&body.email)
        .map_err(|e| match e {
            StoreError::NotFound => ApiError::Unauthorized("invalid credentials".to_string()),
            other => other.into(),
        })?;

    if !verify_password(&body.password, &user.password_hash) {
        return Err(ApiError::Unauthorized("invalid credentials".to_string()));
    }

    let token = state
        .signer
        .issue(&SessionClaim::issue(user.id, user.email.clone()))
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    Ok(Json(AuthResponse { user, token }))
}

// ---------------------------------------------------------------------------
// Portal users
// ---------------------------------------------------------------------------

async fn list_users(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<PortalUser>>, ApiError> {
    session_claim(&state, &headers)?;
    Ok(Json(state.db().list_portal_users()?))
}

async fn get_user(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<Json<PortalUser>, ApiError> {
    session_claim(&state, &headers)?;
    Ok(Json(state.db().get_portal_user(id)?))
}

async fn delete_user(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<Json<serde_json::Value>, ApiError> {
    session_claim(&state, &headers)?;
    if !state.db().delete_portal_user(id)? {
        return Err(ApiError::NotFound(format!("portal user {id}")));
    }
    Ok(Json(serde_json::json!({ "deleted": true })))
}

// ---------------------------------------------------------------------------
// Posts
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct CreatePostBody {
    title: String,
    content: String,
}

#[derive(Deserialize)]
struct UpdatePostBody {
    title: Option<String>,
    content: Option<String>,
}

async fn create_post(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<CreatePostBody>,
) -> Result<Json<Post>, ApiError> {
    let claim = session_claim(&state, &headers)?;
    Ok(Json(state.db().create_post(
        &body.title,
        &body.content,
        claim.user_id,
    )?))
}

async fn list_posts(State(state): State<AppState>) -> Result<Json<Vec<Post>>, ApiError> {
    Ok(Json(state.db().list_posts()?))
}

async fn get_post(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Post>, ApiError> {
    Ok(Json(state.db().get_post(id)?))
}

async fn update_post(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Json(body): Json<UpdatePostBody>,
) -> Result<Json<Post>, ApiError> {
    let claim = session_claim(&state, &headers)?;

    let db = state.db();
    let existing = db.get_post(id)?;
    if existing.author_id != claim.user_id {
        return Err(ApiError::Unauthorized(
            "only the author may edit a post".to_string(),
        ));
    }

    db.update_post(id, body.title.as_deref(), body.content.as_deref())?;
    Ok(Json(db.get_post(id)?))
}

async fn delete_post(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let claim = session_claim(&state, &headers)?;

    let db = state.db();
    let existing = db.get_post(id)?;
    if existing.author_id != claim.user_id {
        return Err(ApiError::Unauthorized(
            "only the author may delete a post".to_string(),
        ));
    }

    db.delete_post(id)?;
    Ok(Json(serde_json::json!({ "deleted": true })))
}

// ---------------------------------------------------------------------------
// Tenant app registry
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct RegisterAppBody {
    id: String,
    name: Option<String>,
}

async fn register_app(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<RegisterAppBody>,
) -> Result<Json<AppClient>, ApiError> {
    session_claim(&state, &headers)?;
    if body.id.trim().is_empty() {
        return Err(ApiError::BadRequest("app id is required".to_string()));
    }

    let db = state.db();
    match db.get_app_client(&body.id) {
        Ok(_) => return Err(ApiError::Conflict("app id already registered".to_string())),
        Err(StoreError::NotFound) => {}
        Err(other) => return Err(other.into()),
    }
    Ok(Json(db.create_app_client(&body.id, body.name.as_deref())?))
}

async fn list_apps(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<AppClient>>, ApiError> {
    session_claim(&state, &headers)?;
    Ok(Json(state.db().list_app_clients()?))
}

async fn get_app(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<AppClient>, ApiError> {
    session_claim(&state, &headers)?;
    Ok(Json(state.db().get_app_client(&id)?))
}

async fn delete_app(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    session_claim(&state, &headers)?;
    if !state.db().delete_app_client(&id)? {
        return Err(ApiError::NotFound(format!("app client {id}")));
    }
    Ok(Json(serde_json::json!({ "deleted": true })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_hash_round_trip() {
        let hash = hash_password("hunter2").unwrap();
        assert!(verify_password("hunter2", &hash));
        assert!(!verify_password("hunter3", &hash));
        assert!(!verify_password("hunter2", "not-a-phc-string"));
    }
}
