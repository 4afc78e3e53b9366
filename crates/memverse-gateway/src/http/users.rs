//! Subscriber account endpoints: signup, profile, subscription, notes, favourites.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use memverse_core::types::{FavouriteVerse, ProfileUpdate, Subscriber, SubscriberId, UserNote, VerseId};
use memverse_core::Pace;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tracing::info;

use super::{ApiError, ApiResponse};
use crate::app::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub email: String,
}

/// POST /users
pub async fn create_user(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateUserRequest>,
) -> Result<ApiResponse<Subscriber>, ApiError> {
    let email = req.email.trim();
    if email.is_empty() || !email.contains('@') {
        return Err(ApiError::bad_request("Invalid email address")
            .with_errors(json!({ "email": "must be a valid email address" })));
    }
    let subscriber = state.store.create_subscriber(email).await?;
    info!(subscriber_id = subscriber.id, "subscriber created");
    Ok(ApiResponse::created("Subscriber created", subscriber))
}

#[derive(Debug, Deserialize)]
pub struct ProfileRequest {
    pub user_name: Option<String>,
    pub verse_pace: String,
    pub bible_translation: String,
}

/// PUT /users/{id}/profile
pub async fn update_profile(
    State(state): State<Arc<AppState>>,
    Path(id): Path<SubscriberId>,
    Json(req): Json<ProfileRequest>,
) -> Result<ApiResponse<Subscriber>, ApiError> {
    let pace: Pace = req.verse_pace.parse().map_err(|raw: String| {
        ApiError::new(
            StatusCode::UNPROCESSABLE_ENTITY,
            format!("'{raw}' is not a valid verse pace"),
        )
        .with_errors(json!({ "verse_pace": "must be daily or weekly" }))
    })?;
    let translation = req.bible_translation.trim();
    if translation.is_empty() {
        return Err(ApiError::bad_request("Bible translation is required")
            .with_errors(json!({ "bible_translation": "required" })));
    }

    let update = ProfileUpdate {
        user_name: req
            .user_name
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty()),
        pace,
        translation: translation.to_string(),
    };
    let subscriber = state.store.complete_profile(id, update).await?;
    Ok(ApiResponse::ok("Profile updated", subscriber))
}

#[derive(Debug, Deserialize)]
pub struct PaceRequest {
    pub verse_pace: String,
}

/// PATCH /users/{id}/profile: change the delivery pace of an existing profile.
/// The next due check uses the new pace against the existing marker.
pub async fn change_pace(
    State(state): State<Arc<AppState>>,
    Path(id): Path<SubscriberId>,
    Json(req): Json<PaceRequest>,
) -> Result<ApiResponse<Subscriber>, ApiError> {
    let subscriber = state.store.set_pace(id, &req.verse_pace).await?;
    info!(subscriber_id = id, pace = %subscriber.pace, "verse pace changed");
    Ok(ApiResponse::ok("Verse pace updated", subscriber))
}

/// POST /users/{id}/subscription/toggle
pub async fn toggle_subscription(
    State(state): State<Arc<AppState>>,
    Path(id): Path<SubscriberId>,
) -> Result<ApiResponse<Value>, ApiError> {
    let subscribed = state.store.toggle_subscription(id).await?;
    let message = if subscribed {
        "Subscribed to verse emails"
    } else {
        "Unsubscribed from verse emails"
    };
    Ok(ApiResponse::ok(message, json!({ "is_subscribed": subscribed })))
}

#[derive(Debug, Deserialize)]
pub struct NoteRequest {
    pub verse_reference: Option<String>,
    pub content: Option<String>,
}

/// POST /users/{id}/notes
pub async fn save_note(
    State(state): State<Arc<AppState>>,
    Path(id): Path<SubscriberId>,
    Json(req): Json<NoteRequest>,
) -> Result<ApiResponse<UserNote>, ApiError> {
    let reference = required(req.verse_reference);
    let content = required(req.content);

    let mut missing = Map::new();
    if reference.is_none() {
        missing.insert("verse_reference".into(), "required".into());
    }
    if content.is_none() {
        missing.insert("content".into(), "required".into());
    }
    let (Some(reference), Some(content)) = (reference, content) else {
        return Err(ApiError::bad_request("Verse reference and content are required")
            .with_errors(Value::Object(missing)));
    };

    let note = state.store.save_note(id, &reference, &content).await?;
    Ok(ApiResponse::created("Note saved", note))
}

fn required(field: Option<String>) -> Option<String> {
    field.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

/// GET /users/{id}/favourites
pub async fn list_favourites(
    State(state): State<Arc<AppState>>,
    Path(id): Path<SubscriberId>,
) -> Result<ApiResponse<Vec<FavouriteVerse>>, ApiError> {
    let favourites = state.store.favourites(id).await?;
    Ok(ApiResponse::ok("Favourite verses", favourites))
}

#[derive(Debug, Deserialize)]
pub struct FavouriteRequest {
    pub verse_id: VerseId,
}

/// POST /users/{id}/favourites
pub async fn toggle_favourite(
    State(state): State<Arc<AppState>>,
    Path(id): Path<SubscriberId>,
    Json(req): Json<FavouriteRequest>,
) -> Result<ApiResponse<Value>, ApiError> {
    let saved = state.store.toggle_favourite(id, req.verse_id).await?;
    let message = if saved {
        "Verse saved to favourites"
    } else {
        "Verse removed from favourites"
    };
    Ok(ApiResponse::ok(message, json!({ "is_saved": saved })))
}
