use std::path::{Path, PathBuf};

use anyhow::Context;
use axum::{
    Json,
    extract::{Multipart, State, multipart::Field},
    http::StatusCode,
    response::IntoResponse,
};
use tokio::fs;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use clipstream_db::{
    is_unique_violation,
    models::{NewUser, PublicUserRow, parse_timestamp},
};
use clipstream_types::api::{ApiResponse, RegistrationRequest};
use clipstream_types::models::User;

use crate::error::ApiError;
use crate::password::hash_password;
use crate::state::AppState;

/// POST /api/v1/users/register — multipart form with `username`, `fullName`,
/// `email`, `password` and files `avatar` (required) and `coverImage`.
pub async fn register(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    // Dropped on every exit, including when the request future itself is
    // dropped by a timeout or a disconnect.
    let mut staged = StagedFiles::default();
    let mut req = RegistrationRequest::default();

    read_registration_form(&state.upload_dir, multipart, &mut req, &mut staged).await?;
    let user = register_user(&state, &req).await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::new(200, user, "User Registered Successfully")),
    ))
}

/// Validate, check for an existing account, upload media, persist, and read
/// the new user back through the public projection. Stops at the first
/// failing step.
pub async fn register_user(
    state: &AppState,
    req: &RegistrationRequest,
) -> Result<User, ApiError> {
    let (Some(username), Some(full_name), Some(email), Some(password)) = (
        required(&req.username),
        required(&req.full_name),
        required(&req.email),
        required(&req.password),
    ) else {
        return Err(ApiError::MissingFields);
    };

    info!("Registration attempt for {} <{}>", username, email);

    // Advisory only; the UNIQUE constraints settle races at insert time.
    // Compare against the stored (lowercased) form.
    let existing = {
        let db = state.clone();
        let (u, e) = (username.to_lowercase(), email.to_string());
        blocking(move || db.db.find_user_by_username_or_email(&u, &e)).await?
    };
    if existing.is_some() {
        return Err(ApiError::UserExists);
    }

    let avatar_path = req.avatar.as_deref().ok_or(ApiError::MissingAvatar)?;

    let uploader = &state.uploader;
    let (avatar, cover_image) = tokio::join!(uploader.upload(avatar_path), async {
        match req.cover_image.as_deref() {
            Some(path) => uploader.upload(path).await,
            None => None,
        }
    });

    let avatar = avatar.ok_or(ApiError::AvatarUploadFailed)?;
    if req.cover_image.is_some() && cover_image.is_none() {
        warn!("Cover image for {} was not uploaded, continuing without it", username);
    }

    let password_hash = {
        let password = password.to_string();
        blocking(move || hash_password(&password)).await?
    };

    let new_user = NewUser {
        username: username.to_lowercase(),
        email: email.to_string(),
        full_name: full_name.to_string(),
        password_hash,
        avatar_url: avatar.url,
        cover_image_url: cover_image.map(|c| c.url).unwrap_or_default(),
    };

    let db = state.clone();
    let created = match blocking(move || db.db.create_user(&new_user)).await {
        Err(ApiError::Internal(e)) if is_unique_violation(&e) => {
            warn!("Lost registration race for {} <{}>", username, email);
            return Err(ApiError::UserExists);
        }
        other => other?,
    };

    let db = state.clone();
    let id = created.id.clone();
    let row = blocking(move || db.db.find_public_user_by_id(&id))
        .await?
        .ok_or_else(|| {
            error!("User {} missing right after insert", created.id);
            ApiError::RegistrationFailed
        })?;

    let user = public_user(row)?;
    info!("Registered user {} ({})", user.username, user.id);
    Ok(user)
}

/// Trimmed-non-empty check. The untrimmed value is what gets stored.
fn required(field: &Option<String>) -> Option<&str> {
    field.as_deref().filter(|v| !v.trim().is_empty())
}

/// Run blocking store or hashing work off the async runtime.
async fn blocking<F, T>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> anyhow::Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            ApiError::Internal(e.into())
        })?
        .map_err(ApiError::Internal)
}

fn public_user(row: PublicUserRow) -> anyhow::Result<User> {
    Ok(User {
        id: row.id.parse().with_context(|| format!("bad user id in database: {}", row.id))?,
        username: row.username,
        email: row.email,
        full_name: row.full_name,
        avatar_url: row.avatar_url,
        cover_image_url: row.cover_image_url,
        created_at: parse_timestamp(&row.created_at)?,
        updated_at: parse_timestamp(&row.updated_at)?,
    })
}

// ── Multipart intake ────────────────────────────────────────────────────

/// Fill `req` from the form. Files are written to `upload_dir` as they
/// arrive and recorded in `staged` before the first byte hits the disk.
async fn read_registration_form(
    upload_dir: &Path,
    mut multipart: Multipart,
    req: &mut RegistrationRequest,
    staged: &mut StagedFiles,
) -> Result<(), ApiError> {
    while let Some(field) = multipart.next_field().await? {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };

        match name.as_str() {
            "username" => req.username = Some(field.text().await?),
            "fullName" => req.full_name = Some(field.text().await?),
            "email" => req.email = Some(field.text().await?),
            "password" => req.password = Some(field.text().await?),
            "avatar" | "coverImage" => {
                let slot = if name == "avatar" {
                    &mut req.avatar
                } else {
                    &mut req.cover_image
                };
                // First file wins.
                if slot.is_some() {
                    debug!("Ignoring extra {} file", name);
                    continue;
                }
                *slot = stage_file(upload_dir, field, staged).await?;
            }
            other => warn!("Ignoring unexpected form field {}", other),
        }
    }

    Ok(())
}

/// Write a file part to disk. Parts with no filename or no content count as
/// "no file".
async fn stage_file(
    upload_dir: &Path,
    field: Field<'_>,
    staged: &mut StagedFiles,
) -> Result<Option<PathBuf>, ApiError> {
    let Some(file_name) = field.file_name().map(sanitize_file_name) else {
        return Ok(None);
    };

    let data = field.bytes().await?;
    if data.is_empty() {
        return Ok(None);
    }

    fs::create_dir_all(upload_dir).await?;
    let path = upload_dir.join(format!("{}-{}", Uuid::new_v4(), file_name));
    staged.track(path.clone());
    fs::write(&path, &data).await?;

    debug!("Staged {} bytes at {}", data.len(), path.display());
    Ok(Some(path))
}

/// Keep only the last path component and a conservative character set.
fn sanitize_file_name(raw: &str) -> String {
    let base = raw.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = base
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') { c } else { '_' })
        .collect();

    if cleaned.trim_matches('.').is_empty() {
        "upload".to_string()
    } else {
        cleaned
    }
}

/// Staged upload paths, removed from disk on drop. The uploader deletes the
/// files it consumes; this catches everything else.
#[derive(Debug, Default)]
struct StagedFiles(Vec<PathBuf>);

impl StagedFiles {
    fn track(&mut self, path: PathBuf) {
        self.0.push(path);
    }
}

impl Drop for StagedFiles {
    fn drop(&mut self) {
        for path in &self.0 {
            match std::fs::remove_file(path) {
                Ok(()) => debug!("Discarded staged file {}", path.display()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!("Failed to discard staged file {}: {}", path.display(), e),
            }
        }
    }
}
