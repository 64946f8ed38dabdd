use axum::Json;

use crate::profile::{Profile, profiles};

/// GET /api/v1/profiles
pub async fn list_profiles() -> Json<&'static [Profile]> {
    Json(profiles())
}
