use crate::{
    auth::AuthenticatedUser,
    error::AppError,
    models::{Profile, ProfileSummary, ProfileUpdate, TaskStats, UserPatch},
    state::AppState,
};
use actix_web::{get, patch, web, HttpResponse, Responder};
use validator::Validate;

/// Account fields plus task statistics.
#[get("/profile")]
pub async fn get_profile(
    state: web::Data<AppState>,
    auth_user: AuthenticatedUser,
) -> Result<impl Responder, AppError> {
    let user = state
        .users
        .find_user_by_id(auth_user.id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".into()))?;
    let summary = state.tasks.count_by_status(auth_user.id).await?;

    Ok(HttpResponse::Ok().json(Profile::new(&user, TaskStats::from(summary))))
}

/// Updates `name` and/or `avatar_color`; nothing else is editable here.
#[patch("/profile")]
pub async fn update_profile(
    state: web::Data<AppState>,
    update: web::Json<ProfileUpdate>,
    auth_user: AuthenticatedUser,
) -> Result<impl Responder, AppError> {
    if update.is_empty() {
        return Err(AppError::BadRequest("No updates provided".into()));
    }
    update.validate()?;

    let user = state
        .users
        .update_user(auth_user.id, UserPatch::from(update.into_inner()))
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".into()))?;

    Ok(HttpResponse::Ok().json(ProfileSummary::from(&user)))
}
