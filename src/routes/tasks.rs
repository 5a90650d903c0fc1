use crate::{
    auth::{AuthenticatedUser, MessageResponse},
    error::AppError,
    models::{TaskInput, TaskPatch, TaskQuery},
    state::AppState,
    tasks,
};
use actix_web::{delete, get, patch, post, web, HttpResponse, Responder};
use serde_json::json;
use uuid::Uuid;
use validator::Validate;

/// Retrieves the authenticated user's tasks.
///
/// ## Query Parameters:
/// - `status` (optional): `TODO`, `IN_PROGRESS` or `DONE`.
/// - `category` (optional): exact category match.
/// - `search` (optional): case-insensitive match in title or description.
///
/// ## Responses:
/// - `200 OK`: `{"tasks": [...], "cached": bool}`. Only unfiltered listings
///   are ever served from (or written to) the cache.
/// - `400 Bad Request`: unknown status value.
#[get("")]
pub async fn get_tasks(
    state: web::Data<AppState>,
    query: web::Query<TaskQuery>,
    auth_user: AuthenticatedUser,
) -> Result<impl Responder, AppError> {
    let listing = tasks::list_tasks(
        state.tasks.as_ref(),
        state.cache.as_ref(),
        auth_user.id,
        query.into_inner(),
    )
    .await?;

    Ok(HttpResponse::Ok().json(listing))
}

/// Creates a new task for the authenticated user.
///
/// ## Request Body:
/// - `title`: required, 1 to 200 characters.
/// - `description`, `category`, `due_date` (`YYYY-MM-DD`): optional.
///
/// New tasks start as `TODO`.
///
/// ## Responses:
/// - `201 Created`: the stored task.
/// - `400 Bad Request`: missing or invalid fields.
#[post("")]
pub async fn create_task(
    state: web::Data<AppState>,
    task_data: web::Json<TaskInput>,
    auth_user: AuthenticatedUser,
) -> Result<impl Responder, AppError> {
    task_data.validate()?;

    let task = tasks::create_task(
        state.tasks.as_ref(),
        state.cache.as_ref(),
        auth_user.id,
        task_data.into_inner(),
    )
    .await?;

    Ok(HttpResponse::Created().json(task))
}

/// Partially updates a task the caller owns.
///
/// Any subset of `status`, `title`, `description`, `category`, `due_date`;
/// `null` clears the optional fields.
///
/// ## Responses:
/// - `200 OK`: the updated task.
/// - `400 Bad Request`: empty body, invalid status or field.
/// - `404 Not Found`: no such task for this user.
#[patch("/{id}")]
pub async fn update_task(
    state: web::Data<AppState>,
    task_id: web::Path<Uuid>,
    patch: web::Json<TaskPatch>,
    auth_user: AuthenticatedUser,
) -> Result<impl Responder, AppError> {
    if patch.is_empty() {
        return Err(AppError::BadRequest("No updates provided".into()));
    }
    patch.validate()?;

    let task = tasks::update_task(
        state.tasks.as_ref(),
        state.cache.as_ref(),
        auth_user.id,
        task_id.into_inner(),
        &patch,
    )
    .await?;

    Ok(HttpResponse::Ok().json(task))
}

/// Deletes a task the caller owns.
#[delete("/{id}")]
pub async fn delete_task(
    state: web::Data<AppState>,
    task_id: web::Path<Uuid>,
    auth_user: AuthenticatedUser,
) -> Result<impl Responder, AppError> {
    tasks::delete_task(
        state.tasks.as_ref(),
        state.cache.as_ref(),
        auth_user.id,
        task_id.into_inner(),
    )
    .await?;

    Ok(HttpResponse::Ok().json(MessageResponse::new("Task deleted")))
}

/// Task counts per status: `{"TODO": n, "IN_PROGRESS": n, "DONE": n}`.
#[get("/summary")]
pub async fn get_summary(
    state: web::Data<AppState>,
    auth_user: AuthenticatedUser,
) -> Result<impl Responder, AppError> {
    let summary = state.tasks.count_by_status(auth_user.id).await?;
    Ok(HttpResponse::Ok().json(summary))
}

/// Distinct categories in use: `{"categories": [...]}`.
#[get("/categories")]
pub async fn get_categories(
    state: web::Data<AppState>,
    auth_user: AuthenticatedUser,
) -> Result<impl Responder, AppError> {
    let categories = state.tasks.list_categories(auth_user.id).await?;
    Ok(HttpResponse::Ok().json(json!({ "categories": categories })))
}
