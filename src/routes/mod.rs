pub mod auth;
pub mod health;
pub mod tasks;
pub mod user;

use actix_web::{error, web, HttpRequest};

use crate::error::AppError;

/// Registers the `/api` routes. Callers wrap the enclosing scope in
/// `AuthMiddleware`.
pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.app_data(json_config())
        .app_data(query_config())
        .app_data(path_config())
        .service(
            web::scope("/auth")
                .service(auth::signup)
                .service(auth::login)
                .service(auth::verify_email)
                .service(auth::forgot_password)
                .service(auth::reset_password)
                .service(auth::resend_verification),
        )
        .service(
            web::scope("/tasks")
                .service(tasks::get_summary)
                .service(tasks::get_categories)
                .service(tasks::get_tasks)
                .service(tasks::create_task)
                .service(tasks::update_task)
                .service(tasks::delete_task),
        )
        .service(
            web::scope("/user")
                .service(user::get_profile)
                .service(user::update_profile),
        );
}

// Extraction failures become `{"error": ...}` bodies like every other error.

fn json_config() -> web::JsonConfig {
    web::JsonConfig::default().error_handler(|err, _req: &HttpRequest| {
        AppError::BadRequest(format!("Invalid request body: {}", err)).into()
    })
}

fn query_config() -> web::QueryConfig {
    web::QueryConfig::default().error_handler(|err, _req: &HttpRequest| {
        AppError::BadRequest(format!("Invalid query string: {}", err)).into()
    })
}

fn path_config() -> web::PathConfig {
    web::PathConfig::default().error_handler(|_err: error::PathError, _req: &HttpRequest| {
        AppError::NotFound("Task not found".into()).into()
    })
}
