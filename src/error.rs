use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use maud::{DOCTYPE, PreEscaped, html};

use crate::{config::StoreError, css::STYLE};

#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("Not found")]
    NotFound,
    /// The passcode configuration cannot be read; nobody can log in.
    #[error("Configuration unavailable: {0}")]
    ConfigMissing(StoreError),
}

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        AppError::ConfigMissing(e)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, title, message) = match &self {
            AppError::NotFound => (
                StatusCode::NOT_FOUND,
                "404 Not Found",
                "The page you requested could not be found.".to_string(),
            ),
            AppError::ConfigMissing(e) => {
                tracing::error!("Configuration unavailable: {}", e);
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "Service unavailable",
                    "The system configuration (admin.json) cannot be read or is malformed. \
                     Please contact the administrator."
                        .to_string(),
                )
            }
        };

        let body = html! {
            (DOCTYPE)
            html lang="en" {
                head {
                    meta charset="utf-8";
                    meta name="viewport" content="width=device-width, initial-scale=1";
                    title { (title) }
                    style { (PreEscaped(STYLE)) }
                }
                body {
                    div class="container" {
                        h1 { (title) }
                        div class="err" { (message) }
                    }
                }
            }
        };

        (status, Html(body.into_string())).into_response()
    }
}
