use axum::{
    Form,
    extract::State,
    http::{HeaderMap, header},
    response::{Html, IntoResponse, Response},
};
use serde::Deserialize;

use crate::{
    catalog,
    clock,
    config::{Config, ConfigStore},
    error::AppError,
    passcode::{self, LoginFailure},
    session::{self, Session},
    state::AppState,
    template::{self, Expiry, Notice, View},
};

#[derive(Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    action: String,
    #[serde(default)]
    user_passcode: String,
}

pub async fn get_index(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    serve(&state, &headers, None).await
}

pub async fn post_index(
    State(state): State<AppState>,
    headers: HeaderMap,
    Form(form): Form<LoginForm>,
) -> Result<Response, AppError> {
    let submission = (form.action == "login").then_some(form.user_passcode);
    serve(&state, &headers, submission).await
}

/// Load the config, apply a login submission if there is one, then render
/// either the login form or the download list for this caller.
async fn serve(
    state: &AppState,
    headers: &HeaderMap,
    submission: Option<String>,
) -> Result<Response, AppError> {
    let mut config = state.config.load().await?;
    let now = state.clock.now();

    // Anonymous callers get no server-side entry; one is stored on login.
    let existing = match session::extract_session_cookie(headers) {
        Some(token) => state.sessions.get(&token).await.map(|s| (token, s)),
        None => None,
    };
    let mut session = existing
        .as_ref()
        .map(|(_, s)| s.clone())
        .unwrap_or_default();
    let mut issued = None;

    let mut notices = Vec::new();
    if let Some(candidate) = submission {
        match passcode::submit(state.config.as_ref(), &candidate, config.clone(), now).await {
            Ok(success) => {
                config = success.config;
                session = Session::authenticated(&config, now);

                // Fresh token on privilege change.
                if let Some((old, _)) = &existing {
                    state.sessions.remove(old).await;
                }
                let token = session::new_session_token();
                state.sessions.set(&token, session.clone()).await;
                issued = Some(token);

                notices.push(Notice::Success(if success.activated {
                    format!(
                        "Login successful. The passcode is now active for {} hours.",
                        config.ttl_hours
                    )
                } else {
                    "Login successful.".to_string()
                }));
            }
            Err(failure) => {
                log_failure(failure);
                notices.push(Notice::Error(failure.user_message().to_string()));
            }
        }
    }

    let markup = if session::is_authorized(&session, &config) {
        let items = catalog::visible_items(state.catalog.load().await);
        let view = View::Downloads {
            expiry: expiry(state, &config, now),
            items: &items,
            passcode_version: config.passcode_version,
            now,
        };
        template::page(&notices, &view)
    } else {
        template::page(
            &notices,
            &View::Login {
                ttl_hours: config.ttl_hours,
            },
        )
    };

    let page = Html(markup.into_string());
    if let Some(token) = issued {
        let cookie = session::session_cookie(&token, state.sessions.ttl());
        Ok(([(header::SET_COOKIE, cookie)], page).into_response())
    } else {
        Ok(page.into_response())
    }
}

fn expiry(state: &AppState, config: &Config, now: clock::Timestamp) -> Expiry {
    if let Some(left) = session::remaining_window(config, now) {
        return Expiry::Remaining(left);
    }
    match config.expires_at.as_deref() {
        Some(raw) => Expiry::EndedAt(match clock::parse_timestamp(raw) {
            Ok(ts) => clock::format_minutes(&state.clock.localize(ts)),
            Err(_) => raw.to_string(),
        }),
        None => Expiry::Unknown,
    }
}

fn log_failure(failure: LoginFailure) {
    match failure {
        LoginFailure::CorruptState => {
            tracing::warn!("Login refused: expires_at in config cannot be parsed")
        }
        LoginFailure::Storage => tracing::warn!("Login refused: {}", failure),
        _ => tracing::info!(reason = %failure, "Login refused"),
    }
}

pub async fn not_found() -> AppError {
    AppError::NotFound
}
