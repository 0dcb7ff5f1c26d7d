use std::sync::Arc;

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;
use signalwatch_core::verification::{check_fields, normalize};
use signalwatch_core::{
    AccountId, Candidate, ConfirmOutcome, ExternalChannelId, PollOutcome, VerificationError,
    VerificationFlow,
};

use crate::error::{ApiError, FieldErrors};
use crate::session::session_cookie;
use crate::AppState;

const MIN_PASSWORD_LEN: usize = 8;

#[derive(Debug, Deserialize)]
pub struct RegisterForm {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub password_confirmation: String,
    #[serde(default)]
    pub terms_accepted: bool,
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub account_id: AccountId,
    pub confirmation_link: String,
    pub bot_username: String,
}

/// POST /register
pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(form): Json<RegisterForm>,
) -> Result<(StatusCode, Json<RegisterResponse>), ApiError> {
    let form_errors = form_errors(&form);
    let mut candidate = normalize(Candidate {
        name: form.name,
        email: form.email,
        phone: form.phone,
        password_hash: String::new(),
    });

    if !form_errors.is_empty() {
        let mut errors = form_errors;
        for (field, messages) in check_fields(&candidate).by_field() {
            errors.entry(field.to_string()).or_default().extend(messages);
        }
        return Err(ApiError::Validation(errors));
    }

    candidate.password_hash = state
        .hasher
        .hash(&form.password)
        .map_err(|e| ApiError::Internal(format!("password hashing failed: {e}")))?;

    let registration = blocking(&state.flow, move |flow| flow.register(candidate)).await?;

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            account_id: registration.account.id,
            confirmation_link: registration.confirmation_link.to_string(),
            bot_username: state.flow.config().bot_username.clone(),
        }),
    ))
}

#[derive(Debug, Deserialize)]
pub struct CheckForm {
    pub user_id: i64,
}

/// POST /register/check
pub async fn check_verification(
    State(state): State<Arc<AppState>>,
    Json(form): Json<CheckForm>,
) -> Result<Response, ApiError> {
    let account_id = AccountId::new(form.user_id).map_err(|e| {
        ApiError::Validation(FieldErrors::from([("user_id".to_string(), vec![e.to_string()])]))
    })?;

    match blocking(&state.flow, move |flow| flow.poll(account_id)).await? {
        PollOutcome::Pending => Ok(Json(json!({ "verified": false })).into_response()),
        PollOutcome::Verified { grant } => {
            let session_id = state.sessions.issue(&grant);
            tracing::info!(account_id = %grant.account_id, "session opened after verification");
            Ok((
                [(header::SET_COOKIE, session_cookie(&session_id, grant.remember))],
                Json(json!({ "verified": true, "redirect": grant.redirect })),
            )
                .into_response())
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct TelegramUpdate {
    #[serde(default)]
    pub message: Option<TelegramMessage>,
}

#[derive(Debug, Deserialize)]
pub struct TelegramMessage {
    pub chat: TelegramChat,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TelegramChat {
    pub id: i64,
}

/// POST /telegram/webhook
///
/// Acknowledges every update; only `/start <payload>` messages can confirm
/// an account.
pub async fn telegram_webhook(
    State(state): State<Arc<AppState>>,
    Json(update): Json<TelegramUpdate>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let Some(TelegramMessage {
        chat,
        text: Some(text),
    }) = update.message
    else {
        return Ok(Json(json!({ "ok": true })));
    };

    let channel_id = ExternalChannelId::new(chat.id.to_string());
    let outcome = blocking(&state.flow, move |flow| {
        flow.confirm_start_message(&text, channel_id)
    })
    .await?;

    if let ConfirmOutcome::Verified { account_id } = outcome {
        tracing::debug!(%account_id, chat_id = chat.id, "webhook confirmed account");
    }
    Ok(Json(json!({ "ok": true })))
}

fn form_errors(form: &RegisterForm) -> FieldErrors {
    let mut errors = FieldErrors::new();
    let mut push = |field: &str, message: &str| {
        errors
            .entry(field.to_string())
            .or_default()
            .push(message.to_string());
    };

    if form.password.is_empty() {
        push("password", "password is required");
    } else if form.password.chars().count() < MIN_PASSWORD_LEN {
        push("password", "password must be at least 8 characters");
    } else if form.password != form.password_confirmation {
        push("password", "password confirmation does not match");
    }
    if !form.terms_accepted {
        push("terms_accepted", "the terms of use must be accepted");
    }
    errors
}

/// Run a flow operation off the async workers; stores may block on disk.
async fn blocking<T, F>(flow: &Arc<VerificationFlow>, op: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce(&VerificationFlow) -> Result<T, VerificationError> + Send + 'static,
{
    let flow = Arc::clone(flow);
    tokio::task::spawn_blocking(move || op(&flow))
        .await
        .map_err(|e| ApiError::Internal(format!("worker task failed: {e}")))?
        .map_err(ApiError::from)
}
