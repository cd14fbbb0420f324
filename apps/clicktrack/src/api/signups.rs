//! Sign-up capture app handlers.

use super::client::ClientMeta;
use super::error::ApiError;
use super::extract::{ApiForm, ApiQuery};
use super::views::{PageNav, SignUpPageView};
use super::{AppState, found, unix_now};
use crate::tasks::Task;
use axum::Json;
use axum::extract::State;
use axum::response::{Html, Response};
use clicktrack_core::{Cursor, LinkBuilder, PageRequest, SignUp};
use regex::Regex;
use serde::Deserialize;
use tracing::info;

/// Accepted address shape. Same rule the sign-up form applies client side.
pub const EMAIL_PATTERN: &str = r"^([a-zA-Z0-9_.\-])+@(([a-zA-Z0-9\-])+\.)+([a-zA-Z0-9]{2,4})+$";

/// Compiled [`EMAIL_PATTERN`].
#[derive(Debug, Clone)]
pub struct EmailValidator {
    pattern: Regex,
}

impl EmailValidator {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            pattern: Regex::new(EMAIL_PATTERN)?,
        })
    }

    #[must_use]
    pub fn is_valid(&self, address: &str) -> bool {
        self.pattern.is_match(address)
    }
}

const SIGNUP_FORM: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>Sign up</title>
</head>
<body>
<form method="post" action="/signups">
  <label for="email">Email</label>
  <input id="email" name="email_addr" type="email" autocomplete="email" required>
  <button id="sign-up" type="submit">Sign up</button>
</form>
</body>
</html>
"#;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SignUpForm {
    #[serde(default)]
    pub email_addr: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SignUpListQuery {
    #[serde(default)]
    pub page: Option<usize>,
    #[serde(default)]
    pub cursor: Option<Cursor>,
}

/// `GET /`
pub async fn signup_form() -> Html<&'static str> {
    Html(SIGNUP_FORM)
}

/// `POST /signups`: validate, queue, redirect back to the form.
pub async fn create_signup(
    State(state): State<AppState>,
    client: ClientMeta,
    ApiForm(form): ApiForm<SignUpForm>,
) -> Result<Response, ApiError> {
    let email_addr = form.email_addr.trim();
    if !state.email.is_valid(email_addr) {
        return Err(ApiError::Unprocessable(format!(
            "invalid email address: {email_addr:?}"
        )));
    }

    let signup = SignUp {
        email_addr: email_addr.to_string(),
        remote_addr: client.remote_addr,
        user_agent: client.user_agent,
        date: unix_now(),
    };
    let task_id = state.queue.enqueue(Task::create_signup(signup))?;
    info!(%task_id, "sign-up queued");

    Ok(found("/"))
}

/// `GET /signups`
pub async fn list_signups(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<SignUpListQuery>,
) -> Result<Json<SignUpPageView>, ApiError> {
    let per_page = state.config.per_page;
    let request = PageRequest {
        page: query.page,
        cursor: query.cursor,
    };
    let page = state
        .with_store(move |store| store.signups_page(&request, per_page))
        .await?;

    Ok(Json(SignUpPageView {
        nav: PageNav::new(&page, &LinkBuilder::new("/signups")),
        signups: page.items,
    }))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn accepts_ordinary_addresses() {
        let validator = EmailValidator::new().unwrap();
        for address in ["ann@example.org", "first.last-1@mail.example.co.uk", "a_b@x.io"] {
            assert!(validator.is_valid(address), "{address}");
        }
    }

    #[test]
    fn rejects_malformed_addresses() {
        let validator = EmailValidator::new().unwrap();
        for address in ["", "ann", "ann@", "@example.org", "ann@example", "ann smith@example.org"] {
            assert!(!validator.is_valid(address), "{address}");
        }
    }
}
