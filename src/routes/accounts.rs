//! Registration, login and logout handlers

use askama::Template;
use axum::{
    extract::{Query, State},
    http::{header, HeaderMap},
    response::{Html, IntoResponse, Redirect, Response},
    routing::get,
    Form, Router,
};
use serde::Deserialize;

use crate::auth;
use crate::error::Result;
use crate::forms::FormErrors;
use crate::shop::accounts::{self, LoginForm, RegisterForm};
use crate::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/register/", get(register_form).post(register))
        .route("/login/", get(login_form).post(login))
        .route("/logout/", get(logout_form).post(logout))
}

/// `?next=` on the login and logout pages
#[derive(Debug, Default, Deserialize)]
pub struct NextQuery {
    #[serde(default)]
    pub next: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LogoutForm {
    #[serde(default)]
    pub logout: Option<String>,
    #[serde(default)]
    pub next: Option<String>,
}

#[derive(Template)]
#[template(path = "register.html")]
struct RegisterTemplate {
    first_name: String,
    last_name: String,
    email: String,
    errors: FormErrors,
}

#[derive(Template)]
#[template(path = "login.html")]
struct LoginTemplate {
    email: String,
    next: String,
    failed: bool,
}

#[derive(Template)]
#[template(path = "logout.html")]
struct LogoutTemplate {
    next: String,
}

/// Only same-site paths are followed after login or logout
fn safe_next(next: Option<&str>) -> &str {
    match next {
        Some(path) if path.starts_with('/') && !path.starts_with("//") => path,
        _ => "/",
    }
}

pub async fn register_form() -> Result<Html<String>> {
    let template = RegisterTemplate {
        first_name: String::new(),
        last_name: String::new(),
        email: String::new(),
        errors: FormErrors::default(),
    };
    Ok(Html(template.render()?))
}

/// Create the account and log it in
pub async fn register(
    State(state): State<AppState>,
    Form(form): Form<RegisterForm>,
) -> Result<Response> {
    match accounts::register(state.store.as_ref(), &form).await {
        Ok(user) => {
            let cookie = auth::log_in(&state, &user).await;
            Ok(([(header::SET_COOKIE, cookie)], Redirect::to("/")).into_response())
        }
        Err(err) => {
            let Some(errors) = accounts::form_errors(&err) else {
                return Err(err);
            };
            let template = RegisterTemplate {
                first_name: form.first_name,
                last_name: form.last_name,
                email: form.email,
                errors,
            };
            Ok(Html(template.render()?).into_response())
        }
    }
}

pub async fn login_form(Query(query): Query<NextQuery>) -> Result<Html<String>> {
    let template = LoginTemplate {
        email: String::new(),
        next: safe_next(query.next.as_deref()).to_string(),
        failed: false,
    };
    Ok(Html(template.render()?))
}

pub async fn login(
    State(state): State<AppState>,
    Form(form): Form<LoginForm>,
) -> Result<Response> {
    let next = safe_next(form.next.as_deref()).to_string();

    match accounts::authenticate(state.store.as_ref(), &form.email, &form.password).await? {
        Some(user) => {
            let cookie = auth::log_in(&state, &user).await;
            Ok(([(header::SET_COOKIE, cookie)], Redirect::to(&next)).into_response())
        }
        None => {
            tracing::warn!(email = %form.email, "Failed login");
            let template = LoginTemplate {
                email: form.email,
                next,
                failed: true,
            };
            Ok(Html(template.render()?).into_response())
        }
    }
}

pub async fn logout_form(Query(query): Query<NextQuery>) -> Result<Html<String>> {
    let template = LogoutTemplate {
        next: safe_next(query.next.as_deref()).to_string(),
    };
    Ok(Html(template.render()?))
}

/// End the session when the form asks for it
pub async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
    Form(form): Form<LogoutForm>,
) -> Result<Response> {
    let next = safe_next(form.next.as_deref()).to_string();
    if form.logout.is_none() {
        return Ok(Redirect::to(&next).into_response());
    }

    let cookie = auth::log_out(&state, &headers).await;
    Ok(([(header::SET_COOKIE, cookie)], Redirect::to(&next)).into_response())
}
