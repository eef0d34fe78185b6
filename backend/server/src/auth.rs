use axum::{
    Form,
    extract::Query,
    http::StatusCode,
    response::{Html, Redirect, Response},
};
use serde::Deserialize;
use tracing::info;

use crate::{
    error::AppError,
    pages::layout,
    session::Visitor,
    utils::{escape, safe_next},
};

#[derive(Deserialize)]
pub struct NextQuery {
    next: Option<String>,
}

#[derive(Deserialize)]
pub struct LoginForm {
    email: String,
    password: String,
    next: Option<String>,
}

#[derive(Deserialize)]
pub struct SignUpForm {
    email: String,
    password: String,
    confirm_password: String,
}

fn notice(error: Option<&str>) -> String {
    error
        .map(|e| format!(r#"<p class="error">{}</p>"#, escape(e)))
        .unwrap_or_default()
}

fn login_form(email: &str, next: &str, error: Option<&str>) -> String {
    format!(
        r#"<h1>Sign in</h1>
{notice}
<form method="post" action="/login">
<input type="hidden" name="next" value="{next}">
<input type="email" name="email" value="{email}" required placeholder="Email">
<input type="password" name="password" required placeholder="Password">
<button type="submit">Sign in</button>
</form>
<p>No account yet? <a href="/signup">Sign up</a></p>"#,
        notice = notice(error),
        next = escape(next),
        email = escape(email),
    )
}

fn signup_form(email: &str, error: Option<&str>) -> String {
    format!(
        r#"<h1>Create an account</h1>
{notice}
<form method="post" action="/signup">
<input type="email" name="email" value="{email}" required placeholder="Email">
<input type="password" name="password" required placeholder="Password">
<input type="password" name="confirm_password" required placeholder="Confirm password">
<button type="submit">Sign up</button>
</form>
<p>Already registered? <a href="/login">Sign in</a></p>"#,
        notice = notice(error),
        email = escape(email),
    )
}

fn form_page(visitor: Visitor, status: StatusCode, title: &str, body: &str) -> Response {
    let html = Html(layout(title, visitor.user().as_ref(), body));

    visitor.finish((status, html))
}

pub async fn login_page(visitor: Visitor, Query(query): Query<NextQuery>) -> Response {
    let next = safe_next(query.next.as_deref()).to_string();

    if visitor.gate.is_authenticated() {
        return visitor.finish(Redirect::to(&next));
    }

    form_page(visitor, StatusCode::OK, "Sign in", &login_form("", &next, None))
}

pub async fn login_handler(visitor: Visitor, Form(form): Form<LoginForm>) -> Response {
    let next = safe_next(form.next.as_deref()).to_string();
    let email = form.email.trim();

    let result = visitor.gate.login(email, &form.password).await;

    match result {
        Ok(()) => {
            info!("{email} signed in");
            visitor.finish(Redirect::to(&next))
        }
        Err(e) => {
            let message = e.to_string();
            let status = AppError::from(e).status();

            form_page(
                visitor,
                status,
                "Sign in",
                &login_form(email, &next, Some(&message)),
            )
        }
    }
}

pub async fn signup_page(visitor: Visitor) -> Response {
    form_page(visitor, StatusCode::OK, "Sign up", &signup_form("", None))
}

pub async fn signup_handler(visitor: Visitor, Form(form): Form<SignUpForm>) -> Response {
    let email = form.email.trim();

    if form.password != form.confirm_password {
        let body = signup_form(email, Some("Passwords do not match"));
        return form_page(visitor, StatusCode::BAD_REQUEST, "Sign up", &body);
    }

    let result = visitor.gate.sign_up(email, &form.password).await;

    match result {
        Ok(outcome) if outcome.needs_email_confirm => {
            info!("{email} signed up, awaiting email confirmation");
            let body = r#"<h1>Check your email</h1>
<p>We sent you a confirmation link. Follow it, then <a href="/login">sign in</a>.</p>"#;
            form_page(visitor, StatusCode::OK, "Sign up", body)
        }
        Ok(_) => {
            info!("{email} signed up");
            visitor.finish(Redirect::to("/dashboard"))
        }
        Err(e) => {
            let message = e.to_string();
            let status = AppError::from(e).status();

            form_page(
                visitor,
                status,
                "Sign up",
                &signup_form(email, Some(&message)),
            )
        }
    }
}

pub async fn logout_handler(visitor: Visitor) -> Response {
    visitor.gate.logout().await;

    visitor.finish(Redirect::to("/login"))
}
