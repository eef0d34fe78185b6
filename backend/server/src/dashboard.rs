//! # Dashboard
//!
//! Operator-only surface. The page redirects signed-out visitors to the login
//! form with `next` set to where they were going; the JSON API answers them
//! with `401` instead.
//!
//! Every call runs with the operator's access token, so row-level security
//! applies and its errors come back unchanged. On the page each section shows
//! its own error in place; the rest still renders.
use std::future::Future;

use axum::{
    Json,
    extract::{Path, rejection::JsonRejection},
    http::{StatusCode, Uri},
    response::{Html, IntoResponse, Redirect, Response},
};
use store::{
    DashboardApi,
    models::{
        ContactSettings, ContactUpdate, DashboardSummary, Message, Restaurant, RestaurantUpdate,
        Subscription,
    },
};

use crate::{
    error::AppError,
    pages::layout,
    routes::{payload, required},
    session::Visitor,
    utils::{encode_query_value, escape},
};

/// Runs `op` for a signed-in operator and writes back any session change.
async fn respond<F, Fut, T>(visitor: Visitor, op: F) -> Response
where
    F: FnOnce(DashboardApi) -> Fut,
    Fut: Future<Output = Result<T, AppError>>,
    T: IntoResponse,
{
    let result = match visitor.dashboard() {
        Ok(api) => op(api).await,
        Err(e) => Err(e),
    };

    visitor.finish(result)
}

type Section<T> = Result<T, AppError>;

/// Each section loads on its own; one failing leaves the others intact.
struct Overview {
    subscriptions: Section<Vec<Subscription>>,
    messages: Section<Vec<Message>>,
    contact: Section<ContactSettings>,
    restaurants: Section<Vec<Restaurant>>,
}

fn section_error(e: &AppError) -> String {
    format!(r#"<p class="error">{}</p>"#, escape(&e.to_string()))
}

/// Stat-card count, `-` when the section failed to load.
fn count<T>(section: &Section<Vec<T>>) -> String {
    section
        .as_ref()
        .map(|rows| rows.len().to_string())
        .unwrap_or_else(|_| "-".to_string())
}

fn subscription_rows(subscriptions: &[Subscription]) -> String {
    let rows: String = subscriptions
        .iter()
        .map(|s| {
            format!(
                "<tr><td>{}</td><td>{}</td></tr>\n",
                escape(&s.email),
                s.created_at.format("%Y-%m-%d %H:%M")
            )
        })
        .collect();

    format!("<table>\n{rows}</table>")
}

fn message_rows(messages: &[Message]) -> String {
    let rows: String = messages
        .iter()
        .map(|m| {
            format!(
                r#"<tr><td>{name}</td><td>{email}</td><td>{subject}</td><td>{message}</td><td>{at}</td><td><button data-delete="/api/dashboard/messages/{id}">Delete</button></td></tr>
"#,
                name = escape(&m.name),
                email = escape(&m.email),
                subject = escape(m.subject.as_deref().unwrap_or("-")),
                message = escape(&m.message),
                at = m.created_at.format("%Y-%m-%d %H:%M"),
                id = escape(&m.id),
            )
        })
        .collect();

    format!("<table>\n{rows}</table>")
}

fn restaurant_forms(restaurants: &[Restaurant]) -> String {
    restaurants
        .iter()
        .map(|r| {
            format!(
                r#"<form data-api="/api/dashboard/restaurants/{id}" data-method="PUT" data-done="Saved">
<input name="name" value="{name}" required>
<input name="address" value="{address}" placeholder="Address">
<input name="description" value="{description}" placeholder="Description">
<button type="submit">Save</button>
<span class="status"></span>
</form>
"#,
                id = escape(&r.id),
                name = escape(&r.name),
                address = escape(r.address.as_deref().unwrap_or_default()),
                description = escape(r.description.as_deref().unwrap_or_default()),
            )
        })
        .collect()
}

fn contact_form(contact: &ContactSettings) -> String {
    format!(
        r#"<form data-api="/api/dashboard/contact" data-method="PUT" data-done="Saved">
<input name="phone" value="{phone}" placeholder="Phone">
<input name="email" value="{email}" placeholder="Email">
<input name="address" value="{address}" placeholder="Address">
<button type="submit">Save</button>
<span class="status"></span>
</form>"#,
        phone = escape(contact.phone.as_deref().unwrap_or_default()),
        email = escape(contact.email.as_deref().unwrap_or_default()),
        address = escape(contact.address.as_deref().unwrap_or_default()),
    )
}

fn render_section<T>(section: &Section<T>, render: impl FnOnce(&T) -> String) -> String {
    match section {
        Ok(data) => render(data),
        Err(e) => section_error(e),
    }
}

impl Overview {
    async fn load(api: &DashboardApi) -> Self {
        let (subscriptions, messages, contact, restaurants) = tokio::join!(
            api.list_subscriptions(),
            api.list_messages(),
            api.get_contact_settings(),
            api.ensure_seeded_restaurants(),
        );

        Self {
            subscriptions: subscriptions.map_err(AppError::from),
            messages: messages.map_err(AppError::from),
            contact: contact.map_err(AppError::from),
            restaurants: restaurants.map_err(AppError::from),
        }
    }

    fn render(&self) -> String {
        format!(
            r#"<h1>Dashboard</h1>
<section>
<p>Subscriptions: {subscription_count}</p>
<p>Messages: {message_count}</p>
<p>Restaurants: {restaurant_count}</p>
</section>
<section><h2>Contact details</h2>
{contact}
</section>
<section><h2>Restaurants</h2>
{restaurants}</section>
<section><h2>Messages</h2>
{messages}
</section>
<section><h2>Subscriptions</h2>
{subscriptions}
</section>"#,
            subscription_count = count(&self.subscriptions),
            message_count = count(&self.messages),
            restaurant_count = count(&self.restaurants),
            contact = render_section(&self.contact, contact_form),
            restaurants = render_section(&self.restaurants, |r| restaurant_forms(r)),
            messages = render_section(&self.messages, |m| message_rows(m)),
            subscriptions = render_section(&self.subscriptions, |s| subscription_rows(s)),
        )
    }
}

pub async fn dashboard_page(visitor: Visitor, uri: Uri) -> Response {
    let Ok(api) = visitor.dashboard() else {
        let next = uri
            .path_and_query()
            .map(|p| p.as_str())
            .unwrap_or("/dashboard");
        let login = format!("/login?next={}", encode_query_value(next));

        return visitor.finish(Redirect::to(&login));
    };

    let body = Overview::load(&api).await.render();
    let html = Html(layout("Dashboard", visitor.user().as_ref(), &body));

    visitor.finish(html)
}

async fn summary(api: DashboardApi) -> Result<Json<DashboardSummary>, AppError> {
    Ok(Json(api.summary().await?))
}

async fn subscriptions(api: DashboardApi) -> Result<Json<Vec<Subscription>>, AppError> {
    Ok(Json(api.list_subscriptions().await?))
}

async fn messages(api: DashboardApi) -> Result<Json<Vec<Message>>, AppError> {
    Ok(Json(api.list_messages().await?))
}

async fn delete_message(api: DashboardApi, id: String) -> Result<StatusCode, AppError> {
    api.delete_message(&id).await?;

    Ok(StatusCode::NO_CONTENT)
}

async fn contact(api: DashboardApi) -> Result<Json<ContactSettings>, AppError> {
    Ok(Json(api.get_contact_settings().await?))
}

async fn update_contact(
    api: DashboardApi,
    update: ContactUpdate,
) -> Result<Json<ContactSettings>, AppError> {
    Ok(Json(api.update_contact_settings(update).await?))
}

async fn restaurants(api: DashboardApi) -> Result<Json<Vec<Restaurant>>, AppError> {
    Ok(Json(api.ensure_seeded_restaurants().await?))
}

async fn update_restaurant(
    api: DashboardApi,
    id: String,
    update: RestaurantUpdate,
) -> Result<Json<Restaurant>, AppError> {
    Ok(Json(api.update_restaurant(&id, update).await?))
}

pub async fn summary_handler(visitor: Visitor) -> Response {
    respond(visitor, summary).await
}

pub async fn subscriptions_handler(visitor: Visitor) -> Response {
    respond(visitor, subscriptions).await
}

pub async fn messages_handler(visitor: Visitor) -> Response {
    respond(visitor, messages).await
}

pub async fn delete_message_handler(visitor: Visitor, Path(id): Path<String>) -> Response {
    respond(visitor, |api| delete_message(api, id)).await
}

pub async fn contact_handler(visitor: Visitor) -> Response {
    respond(visitor, contact).await
}

pub async fn update_contact_handler(
    visitor: Visitor,
    body: Result<Json<ContactUpdate>, JsonRejection>,
) -> Response {
    let update = match payload(body) {
        Ok(update) => update,
        Err(e) => return visitor.finish(e),
    };

    respond(visitor, |api| update_contact(api, update)).await
}

pub async fn restaurants_handler(visitor: Visitor) -> Response {
    respond(visitor, restaurants).await
}

pub async fn update_restaurant_handler(
    visitor: Visitor,
    Path(id): Path<String>,
    body: Result<Json<RestaurantUpdate>, JsonRejection>,
) -> Response {
    let update = match payload(body).and_then(|u| required("name", &u.name).map(|_| u)) {
        Ok(update) => update,
        Err(e) => return visitor.finish(e),
    };

    respond(visitor, |api| update_restaurant(api, id, update)).await
}
