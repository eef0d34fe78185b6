//! # Pages
//!
//! Server-rendered shells for the public site. Content is static apart from
//! the header, which shows who is signed in. Forms marked `data-api` send
//! JSON through one small inline script, shared with the dashboard.
use axum::{
    http::StatusCode,
    response::{Html, Response},
};
use store::User;

use crate::{session::Visitor, utils::escape};

pub struct StoreInfo {
    pub slug: &'static str,
    pub name: &'static str,
    pub area: &'static str,
    pub address: &'static str,
    pub phone: &'static str,
    pub email: &'static str,
    pub blurb: &'static str,
}

pub const STORES: [StoreInfo; 2] = [
    StoreInfo {
        slug: "easy-go-thai",
        name: "Easy Go Thai",
        area: "Mount Maunganui",
        address: "277 Mount Maunganui Rd, Mount Maunganui, Tauranga 3116",
        phone: "(07) 574 8500",
        email: "manager@easygothai.nz",
        blurb: "Authentic Thai street food, cooked to order.",
    },
    StoreInfo {
        slug: "asian-fusion",
        name: "Asian Fusion",
        area: "Bethlehem",
        address: "225 State Highway 2, Bethlehem, Tauranga 3110",
        phone: "022 402 6481",
        email: "info@asianfusion.nz",
        blurb: "Modern fusion cuisine built on Thai foundations.",
    },
];

const FORM_SCRIPT: &str = r#"<script>
document.querySelectorAll("form[data-api]").forEach((form) => {
  form.addEventListener("submit", async (event) => {
    event.preventDefault();
    const status = form.querySelector(".status");
    const body = Object.fromEntries(new FormData(form));
    const response = await fetch(form.dataset.api, {
      method: form.dataset.method || "POST",
      headers: { "Content-Type": "application/json" },
      body: JSON.stringify(body),
    });
    const result = await response.json();
    status.textContent = response.ok ? form.dataset.done : result.error;
    if (response.ok && !form.dataset.method) form.reset();
  });
});
document.querySelectorAll("button[data-delete]").forEach((button) => {
  button.addEventListener("click", async () => {
    const response = await fetch(button.dataset.delete, { method: "DELETE" });
    if (response.ok) button.closest("tr").remove();
  });
});
</script>"#;

/// Wraps `body` in the shared header and footer.
pub fn layout(title: &str, user: Option<&User>, body: &str) -> String {
    let account = match user.and_then(|u| u.email.as_deref()) {
        Some(email) => format!(
            r#"<a href="/dashboard">Dashboard</a> <span>{}</span>
<form method="post" action="/logout"><button type="submit">Sign out</button></form>"#,
            escape(email)
        ),
        None => r#"<a href="/login">Sign in</a>"#.to_string(),
    };

    format!(
        r#"<!doctype html>
<html lang="en">
<head><meta charset="utf-8"><title>{title} | Garoon Thai</title></head>
<body>
<header>
<nav><a href="/">Garoon Thai</a> <a href="/about">About</a> <a href="/our-stores">Our Stores</a> <a href="/contact">Contact</a> {account}</nav>
</header>
<main>
{body}
</main>
<footer><p>Easy Go Thai, Mount Maunganui. Asian Fusion, Bethlehem.</p></footer>
{FORM_SCRIPT}
</body>
</html>"#,
        title = escape(title),
    )
}

fn render(visitor: Visitor, title: &str, body: &str) -> Response {
    let html = Html(layout(title, visitor.user().as_ref(), body));

    visitor.finish(html)
}

fn store_card(store: &StoreInfo) -> String {
    format!(
        r#"<article>
<h3><a href="/stores/{slug}">{name}</a> - {area}</h3>
<p>{address}</p>
</article>"#,
        slug = store.slug,
        name = store.name,
        area = store.area,
        address = store.address,
    )
}

pub async fn home_page(visitor: Visitor) -> Response {
    let stores: String = STORES.iter().map(store_card).collect();
    let body = format!(
        r#"<h1>Garoon Thai</h1>
<ul>
<li>Authentic Thai cuisine using traditional recipes and fresh ingredients</li>
<li>Two locations to serve you better: Mount Maunganui and Bethlehem</li>
<li>Perfect for family dinners, date nights, and special occasions</li>
</ul>
<section>
<h2>Join Our Newsletter</h2>
<p>Stay updated with our latest news, menu updates, and special offers.</p>
<form data-api="/api/subscriptions" data-done="Thanks for subscribing!">
<input type="email" name="email" required placeholder="you@example.com">
<button type="submit">Subscribe</button>
<p class="status"></p>
</form>
</section>
<section><h2>Quick Contact</h2>{stores}</section>"#
    );

    render(visitor, "Home", &body)
}

pub async fn about_page(visitor: Visitor) -> Response {
    let body = r#"<h1>About Us</h1>
<p>Every dish is prepared using traditional Thai recipes passed down through generations, ensuring authentic taste in every bite.</p>
<p>We believe food brings people together. Our warm, welcoming environment makes every guest feel like family.</p>
<p>We source the finest fresh ingredients, importing authentic Thai spices and herbs to maintain traditional flavours.</p>
<p>Our experienced chefs combine traditional techniques with modern presentation to create memorable dining experiences.</p>"#;

    render(visitor, "About", body)
}

pub async fn stores_page(visitor: Visitor) -> Response {
    let stores: String = STORES.iter().map(store_card).collect();
    let body = format!(
        r#"<h1>Our Stores</h1>
{stores}
<h2>Services Available</h2>
<ul><li>Dine-In Experience</li><li>Takeaway &amp; Delivery</li><li>Flexible Service</li></ul>"#
    );

    render(visitor, "Our Stores", &body)
}

fn store_page(visitor: Visitor, store: &StoreInfo) -> Response {
    let body = format!(
        r#"<h1>{name}</h1>
<p>{area}</p>
<p>{blurb}</p>
<dl>
<dt>Address</dt><dd>{address}</dd>
<dt>Phone</dt><dd>{phone}</dd>
<dt>Email</dt><dd><a href="mailto:{email}">{email}</a></dd>
</dl>"#,
        name = store.name,
        area = store.area,
        blurb = store.blurb,
        address = store.address,
        phone = store.phone,
        email = store.email,
    );

    render(visitor, store.name, &body)
}

pub async fn easy_go_thai_page(visitor: Visitor) -> Response {
    store_page(visitor, &STORES[0])
}

pub async fn asian_fusion_page(visitor: Visitor) -> Response {
    store_page(visitor, &STORES[1])
}

pub async fn contact_page(visitor: Visitor) -> Response {
    let stores: String = STORES.iter().map(store_card).collect();
    let body = format!(
        r#"<h1>Contact Us</h1>
<p>We'd love to hear from you. Get in touch with questions, reservations, or feedback.</p>
<form data-api="/api/messages" data-done="Message sent! We'll get back to you soon.">
<input name="name" required placeholder="Name">
<input type="email" name="email" required placeholder="Email">
<input name="subject" placeholder="Subject (optional)">
<textarea name="message" required placeholder="Message"></textarea>
<button type="submit">Send</button>
<p class="status"></p>
</form>
<section><h2>General Inquiries</h2>{stores}</section>
<section>
<h2>Frequently Asked Questions</h2>
<h3>Do you take reservations?</h3>
<h3>Are there vegetarian options?</h3>
<h3>Do you offer delivery?</h3>
</section>"#
    );

    render(visitor, "Contact", &body)
}

pub async fn not_found_page(visitor: Visitor) -> Response {
    let body = r#"<h1>404</h1><p>Oops! Page not found.</p><a href="/">Return to Home</a>"#;
    let html = Html(layout("Not Found", visitor.user().as_ref(), body));

    visitor.finish((StatusCode::NOT_FOUND, html))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_escapes_user() {
        let user = User {
            id: "1".to_string(),
            email: Some("<script>@x.com".to_string()),
        };

        let html = layout("Home", Some(&user), "<p>hi</p>");

        assert!(html.contains("&lt;script&gt;@x.com"));
        assert!(html.contains(r#"action="/logout""#));
        assert!(html.contains("<p>hi</p>"));
    }

    #[test]
    fn test_layout_signed_out() {
        let html = layout("Home", None, "");

        assert!(html.contains(r#"href="/login""#));
        assert!(!html.contains("/logout"));
    }
}
