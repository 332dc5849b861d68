use axum::{
    http::header,
    response::{Html, IntoResponse},
};

//-- HELPER FUNCS
// the sender page shows the QR code as a data: URL
const CONTENT_SECURITY_POLICY: &str = "default-src 'self'; script-src 'self'; style-src 'self'; img-src 'self' data:; connect-src 'self'; object-src 'none'; base-uri 'none'; frame-ancestors 'none'";

fn hardening_headers() -> [(header::HeaderName, &'static str); 4] {
    [
        (header::CONTENT_SECURITY_POLICY, CONTENT_SECURITY_POLICY),
        (header::X_FRAME_OPTIONS, "DENY"),
        (header::X_CONTENT_TYPE_OPTIONS, "nosniff"),
        (header::REFERRER_POLICY, "no-referrer"),
    ]
}

fn typed_hardening_headers(content_type: &'static str) -> [(header::HeaderName, &'static str); 5] {
    [
        (header::CONTENT_TYPE, content_type),
        (header::CONTENT_SECURITY_POLICY, CONTENT_SECURITY_POLICY),
        (header::X_FRAME_OPTIONS, "DENY"),
        (header::X_CONTENT_TYPE_OPTIONS, "nosniff"),
        (header::REFERRER_POLICY, "no-referrer"),
    ]
}

fn serve_html(content: &'static str) -> impl IntoResponse {
    (hardening_headers(), Html(content))
}

fn serve_js(content: &'static str) -> impl IntoResponse {
    (
        typed_hardening_headers("application/javascript;charset=utf-8"),
        content,
    )
}

//-- RECEIVER CONFIRMATION PAGE
// the file name is read from the query string client side and only ever set
// via textContent, so the page itself stays static
pub fn serve_confirm_page() -> impl IntoResponse {
    serve_html(include_str!("confirm.html"))
}

pub fn serve_confirm_js() -> impl IntoResponse {
    serve_js(include_str!("confirm.js"))
}

//-- SENDER CONTROL PAGE
pub fn serve_sender_page() -> impl IntoResponse {
    serve_html(include_str!("sender.html"))
}

pub fn serve_sender_js() -> impl IntoResponse {
    serve_js(include_str!("sender.js"))
}

//-- SHARED CSS
pub fn serve_shared_css() -> impl IntoResponse {
    (
        typed_hardening_headers("text/css; charset=utf-8"),
        include_str!("styles.css"),
    )
}
