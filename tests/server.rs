//! HTTP Scenarios
//!
//! Drives built routers with `tower::ServiceExt::oneshot`, the way htmx and a
//! browser would hit them.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{header, HeaderMap, Request, StatusCode};
use axum::Router;
use serde_json::Map;
use tower::ServiceExt;

use weft::component::{raw, Button, Conditions, Data, Div, Form, Fragment, Input, Paths, Text, Tag};
use weft::{Interaction, Page, ServerConfig, SwapMethod};

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, HeaderMap, String) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, headers, String::from_utf8(body.to_vec()).unwrap())
}

fn full(method: &str, uri: &str) -> Request<Body> {
    Request::builder().method(method).uri(uri).body(Body::empty()).unwrap()
}

fn partial(method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("HX-Request", "true")
        .body(Body::empty())
        .unwrap()
}

fn form_post(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("HX-Request", "true")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn counter_app() -> Router {
    let page = Page::new();
    let inc = Interaction::new("inc");
    let tree = Fragment::new()
        .push(inc.swap().update(Div::new().content(raw("0"))))
        .push(inc.trigger(Button::new().content(raw("+"))));
    page.add_interaction(&tree).unwrap();
    page.build().unwrap()
}

#[tokio::test]
async fn test_document_and_partial() {
    let app = counter_app();

    let (status, _, body) = send(&app, full("GET", "/")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        concat!(
            r#"<div id="weft_0">0</div>"#,
            r##"<button hx-post="/inc" hx-swap="outerHTML" hx-target="#weft_0" type="button">+</button>"##
        )
    );

    let (status, _, body) = send(&app, partial("POST", "/inc")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, r#"<div id="weft_0">0</div>"#);
}

#[tokio::test]
async fn test_separate_target_and_content() {
    let page = Page::new();
    let inc = Interaction::new("inc");
    let swap = inc.swap().method(SwapMethod::OuterHtml);
    swap.content(Div::new().content(raw("0")));
    let tree = Fragment::new()
        .push(swap.target(Div::new().content(raw("0"))))
        .push(inc.trigger(Button::new().content(raw("+"))));
    page.add_interaction(&tree).unwrap();
    let app = page.build().unwrap();

    let (_, _, body) = send(&app, full("GET", "/")).await;
    assert_eq!(
        body,
        concat!(
            r#"<div id="weft_0">0</div>"#,
            r##"<button hx-post="/inc" hx-swap="outerHTML" hx-target="#weft_0" type="button">+</button>"##
        )
    );
    let (status, _, body) = send(&app, partial("POST", "/inc")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "<div>0</div>");
}

#[tokio::test]
async fn test_page_builds_twice() {
    let page = Page::new();
    page.add_interaction(&Conditions::new().when(|r| r.path == "/", "yes").otherwise("no")).unwrap();
    let first = page.build().unwrap();
    let second = page.build().unwrap();

    for app in [&first, &second] {
        let (status, _, body) = send(app, full("GET", "/")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "yes");
    }
}

#[test]
fn test_rebuilding_an_invalid_page_still_fails() {
    let page = Page::new();
    page.add_interaction(&Div::new().content(Tag::new(""))).unwrap();
    assert!(matches!(page.build(), Err(weft::Error::Invalid { .. })));
    assert!(matches!(page.build(), Err(weft::Error::Invalid { .. })));
}

#[tokio::test]
async fn test_full_requests_get_the_document() {
    let app = counter_app();
    let (_, _, document) = send(&app, full("GET", "/")).await;
    let (status, _, body) = send(&app, full("GET", "/inc")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, document);

    let (status, _, _) = send(&app, partial("GET", "/nowhere")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_action_updates_state() {
    let count = Arc::new(AtomicUsize::new(0));
    let page = Page::new();
    let add = Interaction::new("add");
    let bump = count.clone();
    let swap = add.action(move |_| {
        bump.fetch_add(1, Ordering::SeqCst);
    });
    let shown = count.clone();
    let tree = Fragment::new()
        .push(swap.update(Div::new().content(Text::new(move |_| shown.load(Ordering::SeqCst).to_string()))))
        .push(add.trigger(Button::new().content("add")));
    page.add_interaction(&tree).unwrap();
    let app = page.build().unwrap();

    send(&app, partial("POST", "/add")).await;
    let (_, _, body) = send(&app, partial("POST", "/add")).await;
    assert_eq!(body, r#"<div id="weft_0">2</div>"#);
    assert_eq!(count.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_text_is_escaped() {
    let page = Page::new();
    page.add_interaction(&Text::new(|r| r.value("q").unwrap_or_default().to_string())).unwrap();
    let app = page.build().unwrap();
    let (_, _, body) = send(&app, full("GET", "/?q=%3Cb%3E")).await;
    assert_eq!(body, "&lt;b&gt;");
}

#[tokio::test]
async fn test_form_round_trip() {
    let page = Page::new();
    let form = Form::new("signup")
        .content(Input::new().kind("email").name("email"))
        .success(Div::new().content(Fragment::new().push("thanks ").push(Data::new("email"))))
        .error(Div::new().class("error").content(Data::new("error")))
        .action(|request| match request.value("email") {
            Some(email) if email.contains('@') => {
                let mut data = Map::new();
                data.insert("email".to_string(), email.into());
                Ok(data)
            }
            _ => Err("invalid email".to_string()),
        });
    page.add_interaction(&form).unwrap();
    let app = page.build().unwrap();

    let (_, _, body) = send(&app, form_post("/signup", "email=nope")).await;
    assert_eq!(body, r#"<div class="error">invalid email</div>"#);

    let (_, _, body) = send(&app, form_post("/signup", "email=ada%40example.com")).await;
    assert_eq!(body, "<div>thanks ada@example.com</div>");
}

#[tokio::test]
async fn test_paths_replace_url_and_select_branch() {
    let page = Page::new();
    let paths = Paths::new("view")
        .route("home", Div::new().content("home"))
        .route("about", Div::new().content("about"))
        .default_path("home");
    page.add_interaction(&paths).unwrap();
    let app = page.build().unwrap();

    let (status, headers, body) = send(&app, partial("GET", "/about")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers["hx-replace-url"], "/about");
    assert_eq!(body, "<div>about</div>");

    let (_, _, body) = send(&app, full("GET", "/about")).await;
    assert_eq!(body, r#"<div id="view"><div>about</div></div>"#);

    let (_, _, body) = send(&app, full("GET", "/")).await;
    assert_eq!(
        body,
        r##"<div id="view"><div hx-get="/home" hx-target="#view" hx-trigger="load"></div></div>"##
    );
}

#[tokio::test]
async fn test_render_failure_is_a_generic_500() {
    let page = Page::new();
    page.at_path(&["broken"]).add_interaction(&raw("{{> nowhere}}")).unwrap();
    let app = page.build().unwrap();
    let (status, _, body) = send(&app, partial("POST", "/broken")).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, "error rendering template");
}

#[tokio::test]
async fn test_oversized_form_is_rejected() {
    let page = Page::new();
    page.at_path(&["echo"]).add_interaction(&raw("ok")).unwrap();
    let config = ServerConfig { max_form_bytes: 8, ..ServerConfig::default() };
    let app = page.build_with(&config).unwrap();

    let (status, _, _) = send(&app, form_post("/echo", "a=1")).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _, _) = send(&app, form_post("/echo", "a=1234567890")).await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
}

#[test]
fn test_template_parse_error_aborts_build() {
    let page = Page::new();
    page.add_interaction(&raw("{{#if}}")).unwrap();
    assert!(matches!(page.build(), Err(weft::Error::Template { ref path, .. }) if path == "/"));
}
