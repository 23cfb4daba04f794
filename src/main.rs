//! Weft demo server
//!
//! A counter driven by one interaction with two stacked swaps, a signup form and
//! a clock pushed over Server-Sent Events.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use axum::Router;
use serde_json::{Map, Value};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use weft::component::{raw, Button, Data, Div, Document, Form, Fragment, Input, Label, Main, Section, Span, Text, H};
use weft::{Interaction, Multiplexer, Page, RequestData, ServerConfig, SseEvent, Stream, StreamTarget};

// ──────────────────────────────────────────────────────────────────────────────
// PAGE
// ──────────────────────────────────────────────────────────────────────────────

const HEAD: &str = concat!(
    r#"<meta charset="utf-8"><title>weft</title>"#,
    r#"<script src="https://unpkg.com/htmx.org@2.0.4"></script>"#,
    r#"<script src="https://unpkg.com/htmx-ext-sse@2.2.2/sse.js"></script>"#,
);

fn counter_section(count: Arc<AtomicI64>) -> Section {
    let counter = Interaction::new("count");

    let step = {
        let count = count.clone();
        counter.action(move |request: &mut RequestData| {
            let step = request.value("step").and_then(|v| v.parse::<i64>().ok()).unwrap_or(0);
            count.fetch_add(step, Ordering::SeqCst);
            request.insert("step", step);
        })
    };
    // Declared last, so it is the in-band swap and the total rides along out-of-band.
    let status = counter.swap();

    let total = step.update(
        Div::new()
            .class("total")
            .content(Text::new(move |_| count.load(Ordering::SeqCst).to_string())),
    );
    let last = status.update(Span::new().class("status").content(Text::new(|request| {
        match request.data.get("step") {
            Some(step) => format!("last step {step}"),
            None => "no changes yet".to_string(),
        }
    })));

    Section::new().id("counter").content(
        Fragment::new()
            .push(H::new(2).content("Counter"))
            .push(total)
            .push(counter.trigger(Button::new().content("-")).value("step", -1))
            .push(counter.trigger(Button::new().content("+")).value("step", 1))
            .push(last),
    )
}

fn signup_section() -> Section {
    let form = Form::new("signup")
        .content(
            Fragment::new()
                .push(Label::new().for_input("email").content("Email"))
                .push(Input::new().id("email").kind("email").name("email"))
                .push(Button::new().kind("submit").content("Sign up")),
        )
        .success(Div::new().class("ok").content(Fragment::new().push("Thanks, ").push(Data::new("email"))))
        .error(Div::new().class("error").content(Data::new("error")))
        .action(|request| {
            let email = request.value("email").unwrap_or_default().trim().to_string();
            if !email.contains('@') {
                return Err(format!("'{email}' is not an email address"));
            }
            let mut data = Map::new();
            data.insert("email".to_string(), Value::String(email));
            Ok(data)
        });
    Section::new().id("signup").content(Fragment::new().push(H::new(2).content("Signup")).push(form))
}

fn clock_section(clock: Arc<Multiplexer>) -> Section {
    Section::new().id("clock").content(
        Fragment::new().push(H::new(2).content("Uptime")).push(
            Stream::new("clock", clock).content(StreamTarget::new().event("tick").content(raw("starting"))),
        ),
    )
}

fn build_app(config: &ServerConfig, clock: Arc<Multiplexer>) -> Result<Router, weft::Error> {
    let page = Page::new();
    let count = Arc::new(AtomicI64::new(0));
    let document = Document::new().head(raw(HEAD)).body(
        Main::new().content(
            Fragment::new()
                .push(counter_section(count))
                .push(signup_section())
                .push(clock_section(clock)),
        ),
    );
    page.add_interaction(&document)?;
    page.build_with(config)
}

// ──────────────────────────────────────────────────────────────────────────────
// MAIN ENTRY POINT
// ──────────────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let config = ServerConfig::from_env();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&config.log_filter))
        .with_target(true)
        .init();

    let clock = Arc::new(Multiplexer::new());
    let app = build_app(&config, clock.clone())?;

    let ticks = clock.start();
    tokio::spawn(async move {
        let started = Instant::now();
        let mut interval = tokio::time::interval(Duration::from_secs(1));
        loop {
            interval.tick().await;
            let uptime = format!("{}s", started.elapsed().as_secs());
            let event = match SseEvent::component("tick", &Span::new().class("uptime").content(uptime)) {
                Ok(event) => event,
                Err(e) => {
                    warn!("failed to render clock tick: {}", e);
                    continue;
                }
            };
            if ticks.send(event).await.is_err() {
                break;
            }
        }
    });

    let listener = tokio::net::TcpListener::bind(&config.addr).await?;
    info!(addr = %config.addr, "weft demo listening");
    axum::serve(listener, app).await?;
    Ok(())
}
