//! SSE fan-out
//!
//! Publisher behaviour with live, slow and disconnected subscribers, plus the
//! mounted stream endpoint.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use futures_util::StreamExt;
use tower::ServiceExt;

use weft::component::Span;
use weft::{Multiplexer, Page, SseEvent, Stream, StreamTarget};

#[tokio::test]
async fn test_fan_out_survives_dead_subscriber() {
    const EVENTS: usize = 10;
    const LIVE: usize = 3;

    let multiplexer = Arc::new(Multiplexer::new());
    let dead = multiplexer.subscribe().await;
    dead.cancel();

    let mut readers = Vec::new();
    for _ in 0..LIVE {
        let mut subscription = multiplexer.subscribe().await;
        readers.push(tokio::spawn(async move {
            let mut received = Vec::new();
            while received.len() < EVENTS {
                match subscription.recv().await {
                    Some(event) => received.push(event.data),
                    None => break,
                }
            }
            received
        }));
    }
    assert_eq!(multiplexer.subscriber_count().await, LIVE + 1);

    for i in 0..EVENTS {
        multiplexer.publish(SseEvent::named("tick", i.to_string())).await;
    }
    assert_eq!(multiplexer.subscriber_count().await, LIVE);

    let expected: Vec<String> = (0..EVENTS).map(|i| i.to_string()).collect();
    for reader in readers {
        assert_eq!(reader.await.unwrap(), expected);
    }
}

#[tokio::test]
async fn test_dropped_subscriber_is_pruned_on_next_publish() {
    let multiplexer = Multiplexer::new();
    let mut kept = multiplexer.subscribe().await;
    let dropped = multiplexer.subscribe().await;
    drop(dropped);
    assert_eq!(multiplexer.subscriber_count().await, 2);

    multiplexer.publish(SseEvent::new("hello")).await;
    assert_eq!(multiplexer.subscriber_count().await, 1);
    assert_eq!(kept.recv().await, Some(SseEvent::new("hello")));
}

#[tokio::test]
async fn test_start_forwards_events() {
    let multiplexer = Arc::new(Multiplexer::new());
    let mut subscription = multiplexer.subscribe().await;
    let sender = multiplexer.start();
    sender.send(SseEvent::new("from task")).await.unwrap();
    assert_eq!(subscription.recv().await, Some(SseEvent::new("from task")));
}

#[tokio::test]
async fn test_stream_endpoint_writes_wire_format() {
    let multiplexer = Arc::new(Multiplexer::new());
    let app = {
        let page = Page::new();
        let stream = Stream::new("clock", multiplexer.clone())
            .content(StreamTarget::new().event("tick").content("--"));
        page.add_interaction(&stream).unwrap();
        page.build().unwrap()
    };

    let request = Request::builder()
        .uri("/sse/clock")
        .header(header::ACCEPT, "text/event-stream")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "text/event-stream");
    assert_eq!(multiplexer.subscriber_count().await, 1);

    let event = SseEvent::component("tick", &Span::new().content("12:00")).unwrap();
    multiplexer.publish(event.clone()).await;

    let mut body = response.into_body().into_data_stream();
    let frame = body.next().await.unwrap().unwrap();
    assert_eq!(String::from_utf8(frame.to_vec()).unwrap(), event.to_string());
    assert_eq!(event.to_string(), "event: tick\ndata: <span>12:00</span>\n\n");

    drop(body);
    multiplexer.publish(SseEvent::new("after disconnect")).await;
    assert_eq!(multiplexer.subscriber_count().await, 0);
}
