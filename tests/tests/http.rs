use actix_web::http::StatusCode;
use actix_web::{test, App};
use presentation::http::configure;
use serde_json::{json, Value};
use std::sync::Arc;
use tempfile::tempdir;
use tests::{app_state, write_document, FailingGenerator, ScriptedGenerator};

macro_rules! service {
    ($state:expr) => {
        test::init_service(App::new().app_data($state.clone()).configure(configure)).await
    };
}

fn sse_events(body: &[u8]) -> Vec<Value> {
    std::str::from_utf8(body)
        .unwrap()
        .split("\n\n")
        .filter(|frame| !frame.is_empty())
        .map(|frame| serde_json::from_str(frame.strip_prefix("data: ").unwrap()).unwrap())
        .collect()
}

#[actix_web::test]
async fn health_is_always_healthy() {
    let dir = tempdir().unwrap();
    let state = app_state(dir.path(), Arc::new(ScriptedGenerator::new(&["unused"])));
    let app = service!(state);

    let req = test::TestRequest::get().uri("/health").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body, json!({ "status": "healthy" }));
}

#[actix_web::test]
async fn index_acknowledges_even_a_missing_directory() {
    let dir = tempdir().unwrap();
    let state = app_state(dir.path(), Arc::new(ScriptedGenerator::new(&["unused"])));
    let app = service!(state);
    let missing = dir.path().join("nowhere");

    let req = test::TestRequest::post()
        .uri("/index")
        .set_json(json!({ "documents_directory": missing }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::ACCEPTED);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["status"], "processing");
    assert_eq!(
        body["message"],
        format!("Indexing documents from {} in the background.", missing.display())
    );
}

#[actix_web::test]
async fn index_defaults_to_the_configured_directory() {
    let dir = tempdir().unwrap();
    let state = app_state(dir.path(), Arc::new(ScriptedGenerator::new(&["unused"])));
    let app = service!(state);

    let req = test::TestRequest::post().uri("/index").set_json(json!({})).to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert!(body["message"]
        .as_str()
        .unwrap()
        .contains(&dir.path().join("documents").display().to_string()));
}

#[actix_web::test]
async fn query_before_indexing_is_a_server_error() {
    let dir = tempdir().unwrap();
    let state = app_state(dir.path(), Arc::new(ScriptedGenerator::new(&["unused"])));
    let app = service!(state);

    for uri in ["/query", "/query-stream"] {
        let req = test::TestRequest::post()
            .uri(uri)
            .set_json(json!({ "query": "anything?" }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["detail"], "Vector store not initialized. Run indexing first.");
    }
}

#[actix_web::test]
async fn malformed_body_is_unprocessable() {
    let dir = tempdir().unwrap();
    let state = app_state(dir.path(), Arc::new(ScriptedGenerator::new(&["unused"])));
    let app = service!(state);

    let req = test::TestRequest::post()
        .uri("/query")
        .insert_header(("content-type", "application/json"))
        .set_payload("{\"query\": ")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body: Value = test::read_body_json(resp).await;
    assert!(body["detail"].is_string());

    let req = test::TestRequest::post()
        .uri("/query")
        .set_json(json!({ "max_context_docs": 2 }))
        .to_request();
    assert_eq!(
        test::call_service(&app, req).await.status(),
        StatusCode::UNPROCESSABLE_ENTITY
    );
}

#[actix_web::test]
async fn streamed_answer_matches_buffered_answer() {
    let dir = tempdir().unwrap();
    write_document(&dir.path().join("documents"), "lease.txt", "Office rent is 500 euros.");
    let generator = ScriptedGenerator::new(&["The rent ", "is 500 ", "euros."]);
    let state = app_state(dir.path(), Arc::new(generator));
    state.indexer.run(&dir.path().join("documents")).await.unwrap();
    let app = service!(state);

    let req = test::TestRequest::post()
        .uri("/query")
        .set_json(json!({ "query": "What is the rent?" }))
        .to_request();
    let buffered: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(buffered["answer"], "The rent is 500 euros.");
    let source = dir.path().join("documents/lease.txt").to_string_lossy().into_owned();
    assert_eq!(
        buffered["sources"],
        json!([{ "title": "lease.txt", "source": source }])
    );

    let req = test::TestRequest::post()
        .uri("/query-stream")
        .set_json(json!({ "query": "What is the rent?" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
        resp.headers().get("content-type").unwrap(),
        "text/event-stream"
    );
    let events = sse_events(&test::read_body(resp).await);

    let (last, content) = events.split_last().unwrap();
    assert_eq!(last, &json!({ "type": "done" }));
    assert!(!content.is_empty());
    assert!(content.iter().all(|e| e["type"] == "content"));
    let streamed: String = content.iter().map(|e| e["data"].as_str().unwrap()).collect();
    assert_eq!(streamed, buffered["answer"]);
}

#[actix_web::test]
async fn generation_failure_surfaces_as_answer_text_and_error_event() {
    let dir = tempdir().unwrap();
    write_document(&dir.path().join("documents"), "faq.md", "Support is open on weekdays.");
    let state = app_state(dir.path(), Arc::new(FailingGenerator));
    state.indexer.run(&dir.path().join("documents")).await.unwrap();
    let app = service!(state);

    let req = test::TestRequest::post()
        .uri("/query")
        .set_json(json!({ "query": "When is support open?" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(
        body["answer"],
        "I encountered an error while processing your question: Error from LLM API: 500, model crashed"
    );

    let req = test::TestRequest::post()
        .uri("/query-stream")
        .set_json(json!({ "query": "When is support open?" }))
        .to_request();
    let events = sse_events(&test::call_and_read_body(&app, req).await);
    assert_eq!(
        events,
        vec![json!({
            "type": "error",
            "data": "Error during streaming: Error from LLM API: 500, model crashed"
        })]
    );
}

#[actix_web::test]
async fn query_limits_sources_to_max_context_docs() {
    let dir = tempdir().unwrap();
    let documents = dir.path().join("documents");
    for (name, text) in [("a.txt", "apples"), ("b.txt", "bananas"), ("c.txt", "cherries")] {
        write_document(&documents, name, text);
    }
    let state = app_state(dir.path(), Arc::new(ScriptedGenerator::new(&["ok"])));
    state.indexer.run(&documents).await.unwrap();
    let app = service!(state);

    let req = test::TestRequest::post()
        .uri("/query")
        .set_json(json!({ "query": "apples", "max_context_docs": 2 }))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["sources"].as_array().unwrap().len(), 2);
    assert_eq!(body["sources"][0]["title"], "a.txt");
}
