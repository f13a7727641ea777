use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use bookshelf_service::models::book::NewBook;
use bookshelf_service::models::storage::{BookStore, MemoryBackend};
use bookshelf_service::{app, AppState, Backend};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

const SHELF: [(&str, &str, i32); 10] = [
    ("Anansi Boys", "Neil Gaiman", 5),
    ("The Left Hand of Darkness", "Ursula K. Le Guin", 5),
    ("Frankenstein", "Mary Shelley", 4),
    ("The Graphic Novel Handbook", "Scott McCloud", 3),
    ("Pride and Prejudice", "Jane Austen", 4),
    ("Madness and Civilization", "Michel Foucault", 4),
    ("Invisible Cities", "Italo Calvino", 5),
    ("A Novel Approach", "Ann Patchett", 2),
    ("Kindred", "Octavia E. Butler", 5),
    ("The Novel of the Century", "David Bellos", 3),
];

fn shelf() -> (Router, Backend) {
    let books = SHELF.iter().map(|&(title, author, rating)| NewBook {
        title: title.to_string(),
        author: author.to_string(),
        rating: Some(rating),
    });
    let store: Backend = Arc::new(MemoryBackend::with_books(books));
    (app(AppState::new(store.clone(), 8)), store)
}

async fn send(app: Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(json) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string())),
        None => builder.body(Body::empty()),
    }
    .unwrap();

    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

fn assert_error(status: StatusCode, data: &Value, code: u16, message: &str) {
    assert_eq!(status.as_u16(), code);
    assert_eq!(data["success"], false);
    assert_eq!(data["error"], code);
    assert_eq!(data["message"], message);
}

#[tokio::test]
async fn get_paginated_books() {
    let (app, _) = shelf();

    let (status, data) = send(app, Method::GET, "/books", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(data["success"], true);
    assert_eq!(data["total_books"], 10);
    assert_eq!(data["books"].as_array().unwrap().len(), 8);
    assert_eq!(data["books"][0]["id"], 1);
    assert_eq!(data["books"][0]["title"], "Anansi Boys");
}

#[tokio::test]
async fn second_page_holds_the_remainder() {
    let (app, _) = shelf();

    let (status, data) = send(app, Method::GET, "/books?page=2", None).await;

    assert_eq!(status, StatusCode::OK);
    let ids: Vec<i64> = data["books"]
        .as_array()
        .unwrap()
        .iter()
        .map(|book| book["id"].as_i64().unwrap())
        .collect();
    assert_eq!(ids, vec![9, 10]);
}

#[tokio::test]
async fn non_numeric_page_falls_back_to_first() {
    let (app, _) = shelf();

    let (status, data) = send(app, Method::GET, "/books?page=abc", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(data["books"][0]["id"], 1);
}

#[tokio::test]
async fn malformed_query_falls_back_to_first_page() {
    let (app, _) = shelf();

    let (status, data) = send(app, Method::GET, "/books?page=1&page=2", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(data["success"], true);
    assert_eq!(data["books"][0]["id"], 1);
    assert_eq!(data["books"].as_array().unwrap().len(), 8);
}

#[tokio::test]
async fn requesting_beyond_valid_page_is_404() {
    let (app, _) = shelf();

    let (status, data) = send(app, Method::GET, "/books?page=1000", None).await;

    assert_error(status, &data, 404, "Not found");
}

#[tokio::test]
async fn page_zero_is_404() {
    let (app, _) = shelf();

    let (status, data) = send(app, Method::GET, "/books?page=0", None).await;

    assert_error(status, &data, 404, "Not found");
}

#[tokio::test]
async fn empty_shelf_is_404() {
    let store: Backend = Arc::new(MemoryBackend::new());
    let app = app(AppState::new(store, 8));

    let (status, data) = send(app, Method::GET, "/books", None).await;

    assert_error(status, &data, 404, "Not found");
}

#[tokio::test]
async fn update_book_rating() {
    let (app, store) = shelf();

    let (status, data) = send(app, Method::PATCH, "/books/5", Some(json!({"rating": 1}))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(data["success"], true);
    assert_eq!(data["id"], 5);
    let book = store.get_book(5).await.unwrap().unwrap();
    assert_eq!(book.format()["rating"], 1);
    assert_eq!(book.title, "Pride and Prejudice");
}

#[tokio::test]
async fn update_without_body_is_400() {
    let (app, store) = shelf();

    let (status, data) = send(app, Method::PATCH, "/books/5", None).await;

    assert_error(status, &data, 400, "bad request");
    assert_eq!(store.get_book(5).await.unwrap().unwrap().rating, Some(4));
}

#[tokio::test]
async fn update_without_rating_is_400() {
    let (app, _) = shelf();

    let (status, data) = send(app, Method::PATCH, "/books/5", Some(json!({"title": "x"}))).await;

    assert_error(status, &data, 400, "bad request");
}

#[tokio::test]
async fn update_of_missing_book_is_400() {
    let (app, _) = shelf();

    let (status, data) = send(app, Method::PATCH, "/books/1000", Some(json!({"rating": 2}))).await;

    assert_error(status, &data, 400, "bad request");
}

#[tokio::test]
async fn delete_book() {
    let (app, store) = shelf();

    let (status, data) = send(app, Method::DELETE, "/books/4", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(data["success"], true);
    assert_eq!(data["deleted_book"], 4);
    assert_eq!(data["total_books"], 9);
    assert_eq!(data["books"].as_array().unwrap().len(), 8);
    assert_eq!(store.get_book(4).await.unwrap(), None);
}

#[tokio::test]
async fn deleting_missing_book_is_422() {
    let (app, store) = shelf();

    let (status, data) = send(app, Method::DELETE, "/books/1000", None).await;

    assert_error(status, &data, 422, "unprocessable");
    assert_eq!(store.count_books().await.unwrap(), 10);
}

#[tokio::test]
async fn deleting_non_numeric_id_is_422() {
    let (app, _) = shelf();

    let (status, data) = send(app, Method::DELETE, "/books/abc", None).await;

    assert_error(status, &data, 422, "unprocessable");
}

#[tokio::test]
async fn create_book() {
    let (app, store) = shelf();

    let (status, data) = send(
        app,
        Method::POST,
        "/books",
        Some(json!({
            "title": "Madness and Civilization",
            "author": "Michel Foucault",
            "rating": 5
        })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(data["success"], true);
    assert_eq!(data["created"], 11);
    assert_eq!(data["total_books"], 11);
    assert_eq!(data["books"].as_array().unwrap().len(), 8);
    assert_eq!(store.count_books().await.unwrap(), 11);
}

#[tokio::test]
async fn create_book_without_rating() {
    let (app, store) = shelf();

    let (status, data) = send(
        app,
        Method::POST,
        "/books",
        Some(json!({"title": "Unrated", "author": "Nobody"})),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let created = data["created"].as_i64().unwrap() as i32;
    assert_eq!(store.get_book(created).await.unwrap().unwrap().rating, None);
}

#[tokio::test]
async fn create_without_author_is_422() {
    let (app, store) = shelf();

    let (status, data) = send(app, Method::POST, "/books", Some(json!({"title": "Orphan"}))).await;

    assert_error(status, &data, 422, "unprocessable");
    assert_eq!(store.count_books().await.unwrap(), 10);
}

#[tokio::test]
async fn create_without_body_is_422() {
    let (app, _) = shelf();

    let (status, data) = send(app, Method::POST, "/books", None).await;

    assert_error(status, &data, 422, "unprocessable");
}

#[tokio::test]
async fn post_to_item_path_is_405() {
    let (app, store) = shelf();

    let (status, data) = send(
        app,
        Method::POST,
        "/books/45",
        Some(json!({"title": "Anansi Boys", "author": "Neil Gaiman", "rating": 5})),
    )
    .await;

    assert_error(status, &data, 405, "method not allowed");
    assert_eq!(store.count_books().await.unwrap(), 10);
}

#[tokio::test]
async fn search_with_results() {
    let (app, _) = shelf();

    let (status, data) = send(app, Method::POST, "/books", Some(json!({"search": "Novel"}))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(data["success"], true);
    assert_eq!(data["total_books"], 3);
    let titles: Vec<&str> = data["books"]
        .as_array()
        .unwrap()
        .iter()
        .map(|book| book["title"].as_str().unwrap())
        .collect();
    assert_eq!(
        titles,
        vec![
            "The Graphic Novel Handbook",
            "A Novel Approach",
            "The Novel of the Century"
        ]
    );
}

#[tokio::test]
async fn search_ignores_case() {
    let (app, _) = shelf();

    let (_, data) = send(app, Method::POST, "/books", Some(json!({"search": "nOVEL"}))).await;

    assert_eq!(data["total_books"], 3);
}

#[tokio::test]
async fn search_with_no_results() {
    let (app, store) = shelf();

    let (status, data) = send(
        app,
        Method::POST,
        "/books",
        Some(json!({"search": "applejacks"})),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(data["success"], true);
    assert_eq!(data["total_books"], 0);
    assert_eq!(data["books"].as_array().unwrap().len(), 0);
    assert_eq!(store.count_books().await.unwrap(), 10);
}

#[tokio::test]
async fn list_accepts_search_body() {
    let (app, _) = shelf();

    let (status, data) = send(app, Method::GET, "/books", Some(json!({"search": "kindred"}))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(data["total_books"], 1);
    assert_eq!(data["books"][0]["author"], "Octavia E. Butler");
}

#[tokio::test]
async fn unknown_path_is_404() {
    let (app, _) = shelf();

    let (status, data) = send(app, Method::GET, "/shelves", None).await;

    assert_error(status, &data, 404, "Not found");
}

#[tokio::test]
async fn health_reports_backend() {
    let (app, _) = shelf();

    let (status, data) = send(app, Method::GET, "/status", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(data["service"], "bookshelf-service");
    assert_eq!(data["status"], "running");
    assert_eq!(data["backend"], "memory");
}

#[tokio::test]
async fn post_to_status_is_405() {
    let (app, _) = shelf();

    let (status, data) = send(app, Method::POST, "/status", None).await;

    assert_error(status, &data, 405, "method not allowed");
}
