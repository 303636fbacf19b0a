use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Method, Request, StatusCode, header},
};
use lectern::auth::TokenAuthority;
use lectern::db::Database;
use lectern::handler::AppState;
use lectern::model::UserId;
use serde_json::{Value, json};
use tower::ServiceExt;

const SECRET: &str = "integration-secret";

struct TestApp {
    router: Router,
    auth: TokenAuthority,
}

impl TestApp {
    async fn new() -> Self {
        let db = Database::in_memory().await.expect("in-memory database");
        let auth = TokenAuthority::new(SECRET).expect("token authority");
        let router = lectern::router(AppState::new(db, auth.clone()));
        TestApp { router, auth }
    }

    fn token(&self, user: &str) -> String {
        self.auth.issue(&UserId::new(user).expect("user id"))
    }

    async fn send(&self, method: Method, uri: &str, user: Option<&str>, body: Option<Value>) -> (StatusCode, Vec<u8>) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(user) = user {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", self.token(user)));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("request");

        let response = self.router.clone().oneshot(request).await.expect("response");
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body bytes");
        (status, bytes.to_vec())
    }

    async fn json(&self, method: Method, uri: &str, user: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        let (status, bytes) = self.send(method, uri, user, body).await;
        let value = serde_json::from_slice(&bytes).expect("json body");
        (status, value)
    }

    async fn create_book(&self, title: &str) -> Value {
        let (status, book) = self
            .json(
                Method::POST,
                "/api/books",
                Some("librarian"),
                Some(json!({
                    "title": title,
                    "author": "A",
                    "content": "...",
                    "category": "Science"
                })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        book
    }
}

fn params(errors: &Value) -> Vec<String> {
    errors["errors"]
        .as_array()
        .expect("errors array")
        .iter()
        .map(|e| e["param"].as_str().expect("param").to_string())
        .collect()
}

#[tokio::test]
async fn healthcheck_answers_ok() {
    let app = TestApp::new().await;
    let (status, body) = app.json(Method::GET, "/", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn created_book_can_be_fetched_and_is_listed_without_content() {
    let app = TestApp::new().await;

    let (status, created) = app
        .json(
            Method::POST,
            "/api/books",
            Some("librarian"),
            Some(json!({
                "title": "Intro to X",
                "author": "A",
                "content": "...",
                "category": "Science",
                "tags": ["intro", " x "],
                "tableOfContents": [{"title": "Start", "pageNumber": 1, "subSections": [{"title": "Why", "pageNumber": 2}]}]
            })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let id = created["_id"].as_i64().expect("generated id");
    assert_eq!(created["tags"], json!(["intro", "x"]));
    assert_eq!(created["highlights"], json!([]));

    let (status, fetched) = app.json(Method::GET, &format!("/api/books/{id}"), None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["title"], "Intro to X");
    assert_eq!(fetched["author"], "A");
    assert_eq!(fetched["content"], "...");
    assert_eq!(fetched["category"], "Science");
    assert_eq!(fetched["tableOfContents"][0]["subSections"][0]["pageNumber"], 2);

    let (status, list) = app.json(Method::GET, "/api/books", None, None).await;
    assert_eq!(status, StatusCode::OK);
    let list = list.as_array().expect("array");
    assert_eq!(list.len(), 1);
    assert_eq!(list[0]["title"], "Intro to X");
    assert!(list[0].get("content").is_none());
}

#[tokio::test]
async fn book_missing_required_fields_is_rejected_and_not_stored() {
    let app = TestApp::new().await;

    let (status, body) = app
        .json(
            Method::POST,
            "/api/books",
            Some("librarian"),
            Some(json!({"title": "No body", "author": ""})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(params(&body), vec!["author", "content", "category"]);
    assert_eq!(body["errors"][0]["msg"], "Author is required");

    let (_, list) = app.json(Method::GET, "/api/books", None, None).await;
    assert_eq!(list, json!([]));
}

#[tokio::test]
async fn book_creation_requires_a_valid_token() {
    let app = TestApp::new().await;
    let payload = json!({"title": "T", "author": "A", "content": "C", "category": "X"});

    let (status, body) = app.json(Method::POST, "/api/books", None, Some(payload.clone())).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["msg"], "No token, authorization denied");

    let forged = TokenAuthority::new("wrong-secret")
        .unwrap()
        .issue(&UserId::new("librarian").unwrap());
    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/books")
        .header("x-auth-token", forged)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(payload.to_string()))
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body: Value = serde_json::from_slice(&to_bytes(response.into_body(), usize::MAX).await.unwrap()).unwrap();
    assert_eq!(body["msg"], "Token is not valid");
}

#[tokio::test]
async fn unknown_and_malformed_book_ids_are_not_found() {
    let app = TestApp::new().await;

    for uri in ["/api/books/12345", "/api/books/5f1d7a9b2c", "/api/books/-1"] {
        let (status, body) = app.json(Method::GET, uri, None, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND, "{uri}");
        assert_eq!(body["msg"], "Book not found");
    }

    let (status, body) = app
        .json(Method::PUT, "/api/books/777/highlight", Some("alice"), Some(json!({"content": "x"})))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["msg"], "Book not found");
}

#[tokio::test]
async fn only_the_owner_can_remove_a_highlight() {
    let app = TestApp::new().await;
    let book = app.create_book("Optics").await;
    let id = book["_id"].as_i64().unwrap();

    let (status, highlights) = app
        .json(
            Method::PUT,
            &format!("/api/books/{id}/highlight"),
            Some("alice"),
            Some(json!({"content": "note", "color": "green", "pageNumber": 5})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let highlight = &highlights[0];
    assert_eq!(highlight["userId"], "alice");
    assert_eq!(highlight["color"], "green");
    assert_eq!(highlight["pageNumber"], 5);
    let highlight_id = highlight["_id"].as_str().unwrap().to_string();
    let uri = format!("/api/books/{id}/highlight/{highlight_id}");

    let (status, body) = app.json(Method::DELETE, &uri, Some("carol"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["msg"], "User not authorized");

    let (_, stored) = app.json(Method::GET, &format!("/api/books/{id}"), None, None).await;
    assert_eq!(stored["highlights"], highlights);

    let (status, remaining) = app.json(Method::DELETE, &uri, Some("alice"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(remaining, json!([]));

    let (status, body) = app.json(Method::DELETE, &uri, Some("alice"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["msg"], "Highlight not found");
}

#[tokio::test]
async fn highlights_are_prepended_with_defaults() {
    let app = TestApp::new().await;
    let book = app.create_book("Optics").await;
    let uri = format!("/api/books/{}/highlight", book["_id"]);

    app.json(Method::PUT, &uri, Some("alice"), Some(json!({"content": "first"}))).await;
    let (status, highlights) = app
        .json(Method::PUT, &uri, Some("bob"), Some(json!({"content": "second"})))
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(highlights[0]["content"], "second");
    assert_eq!(highlights[1]["content"], "first");
    assert_eq!(highlights[1]["color"], "yellow");

    let (status, highlights) = app
        .json(Method::PUT, &uri, Some("alice"), Some(json!({"content": "third", "pageNumber": "5"})))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(highlights[0]["pageNumber"], 5);

    let (status, highlights) = app
        .json(Method::PUT, &uri, Some("alice"), Some(json!({"content": "fourth", "pageNumber": 5.5})))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(highlights[0]["pageNumber"], 5.5);

    let (status, body) = app
        .json(Method::PUT, &uri, Some("alice"), Some(json!({"color": "purple"})))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(params(&body), vec!["body"]);
}

#[tokio::test]
async fn blank_note_content_is_rejected() {
    let app = TestApp::new().await;
    let book = app.create_book("Intro to X").await;

    let (status, body) = app
        .json(
            Method::POST,
            "/api/notes",
            Some("alice"),
            Some(json!({"content": "", "book": book["_id"].to_string(), "pageNumber": 3})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(params(&body), vec!["content"]);
    assert_eq!(body["errors"][0]["msg"], "Content is required");

    let (status, body) = app
        .json(
            Method::POST,
            "/api/notes",
            Some("alice"),
            Some(json!({"content": "orphan", "book": "424242", "pageNumber": 3})),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["msg"], "Book not found");
}

#[tokio::test]
async fn fractional_note_page_numbers_are_accepted() {
    let app = TestApp::new().await;
    let book = app.create_book("Intro to X").await;

    for (page, expected) in [(json!(2.5), 2.5), (json!("3.5"), 3.5)] {
        let (status, note) = app
            .json(
                Method::POST,
                "/api/notes",
                Some("alice"),
                Some(json!({"content": "half way", "book": book["_id"], "pageNumber": page})),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{page}");
        assert_eq!(note["pageNumber"], expected);

        let uri = format!("/api/notes/{}", note["_id"]);
        let (status, fetched) = app.json(Method::GET, &uri, Some("alice"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(fetched["pageNumber"], expected);
    }

    let (status, body) = app
        .json(
            Method::POST,
            "/api/notes",
            Some("alice"),
            Some(json!({"content": "nowhere", "book": book["_id"], "pageNumber": "page two"})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(params(&body), vec!["pageNumber"]);
}

#[tokio::test]
async fn notes_are_listed_newest_first_with_their_book() {
    let app = TestApp::new().await;
    let book = app.create_book("Intro to X").await;

    for content in ["first", "second"] {
        let (status, _) = app
            .json(
                Method::POST,
                "/api/notes",
                Some("alice"),
                Some(json!({"content": content, "book": book["_id"], "pageNumber": "4"})),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
    }
    app.json(
        Method::POST,
        "/api/notes",
        Some("bob"),
        Some(json!({"content": "bob's", "book": book["_id"], "pageNumber": 1, "type": "bookmark"})),
    )
    .await;

    let (status, notes) = app.json(Method::GET, "/api/notes", Some("alice"), None).await;
    assert_eq!(status, StatusCode::OK);
    let notes = notes.as_array().unwrap();
    assert_eq!(notes.len(), 2);
    assert_eq!(notes[0]["content"], "second");
    assert_eq!(notes[1]["content"], "first");
    assert_eq!(notes[0]["book"], json!({"_id": book["_id"], "title": "Intro to X", "author": "A"}));
    assert_eq!(notes[0]["pageNumber"], 4);
    assert_eq!(notes[0]["type"], "note");

    let (_, bookmarks) = app
        .json(Method::GET, "/api/notes?type=bookmark", Some("bob"), None)
        .await;
    assert_eq!(bookmarks.as_array().unwrap().len(), 1);

    let (status, _) = app.json(Method::GET, "/api/notes", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn only_the_owner_can_change_a_note() {
    let app = TestApp::new().await;
    let book = app.create_book("Intro to X").await;

    let (_, note) = app
        .json(
            Method::POST,
            "/api/notes",
            Some("alice"),
            Some(json!({"content": "mine", "book": book["_id"], "pageNumber": 3, "color": "blue"})),
        )
        .await;
    let uri = format!("/api/notes/{}", note["_id"]);

    let (status, body) = app
        .json(Method::PUT, &uri, Some("carol"), Some(json!({"content": "hijacked"})))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["msg"], "User not authorized");

    let (status, body) = app
        .json(Method::PUT, &uri, Some("carol"), Some(json!({"color": "purple", "tags": "x"})))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["msg"], "User not authorized");

    let (status, body) = app
        .json(Method::PUT, &uri, Some("alice"), Some(json!({"color": "purple"})))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(params(&body), vec!["body"]);

    let (status, _) = app.json(Method::DELETE, &uri, Some("carol"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app.json(Method::GET, &uri, Some("carol"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, unchanged) = app.json(Method::GET, &uri, Some("alice"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(unchanged, note);

    let (status, updated) = app
        .json(
            Method::PUT,
            &uri,
            Some("alice"),
            Some(json!({"content": "edited", "user": "carol", "book": "999", "pageNumber": 8})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["content"], "edited");
    assert_eq!(updated["pageNumber"], 8);
    assert_eq!(updated["user"], "alice");
    assert_eq!(updated["book"], book["_id"]);
    assert_eq!(updated["color"], "blue");

    let (status, body) = app.json(Method::DELETE, &uri, Some("alice"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"msg": "Note removed"}));

    let (status, body) = app.json(Method::GET, &uri, Some("alice"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["msg"], "Note not found");

    let (status, _) = app.json(Method::DELETE, "/api/notes/not-an-id", Some("alice"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
