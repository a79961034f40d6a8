use axum::body::Body;
use axum::http::{HeaderValue, Request, StatusCode};
use grid_axum::axum;
use grid_blob::{ContentHash, GridAdapter, GridConfig, MemoryChunkStore, ObjectId, ObjectMetadata};
use http_body_util::BodyExt;
use tower::ServiceExt;

fn scenario_store() -> MemoryChunkStore {
    let store = MemoryChunkStore::with_chunk_size(2);
    store.put(
        ObjectMetadata::new(ObjectId::from("abc123"), "a.png", 5)
            .with_content_hash(ContentHash::from("deadbeef")),
        vec![1u8, 2, 3, 4, 5],
    );
    store
}

fn app(store: &MemoryChunkStore) -> grid_axum::GridAxumApp {
    axum(GridAdapter::new(store.clone(), GridConfig::default()))
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().method("GET").uri(uri).body(Body::empty()).unwrap()
}

fn get_with_tag(uri: &str, tag: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .header("if-none-match", tag)
        .body(Body::empty())
        .unwrap()
}

async fn body_bytes(res: axum::response::Response) -> Vec<u8> {
    res.into_body().collect().await.unwrap().to_bytes().to_vec()
}

#[tokio::test]
async fn scenario_full_then_not_modified() {
    let store = scenario_store();
    let ax = app(&store);

    let res = ax.router.clone().oneshot(get("/a.png")).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.headers()["etag"], "abc123_deadbeef");
    assert_eq!(res.headers()["content-length"], "5");
    assert_eq!(res.headers()["content-md5"], "deadbeef");
    assert_eq!(res.headers()["content-type"], "application/octet-stream");
    assert_eq!(res.headers()["cache-control"], "public, max-age=2629000");
    assert_eq!(body_bytes(res).await, vec![1, 2, 3, 4, 5]);

    let res = ax
        .router
        .oneshot(get_with_tag("/a.png", "abc123_deadbeef"))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_MODIFIED);
    assert_eq!(res.headers()["etag"], "abc123_deadbeef");
    assert_eq!(res.headers()["cache-control"], "public, max-age=2629000");
    assert!(body_bytes(res).await.is_empty());

    let stats = store.stats();
    assert_eq!(stats.streams_opened, 1);
    assert_eq!(stats.exists_queries, 1);
    assert_eq!(stats.outstanding(), 0);
}

#[tokio::test]
async fn not_modified_reads_no_body() {
    let store = scenario_store();
    let res = app(&store)
        .router
        .oneshot(get_with_tag("/a.png", "abc123_deadbeef"))
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::NOT_MODIFIED);
    assert!(res.headers().get("content-length").map_or(true, |v| v == "0"));
    assert_eq!(store.stats().lookups, 0);
    assert_eq!(store.stats().streams_opened, 0);
}

#[tokio::test]
async fn unknown_name_is_empty_404() {
    let store = scenario_store();
    let res = app(&store).router.oneshot(get("/missing.png")).await.unwrap();

    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    assert!(res.headers().get("etag").is_none());
    assert!(res.headers().get("content-md5").is_none());
    assert!(res.headers().get("cache-control").is_none());
    assert!(body_bytes(res).await.is_empty());
    assert_eq!(store.stats().outstanding(), 0);
}

#[tokio::test]
async fn favicon_is_404_without_lookup() {
    let store = scenario_store();
    let res = app(&store).router.oneshot(get("/favicon.ico")).await.unwrap();

    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    assert_eq!(store.stats().lookups, 0);
}

#[tokio::test]
async fn name_is_the_final_path_segment() {
    let store = scenario_store();
    let res = app(&store)
        .router
        .oneshot(get("/images/2024/a.png"))
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(body_bytes(res).await, vec![1, 2, 3, 4, 5]);
}

#[tokio::test]
async fn percent_encoded_names_are_decoded() {
    let store = MemoryChunkStore::new();
    store.put(ObjectMetadata::new(ObjectId::from("f1"), "my file.txt", 2), b"hi".to_vec());

    let res = app(&store).router.oneshot(get("/my%20file.txt")).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(body_bytes(res).await, b"hi".to_vec());
}

#[tokio::test]
async fn root_path_is_404() {
    let store = scenario_store();
    let res = app(&store).router.oneshot(get("/")).await.unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    assert_eq!(store.stats().lookups, 0);
}

#[tokio::test]
async fn malformed_tags_behave_like_no_tag() {
    let store = scenario_store();
    let ax = app(&store);

    for tag in ["abc123", "abc123_dead_beef", "_deadbeef", "abc123_", "*", "abc123_zzzz"] {
        let res = ax.router.clone().oneshot(get_with_tag("/a.png", tag)).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK, "tag {tag:?}");
        assert_eq!(res.headers()["etag"], "abc123_deadbeef");
        assert_eq!(body_bytes(res).await, vec![1, 2, 3, 4, 5]);
    }
    assert_eq!(store.stats().exists_queries, 0);
}

#[tokio::test]
async fn non_ascii_tag_is_treated_as_malformed() {
    let store = scenario_store();
    let req = Request::builder()
        .uri("/a.png")
        .header("if-none-match", HeaderValue::from_bytes(b"abc\xff_dead").unwrap())
        .body(Body::empty())
        .unwrap();

    let res = app(&store).router.oneshot(req).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(store.stats().exists_queries, 0);
}

#[tokio::test]
async fn stale_tag_gets_full_response() {
    let store = scenario_store();
    let res = app(&store)
        .router
        .oneshot(get_with_tag("/a.png", "abc123_cafebabe"))
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.headers()["etag"], "abc123_deadbeef");
    assert_eq!(store.stats().exists_queries, 1);
    assert_eq!(body_bytes(res).await, vec![1, 2, 3, 4, 5]);
}

#[tokio::test]
async fn other_methods_never_touch_the_store() {
    let store = scenario_store();
    let ax = app(&store);

    for method in ["POST", "PUT", "DELETE", "PATCH", "HEAD", "OPTIONS"] {
        let req = Request::builder()
            .method(method)
            .uri("/a.png")
            .header("if-none-match", "abc123_deadbeef")
            .body(Body::empty())
            .unwrap();
        let res = ax.router.clone().oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::METHOD_NOT_ALLOWED, "{method}");
        assert!(body_bytes(res).await.is_empty());
    }

    let stats = store.stats();
    assert_eq!(stats.checkouts, 0);
    assert_eq!(stats.lookups, 0);
    assert_eq!(stats.exists_queries, 0);
}

#[tokio::test]
async fn declared_content_type_is_sent() {
    let store = MemoryChunkStore::new();
    store.put(
        ObjectMetadata::new(ObjectId::from("f1"), "p.png", 3)
            .with_content_hash(ContentHash::from("abcdef"))
            .with_content_type("image/png"),
        vec![7u8; 3],
    );

    let res = app(&store).router.oneshot(get("/p.png")).await.unwrap();
    assert_eq!(res.headers()["content-type"], "image/png");
}

#[tokio::test]
async fn content_length_matches_body_for_large_objects() {
    let data: Vec<u8> = (0..3_000_000u32).map(|i| (i % 253) as u8).collect();
    let store = MemoryChunkStore::with_chunk_size(255 * 1024);
    store.put(
        ObjectMetadata::new(ObjectId::from("big"), "big.bin", data.len() as u64)
            .with_content_hash(ContentHash::from("00ff")),
        data.clone(),
    );

    let res = app(&store).router.oneshot(get("/big.bin")).await.unwrap();
    let declared: usize = res.headers()["content-length"].to_str().unwrap().parse().unwrap();
    let body = body_bytes(res).await;
    assert_eq!(declared, body.len());
    assert_eq!(body, data);
    assert_eq!(store.stats().outstanding(), 0);
}

#[tokio::test]
async fn body_frames_are_bounded_by_the_buffer() {
    let store = MemoryChunkStore::with_chunk_size(10_000);
    store.put(ObjectMetadata::new(ObjectId::from("f1"), "f.bin", 100_000), vec![1u8; 100_000]);
    let ax = axum(GridAdapter::new(
        store.clone(),
        GridConfig::new().with_buffer_size(4096),
    ));

    let res = ax.router.oneshot(get("/f.bin")).await.unwrap();
    let mut body = res.into_body();
    let mut total = 0;
    while let Some(frame) = body.frame().await {
        let data = frame.unwrap().into_data().unwrap();
        assert!(data.len() <= 4096);
        total += data.len();
    }
    assert_eq!(total, 100_000);
}

#[tokio::test]
async fn mid_stream_failure_never_completes_the_body() {
    let store = MemoryChunkStore::with_chunk_size(4);
    store.put(ObjectMetadata::new(ObjectId::from("f1"), "f.bin", 16), vec![9u8; 16]);
    store.fail_reads_after(Some(2));

    let res = app(&store).router.oneshot(get("/f.bin")).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.headers()["content-length"], "16");
    assert!(res.into_body().collect().await.is_err());
    assert_eq!(store.stats().outstanding(), 0);
}

#[tokio::test]
async fn truncated_store_data_never_completes_the_body() {
    let store = MemoryChunkStore::new();
    store.put(ObjectMetadata::new(ObjectId::from("f1"), "f.bin", 10), vec![9u8; 4]);

    let res = app(&store).router.oneshot(get("/f.bin")).await.unwrap();
    assert!(res.into_body().collect().await.is_err());
}

#[tokio::test]
async fn checkout_failure_is_500_without_body() {
    let store = scenario_store();
    store.fail_checkouts(true);

    let res = app(&store).router.oneshot(get("/a.png")).await.unwrap();
    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body_bytes(res).await.is_empty());
}

#[tokio::test]
async fn lookup_failure_is_500_and_releases_session() {
    let store = scenario_store();
    store.fail_lookups(true);

    let res = app(&store).router.oneshot(get("/a.png")).await.unwrap();
    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(store.stats().outstanding(), 0);
}

#[tokio::test]
async fn failed_tag_check_falls_back_to_full_response() {
    let store = scenario_store();
    store.fail_exists_checks(true);

    let res = app(&store)
        .router
        .oneshot(get_with_tag("/a.png", "abc123_deadbeef"))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(body_bytes(res).await, vec![1, 2, 3, 4, 5]);
}

#[tokio::test]
async fn request_id_is_attached() {
    let store = scenario_store();
    let res = app(&store).router.oneshot(get("/a.png")).await.unwrap();
    assert!(res.headers().get("x-request-id").is_some());

    let provided = HeaderValue::from_static("req-test-123");
    let req = Request::builder()
        .uri("/missing")
        .header("x-request-id", provided.clone())
        .body(Body::empty())
        .unwrap();
    let res = app(&store).router.oneshot(req).await.unwrap();
    assert_eq!(res.headers().get("x-request-id").unwrap(), &provided);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_requests_get_independent_streams() {
    let data: Vec<u8> = (0..200_000u32).map(|i| (i % 199) as u8).collect();
    let store = MemoryChunkStore::with_chunk_size(1000);
    store.put(
        ObjectMetadata::new(ObjectId::from("shared"), "shared.bin", data.len() as u64)
            .with_content_hash(ContentHash::from("beef")),
        data.clone(),
    );
    let ax = axum(GridAdapter::new(store.clone(), GridConfig::new().with_buffer_size(1500)));

    let tasks: Vec<_> = (0..12)
        .map(|_| {
            let router = ax.router.clone();
            tokio::spawn(async move {
                let res = router.oneshot(get("/shared.bin")).await.unwrap();
                assert_eq!(res.status(), StatusCode::OK);
                body_bytes(res).await
            })
        })
        .collect();

    for task in tasks {
        assert_eq!(task.await.unwrap(), data);
    }
    assert_eq!(store.stats().streams_opened, 12);
    assert_eq!(store.stats().outstanding(), 0);
}

#[tokio::test]
async fn string_identity_tag_revalidates() {
    let store = MemoryChunkStore::new();
    store.put(
        ObjectMetadata::new(ObjectId::from("plain-id"), "p.bin", 4)
            .with_content_hash(ContentHash::from("abcd")),
        vec![1u8, 2, 3, 4],
    );
    let ax = app(&store);

    let res = ax.router.clone().oneshot(get("/p.bin")).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let etag = res.headers()["etag"].clone();
    assert_eq!(etag, "plain-id_abcd");

    let res = ax
        .router
        .oneshot(get_with_tag("/p.bin", etag.to_str().unwrap()))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_MODIFIED);
    assert_eq!(res.headers()["etag"], etag);
    assert!(body_bytes(res).await.is_empty());
    assert_eq!(store.stats().streams_opened, 1);
}

#[tokio::test]
async fn identity_that_cannot_round_trip_gets_no_etag() {
    let store = MemoryChunkStore::new();
    store.put(
        ObjectMetadata::new(ObjectId::from("has_underscore"), "u.bin", 2)
            .with_content_hash(ContentHash::from("abcd")),
        vec![1u8, 2],
    );

    let res = app(&store).router.oneshot(get("/u.bin")).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert!(res.headers().get("etag").is_none());
    assert_eq!(res.headers()["content-md5"], "abcd");
    assert_eq!(body_bytes(res).await, vec![1, 2]);
}

#[tokio::test]
async fn deleted_object_is_404_and_its_tag_goes_stale() {
    let store = scenario_store();
    let ax = app(&store);

    let res = ax.router.clone().oneshot(get("/a.png")).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let removed = store.remove("a.png").unwrap();
    assert_eq!(removed.id.as_str(), "abc123");

    let res = ax
        .router
        .clone()
        .oneshot(get_with_tag("/a.png", "abc123_deadbeef"))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    assert!(body_bytes(res).await.is_empty());
    assert!(store.remove("a.png").is_none());
    assert_eq!(store.stats().outstanding(), 0);
}

#[tokio::test]
async fn header_timeout_leaves_prompt_requests_alone() {
    let store = scenario_store();
    let ax = app(&store).with_header_timeout(std::time::Duration::from_secs(5));

    let res = ax.router.oneshot(get("/a.png")).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(body_bytes(res).await, vec![1, 2, 3, 4, 5]);
}
