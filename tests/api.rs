use std::io::Cursor;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use rstest::*;
use serde_json::{Value, json};
use tower::ServiceExt;

use restyle::clip::ClipClient;
use restyle::config::{ClipOptions, QdrantOptions, SearchOptions};
use restyle::gemini::ImageGenerator;
use restyle::imgutil;
use restyle::searcher::FurnitureSearcher;
use restyle::server::{AppState, create_app};

/// 按预设顺序返回结果并记录提示词的桩生成器
#[derive(Clone, Default)]
struct StubGenerator {
    responses: Arc<Mutex<Vec<Option<Vec<u8>>>>>,
    prompts: Arc<Mutex<Vec<String>>>,
}

impl StubGenerator {
    fn new(responses: Vec<Option<Vec<u8>>>) -> Self {
        Self { responses: Arc::new(Mutex::new(responses)), prompts: Arc::new(Mutex::new(vec![])) }
    }

    fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl ImageGenerator for StubGenerator {
    async fn generate(&self, _image: &[u8], prompt: &str) -> Option<Vec<u8>> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() { None } else { responses.remove(0) }
    }
}

fn clip_options(url: Option<String>) -> ClipOptions {
    ClipOptions { clip_url: url, clip_timeout: 5, warm_interval: 20 }
}

fn qdrant_options(url: Option<String>) -> QdrantOptions {
    QdrantOptions {
        qdrant_api_key: url.as_ref().map(|_| "key".to_string()),
        qdrant_url: url,
        qdrant_collection: "furniture".to_string(),
        qdrant_timeout: 5,
    }
}

/// 搜索后端不可用的应用实例
async fn app(generator: StubGenerator) -> Router {
    let clip = ClipClient::new(&clip_options(None));
    let searcher = FurnitureSearcher::connect(clip, &qdrant_options(None)).await;
    create_app(AppState::new(Box::new(generator), searcher, SearchOptions { count: 4 }))
}

fn png_bytes() -> Vec<u8> {
    let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(32, 32, Rgb([120, 130, 140])));
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, ImageFormat::Png).unwrap();
    buf.into_inner()
}

const BOUNDARY: &str = "------------------------restyletest";

/// 手工拼一个 multipart/form-data 请求体
fn multipart_body(fields: &[(&str, Option<&str>, &[u8])]) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, filename, content) in fields {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        match filename {
            Some(filename) => body.extend_from_slice(
                format!(
                    "Content-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\n\
                     Content-Type: application/octet-stream\r\n\r\n"
                )
                .as_bytes(),
            ),
            None => body.extend_from_slice(
                format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes(),
            ),
        }
        body.extend_from_slice(content);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

fn multipart_request(uri: &str, body: Vec<u8>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", format!("multipart/form-data; boundary={BOUNDARY}"))
        .body(Body::from(body))
        .unwrap()
}

fn json_request(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn response_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_redesign_single_step() {
    let stub = StubGenerator::new(vec![Some(b"GENERATED".to_vec())]);
    let app = app(stub.clone()).await;

    let upload = png_bytes();
    let body = multipart_body(&[
        ("file", Some("room.png"), &upload),
        ("style", None, b"Modern"),
        ("room_type", None, b"Bedroom"),
        ("empty_then_generate", None, b"false"),
    ]);
    let response = app.oneshot(multipart_request("/api/redesign", body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // 只调用一次生成，提示词同时包含风格和房间类型
    let prompts = stub.prompts();
    assert_eq!(prompts.len(), 1);
    assert!(prompts[0].contains("Modern"));
    assert!(prompts[0].contains("Bedroom"));

    // 单步模式下对比图就是上传的原图
    let json = response_json(response).await;
    let expected = imgutil::to_data_uri(&upload);
    assert_eq!(json["original_image"], expected);
    assert_eq!(json["empty_image"], expected);
    assert_eq!(json["final_image"], imgutil::to_data_uri(b"GENERATED"));
}

#[tokio::test]
async fn test_redesign_empty_step_failure() {
    let stub = StubGenerator::new(vec![None]);
    let app = app(stub.clone()).await;

    let upload = png_bytes();
    let body = multipart_body(&[
        ("file", Some("room.png"), &upload),
        ("empty_then_generate", None, b"true"),
    ]);
    let response = app.oneshot(multipart_request("/api/redesign", body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    // 失败信息要能归因到清空那一步，且没有第二次调用
    let json = response_json(response).await;
    assert_eq!(json["error"], "清空房间失败");
    assert_eq!(stub.prompts().len(), 1);
}

#[rstest]
#[case::missing_file(vec![("style", None, b"Modern".as_slice())])]
#[case::empty_file(vec![("file", Some("room.png"), b"".as_slice())])]
#[case::gif_rejected(vec![("file", Some("room.gif"), b"GIF89a\x01\x00\x01\x00".as_slice())])]
#[tokio::test]
async fn test_redesign_bad_upload(#[case] fields: Vec<(&str, Option<&str>, &[u8])>) {
    let stub = StubGenerator::default();
    let app = app(stub.clone()).await;

    let response = app
        .oneshot(multipart_request("/api/redesign", multipart_body(&fields)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    // 参数校验失败时不应触发任何生成调用
    assert!(stub.prompts().is_empty());
}

#[tokio::test]
async fn test_refine_ok() {
    let stub = StubGenerator::new(vec![Some(b"REFINED".to_vec())]);
    let app = app(stub.clone()).await;

    let request = json_request(
        "/api/refine",
        json!({ "image_data": imgutil::to_data_uri(&png_bytes()), "prompt": "make the rug blue" }),
    );
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = response_json(response).await;
    assert_eq!(json["refined_image"], imgutil::to_data_uri(b"REFINED"));
    assert!(stub.prompts()[0].contains("make the rug blue"));
}

#[rstest]
#[case::blank_prompt(json!({ "image_data": "data:image/png;base64,aGk=", "prompt": "   " }))]
#[case::missing_image(json!({ "image_data": "", "prompt": "do it" }))]
#[tokio::test]
async fn test_refine_bad_request(#[case] body: Value) {
    let stub = StubGenerator::default();
    let app = app(stub.clone()).await;

    let response = app.oneshot(json_request("/api/refine", body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    // 参数校验失败时不应有任何远程调用
    assert!(stub.prompts().is_empty());
}

#[rstest]
#[case::zero_width(0.0, 10.0)]
#[case::negative_height(10.0, -5.0)]
#[tokio::test]
async fn test_search_rejects_nonpositive_crop(#[case] width: f32, #[case] height: f32) {
    let app = app(StubGenerator::default()).await;

    let request = json_request(
        "/api/search-furniture",
        json!({
            "image_data": imgutil::to_data_uri(&png_bytes()),
            "box": { "x": 0.0, "y": 0.0, "width": width, "height": height },
        }),
    );
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_search_invalid_image_data() {
    let app = app(StubGenerator::default()).await;

    let request = json_request(
        "/api/search-furniture",
        json!({
            "image_data": "data:image/png;base64,@@@@",
            "box": { "x": 0.0, "y": 0.0, "width": 10.0, "height": 10.0 },
        }),
    );
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_search_unavailable_when_not_configured() {
    // 没有配置搜索后端，应返回 503 而不是 500
    let app = app(StubGenerator::default()).await;

    let request = json_request(
        "/api/search-furniture",
        json!({
            "image_data": imgutil::to_data_uri(&png_bytes()),
            "box": { "x": 0.0, "y": 0.0, "width": 16.0, "height": 16.0 },
        }),
    );
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_search_full_path() {
    let mut server = mockito::Server::new_async().await;
    let _collection = server
        .mock("GET", "/collections/furniture")
        .with_status(200)
        .with_body(json!({ "result": { "points_count": 10 } }).to_string())
        .create_async()
        .await;
    let _embed = server
        .mock("POST", "/embed")
        .with_status(200)
        .with_body(json!({ "embedding": vec![0.1f32; 512] }).to_string())
        .create_async()
        .await;
    let hits = json!({
        "result": {
            "points": [
                { "id": 1, "score": 0.97, "payload": { "title": "Sofa", "source": "IKEA", "price": "399" } },
                { "id": 2, "score": 0.91, "payload": { "title": "Rug", "source": "Wayfair", "price": 59 } },
            ]
        }
    });
    let _query = server
        .mock("POST", "/collections/furniture/points/query")
        .with_status(200)
        .with_body(hits.to_string())
        .create_async()
        .await;

    let clip = ClipClient::new(&clip_options(Some(format!("{}/embed", server.url()))));
    let searcher = FurnitureSearcher::connect(clip, &qdrant_options(Some(server.url()))).await;
    let app = create_app(AppState::new(
        Box::new(StubGenerator::default()),
        searcher,
        SearchOptions { count: 4 },
    ));

    let request = json_request(
        "/api/search-furniture",
        json!({
            "image_data": imgutil::to_data_uri(&png_bytes()),
            "box": { "x": 4.0, "y": 4.0, "width": 16.0, "height": 16.0 },
        }),
    );
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = response_json(response).await;
    let results = json["results"].as_array().unwrap();
    assert_eq!(results.len(), 2);
    // 分数按降序排列，search_query 由标题和来源拼成
    assert!(results[0]["score"].as_f64().unwrap() >= results[1]["score"].as_f64().unwrap());
    assert_eq!(results[0]["search_query"], "Sofa IKEA");
    assert_eq!(results[1]["price"], "59");
}
