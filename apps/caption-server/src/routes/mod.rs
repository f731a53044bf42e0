mod caption;

pub use caption::{capitalize, is_accepted_file_name, CaptionResponse};

use ai::{ImageCaption, SessionInfo};
use axum::{
    extract::{DefaultBodyLimit, State},
    response::Html,
    routing::{get, post},
    Json, Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

const INDEX_HTML: &str = include_str!("../../assets/index.html");

#[derive(Clone)]
pub struct AppState {
    pub captioner: Arc<dyn ImageCaption>,
    pub session_info: SessionInfo,
}

pub fn get_routes(state: AppState, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/", get(|| async { Html(INDEX_HTML) }))
        .route("/api/caption", post(caption::caption_handler))
        .route("/api/session", get(session_info))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn session_info(State(state): State<AppState>) -> Json<SessionInfo> {
    Json(state.session_info)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ai::{Caption, CaptionResult, FinishReason};
    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
    };
    use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
    use serde_json::Value;
    use std::io::Cursor;
    use tower::ServiceExt;

    struct FixedCaption(FinishReason);

    impl ImageCaption for FixedCaption {
        fn caption(&self, _image: &RgbImage) -> CaptionResult<Caption> {
            Ok(Caption {
                text: "a dog running on the beach".to_string(),
                token_count: 6,
                finish_reason: self.0,
            })
        }
    }

    struct PanickingCaption;

    impl ImageCaption for PanickingCaption {
        fn caption(&self, _image: &RgbImage) -> CaptionResult<Caption> {
            panic!("device lost")
        }
    }

    fn app(captioner: Arc<dyn ImageCaption>, max_upload_bytes: usize) -> Router {
        get_routes(
            AppState {
                captioner,
                session_info: SessionInfo {
                    model_id: "Salesforce/blip-image-captioning-large".to_string(),
                    device: "cpu".to_string(),
                    max_new_tokens: 50,
                },
            },
            max_upload_bytes,
        )
    }

    fn png(width: u32, height: u32) -> Vec<u8> {
        let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([30, 60, 90])));
        let mut bytes = vec![];
        image.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png).unwrap();
        bytes
    }

    fn upload(field: &str, file_name: &str, bytes: &[u8]) -> Request<Body> {
        let boundary = "caption-test-boundary";
        let mut body = format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"{file_name}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
        )
        .into_bytes();
        body.extend_from_slice(bytes);
        body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());

        Request::builder()
            .method("POST")
            .uri("/api/caption")
            .header(
                "content-type",
                format!("multipart/form-data; boundary={boundary}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    async fn json_body(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test_log::test(tokio::test)]
    async fn test_index_page() {
        let response = app(Arc::new(FixedCaption(FinishReason::Stop)), 1024)
            .oneshot(Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let html = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(html.contains("AI Image Caption Generator"));
        assert!(html.contains("accept=\".jpg,.jpeg,.png\""));
    }

    #[test_log::test(tokio::test)]
    async fn test_caption_png() {
        let response = app(Arc::new(FixedCaption(FinishReason::Stop)), 1 << 20)
            .oneshot(upload("file", "dog.png", &png(512, 512)))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["caption"], "a dog running on the beach");
        assert_eq!(body["displayCaption"], "A dog running on the beach");
        assert_eq!(body["finishReason"], "stop");
        assert_eq!(body["width"], 512);
        assert_eq!(body["height"], 512);
    }

    #[test_log::test(tokio::test)]
    async fn test_truncated_caption_is_marked() {
        let response = app(Arc::new(FixedCaption(FinishReason::Length)), 1 << 20)
            .oneshot(upload("file", "pixel.PNG", &png(1, 1)))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["finishReason"], "length");
    }

    #[test_log::test(tokio::test)]
    async fn test_text_file_renamed_to_png() {
        let response = app(Arc::new(FixedCaption(FinishReason::Stop)), 1 << 20)
            .oneshot(upload("file", "notes.png", b"these are my notes"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body = json_body(response).await;
        assert!(body["error"]
            .as_str()
            .unwrap()
            .starts_with("An error occurred: "));
        assert!(body["image"].is_null());
    }

    #[test_log::test(tokio::test)]
    async fn test_rejected_extension() {
        let response = app(Arc::new(FixedCaption(FinishReason::Stop)), 1 << 20)
            .oneshot(upload("file", "dog.gif", &png(4, 4)))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(json_body(response).await["error"]
            .as_str()
            .unwrap()
            .contains(".jpg, .jpeg or .png"));
    }

    #[test_log::test(tokio::test)]
    async fn test_missing_file_field() {
        let response = app(Arc::new(FixedCaption(FinishReason::Stop)), 1 << 20)
            .oneshot(upload("attachment", "dog.png", &png(4, 4)))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test_log::test(tokio::test)]
    async fn test_upload_over_limit() {
        let response = app(Arc::new(FixedCaption(FinishReason::Stop)), 1024)
            .oneshot(upload("file", "big.png", &vec![0u8; 8 * 1024]))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[test_log::test(tokio::test)]
    async fn test_panicking_model_does_not_take_down_the_server() {
        let app = app(Arc::new(PanickingCaption), 1 << 20);

        let response = app
            .clone()
            .oneshot(upload("file", "dog.png", &png(8, 8)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(json_body(response).await["image"].is_null());

        let response = app
            .oneshot(Request::get("/api/session").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[test_log::test(tokio::test)]
    async fn test_session_info() {
        let response = app(Arc::new(FixedCaption(FinishReason::Stop)), 1024)
            .oneshot(Request::get("/api/session").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["modelId"], "Salesforce/blip-image-captioning-large");
        assert_eq!(body["device"], "cpu");
        assert_eq!(body["maxNewTokens"], 50);
    }
}
