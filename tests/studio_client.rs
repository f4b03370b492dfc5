//! `StudioApiClient` against an in-process fake of the remote API

mod common;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use common::{red_png, MultipartForm};
use image::{GenericImageView, ImageFormat};
use serde_json::json;
use std::io::Cursor;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use warp::http::StatusCode;
use warp::{Filter, Reply};
use withoutbg_server::{
    server::routes, AppState, BackendError, RemoteBackend, ServiceConfig, StudioApiClient,
    UnavailableLocalRemover,
};

const GOOD_KEY: &str = "good-key";
const BROKE_KEY: &str = "broke-key";

fn fake_api() -> impl Filter<Extract = (warp::reply::Response,), Error = warp::Rejection> + Clone {
    let remove = warp::path!("v1.0" / "image-without-background-base64")
        .and(warp::post())
        .and(warp::header::<String>("x-api-key"))
        .and(warp::body::json())
        .map(|key: String, body: serde_json::Value| {
            if let Some(status) = refusal(&key) {
                return warp::reply::with_status(warp::reply::json(&json!({})), status)
                    .into_response();
            }

            let encoded = body["image_base64"].as_str().unwrap_or_default();
            let bytes = STANDARD.decode(encoded).unwrap();
            let mut rgba = image::load_from_memory(&bytes).unwrap().into_rgba8();
            for pixel in rgba.pixels_mut() {
                pixel[3] = 64;
            }

            let mut out = Cursor::new(Vec::new());
            image::DynamicImage::ImageRgba8(rgba)
                .write_to(&mut out, ImageFormat::Png)
                .unwrap();
            warp::reply::json(&json!({
                "img_without_background_base64": STANDARD.encode(out.into_inner())
            }))
            .into_response()
        });

    let usage = warp::path!("available-credit")
        .and(warp::get())
        .and(warp::header::<String>("x-api-key"))
        .map(|key: String| {
            if let Some(status) = refusal(&key) {
                return warp::reply::with_status("denied", status).into_response();
            }
            warp::reply::json(&json!({"credit": 17, "expires": null})).into_response()
        });

    remove.or(usage).unify()
}

fn refusal(key: &str) -> Option<StatusCode> {
    match key {
        GOOD_KEY => None,
        BROKE_KEY => Some(StatusCode::PAYMENT_REQUIRED),
        _ => Some(StatusCode::UNAUTHORIZED),
    }
}

fn spawn_fake_api() -> SocketAddr {
    let (addr, server) = warp::serve(fake_api()).bind_ephemeral(([127, 0, 0, 1], 0));
    tokio::spawn(server);
    addr
}

fn client_for(addr: SocketAddr) -> StudioApiClient {
    StudioApiClient::new(format!("http://{addr}/"), Duration::from_secs(5)).unwrap()
}

#[tokio::test]
async fn remove_round_trips_through_api() {
    let client = client_for(spawn_fake_api());
    let image = image::load_from_memory(&red_png(6, 4)).unwrap();

    let result = client.remove(image, GOOD_KEY).await.unwrap();

    assert_eq!(result.dimensions(), (6, 4));
    assert_eq!(result.get_pixel(2, 2).0, [255, 0, 0, 64]);
}

#[tokio::test]
async fn rejected_and_exhausted_keys_are_removal_errors() {
    let client = client_for(spawn_fake_api());
    let image = image::load_from_memory(&red_png(2, 2)).unwrap();

    let err = client.remove(image.clone(), "wrong").await.unwrap_err();
    assert_eq!(err, BackendError::removal("Invalid API key"));

    let err = client.remove(image, BROKE_KEY).await.unwrap_err();
    assert_eq!(err, BackendError::removal("Insufficient credits"));
}

#[tokio::test]
async fn usage_is_returned_as_sent() {
    let client = client_for(spawn_fake_api());

    let stats = client.usage(GOOD_KEY).await.unwrap();
    assert_eq!(
        serde_json::Value::Object(stats),
        json!({"credit": 17, "expires": null})
    );

    let err = client.usage("wrong").await.unwrap_err();
    assert_eq!(err, BackendError::removal("Invalid API key"));
}

#[tokio::test]
async fn unreachable_api_is_removal_error() {
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let client = client_for(SocketAddr::from(([127, 0, 0, 1], port)));

    let err = client.usage(GOOD_KEY).await.unwrap_err();
    assert!(matches!(err, BackendError::Removal(ref m) if m.starts_with("Failed to reach API")));
}

#[tokio::test]
async fn server_forwards_api_key_to_remote_api() {
    let addr = spawn_fake_api();
    let state = Arc::new(AppState::new(
        ServiceConfig::default(),
        Arc::new(UnavailableLocalRemover),
        Arc::new(client_for(addr)),
    ));

    let (content_type, body) = MultipartForm::new()
        .file("file", Some("image/png"), &red_png(5, 5))
        .text("api_key", GOOD_KEY)
        .build();
    let response = warp::test::request()
        .method("POST")
        .path("/api/remove-background")
        .header("content-type", content_type)
        .body(body)
        .reply(&routes(Arc::clone(&state)))
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    let result = image::load_from_memory(response.body()).unwrap();
    assert_eq!(result.get_pixel(0, 0)[3], 64);

    let response = warp::test::request()
        .method("GET")
        .path(&format!("/api/usage?api_key={BROKE_KEY}"))
        .reply(&routes(state))
        .await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let json: serde_json::Value = serde_json::from_slice(response.body()).unwrap();
    assert_eq!(json["detail"], "Failed to fetch usage: Insufficient credits");
}
