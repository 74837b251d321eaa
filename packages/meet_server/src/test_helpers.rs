//! Shared fixtures for handler and end-to-end tests.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::NaiveDate;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use crate::config::{FileConfig, MeetConfig, MeetFileConfig};
use crate::{AppState, build_router, build_state};

/// Fresh data dir, seeded database, meet dated 2025-06-01.
pub(crate) async fn test_app_state() -> (AppState, TempDir) {
    let dir = TempDir::new().unwrap();
    let config = MeetConfig::new(Some(dir.path().to_path_buf())).unwrap();
    let file_config = FileConfig {
        meet: MeetFileConfig {
            date: NaiveDate::from_ymd_opt(2025, 6, 1),
        },
        ..FileConfig::default()
    };
    let state = build_state(config, &file_config).await.unwrap();
    (state, dir)
}

/// Send one request through the full router and decode the JSON body.
pub(crate) async fn call(
    state: &AppState,
    method: &str,
    uri: &str,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = build_router(state.clone()).oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or_else(|_| {
            Value::String(String::from_utf8_lossy(&bytes).into_owned())
        })
    };
    (status, value)
}

pub(crate) fn lifter_body(name: &str, id_number: &str, gender: &str, weight: f64) -> Value {
    serde_json::json!({
        "name": name,
        "gender": gender,
        "lifter_id_number": id_number,
        "actual_weight": weight,
        "birth_date": "1995-06-01",
        "opener_squat": 150.0,
        "opener_bench": 100.0,
    })
}
