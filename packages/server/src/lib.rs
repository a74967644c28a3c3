#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Actix-Web API server for the nitrogen map.
//!
//! Loads the analyzed field dataset written by the pipeline, indexes it
//! in memory and answers "which fields does this area touch?" queries.
//! The dataset can be reloaded without restarting the server.

pub mod dataset;
mod handlers;
pub mod interactive;

use std::path::PathBuf;

use actix_cors::Cors;
use actix_web::{App, HttpServer, middleware, web};
use nitrogen_map_ingest::IngestError;
use thiserror::Error;

pub use dataset::DatasetHandle;

/// Dataset file served when `NITROGEN_MAP_DATASET` is not set.
pub const DEFAULT_DATASET_PATH: &str = "out/fields_n_loads.geojson";

/// Largest accepted query body.
const MAX_QUERY_BYTES: usize = 8 * 1024 * 1024;

/// Errors that can occur while preparing the served dataset.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The dataset file could not be loaded.
    #[error("Failed to load dataset: {0}")]
    Dataset(#[from] IngestError),
}

/// Shared application state.
pub struct AppState {
    /// The served field index.
    pub dataset: DatasetHandle,
}

/// Where to listen and what to serve.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Interface to bind.
    pub bind_addr: String,
    /// TCP port.
    pub port: u16,
    /// `GeoJSON` dataset written by the pipeline.
    pub dataset_path: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1".to_string(),
            port: 8080,
            dataset_path: PathBuf::from(DEFAULT_DATASET_PATH),
        }
    }
}

impl ServerConfig {
    /// Reads `BIND_ADDR`, `PORT` and `NITROGEN_MAP_DATASET`, falling back
    /// to the defaults for unset or unparsable values.
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            bind_addr: std::env::var("BIND_ADDR").unwrap_or(defaults.bind_addr),
            port: std::env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),
            dataset_path: std::env::var("NITROGEN_MAP_DATASET")
                .map_or(defaults.dataset_path, PathBuf::from),
        }
    }
}

/// Registers the `/api` routes.
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::PayloadConfig::new(MAX_QUERY_BYTES)).service(
        web::scope("/api")
            .route("/health", web::get().to(handlers::health))
            .route("/check-area", web::post().to(handlers::check_area))
            .route("/reload", web::post().to(handlers::reload)),
    );
}

/// Loads the dataset and runs the HTTP server until it is stopped.
///
/// Does not touch the global logger; callers set it up.
///
/// # Errors
///
/// Returns an `std::io::Result` error if the dataset cannot be loaded,
/// the server fails to bind or it encounters a runtime error.
#[allow(clippy::future_not_send)]
pub async fn serve(config: ServerConfig) -> std::io::Result<()> {
    log::info!("Loading field dataset from {}...", config.dataset_path.display());
    let dataset = DatasetHandle::load(&config.dataset_path).map_err(std::io::Error::other)?;
    log::info!("Serving {} fields", dataset.snapshot().len());

    let state = web::Data::new(AppState { dataset });
    let ServerConfig {
        bind_addr, port, ..
    } = config;

    log::info!("Starting server on {bind_addr}:{port}");

    HttpServer::new(move || {
        let cors = Cors::permissive();

        App::new()
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .app_data(state.clone())
            .configure(configure_routes)
    })
    .bind((bind_addr, port))?
    .run()
    .await
}

/// Starts the nitrogen map API server configured from the environment.
///
/// Initializes `pretty_env_logger` from `RUST_LOG` and delegates to
/// [`serve`]. This is a regular async function; the caller provides the
/// runtime (e.g. via `#[actix_web::main]`).
///
/// # Errors
///
/// Returns an `std::io::Result` error if the server fails to start.
#[allow(clippy::future_not_send)]
pub async fn run_server() -> std::io::Result<()> {
    pretty_env_logger::init_custom_env("RUST_LOG");
    serve(ServerConfig::from_env()).await
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::Path;

    use actix_web::http::StatusCode;
    use actix_web::http::header::ContentType;
    use actix_web::test;

    use super::*;

    const DATASET: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            {
                "type": "Feature",
                "id": "f1",
                "properties": {"fertilizer": "Gülle", "restriction": null, "area_ha": 77.0},
                "geometry": {
                    "type": "Polygon",
                    "coordinates": [[[9.10, 51.20], [9.11, 51.20], [9.11, 51.21], [9.10, 51.21], [9.10, 51.20]]]
                }
            },
            {
                "type": "Feature",
                "id": "f2",
                "properties": {"fertilizer": null, "restriction": "Wasserschutzgebiet"},
                "geometry": {
                    "type": "MultiPolygon",
                    "coordinates": [
                        [[[9.20, 51.20], [9.21, 51.20], [9.21, 51.21], [9.20, 51.21], [9.20, 51.20]]],
                        [[[9.30, 51.20], [9.31, 51.20], [9.31, 51.21], [9.30, 51.21], [9.30, 51.20]]]
                    ]
                }
            }
        ]
    }"#;

    fn write_dataset(name: &str, contents: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "nitrogen_map_server_{name}_{}",
            std::process::id()
        ));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("fields_n_loads.geojson");
        fs::write(&path, contents).unwrap();
        path
    }

    fn state(path: &Path) -> web::Data<AppState> {
        web::Data::new(AppState {
            dataset: DatasetHandle::load(path).unwrap(),
        })
    }

    fn square(x: f64, y: f64, size: f64) -> serde_json::Value {
        serde_json::json!({
            "type": "Polygon",
            "coordinates": [[[x, y], [x + size, y], [x + size, y + size], [x, y + size], [x, y]]]
        })
    }

    fn check_area_request(body: impl Into<web::Bytes>) -> test::TestRequest {
        test::TestRequest::post()
            .uri("/api/check-area")
            .insert_header(ContentType::json())
            .set_payload(body)
    }

    #[actix_web::test]
    async fn health_reports_field_count() {
        let path = write_dataset("health", DATASET);
        let app =
            test::init_service(App::new().app_data(state(&path)).configure(configure_routes)).await;

        let req = test::TestRequest::get().uri("/api/health").to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;

        assert_eq!(body["healthy"], true);
        assert_eq!(body["status"], "API is running");
        assert_eq!(body["fieldCount"], 2);
    }

    #[actix_web::test]
    async fn exact_field_boundary_matches_that_field() {
        let path = write_dataset("exact", DATASET);
        let app =
            test::init_service(App::new().app_data(state(&path)).configure(configure_routes)).await;

        let req = check_area_request(square(9.10, 51.20, 0.01).to_string()).to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;

        let matches = body["matches"].as_array().unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0]["id"], "f1");
        assert_eq!(matches[0]["fertilizer"], "Gülle");
        assert!(matches[0]["restriction"].is_null());
        assert_eq!(matches[0]["geometry"]["type"], "Polygon");
    }

    #[actix_web::test]
    async fn multi_part_field_is_returned_as_multi_polygon() {
        let path = write_dataset("multi", DATASET);
        let app =
            test::init_service(App::new().app_data(state(&path)).configure(configure_routes)).await;

        let req = check_area_request(square(9.305, 51.205, 0.001).to_string()).to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;

        assert_eq!(body["matches"][0]["id"], "f2");
        assert_eq!(body["matches"][0]["restriction"], "Wasserschutzgebiet");
        assert_eq!(body["matches"][0]["geometry"]["type"], "MultiPolygon");
    }

    #[actix_web::test]
    async fn disjoint_area_reports_no_match() {
        let path = write_dataset("disjoint", DATASET);
        let app =
            test::init_service(App::new().app_data(state(&path)).configure(configure_routes)).await;

        let req = check_area_request(square(12.0, 48.0, 0.01).to_string()).to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;

        assert_eq!(body, serde_json::json!({"message": "No matching area found"}));
    }

    #[actix_web::test]
    async fn invalid_geometry_is_a_bad_request() {
        let path = write_dataset("invalid", DATASET);
        let app =
            test::init_service(App::new().app_data(state(&path)).configure(configure_routes)).await;

        for body in [
            r#"{"type": "Point", "coordinates": [9.1, 51.2]}"#,
            r#"{"type": "Polygon", "coordinates": [[[9.1, 51.2], [9.2, 51.2], [9.1, 51.2]]]}"#,
            r#"{"type": "MultiPolygon", "coordinates": []}"#,
            "not json",
        ] {
            let resp = test::call_service(&app, check_area_request(body).to_request()).await;
            assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
            let json: serde_json::Value = test::read_body_json(resp).await;
            assert!(
                json["detail"].as_str().unwrap().starts_with("Invalid GeoJSON: "),
                "unexpected body {json}"
            );
        }

        // The service keeps answering after rejecting input.
        let req = check_area_request(square(9.10, 51.20, 0.01).to_string()).to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[actix_web::test]
    async fn reload_swaps_in_new_dataset() {
        let path = write_dataset("reload", DATASET);
        let state = state(&path);
        let app =
            test::init_service(App::new().app_data(state.clone()).configure(configure_routes))
                .await;

        let before = state.dataset.snapshot();
        fs::write(
            &path,
            r#"{"type": "FeatureCollection", "features": []}"#,
        )
        .unwrap();

        let req = test::TestRequest::post().uri("/api/reload").to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["fieldCount"], 0);

        // A snapshot taken before the reload is unaffected.
        assert_eq!(before.len(), 2);
        assert!(state.dataset.snapshot().is_empty());
    }

    #[actix_web::test]
    async fn failed_reload_keeps_serving_old_dataset() {
        let path = write_dataset("failed_reload", DATASET);
        let state = state(&path);
        let app =
            test::init_service(App::new().app_data(state.clone()).configure(configure_routes))
                .await;

        fs::write(&path, "{ broken").unwrap();

        let req = test::TestRequest::post().uri("/api/reload").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(state.dataset.snapshot().len(), 2);
    }
}
