use axum::{
    extract::{Json, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, info, warn};

use crate::{
    aggregate::{self, Summary},
    app_state::{lock, AppState, Status},
    export::{self, PdfExporter},
    models::{ProductivityFilter, ProductivityReport, Quotation, User},
    normalize, render,
};

// --- Payloads y Respuestas de la API ---

#[derive(Deserialize)]
pub struct TimelinePayload {
    budget_id: String,
}

#[derive(Deserialize)]
pub struct ProductivityPayload {
    #[serde(alias = "desde")]
    from: NaiveDate,
    #[serde(alias = "hasta")]
    to: NaiveDate,
    #[serde(default, alias = "cotizador")]
    user_id: Option<String>,
}

#[derive(Serialize)]
pub struct TimelineResponse {
    report: Option<Quotation>,
    html: String,
}

#[derive(Serialize)]
pub struct ProductivityResponse {
    report: Option<ProductivityReport>,
    summary: Summary,
    html: String,
}

type ApiError = (StatusCode, Json<serde_json::Value>);

fn bad_request(message: &str) -> ApiError {
    (StatusCode::BAD_REQUEST, Json(json!({ "error": message })))
}

// --- Router ---

pub fn create_router(app_state: AppState) -> Router {
    Router::new()
        .route("/api/status", get(status_handler))
        .route("/api/cotizadores", get(cotizadores_handler))
        .route("/api/reports/timeline", post(timeline_handler))
        .route("/api/reports/productivity", post(productivity_handler))
        .route("/api/reports/timeline/pdf", get(timeline_pdf_handler))
        .route("/api/reports/productivity/pdf", get(productivity_pdf_handler))
        .route("/api/shutdown", post(shutdown_handler))
        .with_state(app_state)
}

// --- Estado de carga ---

fn set_busy(state: &AppState, message: &str) {
    lock(&state.status).begin(message.to_string());
}

fn set_idle(state: &AppState, message: String) {
    lock(&state.status).finish(message);
}

#[axum::debug_handler]
async fn status_handler(State(state): State<AppState>) -> Json<Status> {
    Json(lock(&state.status).clone())
}

// --- Cotizadores ---

/// Cotizadores de la sesión: se piden a la API la primera vez y se reutilizan.
async fn session_users(state: &AppState) -> anyhow::Result<Vec<User>> {
    let cached = lock(&state.users).clone();
    if let Some(users) = cached {
        return Ok(users);
    }
    let payload = state.api.fetch_users().await?;
    let users = normalize::users(&payload);
    info!("{} cotizadores cargados.", users.len());
    *lock(&state.users) = Some(users.clone());
    Ok(users)
}

#[axum::debug_handler]
async fn cotizadores_handler(State(state): State<AppState>) -> Json<Vec<User>> {
    match session_users(&state).await {
        Ok(users) => Json(users),
        Err(e) => {
            error!("Error obteniendo cotizadores: {:#}", e);
            Json(Vec::new())
        }
    }
}

// --- Reporte de línea de tiempo ---

#[axum::debug_handler]
async fn timeline_handler(
    State(state): State<AppState>,
    Json(payload): Json<TimelinePayload>,
) -> Result<Json<TimelineResponse>, ApiError> {
    let budget_id = payload.budget_id.trim().to_string();
    if budget_id.is_empty() {
        return Err(bad_request("Debe indicar el identificador del presupuesto."));
    }

    set_busy(&state, &format!("Generando línea de tiempo de {budget_id}..."));
    let result = state
        .api
        .fetch_timeline(&budget_id)
        .await
        .map(|payload| {
            // El reporte (título y nombre del PDF) lleva siempre el presupuesto pedido.
            let mut quotation = normalize::timeline(&payload);
            quotation.id = budget_id.clone();
            quotation
        });

    let response = match result {
        Ok(quotation) => {
            set_idle(
                &state,
                format!("Línea de tiempo lista: {} versiones.", quotation.versions.len()),
            );
            let html = render::timeline(&quotation);
            *lock(&state.timeline) = Some(quotation.clone());
            TimelineResponse { report: Some(quotation), html }
        }
        Err(e) => {
            error!("Error generando la línea de tiempo de {budget_id}: {:#}", e);
            *lock(&state.timeline) = None;
            set_idle(&state, "No se pudo generar el reporte.".to_string());
            TimelineResponse { report: None, html: render::empty_timeline() }
        }
    };
    Ok(Json(response))
}

// --- Reporte de productividad ---

async fn generate_productivity(
    state: &AppState,
    filter: ProductivityFilter,
) -> anyhow::Result<ProductivityReport> {
    let payload = state
        .api
        .fetch_quotations_by_period(filter.from, filter.to, filter.user_id.as_deref())
        .await?;
    let records = normalize::productivity_records(&payload);

    // El nombre del cotizador es decorativo: si falla la lista, se muestra el id.
    let user_name = match filter.user_id.as_deref() {
        Some(id) => match session_users(state).await {
            Ok(users) => normalize::user_display_name(&users, id),
            Err(e) => {
                warn!("No se pudo resolver el nombre del cotizador {id}: {:#}", e);
                String::new()
            }
        },
        None => String::new(),
    };

    Ok(ProductivityReport { filter, user_name, records })
}

#[axum::debug_handler]
async fn productivity_handler(
    State(state): State<AppState>,
    Json(payload): Json<ProductivityPayload>,
) -> Result<Json<ProductivityResponse>, ApiError> {
    if payload.from > payload.to {
        return Err(bad_request("La fecha inicial no puede ser posterior a la final."));
    }
    let filter = ProductivityFilter {
        from: payload.from,
        to: payload.to,
        user_id: payload
            .user_id
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty()),
    };

    set_busy(&state, "Generando reporte de productividad...");
    let response = match generate_productivity(&state, filter).await {
        Ok(report) => {
            let summary = aggregate::summarize(&report.records);
            set_idle(
                &state,
                format!("Reporte de productividad listo: {} cotizaciones.", summary.total_count),
            );
            let html = render::productivity(&report, &summary);
            *lock(&state.productivity) = Some(report.clone());
            ProductivityResponse { report: Some(report), summary, html }
        }
        Err(e) => {
            error!("Error generando el reporte de productividad: {:#}", e);
            *lock(&state.productivity) = None;
            set_idle(&state, "No se pudo generar el reporte.".to_string());
            ProductivityResponse {
                report: None,
                summary: aggregate::summarize(&[]),
                html: render::empty_productivity(),
            }
        }
    };
    Ok(Json(response))
}

// --- Exportación PDF ---

fn pdf_response(filename: &str, bytes: Vec<u8>) -> Response {
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}\""),
            ),
        ],
        bytes,
    )
        .into_response()
}

/// Espera a que termine cualquier escritura pendiente del reporte y devuelve
/// una copia del último generado.
async fn settled<T: Clone>(state: &AppState, slot: &std::sync::Mutex<Option<T>>) -> Option<T> {
    tokio::time::sleep(state.config.export_settle).await;
    lock(slot).clone()
}

async fn export_pdf<T, F>(filename: String, report: T, exporter: PdfExporter, build: F) -> Response
where
    T: Send + 'static,
    F: FnOnce(&PdfExporter, &T) -> anyhow::Result<Vec<u8>> + Send + 'static,
{
    let result = tokio::task::spawn_blocking(move || build(&exporter, &report)).await;
    match result {
        Ok(Ok(bytes)) => pdf_response(&filename, bytes),
        Ok(Err(e)) => {
            error!("Error exportando {filename}: {:#}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
        Err(e) => {
            error!("La tarea de exportación de {filename} falló: {e}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[axum::debug_handler]
async fn timeline_pdf_handler(State(state): State<AppState>) -> Response {
    let Some(quotation) = settled(&state, &state.timeline).await else {
        return (
            StatusCode::CONFLICT,
            Json(json!({"error": "Primero debe generar la línea de tiempo."})),
        )
            .into_response();
    };
    let filename = export::timeline_filename(&quotation.id);
    let exporter = PdfExporter::from_config(&state.config);
    export_pdf(filename, quotation, exporter, |ex, q| ex.timeline_pdf(q)).await
}

#[axum::debug_handler]
async fn productivity_pdf_handler(State(state): State<AppState>) -> Response {
    let Some(report) = settled(&state, &state.productivity).await else {
        return (
            StatusCode::CONFLICT,
            Json(json!({"error": "Primero debe generar el reporte de productividad."})),
        )
            .into_response();
    };
    let filename = export::productivity_filename(&report.filter);
    let exporter = PdfExporter::from_config(&state.config);
    export_pdf(filename, report, exporter, |ex, r| ex.productivity_pdf(r)).await
}

// --- Handler de Apagado ---

#[axum::debug_handler]
async fn shutdown_handler(State(state): State<AppState>) -> impl IntoResponse {
    info!("Petición de apagado recibida.");
    if let Some(sender) = lock(&state.shutdown_sender).take() {
        let _ = sender.send(());
    }
    StatusCode::OK
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{tests::spawn_fake_api, ApiClient, Session};
    use crate::config::AppConfig;
    use crate::export::tests::{assert_a4_portrait, FONTS_DIR};
    use axum::extract::{Path, Query};
    use serde_json::Value;
    use std::collections::HashMap;
    use url::Url;

    fn remote_api() -> Router {
        Router::new()
            .route(
                "/api/quotations/by-period",
                get(|Query(q): Query<HashMap<String, String>>| async move {
                    if q.get("userId").map(String::as_str) == Some("falla") {
                        return Err(StatusCode::INTERNAL_SERVER_ERROR);
                    }
                    Ok(Json(json!({"$id": "1", "$values": [
                        {"$id": "2", "Id": 101, "CreationDate": "2024-02-10T09:00:00",
                         "Status": "Aceptada", "TotalPrice": 1234.56,
                         "Customer": {"$id": "3", "Name": "Ana", "LastName": "Ruiz"}},
                        {"$id": "4", "id": 102, "creationDate": "2024-07-01T12:30:00",
                         "status": "pendiente", "totalPrice": "$765.44",
                         "customer": {"$ref": "3"}},
                    ]})))
                }),
            )
            .route(
                "/api/users",
                get(|| async { Json(json!([{"Id": 7, "Name": "Carla", "LastName": "Mora"}])) }),
            )
            .route(
                "/api/TimeLineBudgetReport/:id",
                get(|Path(id): Path<String>| async move {
                    if id == "77" {
                        // Respuesta sin identificador de presupuesto.
                        return Json(json!({"Versions": [{"Version": 1}]}));
                    }
                    Json(json!({"BudgetId": 55, "Versions": [
                        {"Version": 2, "CreationDate": "2024-03-01T10:00:00"},
                        {"Version": 1, "CreationDate": "2024-04-01T10:00:00"},
                        {"Version": 3, "CreationDate": "2024-01-01T10:00:00"},
                    ]}))
                }),
            )
    }

    /// Levanta este servidor contra la API falsa y devuelve su URL.
    async fn spawn_app(remote: Url) -> Url {
        spawn_app_with_fonts(remote, "/ruta/sin/fuentes").await
    }

    async fn spawn_app_with_fonts(remote: Url, fonts_dir: &str) -> Url {
        let cfg = AppConfig::from_lookup(|key| match key {
            "API_BASE_URL" => Some(remote.to_string()),
            "EXPORT_SETTLE_MS" => Some("0".to_string()),
            "FONTS_DIR" => Some(fonts_dir.to_string()),
            _ => None,
        })
        .unwrap();
        let api = ApiClient::from_config(&cfg, Session::new(Some("token".into()))).unwrap();
        let (state, _shutdown_rx) = AppState::new(cfg, api);
        spawn_fake_api(create_router(state)).await
    }

    async fn post_json(url: Url, body: Value) -> Value {
        reqwest::Client::new()
            .post(url)
            .json(&body)
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn productivity_for_a_year_without_filter() {
        let remote = spawn_fake_api(remote_api()).await;
        let app = spawn_app(remote).await;

        let body = post_json(
            app.join("api/reports/productivity").unwrap(),
            json!({"desde": "2024-01-01", "hasta": "2024-12-31"}),
        )
        .await;

        assert_eq!(body["summary"]["totalCount"], 2);
        let total = body["summary"]["totalAmount"].as_f64().unwrap();
        let average = body["summary"]["averagePerRecord"].as_f64().unwrap();
        assert!((total - 2000.0).abs() < 1e-6);
        assert!((average - 1000.0).abs() < 1e-6);
        let html = body["html"].as_str().unwrap();
        assert_eq!(html.matches("<tr><td>").count(), 2);
        assert!(html.contains("$1,234.56"));
        assert!(html.contains("$765.44"));
        assert_eq!(body["report"]["records"][1]["customerName"], "Ana Ruiz");
    }

    #[tokio::test]
    async fn productivity_resolves_the_selected_user_name() {
        let remote = spawn_fake_api(remote_api()).await;
        let app = spawn_app(remote).await;

        let body = post_json(
            app.join("api/reports/productivity").unwrap(),
            json!({"from": "2024-01-01", "to": "2024-12-31", "user_id": "7"}),
        )
        .await;
        assert_eq!(body["report"]["user_name"], "Carla Mora");
        assert!(body["html"].as_str().unwrap().contains("Cotizador: Carla Mora"));
    }

    #[tokio::test]
    async fn failed_fetch_clears_the_report() {
        let remote = spawn_fake_api(remote_api()).await;
        let app = spawn_app(remote).await;

        let body = post_json(
            app.join("api/reports/productivity").unwrap(),
            json!({"from": "2024-01-01", "to": "2024-12-31", "user_id": "falla"}),
        )
        .await;
        assert!(body["report"].is_null());
        assert_eq!(body["summary"]["totalCount"], 0);
        assert!(body["html"].as_str().unwrap().contains("empty-state"));

        let status: Value = reqwest::get(app.join("api/status").unwrap())
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(status["is_busy"], false);

        let pdf = reqwest::get(app.join("api/reports/productivity/pdf").unwrap())
            .await
            .unwrap();
        assert_eq!(pdf.status(), reqwest::StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn inverted_range_is_rejected() {
        let remote = spawn_fake_api(remote_api()).await;
        let app = spawn_app(remote).await;

        let resp = reqwest::Client::new()
            .post(app.join("api/reports/productivity").unwrap())
            .json(&json!({"from": "2024-12-31", "to": "2024-01-01"}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn timeline_keeps_order_and_export_failure_is_silent() {
        let remote = spawn_fake_api(remote_api()).await;
        let app = spawn_app(remote).await;

        let body = post_json(
            app.join("api/reports/timeline").unwrap(),
            json!({"budget_id": "55"}),
        )
        .await;
        let versions: Vec<i64> = body["report"]["versions"]
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v["version"].as_i64().unwrap())
            .collect();
        assert_eq!(versions, vec![2, 1, 3]);

        // Sin fuentes el PDF no se puede generar: 500 sin cuerpo.
        let pdf = reqwest::get(app.join("api/reports/timeline/pdf").unwrap())
            .await
            .unwrap();
        assert_eq!(pdf.status(), reqwest::StatusCode::INTERNAL_SERVER_ERROR);
        assert!(pdf.bytes().await.unwrap().is_empty());
    }

    fn attachment_name(resp: &reqwest::Response) -> String {
        resp.headers()
            .get(reqwest::header::CONTENT_DISPOSITION)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string()
    }

    #[tokio::test]
    async fn productivity_pdf_is_served_as_attachment() {
        let remote = spawn_fake_api(remote_api()).await;
        let app = spawn_app_with_fonts(remote, FONTS_DIR).await;

        post_json(
            app.join("api/reports/productivity").unwrap(),
            json!({"desde": "2024-01-01", "hasta": "2024-12-31"}),
        )
        .await;

        let resp = reqwest::get(app.join("api/reports/productivity/pdf").unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::OK);
        assert_eq!(resp.headers()[reqwest::header::CONTENT_TYPE], "application/pdf");
        assert_eq!(
            attachment_name(&resp),
            r#"attachment; filename="productividad_todos_2024-01-01_a_2024-12-31.pdf""#
        );
        let bytes = resp.bytes().await.unwrap();
        assert!(bytes.starts_with(b"%PDF"));
        assert_a4_portrait(&bytes);
    }

    #[tokio::test]
    async fn timeline_uses_the_requested_id_when_the_payload_has_none() {
        let remote = spawn_fake_api(remote_api()).await;
        let app = spawn_app_with_fonts(remote, FONTS_DIR).await;

        let body = post_json(
            app.join("api/reports/timeline").unwrap(),
            json!({"budget_id": " 77 "}),
        )
        .await;
        assert_eq!(body["report"]["id"], "77");
        assert!(body["html"].as_str().unwrap().contains("presupuesto #77"));

        let resp = reqwest::get(app.join("api/reports/timeline/pdf").unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::OK);
        assert_eq!(
            attachment_name(&resp),
            r#"attachment; filename="linea_tiempo_77.pdf""#
        );
        assert!(resp.bytes().await.unwrap().starts_with(b"%PDF"));
    }

    #[tokio::test]
    async fn unreachable_remote_yields_empty_user_list() {
        let app = spawn_app(Url::parse("http://127.0.0.1:9").unwrap()).await;
        let users: Value = reqwest::get(app.join("api/cotizadores").unwrap())
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(users, json!([]));
    }
}
