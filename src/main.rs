// Módulos de la aplicación
mod aggregate;
mod api;
mod app_state;
mod client;
mod config;
mod export;
mod format;
mod models;
mod normalize;
mod refgraph;
mod render;

use crate::app_state::AppState;
use crate::client::{ApiClient, Session};
use axum::Router;
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Cargar .env e inicializar logging
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // 2. Cargar configuración
    let cfg = config::AppConfig::from_env().map_err(|e| {
        error!("Error al cargar la configuración: {e}");
        e
    })?;

    // 3. Sesión explícita y cliente de la API de cotizaciones
    if cfg.api_token.is_none() {
        warn!("API_TOKEN no definido: las peticiones irán sin autenticación.");
    }
    let session = Session::new(cfg.api_token.clone());
    let api = ApiClient::from_config(&cfg, session)?;
    info!("API de cotizaciones en {}", cfg.api_base_url);

    // 4. Estado compartido y canal de apagado
    let (app_state, shutdown_rx) = AppState::new(cfg, api);

    // 5. Router de la API y servicio de ficheros estáticos del panel
    let app = Router::new()
        .merge(api::create_router(app_state.clone()))
        .fallback_service(ServeDir::new("frontend"))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );

    // 6. Iniciar el servidor
    let server_addr = &app_state.config.server_addr;
    let listener = tokio::net::TcpListener::bind(server_addr).await?;
    let server_url = format!("http://{}", server_addr);
    info!("🚀 Panel de reportes escuchando en {}", &server_url);

    if app_state.config.open_browser && webbrowser::open(&server_url).is_err() {
        info!("No se pudo abrir el navegador. Por favor, accede a {} manualmente.", server_url);
    }

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            shutdown_rx.await.ok();
            info!("Señal de apagado recibida, iniciando cierre del servidor.");
        })
        .await?;

    info!("✅ Servidor cerrado correctamente.");
    Ok(())
}
