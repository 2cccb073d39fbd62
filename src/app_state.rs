use std::sync::{Arc, Mutex};
use tokio::sync::oneshot;
use crate::{
    client::ApiClient,
    config::AppConfig,
    models::{ProductivityReport, Quotation, User},
};

#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub api: ApiClient,
    pub status: Arc<Mutex<Status>>,
    /// Último reporte generado de cada tipo; lo que exporta "Guardar PDF".
    pub timeline: Arc<Mutex<Option<Quotation>>>,
    pub productivity: Arc<Mutex<Option<ProductivityReport>>>,
    /// Cotizadores de la sesión (se piden una sola vez).
    pub users: Arc<Mutex<Option<Vec<User>>>>,
    pub shutdown_sender: Arc<Mutex<Option<oneshot::Sender<()>>>>,
}

impl AppState {
    pub fn new(config: AppConfig, api: ApiClient) -> (Self, oneshot::Receiver<()>) {
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let state = Self {
            config,
            api,
            status: Arc::new(Mutex::new(Status {
                message: "Servidor listo.".to_string(),
                ..Status::default()
            })),
            timeline: Arc::new(Mutex::new(None)),
            productivity: Arc::new(Mutex::new(None)),
            users: Arc::new(Mutex::new(None)),
            shutdown_sender: Arc::new(Mutex::new(Some(shutdown_tx))),
        };
        (state, shutdown_rx)
    }
}

/// Estado de carga compartido por los dos reportes: está ocupado mientras
/// quede alguna generación en curso.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct Status {
    pub is_busy: bool,
    pub message: String,
    #[serde(skip)]
    in_flight: usize,
}

impl Status {
    pub fn begin(&mut self, message: String) {
        self.in_flight += 1;
        self.is_busy = true;
        self.message = message;
    }

    pub fn finish(&mut self, message: String) {
        self.in_flight = self.in_flight.saturating_sub(1);
        self.is_busy = self.in_flight > 0;
        self.message = message;
    }
}

/// Bloquea un mutex del estado aunque otro hilo haya entrado en pánico con él.
pub fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}
