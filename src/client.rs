//! Cliente HTTP de la API de cotizaciones (sólo lectura).
//!
//! El token de sesión se pasa explícitamente con `Session`; nunca se lee de
//! un almacenamiento global en el momento de la llamada. No hay refresco de
//! token ni reintentos: un 401 es un error más.

use anyhow::{anyhow, Context, Result};
use chrono::NaiveDate;
use reqwest::Client;
use serde_json::Value;
use tracing::{debug, info};
use url::Url;

use crate::config::AppConfig;

/// Credenciales con las que se firman las peticiones.
#[derive(Clone, Debug, Default)]
pub struct Session {
    token: Option<String>,
}

impl Session {
    pub fn new(token: Option<String>) -> Self {
        Self { token }
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }
}

#[derive(Clone, Debug)]
pub struct ApiClient {
    http: Client,
    base: Url,
    session: Session,
}

impl ApiClient {
    pub fn new(base: Url, session: Session, http: Client) -> Self {
        Self { http, base, session }
    }

    /// Construye el cliente a partir de la configuración.
    pub fn from_config(cfg: &AppConfig, session: Session) -> Result<Self> {
        let http = Client::builder()
            .timeout(cfg.http_timeout)
            .build()
            .context("No se pudo construir el cliente HTTP")?;
        Ok(Self::new(cfg.api_base_url.clone(), session, http))
    }

    /// `GET /api/TimeLineBudgetReport/{budgetId}`
    pub async fn fetch_timeline(&self, budget_id: &str) -> Result<Value> {
        let budget_id = budget_id.trim();
        if budget_id.is_empty() {
            return Err(anyhow!("El identificador de presupuesto está vacío"));
        }
        let mut url = self.endpoint("api/TimeLineBudgetReport")?;
        url.path_segments_mut()
            .map_err(|_| anyhow!("URL base inválida: {}", self.base))?
            .push(budget_id);
        self.get_json(url).await
    }

    /// `GET /api/users`
    pub async fn fetch_users(&self) -> Result<Value> {
        let url = self.endpoint("api/users")?;
        self.get_json(url).await
    }

    /// `GET /api/quotations/by-period?from&to&userId?`
    pub async fn fetch_quotations_by_period(
        &self,
        from: NaiveDate,
        to: NaiveDate,
        user_id: Option<&str>,
    ) -> Result<Value> {
        let mut url = self.endpoint("api/quotations/by-period")?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("from", &from.format("%Y-%m-%d").to_string());
            query.append_pair("to", &to.format("%Y-%m-%d").to_string());
            if let Some(id) = user_id.map(str::trim).filter(|id| !id.is_empty()) {
                query.append_pair("userId", id);
            }
        }
        self.get_json(url).await
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        // Sin barra final, `join` reemplazaría el último segmento de la base.
        let mut base = self.base.clone();
        if !base.path().ends_with('/') {
            let with_slash = format!("{}/", base.path());
            base.set_path(&with_slash);
        }
        base.join(path)
            .with_context(|| format!("No se pudo construir la URL de {path}"))
    }

    async fn get_json(&self, url: Url) -> Result<Value> {
        debug!("GET {url}");
        let mut request = self.http.get(url.clone());
        if let Some(token) = self.session.token() {
            request = request.bearer_auth(token);
        }

        let resp = request
            .send()
            .await
            .with_context(|| format!("Error de red consultando {url}"))?;
        let status = resp.status();
        let resp = resp
            .error_for_status()
            .with_context(|| format!("La API respondió {status} para {url}"))?;
        let body: Value = resp
            .json()
            .await
            .with_context(|| format!("Respuesta JSON inválida de {url}"))?;

        info!("Respuesta {status} de {}", url.path());
        Ok(body)
    }
}
