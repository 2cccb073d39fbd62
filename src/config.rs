//! Carga y gestión de configuración de la aplicación (API remota + servidor + PDF).

use std::env;
use std::time::Duration;

use anyhow::{anyhow, Result};
use url::Url;

/// Configuración completa de la aplicación.
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub api_base_url: Url,
    pub api_token: Option<String>,
    pub server_addr: String,

    pub fonts_dir: String,
    pub font_family: String,

    pub http_timeout: Duration,
    pub export_settle: Duration,
    pub open_browser: bool,
}

impl AppConfig {
    /// Carga la configuración desde variables de entorno (usando .env si existe).
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Igual que `from_env`, pero leyendo de una función arbitraria; así los
    /// tests no tocan el entorno del proceso.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let raw_base = lookup("API_BASE_URL")
            .ok_or_else(|| anyhow!("Falta API_BASE_URL en el entorno"))?;
        let api_base_url = Url::parse(&raw_base)
            .map_err(|e| anyhow!("API_BASE_URL no es una URL válida ({raw_base}): {e}"))?;

        let api_token = lookup("API_TOKEN").filter(|t| !t.trim().is_empty());

        let server_addr = lookup("SERVER_ADDR").unwrap_or_else(|| "127.0.0.1:3323".to_string());

        let fonts_dir = lookup("FONTS_DIR").unwrap_or_else(|| "fonts".to_string());
        let font_family = lookup("FONT_FAMILY").unwrap_or_else(|| "DejaVuSans".to_string());

        let http_timeout = Duration::from_secs(parse_u64(&lookup, "HTTP_TIMEOUT_SECS", 30)?);
        let export_settle = Duration::from_millis(parse_u64(&lookup, "EXPORT_SETTLE_MS", 300)?);

        let open_browser = match lookup("OPEN_BROWSER") {
            None => true,
            Some(v) => parse_bool(&v)
                .ok_or_else(|| anyhow!("OPEN_BROWSER debe ser true/false, recibido: {v}"))?,
        };

        Ok(Self {
            api_base_url,
            api_token,
            server_addr,
            fonts_dir,
            font_family,
            http_timeout,
            export_settle,
            open_browser,
        })
    }
}

fn parse_u64<F>(lookup: &F, key: &str, default: u64) -> Result<u64>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(default),
        Some(v) => v
            .trim()
            .parse()
            .map_err(|_| anyhow!("{key} debe ser un entero positivo, recibido: {v}")),
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "si" | "sí" => Some(true),
        "0" | "false" | "no" => Some(false),
        _ => None,
    }
}
