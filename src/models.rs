//! Modelos de dominio canónicos: la única forma de los datos que conocen el
//! agregador, el renderizado y la exportación. La ambigüedad de la API
//! (PascalCase/camelCase, `$values`, `$id`/`$ref`) se resuelve antes, en
//! `normalize`.

use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;

/// Estado de una versión de cotización.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum VersionStatus {
    Accepted,
    Rejected,
    Pending,
    Unknown,
}

impl VersionStatus {
    /// Etiqueta que se muestra en el panel y en el PDF.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Accepted => "Aceptada",
            Self::Rejected => "Rechazada",
            Self::Pending => "Pendiente",
            Self::Unknown => "Desconocido",
        }
    }

    pub fn css_class(&self) -> &'static str {
        match self {
            Self::Accepted => "estado-aceptada",
            Self::Rejected => "estado-rechazada",
            Self::Pending => "estado-pendiente",
            Self::Unknown => "estado-desconocido",
        }
    }
}

/// Cliente al que pertenece una cotización.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Customer {
    pub name: String,
    pub lastname: String,
}

impl Customer {
    pub fn full_name(&self) -> String {
        join_name(&self.name, &self.lastname)
    }
}

/// Una versión dentro de la línea de tiempo de una cotización.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuotationVersion {
    pub version: i64,
    pub creation_date: Option<NaiveDateTime>,
    pub status: VersionStatus,
    pub user: String,
    pub agent: String,
    pub total: f64,
    pub comment: String,
}

/// Cotización con sus versiones, en el orden en que llegan de la API.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Quotation {
    pub id: String,
    pub customer: Customer,
    pub versions: Vec<QuotationVersion>,
}

/// Fila del reporte de productividad.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuotationSummaryRecord {
    pub id: String,
    pub customer_name: String,
    pub creation_date: Option<NaiveDateTime>,
    pub status: VersionStatus,
    pub total_price: f64,
}

/// Cotizador: sólo se usa para el selector de filtro.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct User {
    pub id: String,
    pub name: String,
    pub lastname: String,
}

impl User {
    pub fn full_name(&self) -> String {
        join_name(&self.name, &self.lastname)
    }
}

/// Parámetros con los que se generó un reporte de productividad.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductivityFilter {
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub user_id: Option<String>,
}

/// Reporte de productividad ya normalizado, tal y como se guarda hasta la
/// siguiente generación.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductivityReport {
    pub filter: ProductivityFilter,
    /// Nombre resuelto del cotizador filtrado (vacío si no hay filtro o no se encontró).
    pub user_name: String,
    pub records: Vec<QuotationSummaryRecord>,
}

pub(crate) fn join_name(name: &str, lastname: &str) -> String {
    format!("{} {}", name.trim(), lastname.trim()).trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_name_skips_missing_parts() {
        let c = Customer { name: "Ana".into(), lastname: String::new() };
        assert_eq!(c.full_name(), "Ana");
        let u = User { id: "1".into(), name: " ".into(), lastname: "Pérez".into() };
        assert_eq!(u.full_name(), "Pérez");
    }

    #[test]
    fn status_serializes_lowercase() {
        let json = serde_json::to_string(&VersionStatus::Accepted).unwrap();
        assert_eq!(json, "\"accepted\"");
        assert_eq!(VersionStatus::Pending.label(), "Pendiente");
    }
}
