//! Adaptador entre el JSON de la API y los modelos canónicos.
//!
//! La API mezcla PascalCase y camelCase, a veces campo a campo dentro del
//! mismo objeto, y envuelve algunas colecciones en `{"$values": [...]}`. Este
//! módulo es el único sitio que conoce esa ambigüedad: cada campo lógico se
//! busca primero en PascalCase, luego en camelCase y, si no aparece, toma un
//! valor por defecto (texto vacío, lista vacía, cero o `None`).

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde_json::Value;
use tracing::debug;

use crate::models::{
    Customer, Quotation, QuotationSummaryRecord, QuotationVersion, User, VersionStatus,
};
use crate::refgraph;

const VALUES_TAG: &str = "$values";

/// Claves del importe de una cotización, en orden de preferencia.
const AMOUNT_KEYS: [&str; 4] = ["TotalPrice", "totalPrice", "Total", "total"];
const VERSION_AMOUNT_KEYS: [&str; 4] = ["Total", "total", "TotalPrice", "totalPrice"];

const ID_KEYS: [&str; 2] = ["Id", "id"];
const NAME_KEYS: [&str; 2] = ["Name", "name"];
const LASTNAME_KEYS: [&str; 3] = ["LastName", "lastName", "lastname"];
const CREATION_DATE_KEYS: [&str; 2] = ["CreationDate", "creationDate"];
const STATUS_KEYS: [&str; 2] = ["Status", "status"];

/// Rutas candidatas para el cliente de un registro. No se recorre nada más:
/// otros objetos anidados (p. ej. `WorkPlace`) también tienen `Name` y no
/// deben confundirse con el cliente.
const CUSTOMER_PATHS: [&[&str]; 3] = [&["Customer"], &["customer"], &["Customer", "Customer"]];

// --- Acceso a campos ---

/// Primer valor presente (y no nulo) entre `keys`, en orden.
pub fn pick<'v>(obj: &'v Value, keys: &[&str]) -> Option<&'v Value> {
    keys.iter()
        .filter_map(|k| obj.get(*k))
        .find(|v| !v.is_null())
}

fn pick_str(obj: &Value, keys: &[&str]) -> String {
    pick(obj, keys).map(scalar_to_string).unwrap_or_default()
}

fn scalar_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => String::new(),
    }
}

fn pick_i64(obj: &Value, keys: &[&str]) -> i64 {
    match pick(obj, keys) {
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .unwrap_or(0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0),
        _ => 0,
    }
}

/// Elementos de una colección, llegue como array o envuelta en `$values`.
pub fn list_items(value: &Value) -> &[Value] {
    match value {
        Value::Array(items) => items.as_slice(),
        Value::Object(map) => match map.get(VALUES_TAG) {
            Some(Value::Array(items)) => items.as_slice(),
            _ => &[],
        },
        _ => &[],
    }
}

fn pick_list<'v>(obj: &'v Value, keys: &[&str]) -> &'v [Value] {
    pick(obj, keys).map(list_items).unwrap_or(&[])
}

// --- Conversión de valores ---

/// Importe numérico a partir de un número o de un texto con formato
/// (`"$1,000.50"`). Del texto se descarta todo lo que no sea dígito, `-` o
/// `.`, y se toma el prefijo numérico más largo (`"1.000.000"` vale 1);
/// si no hay ninguno vale 0.
pub fn parse_amount(value: &Value) -> f64 {
    let parsed = match value {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) => {
            let cleaned: String = s
                .chars()
                .filter(|c| c.is_ascii_digit() || *c == '-' || *c == '.')
                .collect();
            leading_number(&cleaned).unwrap_or_else(|| {
                debug!("Importe no numérico '{s}'; cuenta como 0.");
                0.0
            })
        }
        _ => 0.0,
    };
    if parsed.is_finite() {
        parsed
    } else {
        0.0
    }
}

/// `cleaned` sólo contiene ASCII, así que cualquier corte es válido.
fn leading_number(cleaned: &str) -> Option<f64> {
    (1..=cleaned.len())
        .rev()
        .find_map(|end| cleaned[..end].parse::<f64>().ok())
}

fn pick_amount(obj: &Value, keys: &[&str]) -> f64 {
    pick(obj, keys).map(parse_amount).unwrap_or(0.0)
}

/// Fecha-hora tal y como la envía la API (ISO 8601, con o sin zona).
pub fn parse_datetime(value: &Value) -> Option<NaiveDateTime> {
    let raw = value.as_str()?.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.naive_local());
    }
    if let Ok(dt) = raw.parse::<NaiveDateTime>() {
        return Some(dt);
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
        return Some(dt);
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

pub fn parse_status(value: &Value) -> VersionStatus {
    match value {
        Value::Number(n) => match n.as_i64() {
            Some(0) => VersionStatus::Pending,
            Some(1) => VersionStatus::Accepted,
            Some(2) => VersionStatus::Rejected,
            _ => VersionStatus::Unknown,
        },
        Value::String(s) => match s.trim().to_lowercase().as_str() {
            "accepted" | "aceptada" | "aceptado" | "aprobada" | "aprobado" => {
                VersionStatus::Accepted
            }
            "rejected" | "rechazada" | "rechazado" => VersionStatus::Rejected,
            "pending" | "pendiente" | "en revision" | "en revisión" => VersionStatus::Pending,
            _ => VersionStatus::Unknown,
        },
        Value::Object(_) => pick(value, &NAME_KEYS)
            .map(parse_status)
            .unwrap_or(VersionStatus::Unknown),
        _ => VersionStatus::Unknown,
    }
}

fn pick_status(obj: &Value) -> VersionStatus {
    pick(obj, &STATUS_KEYS)
        .map(parse_status)
        .unwrap_or(VersionStatus::Unknown)
}

/// Nombre de una persona: texto plano o un objeto con nombre y apellido.
fn person_name(value: &Value) -> String {
    match value {
        Value::Object(_) => person(value).full_name(),
        other => scalar_to_string(other),
    }
}

fn person(obj: &Value) -> Customer {
    Customer {
        name: pick_str(obj, &NAME_KEYS),
        lastname: pick_str(obj, &LASTNAME_KEYS),
    }
}

// --- Cliente ---

/// Cliente del registro, buscado sólo en las rutas candidatas.
pub fn customer_of(record: &Value) -> Customer {
    CUSTOMER_PATHS
        .iter()
        .filter_map(|path| follow(record, path))
        .filter(|v| v.is_object())
        .map(person)
        .find(|c| !c.full_name().is_empty())
        .unwrap_or_default()
}

/// Nombre del cliente o texto vacío si ninguna ruta candidata lo tiene.
pub fn client_name(record: &Value) -> String {
    customer_of(record).full_name()
}

fn follow<'v>(value: &'v Value, path: &[&str]) -> Option<&'v Value> {
    path.iter().try_fold(value, |current, key| current.get(*key))
}

// --- Reporte de línea de tiempo ---

pub fn version(obj: &Value) -> QuotationVersion {
    QuotationVersion {
        version: pick_i64(obj, &["Version", "version"]),
        creation_date: pick(obj, &CREATION_DATE_KEYS).and_then(parse_datetime),
        status: pick_status(obj),
        user: pick(obj, &["User", "user"]).map(person_name).unwrap_or_default(),
        agent: pick(obj, &["Agent", "agent"]).map(person_name).unwrap_or_default(),
        total: pick_amount(obj, &VERSION_AMOUNT_KEYS),
        comment: pick_str(obj, &["Comment", "comment"]),
    }
}

/// Normaliza la respuesta de `TimeLineBudgetReport`. Las versiones conservan
/// el orden en que llegan.
pub fn timeline(payload: &Value) -> Quotation {
    let resolved = refgraph::resolve(std::slice::from_ref(payload));
    let root = resolved.values.first().unwrap_or(payload);

    let id = match pick_str(root, &["BudgetId", "budgetId"]) {
        s if s.is_empty() => pick_str(root, &ID_KEYS),
        s => s,
    };

    Quotation {
        id,
        customer: customer_of(root),
        versions: pick_list(root, &["Versions", "versions"])
            .iter()
            .map(version)
            .collect(),
    }
}

// --- Reporte de productividad ---

pub fn summary_record(obj: &Value) -> QuotationSummaryRecord {
    QuotationSummaryRecord {
        id: pick_str(obj, &ID_KEYS),
        customer_name: client_name(obj),
        creation_date: pick(obj, &CREATION_DATE_KEYS).and_then(parse_datetime),
        status: pick_status(obj),
        total_price: pick_amount(obj, &AMOUNT_KEYS),
    }
}

/// Normaliza la respuesta de `quotations/by-period`: resuelve primero las
/// referencias y después aplana cada registro.
pub fn productivity_records(payload: &Value) -> Vec<QuotationSummaryRecord> {
    let resolved = refgraph::resolve(list_items(payload));
    if !resolved.unresolved.is_empty() {
        debug!(
            "{} referencias sin resolver en el reporte de productividad.",
            resolved.unresolved.len()
        );
    }
    resolved.values.iter().map(summary_record).collect()
}

// --- Cotizadores ---

pub fn users(payload: &Value) -> Vec<User> {
    refgraph::resolve(list_items(payload))
        .values
        .iter()
        .map(|u| User {
            id: pick_str(u, &ID_KEYS),
            name: pick_str(u, &NAME_KEYS),
            lastname: pick_str(u, &LASTNAME_KEYS),
        })
        .collect()
}

/// Nombre visible del cotizador seleccionado (vacío si no está en la lista).
pub fn user_display_name(users: &[User], user_id: &str) -> String {
    users
        .iter()
        .find(|u| u.id == user_id)
        .map(User::full_name)
        .unwrap_or_default()
}
