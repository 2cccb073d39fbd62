//! Fragmentos HTML de los reportes. El panel los inserta tal cual en su
//! contenedor de reporte, que es también lo que se exporta a PDF.

use std::fmt::Write as _;

use crate::{
    aggregate::Summary,
    format,
    models::{ProductivityReport, Quotation},
};

const EMPTY_TIMELINE: &str = "No hay datos para el presupuesto indicado.";
const EMPTY_PRODUCTIVITY: &str = "No hay cotizaciones en el periodo seleccionado.";

pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

/// Vista vacía; es lo que se muestra cuando la petición falla.
pub fn empty_state(message: &str) -> String {
    format!(r#"<div class="empty-state">{}</div>"#, escape(message))
}

pub fn empty_timeline() -> String {
    empty_state(EMPTY_TIMELINE)
}

pub fn empty_productivity() -> String {
    empty_state(EMPTY_PRODUCTIVITY)
}

/// Línea de tiempo de versiones, en el orden de la respuesta.
pub fn timeline(q: &Quotation) -> String {
    let mut html = String::new();
    let _ = write!(
        html,
        r#"<section class="report timeline-report"><h2>Línea de tiempo del presupuesto #{}</h2><p class="customer">Cliente: {}</p>"#,
        escape(&q.id),
        escape(&q.customer.full_name()),
    );

    if q.versions.is_empty() {
        html.push_str(&empty_timeline());
    } else {
        html.push_str(r#"<ol class="timeline">"#);
        for v in &q.versions {
            let _ = write!(
                html,
                concat!(
                    r#"<li class="timeline-item {status_class}">"#,
                    r#"<div class="timeline-head"><span class="version">Versión {version}</span>"#,
                    r#"<span class="date">{date}</span><span class="status">{status}</span></div>"#,
                    r#"<div class="timeline-body"><p>Usuario: {user}</p><p>Agente: {agent}</p>"#,
                    r#"<p class="total">Total: {total}</p><p class="comment">{comment}</p></div></li>"#,
                ),
                status_class = v.status.css_class(),
                version = v.version,
                date = format::datetime(v.creation_date.as_ref()),
                status = v.status.label(),
                user = escape(&v.user),
                agent = escape(&v.agent),
                total = format::money(v.total),
                comment = escape(&v.comment),
            );
        }
        html.push_str("</ol>");
    }

    html.push_str("</section>");
    html
}

/// Resumen y tabla de detalle del reporte de productividad.
pub fn productivity(report: &ProductivityReport, summary: &Summary) -> String {
    let filter = &report.filter;
    let cotizador = if report.user_name.is_empty() {
        filter.user_id.clone().unwrap_or_else(|| "Todos".to_string())
    } else {
        report.user_name.clone()
    };

    let mut html = String::new();
    let _ = write!(
        html,
        concat!(
            r#"<section class="report productivity-report"><h2>Productividad por cotizador</h2>"#,
            r#"<p class="filter">Cotizador: {cotizador} · Desde {from} hasta {to}</p>"#,
            r#"<div class="summary"><div class="card"><span>Cotizaciones</span><strong>{count}</strong></div>"#,
            r#"<div class="card"><span>Monto total</span><strong>{total}</strong></div>"#,
            r#"<div class="card"><span>Promedio por cotización</span><strong>{avg}</strong></div></div>"#,
        ),
        cotizador = escape(&cotizador),
        from = format::date(&filter.from),
        to = format::date(&filter.to),
        count = summary.total_count,
        total = format::money(summary.total_amount),
        avg = format::money(summary.average_per_record),
    );

    if report.records.is_empty() {
        html.push_str(&empty_productivity());
    } else {
        html.push_str(
            r#"<table class="detail"><thead><tr><th>#</th><th>Cliente</th><th>Fecha</th><th>Estado</th><th>Total</th></tr></thead><tbody>"#,
        );
        for r in &report.records {
            let _ = write!(
                html,
                r#"<tr><td>{}</td><td>{}</td><td>{}</td><td class="{}">{}</td><td class="money">{}</td></tr>"#,
                escape(&r.id),
                escape(&r.customer_name),
                format::datetime(r.creation_date.as_ref()),
                r.status.css_class(),
                r.status.label(),
                format::money(r.total_price),
            );
        }
        html.push_str("</tbody></table>");
    }

    html.push_str("</section>");
    html
}
