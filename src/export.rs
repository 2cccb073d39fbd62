//! Exportación de los reportes a PDF (A4 vertical, paginado).

use anyhow::{anyhow, Result};
use genpdf::elements::{Break, FrameCellDecorator, LinearLayout, Paragraph, StyledElement, TableLayout};
use genpdf::style::{Color, Style};
use genpdf::{fonts, Alignment, Document, Element, Margins, PaperSize, SimplePageDecorator};
use tracing::info;

use crate::{
    aggregate, format,
    config::AppConfig,
    models::{ProductivityFilter, ProductivityReport, Quotation},
};

/// 0.2 pulgadas en todos los bordes.
const MARGIN_MM: f64 = 0.2 * 25.4;

// --- Nombres de fichero ---

pub fn timeline_filename(budget_id: &str) -> String {
    format!("linea_tiempo_{}.pdf", file_safe(budget_id))
}

pub fn productivity_filename(filter: &ProductivityFilter) -> String {
    let user = filter
        .user_id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(file_safe)
        .unwrap_or_else(|| "todos".to_string());
    format!(
        "productividad_{}_{}_a_{}.pdf",
        user,
        filter.from.format("%Y-%m-%d"),
        filter.to.format("%Y-%m-%d")
    )
}

fn file_safe(raw: &str) -> String {
    raw.trim()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}

// --- Helpers de maquetación ---

fn p(text: &str, style: Style) -> StyledElement<Paragraph> {
    Paragraph::new(text).styled(style)
}

fn p_aligned(text: &str, style: Style, align: Alignment) -> impl Element {
    Paragraph::new(text).aligned(align).styled(style)
}

/// Generador de PDFs con las fuentes configuradas.
#[derive(Clone, Debug)]
pub struct PdfExporter {
    fonts_dir: String,
    font_family: String,
}

impl PdfExporter {
    pub fn new(fonts_dir: impl Into<String>, font_family: impl Into<String>) -> Self {
        Self {
            fonts_dir: fonts_dir.into(),
            font_family: font_family.into(),
        }
    }

    pub fn from_config(cfg: &AppConfig) -> Self {
        Self::new(cfg.fonts_dir.clone(), cfg.font_family.clone())
    }

    fn document(&self, title: &str) -> Result<Document> {
        let font_family = fonts::from_files(&self.fonts_dir, &self.font_family, None).map_err(|e| {
            anyhow!(
                "Error cargando fuentes {} desde {}: {e}",
                self.font_family,
                self.fonts_dir
            )
        })?;

        let mut doc = Document::new(font_family);
        doc.set_title(title);
        doc.set_paper_size(PaperSize::A4);

        let mut decorator = SimplePageDecorator::new();
        decorator.set_margins(Margins::all(MARGIN_MM));
        decorator.set_header(|page| {
            p_aligned(
                &format!("Página {page}"),
                Style::new().with_font_size(7).with_color(Color::Greyscale(128)),
                Alignment::Right,
            )
        });
        doc.set_page_decorator(decorator);
        Ok(doc)
    }

    fn finish(doc: Document, filename: &str) -> Result<Vec<u8>> {
        let mut bytes = Vec::new();
        doc.render(&mut bytes)
            .map_err(|e| anyhow!("Error generando {filename}: {e}"))?;
        info!("PDF {filename} generado ({} bytes).", bytes.len());
        Ok(bytes)
    }

    pub fn timeline_pdf(&self, q: &Quotation) -> Result<Vec<u8>> {
        let filename = timeline_filename(&q.id);
        let mut doc = self.document(&format!("Línea de tiempo del presupuesto {}", q.id))?;

        let s_title = Style::new().with_font_size(14).bold();
        let s_normal = Style::new().with_font_size(9);
        let s_bold = Style::new().with_font_size(9).bold();
        let s_muted = Style::new().with_font_size(8).with_color(Color::Greyscale(96));

        doc.push(p(&format!("Línea de tiempo del presupuesto #{}", q.id), s_title));
        doc.push(p(&format!("Cliente: {}", q.customer.full_name()), s_normal));
        doc.push(Break::new(1));

        if q.versions.is_empty() {
            doc.push(p("No hay datos para el presupuesto indicado.", s_muted));
        }

        for v in &q.versions {
            let mut item = LinearLayout::vertical();
            item.push(p(
                &format!(
                    "Versión {} · {} · {}",
                    v.version,
                    format::datetime(v.creation_date.as_ref()),
                    v.status.label()
                ),
                s_bold,
            ));
            item.push(p(&format!("Usuario: {}   Agente: {}", v.user, v.agent), s_normal));
            item.push(p(&format!("Total: {}", format::money(v.total)), s_normal));
            if !v.comment.is_empty() {
                item.push(p(&v.comment, s_muted));
            }
            item.push(Break::new(0.3));
            doc.push(item.framed().padded(1));
            doc.push(Break::new(0.5));
        }

        Self::finish(doc, &filename)
    }

    pub fn productivity_pdf(&self, report: &ProductivityReport) -> Result<Vec<u8>> {
        let filter = &report.filter;
        let filename = productivity_filename(filter);
        let summary = aggregate::summarize(&report.records);
        let cotizador = if report.user_name.is_empty() {
            filter.user_id.clone().unwrap_or_else(|| "Todos".to_string())
        } else {
            report.user_name.clone()
        };

        let mut doc = self.document(&format!(
            "Productividad {} {} a {}",
            cotizador,
            format::date(&filter.from),
            format::date(&filter.to)
        ))?;

        let s_title = Style::new().with_font_size(14).bold();
        let s_normal = Style::new().with_font_size(9);
        let s_small = Style::new().with_font_size(8);
        let s_small_bold = Style::new().with_font_size(8).bold();

        doc.push(p("Productividad por cotizador", s_title));
        doc.push(p(
            &format!(
                "Cotizador: {} · Desde {} hasta {}",
                cotizador,
                format::date(&filter.from),
                format::date(&filter.to)
            ),
            s_normal,
        ));
        doc.push(Break::new(1));

        let mut totals = TableLayout::new(vec![1, 1, 1]);
        totals.set_cell_decorator(FrameCellDecorator::new(true, true, false));
        totals
            .row()
            .element(p("Cotizaciones", s_small_bold).padded(1))
            .element(p("Monto total", s_small_bold).padded(1))
            .element(p("Promedio por cotización", s_small_bold).padded(1))
            .push()
            .map_err(|e| anyhow!("Error en la cabecera de totales: {e}"))?;
        totals
            .row()
            .element(p(&summary.total_count.to_string(), s_normal).padded(1))
            .element(p(&format::money(summary.total_amount), s_normal).padded(1))
            .element(p(&format::money(summary.average_per_record), s_normal).padded(1))
            .push()
            .map_err(|e| anyhow!("Error en la fila de totales: {e}"))?;
        doc.push(totals);
        doc.push(Break::new(1));

        if report.records.is_empty() {
            doc.push(p("No hay cotizaciones en el periodo seleccionado.", s_small));
            return Self::finish(doc, &filename);
        }

        let mut table = TableLayout::new(vec![1, 4, 2, 2, 2]);
        table.set_cell_decorator(FrameCellDecorator::new(true, true, false));
        table
            .row()
            .element(p("#", s_small_bold).padded(1))
            .element(p("Cliente", s_small_bold).padded(1))
            .element(p("Fecha", s_small_bold).padded(1))
            .element(p("Estado", s_small_bold).padded(1))
            .element(p("Total", s_small_bold).padded(1))
            .push()
            .map_err(|e| anyhow!("Error en la cabecera del detalle: {e}"))?;

        for r in &report.records {
            table
                .row()
                .element(p(&r.id, s_small).padded(1))
                .element(p(&r.customer_name, s_small).padded(1))
                .element(p(&format::datetime(r.creation_date.as_ref()), s_small).padded(1))
                .element(p(r.status.label(), s_small).padded(1))
                .element(p_aligned(&format::money(r.total_price), s_small, Alignment::Right).padded(1))
                .push()
                .map_err(|e| anyhow!("Error en la fila {}: {e}", r.id))?;
        }
        doc.push(table);

        Self::finish(doc, &filename)
    }
}
