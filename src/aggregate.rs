//! Agregados del reporte de productividad. Funciones puras sobre la lista ya
//! normalizada; se recalculan en cada render y no se guardan.

use serde::Serialize;

use crate::models::QuotationSummaryRecord;

/// Totales que se muestran en la cabecera del reporte de productividad.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub total_count: usize,
    pub total_amount: f64,
    pub average_per_record: f64,
}

pub fn summarize(records: &[QuotationSummaryRecord]) -> Summary {
    let total_count = records.len();
    let total_amount = total_amount(records);
    Summary {
        total_count,
        total_amount,
        average_per_record: average(total_amount, total_count),
    }
}

pub fn total_amount(records: &[QuotationSummaryRecord]) -> f64 {
    records
        .iter()
        .map(|r| if r.total_price.is_finite() { r.total_price } else { 0.0 })
        .sum()
}

/// Media por registro; 0 cuando no hay registros.
pub fn average(total: f64, count: usize) -> f64 {
    if count == 0 {
        0.0
    } else {
        total / count as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::VersionStatus;

    fn record(total_price: f64) -> QuotationSummaryRecord {
        QuotationSummaryRecord {
            id: "1".into(),
            customer_name: String::new(),
            creation_date: None,
            status: VersionStatus::Unknown,
            total_price,
        }
    }

    #[test]
    fn empty_list_has_zero_total_and_zero_average() {
        let s = summarize(&[]);
        assert_eq!(s.total_count, 0);
        assert_eq!(s.total_amount, 0.0);
        assert_eq!(s.average_per_record, 0.0);
        assert!(!s.average_per_record.is_nan());
    }

    #[test]
    fn average_divides_total_by_count() {
        let s = summarize(&[record(100.0), record(50.0), record(0.0)]);
        assert_eq!(s.total_count, 3);
        assert_eq!(s.total_amount, 150.0);
        assert_eq!(s.average_per_record, 50.0);
    }

    #[test]
    fn non_finite_amounts_count_as_zero() {
        let s = summarize(&[record(f64::NAN), record(f64::INFINITY), record(10.0)]);
        assert_eq!(s.total_amount, 10.0);
        assert_eq!(s.total_count, 3);
    }
}
