//! Formato de importes y fechas para el panel y el PDF.

use chrono::{NaiveDate, NaiveDateTime};

/// Importe con separador de miles y dos decimales: `$1,234.56`.
pub fn money(amount: f64) -> String {
    let amount = if amount.is_finite() { amount } else { 0.0 };
    let cents = (amount.abs() * 100.0).round() as u64;
    let units = (cents / 100).to_string();
    let decimals = cents % 100;

    let mut grouped = String::with_capacity(units.len() + units.len() / 3);
    for (i, ch) in units.chars().enumerate() {
        if i > 0 && (units.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let sign = if amount < 0.0 && cents > 0 { "-" } else { "" };
    format!("{sign}${grouped}.{decimals:02}")
}

pub fn date(d: &NaiveDate) -> String {
    d.format("%d/%m/%Y").to_string()
}

pub fn datetime(dt: Option<&NaiveDateTime>) -> String {
    dt.map(|d| d.format("%d/%m/%Y %H:%M").to_string())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn money_groups_thousands() {
        assert_eq!(money(1234.56), "$1,234.56");
        assert_eq!(money(0.0), "$0.00");
        assert_eq!(money(999.999), "$1,000.00");
        assert_eq!(money(1_234_567.5), "$1,234,567.50");
        assert_eq!(money(12.0), "$12.00");
    }

    #[test]
    fn money_handles_negatives_and_nan() {
        assert_eq!(money(-1500.25), "-$1,500.25");
        assert_eq!(money(-0.001), "$0.00");
        assert_eq!(money(f64::NAN), "$0.00");
    }

    #[test]
    fn dates_use_day_month_year() {
        let d = NaiveDate::from_ymd_opt(2024, 12, 31).unwrap();
        assert_eq!(date(&d), "31/12/2024");
        let dt = d.and_hms_opt(17, 5, 0).unwrap();
        assert_eq!(datetime(Some(&dt)), "31/12/2024 17:05");
        assert_eq!(datetime(None), "");
    }
}
