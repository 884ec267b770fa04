pub mod advancements;
pub mod bon_achat_service;
pub mod bon_avoir_service;
pub mod bon_livraison_service;
pub mod devis_service;
pub mod facture_service;
pub mod numbering;
pub mod report_service;
pub mod stock;

/// Arrondi monétaire à deux décimales
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Borne de fin inclusive pour un filtre par date: une date sans heure
/// couvre la journée entière.
pub fn end_of_day(date: &str) -> String {
    if date.len() == 10 {
        format!("{} 23:59:59", date)
    } else {
        date.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round2_truncates_float_noise() {
        assert_eq!(round2(0.1 + 0.2), 0.3);
        assert_eq!(round2(3.0 * 10.0 + 2.0 * 20.0), 70.0);
    }

    #[test]
    fn end_of_day_expands_bare_dates() {
        assert_eq!(end_of_day("2024-03-01"), "2024-03-01 23:59:59");
        assert_eq!(end_of_day("2024-03-01 12:00:00"), "2024-03-01 12:00:00");
    }
}
