pub mod bon_achat;
pub mod bon_avoir;
pub mod bon_livraison;
pub mod client;
pub mod devis;
pub mod facture;
pub mod fornisseur;
pub mod health;
pub mod produit;
pub mod reports;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use sea_orm::DatabaseConnection;
use serde::Deserialize;
use serde_json::json;

use crate::domain::ServiceError;

/// Fenêtre de dates commune aux listes et aux statistiques.
#[derive(Debug, Default, Deserialize)]
pub struct RangeQuery {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

/// Traduit une erreur métier en réponse HTTP. Le détail des erreurs base
/// de données n'est exposé qu'en développement.
pub(crate) fn error_response(err: ServiceError) -> Response {
    let (status, message) = match &err {
        ServiceError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
        ServiceError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
        ServiceError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
        ServiceError::Database(msg) => {
            tracing::error!("erreur base de données: {}", msg);
            let expose = std::env::var("APP_ENV")
                .map(|v| v == "development")
                .unwrap_or(false);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                if expose {
                    msg.clone()
                } else {
                    "Erreur interne du serveur".to_string()
                },
            )
        }
    };

    (
        status,
        Json(json!({
            "success": false,
            "message": message
        })),
    )
        .into_response()
}

pub fn api_router(db: DatabaseConnection) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health::health_check))
        // Clients
        .route(
            "/clients",
            get(client::list_clients).post(client::create_client),
        )
        .route("/clients/search", get(client::search_clients))
        .route("/clients/stats", get(client::get_client_stats))
        .route(
            "/clients/:id",
            get(client::get_client)
                .put(client::update_client)
                .delete(client::delete_client),
        )
        .route("/clients/:id/history", get(client::get_client_history))
        // Fornisseurs
        .route(
            "/fornisseurs",
            get(fornisseur::list_fornisseurs).post(fornisseur::create_fornisseur),
        )
        .route("/fornisseurs/stats", get(fornisseur::get_fornisseur_stats))
        .route(
            "/fornisseurs/:id",
            get(fornisseur::get_fornisseur)
                .put(fornisseur::update_fornisseur)
                .delete(fornisseur::delete_fornisseur),
        )
        // Produits
        .route(
            "/produits",
            get(produit::list_produits).post(produit::create_produit),
        )
        .route("/produits/search", get(produit::search_produits))
        .route("/produits/stats", get(produit::get_produit_stats))
        .route(
            "/produits/fornisseur/:fornisseur_id",
            get(produit::get_produits_by_fornisseur),
        )
        .route(
            "/produits/:id",
            get(produit::get_produit)
                .put(produit::update_produit)
                .delete(produit::delete_produit),
        )
        .route("/produits/:id/stock", patch(produit::update_stock))
        // Devis
        .route("/devis", get(devis::list_devis).post(devis::create_devis))
        .route("/devis/stats", get(devis::get_devis_stats))
        .route(
            "/devis/:id",
            get(devis::get_devis)
                .put(devis::update_devis)
                .delete(devis::delete_devis),
        )
        .route("/devis/:id/status", patch(devis::update_devis_status))
        .route(
            "/devis/:id/convert-to-bl",
            post(devis::convert_devis_to_bon_livraison),
        )
        .route(
            "/devis/:id/convert-to-facture",
            post(devis::convert_devis_to_facture),
        )
        // Bons de livraison
        .route(
            "/bon-livraisons",
            get(bon_livraison::list_bons).post(bon_livraison::create_bon),
        )
        .route("/bon-livraisons/stats", get(bon_livraison::get_bon_stats))
        .route(
            "/bon-livraisons/client/:client_id",
            get(bon_livraison::get_bons_by_client),
        )
        .route(
            "/bon-livraisons/:id",
            get(bon_livraison::get_bon)
                .put(bon_livraison::update_bon)
                .delete(bon_livraison::delete_bon),
        )
        .route(
            "/bon-livraisons/:id/status",
            patch(bon_livraison::update_bon_status),
        )
        // Factures
        .route(
            "/factures",
            get(facture::list_factures).post(facture::create_facture),
        )
        .route("/factures/stats", get(facture::get_facture_stats))
        .route(
            "/factures/from-bonlivraison",
            post(facture::create_facture_from_bon_livraison),
        )
        .route(
            "/factures/:id",
            get(facture::get_facture)
                .put(facture::update_facture)
                .delete(facture::delete_facture),
        )
        .route("/factures/:id/status", patch(facture::update_facture_status))
        .route("/factures/:id/payment", patch(facture::add_payment))
        .route("/factures/:id/cancel", patch(facture::cancel_facture))
        // Bons d'avoir
        .route(
            "/bon-avoirs",
            get(bon_avoir::list_bons_avoir).post(bon_avoir::create_bon_avoir),
        )
        .route("/bon-avoirs/stats", get(bon_avoir::get_bon_avoir_stats))
        .route(
            "/bon-avoirs/disponibles/:client_id",
            get(bon_avoir::get_bons_avoir_disponibles),
        )
        .route("/bon-avoirs/:id", get(bon_avoir::get_bon_avoir))
        .route("/bon-avoirs/:id/valider", patch(bon_avoir::valider_bon_avoir))
        .route(
            "/bon-avoirs/:id/utiliser",
            patch(bon_avoir::utiliser_bon_avoir),
        )
        .route("/bon-avoirs/:id/annuler", patch(bon_avoir::annuler_bon_avoir))
        // Bons d'achat
        .route(
            "/bon-achats",
            get(bon_achat::list_bons_achat).post(bon_achat::create_bon_achat),
        )
        .route("/bon-achats/stats", get(bon_achat::get_bon_achat_stats))
        .route(
            "/bon-achats/en-attente-reception",
            get(bon_achat::get_bons_en_attente_reception),
        )
        .route(
            "/bon-achats/:id",
            get(bon_achat::get_bon_achat)
                .put(bon_achat::update_bon_achat)
                .delete(bon_achat::delete_bon_achat),
        )
        .route(
            "/bon-achats/:id/reception",
            patch(bon_achat::enregistrer_reception),
        )
        .route("/bon-achats/:id/payer", patch(bon_achat::marquer_paye))
        .route("/bon-achats/:id/annuler", patch(bon_achat::annuler_bon_achat))
        // Rapports
        .route("/reports/dashboard", get(reports::get_dashboard))
        .route(
            "/reports/revenue-over-time",
            get(reports::get_revenue_over_time),
        )
        .route("/reports/payment-status", get(reports::get_payment_status))
        .route("/reports/clients", get(reports::get_client_statistics))
        .route("/reports/products", get(reports::get_product_statistics))
        .route("/reports/comparison", get(reports::get_period_comparison))
        .route("/reports/tva", get(reports::get_tva_report))
        .route("/reports/bl-conversion", get(reports::get_bl_conversion))
        .with_state(db)
}
