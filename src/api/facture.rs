use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use sea_orm::DatabaseConnection;
use serde::Deserialize;
use serde_json::json;

use crate::api::{RangeQuery, error_response};
use crate::services::facture_service::{
    self, CreateFacture, CreateFactureFromBonLivraison, FactureFilter, PaymentInput, UpdateFacture,
};

#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub status: String,
}

pub async fn list_factures(
    State(db): State<DatabaseConnection>,
    Query(filter): Query<FactureFilter>,
) -> impl IntoResponse {
    match facture_service::list(&db, filter).await {
        Ok(factures) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "factures": factures,
                "count": factures.len()
            })),
        )
            .into_response(),
        Err(e) => error_response(e),
    }
}

pub async fn get_facture(
    State(db): State<DatabaseConnection>,
    Path(id): Path<i32>,
) -> impl IntoResponse {
    match facture_service::get(&db, id).await {
        Ok(facture) => (
            StatusCode::OK,
            Json(json!({ "success": true, "facture": facture })),
        )
            .into_response(),
        Err(e) => error_response(e),
    }
}

pub async fn create_facture(
    State(db): State<DatabaseConnection>,
    Json(payload): Json<CreateFacture>,
) -> impl IntoResponse {
    match facture_service::create(&db, payload).await {
        Ok(facture) => (
            StatusCode::CREATED,
            Json(json!({
                "success": true,
                "message": "Facture créée avec succès",
                "facture": facture
            })),
        )
            .into_response(),
        Err(e) => error_response(e),
    }
}

pub async fn create_facture_from_bon_livraison(
    State(db): State<DatabaseConnection>,
    Json(payload): Json<CreateFactureFromBonLivraison>,
) -> impl IntoResponse {
    match facture_service::create_from_bon_livraison(&db, payload).await {
        Ok(facture) => (
            StatusCode::CREATED,
            Json(json!({
                "success": true,
                "message": "Facture créée à partir du bon de livraison avec succès",
                "facture": facture
            })),
        )
            .into_response(),
        Err(e) => error_response(e),
    }
}

pub async fn update_facture(
    State(db): State<DatabaseConnection>,
    Path(id): Path<i32>,
    Json(payload): Json<UpdateFacture>,
) -> impl IntoResponse {
    match facture_service::update(&db, id, payload).await {
        Ok(facture) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "message": "Facture mise à jour avec succès",
                "facture": facture
            })),
        )
            .into_response(),
        Err(e) => error_response(e),
    }
}

pub async fn update_facture_status(
    State(db): State<DatabaseConnection>,
    Path(id): Path<i32>,
    Json(payload): Json<StatusRequest>,
) -> impl IntoResponse {
    match facture_service::update_status(&db, id, &payload.status).await {
        Ok(facture) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "message": format!("Statut mis à jour: {}", payload.status),
                "facture": facture
            })),
        )
            .into_response(),
        Err(e) => error_response(e),
    }
}

pub async fn add_payment(
    State(db): State<DatabaseConnection>,
    Path(id): Path<i32>,
    Json(payload): Json<PaymentInput>,
) -> impl IntoResponse {
    match facture_service::add_payment(&db, id, payload).await {
        Ok(facture) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "message": "Paiement ajouté avec succès",
                "facture": facture
            })),
        )
            .into_response(),
        Err(e) => error_response(e),
    }
}

pub async fn cancel_facture(
    State(db): State<DatabaseConnection>,
    Path(id): Path<i32>,
) -> impl IntoResponse {
    match facture_service::cancel(&db, id).await {
        Ok(facture) => {
            let message = if facture.bon_livraison_id.is_some() {
                "Facture annulée avec succès (pas de restitution de stock - facture créée depuis bon de livraison)."
            } else {
                "Facture annulée avec succès. Les quantités de produits ont été restituées au stock."
            };
            (
                StatusCode::OK,
                Json(json!({
                    "success": true,
                    "message": message,
                    "facture": facture
                })),
            )
                .into_response()
        }
        Err(e) => error_response(e),
    }
}

pub async fn delete_facture(
    State(db): State<DatabaseConnection>,
    Path(id): Path<i32>,
) -> impl IntoResponse {
    match facture_service::delete(&db, id).await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "message": "Facture supprimée avec succès"
            })),
        )
            .into_response(),
        Err(e) => error_response(e),
    }
}

pub async fn get_facture_stats(
    State(db): State<DatabaseConnection>,
    Query(range): Query<RangeQuery>,
) -> impl IntoResponse {
    match facture_service::stats(&db, range.start_date, range.end_date).await {
        Ok(stats) => (
            StatusCode::OK,
            Json(json!({ "success": true, "stats": stats })),
        )
            .into_response(),
        Err(e) => error_response(e),
    }
}
