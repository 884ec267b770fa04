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
use crate::services::devis_service::{
    self, ConvertDevisInput, CreateDevis, DevisFilter, UpdateDevis,
};

#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub status: String,
}

pub async fn list_devis(
    State(db): State<DatabaseConnection>,
    Query(filter): Query<DevisFilter>,
) -> impl IntoResponse {
    match devis_service::list(&db, filter).await {
        Ok(devis) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "devis": devis,
                "count": devis.len()
            })),
        )
            .into_response(),
        Err(e) => error_response(e),
    }
}

pub async fn get_devis(
    State(db): State<DatabaseConnection>,
    Path(id): Path<i32>,
) -> impl IntoResponse {
    match devis_service::get(&db, id).await {
        Ok(devis) => (
            StatusCode::OK,
            Json(json!({ "success": true, "devis": devis })),
        )
            .into_response(),
        Err(e) => error_response(e),
    }
}

pub async fn create_devis(
    State(db): State<DatabaseConnection>,
    Json(payload): Json<CreateDevis>,
) -> impl IntoResponse {
    match devis_service::create(&db, payload).await {
        Ok(devis) => (
            StatusCode::CREATED,
            Json(json!({
                "success": true,
                "message": "Devis créé avec succès",
                "devis": devis
            })),
        )
            .into_response(),
        Err(e) => error_response(e),
    }
}

pub async fn update_devis(
    State(db): State<DatabaseConnection>,
    Path(id): Path<i32>,
    Json(payload): Json<UpdateDevis>,
) -> impl IntoResponse {
    match devis_service::update(&db, id, payload).await {
        Ok((devis, created)) => {
            let message = match &created {
                Some(c) if c.r#type == "facture" => "Devis mis à jour avec succès et facture créée",
                Some(_) => "Devis mis à jour avec succès et bon de livraison créé",
                None => "Devis mis à jour avec succès",
            };
            (
                StatusCode::OK,
                Json(json!({
                    "success": true,
                    "message": message,
                    "devis": devis,
                    "created_entity": created
                })),
            )
                .into_response()
        }
        Err(e) => error_response(e),
    }
}

pub async fn update_devis_status(
    State(db): State<DatabaseConnection>,
    Path(id): Path<i32>,
    Json(payload): Json<StatusRequest>,
) -> impl IntoResponse {
    match devis_service::update_status(&db, id, &payload.status).await {
        Ok(devis) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "message": format!("Statut mis à jour: {}", payload.status),
                "devis": devis
            })),
        )
            .into_response(),
        Err(e) => error_response(e),
    }
}

pub async fn delete_devis(
    State(db): State<DatabaseConnection>,
    Path(id): Path<i32>,
) -> impl IntoResponse {
    match devis_service::delete(&db, id).await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "message": "Devis supprimé avec succès"
            })),
        )
            .into_response(),
        Err(e) => error_response(e),
    }
}

pub async fn convert_devis_to_bon_livraison(
    State(db): State<DatabaseConnection>,
    Path(id): Path<i32>,
    Json(payload): Json<ConvertDevisInput>,
) -> impl IntoResponse {
    match devis_service::convert_to_bon_livraison(&db, id, payload).await {
        Ok((bon, devis)) => (
            StatusCode::CREATED,
            Json(json!({
                "success": true,
                "message": "Devis transformé en bon de livraison avec succès",
                "bon_livraison": bon,
                "devis": devis
            })),
        )
            .into_response(),
        Err(e) => error_response(e),
    }
}

pub async fn convert_devis_to_facture(
    State(db): State<DatabaseConnection>,
    Path(id): Path<i32>,
) -> impl IntoResponse {
    match devis_service::convert_to_facture(&db, id).await {
        Ok((facture, devis)) => (
            StatusCode::CREATED,
            Json(json!({
                "success": true,
                "message": "Devis transformé en facture avec succès",
                "facture": facture,
                "devis": devis
            })),
        )
            .into_response(),
        Err(e) => error_response(e),
    }
}

pub async fn get_devis_stats(
    State(db): State<DatabaseConnection>,
    Query(range): Query<RangeQuery>,
) -> impl IntoResponse {
    match devis_service::stats(&db, range.start_date, range.end_date).await {
        Ok(stats) => (
            StatusCode::OK,
            Json(json!({ "success": true, "stats": stats })),
        )
            .into_response(),
        Err(e) => error_response(e),
    }
}
