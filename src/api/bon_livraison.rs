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
use crate::services::bon_livraison_service::{
    self, BonLivraisonFilter, CreateBonLivraison, UpdateBonLivraison,
};

#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub status: String,
}

pub async fn list_bons(
    State(db): State<DatabaseConnection>,
    Query(filter): Query<BonLivraisonFilter>,
) -> impl IntoResponse {
    match bon_livraison_service::list(&db, filter).await {
        Ok(bons) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "bons": bons,
                "count": bons.len()
            })),
        )
            .into_response(),
        Err(e) => error_response(e),
    }
}

pub async fn get_bon(
    State(db): State<DatabaseConnection>,
    Path(id): Path<i32>,
) -> impl IntoResponse {
    match bon_livraison_service::get(&db, id).await {
        Ok(bon) => (StatusCode::OK, Json(json!({ "success": true, "bon": bon }))).into_response(),
        Err(e) => error_response(e),
    }
}

pub async fn get_bons_by_client(
    State(db): State<DatabaseConnection>,
    Path(client_id): Path<i32>,
) -> impl IntoResponse {
    let filter = BonLivraisonFilter {
        client_id: Some(client_id),
        ..Default::default()
    };

    match bon_livraison_service::list(&db, filter).await {
        Ok(bons) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "client_id": client_id,
                "bons": bons,
                "count": bons.len()
            })),
        )
            .into_response(),
        Err(e) => error_response(e),
    }
}

pub async fn create_bon(
    State(db): State<DatabaseConnection>,
    Json(payload): Json<CreateBonLivraison>,
) -> impl IntoResponse {
    match bon_livraison_service::create(&db, payload).await {
        Ok(bon) => (
            StatusCode::CREATED,
            Json(json!({
                "success": true,
                "message": "Bon de livraison créé avec succès",
                "bon": bon
            })),
        )
            .into_response(),
        Err(e) => error_response(e),
    }
}

pub async fn update_bon(
    State(db): State<DatabaseConnection>,
    Path(id): Path<i32>,
    Json(payload): Json<UpdateBonLivraison>,
) -> impl IntoResponse {
    match bon_livraison_service::update(&db, id, payload).await {
        Ok(bon) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "message": "Bon de livraison mis à jour avec succès",
                "bon": bon
            })),
        )
            .into_response(),
        Err(e) => error_response(e),
    }
}

pub async fn update_bon_status(
    State(db): State<DatabaseConnection>,
    Path(id): Path<i32>,
    Json(payload): Json<StatusRequest>,
) -> impl IntoResponse {
    match bon_livraison_service::update_status(&db, id, &payload.status).await {
        Ok(bon) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "message": format!("Statut mis à jour: {}", payload.status),
                "bon": bon
            })),
        )
            .into_response(),
        Err(e) => error_response(e),
    }
}

pub async fn delete_bon(
    State(db): State<DatabaseConnection>,
    Path(id): Path<i32>,
) -> impl IntoResponse {
    match bon_livraison_service::delete(&db, id).await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "message": "Bon de livraison supprimé avec succès"
            })),
        )
            .into_response(),
        Err(e) => error_response(e),
    }
}

pub async fn get_bon_stats(
    State(db): State<DatabaseConnection>,
    Query(range): Query<RangeQuery>,
) -> impl IntoResponse {
    match bon_livraison_service::stats(&db, range.start_date, range.end_date).await {
        Ok(stats) => (
            StatusCode::OK,
            Json(json!({ "success": true, "stats": stats })),
        )
            .into_response(),
        Err(e) => error_response(e),
    }
}
