use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use sea_orm::DatabaseConnection;
use serde_json::json;

use crate::api::{RangeQuery, error_response};
use crate::services::bon_avoir_service::{
    self, BonAvoirFilter, CreateBonAvoir, UtiliserBonAvoir,
};

pub async fn list_bons_avoir(
    State(db): State<DatabaseConnection>,
    Query(filter): Query<BonAvoirFilter>,
) -> impl IntoResponse {
    match bon_avoir_service::list(&db, filter).await {
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

pub async fn get_bon_avoir(
    State(db): State<DatabaseConnection>,
    Path(id): Path<i32>,
) -> impl IntoResponse {
    match bon_avoir_service::get(&db, id).await {
        Ok(bon) => (StatusCode::OK, Json(json!({ "success": true, "bon": bon }))).into_response(),
        Err(e) => error_response(e),
    }
}

pub async fn create_bon_avoir(
    State(db): State<DatabaseConnection>,
    Json(payload): Json<CreateBonAvoir>,
) -> impl IntoResponse {
    match bon_avoir_service::create(&db, payload).await {
        Ok(bon) => (
            StatusCode::CREATED,
            Json(json!({
                "success": true,
                "message": "Bon d'avoir créé avec succès",
                "bon": bon
            })),
        )
            .into_response(),
        Err(e) => error_response(e),
    }
}

pub async fn valider_bon_avoir(
    State(db): State<DatabaseConnection>,
    Path(id): Path<i32>,
) -> impl IntoResponse {
    match bon_avoir_service::valider(&db, id).await {
        Ok(bon) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "message": "Bon d'avoir validé avec succès",
                "bon": bon
            })),
        )
            .into_response(),
        Err(e) => error_response(e),
    }
}

pub async fn utiliser_bon_avoir(
    State(db): State<DatabaseConnection>,
    Path(id): Path<i32>,
    Json(payload): Json<UtiliserBonAvoir>,
) -> impl IntoResponse {
    match bon_avoir_service::utiliser(&db, id, payload).await {
        Ok(bon) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "message": format!("Bon d'avoir {} appliqué", bon.num_bon_avoir),
                "montant_applique": bon.montant_total,
                "bon": bon
            })),
        )
            .into_response(),
        Err(e) => error_response(e),
    }
}

pub async fn annuler_bon_avoir(
    State(db): State<DatabaseConnection>,
    Path(id): Path<i32>,
) -> impl IntoResponse {
    match bon_avoir_service::annuler(&db, id).await {
        Ok(bon) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "message": "Bon d'avoir annulé avec succès",
                "bon": bon
            })),
        )
            .into_response(),
        Err(e) => error_response(e),
    }
}

pub async fn get_bons_avoir_disponibles(
    State(db): State<DatabaseConnection>,
    Path(client_id): Path<i32>,
) -> impl IntoResponse {
    match bon_avoir_service::disponibles(&db, client_id).await {
        Ok((bons, total)) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "bons": bons,
                "total_disponible": total
            })),
        )
            .into_response(),
        Err(e) => error_response(e),
    }
}

pub async fn get_bon_avoir_stats(
    State(db): State<DatabaseConnection>,
    Query(range): Query<RangeQuery>,
) -> impl IntoResponse {
    match bon_avoir_service::stats(&db, range.start_date, range.end_date).await {
        Ok(stats) => (
            StatusCode::OK,
            Json(json!({ "success": true, "stats": stats })),
        )
            .into_response(),
        Err(e) => error_response(e),
    }
}
