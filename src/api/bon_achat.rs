use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use sea_orm::DatabaseConnection;
use serde_json::json;

use crate::api::error_response;
use crate::services::bon_achat_service::{
    self, BonAchatFilter, CreateBonAchat, PaiementInput, ReceptionInput, UpdateBonAchat,
};

pub async fn list_bons_achat(
    State(db): State<DatabaseConnection>,
    Query(filter): Query<BonAchatFilter>,
) -> impl IntoResponse {
    match bon_achat_service::list(&db, filter).await {
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

pub async fn get_bon_achat(
    State(db): State<DatabaseConnection>,
    Path(id): Path<i32>,
) -> impl IntoResponse {
    match bon_achat_service::get(&db, id).await {
        Ok(bon) => (StatusCode::OK, Json(json!({ "success": true, "bon": bon }))).into_response(),
        Err(e) => error_response(e),
    }
}

pub async fn create_bon_achat(
    State(db): State<DatabaseConnection>,
    Json(payload): Json<CreateBonAchat>,
) -> impl IntoResponse {
    match bon_achat_service::create(&db, payload).await {
        Ok(bon) => (
            StatusCode::CREATED,
            Json(json!({
                "success": true,
                "message": "Bon d'achat créé avec succès",
                "bon": bon
            })),
        )
            .into_response(),
        Err(e) => error_response(e),
    }
}

pub async fn update_bon_achat(
    State(db): State<DatabaseConnection>,
    Path(id): Path<i32>,
    Json(payload): Json<UpdateBonAchat>,
) -> impl IntoResponse {
    match bon_achat_service::update(&db, id, payload).await {
        Ok(bon) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "message": "Bon d'achat mis à jour avec succès",
                "bon": bon
            })),
        )
            .into_response(),
        Err(e) => error_response(e),
    }
}

pub async fn enregistrer_reception(
    State(db): State<DatabaseConnection>,
    Path(id): Path<i32>,
    Json(payload): Json<ReceptionInput>,
) -> impl IntoResponse {
    match bon_achat_service::enregistrer_reception(&db, id, payload).await {
        Ok(bon) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "message": "Réception enregistrée avec succès",
                "statut": bon.bon.status.clone(),
                "bon": bon
            })),
        )
            .into_response(),
        Err(e) => error_response(e),
    }
}

pub async fn marquer_paye(
    State(db): State<DatabaseConnection>,
    Path(id): Path<i32>,
    Json(payload): Json<PaiementInput>,
) -> impl IntoResponse {
    match bon_achat_service::marquer_paye(&db, id, payload).await {
        Ok(bon) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "message": "Bon d'achat marqué comme payé avec succès",
                "bon": bon
            })),
        )
            .into_response(),
        Err(e) => error_response(e),
    }
}

pub async fn annuler_bon_achat(
    State(db): State<DatabaseConnection>,
    Path(id): Path<i32>,
) -> impl IntoResponse {
    match bon_achat_service::annuler(&db, id).await {
        Ok(bon) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "message": "Bon d'achat annulé avec succès",
                "bon": bon
            })),
        )
            .into_response(),
        Err(e) => error_response(e),
    }
}

pub async fn delete_bon_achat(
    State(db): State<DatabaseConnection>,
    Path(id): Path<i32>,
) -> impl IntoResponse {
    match bon_achat_service::delete(&db, id).await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "message": "Bon d'achat supprimé avec succès"
            })),
        )
            .into_response(),
        Err(e) => error_response(e),
    }
}

pub async fn get_bons_en_attente_reception(
    State(db): State<DatabaseConnection>,
) -> impl IntoResponse {
    match bon_achat_service::en_attente_reception(&db).await {
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

pub async fn get_bon_achat_stats(
    State(db): State<DatabaseConnection>,
    Query(filter): Query<BonAchatFilter>,
) -> impl IntoResponse {
    match bon_achat_service::stats(&db, filter).await {
        Ok(stats) => (
            StatusCode::OK,
            Json(json!({ "success": true, "stats": stats })),
        )
            .into_response(),
        Err(e) => error_response(e),
    }
}
