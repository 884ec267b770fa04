use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use sea_orm::*;
use serde::Deserialize;
use serde_json::json;

use crate::api::error_response;
use crate::domain::ServiceError;
use crate::models::fornisseur::{self, Entity as Fornisseur};
use crate::models::produit::{self, Entity as Produit};

#[derive(Debug, Deserialize)]
pub struct FornisseurRequest {
    pub nom_complete: Option<String>,
    pub ville: Option<String>,
    pub address: Option<String>,
    pub telephone: Option<String>,
    pub reference: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct FornisseursQuery {
    pub search: Option<String>,
}

async fn unique_conflict(
    db: &DatabaseConnection,
    telephone: Option<&str>,
    reference: Option<&str>,
    exclude_id: Option<i32>,
) -> Result<Option<&'static str>, ServiceError> {
    if let Some(telephone) = telephone {
        let existing = Fornisseur::find()
            .filter(fornisseur::Column::Telephone.eq(telephone))
            .one(db)
            .await?;
        if existing.map(|f| Some(f.id) != exclude_id).unwrap_or(false) {
            return Ok(Some("Telephone number already in use"));
        }
    }

    if let Some(reference) = reference {
        let existing = Fornisseur::find()
            .filter(fornisseur::Column::Reference.eq(reference))
            .one(db)
            .await?;
        if existing.map(|f| Some(f.id) != exclude_id).unwrap_or(false) {
            return Ok(Some("Reference already in use"));
        }
    }

    Ok(None)
}

pub async fn create_fornisseur(
    State(db): State<DatabaseConnection>,
    Json(payload): Json<FornisseurRequest>,
) -> impl IntoResponse {
    let (nom_complete, telephone) = match (&payload.nom_complete, &payload.telephone) {
        (Some(nom), Some(tel)) if !nom.trim().is_empty() && !tel.trim().is_empty() => {
            (nom.clone(), tel.clone())
        }
        _ => {
            return error_response(ServiceError::Validation(
                "Nom complet and telephone are required".to_string(),
            ));
        }
    };

    match unique_conflict(&db, Some(&telephone), payload.reference.as_deref(), None).await {
        Ok(Some(msg)) => return error_response(ServiceError::Conflict(msg.to_string())),
        Ok(None) => {}
        Err(e) => return error_response(e),
    }

    let now = chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
    let new_fornisseur = fornisseur::ActiveModel {
        nom_complete: Set(nom_complete),
        ville: Set(payload.ville),
        address: Set(payload.address),
        telephone: Set(telephone),
        reference: Set(payload.reference),
        created_at: Set(now.clone()),
        updated_at: Set(now),
        ..Default::default()
    };

    match new_fornisseur.insert(&db).await {
        Ok(model) => (
            StatusCode::CREATED,
            Json(json!({
                "success": true,
                "message": "Fornisseur created successfully",
                "fornisseur": model
            })),
        )
            .into_response(),
        Err(e) => error_response(e.into()),
    }
}

pub async fn list_fornisseurs(
    State(db): State<DatabaseConnection>,
    Query(params): Query<FornisseursQuery>,
) -> impl IntoResponse {
    let mut query = Fornisseur::find();

    if let Some(search) = &params.search {
        query = query.filter(
            Condition::any()
                .add(fornisseur::Column::NomComplete.contains(search))
                .add(fornisseur::Column::Telephone.contains(search))
                .add(fornisseur::Column::Reference.contains(search)),
        );
    }

    match query
        .order_by_desc(fornisseur::Column::CreatedAt)
        .all(&db)
        .await
    {
        Ok(fornisseurs) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "fornisseurs": fornisseurs,
                "count": fornisseurs.len()
            })),
        )
            .into_response(),
        Err(e) => error_response(e.into()),
    }
}

pub async fn get_fornisseur(
    State(db): State<DatabaseConnection>,
    Path(id): Path<i32>,
) -> impl IntoResponse {
    match Fornisseur::find_by_id(id).one(&db).await {
        Ok(Some(model)) => (
            StatusCode::OK,
            Json(json!({ "success": true, "fornisseur": model })),
        )
            .into_response(),
        Ok(None) => error_response(ServiceError::NotFound("Fornisseur not found".to_string())),
        Err(e) => error_response(e.into()),
    }
}

pub async fn update_fornisseur(
    State(db): State<DatabaseConnection>,
    Path(id): Path<i32>,
    Json(payload): Json<FornisseurRequest>,
) -> impl IntoResponse {
    let existing = match Fornisseur::find_by_id(id).one(&db).await {
        Ok(Some(model)) => model,
        Ok(None) => {
            return error_response(ServiceError::NotFound("Fornisseur not found".to_string()));
        }
        Err(e) => return error_response(e.into()),
    };

    match unique_conflict(
        &db,
        payload.telephone.as_deref(),
        payload.reference.as_deref(),
        Some(id),
    )
    .await
    {
        Ok(Some(msg)) => return error_response(ServiceError::Conflict(msg.to_string())),
        Ok(None) => {}
        Err(e) => return error_response(e),
    }

    let mut active: fornisseur::ActiveModel = existing.into();
    if let Some(nom) = payload.nom_complete {
        active.nom_complete = Set(nom);
    }
    if let Some(ville) = payload.ville {
        active.ville = Set(Some(ville));
    }
    if let Some(address) = payload.address {
        active.address = Set(Some(address));
    }
    if let Some(telephone) = payload.telephone {
        active.telephone = Set(telephone);
    }
    if let Some(reference) = payload.reference {
        active.reference = Set(Some(reference));
    }
    active.updated_at = Set(chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string());

    match active.update(&db).await {
        Ok(model) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "message": "Fornisseur updated successfully",
                "fornisseur": model
            })),
        )
            .into_response(),
        Err(e) => error_response(e.into()),
    }
}

pub async fn delete_fornisseur(
    State(db): State<DatabaseConnection>,
    Path(id): Path<i32>,
) -> impl IntoResponse {
    match Fornisseur::find_by_id(id).one(&db).await {
        Ok(Some(model)) => match model.delete(&db).await {
            Ok(_) => (
                StatusCode::OK,
                Json(json!({
                    "success": true,
                    "message": "Fornisseur deleted successfully"
                })),
            )
                .into_response(),
            Err(e) => error_response(e.into()),
        },
        Ok(None) => error_response(ServiceError::NotFound("Fornisseur not found".to_string())),
        Err(e) => error_response(e.into()),
    }
}

pub async fn get_fornisseur_stats(State(db): State<DatabaseConnection>) -> impl IntoResponse {
    let total = match Fornisseur::find().count(&db).await {
        Ok(n) => n,
        Err(e) => return error_response(e.into()),
    };
    let with_reference = match Fornisseur::find()
        .filter(fornisseur::Column::Reference.is_not_null())
        .count(&db)
        .await
    {
        Ok(n) => n,
        Err(e) => return error_response(e.into()),
    };

    #[derive(FromQueryResult, serde::Serialize)]
    struct ProduitCount {
        fornisseur_id: Option<i32>,
        count: i64,
    }

    let produits_by_fornisseur = match Produit::find()
        .filter(produit::Column::FornisseurId.is_not_null())
        .select_only()
        .column(produit::Column::FornisseurId)
        .column_as(produit::Column::Id.count(), "count")
        .group_by(produit::Column::FornisseurId)
        .into_model::<ProduitCount>()
        .all(&db)
        .await
    {
        Ok(rows) => rows,
        Err(e) => return error_response(e.into()),
    };

    let total_products: i64 = produits_by_fornisseur.iter().map(|r| r.count).sum();

    (
        StatusCode::OK,
        Json(json!({
            "success": true,
            "statistics": {
                "total_fornisseurs": total,
                "with_reference": with_reference,
                "total_products": total_products,
                "produits_by_fornisseur": produits_by_fornisseur
            }
        })),
    )
        .into_response()
}
