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
use crate::models::bon_livraison::{self, Entity as BonLivraison};
use crate::models::client::{self, Entity as Client};
use crate::models::devis::{self, Entity as Devis};
use crate::models::facture::{self, Entity as Facture};
use crate::services::end_of_day;

#[derive(Debug, Deserialize)]
pub struct CreateClientRequest {
    pub nom_complete: Option<String>,
    pub reference: Option<String>,
    pub ville: Option<String>,
    pub address: Option<String>,
    pub telephone: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ClientsQuery {
    pub search: Option<String>,
    pub ville: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub q: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub status: Option<String>,
}

async fn telephone_in_use(
    db: &DatabaseConnection,
    telephone: &str,
    exclude_id: Option<i32>,
) -> Result<bool, ServiceError> {
    let existing = Client::find()
        .filter(client::Column::Telephone.eq(telephone))
        .one(db)
        .await?;

    Ok(match existing {
        Some(c) => Some(c.id) != exclude_id,
        None => false,
    })
}

pub async fn create_client(
    State(db): State<DatabaseConnection>,
    Json(payload): Json<CreateClientRequest>,
) -> impl IntoResponse {
    let (nom_complete, telephone) = match (&payload.nom_complete, &payload.telephone) {
        (Some(nom), Some(tel)) if !nom.trim().is_empty() && !tel.trim().is_empty() => {
            (nom.clone(), tel.clone())
        }
        _ => {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({
                    "success": false,
                    "message": "Nom complet and telephone are required"
                })),
            )
                .into_response();
        }
    };

    match telephone_in_use(&db, &telephone, None).await {
        Ok(true) => {
            return error_response(ServiceError::Conflict(
                "Telephone number already in use".to_string(),
            ));
        }
        Ok(false) => {}
        Err(e) => return error_response(e),
    }

    let now = chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
    let new_client = client::ActiveModel {
        nom_complete: Set(nom_complete),
        reference: Set(payload.reference),
        ville: Set(payload.ville),
        address: Set(payload.address),
        telephone: Set(Some(telephone)),
        created_at: Set(now.clone()),
        updated_at: Set(now),
        ..Default::default()
    };

    match new_client.insert(&db).await {
        Ok(model) => (
            StatusCode::CREATED,
            Json(json!({
                "success": true,
                "message": "Client created successfully",
                "client": model
            })),
        )
            .into_response(),
        Err(e) => error_response(e.into()),
    }
}

pub async fn list_clients(
    State(db): State<DatabaseConnection>,
    Query(params): Query<ClientsQuery>,
) -> impl IntoResponse {
    let mut query = Client::find();

    if let Some(search) = &params.search {
        query = query.filter(
            Condition::any()
                .add(client::Column::NomComplete.contains(search))
                .add(client::Column::Telephone.contains(search))
                .add(client::Column::Reference.contains(search)),
        );
    }
    if let Some(ville) = &params.ville {
        query = query.filter(client::Column::Ville.eq(ville.clone()));
    }

    match query
        .order_by_desc(client::Column::CreatedAt)
        .all(&db)
        .await
    {
        Ok(clients) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "clients": clients,
                "count": clients.len()
            })),
        )
            .into_response(),
        Err(e) => error_response(e.into()),
    }
}

pub async fn get_client(
    State(db): State<DatabaseConnection>,
    Path(id): Path<i32>,
) -> impl IntoResponse {
    match Client::find_by_id(id).one(&db).await {
        Ok(Some(model)) => (
            StatusCode::OK,
            Json(json!({ "success": true, "client": model })),
        )
            .into_response(),
        Ok(None) => error_response(ServiceError::NotFound("Client not found".to_string())),
        Err(e) => error_response(e.into()),
    }
}

pub async fn update_client(
    State(db): State<DatabaseConnection>,
    Path(id): Path<i32>,
    Json(payload): Json<CreateClientRequest>,
) -> impl IntoResponse {
    let existing = match Client::find_by_id(id).one(&db).await {
        Ok(Some(model)) => model,
        Ok(None) => return error_response(ServiceError::NotFound("Client not found".to_string())),
        Err(e) => return error_response(e.into()),
    };

    if let Some(telephone) = &payload.telephone {
        match telephone_in_use(&db, telephone, Some(id)).await {
            Ok(true) => {
                return error_response(ServiceError::Conflict(
                    "Telephone number already in use".to_string(),
                ));
            }
            Ok(false) => {}
            Err(e) => return error_response(e),
        }
    }

    let mut active: client::ActiveModel = existing.into();
    if let Some(nom) = payload.nom_complete {
        active.nom_complete = Set(nom);
    }
    if let Some(reference) = payload.reference {
        active.reference = Set(Some(reference));
    }
    if let Some(ville) = payload.ville {
        active.ville = Set(Some(ville));
    }
    if let Some(address) = payload.address {
        active.address = Set(Some(address));
    }
    if let Some(telephone) = payload.telephone {
        active.telephone = Set(Some(telephone));
    }
    active.updated_at = Set(chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string());

    match active.update(&db).await {
        Ok(model) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "message": "Client updated successfully",
                "client": model
            })),
        )
            .into_response(),
        Err(e) => error_response(e.into()),
    }
}

// La suppression est inconditionnelle, les documents liés suivent en cascade
pub async fn delete_client(
    State(db): State<DatabaseConnection>,
    Path(id): Path<i32>,
) -> impl IntoResponse {
    match Client::find_by_id(id).one(&db).await {
        Ok(Some(model)) => match model.delete(&db).await {
            Ok(_) => (
                StatusCode::OK,
                Json(json!({
                    "success": true,
                    "message": "Client deleted successfully"
                })),
            )
                .into_response(),
            Err(e) => error_response(e.into()),
        },
        Ok(None) => error_response(ServiceError::NotFound("Client not found".to_string())),
        Err(e) => error_response(e.into()),
    }
}

pub async fn search_clients(
    State(db): State<DatabaseConnection>,
    Query(params): Query<SearchQuery>,
) -> impl IntoResponse {
    let q = match params.q {
        Some(q) if !q.is_empty() => q,
        _ => {
            return error_response(ServiceError::Validation(
                "Search query is required".to_string(),
            ));
        }
    };

    match Client::find()
        .filter(
            Condition::any()
                .add(client::Column::NomComplete.contains(&q))
                .add(client::Column::Telephone.contains(&q))
                .add(client::Column::Reference.contains(&q)),
        )
        .order_by_asc(client::Column::NomComplete)
        .limit(50)
        .all(&db)
        .await
    {
        Ok(clients) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "clients": clients,
                "count": clients.len()
            })),
        )
            .into_response(),
        Err(e) => error_response(e.into()),
    }
}

pub async fn get_client_stats(State(db): State<DatabaseConnection>) -> impl IntoResponse {
    let total = match Client::find().count(&db).await {
        Ok(n) => n,
        Err(e) => return error_response(e.into()),
    };
    let with_reference = match Client::find()
        .filter(client::Column::Reference.is_not_null())
        .count(&db)
        .await
    {
        Ok(n) => n,
        Err(e) => return error_response(e.into()),
    };
    let with_address = match Client::find()
        .filter(client::Column::Address.is_not_null())
        .count(&db)
        .await
    {
        Ok(n) => n,
        Err(e) => return error_response(e.into()),
    };

    (
        StatusCode::OK,
        Json(json!({
            "success": true,
            "statistics": {
                "total_clients": total,
                "with_reference": with_reference,
                "with_address": with_address
            }
        })),
    )
        .into_response()
}

/// Historique des documents d'un client: devis, bons de livraison et
/// factures sur la période demandée.
pub async fn get_client_history(
    State(db): State<DatabaseConnection>,
    Path(id): Path<i32>,
    Query(params): Query<HistoryQuery>,
) -> impl IntoResponse {
    let client = match Client::find_by_id(id).one(&db).await {
        Ok(Some(model)) => model,
        Ok(None) => return error_response(ServiceError::NotFound("Client not found".to_string())),
        Err(e) => return error_response(e.into()),
    };

    let mut devis_query = Devis::find().filter(devis::Column::ClientId.eq(id));
    if let Some(start) = &params.start_date {
        devis_query = devis_query.filter(devis::Column::DateCreation.gte(start.clone()));
    }
    if let Some(end) = &params.end_date {
        devis_query = devis_query.filter(devis::Column::DateCreation.lte(end_of_day(end)));
    }
    if let Some(status) = &params.status {
        devis_query = devis_query.filter(devis::Column::Status.eq(status.clone()));
    }

    let mut bl_query = BonLivraison::find().filter(bon_livraison::Column::ClientId.eq(id));
    if let Some(start) = &params.start_date {
        bl_query = bl_query.filter(bon_livraison::Column::DateCreation.gte(start.clone()));
    }
    if let Some(end) = &params.end_date {
        bl_query = bl_query.filter(bon_livraison::Column::DateCreation.lte(end_of_day(end)));
    }
    if let Some(status) = &params.status {
        bl_query = bl_query.filter(bon_livraison::Column::Status.eq(status.clone()));
    }

    let mut facture_query = Facture::find().filter(facture::Column::ClientId.eq(id));
    if let Some(start) = &params.start_date {
        facture_query = facture_query.filter(facture::Column::DateCreation.gte(start.clone()));
    }
    if let Some(end) = &params.end_date {
        facture_query = facture_query.filter(facture::Column::DateCreation.lte(end_of_day(end)));
    }
    if let Some(status) = &params.status {
        facture_query = facture_query.filter(facture::Column::Status.eq(status.clone()));
    }

    let devis_list = match devis_query
        .order_by_desc(devis::Column::DateCreation)
        .all(&db)
        .await
    {
        Ok(rows) => rows,
        Err(e) => return error_response(e.into()),
    };
    let bl_list = match bl_query
        .order_by_desc(bon_livraison::Column::DateCreation)
        .all(&db)
        .await
    {
        Ok(rows) => rows,
        Err(e) => return error_response(e.into()),
    };
    let facture_list = match facture_query
        .order_by_desc(facture::Column::DateCreation)
        .all(&db)
        .await
    {
        Ok(rows) => rows,
        Err(e) => return error_response(e.into()),
    };

    let total_count = devis_list.len() + bl_list.len() + facture_list.len();

    (
        StatusCode::OK,
        Json(json!({
            "success": true,
            "client": client,
            "devis": devis_list,
            "bon_livraisons": bl_list,
            "factures": facture_list,
            "total_count": total_count
        })),
    )
        .into_response()
}
