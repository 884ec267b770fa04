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
use crate::models::fornisseur::Entity as Fornisseur;
use crate::models::produit::{self, Entity as Produit};
use crate::services::{round2, stock};

#[derive(Debug, Deserialize)]
pub struct CreateProduitRequest {
    pub reference: Option<String>,
    pub designation: Option<String>,
    pub observation: Option<String>,
    pub qty: Option<i32>,
    pub prix_achat: Option<f64>,
    pub prix_vente: Option<f64>,
    pub fornisseur_id: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateProduitRequest {
    pub reference: Option<String>,
    pub designation: Option<String>,
    pub observation: Option<String>,
    pub qty: Option<i32>,
    pub prix_achat: Option<f64>,
    pub prix_vente: Option<f64>,
    pub fornisseur_id: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub struct ProduitsQuery {
    pub search: Option<String>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub min_stock: Option<i32>,
    pub fornisseur_id: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub q: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct StockUpdateRequest {
    pub qty: Option<i32>,
    pub operation: Option<String>,
}

async fn reference_in_use(
    db: &DatabaseConnection,
    reference: &str,
    exclude_id: Option<i32>,
) -> Result<bool, ServiceError> {
    let existing = Produit::find()
        .filter(produit::Column::Reference.eq(reference))
        .one(db)
        .await?;

    Ok(match existing {
        Some(p) => Some(p.id) != exclude_id,
        None => false,
    })
}

pub async fn create_produit(
    State(db): State<DatabaseConnection>,
    Json(payload): Json<CreateProduitRequest>,
) -> impl IntoResponse {
    let (reference, designation, prix_achat, prix_vente) = match (
        &payload.reference,
        &payload.designation,
        payload.prix_achat,
        payload.prix_vente,
    ) {
        (Some(r), Some(d), Some(pa), Some(pv)) if !r.is_empty() && !d.is_empty() => {
            (r.clone(), d.clone(), pa, pv)
        }
        _ => {
            return error_response(ServiceError::Validation(
                "Reference, designation, prix_achat and prix_vente are required".to_string(),
            ));
        }
    };

    if prix_vente <= prix_achat {
        return error_response(ServiceError::Validation(
            "Le prix de vente doit être supérieur au prix d'achat".to_string(),
        ));
    }

    match reference_in_use(&db, &reference, None).await {
        Ok(true) => {
            return error_response(ServiceError::Conflict(
                "Reference already in use".to_string(),
            ));
        }
        Ok(false) => {}
        Err(e) => return error_response(e),
    }

    if let Some(fornisseur_id) = payload.fornisseur_id {
        match Fornisseur::find_by_id(fornisseur_id).one(&db).await {
            Ok(Some(_)) => {}
            Ok(None) => {
                return error_response(ServiceError::NotFound(
                    "Fornisseur not found".to_string(),
                ));
            }
            Err(e) => return error_response(e.into()),
        }
    }

    let now = chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
    let new_produit = produit::ActiveModel {
        reference: Set(reference),
        designation: Set(designation),
        observation: Set(payload.observation),
        qty: Set(payload.qty.unwrap_or(0).max(0)),
        prix_achat: Set(prix_achat),
        prix_vente: Set(prix_vente),
        fornisseur_id: Set(payload.fornisseur_id),
        created_at: Set(now.clone()),
        updated_at: Set(now),
        ..Default::default()
    };

    match new_produit.insert(&db).await {
        Ok(model) => (
            StatusCode::CREATED,
            Json(json!({
                "success": true,
                "message": "Produit created successfully",
                "produit": model
            })),
        )
            .into_response(),
        Err(e) => error_response(e.into()),
    }
}

pub async fn list_produits(
    State(db): State<DatabaseConnection>,
    Query(params): Query<ProduitsQuery>,
) -> impl IntoResponse {
    let mut query = Produit::find();

    if let Some(search) = &params.search {
        query = query.filter(
            Condition::any()
                .add(produit::Column::Reference.contains(search))
                .add(produit::Column::Designation.contains(search)),
        );
    }
    if let Some(min) = params.min_price {
        query = query.filter(produit::Column::PrixVente.gte(min));
    }
    if let Some(max) = params.max_price {
        query = query.filter(produit::Column::PrixVente.lte(max));
    }
    if let Some(min_stock) = params.min_stock {
        query = query.filter(produit::Column::Qty.gte(min_stock));
    }
    if let Some(fornisseur_id) = params.fornisseur_id {
        query = query.filter(produit::Column::FornisseurId.eq(fornisseur_id));
    }

    match query
        .order_by_desc(produit::Column::CreatedAt)
        .find_also_related(Fornisseur)
        .all(&db)
        .await
    {
        Ok(rows) => {
            let total_value: f64 = rows
                .iter()
                .map(|(p, _)| p.qty as f64 * p.prix_achat)
                .sum();
            let produits: Vec<serde_json::Value> = rows
                .into_iter()
                .map(|(p, f)| {
                    let mut value = serde_json::to_value(&p).unwrap_or_default();
                    value["fornisseur"] = serde_json::to_value(&f).unwrap_or_default();
                    value
                })
                .collect();

            (
                StatusCode::OK,
                Json(json!({
                    "success": true,
                    "produits": produits,
                    "count": produits.len(),
                    "total_value": round2(total_value)
                })),
            )
                .into_response()
        }
        Err(e) => error_response(e.into()),
    }
}

pub async fn get_produit(
    State(db): State<DatabaseConnection>,
    Path(id): Path<i32>,
) -> impl IntoResponse {
    match Produit::find_by_id(id)
        .find_also_related(Fornisseur)
        .one(&db)
        .await
    {
        Ok(Some((produit, fornisseur))) => {
            let mut value = serde_json::to_value(&produit).unwrap_or_default();
            value["fornisseur"] = serde_json::to_value(&fornisseur).unwrap_or_default();
            (
                StatusCode::OK,
                Json(json!({ "success": true, "produit": value })),
            )
                .into_response()
        }
        Ok(None) => error_response(ServiceError::NotFound("Produit not found".to_string())),
        Err(e) => error_response(e.into()),
    }
}

pub async fn update_produit(
    State(db): State<DatabaseConnection>,
    Path(id): Path<i32>,
    Json(payload): Json<UpdateProduitRequest>,
) -> impl IntoResponse {
    let existing = match Produit::find_by_id(id).one(&db).await {
        Ok(Some(model)) => model,
        Ok(None) => return error_response(ServiceError::NotFound("Produit not found".to_string())),
        Err(e) => return error_response(e.into()),
    };

    // Le prix de vente doit rester au-dessus du prix d'achat, quel que
    // soit le champ modifié
    let prix_achat = payload.prix_achat.unwrap_or(existing.prix_achat);
    let prix_vente = payload.prix_vente.unwrap_or(existing.prix_vente);
    if prix_vente <= prix_achat {
        return error_response(ServiceError::Validation(
            "Le prix de vente doit être supérieur au prix d'achat".to_string(),
        ));
    }

    if let Some(reference) = &payload.reference {
        if reference != &existing.reference {
            match reference_in_use(&db, reference, Some(id)).await {
                Ok(true) => {
                    return error_response(ServiceError::Conflict(
                        "Reference already in use".to_string(),
                    ));
                }
                Ok(false) => {}
                Err(e) => return error_response(e),
            }
        }
    }

    if let Some(fornisseur_id) = payload.fornisseur_id {
        match Fornisseur::find_by_id(fornisseur_id).one(&db).await {
            Ok(Some(_)) => {}
            Ok(None) => {
                return error_response(ServiceError::NotFound(
                    "Fornisseur not found".to_string(),
                ));
            }
            Err(e) => return error_response(e.into()),
        }
    }

    // Un changement direct de quantité passe par le journal de stock
    let existing = match payload.qty {
        Some(qty) if qty.max(0) != existing.qty => {
            let delta = qty.max(0) - existing.qty;
            let reference = existing.reference.clone();
            match stock::apply(&db, existing, delta, "ajustement", &reference).await {
                Ok(updated) => updated,
                Err(e) => return error_response(e),
            }
        }
        _ => existing,
    };

    let mut active: produit::ActiveModel = existing.into();
    if let Some(reference) = payload.reference {
        active.reference = Set(reference);
    }
    if let Some(designation) = payload.designation {
        active.designation = Set(designation);
    }
    if let Some(observation) = payload.observation {
        active.observation = Set(Some(observation));
    }
    active.prix_achat = Set(prix_achat);
    active.prix_vente = Set(prix_vente);
    if payload.fornisseur_id.is_some() {
        active.fornisseur_id = Set(payload.fornisseur_id);
    }
    active.updated_at = Set(chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string());

    match active.update(&db).await {
        Ok(model) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "message": "Produit updated successfully",
                "produit": model
            })),
        )
            .into_response(),
        Err(e) => error_response(e.into()),
    }
}

pub async fn delete_produit(
    State(db): State<DatabaseConnection>,
    Path(id): Path<i32>,
) -> impl IntoResponse {
    let existing = match Produit::find_by_id(id).one(&db).await {
        Ok(Some(model)) => model,
        Ok(None) => return error_response(ServiceError::NotFound("Produit not found".to_string())),
        Err(e) => return error_response(e.into()),
    };

    if existing.qty > 0 {
        return error_response(ServiceError::Validation(
            "Cannot delete produit with existing stock. Please clear stock first.".to_string(),
        ));
    }

    match existing.delete(&db).await {
        Ok(_) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "message": "Produit deleted successfully"
            })),
        )
            .into_response(),
        Err(e) => error_response(e.into()),
    }
}

/// Ajustement manuel du stock (add / subtract / set), journalisé comme
/// n'importe quel autre mouvement.
pub async fn update_stock(
    State(db): State<DatabaseConnection>,
    Path(id): Path<i32>,
    Json(payload): Json<StockUpdateRequest>,
) -> impl IntoResponse {
    let qty = match payload.qty {
        Some(q) if q >= 0 => q,
        _ => {
            return error_response(ServiceError::Validation(
                "Valid quantity is required".to_string(),
            ));
        }
    };

    let produit = match Produit::find_by_id(id).one(&db).await {
        Ok(Some(model)) => model,
        Ok(None) => return error_response(ServiceError::NotFound("Produit not found".to_string())),
        Err(e) => return error_response(e.into()),
    };

    let old_qty = produit.qty;
    let delta = match payload.operation.as_deref() {
        Some("add") => qty,
        Some("subtract") => {
            if produit.qty < qty {
                return error_response(ServiceError::Validation(
                    "Insufficient stock".to_string(),
                ));
            }
            -qty
        }
        Some("set") => qty - produit.qty,
        _ => {
            return error_response(ServiceError::Validation(
                "Invalid operation. Use 'add', 'subtract', or 'set'".to_string(),
            ));
        }
    };

    let reference = produit.reference.clone();
    match stock::apply(&db, produit, delta, "ajustement", &reference).await {
        Ok(updated) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "message": "Stock updated successfully",
                "produit": {
                    "id": updated.id,
                    "reference": updated.reference,
                    "old_qty": old_qty,
                    "new_qty": updated.qty,
                    "operation": payload.operation
                }
            })),
        )
            .into_response(),
        Err(e) => error_response(e),
    }
}

pub async fn search_produits(
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

    match Produit::find()
        .filter(
            Condition::any()
                .add(produit::Column::Reference.contains(&q))
                .add(produit::Column::Designation.contains(&q)),
        )
        .order_by_asc(produit::Column::Reference)
        .limit(50)
        .all(&db)
        .await
    {
        Ok(produits) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "produits": produits,
                "count": produits.len()
            })),
        )
            .into_response(),
        Err(e) => error_response(e.into()),
    }
}

pub async fn get_produit_stats(State(db): State<DatabaseConnection>) -> impl IntoResponse {
    let total = match Produit::find().count(&db).await {
        Ok(n) => n,
        Err(e) => return error_response(e.into()),
    };
    let low_stock = match Produit::find()
        .filter(produit::Column::Qty.lt(10))
        .count(&db)
        .await
    {
        Ok(n) => n,
        Err(e) => return error_response(e.into()),
    };
    let out_of_stock = match Produit::find()
        .filter(produit::Column::Qty.eq(0))
        .count(&db)
        .await
    {
        Ok(n) => n,
        Err(e) => return error_response(e.into()),
    };

    let produits = match Produit::find().all(&db).await {
        Ok(rows) => rows,
        Err(e) => return error_response(e.into()),
    };

    let total_value: f64 = produits.iter().map(|p| p.qty as f64 * p.prix_achat).sum();
    let (avg_margin, avg_margin_pct) = if produits.is_empty() {
        (0.0, 0.0)
    } else {
        let margins: f64 = produits.iter().map(|p| p.prix_vente - p.prix_achat).sum();
        let pcts: f64 = produits
            .iter()
            .filter(|p| p.prix_achat > 0.0)
            .map(|p| (p.prix_vente - p.prix_achat) / p.prix_achat * 100.0)
            .sum();
        (
            margins / produits.len() as f64,
            pcts / produits.len() as f64,
        )
    };

    (
        StatusCode::OK,
        Json(json!({
            "success": true,
            "statistics": {
                "total_produits": total,
                "low_stock": low_stock,
                "out_of_stock": out_of_stock,
                "in_stock": total - out_of_stock,
                "total_value": round2(total_value),
                "avg_margin": round2(avg_margin),
                "avg_margin_percentage": round2(avg_margin_pct)
            }
        })),
    )
        .into_response()
}

pub async fn get_produits_by_fornisseur(
    State(db): State<DatabaseConnection>,
    Path(fornisseur_id): Path<i32>,
) -> impl IntoResponse {
    let fornisseur = match Fornisseur::find_by_id(fornisseur_id).one(&db).await {
        Ok(Some(model)) => model,
        Ok(None) => {
            return error_response(ServiceError::NotFound("Fornisseur not found".to_string()));
        }
        Err(e) => return error_response(e.into()),
    };

    match Produit::find()
        .filter(produit::Column::FornisseurId.eq(fornisseur_id))
        .order_by_asc(produit::Column::Reference)
        .all(&db)
        .await
    {
        Ok(produits) => {
            let total_value: f64 = produits.iter().map(|p| p.qty as f64 * p.prix_achat).sum();
            (
                StatusCode::OK,
                Json(json!({
                    "success": true,
                    "fornisseur": {
                        "id": fornisseur.id,
                        "nom_complete": fornisseur.nom_complete,
                        "telephone": fornisseur.telephone
                    },
                    "produits": produits,
                    "count": produits.len(),
                    "total_value": round2(total_value)
                })),
            )
                .into_response()
        }
        Err(e) => error_response(e.into()),
    }
}
