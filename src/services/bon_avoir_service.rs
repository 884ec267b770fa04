//! Bons d'avoir: le stock est incrémenté à la création quel que soit le
//! motif (comportement observé de longue date, conservé tel quel), et
//! re-décrémenté à l'annulation d'un retour produit validé, borné à zéro.

use chrono::Local;
use sea_orm::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::domain::status::BonAvoirStatus;
use crate::domain::ServiceError;
use crate::models::bon_avoir::{self, Entity as BonAvoir};
use crate::models::bon_avoir_produit::{self, Entity as BonAvoirProduit};
use crate::models::bon_livraison::{self, Entity as BonLivraison};
use crate::models::bon_livraison_produit::Entity as BonLivraisonProduit;
use crate::models::client::{self, Entity as Client};
use crate::models::produit::Entity as Produit;
use crate::services::numbering::{self, PREFIX_BON_AVOIR};
use crate::services::{end_of_day, round2, stock};

const MOTIFS: &[&str] = &[
    "retour_produit",
    "erreur_facturation",
    "remise_commerciale",
    "annulation",
    "autre",
];

#[derive(Debug, Default, Clone, Deserialize)]
pub struct BonAvoirFilter {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub status: Option<String>,
    pub client_id: Option<i32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LigneBonAvoirInput {
    pub produit_id: i32,
    pub quantite: i32,
    pub prix_unitaire: Option<f64>,
    pub remise_ligne: Option<f64>,
    pub bon_livraison_produit_id: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub struct CreateBonAvoir {
    pub client_id: Option<i32>,
    pub bon_livraison_id: Option<i32>,
    pub produits: Vec<LigneBonAvoirInput>,
    pub motif: String,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UtiliserBonAvoir {
    pub bon_livraison_id: i32,
}

#[derive(Debug, Serialize)]
pub struct LigneBonAvoir {
    pub produit_id: i32,
    pub reference: String,
    pub designation: String,
    pub quantite: i32,
    pub prix_unitaire: f64,
    pub remise_ligne: f64,
    pub total_ligne: f64,
    pub bon_livraison_produit_id: Option<i32>,
}

#[derive(Debug, Serialize)]
pub struct BonAvoirWithDetails {
    #[serde(flatten)]
    pub bon: bon_avoir::Model,
    pub client: Option<client::Model>,
    pub bon_livraison: Option<bon_livraison::Model>,
    pub produits: Vec<LigneBonAvoir>,
}

#[derive(Debug, FromQueryResult, Serialize)]
pub struct StatusStat {
    pub status: String,
    pub count: i64,
    pub total_montant: Option<f64>,
}

#[derive(Debug, FromQueryResult, Serialize)]
pub struct MotifStat {
    pub motif: String,
    pub count: i64,
    pub total_montant: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct BonAvoirStats {
    pub total: i64,
    pub total_montant: f64,
    pub by_status: Vec<StatusStat>,
    pub by_motif: Vec<MotifStat>,
}

#[derive(Debug, Serialize)]
pub struct BonAvoirDisponible {
    pub id: i32,
    pub num_bon_avoir: String,
    pub montant_total: f64,
    pub date_creation: String,
}

async fn load_lignes<C>(
    conn: &C,
    bon_ids: &[i32],
) -> Result<HashMap<i32, Vec<LigneBonAvoir>>, ServiceError>
where
    C: ConnectionTrait,
{
    let mut map: HashMap<i32, Vec<LigneBonAvoir>> = HashMap::new();

    if bon_ids.is_empty() {
        return Ok(map);
    }

    let lignes = BonAvoirProduit::find()
        .filter(bon_avoir_produit::Column::BonAvoirId.is_in(bon_ids.to_vec()))
        .find_also_related(Produit)
        .all(conn)
        .await?;

    for (ligne, produit) in lignes {
        let (reference, designation) = produit
            .map(|p| (p.reference, p.designation))
            .unwrap_or_else(|| ("?".to_string(), "Produit supprimé".to_string()));

        map.entry(ligne.bon_avoir_id).or_default().push(LigneBonAvoir {
            produit_id: ligne.produit_id,
            reference,
            designation,
            quantite: ligne.quantite,
            prix_unitaire: ligne.prix_unitaire,
            remise_ligne: ligne.remise_ligne,
            total_ligne: ligne.total_ligne,
            bon_livraison_produit_id: ligne.bon_livraison_produit_id,
        });
    }

    Ok(map)
}

async fn build_details(
    db: &DatabaseConnection,
    bon: bon_avoir::Model,
    cl: Option<client::Model>,
) -> Result<BonAvoirWithDetails, ServiceError> {
    let mut lignes = load_lignes(db, &[bon.id]).await?;

    let bl = match bon.bon_livraison_id {
        Some(bl_id) => BonLivraison::find_by_id(bl_id).one(db).await?,
        None => None,
    };

    Ok(BonAvoirWithDetails {
        produits: lignes.remove(&bon.id).unwrap_or_default(),
        bon_livraison: bl,
        bon,
        client: cl,
    })
}

pub async fn list(
    db: &DatabaseConnection,
    filter: BonAvoirFilter,
) -> Result<Vec<BonAvoirWithDetails>, ServiceError> {
    let mut condition = Condition::all();

    if let (Some(start), Some(end)) = (&filter.start_date, &filter.end_date) {
        condition = condition
            .add(bon_avoir::Column::DateCreation.gte(start.clone()))
            .add(bon_avoir::Column::DateCreation.lte(end_of_day(end)));
    }
    if let Some(status) = &filter.status {
        if status != "all" {
            condition = condition.add(bon_avoir::Column::Status.eq(status.clone()));
        }
    }
    if let Some(client_id) = filter.client_id {
        condition = condition.add(bon_avoir::Column::ClientId.eq(client_id));
    }

    let rows = BonAvoir::find()
        .filter(condition)
        .order_by_desc(bon_avoir::Column::DateCreation)
        .find_also_related(Client)
        .all(db)
        .await?;

    let mut result = Vec::with_capacity(rows.len());
    for (bon, cl) in rows {
        result.push(build_details(db, bon, cl).await?);
    }
    Ok(result)
}

pub async fn get(db: &DatabaseConnection, id: i32) -> Result<BonAvoirWithDetails, ServiceError> {
    let (bon, cl) = BonAvoir::find_by_id(id)
        .find_also_related(Client)
        .one(db)
        .await?
        .ok_or_else(|| ServiceError::NotFound("Bon d'avoir non trouvé".to_string()))?;

    build_details(db, bon, cl).await
}

async fn next_numero<C>(conn: &C) -> Result<String, ServiceError>
where
    C: ConnectionTrait,
{
    let last = BonAvoir::find()
        .filter(bon_avoir::Column::NumBonAvoir.starts_with(PREFIX_BON_AVOIR))
        .order_by_desc(bon_avoir::Column::CreatedAt)
        .order_by_desc(bon_avoir::Column::Id)
        .one(conn)
        .await?;

    Ok(numbering::next_in_sequence(
        PREFIX_BON_AVOIR,
        last.as_ref().map(|b| b.num_bon_avoir.as_str()),
    ))
}

pub async fn create(
    db: &DatabaseConnection,
    input: CreateBonAvoir,
) -> Result<BonAvoirWithDetails, ServiceError> {
    if input.client_id.is_none() && input.bon_livraison_id.is_none() {
        return Err(ServiceError::Validation(
            "Client ou bon de livraison requis".to_string(),
        ));
    }
    if input.produits.is_empty() {
        return Err(ServiceError::Validation(
            "Au moins un produit est requis".to_string(),
        ));
    }
    if !MOTIFS.contains(&input.motif.as_str()) {
        return Err(ServiceError::Validation("Motif requis".to_string()));
    }

    let now = Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
    let txn = db.begin().await?;

    let num_bon_avoir = next_numero(&txn).await?;

    let mut montant_total = 0.0;
    let mut verifies = Vec::new();
    for item in &input.produits {
        let produit = Produit::find_by_id(item.produit_id)
            .one(&txn)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Produit {} non trouvé", item.produit_id))
            })?;

        let quantite = item.quantite.max(1);

        // Pour un retour, on ne peut pas rendre plus que la quantité vendue
        if input.bon_livraison_id.is_some() {
            if let Some(bl_produit_id) = item.bon_livraison_produit_id {
                let ligne_bl = BonLivraisonProduit::find_by_id(bl_produit_id)
                    .one(&txn)
                    .await?
                    .ok_or_else(|| {
                        ServiceError::NotFound(
                            "Produit du bon de livraison non trouvé".to_string(),
                        )
                    })?;

                if quantite > ligne_bl.quantite {
                    return Err(ServiceError::Validation(format!(
                        "Quantité de retour supérieure à la quantité vendue ({})",
                        ligne_bl.quantite
                    )));
                }
            }
        }

        let prix_unitaire = item.prix_unitaire.unwrap_or(produit.prix_vente);
        let remise_ligne = item.remise_ligne.unwrap_or(0.0);
        let total_ligne = round2(prix_unitaire * quantite as f64 - remise_ligne);
        montant_total += total_ligne;

        verifies.push((produit, item.clone(), quantite, prix_unitaire, remise_ligne, total_ligne));
    }

    // Déterminer le client depuis le bon de livraison si absent
    let mut client_id = input.client_id;
    if client_id.is_none() {
        if let Some(bl_id) = input.bon_livraison_id {
            client_id = BonLivraison::find_by_id(bl_id)
                .one(&txn)
                .await?
                .map(|b| b.client_id);
        }
    }

    let bon = bon_avoir::ActiveModel {
        num_bon_avoir: Set(num_bon_avoir.clone()),
        client_id: Set(client_id),
        bon_livraison_id: Set(input.bon_livraison_id),
        date_creation: Set(now.clone()),
        motif: Set(input.motif.clone()),
        montant_total: Set(round2(montant_total)),
        status: Set(BonAvoirStatus::Brouillon.as_str().to_string()),
        notes: Set(input.notes.clone()),
        utilise_le: Set(None),
        created_at: Set(now.clone()),
        updated_at: Set(now),
        ..Default::default()
    };
    let bon = bon.insert(&txn).await?;

    for (produit, item, quantite, prix_unitaire, remise_ligne, total_ligne) in verifies {
        let ligne = bon_avoir_produit::ActiveModel {
            bon_avoir_id: Set(bon.id),
            produit_id: Set(item.produit_id),
            quantite: Set(quantite),
            prix_unitaire: Set(prix_unitaire),
            remise_ligne: Set(remise_ligne),
            total_ligne: Set(total_ligne),
            bon_livraison_produit_id: Set(item.bon_livraison_produit_id),
            ..Default::default()
        };
        ligne.insert(&txn).await?;

        // Incrément inconditionnel, quel que soit le motif
        stock::apply(&txn, produit, quantite, "retour_client", &num_bon_avoir).await?;
    }

    txn.commit().await?;

    tracing::info!("bon d'avoir {} créé", num_bon_avoir);
    get(db, bon.id).await
}

pub async fn valider(db: &DatabaseConnection, id: i32) -> Result<bon_avoir::Model, ServiceError> {
    let now = Local::now().format("%Y-%m-%d %H:%M:%S").to_string();

    let bon = BonAvoir::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| ServiceError::NotFound("Bon d'avoir non trouvé".to_string()))?;

    let status = BonAvoirStatus::parse(&bon.status)?;
    if !status.can_transition_to(BonAvoirStatus::Valide) {
        return Err(ServiceError::Validation(format!(
            "Le bon d'avoir est déjà {}",
            bon.status
        )));
    }

    let mut active: bon_avoir::ActiveModel = bon.into();
    active.status = Set(BonAvoirStatus::Valide.as_str().to_string());
    active.updated_at = Set(now);

    Ok(active.update(db).await?)
}

/// Applique un bon d'avoir valide sur un bon de livraison du même client:
/// le montant TTC du bon est réduit, jamais en dessous de zéro.
pub async fn utiliser(
    db: &DatabaseConnection,
    id: i32,
    input: UtiliserBonAvoir,
) -> Result<bon_avoir::Model, ServiceError> {
    let now = Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
    let txn = db.begin().await?;

    let bon = BonAvoir::find_by_id(id)
        .one(&txn)
        .await?
        .ok_or_else(|| ServiceError::NotFound("Bon d'avoir non trouvé".to_string()))?;

    let status = BonAvoirStatus::parse(&bon.status)?;
    if status != BonAvoirStatus::Valide {
        return Err(ServiceError::Validation(format!(
            "Le bon d'avoir n'est pas valide ({})",
            bon.status
        )));
    }

    let bon_livraison = BonLivraison::find_by_id(input.bon_livraison_id)
        .one(&txn)
        .await?
        .ok_or_else(|| ServiceError::NotFound("Bon de livraison non trouvé".to_string()))?;

    if Some(bon_livraison.client_id) != bon.client_id {
        return Err(ServiceError::Validation(
            "Le bon de livraison n'appartient pas au même client".to_string(),
        ));
    }

    let nouveau_ttc = round2((bon_livraison.montant_ttc - bon.montant_total).max(0.0));
    let note = format!(
        "{}\nBon d'avoir {} appliqué: -{} DH",
        bon_livraison.notes.clone().unwrap_or_default(),
        bon.num_bon_avoir,
        bon.montant_total
    );

    let mut bl_active: bon_livraison::ActiveModel = bon_livraison.into();
    bl_active.montant_ttc = Set(nouveau_ttc);
    bl_active.notes = Set(Some(note));
    bl_active.updated_at = Set(now.clone());
    bl_active.update(&txn).await?;

    let mut active: bon_avoir::ActiveModel = bon.into();
    active.status = Set(BonAvoirStatus::Utilise.as_str().to_string());
    active.utilise_le = Set(Some(now.clone()));
    active.updated_at = Set(now);
    let bon = active.update(&txn).await?;

    txn.commit().await?;
    Ok(bon)
}

pub async fn annuler(db: &DatabaseConnection, id: i32) -> Result<bon_avoir::Model, ServiceError> {
    let now = Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
    let txn = db.begin().await?;

    let bon = BonAvoir::find_by_id(id)
        .one(&txn)
        .await?
        .ok_or_else(|| ServiceError::NotFound("Bon d'avoir non trouvé".to_string()))?;

    let status = BonAvoirStatus::parse(&bon.status)?;
    if status == BonAvoirStatus::Utilise {
        return Err(ServiceError::Validation(
            "Impossible d'annuler un bon d'avoir déjà utilisé".to_string(),
        ));
    }
    if !status.can_transition_to(BonAvoirStatus::Annule) {
        return Err(ServiceError::Validation(format!(
            "Le bon d'avoir est déjà {}",
            bon.status
        )));
    }

    // Un retour validé avait réinjecté du stock: on le reprend, borné à zéro
    if bon.motif == "retour_produit" && status == BonAvoirStatus::Valide {
        let lignes = BonAvoirProduit::find()
            .filter(bon_avoir_produit::Column::BonAvoirId.eq(id))
            .all(&txn)
            .await?;

        for ligne in &lignes {
            if let Some(produit) = Produit::find_by_id(ligne.produit_id).one(&txn).await? {
                stock::apply_clamped(
                    &txn,
                    produit,
                    -ligne.quantite,
                    "annulation_retour",
                    &bon.num_bon_avoir,
                )
                .await?;
            }
        }
    }

    let mut active: bon_avoir::ActiveModel = bon.into();
    active.status = Set(BonAvoirStatus::Annule.as_str().to_string());
    active.updated_at = Set(now);
    let bon = active.update(&txn).await?;

    txn.commit().await?;
    Ok(bon)
}

/// Bons d'avoir encore utilisables pour un client donné.
pub async fn disponibles(
    db: &DatabaseConnection,
    client_id: i32,
) -> Result<(Vec<BonAvoirDisponible>, f64), ServiceError> {
    let bons = BonAvoir::find()
        .filter(bon_avoir::Column::ClientId.eq(client_id))
        .filter(bon_avoir::Column::Status.eq(BonAvoirStatus::Valide.as_str()))
        .order_by_asc(bon_avoir::Column::DateCreation)
        .all(db)
        .await?;

    let total = round2(bons.iter().map(|b| b.montant_total).sum());
    let result = bons
        .into_iter()
        .map(|b| BonAvoirDisponible {
            id: b.id,
            num_bon_avoir: b.num_bon_avoir,
            montant_total: b.montant_total,
            date_creation: b.date_creation,
        })
        .collect();

    Ok((result, total))
}

pub async fn stats(
    db: &DatabaseConnection,
    start_date: Option<String>,
    end_date: Option<String>,
) -> Result<BonAvoirStats, ServiceError> {
    let mut condition = Condition::all();
    if let (Some(start), Some(end)) = (&start_date, &end_date) {
        condition = condition
            .add(bon_avoir::Column::DateCreation.gte(start.clone()))
            .add(bon_avoir::Column::DateCreation.lte(end_of_day(end)));
    }

    let by_status = BonAvoir::find()
        .filter(condition.clone())
        .select_only()
        .column(bon_avoir::Column::Status)
        .column_as(bon_avoir::Column::Id.count(), "count")
        .column_as(bon_avoir::Column::MontantTotal.sum(), "total_montant")
        .group_by(bon_avoir::Column::Status)
        .into_model::<StatusStat>()
        .all(db)
        .await?;

    let by_motif = BonAvoir::find()
        .filter(condition)
        .select_only()
        .column(bon_avoir::Column::Motif)
        .column_as(bon_avoir::Column::Id.count(), "count")
        .column_as(bon_avoir::Column::MontantTotal.sum(), "total_montant")
        .group_by(bon_avoir::Column::Motif)
        .into_model::<MotifStat>()
        .all(db)
        .await?;

    let total = by_status.iter().map(|s| s.count).sum();
    let total_montant = by_status.iter().filter_map(|s| s.total_montant).sum();

    Ok(BonAvoirStats {
        total,
        total_montant: round2(total_montant),
        by_status,
        by_motif,
    })
}
