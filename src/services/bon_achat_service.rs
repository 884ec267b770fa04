//! Bons d'achat fournisseur: le stock n'augmente qu'à l'enregistrement de
//! la réception, jamais à la création du bon.

use chrono::Local;
use sea_orm::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::domain::status::BonAchatStatus;
use crate::domain::ServiceError;
use crate::models::bon_achat::{self, Entity as BonAchat};
use crate::models::bon_achat_produit::{self, Entity as BonAchatProduit};
use crate::models::fornisseur::{self, Entity as Fornisseur};
use crate::models::produit::{self, Entity as Produit};
use crate::services::numbering::{self, PREFIX_BON_ACHAT};
use crate::services::{end_of_day, round2, stock};

#[derive(Debug, Default, Clone, Deserialize)]
pub struct BonAchatFilter {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub status: Option<String>,
    pub fornisseur_id: Option<i32>,
    pub type_achat: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LigneBonAchatInput {
    pub produit_id: i32,
    pub quantite: i32,
    pub prix_unitaire: Option<f64>,
    pub remise_ligne: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct CreateBonAchat {
    pub fornisseur_id: i32,
    pub produits: Vec<LigneBonAchatInput>,
    pub mode_reglement: Option<String>,
    #[serde(default)]
    pub remise: f64,
    pub type_achat: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateBonAchat {
    pub fornisseur_id: Option<i32>,
    pub produits: Option<Vec<LigneBonAchatInput>>,
    pub mode_reglement: Option<String>,
    pub remise: Option<f64>,
    pub notes: Option<String>,
    pub status: Option<String>,
    pub type_achat: Option<String>,
    pub facture_fornisseur: Option<String>,
    pub date_reception: Option<String>,
    pub date_paiement: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ReceptionLigne {
    pub produit_id: i32,
    pub quantite_recue: i32,
}

#[derive(Debug, Deserialize)]
pub struct ReceptionInput {
    pub produits_reception: Vec<ReceptionLigne>,
    pub date_reception: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PaiementInput {
    pub date_paiement: Option<String>,
    pub mode_reglement: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct LigneBonAchat {
    pub produit_id: i32,
    pub reference: String,
    pub designation: String,
    pub qty: i32,
    pub quantite: i32,
    pub prix_unitaire: f64,
    pub remise_ligne: f64,
    pub total_ligne: f64,
}

#[derive(Debug, Serialize)]
pub struct BonAchatWithDetails {
    #[serde(flatten)]
    pub bon: bon_achat::Model,
    pub fornisseur: Option<fornisseur::Model>,
    pub produits: Vec<LigneBonAchat>,
    pub total_quantite: i32,
}

#[derive(Debug, FromQueryResult, Serialize)]
pub struct StatusStat {
    pub status: String,
    pub count: i64,
    pub total_montant: Option<f64>,
}

#[derive(Debug, FromQueryResult, Serialize)]
pub struct TypeStat {
    pub type_achat: Option<String>,
    pub count: i64,
    pub total_montant: Option<f64>,
}

#[derive(Debug, FromQueryResult, Serialize)]
pub struct FornisseurStat {
    pub fornisseur_id: i32,
    pub nombre_achats: i64,
    pub total_montant: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct BonAchatStats {
    pub total: i64,
    pub total_montant: f64,
    pub by_status: Vec<StatusStat>,
    pub by_type: Vec<TypeStat>,
    pub par_fornisseur: Vec<FornisseurStat>,
}

async fn load_lignes<C>(
    conn: &C,
    bon_ids: &[i32],
) -> Result<HashMap<i32, Vec<LigneBonAchat>>, ServiceError>
where
    C: ConnectionTrait,
{
    let mut map: HashMap<i32, Vec<LigneBonAchat>> = HashMap::new();

    if bon_ids.is_empty() {
        return Ok(map);
    }

    let lignes = BonAchatProduit::find()
        .filter(bon_achat_produit::Column::BonAchatId.is_in(bon_ids.to_vec()))
        .find_also_related(Produit)
        .all(conn)
        .await?;

    for (ligne, produit) in lignes {
        let (reference, designation, qty) = produit
            .map(|p| (p.reference, p.designation, p.qty))
            .unwrap_or_else(|| ("?".to_string(), "Produit supprimé".to_string(), 0));

        map.entry(ligne.bon_achat_id).or_default().push(LigneBonAchat {
            produit_id: ligne.produit_id,
            reference,
            designation,
            qty,
            quantite: ligne.quantite,
            prix_unitaire: ligne.prix_unitaire,
            remise_ligne: ligne.remise_ligne,
            total_ligne: ligne.total_ligne,
        });
    }

    Ok(map)
}

fn into_details(
    bon: bon_achat::Model,
    fornisseur: Option<fornisseur::Model>,
    produits: Vec<LigneBonAchat>,
) -> BonAchatWithDetails {
    let total_quantite = produits.iter().map(|l| l.quantite).sum();
    BonAchatWithDetails {
        bon,
        fornisseur,
        produits,
        total_quantite,
    }
}

pub async fn list(
    db: &DatabaseConnection,
    filter: BonAchatFilter,
) -> Result<Vec<BonAchatWithDetails>, ServiceError> {
    let mut condition = Condition::all();

    if let (Some(start), Some(end)) = (&filter.start_date, &filter.end_date) {
        condition = condition
            .add(bon_achat::Column::DateCreation.gte(start.clone()))
            .add(bon_achat::Column::DateCreation.lte(end_of_day(end)));
    }
    if let Some(status) = &filter.status {
        if status != "all" {
            condition = condition.add(bon_achat::Column::Status.eq(status.clone()));
        }
    }
    if let Some(fornisseur_id) = filter.fornisseur_id {
        condition = condition.add(bon_achat::Column::FornisseurId.eq(fornisseur_id));
    }
    if let Some(type_achat) = &filter.type_achat {
        if type_achat != "all" {
            condition = condition.add(bon_achat::Column::TypeAchat.eq(type_achat.clone()));
        }
    }

    let rows = BonAchat::find()
        .filter(condition)
        .order_by_desc(bon_achat::Column::DateCreation)
        .find_also_related(Fornisseur)
        .all(db)
        .await?;

    let ids: Vec<i32> = rows.iter().map(|(b, _)| b.id).collect();
    let mut lignes = load_lignes(db, &ids).await?;

    Ok(rows
        .into_iter()
        .map(|(bon, f)| {
            let produits = lignes.remove(&bon.id).unwrap_or_default();
            into_details(bon, f, produits)
        })
        .collect())
}

pub async fn get(db: &DatabaseConnection, id: i32) -> Result<BonAchatWithDetails, ServiceError> {
    let (bon, f) = BonAchat::find_by_id(id)
        .find_also_related(Fornisseur)
        .one(db)
        .await?
        .ok_or_else(|| ServiceError::NotFound("Bon d'achat non trouvé".to_string()))?;

    let mut lignes = load_lignes(db, &[bon.id]).await?;
    let produits = lignes.remove(&bon.id).unwrap_or_default();

    Ok(into_details(bon, f, produits))
}

async fn next_numero<C>(conn: &C) -> Result<String, ServiceError>
where
    C: ConnectionTrait,
{
    let last = BonAchat::find()
        .filter(bon_achat::Column::NumBonAchat.starts_with(PREFIX_BON_ACHAT))
        .order_by_desc(bon_achat::Column::CreatedAt)
        .order_by_desc(bon_achat::Column::Id)
        .one(conn)
        .await?;

    Ok(numbering::next_in_sequence(
        PREFIX_BON_ACHAT,
        last.as_ref().map(|b| b.num_bon_achat.as_str()),
    ))
}

fn ligne_totals(item: &LigneBonAchatInput, produit: &produit::Model) -> (i32, f64, f64, f64) {
    let quantite = item.quantite.max(1);
    let prix_unitaire = item.prix_unitaire.unwrap_or(produit.prix_achat);
    let remise_ligne = item.remise_ligne.unwrap_or(0.0);
    let total_ligne = round2(prix_unitaire * quantite as f64 - remise_ligne);
    (quantite, prix_unitaire, remise_ligne, total_ligne)
}

pub async fn create(
    db: &DatabaseConnection,
    input: CreateBonAchat,
) -> Result<BonAchatWithDetails, ServiceError> {
    if input.produits.is_empty() {
        return Err(ServiceError::Validation(
            "Au moins un produit est requis".to_string(),
        ));
    }

    Fornisseur::find_by_id(input.fornisseur_id)
        .one(db)
        .await?
        .ok_or_else(|| ServiceError::NotFound("Fornisseur non trouvé".to_string()))?;

    let now = Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
    let txn = db.begin().await?;

    let num_bon_achat = next_numero(&txn).await?;

    let mut montant_ht = 0.0;
    let mut verifies = Vec::new();
    for item in &input.produits {
        let produit = Produit::find_by_id(item.produit_id)
            .one(&txn)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Produit {} non trouvé", item.produit_id))
            })?;

        if item.quantite <= 0 {
            return Err(ServiceError::Validation(format!(
                "Quantité invalide pour le produit {}",
                produit.designation
            )));
        }

        let (quantite, prix_unitaire, remise_ligne, total_ligne) = ligne_totals(item, &produit);
        montant_ht += total_ligne;

        verifies.push((item.produit_id, quantite, prix_unitaire, remise_ligne, total_ligne));
    }

    let remise = input.remise.max(0.0);
    let montant_ht = round2((montant_ht - remise).max(0.0));
    let montant_ttc = montant_ht; // sans TVA sur les achats

    let bon = bon_achat::ActiveModel {
        num_bon_achat: Set(num_bon_achat.clone()),
        fornisseur_id: Set(input.fornisseur_id),
        date_creation: Set(now.clone()),
        date_reception: Set(None),
        date_paiement: Set(None),
        mode_reglement: Set(input
            .mode_reglement
            .clone()
            .unwrap_or_else(|| "espèces".to_string())),
        type_achat: Set(input.type_achat.clone()),
        facture_fornisseur: Set(None),
        remise: Set(remise),
        montant_ht: Set(montant_ht),
        montant_ttc: Set(montant_ttc),
        status: Set(BonAchatStatus::Brouillon.as_str().to_string()),
        notes: Set(input.notes.clone()),
        created_at: Set(now.clone()),
        updated_at: Set(now),
        ..Default::default()
    };
    let bon = bon.insert(&txn).await?;

    // Le stock n'est pas touché ici: il augmentera à la réception
    for (produit_id, quantite, prix_unitaire, remise_ligne, total_ligne) in verifies {
        let ligne = bon_achat_produit::ActiveModel {
            bon_achat_id: Set(bon.id),
            produit_id: Set(produit_id),
            quantite: Set(quantite),
            prix_unitaire: Set(prix_unitaire),
            remise_ligne: Set(remise_ligne),
            total_ligne: Set(total_ligne),
            ..Default::default()
        };
        ligne.insert(&txn).await?;
    }

    txn.commit().await?;

    tracing::info!("bon d'achat {} créé", num_bon_achat);
    get(db, bon.id).await
}

pub async fn update(
    db: &DatabaseConnection,
    id: i32,
    input: UpdateBonAchat,
) -> Result<BonAchatWithDetails, ServiceError> {
    let now = Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
    let txn = db.begin().await?;

    let bon = BonAchat::find_by_id(id)
        .one(&txn)
        .await?
        .ok_or_else(|| ServiceError::NotFound("Bon d'achat non trouvé".to_string()))?;

    let mut active: bon_achat::ActiveModel = bon.clone().into();

    if let Some(produits) = &input.produits {
        if produits.is_empty() {
            return Err(ServiceError::Validation(
                "Au moins un produit est requis".to_string(),
            ));
        }

        BonAchatProduit::delete_many()
            .filter(bon_achat_produit::Column::BonAchatId.eq(id))
            .exec(&txn)
            .await?;

        let mut montant_ht = 0.0;
        for item in produits {
            let produit = Produit::find_by_id(item.produit_id)
                .one(&txn)
                .await?
                .ok_or_else(|| {
                    ServiceError::NotFound(format!("Produit {} non trouvé", item.produit_id))
                })?;

            let (quantite, prix_unitaire, remise_ligne, total_ligne) = ligne_totals(item, &produit);
            montant_ht += total_ligne;

            let ligne = bon_achat_produit::ActiveModel {
                bon_achat_id: Set(id),
                produit_id: Set(item.produit_id),
                quantite: Set(quantite),
                prix_unitaire: Set(prix_unitaire),
                remise_ligne: Set(remise_ligne),
                total_ligne: Set(total_ligne),
                ..Default::default()
            };
            ligne.insert(&txn).await?;
        }

        let remise = input.remise.unwrap_or(bon.remise).max(0.0);
        let montant_ht = round2((montant_ht - remise).max(0.0));
        active.remise = Set(remise);
        active.montant_ht = Set(montant_ht);
        active.montant_ttc = Set(montant_ht);
    }

    if let Some(fornisseur_id) = input.fornisseur_id {
        Fornisseur::find_by_id(fornisseur_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Fornisseur non trouvé".to_string()))?;
        active.fornisseur_id = Set(fornisseur_id);
    }
    if let Some(mode) = input.mode_reglement {
        active.mode_reglement = Set(mode);
    }
    if let Some(notes) = input.notes {
        active.notes = Set(Some(notes));
    }
    if let Some(type_achat) = input.type_achat {
        active.type_achat = Set(Some(type_achat));
    }
    if let Some(facture) = input.facture_fornisseur {
        active.facture_fornisseur = Set(Some(facture));
    }
    if let Some(date) = input.date_reception {
        active.date_reception = Set(Some(date));
    }
    if let Some(date) = input.date_paiement {
        active.date_paiement = Set(Some(date));
    }

    if let Some(status) = &input.status {
        let to = BonAchatStatus::parse(status)?;
        let from = BonAchatStatus::parse(&bon.status)?;
        if from != to {
            if !from.can_transition_to(to) {
                return Err(ServiceError::Validation(format!(
                    "Transition de statut non autorisée: {} → {}",
                    from, to
                )));
            }
            active.status = Set(to.as_str().to_string());
        }
    }

    active.updated_at = Set(now);
    active.update(&txn).await?;
    txn.commit().await?;

    get(db, id).await
}

/// Enregistre une réception: incrémente le stock des quantités reçues,
/// bornées par les quantités commandées, et dérive le statut.
pub async fn enregistrer_reception(
    db: &DatabaseConnection,
    id: i32,
    input: ReceptionInput,
) -> Result<BonAchatWithDetails, ServiceError> {
    if input.produits_reception.is_empty() {
        return Err(ServiceError::Validation(
            "Liste des produits reçus requise".to_string(),
        ));
    }

    let now = Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
    let txn = db.begin().await?;

    let bon = BonAchat::find_by_id(id)
        .one(&txn)
        .await?
        .ok_or_else(|| ServiceError::NotFound("Bon d'achat non trouvé".to_string()))?;

    let status = BonAchatStatus::parse(&bon.status)?;
    if matches!(status, BonAchatStatus::Recu | BonAchatStatus::Annule) {
        return Err(ServiceError::Validation(format!(
            "Impossible d'enregistrer la réception pour un bon {}",
            bon.status
        )));
    }

    let lignes = BonAchatProduit::find()
        .filter(bon_achat_produit::Column::BonAchatId.eq(id))
        .all(&txn)
        .await?;
    let commandes: HashMap<i32, i32> = lignes.iter().map(|l| (l.produit_id, l.quantite)).collect();

    let mut recu_total = 0;
    for reception in &input.produits_reception {
        let commande = commandes.get(&reception.produit_id).copied().ok_or_else(|| {
            ServiceError::NotFound(format!(
                "Produit {} non trouvé dans le bon d'achat",
                reception.produit_id
            ))
        })?;

        let quantite_recue = reception.quantite_recue.max(0);
        if quantite_recue > commande {
            return Err(ServiceError::Validation(format!(
                "Quantité reçue ({}) supérieure à la quantité commandée ({})",
                quantite_recue, commande
            )));
        }

        if quantite_recue > 0 {
            let produit = Produit::find_by_id(reception.produit_id)
                .one(&txn)
                .await?
                .ok_or_else(|| {
                    ServiceError::NotFound(format!("Produit {} non trouvé", reception.produit_id))
                })?;

            stock::apply(&txn, produit, quantite_recue, "reception", &bon.num_bon_achat).await?;
        }

        recu_total += quantite_recue;
    }

    let commande_total: i32 = lignes.iter().map(|l| l.quantite).sum();
    let nouveau_statut = if recu_total >= commande_total {
        BonAchatStatus::Recu
    } else {
        BonAchatStatus::PartiellementRecu
    };

    let mut active: bon_achat::ActiveModel = bon.into();
    active.status = Set(nouveau_statut.as_str().to_string());
    active.date_reception = Set(Some(
        input.date_reception.clone().unwrap_or_else(|| now.clone()),
    ));
    active.updated_at = Set(now);
    active.update(&txn).await?;

    txn.commit().await?;
    get(db, id).await
}

pub async fn marquer_paye(
    db: &DatabaseConnection,
    id: i32,
    input: PaiementInput,
) -> Result<bon_achat::Model, ServiceError> {
    let now = Local::now().format("%Y-%m-%d %H:%M:%S").to_string();

    let bon = BonAchat::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| ServiceError::NotFound("Bon d'achat non trouvé".to_string()))?;

    let status = BonAchatStatus::parse(&bon.status)?;
    if !matches!(
        status,
        BonAchatStatus::Recu | BonAchatStatus::PartiellementRecu
    ) {
        return Err(ServiceError::Validation(
            "Le bon d'achat doit être reçu avant d'être marqué comme payé".to_string(),
        ));
    }

    let mut active: bon_achat::ActiveModel = bon.into();
    active.status = Set(BonAchatStatus::Paye.as_str().to_string());
    active.date_paiement = Set(Some(
        input.date_paiement.clone().unwrap_or_else(|| now.clone()),
    ));
    if let Some(mode) = input.mode_reglement {
        active.mode_reglement = Set(mode);
    }
    active.updated_at = Set(now);

    Ok(active.update(db).await?)
}

pub async fn annuler(db: &DatabaseConnection, id: i32) -> Result<bon_achat::Model, ServiceError> {
    let now = Local::now().format("%Y-%m-%d %H:%M:%S").to_string();

    let bon = BonAchat::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| ServiceError::NotFound("Bon d'achat non trouvé".to_string()))?;

    let status = BonAchatStatus::parse(&bon.status)?;
    if status == BonAchatStatus::Paye {
        return Err(ServiceError::Validation(
            "Impossible d'annuler un bon d'achat déjà payé".to_string(),
        ));
    }
    if !status.can_transition_to(BonAchatStatus::Annule) {
        return Err(ServiceError::Validation(format!(
            "Le bon d'achat est déjà {}",
            bon.status
        )));
    }

    let mut active: bon_achat::ActiveModel = bon.into();
    active.status = Set(BonAchatStatus::Annule.as_str().to_string());
    active.updated_at = Set(now);

    Ok(active.update(db).await?)
}

pub async fn delete(db: &DatabaseConnection, id: i32) -> Result<(), ServiceError> {
    let txn = db.begin().await?;

    let bon = BonAchat::find_by_id(id)
        .one(&txn)
        .await?
        .ok_or_else(|| ServiceError::NotFound("Bon d'achat non trouvé".to_string()))?;

    let status = BonAchatStatus::parse(&bon.status)?;
    if !matches!(status, BonAchatStatus::Brouillon | BonAchatStatus::Annule) {
        return Err(ServiceError::Validation(
            "Impossible de supprimer un bon d'achat qui n'est pas en brouillon ou annulé"
                .to_string(),
        ));
    }

    BonAchatProduit::delete_many()
        .filter(bon_achat_produit::Column::BonAchatId.eq(id))
        .exec(&txn)
        .await?;
    BonAchat::delete_by_id(id).exec(&txn).await?;

    txn.commit().await?;
    Ok(())
}

/// Bons commandés ou partiellement reçus, en attente de livraison
/// fournisseur.
pub async fn en_attente_reception(
    db: &DatabaseConnection,
) -> Result<Vec<BonAchatWithDetails>, ServiceError> {
    let rows = BonAchat::find()
        .filter(bon_achat::Column::Status.is_in(vec![
            BonAchatStatus::Commande.as_str(),
            BonAchatStatus::PartiellementRecu.as_str(),
        ]))
        .order_by_asc(bon_achat::Column::DateCreation)
        .find_also_related(Fornisseur)
        .all(db)
        .await?;

    let ids: Vec<i32> = rows.iter().map(|(b, _)| b.id).collect();
    let mut lignes = load_lignes(db, &ids).await?;

    Ok(rows
        .into_iter()
        .map(|(bon, f)| {
            let produits = lignes.remove(&bon.id).unwrap_or_default();
            into_details(bon, f, produits)
        })
        .collect())
}

pub async fn stats(
    db: &DatabaseConnection,
    filter: BonAchatFilter,
) -> Result<BonAchatStats, ServiceError> {
    let mut condition = Condition::all();
    if let (Some(start), Some(end)) = (&filter.start_date, &filter.end_date) {
        condition = condition
            .add(bon_achat::Column::DateCreation.gte(start.clone()))
            .add(bon_achat::Column::DateCreation.lte(end_of_day(end)));
    }
    if let Some(fornisseur_id) = filter.fornisseur_id {
        condition = condition.add(bon_achat::Column::FornisseurId.eq(fornisseur_id));
    }

    let by_status = BonAchat::find()
        .filter(condition.clone())
        .select_only()
        .column(bon_achat::Column::Status)
        .column_as(bon_achat::Column::Id.count(), "count")
        .column_as(bon_achat::Column::MontantTtc.sum(), "total_montant")
        .group_by(bon_achat::Column::Status)
        .into_model::<StatusStat>()
        .all(db)
        .await?;

    let by_type = BonAchat::find()
        .filter(condition.clone())
        .select_only()
        .column(bon_achat::Column::TypeAchat)
        .column_as(bon_achat::Column::Id.count(), "count")
        .column_as(bon_achat::Column::MontantTtc.sum(), "total_montant")
        .group_by(bon_achat::Column::TypeAchat)
        .into_model::<TypeStat>()
        .all(db)
        .await?;

    let par_fornisseur = BonAchat::find()
        .filter(condition)
        .select_only()
        .column(bon_achat::Column::FornisseurId)
        .column_as(bon_achat::Column::Id.count(), "nombre_achats")
        .column_as(bon_achat::Column::MontantTtc.sum(), "total_montant")
        .group_by(bon_achat::Column::FornisseurId)
        .into_model::<FornisseurStat>()
        .all(db)
        .await?;

    let total = by_status.iter().map(|s| s.count).sum();
    let total_montant = by_status.iter().filter_map(|s| s.total_montant).sum();

    Ok(BonAchatStats {
        total,
        total_montant: round2(total_montant),
        by_status,
        by_type,
        par_fornisseur,
    })
}
