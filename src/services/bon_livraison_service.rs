//! Bons de livraison: cycle de vie complet avec décrément du stock à la
//! création, restauration à l'annulation/suppression et re-décrément à la
//! levée d'annulation.

use chrono::Local;
use sea_orm::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::domain::status::BonLivraisonStatus;
use crate::domain::ServiceError;
use crate::models::advancement::{self, Entity as Advancement};
use crate::models::bon_livraison::{self, Entity as BonLivraison};
use crate::models::bon_livraison_produit::{self, Entity as BonLivraisonProduit};
use crate::models::client::Entity as Client;
use crate::models::produit::Entity as Produit;
use crate::models::{client, facture};
use crate::services::advancements::{self, AdvancementInput, AdvancementLink};
use crate::services::numbering::{self, PREFIX_BON_LIVRAISON};
use crate::services::{end_of_day, round2, stock};

#[derive(Debug, Default, Clone, Deserialize)]
pub struct BonLivraisonFilter {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub status: Option<String>,
    pub client_id: Option<i32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LigneBonLivraisonInput {
    pub produit_id: i32,
    pub quantite: i32,
    pub prix_unitaire: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct CreateBonLivraison {
    pub client_id: i32,
    pub produits: Vec<LigneBonLivraisonInput>,
    pub mode_reglement: Option<String>,
    pub status: Option<String>,
    pub notes: Option<String>,
    pub date_livraison: Option<String>,
    #[serde(default)]
    pub advancements: Vec<AdvancementInput>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateBonLivraison {
    pub produits: Option<Vec<LigneBonLivraisonInput>>,
    pub mode_reglement: Option<String>,
    pub notes: Option<String>,
    pub date_livraison: Option<String>,
    pub status: Option<String>,
    pub advancements: Option<Vec<AdvancementInput>>,
}

#[derive(Debug, Serialize)]
pub struct LigneBonLivraison {
    pub produit_id: i32,
    pub reference: String,
    pub designation: String,
    pub quantite: i32,
    pub prix_unitaire: f64,
    pub total_ligne: f64,
}

#[derive(Debug, Serialize)]
pub struct BonLivraisonWithDetails {
    #[serde(flatten)]
    pub bon: bon_livraison::Model,
    pub client: Option<client::Model>,
    pub produits: Vec<LigneBonLivraison>,
    pub advancements: Vec<advancement::Model>,
    pub total_advancements: f64,
    pub remaining_amount: f64,
    pub is_fully_paid: bool,
    pub payment_status: String,
}

#[derive(Debug, FromQueryResult, Serialize)]
pub struct StatusStat {
    pub status: String,
    pub count: i64,
    pub total_montant: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct BonLivraisonStats {
    pub total: i64,
    pub total_montant: f64,
    pub by_status: Vec<StatusStat>,
}

fn payment_status(total_advancements: f64, montant_ttc: f64) -> &'static str {
    if total_advancements >= montant_ttc {
        "payé"
    } else if total_advancements > 0.0 {
        "partiellement_payée"
    } else {
        "non_payé"
    }
}

fn build_details(
    bon: bon_livraison::Model,
    client: Option<client::Model>,
    produits: Vec<LigneBonLivraison>,
    advancements: Vec<advancement::Model>,
) -> BonLivraisonWithDetails {
    let total_advancements = advancements::total_amount(&advancements);
    let remaining = (bon.montant_ttc - total_advancements).max(0.0);
    let status = payment_status(total_advancements, bon.montant_ttc).to_string();

    BonLivraisonWithDetails {
        is_fully_paid: remaining <= 0.0,
        remaining_amount: round2(remaining),
        total_advancements: round2(total_advancements),
        payment_status: status,
        bon,
        client,
        produits,
        advancements,
    }
}

async fn load_lignes<C>(
    conn: &C,
    bon_ids: &[i32],
) -> Result<HashMap<i32, Vec<LigneBonLivraison>>, ServiceError>
where
    C: ConnectionTrait,
{
    let mut map: HashMap<i32, Vec<LigneBonLivraison>> = HashMap::new();

    if bon_ids.is_empty() {
        return Ok(map);
    }

    let lignes = BonLivraisonProduit::find()
        .filter(bon_livraison_produit::Column::BonLivraisonId.is_in(bon_ids.to_vec()))
        .find_also_related(Produit)
        .all(conn)
        .await?;

    for (ligne, produit) in lignes {
        let (reference, designation) = produit
            .map(|p| (p.reference, p.designation))
            .unwrap_or_else(|| ("?".to_string(), "Produit supprimé".to_string()));

        map.entry(ligne.bon_livraison_id)
            .or_default()
            .push(LigneBonLivraison {
                produit_id: ligne.produit_id,
                reference,
                designation,
                quantite: ligne.quantite,
                prix_unitaire: ligne.prix_unitaire,
                total_ligne: ligne.total_ligne,
            });
    }

    Ok(map)
}

pub async fn list(
    db: &DatabaseConnection,
    filter: BonLivraisonFilter,
) -> Result<Vec<BonLivraisonWithDetails>, ServiceError> {
    let mut condition = Condition::all();

    if let (Some(start), Some(end)) = (&filter.start_date, &filter.end_date) {
        condition = condition
            .add(bon_livraison::Column::DateCreation.gte(start.clone()))
            .add(bon_livraison::Column::DateCreation.lte(end_of_day(end)));
    }

    if let Some(status) = &filter.status {
        if status != "all" {
            condition = condition.add(bon_livraison::Column::Status.eq(status.clone()));
        }
    }

    if let Some(client_id) = filter.client_id {
        condition = condition.add(bon_livraison::Column::ClientId.eq(client_id));
    }

    let bons = BonLivraison::find()
        .filter(condition)
        .order_by_desc(bon_livraison::Column::DateCreation)
        .find_also_related(Client)
        .all(db)
        .await?;

    let bon_ids: Vec<i32> = bons.iter().map(|(b, _)| b.id).collect();
    let mut lignes = load_lignes(db, &bon_ids).await?;

    let mut advancements_map: HashMap<i32, Vec<advancement::Model>> = HashMap::new();
    if !bon_ids.is_empty() {
        let rows = Advancement::find()
            .filter(advancement::Column::BonLivraisonId.is_in(bon_ids))
            .order_by_asc(advancement::Column::PaymentDate)
            .all(db)
            .await?;
        for row in rows {
            if let Some(bon_id) = row.bon_livraison_id {
                advancements_map.entry(bon_id).or_default().push(row);
            }
        }
    }

    Ok(bons
        .into_iter()
        .map(|(bon, cl)| {
            let produits = lignes.remove(&bon.id).unwrap_or_default();
            let advancements = advancements_map.remove(&bon.id).unwrap_or_default();
            build_details(bon, cl, produits, advancements)
        })
        .collect())
}

pub async fn get(
    db: &DatabaseConnection,
    id: i32,
) -> Result<BonLivraisonWithDetails, ServiceError> {
    let (bon, cl) = BonLivraison::find_by_id(id)
        .find_also_related(Client)
        .one(db)
        .await?
        .ok_or_else(|| ServiceError::NotFound("Bon de livraison non trouvé".to_string()))?;

    let mut lignes = load_lignes(db, &[bon.id]).await?;
    let advancements = Advancement::find()
        .filter(advancement::Column::BonLivraisonId.eq(bon.id))
        .order_by_asc(advancement::Column::PaymentDate)
        .all(db)
        .await?;

    Ok(build_details(
        bon.clone(),
        cl,
        lignes.remove(&bon.id).unwrap_or_default(),
        advancements,
    ))
}

pub async fn next_numero<C>(conn: &C) -> Result<String, ServiceError>
where
    C: ConnectionTrait,
{
    let last = BonLivraison::find()
        .filter(bon_livraison::Column::NumBonLivraison.starts_with(PREFIX_BON_LIVRAISON))
        .order_by_desc(bon_livraison::Column::CreatedAt)
        .order_by_desc(bon_livraison::Column::Id)
        .one(conn)
        .await?;

    Ok(numbering::next_in_sequence(
        PREFIX_BON_LIVRAISON,
        last.as_ref().map(|b| b.num_bon_livraison.as_str()),
    ))
}

pub async fn create(
    db: &DatabaseConnection,
    input: CreateBonLivraison,
) -> Result<BonLivraisonWithDetails, ServiceError> {
    if input.produits.is_empty() {
        return Err(ServiceError::Validation(
            "Au moins un produit est requis".to_string(),
        ));
    }

    let initial_status = match &input.status {
        Some(s) => BonLivraisonStatus::parse(s)?,
        None => BonLivraisonStatus::Brouillon,
    };

    Client::find_by_id(input.client_id)
        .one(db)
        .await?
        .ok_or_else(|| ServiceError::NotFound("Client non trouvé".to_string()))?;

    let now = Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
    let txn = db.begin().await?;

    let num_bon_livraison = next_numero(&txn).await?;

    // Vérifier les produits et calculer les totaux avant toute écriture
    let mut montant_ht = 0.0;
    let mut verifies = Vec::new();
    for item in &input.produits {
        let produit = Produit::find_by_id(item.produit_id)
            .one(&txn)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Produit {} non trouvé", item.produit_id))
            })?;

        if produit.qty < item.quantite {
            return Err(ServiceError::Validation(format!(
                "Stock insuffisant pour {}. Stock disponible: {}",
                produit.designation, produit.qty
            )));
        }

        let prix_unitaire = item.prix_unitaire.unwrap_or(produit.prix_vente);
        let total_ligne = round2(prix_unitaire * item.quantite as f64);
        montant_ht += total_ligne;

        verifies.push((produit, item.clone(), prix_unitaire, total_ligne));
    }

    let montant_ht = round2(montant_ht.max(0.0));
    let montant_ttc = montant_ht; // pas de TVA sur un bon de livraison

    let bon = bon_livraison::ActiveModel {
        num_bon_livraison: Set(num_bon_livraison.clone()),
        client_id: Set(input.client_id),
        devis_id: Set(None),
        date_creation: Set(now.clone()),
        date_livraison: Set(input.date_livraison.clone()),
        mode_reglement: Set(input
            .mode_reglement
            .clone()
            .unwrap_or_else(|| "espèces".to_string())),
        remise: Set(0.0),
        tva: Set(0.0),
        montant_ht: Set(montant_ht),
        montant_ttc: Set(montant_ttc),
        montant_restant: Set(montant_ttc),
        status: Set(initial_status.as_str().to_string()),
        notes: Set(input.notes.clone()),
        is_facture: Set(false),
        created_at: Set(now.clone()),
        updated_at: Set(now.clone()),
        ..Default::default()
    };
    let bon = bon.insert(&txn).await?;

    for (produit, item, prix_unitaire, total_ligne) in verifies {
        let ligne = bon_livraison_produit::ActiveModel {
            bon_livraison_id: Set(bon.id),
            produit_id: Set(item.produit_id),
            quantite: Set(item.quantite),
            prix_unitaire: Set(prix_unitaire),
            total_ligne: Set(total_ligne),
            ..Default::default()
        };
        ligne.insert(&txn).await?;

        stock::apply(
            &txn,
            produit,
            -item.quantite,
            "livraison",
            &num_bon_livraison,
        )
        .await?;
    }

    if !input.advancements.is_empty() {
        let total = advancements::insert_initial(
            &txn,
            AdvancementLink::BonLivraison(bon.id),
            &input.advancements,
        )
        .await?;

        let mut active: bon_livraison::ActiveModel = bon.clone().into();
        if total >= montant_ttc {
            active.status = Set(BonLivraisonStatus::Paye.as_str().to_string());
            active.montant_restant = Set(0.0);
        } else if total > 0.0 {
            active.status = Set(BonLivraisonStatus::PartiellementPayee.as_str().to_string());
            active.montant_restant = Set(round2(montant_ttc - total));
        }
        active.updated_at = Set(now);
        active.update(&txn).await?;
    }

    txn.commit().await?;

    tracing::info!("bon de livraison {} créé", num_bon_livraison);
    get(db, bon.id).await
}

pub async fn update(
    db: &DatabaseConnection,
    id: i32,
    input: UpdateBonLivraison,
) -> Result<BonLivraisonWithDetails, ServiceError> {
    let now = Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
    let txn = db.begin().await?;

    let bon = BonLivraison::find_by_id(id)
        .one(&txn)
        .await?
        .ok_or_else(|| ServiceError::NotFound("Bon de livraison non trouvé".to_string()))?;

    let mut active: bon_livraison::ActiveModel = bon.clone().into();
    let mut montant_ttc = bon.montant_ttc;

    // Remplacement des lignes: restaurer l'ancien stock, puis revalider et
    // décrémenter pour les nouvelles quantités
    if let Some(produits) = &input.produits {
        if produits.is_empty() {
            return Err(ServiceError::Validation(
                "Au moins un produit est requis".to_string(),
            ));
        }

        let anciennes = BonLivraisonProduit::find()
            .filter(bon_livraison_produit::Column::BonLivraisonId.eq(id))
            .all(&txn)
            .await?;

        for ancienne in &anciennes {
            if let Some(produit) = Produit::find_by_id(ancienne.produit_id).one(&txn).await? {
                stock::apply(
                    &txn,
                    produit,
                    ancienne.quantite,
                    "annulation",
                    &bon.num_bon_livraison,
                )
                .await?;
            }
        }

        BonLivraisonProduit::delete_many()
            .filter(bon_livraison_produit::Column::BonLivraisonId.eq(id))
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

            if produit.qty < item.quantite {
                return Err(ServiceError::Validation(format!(
                    "Stock insuffisant pour {}. Stock disponible: {}",
                    produit.designation, produit.qty
                )));
            }

            let prix_unitaire = item.prix_unitaire.unwrap_or(produit.prix_vente);
            let total_ligne = round2(prix_unitaire * item.quantite as f64);
            montant_ht += total_ligne;

            let ligne = bon_livraison_produit::ActiveModel {
                bon_livraison_id: Set(id),
                produit_id: Set(item.produit_id),
                quantite: Set(item.quantite),
                prix_unitaire: Set(prix_unitaire),
                total_ligne: Set(total_ligne),
                ..Default::default()
            };
            ligne.insert(&txn).await?;

            stock::apply(
                &txn,
                produit,
                -item.quantite,
                "livraison",
                &bon.num_bon_livraison,
            )
            .await?;
        }

        let montant_ht = round2(montant_ht.max(0.0));
        montant_ttc = montant_ht;
        active.montant_ht = Set(montant_ht);
        active.montant_ttc = Set(montant_ttc);
        active.montant_restant = Set(montant_ttc);
    }

    // Réconciliation des acomptes et statut de paiement dérivé
    if let Some(liste) = &input.advancements {
        let total =
            advancements::reconcile(&txn, AdvancementLink::BonLivraison(id), liste).await?;

        if total >= montant_ttc {
            active.status = Set(BonLivraisonStatus::Paye.as_str().to_string());
            active.montant_restant = Set(0.0);
        } else if total > 0.0 {
            active.status = Set(BonLivraisonStatus::PartiellementPayee.as_str().to_string());
            active.montant_restant = Set(round2(montant_ttc - total));
        } else {
            active.montant_restant = Set(montant_ttc);
        }
    }

    if let Some(mode) = input.mode_reglement {
        active.mode_reglement = Set(mode);
    }
    if let Some(notes) = input.notes {
        active.notes = Set(Some(notes));
    }
    if let Some(date) = input.date_livraison {
        active.date_livraison = Set(Some(date));
    }
    active.updated_at = Set(now);

    let saved = active.update(&txn).await?;

    // Statut explicite seulement s'il n'est pas déjà dérivé des acomptes
    if input.advancements.is_none() {
        if let Some(status) = &input.status {
            let to = BonLivraisonStatus::parse(status)?;
            apply_status_change(&txn, saved, to).await?;
        }
    }

    txn.commit().await?;
    get(db, id).await
}

async fn apply_status_change<C>(
    conn: &C,
    bon: bon_livraison::Model,
    to: BonLivraisonStatus,
) -> Result<bon_livraison::Model, ServiceError>
where
    C: ConnectionTrait,
{
    let from = BonLivraisonStatus::parse(&bon.status)?;
    if from == to {
        return Ok(bon);
    }

    if !from.can_transition_to(to) {
        return Err(ServiceError::Validation(format!(
            "Transition de statut non autorisée: {} → {}",
            from, to
        )));
    }

    let lignes = BonLivraisonProduit::find()
        .filter(bon_livraison_produit::Column::BonLivraisonId.eq(bon.id))
        .all(conn)
        .await?;

    // Annulation: restaurer le stock; levée d'annulation: re-décrémenter
    if to == BonLivraisonStatus::Annulee {
        for ligne in &lignes {
            if let Some(produit) = Produit::find_by_id(ligne.produit_id).one(conn).await? {
                stock::apply(
                    conn,
                    produit,
                    ligne.quantite,
                    "annulation",
                    &bon.num_bon_livraison,
                )
                .await?;
            }
        }
    } else if from == BonLivraisonStatus::Annulee {
        for ligne in &lignes {
            let produit = Produit::find_by_id(ligne.produit_id)
                .one(conn)
                .await?
                .ok_or_else(|| {
                    ServiceError::NotFound(format!("Produit {} non trouvé", ligne.produit_id))
                })?;

            stock::apply(
                conn,
                produit,
                -ligne.quantite,
                "livraison",
                &bon.num_bon_livraison,
            )
            .await?;
        }
    }

    let now = Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
    let date_livraison_absente = bon.date_livraison.is_none();

    let mut active: bon_livraison::ActiveModel = bon.into();
    active.status = Set(to.as_str().to_string());
    if to == BonLivraisonStatus::Livre && date_livraison_absente {
        active.date_livraison = Set(Some(now.clone()));
    }
    active.updated_at = Set(now);

    Ok(active.update(conn).await?)
}

pub async fn update_status(
    db: &DatabaseConnection,
    id: i32,
    status: &str,
) -> Result<bon_livraison::Model, ServiceError> {
    let to = BonLivraisonStatus::parse(status)?;

    let txn = db.begin().await?;
    let bon = BonLivraison::find_by_id(id)
        .one(&txn)
        .await?
        .ok_or_else(|| ServiceError::NotFound("Bon de livraison non trouvé".to_string()))?;

    let updated = apply_status_change(&txn, bon, to).await?;
    txn.commit().await?;

    Ok(updated)
}

pub async fn delete(db: &DatabaseConnection, id: i32) -> Result<(), ServiceError> {
    let txn = db.begin().await?;

    let bon = BonLivraison::find_by_id(id)
        .one(&txn)
        .await?
        .ok_or_else(|| ServiceError::NotFound("Bon de livraison non trouvé".to_string()))?;

    let status = BonLivraisonStatus::parse(&bon.status)?;
    if !status.is_deletable() {
        return Err(ServiceError::Validation(format!(
            "Impossible de supprimer un bon {}",
            bon.status
        )));
    }

    // Un bon annulé a déjà restitué son stock à l'annulation
    if status != BonLivraisonStatus::Annulee {
        let lignes = BonLivraisonProduit::find()
            .filter(bon_livraison_produit::Column::BonLivraisonId.eq(id))
            .all(&txn)
            .await?;

        for ligne in &lignes {
            if let Some(produit) = Produit::find_by_id(ligne.produit_id).one(&txn).await? {
                stock::apply(
                    &txn,
                    produit,
                    ligne.quantite,
                    "annulation",
                    &bon.num_bon_livraison,
                )
                .await?;
            }
        }
    }

    BonLivraisonProduit::delete_many()
        .filter(bon_livraison_produit::Column::BonLivraisonId.eq(id))
        .exec(&txn)
        .await?;
    Advancement::delete_many()
        .filter(advancement::Column::BonLivraisonId.eq(id))
        .exec(&txn)
        .await?;
    // Détacher les factures éventuellement issues de ce bon
    facture::Entity::update_many()
        .col_expr(
            facture::Column::BonLivraisonId,
            sea_orm::sea_query::Expr::value(Option::<i32>::None),
        )
        .filter(facture::Column::BonLivraisonId.eq(id))
        .exec(&txn)
        .await?;

    BonLivraison::delete_by_id(id).exec(&txn).await?;
    txn.commit().await?;

    tracing::info!("bon de livraison {} supprimé", bon.num_bon_livraison);
    Ok(())
}

pub async fn stats(
    db: &DatabaseConnection,
    start_date: Option<String>,
    end_date: Option<String>,
) -> Result<BonLivraisonStats, ServiceError> {
    let mut condition = Condition::all();
    if let (Some(start), Some(end)) = (&start_date, &end_date) {
        condition = condition
            .add(bon_livraison::Column::DateCreation.gte(start.clone()))
            .add(bon_livraison::Column::DateCreation.lte(end_of_day(end)));
    }

    let by_status = BonLivraison::find()
        .filter(condition.clone())
        .select_only()
        .column(bon_livraison::Column::Status)
        .column_as(bon_livraison::Column::Id.count(), "count")
        .column_as(bon_livraison::Column::MontantTtc.sum(), "total_montant")
        .group_by(bon_livraison::Column::Status)
        .into_model::<StatusStat>()
        .all(db)
        .await?;

    let total = by_status.iter().map(|s| s.count).sum();
    let total_montant = by_status.iter().filter_map(|s| s.total_montant).sum();

    Ok(BonLivraisonStats {
        total,
        total_montant: round2(total_montant),
        by_status,
    })
}
