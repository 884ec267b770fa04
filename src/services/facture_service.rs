//! Factures: cycle de vie avec politique de stock à deux régimes. Une
//! facture autonome décrémente le stock à la création et le restitue à
//! l'annulation/suppression; une facture issue d'un bon de livraison ne
//! touche jamais au stock (déjà décrémenté par le bon).

use chrono::{Duration, Local};
use sea_orm::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::domain::status::FactureStatus;
use crate::domain::ServiceError;
use crate::models::advancement::{self, Entity as Advancement};
use crate::models::bon_livraison::{self, Entity as BonLivraison};
use crate::models::bon_livraison_produit::{self, Entity as BonLivraisonProduit};
use crate::models::client::Entity as Client;
use crate::models::facture::{self, Entity as Facture};
use crate::models::facture_produit::{self, Entity as FactureProduit};
use crate::models::produit::Entity as Produit;
use crate::models::client;
use crate::services::advancements::{self, AdvancementInput, AdvancementLink};
use crate::services::numbering::{self, PREFIX_FACTURE};
use crate::services::{end_of_day, round2, stock};

#[derive(Debug, Default, Clone, Deserialize)]
pub struct FactureFilter {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub status: Option<String>,
    pub client_id: Option<i32>,
    pub is_paid: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LigneFactureInput {
    pub produit_id: i32,
    pub quantite: i32,
    pub prix_unitaire: Option<f64>,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateFacture {
    pub client_id: i32,
    pub produits: Vec<LigneFactureInput>,
    pub mode_reglement: Option<String>,
    #[serde(default)]
    pub tva: f64,
    pub notes: Option<String>,
    pub date_facturation: Option<String>,
    pub date_echeance: Option<String>,
    pub bon_livraison_id: Option<i32>,
    #[serde(default)]
    pub advancements: Vec<AdvancementInput>,
}

#[derive(Debug, Deserialize)]
pub struct CreateFactureFromBonLivraison {
    pub bon_livraison_id: i32,
    pub date_facturation: Option<String>,
    pub date_echeance: Option<String>,
    pub mode_reglement: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateFacture {
    pub produits: Option<Vec<LigneFactureInput>>,
    pub mode_reglement: Option<String>,
    pub notes: Option<String>,
    pub date_facturation: Option<String>,
    pub date_echeance: Option<String>,
    pub tva: Option<f64>,
    pub status: Option<String>,
    pub advancements: Option<Vec<AdvancementInput>>,
}

#[derive(Debug, Deserialize)]
pub struct PaymentInput {
    pub amount: f64,
    pub payment_method: String,
    pub payment_date: Option<String>,
    pub reference: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct LigneFacture {
    pub produit_id: i32,
    pub reference: String,
    pub designation: String,
    pub quantite: i32,
    pub prix_unitaire: f64,
    pub montant_ht_ligne: f64,
    pub montant_tva_ligne: f64,
    pub total_ligne: f64,
    pub description: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct FactureWithDetails {
    #[serde(flatten)]
    pub facture: facture::Model,
    pub client: Option<client::Model>,
    pub bon_livraison: Option<bon_livraison::Model>,
    pub produits: Vec<LigneFacture>,
    pub advancements: Vec<advancement::Model>,
    pub total_payments: f64,
    pub remaining_amount: f64,
    pub is_fully_paid: bool,
    pub payment_status: String,
}

#[derive(Debug, FromQueryResult, Serialize)]
pub struct StatusStat {
    pub status: String,
    pub count: i64,
    pub montant_total: Option<f64>,
}

#[derive(Debug, FromQueryResult, Serialize)]
pub struct MonthStat {
    pub month: Option<String>,
    pub count: i64,
    pub montant_total: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct FactureStats {
    pub total: i64,
    pub total_ht: f64,
    pub total_tva: f64,
    pub total_ttc: f64,
    pub total_paye: f64,
    pub total_restant: f64,
    pub by_status: Vec<StatusStat>,
    pub by_month: Vec<MonthStat>,
}

fn build_details(
    facture: facture::Model,
    client: Option<client::Model>,
    bon_livraison: Option<bon_livraison::Model>,
    produits: Vec<LigneFacture>,
    advancements: Vec<advancement::Model>,
) -> FactureWithDetails {
    let total_payments = advancements::total_amount(&advancements);
    let remaining = (facture.montant_ttc - total_payments).max(0.0);

    let payment_status = if remaining <= 0.0 {
        "payée"
    } else if total_payments > 0.0 {
        "partiellement_payée"
    } else {
        "impayée"
    };

    FactureWithDetails {
        is_fully_paid: remaining <= 0.0,
        remaining_amount: round2(remaining),
        total_payments: round2(total_payments),
        payment_status: payment_status.to_string(),
        facture,
        client,
        bon_livraison,
        produits,
        advancements,
    }
}

async fn load_lignes<C>(
    conn: &C,
    facture_ids: &[i32],
) -> Result<HashMap<i32, Vec<LigneFacture>>, ServiceError>
where
    C: ConnectionTrait,
{
    let mut map: HashMap<i32, Vec<LigneFacture>> = HashMap::new();

    if facture_ids.is_empty() {
        return Ok(map);
    }

    let lignes = FactureProduit::find()
        .filter(facture_produit::Column::FactureId.is_in(facture_ids.to_vec()))
        .find_also_related(Produit)
        .all(conn)
        .await?;

    for (ligne, produit) in lignes {
        let (reference, designation) = produit
            .map(|p| (p.reference, p.designation))
            .unwrap_or_else(|| ("?".to_string(), "Produit supprimé".to_string()));

        map.entry(ligne.facture_id).or_default().push(LigneFacture {
            produit_id: ligne.produit_id,
            reference,
            designation,
            quantite: ligne.quantite,
            prix_unitaire: ligne.prix_unitaire,
            montant_ht_ligne: ligne.montant_ht_ligne,
            montant_tva_ligne: ligne.montant_tva_ligne,
            total_ligne: ligne.total_ligne,
            description: ligne.description,
        });
    }

    Ok(map)
}

pub async fn list(
    db: &DatabaseConnection,
    filter: FactureFilter,
) -> Result<Vec<FactureWithDetails>, ServiceError> {
    let mut condition = Condition::all();

    if let (Some(start), Some(end)) = (&filter.start_date, &filter.end_date) {
        condition = condition
            .add(facture::Column::DateCreation.gte(start.clone()))
            .add(facture::Column::DateCreation.lte(end_of_day(end)));
    }
    if let Some(status) = &filter.status {
        if status != "all" {
            condition = condition.add(facture::Column::Status.eq(status.clone()));
        }
    }
    if let Some(client_id) = filter.client_id {
        condition = condition.add(facture::Column::ClientId.eq(client_id));
    }

    let factures = Facture::find()
        .filter(condition)
        .order_by_desc(facture::Column::DateCreation)
        .find_also_related(Client)
        .all(db)
        .await?;

    let facture_ids: Vec<i32> = factures.iter().map(|(f, _)| f.id).collect();
    let mut lignes = load_lignes(db, &facture_ids).await?;

    let mut advancements_map: HashMap<i32, Vec<advancement::Model>> = HashMap::new();
    if !facture_ids.is_empty() {
        let rows = Advancement::find()
            .filter(advancement::Column::FactureId.is_in(facture_ids.clone()))
            .order_by_asc(advancement::Column::PaymentDate)
            .all(db)
            .await?;
        for row in rows {
            if let Some(facture_id) = row.facture_id {
                advancements_map.entry(facture_id).or_default().push(row);
            }
        }
    }

    let bl_ids: Vec<i32> = factures
        .iter()
        .filter_map(|(f, _)| f.bon_livraison_id)
        .collect();
    let mut bls: HashMap<i32, bon_livraison::Model> = HashMap::new();
    if !bl_ids.is_empty() {
        for bl in BonLivraison::find()
            .filter(bon_livraison::Column::Id.is_in(bl_ids))
            .all(db)
            .await?
        {
            bls.insert(bl.id, bl);
        }
    }

    let details: Vec<FactureWithDetails> = factures
        .into_iter()
        .map(|(f, cl)| {
            let produits = lignes.remove(&f.id).unwrap_or_default();
            let advancements = advancements_map.remove(&f.id).unwrap_or_default();
            let bl = f.bon_livraison_id.and_then(|id| bls.get(&id).cloned());
            build_details(f, cl, bl, produits, advancements)
        })
        .collect();

    // Filtre par état de paiement, dérivé et non persisté
    Ok(match filter.is_paid {
        Some(true) => details.into_iter().filter(|f| f.is_fully_paid).collect(),
        Some(false) => details.into_iter().filter(|f| !f.is_fully_paid).collect(),
        None => details,
    })
}

pub async fn get(db: &DatabaseConnection, id: i32) -> Result<FactureWithDetails, ServiceError> {
    let (facture, cl) = Facture::find_by_id(id)
        .find_also_related(Client)
        .one(db)
        .await?
        .ok_or_else(|| ServiceError::NotFound("Facture non trouvée".to_string()))?;

    let mut lignes = load_lignes(db, &[facture.id]).await?;
    let advancements = Advancement::find()
        .filter(advancement::Column::FactureId.eq(facture.id))
        .order_by_asc(advancement::Column::PaymentDate)
        .all(db)
        .await?;

    let bl = match facture.bon_livraison_id {
        Some(bl_id) => BonLivraison::find_by_id(bl_id).one(db).await?,
        None => None,
    };

    Ok(build_details(
        facture.clone(),
        cl,
        bl,
        lignes.remove(&facture.id).unwrap_or_default(),
        advancements,
    ))
}

pub async fn next_numero<C>(conn: &C) -> Result<String, ServiceError>
where
    C: ConnectionTrait,
{
    let last = Facture::find()
        .filter(facture::Column::NumFacture.starts_with(PREFIX_FACTURE))
        .order_by_desc(facture::Column::CreatedAt)
        .order_by_desc(facture::Column::Id)
        .one(conn)
        .await?;

    Ok(numbering::next_in_sequence(
        PREFIX_FACTURE,
        last.as_ref().map(|f| f.num_facture.as_str()),
    ))
}

fn derive_payment_fields(
    active: &mut facture::ActiveModel,
    montant_ttc: f64,
    total_paye: f64,
    fallback_status: Option<&str>,
) {
    active.montant_paye = Set(round2(total_paye));
    active.montant_restant = Set(round2((montant_ttc - total_paye).max(0.0)));

    if total_paye >= montant_ttc {
        active.status = Set(FactureStatus::Payee.as_str().to_string());
    } else if total_paye > 0.0 {
        active.status = Set(FactureStatus::PartiellementPayee.as_str().to_string());
    } else if let Some(status) = fallback_status {
        active.status = Set(status.to_string());
    }
}

pub async fn create(
    db: &DatabaseConnection,
    input: CreateFacture,
) -> Result<FactureWithDetails, ServiceError> {
    if input.produits.is_empty() {
        return Err(ServiceError::Validation(
            "Au moins un produit est requis".to_string(),
        ));
    }

    Client::find_by_id(input.client_id)
        .one(db)
        .await?
        .ok_or_else(|| ServiceError::NotFound("Client non trouvé".to_string()))?;

    if let Some(bl_id) = input.bon_livraison_id {
        BonLivraison::find_by_id(bl_id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Bon de livraison non trouvé".to_string()))?;
    }

    let now = Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
    let taux_tva = input.tva.max(0.0);
    let depuis_bl = input.bon_livraison_id.is_some();

    let txn = db.begin().await?;
    let num_facture = next_numero(&txn).await?;

    let mut montant_ht = 0.0;
    let mut verifies = Vec::new();
    for item in &input.produits {
        let produit = Produit::find_by_id(item.produit_id)
            .one(&txn)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Produit {} introuvable", item.produit_id))
            })?;

        // Le stock n'est vérifié et décrémenté que pour une facture autonome
        if !depuis_bl && produit.qty < item.quantite {
            return Err(ServiceError::Validation(format!(
                "Stock insuffisant pour {}. Stock disponible: {}",
                produit.designation, produit.qty
            )));
        }

        let prix_unitaire = item.prix_unitaire.unwrap_or(produit.prix_vente);
        let montant_ht_ligne = round2(prix_unitaire * item.quantite as f64);
        montant_ht += montant_ht_ligne;

        verifies.push((produit, item.clone(), prix_unitaire, montant_ht_ligne));
    }

    let montant_ht = round2(montant_ht.max(0.0));
    let montant_tva = round2(montant_ht * taux_tva / 100.0);
    let montant_ttc = round2(montant_ht + montant_tva);

    let facture = facture::ActiveModel {
        num_facture: Set(num_facture.clone()),
        client_id: Set(input.client_id),
        bon_livraison_id: Set(input.bon_livraison_id),
        devis_id: Set(None),
        date_creation: Set(now.clone()),
        date_facturation: Set(input.date_facturation.clone().unwrap_or_else(|| now.clone())),
        date_echeance: Set(input.date_echeance.clone()),
        mode_reglement: Set(input
            .mode_reglement
            .clone()
            .unwrap_or_else(|| "espèces".to_string())),
        montant_ht: Set(montant_ht),
        montant_ht_initial: Set(montant_ht),
        tva: Set(taux_tva),
        montant_tva: Set(montant_tva),
        montant_ttc: Set(montant_ttc),
        montant_paye: Set(0.0),
        montant_restant: Set(montant_ttc),
        status: Set(FactureStatus::Brouillon.as_str().to_string()),
        notes: Set(input.notes.clone()),
        created_at: Set(now.clone()),
        updated_at: Set(now.clone()),
        ..Default::default()
    };
    let facture = facture.insert(&txn).await?;

    for (produit, item, prix_unitaire, montant_ht_ligne) in verifies {
        let ligne = facture_produit::ActiveModel {
            facture_id: Set(facture.id),
            produit_id: Set(item.produit_id),
            quantite: Set(item.quantite),
            prix_unitaire: Set(prix_unitaire),
            montant_ht_ligne: Set(montant_ht_ligne),
            montant_tva_ligne: Set(round2(montant_ht_ligne * taux_tva / 100.0)),
            total_ligne: Set(montant_ht_ligne),
            description: Set(item.description.clone()),
            ..Default::default()
        };
        ligne.insert(&txn).await?;

        if !depuis_bl {
            stock::apply(&txn, produit, -item.quantite, "facturation", &num_facture).await?;
        }
    }

    if !input.advancements.is_empty() {
        let total = advancements::insert_initial(
            &txn,
            AdvancementLink::Facture(facture.id),
            &input.advancements,
        )
        .await?;

        if total > 0.0 {
            let mut active: facture::ActiveModel = facture.clone().into();
            derive_payment_fields(&mut active, montant_ttc, total, None);
            active.updated_at = Set(now);
            active.update(&txn).await?;
        }
    }

    txn.commit().await?;

    tracing::info!("facture {} créée", num_facture);
    get(db, facture.id).await
}

pub async fn create_from_bon_livraison(
    db: &DatabaseConnection,
    input: CreateFactureFromBonLivraison,
) -> Result<FactureWithDetails, ServiceError> {
    let now = Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
    let txn = db.begin().await?;

    let bon = BonLivraison::find_by_id(input.bon_livraison_id)
        .one(&txn)
        .await?
        .ok_or_else(|| ServiceError::NotFound("Bon de livraison non trouvé".to_string()))?;

    let existante = Facture::find()
        .filter(facture::Column::BonLivraisonId.eq(bon.id))
        .one(&txn)
        .await?;
    if existante.is_some() {
        return Err(ServiceError::Validation(
            "Une facture existe déjà pour ce bon de livraison".to_string(),
        ));
    }

    let num_facture = next_numero(&txn).await?;

    let taux_tva = 20.0;
    let montant_ht = bon.montant_ht;
    let montant_tva = round2(montant_ht * taux_tva / 100.0);
    let montant_ttc = round2(montant_ht + montant_tva);

    let date_echeance = input.date_echeance.clone().unwrap_or_else(|| {
        (Local::now() + Duration::days(30))
            .format("%Y-%m-%d %H:%M:%S")
            .to_string()
    });

    let facture = facture::ActiveModel {
        num_facture: Set(num_facture.clone()),
        client_id: Set(bon.client_id),
        bon_livraison_id: Set(Some(bon.id)),
        devis_id: Set(None),
        date_creation: Set(now.clone()),
        date_facturation: Set(input.date_facturation.clone().unwrap_or_else(|| now.clone())),
        date_echeance: Set(Some(date_echeance)),
        mode_reglement: Set(input
            .mode_reglement
            .clone()
            .unwrap_or_else(|| bon.mode_reglement.clone())),
        montant_ht: Set(montant_ht),
        montant_ht_initial: Set(montant_ht),
        tva: Set(taux_tva),
        montant_tva: Set(montant_tva),
        montant_ttc: Set(montant_ttc),
        montant_paye: Set(0.0),
        montant_restant: Set(montant_ttc),
        status: Set(FactureStatus::Brouillon.as_str().to_string()),
        notes: Set(input.notes.clone().or_else(|| bon.notes.clone())),
        created_at: Set(now.clone()),
        updated_at: Set(now.clone()),
        ..Default::default()
    };
    let facture = facture.insert(&txn).await?;

    // Copie des lignes, sans aucun mouvement de stock: le bon d'origine a
    // déjà décrémenté les quantités
    let lignes = BonLivraisonProduit::find()
        .filter(bon_livraison_produit::Column::BonLivraisonId.eq(bon.id))
        .all(&txn)
        .await?;

    for ligne in &lignes {
        let designation = Produit::find_by_id(ligne.produit_id)
            .one(&txn)
            .await?
            .map(|p| p.designation);

        let copie = facture_produit::ActiveModel {
            facture_id: Set(facture.id),
            produit_id: Set(ligne.produit_id),
            quantite: Set(ligne.quantite),
            prix_unitaire: Set(ligne.prix_unitaire),
            montant_ht_ligne: Set(ligne.total_ligne),
            montant_tva_ligne: Set(round2(ligne.total_ligne * taux_tva / 100.0)),
            total_ligne: Set(round2(ligne.total_ligne * (1.0 + taux_tva / 100.0))),
            description: Set(designation),
            ..Default::default()
        };
        copie.insert(&txn).await?;
    }

    // Transfert des acomptes du bon vers la facture
    let acomptes = Advancement::find()
        .filter(advancement::Column::BonLivraisonId.eq(bon.id))
        .all(&txn)
        .await?;

    let mut total_transfere = 0.0;
    for acompte in acomptes {
        total_transfere += acompte.amount;
        let mut active: advancement::ActiveModel = acompte.into();
        active.facture_id = Set(Some(facture.id));
        active.bon_livraison_id = Set(None);
        active.updated_at = Set(now.clone());
        active.update(&txn).await?;
    }

    if total_transfere > 0.0 {
        let mut active: facture::ActiveModel = facture.clone().into();
        derive_payment_fields(&mut active, montant_ttc, total_transfere, None);
        active.updated_at = Set(now.clone());
        active.update(&txn).await?;
    }

    let mut bon_active: bon_livraison::ActiveModel = bon.into();
    bon_active.is_facture = Set(true);
    bon_active.updated_at = Set(now);
    bon_active.update(&txn).await?;

    txn.commit().await?;

    tracing::info!("facture {} créée depuis un bon de livraison", num_facture);
    get(db, facture.id).await
}

pub async fn update(
    db: &DatabaseConnection,
    id: i32,
    input: UpdateFacture,
) -> Result<FactureWithDetails, ServiceError> {
    let now = Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
    let txn = db.begin().await?;

    let facture = Facture::find_by_id(id)
        .one(&txn)
        .await?
        .ok_or_else(|| ServiceError::NotFound("Facture non trouvée".to_string()))?;

    let old_status = FactureStatus::parse(&facture.status)?;
    if matches!(old_status, FactureStatus::Payee | FactureStatus::Annulee) {
        return Err(ServiceError::Validation(format!(
            "Impossible de modifier une facture {}",
            facture.status
        )));
    }

    let depuis_bl = facture.bon_livraison_id.is_some();
    let mut active: facture::ActiveModel = facture.clone().into();
    let mut montant_ttc = facture.montant_ttc;
    let taux_tva = input.tva.unwrap_or(facture.tva).max(0.0);

    if let Some(produits) = &input.produits {
        if produits.is_empty() {
            return Err(ServiceError::Validation(
                "Au moins un produit est requis".to_string(),
            ));
        }

        let anciennes = FactureProduit::find()
            .filter(facture_produit::Column::FactureId.eq(id))
            .all(&txn)
            .await?;

        if !depuis_bl {
            for ancienne in &anciennes {
                if let Some(produit) = Produit::find_by_id(ancienne.produit_id).one(&txn).await? {
                    stock::apply(
                        &txn,
                        produit,
                        ancienne.quantite,
                        "annulation",
                        &facture.num_facture,
                    )
                    .await?;
                }
            }
        }

        FactureProduit::delete_many()
            .filter(facture_produit::Column::FactureId.eq(id))
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

            if !depuis_bl && produit.qty < item.quantite {
                return Err(ServiceError::Validation(format!(
                    "Stock insuffisant pour {}. Stock disponible: {}",
                    produit.designation, produit.qty
                )));
            }

            let prix_unitaire = item.prix_unitaire.unwrap_or(produit.prix_vente);
            let montant_ht_ligne = round2(prix_unitaire * item.quantite as f64);
            montant_ht += montant_ht_ligne;

            let ligne = facture_produit::ActiveModel {
                facture_id: Set(id),
                produit_id: Set(item.produit_id),
                quantite: Set(item.quantite),
                prix_unitaire: Set(prix_unitaire),
                montant_ht_ligne: Set(montant_ht_ligne),
                montant_tva_ligne: Set(round2(montant_ht_ligne * taux_tva / 100.0)),
                total_ligne: Set(montant_ht_ligne),
                description: Set(item.description.clone()),
                ..Default::default()
            };
            ligne.insert(&txn).await?;

            if !depuis_bl {
                stock::apply(
                    &txn,
                    produit,
                    -item.quantite,
                    "facturation",
                    &facture.num_facture,
                )
                .await?;
            }
        }

        let montant_ht = round2(montant_ht.max(0.0));
        let montant_tva = round2(montant_ht * taux_tva / 100.0);
        montant_ttc = round2(montant_ht + montant_tva);

        active.montant_ht = Set(montant_ht);
        active.montant_ht_initial = Set(montant_ht);
        active.tva = Set(taux_tva);
        active.montant_tva = Set(montant_tva);
        active.montant_ttc = Set(montant_ttc);
        active.montant_restant = Set(round2((montant_ttc - facture.montant_paye).max(0.0)));
    }

    // Le statut explicite, s'il est fourni, doit au moins être connu
    if let Some(status) = &input.status {
        FactureStatus::parse(status)?;
    }

    if let Some(liste) = &input.advancements {
        let total = advancements::reconcile(&txn, AdvancementLink::Facture(id), liste).await?;
        derive_payment_fields(&mut active, montant_ttc, total, input.status.as_deref());
    }

    if let Some(mode) = input.mode_reglement {
        active.mode_reglement = Set(mode);
    }
    if let Some(notes) = input.notes {
        active.notes = Set(Some(notes));
    }
    if let Some(date) = input.date_facturation {
        active.date_facturation = Set(date);
    }
    if let Some(date) = input.date_echeance {
        active.date_echeance = Set(Some(date));
    }
    active.updated_at = Set(now);

    let saved = active.update(&txn).await?;

    if input.advancements.is_none() {
        if let Some(status) = &input.status {
            let to = FactureStatus::parse(status)?;
            apply_status_change(&txn, saved, to).await?;
        }
    }

    txn.commit().await?;
    get(db, id).await
}

async fn apply_status_change<C>(
    conn: &C,
    facture: facture::Model,
    to: FactureStatus,
) -> Result<facture::Model, ServiceError>
where
    C: ConnectionTrait,
{
    let from = FactureStatus::parse(&facture.status)?;
    if from == to {
        return Ok(facture);
    }

    if !from.can_transition_to(to) {
        return Err(ServiceError::Validation(format!(
            "Transition de statut non autorisée: {} → {}",
            from, to
        )));
    }

    let now = Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
    let standalone = facture.bon_livraison_id.is_none();

    if to == FactureStatus::Annulee {
        // Restitution uniquement pour une facture autonome
        if standalone {
            let lignes = FactureProduit::find()
                .filter(facture_produit::Column::FactureId.eq(facture.id))
                .all(conn)
                .await?;

            for ligne in &lignes {
                if let Some(produit) = Produit::find_by_id(ligne.produit_id).one(conn).await? {
                    stock::apply(
                        conn,
                        produit,
                        ligne.quantite,
                        "annulation",
                        &facture.num_facture,
                    )
                    .await?;
                }
            }
        }

        // Les paiements déjà encaissés donnent lieu à un avoir
        if facture.montant_paye > 0.0 {
            let avoir = advancement::ActiveModel {
                amount: Set(facture.montant_paye),
                payment_method: Set("avoir".to_string()),
                payment_date: Set(now.clone()),
                reference: Set(Some(format!("AVOIR-{}", facture.num_facture))),
                notes: Set(Some(format!(
                    "Avoir suite à annulation de la facture {}",
                    facture.num_facture
                ))),
                facture_id: Set(Some(facture.id)),
                bon_livraison_id: Set(None),
                created_at: Set(now.clone()),
                updated_at: Set(now.clone()),
                ..Default::default()
            };
            avoir.insert(conn).await?;
        }

        if let Some(bl_id) = facture.bon_livraison_id {
            if let Some(bon) = BonLivraison::find_by_id(bl_id).one(conn).await? {
                let mut bon_active: bon_livraison::ActiveModel = bon.into();
                bon_active.is_facture = Set(false);
                bon_active.updated_at = Set(now.clone());
                bon_active.update(conn).await?;
            }
        }
    } else if from == FactureStatus::Annulee && standalone {
        let lignes = FactureProduit::find()
            .filter(facture_produit::Column::FactureId.eq(facture.id))
            .all(conn)
            .await?;

        // Revalider le stock avant tout décrément
        for ligne in &lignes {
            let produit = Produit::find_by_id(ligne.produit_id)
                .one(conn)
                .await?
                .ok_or_else(|| {
                    ServiceError::NotFound(format!("Produit {} non trouvé", ligne.produit_id))
                })?;

            if produit.qty < ligne.quantite {
                return Err(ServiceError::Validation(format!(
                    "Stock insuffisant pour {}. Stock disponible: {}",
                    produit.designation, produit.qty
                )));
            }
        }

        for ligne in &lignes {
            if let Some(produit) = Produit::find_by_id(ligne.produit_id).one(conn).await? {
                stock::apply(
                    conn,
                    produit,
                    -ligne.quantite,
                    "facturation",
                    &facture.num_facture,
                )
                .await?;
            }
        }
    }

    let mut active: facture::ActiveModel = facture.into();
    active.status = Set(to.as_str().to_string());
    active.updated_at = Set(now);

    Ok(active.update(conn).await?)
}

pub async fn update_status(
    db: &DatabaseConnection,
    id: i32,
    status: &str,
) -> Result<facture::Model, ServiceError> {
    let to = FactureStatus::parse(status)?;

    let txn = db.begin().await?;
    let facture = Facture::find_by_id(id)
        .one(&txn)
        .await?
        .ok_or_else(|| ServiceError::NotFound("Facture non trouvée".to_string()))?;

    let updated = apply_status_change(&txn, facture, to).await?;
    txn.commit().await?;

    Ok(updated)
}

/// Annulation: restitution du stock pour une facture autonome, avoir pour
/// les paiements encaissés, libération du bon de livraison lié.
pub async fn cancel(db: &DatabaseConnection, id: i32) -> Result<facture::Model, ServiceError> {
    let txn = db.begin().await?;
    let facture = Facture::find_by_id(id)
        .one(&txn)
        .await?
        .ok_or_else(|| ServiceError::NotFound("Facture non trouvée".to_string()))?;

    if facture.status == FactureStatus::Annulee.as_str() {
        return Err(ServiceError::Validation(
            "La facture est déjà annulée".to_string(),
        ));
    }

    let updated = apply_status_change(&txn, facture, FactureStatus::Annulee).await?;
    txn.commit().await?;

    Ok(updated)
}

pub async fn add_payment(
    db: &DatabaseConnection,
    id: i32,
    input: PaymentInput,
) -> Result<FactureWithDetails, ServiceError> {
    if input.amount <= 0.0 {
        return Err(ServiceError::Validation("Montant invalide".to_string()));
    }
    if input.payment_method.trim().is_empty() {
        return Err(ServiceError::Validation(
            "Méthode de paiement requise".to_string(),
        ));
    }

    let now = Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
    let txn = db.begin().await?;

    let facture = Facture::find_by_id(id)
        .one(&txn)
        .await?
        .ok_or_else(|| ServiceError::NotFound("Facture non trouvée".to_string()))?;

    if facture.status == FactureStatus::Annulee.as_str() {
        return Err(ServiceError::Validation(
            "Impossible d'ajouter un paiement à une facture annulée".to_string(),
        ));
    }

    let paiement = advancement::ActiveModel {
        amount: Set(input.amount),
        payment_method: Set(input.payment_method.clone()),
        payment_date: Set(input.payment_date.clone().unwrap_or_else(|| now.clone())),
        reference: Set(input.reference.clone()),
        notes: Set(input.notes.clone()),
        facture_id: Set(Some(id)),
        bon_livraison_id: Set(None),
        created_at: Set(now.clone()),
        updated_at: Set(now.clone()),
        ..Default::default()
    };
    paiement.insert(&txn).await?;

    let total_paye = facture.montant_paye + input.amount;
    let montant_ttc = facture.montant_ttc;

    let mut active: facture::ActiveModel = facture.into();
    derive_payment_fields(&mut active, montant_ttc, total_paye, None);
    active.updated_at = Set(now);
    active.update(&txn).await?;

    txn.commit().await?;
    get(db, id).await
}

pub async fn delete(db: &DatabaseConnection, id: i32) -> Result<(), ServiceError> {
    let txn = db.begin().await?;

    let facture = Facture::find_by_id(id)
        .one(&txn)
        .await?
        .ok_or_else(|| ServiceError::NotFound("Facture non trouvée".to_string()))?;

    let status = FactureStatus::parse(&facture.status)?;
    if matches!(
        status,
        FactureStatus::Payee | FactureStatus::PartiellementPayee
    ) {
        return Err(ServiceError::Validation(
            "Impossible de supprimer une facture avec des paiements".to_string(),
        ));
    }

    // Une facture annulée a déjà restitué son stock à l'annulation
    if facture.bon_livraison_id.is_none() && status != FactureStatus::Annulee {
        let lignes = FactureProduit::find()
            .filter(facture_produit::Column::FactureId.eq(id))
            .all(&txn)
            .await?;

        for ligne in &lignes {
            if let Some(produit) = Produit::find_by_id(ligne.produit_id).one(&txn).await? {
                stock::apply(
                    &txn,
                    produit,
                    ligne.quantite,
                    "annulation",
                    &facture.num_facture,
                )
                .await?;
            }
        }
    }

    FactureProduit::delete_many()
        .filter(facture_produit::Column::FactureId.eq(id))
        .exec(&txn)
        .await?;
    Advancement::delete_many()
        .filter(advancement::Column::FactureId.eq(id))
        .exec(&txn)
        .await?;

    if let Some(bl_id) = facture.bon_livraison_id {
        if let Some(bon) = BonLivraison::find_by_id(bl_id).one(&txn).await? {
            let mut bon_active: bon_livraison::ActiveModel = bon.into();
            bon_active.is_facture = Set(false);
            bon_active.update(&txn).await?;
        }
    }

    Facture::delete_by_id(id).exec(&txn).await?;
    txn.commit().await?;

    tracing::info!("facture {} supprimée", facture.num_facture);
    Ok(())
}

pub async fn stats(
    db: &DatabaseConnection,
    start_date: Option<String>,
    end_date: Option<String>,
) -> Result<FactureStats, ServiceError> {
    let mut condition = Condition::all();
    if let (Some(start), Some(end)) = (&start_date, &end_date) {
        condition = condition
            .add(facture::Column::DateCreation.gte(start.clone()))
            .add(facture::Column::DateCreation.lte(end_of_day(end)));
    }

    #[derive(FromQueryResult)]
    struct Totals {
        total: i64,
        total_ht: Option<f64>,
        total_tva: Option<f64>,
        total_ttc: Option<f64>,
        total_paye: Option<f64>,
        total_restant: Option<f64>,
    }

    let totals = Facture::find()
        .filter(condition.clone())
        .select_only()
        .column_as(facture::Column::Id.count(), "total")
        .column_as(facture::Column::MontantHt.sum(), "total_ht")
        .column_as(facture::Column::MontantTva.sum(), "total_tva")
        .column_as(facture::Column::MontantTtc.sum(), "total_ttc")
        .column_as(facture::Column::MontantPaye.sum(), "total_paye")
        .column_as(facture::Column::MontantRestant.sum(), "total_restant")
        .into_model::<Totals>()
        .one(db)
        .await?;

    let by_status = Facture::find()
        .filter(condition.clone())
        .select_only()
        .column(facture::Column::Status)
        .column_as(facture::Column::Id.count(), "count")
        .column_as(facture::Column::MontantTtc.sum(), "montant_total")
        .group_by(facture::Column::Status)
        .into_model::<StatusStat>()
        .all(db)
        .await?;

    let month_expr = sea_orm::sea_query::Expr::cust("strftime('%Y-%m', date_creation)");
    let by_month = Facture::find()
        .filter(condition)
        .select_only()
        .column_as(month_expr.clone(), "month")
        .column_as(facture::Column::Id.count(), "count")
        .column_as(facture::Column::MontantTtc.sum(), "montant_total")
        .group_by(month_expr.clone())
        .order_by(month_expr, Order::Desc)
        .into_model::<MonthStat>()
        .all(db)
        .await?;

    let totals = totals.unwrap_or(Totals {
        total: 0,
        total_ht: None,
        total_tva: None,
        total_ttc: None,
        total_paye: None,
        total_restant: None,
    });

    Ok(FactureStats {
        total: totals.total,
        total_ht: round2(totals.total_ht.unwrap_or(0.0)),
        total_tva: round2(totals.total_tva.unwrap_or(0.0)),
        total_ttc: round2(totals.total_ttc.unwrap_or(0.0)),
        total_paye: round2(totals.total_paye.unwrap_or(0.0)),
        total_restant: round2(totals.total_restant.unwrap_or(0.0)),
        by_status,
        by_month,
    })
}
