//! Devis: aucun effet sur le stock tant qu'ils ne sont pas transformés.
//! La transformation en facture ou en bon de livraison recopie les lignes,
//! recalcule la TVA et décrémente le stock une seule fois sur la chaîne.

use chrono::{Duration, Local};
use sea_orm::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::domain::status::{BonLivraisonStatus, DevisStatus, FactureStatus};
use crate::domain::ServiceError;
use crate::models::bon_livraison;
use crate::models::bon_livraison_produit;
use crate::models::client::{self, Entity as Client};
use crate::models::devis::{self, Entity as Devis};
use crate::models::devis_produit::{self, Entity as DevisProduit};
use crate::models::facture;
use crate::models::facture_produit;
use crate::models::produit::{self, Entity as Produit};
use crate::services::numbering::{self, PREFIX_DEVIS};
use crate::services::{bon_livraison_service, end_of_day, facture_service, round2, stock};

#[derive(Debug, Default, Clone, Deserialize)]
pub struct DevisFilter {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub status: Option<String>,
    pub client_id: Option<i32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LigneDevisInput {
    pub produit_id: i32,
    pub quantite: i32,
    pub prix_unitaire: Option<f64>,
    pub description: Option<String>,
    pub unite: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateDevis {
    pub client_id: i32,
    pub produits: Vec<LigneDevisInput>,
    pub mode_reglement: Option<String>,
    pub notes: Option<String>,
    pub date_creation: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateDevis {
    pub produits: Option<Vec<LigneDevisInput>>,
    pub mode_reglement: Option<String>,
    pub notes: Option<String>,
    pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ConvertDevisInput {
    pub mode_reglement: Option<String>,
    pub notes: Option<String>,
    pub date_livraison: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct LigneDevis {
    pub produit_id: i32,
    pub reference: String,
    pub designation: String,
    pub quantite: i32,
    pub prix_unitaire: f64,
    pub total_ligne: f64,
    pub description: Option<String>,
    pub unite: String,
}

#[derive(Debug, Serialize)]
pub struct DevisWithDetails {
    #[serde(flatten)]
    pub devis: devis::Model,
    pub client: Option<client::Model>,
    pub produits: Vec<LigneDevis>,
}

/// Document créé lors d'une transformation, renvoyé au client HTTP pour
/// qu'il puisse naviguer vers la facture ou le bon généré.
#[derive(Debug, Serialize)]
pub struct CreatedEntity {
    pub r#type: &'static str,
    pub id: i32,
    pub num: String,
}

#[derive(Debug, FromQueryResult, Serialize)]
pub struct StatusStat {
    pub status: String,
    pub count: i64,
    pub total_montant: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct DevisStats {
    pub total: i64,
    pub total_montant: f64,
    pub by_status: Vec<StatusStat>,
    pub accepted_count: i64,
    pub accepted_montant: f64,
}

async fn load_lignes<C>(
    conn: &C,
    devis_ids: &[i32],
) -> Result<HashMap<i32, Vec<LigneDevis>>, ServiceError>
where
    C: ConnectionTrait,
{
    let mut map: HashMap<i32, Vec<LigneDevis>> = HashMap::new();

    if devis_ids.is_empty() {
        return Ok(map);
    }

    let lignes = DevisProduit::find()
        .filter(devis_produit::Column::DevisId.is_in(devis_ids.to_vec()))
        .find_also_related(Produit)
        .all(conn)
        .await?;

    for (ligne, produit) in lignes {
        let (reference, designation) = produit
            .map(|p| (p.reference, p.designation))
            .unwrap_or_else(|| ("?".to_string(), "Produit supprimé".to_string()));

        map.entry(ligne.devis_id).or_default().push(LigneDevis {
            produit_id: ligne.produit_id,
            reference,
            designation,
            quantite: ligne.quantite,
            prix_unitaire: ligne.prix_unitaire,
            total_ligne: ligne.total_ligne,
            description: ligne.description,
            unite: ligne.unite,
        });
    }

    Ok(map)
}

pub async fn list(
    db: &DatabaseConnection,
    filter: DevisFilter,
) -> Result<Vec<DevisWithDetails>, ServiceError> {
    let mut condition = Condition::all();

    if let (Some(start), Some(end)) = (&filter.start_date, &filter.end_date) {
        condition = condition
            .add(devis::Column::DateCreation.gte(start.clone()))
            .add(devis::Column::DateCreation.lte(end_of_day(end)));
    }
    if let Some(status) = &filter.status {
        if status != "all" {
            condition = condition.add(devis::Column::Status.eq(status.clone()));
        }
    }
    if let Some(client_id) = filter.client_id {
        condition = condition.add(devis::Column::ClientId.eq(client_id));
    }

    let rows = Devis::find()
        .filter(condition)
        .order_by_desc(devis::Column::DateCreation)
        .find_also_related(Client)
        .all(db)
        .await?;

    let ids: Vec<i32> = rows.iter().map(|(d, _)| d.id).collect();
    let mut lignes = load_lignes(db, &ids).await?;

    Ok(rows
        .into_iter()
        .map(|(d, cl)| {
            let produits = lignes.remove(&d.id).unwrap_or_default();
            DevisWithDetails {
                devis: d,
                client: cl,
                produits,
            }
        })
        .collect())
}

pub async fn get(db: &DatabaseConnection, id: i32) -> Result<DevisWithDetails, ServiceError> {
    let (devis, cl) = Devis::find_by_id(id)
        .find_also_related(Client)
        .one(db)
        .await?
        .ok_or_else(|| ServiceError::NotFound("Devis non trouvé".to_string()))?;

    let mut lignes = load_lignes(db, &[devis.id]).await?;

    Ok(DevisWithDetails {
        produits: lignes.remove(&devis.id).unwrap_or_default(),
        devis,
        client: cl,
    })
}

async fn next_numero<C>(conn: &C) -> Result<String, ServiceError>
where
    C: ConnectionTrait,
{
    let last = Devis::find()
        .filter(devis::Column::NumDevis.starts_with(PREFIX_DEVIS))
        .order_by_desc(devis::Column::CreatedAt)
        .order_by_desc(devis::Column::Id)
        .one(conn)
        .await?;

    Ok(numbering::next_in_sequence(
        PREFIX_DEVIS,
        last.as_ref().map(|d| d.num_devis.as_str()),
    ))
}

pub async fn create(
    db: &DatabaseConnection,
    input: CreateDevis,
) -> Result<DevisWithDetails, ServiceError> {
    if input.produits.is_empty() {
        return Err(ServiceError::Validation(
            "Au moins un produit est requis".to_string(),
        ));
    }

    Client::find_by_id(input.client_id)
        .one(db)
        .await?
        .ok_or_else(|| ServiceError::NotFound("Client non trouvé".to_string()))?;

    let now = Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
    let txn = db.begin().await?;

    let num_devis = next_numero(&txn).await?;

    // Pas de contrôle de stock: un devis n'engage aucune quantité
    let mut montant_ht = 0.0;
    let mut verifies = Vec::new();
    for item in &input.produits {
        let produit = Produit::find_by_id(item.produit_id)
            .one(&txn)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Produit {} non trouvé", item.produit_id))
            })?;

        let prix_unitaire = item.prix_unitaire.unwrap_or(produit.prix_vente);
        let total_ligne = round2(prix_unitaire * item.quantite as f64);
        montant_ht += total_ligne;

        verifies.push((item.clone(), prix_unitaire, total_ligne));
    }

    let montant_ht = round2(montant_ht.max(0.0));

    let devis = devis::ActiveModel {
        num_devis: Set(num_devis.clone()),
        client_id: Set(input.client_id),
        date_creation: Set(input.date_creation.clone().unwrap_or_else(|| now.clone())),
        date_acceptation: Set(None),
        mode_reglement: Set(input
            .mode_reglement
            .clone()
            .unwrap_or_else(|| "espèces".to_string())),
        remise: Set(0.0),
        montant_ht: Set(montant_ht),
        montant_ttc: Set(montant_ht),
        status: Set(DevisStatus::Brouillon.as_str().to_string()),
        notes: Set(input.notes.clone()),
        created_at: Set(now.clone()),
        updated_at: Set(now),
        ..Default::default()
    };
    let devis = devis.insert(&txn).await?;

    for (item, prix_unitaire, total_ligne) in verifies {
        let ligne = devis_produit::ActiveModel {
            devis_id: Set(devis.id),
            produit_id: Set(item.produit_id),
            quantite: Set(item.quantite),
            prix_unitaire: Set(prix_unitaire),
            total_ligne: Set(total_ligne),
            description: Set(item.description.clone()),
            unite: Set(item.unite.clone().unwrap_or_else(|| "unité".to_string())),
            ..Default::default()
        };
        ligne.insert(&txn).await?;
    }

    txn.commit().await?;

    tracing::info!("devis {} créé", num_devis);
    get(db, devis.id).await
}

/// Crée une facture à partir d'un devis, au sein de la transaction de
/// l'appelant. Vérifie le stock, recopie les lignes et décrémente.
async fn create_facture_from_devis<C>(
    conn: &C,
    devis: &devis::Model,
) -> Result<facture::Model, ServiceError>
where
    C: ConnectionTrait,
{
    let lignes = DevisProduit::find()
        .filter(devis_produit::Column::DevisId.eq(devis.id))
        .all(conn)
        .await?;

    // Revalider tout le stock avant la moindre écriture
    let mut produits: Vec<(devis_produit::Model, produit::Model)> = Vec::new();
    for ligne in lignes {
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

        produits.push((ligne, produit));
    }

    let num_facture = facture_service::next_numero(conn).await?;
    let now = Local::now().format("%Y-%m-%d %H:%M:%S").to_string();

    let taux_tva = 20.0;
    let mut total_ht = 0.0;
    for (ligne, _) in &produits {
        total_ht += round2(ligne.prix_unitaire * ligne.quantite as f64);
    }
    let total_ht = round2(total_ht.max(0.0));
    let montant_tva = round2(total_ht * taux_tva / 100.0);
    let montant_ttc = round2(total_ht + montant_tva);

    let date_echeance = (Local::now() + Duration::days(30))
        .format("%Y-%m-%d %H:%M:%S")
        .to_string();

    let facture = facture::ActiveModel {
        num_facture: Set(num_facture.clone()),
        client_id: Set(devis.client_id),
        bon_livraison_id: Set(None),
        devis_id: Set(Some(devis.id)),
        date_creation: Set(now.clone()),
        date_facturation: Set(now.clone()),
        date_echeance: Set(Some(date_echeance)),
        mode_reglement: Set(devis.mode_reglement.clone()),
        montant_ht: Set(total_ht),
        montant_ht_initial: Set(total_ht),
        tva: Set(taux_tva),
        montant_tva: Set(montant_tva),
        montant_ttc: Set(montant_ttc),
        montant_paye: Set(0.0),
        montant_restant: Set(montant_ttc),
        status: Set(FactureStatus::Brouillon.as_str().to_string()),
        notes: Set(Some(format!("Créé à partir du devis {}", devis.num_devis))),
        created_at: Set(now.clone()),
        updated_at: Set(now),
        ..Default::default()
    };
    let facture = facture.insert(conn).await?;

    for (ligne, produit) in produits {
        let montant_ht_ligne = round2(ligne.prix_unitaire * ligne.quantite as f64);

        // TVA calculée au niveau du total, pas par ligne
        let copie = facture_produit::ActiveModel {
            facture_id: Set(facture.id),
            produit_id: Set(ligne.produit_id),
            quantite: Set(ligne.quantite),
            prix_unitaire: Set(ligne.prix_unitaire),
            montant_ht_ligne: Set(montant_ht_ligne),
            montant_tva_ligne: Set(0.0),
            total_ligne: Set(montant_ht_ligne),
            description: Set(ligne.description.clone()),
            ..Default::default()
        };
        copie.insert(conn).await?;

        stock::apply(conn, produit, -ligne.quantite, "facturation", &num_facture).await?;
    }

    tracing::info!(
        "facture {} créée à partir du devis {}",
        num_facture,
        devis.num_devis
    );
    Ok(facture)
}

/// Crée un bon de livraison à partir d'un devis, au sein de la transaction
/// de l'appelant.
async fn create_bon_livraison_from_devis<C>(
    conn: &C,
    devis: &devis::Model,
    input: Option<&ConvertDevisInput>,
) -> Result<bon_livraison::Model, ServiceError>
where
    C: ConnectionTrait,
{
    let lignes = DevisProduit::find()
        .filter(devis_produit::Column::DevisId.eq(devis.id))
        .all(conn)
        .await?;

    let mut produits: Vec<(devis_produit::Model, produit::Model)> = Vec::new();
    for ligne in lignes {
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

        produits.push((ligne, produit));
    }

    let num_bon_livraison = bon_livraison_service::next_numero(conn).await?;
    let now = Local::now().format("%Y-%m-%d %H:%M:%S").to_string();

    let mode_reglement = input
        .and_then(|i| i.mode_reglement.clone())
        .unwrap_or_else(|| devis.mode_reglement.clone());
    let notes = input
        .and_then(|i| i.notes.clone())
        .or_else(|| devis.notes.clone())
        .unwrap_or_else(|| format!("Créé à partir du devis {}", devis.num_devis));
    let date_livraison = input
        .and_then(|i| i.date_livraison.clone())
        .unwrap_or_else(|| now.clone());

    let bon = bon_livraison::ActiveModel {
        num_bon_livraison: Set(num_bon_livraison.clone()),
        client_id: Set(devis.client_id),
        devis_id: Set(Some(devis.id)),
        date_creation: Set(now.clone()),
        date_livraison: Set(Some(date_livraison)),
        mode_reglement: Set(mode_reglement),
        remise: Set(0.0),
        tva: Set(0.0),
        montant_ht: Set(devis.montant_ht),
        montant_ttc: Set(devis.montant_ttc),
        montant_restant: Set(devis.montant_ttc),
        status: Set(BonLivraisonStatus::Brouillon.as_str().to_string()),
        notes: Set(Some(notes)),
        is_facture: Set(false),
        created_at: Set(now.clone()),
        updated_at: Set(now),
        ..Default::default()
    };
    let bon = bon.insert(conn).await?;

    for (ligne, produit) in produits {
        let copie = bon_livraison_produit::ActiveModel {
            bon_livraison_id: Set(bon.id),
            produit_id: Set(ligne.produit_id),
            quantite: Set(ligne.quantite),
            prix_unitaire: Set(ligne.prix_unitaire),
            total_ligne: Set(ligne.total_ligne),
            ..Default::default()
        };
        copie.insert(conn).await?;

        stock::apply(
            conn,
            produit,
            -ligne.quantite,
            "livraison",
            &num_bon_livraison,
        )
        .await?;
    }

    tracing::info!(
        "bon de livraison {} créé à partir du devis {}",
        num_bon_livraison,
        devis.num_devis
    );
    Ok(bon)
}

pub async fn update(
    db: &DatabaseConnection,
    id: i32,
    input: UpdateDevis,
) -> Result<(DevisWithDetails, Option<CreatedEntity>), ServiceError> {
    let now = Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
    let txn = db.begin().await?;

    let devis = Devis::find_by_id(id)
        .one(&txn)
        .await?
        .ok_or_else(|| ServiceError::NotFound("Devis non trouvé".to_string()))?;

    let old_status = DevisStatus::parse(&devis.status)?;
    let mut active: devis::ActiveModel = devis.clone().into();

    if let Some(produits) = &input.produits {
        if produits.is_empty() {
            return Err(ServiceError::Validation(
                "Au moins un produit est requis".to_string(),
            ));
        }

        DevisProduit::delete_many()
            .filter(devis_produit::Column::DevisId.eq(id))
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

            let prix_unitaire = item.prix_unitaire.unwrap_or(produit.prix_vente);
            let total_ligne = round2(prix_unitaire * item.quantite as f64);
            montant_ht += total_ligne;

            let ligne = devis_produit::ActiveModel {
                devis_id: Set(id),
                produit_id: Set(item.produit_id),
                quantite: Set(item.quantite),
                prix_unitaire: Set(prix_unitaire),
                total_ligne: Set(total_ligne),
                description: Set(item.description.clone()),
                unite: Set(item.unite.clone().unwrap_or_else(|| "unité".to_string())),
                ..Default::default()
            };
            ligne.insert(&txn).await?;
        }

        let montant_ht = round2(montant_ht.max(0.0));
        active.montant_ht = Set(montant_ht);
        active.montant_ttc = Set(montant_ht);
    }

    if let Some(mode) = input.mode_reglement {
        active.mode_reglement = Set(mode);
    }
    if let Some(notes) = input.notes {
        active.notes = Set(Some(notes));
    }

    let mut created: Option<CreatedEntity> = None;
    if let Some(status) = &input.status {
        let to = DevisStatus::parse(status)?;

        if to != old_status {
            if !old_status.can_transition_to(to) {
                return Err(ServiceError::Validation(format!(
                    "Transition de statut non autorisée: {} → {}",
                    old_status, to
                )));
            }

            active.status = Set(to.as_str().to_string());
            if to == DevisStatus::Accepte {
                active.date_acceptation = Set(Some(now.clone()));
            }

            match to {
                DevisStatus::TransformeEnFacture => {
                    let facture = create_facture_from_devis(&txn, &devis).await?;
                    created = Some(CreatedEntity {
                        r#type: "facture",
                        id: facture.id,
                        num: facture.num_facture,
                    });
                }
                DevisStatus::TransformeEnBl => {
                    let bon = create_bon_livraison_from_devis(&txn, &devis, None).await?;
                    created = Some(CreatedEntity {
                        r#type: "bon_livraison",
                        id: bon.id,
                        num: bon.num_bon_livraison,
                    });
                }
                _ => {}
            }
        }
    }

    active.updated_at = Set(now);
    active.update(&txn).await?;
    txn.commit().await?;

    Ok((get(db, id).await?, created))
}

pub async fn update_status(
    db: &DatabaseConnection,
    id: i32,
    status: &str,
) -> Result<devis::Model, ServiceError> {
    let to = DevisStatus::parse(status)?;
    let now = Local::now().format("%Y-%m-%d %H:%M:%S").to_string();

    let devis = Devis::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| ServiceError::NotFound("Devis non trouvé".to_string()))?;

    let from = DevisStatus::parse(&devis.status)?;
    if from == to {
        return Ok(devis);
    }
    if !from.can_transition_to(to) {
        return Err(ServiceError::Validation(format!(
            "Transition de statut non autorisée: {} → {}",
            from, to
        )));
    }

    let mut active: devis::ActiveModel = devis.into();
    active.status = Set(to.as_str().to_string());
    if to == DevisStatus::Accepte {
        active.date_acceptation = Set(Some(now.clone()));
    }
    active.updated_at = Set(now);

    Ok(active.update(db).await?)
}

/// Transformation directe d'un devis en bon de livraison.
pub async fn convert_to_bon_livraison(
    db: &DatabaseConnection,
    id: i32,
    input: ConvertDevisInput,
) -> Result<(bon_livraison::Model, devis::Model), ServiceError> {
    let now = Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
    let txn = db.begin().await?;

    let devis = Devis::find_by_id(id)
        .one(&txn)
        .await?
        .ok_or_else(|| ServiceError::NotFound("Devis non trouvé".to_string()))?;

    let status = DevisStatus::parse(&devis.status)?;
    if !status.is_convertible() {
        return Err(ServiceError::Validation(format!(
            "Impossible de transformer un devis {}",
            devis.status
        )));
    }

    let bon = create_bon_livraison_from_devis(&txn, &devis, Some(&input)).await?;

    let mut active: devis::ActiveModel = devis.into();
    active.status = Set(DevisStatus::TransformeEnCommande.as_str().to_string());
    active.updated_at = Set(now);
    let devis = active.update(&txn).await?;

    txn.commit().await?;
    Ok((bon, devis))
}

/// Transformation directe d'un devis en facture.
pub async fn convert_to_facture(
    db: &DatabaseConnection,
    id: i32,
) -> Result<(facture::Model, devis::Model), ServiceError> {
    let now = Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
    let txn = db.begin().await?;

    let devis = Devis::find_by_id(id)
        .one(&txn)
        .await?
        .ok_or_else(|| ServiceError::NotFound("Devis non trouvé".to_string()))?;

    let status = DevisStatus::parse(&devis.status)?;
    if !status.is_convertible() {
        return Err(ServiceError::Validation(format!(
            "Impossible de transformer un devis {}",
            devis.status
        )));
    }

    let facture = create_facture_from_devis(&txn, &devis).await?;

    let mut active: devis::ActiveModel = devis.into();
    active.status = Set(DevisStatus::TransformeEnFacture.as_str().to_string());
    active.updated_at = Set(now);
    let devis = active.update(&txn).await?;

    txn.commit().await?;
    Ok((facture, devis))
}

pub async fn delete(db: &DatabaseConnection, id: i32) -> Result<(), ServiceError> {
    let txn = db.begin().await?;

    let devis = Devis::find_by_id(id)
        .one(&txn)
        .await?
        .ok_or_else(|| ServiceError::NotFound("Devis non trouvé".to_string()))?;

    let status = DevisStatus::parse(&devis.status)?;
    if matches!(
        status,
        DevisStatus::Accepte
            | DevisStatus::TransformeEnCommande
            | DevisStatus::TransformeEnFacture
            | DevisStatus::TransformeEnBl
    ) {
        return Err(ServiceError::Validation(format!(
            "Impossible de supprimer un devis {}",
            devis.status
        )));
    }

    DevisProduit::delete_many()
        .filter(devis_produit::Column::DevisId.eq(id))
        .exec(&txn)
        .await?;
    Devis::delete_by_id(id).exec(&txn).await?;

    txn.commit().await?;
    Ok(())
}

pub async fn stats(
    db: &DatabaseConnection,
    start_date: Option<String>,
    end_date: Option<String>,
) -> Result<DevisStats, ServiceError> {
    let mut condition = Condition::all();
    if let (Some(start), Some(end)) = (&start_date, &end_date) {
        condition = condition
            .add(devis::Column::DateCreation.gte(start.clone()))
            .add(devis::Column::DateCreation.lte(end_of_day(end)));
    }

    let by_status = Devis::find()
        .filter(condition.clone())
        .select_only()
        .column(devis::Column::Status)
        .column_as(devis::Column::Id.count(), "count")
        .column_as(devis::Column::MontantTtc.sum(), "total_montant")
        .group_by(devis::Column::Status)
        .into_model::<StatusStat>()
        .all(db)
        .await?;

    let total = by_status.iter().map(|s| s.count).sum();
    let total_montant = by_status.iter().filter_map(|s| s.total_montant).sum();

    let accepted = by_status
        .iter()
        .find(|s| s.status == DevisStatus::Accepte.as_str());

    Ok(DevisStats {
        total,
        total_montant: round2(total_montant),
        accepted_count: accepted.map(|s| s.count).unwrap_or(0),
        accepted_montant: round2(accepted.and_then(|s| s.total_montant).unwrap_or(0.0)),
        by_status,
    })
}
