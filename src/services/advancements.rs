//! Acomptes: validation et réconciliation d'une liste entrante contre les
//! lignes persistées (mise à jour par id, insertion des nouveaux,
//! suppression des absents). Même logique pour factures et bons de
//! livraison, seule la clé de rattachement change.

use chrono::Local;
use sea_orm::{ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, Set};
use serde::Deserialize;
use std::collections::HashMap;

use crate::domain::ServiceError;
use crate::models::advancement::{self, Entity as Advancement};

#[derive(Debug, Clone, Deserialize)]
pub struct AdvancementInput {
    pub id: Option<i32>,
    pub amount: f64,
    pub payment_date: Option<String>,
    pub payment_method: String,
    pub reference: Option<String>,
    pub notes: Option<String>,
}

#[derive(Clone, Copy)]
pub enum AdvancementLink {
    Facture(i32),
    BonLivraison(i32),
}

fn validate(input: &AdvancementInput) -> Result<(), ServiceError> {
    if input.amount <= 0.0 {
        return Err(ServiceError::Validation(
            "Le montant d'acompte doit être positif".to_string(),
        ));
    }
    if input.payment_method.trim().is_empty() {
        return Err(ServiceError::Validation(
            "Méthode de paiement requise pour les acomptes".to_string(),
        ));
    }
    Ok(())
}

/// Insère des acomptes initiaux pour un document fraîchement créé.
/// Retourne le total encaissé.
pub async fn insert_initial<C>(
    conn: &C,
    link: AdvancementLink,
    inputs: &[AdvancementInput],
) -> Result<f64, ServiceError>
where
    C: ConnectionTrait,
{
    let now = Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
    let mut total = 0.0;

    for input in inputs {
        validate(input)?;

        let mut row = advancement::ActiveModel {
            amount: Set(input.amount),
            payment_date: Set(input.payment_date.clone().unwrap_or_else(|| now.clone())),
            payment_method: Set(input.payment_method.clone()),
            reference: Set(input.reference.clone()),
            notes: Set(input.notes.clone()),
            created_at: Set(now.clone()),
            updated_at: Set(now.clone()),
            ..Default::default()
        };
        match link {
            AdvancementLink::Facture(id) => row.facture_id = Set(Some(id)),
            AdvancementLink::BonLivraison(id) => row.bon_livraison_id = Set(Some(id)),
        }
        row.insert(conn).await?;

        total += input.amount;
    }

    Ok(total)
}

/// Réconcilie les acomptes persistés avec la liste entrante et retourne
/// le nouveau total encaissé.
pub async fn reconcile<C>(
    conn: &C,
    link: AdvancementLink,
    inputs: &[AdvancementInput],
) -> Result<f64, ServiceError>
where
    C: ConnectionTrait,
{
    let now = Local::now().format("%Y-%m-%d %H:%M:%S").to_string();

    let existing = match link {
        AdvancementLink::Facture(id) => {
            Advancement::find()
                .filter(advancement::Column::FactureId.eq(id))
                .all(conn)
                .await?
        }
        AdvancementLink::BonLivraison(id) => {
            Advancement::find()
                .filter(advancement::Column::BonLivraisonId.eq(id))
                .all(conn)
                .await?
        }
    };

    let mut remaining: HashMap<i32, advancement::Model> =
        existing.into_iter().map(|a| (a.id, a)).collect();
    let mut total = 0.0;

    for input in inputs {
        validate(input)?;

        match input.id.and_then(|id| remaining.remove(&id)) {
            Some(current) => {
                let mut active: advancement::ActiveModel = current.into();
                active.amount = Set(input.amount);
                if let Some(date) = &input.payment_date {
                    active.payment_date = Set(date.clone());
                }
                active.payment_method = Set(input.payment_method.clone());
                active.reference = Set(input.reference.clone());
                active.notes = Set(input.notes.clone());
                active.updated_at = Set(now.clone());
                active.update(conn).await?;
            }
            None => {
                insert_initial(conn, link, std::slice::from_ref(input)).await?;
            }
        }

        total += input.amount;
    }

    // Les acomptes absents de la liste entrante sont supprimés
    for (_, orphan) in remaining {
        Advancement::delete_by_id(orphan.id).exec(conn).await?;
    }

    Ok(total)
}

pub fn total_amount(advancements: &[advancement::Model]) -> f64 {
    advancements.iter().map(|a| a.amount).sum()
}
