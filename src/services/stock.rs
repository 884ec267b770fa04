//! Journal de stock: toute mutation de `produits.qty` passe par ici.
//!
//! Chaque mouvement insère une ligne signée dans `mouvements_stock` et met
//! à jour le compteur matérialisé du produit dans la même transaction. La
//! symétrie création/annulation/suppression des documents devient une
//! propriété des écritures du journal plutôt que de l'arithmétique
//! dispersée dans les services.

use chrono::Local;
use sea_orm::{ActiveModelTrait, ConnectionTrait, Set};

use crate::domain::ServiceError;
use crate::models::{mouvement_stock, produit};

/// Applique un delta signé au stock d'un produit. Refuse un stock final
/// négatif avec le message d'insuffisance standard.
pub async fn apply<C>(
    conn: &C,
    produit: produit::Model,
    delta: i32,
    type_mouvement: &str,
    reference: &str,
) -> Result<produit::Model, ServiceError>
where
    C: ConnectionTrait,
{
    let avant = produit.qty;
    let apres = avant + delta;

    if apres < 0 {
        return Err(ServiceError::Validation(format!(
            "Stock insuffisant pour {}. Stock disponible: {}",
            produit.designation, avant
        )));
    }

    record(conn, produit, delta, apres, type_mouvement, reference).await
}

/// Variante bornée à zéro: le stock ne devient jamais négatif, le delta
/// réellement appliqué est celui journalisé.
pub async fn apply_clamped<C>(
    conn: &C,
    produit: produit::Model,
    delta: i32,
    type_mouvement: &str,
    reference: &str,
) -> Result<produit::Model, ServiceError>
where
    C: ConnectionTrait,
{
    let apres = (produit.qty + delta).max(0);
    let applied = apres - produit.qty;
    record(conn, produit, applied, apres, type_mouvement, reference).await
}

async fn record<C>(
    conn: &C,
    produit: produit::Model,
    delta: i32,
    apres: i32,
    type_mouvement: &str,
    reference: &str,
) -> Result<produit::Model, ServiceError>
where
    C: ConnectionTrait,
{
    let now = Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
    let avant = produit.qty;

    let mouvement = mouvement_stock::ActiveModel {
        produit_id: Set(produit.id),
        type_mouvement: Set(type_mouvement.to_owned()),
        quantite: Set(delta),
        quantite_avant: Set(avant),
        quantite_apres: Set(apres),
        reference: Set(reference.to_owned()),
        notes: Set(None),
        created_at: Set(now.clone()),
        ..Default::default()
    };
    mouvement.insert(conn).await?;

    let mut produit_active: produit::ActiveModel = produit.into();
    produit_active.qty = Set(apres);
    produit_active.updated_at = Set(now);
    let updated = produit_active.update(conn).await?;

    tracing::debug!(
        "mouvement stock {} {}: {} -> {} ({})",
        type_mouvement,
        reference,
        avant,
        apres,
        delta
    );

    Ok(updated)
}
