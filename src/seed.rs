use chrono::Local;
use sea_orm::*;

use crate::models::{client, fornisseur, produit};

/// Jeu de données de démonstration, activé par SEED_DEMO=1.
pub async fn seed_demo_data(db: &DatabaseConnection) -> Result<(), DbErr> {
    let now = Local::now().format("%Y-%m-%d %H:%M:%S").to_string();

    let clients = vec![
        ("Société Atlas Négoce", "CL-001", "Casablanca", "0661234501"),
        ("Ets Benali & Fils", "CL-002", "Rabat", "0661234502"),
        ("Comptoir du Sud", "CL-003", "Agadir", "0661234503"),
    ];

    for (nom, reference, ville, telephone) in clients {
        let row = client::ActiveModel {
            nom_complete: Set(nom.to_owned()),
            reference: Set(Some(reference.to_owned())),
            ville: Set(Some(ville.to_owned())),
            address: Set(None),
            telephone: Set(Some(telephone.to_owned())),
            created_at: Set(now.clone()),
            updated_at: Set(now.clone()),
            ..Default::default()
        };
        client::Entity::insert(row)
            .on_conflict(
                sea_orm::sea_query::OnConflict::column(client::Column::Telephone)
                    .do_nothing()
                    .to_owned(),
            )
            .exec(db)
            .await
            .ok();
    }

    let fornisseur_row = fornisseur::ActiveModel {
        nom_complete: Set("Grossiste Marbre & Co".to_owned()),
        ville: Set(Some("Casablanca".to_owned())),
        address: Set(Some("Zone industrielle Ain Sebaâ".to_owned())),
        telephone: Set("0522987601".to_owned()),
        reference: Set(Some("FOUR-001".to_owned())),
        created_at: Set(now.clone()),
        updated_at: Set(now.clone()),
        ..Default::default()
    };
    let fornisseur_id = match fornisseur::Entity::insert(fornisseur_row)
        .on_conflict(
            sea_orm::sea_query::OnConflict::column(fornisseur::Column::Telephone)
                .do_nothing()
                .to_owned(),
        )
        .exec(db)
        .await
    {
        Ok(res) => Some(res.last_insert_id),
        Err(_) => None,
    };

    let produits = vec![
        ("P-0001", "Carrelage 60x60 gris", 120, 85.0, 129.0),
        ("P-0002", "Ciment colle sac 25kg", 300, 42.0, 65.0),
        ("P-0003", "Plinthe assortie ml", 80, 12.0, 22.0),
    ];

    for (reference, designation, qty, prix_achat, prix_vente) in produits {
        let row = produit::ActiveModel {
            reference: Set(reference.to_owned()),
            designation: Set(designation.to_owned()),
            observation: Set(None),
            qty: Set(qty),
            prix_achat: Set(prix_achat),
            prix_vente: Set(prix_vente),
            fornisseur_id: Set(fornisseur_id),
            created_at: Set(now.clone()),
            updated_at: Set(now.clone()),
            ..Default::default()
        };
        produit::Entity::insert(row)
            .on_conflict(
                sea_orm::sea_query::OnConflict::column(produit::Column::Reference)
                    .do_nothing()
                    .to_owned(),
            )
            .exec(db)
            .await
            .ok();
    }

    Ok(())
}
