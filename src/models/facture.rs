use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "factures")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique)]
    pub num_facture: String,
    pub client_id: i32,
    /// Présent quand la facture est issue d'un bon de livraison: dans ce cas
    /// le stock a déjà été décrémenté par le bon, jamais par la facture.
    pub bon_livraison_id: Option<i32>,
    pub devis_id: Option<i32>,
    pub date_creation: String,
    pub date_facturation: String,
    pub date_echeance: Option<String>,
    pub mode_reglement: String,
    pub montant_ht: f64,
    pub montant_ht_initial: f64,
    /// Taux de TVA en pourcentage
    pub tva: f64,
    pub montant_tva: f64,
    pub montant_ttc: f64,
    pub montant_paye: f64,
    pub montant_restant: f64,
    pub status: String,
    pub notes: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::client::Entity",
        from = "Column::ClientId",
        to = "super::client::Column::Id",
        on_update = "Cascade",
        on_delete = "Cascade"
    )]
    Client,
    #[sea_orm(
        belongs_to = "super::bon_livraison::Entity",
        from = "Column::BonLivraisonId",
        to = "super::bon_livraison::Column::Id",
        on_update = "Cascade",
        on_delete = "SetNull"
    )]
    BonLivraison,
    #[sea_orm(has_many = "super::facture_produit::Entity")]
    FactureProduit,
    #[sea_orm(has_many = "super::advancement::Entity")]
    Advancement,
}

impl Related<super::client::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Client.def()
    }
}

impl Related<super::bon_livraison::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::BonLivraison.def()
    }
}

impl Related<super::facture_produit::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::FactureProduit.def()
    }
}

impl Related<super::advancement::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Advancement.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
