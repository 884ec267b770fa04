use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "bon_livraisons")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique)]
    pub num_bon_livraison: String,
    pub client_id: i32,
    pub devis_id: Option<i32>,
    pub date_creation: String,
    pub date_livraison: Option<String>,
    pub mode_reglement: String,
    pub remise: f64,
    pub tva: f64,
    pub montant_ht: f64,
    pub montant_ttc: f64,
    pub montant_restant: f64,
    pub status: String,
    pub notes: Option<String>,
    pub is_facture: bool,
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
        belongs_to = "super::devis::Entity",
        from = "Column::DevisId",
        to = "super::devis::Column::Id",
        on_update = "Cascade",
        on_delete = "SetNull"
    )]
    Devis,
    #[sea_orm(has_many = "super::bon_livraison_produit::Entity")]
    BonLivraisonProduit,
    #[sea_orm(has_many = "super::advancement::Entity")]
    Advancement,
    #[sea_orm(has_many = "super::facture::Entity")]
    Facture,
}

impl Related<super::client::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Client.def()
    }
}

impl Related<super::bon_livraison_produit::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::BonLivraisonProduit.def()
    }
}

impl Related<super::advancement::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Advancement.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
