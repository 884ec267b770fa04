use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "devis")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique)]
    pub num_devis: String,
    pub client_id: i32,
    pub date_creation: String,
    pub date_acceptation: Option<String>,
    pub mode_reglement: String,
    pub remise: f64,
    pub montant_ht: f64,
    pub montant_ttc: f64,
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
    #[sea_orm(has_many = "super::devis_produit::Entity")]
    DevisProduit,
}

impl Related<super::client::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Client.def()
    }
}

impl Related<super::devis_produit::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::DevisProduit.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
