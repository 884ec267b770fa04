use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "fornisseurs")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub nom_complete: String,
    pub ville: Option<String>,
    pub address: Option<String>,
    #[sea_orm(unique)]
    pub telephone: String,
    pub reference: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::produit::Entity")]
    Produit,
    #[sea_orm(has_many = "super::bon_achat::Entity")]
    BonAchat,
}

impl Related<super::produit::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Produit.def()
    }
}

impl Related<super::bon_achat::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::BonAchat.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
