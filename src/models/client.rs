use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "clients")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub nom_complete: String,
    pub reference: Option<String>,
    pub ville: Option<String>,
    pub address: Option<String>,
    pub telephone: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::devis::Entity")]
    Devis,
    #[sea_orm(has_many = "super::bon_livraison::Entity")]
    BonLivraison,
    #[sea_orm(has_many = "super::facture::Entity")]
    Facture,
    #[sea_orm(has_many = "super::bon_avoir::Entity")]
    BonAvoir,
}

impl Related<super::devis::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Devis.def()
    }
}

impl Related<super::bon_livraison::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::BonLivraison.def()
    }
}

impl Related<super::facture::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Facture.def()
    }
}

impl Related<super::bon_avoir::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::BonAvoir.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
