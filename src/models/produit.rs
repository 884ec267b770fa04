use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "produits")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique)]
    pub reference: String,
    pub designation: String,
    pub observation: Option<String>,
    /// Quantité en stock, mutée uniquement via services::stock
    pub qty: i32,
    pub prix_achat: f64,
    pub prix_vente: f64,
    pub fornisseur_id: Option<i32>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::fornisseur::Entity",
        from = "Column::FornisseurId",
        to = "super::fornisseur::Column::Id",
        on_update = "Cascade",
        on_delete = "SetNull"
    )]
    Fornisseur,
    #[sea_orm(has_many = "super::mouvement_stock::Entity")]
    MouvementStock,
}

impl Related<super::fornisseur::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Fornisseur.def()
    }
}

impl Related<super::mouvement_stock::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::MouvementStock.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
