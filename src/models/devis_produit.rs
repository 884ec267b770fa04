use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "devis_produits")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub devis_id: i32,
    pub produit_id: i32,
    pub quantite: i32,
    pub prix_unitaire: f64,
    pub total_ligne: f64,
    pub description: Option<String>,
    pub unite: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::devis::Entity",
        from = "Column::DevisId",
        to = "super::devis::Column::Id",
        on_update = "Cascade",
        on_delete = "Cascade"
    )]
    Devis,
    #[sea_orm(
        belongs_to = "super::produit::Entity",
        from = "Column::ProduitId",
        to = "super::produit::Column::Id",
        on_update = "Cascade",
        on_delete = "Cascade"
    )]
    Produit,
}

impl Related<super::devis::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Devis.def()
    }
}

impl Related<super::produit::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Produit.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
