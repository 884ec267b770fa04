use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "facture_produits")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub facture_id: i32,
    pub produit_id: i32,
    pub quantite: i32,
    pub prix_unitaire: f64,
    pub montant_ht_ligne: f64,
    pub montant_tva_ligne: f64,
    pub total_ligne: f64,
    pub description: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::facture::Entity",
        from = "Column::FactureId",
        to = "super::facture::Column::Id",
        on_update = "Cascade",
        on_delete = "Cascade"
    )]
    Facture,
    #[sea_orm(
        belongs_to = "super::produit::Entity",
        from = "Column::ProduitId",
        to = "super::produit::Column::Id",
        on_update = "Cascade",
        on_delete = "Cascade"
    )]
    Produit,
}

impl Related<super::facture::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Facture.def()
    }
}

impl Related<super::produit::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Produit.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
