use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "bon_livraison_produits")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub bon_livraison_id: i32,
    pub produit_id: i32,
    pub quantite: i32,
    pub prix_unitaire: f64,
    pub total_ligne: f64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::bon_livraison::Entity",
        from = "Column::BonLivraisonId",
        to = "super::bon_livraison::Column::Id",
        on_update = "Cascade",
        on_delete = "Cascade"
    )]
    BonLivraison,
    #[sea_orm(
        belongs_to = "super::produit::Entity",
        from = "Column::ProduitId",
        to = "super::produit::Column::Id",
        on_update = "Cascade",
        on_delete = "Cascade"
    )]
    Produit,
}

impl Related<super::bon_livraison::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::BonLivraison.def()
    }
}

impl Related<super::produit::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Produit.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
