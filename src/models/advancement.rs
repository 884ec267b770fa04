use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Acompte ou paiement partiel, rattaché soit à une facture soit à un bon
/// de livraison (jamais les deux).
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "advancements")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub amount: f64,
    pub payment_date: String,
    pub payment_method: String,
    pub reference: Option<String>,
    pub notes: Option<String>,
    pub facture_id: Option<i32>,
    pub bon_livraison_id: Option<i32>,
    pub created_at: String,
    pub updated_at: String,
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
        belongs_to = "super::bon_livraison::Entity",
        from = "Column::BonLivraisonId",
        to = "super::bon_livraison::Column::Id",
        on_update = "Cascade",
        on_delete = "Cascade"
    )]
    BonLivraison,
}

impl Related<super::facture::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Facture.def()
    }
}

impl Related<super::bon_livraison::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::BonLivraison.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
