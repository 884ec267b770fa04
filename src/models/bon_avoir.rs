use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "bons_avoir")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique)]
    pub num_bon_avoir: String,
    pub client_id: Option<i32>,
    pub bon_livraison_id: Option<i32>,
    pub date_creation: String,
    /// retour_produit, erreur_facturation, remise_commerciale, annulation, autre
    pub motif: String,
    pub montant_total: f64,
    pub status: String,
    pub notes: Option<String>,
    pub utilise_le: Option<String>,
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
    #[sea_orm(has_many = "super::bon_avoir_produit::Entity")]
    BonAvoirProduit,
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

impl Related<super::bon_avoir_produit::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::BonAvoirProduit.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
