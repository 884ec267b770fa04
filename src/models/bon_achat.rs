use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "bons_achat")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique)]
    pub num_bon_achat: String,
    pub fornisseur_id: i32,
    pub date_creation: String,
    pub date_reception: Option<String>,
    pub date_paiement: Option<String>,
    pub mode_reglement: String,
    pub type_achat: Option<String>,
    pub facture_fornisseur: Option<String>,
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
        belongs_to = "super::fornisseur::Entity",
        from = "Column::FornisseurId",
        to = "super::fornisseur::Column::Id",
        on_update = "Cascade",
        on_delete = "Cascade"
    )]
    Fornisseur,
    #[sea_orm(has_many = "super::bon_achat_produit::Entity")]
    BonAchatProduit,
}

impl Related<super::fornisseur::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Fornisseur.def()
    }
}

impl Related<super::bon_achat_produit::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::BonAchatProduit.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
