use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Journal des mouvements de stock. Chaque mutation de `produits.qty` passe
/// par une ligne ici, insérée dans la même transaction (delta signé).
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "mouvements_stock")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub produit_id: i32,
    /// livraison, facturation, retour_client, reception, annulation, ajustement
    pub type_mouvement: String,
    pub quantite: i32,
    pub quantite_avant: i32,
    pub quantite_apres: i32,
    /// Numéro du document à l'origine du mouvement
    pub reference: String,
    pub notes: Option<String>,
    pub created_at: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::produit::Entity",
        from = "Column::ProduitId",
        to = "super::produit::Column::Id",
        on_update = "Cascade",
        on_delete = "Cascade"
    )]
    Produit,
}

impl Related<super::produit::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Produit.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
