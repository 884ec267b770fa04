pub mod advancement;
pub mod bon_achat;
pub mod bon_achat_produit;
pub mod bon_avoir;
pub mod bon_avoir_produit;
pub mod bon_livraison;
pub mod bon_livraison_produit;
pub mod client;
pub mod devis;
pub mod devis_produit;
pub mod facture;
pub mod facture_produit;
pub mod fornisseur;
pub mod mouvement_stock;
pub mod produit;
