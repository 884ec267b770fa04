use gestcom::db;
use gestcom::models::{bon_livraison, facture, mouvement_stock, produit};
use gestcom::services::advancements::AdvancementInput;
use gestcom::services::{
    bon_achat_service, bon_avoir_service, bon_livraison_service, devis_service, facture_service,
};
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};

// Helper to create a test database
async fn setup_test_db() -> DatabaseConnection {
    db::init_db("sqlite::memory:")
        .await
        .expect("Failed to init DB")
}

async fn create_test_client(db: &DatabaseConnection, nom: &str, telephone: &str) -> i32 {
    let now = chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
    let client = gestcom::models::client::ActiveModel {
        nom_complete: Set(nom.to_string()),
        telephone: Set(Some(telephone.to_string())),
        created_at: Set(now.clone()),
        updated_at: Set(now),
        ..Default::default()
    };
    client.insert(db).await.expect("Failed to create client").id
}

async fn create_test_fornisseur(db: &DatabaseConnection, nom: &str, telephone: &str) -> i32 {
    let now = chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
    let fornisseur = gestcom::models::fornisseur::ActiveModel {
        nom_complete: Set(nom.to_string()),
        telephone: Set(telephone.to_string()),
        created_at: Set(now.clone()),
        updated_at: Set(now),
        ..Default::default()
    };
    fornisseur
        .insert(db)
        .await
        .expect("Failed to create fornisseur")
        .id
}

async fn create_test_produit(
    db: &DatabaseConnection,
    reference: &str,
    qty: i32,
    prix_achat: f64,
    prix_vente: f64,
) -> i32 {
    let now = chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
    let produit = produit::ActiveModel {
        reference: Set(reference.to_string()),
        designation: Set(format!("Produit {}", reference)),
        qty: Set(qty),
        prix_achat: Set(prix_achat),
        prix_vente: Set(prix_vente),
        created_at: Set(now.clone()),
        updated_at: Set(now),
        ..Default::default()
    };
    produit
        .insert(db)
        .await
        .expect("Failed to create produit")
        .id
}

async fn stock_of(db: &DatabaseConnection, produit_id: i32) -> i32 {
    produit::Entity::find_by_id(produit_id)
        .one(db)
        .await
        .expect("query failed")
        .expect("produit missing")
        .qty
}

fn bl_ligne(produit_id: i32, quantite: i32) -> bon_livraison_service::LigneBonLivraisonInput {
    bon_livraison_service::LigneBonLivraisonInput {
        produit_id,
        quantite,
        prix_unitaire: None,
    }
}

fn bl_create(
    client_id: i32,
    produits: Vec<bon_livraison_service::LigneBonLivraisonInput>,
) -> bon_livraison_service::CreateBonLivraison {
    bon_livraison_service::CreateBonLivraison {
        client_id,
        produits,
        mode_reglement: None,
        status: None,
        notes: None,
        date_livraison: None,
        advancements: vec![],
    }
}

fn facture_create(
    client_id: i32,
    produits: Vec<facture_service::LigneFactureInput>,
    tva: f64,
    bon_livraison_id: Option<i32>,
) -> facture_service::CreateFacture {
    facture_service::CreateFacture {
        client_id,
        produits,
        mode_reglement: None,
        tva,
        notes: None,
        date_facturation: None,
        date_echeance: None,
        bon_livraison_id,
        advancements: vec![],
    }
}

fn facture_ligne(produit_id: i32, quantite: i32) -> facture_service::LigneFactureInput {
    facture_service::LigneFactureInput {
        produit_id,
        quantite,
        prix_unitaire: None,
        description: None,
    }
}

#[tokio::test]
async fn numbering_is_monotonic_per_prefix() {
    let db = setup_test_db().await;
    let client_id = create_test_client(&db, "Client Num", "0600000001").await;
    let produit_id = create_test_produit(&db, "NUM-1", 100, 10.0, 20.0).await;

    for expected in ["BL0001", "BL0002", "BL0003"] {
        let bon = bon_livraison_service::create(&db, bl_create(client_id, vec![bl_ligne(produit_id, 1)]))
            .await
            .expect("create failed");
        assert_eq!(bon.bon.num_bon_livraison, expected);
    }
}

#[tokio::test]
async fn bon_livraison_creation_is_all_or_nothing() {
    let db = setup_test_db().await;
    let client_id = create_test_client(&db, "Client Stock", "0600000002").await;
    let p1 = create_test_produit(&db, "AON-1", 10, 10.0, 20.0).await;
    let p2 = create_test_produit(&db, "AON-2", 5, 10.0, 20.0).await;

    // La deuxième ligne dépasse le stock: rien ne doit être décrémenté
    let result = bon_livraison_service::create(
        &db,
        bl_create(client_id, vec![bl_ligne(p1, 3), bl_ligne(p2, 50)]),
    )
    .await;

    assert!(result.is_err());
    assert_eq!(stock_of(&db, p1).await, 10);
    assert_eq!(stock_of(&db, p2).await, 5);

    // Une création valide décrémente exactement les quantités des lignes
    bon_livraison_service::create(
        &db,
        bl_create(client_id, vec![bl_ligne(p1, 3), bl_ligne(p2, 2)]),
    )
    .await
    .expect("create failed");

    assert_eq!(stock_of(&db, p1).await, 7);
    assert_eq!(stock_of(&db, p2).await, 3);
}

#[tokio::test]
async fn standalone_facture_cancel_uncancel_round_trips_stock() {
    let db = setup_test_db().await;
    let client_id = create_test_client(&db, "Client Facture", "0600000003").await;
    let produit_id = create_test_produit(&db, "FAC-1", 100, 10.0, 20.0).await;

    let facture = facture_service::create(
        &db,
        facture_create(client_id, vec![facture_ligne(produit_id, 5)], 0.0, None),
    )
    .await
    .expect("create failed");
    assert_eq!(stock_of(&db, produit_id).await, 95);

    facture_service::cancel(&db, facture.facture.id)
        .await
        .expect("cancel failed");
    assert_eq!(stock_of(&db, produit_id).await, 100);

    facture_service::update_status(&db, facture.facture.id, "brouillon")
        .await
        .expect("uncancel failed");
    assert_eq!(stock_of(&db, produit_id).await, 95);
}

#[tokio::test]
async fn facture_from_bon_livraison_never_touches_stock() {
    let db = setup_test_db().await;
    let client_id = create_test_client(&db, "Client Chaîne", "0600000004").await;
    let produit_id = create_test_produit(&db, "CHN-1", 50, 10.0, 20.0).await;

    let bon = bon_livraison_service::create(&db, bl_create(client_id, vec![bl_ligne(produit_id, 8)]))
        .await
        .expect("create bon failed");
    assert_eq!(stock_of(&db, produit_id).await, 42);

    let facture = facture_service::create_from_bon_livraison(
        &db,
        facture_service::CreateFactureFromBonLivraison {
            bon_livraison_id: bon.bon.id,
            date_facturation: None,
            date_echeance: None,
            mode_reglement: None,
            notes: None,
        },
    )
    .await
    .expect("create facture failed");

    // Pas de second décrément à la facturation
    assert_eq!(stock_of(&db, produit_id).await, 42);

    // Une seule facture par bon
    let doublon = facture_service::create_from_bon_livraison(
        &db,
        facture_service::CreateFactureFromBonLivraison {
            bon_livraison_id: bon.bon.id,
            date_facturation: None,
            date_echeance: None,
            mode_reglement: None,
            notes: None,
        },
    )
    .await;
    assert!(doublon.is_err());

    // L'annulation d'une facture issue d'un bon ne restitue rien
    facture_service::cancel(&db, facture.facture.id)
        .await
        .expect("cancel failed");
    assert_eq!(stock_of(&db, produit_id).await, 42);

    // Le bon est de nouveau facturable
    let bon = bon_livraison::Entity::find_by_id(bon.bon.id)
        .one(&db)
        .await
        .unwrap()
        .unwrap();
    assert!(!bon.is_facture);
}

#[tokio::test]
async fn delete_rules_for_bon_livraison() {
    let db = setup_test_db().await;
    let client_id = create_test_client(&db, "Client Suppr", "0600000005").await;
    let produit_id = create_test_produit(&db, "SUP-1", 30, 10.0, 20.0).await;

    // Un bon livré ne peut pas être supprimé, le stock reste décrémenté
    let livre = bon_livraison_service::create(&db, bl_create(client_id, vec![bl_ligne(produit_id, 4)]))
        .await
        .expect("create failed");
    bon_livraison_service::update_status(&db, livre.bon.id, "livré")
        .await
        .expect("status failed");

    let result = bon_livraison_service::delete(&db, livre.bon.id).await;
    assert!(result.is_err());
    assert_eq!(stock_of(&db, produit_id).await, 26);

    // Un brouillon se supprime et restitue son stock
    let brouillon =
        bon_livraison_service::create(&db, bl_create(client_id, vec![bl_ligne(produit_id, 6)]))
            .await
            .expect("create failed");
    assert_eq!(stock_of(&db, produit_id).await, 20);

    bon_livraison_service::delete(&db, brouillon.bon.id)
        .await
        .expect("delete failed");
    assert_eq!(stock_of(&db, produit_id).await, 26);
}

#[tokio::test]
async fn facture_payment_reconciliation_drives_status() {
    let db = setup_test_db().await;
    let client_id = create_test_client(&db, "Client Paiement", "0600000006").await;
    let produit_id = create_test_produit(&db, "PAY-1", 100, 10.0, 20.0).await;

    // 5 unités à 20 → TTC 100 sans TVA
    let facture = facture_service::create(
        &db,
        facture_create(client_id, vec![facture_ligne(produit_id, 5)], 0.0, None),
    )
    .await
    .expect("create failed");
    assert_eq!(facture.facture.montant_ttc, 100.0);

    let facture = facture_service::add_payment(
        &db,
        facture.facture.id,
        facture_service::PaymentInput {
            amount: 40.0,
            payment_method: "espèces".to_string(),
            payment_date: None,
            reference: None,
            notes: None,
        },
    )
    .await
    .expect("payment failed");

    assert_eq!(facture.facture.status, "partiellement_payée");
    assert_eq!(facture.facture.montant_paye, 40.0);
    assert_eq!(facture.facture.montant_restant, 60.0);

    // La réconciliation remplace la liste: un seul acompte de 100
    let facture = facture_service::update(
        &db,
        facture.facture.id,
        facture_service::UpdateFacture {
            advancements: Some(vec![AdvancementInput {
                id: None,
                amount: 100.0,
                payment_date: None,
                payment_method: "virement".to_string(),
                reference: None,
                notes: None,
            }]),
            ..Default::default()
        },
    )
    .await
    .expect("update failed");

    assert_eq!(facture.facture.status, "payée");
    assert_eq!(facture.facture.montant_paye, 100.0);
    assert_eq!(facture.facture.montant_restant, 0.0);
    assert_eq!(facture.advancements.len(), 1);
}

#[tokio::test]
async fn devis_conversion_to_facture_computes_totals_and_stock_once() {
    let db = setup_test_db().await;
    let client_id = create_test_client(&db, "Client Devis", "0600000007").await;
    let p1 = create_test_produit(&db, "DEV-1", 100, 5.0, 10.0).await;
    let p2 = create_test_produit(&db, "DEV-2", 100, 10.0, 20.0).await;

    let devis = devis_service::create(
        &db,
        devis_service::CreateDevis {
            client_id,
            produits: vec![
                devis_service::LigneDevisInput {
                    produit_id: p1,
                    quantite: 3,
                    prix_unitaire: None,
                    description: None,
                    unite: None,
                },
                devis_service::LigneDevisInput {
                    produit_id: p2,
                    quantite: 2,
                    prix_unitaire: None,
                    description: None,
                    unite: None,
                },
            ],
            mode_reglement: None,
            notes: None,
            date_creation: None,
        },
    )
    .await
    .expect("create devis failed");

    // Aucun effet sur le stock à la création du devis
    assert_eq!(stock_of(&db, p1).await, 100);
    assert_eq!(stock_of(&db, p2).await, 100);
    assert_eq!(devis.devis.montant_ht, 70.0);

    let (facture, devis) = devis_service::convert_to_facture(&db, devis.devis.id)
        .await
        .expect("conversion failed");

    assert_eq!(facture.montant_ht, 70.0);
    assert_eq!(facture.tva, 20.0);
    assert_eq!(facture.montant_ttc, 84.0);
    assert_eq!(devis.status, "transformé_en_facture");

    // Décrément une seule fois sur la chaîne devis → facture
    assert_eq!(stock_of(&db, p1).await, 97);
    assert_eq!(stock_of(&db, p2).await, 98);

    // Un devis déjà transformé ne se convertit plus
    let again = devis_service::convert_to_facture(&db, devis.id).await;
    assert!(again.is_err());
}

#[tokio::test]
async fn end_to_end_delivery_note_scenario() {
    let db = setup_test_db().await;
    let client_id = create_test_client(&db, "Client E2E", "0600000008").await;
    let produit_id = create_test_produit(&db, "P1", 100, 10.0, 20.0).await;

    let bon = bon_livraison_service::create(&db, bl_create(client_id, vec![bl_ligne(produit_id, 5)]))
        .await
        .expect("create failed");
    assert_eq!(stock_of(&db, produit_id).await, 95);

    bon_livraison_service::update_status(&db, bon.bon.id, "annulée")
        .await
        .expect("cancel failed");
    assert_eq!(stock_of(&db, produit_id).await, 100);

    // Un bon annulé se supprime sans double restitution
    bon_livraison_service::delete(&db, bon.bon.id)
        .await
        .expect("delete failed");
    assert_eq!(stock_of(&db, produit_id).await, 100);
}

#[tokio::test]
async fn bon_avoir_increments_stock_regardless_of_motif() {
    let db = setup_test_db().await;
    let client_id = create_test_client(&db, "Client Avoir", "0600000009").await;
    let produit_id = create_test_produit(&db, "AVR-1", 10, 10.0, 20.0).await;

    // Même un motif sans retour physique incrémente le stock
    bon_avoir_service::create(
        &db,
        bon_avoir_service::CreateBonAvoir {
            client_id: Some(client_id),
            bon_livraison_id: None,
            produits: vec![bon_avoir_service::LigneBonAvoirInput {
                produit_id,
                quantite: 3,
                prix_unitaire: None,
                remise_ligne: None,
                bon_livraison_produit_id: None,
            }],
            motif: "erreur_facturation".to_string(),
            notes: None,
        },
    )
    .await
    .expect("create failed");

    assert_eq!(stock_of(&db, produit_id).await, 13);
}

#[tokio::test]
async fn bon_avoir_cancel_after_validation_takes_back_return() {
    let db = setup_test_db().await;
    let client_id = create_test_client(&db, "Client Retour", "0600000010").await;
    let produit_id = create_test_produit(&db, "RET-1", 10, 10.0, 20.0).await;

    let bon = bon_avoir_service::create(
        &db,
        bon_avoir_service::CreateBonAvoir {
            client_id: Some(client_id),
            bon_livraison_id: None,
            produits: vec![bon_avoir_service::LigneBonAvoirInput {
                produit_id,
                quantite: 4,
                prix_unitaire: None,
                remise_ligne: None,
                bon_livraison_produit_id: None,
            }],
            motif: "retour_produit".to_string(),
            notes: None,
        },
    )
    .await
    .expect("create failed");
    assert_eq!(stock_of(&db, produit_id).await, 14);

    bon_avoir_service::valider(&db, bon.bon.id)
        .await
        .expect("valider failed");
    bon_avoir_service::annuler(&db, bon.bon.id)
        .await
        .expect("annuler failed");

    assert_eq!(stock_of(&db, produit_id).await, 10);
}

#[tokio::test]
async fn bon_achat_stock_increases_on_reception_only() {
    let db = setup_test_db().await;
    let fornisseur_id = create_test_fornisseur(&db, "Fornisseur Test", "0522000001").await;
    let produit_id = create_test_produit(&db, "ACH-1", 5, 10.0, 20.0).await;

    let bon = bon_achat_service::create(
        &db,
        bon_achat_service::CreateBonAchat {
            fornisseur_id,
            produits: vec![bon_achat_service::LigneBonAchatInput {
                produit_id,
                quantite: 20,
                prix_unitaire: None,
                remise_ligne: None,
            }],
            mode_reglement: None,
            remise: 0.0,
            type_achat: None,
            notes: None,
        },
    )
    .await
    .expect("create failed");

    // La création ne touche pas le stock
    assert_eq!(stock_of(&db, produit_id).await, 5);

    bon_achat_service::update(
        &db,
        bon.bon.id,
        bon_achat_service::UpdateBonAchat {
            status: Some("commandé".to_string()),
            ..Default::default()
        },
    )
    .await
    .expect("status failed");

    // Réception au-delà de la commande refusée
    let trop = bon_achat_service::enregistrer_reception(
        &db,
        bon.bon.id,
        bon_achat_service::ReceptionInput {
            produits_reception: vec![bon_achat_service::ReceptionLigne {
                produit_id,
                quantite_recue: 25,
            }],
            date_reception: None,
        },
    )
    .await;
    assert!(trop.is_err());
    assert_eq!(stock_of(&db, produit_id).await, 5);

    let bon = bon_achat_service::enregistrer_reception(
        &db,
        bon.bon.id,
        bon_achat_service::ReceptionInput {
            produits_reception: vec![bon_achat_service::ReceptionLigne {
                produit_id,
                quantite_recue: 20,
            }],
            date_reception: None,
        },
    )
    .await
    .expect("reception failed");

    assert_eq!(stock_of(&db, produit_id).await, 25);
    assert_eq!(bon.bon.status, "reçu");

    bon_achat_service::marquer_paye(
        &db,
        bon.bon.id,
        bon_achat_service::PaiementInput {
            date_paiement: None,
            mode_reglement: None,
        },
    )
    .await
    .expect("paiement failed");

    // Un bon payé n'est plus supprimable
    let result = bon_achat_service::delete(&db, bon.bon.id).await;
    assert!(result.is_err());
}

#[tokio::test]
async fn stock_ledger_matches_materialized_counter() {
    let db = setup_test_db().await;
    let client_id = create_test_client(&db, "Client Ledger", "0600000011").await;
    let produit_id = create_test_produit(&db, "LDG-1", 40, 10.0, 20.0).await;

    let bon = bon_livraison_service::create(&db, bl_create(client_id, vec![bl_ligne(produit_id, 7)]))
        .await
        .expect("create failed");
    bon_livraison_service::update_status(&db, bon.bon.id, "annulée")
        .await
        .expect("cancel failed");
    facture_service::create(
        &db,
        facture_create(client_id, vec![facture_ligne(produit_id, 3)], 20.0, None),
    )
    .await
    .expect("facture failed");

    let mouvements = mouvement_stock::Entity::find()
        .filter(mouvement_stock::Column::ProduitId.eq(produit_id))
        .all(&db)
        .await
        .expect("query failed");

    let delta_total: i32 = mouvements.iter().map(|m| m.quantite).sum();
    assert_eq!(40 + delta_total, stock_of(&db, produit_id).await);

    // Chaque mouvement journalise des bornes cohérentes
    for m in &mouvements {
        assert_eq!(m.quantite_avant + m.quantite, m.quantite_apres);
    }
}

#[tokio::test]
async fn facture_totals_with_vat() {
    let db = setup_test_db().await;
    let client_id = create_test_client(&db, "Client TVA", "0600000012").await;
    let produit_id = create_test_produit(&db, "TVA-1", 100, 10.0, 20.0).await;

    let facture = facture_service::create(
        &db,
        facture_create(client_id, vec![facture_ligne(produit_id, 5)], 20.0, None),
    )
    .await
    .expect("create failed");

    assert_eq!(facture.facture.montant_ht, 100.0);
    assert_eq!(facture.facture.montant_tva, 20.0);
    assert_eq!(facture.facture.montant_ttc, 120.0);
    assert_eq!(facture.facture.montant_restant, 120.0);
    assert_eq!(facture.facture.status, "brouillon");

    let row = facture::Entity::find_by_id(facture.facture.id)
        .one(&db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(row.num_facture, "FAC0001");
}
