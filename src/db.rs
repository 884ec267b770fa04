use sea_orm::{ConnectionTrait, Database, DatabaseConnection, DbErr, Statement};

pub async fn init_db(database_url: &str) -> Result<DatabaseConnection, DbErr> {
    let db = Database::connect(database_url).await?;

    // Run migrations manually (simple SQL)
    run_migrations(&db).await?;

    Ok(db)
}

async fn exec(db: &DatabaseConnection, sql: &str) -> Result<(), DbErr> {
    db.execute(Statement::from_string(
        db.get_database_backend(),
        sql.to_owned(),
    ))
    .await?;
    Ok(())
}

async fn run_migrations(db: &DatabaseConnection) -> Result<(), DbErr> {
    exec(
        db,
        r#"
        CREATE TABLE IF NOT EXISTS clients (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            nom_complete TEXT NOT NULL,
            reference TEXT,
            ville TEXT,
            address TEXT,
            telephone TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .await?;

    exec(
        db,
        r#"
        CREATE TABLE IF NOT EXISTS fornisseurs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            nom_complete TEXT NOT NULL,
            ville TEXT,
            address TEXT,
            telephone TEXT NOT NULL UNIQUE,
            reference TEXT UNIQUE,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .await?;

    exec(
        db,
        r#"
        CREATE TABLE IF NOT EXISTS produits (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            reference TEXT NOT NULL UNIQUE,
            designation TEXT NOT NULL,
            observation TEXT,
            qty INTEGER NOT NULL DEFAULT 0,
            prix_achat REAL NOT NULL,
            prix_vente REAL NOT NULL,
            fornisseur_id INTEGER REFERENCES fornisseurs(id) ON DELETE SET NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .await?;

    exec(
        db,
        r#"
        CREATE TABLE IF NOT EXISTS devis (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            num_devis TEXT NOT NULL UNIQUE,
            client_id INTEGER NOT NULL REFERENCES clients(id) ON DELETE CASCADE,
            date_creation TEXT NOT NULL,
            date_acceptation TEXT,
            mode_reglement TEXT NOT NULL DEFAULT 'espèces',
            remise REAL NOT NULL DEFAULT 0,
            montant_ht REAL NOT NULL DEFAULT 0,
            montant_ttc REAL NOT NULL DEFAULT 0,
            status TEXT NOT NULL DEFAULT 'brouillon',
            notes TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .await?;

    exec(
        db,
        r#"
        CREATE TABLE IF NOT EXISTS devis_produits (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            devis_id INTEGER NOT NULL REFERENCES devis(id) ON DELETE CASCADE,
            produit_id INTEGER NOT NULL REFERENCES produits(id) ON DELETE CASCADE,
            quantite INTEGER NOT NULL,
            prix_unitaire REAL NOT NULL,
            total_ligne REAL NOT NULL,
            description TEXT,
            unite TEXT NOT NULL DEFAULT 'unité'
        )
        "#,
    )
    .await?;

    exec(
        db,
        r#"
        CREATE TABLE IF NOT EXISTS bon_livraisons (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            num_bon_livraison TEXT NOT NULL UNIQUE,
            client_id INTEGER NOT NULL REFERENCES clients(id) ON DELETE CASCADE,
            devis_id INTEGER REFERENCES devis(id) ON DELETE SET NULL,
            date_creation TEXT NOT NULL,
            date_livraison TEXT,
            mode_reglement TEXT NOT NULL DEFAULT 'espèces',
            remise REAL NOT NULL DEFAULT 0,
            tva REAL NOT NULL DEFAULT 0,
            montant_ht REAL NOT NULL DEFAULT 0,
            montant_ttc REAL NOT NULL DEFAULT 0,
            montant_restant REAL NOT NULL DEFAULT 0,
            status TEXT NOT NULL DEFAULT 'brouillon',
            notes TEXT,
            is_facture INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .await?;

    exec(
        db,
        r#"
        CREATE TABLE IF NOT EXISTS bon_livraison_produits (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            bon_livraison_id INTEGER NOT NULL REFERENCES bon_livraisons(id) ON DELETE CASCADE,
            produit_id INTEGER NOT NULL REFERENCES produits(id) ON DELETE CASCADE,
            quantite INTEGER NOT NULL,
            prix_unitaire REAL NOT NULL,
            total_ligne REAL NOT NULL
        )
        "#,
    )
    .await?;

    exec(
        db,
        r#"
        CREATE TABLE IF NOT EXISTS factures (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            num_facture TEXT NOT NULL UNIQUE,
            client_id INTEGER NOT NULL REFERENCES clients(id) ON DELETE CASCADE,
            bon_livraison_id INTEGER REFERENCES bon_livraisons(id) ON DELETE SET NULL,
            devis_id INTEGER REFERENCES devis(id) ON DELETE SET NULL,
            date_creation TEXT NOT NULL,
            date_facturation TEXT NOT NULL,
            date_echeance TEXT,
            mode_reglement TEXT NOT NULL DEFAULT 'espèces',
            montant_ht REAL NOT NULL DEFAULT 0,
            montant_ht_initial REAL NOT NULL DEFAULT 0,
            tva REAL NOT NULL DEFAULT 0,
            montant_tva REAL NOT NULL DEFAULT 0,
            montant_ttc REAL NOT NULL DEFAULT 0,
            montant_paye REAL NOT NULL DEFAULT 0,
            montant_restant REAL NOT NULL DEFAULT 0,
            status TEXT NOT NULL DEFAULT 'brouillon',
            notes TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .await?;

    exec(
        db,
        r#"
        CREATE TABLE IF NOT EXISTS facture_produits (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            facture_id INTEGER NOT NULL REFERENCES factures(id) ON DELETE CASCADE,
            produit_id INTEGER NOT NULL REFERENCES produits(id) ON DELETE CASCADE,
            quantite INTEGER NOT NULL,
            prix_unitaire REAL NOT NULL,
            montant_ht_ligne REAL NOT NULL,
            montant_tva_ligne REAL NOT NULL DEFAULT 0,
            total_ligne REAL NOT NULL,
            description TEXT
        )
        "#,
    )
    .await?;

    exec(
        db,
        r#"
        CREATE TABLE IF NOT EXISTS bons_avoir (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            num_bon_avoir TEXT NOT NULL UNIQUE,
            client_id INTEGER REFERENCES clients(id) ON DELETE CASCADE,
            bon_livraison_id INTEGER REFERENCES bon_livraisons(id) ON DELETE SET NULL,
            date_creation TEXT NOT NULL,
            motif TEXT NOT NULL,
            montant_total REAL NOT NULL DEFAULT 0,
            status TEXT NOT NULL DEFAULT 'brouillon',
            notes TEXT,
            utilise_le TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .await?;

    exec(
        db,
        r#"
        CREATE TABLE IF NOT EXISTS bon_avoir_produits (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            bon_avoir_id INTEGER NOT NULL REFERENCES bons_avoir(id) ON DELETE CASCADE,
            produit_id INTEGER NOT NULL REFERENCES produits(id) ON DELETE CASCADE,
            quantite INTEGER NOT NULL,
            prix_unitaire REAL NOT NULL,
            remise_ligne REAL NOT NULL DEFAULT 0,
            total_ligne REAL NOT NULL,
            bon_livraison_produit_id INTEGER
        )
        "#,
    )
    .await?;

    exec(
        db,
        r#"
        CREATE TABLE IF NOT EXISTS bons_achat (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            num_bon_achat TEXT NOT NULL UNIQUE,
            fornisseur_id INTEGER NOT NULL REFERENCES fornisseurs(id) ON DELETE CASCADE,
            date_creation TEXT NOT NULL,
            date_reception TEXT,
            date_paiement TEXT,
            mode_reglement TEXT NOT NULL DEFAULT 'espèces',
            type_achat TEXT,
            facture_fornisseur TEXT,
            remise REAL NOT NULL DEFAULT 0,
            montant_ht REAL NOT NULL DEFAULT 0,
            montant_ttc REAL NOT NULL DEFAULT 0,
            status TEXT NOT NULL DEFAULT 'brouillon',
            notes TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .await?;

    exec(
        db,
        r#"
        CREATE TABLE IF NOT EXISTS bon_achat_produits (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            bon_achat_id INTEGER NOT NULL REFERENCES bons_achat(id) ON DELETE CASCADE,
            produit_id INTEGER NOT NULL REFERENCES produits(id) ON DELETE CASCADE,
            quantite INTEGER NOT NULL,
            prix_unitaire REAL NOT NULL,
            remise_ligne REAL NOT NULL DEFAULT 0,
            total_ligne REAL NOT NULL
        )
        "#,
    )
    .await?;

    exec(
        db,
        r#"
        CREATE TABLE IF NOT EXISTS advancements (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            amount REAL NOT NULL,
            payment_date TEXT NOT NULL,
            payment_method TEXT NOT NULL,
            reference TEXT,
            notes TEXT,
            facture_id INTEGER REFERENCES factures(id) ON DELETE CASCADE,
            bon_livraison_id INTEGER REFERENCES bon_livraisons(id) ON DELETE CASCADE,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .await?;

    exec(
        db,
        r#"
        CREATE TABLE IF NOT EXISTS mouvements_stock (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            produit_id INTEGER NOT NULL REFERENCES produits(id) ON DELETE CASCADE,
            type_mouvement TEXT NOT NULL,
            quantite INTEGER NOT NULL,
            quantite_avant INTEGER NOT NULL,
            quantite_apres INTEGER NOT NULL,
            reference TEXT NOT NULL,
            notes TEXT,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .await?;

    exec(
        db,
        "CREATE INDEX IF NOT EXISTS idx_devis_client ON devis(client_id)",
    )
    .await?;
    exec(
        db,
        "CREATE INDEX IF NOT EXISTS idx_devis_status ON devis(status)",
    )
    .await?;
    exec(
        db,
        "CREATE INDEX IF NOT EXISTS idx_bl_client ON bon_livraisons(client_id)",
    )
    .await?;
    exec(
        db,
        "CREATE INDEX IF NOT EXISTS idx_factures_client ON factures(client_id)",
    )
    .await?;
    exec(
        db,
        "CREATE INDEX IF NOT EXISTS idx_produits_fornisseur ON produits(fornisseur_id)",
    )
    .await?;
    exec(
        db,
        "CREATE INDEX IF NOT EXISTS idx_mouvements_produit ON mouvements_stock(produit_id)",
    )
    .await?;

    Ok(())
}
