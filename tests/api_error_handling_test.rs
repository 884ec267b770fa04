use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use gestcom::api;
use gestcom::db;
use sea_orm::{ActiveModelTrait, DatabaseConnection, Set};
use tower::util::ServiceExt; // for `oneshot`

async fn setup_test_app() -> (Router, DatabaseConnection) {
    let db = db::init_db("sqlite::memory:")
        .await
        .expect("Failed to init DB");
    (api::api_router(db.clone()), db)
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

async fn create_test_produit(db: &DatabaseConnection, reference: &str, qty: i32) -> i32 {
    let now = chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
    let produit = gestcom::models::produit::ActiveModel {
        reference: Set(reference.to_string()),
        designation: Set(format!("Produit {}", reference)),
        qty: Set(qty),
        prix_achat: Set(10.0),
        prix_vente: Set(20.0),
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

fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn response_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn get_missing_facture_returns_404() {
    let (app, _db) = setup_test_app().await;

    let response = app
        .oneshot(
            Request::builder()
                .uri("/factures/999")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = response_json(response).await;
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn create_bon_without_produits_returns_400() {
    let (app, db) = setup_test_app().await;
    let client_id = create_test_client(&db, "Client API", "0611111111").await;

    let response = app
        .oneshot(json_request(
            "POST",
            "/bon-livraisons",
            serde_json::json!({
                "client_id": client_id,
                "produits": []
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = response_json(response).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["message"], "Au moins un produit est requis");
}

#[tokio::test]
async fn create_bon_with_insufficient_stock_returns_400() {
    let (app, db) = setup_test_app().await;
    let client_id = create_test_client(&db, "Client Stock API", "0622222222").await;
    let produit_id = create_test_produit(&db, "API-1", 2).await;

    let response = app
        .oneshot(json_request(
            "POST",
            "/bon-livraisons",
            serde_json::json!({
                "client_id": client_id,
                "produits": [{ "produit_id": produit_id, "quantite": 5 }]
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = response_json(response).await;
    assert_eq!(body["success"], false);
    assert!(
        body["message"]
            .as_str()
            .unwrap()
            .starts_with("Stock insuffisant")
    );
}

#[tokio::test]
async fn duplicate_client_telephone_returns_409() {
    let (app, db) = setup_test_app().await;
    create_test_client(&db, "Premier", "0633333333").await;

    let response = app
        .oneshot(json_request(
            "POST",
            "/clients",
            serde_json::json!({
                "nom_complete": "Deuxième",
                "telephone": "0633333333"
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body = response_json(response).await;
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn invalid_status_transition_returns_400() {
    let (app, db) = setup_test_app().await;
    let client_id = create_test_client(&db, "Client Statut", "0644444444").await;
    let produit_id = create_test_produit(&db, "API-2", 10).await;

    let create = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/bon-livraisons",
            serde_json::json!({
                "client_id": client_id,
                "produits": [{ "produit_id": produit_id, "quantite": 1 }]
            }),
        ))
        .await
        .unwrap();
    assert_eq!(create.status(), StatusCode::CREATED);
    let created = response_json(create).await;
    let bon_id = created["bon"]["id"].as_i64().unwrap();

    // "facturé" n'est pas atteignable depuis "brouillon"
    let response = app
        .clone()
        .oneshot(json_request(
            "PATCH",
            &format!("/bon-livraisons/{}/status", bon_id),
            serde_json::json!({ "status": "facturé" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // Un statut inconnu est rejeté avant toute logique métier
    let response = app
        .oneshot(json_request(
            "PATCH",
            &format!("/bon-livraisons/{}/status", bon_id),
            serde_json::json!({ "status": "expédié" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = response_json(response).await;
    assert!(
        body["message"]
            .as_str()
            .unwrap()
            .starts_with("Statut invalide")
    );
}

#[tokio::test]
async fn produit_price_rule_is_enforced() {
    let (app, _db) = setup_test_app().await;

    let response = app
        .oneshot(json_request(
            "POST",
            "/produits",
            serde_json::json!({
                "reference": "PRIX-1",
                "designation": "Produit test",
                "prix_achat": 50.0,
                "prix_vente": 40.0
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = response_json(response).await;
    assert_eq!(
        body["message"],
        "Le prix de vente doit être supérieur au prix d'achat"
    );
}
