//! Rapports: agrégats en lecture seule sur les documents persistés.
//! Aucune mutation; les pourcentages sont gardés contre la division par
//! zéro.

use chrono::{Datelike, Local, NaiveDate, NaiveDateTime};
use sea_orm::sea_query::Expr;
use sea_orm::*;
use serde::Serialize;
use std::collections::HashMap;

use crate::domain::ServiceError;
use crate::models::advancement::{self, Entity as Advancement};
use crate::models::bon_livraison::{self, Entity as BonLivraison};
use crate::models::bon_livraison_produit::{self, Entity as BonLivraisonProduit};
use crate::models::client::{self, Entity as Client};
use crate::models::facture::{self, Entity as Facture};
use crate::models::produit::Entity as Produit;
use crate::services::{end_of_day, round2};

const STATUS_ANNULEE: &str = "annulée";

fn resolve_range(start_date: Option<String>, end_date: Option<String>) -> (String, String) {
    let start = start_date
        .unwrap_or_else(|| format!("{}-01-01 00:00:00", Local::now().year()));
    let end = end_date
        .map(|d| end_of_day(&d))
        .unwrap_or_else(|| Local::now().format("%Y-%m-%d %H:%M:%S").to_string());
    (start, end)
}

fn strftime_format(granularity: &str) -> &'static str {
    match granularity {
        "day" => "%Y-%m-%d",
        "week" => "%Y-%W",
        "year" => "%Y",
        _ => "%Y-%m",
    }
}

fn pct_change(current: f64, previous: f64) -> String {
    if previous == 0.0 {
        if current > 0.0 {
            "+100.0".to_string()
        } else {
            "0.0".to_string()
        }
    } else {
        format!("{:.1}", (current - previous) / previous * 100.0)
    }
}

fn days_since(date: &str) -> i64 {
    let parsed = NaiveDateTime::parse_from_str(date, "%Y-%m-%d %H:%M:%S")
        .or_else(|_| {
            NaiveDate::parse_from_str(date, "%Y-%m-%d").map(|d| d.and_hms_opt(0, 0, 0).unwrap())
        })
        .ok();

    match parsed {
        Some(dt) => (Local::now().naive_local() - dt).num_days(),
        None => 0,
    }
}

// ── Dashboard ────────────────────────────────────────────────────────────

#[derive(Debug, FromQueryResult, Serialize)]
pub struct FactureStatusRow {
    pub status: String,
    pub count: i64,
    pub total_ht: Option<f64>,
    pub total_ttc: Option<f64>,
    pub total_paye: Option<f64>,
    pub total_restant: Option<f64>,
}

#[derive(Debug, FromQueryResult, Serialize)]
pub struct BlStatusRow {
    pub status: String,
    pub count: i64,
    pub total_ht: Option<f64>,
    pub total_ttc: Option<f64>,
}

#[derive(Debug, FromQueryResult)]
struct TopClientRow {
    client_id: i32,
    nb_documents: i64,
    total_ttc: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct TopClient {
    pub client_id: i32,
    pub nom_complete: String,
    pub nb_documents: i64,
    pub total_ttc: f64,
}

#[derive(Debug, Serialize)]
pub struct FactureTotals {
    pub count: i64,
    pub montant_ht: f64,
    pub montant_ttc: f64,
    pub montant_paye: f64,
    pub montant_restant: f64,
    pub taux_recouvrement: String,
}

#[derive(Debug, Serialize)]
pub struct BlTotals {
    pub count: i64,
    pub montant_ht: f64,
    pub montant_ttc: f64,
}

#[derive(Debug, Serialize)]
pub struct DashboardReport {
    pub period_start: String,
    pub period_end: String,
    pub facture_totals: FactureTotals,
    pub factures_by_status: Vec<FactureStatusRow>,
    pub bl_totals: BlTotals,
    pub bls_by_status: Vec<BlStatusRow>,
    pub total_collected: f64,
    pub top_clients_factures: Vec<TopClient>,
    pub top_clients_bls: Vec<TopClient>,
}

async fn resolve_top_clients(
    db: &DatabaseConnection,
    rows: Vec<TopClientRow>,
) -> Result<Vec<TopClient>, ServiceError> {
    let ids: Vec<i32> = rows.iter().map(|r| r.client_id).collect();
    let mut names: HashMap<i32, String> = HashMap::new();
    if !ids.is_empty() {
        for cl in Client::find()
            .filter(client::Column::Id.is_in(ids))
            .all(db)
            .await?
        {
            names.insert(cl.id, cl.nom_complete);
        }
    }

    Ok(rows
        .into_iter()
        .map(|r| TopClient {
            nom_complete: names
                .get(&r.client_id)
                .cloned()
                .unwrap_or_else(|| "?".to_string()),
            client_id: r.client_id,
            nb_documents: r.nb_documents,
            total_ttc: round2(r.total_ttc.unwrap_or(0.0)),
        })
        .collect())
}

pub async fn dashboard(
    db: &DatabaseConnection,
    start_date: Option<String>,
    end_date: Option<String>,
) -> Result<DashboardReport, ServiceError> {
    let (start, end) = resolve_range(start_date, end_date);

    let facture_condition = Condition::all()
        .add(facture::Column::DateCreation.gte(start.clone()))
        .add(facture::Column::DateCreation.lte(end.clone()))
        .add(facture::Column::Status.ne(STATUS_ANNULEE));

    let factures_by_status = Facture::find()
        .filter(facture_condition.clone())
        .select_only()
        .column(facture::Column::Status)
        .column_as(facture::Column::Id.count(), "count")
        .column_as(facture::Column::MontantHt.sum(), "total_ht")
        .column_as(facture::Column::MontantTtc.sum(), "total_ttc")
        .column_as(facture::Column::MontantPaye.sum(), "total_paye")
        .column_as(facture::Column::MontantRestant.sum(), "total_restant")
        .group_by(facture::Column::Status)
        .into_model::<FactureStatusRow>()
        .all(db)
        .await?;

    let bl_condition = Condition::all()
        .add(bon_livraison::Column::DateCreation.gte(start.clone()))
        .add(bon_livraison::Column::DateCreation.lte(end.clone()))
        .add(bon_livraison::Column::Status.ne(STATUS_ANNULEE));

    let bls_by_status = BonLivraison::find()
        .filter(bl_condition.clone())
        .select_only()
        .column(bon_livraison::Column::Status)
        .column_as(bon_livraison::Column::Id.count(), "count")
        .column_as(bon_livraison::Column::MontantHt.sum(), "total_ht")
        .column_as(bon_livraison::Column::MontantTtc.sum(), "total_ttc")
        .group_by(bon_livraison::Column::Status)
        .into_model::<BlStatusRow>()
        .all(db)
        .await?;

    #[derive(FromQueryResult)]
    struct Collected {
        total_collected: Option<f64>,
    }

    let collected = Advancement::find()
        .filter(advancement::Column::PaymentDate.gte(start.clone()))
        .filter(advancement::Column::PaymentDate.lte(end.clone()))
        .select_only()
        .column_as(advancement::Column::Amount.sum(), "total_collected")
        .into_model::<Collected>()
        .one(db)
        .await?
        .and_then(|c| c.total_collected)
        .unwrap_or(0.0);

    let top_factures = Facture::find()
        .filter(facture_condition)
        .select_only()
        .column(facture::Column::ClientId)
        .column_as(facture::Column::Id.count(), "nb_documents")
        .column_as(facture::Column::MontantTtc.sum(), "total_ttc")
        .group_by(facture::Column::ClientId)
        .order_by(Expr::cust("total_ttc"), Order::Desc)
        .limit(5)
        .into_model::<TopClientRow>()
        .all(db)
        .await?;

    let top_bls = BonLivraison::find()
        .filter(bl_condition)
        .select_only()
        .column(bon_livraison::Column::ClientId)
        .column_as(bon_livraison::Column::Id.count(), "nb_documents")
        .column_as(bon_livraison::Column::MontantTtc.sum(), "total_ttc")
        .group_by(bon_livraison::Column::ClientId)
        .order_by(Expr::cust("total_ttc"), Order::Desc)
        .limit(5)
        .into_model::<TopClientRow>()
        .all(db)
        .await?;

    let mut facture_totals = FactureTotals {
        count: 0,
        montant_ht: 0.0,
        montant_ttc: 0.0,
        montant_paye: 0.0,
        montant_restant: 0.0,
        taux_recouvrement: "0.0".to_string(),
    };
    for row in &factures_by_status {
        facture_totals.count += row.count;
        facture_totals.montant_ht += row.total_ht.unwrap_or(0.0);
        facture_totals.montant_ttc += row.total_ttc.unwrap_or(0.0);
        facture_totals.montant_paye += row.total_paye.unwrap_or(0.0);
        facture_totals.montant_restant += row.total_restant.unwrap_or(0.0);
    }
    if facture_totals.montant_ttc > 0.0 {
        facture_totals.taux_recouvrement = format!(
            "{:.1}",
            facture_totals.montant_paye / facture_totals.montant_ttc * 100.0
        );
    }
    facture_totals.montant_ht = round2(facture_totals.montant_ht);
    facture_totals.montant_ttc = round2(facture_totals.montant_ttc);
    facture_totals.montant_paye = round2(facture_totals.montant_paye);
    facture_totals.montant_restant = round2(facture_totals.montant_restant);

    let mut bl_totals = BlTotals {
        count: 0,
        montant_ht: 0.0,
        montant_ttc: 0.0,
    };
    for row in &bls_by_status {
        bl_totals.count += row.count;
        bl_totals.montant_ht += row.total_ht.unwrap_or(0.0);
        bl_totals.montant_ttc += row.total_ttc.unwrap_or(0.0);
    }
    bl_totals.montant_ht = round2(bl_totals.montant_ht);
    bl_totals.montant_ttc = round2(bl_totals.montant_ttc);

    Ok(DashboardReport {
        period_start: start,
        period_end: end,
        facture_totals,
        factures_by_status,
        bl_totals,
        bls_by_status,
        total_collected: round2(collected),
        top_clients_factures: resolve_top_clients(db, top_factures).await?,
        top_clients_bls: resolve_top_clients(db, top_bls).await?,
    })
}

// ── Chiffre d'affaires dans le temps ─────────────────────────────────────

#[derive(Debug, FromQueryResult, Serialize)]
pub struct PeriodRow {
    pub period: Option<String>,
    pub count: i64,
    pub total_ht: Option<f64>,
    pub total_ttc: Option<f64>,
}

#[derive(Debug, FromQueryResult, Serialize)]
pub struct PaymentPeriodRow {
    pub period: Option<String>,
    pub count: i64,
    pub total_amount: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct RevenueOverTimeReport {
    pub granularity: String,
    pub factures: Vec<PeriodRow>,
    pub bon_livraisons: Vec<PeriodRow>,
    pub payments: Vec<PaymentPeriodRow>,
}

pub async fn revenue_over_time(
    db: &DatabaseConnection,
    start_date: Option<String>,
    end_date: Option<String>,
    granularity: Option<String>,
) -> Result<RevenueOverTimeReport, ServiceError> {
    let (start, end) = resolve_range(start_date, end_date);
    let granularity = granularity.unwrap_or_else(|| "month".to_string());
    let fmt = strftime_format(&granularity);

    let facture_period = Expr::cust(format!("strftime('{}', date_creation)", fmt));
    let factures = Facture::find()
        .filter(facture::Column::DateCreation.gte(start.clone()))
        .filter(facture::Column::DateCreation.lte(end.clone()))
        .filter(facture::Column::Status.ne(STATUS_ANNULEE))
        .select_only()
        .column_as(facture_period.clone(), "period")
        .column_as(facture::Column::Id.count(), "count")
        .column_as(facture::Column::MontantHt.sum(), "total_ht")
        .column_as(facture::Column::MontantTtc.sum(), "total_ttc")
        .group_by(facture_period.clone())
        .order_by(facture_period, Order::Asc)
        .into_model::<PeriodRow>()
        .all(db)
        .await?;

    let bl_period = Expr::cust(format!("strftime('{}', date_creation)", fmt));
    let bon_livraisons = BonLivraison::find()
        .filter(bon_livraison::Column::DateCreation.gte(start.clone()))
        .filter(bon_livraison::Column::DateCreation.lte(end.clone()))
        .filter(bon_livraison::Column::Status.ne(STATUS_ANNULEE))
        .select_only()
        .column_as(bl_period.clone(), "period")
        .column_as(bon_livraison::Column::Id.count(), "count")
        .column_as(bon_livraison::Column::MontantHt.sum(), "total_ht")
        .column_as(bon_livraison::Column::MontantTtc.sum(), "total_ttc")
        .group_by(bl_period.clone())
        .order_by(bl_period, Order::Asc)
        .into_model::<PeriodRow>()
        .all(db)
        .await?;

    let payment_period = Expr::cust(format!("strftime('{}', payment_date)", fmt));
    let payments = Advancement::find()
        .filter(advancement::Column::PaymentDate.gte(start))
        .filter(advancement::Column::PaymentDate.lte(end))
        .select_only()
        .column_as(payment_period.clone(), "period")
        .column_as(advancement::Column::Id.count(), "count")
        .column_as(advancement::Column::Amount.sum(), "total_amount")
        .group_by(payment_period.clone())
        .order_by(payment_period, Order::Asc)
        .into_model::<PaymentPeriodRow>()
        .all(db)
        .await?;

    Ok(RevenueOverTimeReport {
        granularity,
        factures,
        bon_livraisons,
        payments,
    })
}

// ── État des paiements / balance âgée ────────────────────────────────────

#[derive(Debug, Serialize, Clone)]
pub struct OutstandingDoc {
    pub id: i32,
    pub numero: String,
    pub client_id: i32,
    pub client_nom: Option<String>,
    pub date_reference: String,
    pub montant_ttc: f64,
    pub montant_paye: f64,
    pub montant_restant: f64,
    pub status: String,
    pub mode_reglement: String,
}

#[derive(Debug, Serialize)]
pub struct AgingBucket {
    pub bucket: &'static str,
    pub count: usize,
    pub total_restant: f64,
    pub items: Vec<OutstandingDoc>,
}

#[derive(Debug, FromQueryResult, Serialize)]
pub struct MethodRow {
    pub mode: Option<String>,
    pub count: i64,
    pub total: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct PaymentStatusReport {
    pub facture_aging: Vec<AgingBucket>,
    pub facture_total_outstanding: f64,
    pub bl_aging: Vec<AgingBucket>,
    pub bl_total_outstanding: f64,
    pub total_outstanding: f64,
    pub total_outstanding_count: usize,
    pub facture_payment_methods: Vec<MethodRow>,
    pub bl_payment_methods: Vec<MethodRow>,
    pub advancement_methods: Vec<MethodRow>,
}

fn bucketize(docs: Vec<OutstandingDoc>) -> Vec<AgingBucket> {
    let mut buckets: Vec<AgingBucket> = ["0-30", "31-60", "61-90", "90+"]
        .into_iter()
        .map(|name| AgingBucket {
            bucket: name,
            count: 0,
            total_restant: 0.0,
            items: Vec::new(),
        })
        .collect();

    for doc in docs {
        let days = days_since(&doc.date_reference);
        let idx = if days <= 30 {
            0
        } else if days <= 60 {
            1
        } else if days <= 90 {
            2
        } else {
            3
        };
        buckets[idx].count += 1;
        buckets[idx].total_restant = round2(buckets[idx].total_restant + doc.montant_restant);
        buckets[idx].items.push(doc);
    }

    buckets
}

pub async fn payment_status(
    db: &DatabaseConnection,
    start_date: Option<String>,
    end_date: Option<String>,
) -> Result<PaymentStatusReport, ServiceError> {
    let (start, end) = resolve_range(start_date, end_date);
    let open_statuses = vec!["brouillon", "partiellement_payée"];

    let factures = Facture::find()
        .filter(facture::Column::DateCreation.gte(start.clone()))
        .filter(facture::Column::DateCreation.lte(end.clone()))
        .filter(facture::Column::Status.is_in(open_statuses.clone()))
        .order_by_desc(facture::Column::MontantRestant)
        .find_also_related(Client)
        .all(db)
        .await?;

    let facture_docs: Vec<OutstandingDoc> = factures
        .into_iter()
        .map(|(f, cl)| OutstandingDoc {
            id: f.id,
            numero: f.num_facture,
            client_id: f.client_id,
            client_nom: cl.map(|c| c.nom_complete),
            date_reference: f.date_facturation,
            montant_ttc: f.montant_ttc,
            montant_paye: f.montant_paye,
            montant_restant: f.montant_restant,
            status: f.status,
            mode_reglement: f.mode_reglement,
        })
        .collect();

    let bls = BonLivraison::find()
        .filter(bon_livraison::Column::DateCreation.gte(start.clone()))
        .filter(bon_livraison::Column::DateCreation.lte(end.clone()))
        .filter(bon_livraison::Column::Status.is_in(open_statuses))
        .order_by_desc(bon_livraison::Column::MontantTtc)
        .find_also_related(Client)
        .all(db)
        .await?;

    let bl_docs: Vec<OutstandingDoc> = bls
        .into_iter()
        .map(|(b, cl)| OutstandingDoc {
            id: b.id,
            numero: b.num_bon_livraison,
            client_id: b.client_id,
            client_nom: cl.map(|c| c.nom_complete),
            date_reference: b.date_livraison.unwrap_or_else(|| b.date_creation.clone()),
            montant_ttc: b.montant_ttc,
            montant_paye: round2(b.montant_ttc - b.montant_restant),
            montant_restant: b.montant_restant,
            status: b.status,
            mode_reglement: b.mode_reglement,
        })
        .collect();

    let facture_total = round2(facture_docs.iter().map(|d| d.montant_restant).sum());
    let bl_total = round2(bl_docs.iter().map(|d| d.montant_restant).sum());
    let count = facture_docs.len() + bl_docs.len();

    let facture_methods = Facture::find()
        .filter(facture::Column::DateCreation.gte(start.clone()))
        .filter(facture::Column::DateCreation.lte(end.clone()))
        .filter(facture::Column::Status.eq("payée"))
        .select_only()
        .column_as(facture::Column::ModeReglement, "mode")
        .column_as(facture::Column::Id.count(), "count")
        .column_as(facture::Column::MontantTtc.sum(), "total")
        .group_by(facture::Column::ModeReglement)
        .into_model::<MethodRow>()
        .all(db)
        .await?;

    let bl_methods = BonLivraison::find()
        .filter(bon_livraison::Column::DateCreation.gte(start.clone()))
        .filter(bon_livraison::Column::DateCreation.lte(end.clone()))
        .filter(bon_livraison::Column::Status.eq("payé"))
        .select_only()
        .column_as(bon_livraison::Column::ModeReglement, "mode")
        .column_as(bon_livraison::Column::Id.count(), "count")
        .column_as(bon_livraison::Column::MontantTtc.sum(), "total")
        .group_by(bon_livraison::Column::ModeReglement)
        .into_model::<MethodRow>()
        .all(db)
        .await?;

    let advancement_methods = Advancement::find()
        .filter(advancement::Column::PaymentDate.gte(start))
        .filter(advancement::Column::PaymentDate.lte(end))
        .select_only()
        .column_as(advancement::Column::PaymentMethod, "mode")
        .column_as(advancement::Column::Id.count(), "count")
        .column_as(advancement::Column::Amount.sum(), "total")
        .group_by(advancement::Column::PaymentMethod)
        .into_model::<MethodRow>()
        .all(db)
        .await?;

    Ok(PaymentStatusReport {
        facture_aging: bucketize(facture_docs),
        facture_total_outstanding: facture_total,
        bl_aging: bucketize(bl_docs),
        bl_total_outstanding: bl_total,
        total_outstanding: round2(facture_total + bl_total),
        total_outstanding_count: count,
        facture_payment_methods: facture_methods,
        bl_payment_methods: bl_methods,
        advancement_methods,
    })
}

// ── Classement clients ───────────────────────────────────────────────────

#[derive(Debug, FromQueryResult)]
struct ClientFactureRow {
    client_id: i32,
    nb_factures: i64,
    total_ttc: Option<f64>,
    total_ht: Option<f64>,
    total_paye: Option<f64>,
    total_restant: Option<f64>,
    avg_facture: Option<f64>,
    last_facture_date: Option<String>,
}

#[derive(Debug, FromQueryResult)]
struct ClientBlRow {
    client_id: i32,
    nb_bls: i64,
    total_bl_ttc: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct ClientRanking {
    pub client_id: i32,
    pub nom_complete: String,
    pub telephone: Option<String>,
    pub nb_factures: i64,
    pub total_ttc: f64,
    pub total_ht: f64,
    pub total_paye: f64,
    pub total_restant: f64,
    pub avg_facture: f64,
    pub last_facture_date: Option<String>,
    pub taux_paiement: String,
    pub nb_bls: i64,
    pub total_bl_ttc: f64,
}

pub async fn client_statistics(
    db: &DatabaseConnection,
    start_date: Option<String>,
    end_date: Option<String>,
    limit: Option<u64>,
) -> Result<Vec<ClientRanking>, ServiceError> {
    let (start, end) = resolve_range(start_date, end_date);

    let rows = Facture::find()
        .filter(facture::Column::DateCreation.gte(start.clone()))
        .filter(facture::Column::DateCreation.lte(end.clone()))
        .filter(facture::Column::Status.ne(STATUS_ANNULEE))
        .select_only()
        .column(facture::Column::ClientId)
        .column_as(facture::Column::Id.count(), "nb_factures")
        .column_as(facture::Column::MontantTtc.sum(), "total_ttc")
        .column_as(facture::Column::MontantHt.sum(), "total_ht")
        .column_as(facture::Column::MontantPaye.sum(), "total_paye")
        .column_as(facture::Column::MontantRestant.sum(), "total_restant")
        .column_as(Expr::cust("AVG(montant_ttc)"), "avg_facture")
        .column_as(facture::Column::DateCreation.max(), "last_facture_date")
        .group_by(facture::Column::ClientId)
        .order_by(Expr::cust("total_ttc"), Order::Desc)
        .limit(limit.unwrap_or(10))
        .into_model::<ClientFactureRow>()
        .all(db)
        .await?;

    let bl_rows = BonLivraison::find()
        .filter(bon_livraison::Column::DateCreation.gte(start))
        .filter(bon_livraison::Column::DateCreation.lte(end))
        .filter(bon_livraison::Column::Status.ne(STATUS_ANNULEE))
        .select_only()
        .column(bon_livraison::Column::ClientId)
        .column_as(bon_livraison::Column::Id.count(), "nb_bls")
        .column_as(bon_livraison::Column::MontantTtc.sum(), "total_bl_ttc")
        .group_by(bon_livraison::Column::ClientId)
        .into_model::<ClientBlRow>()
        .all(db)
        .await?;
    let bls_by_client: HashMap<i32, ClientBlRow> =
        bl_rows.into_iter().map(|r| (r.client_id, r)).collect();

    let ids: Vec<i32> = rows.iter().map(|r| r.client_id).collect();
    let mut clients: HashMap<i32, client::Model> = HashMap::new();
    if !ids.is_empty() {
        for cl in Client::find()
            .filter(client::Column::Id.is_in(ids))
            .all(db)
            .await?
        {
            clients.insert(cl.id, cl);
        }
    }

    Ok(rows
        .into_iter()
        .map(|r| {
            let total_ttc = r.total_ttc.unwrap_or(0.0);
            let total_paye = r.total_paye.unwrap_or(0.0);
            let taux = if total_ttc > 0.0 {
                format!("{:.1}", total_paye / total_ttc * 100.0)
            } else {
                "0.0".to_string()
            };
            let cl = clients.get(&r.client_id);
            let bl = bls_by_client.get(&r.client_id);

            ClientRanking {
                client_id: r.client_id,
                nom_complete: cl
                    .map(|c| c.nom_complete.clone())
                    .unwrap_or_else(|| "?".to_string()),
                telephone: cl.and_then(|c| c.telephone.clone()),
                nb_factures: r.nb_factures,
                total_ttc: round2(total_ttc),
                total_ht: round2(r.total_ht.unwrap_or(0.0)),
                total_paye: round2(total_paye),
                total_restant: round2(r.total_restant.unwrap_or(0.0)),
                avg_facture: round2(r.avg_facture.unwrap_or(0.0)),
                last_facture_date: r.last_facture_date,
                taux_paiement: taux,
                nb_bls: bl.map(|b| b.nb_bls).unwrap_or(0),
                total_bl_ttc: round2(bl.and_then(|b| b.total_bl_ttc).unwrap_or(0.0)),
            }
        })
        .collect())
}

// ── Classement produits ──────────────────────────────────────────────────

#[derive(Debug, FromQueryResult)]
struct ProductRow {
    produit_id: i32,
    nb_lignes: i64,
    total_quantite: Option<i64>,
    total_revenue: Option<f64>,
    avg_prix_unitaire: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct ProductRanking {
    pub produit_id: i32,
    pub reference: String,
    pub designation: String,
    pub nb_lignes: i64,
    pub total_quantite: i64,
    pub total_revenue: f64,
    pub avg_prix_unitaire: f64,
}

pub async fn product_statistics(
    db: &DatabaseConnection,
    start_date: Option<String>,
    end_date: Option<String>,
    limit: Option<u64>,
) -> Result<Vec<ProductRanking>, ServiceError> {
    let (start, end) = resolve_range(start_date, end_date);

    // Meilleures ventes à travers les lignes de bons de livraison
    let rows = BonLivraisonProduit::find()
        .inner_join(BonLivraison)
        .filter(bon_livraison::Column::DateCreation.gte(start))
        .filter(bon_livraison::Column::DateCreation.lte(end))
        .filter(bon_livraison::Column::Status.ne(STATUS_ANNULEE))
        .select_only()
        .column(bon_livraison_produit::Column::ProduitId)
        .column_as(bon_livraison_produit::Column::Id.count(), "nb_lignes")
        .column_as(
            bon_livraison_produit::Column::Quantite.sum(),
            "total_quantite",
        )
        .column_as(
            bon_livraison_produit::Column::TotalLigne.sum(),
            "total_revenue",
        )
        .column_as(Expr::cust("AVG(prix_unitaire)"), "avg_prix_unitaire")
        .group_by(bon_livraison_produit::Column::ProduitId)
        .order_by(Expr::cust("total_revenue"), Order::Desc)
        .limit(limit.unwrap_or(10))
        .into_model::<ProductRow>()
        .all(db)
        .await?;

    let ids: Vec<i32> = rows.iter().map(|r| r.produit_id).collect();
    let mut produits: HashMap<i32, (String, String)> = HashMap::new();
    if !ids.is_empty() {
        for p in Produit::find()
            .filter(crate::models::produit::Column::Id.is_in(ids))
            .all(db)
            .await?
        {
            produits.insert(p.id, (p.reference, p.designation));
        }
    }

    Ok(rows
        .into_iter()
        .map(|r| {
            let (reference, designation) = produits
                .get(&r.produit_id)
                .cloned()
                .unwrap_or_else(|| ("?".to_string(), "?".to_string()));
            ProductRanking {
                produit_id: r.produit_id,
                reference,
                designation,
                nb_lignes: r.nb_lignes,
                total_quantite: r.total_quantite.unwrap_or(0),
                total_revenue: round2(r.total_revenue.unwrap_or(0.0)),
                avg_prix_unitaire: round2(r.avg_prix_unitaire.unwrap_or(0.0)),
            }
        })
        .collect())
}

// ── Comparaison de périodes ──────────────────────────────────────────────

#[derive(Debug, Serialize, Default)]
pub struct PeriodStats {
    pub facture_count: i64,
    pub facture_ttc: f64,
    pub facture_paye: f64,
    pub bl_count: i64,
    pub bl_ttc: f64,
}

#[derive(Debug, Serialize)]
pub struct PeriodComparisonReport {
    pub current_start: String,
    pub current_end: String,
    pub previous_start: String,
    pub previous_end: String,
    pub current: PeriodStats,
    pub previous: PeriodStats,
    pub facture_count_change: String,
    pub facture_ttc_change: String,
    pub facture_paye_change: String,
    pub bl_count_change: String,
    pub bl_ttc_change: String,
}

async fn period_stats(
    db: &DatabaseConnection,
    start: &str,
    end: &str,
) -> Result<PeriodStats, ServiceError> {
    #[derive(FromQueryResult)]
    struct FRow {
        count: i64,
        total_ttc: Option<f64>,
        total_paye: Option<f64>,
    }
    #[derive(FromQueryResult)]
    struct BRow {
        count: i64,
        total_ttc: Option<f64>,
    }

    let f = Facture::find()
        .filter(facture::Column::DateCreation.gte(start.to_string()))
        .filter(facture::Column::DateCreation.lte(end.to_string()))
        .filter(facture::Column::Status.ne(STATUS_ANNULEE))
        .select_only()
        .column_as(facture::Column::Id.count(), "count")
        .column_as(facture::Column::MontantTtc.sum(), "total_ttc")
        .column_as(facture::Column::MontantPaye.sum(), "total_paye")
        .into_model::<FRow>()
        .one(db)
        .await?;

    let b = BonLivraison::find()
        .filter(bon_livraison::Column::DateCreation.gte(start.to_string()))
        .filter(bon_livraison::Column::DateCreation.lte(end.to_string()))
        .filter(bon_livraison::Column::Status.ne(STATUS_ANNULEE))
        .select_only()
        .column_as(bon_livraison::Column::Id.count(), "count")
        .column_as(bon_livraison::Column::MontantTtc.sum(), "total_ttc")
        .into_model::<BRow>()
        .one(db)
        .await?;

    let mut stats = PeriodStats::default();
    if let Some(f) = f {
        stats.facture_count = f.count;
        stats.facture_ttc = round2(f.total_ttc.unwrap_or(0.0));
        stats.facture_paye = round2(f.total_paye.unwrap_or(0.0));
    }
    if let Some(b) = b {
        stats.bl_count = b.count;
        stats.bl_ttc = round2(b.total_ttc.unwrap_or(0.0));
    }
    Ok(stats)
}

pub async fn period_comparison(
    db: &DatabaseConnection,
    start_date: Option<String>,
    end_date: Option<String>,
) -> Result<PeriodComparisonReport, ServiceError> {
    let (start, end) = resolve_range(start_date, end_date);

    // Période précédente: même durée, juste avant la période courante
    let parse = |s: &str| {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").or_else(|_| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d").map(|d| d.and_hms_opt(0, 0, 0).unwrap())
        })
    };
    let start_dt = parse(&start)
        .map_err(|_| ServiceError::Validation("Date de début invalide".to_string()))?;
    let end_dt =
        parse(&end).map_err(|_| ServiceError::Validation("Date de fin invalide".to_string()))?;

    let duration = end_dt - start_dt;
    let previous_end = start_dt - chrono::Duration::seconds(1);
    let previous_start = previous_end - duration;

    let previous_start_s = previous_start.format("%Y-%m-%d %H:%M:%S").to_string();
    let previous_end_s = previous_end.format("%Y-%m-%d %H:%M:%S").to_string();

    let current = period_stats(db, &start, &end).await?;
    let previous = period_stats(db, &previous_start_s, &previous_end_s).await?;

    Ok(PeriodComparisonReport {
        facture_count_change: pct_change(
            current.facture_count as f64,
            previous.facture_count as f64,
        ),
        facture_ttc_change: pct_change(current.facture_ttc, previous.facture_ttc),
        facture_paye_change: pct_change(current.facture_paye, previous.facture_paye),
        bl_count_change: pct_change(current.bl_count as f64, previous.bl_count as f64),
        bl_ttc_change: pct_change(current.bl_ttc, previous.bl_ttc),
        current_start: start,
        current_end: end,
        previous_start: previous_start_s,
        previous_end: previous_end_s,
        current,
        previous,
    })
}

// ── Déclaration de TVA ───────────────────────────────────────────────────

#[derive(Debug, FromQueryResult, Serialize)]
pub struct TvaPeriodRow {
    pub period: Option<String>,
    pub base_ht: Option<f64>,
    pub total_tva: Option<f64>,
    pub total_ttc: Option<f64>,
    pub nb_factures: i64,
}

#[derive(Debug, FromQueryResult, Serialize)]
pub struct TvaRateRow {
    pub tva: f64,
    pub nb_factures: i64,
    pub base_ht: Option<f64>,
    pub total_tva: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct TvaReport {
    pub granularity: String,
    pub by_period: Vec<TvaPeriodRow>,
    pub by_rate: Vec<TvaRateRow>,
    pub total_base_ht: f64,
    pub total_tva: f64,
    pub total_ttc: f64,
    pub nb_factures: i64,
}

pub async fn tva_report(
    db: &DatabaseConnection,
    start_date: Option<String>,
    end_date: Option<String>,
    granularity: Option<String>,
) -> Result<TvaReport, ServiceError> {
    let (start, end) = resolve_range(start_date, end_date);
    let granularity = granularity.unwrap_or_else(|| "month".to_string());
    let fmt = strftime_format(&granularity);

    let period = Expr::cust(format!("strftime('{}', date_creation)", fmt));
    let by_period = Facture::find()
        .filter(facture::Column::DateCreation.gte(start.clone()))
        .filter(facture::Column::DateCreation.lte(end.clone()))
        .filter(facture::Column::Status.ne(STATUS_ANNULEE))
        .select_only()
        .column_as(period.clone(), "period")
        .column_as(facture::Column::MontantHt.sum(), "base_ht")
        .column_as(facture::Column::MontantTva.sum(), "total_tva")
        .column_as(facture::Column::MontantTtc.sum(), "total_ttc")
        .column_as(facture::Column::Id.count(), "nb_factures")
        .group_by(period.clone())
        .order_by(period, Order::Asc)
        .into_model::<TvaPeriodRow>()
        .all(db)
        .await?;

    let by_rate = Facture::find()
        .filter(facture::Column::DateCreation.gte(start))
        .filter(facture::Column::DateCreation.lte(end))
        .filter(facture::Column::Status.ne(STATUS_ANNULEE))
        .select_only()
        .column(facture::Column::Tva)
        .column_as(facture::Column::Id.count(), "nb_factures")
        .column_as(facture::Column::MontantHt.sum(), "base_ht")
        .column_as(facture::Column::MontantTva.sum(), "total_tva")
        .group_by(facture::Column::Tva)
        .order_by_asc(facture::Column::Tva)
        .into_model::<TvaRateRow>()
        .all(db)
        .await?;

    let mut total_base = 0.0;
    let mut total_tva = 0.0;
    let mut total_ttc = 0.0;
    let mut nb = 0;
    for row in &by_period {
        total_base += row.base_ht.unwrap_or(0.0);
        total_tva += row.total_tva.unwrap_or(0.0);
        total_ttc += row.total_ttc.unwrap_or(0.0);
        nb += row.nb_factures;
    }

    Ok(TvaReport {
        granularity,
        by_period,
        by_rate,
        total_base_ht: round2(total_base),
        total_tva: round2(total_tva),
        total_ttc: round2(total_ttc),
        nb_factures: nb,
    })
}

// ── Taux de transformation BL → facture ──────────────────────────────────

#[derive(Debug, Serialize)]
pub struct PendingBl {
    pub id: i32,
    pub num_bon_livraison: String,
    pub client_nom: Option<String>,
    pub date_creation: String,
    pub montant_ttc: f64,
    pub status: String,
}

#[derive(Debug, Serialize)]
pub struct BlConversionReport {
    pub total_bls: u64,
    pub converted: u64,
    pub not_converted: u64,
    pub conversion_rate: String,
    pub value_converted: f64,
    pub value_pending: f64,
    pub pending_bls: Vec<PendingBl>,
}

pub async fn bl_conversion(
    db: &DatabaseConnection,
    start_date: Option<String>,
    end_date: Option<String>,
) -> Result<BlConversionReport, ServiceError> {
    let (start, end) = resolve_range(start_date, end_date);

    let in_range = Condition::all()
        .add(bon_livraison::Column::DateCreation.gte(start))
        .add(bon_livraison::Column::DateCreation.lte(end));

    let total_bls = BonLivraison::find()
        .filter(in_range.clone())
        .filter(bon_livraison::Column::Status.ne(STATUS_ANNULEE))
        .count(db)
        .await?;

    let converted = BonLivraison::find()
        .filter(in_range.clone())
        .filter(bon_livraison::Column::IsFacture.eq(true))
        .count(db)
        .await?;

    #[derive(FromQueryResult)]
    struct SumRow {
        total: Option<f64>,
    }

    let value_converted = BonLivraison::find()
        .filter(in_range.clone())
        .filter(bon_livraison::Column::IsFacture.eq(true))
        .select_only()
        .column_as(bon_livraison::Column::MontantTtc.sum(), "total")
        .into_model::<SumRow>()
        .one(db)
        .await?
        .and_then(|r| r.total)
        .unwrap_or(0.0);

    let pending_condition = in_range
        .add(bon_livraison::Column::IsFacture.eq(false))
        .add(bon_livraison::Column::Status.ne(STATUS_ANNULEE));

    let value_pending = BonLivraison::find()
        .filter(pending_condition.clone())
        .select_only()
        .column_as(bon_livraison::Column::MontantTtc.sum(), "total")
        .into_model::<SumRow>()
        .one(db)
        .await?
        .and_then(|r| r.total)
        .unwrap_or(0.0);

    let pending = BonLivraison::find()
        .filter(pending_condition)
        .order_by_desc(bon_livraison::Column::DateCreation)
        .find_also_related(Client)
        .all(db)
        .await?;

    let conversion_rate = if total_bls > 0 {
        format!("{:.1}", converted as f64 / total_bls as f64 * 100.0)
    } else {
        "0.0".to_string()
    };

    Ok(BlConversionReport {
        total_bls,
        converted,
        not_converted: total_bls.saturating_sub(converted),
        conversion_rate,
        value_converted: round2(value_converted),
        value_pending: round2(value_pending),
        pending_bls: pending
            .into_iter()
            .map(|(b, cl)| PendingBl {
                id: b.id,
                num_bon_livraison: b.num_bon_livraison,
                client_nom: cl.map(|c| c.nom_complete),
                date_creation: b.date_creation,
                montant_ttc: b.montant_ttc,
                status: b.status,
            })
            .collect(),
    })
}
