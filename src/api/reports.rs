use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use sea_orm::DatabaseConnection;
use serde::Deserialize;
use serde_json::json;

use crate::api::{RangeQuery, error_response};
use crate::services::report_service;

#[derive(Debug, Deserialize)]
pub struct PeriodQuery {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub granularity: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RankingQuery {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub limit: Option<u64>,
}

pub async fn get_dashboard(
    State(db): State<DatabaseConnection>,
    Query(range): Query<RangeQuery>,
) -> impl IntoResponse {
    match report_service::dashboard(&db, range.start_date, range.end_date).await {
        Ok(report) => (
            StatusCode::OK,
            Json(json!({ "success": true, "dashboard": report })),
        )
            .into_response(),
        Err(e) => error_response(e),
    }
}

pub async fn get_revenue_over_time(
    State(db): State<DatabaseConnection>,
    Query(params): Query<PeriodQuery>,
) -> impl IntoResponse {
    match report_service::revenue_over_time(
        &db,
        params.start_date,
        params.end_date,
        params.granularity,
    )
    .await
    {
        Ok(report) => (
            StatusCode::OK,
            Json(json!({ "success": true, "revenue": report })),
        )
            .into_response(),
        Err(e) => error_response(e),
    }
}

pub async fn get_payment_status(
    State(db): State<DatabaseConnection>,
    Query(range): Query<RangeQuery>,
) -> impl IntoResponse {
    match report_service::payment_status(&db, range.start_date, range.end_date).await {
        Ok(report) => (
            StatusCode::OK,
            Json(json!({ "success": true, "payment_status": report })),
        )
            .into_response(),
        Err(e) => error_response(e),
    }
}

pub async fn get_client_statistics(
    State(db): State<DatabaseConnection>,
    Query(params): Query<RankingQuery>,
) -> impl IntoResponse {
    match report_service::client_statistics(&db, params.start_date, params.end_date, params.limit)
        .await
    {
        Ok(clients) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "clients": clients,
                "count": clients.len()
            })),
        )
            .into_response(),
        Err(e) => error_response(e),
    }
}

pub async fn get_product_statistics(
    State(db): State<DatabaseConnection>,
    Query(params): Query<RankingQuery>,
) -> impl IntoResponse {
    match report_service::product_statistics(&db, params.start_date, params.end_date, params.limit)
        .await
    {
        Ok(products) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "products": products,
                "count": products.len()
            })),
        )
            .into_response(),
        Err(e) => error_response(e),
    }
}

pub async fn get_period_comparison(
    State(db): State<DatabaseConnection>,
    Query(range): Query<RangeQuery>,
) -> impl IntoResponse {
    match report_service::period_comparison(&db, range.start_date, range.end_date).await {
        Ok(report) => (
            StatusCode::OK,
            Json(json!({ "success": true, "comparison": report })),
        )
            .into_response(),
        Err(e) => error_response(e),
    }
}

pub async fn get_tva_report(
    State(db): State<DatabaseConnection>,
    Query(params): Query<PeriodQuery>,
) -> impl IntoResponse {
    match report_service::tva_report(&db, params.start_date, params.end_date, params.granularity)
        .await
    {
        Ok(report) => (
            StatusCode::OK,
            Json(json!({ "success": true, "tva": report })),
        )
            .into_response(),
        Err(e) => error_response(e),
    }
}

pub async fn get_bl_conversion(
    State(db): State<DatabaseConnection>,
    Query(range): Query<RangeQuery>,
) -> impl IntoResponse {
    match report_service::bl_conversion(&db, range.start_date, range.end_date).await {
        Ok(report) => (
            StatusCode::OK,
            Json(json!({ "success": true, "conversion": report })),
        )
            .into_response(),
        Err(e) => error_response(e),
    }
}
