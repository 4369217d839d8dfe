// SPDX-License-Identifier: MIT
// Copyright 2026 RK Dragon Panipuri

//! Customer and dashboard routes (admin session required).

use crate::error::{AppError, Result};
use crate::middleware::auth::AuthAdmin;
use crate::models::Customer;
use crate::routes::{blocking, ok, ok_with, validated, Envelope};
use crate::services::csv_codec::{parse_import, write_export};
use crate::services::{
    Channel, CustomerPage, CustomerQuery, DashboardStats, Delivery, ImportReport, Lookup,
    RowError, StatusFilter,
};
use crate::AppState;
use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;

/// Customer routes. The auth middleware is applied in routes/mod.rs.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/customers", get(list_customers))
        .route("/api/customers/register", post(register))
        .route(
            "/api/customers/{id}",
            get(get_customer).delete(delete_customer),
        )
        .route("/api/customers/search/{mobile}", get(search_by_mobile))
        .route("/api/customers/{id}/stamp", post(add_stamp))
        .route("/api/customers/{id}/share", post(share))
        .route("/api/customers/export/csv", get(export_csv))
        .route("/api/customers/import/csv", post(import_csv))
        .route("/api/dashboard/stats", get(dashboard_stats))
}

#[derive(Serialize)]
struct CustomerResponse {
    customer: Customer,
}

// ─── Registration & lookup ───────────────────────────────────

#[derive(Deserialize, Validate)]
struct RegisterRequest {
    #[validate(length(min = 1, max = 100, message = "Name and mobile required"))]
    name: String,
    #[validate(length(min = 1, message = "Name and mobile required"))]
    mobile: String,
}

async fn register(
    State(state): State<Arc<AppState>>,
    Extension(admin): Extension<AuthAdmin>,
    Json(body): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<Envelope<CustomerResponse>>)> {
    let body = validated(body)?;
    let customer = blocking(&state, move |s| s.ledger.register(&body.name, &body.mobile)).await?;
    tracing::debug!(customer_id = %customer.id, admin = %admin.username, "Registered by admin");

    Ok((
        StatusCode::CREATED,
        ok_with(
            "Customer registered successfully",
            CustomerResponse { customer },
        ),
    ))
}

async fn get_customer(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Envelope<CustomerResponse>>> {
    let customer = state.ledger.lookup(Lookup::Id(id))?;
    Ok(ok(CustomerResponse { customer }))
}

async fn search_by_mobile(
    State(state): State<Arc<AppState>>,
    Path(mobile): Path<String>,
) -> Result<Json<Envelope<CustomerResponse>>> {
    let customer = state.ledger.lookup(Lookup::Mobile(mobile))?;
    Ok(ok(CustomerResponse { customer }))
}

async fn delete_customer(
    State(state): State<Arc<AppState>>,
    Extension(admin): Extension<AuthAdmin>,
    Path(id): Path<String>,
) -> Result<Json<Envelope<CustomerResponse>>> {
    let customer = blocking(&state, move |s| s.ledger.delete(&id)).await?;
    tracing::info!(customer_id = %customer.id, admin = %admin.username, "Customer deleted by admin");
    Ok(ok_with("Customer deleted", CustomerResponse { customer }))
}

// ─── Listing ─────────────────────────────────────────────────

#[derive(Deserialize)]
struct ListQuery {
    page: Option<usize>,
    limit: Option<usize>,
    search: Option<String>,
    #[serde(default)]
    status: StatusFilter,
}

async fn list_customers(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Envelope<CustomerPage>>> {
    let page = state.ledger.list(&CustomerQuery {
        page: query.page,
        limit: query.limit,
        search: query.search,
        status: query.status,
    })?;
    Ok(ok(page))
}

#[derive(Serialize)]
struct StatsResponse {
    stats: DashboardStats,
}

async fn dashboard_stats(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Envelope<StatsResponse>>> {
    let stats = state.ledger.stats()?;
    Ok(ok(StatsResponse { stats }))
}

// ─── Stamps & sharing ────────────────────────────────────────

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StampResponse {
    customer: Customer,
    is_completed: bool,
}

async fn add_stamp(
    State(state): State<Arc<AppState>>,
    Extension(admin): Extension<AuthAdmin>,
    Path(id): Path<String>,
) -> Result<Json<Envelope<StampResponse>>> {
    let outcome = state.ledger.add_stamp(&id, &admin.username).await?;

    let message = if outcome.completed {
        "Loyalty card completed! Customer earned reward!"
    } else {
        "Stamp added successfully"
    };
    Ok(ok_with(
        message,
        StampResponse {
            customer: outcome.customer,
            is_completed: outcome.completed,
        },
    ))
}

#[derive(Deserialize)]
struct ShareRequest {
    method: String,
    #[serde(default)]
    contact: Option<String>,
}

#[derive(Serialize)]
struct ShareResponse {
    result: Delivery,
}

async fn share(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<ShareRequest>,
) -> Result<Json<Envelope<ShareResponse>>> {
    let channel: Channel = body
        .method
        .parse()
        .map_err(|_| AppError::Validation("Invalid sharing method".to_string()))?;

    let result = state
        .ledger
        .share(&id, channel, body.contact.as_deref())
        .await?;
    Ok(ok_with(
        format!("Customer details shared via {channel}"),
        ShareResponse { result },
    ))
}

// ─── CSV ─────────────────────────────────────────────────────

async fn export_csv(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse> {
    let customers = state.ledger.export_all()?;
    let csv = write_export(&customers)?;
    tracing::info!(count = customers.len(), "Customers exported");

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"rk-dragon-customers.csv\"",
            ),
        ],
        csv,
    ))
}

#[derive(Serialize)]
struct ImportResponse {
    results: ImportReport,
}

/// Import a CSV document sent as the raw request body.
async fn import_csv(
    State(state): State<Arc<AppState>>,
    Extension(admin): Extension<AuthAdmin>,
    body: Bytes,
) -> Result<Json<Envelope<ImportResponse>>> {
    if body.is_empty() {
        return Err(AppError::Validation("No CSV data received".to_string()));
    }

    let parsed = parse_import(&body)?;
    let rows = parsed.rows;
    let mut report = blocking(&state, move |s| s.ledger.bulk_import(rows)).await?;

    for (row, message) in parsed.unreadable {
        report.rejected += 1;
        report.errors.push(RowError {
            row,
            id: None,
            message,
        });
    }
    report.errors.sort_by_key(|e| e.row);

    tracing::info!(
        admin = %admin.username,
        created = report.created,
        merged = report.merged,
        rejected = report.rejected,
        "CSV import finished"
    );

    let message = format!(
        "Import completed: {} created, {} merged, {} rejected",
        report.created, report.merged, report.rejected
    );
    Ok(ok_with(message, ImportResponse { results: report }))
}
