// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

//! Appointment bookings.

use crate::app::{AdminScope, AppState, ClientIp, SiteDb, StaffScope};
use crate::error::{ApiError, ApiResult};
use crate::models::booking::{
    Booking, BookingQuery, CreateBookingRequest, SlotsQuery, SlotsResponse, UpdateBookingRequest,
};
use crate::models::common::{ListResponse, MessageResponse};
use crate::routes::{enforce_rate_limit, found_or_404, notify_in_background};
use crate::services::booking_db::NewBooking;
use crate::services::logging::anonymize_phone;
use crate::services::telegram::format_booking;
use crate::services::validation::{
    max_chars, normalize_name, normalize_optional_email, normalize_phone, require_text,
    MESSAGE_MAX_CHARS,
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::{NaiveDate, NaiveTime, Utc};

const SERVICE_MAX_CHARS: usize = 200;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/bookings", post(create_booking_handler))
        .route("/bookings/slots", get(slots_handler))
        .route("/admin/bookings", get(list_bookings_handler))
        .route(
            "/admin/bookings/{id}",
            get(get_booking_handler)
                .patch(update_booking_handler)
                .delete(delete_booking_handler),
        )
}

/// `YYYY-MM-DD`, not before `today`.
fn parse_booking_date(value: &str, today: NaiveDate) -> ApiResult<NaiveDate> {
    let date = NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|_| ApiError::bad_request("date must be YYYY-MM-DD"))?;
    if date < today {
        return Err(ApiError::bad_request("date cannot be in the past"));
    }
    Ok(date)
}

/// Strict `HH:MM`, returned zero-padded.
fn parse_booking_time(value: &str) -> ApiResult<String> {
    let value = value.trim();
    if value.len() != 5 {
        return Err(ApiError::bad_request("time must be HH:MM"));
    }
    NaiveTime::parse_from_str(value, "%H:%M")
        .map(|t| t.format("%H:%M").to_string())
        .map_err(|_| ApiError::bad_request("time must be HH:MM"))
}

fn validate_booking(payload: CreateBookingRequest, today: NaiveDate) -> ApiResult<NewBooking> {
    let service = require_text("service", &payload.service)?;
    max_chars("service", Some(&service), SERVICE_MAX_CHARS)?;
    max_chars("comment", payload.comment.as_deref(), MESSAGE_MAX_CHARS)?;

    Ok(NewBooking {
        name: normalize_name(&payload.name)?,
        phone: normalize_phone(&payload.phone)?,
        email: normalize_optional_email(payload.email.as_deref())?,
        service,
        date: parse_booking_date(&payload.date, today)?,
        time: parse_booking_time(&payload.time)?,
        comment: payload.comment.filter(|c| !c.trim().is_empty()),
    })
}

/// POST /api/bookings
#[utoipa::path(
    post,
    path = "/api/bookings",
    tag = "bookings",
    request_body = CreateBookingRequest,
    params(("X-Site" = Option<String>, Header, description = "Site key")),
    responses(
        (status = 201, description = "Booking requested", body = Booking),
        (status = 400, description = "Invalid contact, date or time", body = MessageResponse),
        (status = 409, description = "Slot already taken", body = MessageResponse),
        (status = 429, description = "Rate limit exceeded", body = MessageResponse)
    )
)]
pub async fn create_booking_handler(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    SiteDb(db): SiteDb,
    Json(payload): Json<CreateBookingRequest>,
) -> ApiResult<(StatusCode, Json<Booking>)> {
    enforce_rate_limit(&state.lead_limiter, ip)?;
    let booking = validate_booking(payload, Utc::now().date_naive())?;
    let created = db.create_booking(&booking).await?;

    tracing::info!(
        site = db.site(),
        booking_id = created.id,
        date = %created.booking_date,
        time = %created.booking_time,
        phone = %anonymize_phone(&created.phone),
        "Booking created"
    );

    let text = format_booking(db.site(), &created);
    notify_in_background(&state, db, text, "booking");

    Ok((StatusCode::CREATED, Json(created)))
}

/// GET /api/bookings/slots?date=YYYY-MM-DD
#[utoipa::path(
    get,
    path = "/api/bookings/slots",
    tag = "bookings",
    params(("X-Site" = Option<String>, Header, description = "Site key"), SlotsQuery),
    responses(
        (status = 200, description = "Taken times on the date", body = SlotsResponse)
    )
)]
pub async fn slots_handler(
    SiteDb(db): SiteDb,
    Query(query): Query<SlotsQuery>,
) -> ApiResult<Json<SlotsResponse>> {
    let taken = db.taken_slots(query.date).await?;
    Ok(Json(SlotsResponse {
        date: query.date,
        taken,
    }))
}

/// GET /api/admin/bookings?date=&status=
async fn list_bookings_handler(
    StaffScope { db, .. }: StaffScope,
    Query(filter): Query<BookingQuery>,
) -> ApiResult<Json<ListResponse<Booking>>> {
    Ok(Json(db.list_bookings(&filter).await?.into()))
}

/// GET /api/admin/bookings/{id}
async fn get_booking_handler(
    StaffScope { db, .. }: StaffScope,
    Path(id): Path<i64>,
) -> ApiResult<Json<Booking>> {
    db.get_booking(id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Booking"))
}

/// PATCH /api/admin/bookings/{id}
async fn update_booking_handler(
    AdminScope { db, .. }: AdminScope,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateBookingRequest>,
) -> ApiResult<Json<Booking>> {
    max_chars("comment", payload.comment.as_deref(), MESSAGE_MAX_CHARS)?;
    db.update_booking(id, payload.status, payload.comment.as_deref())
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Booking"))
}

/// DELETE /api/admin/bookings/{id}
async fn delete_booking_handler(
    AdminScope { db, .. }: AdminScope,
    Path(id): Path<i64>,
) -> ApiResult<Json<MessageResponse>> {
    found_or_404(db.delete_booking(id).await?, "Booking")?;
    Ok(Json(MessageResponse::ok("Booking deleted")))
}
