// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "lowercase")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Cancelled,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Booking {
    pub id: i64,
    pub name: String,
    pub phone: String,
    pub email: Option<String>,
    pub service: String,
    pub booking_date: NaiveDate,
    /// `HH:MM`
    pub booking_time: String,
    pub comment: Option<String>,
    pub status: BookingStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct CreateBookingRequest {
    pub name: String,
    pub phone: String,
    #[serde(default)]
    pub email: Option<String>,
    pub service: String,
    pub date: String,
    pub time: String,
    #[serde(default)]
    pub comment: Option<String>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct UpdateBookingRequest {
    pub status: Option<BookingStatus>,
    pub comment: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct BookingQuery {
    pub date: Option<NaiveDate>,
    pub status: Option<BookingStatus>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SlotsQuery {
    pub date: NaiveDate,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SlotsResponse {
    pub date: NaiveDate,
    pub taken: Vec<String>,
}
