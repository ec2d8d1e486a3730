// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

use crate::models::booking::{Booking, BookingQuery, BookingStatus};
use crate::services::db::SqliteClient;
use chrono::{NaiveDate, Utc};
use thiserror::Error;

const BOOKING_COLUMNS: &str = "id, name, phone, email, service, booking_date, booking_time, \
     comment, status, created_at";

/// Validated booking request.
#[derive(Debug, Clone)]
pub struct NewBooking {
    pub name: String,
    pub phone: String,
    pub email: Option<String>,
    pub service: String,
    pub date: NaiveDate,
    /// `HH:MM`
    pub time: String,
    pub comment: Option<String>,
}

#[derive(Debug, Error)]
pub enum BookingError {
    #[error("This time slot is already booked")]
    SlotTaken,

    #[error(transparent)]
    Database(sqlx::Error),
}

/// The live-slot unique index is the only unique constraint on bookings.
impl From<sqlx::Error> for BookingError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => BookingError::SlotTaken,
            _ => BookingError::Database(err),
        }
    }
}

impl SqliteClient {
    /// Create a pending booking unless a non-cancelled one holds the same slot.
    pub async fn create_booking(&self, booking: &NewBooking) -> Result<Booking, BookingError> {
        let query = format!(
            "INSERT INTO bookings
             (site, name, phone, email, service, booking_date, booking_time, comment, status, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             RETURNING {BOOKING_COLUMNS}"
        );
        let created = sqlx::query_as(&query)
            .bind(self.site())
            .bind(&booking.name)
            .bind(&booking.phone)
            .bind(&booking.email)
            .bind(&booking.service)
            .bind(booking.date)
            .bind(&booking.time)
            .bind(&booking.comment)
            .bind(BookingStatus::Pending)
            .bind(Utc::now())
            .fetch_one(self.pool())
            .await?;
        Ok(created)
    }

    /// Times already held on `date` by non-cancelled bookings.
    pub async fn taken_slots(&self, date: NaiveDate) -> Result<Vec<String>, sqlx::Error> {
        sqlx::query_scalar(
            "SELECT DISTINCT booking_time FROM bookings
             WHERE site = ? AND booking_date = ? AND status != ?
             ORDER BY booking_time",
        )
        .bind(self.site())
        .bind(date)
        .bind(BookingStatus::Cancelled)
        .fetch_all(self.pool())
        .await
    }

    pub async fn list_bookings(&self, filter: &BookingQuery) -> Result<Vec<Booking>, sqlx::Error> {
        let query = format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings
             WHERE site = ?
               AND (? IS NULL OR booking_date = ?)
               AND (? IS NULL OR status = ?)
             ORDER BY booking_date DESC, booking_time DESC, id DESC"
        );
        sqlx::query_as(&query)
            .bind(self.site())
            .bind(filter.date)
            .bind(filter.date)
            .bind(filter.status)
            .bind(filter.status)
            .fetch_all(self.pool())
            .await
    }

    pub async fn get_booking(&self, id: i64) -> Result<Option<Booking>, sqlx::Error> {
        let query = format!("SELECT {BOOKING_COLUMNS} FROM bookings WHERE id = ? AND site = ?");
        sqlx::query_as(&query)
            .bind(id)
            .bind(self.site())
            .fetch_optional(self.pool())
            .await
    }

    /// Change status and/or comment; `None` keeps the current value.
    ///
    /// Reviving a cancelled booking whose slot was taken since fails with
    /// [`BookingError::SlotTaken`].
    pub async fn update_booking(
        &self,
        id: i64,
        status: Option<BookingStatus>,
        comment: Option<&str>,
    ) -> Result<Option<Booking>, BookingError> {
        let query = format!(
            "UPDATE bookings
             SET status = COALESCE(?, status), comment = COALESCE(?, comment)
             WHERE id = ? AND site = ?
             RETURNING {BOOKING_COLUMNS}"
        );
        let updated = sqlx::query_as(&query)
            .bind(status)
            .bind(comment)
            .bind(id)
            .bind(self.site())
            .fetch_optional(self.pool())
            .await?;
        Ok(updated)
    }

    pub async fn delete_booking(&self, id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM bookings WHERE id = ? AND site = ?")
            .bind(id)
            .bind(self.site())
            .execute(self.pool())
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
