// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

//! Newsletter subscribers and newsletter drafts.

use crate::models::newsletter::{Newsletter, NewsletterInput, Subscription, SubscriptionStatus};
use crate::services::auth::AuthService;
use crate::services::db::SqliteClient;
use chrono::Utc;

const SUBSCRIPTION_COLUMNS: &str = "id, email, name, status, created_at, updated_at";
const NEWSLETTER_COLUMNS: &str =
    "id, subject, body, sent_at, recipients_count, created_at, updated_at";

/// Active subscriber as needed for a mailing.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Recipient {
    pub id: i64,
    pub email: String,
}

/// A newsletter claimed for sending with the subscribers it goes to.
#[derive(Debug)]
pub struct NewsletterClaim {
    pub newsletter: Newsletter,
    pub recipients: Vec<Recipient>,
}

impl SqliteClient {
    // ========== Subscriptions ==========

    /// Subscribe `email` to the site's newsletter.
    ///
    /// Returns the subscription and whether anything changed: an already active
    /// address is left as is, an unsubscribed one is reactivated.
    pub async fn subscribe(
        &self,
        email: &str,
        name: Option<&str>,
    ) -> Result<(Subscription, bool), sqlx::Error> {
        let now = Utc::now();
        let (_, token_hash) = AuthService::generate_token();
        let mut tx = self.pool().begin().await?;

        let existing: Option<Subscription> = sqlx::query_as(&format!(
            "SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions WHERE site = ? AND email = ?"
        ))
        .bind(self.site())
        .bind(email)
        .fetch_optional(&mut *tx)
        .await?;

        let result = match existing {
            Some(sub) if sub.status == SubscriptionStatus::Active => (sub, false),
            Some(sub) => {
                let reactivated = sqlx::query_as(&format!(
                    "UPDATE subscriptions
                     SET status = ?, name = COALESCE(?, name), unsubscribe_token_hash = ?,
                         updated_at = ?
                     WHERE id = ?
                     RETURNING {SUBSCRIPTION_COLUMNS}"
                ))
                .bind(SubscriptionStatus::Active)
                .bind(name)
                .bind(&token_hash)
                .bind(now)
                .bind(sub.id)
                .fetch_one(&mut *tx)
                .await?;
                sqlx::query("DELETE FROM subscription_tokens WHERE subscription_id = ?")
                    .bind(sub.id)
                    .execute(&mut *tx)
                    .await?;
                (reactivated, true)
            }
            None => {
                let created = sqlx::query_as(&format!(
                    "INSERT INTO subscriptions
                     (site, email, name, status, unsubscribe_token_hash, created_at, updated_at)
                     VALUES (?, ?, ?, ?, ?, ?, ?)
                     RETURNING {SUBSCRIPTION_COLUMNS}"
                ))
                .bind(self.site())
                .bind(email)
                .bind(name)
                .bind(SubscriptionStatus::Active)
                .bind(&token_hash)
                .bind(now)
                .bind(now)
                .fetch_one(&mut *tx)
                .await?;
                (created, true)
            }
        };

        tx.commit().await?;
        Ok(result)
    }

    /// Mark the subscription owning `token_hash` as unsubscribed.
    ///
    /// Matches the token issued at subscribe time as well as any token sent
    /// out with a mailing.
    pub async fn unsubscribe(&self, token_hash: &str) -> Result<Option<Subscription>, sqlx::Error> {
        let query = format!(
            "UPDATE subscriptions SET status = ?, updated_at = ?
             WHERE site = ?
               AND (unsubscribe_token_hash = ?
                    OR id IN (SELECT subscription_id FROM subscription_tokens WHERE token_hash = ?))
             RETURNING {SUBSCRIPTION_COLUMNS}"
        );
        sqlx::query_as(&query)
            .bind(SubscriptionStatus::Unsubscribed)
            .bind(Utc::now())
            .bind(self.site())
            .bind(token_hash)
            .bind(token_hash)
            .fetch_optional(self.pool())
            .await
    }

    pub async fn list_subscriptions(
        &self,
        status: Option<SubscriptionStatus>,
    ) -> Result<Vec<Subscription>, sqlx::Error> {
        let query = format!(
            "SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions
             WHERE site = ? AND (? IS NULL OR status = ?)
             ORDER BY created_at DESC, id DESC"
        );
        sqlx::query_as(&query)
            .bind(self.site())
            .bind(status)
            .bind(status)
            .fetch_all(self.pool())
            .await
    }

    pub async fn delete_subscription(&self, id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM subscriptions WHERE id = ? AND site = ?")
            .bind(id)
            .bind(self.site())
            .execute(self.pool())
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Issue an unsubscribe token for one mailing and return the raw token.
    ///
    /// Only the hash is kept. Tokens from earlier mailings keep working until
    /// the address resubscribes.
    pub async fn issue_unsubscribe_token(&self, subscription_id: i64) -> Result<String, sqlx::Error> {
        let (raw_token, token_hash) = AuthService::generate_token();
        sqlx::query(
            "INSERT INTO subscription_tokens (subscription_id, token_hash, created_at)
             SELECT id, ?, ? FROM subscriptions WHERE id = ? AND site = ?",
        )
        .bind(&token_hash)
        .bind(Utc::now())
        .bind(subscription_id)
        .bind(self.site())
        .execute(self.pool())
        .await?;
        Ok(raw_token)
    }

    // ========== Newsletters ==========

    pub async fn list_newsletters(&self) -> Result<Vec<Newsletter>, sqlx::Error> {
        let query = format!(
            "SELECT {NEWSLETTER_COLUMNS} FROM newsletters WHERE site = ? ORDER BY created_at DESC, id DESC"
        );
        sqlx::query_as(&query)
            .bind(self.site())
            .fetch_all(self.pool())
            .await
    }

    pub async fn get_newsletter(&self, id: i64) -> Result<Option<Newsletter>, sqlx::Error> {
        let query = format!("SELECT {NEWSLETTER_COLUMNS} FROM newsletters WHERE id = ? AND site = ?");
        sqlx::query_as(&query)
            .bind(id)
            .bind(self.site())
            .fetch_optional(self.pool())
            .await
    }

    pub async fn create_newsletter(&self, input: &NewsletterInput) -> Result<Newsletter, sqlx::Error> {
        let now = Utc::now();
        let query = format!(
            "INSERT INTO newsletters (site, subject, body, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?)
             RETURNING {NEWSLETTER_COLUMNS}"
        );
        sqlx::query_as(&query)
            .bind(self.site())
            .bind(&input.subject)
            .bind(&input.body)
            .bind(now)
            .bind(now)
            .fetch_one(self.pool())
            .await
    }

    /// Update a draft. Sent newsletters are left untouched and yield `None`.
    pub async fn update_newsletter(
        &self,
        id: i64,
        input: &NewsletterInput,
    ) -> Result<Option<Newsletter>, sqlx::Error> {
        let query = format!(
            "UPDATE newsletters SET subject = ?, body = ?, updated_at = ?
             WHERE id = ? AND site = ? AND sent_at IS NULL
             RETURNING {NEWSLETTER_COLUMNS}"
        );
        sqlx::query_as(&query)
            .bind(&input.subject)
            .bind(&input.body)
            .bind(Utc::now())
            .bind(id)
            .bind(self.site())
            .fetch_optional(self.pool())
            .await
    }

    pub async fn delete_newsletter(&self, id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM newsletters WHERE id = ? AND site = ?")
            .bind(id)
            .bind(self.site())
            .execute(self.pool())
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Stamp `sent_at` on a draft and snapshot its active recipients.
    ///
    /// Both happen in one transaction, so a failed recipient lookup leaves the
    /// draft unclaimed. Returns `None` when the newsletter does not exist or
    /// was already sent, so two concurrent send requests cannot both go out.
    pub async fn claim_newsletter_for_sending(
        &self,
        id: i64,
    ) -> Result<Option<NewsletterClaim>, sqlx::Error> {
        let now = Utc::now();
        let mut tx = self.pool().begin().await?;

        let query = format!(
            "UPDATE newsletters SET sent_at = ?, updated_at = ?
             WHERE id = ? AND site = ? AND sent_at IS NULL
             RETURNING {NEWSLETTER_COLUMNS}"
        );
        let newsletter: Option<Newsletter> = sqlx::query_as(&query)
            .bind(now)
            .bind(now)
            .bind(id)
            .bind(self.site())
            .fetch_optional(&mut *tx)
            .await?;
        let Some(newsletter) = newsletter else {
            return Ok(None);
        };

        let recipients = sqlx::query_as(
            "SELECT id, email FROM subscriptions WHERE site = ? AND status = ? ORDER BY id",
        )
        .bind(self.site())
        .bind(SubscriptionStatus::Active)
        .fetch_all(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Some(NewsletterClaim {
            newsletter,
            recipients,
        }))
    }

    pub async fn set_newsletter_recipients(
        &self,
        id: i64,
        recipients_count: i64,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE newsletters SET recipients_count = ? WHERE id = ? AND site = ?")
            .bind(recipients_count)
            .bind(id)
            .bind(self.site())
            .execute(self.pool())
            .await?;
        Ok(())
    }
}
