// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

//! Portfolio, review, contact and hexagon queries.

use crate::models::content::{
    Contact, ContactInput, Hexagon, HexagonInput, PortfolioInput, PortfolioProject, Review,
};
use crate::services::db::SqliteClient;
use chrono::Utc;

const PORTFOLIO_COLUMNS: &str =
    "id, title, description, image_url, link_url, category, sort_order, created_at";
const REVIEW_COLUMNS: &str = "id, author, rating, text, approved, created_at";
const CONTACT_COLUMNS: &str = "id, kind, label, value, sort_order";
const HEXAGON_COLUMNS: &str = "id, title, text, icon, link, color, sort_order";

impl SqliteClient {
    async fn delete_by_id(&self, table: &'static str, id: i64) -> Result<bool, sqlx::Error> {
        let query = format!("DELETE FROM {table} WHERE id = ? AND site = ?");
        let result = sqlx::query(&query)
            .bind(id)
            .bind(self.site())
            .execute(self.pool())
            .await?;
        Ok(result.rows_affected() > 0)
    }

    // ========== Portfolio ==========

    pub async fn list_portfolio(&self) -> Result<Vec<PortfolioProject>, sqlx::Error> {
        let query = format!(
            "SELECT {PORTFOLIO_COLUMNS} FROM portfolio_projects WHERE site = ? ORDER BY sort_order, id"
        );
        sqlx::query_as(&query)
            .bind(self.site())
            .fetch_all(self.pool())
            .await
    }

    pub async fn get_portfolio(&self, id: i64) -> Result<Option<PortfolioProject>, sqlx::Error> {
        let query = format!(
            "SELECT {PORTFOLIO_COLUMNS} FROM portfolio_projects WHERE id = ? AND site = ?"
        );
        sqlx::query_as(&query)
            .bind(id)
            .bind(self.site())
            .fetch_optional(self.pool())
            .await
    }

    pub async fn create_portfolio(
        &self,
        input: &PortfolioInput,
    ) -> Result<PortfolioProject, sqlx::Error> {
        let query = format!(
            "INSERT INTO portfolio_projects
             (site, title, description, image_url, link_url, category, sort_order, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)
             RETURNING {PORTFOLIO_COLUMNS}"
        );
        sqlx::query_as(&query)
            .bind(self.site())
            .bind(&input.title)
            .bind(&input.description)
            .bind(&input.image_url)
            .bind(&input.link_url)
            .bind(&input.category)
            .bind(input.sort_order)
            .bind(Utc::now())
            .fetch_one(self.pool())
            .await
    }

    pub async fn update_portfolio(
        &self,
        id: i64,
        input: &PortfolioInput,
    ) -> Result<Option<PortfolioProject>, sqlx::Error> {
        let query = format!(
            "UPDATE portfolio_projects
             SET title = ?, description = ?, image_url = ?, link_url = ?, category = ?, sort_order = ?
             WHERE id = ? AND site = ?
             RETURNING {PORTFOLIO_COLUMNS}"
        );
        sqlx::query_as(&query)
            .bind(&input.title)
            .bind(&input.description)
            .bind(&input.image_url)
            .bind(&input.link_url)
            .bind(&input.category)
            .bind(input.sort_order)
            .bind(id)
            .bind(self.site())
            .fetch_optional(self.pool())
            .await
    }

    pub async fn delete_portfolio(&self, id: i64) -> Result<bool, sqlx::Error> {
        self.delete_by_id("portfolio_projects", id).await
    }

    pub async fn reorder_portfolio(&self, ids: &[i64]) -> Result<(), sqlx::Error> {
        self.reorder("portfolio_projects", ids).await
    }

    // ========== Reviews ==========

    pub async fn list_reviews(&self, approved: Option<bool>) -> Result<Vec<Review>, sqlx::Error> {
        let query = format!(
            "SELECT {REVIEW_COLUMNS} FROM reviews
             WHERE site = ? AND (? IS NULL OR approved = ?)
             ORDER BY created_at DESC, id DESC"
        );
        sqlx::query_as(&query)
            .bind(self.site())
            .bind(approved)
            .bind(approved)
            .fetch_all(self.pool())
            .await
    }

    /// New reviews wait for moderation.
    pub async fn create_review(
        &self,
        author: &str,
        rating: i64,
        text: &str,
    ) -> Result<Review, sqlx::Error> {
        let query = format!(
            "INSERT INTO reviews (site, author, rating, text, approved, created_at)
             VALUES (?, ?, ?, ?, 0, ?)
             RETURNING {REVIEW_COLUMNS}"
        );
        sqlx::query_as(&query)
            .bind(self.site())
            .bind(author)
            .bind(rating)
            .bind(text)
            .bind(Utc::now())
            .fetch_one(self.pool())
            .await
    }

    pub async fn update_review(
        &self,
        id: i64,
        approved: Option<bool>,
        text: Option<&str>,
    ) -> Result<Option<Review>, sqlx::Error> {
        let query = format!(
            "UPDATE reviews
             SET approved = COALESCE(?, approved), text = COALESCE(?, text)
             WHERE id = ? AND site = ?
             RETURNING {REVIEW_COLUMNS}"
        );
        sqlx::query_as(&query)
            .bind(approved)
            .bind(text)
            .bind(id)
            .bind(self.site())
            .fetch_optional(self.pool())
            .await
    }

    pub async fn delete_review(&self, id: i64) -> Result<bool, sqlx::Error> {
        self.delete_by_id("reviews", id).await
    }

    // ========== Contacts ==========

    pub async fn list_contacts(&self) -> Result<Vec<Contact>, sqlx::Error> {
        let query =
            format!("SELECT {CONTACT_COLUMNS} FROM contacts WHERE site = ? ORDER BY sort_order, id");
        sqlx::query_as(&query)
            .bind(self.site())
            .fetch_all(self.pool())
            .await
    }

    pub async fn get_contact(&self, id: i64) -> Result<Option<Contact>, sqlx::Error> {
        let query = format!("SELECT {CONTACT_COLUMNS} FROM contacts WHERE id = ? AND site = ?");
        sqlx::query_as(&query)
            .bind(id)
            .bind(self.site())
            .fetch_optional(self.pool())
            .await
    }

    pub async fn create_contact(&self, input: &ContactInput) -> Result<Contact, sqlx::Error> {
        let query = format!(
            "INSERT INTO contacts (site, kind, label, value, sort_order)
             VALUES (?, ?, ?, ?, ?)
             RETURNING {CONTACT_COLUMNS}"
        );
        sqlx::query_as(&query)
            .bind(self.site())
            .bind(&input.kind)
            .bind(&input.label)
            .bind(&input.value)
            .bind(input.sort_order)
            .fetch_one(self.pool())
            .await
    }

    pub async fn update_contact(
        &self,
        id: i64,
        input: &ContactInput,
    ) -> Result<Option<Contact>, sqlx::Error> {
        let query = format!(
            "UPDATE contacts SET kind = ?, label = ?, value = ?, sort_order = ?
             WHERE id = ? AND site = ?
             RETURNING {CONTACT_COLUMNS}"
        );
        sqlx::query_as(&query)
            .bind(&input.kind)
            .bind(&input.label)
            .bind(&input.value)
            .bind(input.sort_order)
            .bind(id)
            .bind(self.site())
            .fetch_optional(self.pool())
            .await
    }

    pub async fn delete_contact(&self, id: i64) -> Result<bool, sqlx::Error> {
        self.delete_by_id("contacts", id).await
    }

    // ========== Hexagons ==========

    pub async fn list_hexagons(&self) -> Result<Vec<Hexagon>, sqlx::Error> {
        let query =
            format!("SELECT {HEXAGON_COLUMNS} FROM hexagons WHERE site = ? ORDER BY sort_order, id");
        sqlx::query_as(&query)
            .bind(self.site())
            .fetch_all(self.pool())
            .await
    }

    pub async fn get_hexagon(&self, id: i64) -> Result<Option<Hexagon>, sqlx::Error> {
        let query = format!("SELECT {HEXAGON_COLUMNS} FROM hexagons WHERE id = ? AND site = ?");
        sqlx::query_as(&query)
            .bind(id)
            .bind(self.site())
            .fetch_optional(self.pool())
            .await
    }

    pub async fn create_hexagon(&self, input: &HexagonInput) -> Result<Hexagon, sqlx::Error> {
        let query = format!(
            "INSERT INTO hexagons (site, title, text, icon, link, color, sort_order)
             VALUES (?, ?, ?, ?, ?, ?, ?)
             RETURNING {HEXAGON_COLUMNS}"
        );
        sqlx::query_as(&query)
            .bind(self.site())
            .bind(&input.title)
            .bind(&input.text)
            .bind(&input.icon)
            .bind(&input.link)
            .bind(&input.color)
            .bind(input.sort_order)
            .fetch_one(self.pool())
            .await
    }

    pub async fn update_hexagon(
        &self,
        id: i64,
        input: &HexagonInput,
    ) -> Result<Option<Hexagon>, sqlx::Error> {
        let query = format!(
            "UPDATE hexagons
             SET title = ?, text = ?, icon = ?, link = ?, color = ?, sort_order = ?
             WHERE id = ? AND site = ?
             RETURNING {HEXAGON_COLUMNS}"
        );
        sqlx::query_as(&query)
            .bind(&input.title)
            .bind(&input.text)
            .bind(&input.icon)
            .bind(&input.link)
            .bind(&input.color)
            .bind(input.sort_order)
            .bind(id)
            .bind(self.site())
            .fetch_optional(self.pool())
            .await
    }

    pub async fn delete_hexagon(&self, id: i64) -> Result<bool, sqlx::Error> {
        self.delete_by_id("hexagons", id).await
    }

    pub async fn reorder_hexagons(&self, ids: &[i64]) -> Result<(), sqlx::Error> {
        self.reorder("hexagons", ids).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hexagon(title: &str) -> HexagonInput {
        HexagonInput {
            title: title.to_string(),
            text: None,
            icon: None,
            link: None,
            color: Some("#ffcc00".to_string()),
            sort_order: 0,
        }
    }

    #[tokio::test]
    async fn test_review_moderation() {
        let db = SqliteClient::in_memory("default").await.unwrap();
        let review = db.create_review("Anna", 5, "Great bread").await.unwrap();
        assert!(!review.approved);

        assert!(db.list_reviews(Some(true)).await.unwrap().is_empty());
        assert_eq!(db.list_reviews(None).await.unwrap().len(), 1);

        let approved = db
            .update_review(review.id, Some(true), None)
            .await
            .unwrap()
            .unwrap();
        assert!(approved.approved);
        assert_eq!(approved.text, "Great bread");
        assert_eq!(db.list_reviews(Some(true)).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_rating_check_constraint() {
        let db = SqliteClient::in_memory("default").await.unwrap();
        let err = db.create_review("Anna", 6, "Too good").await.unwrap_err();
        assert!(err
            .as_database_error()
            .is_some_and(|e| e.is_check_violation()));
    }

    #[tokio::test]
    async fn test_hexagon_reorder_and_site_isolation() {
        let db = SqliteClient::in_memory("default").await.unwrap();
        let a = db.create_hexagon(&hexagon("A")).await.unwrap();
        let b = db.create_hexagon(&hexagon("B")).await.unwrap();
        let foreign = db
            .with_site("other")
            .create_hexagon(&hexagon("X"))
            .await
            .unwrap();

        db.reorder_hexagons(&[b.id, a.id, foreign.id]).await.unwrap();
        let titles: Vec<String> = db
            .list_hexagons()
            .await
            .unwrap()
            .into_iter()
            .map(|h| h.title)
            .collect();
        assert_eq!(titles, vec!["B", "A"]);

        // The other site's row was not touched
        let untouched = db
            .with_site("other")
            .get_hexagon(foreign.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(untouched.sort_order, 0);
        assert!(!db.delete_hexagon(foreign.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_portfolio_and_contacts_crud() {
        let db = SqliteClient::in_memory("default").await.unwrap();
        let project = db
            .create_portfolio(&PortfolioInput {
                title: "Bakery site".to_string(),
                description: None,
                image_url: None,
                link_url: Some("https://bakery.example".to_string()),
                category: Some("shops".to_string()),
                sort_order: 0,
            })
            .await
            .unwrap();
        assert_eq!(db.list_portfolio().await.unwrap().len(), 1);
        assert!(db.delete_portfolio(project.id).await.unwrap());
        assert!(db.get_portfolio(project.id).await.unwrap().is_none());

        let contact = db
            .create_contact(&ContactInput {
                kind: "phone".to_string(),
                label: None,
                value: "+7 912 345-67-89".to_string(),
                sort_order: 0,
            })
            .await
            .unwrap();
        let updated = db
            .update_contact(
                contact.id,
                &ContactInput {
                    kind: "phone".to_string(),
                    label: Some("Office".to_string()),
                    value: contact.value.clone(),
                    sort_order: 1,
                },
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.label.as_deref(), Some("Office"));
        assert_eq!(db.list_contacts().await.unwrap().len(), 1);
    }
}
