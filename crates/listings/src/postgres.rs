use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder, Row, Transaction, postgres::PgRow};
use uuid::Uuid;

use crate::{
    Condition, ListingId, ListingImage, ListingRepository, ListingStatus, ListingUpdate,
    NewListing, Page, RepositoryError, Result, SearchFilter, UserId,
    model::{Listing, normalize_image_references, numbered_images},
};

const LISTING_COLUMNS: &str = "id, owner_id, title, description, price, category, condition, status, created_at, updated_at";

/// PostgreSQL-backed listing repository.
///
/// Ownership is checked in the same statement as the mutation, or under a
/// row lock in the same transaction for multi-statement operations.
#[derive(Clone)]
pub struct PostgresListingRepository {
    pool: PgPool,
}

impl PostgresListingRepository {
    /// Creates a new PostgreSQL listing repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn row_to_listing(row: PgRow) -> Result<Listing> {
        let condition: String = row.try_get("condition")?;
        let status: String = row.try_get("status")?;

        Ok(Listing {
            id: ListingId::from_uuid(row.try_get::<Uuid, _>("id")?),
            owner: UserId::from_uuid(row.try_get::<Uuid, _>("owner_id")?),
            title: row.try_get("title")?,
            description: row.try_get("description")?,
            price: row.try_get("price")?,
            category: row.try_get("category")?,
            condition: condition
                .parse::<Condition>()
                .map_err(|e| RepositoryError::CorruptRow(e.to_string()))?,
            status: status
                .parse::<ListingStatus>()
                .map_err(|e| RepositoryError::CorruptRow(e.to_string()))?,
            images: Vec::new(),
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn row_to_image(row: &PgRow) -> Result<ListingImage> {
        Ok(ListingImage {
            position: row.try_get("position")?,
            url: row.try_get("url")?,
            is_primary: row.try_get("is_primary")?,
        })
    }

    /// Locks the listing row if `owner` owns it. Image mutations take this
    /// lock first, so they are serialized per listing.
    async fn lock_owned(
        tx: &mut Transaction<'_, Postgres>,
        id: ListingId,
        owner: UserId,
    ) -> Result<bool> {
        let owned = sqlx::query("SELECT id FROM listings WHERE id = $1 AND owner_id = $2 FOR UPDATE")
            .bind(id.as_uuid())
            .bind(owner.as_uuid())
            .fetch_optional(&mut **tx)
            .await?;
        Ok(owned.is_some())
    }

    async fn images_for(&self, ids: &[Uuid]) -> Result<HashMap<Uuid, Vec<ListingImage>>> {
        let rows = sqlx::query(
            r#"
            SELECT listing_id, position, url, is_primary
            FROM listing_images
            WHERE listing_id = ANY($1)
            ORDER BY listing_id, position ASC
            "#,
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;

        let mut images: HashMap<Uuid, Vec<ListingImage>> = HashMap::new();
        for row in &rows {
            let listing_id: Uuid = row.try_get("listing_id")?;
            images
                .entry(listing_id)
                .or_default()
                .push(Self::row_to_image(row)?);
        }
        Ok(images)
    }
}

/// Escapes LIKE wildcards so free text matches literally.
fn escape_like(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn push_search_conditions(qb: &mut QueryBuilder<'_, Postgres>, filter: &SearchFilter) {
    qb.push(" WHERE (status <> 'draft'");
    if let Some(viewer) = filter.viewer {
        qb.push(" OR owner_id = ").push_bind(viewer.as_uuid());
    }
    qb.push(")");

    if let Some(ref text) = filter.text {
        let pattern = format!("%{}%", escape_like(text));
        qb.push(" AND (title ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR description ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
    if let Some(ref category) = filter.category {
        qb.push(" AND category = ").push_bind(category.clone());
    }
    if let Some(min) = filter.price_min {
        qb.push(" AND price >= ").push_bind(min);
    }
    if let Some(max) = filter.price_max {
        qb.push(" AND price <= ").push_bind(max);
    }
    if let Some(condition) = filter.condition {
        qb.push(" AND condition = ").push_bind(condition.as_str());
    }
}

#[async_trait]
impl ListingRepository for PostgresListingRepository {
    async fn create(&self, listing: NewListing) -> Result<Listing> {
        listing.validate()?;

        let row = sqlx::query(&format!(
            r#"
            INSERT INTO listings (id, owner_id, title, description, price, category, condition, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {LISTING_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(listing.owner.as_uuid())
        .bind(&listing.title)
        .bind(&listing.description)
        .bind(listing.price)
        .bind(&listing.category)
        .bind(listing.condition.as_str())
        .bind(listing.status.as_str())
        .fetch_one(&self.pool)
        .await?;

        Self::row_to_listing(row)
    }

    async fn get(&self, id: ListingId) -> Result<Option<Listing>> {
        let row = sqlx::query(&format!(
            "SELECT {LISTING_COLUMNS} FROM listings WHERE id = $1"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let mut listing = Self::row_to_listing(row)?;
        listing.images = self.list_images(id).await?;
        Ok(Some(listing))
    }

    async fn search(&self, filter: &SearchFilter) -> Result<Page<Listing>> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM listings");
        push_search_conditions(&mut count, filter);
        let total: i64 = count.build_query_scalar().fetch_one(&self.pool).await?;

        let mut select = QueryBuilder::<Postgres>::new(format!(
            "SELECT {LISTING_COLUMNS} FROM listings"
        ));
        push_search_conditions(&mut select, filter);
        select
            .push(" ORDER BY created_at DESC, id DESC LIMIT ")
            .push_bind(i64::from(filter.effective_limit()))
            .push(" OFFSET ")
            .push_bind(i64::try_from(filter.effective_offset()).unwrap_or(i64::MAX));

        let rows = select.build().fetch_all(&self.pool).await?;
        let mut items = rows
            .into_iter()
            .map(Self::row_to_listing)
            .collect::<Result<Vec<_>>>()?;

        if !items.is_empty() {
            let ids: Vec<Uuid> = items.iter().map(|l| l.id.as_uuid()).collect();
            let mut images = self.images_for(&ids).await?;
            for listing in &mut items {
                listing.images = images.remove(&listing.id.as_uuid()).unwrap_or_default();
            }
        }

        Ok(Page::new(items, u64::try_from(total).unwrap_or(0)))
    }

    async fn update(&self, id: ListingId, owner: UserId, update: &ListingUpdate) -> Result<u64> {
        update.validate()?;

        let mut qb = QueryBuilder::<Postgres>::new("UPDATE listings SET updated_at = NOW()");
        if let Some(title) = update.title.as_set() {
            qb.push(", title = ").push_bind(title.clone());
        }
        if let Some(description) = update.description.as_set() {
            qb.push(", description = ").push_bind(description.clone());
        }
        if let Some(price) = update.price.as_set() {
            qb.push(", price = ").push_bind(*price);
        }
        if let Some(category) = update.category.as_set() {
            qb.push(", category = ").push_bind(category.clone());
        }
        if let Some(condition) = update.condition.as_set() {
            qb.push(", condition = ").push_bind(condition.as_str());
        }
        if let Some(status) = update.status.as_set() {
            qb.push(", status = ").push_bind(status.as_str());
        }
        qb.push(" WHERE id = ")
            .push_bind(id.as_uuid())
            .push(" AND owner_id = ")
            .push_bind(owner.as_uuid());

        let result = qb.build().execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    async fn delete(&self, id: ListingId, owner: UserId) -> Result<u64> {
        let result = sqlx::query("DELETE FROM listings WHERE id = $1 AND owner_id = $2")
            .bind(id.as_uuid())
            .bind(owner.as_uuid())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    async fn attach_image(
        &self,
        id: ListingId,
        owner: UserId,
        url: &str,
    ) -> Result<Option<ListingImage>> {
        let mut tx = self.pool.begin().await?;
        if !Self::lock_owned(&mut tx, id, owner).await? {
            return Ok(None);
        }

        // The row lock serializes attaches, so MAX(position) is stable here.
        let row = sqlx::query(
            r#"
            INSERT INTO listing_images (listing_id, position, url, is_primary)
            SELECT $1, COALESCE(MAX(position), 0) + 1, $2, COUNT(*) = 0
            FROM listing_images
            WHERE listing_id = $1
            RETURNING position, url, is_primary
            "#,
        )
        .bind(id.as_uuid())
        .bind(url)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query("UPDATE listings SET updated_at = NOW() WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Self::row_to_image(&row).map(Some)
    }

    async fn detach_image(&self, id: ListingId, owner: UserId, url: &str) -> Result<u64> {
        let mut tx = self.pool.begin().await?;
        if !Self::lock_owned(&mut tx, id, owner).await? {
            return Ok(0);
        }

        let removed = sqlx::query(
            r#"
            DELETE FROM listing_images
            WHERE listing_id = $1 AND url = $2
            "#,
        )
        .bind(id.as_uuid())
        .bind(url)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if removed > 0 {
            // Keep exactly one primary while any image remains.
            sqlx::query(
                r#"
                UPDATE listing_images SET is_primary = TRUE
                WHERE listing_id = $1
                  AND position = (SELECT MIN(position) FROM listing_images WHERE listing_id = $1)
                  AND NOT EXISTS (SELECT 1 FROM listing_images WHERE listing_id = $1 AND is_primary)
                "#,
            )
            .bind(id.as_uuid())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(removed)
    }

    async fn replace_images(
        &self,
        id: ListingId,
        owner: UserId,
        urls: &[String],
    ) -> Result<Option<usize>> {
        let images = numbered_images(&normalize_image_references(urls));

        let mut tx = self.pool.begin().await?;

        if !Self::lock_owned(&mut tx, id, owner).await? {
            return Ok(None);
        }

        sqlx::query("DELETE FROM listing_images WHERE listing_id = $1")
            .bind(id.as_uuid())
            .execute(&mut *tx)
            .await?;

        if !images.is_empty() {
            let mut insert = QueryBuilder::<Postgres>::new(
                "INSERT INTO listing_images (listing_id, position, url, is_primary) ",
            );
            insert.push_values(&images, |mut b, image| {
                b.push_bind(id.as_uuid())
                    .push_bind(image.position)
                    .push_bind(image.url.clone())
                    .push_bind(image.is_primary);
            });
            insert.build().execute(&mut *tx).await?;
        }

        sqlx::query("UPDATE listings SET updated_at = NOW() WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(Some(images.len()))
    }

    async fn list_images(&self, id: ListingId) -> Result<Vec<ListingImage>> {
        let rows = sqlx::query(
            r#"
            SELECT position, url, is_primary
            FROM listing_images
            WHERE listing_id = $1
            ORDER BY position ASC
            "#,
        )
        .bind(id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_image).collect()
    }
}
