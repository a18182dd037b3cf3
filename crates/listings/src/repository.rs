use std::sync::Arc;

use async_trait::async_trait;

use crate::{
    ListingId, ListingImage, ListingUpdate, NewListing, Page, Result, SearchFilter, UserId,
    model::Listing,
};

/// Storage boundary for listings and their image sets.
///
/// Every mutation of an existing listing is gated on `(id, owner)` inside the
/// same statement, transaction or lock as the mutation itself. A call that
/// matches nothing reports zero rows (or `None`); "no such listing" and
/// "not yours" are indistinguishable.
///
/// All implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait ListingRepository: Send + Sync {
    /// Stores a new listing and returns it with its assigned id and timestamps.
    async fn create(&self, listing: NewListing) -> Result<Listing>;

    /// Fetches a listing with its images. Visibility is not applied here.
    async fn get(&self, id: ListingId) -> Result<Option<Listing>>;

    /// Returns one page of listings matching `filter`, newest first.
    async fn search(&self, filter: &SearchFilter) -> Result<Page<Listing>>;

    /// Applies the set fields of `update`. Returns the number of rows affected.
    async fn update(&self, id: ListingId, owner: UserId, update: &ListingUpdate) -> Result<u64>;

    /// Deletes a listing and its images. Returns the number of rows affected.
    async fn delete(&self, id: ListingId, owner: UserId) -> Result<u64>;

    /// Appends an image after the current last position. The image is primary
    /// if the set was empty. Returns `None` if `(id, owner)` matches nothing.
    async fn attach_image(
        &self,
        id: ListingId,
        owner: UserId,
        url: &str,
    ) -> Result<Option<ListingImage>>;

    /// Removes every image with this url. Returns the number of images removed.
    async fn detach_image(&self, id: ListingId, owner: UserId, url: &str) -> Result<u64>;

    /// Replaces the whole image set in one batch. Returns the number of images
    /// stored, or `None` if `(id, owner)` matches nothing, in which case the
    /// existing set is untouched.
    async fn replace_images(
        &self,
        id: ListingId,
        owner: UserId,
        urls: &[String],
    ) -> Result<Option<usize>>;

    /// Returns the images of a listing in position order.
    async fn list_images(&self, id: ListingId) -> Result<Vec<ListingImage>>;
}

#[async_trait]
impl<T: ListingRepository + ?Sized> ListingRepository for Arc<T> {
    async fn create(&self, listing: NewListing) -> Result<Listing> {
        (**self).create(listing).await
    }

    async fn get(&self, id: ListingId) -> Result<Option<Listing>> {
        (**self).get(id).await
    }

    async fn search(&self, filter: &SearchFilter) -> Result<Page<Listing>> {
        (**self).search(filter).await
    }

    async fn update(&self, id: ListingId, owner: UserId, update: &ListingUpdate) -> Result<u64> {
        (**self).update(id, owner, update).await
    }

    async fn delete(&self, id: ListingId, owner: UserId) -> Result<u64> {
        (**self).delete(id, owner).await
    }

    async fn attach_image(
        &self,
        id: ListingId,
        owner: UserId,
        url: &str,
    ) -> Result<Option<ListingImage>> {
        (**self).attach_image(id, owner, url).await
    }

    async fn detach_image(&self, id: ListingId, owner: UserId, url: &str) -> Result<u64> {
        (**self).detach_image(id, owner, url).await
    }

    async fn replace_images(
        &self,
        id: ListingId,
        owner: UserId,
        urls: &[String],
    ) -> Result<Option<usize>> {
        (**self).replace_images(id, owner, urls).await
    }

    async fn list_images(&self, id: ListingId) -> Result<Vec<ListingImage>> {
        (**self).list_images(id).await
    }
}
