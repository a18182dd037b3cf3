use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use crate::{
    ListingId, ListingImage, ListingRepository, ListingUpdate, NewListing, Page, RepositoryError,
    Result, SearchFilter, UserId,
    model::{Listing, normalize_image_references, numbered_images},
};

#[derive(Default)]
struct State {
    listings: HashMap<ListingId, Listing>,
    /// Listing ids in creation order.
    order: Vec<ListingId>,
    unavailable: bool,
    fail_on_create: bool,
    fail_on_replace: bool,
    fail_on_attach_call: Option<usize>,
    attach_calls: usize,
}

impl State {
    fn check_available(&self) -> Result<()> {
        if self.unavailable {
            return Err(RepositoryError::Unavailable("listing store offline".into()));
        }
        Ok(())
    }

    fn owned_mut(&mut self, id: ListingId, owner: UserId) -> Option<&mut Listing> {
        self.listings.get_mut(&id).filter(|l| l.owner == owner)
    }
}

/// In-memory listing repository for testing.
///
/// One reader/writer lock guards the whole store: reads proceed together and
/// a writer excludes everyone else for the duration of its mutation, so a
/// reader never observes a half-applied update. Ownership checks happen under
/// the same write guard as the mutation.
#[derive(Clone, Default)]
pub struct InMemoryListingRepository {
    state: Arc<RwLock<State>>,
}

impl InMemoryListingRepository {
    /// Creates a new empty repository.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent call fail with [`RepositoryError::Unavailable`].
    pub async fn set_unavailable(&self, unavailable: bool) {
        self.state.write().await.unavailable = unavailable;
    }

    /// Makes `create` fail.
    pub async fn set_fail_on_create(&self, fail: bool) {
        self.state.write().await.fail_on_create = fail;
    }

    /// Makes `replace_images` fail without touching the image set.
    pub async fn set_fail_on_replace(&self, fail: bool) {
        self.state.write().await.fail_on_replace = fail;
    }

    /// Makes the `call`-th `attach_image` call (1-based, counted from now) fail.
    pub async fn set_fail_on_attach_call(&self, call: usize) {
        let mut state = self.state.write().await;
        state.attach_calls = 0;
        state.fail_on_attach_call = Some(call);
    }

    /// Returns the number of `attach_image` calls made since the last
    /// [`Self::set_fail_on_attach_call`].
    pub async fn attach_call_count(&self) -> usize {
        self.state.read().await.attach_calls
    }

    /// Returns the number of stored listings.
    pub async fn listing_count(&self) -> usize {
        self.state.read().await.listings.len()
    }
}

#[async_trait]
impl ListingRepository for InMemoryListingRepository {
    async fn create(&self, listing: NewListing) -> Result<Listing> {
        listing.validate()?;

        let mut state = self.state.write().await;
        state.check_available()?;
        if state.fail_on_create {
            return Err(RepositoryError::Unavailable("injected create failure".into()));
        }

        let now = Utc::now();
        let stored = Listing {
            id: ListingId::new(),
            owner: listing.owner,
            title: listing.title,
            description: listing.description,
            price: listing.price,
            category: listing.category,
            condition: listing.condition,
            status: listing.status,
            images: Vec::new(),
            created_at: now,
            updated_at: now,
        };
        state.order.push(stored.id);
        state.listings.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn get(&self, id: ListingId) -> Result<Option<Listing>> {
        let state = self.state.read().await;
        state.check_available()?;
        Ok(state.listings.get(&id).cloned())
    }

    async fn search(&self, filter: &SearchFilter) -> Result<Page<Listing>> {
        let state = self.state.read().await;
        state.check_available()?;

        let matches: Vec<&Listing> = state
            .order
            .iter()
            .rev()
            .filter_map(|id| state.listings.get(id))
            .filter(|l| filter.matches(l))
            .collect();

        let total = matches.len() as u64;
        let items = matches
            .into_iter()
            .skip(usize::try_from(filter.effective_offset()).unwrap_or(usize::MAX))
            .take(filter.effective_limit() as usize)
            .cloned()
            .collect();

        Ok(Page::new(items, total))
    }

    async fn update(&self, id: ListingId, owner: UserId, update: &ListingUpdate) -> Result<u64> {
        update.validate()?;

        let mut state = self.state.write().await;
        state.check_available()?;

        let Some(listing) = state.owned_mut(id, owner) else {
            return Ok(0);
        };
        update.apply_to(listing);
        listing.updated_at = Utc::now();
        Ok(1)
    }

    async fn delete(&self, id: ListingId, owner: UserId) -> Result<u64> {
        let mut state = self.state.write().await;
        state.check_available()?;

        if state.owned_mut(id, owner).is_none() {
            return Ok(0);
        }
        state.listings.remove(&id);
        state.order.retain(|existing| *existing != id);
        Ok(1)
    }

    async fn attach_image(
        &self,
        id: ListingId,
        owner: UserId,
        url: &str,
    ) -> Result<Option<ListingImage>> {
        let mut state = self.state.write().await;
        state.check_available()?;

        state.attach_calls += 1;
        if state.fail_on_attach_call == Some(state.attach_calls) {
            return Err(RepositoryError::Unavailable("injected attach failure".into()));
        }

        let Some(listing) = state.owned_mut(id, owner) else {
            return Ok(None);
        };
        let position = listing.images.iter().map(|i| i.position).max().unwrap_or(0) + 1;
        let image = ListingImage {
            position,
            url: url.to_string(),
            is_primary: listing.images.is_empty(),
        };
        listing.images.push(image.clone());
        listing.updated_at = Utc::now();
        Ok(Some(image))
    }

    async fn detach_image(&self, id: ListingId, owner: UserId, url: &str) -> Result<u64> {
        let mut state = self.state.write().await;
        state.check_available()?;

        let Some(listing) = state.owned_mut(id, owner) else {
            return Ok(0);
        };
        let before = listing.images.len();
        listing.images.retain(|img| img.url != url);
        let removed = (before - listing.images.len()) as u64;

        if removed > 0 {
            if !listing.images.iter().any(|img| img.is_primary)
                && let Some(first) = listing.images.iter_mut().min_by_key(|img| img.position)
            {
                first.is_primary = true;
            }
            listing.updated_at = Utc::now();
        }
        Ok(removed)
    }

    async fn replace_images(
        &self,
        id: ListingId,
        owner: UserId,
        urls: &[String],
    ) -> Result<Option<usize>> {
        let mut state = self.state.write().await;
        state.check_available()?;
        if state.fail_on_replace {
            return Err(RepositoryError::Unavailable("injected replace failure".into()));
        }

        let Some(listing) = state.owned_mut(id, owner) else {
            return Ok(None);
        };
        listing.images = numbered_images(&normalize_image_references(urls));
        listing.updated_at = Utc::now();
        Ok(Some(listing.images.len()))
    }

    async fn list_images(&self, id: ListingId) -> Result<Vec<ListingImage>> {
        let state = self.state.read().await;
        state.check_available()?;
        Ok(state
            .listings
            .get(&id)
            .map(|l| l.images.clone())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Condition, ListingStatus, Patch};

    async fn seeded(owner: UserId) -> (InMemoryListingRepository, Listing) {
        let repo = InMemoryListingRepository::new();
        let listing = repo
            .create(NewListing::new(owner, "Bike", 10_000).description("Red bike"))
            .await
            .unwrap();
        (repo, listing)
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let owner = UserId::new();
        let (repo, created) = seeded(owner).await;

        let fetched = repo.get(created.id).await.unwrap().unwrap();
        assert_eq!(fetched, created);
        assert_eq!(fetched.owner, owner);
        assert_eq!(fetched.status, ListingStatus::Active);
        assert!(repo.get(ListingId::new()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_create_rejects_invalid() {
        let repo = InMemoryListingRepository::new();
        let result = repo.create(NewListing::new(UserId::new(), "", 100)).await;
        assert!(matches!(result, Err(RepositoryError::InvalidListing(_))));
        assert_eq!(repo.listing_count().await, 0);
    }

    #[tokio::test]
    async fn test_update_is_owner_gated() {
        let owner = UserId::new();
        let (repo, listing) = seeded(owner).await;
        let update = ListingUpdate {
            price: Patch::Set(5_000),
            ..Default::default()
        };

        assert_eq!(repo.update(listing.id, UserId::new(), &update).await.unwrap(), 0);
        assert_eq!(repo.update(ListingId::new(), owner, &update).await.unwrap(), 0);
        assert_eq!(repo.get(listing.id).await.unwrap().unwrap().price, 10_000);

        assert_eq!(repo.update(listing.id, owner, &update).await.unwrap(), 1);
        let updated = repo.get(listing.id).await.unwrap().unwrap();
        assert_eq!(updated.price, 5_000);
        assert_eq!(updated.title, "Bike");
        assert_eq!(updated.description, "Red bike");
    }

    #[tokio::test]
    async fn test_delete_is_owner_gated() {
        let owner = UserId::new();
        let (repo, listing) = seeded(owner).await;

        assert_eq!(repo.delete(listing.id, UserId::new()).await.unwrap(), 0);
        assert_eq!(repo.delete(listing.id, owner).await.unwrap(), 1);
        assert_eq!(repo.delete(listing.id, owner).await.unwrap(), 0);
        assert_eq!(repo.listing_count().await, 0);
    }

    #[tokio::test]
    async fn test_attach_appends_and_first_is_primary() {
        let owner = UserId::new();
        let (repo, listing) = seeded(owner).await;

        let first = repo.attach_image(listing.id, owner, "a").await.unwrap().unwrap();
        let second = repo.attach_image(listing.id, owner, "b").await.unwrap().unwrap();
        assert_eq!((first.position, first.is_primary), (1, true));
        assert_eq!((second.position, second.is_primary), (2, false));

        let stranger = repo.attach_image(listing.id, UserId::new(), "c").await.unwrap();
        assert!(stranger.is_none());
        assert_eq!(repo.list_images(listing.id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_detach_promotes_next_primary() {
        let owner = UserId::new();
        let (repo, listing) = seeded(owner).await;
        for url in ["a", "b", "c"] {
            repo.attach_image(listing.id, owner, url).await.unwrap();
        }

        assert_eq!(repo.detach_image(listing.id, UserId::new(), "a").await.unwrap(), 0);
        assert_eq!(repo.detach_image(listing.id, owner, "missing").await.unwrap(), 0);
        assert_eq!(repo.detach_image(listing.id, owner, "a").await.unwrap(), 1);

        let images = repo.list_images(listing.id).await.unwrap();
        assert_eq!(images.len(), 2);
        assert_eq!(images[0].url, "b");
        assert!(images[0].is_primary);
        assert!(!images[1].is_primary);

        let next = repo.attach_image(listing.id, owner, "d").await.unwrap().unwrap();
        assert_eq!(next.position, 4);
        assert!(!next.is_primary);
    }

    #[tokio::test]
    async fn test_replace_images() {
        let owner = UserId::new();
        let (repo, listing) = seeded(owner).await;
        repo.attach_image(listing.id, owner, "old").await.unwrap();

        let urls = vec!["x".to_string(), String::new(), "y".to_string(), "x".to_string()];
        assert_eq!(
            repo.replace_images(listing.id, owner, &urls).await.unwrap(),
            Some(2)
        );

        let images = repo.list_images(listing.id).await.unwrap();
        let urls: Vec<_> = images.iter().map(|i| i.url.as_str()).collect();
        assert_eq!(urls, vec!["x", "y"]);
        assert_eq!(images[0].position, 1);
        assert!(images[0].is_primary);
        assert_eq!(images[1].position, 2);
    }

    #[tokio::test]
    async fn test_replace_by_stranger_leaves_set_untouched() {
        let owner = UserId::new();
        let (repo, listing) = seeded(owner).await;
        repo.attach_image(listing.id, owner, "keep").await.unwrap();

        let result = repo
            .replace_images(listing.id, UserId::new(), &["evil".to_string()])
            .await
            .unwrap();
        assert!(result.is_none());
        assert_eq!(repo.list_images(listing.id).await.unwrap()[0].url, "keep");
    }

    #[tokio::test]
    async fn test_search_filters_and_pages_newest_first() {
        let repo = InMemoryListingRepository::new();
        let owner = UserId::new();
        for i in 1..=5 {
            repo.create(
                NewListing::new(owner, format!("Bike {i}"), i * 100)
                    .category("sports")
                    .condition(Condition::Used),
            )
            .await
            .unwrap();
        }
        repo.create(NewListing::new(owner, "Lamp", 300).category("home"))
            .await
            .unwrap();

        let page = repo
            .search(&SearchFilter::new().text("bike").limit(2))
            .await
            .unwrap();
        assert_eq!(page.total, 5);
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.items[0].title, "Bike 5");
        assert_eq!(page.items[1].title, "Bike 4");

        let page = repo
            .search(&SearchFilter::new().text("bike").limit(2).offset(4))
            .await
            .unwrap();
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].title, "Bike 1");

        let page = repo
            .search(&SearchFilter::new().price_range(Some(200), Some(300)))
            .await
            .unwrap();
        assert_eq!(page.total, 3);

        let page = repo
            .search(&SearchFilter::new().category("home"))
            .await
            .unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].title, "Lamp");
    }

    #[tokio::test]
    async fn test_search_hides_other_peoples_drafts() {
        let repo = InMemoryListingRepository::new();
        let owner = UserId::new();
        repo.create(NewListing::new(owner, "Secret", 100).status(ListingStatus::Draft))
            .await
            .unwrap();

        assert_eq!(repo.search(&SearchFilter::new()).await.unwrap().total, 0);
        assert_eq!(
            repo.search(&SearchFilter::new().viewer(owner)).await.unwrap().total,
            1
        );
    }

    #[tokio::test]
    async fn test_failure_injection() {
        let owner = UserId::new();
        let (repo, listing) = seeded(owner).await;

        repo.set_fail_on_attach_call(2).await;
        assert!(repo.attach_image(listing.id, owner, "a").await.is_ok());
        assert!(repo.attach_image(listing.id, owner, "b").await.is_err());
        assert!(repo.attach_image(listing.id, owner, "c").await.is_ok());
        assert_eq!(repo.attach_call_count().await, 3);

        repo.set_fail_on_replace(true).await;
        assert!(repo.replace_images(listing.id, owner, &[]).await.is_err());
        assert_eq!(repo.list_images(listing.id).await.unwrap().len(), 2);

        repo.set_unavailable(true).await;
        let err = repo.get(listing.id).await.unwrap_err();
        assert!(err.is_unavailable());
    }

    #[tokio::test]
    async fn test_readers_never_observe_half_written_record() {
        let owner = UserId::new();
        let repo = InMemoryListingRepository::new();
        let listing = repo
            .create(NewListing::new(owner, "v0", 100).description("v0"))
            .await
            .unwrap();

        let mut handles = Vec::new();
        for round in 1..=20 {
            let writer = repo.clone();
            handles.push(tokio::spawn(async move {
                let version = format!("v{round}");
                let update = ListingUpdate {
                    title: Patch::Set(version.clone()),
                    description: Patch::Set(version),
                    ..Default::default()
                };
                writer.update(listing.id, owner, &update).await.unwrap();
            }));

            let reader = repo.clone();
            handles.push(tokio::spawn(async move {
                let seen = reader.get(listing.id).await.unwrap().unwrap();
                assert_eq!(seen.title, seen.description);
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let update = ListingUpdate {
            title: Patch::Set("final".into()),
            description: Patch::Set("final".into()),
            ..Default::default()
        };
        repo.update(listing.id, owner, &update).await.unwrap();
        let after = repo.get(listing.id).await.unwrap().unwrap();
        assert_eq!(after.title, "final");
        assert_eq!(after.description, "final");
    }

    #[tokio::test]
    async fn test_reader_started_before_writer_sees_old_value() {
        let owner = UserId::new();
        let (repo, listing) = seeded(owner).await;

        // Hold a read guard so the writer has to queue behind it.
        let guard = repo.state.read().await;
        let writer = repo.clone();
        let handle = tokio::spawn(async move {
            let update = ListingUpdate {
                title: Patch::Set("Scooter".into()),
                ..Default::default()
            };
            writer.update(listing.id, owner, &update).await.unwrap()
        });
        tokio::task::yield_now().await;
        assert_eq!(guard.listings[&listing.id].title, "Bike");
        drop(guard);

        assert_eq!(handle.await.unwrap(), 1);
        assert_eq!(repo.get(listing.id).await.unwrap().unwrap().title, "Scooter");
    }
}
