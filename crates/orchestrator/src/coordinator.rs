//! Listing saga coordinator.

use std::time::{Duration, Instant};

use listings::{
    Condition, Listing, ListingImage, ListingRepository, ListingStatus, ListingUpdate, NewListing,
    Page, SearchFilter, normalize_image_references,
};
use media::MediaBackend;

use crate::listing_saga::{
    SAGA_CREATE, SAGA_UPDATE, STEP_ATTACH_IMAGE, STEP_CREATE_LISTING, STEP_DELETE_LISTING,
    STEP_DETACH_IMAGE, STEP_READ, STEP_REPLACE_IMAGES, STEP_UPDATE_FIELDS,
};
use crate::{
    AuthGateway, Deadline, ListingId, MediaUploadCoordinator, OrchestratorError, Result, UserId,
};

/// Per-call time budgets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    /// Budget for reads, authentication and single-row mutations.
    pub read: Duration,
    /// Budget for flows that upload media and write several rows.
    pub write: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            read: Duration::from_secs(5),
            write: Duration::from_secs(10),
        }
    }
}

/// Caller-supplied fields of a listing to create. The owner comes from the
/// credential, never from the request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListingDraft {
    pub title: String,
    pub description: String,
    pub price: i64,
    pub category: Option<String>,
    pub condition: Option<Condition>,
    pub status: Option<ListingStatus>,
}

impl ListingDraft {
    fn into_new_listing(self, owner: UserId) -> NewListing {
        let mut listing = NewListing::new(owner, self.title, self.price).description(self.description);
        if let Some(category) = self.category {
            listing = listing.category(category);
        }
        if let Some(condition) = self.condition {
            listing = listing.condition(condition);
        }
        if let Some(status) = self.status {
            listing = listing.status(status);
        }
        listing
    }
}

/// Orchestrates listing workflows across the listing store and media backend.
///
/// Every operation authenticates first and runs under a [`Deadline`]. Multi-step
/// flows are not atomic: when a step fails, the steps before it stay
/// committed and the failing step's error is returned.
pub struct AdOrchestrator<R, M>
where
    R: ListingRepository,
    M: MediaBackend,
{
    repo: R,
    uploader: MediaUploadCoordinator<M>,
    auth: AuthGateway,
    timeouts: Timeouts,
}

impl<R, M> AdOrchestrator<R, M>
where
    R: ListingRepository,
    M: MediaBackend,
{
    /// Creates a new orchestrator.
    pub fn new(repo: R, media: M, auth: AuthGateway, timeouts: Timeouts) -> Self {
        Self {
            repo,
            uploader: MediaUploadCoordinator::new(media),
            auth,
            timeouts,
        }
    }

    /// Returns the listing repository.
    pub fn repository(&self) -> &R {
        &self.repo
    }

    /// Returns the authentication gateway.
    pub fn auth(&self) -> &AuthGateway {
        &self.auth
    }

    /// Creates a listing owned by the caller, then uploads and attaches images.
    ///
    /// Steps:
    /// 1. create the bare listing
    /// 2. upload the non-empty payloads in order
    /// 3. attach each reference in order, stopping at the first failure
    ///
    /// Payloads are decoded before step 1, so an undecodable payload persists
    /// nothing. A failure in step 2 or 3 leaves the listing in place with the
    /// images attached so far.
    #[tracing::instrument(skip(self, auth_header, draft, raw_images), fields(saga_type = SAGA_CREATE))]
    pub async fn create_with_images(
        &self,
        auth_header: Option<&str>,
        draft: ListingDraft,
        raw_images: &[String],
    ) -> Result<Listing> {
        let deadline = Deadline::after(self.timeouts.write);
        let owner = self.auth.authenticate(auth_header, &deadline)?;

        let new_listing = draft.into_new_listing(owner);
        new_listing.validate()?;
        let prepared = self.uploader.prepare(raw_images)?;

        metrics::counter!("listing_saga_executions_total", "saga" => SAGA_CREATE).increment(1);
        let started = Instant::now();
        let result = self
            .run_create(owner, new_listing, prepared, &deadline)
            .await;
        metrics::histogram!("listing_saga_duration_seconds", "saga" => SAGA_CREATE)
            .record(started.elapsed().as_secs_f64());
        result
    }

    async fn run_create(
        &self,
        owner: UserId,
        new_listing: NewListing,
        prepared: Vec<crate::PreparedImage>,
        deadline: &Deadline,
    ) -> Result<Listing> {
        tracing::info!(step = STEP_CREATE_LISTING, "saga step started");
        let mut listing = deadline
            .run(STEP_CREATE_LISTING, self.repo.create(new_listing))
            .await?;
        tracing::info!(listing_id = %listing.id, "listing created");

        if prepared.is_empty() {
            return Ok(listing);
        }

        let references = self
            .uploader
            .upload(owner, prepared, deadline)
            .await
            .inspect_err(|e| self.partial_failure(SAGA_CREATE, listing.id, e))?;

        // Inline fallbacks for identical payloads collapse to one image.
        let urls = normalize_image_references(references.iter().map(|r| r.url.as_str()));
        tracing::info!(step = STEP_ATTACH_IMAGE, count = urls.len(), "saga step started");
        for url in urls {
            let attached = deadline
                .run(
                    STEP_ATTACH_IMAGE,
                    self.repo.attach_image(listing.id, owner, &url),
                )
                .await
                .inspect_err(|e| self.partial_failure(SAGA_CREATE, listing.id, e))?;

            match attached {
                Some(image) => listing.images.push(image),
                // Deleted by its owner mid-flight.
                None => {
                    let err = OrchestratorError::NotFoundOrNoPermission;
                    self.partial_failure(SAGA_CREATE, listing.id, &err);
                    return Err(err);
                }
            }
        }

        Ok(listing)
    }

    /// Applies the supplied fields, then replaces the image set if any
    /// non-empty payload was supplied.
    ///
    /// The two steps are not atomic: if the replace fails after the field
    /// update, the fields stay updated and the old image set is kept.
    #[tracing::instrument(skip(self, auth_header, update, raw_images), fields(saga_type = SAGA_UPDATE))]
    pub async fn update(
        &self,
        auth_header: Option<&str>,
        id: ListingId,
        update: ListingUpdate,
        raw_images: &[String],
    ) -> Result<()> {
        let deadline = Deadline::after(self.timeouts.write);
        let owner = self.auth.authenticate(auth_header, &deadline)?;

        update.validate()?;
        let prepared = self.uploader.prepare(raw_images)?;
        if update.is_empty() && prepared.is_empty() {
            return Err(OrchestratorError::InvalidArgument(
                "no fields to update".into(),
            ));
        }

        metrics::counter!("listing_saga_executions_total", "saga" => SAGA_UPDATE).increment(1);
        let started = Instant::now();
        let result = self
            .run_update(owner, id, update, prepared, &deadline)
            .await;
        metrics::histogram!("listing_saga_duration_seconds", "saga" => SAGA_UPDATE)
            .record(started.elapsed().as_secs_f64());
        result
    }

    async fn run_update(
        &self,
        owner: UserId,
        id: ListingId,
        update: ListingUpdate,
        prepared: Vec<crate::PreparedImage>,
        deadline: &Deadline,
    ) -> Result<()> {
        let fields_updated = !update.is_empty();
        if fields_updated {
            tracing::info!(step = STEP_UPDATE_FIELDS, "saga step started");
            let rows = deadline
                .run(STEP_UPDATE_FIELDS, self.repo.update(id, owner, &update))
                .await?;
            if rows == 0 {
                return Err(OrchestratorError::NotFoundOrNoPermission);
            }
        }

        if prepared.is_empty() {
            return Ok(());
        }

        let references = self
            .uploader
            .upload(owner, prepared, deadline)
            .await
            .inspect_err(|e| {
                if fields_updated {
                    self.partial_failure(SAGA_UPDATE, id, e)
                }
            })?;
        let urls = normalize_image_references(references.iter().map(|r| r.url.as_str()));

        tracing::info!(step = STEP_REPLACE_IMAGES, count = urls.len(), "saga step started");
        let stored = deadline
            .run(STEP_REPLACE_IMAGES, self.repo.replace_images(id, owner, &urls))
            .await
            .inspect_err(|e| {
                if fields_updated {
                    self.partial_failure(SAGA_UPDATE, id, e)
                }
            })?;

        stored
            .map(|_| ())
            .ok_or(OrchestratorError::NotFoundOrNoPermission)
    }

    /// Deletes a listing owned by the caller.
    #[tracing::instrument(skip(self, auth_header))]
    pub async fn delete(&self, auth_header: Option<&str>, id: ListingId) -> Result<()> {
        let deadline = Deadline::after(self.timeouts.read);
        let owner = self.auth.authenticate(auth_header, &deadline)?;

        let rows = deadline
            .run(STEP_DELETE_LISTING, self.repo.delete(id, owner))
            .await?;
        if rows == 0 {
            return Err(OrchestratorError::NotFoundOrNoPermission);
        }
        tracing::info!(listing_id = %id, "listing deleted");
        Ok(())
    }

    /// Fetches a listing. Drafts are only returned to their owner; the
    /// credential is optional and an invalid one reads as anonymous.
    #[tracing::instrument(skip(self, auth_header))]
    pub async fn get(&self, auth_header: Option<&str>, id: ListingId) -> Result<Listing> {
        let deadline = Deadline::after(self.timeouts.read);
        let viewer = self.optional_viewer(auth_header);

        deadline
            .run(STEP_READ, self.repo.get(id))
            .await?
            .filter(|listing| listing.is_visible_to(viewer))
            .ok_or(OrchestratorError::NotFound)
    }

    /// Searches listings on behalf of an optional viewer.
    #[tracing::instrument(skip(self, auth_header))]
    pub async fn search(
        &self,
        auth_header: Option<&str>,
        mut filter: SearchFilter,
    ) -> Result<Page<Listing>> {
        let deadline = Deadline::after(self.timeouts.read);
        filter.viewer = self.optional_viewer(auth_header);

        if let (Some(min), Some(max)) = (filter.price_min, filter.price_max)
            && min > max
        {
            return Err(OrchestratorError::InvalidArgument(
                "min_price must not exceed max_price".into(),
            ));
        }

        deadline.run(STEP_READ, self.repo.search(&filter)).await
    }

    /// Attaches an already stored media reference to the end of the image set.
    #[tracing::instrument(skip(self, auth_header))]
    pub async fn attach_media(
        &self,
        auth_header: Option<&str>,
        id: ListingId,
        reference: &str,
    ) -> Result<ListingImage> {
        let deadline = Deadline::after(self.timeouts.read);
        let owner = self.auth.authenticate(auth_header, &deadline)?;

        let reference = reference.trim();
        if reference.is_empty() {
            return Err(OrchestratorError::InvalidArgument(
                "media reference is required".into(),
            ));
        }

        deadline
            .run(STEP_ATTACH_IMAGE, self.repo.attach_image(id, owner, reference))
            .await?
            .ok_or(OrchestratorError::NotFoundOrNoPermission)
    }

    /// Detaches a media reference from a listing.
    #[tracing::instrument(skip(self, auth_header))]
    pub async fn detach_media(
        &self,
        auth_header: Option<&str>,
        id: ListingId,
        reference: &str,
    ) -> Result<()> {
        let deadline = Deadline::after(self.timeouts.read);
        let owner = self.auth.authenticate(auth_header, &deadline)?;

        if reference.trim().is_empty() {
            return Err(OrchestratorError::InvalidArgument(
                "media reference is required".into(),
            ));
        }

        let removed = deadline
            .run(STEP_DETACH_IMAGE, self.repo.detach_image(id, owner, reference.trim()))
            .await?;
        if removed == 0 {
            return Err(OrchestratorError::NotFoundOrNoPermission);
        }
        Ok(())
    }

    /// Uploads `raw_images` and replaces the whole image set with them.
    ///
    /// An empty list clears the set. Duplicate references keep their first
    /// position.
    #[tracing::instrument(skip(self, auth_header, raw_images))]
    pub async fn replace_images(
        &self,
        auth_header: Option<&str>,
        id: ListingId,
        raw_images: &[String],
    ) -> Result<Vec<ListingImage>> {
        let deadline = Deadline::after(self.timeouts.write);
        let owner = self.auth.authenticate(auth_header, &deadline)?;

        let references = self.uploader.resolve(owner, raw_images, &deadline).await?;
        let urls = normalize_image_references(references.iter().map(|r| r.url.as_str()));

        let stored = deadline
            .run(STEP_REPLACE_IMAGES, self.repo.replace_images(id, owner, &urls))
            .await?;
        if stored.is_none() {
            return Err(OrchestratorError::NotFoundOrNoPermission);
        }

        deadline.run(STEP_READ, self.repo.list_images(id)).await
    }

    fn optional_viewer(&self, auth_header: Option<&str>) -> Option<UserId> {
        auth_header.and_then(|h| self.auth.verify(Some(h)).user_id())
    }

    fn partial_failure(&self, saga: &'static str, id: ListingId, err: &OrchestratorError) {
        metrics::counter!("listing_saga_partial_failures_total", "saga" => saga).increment(1);
        tracing::warn!(
            saga,
            listing_id = %id,
            error = %err,
            "saga step failed, earlier steps remain committed"
        );
    }
}
