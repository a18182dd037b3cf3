//! Listing saga step names, used in logs and errors.

/// Saga type identifier for creating a listing with images.
pub const SAGA_CREATE: &str = "CreateListingWithImages";

/// Saga type identifier for updating a listing and its images.
pub const SAGA_UPDATE: &str = "UpdateListing";

/// Step name: verify the caller's credential.
pub const STEP_AUTHENTICATE: &str = "authenticate";

/// Step name: create the bare listing row.
pub const STEP_CREATE_LISTING: &str = "create_listing";

/// Step name: push image payloads to the media backend.
pub const STEP_UPLOAD_MEDIA: &str = "upload_media";

/// Step name: attach one resolved image to the listing.
pub const STEP_ATTACH_IMAGE: &str = "attach_image";

/// Step name: apply the supplied fields.
pub const STEP_UPDATE_FIELDS: &str = "update_fields";

/// Step name: replace the whole image set.
pub const STEP_REPLACE_IMAGES: &str = "replace_images";

/// Step name: delete the listing.
pub const STEP_DELETE_LISTING: &str = "delete_listing";

/// Step name: detach one image.
pub const STEP_DETACH_IMAGE: &str = "detach_image";

/// Step name: read listings.
pub const STEP_READ: &str = "read";
