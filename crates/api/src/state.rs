//! Shared application state.

use std::sync::Arc;

use identity::{IdentityService, InMemoryUserRepository, TokenService, UserRepository};
use listings::{InMemoryListingRepository, ListingRepository};
use media::{InMemoryMediaBackend, MediaBackend};
use orchestrator::{AdOrchestrator, AuthGateway, Timeouts};

/// User store selected at startup.
pub type DynUserRepository = Arc<dyn UserRepository>;
/// Listing store selected at startup.
pub type DynListingRepository = Arc<dyn ListingRepository>;
/// Media backend selected at startup.
pub type DynMediaBackend = Arc<dyn MediaBackend>;

/// Shared application state accessible from all handlers.
pub struct AppState {
    pub identity: IdentityService<DynUserRepository>,
    pub ads: AdOrchestrator<DynListingRepository, DynMediaBackend>,
    pub timeouts: Timeouts,
}

impl AppState {
    /// Wires the identity service and the listing orchestrator around one
    /// token service, so credentials issued at login verify at the gateway.
    pub fn new(
        users: DynUserRepository,
        listings: DynListingRepository,
        media: DynMediaBackend,
        tokens: Arc<TokenService>,
        timeouts: Timeouts,
    ) -> Self {
        let identity = IdentityService::new(users, tokens.clone());
        let ads = AdOrchestrator::new(listings, media, AuthGateway::new(tokens), timeouts);
        Self {
            identity,
            ads,
            timeouts,
        }
    }

    /// State backed entirely by in-memory stores.
    pub fn in_memory(tokens: Arc<TokenService>, timeouts: Timeouts) -> Self {
        Self::new(
            Arc::new(InMemoryUserRepository::new()),
            Arc::new(InMemoryListingRepository::new()),
            Arc::new(InMemoryMediaBackend::new()),
            tokens,
            timeouts,
        )
    }
}
