mod http;

pub use http::HttpGateway;

use async_trait::async_trait;

use crate::error::{Result, SyncError};
use crate::model::{FavouriteOp, Recipe, RecipeId, RecipeSummary, SearchPage};

/// The only boundary to the recipe backend.
///
/// Each operation is a single round trip. Implementations never retry; they
/// normalize failures into [`SyncError`] and leave retry decisions to callers.
#[async_trait]
pub trait RecipeGateway: Send + Sync {
    /// Get the gateway name for logging (e.g., "http")
    fn gateway_name(&self) -> &str;

    /// Fetch one page of search results. `page` starts at 1.
    async fn search(&self, term: &str, page: u32) -> Result<SearchPage>;

    async fn get_summary(&self, recipe_id: RecipeId) -> Result<RecipeSummary>;

    async fn list_favourites(&self) -> Result<Vec<Recipe>>;

    /// Add or remove a favourite. Repeating an operation the backend has
    /// already applied is not an error by contract.
    async fn mutate_favourite(&self, recipe_id: RecipeId, op: FavouriteOp) -> Result<()>;
}

/// Reject search arguments the backend would never accept
pub fn validate_search(term: &str, page: u32) -> Result<()> {
    if term.trim().is_empty() {
        return Err(SyncError::validation("search term cannot be empty"));
    }
    if page == 0 {
        return Err(SyncError::validation("page numbers start at 1"));
    }
    Ok(())
}
