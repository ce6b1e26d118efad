pub mod config;
pub mod coordination;
pub mod detail;
pub mod error;
pub mod favourites;
pub mod gateway;
pub mod model;
pub mod planner;
pub mod sanitize;
pub mod search;

// Re-export commonly used types
pub use config::BackendConfig;
pub use detail::{DetailLoader, DetailOutcome, DetailRequest, DetailStatus};
pub use error::{Result, SyncError};
pub use favourites::{FavouriteFailure, FavouriteSet, FavouritesState, FavouritesStore};
pub use gateway::{HttpGateway, RecipeGateway};
pub use model::{FavouriteOp, Recipe, RecipeCard, RecipeId, RecipeSummary, SearchPage, SearchResultSet};
pub use planner::{MealPlanner, MealPlannerBuilder, Tab};
pub use search::{LoadMoreOutcome, SearchSession, SearchState, SubmitOutcome};

/// Search the configured backend once and return the first page of recipes.
///
/// # Example
/// ```no_run
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let recipes = meal_planner_sync::search_recipes("pasta").await?;
/// for recipe in recipes {
///     println!("{}", recipe.display_title());
/// }
/// # Ok(())
/// # }
/// ```
pub async fn search_recipes(term: &str) -> Result<Vec<Recipe>> {
    let planner = MealPlanner::builder().build()?;
    planner.search().submit(term).await?;
    Ok(planner.search().items())
}
