use std::collections::HashSet;

use serde::{Deserialize, Serialize};

/// Provider-assigned recipe identifier
pub type RecipeId = u64;

/// A recipe as listed in search results and favourites
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipe {
    pub id: RecipeId,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub image: Option<String>,
}

impl Recipe {
    pub fn new(id: RecipeId, title: impl Into<String>) -> Self {
        Recipe {
            id,
            title: title.into(),
            image: None,
        }
    }

    pub fn with_image(mut self, image: impl Into<String>) -> Self {
        self.image = Some(image.into());
        self
    }

    /// Title for display, falling back when the provider sent none
    pub fn display_title(&self) -> &str {
        if self.title.trim().is_empty() {
            "Untitled Recipe"
        } else {
            &self.title
        }
    }
}

/// Richer, separately fetched description of a single recipe
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipeSummary {
    pub id: RecipeId,
    #[serde(default)]
    pub title: String,
    /// Provider markup, sanitize before display
    #[serde(rename = "summary", default)]
    pub summary_html: String,
}

impl RecipeSummary {
    /// Summary markup reduced to an allow-listed subset of tags
    pub fn sanitized_html(&self) -> String {
        crate::sanitize::sanitize_summary(&self.summary_html)
    }

    pub fn plain_text(&self) -> String {
        crate::sanitize::summary_text(&self.summary_html)
    }
}

/// Wire envelope shared by the search and favourites endpoints
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RecipeList {
    #[serde(default)]
    pub results: Vec<Recipe>,
}

/// One page of search results for a query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchPage {
    pub query: String,
    pub page: u32,
    pub items: Vec<Recipe>,
}

/// Accumulated results of the current query, unique by recipe id
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchResultSet {
    pub query: String,
    pub page: u32,
    items: Vec<Recipe>,
    ids: HashSet<RecipeId>,
}

impl SearchResultSet {
    pub fn from_page(page: SearchPage) -> Self {
        let mut set = SearchResultSet {
            query: page.query,
            page: page.page,
            items: Vec::with_capacity(page.items.len()),
            ids: HashSet::with_capacity(page.items.len()),
        };
        set.push_unique(page.items);
        set
    }

    /// Append items in provider order, skipping ids already present.
    /// Returns how many were added.
    pub fn push_unique(&mut self, items: Vec<Recipe>) -> usize {
        let before = self.items.len();
        for recipe in items {
            if self.ids.insert(recipe.id) {
                self.items.push(recipe);
            }
        }
        self.items.len() - before
    }

    pub fn contains(&self, id: RecipeId) -> bool {
        self.ids.contains(&id)
    }

    /// Recipes in provider order
    pub fn items(&self) -> &[Recipe] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Direction of a favourite mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FavouriteOp {
    Add,
    Remove,
}

impl FavouriteOp {
    pub fn for_membership(favourite: bool) -> Self {
        if favourite {
            FavouriteOp::Add
        } else {
            FavouriteOp::Remove
        }
    }
}

/// A recipe paired with its favourite flag, ready for rendering
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecipeCard {
    pub recipe: Recipe,
    pub is_favourite: bool,
}
