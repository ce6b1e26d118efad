use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use reqwest::{Client, RequestBuilder, Response};
use serde_json::json;

use crate::config::BackendConfig;
use crate::error::{Result, SyncError};
use crate::gateway::{validate_search, RecipeGateway};
use crate::model::{FavouriteOp, Recipe, RecipeId, RecipeList, RecipeSummary, SearchPage};

/// Gateway talking to the recipe backend proxy over HTTP.
///
/// The proxy holds the provider credentials; nothing secret passes through
/// this client.
pub struct HttpGateway {
    client: Client,
    base_url: String,
}

impl HttpGateway {
    /// Create a new gateway from configuration
    pub fn new(config: &BackendConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout))
            .user_agent(concat!("meal-planner-sync/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| SyncError::Builder(format!("Failed to create HTTP client: {}", e)))?;

        Ok(HttpGateway {
            client,
            base_url: trim_base_url(&config.base_url),
        })
    }

    /// Create a gateway against `base_url` with default client settings
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        HttpGateway {
            client: Client::new(),
            base_url: trim_base_url(&base_url.into()),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Send a request and turn non-success statuses into upstream errors
    async fn send(&self, request: RequestBuilder, action: &str) -> Result<Response> {
        let response = request.send().await.map_err(SyncError::Transport)?;
        let status = response.status();
        debug!("{} -> {}", action, status);

        if status.is_success() {
            return Ok(response);
        }

        let reason = status.canonical_reason().unwrap_or("unexpected status");
        let body = response.text().await.unwrap_or_default();
        if !body.is_empty() {
            debug!("{} error body: {}", action, body);
        }
        Err(SyncError::from_status(
            status.as_u16(),
            format!("Failed to {}: {}", action, reason),
        ))
    }
}

fn trim_base_url(base_url: &str) -> String {
    base_url.trim_end_matches('/').to_string()
}

#[async_trait]
impl RecipeGateway for HttpGateway {
    fn gateway_name(&self) -> &str {
        "http"
    }

    async fn search(&self, term: &str, page: u32) -> Result<SearchPage> {
        validate_search(term, page)?;

        let request = self
            .client
            .get(self.url("/recipes/search"))
            .query(&[("searchTerm", term.to_string()), ("page", page.to_string())]);
        let list: RecipeList = self.send(request, "fetch recipes").await?.json().await?;

        debug!("search {:?} page {} returned {} recipes", term, page, list.results.len());
        Ok(SearchPage {
            query: term.to_string(),
            page,
            items: list.results,
        })
    }

    async fn get_summary(&self, recipe_id: RecipeId) -> Result<RecipeSummary> {
        let request = self
            .client
            .get(self.url(&format!("/recipes/{}/summary", recipe_id)));
        let summary = self
            .send(request, "fetch recipe summary")
            .await?
            .json()
            .await?;
        Ok(summary)
    }

    async fn list_favourites(&self) -> Result<Vec<Recipe>> {
        let request = self.client.get(self.url("/recipes/favourite"));
        let list: RecipeList = self
            .send(request, "fetch favourite recipes")
            .await?
            .json()
            .await?;
        Ok(list.results)
    }

    async fn mutate_favourite(&self, recipe_id: RecipeId, op: FavouriteOp) -> Result<()> {
        let url = self.url("/recipes/favourite");
        let body = json!({ "recipeId": recipe_id });
        let (request, action) = match op {
            FavouriteOp::Add => (self.client.post(url).json(&body), "add favourite recipe"),
            FavouriteOp::Remove => (
                self.client.delete(url).json(&body),
                "remove favourite recipe",
            ),
        };

        self.send(request, action).await?;
        Ok(())
    }
}
