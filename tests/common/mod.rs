#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use meal_planner_sync::{
    FavouriteOp, Recipe, RecipeGateway, RecipeId, RecipeSummary, Result, SearchPage, SyncError,
};

/// A call the gateway received, in arrival order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Search { term: String, page: u32 },
    Summary(RecipeId),
    ListFavourites,
    Mutate(RecipeId, FavouriteOp),
}

#[derive(Clone)]
struct Scripted<T> {
    delay: Duration,
    result: std::result::Result<T, u16>,
}

/// Responses queue per call. The last scripted response for a key repeats.
fn next<K: Eq + std::hash::Hash, T: Clone>(
    queues: &Mutex<HashMap<K, VecDeque<Scripted<T>>>>,
    key: &K,
) -> Option<Scripted<T>> {
    let mut queues = queues.lock().unwrap();
    let queue = queues.get_mut(key)?;
    if queue.len() > 1 {
        queue.pop_front()
    } else {
        queue.front().cloned()
    }
}

fn push<K: Eq + std::hash::Hash, T>(
    queues: &Mutex<HashMap<K, VecDeque<Scripted<T>>>>,
    key: K,
    scripted: Scripted<T>,
) {
    queues
        .lock()
        .unwrap()
        .entry(key)
        .or_default()
        .push_back(scripted);
}

async fn resolve<T>(scripted: Scripted<T>) -> Result<T> {
    tokio::time::sleep(scripted.delay).await;
    scripted
        .result
        .map_err(|status| SyncError::from_status(status, format!("scripted status {}", status)))
}

/// In-process gateway whose responses and latencies are scripted per call.
/// Run tests with `start_paused = true` so delays are deterministic.
#[derive(Default)]
pub struct ScriptedGateway {
    searches: Mutex<HashMap<(String, u32), VecDeque<Scripted<Vec<Recipe>>>>>,
    summaries: Mutex<HashMap<RecipeId, VecDeque<Scripted<RecipeSummary>>>>,
    favourites: Mutex<HashMap<(), VecDeque<Scripted<Vec<Recipe>>>>>,
    mutations: Mutex<HashMap<(RecipeId, FavouriteOp), VecDeque<Scripted<()>>>>,
    calls: Mutex<Vec<Call>>,
}

impl ScriptedGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn search_ok(&self, term: &str, page: u32, delay_ms: u64, items: Vec<Recipe>) -> &Self {
        push(
            &self.searches,
            (term.to_string(), page),
            Scripted {
                delay: Duration::from_millis(delay_ms),
                result: Ok(items),
            },
        );
        self
    }

    pub fn search_err(&self, term: &str, page: u32, delay_ms: u64, status: u16) -> &Self {
        push(
            &self.searches,
            (term.to_string(), page),
            Scripted {
                delay: Duration::from_millis(delay_ms),
                result: Err(status),
            },
        );
        self
    }

    pub fn summary_ok(&self, id: RecipeId, delay_ms: u64, title: &str, summary: &str) -> &Self {
        push(
            &self.summaries,
            id,
            Scripted {
                delay: Duration::from_millis(delay_ms),
                result: Ok(RecipeSummary {
                    id,
                    title: title.to_string(),
                    summary_html: summary.to_string(),
                }),
            },
        );
        self
    }

    pub fn summary_err(&self, id: RecipeId, delay_ms: u64, status: u16) -> &Self {
        push(
            &self.summaries,
            id,
            Scripted {
                delay: Duration::from_millis(delay_ms),
                result: Err(status),
            },
        );
        self
    }

    pub fn favourites_ok(&self, delay_ms: u64, recipes: Vec<Recipe>) -> &Self {
        push(
            &self.favourites,
            (),
            Scripted {
                delay: Duration::from_millis(delay_ms),
                result: Ok(recipes),
            },
        );
        self
    }

    pub fn favourites_err(&self, delay_ms: u64, status: u16) -> &Self {
        push(
            &self.favourites,
            (),
            Scripted {
                delay: Duration::from_millis(delay_ms),
                result: Err(status),
            },
        );
        self
    }

    /// Script a mutation response. Unscripted mutations succeed immediately.
    pub fn mutation(
        &self,
        id: RecipeId,
        op: FavouriteOp,
        delay_ms: u64,
        status: Option<u16>,
    ) -> &Self {
        push(
            &self.mutations,
            (id, op),
            Scripted {
                delay: Duration::from_millis(delay_ms),
                result: match status {
                    Some(status) => Err(status),
                    None => Ok(()),
                },
            },
        );
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, call: &Call) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| *c == call).count()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl RecipeGateway for ScriptedGateway {
    fn gateway_name(&self) -> &str {
        "scripted"
    }

    async fn search(&self, term: &str, page: u32) -> Result<SearchPage> {
        meal_planner_sync::gateway::validate_search(term, page)?;
        self.record(Call::Search {
            term: term.to_string(),
            page,
        });

        let scripted = next(&self.searches, &(term.to_string(), page)).unwrap_or(Scripted {
            delay: Duration::ZERO,
            result: Err(500),
        });
        let items = resolve(scripted).await?;
        Ok(SearchPage {
            query: term.to_string(),
            page,
            items,
        })
    }

    async fn get_summary(&self, recipe_id: RecipeId) -> Result<RecipeSummary> {
        self.record(Call::Summary(recipe_id));
        let scripted = next(&self.summaries, &recipe_id).unwrap_or(Scripted {
            delay: Duration::ZERO,
            result: Err(404),
        });
        resolve(scripted).await
    }

    async fn list_favourites(&self) -> Result<Vec<Recipe>> {
        self.record(Call::ListFavourites);
        let scripted = next(&self.favourites, &()).unwrap_or(Scripted {
            delay: Duration::ZERO,
            result: Ok(Vec::new()),
        });
        resolve(scripted).await
    }

    async fn mutate_favourite(&self, recipe_id: RecipeId, op: FavouriteOp) -> Result<()> {
        self.record(Call::Mutate(recipe_id, op));
        let scripted = next(&self.mutations, &(recipe_id, op)).unwrap_or(Scripted {
            delay: Duration::ZERO,
            result: Ok(()),
        });
        resolve(scripted).await
    }
}

pub fn recipe(id: RecipeId) -> Recipe {
    Recipe::new(id, format!("Recipe {}", id))
}

pub fn recipes(ids: &[RecipeId]) -> Vec<Recipe> {
    ids.iter().copied().map(recipe).collect()
}

pub fn ids(recipes: &[Recipe]) -> Vec<RecipeId> {
    recipes.iter().map(|r| r.id).collect()
}
