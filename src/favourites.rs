use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use log::{debug, info, warn};
use tokio::sync::watch;

use crate::coordination::KeyedSerializer;
use crate::error::Result;
use crate::gateway::RecipeGateway;
use crate::model::{FavouriteOp, Recipe, RecipeCard, RecipeId};

/// Favourite recipes in display order with O(1) membership
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FavouriteSet {
    order: Vec<Recipe>,
    ids: HashSet<RecipeId>,
}

impl FavouriteSet {
    pub fn from_recipes(recipes: Vec<Recipe>) -> Self {
        let mut set = FavouriteSet::default();
        for recipe in recipes {
            set.insert(recipe);
        }
        set
    }

    pub fn contains(&self, id: RecipeId) -> bool {
        self.ids.contains(&id)
    }

    /// Append `recipe` unless its id is already present
    pub fn insert(&mut self, recipe: Recipe) -> bool {
        let index = self.order.len();
        self.insert_at(index, recipe)
    }

    /// Insert at a display position, clamped to the current length
    pub fn insert_at(&mut self, index: usize, recipe: Recipe) -> bool {
        if !self.ids.insert(recipe.id) {
            return false;
        }
        let index = index.min(self.order.len());
        self.order.insert(index, recipe);
        true
    }

    /// Remove by id, returning the former position and recipe
    pub fn remove(&mut self, id: RecipeId) -> Option<(usize, Recipe)> {
        if !self.ids.remove(&id) {
            return None;
        }
        let index = self.order.iter().position(|r| r.id == id)?;
        Some((index, self.order.remove(index)))
    }

    pub fn position(&self, id: RecipeId) -> Option<usize> {
        if !self.contains(id) {
            return None;
        }
        self.order.iter().position(|r| r.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Recipe> {
        self.order.iter()
    }

    pub fn to_vec(&self) -> Vec<Recipe> {
        self.order.clone()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

/// Membership before an optimistic mutation, kept until the backend answers
#[derive(Debug, Clone, PartialEq, Eq)]
struct PendingCorrection {
    recipe: Recipe,
    desired: bool,
    previous: Option<(usize, Recipe)>,
}

/// A mutation the backend rejected and that was rolled back
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FavouriteFailure {
    pub recipe_id: RecipeId,
    pub op: FavouriteOp,
    pub message: String,
}

/// Published state of the favourites store
#[derive(Debug, Clone, Default)]
pub struct FavouritesState {
    pub favourites: FavouriteSet,
    /// Whether the initial load has completed, successfully or not
    pub loaded: bool,
    pub load_error: Option<String>,
    pub last_failure: Option<FavouriteFailure>,
    pending: HashMap<RecipeId, PendingCorrection>,
    loads_in_flight: usize,
    /// Mutations confirmed while a load was in flight, latest per recipe
    confirmed_during_load: HashMap<RecipeId, (Recipe, bool)>,
}

impl FavouritesState {
    pub fn is_pending(&self, id: RecipeId) -> bool {
        self.pending.contains_key(&id)
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    fn begin_mutation(&mut self, recipe: &Recipe, desired: bool) {
        let previous = self
            .favourites
            .position(recipe.id)
            .and_then(|index| self.favourites.order.get(index).cloned().map(|r| (index, r)));

        if desired {
            self.favourites.insert(recipe.clone());
        } else {
            self.favourites.remove(recipe.id);
        }

        self.pending.insert(
            recipe.id,
            PendingCorrection {
                recipe: recipe.clone(),
                desired,
                previous,
            },
        );
    }

    fn confirm(&mut self, id: RecipeId) {
        let Some(correction) = self.pending.remove(&id) else {
            return;
        };
        // A load issued before this confirmation may answer without it
        if self.loads_in_flight > 0 {
            self.confirmed_during_load
                .insert(id, (correction.recipe, correction.desired));
        }
    }

    fn rollback(&mut self, id: RecipeId) {
        let Some(correction) = self.pending.remove(&id) else {
            return;
        };

        self.favourites.remove(id);
        if let Some((index, recipe)) = correction.previous {
            self.favourites.insert_at(index, recipe);
        }
    }

    fn begin_load(&mut self) {
        self.loads_in_flight += 1;
    }

    fn end_load(&mut self) {
        self.loads_in_flight = self.loads_in_flight.saturating_sub(1);
        if self.loads_in_flight == 0 {
            self.confirmed_during_load.clear();
        }
    }

    /// Install a freshly loaded set. Mutations confirmed since the load was
    /// issued are replayed, then in-flight ones are applied on top.
    fn replace_loaded(&mut self, loaded: FavouriteSet) {
        self.favourites = loaded;

        for (id, (recipe, desired)) in &self.confirmed_during_load {
            if *desired {
                self.favourites.insert(recipe.clone());
            } else {
                self.favourites.remove(*id);
            }
        }

        for (id, correction) in self.pending.iter_mut() {
            correction.previous = self
                .favourites
                .position(*id)
                .and_then(|index| self.favourites.order.get(index).cloned().map(|r| (index, r)));

            if correction.desired {
                self.favourites.insert(correction.recipe.clone());
            } else {
                self.favourites.remove(*id);
            }
        }
    }
}

/// Owner of the favourite set. Cloning yields another handle to the same store.
#[derive(Clone)]
pub struct FavouritesStore {
    gateway: Arc<dyn RecipeGateway>,
    state: Arc<watch::Sender<FavouritesState>>,
    serializer: Arc<KeyedSerializer<RecipeId>>,
}

impl FavouritesStore {
    pub fn new(gateway: Arc<dyn RecipeGateway>) -> Self {
        let (state, _) = watch::channel(FavouritesState::default());
        FavouritesStore {
            gateway,
            state: Arc::new(state),
            serializer: Arc::new(KeyedSerializer::new()),
        }
    }

    /// Populate the store from the backend.
    ///
    /// On failure the store keeps what it has (empty at startup), records the
    /// error and returns it; it is not retried.
    pub async fn load(&self) -> Result<usize> {
        self.state.send_if_modified(|s| {
            s.begin_load();
            false
        });
        let _load = LoadInFlight { store: self };

        match self.gateway.list_favourites().await {
            Ok(recipes) => {
                let loaded = FavouriteSet::from_recipes(recipes);
                let count = loaded.len();
                self.state.send_modify(|s| {
                    s.replace_loaded(loaded);
                    s.loaded = true;
                    s.load_error = None;
                });
                info!("Loaded {} favourite recipes", count);
                Ok(count)
            }
            Err(e) => {
                warn!("Failed to load favourite recipes: {}", e);
                let message = e.to_string();
                self.state.send_modify(|s| {
                    s.loaded = true;
                    s.load_error = Some(message);
                });
                Err(e)
            }
        }
    }

    pub fn is_favourite(&self, recipe: &Recipe) -> bool {
        self.contains(recipe.id)
    }

    pub fn contains(&self, id: RecipeId) -> bool {
        self.state.borrow().favourites.contains(id)
    }

    /// Whether a mutation for `id` is waiting on the backend
    pub fn is_pending(&self, id: RecipeId) -> bool {
        self.state.borrow().is_pending(id)
    }

    /// Favourites in display order
    pub fn favourites(&self) -> Vec<Recipe> {
        self.state.borrow().favourites.to_vec()
    }

    pub fn snapshot(&self) -> FavouritesState {
        self.state.borrow().clone()
    }

    /// Receive every published change of the store's state
    pub fn subscribe(&self) -> watch::Receiver<FavouritesState> {
        self.state.subscribe()
    }

    /// Pair each recipe with its current favourite flag
    pub fn cards(&self, recipes: &[Recipe]) -> Vec<RecipeCard> {
        let state = self.state.borrow();
        recipes
            .iter()
            .map(|recipe| RecipeCard {
                recipe: recipe.clone(),
                is_favourite: state.favourites.contains(recipe.id),
            })
            .collect()
    }

    /// Flip membership of `recipe`.
    ///
    /// Waits for any in-flight mutation on the same recipe first, so the
    /// direction is decided against settled state. Returns the membership the
    /// backend confirmed.
    pub async fn toggle(&self, recipe: &Recipe) -> Result<bool> {
        let _slot = self.serializer.acquire(recipe.id).await;
        let desired = !self.is_favourite(recipe);
        self.apply(recipe, desired).await
    }

    /// Make `recipe` a favourite (or not). A no-op if it already is.
    pub async fn set_favourite(&self, recipe: &Recipe, favourite: bool) -> Result<bool> {
        let _slot = self.serializer.acquire(recipe.id).await;
        if self.is_favourite(recipe) == favourite {
            return Ok(favourite);
        }
        self.apply(recipe, favourite).await
    }

    async fn apply(&self, recipe: &Recipe, desired: bool) -> Result<bool> {
        let op = FavouriteOp::for_membership(desired);
        self.state.send_modify(|s| s.begin_mutation(recipe, desired));
        let mut pending = PendingMutation {
            store: self,
            recipe_id: recipe.id,
            settled: false,
        };

        debug!("{:?} favourite {} (optimistic)", op, recipe.id);
        let result = self.gateway.mutate_favourite(recipe.id, op).await;
        pending.settled = true;

        match result {
            Ok(()) => {
                self.state.send_modify(|s| s.confirm(recipe.id));
                Ok(desired)
            }
            // Already absent on the backend, which is what we asked for
            Err(e) if op == FavouriteOp::Remove && e.is_not_found() => {
                debug!("favourite {} already absent: {}", recipe.id, e);
                self.state.send_modify(|s| s.confirm(recipe.id));
                Ok(desired)
            }
            Err(e) => {
                warn!(
                    "Failed to {:?} favourite {}, rolling back: {}",
                    op, recipe.id, e
                );
                let failure = FavouriteFailure {
                    recipe_id: recipe.id,
                    op,
                    message: e.to_string(),
                };
                self.state.send_modify(|s| {
                    s.rollback(recipe.id);
                    s.last_failure = Some(failure);
                });
                Err(e)
            }
        }
    }
}

/// Marks the end of a favourites load, however it finishes
struct LoadInFlight<'a> {
    store: &'a FavouritesStore,
}

impl Drop for LoadInFlight<'_> {
    fn drop(&mut self) {
        self.store.state.send_if_modified(|s| {
            s.end_load();
            false
        });
    }
}

/// Rolls an optimistic mutation back if its future is dropped before the
/// backend answered.
struct PendingMutation<'a> {
    store: &'a FavouritesStore,
    recipe_id: RecipeId,
    settled: bool,
}

impl Drop for PendingMutation<'_> {
    fn drop(&mut self) {
        if !self.settled {
            debug!("favourite {} mutation abandoned, rolling back", self.recipe_id);
            let id = self.recipe_id;
            self.store.state.send_modify(|s| s.rollback(id));
        }
    }
}
