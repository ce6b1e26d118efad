mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{ids, recipe, recipes, Call, ScriptedGateway};
use meal_planner_sync::{FavouriteOp, FavouritesStore, SyncError};
use tokio::time::Instant;

#[tokio::test(start_paused = true)]
async fn test_load_populates_in_backend_order() {
    let gateway = Arc::new(ScriptedGateway::new());
    gateway.favourites_ok(0, recipes(&[5, 2, 9]));
    let store = FavouritesStore::new(gateway.clone());

    let count = store.load().await.unwrap();

    assert_eq!(count, 3);
    assert_eq!(ids(&store.favourites()), vec![5, 2, 9]);
    assert!(store.is_favourite(&recipe(2)));
    assert!(store.snapshot().loaded);
}

#[tokio::test(start_paused = true)]
async fn test_failed_load_leaves_store_empty() {
    let gateway = Arc::new(ScriptedGateway::new());
    gateway.favourites_err(0, 502);
    let store = FavouritesStore::new(gateway.clone());

    let result = store.load().await;

    assert!(matches!(result, Err(SyncError::Upstream { status: 502, .. })));
    let state = store.snapshot();
    assert!(state.favourites.is_empty());
    assert!(state.loaded);
    assert!(state.load_error.is_some());
    // Not retried
    assert_eq!(gateway.count(&Call::ListFavourites), 1);
}

#[tokio::test(start_paused = true)]
async fn test_toggle_applies_before_backend_confirms() {
    let gateway = Arc::new(ScriptedGateway::new());
    gateway.mutation(1, FavouriteOp::Add, 100, None);
    let store = FavouritesStore::new(gateway.clone());

    let handle = {
        let store = store.clone();
        tokio::spawn(async move { store.toggle(&recipe(1)).await })
    };
    while !store.is_pending(1) {
        tokio::task::yield_now().await;
    }

    assert!(store.is_favourite(&recipe(1)));

    assert!(handle.await.unwrap().unwrap());
    assert!(store.is_favourite(&recipe(1)));
    assert!(!store.is_pending(1));
}

#[tokio::test(start_paused = true)]
async fn test_failed_add_rolls_back() {
    let gateway = Arc::new(ScriptedGateway::new());
    gateway.mutation(1, FavouriteOp::Add, 20, Some(500));
    let store = FavouritesStore::new(gateway.clone());

    let result = store.toggle(&recipe(1)).await;

    assert!(result.is_err());
    assert!(!store.is_favourite(&recipe(1)));
    let failure = store.snapshot().last_failure.unwrap();
    assert_eq!(failure.recipe_id, 1);
    assert_eq!(failure.op, FavouriteOp::Add);
}

#[tokio::test(start_paused = true)]
async fn test_failed_remove_restores_display_position() {
    let gateway = Arc::new(ScriptedGateway::new());
    gateway
        .favourites_ok(0, recipes(&[1, 2, 3]))
        .mutation(2, FavouriteOp::Remove, 0, Some(503));
    let store = FavouritesStore::new(gateway.clone());
    store.load().await.unwrap();

    assert!(store.toggle(&recipe(2)).await.is_err());

    assert_eq!(ids(&store.favourites()), vec![1, 2, 3]);
}

#[tokio::test(start_paused = true)]
async fn test_rapid_add_then_remove_settles_on_remove() {
    let gateway = Arc::new(ScriptedGateway::new());
    gateway
        .mutation(1, FavouriteOp::Add, 50, None)
        .mutation(1, FavouriteOp::Remove, 50, None);
    let store = FavouritesStore::new(gateway.clone());

    let r1 = recipe(1);
    let r2 = recipe(1);
    let (added, removed) = tokio::join!(store.toggle(&r1), store.toggle(&r2));

    assert!(added.unwrap());
    assert!(!removed.unwrap());
    assert!(!store.is_favourite(&recipe(1)));
    assert_eq!(
        gateway.calls(),
        vec![
            Call::Mutate(1, FavouriteOp::Add),
            Call::Mutate(1, FavouriteOp::Remove)
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_same_recipe_toggles_run_one_at_a_time() {
    let gateway = Arc::new(ScriptedGateway::new());
    gateway
        .mutation(1, FavouriteOp::Add, 100, None)
        .mutation(1, FavouriteOp::Remove, 100, None);
    let store = FavouritesStore::new(gateway.clone());
    let start = Instant::now();

    let r1 = recipe(1);
    let r2 = recipe(1);
    let _ = tokio::join!(store.toggle(&r1), store.toggle(&r2));

    assert!(start.elapsed() >= Duration::from_millis(200));
}

#[tokio::test(start_paused = true)]
async fn test_different_recipes_toggle_concurrently() {
    let gateway = Arc::new(ScriptedGateway::new());
    gateway
        .mutation(1, FavouriteOp::Add, 100, None)
        .mutation(2, FavouriteOp::Add, 100, None);
    let store = FavouritesStore::new(gateway.clone());
    let start = Instant::now();

    let r1 = recipe(1);
    let r2 = recipe(2);
    let (first, second) = tokio::join!(store.toggle(&r1), store.toggle(&r2));

    assert!(first.unwrap() && second.unwrap());
    assert!(start.elapsed() < Duration::from_millis(200));
    assert_eq!(ids(&store.favourites()), vec![1, 2]);
}

#[tokio::test(start_paused = true)]
async fn test_second_toggle_after_failed_first_decides_from_settled_state() {
    let gateway = Arc::new(ScriptedGateway::new());
    gateway
        .mutation(1, FavouriteOp::Add, 50, Some(500))
        .mutation(1, FavouriteOp::Add, 50, None);
    let store = FavouritesStore::new(gateway.clone());

    let r1 = recipe(1);
    let r2 = recipe(1);
    let (first, second) = tokio::join!(store.toggle(&r1), store.toggle(&r2));

    // The first add was rolled back, so the second toggle adds again
    assert!(first.is_err());
    assert!(second.unwrap());
    assert!(store.is_favourite(&recipe(1)));
}

#[tokio::test(start_paused = true)]
async fn test_remove_of_absent_favourite_counts_as_done() {
    let gateway = Arc::new(ScriptedGateway::new());
    gateway
        .favourites_ok(0, recipes(&[4]))
        .mutation(4, FavouriteOp::Remove, 0, Some(404));
    let store = FavouritesStore::new(gateway.clone());
    store.load().await.unwrap();

    let result = store.toggle(&recipe(4)).await;

    assert!(!result.unwrap());
    assert!(!store.is_favourite(&recipe(4)));
    assert!(store.snapshot().last_failure.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_set_favourite_skips_when_already_in_state() {
    let gateway = Arc::new(ScriptedGateway::new());
    gateway.favourites_ok(0, recipes(&[4]));
    let store = FavouritesStore::new(gateway.clone());
    store.load().await.unwrap();

    assert!(store.set_favourite(&recipe(4), true).await.unwrap());

    assert!(!gateway
        .calls()
        .iter()
        .any(|c| matches!(c, Call::Mutate(..))));
}

#[tokio::test(start_paused = true)]
async fn test_load_keeps_in_flight_mutation() {
    let gateway = Arc::new(ScriptedGateway::new());
    gateway
        .favourites_ok(50, recipes(&[1]))
        .mutation(2, FavouriteOp::Add, 100, None);
    let store = FavouritesStore::new(gateway.clone());

    let r = recipe(2);
    let (loaded, added) = tokio::join!(store.load(), store.toggle(&r));

    assert_eq!(loaded.unwrap(), 1);
    assert!(added.unwrap());
    assert_eq!(ids(&store.favourites()), vec![1, 2]);
}

#[tokio::test(start_paused = true)]
async fn test_load_answering_after_confirmed_toggle_keeps_it() {
    let gateway = Arc::new(ScriptedGateway::new());
    gateway
        .favourites_ok(100, recipes(&[1]))
        .mutation(2, FavouriteOp::Add, 10, None);
    let store = FavouritesStore::new(gateway.clone());

    let r = recipe(2);
    let (loaded, added) = tokio::join!(store.load(), store.toggle(&r));

    assert_eq!(loaded.unwrap(), 1);
    assert!(added.unwrap());
    assert_eq!(ids(&store.favourites()), vec![1, 2]);
    assert!(store.is_favourite(&recipe(2)));
    assert!(!store.snapshot().has_pending());
}

#[tokio::test(start_paused = true)]
async fn test_cards_flag_favourites() {
    let gateway = Arc::new(ScriptedGateway::new());
    gateway.favourites_ok(0, recipes(&[2]));
    let store = FavouritesStore::new(gateway.clone());
    store.load().await.unwrap();

    let cards = store.cards(&recipes(&[1, 2, 3]));

    let flags: Vec<_> = cards.iter().map(|c| c.is_favourite).collect();
    assert_eq!(flags, vec![false, true, false]);
}

#[tokio::test(start_paused = true)]
async fn test_abandoned_toggle_is_rolled_back() {
    let gateway = Arc::new(ScriptedGateway::new());
    gateway.mutation(1, FavouriteOp::Add, 1_000, None);
    let store = FavouritesStore::new(gateway.clone());

    let result =
        tokio::time::timeout(Duration::from_millis(10), store.toggle(&recipe(1))).await;

    assert!(result.is_err());
    assert!(!store.is_favourite(&recipe(1)));
    assert!(!store.is_pending(1));
}
