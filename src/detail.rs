use std::sync::Arc;

use log::{debug, warn};
use tokio::sync::watch;

use crate::coordination::{RequestToken, TokenCounter};
use crate::gateway::RecipeGateway;
use crate::model::{RecipeId, RecipeSummary};

/// Message shown when a summary could not be fetched
pub const SUMMARY_FAILED_MESSAGE: &str = "Failed to load recipe summary. Please try again later.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetailStatus {
    /// Nothing is open
    Idle,
    Pending,
    Ready,
    Failed,
}

/// One open of the detail overlay
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetailRequest {
    pub recipe_id: RecipeId,
    pub status: DetailStatus,
    pub result: Option<RecipeSummary>,
    pub error_message: Option<String>,
    token: RequestToken,
}

impl DetailRequest {
    fn pending(recipe_id: RecipeId, token: RequestToken) -> Self {
        DetailRequest {
            recipe_id,
            status: DetailStatus::Pending,
            result: None,
            error_message: None,
            token,
        }
    }

    /// Summary markup safe to hand to a renderer
    pub fn sanitized_html(&self) -> Option<String> {
        self.result.as_ref().map(RecipeSummary::sanitized_html)
    }
}

/// What became of an `open` call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DetailOutcome {
    Ready(RecipeSummary),
    Failed(String),
    /// The overlay was closed or moved to another open before the response
    Discarded,
}

/// The detail overlay slot. Cloning yields another handle to the same slot.
///
/// Each open is stamped with its own token. Closing or opening another recipe
/// moves the token on, so a response carrying an older token is dropped.
#[derive(Clone)]
pub struct DetailLoader {
    gateway: Arc<dyn RecipeGateway>,
    state: Arc<watch::Sender<Option<DetailRequest>>>,
    opens: Arc<TokenCounter>,
}

impl DetailLoader {
    pub fn new(gateway: Arc<dyn RecipeGateway>) -> Self {
        let (state, _) = watch::channel(None);
        DetailLoader {
            gateway,
            state: Arc::new(state),
            opens: Arc::new(TokenCounter::new()),
        }
    }

    /// Open the overlay for `recipe_id` and fetch its summary.
    ///
    /// Always fetches; nothing is cached between opens. Failures become
    /// display state and are not retried.
    pub async fn open(&self, recipe_id: RecipeId) -> DetailOutcome {
        let token = self.opens.issue();
        self.state
            .send_replace(Some(DetailRequest::pending(recipe_id, token)));

        let mut request = OpenInFlight {
            loader: self,
            token,
            settled: false,
        };

        debug!("fetching summary for recipe {}", recipe_id);
        let result = self.gateway.get_summary(recipe_id).await;
        request.settled = true;

        let mut outcome = DetailOutcome::Discarded;
        self.state.send_if_modified(|current| {
            let Some(request) = current.as_mut().filter(|r| r.token == token) else {
                return false;
            };

            match result {
                Ok(summary) => {
                    request.status = DetailStatus::Ready;
                    request.result = Some(summary.clone());
                    outcome = DetailOutcome::Ready(summary);
                }
                Err(e) => {
                    warn!("Failed to fetch summary for recipe {}: {}", recipe_id, e);
                    request.status = DetailStatus::Failed;
                    request.error_message = Some(SUMMARY_FAILED_MESSAGE.to_string());
                    outcome = DetailOutcome::Failed(SUMMARY_FAILED_MESSAGE.to_string());
                }
            }
            true
        });

        if outcome == DetailOutcome::Discarded {
            debug!("discarding summary for recipe {}, overlay moved on", recipe_id);
        }
        outcome
    }

    /// Close the overlay. Any response still in flight will be ignored.
    pub fn close(&self) {
        // Moving the counter on invalidates the open request's token
        self.opens.issue();
        self.state.send_replace(None);
    }

    pub fn current(&self) -> Option<DetailRequest> {
        self.state.borrow().clone()
    }

    pub fn status(&self) -> DetailStatus {
        self.state
            .borrow()
            .as_ref()
            .map_or(DetailStatus::Idle, |r| r.status)
    }

    pub fn is_open(&self) -> bool {
        self.state.borrow().is_some()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<DetailRequest>> {
        self.state.subscribe()
    }
}

/// Fails the open request if its future is dropped before the summary arrives
struct OpenInFlight<'a> {
    loader: &'a DetailLoader,
    token: RequestToken,
    settled: bool,
}

impl Drop for OpenInFlight<'_> {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        let token = self.token;
        self.loader.state.send_if_modified(|current| {
            let Some(request) = current.as_mut().filter(|r| r.token == token) else {
                return false;
            };
            debug!("summary request for recipe {} abandoned", request.recipe_id);
            request.status = DetailStatus::Failed;
            request.error_message = Some(SUMMARY_FAILED_MESSAGE.to_string());
            true
        });
    }
}
