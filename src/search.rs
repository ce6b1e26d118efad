use std::sync::Arc;

use log::{debug, info, warn};
use tokio::sync::watch;

use crate::coordination::{InFlight, RequestToken, TokenCounter};
use crate::error::Result;
use crate::gateway::{validate_search, RecipeGateway};
use crate::model::{Recipe, SearchPage, SearchResultSet};

/// What became of a `submit` call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Results were replaced with this many recipes
    Applied { count: usize },
    /// A later submission owns the results; this response was dropped
    Superseded,
}

/// What became of a `load_more` call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadMoreOutcome {
    /// The next page was appended
    Appended { page: u32, added: usize },
    /// No search has succeeded yet
    NothingToLoad,
    /// Another page request was already in flight
    Coalesced,
    /// The query changed while the page was loading
    Superseded,
}

enum LoadMoreStart {
    NothingToLoad,
    Coalesced,
    Begin {
        generation: RequestToken,
        query: String,
        page: u32,
    },
}

/// Published state of a search session
#[derive(Debug, Clone, Default)]
pub struct SearchState {
    /// Results of the last successful submission, `None` until one succeeds
    pub results: Option<SearchResultSet>,
    /// A submission is waiting on the backend
    pub searching: bool,
    /// The last page came back shorter than a full page
    pub exhausted: bool,
    pub last_error: Option<String>,
    latest_term: Option<String>,
    generation: Option<RequestToken>,
    page_requests: InFlight<RequestToken>,
}

impl SearchState {
    /// Query the displayed results belong to
    pub fn query(&self) -> Option<&str> {
        self.results.as_ref().map(|r| r.query.as_str())
    }

    /// Highest page loaded, 0 before the first successful search
    pub fn page(&self) -> u32 {
        self.results.as_ref().map_or(0, |r| r.page)
    }

    pub fn items(&self) -> &[Recipe] {
        self.results
            .as_ref()
            .map(SearchResultSet::items)
            .unwrap_or(&[])
    }

    pub fn is_loading_more(&self) -> bool {
        !self.page_requests.is_empty()
    }

    /// Whether a response for submission `token` may still be applied.
    ///
    /// It must be newer than what is displayed, and either be the latest
    /// submission or share the latest submission's term.
    fn accepts(&self, token: RequestToken, term: &str, latest: bool) -> bool {
        let newer = self.generation.map_or(true, |applied| token > applied);
        newer && (latest || self.latest_term.as_deref() == Some(term))
    }

    fn finish_submit(
        &mut self,
        token: RequestToken,
        term: &str,
        latest: bool,
        result: Result<SearchPage>,
        results_per_page: u32,
    ) -> Result<SubmitOutcome> {
        if latest {
            self.searching = false;
        }
        if !self.accepts(token, term, latest) {
            return Ok(SubmitOutcome::Superseded);
        }

        match result {
            Ok(page) => {
                self.exhausted = (page.items.len() as u32) < results_per_page;
                let results = SearchResultSet::from_page(page);
                let count = results.len();
                self.results = Some(results);
                self.generation = Some(token);
                self.page_requests.clear();
                self.last_error = None;
                Ok(SubmitOutcome::Applied { count })
            }
            Err(e) => {
                self.last_error = Some(e.to_string());
                Err(e)
            }
        }
    }

    fn begin_load_more(&mut self, token: RequestToken) -> LoadMoreStart {
        let (Some(generation), Some(results)) = (self.generation, self.results.as_ref()) else {
            return LoadMoreStart::NothingToLoad;
        };
        let query = results.query.clone();
        let page = results.page + 1;

        if !self.page_requests.try_begin(generation, token) {
            return LoadMoreStart::Coalesced;
        }
        LoadMoreStart::Begin {
            generation,
            query,
            page,
        }
    }

    fn finish_load_more(
        &mut self,
        generation: RequestToken,
        token: RequestToken,
        result: Result<SearchPage>,
        results_per_page: u32,
    ) -> Result<LoadMoreOutcome> {
        if self.generation != Some(generation) || !self.page_requests.finish(&generation, token) {
            return Ok(LoadMoreOutcome::Superseded);
        }
        let Some(results) = self.results.as_mut() else {
            return Ok(LoadMoreOutcome::Superseded);
        };

        match result {
            Ok(page) => {
                self.exhausted = (page.items.len() as u32) < results_per_page;
                let added = results.push_unique(page.items);
                results.page = page.page;
                self.last_error = None;
                Ok(LoadMoreOutcome::Appended {
                    page: page.page,
                    added,
                })
            }
            Err(e) => {
                self.last_error = Some(e.to_string());
                Err(e)
            }
        }
    }
}

/// Coordinates fresh searches and "load more" appends against one gateway.
/// Cloning yields another handle to the same session.
#[derive(Clone)]
pub struct SearchSession {
    gateway: Arc<dyn RecipeGateway>,
    state: Arc<watch::Sender<SearchState>>,
    submissions: Arc<TokenCounter>,
    page_tokens: Arc<TokenCounter>,
    results_per_page: u32,
}

impl SearchSession {
    pub fn new(gateway: Arc<dyn RecipeGateway>, results_per_page: u32) -> Self {
        let (state, _) = watch::channel(SearchState::default());
        SearchSession {
            gateway,
            state: Arc::new(state),
            submissions: Arc::new(TokenCounter::new()),
            page_tokens: Arc::new(TokenCounter::new()),
            results_per_page,
        }
    }

    /// Start a fresh search for `term` at page 1.
    ///
    /// On success the results are replaced wholesale. On failure the previous
    /// results stay and the error is returned and recorded. A response is
    /// dropped if a later submission has been issued for a different term or
    /// has already been applied.
    pub async fn submit(&self, term: &str) -> Result<SubmitOutcome> {
        let term = term.trim();
        if let Err(e) = validate_search(term, 1) {
            warn!("Rejected search: {}", e);
            return Err(e);
        }

        let token = self.submissions.issue();
        self.state.send_modify(|s| {
            s.latest_term = Some(term.to_string());
            s.searching = true;
        });

        let mut request = SubmitInFlight {
            session: self,
            token,
            settled: false,
        };

        debug!("search {:?} issued as #{}", term, token.value());
        let result = self.gateway.search(term, 1).await;
        request.settled = true;

        let per_page = self.results_per_page;
        let mut outcome = Ok(SubmitOutcome::Superseded);
        self.state.send_modify(|s| {
            let latest = self.submissions.is_latest(token);
            outcome = s.finish_submit(token, term, latest, result, per_page)
        });

        match &outcome {
            Ok(SubmitOutcome::Applied { count }) => {
                info!("Search {:?} returned {} recipes", term, count)
            }
            Ok(SubmitOutcome::Superseded) => {
                debug!("discarding stale response for search #{}", token.value())
            }
            Err(e) => warn!("Search {:?} failed: {}", term, e),
        }
        outcome
    }

    /// Fetch and append the next page of the current query.
    ///
    /// Does nothing before a search has succeeded, and ignores calls made
    /// while a page request is already in flight. The page counter only
    /// advances on success, so a retry after failure asks for the same page.
    pub async fn load_more(&self) -> Result<LoadMoreOutcome> {
        let token = self.page_tokens.issue();
        let mut start = LoadMoreStart::NothingToLoad;
        self.state.send_if_modified(|s| {
            start = s.begin_load_more(token);
            matches!(start, LoadMoreStart::Begin { .. })
        });

        let (generation, query, page) = match start {
            LoadMoreStart::NothingToLoad => return Ok(LoadMoreOutcome::NothingToLoad),
            LoadMoreStart::Coalesced => {
                debug!("page request already in flight, ignoring load more");
                return Ok(LoadMoreOutcome::Coalesced);
            }
            LoadMoreStart::Begin {
                generation,
                query,
                page,
            } => (generation, query, page),
        };

        let mut request = PageInFlight {
            session: self,
            generation,
            token,
            settled: false,
        };

        debug!("loading page {} of {:?}", page, query);
        let result = self.gateway.search(&query, page).await;
        request.settled = true;

        let per_page = self.results_per_page;
        let mut outcome = Ok(LoadMoreOutcome::Superseded);
        self.state.send_modify(|s| {
            outcome = s.finish_load_more(generation, token, result, per_page)
        });

        match &outcome {
            Ok(LoadMoreOutcome::Appended { page, added }) => {
                info!("Loaded page {} of {:?} ({} new recipes)", page, query, added)
            }
            Ok(LoadMoreOutcome::Superseded) => {
                debug!("discarding page {} of replaced query {:?}", page, query)
            }
            Ok(_) => {}
            Err(e) => warn!("Loading page {} of {:?} failed: {}", page, query, e),
        }
        outcome
    }

    pub fn snapshot(&self) -> SearchState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SearchState> {
        self.state.subscribe()
    }

    /// Recipes currently displayed, in provider order
    pub fn items(&self) -> Vec<Recipe> {
        self.state.borrow().items().to_vec()
    }

    pub fn query(&self) -> Option<String> {
        self.state.borrow().query().map(str::to_string)
    }

    pub fn page(&self) -> u32 {
        self.state.borrow().page()
    }

    pub fn results_per_page(&self) -> u32 {
        self.results_per_page
    }
}

/// Clears the searching flag if a submit future is dropped mid-request
struct SubmitInFlight<'a> {
    session: &'a SearchSession,
    token: RequestToken,
    settled: bool,
}

impl Drop for SubmitInFlight<'_> {
    fn drop(&mut self) {
        if self.settled || !self.session.submissions.is_latest(self.token) {
            return;
        }
        debug!("search #{} abandoned", self.token.value());
        self.session.state.send_if_modified(|s| {
            let was_searching = s.searching;
            s.searching = false;
            was_searching
        });
    }
}

/// Releases the page slot if a load more future is dropped mid-request
struct PageInFlight<'a> {
    session: &'a SearchSession,
    generation: RequestToken,
    token: RequestToken,
    settled: bool,
}

impl Drop for PageInFlight<'_> {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        debug!("page request #{} abandoned", self.token.value());
        let (generation, token) = (self.generation, self.token);
        self.session
            .state
            .send_if_modified(|s| s.page_requests.finish(&generation, token));
    }
}

impl std::fmt::Debug for SearchSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchSession")
            .field("gateway", &self.gateway.gateway_name())
            .field("results_per_page", &self.results_per_page)
            .finish()
    }
}
