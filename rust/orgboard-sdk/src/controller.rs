//! Query-state controller for one list view.
//!
//! Every parameter change issues exactly one fetch. Overlapping fetches are
//! ordered by a request sequence number: only the most recently issued one
//! may replace the displayed page, so a slow response to an older query can
//! never overwrite a newer result.

use crate::error::ApiError;
use crate::fetcher::CollectionSource;
use crate::query::{QueryState, ResultPage, SearchBy, SortDirection};
use std::marker::PhantomData;
use std::sync::Mutex;
use tokio::sync::watch;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    /// The response was the latest and is now displayed.
    Applied,
    /// A newer fetch was issued before this one settled; its result was discarded.
    Superseded,
    /// The parameter already had that value, nothing was fetched.
    Unchanged,
}

/// What a view renders: the parameters, the last good page and the fetch status.
#[derive(Debug, Clone, PartialEq)]
pub struct ListSnapshot<T> {
    pub query: QueryState,
    pub page: ResultPage<T>,
    pub loading: bool,
    pub last_error: Option<String>,
}

impl<T> ListSnapshot<T> {
    pub fn page_count(&self) -> u64 {
        self.page.page_count(self.query.page_size)
    }

    pub fn has_next_page(&self) -> bool {
        u64::from(self.query.page) + 1 < self.page_count()
    }
}

struct Pending {
    seq: u64,
    query: QueryState,
}

pub struct ListController<T, S> {
    source: S,
    pending: Mutex<Pending>,
    snapshot: watch::Sender<ListSnapshot<T>>,
    _marker: PhantomData<fn() -> T>,
}

impl<T, S> ListController<T, S>
where
    T: Clone + Send + Sync,
    S: CollectionSource<T>,
{
    /// Creates the controller and performs the initial fetch. A failed initial
    /// fetch leaves an empty page and is reported through `last_error`.
    pub async fn open(source: S, initial: QueryState) -> Self {
        let (snapshot, _) = watch::channel(ListSnapshot {
            query: initial.clone(),
            page: ResultPage::empty(),
            loading: false,
            last_error: None,
        });
        let controller = Self {
            source,
            pending: Mutex::new(Pending {
                seq: 0,
                query: initial,
            }),
            snapshot,
            _marker: PhantomData,
        };
        if let Err(e) = controller.refresh().await {
            tracing::warn!("Initial fetch failed: {}", e);
        }
        controller
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn query(&self) -> QueryState {
        self.lock().query.clone()
    }

    pub fn snapshot(&self) -> ListSnapshot<T> {
        self.snapshot.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<ListSnapshot<T>> {
        self.snapshot.subscribe()
    }

    pub fn is_loading(&self) -> bool {
        self.snapshot.borrow().loading
    }

    /// Re-issues the fetch with the current parameters.
    pub async fn refresh(&self) -> Result<FetchOutcome, ApiError> {
        self.update(|_| true).await
    }

    pub async fn set_search(&self, search: &str) -> Result<FetchOutcome, ApiError> {
        self.update(|q| q.set_search(search)).await
    }

    pub async fn set_search_by(&self, search_by: SearchBy) -> Result<FetchOutcome, ApiError> {
        self.update(move |q| q.set_search_by(search_by)).await
    }

    pub async fn set_page(&self, page: u32) -> Result<FetchOutcome, ApiError> {
        self.update(|q| q.set_page(page)).await
    }

    pub async fn set_page_size(&self, page_size: u32) -> Result<FetchOutcome, ApiError> {
        if page_size == 0 {
            return Err(ApiError::InvalidQuery(
                "page size must be positive".to_string(),
            ));
        }
        self.update(|q| q.set_page_size(page_size).unwrap_or(false))
            .await
    }

    pub async fn set_sort(
        &self,
        sort_by: &str,
        direction: SortDirection,
    ) -> Result<FetchOutcome, ApiError> {
        self.update(|q| q.set_sort(sort_by, direction)).await
    }

    pub async fn toggle_sort(&self, sort_by: &str) -> Result<FetchOutcome, ApiError> {
        self.update(|q| {
            q.toggle_sort(sort_by);
            true
        })
        .await
    }

    /// No-op on the last known page.
    pub async fn next_page(&self) -> Result<FetchOutcome, ApiError> {
        if !self.snapshot.borrow().has_next_page() {
            return Ok(FetchOutcome::Unchanged);
        }
        self.update(|q| q.set_page(q.page + 1)).await
    }

    pub async fn previous_page(&self) -> Result<FetchOutcome, ApiError> {
        self.update(|q| q.page > 0 && q.set_page(q.page - 1)).await
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Pending> {
        self.pending.lock().unwrap_or_else(|e| e.into_inner())
    }

    async fn update<F>(&self, change: F) -> Result<FetchOutcome, ApiError>
    where
        F: FnOnce(&mut QueryState) -> bool,
    {
        let (seq, query) = {
            let mut pending = self.lock();
            if !change(&mut pending.query) {
                return Ok(FetchOutcome::Unchanged);
            }
            pending.seq += 1;
            let query = pending.query.clone();
            self.snapshot.send_modify(|s| {
                s.query = query.clone();
                s.loading = true;
            });
            (pending.seq, query)
        };

        tracing::debug!("Fetch #{} issued: {:?}", seq, query);
        let result = self.source.fetch(&query).await;

        let pending = self.lock();
        if pending.seq != seq {
            tracing::debug!("Fetch #{} superseded by #{}", seq, pending.seq);
            return Ok(FetchOutcome::Superseded);
        }

        match result {
            Ok(page) => {
                self.snapshot.send_modify(|s| {
                    s.page = page;
                    s.loading = false;
                    s.last_error = None;
                });
                Ok(FetchOutcome::Applied)
            }
            Err(e) => {
                tracing::warn!("Fetch #{} failed, keeping last page: {}", seq, e);
                self.snapshot.send_modify(|s| {
                    s.loading = false;
                    s.last_error = Some(e.to_string());
                });
                Err(e)
            }
        }
    }
}

impl<T, S: std::fmt::Debug> std::fmt::Debug for ListController<T, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let snapshot = self.snapshot.borrow();
        f.debug_struct("ListController")
            .field("source", &self.source)
            .field("query", &snapshot.query)
            .field("loading", &snapshot.loading)
            .finish()
    }
}
