//! Mutation runner.
//!
//! Wraps a write operation with loading and error tracking plus optional
//! success and error callbacks. Callbacks typically invalidate the queries a
//! write has made stale.

use std::fmt;
use std::future::Future;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Mutex};

use futures::FutureExt;
use futures::future::BoxFuture;
use metrics::counter;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use super::client::QueryClient;
use super::error::{CallbackError, QueryError};
use super::lock::mutex_lock;

const SOURCE: &str = "query::mutation";

pub const METRIC_MUTATIONS: &str = "syndicate_query_mutations_total";

pub type MutationFuture<O> = BoxFuture<'static, Result<O, QueryError>>;

type Operation<I, O> = Arc<dyn Fn(I) -> MutationFuture<O> + Send + Sync>;
type SuccessCallback<O> =
    Arc<dyn Fn(&QueryClient, &O) -> Result<(), CallbackError> + Send + Sync>;
type ErrorCallback = Arc<dyn Fn(&QueryError) -> Result<(), CallbackError> + Send + Sync>;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MutationState {
    /// True while at least one call is in flight.
    pub is_loading: bool,
    /// Error of the most recently finished call.
    pub error: Option<QueryError>,
}

#[derive(Debug, Default)]
struct Tracker {
    in_flight: usize,
    error: Option<QueryError>,
}

/// Reusable runner for one write operation.
///
/// Clones share their loading and error state.
pub struct Mutation<I, O> {
    client: QueryClient,
    operation: Operation<I, O>,
    on_success: Option<SuccessCallback<O>>,
    on_error: Option<ErrorCallback>,
    tracker: Arc<Mutex<Tracker>>,
}

impl<I, O> Clone for Mutation<I, O> {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
            operation: Arc::clone(&self.operation),
            on_success: self.on_success.clone(),
            on_error: self.on_error.clone(),
            tracker: Arc::clone(&self.tracker),
        }
    }
}

impl<I, O> fmt::Debug for Mutation<I, O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mutation")
            .field("state", &self.state())
            .field("on_success", &self.on_success.is_some())
            .field("on_error", &self.on_error.is_some())
            .finish()
    }
}

impl<I, O> Mutation<I, O> {
    pub(crate) fn new<F, Fut>(client: QueryClient, operation: F) -> Self
    where
        F: Fn(I) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<O, QueryError>> + Send + 'static,
    {
        Self {
            client,
            operation: Arc::new(move |input| operation(input).boxed()),
            on_success: None,
            on_error: None,
            tracker: Arc::new(Mutex::new(Tracker::default())),
        }
    }

    /// Run after every successful call, with the client and the result.
    pub fn on_success<F>(mut self, callback: F) -> Self
    where
        F: Fn(&QueryClient, &O) -> Result<(), CallbackError> + Send + Sync + 'static,
    {
        self.on_success = Some(Arc::new(callback));
        self
    }

    /// Run after every failed call.
    pub fn on_error<F>(mut self, callback: F) -> Self
    where
        F: Fn(&QueryError) -> Result<(), CallbackError> + Send + Sync + 'static,
    {
        self.on_error = Some(Arc::new(callback));
        self
    }

    pub fn state(&self) -> MutationState {
        let tracker = mutex_lock(&self.tracker, SOURCE, "state");
        MutationState {
            is_loading: tracker.in_flight > 0,
            error: tracker.error.clone(),
        }
    }

    pub fn is_loading(&self) -> bool {
        mutex_lock(&self.tracker, SOURCE, "is_loading").in_flight > 0
    }

    pub fn error(&self) -> Option<QueryError> {
        mutex_lock(&self.tracker, SOURCE, "error").error.clone()
    }

    /// Run the operation and return its outcome.
    ///
    /// Callback failures are logged and never alter the returned result.
    pub async fn mutate_async(&self, input: I) -> Result<O, QueryError> {
        let call = self.begin();
        let result = (self.operation)(input).await;
        call.finish(result.as_ref().err().cloned());

        match &result {
            Ok(output) => {
                counter!(METRIC_MUTATIONS, "outcome" => "success").increment(1);
                if let Some(callback) = &self.on_success {
                    run_callback("on_success", || callback(&self.client, output));
                }
            }
            Err(err) => {
                counter!(METRIC_MUTATIONS, "outcome" => "error").increment(1);
                warn!(error = %err, "Mutation failed");
                if let Some(callback) = &self.on_error {
                    run_callback("on_error", || callback(err));
                }
            }
        }

        result
    }

    fn begin(&self) -> InFlight<'_> {
        let mut tracker = mutex_lock(&self.tracker, SOURCE, "begin");
        tracker.in_flight += 1;
        tracker.error = None;
        if tracker.in_flight > 1 {
            debug!(in_flight = tracker.in_flight, "Concurrent mutation call started");
        }
        InFlight {
            tracker: &self.tracker,
        }
    }
}

/// One running call. Dropping it without [`InFlight::finish`] still
/// releases the loading flag and leaves the recorded error alone.
struct InFlight<'a> {
    tracker: &'a Mutex<Tracker>,
}

impl InFlight<'_> {
    fn finish(self, error: Option<QueryError>) {
        mutex_lock(self.tracker, SOURCE, "finish").error = error;
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        let mut tracker = mutex_lock(self.tracker, SOURCE, "release");
        tracker.in_flight = tracker.in_flight.saturating_sub(1);
    }
}

impl<I, O> Mutation<I, O>
where
    I: Send + 'static,
    O: Send + Sync + 'static,
{
    /// Fire-and-forget variant of [`Mutation::mutate_async`].
    ///
    /// Must be called from within a Tokio runtime. The outcome is observable
    /// through [`Mutation::state`] and the callbacks.
    pub fn mutate(&self, input: I) -> JoinHandle<()> {
        let runner = self.clone();
        tokio::spawn(async move {
            let _ = runner.mutate_async(input).await;
        })
    }
}

fn run_callback<F>(name: &'static str, callback: F)
where
    F: FnOnce() -> Result<(), CallbackError>,
{
    match catch_unwind(AssertUnwindSafe(callback)) {
        Ok(Ok(())) => {}
        Ok(Err(err)) => error!(callback = name, error = %err, "Mutation callback failed"),
        Err(_) => error!(callback = name, "Mutation callback panicked"),
    }
}
