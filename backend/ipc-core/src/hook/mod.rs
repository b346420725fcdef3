//! Observable wrapper around one active orchestrated call.
//!
//! The hook owns at most one call at a time. Starting a new one (mount,
//! request change, manual retry) cancels the previous token first, and a
//! generation counter keeps results of superseded calls out of the state.

use crate::error::invoke::InvokeError;
use crate::retry::{InvokeOptions, RetryOrchestrator};

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use log::{debug, warn};
use serde_json::Value;
use tokio::spawn as TokioSpawn;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

/// Snapshot published to observers.
#[derive(Debug, Clone, Default)]
pub struct InvocationState {
    pub data: Option<Value>,
    pub loading: bool,
    pub error: Option<InvokeError>,
    /// `on_retry` calls observed for the current call.
    pub retry_count: u32,
    pub is_retrying: bool,
}

#[derive(Debug, Clone, PartialEq)]
struct Request {
    channel: String,
    args: Vec<Value>,
}

struct ActiveCall {
    generation: u64,
    token: CancellationToken,
}

pub struct InvocationHook {
    orchestrator: Arc<RetryOrchestrator>,
    options: InvokeOptions,
    request: Mutex<Request>,
    active: Mutex<Option<ActiveCall>>,
    generation: Arc<AtomicU64>,
    state: Arc<watch::Sender<InvocationState>>,
}

impl InvocationHook {
    /// Create the hook and start the first call.
    ///
    /// Must be called inside a Tokio runtime.
    pub fn mount(
        orchestrator: Arc<RetryOrchestrator>,
        channel: impl Into<String>,
        args: Vec<Value>,
        options: InvokeOptions,
    ) -> Self {
        let (state, _) = watch::channel(InvocationState::default());
        let hook = Self {
            orchestrator,
            options,
            request: Mutex::new(Request {
                channel: channel.into(),
                args,
            }),
            active: Mutex::new(None),
            generation: Arc::new(AtomicU64::new(0)),
            state: Arc::new(state),
        };

        hook.start();
        hook
    }

    /// Switch to a new request. Restarts only if channel or args changed.
    pub fn set_request(&self, channel: impl Into<String>, args: Vec<Value>) -> bool {
        let next = Request {
            channel: channel.into(),
            args,
        };

        {
            let mut request = lock(&self.request);
            if *request == next {
                return false;
            }
            *request = next;
        }

        self.start();
        true
    }

    /// Cancel anything in flight and start the same request afresh.
    pub fn retry(&self) {
        self.start();
    }

    /// Cancel the active call. Its result, if any arrives, is ignored.
    pub fn cancel(&self) {
        if let Some(active) = lock(&self.active).take() {
            active.token.cancel();
            debug!("Cancelled hook call generation {}", active.generation);
        }

        self.state.send_modify(|state| {
            state.loading = false;
            state.is_retrying = false;
        });
    }

    pub fn state(&self) -> InvocationState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<InvocationState> {
        self.state.subscribe()
    }

    fn start(&self) {
        let Request { channel, args } = lock(&self.request).clone();
        let token = match &self.options.signal {
            Some(outer) => outer.child_token(),
            None => CancellationToken::new(),
        };

        let generation = {
            let mut active = lock(&self.active);
            if let Some(previous) = active.take() {
                previous.token.cancel();
            }
            let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
            *active = Some(ActiveCall {
                generation,
                token: token.clone(),
            });
            generation
        };

        self.state.send_modify(|state| {
            state.loading = true;
            state.error = None;
            state.retry_count = 0;
            state.is_retrying = false;
        });

        let options = self.call_options(generation, token.clone());
        let orchestrator = Arc::clone(&self.orchestrator);
        let current = Arc::clone(&self.generation);
        let state = Arc::clone(&self.state);

        TokioSpawn(async move {
            let result = orchestrator.invoke(&channel, args, options).await;

            // Checked under the watch lock: `start` bumps the generation before
            // it publishes, so a newer call can never be overwritten.
            let applied = state.send_if_modified(|state| {
                if token.is_cancelled() || current.load(Ordering::SeqCst) != generation {
                    return false;
                }
                state.loading = false;
                state.is_retrying = false;
                match result {
                    Ok(value) => {
                        state.data = Some(value);
                        state.error = None;
                    }
                    Err(error) => state.error = Some(error),
                }
                true
            });

            if !applied {
                debug!("Discarding superseded result for '{channel}' (generation {generation})");
            }
        });
    }

    /// Caller options plus a retry observer that feeds `retry_count`.
    fn call_options(&self, generation: u64, token: CancellationToken) -> InvokeOptions {
        let mut options = self.options.clone();
        options.signal = Some(token);

        let user_on_retry = self.options.on_retry.clone();
        let current = Arc::clone(&self.generation);
        let state = Arc::clone(&self.state);
        options.on_retry = Some(Arc::new(move |attempt: u32, delay_ms: u64, error: &InvokeError| {
            state.send_if_modified(|state| {
                if current.load(Ordering::SeqCst) != generation {
                    return false;
                }
                state.retry_count += 1;
                state.is_retrying = true;
                true
            });
            if let Some(callback) = &user_on_retry {
                callback(attempt, delay_ms, error);
            }
        }));

        options
    }
}

impl Drop for InvocationHook {
    fn drop(&mut self) {
        if let Some(active) = lock(&self.active).take() {
            active.token.cancel();
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| {
        warn!("Invocation hook lock poisoned, recovering");
        poisoned.into_inner()
    })
}
