use std::sync::Arc;
use std::time::Instant;

use crate::metrics::MetricsEmitter;

// ─── Bindings ────────────────────────────────────────────────────

/// Namespace and reportable operations of one resource kind.
#[derive(Debug)]
pub struct Binding {
    /// Dotted key segment, e.g. "connection"
    pub namespace: &'static str,
    /// Operation names that get timed; everything else is only forwarded
    pub reportable: &'static [&'static str],
}

impl Binding {
    pub fn reports(&self, operation: &str) -> bool {
        self.reportable.contains(&operation)
    }
}

const STATEMENT_OPERATIONS: &[&str] = &["execute", "executeBatch", "executeQuery", "executeUpdate"];

pub static CONNECTION: Binding = Binding {
    namespace: "connection",
    reportable: &[
        "commit",
        "createStatement",
        "getMetadata",
        "prepareCall",
        "prepareStatement",
        "rollback",
    ],
};

pub static STATEMENT: Binding = Binding {
    namespace: "statement",
    reportable: STATEMENT_OPERATIONS,
};

pub static PREPARED_STATEMENT: Binding = Binding {
    namespace: "statement",
    reportable: STATEMENT_OPERATIONS,
};

pub static CALLABLE_STATEMENT: Binding = Binding {
    namespace: "statement",
    reportable: STATEMENT_OPERATIONS,
};

// ─── Sampling decision ───────────────────────────────────────────

/// Outcome of the per-call sampling gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sampling {
    Sampled,
    Skipped,
}

impl Sampling {
    pub fn is_sampled(self) -> bool {
        self == Self::Sampled
    }
}

impl From<bool> for Sampling {
    fn from(sampled: bool) -> Self {
        if sampled {
            Self::Sampled
        } else {
            Self::Skipped
        }
    }
}

// ─── Dispatcher ──────────────────────────────────────────────────

/// Times the reportable operations of one wrapped resource.
///
/// A dispatcher created with [`Dispatcher::top_level`] draws a fresh
/// decision for every call. One created with [`Dispatcher::inherit`] reuses
/// the decision of the call that produced its resource, so a connection
/// call and the statements it spawned are reported as one unit.
#[derive(Clone)]
pub struct Dispatcher {
    emitter: Arc<MetricsEmitter>,
    binding: &'static Binding,
    inherited: Option<Sampling>,
}

impl Dispatcher {
    pub fn top_level(emitter: Arc<MetricsEmitter>, binding: &'static Binding) -> Self {
        Self {
            emitter,
            binding,
            inherited: None,
        }
    }

    pub fn inherit(
        emitter: Arc<MetricsEmitter>,
        binding: &'static Binding,
        decision: Sampling,
    ) -> Self {
        Self {
            emitter,
            binding,
            inherited: Some(decision),
        }
    }

    pub fn binding(&self) -> &'static Binding {
        self.binding
    }

    pub fn emitter(&self) -> &Arc<MetricsEmitter> {
        &self.emitter
    }

    /// Decision for the call about to start.
    pub fn decide(&self) -> Sampling {
        self.inherited
            .unwrap_or_else(|| Sampling::from(self.emitter.should_sample()))
    }

    /// Decide, then run `call` through [`Dispatcher::dispatch_with`].
    pub fn dispatch<T, E>(
        &self,
        operation: &'static str,
        call: impl FnOnce() -> Result<T, E>,
    ) -> Result<T, E> {
        self.dispatch_with(self.decide(), operation, call)
    }

    /// Run `call` under an already made decision. The delegate's result,
    /// `Err` included, comes back untouched.
    pub fn dispatch_with<T, E>(
        &self,
        decision: Sampling,
        operation: &'static str,
        call: impl FnOnce() -> Result<T, E>,
    ) -> Result<T, E> {
        let _timer = self.start_timer(decision, operation);
        call()
    }

    fn start_timer(&self, decision: Sampling, operation: &'static str) -> Option<CallTimer<'_>> {
        if decision.is_sampled() && self.binding.reports(operation) {
            Some(CallTimer {
                dispatcher: self,
                operation,
                start: Instant::now(),
            })
        } else {
            None
        }
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("namespace", &self.binding.namespace)
            .field("inherited", &self.inherited)
            .finish()
    }
}

/// Reports on drop, so success, error and unwind all produce the timing.
struct CallTimer<'a> {
    dispatcher: &'a Dispatcher,
    operation: &'static str,
    start: Instant,
}

impl Drop for CallTimer<'_> {
    fn drop(&mut self) {
        let elapsed = self.start.elapsed();
        let emitter = &self.dispatcher.emitter;
        let namespace = self.dispatcher.binding.namespace;

        if emitter.counts_calls() {
            emitter.report_count(&format!("{namespace}.{}.count", self.operation));
        }
        emitter.report_timing(&format!("{namespace}.{}.timing", self.operation), elapsed);
    }
}
