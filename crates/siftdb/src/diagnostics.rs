//! Trace sink boundary.
//!
//! Engine logic MUST NOT print or log directly. All observability flows
//! through [`EngineTraceEvent`] and [`TraceSink`]; the default sink
//! discards events. Tests install a recording sink to assert on
//! suppressed failures and skipped filters.

use crate::filter::FilterKey;
use std::{cell::RefCell, fmt, rc::Rc};

thread_local! {
    static SINK_OVERRIDE: RefCell<Option<Rc<dyn TraceSink>>> = const { RefCell::new(None) };
}

///
/// EngineTraceEvent
///
/// Best-effort diagnostics emitted during filter application.
/// Observational only; never a correctness signal.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum EngineTraceEvent {
    /// A filter key was dispatched onto the builder.
    Applied { key: FilterKey },

    /// A filter entry was intentionally not applied.
    Skipped { key: FilterKey, reason: SkipReason },

    /// A protected handler swallowed a builder failure and passed the
    /// builder through unchanged.
    Suppressed { key: FilterKey, error: String },

    /// The deferred aggregate phase started.
    AggregatePhase,
}

///
/// SkipReason
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SkipReason {
    /// The entry's value was null/unset.
    NullValue,

    /// An `in`/`notIn`/`between` tuple had too few usable elements.
    ShortTuple,

    /// An aggregate name outside the engine's configured allowlist.
    UnknownAggregate,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::NullValue => "null_value",
            Self::ShortTuple => "short_tuple",
            Self::UnknownAggregate => "unknown_aggregate",
        };
        write!(f, "{label}")
    }
}

///
/// TraceSink
///

pub trait TraceSink {
    fn record(&self, event: &EngineTraceEvent);
}

/// Emit one trace event to the installed sink, if any.
pub(crate) fn emit(event: &EngineTraceEvent) {
    SINK_OVERRIDE.with(|cell| {
        if let Some(sink) = cell.borrow().as_ref() {
            sink.record(event);
        }
    });
}

/// Run `f` with `sink` installed as this thread's trace sink.
///
/// The previous sink is restored on exit, so scopes nest.
pub fn with_sink<R>(sink: Rc<dyn TraceSink>, f: impl FnOnce() -> R) -> R {
    let previous = SINK_OVERRIDE.with(|cell| cell.borrow_mut().replace(sink));
    let result = f();
    SINK_OVERRIDE.with(|cell| {
        *cell.borrow_mut() = previous;
    });
    result
}

///
/// RecordingSink
///
/// Buffers every event for later inspection.
///

#[derive(Debug, Default)]
pub struct RecordingSink {
    events: RefCell<Vec<EngineTraceEvent>>,
}

impl RecordingSink {
    #[must_use]
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    #[must_use]
    pub fn events(&self) -> Vec<EngineTraceEvent> {
        self.events.borrow().clone()
    }

    /// Count of suppressed-handler events, the signal most tests want.
    #[must_use]
    pub fn suppressed(&self) -> usize {
        self.events
            .borrow()
            .iter()
            .filter(|event| matches!(event, EngineTraceEvent::Suppressed { .. }))
            .count()
    }
}

impl TraceSink for RecordingSink {
    fn record(&self, event: &EngineTraceEvent) {
        self.events.borrow_mut().push(event.clone());
    }
}
