//! Fault boundary: turns a panic in downstream handlers into a value.
//!
//! [`FaultBoundary`] polls the rest of the chain inside
//! [`std::panic::catch_unwind`]. While it is polling, a process-wide panic
//! hook records a backtrace and the panic location for the current thread, so
//! the trace describes where the fault happened rather than where it was
//! caught. Outside any boundary the hook hands panics to whatever hook was
//! installed before it.
//!
//! ```text
//! Next::run_guarded(c) ─ poll ─▶ catch_unwind(poll downstream)
//!                                   │ panic!
//!                                   ▼
//!                           panic hook (scope active) → stash Fault
//!                                   │ unwind
//!                                   ▼
//!                           Err(Recovered { message, trace })
//! ```

use std::any::Any;
use std::backtrace::{Backtrace, BacktraceStatus};
use std::cell::{Cell, RefCell};
use std::fmt;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::pin::Pin;
use std::sync::Once;
use std::task::{Context as TaskContext, Poll};

use crate::handler::BoxFuture;

/// Upper bound on frames written into a trace.
const MAX_FRAMES: usize = 32;

/// Frames through which a panic enters the runtime. Everything up to and
/// including the last of these is panic plumbing, not the fault.
const PANIC_ENTRY: &[&str] = &[
    "core::panicking::",
    "core::option::unwrap_failed",
    "core::option::expect_failed",
    "core::result::unwrap_failed",
    "std::panicking::begin_panic",
];

/// Crates whose frames between the panic entry and the faulting code are
/// skipped (`Vec::index`, `Option::unwrap`, …).
const LIBRARY: &[&str] = &["core::", "alloc::", "std::"];

thread_local! {
    static ACTIVE: Cell<usize> = const { Cell::new(0) };
    static LAST_FAULT: RefCell<Option<Captured>> = const { RefCell::new(None) };
}

static HOOK: Once = Once::new();

struct Captured {
    location: Option<String>,
    backtrace: Backtrace,
}

// ── Recovered ─────────────────────────────────────────────────────────────────

/// A panic caught by a [`FaultBoundary`].
#[derive(Debug, Clone)]
pub struct Recovered {
    message: String,
    trace: String,
}

impl Recovered {
    /// The panic payload, as text.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// The message followed by an indented traceback starting at the frame
    /// that panicked.
    pub fn trace(&self) -> &str {
        &self.trace
    }
}

impl fmt::Display for Recovered {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

// ── FaultBoundary ─────────────────────────────────────────────────────────────

/// Future returned by [`Next::run_guarded`](crate::Next::run_guarded).
///
/// Resolves to `Ok(())` when the downstream chain completes, or to
/// `Err(Recovered)` if any poll of it panicked.
pub struct FaultBoundary<'a> {
    inner: BoxFuture<'a, ()>,
}

impl<'a> FaultBoundary<'a> {
    pub(crate) fn new(inner: BoxFuture<'a, ()>) -> Self {
        install_hook();
        Self { inner }
    }
}

impl Future for FaultBoundary<'_> {
    type Output = Result<(), Recovered>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut TaskContext<'_>) -> Poll<Self::Output> {
        let inner = &mut self.inner;
        let polled = {
            let _scope = Scope::enter();
            panic::catch_unwind(AssertUnwindSafe(|| inner.as_mut().poll(cx)))
        };

        match polled {
            Ok(Poll::Pending) => Poll::Pending,
            Ok(Poll::Ready(())) => Poll::Ready(Ok(())),
            Err(payload) => Poll::Ready(Err(recovered(payload.as_ref()))),
        }
    }
}

/// Marks the current thread as polling inside a boundary. Nested boundaries
/// stack; the count drops back when the guard does.
struct Scope;

impl Scope {
    fn enter() -> Self {
        ACTIVE.with(|n| n.set(n.get() + 1));
        Self
    }
}

impl Drop for Scope {
    fn drop(&mut self) {
        ACTIVE.with(|n| n.set(n.get() - 1));
    }
}

// ── Panic hook ────────────────────────────────────────────────────────────────

fn install_hook() {
    HOOK.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            if ACTIVE.with(Cell::get) == 0 {
                previous(info);
                return;
            }
            let captured = Captured {
                location: info.location().map(ToString::to_string),
                backtrace: Backtrace::force_capture(),
            };
            LAST_FAULT.with(|slot| *slot.borrow_mut() = Some(captured));
        }));
    });
}

fn recovered(payload: &(dyn Any + Send)) -> Recovered {
    let message = payload_message(payload);
    let trace = match LAST_FAULT.with(|slot| slot.borrow_mut().take()) {
        Some(captured) => {
            let rendered = match captured.backtrace.status() {
                BacktraceStatus::Captured => captured.backtrace.to_string(),
                _ => String::new(),
            };
            render_trace(&message, captured.location.as_deref(), &rendered)
        }
        None => render_trace(&message, None, ""),
    };
    Recovered { message, trace }
}

fn payload_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "Box<dyn Any>".to_owned()
    }
}

// ── Trace rendering ───────────────────────────────────────────────────────────

#[derive(Debug, PartialEq)]
struct Frame<'a> {
    function: &'a str,
    location: Option<&'a str>,
}

/// Splits the `Display` output of a [`Backtrace`] into frames.
///
/// Numbered lines (`  3: name`) open a frame, unnumbered symbol lines are
/// inlined callers and open one too, `at path:line:col` lines attach to the
/// frame above them.
fn parse_frames(rendered: &str) -> Vec<Frame<'_>> {
    let mut frames: Vec<Frame<'_>> = Vec::new();
    for line in rendered.lines().map(str::trim) {
        if line.is_empty() || line.starts_with("note:") {
            continue;
        }
        if let Some(location) = line.strip_prefix("at ") {
            if let Some(frame) = frames.last_mut() {
                frame.location.get_or_insert(location);
            }
            continue;
        }
        let function = match line.split_once(": ") {
            Some((index, name)) if index.bytes().all(|b| b.is_ascii_digit()) => name,
            _ => line,
        };
        frames.push(Frame { function, location: None });
    }
    frames
}

fn is_panic_entry(function: &str) -> bool {
    function.contains("rust_begin_unwind")
        || PANIC_ENTRY.iter().any(|prefix| function.starts_with(prefix))
}

/// The hook closure itself, which runs before the panic entry frames.
fn is_hook(function: &str) -> bool {
    function.starts_with("strand::fault::install_hook")
}

/// Whether a frame belongs to the standard library.
///
/// Qualified paths are judged by their self type: `<alloc::vec::Vec<T,A> as
/// core::ops::Index<I>>::index` and `<usize as core::slice::SliceIndex<[T]>>`
/// are library frames, `<app::Jar as core::ops::Drop>::drop` is not.
fn is_library(function: &str) -> bool {
    let Some(qualified) = function.strip_prefix('<') else {
        return LIBRARY.iter().any(|krate| function.starts_with(krate));
    };
    let end = [qualified.find(" as "), qualified.find('>')]
        .into_iter()
        .flatten()
        .min()
        .unwrap_or(qualified.len());
    let subject = &qualified[..end];
    !subject.contains("::") || LIBRARY.iter().any(|krate| subject.starts_with(krate))
}

/// Index of the frame that raised the fault: the first non-library frame
/// after the last panic entry point.
fn fault_site(frames: &[Frame<'_>]) -> usize {
    let unwinding = frames
        .iter()
        .position(|f| f.function.contains("__rust_begin_short_backtrace"))
        .unwrap_or(frames.len());
    let after_entry = frames[..unwinding]
        .iter()
        .rposition(|f| is_panic_entry(f.function))
        .map_or(0, |i| i + 1);

    frames[after_entry..]
        .iter()
        .position(|f| !is_library(f.function) && !is_hook(f.function))
        .map_or(frames.len(), |i| after_entry + i)
}

fn render_trace(message: &str, location: Option<&str>, rendered: &str) -> String {
    let mut out = String::from(message);
    if let Some(location) = location {
        out.push_str("\npanicked at ");
        out.push_str(location);
    }
    out.push_str("\nTraceback:");

    let frames = parse_frames(rendered);
    for frame in frames[fault_site(&frames)..]
        .iter()
        .take_while(|f| !f.function.contains("__rust_begin_short_backtrace"))
        .take(MAX_FRAMES)
    {
        out.push_str("\n\t");
        out.push_str(frame.function);
        if let Some(location) = frame.location {
            out.push_str("\n\t\tat ");
            out.push_str(location);
        }
    }
    out
}
