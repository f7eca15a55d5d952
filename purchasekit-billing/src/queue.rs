//! FIFO queue of store operations waiting for a ready connection.
//!
//! A request stays queued until it actually runs. Only the head is ever
//! armed: its delay elapses, then the owner takes it on the [`MainThread`] if
//! the connection can still serve it, or leaves it at the head otherwise. A
//! delayed request is therefore never overtaken by a later one and never runs
//! against a dropped connection.

use std::collections::VecDeque;
use std::fmt;
use std::time::Duration;

use purchasekit_lib::PurchasesError;
use tracing::debug;

use crate::executor::MainThread;

/// A unit of store work.
///
/// Invoked on the [`MainThread`] with `None` once the connection can serve
/// it, or with the error that prevents it from ever running.
pub type ServiceRequest = Box<dyn FnOnce(Option<PurchasesError>) + Send + 'static>;

struct PendingRequest {
    request: ServiceRequest,
    delay: Option<Duration>,
}

/// Pending requests plus the ticket of the armed head, if any.
///
/// Not synchronised on its own: the connection manager keeps it inside the
/// same lock as the connection state.
pub struct RequestQueue {
    pending: VecDeque<PendingRequest>,
    armed: Option<u64>,
    next_ticket: u64,
    main: MainThread,
}

impl RequestQueue {
    /// Create a queue whose requests run on `main`.
    pub fn new(main: MainThread) -> Self {
        Self {
            pending: VecDeque::new(),
            armed: None,
            next_ticket: 0,
            main,
        }
    }

    pub fn push(&mut self, request: ServiceRequest, delay: Option<Duration>) {
        self.pending.push_back(PendingRequest { request, delay });
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Whether the head is waiting to be taken.
    pub fn is_armed(&self) -> bool {
        self.armed.is_some()
    }

    /// Arm the head request.
    ///
    /// `on_due` is posted to the main thread with the head's ticket once the
    /// head's delay has elapsed; it should hand the ticket to
    /// [`take_due`](Self::take_due). Returns false when the queue is empty or
    /// the head is already armed.
    pub fn dispatch_next<F>(&mut self, on_due: F) -> bool
    where
        F: FnOnce(u64) + Send + 'static,
    {
        if self.armed.is_some() {
            return false;
        }
        let Some(head) = self.pending.front() else {
            return false;
        };

        let ticket = self.next_ticket;
        self.next_ticket = self.next_ticket.wrapping_add(1);
        self.armed = Some(ticket);

        match head.delay {
            Some(delay) => self.main.post_delayed(delay, move || on_due(ticket)),
            None => {
                self.main.post(move || on_due(ticket));
            }
        }
        true
    }

    /// Take the armed head if `ticket` is still current and the connection
    /// is `ready`.
    ///
    /// A stale ticket changes nothing. A current ticket disarms the head; when
    /// not `ready` the head stays queued, its delay already served, and is
    /// re-armed by the next dispatch.
    pub fn take_due(&mut self, ticket: u64, ready: bool) -> Option<ServiceRequest> {
        if self.armed != Some(ticket) {
            return None;
        }
        self.armed = None;
        if !ready {
            if let Some(head) = self.pending.front_mut() {
                head.delay = None;
            }
            debug!(pending = self.pending.len(), "Connection lost, keeping request queued");
            return None;
        }
        self.pending.pop_front().map(|pending| pending.request)
    }

    /// Resolve every pending request with `error`. Returns how many were failed.
    pub fn fail_all(&mut self, error: &PurchasesError) -> usize {
        self.armed = None;
        let count = self.pending.len();
        for pending in self.pending.drain(..) {
            let error = error.clone();
            let request = pending.request;
            self.main.post(move || request(Some(error)));
        }
        if count > 0 {
            debug!(count, code = ?error.code(), "Failed pending requests");
        }
        count
    }
}

impl fmt::Debug for RequestQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestQueue")
            .field("pending", &self.pending.len())
            .field("armed", &self.armed.is_some())
            .finish()
    }
}
