//! Access logging middleware.

use crate::formatter::{EntryFormatter, LogEntry, RequestInfo, default_formatter};
use crate::logging::trace;
use crate::middleware::{Middleware, Next};
use crate::recoverer::CrashEntrySlot;
use crate::{Error, HttpRequest, HttpResponse};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Instant;

/// Logs one line per accepted request once its response is known.
///
/// Without an explicit formatter the process-wide default formatter is
/// read for every request. A deferred [`CrashEntrySlot`] is also attached to
/// the request so a [`Recoverer`](crate::Recoverer) further down the chain
/// reports through the same formatter. The crash entry itself is only
/// opened if a fault is reported.
///
/// A request whose handler returns an error is logged with the error's
/// status; one whose future is dropped before completion is logged with
/// status 0.
#[derive(Clone, Default)]
pub struct RequestLogger {
    formatter: Option<Arc<dyn EntryFormatter>>,
}

impl RequestLogger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_formatter<F: EntryFormatter + 'static>(formatter: F) -> Self {
        Self::with_shared_formatter(Arc::new(formatter))
    }

    pub fn with_shared_formatter(formatter: Arc<dyn EntryFormatter>) -> Self {
        Self {
            formatter: Some(formatter),
        }
    }

    fn formatter(&self) -> Arc<dyn EntryFormatter> {
        self.formatter.clone().unwrap_or_else(default_formatter)
    }
}

/// Closes the entry when the response is known, or when dropped.
struct EntryGuard {
    entry: Option<Box<dyn LogEntry>>,
    started: Instant,
}

impl EntryGuard {
    fn close(&mut self, status: u16, bytes: u64) {
        if let Some(mut entry) = self.entry.take() {
            entry.write(status, bytes, self.started.elapsed());
        }
    }
}

impl Drop for EntryGuard {
    fn drop(&mut self) {
        if self.entry.is_some() {
            trace!("request dropped before completion");
            self.close(0, 0);
        }
    }
}

#[async_trait]
impl Middleware for RequestLogger {
    async fn handle(&self, mut req: HttpRequest, next: Next) -> Result<HttpResponse, Error> {
        let formatter = self.formatter();
        let info = RequestInfo::from_request(&req);
        if !formatter.accept(&info) {
            return next(req).await;
        }

        let mut guard = EntryGuard {
            entry: Some(formatter.new_log_entry(&info)),
            started: Instant::now(),
        };
        if !req.extensions.contains::<CrashEntrySlot>() {
            req.extensions.insert(CrashEntrySlot::deferred(formatter, info));
        }

        let result = next(req).await;
        match &result {
            Ok(response) => guard.close(response.status, response.bytes_written()),
            Err(err) => guard.close(err.status_code(), 0),
        }
        result
    }
}
