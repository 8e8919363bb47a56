//! # Scrivener Core
//!
//! Request logging and panic recovery middleware for async HTTP services.
//!
//! - [`RequestLogger`] writes one access line per request through an
//!   [`EntryFormatter`] to a [`LogSink`].
//! - [`Recoverer`] turns handler panics into `500` responses and prints a
//!   deduplicated crash report (see `scrivener-stack`) off the response path.
//! - [`NoCacheMiddleware`], [`PostLimitMiddleware`] and
//!   [`RequestIdMiddleware`] handle the usual request attribute chores.
//!
//! ```rust
//! use scrivener_core::prelude::*;
//!
//! # tokio_test::block_on(async {
//! let sink = MemorySink::shared();
//! let formatter = DefaultFormatter::new().no_color(true).with_sink(sink.clone());
//!
//! let chain = MiddlewareChain::new()
//!     .with(RequestLogger::with_formatter(formatter))
//!     .with(Recoverer::new());
//!
//! let req = HttpRequest::new("GET", "/x").with_header("Host", "example.com");
//! let res = chain
//!     .apply(req, handler(|_req| async { Ok(HttpResponse::ok().with_text("hello")) }))
//!     .await?;
//!
//! assert_eq!(res.status, 200);
//! assert!(sink.lines()[0].contains("\"GET http://example.com/x HTTP/1.1\" → \"200 5B "));
//! # Ok::<(), Error>(())
//! # }).unwrap();
//! ```

pub mod body_limits;
pub mod client_ip;
pub mod config;
pub mod error;
pub mod extension_set;
pub mod extensions;
pub mod formatter;
pub mod http;
pub mod logging;
pub mod middleware;
pub mod recoverer;
pub mod request_logger;
pub mod server;
pub mod sink;
pub mod trace;

pub use body_limits::{PostLimitMiddleware, PostSize, max_post_size};
pub use client_ip::client_ip;
pub use config::FormatterConfig;
pub use error::{ConfigError, Error};
pub use extension_set::{DEFAULT_IGNORED_EXTENSIONS, ExtensionSet};
pub use extensions::Extensions;
pub use formatter::{
    CrashEntry, DefaultFormatter, EntryFormatter, LatencyBand, LogEntry, RequestInfo, StatusBand,
    default_formatter, set_default_formatter,
};
pub use http::{HttpRequest, HttpResponse};
pub use middleware::{
    HandlerFn, Middleware, MiddlewareChain, NoCacheMiddleware, Next, RequestId,
    RequestIdMiddleware, handler,
};
pub use recoverer::{CrashEntrySlot, Recoverer};
pub use request_logger::RequestLogger;
pub use server::Server;
pub use sink::{LogSink, MemorySink, SharedSink, StderrSink, StdoutSink, TracingSink, WriterSink};
pub use trace::{Fault, TracedError, install_panic_hook};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::{
        DefaultFormatter, EntryFormatter, Error, HttpRequest, HttpResponse, MemorySink, Middleware,
        MiddlewareChain, Next, NoCacheMiddleware, PostLimitMiddleware, Recoverer,
        RequestIdMiddleware, RequestLogger, Server, TracedError, handler,
    };
}
