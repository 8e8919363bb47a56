//! POST and PUT body size limits.
//!
//! ```rust
//! use scrivener_core::body_limits::{PostLimitMiddleware, sizes};
//!
//! let limit = PostLimitMiddleware::new(4 * sizes::MB);
//! assert_eq!(limit.max_size(), 4 * 1024 * 1024);
//! ```

use crate::logging::debug;
use crate::middleware::{HandlerFn, Middleware, Next};
use crate::{Error, HttpRequest, HttpResponse};
use async_trait::async_trait;

/// Common size constants for convenience
pub mod sizes {
    /// 1 Kilobyte
    pub const KB: u64 = 1024;
    /// 1 Megabyte
    pub const MB: u64 = 1024 * 1024;
    /// 1 Gigabyte
    pub const GB: u64 = 1024 * 1024 * 1024;
}

/// Limit used when none is given.
pub const DEFAULT_MAX_POST_SIZE: u64 = sizes::MB;

/// Message sent with the default rejection.
pub const POST_LIMIT_MESSAGE: &str = "max post size exceeded";

/// Effective body limit of a request, stored in its extensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PostSize(pub u64);

/// The limit a [`PostLimitMiddleware`] recorded for `req`, if any.
pub fn max_post_size(req: &HttpRequest) -> Option<u64> {
    req.extensions.get::<PostSize>().map(|size| size.0)
}

/// Rejects POST and PUT requests whose body is larger than the limit.
///
/// The default answer is `400 max post size exceeded`; a custom handler
/// may be installed instead. Accepted requests carry the limit as a
/// [`PostSize`] extension for body readers further down the chain.
pub struct PostLimitMiddleware {
    max_size: u64,
    on_exceeded: Option<HandlerFn>,
}

impl PostLimitMiddleware {
    pub fn new(max_size: u64) -> Self {
        Self {
            max_size,
            on_exceeded: None,
        }
    }

    pub fn kilobytes(kb: u64) -> Self {
        Self::new(kb * sizes::KB)
    }

    pub fn megabytes(mb: u64) -> Self {
        Self::new(mb * sizes::MB)
    }

    /// Answer oversize requests with `handler` instead of the default 400.
    pub fn on_exceeded(mut self, handler: HandlerFn) -> Self {
        self.on_exceeded = Some(handler);
        self
    }

    pub fn max_size(&self) -> u64 {
        self.max_size
    }

    /// Whether `req` is within the limit. Only POST and PUT are checked.
    pub fn check(&self, req: &HttpRequest) -> Result<(), Error> {
        let limited = req.method.eq_ignore_ascii_case("POST") || req.method.eq_ignore_ascii_case("PUT");
        let size = req.content_length();
        if limited && size > self.max_size {
            return Err(Error::PayloadTooLarge(format!(
                "body of {} bytes exceeds the limit of {} bytes",
                size, self.max_size
            )));
        }
        Ok(())
    }
}

impl Default for PostLimitMiddleware {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_POST_SIZE)
    }
}

#[async_trait]
impl Middleware for PostLimitMiddleware {
    async fn handle(&self, mut req: HttpRequest, next: Next) -> Result<HttpResponse, Error> {
        if let Err(err) = self.check(&req) {
            debug!(path = %req.path, error = %err, "Rejecting oversize body");
            return match &self.on_exceeded {
                Some(handler) => handler(req).await,
                None => Ok(HttpResponse::bad_request().with_text(POST_LIMIT_MESSAGE)),
            };
        }

        req.extensions.insert(PostSize(self.max_size));
        next(req).await
    }
}
