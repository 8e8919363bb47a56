// Middleware system for request/response processing

use crate::logging::{debug, trace};
use crate::{Error, HttpRequest, HttpResponse};
use async_trait::async_trait;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::UNIX_EPOCH;

/// Boxed future returned by handlers and by [`Next`].
pub type BoxResponseFuture = Pin<Box<dyn Future<Output = Result<HttpResponse, Error>> + Send>>;

/// Type alias for the next handler in the middleware chain
pub type Next = Box<dyn FnOnce(HttpRequest) -> BoxResponseFuture + Send>;

/// Type alias for handler functions
pub type HandlerFn = Arc<dyn Fn(HttpRequest) -> BoxResponseFuture + Send + Sync>;

/// Wrap an async function as a [`HandlerFn`].
///
/// ```rust
/// use scrivener_core::{HttpRequest, HttpResponse, handler};
///
/// let hello = handler(|_req: HttpRequest| async { Ok(HttpResponse::ok().with_text("hello")) });
/// # let _ = hello;
/// ```
pub fn handler<F, Fut>(f: F) -> HandlerFn
where
    F: Fn(HttpRequest) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<HttpResponse, Error>> + Send + 'static,
{
    Arc::new(move |req| Box::pin(f(req)) as BoxResponseFuture)
}

/// Middleware trait for processing requests before they reach the handler
#[async_trait]
pub trait Middleware: Send + Sync {
    /// Process the request and optionally pass to next middleware
    async fn handle(&self, req: HttpRequest, next: Next) -> Result<HttpResponse, Error>;
}

/// Middleware chain executor
#[derive(Clone)]
pub struct MiddlewareChain {
    middlewares: Arc<Vec<Arc<dyn Middleware>>>,
}

impl MiddlewareChain {
    pub fn new() -> Self {
        Self {
            middlewares: Arc::new(Vec::new()),
        }
    }

    /// Add a middleware to the chain. The first one added runs outermost.
    pub fn use_middleware<M: Middleware + 'static>(&mut self, middleware: M) {
        let mut mws = (*self.middlewares).clone();
        mws.push(Arc::new(middleware));
        self.middlewares = Arc::new(mws);
    }

    /// Builder form of [`use_middleware`](Self::use_middleware).
    pub fn with<M: Middleware + 'static>(mut self, middleware: M) -> Self {
        self.use_middleware(middleware);
        self
    }

    pub fn len(&self) -> usize {
        self.middlewares.len()
    }

    pub fn is_empty(&self) -> bool {
        self.middlewares.is_empty()
    }

    /// Execute the middleware chain with a handler
    pub async fn apply(&self, req: HttpRequest, handler: HandlerFn) -> Result<HttpResponse, Error> {
        debug!(
            middleware_count = self.middlewares.len(),
            path = %req.path,
            method = %req.method,
            "Executing middleware chain"
        );
        self.execute_from(0, req, handler).await
    }

    fn execute_from(&self, index: usize, req: HttpRequest, handler: HandlerFn) -> BoxResponseFuture {
        if index >= self.middlewares.len() {
            trace!("Middleware chain complete, calling handler");
            handler(req)
        } else {
            let middleware = self.middlewares[index].clone();
            let chain = self.clone();

            trace!(middleware_index = index, "Executing middleware");
            Box::pin(async move {
                middleware
                    .handle(
                        req,
                        Box::new(move |req| chain.execute_from(index + 1, req, handler)),
                    )
                    .await
            })
        }
    }
}

impl Default for MiddlewareChain {
    fn default() -> Self {
        Self::new()
    }
}

// ========== Built-in Middleware ==========

/// Correlation id of a request, stored in the request extensions by
/// [`RequestIdMiddleware`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestId(String);

impl RequestId {
    pub const HEADER: &'static str = "x-request-id";

    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// A fresh random id.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The id attached to `req`, if any middleware set one.
    pub fn of(req: &HttpRequest) -> Option<&str> {
        req.extensions.get::<RequestId>().map(RequestId::as_str)
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Request ID middleware
///
/// Reuses an incoming `x-request-id` header or generates one, stores it as
/// a [`RequestId`] extension and echoes it on the response.
pub struct RequestIdMiddleware;

#[async_trait]
impl Middleware for RequestIdMiddleware {
    async fn handle(&self, mut req: HttpRequest, next: Next) -> Result<HttpResponse, Error> {
        let request_id = req
            .header(RequestId::HEADER)
            .filter(|id| !id.trim().is_empty())
            .map(RequestId::new)
            .unwrap_or_else(RequestId::generate);

        req.headers
            .insert(RequestId::HEADER.to_string(), request_id.to_string());
        req.extensions.insert(request_id.clone());

        let mut response = next(req).await?;
        response
            .headers
            .insert(RequestId::HEADER.to_string(), request_id.to_string());

        Ok(response)
    }
}

/// Request headers that let a client or proxy answer from a cache.
pub const CONDITIONAL_HEADERS: &[&str] = &[
    "ETag",
    "If-Modified-Since",
    "If-Match",
    "If-None-Match",
    "If-Range",
    "If-Unmodified-Since",
];

/// Response headers that keep clients and proxies from caching.
pub const NO_CACHE_HEADERS: &[(&str, &str)] = &[
    (
        "Cache-Control",
        "no-cache, no-store, no-transform, must-revalidate, private, max-age=0",
    ),
    ("Pragma", "no-cache"),
    ("X-Accel-Expires", "0"),
];

/// Strips conditional request headers and marks the response uncacheable.
///
/// `Expires` is set to the Unix epoch.
pub struct NoCacheMiddleware;

impl NoCacheMiddleware {
    fn expires() -> String {
        httpdate::fmt_http_date(UNIX_EPOCH)
    }
}

#[async_trait]
impl Middleware for NoCacheMiddleware {
    async fn handle(&self, mut req: HttpRequest, next: Next) -> Result<HttpResponse, Error> {
        for name in CONDITIONAL_HEADERS {
            req.remove_header(name);
        }

        let mut response = next(req).await?;
        response
            .headers
            .insert("Expires".to_string(), Self::expires());
        for (name, value) in NO_CACHE_HEADERS {
            response.headers.insert(name.to_string(), value.to_string());
        }

        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    fn ok_next() -> Next {
        Box::new(|_req| Box::pin(async { Ok(HttpResponse::ok()) }))
    }

    struct Tag(&'static str, Arc<Mutex<Vec<&'static str>>>);

    #[async_trait]
    impl Middleware for Tag {
        async fn handle(&self, req: HttpRequest, next: Next) -> Result<HttpResponse, Error> {
            self.1.lock().push(self.0);
            next(req).await
        }
    }

    #[tokio::test]
    async fn test_middleware_chain_order() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let chain = MiddlewareChain::new()
            .with(Tag("outer", seen.clone()))
            .with(Tag("inner", seen.clone()));
        assert_eq!(chain.len(), 2);

        let handler_seen = seen.clone();
        let result = chain
            .apply(
                HttpRequest::new("GET", "/test"),
                handler(move |_req| {
                    handler_seen.lock().push("handler");
                    async { Ok(HttpResponse::ok()) }
                }),
            )
            .await;

        assert!(result.is_ok());
        assert_eq!(*seen.lock(), vec!["outer", "inner", "handler"]);
    }

    #[tokio::test]
    async fn test_empty_chain_calls_handler() {
        let chain = MiddlewareChain::default();
        let res = chain
            .apply(
                HttpRequest::new("GET", "/"),
                handler(|_req| async { Ok(HttpResponse::new(204)) }),
            )
            .await
            .unwrap();
        assert_eq!(res.status, 204);
    }

    #[tokio::test]
    async fn test_request_id_generated() {
        let result = RequestIdMiddleware
            .handle(
                HttpRequest::new("GET", "/test"),
                Box::new(|req| {
                    Box::pin(async move {
                        let id = RequestId::of(&req).unwrap_or_default().to_string();
                        Ok(HttpResponse::ok().with_text(id))
                    })
                }),
            )
            .await
            .unwrap();

        let echoed = result.header("x-request-id").unwrap();
        assert!(uuid::Uuid::parse_str(echoed).is_ok());
        assert_eq!(result.body, echoed.as_bytes());
    }

    #[tokio::test]
    async fn test_request_id_reused() {
        let req = HttpRequest::new("GET", "/").with_header("X-Request-Id", "abc-123");
        let result = RequestIdMiddleware.handle(req, ok_next()).await.unwrap();
        assert_eq!(result.header("x-request-id"), Some("abc-123"));
    }

    #[tokio::test]
    async fn test_no_cache() {
        let req = HttpRequest::new("GET", "/")
            .with_header("If-None-Match", "\"v1\"")
            .with_header("if-modified-since", "Wed, 21 Oct 2015 07:28:00 GMT")
            .with_header("Accept", "*/*");

        let result = NoCacheMiddleware
            .handle(
                req,
                Box::new(|req| {
                    Box::pin(async move {
                        assert!(req.header("If-None-Match").is_none());
                        assert!(req.header("If-Modified-Since").is_none());
                        assert_eq!(req.header("accept"), Some("*/*"));
                        Ok(HttpResponse::ok())
                    })
                }),
            )
            .await
            .unwrap();

        assert_eq!(result.header("Expires"), Some("Thu, 01 Jan 1970 00:00:00 GMT"));
        assert_eq!(result.header("Pragma"), Some("no-cache"));
        assert_eq!(result.header("X-Accel-Expires"), Some("0"));
        assert!(result.header("Cache-Control").unwrap().contains("no-store"));
    }

    #[tokio::test]
    async fn test_errors_pass_through() {
        let result = NoCacheMiddleware
            .handle(
                HttpRequest::new("GET", "/"),
                Box::new(|_req| Box::pin(async { Err(Error::NotFound("gone".into())) })),
            )
            .await;
        assert!(matches!(result, Err(Error::NotFound(_))));
    }
}
