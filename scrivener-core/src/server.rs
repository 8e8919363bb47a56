// HTTP server adapter

use crate::logging::{debug, info, warn};
use crate::middleware::{HandlerFn, Middleware, MiddlewareChain};
use crate::{Error, HttpRequest, HttpResponse};
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode, Version, body::Incoming as IncomingBody};
use hyper_util::rt::TokioIo;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;

/// Serves a handler behind a middleware chain over HTTP/1.
///
/// ```no_run
/// use scrivener_core::{HttpResponse, Recoverer, RequestLogger, Server, handler};
///
/// # async fn run() -> Result<(), scrivener_core::Error> {
/// Server::new(handler(|_req| async { Ok(HttpResponse::ok().with_text("hi")) }))
///     .with(RequestLogger::new())
///     .with(Recoverer::new())
///     .serve(([127, 0, 0, 1], 8080).into())
///     .await
/// # }
/// ```
#[derive(Clone)]
pub struct Server {
    chain: MiddlewareChain,
    handler: HandlerFn,
}

impl Server {
    pub fn new(handler: HandlerFn) -> Self {
        Self {
            chain: MiddlewareChain::new(),
            handler,
        }
    }

    /// Append a middleware; the first one added runs outermost.
    pub fn with<M: Middleware + 'static>(mut self, middleware: M) -> Self {
        self.chain.use_middleware(middleware);
        self
    }

    pub fn with_chain(mut self, chain: MiddlewareChain) -> Self {
        self.chain = chain;
        self
    }

    pub async fn serve(self, addr: SocketAddr) -> Result<(), Error> {
        let listener = TcpListener::bind(addr).await?;
        self.serve_listener(listener).await
    }

    /// Accept connections on `listener` until accepting fails.
    pub async fn serve_listener(self, listener: TcpListener) -> Result<(), Error> {
        info!(addr = ?listener.local_addr().ok(), "Server listening");
        let server = Arc::new(self);

        loop {
            let (stream, peer) = listener.accept().await?;
            let io = TokioIo::new(stream);
            let server = server.clone();

            tokio::spawn(async move {
                let service = service_fn(move |req: Request<IncomingBody>| {
                    let server = server.clone();
                    async move { server.dispatch(req, peer).await }
                });

                if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                    debug!(error = %err, peer = %peer, "Error serving connection");
                }
            });
        }
    }

    async fn dispatch(
        &self,
        req: Request<IncomingBody>,
        peer: SocketAddr,
    ) -> Result<Response<Full<Bytes>>, hyper::Error> {
        let target = req
            .uri()
            .path_and_query()
            .map(|pq| pq.as_str().to_string())
            .unwrap_or_else(|| "/".to_string());

        let mut request = HttpRequest::new(req.method().as_str(), target).with_remote_addr(peer);
        request.protocol = protocol_name(req.version()).to_string();
        for (name, value) in req.headers() {
            if let Ok(value) = value.to_str() {
                request.headers.insert(name.to_string(), value.to_string());
            }
        }
        request.body = req.collect().await?.to_bytes().to_vec();

        let response = match self.chain.apply(request, self.handler.clone()).await {
            Ok(response) => response,
            Err(err) => error_response(&err),
        };
        Ok(into_hyper(response))
    }
}

fn protocol_name(version: Version) -> &'static str {
    match version {
        Version::HTTP_09 => "HTTP/0.9",
        Version::HTTP_10 => "HTTP/1.0",
        Version::HTTP_2 => "HTTP/2.0",
        Version::HTTP_3 => "HTTP/3.0",
        _ => "HTTP/1.1",
    }
}

fn error_response(err: &Error) -> HttpResponse {
    let status = err.status_code();
    let body = serde_json::json!({
        "error": err.to_string(),
        "status": status,
    });
    HttpResponse::new(status)
        .with_json(&body)
        .unwrap_or_else(|_| HttpResponse::internal_server_error())
}

fn into_hyper(response: HttpResponse) -> Response<Full<Bytes>> {
    let HttpResponse {
        status,
        headers,
        body,
    } = response;

    let mut builder = Response::builder().status(status);
    for (key, value) in &headers {
        builder = builder.header(key.as_str(), value.as_str());
    }

    match builder.body(Full::new(Bytes::from(body))) {
        Ok(response) => response,
        Err(err) => {
            warn!(error = %err, status, "Invalid response, answering 500");
            let mut fallback = Response::new(Full::new(Bytes::from_static(b"Internal Server Error")));
            *fallback.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
            fallback
        }
    }
}
