//! Request routing: map exact paths and allowed methods to handlers.
//!
//! A [`Router`] is an ordered table of [`Route`]s. Dispatch looks for the
//! **first** route whose path equals the request URL exactly, and that route's
//! answer is final:
//!
//! | Situation                              | Response                                      |
//! |----------------------------------------|-----------------------------------------------|
//! | no route has the path                  | `404`, `404 Not Found`                        |
//! | path found, method not in its set      | `405`, `Method Not Allowed`                   |
//! | path and method match, no handler      | `404`, `Please add a handler for this path`   |
//! | otherwise                              | middleware chain, then the handler's response |
//!
//! Two routes sharing a path never merge their method sets: the later one is
//! unreachable.

use std::future::Future;
use std::io;
use std::pin::Pin;
use std::sync::Arc;

use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::http::{Method, Request, Response, StatusCode};
use crate::logging;
use crate::middleware::{self, Middleware, MiddlewareHandler};

const NOT_FOUND_BODY: &str = "404 Not Found";
const METHOD_NOT_ALLOWED_BODY: &str = "Method Not Allowed";
const NO_HANDLER_BODY: &str = "Please add a handler for this path";

/// Type-erased, heap-allocated async handler.
///
/// Every handler receives the request and the response produced by the route's
/// middleware chain. Request-only handlers registered with [`Route::handler`]
/// simply ignore the second argument.
pub type Handler = Arc<dyn Fn(Request, Response) -> ResponseFuture + Send + Sync + 'static>;

/// The boxed future a [`Handler`] returns.
pub type ResponseFuture = Pin<Box<dyn Future<Output = Response> + Send>>;

/// A registered (path, methods, handler, middleware) entry.
///
/// # Examples
///
/// ```rust,no_run
/// use chc::{Method, Response, Route};
///
/// let route = Route::new("/profile")
///     .methods([Method::Get, Method::Head])
///     .middleware(|mut res: Response| {
///         res.set_header("Cache-Control", "no-store");
///         (res, true)
///     })
///     .controller(|req, mut res| async move {
///         res.set_string_body(format!("hello {}", req.param("name").unwrap_or("you")));
///         res
///     });
/// ```
pub struct Route {
    path: String,
    methods: Vec<Method>,
    handler: Option<Handler>,
    middlewares: Vec<MiddlewareHandler>,
}

impl Route {
    /// Creates a route for `path` with no methods, no handler, and no middleware.
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            methods: Vec::new(),
            handler: None,
            middlewares: Vec::new(),
        }
    }

    /// Allows one more method.
    #[must_use]
    pub fn method(mut self, method: Method) -> Self {
        self.methods.push(method);
        self
    }

    /// Allows every method in `methods`.
    #[must_use]
    pub fn methods(mut self, methods: impl IntoIterator<Item = Method>) -> Self {
        self.methods.extend(methods);
        self
    }

    /// Appends a middleware to the end of the chain.
    #[must_use]
    pub fn middleware(mut self, middleware: impl Middleware + 'static) -> Self {
        self.middlewares.push(Arc::new(middleware));
        self
    }

    /// Appends already-erased middleware, in order.
    #[must_use]
    pub fn middlewares(mut self, middlewares: impl IntoIterator<Item = MiddlewareHandler>) -> Self {
        self.middlewares.extend(middlewares);
        self
    }

    /// Sets a handler that receives the request and the middleware-prepared response.
    #[must_use]
    pub fn controller<C, F>(mut self, controller: C) -> Self
    where
        C: Fn(Request, Response) -> F + Send + Sync + 'static,
        F: Future<Output = Response> + Send + 'static,
    {
        let handler: Handler =
            Arc::new(move |req: Request, res: Response| -> ResponseFuture {
                Box::pin(controller(req, res))
            });
        self.handler = Some(handler);
        self
    }

    /// Sets a handler that only needs the request and builds its own response.
    #[must_use]
    pub fn handler<H, F>(mut self, handler: H) -> Self
    where
        H: Fn(Request) -> F + Send + Sync + 'static,
        F: Future<Output = Response> + Send + 'static,
    {
        let handler: Handler =
            Arc::new(move |req: Request, _res: Response| -> ResponseFuture {
                Box::pin(handler(req))
            });
        self.handler = Some(handler);
        self
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Returns `true` if `method` is in this route's allowed set.
    pub fn allows(&self, method: Option<Method>) -> bool {
        method.is_some_and(|m| self.methods.contains(&m))
    }
}

/// Ordered route table and dispatcher.
///
/// Routes are registered before serving starts; [`crate::Server::run`] takes
/// the router by value, so the table cannot change once connections are
/// being handled.
///
/// # Examples
///
/// ```rust,no_run
/// use chc::{Method, Request, Response, Route, Router};
///
/// let mut router = Router::new();
/// router.add_route(
///     Route::new("/ping")
///         .method(Method::Get)
///         .handler(|_req: Request| async { Response::new().body("pong") }),
/// );
/// assert_eq!(router.len(), 1);
/// ```
pub struct Router {
    routes: Vec<Route>,
    request_logging: bool,
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

impl Router {
    /// Creates an empty router with request logging enabled.
    pub fn new() -> Self {
        Self {
            routes: Vec::new(),
            request_logging: true,
        }
    }

    /// Turns the per-request access log on or off.
    pub fn request_logging(&mut self, enabled: bool) {
        self.request_logging = enabled;
    }

    pub fn is_request_logging(&self) -> bool {
        self.request_logging
    }

    /// Appends `route`. Paths are not checked for uniqueness.
    pub fn add_route(&mut self, route: Route) {
        self.routes.push(route);
    }

    /// Appends each route in order.
    pub fn add_routes(&mut self, routes: impl IntoIterator<Item = Route>) {
        self.routes.extend(routes);
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Produces the response for `request`, logging it if enabled.
    pub async fn dispatch(&self, request: Request) -> Response {
        let method = request.method();
        let url = request.url().to_owned();
        let protocol = request.protocol();

        let response = self.resolve(request).await;

        if self.request_logging {
            logging::log_request(method, &url, protocol, response.status_code());
        }
        response
    }

    /// Dispatches `request` and writes the serialized response to `writer` once.
    ///
    /// Returns the status code that was written.
    pub async fn serve<W>(&self, request: Request, writer: &mut W) -> io::Result<StatusCode>
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        let response = self.dispatch(request).await;
        let status = response.status_code();
        writer.write_all(&response.into_bytes()).await?;
        writer.flush().await?;
        Ok(status)
    }

    async fn resolve(&self, request: Request) -> Response {
        let Some(route) = self.routes.iter().find(|route| route.path == request.url()) else {
            return Response::plain(StatusCode::NOT_FOUND, NOT_FOUND_BODY);
        };

        // The first path match is final, even if a later route allows the method.
        if !route.allows(request.method()) {
            return Response::plain(StatusCode::METHOD_NOT_ALLOWED, METHOD_NOT_ALLOWED_BODY);
        }

        let Some(handler) = &route.handler else {
            return Response::plain(StatusCode::NOT_FOUND, NO_HANDLER_BODY);
        };

        let version = request.version().unwrap_or_default();

        // NOTE: a middleware that stops the chain only skips the middleware after
        // it. The handler still runs, starting from the stopping middleware's
        // response.
        let prepared = middleware::run_chain(&route.middlewares, request.new_response());
        let mut response = handler(request, prepared).await;
        response.set_version(version);
        response
    }
}
