//! Response middleware: functions that prepare the response before a handler runs.
//!
//! A route carries an ordered middleware chain. Each middleware receives the
//! in-progress [`Response`] and hands back a (possibly different) response plus
//! a decision: keep going, or stop the chain here.
//!
//! ## Core types
//!
//! - [`Middleware`]: trait implemented by all middleware, including any
//!   `Fn(Response) -> (Response, bool)` or `Fn(Response) -> Flow` closure.
//! - [`Flow`]: the continue/stop decision returned by a middleware.
//! - [`MiddlewareHandler`]: type-erased, cheaply-cloneable middleware.
//! - [`run_chain`]: runs a chain in order and returns the resulting response.

use std::sync::Arc;

use crate::Response;

/// The outcome of a single middleware step.
#[derive(Debug)]
pub enum Flow {
    /// Pass the response on to the next middleware.
    Continue(Response),
    /// Skip the remaining middleware; the response goes straight to the handler.
    Stop(Response),
}

impl Flow {
    /// Splits the flow into the response and the continue flag.
    pub fn into_parts(self) -> (Response, bool) {
        match self {
            Self::Continue(response) => (response, true),
            Self::Stop(response) => (response, false),
        }
    }
}

impl From<(Response, bool)> for Flow {
    fn from((response, next): (Response, bool)) -> Self {
        if next {
            Self::Continue(response)
        } else {
            Self::Stop(response)
        }
    }
}

/// The core trait for all middleware.
///
/// Implementations must be `Send + Sync` because the route table is shared
/// across connection tasks.
///
/// # Examples
///
/// ```
/// use chc::Response;
/// use chc::middleware::Middleware;
///
/// let tag = |mut res: Response| {
///     res.set_header("X-Served-By", "chc");
///     (res, true)
/// };
///
/// let (res, next) = tag.handle(Response::new()).into_parts();
/// assert!(next);
/// assert_eq!(res.headers().get("x-served-by"), Some("chc"));
/// ```
pub trait Middleware: Send + Sync {
    fn handle(&self, response: Response) -> Flow;
}

impl<F, R> Middleware for F
where
    F: Fn(Response) -> R + Send + Sync,
    R: Into<Flow>,
{
    fn handle(&self, response: Response) -> Flow {
        (self)(response).into()
    }
}

/// A type-erased, reference-counted middleware.
pub type MiddlewareHandler = Arc<dyn Middleware + 'static>;

/// Runs `chain` in order against `response`.
///
/// A middleware returning [`Flow::Stop`] ends the chain early, and its response
/// is the result. Stopping only skips the remaining middleware: the caller still
/// hands the result to the route's handler.
pub fn run_chain(chain: &[MiddlewareHandler], mut response: Response) -> Response {
    for middleware in chain {
        match middleware.handle(response) {
            Flow::Continue(next) => response = next,
            Flow::Stop(last) => return last,
        }
    }
    response
}
