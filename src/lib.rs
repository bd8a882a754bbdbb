//! # chc
//!
//! A minimal embedded HTTP/1.x server. Each TCP connection is read once,
//! parsed with a forgiving line-oriented parser, routed by exact path and
//! allowed method, passed through the route's response middleware, answered
//! by the route's handler, and closed.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use chc::{Method, Request, Response, Route, Router, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     chc::logging::init();
//!     chc::env::load_env(".env");
//!
//!     let mut router = Router::new();
//!     router.add_route(
//!         Route::new("/hello")
//!             .method(Method::Get)
//!             .controller(|req: Request, mut res: Response| async move {
//!                 res.set_string_body(format!("Hello, {}!", req.param("name").unwrap_or("World")));
//!                 res
//!             }),
//!     );
//!
//!     chc::server::listen(&ServerConfig::from_env()?, router).await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod env;
pub mod http;
pub mod logging;
pub mod middleware;
pub mod router;
pub mod server;

pub use config::{ConfigError, ServerConfig};
pub use http::{Headers, Method, Request, RequestError, Response, ResponseError, StatusCode, Version};
pub use middleware::{Flow, Middleware};
pub use router::{Route, Router};
pub use server::{Server, ServerError};
