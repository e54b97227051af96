//! Built-in middleware.
//!
//! Each one is a plain handler, so it goes anywhere in a chain:
//!
//! ```rust,no_run
//! use strand::Router;
//! use strand::middleware::{cors, logger, recovery};
//!
//! let app = Router::new().with(cors).with(logger).with(recovery);
//! ```
//!
//! Order matters. [`recovery`] only catches panics in handlers that run
//! after it, and [`cors`] must run before anything that can fail for its
//! headers to reach error responses.

mod cors;
mod logger;
mod recovery;

pub use cors::cors;
pub use logger::logger;
pub use recovery::recovery;
