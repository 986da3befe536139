//! Keeping pages in step with the backend: cached reads, the derived filter views over
//! them, the realtime chat feed and the consultation submission.

mod cache;
mod resource;

pub mod consult;
pub mod feed;
pub mod filter;
pub mod queries;

pub use cache::QueryCache;
pub use resource::{Call, Fetch, Loader, One, Resource, Rows};
