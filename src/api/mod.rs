pub mod error;
pub mod response;
pub mod route;

pub use error::ApiError;
pub use response::with_cache_status;
pub use route::create_router;
