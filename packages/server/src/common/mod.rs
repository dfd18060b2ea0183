pub mod error;
pub mod pagination;

pub use error::ApiError;
pub use pagination::PageParams;
