// HTTP routes
pub mod health;
pub mod rag;
pub mod tickets;

pub use health::*;
pub use rag::*;
pub use tickets::*;
