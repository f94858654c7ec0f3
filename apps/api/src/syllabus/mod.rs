pub mod export;
pub mod handlers;
pub mod pipeline;
pub mod stats;
pub mod store;
