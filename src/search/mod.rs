pub mod engine;
pub mod filters;
pub mod paginate;
pub mod vector;

pub use engine::SearchEngine;
