/// Resource module - device objects cached across frames

pub mod resource_cache;

pub use resource_cache::*;
