pub mod bulletin;
pub mod error;
pub mod fetch;
pub mod flatten;
pub mod forecast;
pub mod normalize;
pub mod schema;
