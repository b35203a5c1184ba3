pub mod error;
pub mod lookup;
pub mod table;
