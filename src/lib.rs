mod bom;
mod error;
mod feeds;
mod stations;
mod types;
mod utils;

pub use bom::Bom;
pub use error::BomError;

pub use feeds::bulletin::{BulletinRow, BULLETIN_COLUMNS};
pub use feeds::error::FeedError;
pub use feeds::flatten::{LongRecord, PeriodMeta};
pub use feeds::forecast::{ForecastRow, FORECAST_COLUMNS};
pub use feeds::schema::FeedKind;

pub use stations::error::StationError;
pub use stations::table::{LocationKeyed, StationRecord, StationTable};

pub use types::region::{State, UnknownRegionError, FEED_ORDER};
