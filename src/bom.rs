//! The main entry point for fetching and tidying Bureau of Meteorology
//! data products. Feeds are selected by region, fetched once, flattened,
//! normalized and joined against the station reference table.

use crate::error::BomError;
use crate::feeds::bulletin::{assemble_bulletin, bulletin_frame};
use crate::feeds::error::FeedError;
use crate::feeds::fetch::FeedFetcher;
use crate::feeds::flatten::flatten;
use crate::feeds::forecast::{assemble_forecast, forecast_frame};
use crate::feeds::schema::FeedKind;
use crate::stations::table::{StationRecord, StationTable};
use crate::types::region::State;
use crate::utils::{ensure_cache_dir_exists, get_cache_dir};
use bon::bon;
use futures_util::future::try_join_all;
use polars::prelude::DataFrame;
use std::path::PathBuf;

/// Client for the Bureau of Meteorology feeds.
///
/// Holds the feed fetcher and the loaded station reference table. The
/// table is downloaded and cached on first construction; pass your own via
/// [`Bom::with_station_table`] to skip all reference-table I/O.
///
/// # Examples
///
/// ```no_run
/// # use bomfeed::{Bom, BomError, State};
/// # async fn run() -> Result<(), BomError> {
/// let client = Bom::new().await?;
///
/// let nsw = client.precis_forecast().state(State::Nsw).call().await?;
/// println!("{}", nsw.head(Some(5)));
///
/// let everywhere = client.ag_bulletin().state(State::Aus).call().await?;
/// println!("{} bulletin rows", everywhere.height());
/// # Ok(())
/// # }
/// ```
pub struct Bom {
    fetcher: FeedFetcher,
    stations: StationTable,
}

#[bon]
impl Bom {
    /// Creates a client with a specific cache directory for the station
    /// reference table. The directory is created if missing.
    pub async fn with_cache_folder(cache_folder: PathBuf) -> Result<Self, BomError> {
        ensure_cache_dir_exists(&cache_folder)
            .await
            .map_err(|e| BomError::CacheDirCreation(cache_folder.clone(), e))?;
        Ok(Self {
            stations: StationTable::load(&cache_folder).await?,
            fetcher: FeedFetcher::new(),
        })
    }

    /// Creates a client using the default cache directory.
    pub async fn new() -> Result<Self, BomError> {
        let cache_folder = get_cache_dir().map_err(BomError::CacheDirResolution)?;
        Self::with_cache_folder(cache_folder).await
    }

    /// Creates a client around an already-loaded reference table. No
    /// network or disk access happens until a feed is requested.
    pub fn with_station_table(stations: StationTable) -> Self {
        Self {
            fetcher: FeedFetcher::new(),
            stations,
        }
    }

    /// The loaded station reference table.
    pub fn stations(&self) -> &StationTable {
        &self.stations
    }

    /// Fetches and tidies the précis town forecast for a region.
    ///
    /// [`State::Aus`] fetches every region's feed concurrently and
    /// concatenates the tables in fixed feed order (NSW, NT, QLD, SA, TAS,
    /// VIC, WA) regardless of completion order; one failed feed fails the
    /// whole request rather than silently omitting a region.
    ///
    /// Returns one row per (town, forecast day) with the fixed
    /// [`crate::FORECAST_COLUMNS`] schema.
    #[builder]
    pub async fn precis_forecast(&self, state: State) -> Result<DataFrame, BomError> {
        let frames = try_join_all(
            state
                .precis_products()
                .into_iter()
                .map(|product| self.forecast_product_frame(product)),
        )
        .await?;
        concat_frames(frames)
    }

    /// Fetches and tidies the agricultural observation bulletin for a
    /// region. Region handling matches [`Bom::precis_forecast`].
    ///
    /// Returns one row per station observation with the fixed
    /// [`crate::BULLETIN_COLUMNS`] schema.
    #[builder]
    pub async fn ag_bulletin(&self, state: State) -> Result<DataFrame, BomError> {
        let frames = try_join_all(
            state
                .bulletin_products()
                .into_iter()
                .map(|product| self.bulletin_product_frame(product)),
        )
        .await?;
        concat_frames(frames)
    }

    /// Returns the reference station nearest to a coordinate together with
    /// its great-circle distance in kilometres. Deterministic for a given
    /// table; the chosen station is logged.
    pub fn nearest_station(&self, lat: f64, lon: f64) -> Result<(&StationRecord, f64), BomError> {
        Ok(self.stations.nearest(lat, lon)?)
    }

    /// Finds a reference station by exact, partial or slightly misspelled
    /// name. Ambiguous matches resolve to the first station in table order
    /// and log every candidate.
    pub fn station_by_name(&self, name: &str) -> Result<&StationRecord, BomError> {
        Ok(self.stations.search_name(name)?)
    }

    async fn forecast_product_frame(&self, product: &str) -> Result<DataFrame, BomError> {
        let bytes = self.fetcher.fetch_product(product).await?;
        let xml = std::str::from_utf8(&bytes)
            .map_err(|e| FeedError::Utf8(product.to_string(), e))?;
        let records = flatten(FeedKind::PrecisForecast, xml, product)?;
        let mut rows = assemble_forecast(records, &State::product_filename(product))?;
        self.stations.left_join(&mut rows)?;
        Ok(forecast_frame(&rows)?)
    }

    async fn bulletin_product_frame(&self, product: &str) -> Result<DataFrame, BomError> {
        let bytes = self.fetcher.fetch_product(product).await?;
        let xml = std::str::from_utf8(&bytes)
            .map_err(|e| FeedError::Utf8(product.to_string(), e))?;
        let records = flatten(FeedKind::AgBulletin, xml, product)?;
        let mut rows = assemble_bulletin(records, &State::product_filename(product))?;
        self.stations.left_join(&mut rows)?;
        Ok(bulletin_frame(&rows)?)
    }
}

/// Row-wise union of per-feed tables, in input order. All feeds of one
/// product family share a schema by construction.
fn concat_frames(frames: Vec<DataFrame>) -> Result<DataFrame, BomError> {
    let mut iter = frames.into_iter();
    let Some(mut combined) = iter.next() else {
        return Ok(DataFrame::empty());
    };
    for frame in iter {
        combined.vstack_mut(&frame).map_err(BomError::FrameConcat)?;
    }
    Ok(combined)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feeds::forecast::FORECAST_COLUMNS;
    use crate::types::region::FEED_ORDER;

    fn synthetic_client() -> Bom {
        Bom::with_station_table(StationTable::new(vec![
            StationRecord {
                code: "NSW_PT131".to_string(),
                name: "Sydney".to_string(),
                lat: -33.86,
                lon: 151.21,
                elev: Some(40.0),
            },
            StationRecord {
                code: "072150".to_string(),
                name: "Wagga Wagga AMO".to_string(),
                lat: -35.16,
                lon: 147.46,
                elev: Some(212.0),
            },
        ]))
    }

    #[test]
    fn client_answers_lookups_from_injected_table() {
        let client = synthetic_client();

        let (nearest, dist) = client.nearest_station(-33.9, 151.2).unwrap();
        assert_eq!(nearest.code, "NSW_PT131");
        assert!(dist < 10.0);

        let by_name = client.station_by_name("Wagga Wagga AMO").unwrap();
        assert_eq!(by_name.code, "072150");
    }

    #[test]
    fn unknown_region_fails_before_any_fetch() {
        let err = "XX".parse::<State>().unwrap_err();
        assert!(err.to_string().contains("valid codes"));
    }

    #[test]
    fn concat_preserves_input_order_and_row_totals() {
        use polars::prelude::*;
        let a = df!("state" => ["NSW", "NSW"]).unwrap();
        let b = df!("state" => ["QLD"]).unwrap();
        let combined = concat_frames(vec![a.clone(), b.clone()]).unwrap();
        assert_eq!(combined.height(), a.height() + b.height());
        let states: Vec<Option<&str>> = combined
            .column("state")
            .unwrap()
            .as_materialized_series()
            .str()
            .unwrap()
            .into_iter()
            .collect();
        assert_eq!(states, [Some("NSW"), Some("NSW"), Some("QLD")]);
    }

    #[test]
    fn all_regions_covers_every_feed_once() {
        let products = State::Aus.precis_products();
        assert_eq!(products.len(), FEED_ORDER.len());
        let unique: std::collections::HashSet<_> = products.iter().collect();
        assert_eq!(unique.len(), products.len());
    }

    // Live-feed round trips; run with `cargo test -- --ignored` when online.

    #[tokio::test]
    #[ignore = "fetches live feeds"]
    async fn live_precis_forecast_has_fixed_schema() {
        let client = Bom::new().await.unwrap();
        let frame = client
            .precis_forecast()
            .state(State::Nsw)
            .call()
            .await
            .unwrap();
        assert!(frame.height() > 0);
        assert_eq!(frame.get_column_names(), FORECAST_COLUMNS);
    }

    #[tokio::test]
    #[ignore = "fetches live feeds"]
    async fn live_all_regions_is_the_sum_of_the_parts() {
        let client = Bom::new().await.unwrap();
        let all = client
            .precis_forecast()
            .state(State::Aus)
            .call()
            .await
            .unwrap();
        let mut total = 0;
        for state in FEED_ORDER {
            let single = client.precis_forecast().state(state).call().await.unwrap();
            total += single.height();
        }
        assert_eq!(all.height(), total);
    }
}
