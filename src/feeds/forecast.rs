//! Assembles flattened précis forecast records into the tidy per-feed table.

use crate::feeds::error::FeedError;
use crate::feeds::flatten::{pivot, LongRecord, WideGroup};
use crate::feeds::normalize::{
    parse_feed_timestamp, parse_number, parse_percentage, parse_timestamp,
    product_id_from_filename, split_precipitation_range, split_utc_offset, state_from_area_id,
};
use chrono::NaiveDateTime;
use polars::prelude::*;

/// Output schema of the précis forecast table, in fixed column order.
pub const FORECAST_COLUMNS: [&str; 19] = [
    "index",
    "product_id",
    "state",
    "town",
    "aac",
    "lat",
    "lon",
    "elev",
    "start_time_local",
    "end_time_local",
    "UTC_offset",
    "start_time_utc",
    "end_time_utc",
    "minimum_temperature",
    "maximum_temperature",
    "lower_precipitation_limit",
    "upper_precipitation_limit",
    "precis",
    "probability_of_precipitation",
];

/// One (town, period) row of the précis forecast table. Geospatial fields
/// are null until joined against the location reference table; the row is
/// immutable thereafter.
#[derive(Debug, Clone)]
pub struct ForecastRow {
    pub index: u32,
    pub product_id: String,
    pub state: String,
    pub town: Option<String>,
    pub aac: String,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub elev: Option<f64>,
    pub start_time_local: NaiveDateTime,
    pub end_time_local: NaiveDateTime,
    pub utc_offset: String,
    pub start_time_utc: NaiveDateTime,
    pub end_time_utc: NaiveDateTime,
    pub minimum_temperature: Option<f64>,
    pub maximum_temperature: Option<f64>,
    pub lower_precipitation_limit: Option<f64>,
    pub upper_precipitation_limit: Option<f64>,
    pub precis: Option<String>,
    pub probability_of_precipitation: Option<f64>,
}

fn required_time(
    group: &WideGroup,
    column: &'static str,
    value: Option<&String>,
) -> Result<String, FeedError> {
    value.cloned().ok_or_else(|| FeedError::MalformedValue {
        column,
        value: format!("{}[{}]", group.area_id, group.period.index),
        reason: "period is missing this time attribute".to_string(),
    })
}

fn row_from_group(mut group: WideGroup, product_id: &str) -> Result<ForecastRow, FeedError> {
    let start_local_raw = required_time(
        &group,
        "start_time_local",
        group.period.start_time_local.as_ref(),
    )?;
    let end_local_raw = required_time(
        &group,
        "end_time_local",
        group.period.end_time_local.as_ref(),
    )?;
    let start_utc_raw = required_time(
        &group,
        "start_time_utc",
        group.period.start_time_utc.as_ref(),
    )?;
    let end_utc_raw = required_time(&group, "end_time_utc", group.period.end_time_utc.as_ref())?;

    // Both period bounds carry the same offset upstream; it is kept once,
    // taken from the end bound, and the start bound's copy is discarded.
    let (end_local, utc_offset) =
        split_utc_offset(&end_local_raw).ok_or_else(|| FeedError::MalformedValue {
            column: "end_time_local",
            value: end_local_raw.clone(),
            reason: "expected a UTC-offset suffix".to_string(),
        })?;
    let start_local = split_utc_offset(&start_local_raw)
        .map(|(ts, _)| ts)
        .unwrap_or(&start_local_raw);

    let start_time_local = parse_timestamp(
        "start_time_local",
        &start_local.replacen('T', " ", 1),
    )?;
    let end_time_local = parse_timestamp("end_time_local", &end_local.replacen('T', " ", 1))?;
    let start_time_utc = parse_feed_timestamp("start_time_utc", &start_utc_raw)?;
    let end_time_utc = parse_feed_timestamp("end_time_utc", &end_utc_raw)?;

    let minimum_temperature = group
        .take("minimum_temperature")
        .map(|v| parse_number("minimum_temperature", &v))
        .transpose()?;
    let maximum_temperature = group
        .take("maximum_temperature")
        .map(|v| parse_number("maximum_temperature", &v))
        .transpose()?;
    let probability_of_precipitation = group
        .take("probability_of_precipitation")
        .map(|v| parse_percentage("probability_of_precipitation", &v))
        .transpose()?;
    let precipitation = group
        .take("precipitation_range")
        .map(|v| split_precipitation_range("precipitation_range", &v))
        .transpose()?;
    let (lower_precipitation_limit, upper_precipitation_limit) = match precipitation {
        Some((lower, upper)) => (Some(lower), Some(upper)),
        None => (None, None),
    };
    let precis = group.take("precis");
    let state = state_from_area_id(&group.area_id).to_string();

    Ok(ForecastRow {
        index: group.period.index,
        product_id: product_id.to_string(),
        state,
        town: None,
        aac: group.area_id,
        lat: None,
        lon: None,
        elev: None,
        start_time_local,
        end_time_local,
        utc_offset: utc_offset.to_string(),
        start_time_utc,
        end_time_utc,
        minimum_temperature,
        maximum_temperature,
        lower_precipitation_limit,
        upper_precipitation_limit,
        precis,
        probability_of_precipitation,
    })
}

/// Pivots and normalizes the long records of one forecast feed.
///
/// `filename` is the feed's published filename; the `product_id` column is
/// its stem.
pub fn assemble_forecast(
    records: Vec<LongRecord>,
    filename: &str,
) -> Result<Vec<ForecastRow>, FeedError> {
    let product_id = product_id_from_filename(filename);
    pivot(records)?
        .into_iter()
        .map(|group| row_from_group(group, product_id))
        .collect()
}

/// Builds the tidy forecast table with the fixed [`FORECAST_COLUMNS`] order.
pub fn forecast_frame(rows: &[ForecastRow]) -> Result<DataFrame, FeedError> {
    let frame = df!(
        "index" => rows.iter().map(|r| r.index).collect::<Vec<u32>>(),
        "product_id" => rows.iter().map(|r| r.product_id.clone()).collect::<Vec<String>>(),
        "state" => rows.iter().map(|r| r.state.clone()).collect::<Vec<String>>(),
        "town" => rows.iter().map(|r| r.town.clone()).collect::<Vec<Option<String>>>(),
        "aac" => rows.iter().map(|r| r.aac.clone()).collect::<Vec<String>>(),
        "lat" => rows.iter().map(|r| r.lat).collect::<Vec<Option<f64>>>(),
        "lon" => rows.iter().map(|r| r.lon).collect::<Vec<Option<f64>>>(),
        "elev" => rows.iter().map(|r| r.elev).collect::<Vec<Option<f64>>>(),
        "start_time_local" => rows.iter().map(|r| r.start_time_local).collect::<Vec<NaiveDateTime>>(),
        "end_time_local" => rows.iter().map(|r| r.end_time_local).collect::<Vec<NaiveDateTime>>(),
        "UTC_offset" => rows.iter().map(|r| r.utc_offset.clone()).collect::<Vec<String>>(),
        "start_time_utc" => rows.iter().map(|r| r.start_time_utc).collect::<Vec<NaiveDateTime>>(),
        "end_time_utc" => rows.iter().map(|r| r.end_time_utc).collect::<Vec<NaiveDateTime>>(),
        "minimum_temperature" => rows.iter().map(|r| r.minimum_temperature).collect::<Vec<Option<f64>>>(),
        "maximum_temperature" => rows.iter().map(|r| r.maximum_temperature).collect::<Vec<Option<f64>>>(),
        "lower_precipitation_limit" => rows.iter().map(|r| r.lower_precipitation_limit).collect::<Vec<Option<f64>>>(),
        "upper_precipitation_limit" => rows.iter().map(|r| r.upper_precipitation_limit).collect::<Vec<Option<f64>>>(),
        "precis" => rows.iter().map(|r| r.precis.clone()).collect::<Vec<Option<String>>>(),
        "probability_of_precipitation" => rows.iter().map(|r| r.probability_of_precipitation).collect::<Vec<Option<f64>>>(),
    )?;
    Ok(frame)
}
