//! Assembles flattened agricultural bulletin observations into the tidy
//! per-feed table. Sibling of the forecast assembler: same flatten/pivot
//! steps, different measurement set and reference join.

use crate::feeds::error::FeedError;
use crate::feeds::flatten::{pivot, LongRecord, WideGroup};
use crate::feeds::normalize::{parse_feed_timestamp, parse_measurement, product_id_from_filename};
use crate::types::region::State;
use chrono::NaiveDateTime;
use polars::prelude::*;

/// Output schema of the bulletin table, in fixed column order.
pub const BULLETIN_COLUMNS: [&str; 23] = [
    "product_id",
    "state",
    "site",
    "station",
    "lat",
    "lon",
    "elev",
    "obs_time_local",
    "obs_time_utc",
    "time_zone",
    "rainfall",
    "minimum_temperature",
    "maximum_temperature",
    "wetbulb_depression",
    "evaporation",
    "terrestrial_minimum",
    "sunshine_hours",
    "soil_temp_5cm",
    "soil_temp_10cm",
    "soil_temp_20cm",
    "soil_temp_50cm",
    "soil_temp_100cm",
    "wind_run",
];

/// One station observation row of the agricultural bulletin table.
/// Station name and coordinates are null until joined against the
/// reference table.
#[derive(Debug, Clone)]
pub struct BulletinRow {
    pub product_id: String,
    pub state: String,
    pub site: String,
    pub station: Option<String>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub elev: Option<f64>,
    pub obs_time_local: NaiveDateTime,
    pub obs_time_utc: NaiveDateTime,
    pub time_zone: String,
    pub rainfall: Option<f64>,
    pub minimum_temperature: Option<f64>,
    pub maximum_temperature: Option<f64>,
    pub wetbulb_depression: Option<f64>,
    pub evaporation: Option<f64>,
    pub terrestrial_minimum: Option<f64>,
    pub sunshine_hours: Option<f64>,
    pub soil_temp_5cm: Option<f64>,
    pub soil_temp_10cm: Option<f64>,
    pub soil_temp_20cm: Option<f64>,
    pub soil_temp_50cm: Option<f64>,
    pub soil_temp_100cm: Option<f64>,
    pub wind_run: Option<f64>,
}

fn measurement(group: &mut WideGroup, column: &'static str) -> Result<Option<f64>, FeedError> {
    group
        .take(column)
        .map(|v| parse_measurement(column, &v))
        .transpose()
}

fn row_from_group(
    mut group: WideGroup,
    product_id: &str,
    state: &str,
) -> Result<BulletinRow, FeedError> {
    let obs_local_raw =
        group
            .period
            .start_time_local
            .clone()
            .ok_or_else(|| FeedError::MalformedValue {
                column: "obs_time_local",
                value: group.area_id.clone(),
                reason: "observation is missing its local time".to_string(),
            })?;
    let obs_utc_raw =
        group
            .period
            .start_time_utc
            .clone()
            .ok_or_else(|| FeedError::MalformedValue {
                column: "obs_time_utc",
                value: group.area_id.clone(),
                reason: "observation is missing its UTC time".to_string(),
            })?;

    // Local times keep their offset split off; the explicit zone label is
    // the authoritative zone for this feed.
    let obs_local = crate::feeds::normalize::split_utc_offset(&obs_local_raw)
        .map(|(ts, _)| ts.to_string())
        .unwrap_or(obs_local_raw);
    let obs_time_local = parse_feed_timestamp("obs_time_local", &obs_local)?;
    let obs_time_utc = parse_feed_timestamp("obs_time_utc", &obs_utc_raw)?;
    let time_zone = group.period.time_zone.clone().unwrap_or_default();

    Ok(BulletinRow {
        product_id: product_id.to_string(),
        state: state.to_string(),
        site: group.area_id.clone(),
        station: None,
        lat: None,
        lon: None,
        elev: None,
        obs_time_local,
        obs_time_utc,
        time_zone,
        rainfall: measurement(&mut group, "rainfall")?,
        minimum_temperature: measurement(&mut group, "minimum_temperature")?,
        maximum_temperature: measurement(&mut group, "maximum_temperature")?,
        wetbulb_depression: measurement(&mut group, "wetbulb_depression")?,
        evaporation: measurement(&mut group, "evaporation")?,
        terrestrial_minimum: measurement(&mut group, "terrestrial_minimum")?,
        sunshine_hours: measurement(&mut group, "sunshine_hours")?,
        soil_temp_5cm: measurement(&mut group, "soil_temp_5cm")?,
        soil_temp_10cm: measurement(&mut group, "soil_temp_10cm")?,
        soil_temp_20cm: measurement(&mut group, "soil_temp_20cm")?,
        soil_temp_50cm: measurement(&mut group, "soil_temp_50cm")?,
        soil_temp_100cm: measurement(&mut group, "soil_temp_100cm")?,
        wind_run: measurement(&mut group, "wind_run")?,
    })
}

/// Pivots and normalizes the long records of one bulletin feed.
pub fn assemble_bulletin(
    records: Vec<LongRecord>,
    filename: &str,
) -> Result<Vec<BulletinRow>, FeedError> {
    let product_id = product_id_from_filename(filename);
    let state = State::from_product(product_id)
        .map(|s| s.abbrev().to_string())
        .unwrap_or_default();
    pivot(records)?
        .into_iter()
        .map(|group| row_from_group(group, product_id, &state))
        .collect()
}

/// Builds the tidy bulletin table with the fixed [`BULLETIN_COLUMNS`] order.
pub fn bulletin_frame(rows: &[BulletinRow]) -> Result<DataFrame, FeedError> {
    let frame = df!(
        "product_id" => rows.iter().map(|r| r.product_id.clone()).collect::<Vec<String>>(),
        "state" => rows.iter().map(|r| r.state.clone()).collect::<Vec<String>>(),
        "site" => rows.iter().map(|r| r.site.clone()).collect::<Vec<String>>(),
        "station" => rows.iter().map(|r| r.station.clone()).collect::<Vec<Option<String>>>(),
        "lat" => rows.iter().map(|r| r.lat).collect::<Vec<Option<f64>>>(),
        "lon" => rows.iter().map(|r| r.lon).collect::<Vec<Option<f64>>>(),
        "elev" => rows.iter().map(|r| r.elev).collect::<Vec<Option<f64>>>(),
        "obs_time_local" => rows.iter().map(|r| r.obs_time_local).collect::<Vec<NaiveDateTime>>(),
        "obs_time_utc" => rows.iter().map(|r| r.obs_time_utc).collect::<Vec<NaiveDateTime>>(),
        "time_zone" => rows.iter().map(|r| r.time_zone.clone()).collect::<Vec<String>>(),
        "rainfall" => rows.iter().map(|r| r.rainfall).collect::<Vec<Option<f64>>>(),
        "minimum_temperature" => rows.iter().map(|r| r.minimum_temperature).collect::<Vec<Option<f64>>>(),
        "maximum_temperature" => rows.iter().map(|r| r.maximum_temperature).collect::<Vec<Option<f64>>>(),
        "wetbulb_depression" => rows.iter().map(|r| r.wetbulb_depression).collect::<Vec<Option<f64>>>(),
        "evaporation" => rows.iter().map(|r| r.evaporation).collect::<Vec<Option<f64>>>(),
        "terrestrial_minimum" => rows.iter().map(|r| r.terrestrial_minimum).collect::<Vec<Option<f64>>>(),
        "sunshine_hours" => rows.iter().map(|r| r.sunshine_hours).collect::<Vec<Option<f64>>>(),
        "soil_temp_5cm" => rows.iter().map(|r| r.soil_temp_5cm).collect::<Vec<Option<f64>>>(),
        "soil_temp_10cm" => rows.iter().map(|r| r.soil_temp_10cm).collect::<Vec<Option<f64>>>(),
        "soil_temp_20cm" => rows.iter().map(|r| r.soil_temp_20cm).collect::<Vec<Option<f64>>>(),
        "soil_temp_50cm" => rows.iter().map(|r| r.soil_temp_50cm).collect::<Vec<Option<f64>>>(),
        "soil_temp_100cm" => rows.iter().map(|r| r.soil_temp_100cm).collect::<Vec<Option<f64>>>(),
        "wind_run" => rows.iter().map(|r| r.wind_run).collect::<Vec<Option<f64>>>(),
    )?;
    Ok(frame)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feeds::flatten::flatten;
    use crate::feeds::schema::FeedKind;

    const SAMPLE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<product version="1.7">
  <bulletin>
    <obs site="072150" station="WAGGA WAGGA AMO" obs-time-local="2024-01-05T09:00:00+11:00" obs-time-utc="2024-01-04T22:00:00Z" time-zone="EDT">
      <element type="rainfall" units="mm">Tce</element>
      <element type="air_temperature_minimum" units="Celsius">17.2</element>
      <element type="air_temperature_maximum" units="Celsius">31.6</element>
      <element type="sunshine_hours" units="hours">10.9</element>
      <element type="soil_temperature_10cm" units="Celsius">24.1</element>
      <element type="wind_run" units="km">187</element>
    </obs>
    <obs site="070351" station="CANBERRA AIRPORT" obs-time-local="2024-01-05T09:00:00+11:00" obs-time-utc="2024-01-04T22:00:00Z" time-zone="EDT">
      <element type="rainfall" units="mm">0</element>
      <element type="evaporation" units="mm">8.4</element>
    </obs>
  </bulletin>
</product>"#;

    fn sample_rows() -> Vec<BulletinRow> {
        let records = flatten(FeedKind::AgBulletin, SAMPLE, "IDN65176").unwrap();
        assemble_bulletin(records, "IDN65176.xml").unwrap()
    }

    #[test]
    fn assembles_one_row_per_observation() {
        let rows = sample_rows();
        assert_eq!(rows.len(), 2);

        let first = &rows[0];
        assert_eq!(first.product_id, "IDN65176");
        assert_eq!(first.state, "NSW");
        assert_eq!(first.site, "072150");
        assert_eq!(first.time_zone, "EDT");
        assert_eq!(first.obs_time_local.to_string(), "2024-01-05 09:00:00");
        assert_eq!(first.obs_time_utc.to_string(), "2024-01-04 22:00:00");
        assert_eq!(first.minimum_temperature, Some(17.2));
        assert_eq!(first.sunshine_hours, Some(10.9));
        assert_eq!(first.soil_temp_10cm, Some(24.1));
        assert_eq!(first.wind_run, Some(187.0));
        assert_eq!(first.soil_temp_50cm, None);
    }

    #[test]
    fn trace_rainfall_is_coerced_not_zeroed() {
        let rows = sample_rows();
        assert_eq!(rows[0].rainfall, Some(0.01));
        assert_eq!(rows[1].rainfall, Some(0.0));
    }

    #[test]
    fn frame_matches_fixed_schema() {
        let rows = sample_rows();
        let frame = bulletin_frame(&rows).unwrap();
        assert_eq!(frame.shape(), (2, BULLETIN_COLUMNS.len()));
        assert_eq!(frame.get_column_names(), BULLETIN_COLUMNS);
    }
}
