//! The reference location table: one record per known forecast town or
//! observation station, loaded once per client and read-only thereafter.

use crate::stations::error::StationError;
use async_compression::tokio::bufread::GzipDecoder;
use bincode::config::{Configuration, Fixint, LittleEndian};
use futures_util::TryStreamExt;
use log::{info, warn};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::{hash_map::Entry, HashMap};
use std::io;
use std::path::Path;
use tokio::io::{AsyncReadExt, BufReader};
use tokio_util::io::StreamReader;

const DATA_URL: &str = "http://ftp.bom.gov.au/anon/home/adfd/spatial/stations.json.gz";
const BINCODE_CACHE_FILE_NAME: &str = "stations.bin";
const BINCODE_CONFIG: Configuration<LittleEndian, Fixint> =
    bincode::config::standard().with_fixed_int_encoding();

/// One known location: a forecast town (keyed by its area code) or an
/// observation station (keyed by its site number).
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct StationRecord {
    /// Unique location code (forecast area code or station site number).
    pub code: String,
    /// Display name.
    pub name: String,
    /// Latitude in decimal degrees, negative south.
    pub lat: f64,
    /// Longitude in decimal degrees, positive east.
    pub lon: f64,
    /// Elevation above sea level in metres, if surveyed.
    pub elev: Option<f64>,
}

/// A row type that can be enriched from the reference table.
pub trait LocationKeyed {
    /// The location code this row joins on.
    fn location_code(&self) -> &str;
    /// Copies the matched record's display/geospatial fields into the row.
    fn attach_location(&mut self, record: &StationRecord);
}

impl LocationKeyed for crate::feeds::forecast::ForecastRow {
    fn location_code(&self) -> &str {
        &self.aac
    }

    fn attach_location(&mut self, record: &StationRecord) {
        self.town = Some(record.name.clone());
        self.lat = Some(record.lat);
        self.lon = Some(record.lon);
        self.elev = record.elev;
    }
}

impl LocationKeyed for crate::feeds::bulletin::BulletinRow {
    fn location_code(&self) -> &str {
        &self.site
    }

    fn attach_location(&mut self, record: &StationRecord) {
        self.station = Some(record.name.clone());
        self.lat = Some(record.lat);
        self.lon = Some(record.lon);
        self.elev = record.elev;
    }
}

/// The loaded reference table. Never mutated after construction; safe to
/// share across concurrent feed-processing tasks.
#[derive(Debug, Clone)]
pub struct StationTable {
    records: Vec<StationRecord>,
}

impl StationTable {
    pub fn new(records: Vec<StationRecord>) -> Self {
        Self { records }
    }

    /// Parses a table from raw JSON bytes. The seam used by tests and by
    /// callers with their own copy of the reference data.
    pub fn from_json_slice(bytes: &[u8]) -> Result<Self, StationError> {
        let records = serde_json::from_slice::<Vec<StationRecord>>(bytes)?;
        Ok(Self::new(records))
    }

    /// Loads the table from the on-disk cache, downloading and caching it
    /// first when absent.
    pub async fn load(cache_dir: &Path) -> Result<Self, StationError> {
        let cache_file = cache_dir.join(BINCODE_CACHE_FILE_NAME);

        let records = if cache_file.exists() {
            info!("Loading station table from cache {:?}", cache_file);
            let path = cache_file.clone();
            tokio::task::spawn_blocking(move || Self::read_cached(&path)).await??
        } else {
            warn!("Station cache miss; fetching from {}", DATA_URL);
            let records = Self::fetch().await?;
            Self::write_cache(records.clone(), &cache_file).await?;
            records
        };

        Ok(Self::new(records))
    }

    fn read_cached(cache_path: &Path) -> Result<Vec<StationRecord>, StationError> {
        let bytes = std::fs::read(cache_path)
            .map_err(|e| StationError::CacheRead(cache_path.to_path_buf(), e))?;
        let (records, _) = bincode::serde::decode_from_slice::<Vec<StationRecord>, _>(
            &bytes,
            BINCODE_CONFIG,
        )
        .map_err(|e| StationError::CacheDecode(cache_path.to_path_buf(), Box::from(e)))?;
        Ok(records)
    }

    async fn fetch() -> Result<Vec<StationRecord>, StationError> {
        let client = Client::new();
        let response = client
            .get(DATA_URL)
            .send()
            .await
            .map_err(|e| StationError::NetworkRequest(DATA_URL.to_string(), e))?;
        let response = match response.error_for_status() {
            Ok(resp) => resp,
            Err(e) => {
                return Err(if let Some(status) = e.status() {
                    StationError::HttpStatus {
                        url: DATA_URL.to_string(),
                        status,
                        source: e,
                    }
                } else {
                    StationError::NetworkRequest(DATA_URL.to_string(), e)
                });
            }
        };

        let stream = response
            .bytes_stream()
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e));
        let stream_reader = StreamReader::new(stream);
        let gzip_decoder = GzipDecoder::new(BufReader::new(stream_reader));
        let mut decoder_reader = BufReader::new(gzip_decoder);
        let mut decompressed = Vec::new();
        decoder_reader.read_to_end(&mut decompressed).await?;

        let records = tokio::task::spawn_blocking(move || {
            serde_json::from_slice::<Vec<StationRecord>>(&decompressed)
                .map_err(StationError::from)
        })
        .await??;
        info!("Parsed {} station records", records.len());
        Ok(records)
    }

    async fn write_cache(
        records: Vec<StationRecord>,
        cache_path: &Path,
    ) -> Result<(), StationError> {
        let encoded = tokio::task::spawn_blocking(move || {
            bincode::serde::encode_to_vec(records, BINCODE_CONFIG)
                .map_err(|e| StationError::CacheEncode(Box::new(e)))
        })
        .await??;
        tokio::fs::write(&cache_path, &encoded)
            .await
            .map_err(|e| StationError::CacheWrite(cache_path.to_path_buf(), e))?;
        info!(
            "Cached station table ({} bytes) to {}",
            encoded.len(),
            cache_path.display()
        );
        Ok(())
    }

    pub fn records(&self) -> &[StationRecord] {
        &self.records
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Left-joins rows against the table on location code.
    ///
    /// Unmatched rows keep their null geospatial fields; the row count is
    /// never changed. A duplicate code in the reference table would
    /// silently duplicate forecast rows in a relational join, so it fails
    /// instead.
    pub fn left_join<R: LocationKeyed>(&self, rows: &mut [R]) -> Result<(), StationError> {
        let mut by_code: HashMap<&str, &StationRecord> = HashMap::with_capacity(self.records.len());
        for record in &self.records {
            match by_code.entry(record.code.as_str()) {
                Entry::Vacant(entry) => {
                    entry.insert(record);
                }
                Entry::Occupied(_) => {
                    return Err(StationError::AmbiguousLocation {
                        code: record.code.clone(),
                    });
                }
            }
        }

        for row in rows.iter_mut() {
            if let Some(record) = by_code.get(row.location_code()) {
                row.attach_location(record);
            }
        }
        Ok(())
    }
}
