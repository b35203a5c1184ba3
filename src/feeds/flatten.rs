//! Flattens a nested feed document ({area → period → attribute}) into a
//! long-format record sequence, and pivots it back to one group per
//! (area, period) with an explicit conflict policy.

use crate::feeds::error::FeedError;
use crate::feeds::schema::FeedKind;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::collections::{hash_map::Entry, HashMap};

/// Period-scoped metadata read once per period node and repeated on every
/// record the period produces.
#[derive(Debug, Clone, Default)]
pub struct PeriodMeta {
    pub index: u32,
    pub start_time_local: Option<String>,
    pub end_time_local: Option<String>,
    pub start_time_utc: Option<String>,
    pub end_time_utc: Option<String>,
    /// Time-zone label; only the bulletin feed carries one.
    pub time_zone: Option<String>,
}

impl PeriodMeta {
    fn has_time_bounds(&self) -> bool {
        self.start_time_local.is_some()
            || self.end_time_local.is_some()
            || self.start_time_utc.is_some()
            || self.end_time_utc.is_some()
    }
}

/// One (location, period, attribute) triple in long format.
#[derive(Debug, Clone)]
pub struct LongRecord {
    pub area_id: String,
    pub period: PeriodMeta,
    pub column: &'static str,
    pub value: String,
}

/// One pivoted (location, period) group: one entry per canonical column.
#[derive(Debug, Clone)]
pub struct WideGroup {
    pub area_id: String,
    pub period: PeriodMeta,
    pub values: HashMap<&'static str, String>,
}

impl WideGroup {
    pub(crate) fn take(&mut self, column: &'static str) -> Option<String> {
        self.values.remove(column)
    }
}

fn attr_value(
    element: &BytesStart<'_>,
    name: &[u8],
    product: &str,
) -> Result<Option<String>, FeedError> {
    for attr in element.attributes() {
        let attr = attr.map_err(|e| FeedError::XmlAttr(product.to_string(), e))?;
        if attr.key.as_ref() == name {
            let value = attr
                .unescape_value()
                .map_err(|e| FeedError::Xml(product.to_string(), e.into()))?;
            return Ok(Some(value.into_owned()));
        }
    }
    Ok(None)
}

struct Flattener<'a> {
    kind: FeedKind,
    product: &'a str,
    records: Vec<LongRecord>,
    current_area: Option<String>,
    current_period: Option<PeriodMeta>,
    pending_column: Option<&'static str>,
    periods_seen: u32,
}

impl<'a> Flattener<'a> {
    fn new(kind: FeedKind, product: &'a str) -> Self {
        Self {
            kind,
            product,
            records: Vec::new(),
            current_area: None,
            current_period: None,
            pending_column: None,
            periods_seen: 0,
        }
    }

    fn open_area(&mut self, element: &BytesStart<'_>) -> Result<(), FeedError> {
        let id = attr_value(element, self.kind.id_attr(), self.product)?.ok_or(
            FeedError::MissingAttribute {
                product: self.product.to_string(),
                tag: match self.kind {
                    FeedKind::PrecisForecast => "area",
                    FeedKind::AgBulletin => "obs",
                },
                attribute: match self.kind {
                    FeedKind::PrecisForecast => "aac",
                    FeedKind::AgBulletin => "site",
                },
            },
        )?;
        self.current_area = Some(id);
        self.periods_seen = 0;
        // A bulletin observation is its own single period.
        if self.kind.period_tag().is_none() {
            self.open_period(element)?;
        }
        Ok(())
    }

    fn open_period(&mut self, element: &BytesStart<'_>) -> Result<(), FeedError> {
        let product = self.product;
        let index = match attr_value(element, b"index", product)? {
            Some(raw) => raw.parse().unwrap_or(self.periods_seen),
            None => self.periods_seen,
        };
        let period = match self.kind {
            FeedKind::PrecisForecast => PeriodMeta {
                index,
                start_time_local: attr_value(element, b"start-time-local", product)?,
                end_time_local: attr_value(element, b"end-time-local", product)?,
                start_time_utc: attr_value(element, b"start-time-utc", product)?,
                end_time_utc: attr_value(element, b"end-time-utc", product)?,
                time_zone: None,
            },
            FeedKind::AgBulletin => PeriodMeta {
                index,
                start_time_local: attr_value(element, b"obs-time-local", product)?,
                end_time_local: None,
                start_time_utc: attr_value(element, b"obs-time-utc", product)?,
                end_time_utc: None,
                time_zone: attr_value(element, b"time-zone", product)?,
            },
        };
        if !period.has_time_bounds() {
            return Err(FeedError::MissingPeriodTimes {
                product: product.to_string(),
                area: self.current_area.clone().unwrap_or_default(),
                period_index: index,
            });
        }
        self.current_period = Some(period);
        Ok(())
    }

    fn open_value_node(
        &mut self,
        element: &BytesStart<'_>,
        self_closing: bool,
    ) -> Result<(), FeedError> {
        if self.current_period.is_none() {
            // Header sections carry their own element vocabulary; only
            // period-scoped attributes are flattened.
            return Ok(());
        }
        let raw = attr_value(element, b"type", self.product)?.ok_or(
            FeedError::MissingAttribute {
                product: self.product.to_string(),
                tag: "element",
                attribute: "type",
            },
        )?;
        let units = attr_value(element, b"units", self.product)?;
        let column = self
            .kind
            .canonical_column(self.product, &raw, units.as_deref())?;
        if !self_closing {
            self.pending_column = column;
        }
        Ok(())
    }

    fn push_text(&mut self, value: String) {
        if let (Some(column), Some(area), Some(period)) = (
            self.pending_column,
            self.current_area.as_ref(),
            self.current_period.as_ref(),
        ) {
            self.records.push(LongRecord {
                area_id: area.clone(),
                period: period.clone(),
                column,
                value,
            });
        }
    }

    fn close_period(&mut self) {
        self.current_period = None;
        self.periods_seen += 1;
    }
}

/// Walks a feed document and emits one [`LongRecord`] per
/// (area, period, attribute) triple, in document order.
pub fn flatten(kind: FeedKind, xml: &str, product: &str) -> Result<Vec<LongRecord>, FeedError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);
    let mut state = Flattener::new(kind, product);

    loop {
        match reader
            .read_event()
            .map_err(|e| FeedError::Xml(product.to_string(), e))?
        {
            Event::Start(e) => {
                let name = e.name();
                let tag = name.as_ref();
                if tag == kind.area_tag() {
                    state.open_area(&e)?;
                } else if Some(tag) == kind.period_tag() {
                    state.open_period(&e)?;
                } else if tag == b"element" || tag == b"text" {
                    state.open_value_node(&e, false)?;
                }
            }
            Event::Empty(e) => {
                let name = e.name();
                let tag = name.as_ref();
                if tag == b"element" || tag == b"text" {
                    state.open_value_node(&e, true)?;
                }
            }
            Event::Text(t) => {
                let value = t
                    .unescape()
                    .map_err(|e| FeedError::Xml(product.to_string(), e.into()))?;
                state.push_text(value.into_owned());
            }
            Event::End(e) => {
                let name = e.name();
                let tag = name.as_ref();
                if tag == b"element" || tag == b"text" {
                    state.pending_column = None;
                } else if Some(tag) == kind.period_tag() {
                    state.close_period();
                } else if tag == kind.area_tag() {
                    if kind.period_tag().is_none() {
                        state.close_period();
                    }
                    state.current_area = None;
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(state.records)
}

/// Pivots long records to one group per (area, period), preserving first-seen
/// document order. Two records for the same group and column indicate a
/// malformed or changed upstream schema and fail the whole feed.
pub fn pivot(records: Vec<LongRecord>) -> Result<Vec<WideGroup>, FeedError> {
    let mut groups: Vec<WideGroup> = Vec::new();
    let mut slots: HashMap<(String, u32), usize> = HashMap::new();

    for record in records {
        let slot = match slots.entry((record.area_id.clone(), record.period.index)) {
            Entry::Occupied(entry) => *entry.get(),
            Entry::Vacant(entry) => {
                groups.push(WideGroup {
                    area_id: record.area_id.clone(),
                    period: record.period.clone(),
                    values: HashMap::new(),
                });
                *entry.insert(groups.len() - 1)
            }
        };
        let group = &mut groups[slot];
        if group.values.insert(record.column, record.value).is_some() {
            return Err(FeedError::DuplicateAttribute {
                area: group.area_id.clone(),
                period_index: group.period.index,
                column: record.column,
            });
        }
    }
    Ok(groups)
}

#[cfg(test)]
mod tests {
    use super::*;

    const FORECAST_SAMPLE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<product version="1.7">
  <forecast>
    <area aac="NSW_PT131" description="Sydney" type="location">
      <forecast-period index="0" start-time-local="2024-01-05T17:00:00+11:00" end-time-local="2024-01-06T00:00:00+11:00" start-time-utc="2024-01-05T06:00:00Z" end-time-utc="2024-01-05T13:00:00Z">
        <element type="forecast_icon_code">3</element>
        <element type="air_temperature_maximum" units="Celsius">29</element>
        <text type="precis">Partly cloudy.</text>
        <text type="probability_of_precipitation">10%</text>
      </forecast-period>
      <forecast-period index="1" start-time-local="2024-01-06T00:00:00+11:00" end-time-local="2024-01-07T00:00:00+11:00" start-time-utc="2024-01-05T13:00:00Z" end-time-utc="2024-01-06T13:00:00Z">
        <element type="air_temperature_minimum" units="Celsius">18</element>
        <element type="air_temperature_maximum" units="Celsius">26</element>
        <element type="precipitation_range">1 to 5 mm</element>
        <text type="precis">Showers.</text>
        <text type="probability_of_precipitation">60%</text>
      </forecast-period>
    </area>
  </forecast>
</product>"#;

    const BULLETIN_SAMPLE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<product version="1.7">
  <bulletin>
    <obs site="072150" station="WAGGA WAGGA AMO" obs-time-local="2024-01-05T09:00:00+11:00" obs-time-utc="2024-01-04T22:00:00Z" time-zone="EDT">
      <element type="rainfall" units="mm">Tce</element>
      <element type="air_temperature_minimum" units="Celsius">17.2</element>
      <element type="sunshine_hours" units="hours">10.9</element>
    </obs>
  </bulletin>
</product>"#;

    #[test]
    fn flattens_forecast_periods_to_long_records() {
        let records = flatten(FeedKind::PrecisForecast, FORECAST_SAMPLE, "IDN11060").unwrap();
        // Icon code is discarded; 3 + 5 measurement records remain.
        assert_eq!(records.len(), 8);
        assert!(records.iter().all(|r| r.area_id == "NSW_PT131"));
        assert!(records.iter().all(|r| r.column != "forecast_icon_code"));

        let first = &records[0];
        assert_eq!(first.column, "maximum_temperature");
        assert_eq!(first.value, "29");
        assert_eq!(first.period.index, 0);
        assert_eq!(
            first.period.start_time_local.as_deref(),
            Some("2024-01-05T17:00:00+11:00")
        );
    }

    #[test]
    fn flattens_bulletin_observations() {
        let records = flatten(FeedKind::AgBulletin, BULLETIN_SAMPLE, "IDN65176").unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].area_id, "072150");
        assert_eq!(records[0].column, "rainfall");
        assert_eq!(records[0].value, "Tce");
        assert_eq!(records[0].period.time_zone.as_deref(), Some("EDT"));
        assert_eq!(
            records[0].period.start_time_utc.as_deref(),
            Some("2024-01-04T22:00:00Z")
        );
    }

    #[test]
    fn period_without_time_bounds_fails_with_context() {
        let xml = r#"<product><forecast>
          <area aac="NSW_PT131">
            <forecast-period index="2">
              <element type="air_temperature_maximum" units="Celsius">29</element>
            </forecast-period>
          </area>
        </forecast></product>"#;
        let err = flatten(FeedKind::PrecisForecast, xml, "IDN11060").unwrap_err();
        match err {
            FeedError::MissingPeriodTimes {
                area, period_index, ..
            } => {
                assert_eq!(area, "NSW_PT131");
                assert_eq!(period_index, 2);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn unknown_descriptor_fails() {
        let xml = r#"<product><forecast>
          <area aac="NSW_PT131">
            <forecast-period index="0" start-time-local="2024-01-05T17:00:00+11:00">
              <element type="apparent_temperature" units="Celsius">29</element>
            </forecast-period>
          </area>
        </forecast></product>"#;
        let err = flatten(FeedKind::PrecisForecast, xml, "IDN11060").unwrap_err();
        assert!(matches!(err, FeedError::UnknownDescriptor { .. }));
    }

    #[test]
    fn header_elements_outside_periods_are_ignored() {
        let xml = r#"<product>
          <amoc><element type="issue-time-utc">2024-01-05T05:00:00Z</element></amoc>
          <forecast>
            <area aac="NSW_PT131">
              <forecast-period index="0" start-time-local="2024-01-05T17:00:00+11:00">
                <text type="precis">Sunny.</text>
              </forecast-period>
            </area>
          </forecast>
        </product>"#;
        let records = flatten(FeedKind::PrecisForecast, xml, "IDN11060").unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].column, "precis");
    }

    #[test]
    fn pivot_groups_by_area_and_period() {
        let records = flatten(FeedKind::PrecisForecast, FORECAST_SAMPLE, "IDN11060").unwrap();
        let groups = pivot(records).unwrap();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].period.index, 0);
        assert_eq!(groups[0].values.len(), 3);
        assert_eq!(groups[1].values.len(), 5);
        assert_eq!(
            groups[1].values.get("precipitation_range").map(String::as_str),
            Some("1 to 5 mm")
        );
    }

    #[test]
    fn duplicate_attribute_fails_the_pivot() {
        let period = PeriodMeta {
            index: 0,
            start_time_local: Some("2024-01-05T17:00:00+11:00".to_string()),
            ..PeriodMeta::default()
        };
        let record = LongRecord {
            area_id: "NSW_PT131".to_string(),
            period,
            column: "precis",
            value: "Sunny.".to_string(),
        };
        let err = pivot(vec![record.clone(), record]).unwrap_err();
        match err {
            FeedError::DuplicateAttribute { column, .. } => assert_eq!(column, "precis"),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
