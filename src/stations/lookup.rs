//! Nearest-station and fuzzy-name queries against the reference table.

use crate::stations::error::StationError;
use crate::stations::table::{StationRecord, StationTable};
use haversine::{distance, Location as HaversineLocation, Units};
use log::{info, warn};

/// Candidates within this many edits of the query still count as a match.
const MAX_EDIT_DISTANCE: usize = 2;

fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut previous: Vec<usize> = (0..=b.len()).collect();
    let mut current = vec![0; b.len() + 1];
    for (i, ca) in a.iter().enumerate() {
        current[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let substitution = previous[j] + usize::from(ca != cb);
            current[j + 1] = substitution
                .min(previous[j + 1] + 1)
                .min(current[j] + 1);
        }
        std::mem::swap(&mut previous, &mut current);
    }
    previous[b.len()]
}

impl StationTable {
    /// Returns the station nearest to a coordinate, with its great-circle
    /// distance in kilometres.
    ///
    /// The scan is deterministic: among equally distant stations the first
    /// in table order wins. The auto-selected station is logged so callers
    /// know which one answered their query.
    pub fn nearest(&self, lat: f64, lon: f64) -> Result<(&StationRecord, f64), StationError> {
        let mut best: Option<(&StationRecord, f64)> = None;
        for record in self.records() {
            let dist_km = distance(
                HaversineLocation {
                    latitude: lat,
                    longitude: lon,
                },
                HaversineLocation {
                    latitude: record.lat,
                    longitude: record.lon,
                },
                Units::Kilometers,
            );
            // Strict comparison keeps the earliest record on exact ties.
            if best.as_ref().is_none_or(|(_, d)| dist_km < *d) {
                best = Some((record, dist_km));
            }
        }
        let (record, dist_km) = best.ok_or_else(|| StationError::NoStationFound {
            query: format!("({lat}, {lon})"),
        })?;
        info!(
            "Using nearest station {} '{}', {:.1} km from ({}, {})",
            record.code, record.name, dist_km, lat, lon
        );
        Ok((record, dist_km))
    }

    /// Finds a station by (possibly partial or misspelled) name.
    ///
    /// An exact case-insensitive match wins outright. Otherwise substring
    /// and small-edit-distance candidates are collected; with more than one
    /// the first in table order is returned and all candidates are logged
    /// so the caller can disambiguate on a future call.
    pub fn search_name(&self, query: &str) -> Result<&StationRecord, StationError> {
        let needle = query.trim().to_uppercase();
        if needle.is_empty() {
            return Err(StationError::NoStationFound {
                query: query.to_string(),
            });
        }

        if let Some(exact) = self
            .records()
            .iter()
            .find(|r| r.name.to_uppercase() == needle)
        {
            return Ok(exact);
        }

        let candidates: Vec<&StationRecord> = self
            .records()
            .iter()
            .filter(|r| {
                let name = r.name.to_uppercase();
                name.contains(&needle) || levenshtein(&name, &needle) <= MAX_EDIT_DISTANCE
            })
            .collect();

        match candidates.as_slice() {
            [] => Err(StationError::NoStationFound {
                query: query.to_string(),
            }),
            [single] => Ok(single),
            [first, ..] => {
                let names: Vec<&str> = candidates.iter().map(|r| r.name.as_str()).collect();
                warn!(
                    "'{}' matches {} stations ({}); using '{}'",
                    query,
                    candidates.len(),
                    names.join(", "),
                    first.name
                );
                Ok(first)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> StationTable {
        StationTable::new(vec![
            StationRecord {
                code: "066062".to_string(),
                name: "Sydney Observatory Hill".to_string(),
                lat: -33.8607,
                lon: 151.2050,
                elev: Some(39.0),
            },
            StationRecord {
                code: "066037".to_string(),
                name: "Sydney Airport".to_string(),
                lat: -33.9465,
                lon: 151.1731,
                elev: Some(6.0),
            },
            StationRecord {
                code: "070351".to_string(),
                name: "Canberra Airport".to_string(),
                lat: -35.3088,
                lon: 149.2004,
                elev: Some(575.0),
            },
        ])
    }

    #[test]
    fn levenshtein_basics() {
        assert_eq!(levenshtein("", ""), 0);
        assert_eq!(levenshtein("abc", ""), 3);
        assert_eq!(levenshtein("kitten", "sitting"), 3);
        assert_eq!(levenshtein("CANBERRA", "CANBERA"), 1);
    }

    #[test]
    fn nearest_is_deterministic() {
        let table = table();
        let (first, dist) = table.nearest(-33.87, 151.21).unwrap();
        assert_eq!(first.code, "066062");
        assert!(dist < 2.0);

        for _ in 0..5 {
            let (again, _) = table.nearest(-33.87, 151.21).unwrap();
            assert_eq!(again.code, first.code);
        }
    }

    #[test]
    fn nearest_ties_break_in_table_order() {
        let twin = StationRecord {
            code: "A".to_string(),
            name: "Twin A".to_string(),
            lat: -30.0,
            lon: 150.0,
            elev: None,
        };
        let mut other = twin.clone();
        other.code = "B".to_string();
        other.name = "Twin B".to_string();
        let table = StationTable::new(vec![twin, other]);

        let (chosen, _) = table.nearest(-30.0, 150.0).unwrap();
        assert_eq!(chosen.code, "A");
    }

    #[test]
    fn nearest_on_empty_table_fails() {
        let table = StationTable::new(vec![]);
        assert!(matches!(
            table.nearest(-33.0, 151.0),
            Err(StationError::NoStationFound { .. })
        ));
    }

    #[test]
    fn exact_name_wins_without_ambiguity() {
        let table = table();
        let record = table.search_name("Sydney Airport").unwrap();
        assert_eq!(record.code, "066037");
        let record = table.search_name("canberra airport").unwrap();
        assert_eq!(record.code, "070351");
    }

    #[test]
    fn partial_name_matches_first_in_table_order() {
        let table = table();
        // "Sydney" is a substring of two names; the earlier row wins.
        let record = table.search_name("Sydney").unwrap();
        assert_eq!(record.code, "066062");
    }

    #[test]
    fn misspelled_name_still_matches() {
        let table = table();
        let record = table.search_name("Canbera Airport").unwrap();
        assert_eq!(record.code, "070351");
    }

    #[test]
    fn unmatched_or_empty_name_fails() {
        let table = table();
        assert!(matches!(
            table.search_name("Alice Springs"),
            Err(StationError::NoStationFound { .. })
        ));
        assert!(matches!(
            table.search_name("   "),
            Err(StationError::NoStationFound { .. })
        ));
    }
}
