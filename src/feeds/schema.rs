//! Static descriptor tables for the feeds this crate understands.
//!
//! Each feed's value nodes carry a `type` descriptor (and sometimes a
//! `units` qualifier). The pair is mapped to a canonical output column
//! through a fixed table; a descriptor absent from the table means the
//! upstream schema changed, which is surfaced as an error rather than
//! an ad hoc column.

use crate::feeds::error::FeedError;

/// Which feed an XML document belongs to. Drives tag names and the
/// descriptor table used while flattening.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FeedKind {
    PrecisForecast,
    AgBulletin,
}

/// One descriptor-table entry: raw `type`, required `units` (if the feed
/// qualifies the element with units), and the canonical column it maps to.
/// A `None` column means the node is decorative and is discarded.
struct Descriptor {
    raw: &'static str,
    units: Option<&'static str>,
    column: Option<&'static str>,
}

const PRECIS_DESCRIPTORS: &[Descriptor] = &[
    Descriptor {
        raw: "air_temperature_minimum",
        units: Some("Celsius"),
        column: Some("minimum_temperature"),
    },
    Descriptor {
        raw: "air_temperature_maximum",
        units: Some("Celsius"),
        column: Some("maximum_temperature"),
    },
    Descriptor {
        raw: "precipitation_range",
        units: None,
        column: Some("precipitation_range"),
    },
    Descriptor {
        raw: "probability_of_precipitation",
        units: None,
        column: Some("probability_of_precipitation"),
    },
    Descriptor {
        raw: "precis",
        units: None,
        column: Some("precis"),
    },
    // Icon codes are display metadata with no stable schema across periods.
    Descriptor {
        raw: "forecast_icon_code",
        units: None,
        column: None,
    },
];

const BULLETIN_DESCRIPTORS: &[Descriptor] = &[
    Descriptor {
        raw: "rainfall",
        units: Some("mm"),
        column: Some("rainfall"),
    },
    Descriptor {
        raw: "air_temperature_minimum",
        units: Some("Celsius"),
        column: Some("minimum_temperature"),
    },
    Descriptor {
        raw: "air_temperature_maximum",
        units: Some("Celsius"),
        column: Some("maximum_temperature"),
    },
    Descriptor {
        raw: "wetbulb_depression",
        units: Some("Celsius"),
        column: Some("wetbulb_depression"),
    },
    Descriptor {
        raw: "evaporation",
        units: Some("mm"),
        column: Some("evaporation"),
    },
    Descriptor {
        raw: "terrestrial_minimum",
        units: Some("Celsius"),
        column: Some("terrestrial_minimum"),
    },
    Descriptor {
        raw: "sunshine_hours",
        units: Some("hours"),
        column: Some("sunshine_hours"),
    },
    Descriptor {
        raw: "soil_temperature_5cm",
        units: Some("Celsius"),
        column: Some("soil_temp_5cm"),
    },
    Descriptor {
        raw: "soil_temperature_10cm",
        units: Some("Celsius"),
        column: Some("soil_temp_10cm"),
    },
    Descriptor {
        raw: "soil_temperature_20cm",
        units: Some("Celsius"),
        column: Some("soil_temp_20cm"),
    },
    Descriptor {
        raw: "soil_temperature_50cm",
        units: Some("Celsius"),
        column: Some("soil_temp_50cm"),
    },
    Descriptor {
        raw: "soil_temperature_100cm",
        units: Some("Celsius"),
        column: Some("soil_temp_100cm"),
    },
    Descriptor {
        raw: "wind_run",
        units: Some("km"),
        column: Some("wind_run"),
    },
];

impl FeedKind {
    /// Tag of the node carrying a location's rows.
    pub(crate) fn area_tag(self) -> &'static [u8] {
        match self {
            FeedKind::PrecisForecast => b"area",
            FeedKind::AgBulletin => b"obs",
        }
    }

    /// Attribute on the area node holding the location code.
    pub(crate) fn id_attr(self) -> &'static [u8] {
        match self {
            FeedKind::PrecisForecast => b"aac",
            FeedKind::AgBulletin => b"site",
        }
    }

    /// Tag of the nested period node, if the feed has one. Bulletin
    /// observations are their own single period.
    pub(crate) fn period_tag(self) -> Option<&'static [u8]> {
        match self {
            FeedKind::PrecisForecast => Some(b"forecast-period"),
            FeedKind::AgBulletin => None,
        }
    }

    fn descriptors(self) -> &'static [Descriptor] {
        match self {
            FeedKind::PrecisForecast => PRECIS_DESCRIPTORS,
            FeedKind::AgBulletin => BULLETIN_DESCRIPTORS,
        }
    }

    /// Resolves a raw descriptor to its canonical column.
    ///
    /// `Ok(None)` means the node is known but decorative and must be
    /// dropped. An unknown descriptor, or known descriptor with unexpected
    /// units, is a malformed feed.
    pub(crate) fn canonical_column(
        self,
        product: &str,
        raw: &str,
        units: Option<&str>,
    ) -> Result<Option<&'static str>, FeedError> {
        for descriptor in self.descriptors() {
            if descriptor.raw == raw && (descriptor.units.is_none() || descriptor.units == units) {
                return Ok(descriptor.column);
            }
        }
        Err(FeedError::UnknownDescriptor {
            product: product.to_string(),
            descriptor: raw.to_string(),
            units: units.map(str::to_string),
        })
    }
}
