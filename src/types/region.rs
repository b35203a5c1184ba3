//! Region codes and the fixed region → BOM product-id tables for the
//! feeds this crate understands.

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Base address all forecast/bulletin products are published under.
pub const PRODUCT_BASE_URL: &str = "http://ftp.bom.gov.au/anon/gen/fwo";

/// An Australian state or territory, plus [`State::Aus`] meaning every region.
///
/// Parsed from the postal abbreviation or the full name, case-insensitively:
///
/// ```
/// use bomfeed::State;
///
/// assert_eq!("NSW".parse::<State>().unwrap(), State::Nsw);
/// assert_eq!("new south wales".parse::<State>().unwrap(), State::Nsw);
/// assert!("XX".parse::<State>().is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum State {
    Act,
    Nsw,
    Nt,
    Qld,
    Sa,
    Tas,
    Vic,
    Wa,
    /// All regions; expands to every distinct feed in [`FEED_ORDER`] order.
    Aus,
}

/// The deterministic feed order used when [`State::Aus`] is requested.
/// ACT is absent: it shares the NSW feed.
pub const FEED_ORDER: [State; 7] = [
    State::Nsw,
    State::Nt,
    State::Qld,
    State::Sa,
    State::Tas,
    State::Vic,
    State::Wa,
];

const VALID_CODES: &str = "ACT, NSW, NT, QLD, SA, TAS, VIC, WA, AUS";

/// A region string that is not one of the recognized codes or names.
#[derive(Debug, Error)]
#[error("unknown region '{given}'; valid codes are {VALID_CODES}")]
pub struct UnknownRegionError {
    pub given: String,
}

impl State {
    /// Postal abbreviation, as it appears in area codes and output tables.
    pub fn abbrev(self) -> &'static str {
        match self {
            State::Act => "ACT",
            State::Nsw => "NSW",
            State::Nt => "NT",
            State::Qld => "QLD",
            State::Sa => "SA",
            State::Tas => "TAS",
            State::Vic => "VIC",
            State::Wa => "WA",
            State::Aus => "AUS",
        }
    }

    /// Product id of the précis town forecast feed for this region.
    ///
    /// ACT has no feed of its own upstream and is served by the NSW product;
    /// that aliasing is preserved as-is.
    pub fn precis_product(self) -> Option<&'static str> {
        match self {
            State::Act | State::Nsw => Some("IDN11060"),
            State::Nt => Some("IDD10207"),
            State::Qld => Some("IDQ11295"),
            State::Sa => Some("IDS10044"),
            State::Tas => Some("IDT16710"),
            State::Vic => Some("IDV10753"),
            State::Wa => Some("IDW14199"),
            State::Aus => None,
        }
    }

    /// Product id of the agricultural bulletin feed for this region.
    /// ACT aliases NSW here as well.
    pub fn bulletin_product(self) -> Option<&'static str> {
        match self {
            State::Act | State::Nsw => Some("IDN65176"),
            State::Nt => Some("IDD65176"),
            State::Qld => Some("IDQ60604"),
            State::Sa => Some("IDS65176"),
            State::Tas => Some("IDT65176"),
            State::Vic => Some("IDV65176"),
            State::Wa => Some("IDW65176"),
            State::Aus => None,
        }
    }

    /// The product ids to fetch for a précis forecast request, in feed order.
    pub fn precis_products(self) -> Vec<&'static str> {
        match self.precis_product() {
            Some(product) => vec![product],
            None => FEED_ORDER
                .iter()
                .filter_map(|s| s.precis_product())
                .collect(),
        }
    }

    /// The product ids to fetch for an agricultural bulletin request, in feed order.
    pub fn bulletin_products(self) -> Vec<&'static str> {
        match self.bulletin_product() {
            Some(product) => vec![product],
            None => FEED_ORDER
                .iter()
                .filter_map(|s| s.bulletin_product())
                .collect(),
        }
    }

    /// Region abbreviation a product id belongs to. Used to derive the
    /// `state` column for feeds whose rows carry no area code.
    pub fn from_product(product: &str) -> Option<State> {
        FEED_ORDER
            .iter()
            .copied()
            .find(|s| s.precis_product() == Some(product) || s.bulletin_product() == Some(product))
    }

    /// Fully-qualified URL for a product id.
    pub fn product_url(product: &str) -> String {
        format!("{PRODUCT_BASE_URL}/{product}.xml")
    }

    /// Filename a product is published under.
    pub fn product_filename(product: &str) -> String {
        format!("{product}.xml")
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.abbrev())
    }
}

impl FromStr for State {
    type Err = UnknownRegionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ACT" | "AUSTRALIAN CAPITAL TERRITORY" | "CANBERRA" => Ok(State::Act),
            "NSW" | "NEW SOUTH WALES" => Ok(State::Nsw),
            "NT" | "NORTHERN TERRITORY" => Ok(State::Nt),
            "QLD" | "QUEENSLAND" => Ok(State::Qld),
            "SA" | "SOUTH AUSTRALIA" => Ok(State::Sa),
            "TAS" | "TASMANIA" => Ok(State::Tas),
            "VIC" | "VICTORIA" => Ok(State::Vic),
            "WA" | "WESTERN AUSTRALIA" => Ok(State::Wa),
            "AUS" | "AUSTRALIA" | "ALL" => Ok(State::Aus),
            _ => Err(UnknownRegionError {
                given: s.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_abbreviations_and_full_names() {
        assert_eq!("QLD".parse::<State>().unwrap(), State::Qld);
        assert_eq!("qld".parse::<State>().unwrap(), State::Qld);
        assert_eq!("Western Australia".parse::<State>().unwrap(), State::Wa);
        assert_eq!("AUS".parse::<State>().unwrap(), State::Aus);
    }

    #[test]
    fn unknown_region_lists_valid_codes() {
        let err = "XX".parse::<State>().unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("XX"));
        assert!(msg.contains("NSW"));
        assert!(msg.contains("AUS"));
    }

    #[test]
    fn act_aliases_nsw_feed() {
        assert_eq!(State::Act.precis_product(), State::Nsw.precis_product());
        assert_eq!(
            State::Act.bulletin_product(),
            State::Nsw.bulletin_product()
        );
    }

    #[test]
    fn aus_expands_to_fixed_feed_order() {
        assert_eq!(
            State::Aus.precis_products(),
            vec![
                "IDN11060", "IDD10207", "IDQ11295", "IDS10044", "IDT16710", "IDV10753", "IDW14199"
            ]
        );
        assert_eq!(State::Aus.bulletin_products().len(), 7);
    }

    #[test]
    fn product_reverse_lookup() {
        assert_eq!(State::from_product("IDQ11295"), Some(State::Qld));
        assert_eq!(State::from_product("IDN65176"), Some(State::Nsw));
        assert_eq!(State::from_product("IDX00000"), None);
    }

    #[test]
    fn product_url_shape() {
        assert_eq!(
            State::product_url("IDN11060"),
            "http://ftp.bom.gov.au/anon/gen/fwo/IDN11060.xml"
        );
    }
}
