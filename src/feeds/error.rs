use thiserror::Error;

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("Network request failed for {0}; the feed may be temporarily unavailable, try again later")]
    NetworkRequest(String, #[source] reqwest::Error),

    #[error("HTTP request failed for {url} with status {status}; try again later")]
    HttpStatus {
        url: String,
        status: reqwest::StatusCode,
        #[source]
        source: reqwest::Error,
    },

    #[error("Feed {0} is not valid XML")]
    Xml(String, #[source] quick_xml::Error),

    #[error("Feed {0} has a malformed attribute")]
    XmlAttr(String, #[source] quick_xml::events::attributes::AttrError),

    #[error("Feed {0} is not valid UTF-8")]
    Utf8(String, #[source] std::str::Utf8Error),

    // Every variant below indicates upstream schema drift.
    #[error("Feed {product} node <{tag}> is missing its '{attribute}' attribute")]
    MissingAttribute {
        product: String,
        tag: &'static str,
        attribute: &'static str,
    },

    #[error("Period {period_index} of area '{area}' in feed {product} carries none of its expected time attributes")]
    MissingPeriodTimes {
        product: String,
        area: String,
        period_index: u32,
    },

    #[error("Feed {product} contains unknown element descriptor '{descriptor}' (units {units:?})")]
    UnknownDescriptor {
        product: String,
        descriptor: String,
        units: Option<String>,
    },

    #[error("Duplicate value for column '{column}' in period {period_index} of area '{area}'")]
    DuplicateAttribute {
        area: String,
        period_index: u32,
        column: &'static str,
    },

    #[error("Column '{column}' has unparseable value '{value}': {reason}")]
    MalformedValue {
        column: &'static str,
        value: String,
        reason: String,
    },

    #[error("Column '{column}' has unparseable timestamp '{value}'")]
    TimestampParse {
        column: &'static str,
        value: String,
        #[source]
        source: chrono::ParseError,
    },

    #[error("Failed to build output table")]
    Frame(#[from] polars::error::PolarsError),
}
