use crate::feeds::error::FeedError;
use crate::types::region::State;
use log::info;
use reqwest::Client;

/// Downloads published feed documents. One attempt per request; a failed
/// fetch is surfaced immediately and never retried here.
#[derive(Debug, Clone)]
pub struct FeedFetcher {
    client: Client,
}

impl FeedFetcher {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
        }
    }

    /// Fetches the raw XML bytes for a product id.
    pub async fn fetch_product(&self, product: &str) -> Result<Vec<u8>, FeedError> {
        let url = State::product_url(product);
        info!("Downloading feed {} from {}", product, url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| FeedError::NetworkRequest(url.clone(), e))?;

        let response = match response.error_for_status() {
            Ok(resp) => resp,
            Err(e) => {
                return Err(if let Some(status) = e.status() {
                    FeedError::HttpStatus {
                        url,
                        status,
                        source: e,
                    }
                } else {
                    FeedError::NetworkRequest(url, e)
                });
            }
        };

        let bytes = response
            .bytes()
            .await
            .map_err(|e| FeedError::NetworkRequest(url, e))?;
        info!("Downloaded {} bytes for feed {}", bytes.len(), product);
        Ok(bytes.to_vec())
    }
}

impl Default for FeedFetcher {
    fn default() -> Self {
        Self::new()
    }
}
