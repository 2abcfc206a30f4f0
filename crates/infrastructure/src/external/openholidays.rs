use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info, warn};

use domain::error::{DomainError, DomainResult};
use domain::repository::HolidayProvider;
use domain::schedule::SuggestedHoliday;

const BASE_URL: &str = "https://openholidaysapi.org";
const CACHE_TTL: Duration = Duration::from_secs(24 * 60 * 60);
const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Deserialize)]
struct PublicHoliday {
    #[serde(rename = "startDate")]
    start_date: String,
    #[serde(default)]
    name: Vec<LocalizedName>,
    #[serde(default)]
    nationwide: bool,
    #[serde(rename = "type", default)]
    kind: String,
}

#[derive(Debug, Clone, Deserialize)]
struct LocalizedName {
    language: String,
    text: String,
}

struct CacheEntry {
    data: Vec<SuggestedHoliday>,
    expires_at: Instant,
}

/// Client for openholidaysapi.org with a daily per-(country, year) cache.
/// On any network or HTTP error the most recent cache entry is served even
/// when expired; only a cold cache surfaces the error.
pub struct OpenHolidaysClient {
    http: reqwest::Client,
    base_url: String,
    cache: RwLock<HashMap<String, CacheEntry>>,
}

impl OpenHolidaysClient {
    pub fn new() -> Self {
        Self::with_base_url(BASE_URL)
    }

    pub fn with_base_url(base_url: &str) -> Self {
        Self {
            http: reqwest::Client::builder()
                .timeout(HTTP_TIMEOUT)
                .build()
                .expect("reqwest client"),
            base_url: base_url.to_string(),
            cache: RwLock::new(HashMap::new()),
        }
    }

    fn cached_or(
        &self,
        cache_key: &str,
        original_err: DomainError,
    ) -> DomainResult<(Vec<SuggestedHoliday>, bool)> {
        let cache = self.cache.read().unwrap();
        if let Some(entry) = cache.get(cache_key) {
            info!(key = %cache_key, "returning expired cached holidays due to API error");
            return Ok((entry.data.clone(), true));
        }
        Err(original_err)
    }
}

impl Default for OpenHolidaysClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HolidayProvider for OpenHolidaysClient {
    async fn public_holidays(
        &self,
        country_code: &str,
        year: i32,
    ) -> DomainResult<(Vec<SuggestedHoliday>, bool)> {
        let cache_key = format!("{country_code}-{year}");

        {
            let cache = self.cache.read().unwrap();
            if let Some(entry) = cache.get(&cache_key) {
                if entry.expires_at > Instant::now() {
                    debug!(country = country_code, year, "returning cached holidays");
                    return Ok((entry.data.clone(), true));
                }
            }
        }

        let url = format!(
            "{}/PublicHolidays?countryIsoCode={}&validFrom={}-01-01&validTo={}-12-31&languageIsoCode=EN",
            self.base_url, country_code, year, year
        );

        debug!(%url, "fetching holidays from API");

        let response = match self
            .http
            .get(&url)
            .header("Accept", "application/json")
            .send()
            .await
        {
            Ok(response) => response,
            Err(err) => {
                warn!(%err, "failed to fetch holidays from API");
                return self.cached_or(&cache_key, DomainError::internal(err));
            }
        };

        if !response.status().is_success() {
            let status = response.status();
            warn!(%status, "holidays API error");
            return self.cached_or(
                &cache_key,
                DomainError::Internal(format!("holidays API returned status {status}")),
            );
        }

        let holidays: Vec<PublicHoliday> = match response.json().await {
            Ok(holidays) => holidays,
            Err(err) => {
                warn!(%err, "failed to decode holidays response");
                return self.cached_or(&cache_key, DomainError::internal(err));
            }
        };

        let suggested: Vec<SuggestedHoliday> = holidays
            .into_iter()
            .map(|h| SuggestedHoliday {
                date: h.start_date,
                name: localized_name(&h.name),
                kind: h.kind,
                nationwide: h.nationwide,
            })
            .collect();

        {
            let mut cache = self.cache.write().unwrap();
            cache.insert(
                cache_key,
                CacheEntry {
                    data: suggested.clone(),
                    expires_at: Instant::now() + CACHE_TTL,
                },
            );
        }

        info!(country = country_code, year, count = suggested.len(),
            "fetched holidays from API");

        Ok((suggested, false))
    }
}

/// English name preferred; first available otherwise.
fn localized_name(names: &[LocalizedName]) -> String {
    names
        .iter()
        .find(|n| n.language == "EN")
        .or_else(|| names.first())
        .map(|n| n.text.clone())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_localized_name_prefers_english() {
        let names = vec![
            LocalizedName {
                language: "DE".into(),
                text: "Neujahr".into(),
            },
            LocalizedName {
                language: "EN".into(),
                text: "New Year's Day".into(),
            },
        ];
        assert_eq!(localized_name(&names), "New Year's Day");
    }

    #[test]
    fn test_localized_name_falls_back_to_first() {
        let names = vec![LocalizedName {
            language: "DE".into(),
            text: "Neujahr".into(),
        }];
        assert_eq!(localized_name(&names), "Neujahr");
        assert_eq!(localized_name(&[]), "");
    }
}
