//! Exchange metadata payload and the instrument filter applied to it.
//!
//! Everything here is pure: a response body goes in, a sorted symbol list
//! comes out.

use std::collections::BTreeSet;

use serde::Deserialize;
use serde_json::Value;

use super::CatalogFetchError;

/// One instrument object from the exchange metadata document. Fields are
/// optional because the upstream omits them for some contract kinds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawInstrument {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub contract_type: Option<String>,
    #[serde(default)]
    pub quote_asset: Option<String>,
    #[serde(default)]
    pub base_asset: Option<String>,
}

/// Parse the metadata document.
///
/// Fails with `Malformed` when the body is not JSON or the top-level
/// `symbols` field is missing or not an array. Array items that are not
/// instrument objects are skipped.
pub fn parse_instruments(body: &str) -> Result<Vec<RawInstrument>, CatalogFetchError> {
    let document: Value = serde_json::from_str(body).map_err(|e| CatalogFetchError::Malformed {
        reason: format!("response is not valid JSON: {e}"),
    })?;

    let items = match document.get("symbols") {
        Some(Value::Array(items)) => items,
        Some(_) => {
            return Err(CatalogFetchError::Malformed {
                reason: String::from("top-level 'symbols' is not an array"),
            })
        }
        None => {
            return Err(CatalogFetchError::Malformed {
                reason: String::from("top-level 'symbols' is missing"),
            })
        }
    };

    Ok(items
        .iter()
        .filter_map(|item| RawInstrument::deserialize(item).ok())
        .collect())
}

/// Selection rules for catalog instruments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstrumentFilter {
    pub status: String,
    pub contract_type: String,
    pub quote_asset: String,
    pub excluded: BTreeSet<String>,
}

impl Default for InstrumentFilter {
    fn default() -> Self {
        Self {
            status: String::from("TRADING"),
            contract_type: String::from("PERPETUAL"),
            quote_asset: String::from("USDT"),
            excluded: ["BTC", "YFI"].into_iter().map(String::from).collect(),
        }
    }
}

impl InstrumentFilter {
    pub fn with_excluded<I, S>(mut self, excluded: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.excluded = excluded.into_iter().map(Into::into).collect();
        self
    }

    pub fn accepts(&self, instrument: &RawInstrument) -> bool {
        instrument.status.as_deref() == Some(self.status.as_str())
            && instrument.contract_type.as_deref() == Some(self.contract_type.as_str())
            && instrument.quote_asset.as_deref() == Some(self.quote_asset.as_str())
            && instrument.base_asset.is_some()
    }

    /// Base assets of accepted instruments, deduplicated, ascending, with the
    /// exclusion set removed.
    pub fn apply(&self, instruments: &[RawInstrument]) -> Vec<String> {
        let selected: BTreeSet<&str> = instruments
            .iter()
            .filter(|instrument| self.accepts(instrument))
            .filter_map(|instrument| instrument.base_asset.as_deref())
            .filter(|base| !self.excluded.contains(*base))
            .collect();

        selected.into_iter().map(String::from).collect()
    }
}
