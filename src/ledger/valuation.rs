use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

use super::{step_value, Ledger};
use crate::data::PriceHistory;
use crate::error::BacktestError;
use crate::models::AssetId;
use crate::Result;

/// Quote-currency value of each asset at every ledger timestamp
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValuationSeries {
    pub quote_asset: AssetId,
    pub index: Vec<DateTime<Utc>>,
    pub columns: BTreeMap<AssetId, Vec<f64>>,
}

impl ValuationSeries {
    pub fn column(&self, asset: &AssetId) -> Option<&[f64]> {
        self.columns.get(asset).map(Vec::as_slice)
    }

    /// Portfolio value per timestamp, summed across assets
    pub fn total(&self) -> Vec<f64> {
        let mut total = vec![0.0; self.index.len()];
        for values in self.columns.values() {
            for (sum, value) in total.iter_mut().zip(values) {
                *sum += value;
            }
        }
        total
    }
}

impl Ledger {
    /// Value every registered asset in `quote_asset` over the ledger's index
    ///
    /// Non-quote assets are priced from the `asset + quote_asset` column of
    /// `history`, which must cover every ledger timestamp.
    pub fn valuation_series(
        &self,
        history: &PriceHistory,
        quote_asset: &AssetId,
    ) -> Result<ValuationSeries> {
        let mut columns = BTreeMap::new();

        for (asset, steps) in &self.balances {
            let values = if asset == quote_asset {
                self.index.iter().map(|t| step_value(steps, *t)).collect()
            } else {
                let market = format!("{}{}", asset, quote_asset);
                let prices = history.column(&market)?;
                self.index
                    .iter()
                    .map(|t| {
                        let row = history.position(*t).ok_or_else(|| {
                            BacktestError::MissingPrice {
                                market: market.clone(),
                                at: *t,
                            }
                        })?;
                        Ok(step_value(steps, *t) * prices[row])
                    })
                    .collect::<Result<Vec<f64>>>()?
            };
            columns.insert(asset.clone(), values);
        }

        Ok(ValuationSeries {
            quote_asset: quote_asset.clone(),
            index: self.index.clone(),
            columns,
        })
    }
}
