// deploy/src/gas_reporter.rs

//! Gas usage per contract method and per deployment, optionally priced in
//! a fiat currency

use crate::{config::GasReporterSettings, DeployError, DeployResult};
use chain_core::{TransactionReceipt, U256};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt::Write;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

const COINMARKETCAP_QUOTES_URL: &str = "https://pro-api.coinmarketcap.com/v1/cryptocurrency/quotes/latest";

/// Min/max/average over the recorded transactions
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GasStats {
    pub calls: u64,
    pub min: u64,
    pub max: u64,
    pub total: u64,
}

impl GasStats {
    fn record(&mut self, gas: u64) {
        if self.calls == 0 {
            self.min = gas;
            self.max = gas;
        } else {
            self.min = self.min.min(gas);
            self.max = self.max.max(gas);
        }
        self.calls += 1;
        self.total += gas;
    }

    pub fn average(&self) -> u64 {
        if self.calls == 0 {
            0
        } else {
            self.total / self.calls
        }
    }
}

#[derive(Default)]
struct Ledger {
    /// (contract, method) -> stats
    methods: BTreeMap<(String, String), GasStats>,
    deployments: BTreeMap<String, GasStats>,
    /// Sum of effective gas prices, for the average
    gas_price_total: U256,
    transactions: u64,
}

/// Collects gas used by deployments and state-changing calls
pub struct GasReporter {
    settings: GasReporterSettings,
    ledger: Mutex<Ledger>,
}

/// One report line; `method` is `None` for a deployment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GasRow {
    pub contract: String,
    pub method: Option<String>,
    pub stats: GasStats,
}

/// Fiat conversion inputs
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pricing {
    /// Price of one native token in the report currency
    pub token_price: f64,
    pub gas_price_gwei: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GasReport {
    pub rows: Vec<GasRow>,
    pub currency: String,
    pub token: String,
    /// Average effective gas price observed, in gwei
    pub observed_gas_price_gwei: Option<f64>,
    pub pricing: Option<Pricing>,
}

impl GasReporter {
    pub fn new(settings: GasReporterSettings) -> Self {
        Self {
            settings,
            ledger: Mutex::new(Ledger::default()),
        }
    }

    pub fn settings(&self) -> &GasReporterSettings {
        &self.settings
    }

    fn ledger(&self) -> MutexGuard<'_, Ledger> {
        self.ledger.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn record_call(&self, contract: &str, method: &str, receipt: &TransactionReceipt) {
        let mut ledger = self.ledger();
        ledger
            .methods
            .entry((contract.to_string(), method.to_string()))
            .or_default()
            .record(receipt.gas_used);
        ledger.gas_price_total += receipt.effective_gas_price;
        ledger.transactions += 1;
    }

    pub fn record_deployment(&self, contract: &str, receipt: &TransactionReceipt) {
        let mut ledger = self.ledger();
        ledger
            .deployments
            .entry(contract.to_string())
            .or_default()
            .record(receipt.gas_used);
        ledger.gas_price_total += receipt.effective_gas_price;
        ledger.transactions += 1;
    }

    pub fn reset(&self) {
        *self.ledger() = Ledger::default();
    }

    /// Snapshot without pricing
    pub fn report(&self) -> GasReport {
        let ledger = self.ledger();
        let mut rows: Vec<GasRow> = ledger
            .methods
            .iter()
            .map(|((contract, method), stats)| GasRow {
                contract: contract.clone(),
                method: Some(method.clone()),
                stats: *stats,
            })
            .collect();
        rows.extend(ledger.deployments.iter().map(|(contract, stats)| GasRow {
            contract: contract.clone(),
            method: None,
            stats: *stats,
        }));

        let observed_gas_price_gwei = (ledger.transactions > 0).then(|| {
            let average = ledger.gas_price_total / U256::from(ledger.transactions);
            average.low_u128() as f64 / 1e9
        });

        GasReport {
            rows,
            currency: self.settings.currency.clone(),
            token: self.settings.token.clone(),
            observed_gas_price_gwei,
            pricing: None,
        }
    }

    /// Report priced through CoinMarketCap. Without an API key, or when
    /// the quote fails, the report is returned unpriced.
    pub async fn priced_report(&self, api_key: Option<&str>) -> GasReport {
        let report = self.report();
        let (Some(api_key), Some(gas_price_gwei)) = (api_key, report.observed_gas_price_gwei) else {
            return report;
        };
        match fetch_token_price(api_key, &self.settings.token, &self.settings.currency).await {
            Ok(token_price) => report.with_pricing(Pricing {
                token_price,
                gas_price_gwei,
            }),
            Err(e) => {
                tracing::warn!("Gas report left unpriced: {}", e);
                report
            }
        }
    }
}

impl GasReport {
    pub fn with_pricing(mut self, pricing: Pricing) -> Self {
        self.pricing = Some(pricing);
        self
    }

    /// Fiat cost of `gas` at the priced gas price
    pub fn cost(&self, gas: u64) -> Option<f64> {
        self.pricing
            .map(|p| gas as f64 * p.gas_price_gwei * 1e-9 * p.token_price)
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Plain-text table
    pub fn render(&self) -> String {
        let cost_header = format!("{} (avg)", self.currency.to_lowercase());
        let mut out = String::new();
        let _ = writeln!(
            out,
            "{:<24} {:<28} {:>10} {:>10} {:>10} {:>8} {:>12}",
            "Contract", "Method", "Min", "Max", "Avg", "# calls", cost_header
        );
        let _ = writeln!(out, "{}", "-".repeat(108));

        for row in &self.rows {
            let method = row.method.as_deref().unwrap_or("(deployment)");
            let cost = self
                .cost(row.stats.average())
                .map(|c| format!("{c:.2}"))
                .unwrap_or_else(|| "-".into());
            let _ = writeln!(
                out,
                "{:<24} {:<28} {:>10} {:>10} {:>10} {:>8} {:>12}",
                row.contract,
                method,
                row.stats.min,
                row.stats.max,
                row.stats.average(),
                row.stats.calls,
                cost
            );
        }

        match (&self.pricing, self.observed_gas_price_gwei) {
            (Some(p), _) => {
                let _ = writeln!(
                    out,
                    "{} at {:.2} {}/{}, gas price {:.2} gwei",
                    self.token, p.token_price, self.currency, self.token, p.gas_price_gwei
                );
            }
            (None, Some(gwei)) => {
                let _ = writeln!(out, "gas price {gwei:.2} gwei (unpriced)");
            }
            (None, None) => {}
        }
        out
    }
}

/// Latest `token` price in `currency` from CoinMarketCap
pub async fn fetch_token_price(api_key: &str, token: &str, currency: &str) -> DeployResult<f64> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(10))
        .build()
        .map_err(|e| DeployError::Http(e.to_string()))?;

    let response = client
        .get(COINMARKETCAP_QUOTES_URL)
        .header("X-CMC_PRO_API_KEY", api_key)
        .query(&[("symbol", token), ("convert", currency)])
        .send()
        .await
        .map_err(|e| DeployError::Http(format!("price quote failed: {e}")))?;

    if !response.status().is_success() {
        return Err(DeployError::Http(format!(
            "price quote failed: {}",
            response.status()
        )));
    }
    let body: Value = response
        .json()
        .await
        .map_err(|e| DeployError::Http(format!("invalid price quote: {e}")))?;
    quote_price(&body, token, currency)
}

fn quote_price(body: &Value, token: &str, currency: &str) -> DeployResult<f64> {
    body["data"][token]["quote"][currency]["price"]
        .as_f64()
        .ok_or_else(|| DeployError::Http(format!("no {token}/{currency} price in quote")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chain_core::{units::gwei, Address, H256};
    use serde_json::json;

    fn receipt(gas_used: u64) -> TransactionReceipt {
        TransactionReceipt {
            transaction_hash: H256::zero(),
            transaction_index: 0,
            block_hash: H256::zero(),
            block_number: 1,
            from: Address::zero(),
            to: None,
            contract_address: None,
            gas_used,
            effective_gas_price: gwei(1),
            status: 1,
            logs: vec![],
        }
    }

    #[test]
    fn test_stats() {
        let reporter = GasReporter::new(GasReporterSettings::default());
        reporter.record_call("FundMe", "fund", &receipt(90_000));
        reporter.record_call("FundMe", "fund", &receipt(50_000));
        reporter.record_call("FundMe", "withdraw", &receipt(40_000));
        reporter.record_deployment("FundMe", &receipt(800_000));

        let report = reporter.report();
        assert_eq!(report.rows.len(), 3);
        let fund = &report.rows[0];
        assert_eq!(fund.method.as_deref(), Some("fund"));
        assert_eq!(fund.stats.min, 50_000);
        assert_eq!(fund.stats.max, 90_000);
        assert_eq!(fund.stats.average(), 70_000);
        assert_eq!(fund.stats.calls, 2);
        assert_eq!(report.rows[2].method, None);
        assert_eq!(report.observed_gas_price_gwei, Some(1.0));

        reporter.reset();
        assert!(reporter.report().is_empty());
    }

    #[test]
    fn test_render() {
        let reporter = GasReporter::new(GasReporterSettings::default());
        reporter.record_deployment("Lottery", &receipt(1_000_000));
        let unpriced = reporter.report();
        assert_eq!(unpriced.cost(1_000_000), None);
        let table = unpriced.render();
        assert!(table.contains("(deployment)"));
        assert!(table.contains("unpriced"));

        let priced = unpriced.with_pricing(Pricing {
            token_price: 2000.0,
            gas_price_gwei: 10.0,
        });
        let cost = priced.cost(1_000_000).unwrap();
        assert!((cost - 20.0).abs() < 1e-9);
        assert!(priced.render().contains("20.00"));
    }

    #[tokio::test]
    async fn test_no_api_key_leaves_report_unpriced() {
        let reporter = GasReporter::new(GasReporterSettings::default());
        reporter.record_call("EventsExample", "store", &receipt(30_000));
        let report = reporter.priced_report(None).await;
        assert!(report.pricing.is_none());
    }

    #[test]
    fn test_quote_price() {
        let body = json!({ "data": { "ETH": { "quote": { "USD": { "price": 1850.25 } } } } });
        assert_eq!(quote_price(&body, "ETH", "USD").unwrap(), 1850.25);
        assert!(quote_price(&body, "ETH", "EUR").is_err());
    }
}
