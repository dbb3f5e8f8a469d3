use std::io::{self, BufRead};
use std::str::FromStr;

use tracing::{debug, trace, warn};

use super::policy::{
    reduce_best_quote, BestQuote, EarlyMoveOutPolicy, PenaltyRatio, QuotePolicy, RowQuote,
    ShortLeasePolicy,
};
use super::tokens::{HtmlToken, TokenCursor};

/// Prefix of the attribute value identifying each lease-term row.
pub const ROW_NAME_PREFIX: &str = "Pricerow";

pub fn row_name(index: usize) -> String {
    format!("{ROW_NAME_PREFIX}{index}")
}

#[derive(Debug, thiserror::Error)]
pub enum ExtractionError {
    #[error("pricing row {row} not found")]
    RowNotFound { row: String },
    #[error("no price found in pricing row {row}")]
    PriceNotFound { row: String },
    #[error("price '{raw}' in pricing row {row} is not a number")]
    PriceParse { row: String, raw: String },
    #[error("pricing matrix has no usable prices")]
    NoQuotes,
    #[error("failed to read pricing document: {0}")]
    Read(#[from] io::Error),
}

/// What to do with a price cell whose text is not a number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnparseablePrice {
    /// Fail the unit's extraction.
    Fail,
    /// Leave the row out of the reduction.
    Skip,
}

impl FromStr for UnparseablePrice {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "fail" | "strict" => Ok(Self::Fail),
            "skip" | "lenient" => Ok(Self::Skip),
            other => Err(other.to_string()),
        }
    }
}

/// Lease-term grid and pricing rules applied to every unit.
#[derive(Debug, Clone, PartialEq)]
pub struct QuoteConfig {
    pub lease_rows: usize,
    pub base_term_months: u32,
    /// Number of leading rows eligible at face price.
    pub short_lease_cutoff: usize,
    pub early_move_out: PenaltyRatio,
    pub unparseable_price: UnparseablePrice,
}

impl Default for QuoteConfig {
    fn default() -> Self {
        Self {
            lease_rows: 13,
            base_term_months: 5,
            short_lease_cutoff: 3,
            early_move_out: PenaltyRatio::default(),
            unparseable_price: UnparseablePrice::Fail,
        }
    }
}

impl QuoteConfig {
    pub fn lease_months(&self, index: usize) -> u32 {
        self.base_term_months + index as u32
    }

    pub fn policies(&self) -> Vec<Box<dyn QuotePolicy>> {
        vec![
            Box::new(ShortLeasePolicy {
                cutoff: self.short_lease_cutoff,
            }),
            Box::new(EarlyMoveOutPolicy {
                ratio: self.early_move_out,
            }),
        ]
    }
}

/// Progress of one unit's extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionState {
    Idle,
    RowScan(usize),
    RowFound(usize),
    PriceFound(usize),
    AllRowsDone,
    Failed,
}

/// Forward-only scanner over the tokens of a single pricing document.
///
/// Rows must be requested in increasing order; each scan continues from where
/// the previous one stopped.
pub struct PricingMatrix<I> {
    tokens: I,
    state: ExtractionState,
}

impl<R: BufRead> PricingMatrix<TokenCursor<R>> {
    pub fn from_reader(reader: R) -> Self {
        Self::new(TokenCursor::new(reader))
    }
}

impl<I> PricingMatrix<I>
where
    I: Iterator<Item = io::Result<HtmlToken>>,
{
    pub fn new(tokens: I) -> Self {
        Self {
            tokens,
            state: ExtractionState::Idle,
        }
    }

    pub fn state(&self) -> ExtractionState {
        self.state
    }

    fn transition(&mut self, next: ExtractionState) {
        trace!(from = ?self.state, to = ?next, "pricing matrix state");
        self.state = next;
    }

    fn fail(&mut self, err: ExtractionError) -> ExtractionError {
        self.transition(ExtractionState::Failed);
        err
    }

    /// Advances past the opening tag of row `index`.
    pub fn locate_row(&mut self, index: usize) -> Result<(), ExtractionError> {
        let row = row_name(index);
        self.transition(ExtractionState::RowScan(index));
        while let Some(token) = self.tokens.next() {
            let token = token.map_err(|err| self.fail(err.into()))?;
            if token.is_start_tag_with_attr_value(&row) {
                self.transition(ExtractionState::RowFound(index));
                return Ok(());
            }
        }
        Err(self.fail(ExtractionError::RowNotFound { row }))
    }

    /// Returns the raw text of the first price cell after the current row's
    /// opening tag.
    pub fn first_price(&mut self, index: usize) -> Result<String, ExtractionError> {
        while let Some(token) = self.tokens.next() {
            let token = token.map_err(|err| self.fail(err.into()))?;
            if let HtmlToken::Text(text) = token {
                // Merged text runs carry the cell's indentation, so leading
                // whitespace is ignored before looking for the currency sign.
                let trimmed = text.trim();
                if trimmed.starts_with('$') {
                    self.transition(ExtractionState::PriceFound(index));
                    return Ok(trimmed.to_string());
                }
            }
        }
        Err(self.fail(ExtractionError::PriceNotFound {
            row: row_name(index),
        }))
    }

    /// Reads every lease-term row in order.
    pub fn read_rows(&mut self, config: &QuoteConfig) -> Result<Vec<RowQuote>, ExtractionError> {
        let mut rows = Vec::with_capacity(config.lease_rows);
        for index in 0..config.lease_rows {
            self.locate_row(index)?;
            let raw = self.first_price(index)?;
            match parse_price(&raw) {
                Some(amount) => rows.push(RowQuote {
                    index,
                    lease_months: config.lease_months(index),
                    amount,
                }),
                None => {
                    let row = row_name(index);
                    if config.unparseable_price == UnparseablePrice::Fail {
                        return Err(self.fail(ExtractionError::PriceParse { row, raw }));
                    }
                    warn!(%row, %raw, "skipping unparseable price");
                }
            }
        }
        self.transition(ExtractionState::AllRowsDone);
        Ok(rows)
    }
}

/// Strips the currency symbol, thousands separators and surrounding
/// whitespace from a price cell.
pub fn clean_price(raw: &str) -> String {
    raw.chars()
        .filter(|c| *c != '$' && *c != ',' && !c.is_whitespace())
        .collect()
}

pub fn parse_price(raw: &str) -> Option<f64> {
    clean_price(raw)
        .parse::<f64>()
        .ok()
        .filter(|amount| amount.is_finite() && *amount >= 0.0)
}

/// Derives a unit's best quote from its pricing document.
#[derive(Debug)]
pub struct QuoteExtractor {
    config: QuoteConfig,
    policies: Vec<Box<dyn QuotePolicy>>,
}

impl QuoteExtractor {
    pub fn new(config: QuoteConfig) -> Self {
        let policies = config.policies();
        Self { config, policies }
    }

    /// Adds a scoring rule evaluated after the configured ones.
    pub fn with_policy(mut self, policy: Box<dyn QuotePolicy>) -> Self {
        self.policies.push(policy);
        self
    }

    pub fn extract<R: BufRead>(&self, reader: R) -> Result<BestQuote, ExtractionError> {
        self.extract_tokens(TokenCursor::new(reader))
    }

    pub fn extract_tokens<I>(&self, tokens: I) -> Result<BestQuote, ExtractionError>
    where
        I: Iterator<Item = io::Result<HtmlToken>>,
    {
        let mut matrix = PricingMatrix::new(tokens);
        let rows = matrix.read_rows(&self.config)?;
        let best = reduce_best_quote(&rows, &self.policies).ok_or(ExtractionError::NoQuotes)?;
        debug!(
            rows = rows.len(),
            amount = best.amount,
            lease_months = best.lease_months,
            basis = best.basis.label(),
            "reduced pricing matrix"
        );
        Ok(best)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflows::quotes::policy::QuoteBasis;
    use std::io::Cursor;

    fn matrix_html(prices: &[&str]) -> String {
        let mut html = String::from("<div class=\"pricing-matrix\"><table>\n");
        for (index, price) in prices.iter().enumerate() {
            html.push_str(&format!(
                "<tr id=\"Pricerow{index}\">\n  <td class=\"term\">{} Months</td>\n  \
                 <td><span>{price}</span></td>\n  <td>$9,999.00</td>\n</tr>\n",
                5 + index
            ));
        }
        html.push_str("</table></div>\n");
        html
    }

    fn reader(html: String) -> Cursor<Vec<u8>> {
        Cursor::new(html.into_bytes())
    }

    #[test]
    fn cleans_and_parses_prices() {
        assert_eq!(clean_price("$1,234.00"), "1234.00");
        assert_eq!(parse_price("$1,234.00"), Some(1234.00));
        assert_eq!(parse_price("$0.00"), Some(0.0));
        assert_eq!(parse_price(" $12,345 "), Some(12345.0));
        assert_eq!(parse_price("$Call"), None);
        assert_eq!(parse_price("$"), None);
    }

    #[test]
    fn reads_first_price_of_each_row() {
        let html = matrix_html(&["$3,010.00", "$2,990.00", "$2,950.00"]);
        let config = QuoteConfig {
            lease_rows: 3,
            ..QuoteConfig::default()
        };

        let mut matrix = PricingMatrix::from_reader(reader(html));
        let rows = matrix.read_rows(&config).expect("rows read");

        let amounts: Vec<f64> = rows.iter().map(|row| row.amount).collect();
        assert_eq!(amounts, vec![3010.0, 2990.0, 2950.0]);
        assert_eq!(rows[2].lease_months, 7);
        assert_eq!(matrix.state(), ExtractionState::AllRowsDone);
    }

    #[test]
    fn extracts_best_quote_from_full_matrix() {
        let prices = [
            "$100.00", "$90.00", "$80.00", "$70.00", "$60.00", "$50.00", "$40.00", "$30.00",
            "$20.00", "$10.00", "$9.00", "$8.00", "$7.00",
        ];
        let extractor = QuoteExtractor::new(QuoteConfig::default());

        let best = extractor
            .extract(reader(matrix_html(&prices)))
            .expect("quote extracted");

        assert_eq!(best.amount, 8.0);
        assert_eq!(best.basis, QuoteBasis::EarlyMoveOut);
    }

    #[test]
    fn truncated_matrix_reports_missing_row() {
        let prices = ["$2,000.00"; 5];
        let extractor = QuoteExtractor::new(QuoteConfig::default());

        let err = extractor
            .extract(reader(matrix_html(&prices)))
            .expect_err("row 5 missing");

        match err {
            ExtractionError::RowNotFound { row } => assert_eq!(row, "Pricerow5"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn row_without_price_reports_missing_price() {
        let html = "<tr id=\"Pricerow0\"><td>Call for pricing</td></tr>".to_string();
        let config = QuoteConfig {
            lease_rows: 1,
            ..QuoteConfig::default()
        };

        let mut matrix = PricingMatrix::from_reader(reader(html));
        let err = matrix.read_rows(&config).expect_err("no price");

        assert!(matches!(err, ExtractionError::PriceNotFound { ref row } if row == "Pricerow0"));
        assert_eq!(matrix.state(), ExtractionState::Failed);
    }

    #[test]
    fn unparseable_price_fails_by_default() {
        let html = matrix_html(&["$2,100.00", "$TBD"]);
        let config = QuoteConfig {
            lease_rows: 2,
            ..QuoteConfig::default()
        };

        let err = QuoteExtractor::new(config)
            .extract(reader(html))
            .expect_err("parse failure");

        assert!(matches!(err, ExtractionError::PriceParse { ref raw, .. } if raw == "$TBD"));
    }

    #[test]
    fn unparseable_price_can_be_skipped() {
        let html = matrix_html(&["$2,100.00", "$TBD", "$2,050.00"]);
        let config = QuoteConfig {
            lease_rows: 3,
            unparseable_price: UnparseablePrice::Skip,
            ..QuoteConfig::default()
        };

        let best = QuoteExtractor::new(config)
            .extract(reader(html))
            .expect("quote extracted");

        assert_eq!(best.amount, 2050.0);
        assert_eq!(best.lease_months, 7);
    }

    #[test]
    fn all_rows_skipped_yields_no_quotes() {
        let html = matrix_html(&["$TBD"]);
        let config = QuoteConfig {
            lease_rows: 1,
            unparseable_price: UnparseablePrice::Skip,
            ..QuoteConfig::default()
        };

        let err = QuoteExtractor::new(config)
            .extract(reader(html))
            .expect_err("nothing to reduce");

        assert!(matches!(err, ExtractionError::NoQuotes));
    }

    #[test]
    fn later_rows_must_follow_earlier_ones() {
        let html = concat!(
            "<tr id=\"Pricerow1\"><td>$1.00</td></tr>",
            "<tr id=\"Pricerow0\"><td>$2.00</td></tr>",
        )
        .to_string();
        let config = QuoteConfig {
            lease_rows: 2,
            ..QuoteConfig::default()
        };

        let err = QuoteExtractor::new(config)
            .extract(reader(html))
            .expect_err("row 1 precedes row 0");

        assert!(matches!(err, ExtractionError::RowNotFound { ref row } if row == "Pricerow1"));
    }

    #[test]
    fn row_prefix_does_not_match_longer_index() {
        let html = concat!(
            "<tr id=\"Pricerow0\"><td>$1.00</td></tr>",
            "<tr id=\"Pricerow10\"><td>$2.00</td></tr>",
        )
        .to_string();
        let config = QuoteConfig {
            lease_rows: 2,
            short_lease_cutoff: 1,
            ..QuoteConfig::default()
        };

        let err = QuoteExtractor::new(config)
            .extract(reader(html))
            .expect_err("Pricerow10 is not Pricerow1");
        assert!(matches!(err, ExtractionError::RowNotFound { ref row } if row == "Pricerow1"));
    }

    #[test]
    fn parses_unparseable_price_policy() {
        assert_eq!("skip".parse::<UnparseablePrice>(), Ok(UnparseablePrice::Skip));
        assert_eq!("FAIL".parse::<UnparseablePrice>(), Ok(UnparseablePrice::Fail));
        assert!("zero".parse::<UnparseablePrice>().is_err());
    }
}
