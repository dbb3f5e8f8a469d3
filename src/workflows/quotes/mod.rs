mod matrix;
mod policy;
pub mod tokens;

pub use matrix::{
    clean_price, parse_price, row_name, ExtractionError, ExtractionState, PricingMatrix,
    QuoteConfig, QuoteExtractor, UnparseablePrice, ROW_NAME_PREFIX,
};
pub use policy::{
    reduce_best_quote, BestQuote, EarlyMoveOutPolicy, PenaltyRatio, PenaltyRatioParseError,
    QuoteBasis, QuotePolicy, RowQuote, ShortLeasePolicy,
};
