use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Quoted monthly rent for one lease-term row of the pricing matrix.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RowQuote {
    pub index: usize,
    pub lease_months: u32,
    pub amount: f64,
}

/// Which rule produced a best quote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuoteBasis {
    FacePrice,
    EarlyMoveOut,
}

impl QuoteBasis {
    pub const fn label(self) -> &'static str {
        match self {
            Self::FacePrice => "face price",
            Self::EarlyMoveOut => "early move-out",
        }
    }
}

/// Lowest effective monthly rent found for a unit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BestQuote {
    pub amount: f64,
    pub lease_months: u32,
    pub basis: QuoteBasis,
}

/// Multiplier applied to a quoted rent when the tenant leaves early and
/// amortizes the remaining commitment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PenaltyRatio {
    numerator: u32,
    denominator: u32,
}

impl PenaltyRatio {
    pub fn new(numerator: u32, denominator: u32) -> Option<Self> {
        if numerator == 0 || denominator == 0 {
            return None;
        }
        Some(Self {
            numerator,
            denominator,
        })
    }

    pub fn apply(self, amount: f64) -> f64 {
        amount * f64::from(self.numerator) / f64::from(self.denominator)
    }
}

impl Default for PenaltyRatio {
    fn default() -> Self {
        Self {
            numerator: 8,
            denominator: 7,
        }
    }
}

impl fmt::Display for PenaltyRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.numerator, self.denominator)
    }
}

#[derive(Debug, thiserror::Error)]
#[error("penalty ratio must look like 8/7 with non-zero terms, got '{0}'")]
pub struct PenaltyRatioParseError(String);

impl FromStr for PenaltyRatio {
    type Err = PenaltyRatioParseError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let invalid = || PenaltyRatioParseError(raw.to_string());
        let (numerator, denominator) = raw.trim().split_once('/').ok_or_else(invalid)?;
        let numerator = numerator.trim().parse().map_err(|_| invalid())?;
        let denominator = denominator.trim().parse().map_err(|_| invalid())?;
        Self::new(numerator, denominator).ok_or_else(invalid)
    }
}

/// A scoring rule proposing at most one candidate rent per row.
pub trait QuotePolicy: fmt::Debug + Send + Sync {
    fn candidate(&self, row: &RowQuote) -> Option<BestQuote>;
}

/// Accepts a row's face price when its lease is shorter than the cutoff.
/// The shortest term is always eligible.
#[derive(Debug, Clone, Copy)]
pub struct ShortLeasePolicy {
    pub cutoff: usize,
}

impl QuotePolicy for ShortLeasePolicy {
    fn candidate(&self, row: &RowQuote) -> Option<BestQuote> {
        (row.index == 0 || row.index < self.cutoff).then_some(BestQuote {
            amount: row.amount,
            lease_months: row.lease_months,
            basis: QuoteBasis::FacePrice,
        })
    }
}

/// Prices every row as if the tenant moves out early and pays the penalty.
#[derive(Debug, Clone, Copy)]
pub struct EarlyMoveOutPolicy {
    pub ratio: PenaltyRatio,
}

impl QuotePolicy for EarlyMoveOutPolicy {
    fn candidate(&self, row: &RowQuote) -> Option<BestQuote> {
        Some(BestQuote {
            amount: self.ratio.apply(row.amount),
            lease_months: row.lease_months,
            basis: QuoteBasis::EarlyMoveOut,
        })
    }
}

/// Single pass over the rows in order, keeping the lowest candidate. Ties
/// keep the earlier candidate. Returns `None` when no policy proposes one.
pub fn reduce_best_quote(
    rows: &[RowQuote],
    policies: &[Box<dyn QuotePolicy>],
) -> Option<BestQuote> {
    rows.iter()
        .flat_map(|row| {
            policies
                .iter()
                .filter_map(move |policy| policy.candidate(row))
        })
        .fold(None, |best: Option<BestQuote>, candidate| match best {
            Some(current) if current.amount <= candidate.amount => Some(current),
            _ => Some(candidate),
        })
}
