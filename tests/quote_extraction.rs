use std::io::Cursor;
use studio_scout::workflows::quotes::{
    BestQuote, ExtractionError, PenaltyRatio, QuoteBasis, QuoteConfig, QuoteExtractor,
    QuotePolicy, RowQuote,
};

/// Markup shaped like the pricing endpoint's response: rows carry several
/// attributes, cells nest spans, and prices may be entity-encoded.
fn pricing_document(prices: &[&str]) -> Vec<u8> {
    let mut html = String::from(
        "<!DOCTYPE html>\n<div id=\"pricing\">\n\
         <span class=\"legend\">$ per month</span>\n<table>\n",
    );
    for (index, price) in prices.iter().enumerate() {
        html.push_str(&format!(
            "<tr class=\"row\"\n    id=\"Pricerow{index}\" data-term=\"{term}\">\n\
             <!-- term {term} -->\n\
             <td class=\"term\">{term} Months</td>\n\
             <td class=\"rent\"><span><b>{price}</b></span></td>\n\
             <td class=\"deposit\">$500.00</td>\n</tr>\n",
            term = 5 + index
        ));
    }
    html.push_str("</table>\n</div>\n");
    html.into_bytes()
}

fn full_matrix() -> Vec<&'static str> {
    vec![
        "$3,400.00",
        "$3,350.00",
        "&#36;3,300.00",
        "$3,250.00",
        "$3,200.00",
        "$3,150.00",
        "$3,100.00",
        "$3,050.00",
        "$3,000.00",
        "$2,950.00",
        "$2,900.00",
        "$2,850.00",
        "$2,800.00",
    ]
}

#[derive(Debug)]
struct MoveInSpecial {
    lease_months: u32,
    credit: f64,
}

impl QuotePolicy for MoveInSpecial {
    fn candidate(&self, row: &RowQuote) -> Option<BestQuote> {
        (row.lease_months == self.lease_months).then_some(BestQuote {
            amount: row.amount - self.credit,
            lease_months: row.lease_months,
            basis: QuoteBasis::FacePrice,
        })
    }
}

#[test]
fn extracts_quote_from_realistic_markup() {
    let extractor = QuoteExtractor::new(QuoteConfig::default());

    let best = extractor
        .extract(Cursor::new(pricing_document(&full_matrix())))
        .expect("quote extracted");

    // 2,800 * 8/7 = 3,200 beats the cheapest short-lease face price of 3,300.
    assert!((best.amount - 3200.0).abs() < 1e-9);
    assert_eq!(best.lease_months, 17);
    assert_eq!(best.basis, QuoteBasis::EarlyMoveOut);
}

#[test]
fn short_lease_face_price_wins_when_long_leases_are_expensive() {
    let mut prices = full_matrix();
    prices[12] = "$3,900.00";
    prices[11] = "$3,900.00";
    prices[10] = "$3,900.00";
    prices[9] = "$3,900.00";
    prices[8] = "$3,900.00";

    let best = QuoteExtractor::new(QuoteConfig::default())
        .extract(Cursor::new(pricing_document(&prices)))
        .expect("quote extracted");

    // 3,050 * 8/7 ≈ 3,485.71 loses to the 7 month face price of 3,300.
    assert_eq!(best.amount, 3300.0);
    assert_eq!(best.lease_months, 7);
    assert_eq!(best.basis, QuoteBasis::FacePrice);
}

#[test]
fn custom_ratio_changes_early_move_out_candidates() {
    let config = QuoteConfig {
        early_move_out: PenaltyRatio::new(3, 2).expect("valid ratio"),
        ..QuoteConfig::default()
    };

    let best = QuoteExtractor::new(config)
        .extract(Cursor::new(pricing_document(&full_matrix())))
        .expect("quote extracted");

    assert_eq!(best.amount, 3300.0);
    assert_eq!(best.basis, QuoteBasis::FacePrice);
}

#[test]
fn additional_policies_join_the_reduction() {
    let extractor = QuoteExtractor::new(QuoteConfig::default()).with_policy(Box::new(
        MoveInSpecial {
            lease_months: 12,
            credit: 250.0,
        },
    ));

    let best = extractor
        .extract(Cursor::new(pricing_document(&full_matrix())))
        .expect("quote extracted");

    assert_eq!(best.amount, 2800.0);
    assert_eq!(best.lease_months, 12);
}

#[test]
fn document_missing_later_rows_is_rejected() {
    let prices = full_matrix();

    let err = QuoteExtractor::new(QuoteConfig::default())
        .extract(Cursor::new(pricing_document(&prices[..12])))
        .expect_err("row 12 missing");

    assert!(matches!(err, ExtractionError::RowNotFound { ref row } if row == "Pricerow12"));
}

#[test]
fn empty_document_is_rejected() {
    let err = QuoteExtractor::new(QuoteConfig::default())
        .extract(Cursor::new(Vec::<u8>::new()))
        .expect_err("nothing to read");

    assert!(matches!(err, ExtractionError::RowNotFound { ref row } if row == "Pricerow0"));
}
