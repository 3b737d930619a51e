//! Result pane parsing and field derivation.
//!
//! Parsing is pure and total: malformed fragments yield fewer fields, not
//! errors, and every derivation tolerates a missing source field by
//! producing an empty value.

use chrono::NaiveDateTime;

use super::types::{PaymentStatus, RawBlock, Record};

/// Combined issued timestamp as rendered by the lookup app,
/// e.g. `Jan 5, 2022 10:15 AM`.
const ISSUED_FORMAT: &str = "%b %d, %Y %I:%M %p";

/// Split each fragment on the first colon into `name: value`; a fragment
/// without a colon becomes a positional `Field{n}` fallback.
pub fn parse_block(block: &RawBlock) -> Vec<(String, String)> {
    block
        .0
        .iter()
        .enumerate()
        .map(|(i, fragment)| match fragment.split_once(':') {
            Some((name, value)) => (name.trim().to_string(), value.trim().to_string()),
            None => (format!("Field{}", i + 1), fragment.trim().to_string()),
        })
        .collect()
}

/// Derive payment state from the result pane's action button texts.
///
/// Two or more buttons mean both an appeal and a pay action are offered,
/// so the citation is unpaid. A single button is inspected by text.
pub fn check_payment(button_texts: &[String]) -> PaymentStatus {
    let mut status = PaymentStatus::default();
    match button_texts {
        [] => {}
        [only] => {
            let upper = only.to_uppercase();
            if upper.contains("APPEAL") {
                status.citation_text = Some(only.clone());
                status.unpaid = false;
            } else if upper.contains("PAY") {
                status.citation_text = None;
                status.unpaid = true;
            }
        }
        [first, ..] => {
            status.citation_text = Some(first.clone());
            status.unpaid = true;
        }
    }
    status
}

/// Merge parsed fragments and payment state into one record.
pub fn build_record(block: &RawBlock, payment: &PaymentStatus) -> Record {
    let mut record = Record::new(parse_block(block));
    record.set(
        "CitationText",
        payment.citation_text.clone().unwrap_or_default(),
    );
    record.set("Unpaid", if payment.unpaid { "true" } else { "false" });
    record
}

/// Officer number embedded in the citation id: the digits after `P`,
/// e.g. `P3-00042` derives `3`.
pub fn derive_officer(citation: &str) -> Option<String> {
    let rest = &citation[citation.find('P')? + 1..];
    let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        None
    } else {
        Some(digits)
    }
}

/// Numeric fine amount, stripping the currency symbol and thousands
/// separators.
pub fn derive_fine(raw: &str) -> Option<f64> {
    raw.replace(['$', ','], "").trim().parse().ok()
}

/// First whitespace-delimited segment of the plate/VIN field.
pub fn derive_residence(plate: &str) -> Option<&str> {
    plate.split_whitespace().next()
}

pub fn parse_issued(raw: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(raw.trim(), ISSUED_FORMAT).ok()
}

/// Split a combined issued timestamp into an ISO date and a 12-hour
/// clock string.
pub fn split_issued(raw: &str) -> Option<(String, String)> {
    let dt = parse_issued(raw)?;
    Some((
        dt.format("%Y-%m-%d").to_string(),
        dt.format("%I:%M %p").to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(fragments: &[&str]) -> RawBlock {
        RawBlock(fragments.iter().map(|s| s.to_string()).collect())
    }

    #[test]
    fn test_parse_block_splits_on_first_colon() {
        let fields = parse_block(&block(&[
            "Citation: P3-00042",
            "Fine: $125.00",
            "Issued: Jan 5, 2022 10:15 AM",
        ]));
        assert_eq!(
            fields,
            vec![
                ("Citation".to_string(), "P3-00042".to_string()),
                ("Fine".to_string(), "$125.00".to_string()),
                ("Issued".to_string(), "Jan 5, 2022 10:15 AM".to_string()),
            ]
        );
    }

    #[test]
    fn test_parse_block_positional_fallback() {
        let fields = parse_block(&block(&["UNPAID", "Fine: $10.00"]));
        assert_eq!(fields[0], ("Field1".to_string(), "UNPAID".to_string()));
        assert_eq!(fields[1], ("Fine".to_string(), "$10.00".to_string()));
    }

    #[test]
    fn test_check_payment_no_buttons() {
        let status = check_payment(&[]);
        assert_eq!(status.citation_text, None);
        assert!(!status.unpaid);
    }

    #[test]
    fn test_check_payment_two_buttons() {
        let status = check_payment(&["Appeal".to_string(), "Pay Now".to_string()]);
        assert_eq!(status.citation_text.as_deref(), Some("Appeal"));
        assert!(status.unpaid);
    }

    #[test]
    fn test_check_payment_single_appeal_button() {
        let status = check_payment(&["Appeal Citation".to_string()]);
        assert_eq!(status.citation_text.as_deref(), Some("Appeal Citation"));
        assert!(!status.unpaid);
    }

    #[test]
    fn test_check_payment_single_pay_button() {
        let status = check_payment(&["Pay Citation".to_string()]);
        assert_eq!(status.citation_text, None);
        assert!(status.unpaid);
    }

    #[test]
    fn test_build_record_merges_payment() {
        let record = build_record(
            &block(&["Citation: P3-00042"]),
            &PaymentStatus {
                citation_text: Some("Appeal".to_string()),
                unpaid: true,
            },
        );
        assert_eq!(record.get("Citation"), Some("P3-00042"));
        assert_eq!(record.get("CitationText"), Some("Appeal"));
        assert_eq!(record.get("Unpaid"), Some("true"));
    }

    #[test]
    fn test_derivations_round_trip() {
        assert_eq!(derive_officer("P3-00042").as_deref(), Some("3"));
        assert_eq!(derive_fine("$125.00"), Some(125.0));
        assert_eq!(derive_fine("$1,250.50"), Some(1250.5));
        assert_eq!(derive_residence("UT 1ABC234"), Some("UT"));

        let (date, time) = split_issued("Jan 5, 2022 10:15 AM").unwrap();
        assert_eq!(date, "2022-01-05");
        assert_eq!(time, "10:15 AM");
    }

    #[test]
    fn test_derivations_tolerate_garbage() {
        assert_eq!(derive_officer("no officer here"), None);
        assert_eq!(derive_fine("waived"), None);
        assert_eq!(derive_residence("   "), None);
        assert_eq!(split_issued("sometime last week"), None);
    }
}
