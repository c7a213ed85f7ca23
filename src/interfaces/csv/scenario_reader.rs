use crate::domain::merchant::PaymentMethodKind;
use crate::error::{PaymentError, Result};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::io::Read;

/// What a scenario row asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScenarioRowType {
    /// Adds a line item to the order named by the `order` column.
    Item,
    /// Confirms payment for the order named by the `order` column.
    Confirm,
}

/// One row of a scenario file.
///
/// Header: `type, order, customer, phone, method, item, quantity, price`.
/// The `order` column is a scenario-local key, not an order id: item rows
/// with the same key accumulate into one order, which is placed when the
/// scenario first confirms it or when the replay ends. Customer, phone and
/// method are taken from the key's first item row.
#[derive(Debug, Clone, Deserialize)]
pub struct ScenarioRow {
    pub r#type: ScenarioRowType,
    pub order: String,
    #[serde(default)]
    pub customer: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub method: Option<PaymentMethodKind>,
    #[serde(default)]
    pub item: Option<String>,
    #[serde(default)]
    pub quantity: Option<u32>,
    #[serde(default)]
    pub price: Option<Decimal>,
}

/// Reads scenario rows from a CSV source.
///
/// Wraps `csv::Reader` and provides an iterator over `Result<ScenarioRow>`,
/// with whitespace trimming and flexible record lengths.
pub struct ScenarioReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> ScenarioReader<R> {
    /// Creates a new `ScenarioReader` from any `Read` source (e.g., File, Stdin).
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    /// Returns an iterator that lazily reads and deserializes rows.
    pub fn rows(self) -> impl Iterator<Item = Result<ScenarioRow>> {
        self.reader
            .into_deserialize()
            .map(|result| result.map_err(PaymentError::from))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_reader_valid_stream() {
        let data = "type, order, customer, phone, method, item, quantity, price\n\
                    item, A, John Doe, 255712345678, mobile, Mug, 2, 8000\n\
                    confirm, A, , , , , ,";
        let reader = ScenarioReader::new(data.as_bytes());
        let rows: Vec<Result<ScenarioRow>> = reader.rows().collect();

        assert_eq!(rows.len(), 2);
        let item = rows[0].as_ref().unwrap();
        assert_eq!(item.r#type, ScenarioRowType::Item);
        assert_eq!(item.order, "A");
        assert_eq!(item.customer.as_deref(), Some("John Doe"));
        assert_eq!(item.method, Some(PaymentMethodKind::Mobile));
        assert_eq!(item.quantity, Some(2));
        assert_eq!(item.price, Some(dec!(8000)));

        let confirm = rows[1].as_ref().unwrap();
        assert_eq!(confirm.r#type, ScenarioRowType::Confirm);
        assert_eq!(confirm.order, "A");
        assert_eq!(confirm.item, None);
        assert_eq!(confirm.price, None);
    }

    #[test]
    fn test_reader_malformed_row() {
        let data = "type, order, customer, phone, method, item, quantity, price\n\
                    charge, A, , , , , ,";
        let reader = ScenarioReader::new(data.as_bytes());
        let rows: Vec<Result<ScenarioRow>> = reader.rows().collect();

        assert!(rows[0].is_err());
    }

    #[test]
    fn test_reader_bad_quantity() {
        let data = "type, order, customer, phone, method, item, quantity, price\n\
                    item, A, John Doe, 255712345678, mobile, Mug, two, 8000";
        let reader = ScenarioReader::new(data.as_bytes());
        let rows: Vec<Result<ScenarioRow>> = reader.rows().collect();

        assert!(rows[0].is_err());
    }
}
