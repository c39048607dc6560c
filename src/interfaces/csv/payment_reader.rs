use crate::application::payments::IncomingPayment;
use crate::domain::money::Amount;
use crate::error::{PaymentError, Result};
use serde::Deserialize;
use std::io::Read;
use uuid::Uuid;

/// One line of a payments batch: `business, loan, user, reference, amount`.
#[derive(Debug, Deserialize, PartialEq, Clone)]
pub struct PaymentRow {
    pub business: Uuid,
    pub loan: Uuid,
    pub user: Uuid,
    pub reference: String,
    pub amount: Amount,
}

impl From<PaymentRow> for IncomingPayment {
    fn from(row: PaymentRow) -> Self {
        IncomingPayment {
            business_id: row.business,
            loan_id: row.loan,
            user_id: row.user,
            amount: row.amount,
            transaction_id: row.reference,
        }
    }
}

/// Reads manual payments from a CSV source.
///
/// Whitespace is trimmed and record lengths are flexible, so hand-edited files load.
pub struct PaymentReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> PaymentReader<R> {
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    /// Lazily deserializes payments; a bad row yields an error without ending the stream.
    pub fn payments(self) -> impl Iterator<Item = Result<IncomingPayment>> {
        self.reader
            .into_deserialize::<PaymentRow>()
            .map(|result| result.map(IncomingPayment::from).map_err(PaymentError::from))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    const BUSINESS: &str = "6f1c2d4e-0000-4000-8000-000000000001";
    const LOAN: &str = "6f1c2d4e-0000-4000-8000-000000000002";
    const USER: &str = "6f1c2d4e-0000-4000-8000-000000000003";

    #[test]
    fn test_reader_valid_stream() {
        let data = format!(
            "business, loan, user, reference, amount\n\
             {BUSINESS}, {LOAN}, {USER}, ref-1, 1000\n\
             {BUSINESS}, {LOAN}, {USER}, ref-2, 250.50\n"
        );
        let results: Vec<Result<IncomingPayment>> =
            PaymentReader::new(data.as_bytes()).payments().collect();

        assert_eq!(results.len(), 2);
        let first = results[0].as_ref().unwrap();
        assert_eq!(first.loan_id, Uuid::parse_str(LOAN).unwrap());
        assert_eq!(first.transaction_id, "ref-1");
        assert_eq!(first.amount.value(), dec!(1000));
        assert_eq!(results[1].as_ref().unwrap().amount.value(), dec!(250.50));
    }

    #[test]
    fn test_reader_rejects_bad_rows_individually() {
        let data = format!(
            "business, loan, user, reference, amount\n\
             {BUSINESS}, not-a-uuid, {USER}, ref-1, 10\n\
             {BUSINESS}, {LOAN}, {USER}, ref-2, -5\n\
             {BUSINESS}, {LOAN}, {USER}, ref-3, 5\n"
        );
        let results: Vec<Result<IncomingPayment>> =
            PaymentReader::new(data.as_bytes()).payments().collect();

        assert_eq!(results.len(), 3);
        assert!(results[0].is_err());
        assert!(results[1].is_err());
        assert!(results[2].is_ok());
    }
}
