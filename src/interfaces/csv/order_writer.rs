use crate::domain::merchant::PaymentMethodKind;
use crate::domain::order::OrderStatus;
use crate::error::Result;
use rust_decimal::Decimal;
use serde::Serialize;
use std::io::Write;

/// One line of the settlement report.
///
/// `order` is the caller's label for the order, not necessarily its id;
/// the scenario runner reports orders under their scenario keys.
#[derive(Debug, Clone, Serialize)]
pub struct OrderReportRow {
    pub order: String,
    pub customer: String,
    pub phone: String,
    pub method: PaymentMethodKind,
    pub total: Decimal,
    pub status: OrderStatus,
}

/// Writes the settlement report as CSV.
pub struct OrderReportWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> OrderReportWriter<W> {
    /// Creates a new `OrderReportWriter` targeting any `Write` sink.
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(sink),
        }
    }

    /// Serializes all rows and flushes the sink.
    pub fn write_orders(&mut self, rows: Vec<OrderReportRow>) -> Result<()> {
        for row in rows {
            self.writer.serialize(row)?;
        }
        self.writer.flush()?;
        Ok(())
    }
}
