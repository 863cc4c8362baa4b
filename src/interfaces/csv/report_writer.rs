use crate::domain::booking::Booking;
use crate::domain::transaction::Transaction;
use crate::error::Result;
use serde::Serialize;
use std::io::Write;

#[derive(Serialize)]
struct BookingRow {
    booking: u64,
    request: u64,
    client: u64,
    provider: Option<u64>,
    status: &'static str,
    amount_fee: String,
    total_amount: String,
    transaction: Option<u64>,
}

impl From<&Booking> for BookingRow {
    fn from(booking: &Booking) -> Self {
        Self {
            booking: booking.id().0,
            request: booking.request().0,
            client: booking.client().0,
            provider: booking.provider().map(|p| p.0),
            status: booking.status().label(),
            amount_fee: booking.amount_fee().to_string(),
            total_amount: booking.total_amount().to_string(),
            transaction: booking.transaction().map(|t| t.0),
        }
    }
}

#[derive(Serialize)]
struct TransactionRow {
    transaction: u64,
    booking: u64,
    provider: u64,
    client: u64,
    total_amount: String,
    commission_rate: String,
    commission_amount: String,
    provider_payout: String,
    payout_status: &'static str,
}

impl From<&Transaction> for TransactionRow {
    fn from(tx: &Transaction) -> Self {
        Self {
            transaction: tx.id().0,
            booking: tx.booking().0,
            provider: tx.provider().0,
            client: tx.client().0,
            total_amount: tx.total_amount().to_string(),
            commission_rate: tx.commission_rate().percent().to_string(),
            commission_amount: tx.commission_amount().to_string(),
            provider_payout: tx.provider_payout().to_string(),
            payout_status: tx.payout_status().label(),
        }
    }
}

/// Writes booking and transaction reports as CSV.
pub struct ReportWriter<W: Write> {
    sink: W,
}

impl<W: Write> ReportWriter<W> {
    pub fn new(sink: W) -> Self {
        Self { sink }
    }

    pub fn write_bookings(&mut self, bookings: &[Booking]) -> Result<()> {
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(&mut self.sink);
        writer.write_record([
            "booking",
            "request",
            "client",
            "provider",
            "status",
            "amount_fee",
            "total_amount",
            "transaction",
        ])?;
        for booking in bookings {
            writer.serialize(BookingRow::from(booking))?;
        }
        writer.flush()?;
        Ok(())
    }

    pub fn write_transactions(&mut self, transactions: &[Transaction]) -> Result<()> {
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(&mut self.sink);
        writer.write_record([
            "transaction",
            "booking",
            "provider",
            "client",
            "total_amount",
            "commission_rate",
            "commission_amount",
            "provider_payout",
            "payout_status",
        ])?;
        for tx in transactions {
            writer.serialize(TransactionRow::from(tx))?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Both reports, separated by an empty line.
    pub fn write_reports(
        &mut self,
        bookings: &[Booking],
        transactions: &[Transaction],
    ) -> Result<()> {
        self.write_bookings(bookings)?;
        writeln!(self.sink)?;
        self.write_transactions(transactions)
    }
}
