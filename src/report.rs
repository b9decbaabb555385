//! Read-only reports over the ledger.
//!
//! These build the data that external renderers lay out. Amounts stay in
//! minor units; presentation is the renderer's job.

use crate::error::ReportError;
use crate::ledger::LedgerReader;
use crate::model::{Donation, Payout, DONATION_HEADER, PAYOUT_HEADER};
use crate::money::Cents;
use chrono::{Months, NaiveDate};
use csv::WriterBuilder;
use log::debug;
use std::io::Write;

/// Payouts settled within one calendar month and their totals.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonthlyReport {
    pub start: NaiveDate,
    pub end: NaiveDate,
    /// First day of the following month, when the report is issued.
    pub issued: NaiveDate,
    pub gross: Cents,
    pub fee: Cents,
    pub net: Cents,
    pub payouts: Vec<Payout>,
}

/// One payout together with its donations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayoutReport {
    pub payout: Payout,
    pub donations: Vec<Donation>,
}

/// Returns the first and last day of a month.
pub fn month_range(year: i32, month: u32) -> Option<(NaiveDate, NaiveDate)> {
    let start = NaiveDate::from_ymd_opt(year, month, 1)?;
    let next = start.checked_add_months(Months::new(1))?;
    Some((start, next.pred_opt()?))
}

/// Builds the report for one month.
///
/// Fails with an empty-range error when no payout settled in the month.
pub fn monthly_report(
    reader: &dyn LedgerReader,
    year: i32,
    month: u32,
) -> Result<MonthlyReport, ReportError> {
    let (start, end) = month_range(year, month).ok_or(ReportError::InvalidMonth { year, month })?;
    let issued = end.succ_opt().ok_or(ReportError::InvalidMonth { year, month })?;

    let payouts = reader.get_payouts_by_date_range(start, end)?;
    let gross =
        Cents::checked_sum(payouts.iter().map(|p| p.gross)).ok_or(ReportError::TotalsOverflow)?;
    let fee =
        Cents::checked_sum(payouts.iter().map(|p| p.fee)).ok_or(ReportError::TotalsOverflow)?;
    let net =
        Cents::checked_sum(payouts.iter().map(|p| p.net)).ok_or(ReportError::TotalsOverflow)?;
    debug!(
        "Monthly report {}..{}: {} payouts, net {}",
        start,
        end,
        payouts.len(),
        net
    );

    Ok(MonthlyReport {
        start,
        end,
        issued,
        gross,
        fee,
        net,
        payouts,
    })
}

/// Builds the report for one payout.
pub fn payout_report(reader: &dyn LedgerReader, payout_id: &str) -> Result<PayoutReport, ReportError> {
    let payout = reader.get_payout_by_id(payout_id)?;
    let donations = reader.get_donations_by_payout_id(payout_id)?;
    Ok(PayoutReport { payout, donations })
}

/// Writes payouts as CSV with the ledger's header.
pub fn write_payouts<W: Write>(payouts: &[Payout], writer: W) -> Result<(), ReportError> {
    let mut csv_writer = WriterBuilder::new().has_headers(false).from_writer(writer);

    csv_writer.write_record(PAYOUT_HEADER)?;
    for payout in payouts {
        csv_writer.serialize(payout)?;
    }

    csv_writer.flush().map_err(csv::Error::from)?;
    Ok(())
}

impl MonthlyReport {
    /// Writes the month's payouts followed by a `total` row.
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<(), ReportError> {
        let mut csv_writer = WriterBuilder::new().has_headers(false).from_writer(writer);

        csv_writer.write_record(PAYOUT_HEADER)?;
        for payout in &self.payouts {
            csv_writer.serialize(payout)?;
        }
        csv_writer.write_record([
            "total".to_string(),
            String::new(),
            self.gross.to_string(),
            self.fee.to_string(),
            self.net.to_string(),
        ])?;

        csv_writer.flush().map_err(csv::Error::from)?;
        Ok(())
    }
}

impl PayoutReport {
    /// Writes the payout row, then its donations under their own header.
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<(), ReportError> {
        let mut csv_writer = WriterBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_writer(writer);

        csv_writer.write_record(PAYOUT_HEADER)?;
        csv_writer.serialize(&self.payout)?;
        csv_writer.write_record(DONATION_HEADER)?;
        for donation in &self.donations {
            csv_writer.serialize(donation)?;
        }

        csv_writer.flush().map_err(csv::Error::from)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LedgerError;
    use crate::ledger::MemoryLedger;
    use crate::model::ymd;

    fn payout(id: &str, created: &str, gross: i64, fee: i64) -> Payout {
        Payout::new(id, ymd::parse(created).unwrap(), Cents::new(gross), Cents::new(fee))
    }

    #[test]
    fn test_month_range() {
        let (start, end) = month_range(2024, 2).unwrap();
        assert_eq!(start.to_string(), "2024-02-01");
        assert_eq!(end.to_string(), "2024-02-29");

        let (_, end) = month_range(2025, 12).unwrap();
        assert_eq!(end.to_string(), "2025-12-31");

        assert!(month_range(2025, 13).is_none());
        assert!(month_range(2025, 0).is_none());
    }

    #[test]
    fn test_monthly_totals() {
        let ledger = MemoryLedger::with_rows(
            vec![
                payout("po_feb", "2025-02-28", 50, 1),
                payout("po_1", "2025-03-01", 100, 10),
                payout("po_2", "2025-03-31", 200, 20),
                payout("po_apr", "2025-04-01", 70, 2),
            ],
            Vec::new(),
        );

        let report = monthly_report(&ledger, 2025, 3).unwrap();
        assert_eq!(report.payouts.len(), 2);
        assert_eq!(report.gross, Cents::new(300));
        assert_eq!(report.fee, Cents::new(30));
        assert_eq!(report.net, Cents::new(270));
        assert_eq!(report.issued.to_string(), "2025-04-01");
    }

    #[test]
    fn test_monthly_report_without_payouts_is_an_error() {
        let ledger = MemoryLedger::new();

        let err = monthly_report(&ledger, 2025, 3).unwrap_err();
        assert!(matches!(err, ReportError::Ledger(LedgerError::EmptyRange { .. })));

        let err = monthly_report(&ledger, 2025, 13).unwrap_err();
        assert!(matches!(err, ReportError::InvalidMonth { year: 2025, month: 13 }));
    }

    #[test]
    fn test_monthly_csv() {
        let ledger =
            MemoryLedger::with_rows(vec![payout("po_1", "2025-03-14", 300, 6)], Vec::new());
        let report = monthly_report(&ledger, 2025, 3).unwrap();

        let mut output = Vec::new();
        report.write_csv(&mut output).unwrap();
        assert_eq!(
            String::from_utf8(output).unwrap(),
            "id,created,gross,fee,net\npo_1,2025-03-14,300,6,294\ntotal,,300,6,294\n"
        );
    }

    #[test]
    fn test_write_payouts_of_empty_ledger_keeps_header() {
        let mut output = Vec::new();
        write_payouts(&[], &mut output).unwrap();
        assert_eq!(String::from_utf8(output).unwrap(), "id,created,gross,fee,net\n");
    }

    #[test]
    fn test_payout_report_for_unknown_payout() {
        let ledger = MemoryLedger::new();
        let err = payout_report(&ledger, "po_x").unwrap_err();
        assert!(matches!(err, ReportError::Ledger(LedgerError::PayoutNotFound { .. })));
    }
}
