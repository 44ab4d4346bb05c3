//! Spreadsheet export of query results.
//!
//! CSV files start with a UTF-8 byte-order mark so spreadsheet programs
//! pick the right encoding for the Chinese headers.

use std::io::Write;
use std::path::Path;

use rust_xlsxwriter::{Format, Workbook, XlsxError};
use tracing::info;

use crate::domain::{SeatClass, Ticket};
use crate::transfer::TransferPlan;

const BOM: &[u8] = b"\xEF\xBB\xBF";

/// Worksheet name for ticket exports.
pub const SHEET_NAME: &str = "车票信息";

const TICKET_COLUMNS: [&str; 7] = ["车次", "出发站", "到达站", "出发时间", "到达时间", "历时", "日期"];

const TRANSFER_COLUMNS: [&str; 15] = [
    "序号",
    "中转站",
    "跨站换乘",
    "第一程车次",
    "第一程出发站",
    "第一程出发时间",
    "第一程到达站",
    "第一程到达时间",
    "换乘时间",
    "第二程车次",
    "第二程出发站",
    "第二程出发时间",
    "第二程到达站",
    "第二程到达时间",
    "总历时",
];

/// Errors from exporting.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("nothing to export")]
    Empty,

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("XLSX error: {0}")]
    Xlsx(#[from] XlsxError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Header row: fixed columns, then one column per seat class.
pub fn ticket_headers() -> Vec<&'static str> {
    TICKET_COLUMNS
        .into_iter()
        .chain(SeatClass::ALL.iter().map(|c| c.label()))
        .collect()
}

fn ticket_row(ticket: &Ticket) -> Vec<String> {
    let mut row = vec![
        ticket.train_number.to_string(),
        ticket.from_name.clone(),
        ticket.to_name.clone(),
        ticket.depart_time.clone(),
        ticket.arrive_time.clone(),
        ticket.duration.clone(),
        ticket.date.format("%Y-%m-%d").to_string(),
    ];
    row.extend(SeatClass::ALL.iter().map(|c| ticket.seat(*c).to_string()));
    row
}

fn transfer_row(index: usize, plan: &TransferPlan) -> Vec<String> {
    vec![
        (index + 1).to_string(),
        plan.hub_name.clone(),
        if plan.cross_station { "是" } else { "否" }.to_string(),
        plan.first.train_number.to_string(),
        plan.first.from_name.clone(),
        plan.first.depart_time.clone(),
        plan.first.to_name.clone(),
        plan.first.arrive_time.clone(),
        plan.layover.to_string(),
        plan.second.train_number.to_string(),
        plan.second.from_name.clone(),
        plan.second.depart_time.clone(),
        plan.second.to_name.clone(),
        plan.second.arrive_time.clone(),
        plan.total.to_string(),
    ]
}

/// Write tickets as CSV (with BOM).
pub fn write_csv<W: Write>(mut writer: W, tickets: &[Ticket]) -> Result<(), ExportError> {
    if tickets.is_empty() {
        return Err(ExportError::Empty);
    }
    writer.write_all(BOM)?;

    let mut csv = csv::Writer::from_writer(writer);
    csv.write_record(ticket_headers())?;
    for ticket in tickets {
        csv.write_record(ticket_row(ticket))?;
    }
    csv.flush()?;
    Ok(())
}

/// Tickets as CSV bytes (with BOM).
pub fn csv_bytes(tickets: &[Ticket]) -> Result<Vec<u8>, ExportError> {
    let mut buf = Vec::new();
    write_csv(&mut buf, tickets)?;
    Ok(buf)
}

/// Write transfer plans as CSV (with BOM), both legs on one row.
pub fn write_transfers_csv<W: Write>(
    mut writer: W,
    plans: &[TransferPlan],
) -> Result<(), ExportError> {
    if plans.is_empty() {
        return Err(ExportError::Empty);
    }
    writer.write_all(BOM)?;

    let mut csv = csv::Writer::from_writer(writer);
    csv.write_record(TRANSFER_COLUMNS)?;
    for (i, plan) in plans.iter().enumerate() {
        csv.write_record(transfer_row(i, plan))?;
    }
    csv.flush()?;
    Ok(())
}

pub fn transfers_csv_bytes(plans: &[TransferPlan]) -> Result<Vec<u8>, ExportError> {
    let mut buf = Vec::new();
    write_transfers_csv(&mut buf, plans)?;
    Ok(buf)
}

fn ticket_workbook(tickets: &[Ticket]) -> Result<Workbook, ExportError> {
    if tickets.is_empty() {
        return Err(ExportError::Empty);
    }

    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.set_name(SHEET_NAME)?;

    let bold = Format::new().set_bold();
    for (col, header) in ticket_headers().into_iter().enumerate() {
        sheet.write_string_with_format(0, col as u16, header, &bold)?;
    }
    for (i, ticket) in tickets.iter().enumerate() {
        let row = i as u32 + 1;
        for (col, value) in ticket_row(ticket).iter().enumerate() {
            sheet.write_string(row, col as u16, value)?;
        }
    }
    sheet.set_column_width(0, 10.0)?;
    sheet.set_column_width(1, 12.0)?;
    sheet.set_column_width(2, 12.0)?;

    Ok(workbook)
}

/// Write tickets to an XLSX file.
pub fn write_xlsx(path: &Path, tickets: &[Ticket]) -> Result<(), ExportError> {
    let mut workbook = ticket_workbook(tickets)?;
    workbook.save(path)?;
    info!(rows = tickets.len(), path = %path.display(), "exported tickets to XLSX");
    Ok(())
}

/// Tickets as XLSX bytes.
pub fn xlsx_bytes(tickets: &[Ticket]) -> Result<Vec<u8>, ExportError> {
    let mut workbook = ticket_workbook(tickets)?;
    Ok(workbook.save_to_buffer()?)
}

/// Write tickets to a file, picking the format from the extension
/// (`.xlsx`, otherwise CSV).
pub fn export_tickets(path: &Path, tickets: &[Ticket]) -> Result<(), ExportError> {
    let is_xlsx = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("xlsx"));
    if is_xlsx {
        return write_xlsx(path, tickets);
    }

    if tickets.is_empty() {
        return Err(ExportError::Empty);
    }
    let file = std::fs::File::create(path)?;
    write_csv(std::io::BufWriter::new(file), tickets)?;
    info!(rows = tickets.len(), path = %path.display(), "exported tickets to CSV");
    Ok(())
}
