/// Implementation of `qvd validate`.
///
/// Runs a full decode and prints either a series of success checkmarks
/// (`✓`) or a single diagnostic line (`✗`). The main dispatcher turns the
/// returned `Err` into exit code 1.
///
/// # Success output
///
/// ```text
/// ✓ Header: table "Sales", 2 fields, 1-byte rows
/// ✓ Symbols: 8 symbols across 2 fields
/// ✓ Rows: 3 rows decoded (matches NoOfRecords)
/// ```
///
/// # Failure output
///
/// ```text
/// ✗ Error: row 1: field "Amount" index 9 outside 0..4 (check BitOffset/BitWidth/Bias)
/// ```
use anyhow::{Result, anyhow};
use qvd_decoder::{DecodeError, DecodedTable, DecoderConfig, QvdDecoder};

use crate::ValidateArgs;

/// Run the `qvd validate` command.
///
/// # Errors
///
/// Returns an error if the file cannot be opened or fails any structural
/// check.
pub fn run(args: &ValidateArgs, config: DecoderConfig) -> Result<()> {
    match QvdDecoder::open_with_config(&args.file, config) {
        Ok(table) => {
            for line in report(&table) {
                println!("{line}");
            }
            Ok(())
        }
        Err(e) => {
            println!("✗ Error: {}", diagnostic(&e));
            Err(anyhow!("validation failed"))
        }
    }
}

fn report(table: &DecodedTable) -> Vec<String> {
    let schema = &table.schema;
    let symbols: usize = table.symbol_tables.iter().map(|t| t.len()).sum();
    let rows = table.rows.len();
    let count_note = if schema.record_count.is_some() {
        " (matches NoOfRecords)"
    } else {
        ""
    };

    vec![
        format!(
            "✓ Header: table {:?}, {} field{}, {}-byte rows",
            schema.table_name,
            schema.fields.len(),
            plural(schema.fields.len()),
            schema.row_byte_size()
        ),
        format!(
            "✓ Symbols: {symbols} symbol{} across {} field{}",
            plural(symbols),
            table.symbol_tables.len(),
            plural(table.symbol_tables.len())
        ),
        format!("✓ Rows: {rows} row{} decoded{count_note}", plural(rows)),
    ]
}

// ── Error formatting ──────────────────────────────────────────────────────────

/// Error text plus a hint at the likely cause.
///
/// ```text
/// ┌──────────────────────────┬──────────────────────────────────────────┐
/// │ DecodeError variant      │ Hint                                     │
/// ├──────────────────────────┼──────────────────────────────────────────┤
/// │ UnknownSymbolTag         │ symbol table misaligned or corrupt       │
/// │ SymbolSectionMismatch    │ NoOfSymbols or Offset/Length are wrong   │
/// │ SymbolIndexOutOfRange    │ check BitOffset/BitWidth/Bias            │
/// │ TruncatedRow             │ file cut short or RecordByteSize wrong   │
/// │ anything else            │ none                                     │
/// └──────────────────────────┴──────────────────────────────────────────┘
/// ```
fn diagnostic(e: &DecodeError) -> String {
    let hint = match e {
        DecodeError::UnknownSymbolTag { .. } => Some("symbol table misaligned or corrupt"),
        DecodeError::SymbolSectionMismatch { .. } => Some("NoOfSymbols or Offset/Length are wrong"),
        DecodeError::SymbolIndexOutOfRange { .. } => Some("check BitOffset/BitWidth/Bias"),
        DecodeError::TruncatedRow { .. } => Some("file cut short or RecordByteSize wrong"),
        _ => None,
    };
    match hint {
        Some(hint) => format!("{e} ({hint})"),
        None => e.to_string(),
    }
}

fn plural(n: usize) -> &'static str {
    if n == 1 { "" } else { "s" }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qvd_tests::sales_table;

    #[test]
    fn report_for_valid_table() {
        let table = QvdDecoder::decode(&sales_table().build()).unwrap();
        assert_eq!(
            report(&table),
            vec![
                "✓ Header: table \"Sales\", 2 fields, 1-byte rows",
                "✓ Symbols: 8 symbols across 2 fields",
                "✓ Rows: 3 rows decoded (matches NoOfRecords)",
            ]
        );
    }

    #[test]
    fn diagnostic_adds_hint() {
        let e = DecodeError::SymbolIndexOutOfRange {
            row: 1,
            field: "Amount".into(),
            index: 9,
            symbols: 4,
        };
        assert_eq!(
            diagnostic(&e),
            "row 1: field \"Amount\" index 9 outside 0..4 (check BitOffset/BitWidth/Bias)"
        );
        let plain = DecodeError::RowCountMismatch {
            declared: 2,
            actual: 3,
        };
        assert_eq!(diagnostic(&plain), "header declares 2 rows, stream holds 3");
    }
}
