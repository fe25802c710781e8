/// Implementation of `qvd inspect`.
///
/// Pulls the header and symbol table events from a streaming decoder and
/// stops there, so the row section is never read.
///
/// # Output format
///
/// ```text
/// Table:    Sales
/// Creator:  sales.qvw (build 50668, 2024-01-02 03:04:05)
/// Records:  3 declared, 1 byte each
/// Fields:   2
///
///   #  Name    Bits  Width  Bias  Symbols  Tags
///   0  Region  0..2      2     0        4  $text
///   1  Amount  2..4      2     0        4  $numeric
///      [0] 10
///      [1] 2.5
/// ```
use anyhow::{Context, Result};
use qvd_decoder::{DecoderConfig, DecoderEvent, QvdDecoder};
use qvd_types::{SymbolTable, SymbolValue, TableSchema};
use serde::Serialize;

use crate::InspectArgs;

/// JSON form of the report (`--json`).
#[derive(Serialize)]
struct Report<'a> {
    table: &'a str,
    creator_doc: Option<&'a str>,
    build_no: Option<&'a str>,
    create_utc_time: Option<&'a str>,
    record_count: Option<u64>,
    record_byte_size: usize,
    fields: Vec<FieldReport<'a>>,
}

#[derive(Serialize)]
struct FieldReport<'a> {
    name: &'a str,
    bit_offset: u32,
    bit_width: u32,
    bias: i32,
    symbol_count: u32,
    tags: &'a [String],
    symbols: Vec<String>,
}

/// Run the `qvd inspect` command.
///
/// # Errors
///
/// Returns an error if the file cannot be opened or the header or a
/// symbol table fails to decode.
pub fn run(args: &InspectArgs, config: DecoderConfig) -> Result<()> {
    let mut stream = QvdDecoder::stream_file(&args.file, config)?;
    let mut schema = None;
    let mut tables = Vec::new();

    while let Some(event) = stream.next_event() {
        match event.with_context(|| format!("failed to decode {}", args.file.display()))? {
            DecoderEvent::Header(s) => schema = Some(s),
            DecoderEvent::SymbolTable { table, .. } => tables.push(table),
            DecoderEvent::Row(_) => break,
        }
        if schema.as_ref().is_some_and(|s| tables.len() == s.fields.len()) {
            break;
        }
    }
    let schema = schema.context("file ended before the header")?;

    if args.json {
        let report = build_report(&schema, &tables, args.symbols);
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_text(&schema, &tables, args.symbols);
    }
    Ok(())
}

fn build_report<'a>(
    schema: &'a TableSchema,
    tables: &[std::sync::Arc<SymbolTable>],
    limit: usize,
) -> Report<'a> {
    Report {
        table: &schema.table_name,
        creator_doc: schema.creator_doc.as_deref(),
        build_no: schema.build_no.as_deref(),
        create_utc_time: schema.create_utc_time.as_deref(),
        record_count: schema.record_count,
        record_byte_size: schema.row_byte_size(),
        fields: schema
            .fields
            .iter()
            .zip(tables)
            .map(|(field, table)| FieldReport {
                name: &field.name,
                bit_offset: field.bit_offset,
                bit_width: field.bit_width,
                bias: field.bias,
                symbol_count: field.symbol_count,
                tags: &field.tags,
                symbols: table.iter().take(limit).map(ToString::to_string).collect(),
            })
            .collect(),
    }
}

fn print_text(schema: &TableSchema, tables: &[std::sync::Arc<SymbolTable>], limit: usize) {
    println!("Table:    {}", schema.table_name);
    if let Some(doc) = &schema.creator_doc {
        let build = schema.build_no.as_deref().unwrap_or("?");
        let created = schema.create_utc_time.as_deref().unwrap_or("?");
        println!("Creator:  {doc} (build {build}, {created})");
    }
    let size = schema.row_byte_size();
    match schema.record_count {
        Some(n) => println!("Records:  {n} declared, {size} byte{} each", plural(size)),
        None => println!("Records:  not declared, {size} byte{} each", plural(size)),
    }
    println!("Fields:   {}", schema.fields.len());
    if schema.fields.is_empty() {
        return;
    }

    let name_width = schema
        .fields
        .iter()
        .map(|f| f.name.chars().count())
        .max()
        .unwrap_or(0)
        .max(4);
    println!();
    println!(
        "  {:>3}  {:<name_width$}  {:<9} {:>5}  {:>5}  {:>7}  Tags",
        "#", "Name", "Bits", "Width", "Bias", "Symbols"
    );
    for (i, field) in schema.fields.iter().enumerate() {
        let bits = format!("{}..{}", field.bit_offset, field.bit_offset + field.bit_width);
        println!(
            "  {i:>3}  {:<name_width$}  {bits:<9} {:>5}  {:>5}  {:>7}  {}",
            field.name,
            field.bit_width,
            field.bias,
            field.symbol_count,
            field.tags.join(" ")
        );
        if let Some(table) = tables.get(i) {
            for (j, symbol) in table.iter().take(limit).enumerate() {
                println!("       [{j}] {}", describe(symbol));
            }
        }
    }
}

/// Symbol with its storage kind made visible, e.g. `7 "seven"` for a dual.
fn describe(symbol: &SymbolValue) -> String {
    match symbol {
        SymbolValue::Int(n) => n.to_string(),
        SymbolValue::Double(d) => d.to_string(),
        SymbolValue::Text(s) => format!("{s:?}"),
        SymbolValue::DualInt { number, text } => format!("{number} {text:?}"),
        SymbolValue::DualDouble { number, text } => format!("{number} {text:?}"),
        SymbolValue::Null => "null".to_string(),
    }
}

fn plural(n: usize) -> &'static str {
    if n == 1 { "" } else { "s" }
}
