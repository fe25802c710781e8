/// Implementation of `qvd dump`.
///
/// Streams the rows of a QVD file and writes them to stdout or to
/// `-o <file>`. CSV and JSON are written row by row as they decode; the
/// aligned table is buffered so column widths can be computed.
///
/// # Output formats
///
/// ```text
/// ┌────────┬──────────────────────────────────────────────────────────────┐
/// │ Format │ Shape                                                        │
/// ├────────┼──────────────────────────────────────────────────────────────┤
/// │ table  │ Region  Amount          (default)                            │
/// │        │ ------  ------                                               │
/// │        │ North   10                                                   │
/// │ csv    │ Region,Amount  then one line per row, RFC 4180 quoting       │
/// │ json   │ [{"Region": "North", "Amount": 10}, ...]                     │
/// └────────┴──────────────────────────────────────────────────────────────┘
/// ```
///
/// In JSON, dual values become `{"number": .., "text": ..}` and nulls
/// become `null`. A field name that repeats an earlier one is keyed as
/// `name#ordinal` so no column is lost. The table and CSV forms print the
/// text form of a value.
use std::borrow::Cow;
use std::collections::HashSet;
use std::fs::File;
use std::io::{self, BufWriter, Write};

use anyhow::{Context, Result, anyhow};
use qvd_decoder::{DecoderConfig, DecoderEvent, QvdDecoder, RowErrorPolicy};
use qvd_types::{Row, SymbolValue, TableSchema};
use serde_json::{Map, Number, Value, json};

use crate::DumpArgs;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Format {
    Table,
    Csv,
    Json,
}

/// Run the `qvd dump` command.
///
/// # Errors
///
/// Returns an error if the format is unknown, the file cannot be opened,
/// the output cannot be written, or decoding fails fatally.
pub fn run(args: &DumpArgs, mut config: DecoderConfig) -> Result<()> {
    let format = parse_format(&args.format)?;
    if args.skip_bad_rows {
        config.row_error_policy = RowErrorPolicy::Skip;
    }
    let mut stream = QvdDecoder::stream_file(&args.file, config)?;

    let sink: Box<dyn Write> = match &args.output {
        Some(path) => Box::new(
            File::create(path).with_context(|| format!("cannot create {}", path.display()))?,
        ),
        None => Box::new(io::stdout().lock()),
    };
    let mut out = BufWriter::new(sink);

    let mut writer = None;
    let mut written = 0u64;
    let mut skipped = 0u64;

    while let Some(event) = stream.next_event() {
        match event {
            Ok(DecoderEvent::Header(schema)) => {
                let mut w = RowWriter::new(format, &schema);
                w.begin(&mut out)?;
                writer = Some(w);
            }
            Ok(DecoderEvent::SymbolTable { .. }) => {}
            Ok(DecoderEvent::Row(row)) => {
                if args.limit.is_some_and(|n| written >= n) {
                    break;
                }
                if let Some(w) = writer.as_mut() {
                    w.row(&mut out, &row)?;
                }
                written += 1;
            }
            Err(e) if e.is_row_local() && !stream.is_done() => skipped += 1,
            Err(e) => {
                return Err(e).with_context(|| format!("failed to decode {}", args.file.display()));
            }
        }
    }

    if let Some(w) = writer {
        w.finish(&mut out)?;
    }
    out.flush().context("cannot write output")?;

    if skipped > 0 {
        eprintln!("skipped {skipped} bad row{}", if skipped == 1 { "" } else { "s" });
    }
    Ok(())
}

// ── Flag parsers ──────────────────────────────────────────────────────────────

fn parse_format(s: &str) -> Result<Format> {
    match s.to_lowercase().as_str() {
        "table" => Ok(Format::Table),
        "csv" => Ok(Format::Csv),
        "json" => Ok(Format::Json),
        _ => Err(anyhow!("unknown format {s:?}, expected table|csv|json")),
    }
}

// ── Writers ───────────────────────────────────────────────────────────────────

/// Per-format output state between the header and the last row.
struct RowWriter {
    format: Format,
    names: Vec<String>,
    keys: Vec<String>,
    cells: Vec<Vec<String>>,
    rows: u64,
}

impl RowWriter {
    fn new(format: Format, schema: &TableSchema) -> Self {
        let names: Vec<String> = schema.fields.iter().map(|f| f.name.clone()).collect();
        Self {
            format,
            keys: json_keys(&names),
            names,
            cells: Vec::new(),
            rows: 0,
        }
    }

    fn begin(&mut self, out: &mut impl Write) -> Result<()> {
        match self.format {
            Format::Table => {}
            Format::Csv => {
                let line: Vec<Cow<'_, str>> = self.names.iter().map(|n| csv_field(n)).collect();
                writeln!(out, "{}", line.join(","))?;
            }
            Format::Json => out.write_all(b"[")?,
        }
        Ok(())
    }

    fn row(&mut self, out: &mut impl Write, row: &Row) -> Result<()> {
        match self.format {
            Format::Table => {
                self.cells.push(row.values.iter().map(ToString::to_string).collect());
            }
            Format::Csv => {
                let line: Vec<String> = row
                    .values
                    .iter()
                    .map(|v| csv_field(&v.to_string()).into_owned())
                    .collect();
                writeln!(out, "{}", line.join(","))?;
            }
            Format::Json => {
                let object: Map<String, Value> = self
                    .keys
                    .iter()
                    .cloned()
                    .zip(row.values.iter().map(json_value))
                    .collect();
                let sep = if self.rows == 0 { "\n  " } else { ",\n  " };
                out.write_all(sep.as_bytes())?;
                serde_json::to_writer(&mut *out, &Value::Object(object))?;
            }
        }
        self.rows += 1;
        Ok(())
    }

    fn finish(self, out: &mut impl Write) -> Result<()> {
        match self.format {
            Format::Table => out.write_all(render_table(&self.names, &self.cells).as_bytes())?,
            Format::Csv => {}
            Format::Json if self.rows == 0 => out.write_all(b"]\n")?,
            Format::Json => out.write_all(b"\n]\n")?,
        }
        Ok(())
    }
}

/// Left-aligned columns separated by two spaces, with a dashed rule under
/// the header. The last column is not padded.
fn render_table(names: &[String], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = names.iter().map(|n| n.chars().count()).collect();
    for row in rows {
        for (w, cell) in widths.iter_mut().zip(row) {
            *w = (*w).max(cell.chars().count());
        }
    }

    let rule: Vec<String> = widths.iter().map(|&w| "-".repeat(w)).collect();
    let mut out = table_line(names, &widths);
    out.push_str(&table_line(&rule, &widths));
    for row in rows {
        out.push_str(&table_line(row, &widths));
    }
    out
}

fn table_line(cells: &[String], widths: &[usize]) -> String {
    let padded: Vec<String> = cells
        .iter()
        .zip(widths)
        .map(|(cell, &w)| format!("{cell:<w$}"))
        .collect();
    let mut line = padded.join("  ").trim_end().to_string();
    line.push('\n');
    line
}

/// Object keys for JSON rows: the field names, with repeats made unique.
fn json_keys(names: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    names
        .iter()
        .enumerate()
        .map(|(i, name)| {
            if seen.insert(name.as_str()) {
                name.clone()
            } else {
                format!("{name}#{i}")
            }
        })
        .collect()
}

/// Quote a CSV field when it holds a delimiter, quote, or line break.
fn csv_field(s: &str) -> Cow<'_, str> {
    if s.contains([',', '"', '\n', '\r']) {
        Cow::Owned(format!("\"{}\"", s.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(s)
    }
}

fn json_number(n: f64) -> Value {
    Number::from_f64(n).map_or(Value::Null, Value::Number)
}

fn json_value(value: &SymbolValue) -> Value {
    match value {
        SymbolValue::Int(n) => json!(n),
        SymbolValue::Double(n) => json_number(*n),
        SymbolValue::Text(s) => Value::String(s.clone()),
        SymbolValue::DualInt { number, text } => json!({ "number": number, "text": text }),
        SymbolValue::DualDouble { number, text } => {
            json!({ "number": json_number(*number), "text": text })
        }
        SymbolValue::Null => Value::Null,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qvd_tests::sales_table;

    fn dump(format: Format) -> String {
        let table = QvdDecoder::decode(&sales_table().build()).unwrap();
        let mut out = Vec::new();
        let mut w = RowWriter::new(format, &table.schema);
        w.begin(&mut out).unwrap();
        for row in &table.rows {
            w.row(&mut out, row).unwrap();
        }
        w.finish(&mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn csv_quotes_only_when_needed() {
        assert_eq!(csv_field("North"), "North");
        assert_eq!(csv_field("1,25"), "\"1,25\"");
        assert_eq!(csv_field("say \"hi\""), "\"say \"\"hi\"\"\"");
        assert_eq!(csv_field("a\nb"), "\"a\nb\"");
    }

    #[test]
    fn json_keeps_both_forms_of_duals() {
        assert_eq!(json_value(&SymbolValue::Int(10)), json!(10));
        assert_eq!(json_value(&SymbolValue::Double(f64::NAN)), Value::Null);
        assert_eq!(json_value(&SymbolValue::Null), Value::Null);
        assert_eq!(
            json_value(&SymbolValue::DualDouble {
                number: 1.25,
                text: "1,25".into()
            }),
            json!({ "number": 1.25, "text": "1,25" })
        );
    }

    #[test]
    fn table_format_aligns_columns() {
        assert_eq!(
            dump(Format::Table),
            "Region  Amount\n------  ------\nNorth   10\nWest    seven\nSouth   1,25\n"
        );
    }

    #[test]
    fn csv_format() {
        assert_eq!(
            dump(Format::Csv),
            "Region,Amount\nNorth,10\nWest,seven\nSouth,\"1,25\"\n"
        );
    }

    #[test]
    fn json_format_parses_back() {
        let parsed: Value = serde_json::from_str(&dump(Format::Json)).unwrap();
        assert_eq!(
            parsed,
            json!([
                { "Region": "North", "Amount": 10 },
                { "Region": "West", "Amount": { "number": 7, "text": "seven" } },
                { "Region": "South", "Amount": { "number": 1.25, "text": "1,25" } },
            ])
        );
    }

    #[test]
    fn repeated_field_names_keep_every_column() {
        let names: Vec<String> = ["id", "name", "id"].map(String::from).to_vec();
        assert_eq!(json_keys(&names), vec!["id", "name", "id#2"]);
    }

    #[test]
    fn unknown_format_is_rejected() {
        assert_eq!(parse_format("CSV").unwrap(), Format::Csv);
        assert!(parse_format("xml").is_err());
    }
}
