//! Byte-level fixture builder for decoder tests and benches.
//!
//! The workspace has no encoder, so tests assemble files here: an XML
//! header, the padding real writers leave after it, the tagged symbol
//! tables, then LSB-first bit-packed rows.
//!
//! ```text
//!   <?xml ...?><QvdTableHeader> ... </QvdTableHeader>  ← header_xml()
//!   \r\n\0                                             ← padding
//!   [field 0 symbols][field 1 symbols] ...             ← symbol_bytes()
//!   [row 0][row 1] ...                                 ← row_bytes()
//! ```
//!
//! Everything is deliberately permissive: a builder can describe corrupt
//! files (unknown tags, lying counts, short rows) as easily as valid ones.

use std::fmt::Write as _;

/// One symbol as it will be written to the file.
#[derive(Clone, Debug, PartialEq)]
pub enum Symbol {
    Int(i32),
    Double(f64),
    Text(String),
    DualInt(i32, String),
    DualDouble(f64, String),
    /// Written as-is, tag byte included.
    Raw(Vec<u8>),
}

impl Symbol {
    pub fn text(s: &str) -> Self {
        Self::Text(s.to_string())
    }

    /// Append the tagged encoding to `out`.
    pub fn encode(&self, out: &mut Vec<u8>) {
        match self {
            Self::Int(n) => {
                out.push(0x01);
                out.extend_from_slice(&n.to_le_bytes());
            }
            Self::Double(d) => {
                out.push(0x02);
                out.extend_from_slice(&d.to_le_bytes());
            }
            Self::Text(s) => {
                out.push(0x04);
                push_cstr(out, s);
            }
            Self::DualInt(n, s) => {
                out.push(0x05);
                out.extend_from_slice(&n.to_le_bytes());
                push_cstr(out, s);
            }
            Self::DualDouble(d, s) => {
                out.push(0x06);
                out.extend_from_slice(&d.to_le_bytes());
                push_cstr(out, s);
            }
            Self::Raw(bytes) => out.extend_from_slice(bytes),
        }
    }
}

fn push_cstr(out: &mut Vec<u8>, s: &str) {
    out.extend_from_slice(s.as_bytes());
    out.push(0);
}

/// A column: its dictionary and how its index is packed.
#[derive(Clone, Debug)]
pub struct FieldSpec {
    pub name: String,
    pub symbols: Vec<Symbol>,
    /// Index width; `None` picks the narrowest width that fits every symbol.
    pub bit_width: Option<u32>,
    pub bias: i32,
    /// `NoOfSymbols` to declare; `None` declares `symbols.len()`.
    pub declared_symbols: Option<u32>,
    /// Emit per-field `Offset`/`Length` elements.
    pub declare_range: bool,
}

impl FieldSpec {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            symbols: Vec::new(),
            bit_width: None,
            bias: 0,
            declared_symbols: None,
            declare_range: true,
        }
    }

    #[must_use]
    pub fn symbol(mut self, symbol: Symbol) -> Self {
        self.symbols.push(symbol);
        self
    }

    #[must_use]
    pub fn symbols(mut self, symbols: impl IntoIterator<Item = Symbol>) -> Self {
        self.symbols.extend(symbols);
        self
    }

    #[must_use]
    pub fn bit_width(mut self, width: u32) -> Self {
        self.bit_width = Some(width);
        self
    }

    #[must_use]
    pub fn bias(mut self, bias: i32) -> Self {
        self.bias = bias;
        self
    }

    #[must_use]
    pub fn declare_symbols(mut self, count: u32) -> Self {
        self.declared_symbols = Some(count);
        self
    }

    #[must_use]
    pub fn without_range(mut self) -> Self {
        self.declare_range = false;
        self
    }

    /// Width actually written to the header.
    pub fn width(&self) -> u32 {
        self.bit_width.unwrap_or_else(|| bits_for(self.symbols.len()))
    }

    fn symbol_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        for symbol in &self.symbols {
            symbol.encode(&mut out);
        }
        out
    }
}

/// Narrowest width that can index `count` symbols. One symbol needs no bits.
pub fn bits_for(count: usize) -> u32 {
    if count <= 1 {
        0
    } else {
        usize::BITS - (count - 1).leading_zeros()
    }
}

/// Builds a complete file in memory.
///
/// Rows hold raw (pre-bias) indices, one per field, packed at consecutive
/// bit offsets in field order.
#[derive(Clone, Debug)]
pub struct QvdBuilder {
    table_name: String,
    fields: Vec<FieldSpec>,
    rows: Vec<Vec<u64>>,
    padding: Vec<u8>,
    record_byte_size: Option<usize>,
    declared_records: Option<Option<u64>>,
    trailing: Vec<u8>,
}

impl QvdBuilder {
    pub fn new(table_name: &str) -> Self {
        Self {
            table_name: table_name.to_string(),
            fields: Vec::new(),
            rows: Vec::new(),
            padding: b"\r\n\0".to_vec(),
            record_byte_size: None,
            declared_records: None,
            trailing: Vec::new(),
        }
    }

    #[must_use]
    pub fn field(mut self, field: FieldSpec) -> Self {
        self.fields.push(field);
        self
    }

    #[must_use]
    pub fn row(mut self, indices: &[u64]) -> Self {
        self.rows.push(indices.to_vec());
        self
    }

    #[must_use]
    pub fn rows<I: IntoIterator<Item = Vec<u64>>>(mut self, rows: I) -> Self {
        self.rows.extend(rows);
        self
    }

    /// Bytes between `</QvdTableHeader>` and the first symbol.
    #[must_use]
    pub fn padding(mut self, padding: &[u8]) -> Self {
        self.padding = padding.to_vec();
        self
    }

    /// Declare `RecordByteSize`; rows are zero-padded to it.
    #[must_use]
    pub fn record_byte_size(mut self, size: usize) -> Self {
        self.record_byte_size = Some(size);
        self
    }

    /// Override `NoOfRecords`; `None` omits the element.
    #[must_use]
    pub fn declare_records(mut self, count: Option<u64>) -> Self {
        self.declared_records = Some(count);
        self
    }

    /// Raw bytes appended after the last row.
    #[must_use]
    pub fn trailing(mut self, bytes: &[u8]) -> Self {
        self.trailing.extend_from_slice(bytes);
        self
    }

    /// Bytes per row as the header will describe it.
    pub fn row_size(&self) -> usize {
        self.record_byte_size.unwrap_or_else(|| {
            let bits: u32 = self.fields.iter().map(FieldSpec::width).sum();
            bits.div_ceil(8) as usize
        })
    }

    /// The header document, end marker included.
    pub fn header_xml(&self) -> String {
        let mut xml = String::from(
            "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\r\n<QvdTableHeader>\r\n",
        );
        let _ = writeln!(xml, "  <QvBuildNo>50668</QvBuildNo>");
        let _ = writeln!(xml, "  <CreatorDoc>fixture.qvw</CreatorDoc>");
        let _ = writeln!(xml, "  <CreateUtcTime>2024-01-02 03:04:05</CreateUtcTime>");
        let _ = writeln!(xml, "  <TableName>{}</TableName>", escape(&self.table_name));
        xml.push_str("  <Fields>\r\n");

        let mut bit_offset = 0u32;
        let mut symbol_offset = 0usize;
        for field in &self.fields {
            let width = field.width();
            let length = field.symbol_bytes().len();
            let declared = field.declared_symbols.unwrap_or(field.symbols.len() as u32);

            xml.push_str("    <QvdFieldHeader>\r\n");
            let _ = writeln!(xml, "      <FieldName>{}</FieldName>", escape(&field.name));
            let _ = writeln!(xml, "      <BitOffset>{bit_offset}</BitOffset>");
            let _ = writeln!(xml, "      <BitWidth>{width}</BitWidth>");
            let _ = writeln!(xml, "      <Bias>{}</Bias>", field.bias);
            xml.push_str("      <NumberFormat><Type>UNKNOWN</Type><nDec>0</nDec></NumberFormat>\r\n");
            let _ = writeln!(xml, "      <NoOfSymbols>{declared}</NoOfSymbols>");
            if field.declare_range {
                let _ = writeln!(xml, "      <Offset>{symbol_offset}</Offset>");
                let _ = writeln!(xml, "      <Length>{length}</Length>");
            }
            xml.push_str("      <Comment></Comment>\r\n      <Tags></Tags>\r\n");
            xml.push_str("    </QvdFieldHeader>\r\n");

            bit_offset += width;
            symbol_offset += length;
        }
        xml.push_str("  </Fields>\r\n");

        let _ = writeln!(xml, "  <RecordByteSize>{}</RecordByteSize>", self.row_size());
        let records = self
            .declared_records
            .unwrap_or(Some(self.rows.len() as u64));
        if let Some(records) = records {
            let _ = writeln!(xml, "  <NoOfRecords>{records}</NoOfRecords>");
        }
        let _ = writeln!(xml, "  <Offset>{symbol_offset}</Offset>");
        let _ = writeln!(xml, "  <Length>{}</Length>", self.row_bytes().len());
        xml.push_str("  <Lineage><LineageInfo><Discriminator>fixture</Discriminator></LineageInfo></Lineage>\r\n");
        xml.push_str("</QvdTableHeader>");
        xml
    }

    /// Every field's symbol table, back to back.
    pub fn symbol_bytes(&self) -> Vec<u8> {
        self.fields.iter().flat_map(FieldSpec::symbol_bytes).collect()
    }

    /// The packed row section.
    pub fn row_bytes(&self) -> Vec<u8> {
        let size = self.row_size();
        let mut out = Vec::with_capacity(size * self.rows.len());
        for row in &self.rows {
            let mut packed = vec![0u8; size];
            let mut bit_offset = 0u32;
            for (field, &index) in self.fields.iter().zip(row) {
                let width = field.width();
                pack_bits(&mut packed, bit_offset, width, index);
                bit_offset += width;
            }
            out.extend_from_slice(&packed);
        }
        out
    }

    /// The complete file.
    pub fn build(&self) -> Vec<u8> {
        let mut out = self.header_xml().into_bytes();
        out.extend_from_slice(&self.padding);
        out.extend_from_slice(&self.symbol_bytes());
        out.extend_from_slice(&self.row_bytes());
        out.extend_from_slice(&self.trailing);
        out
    }
}

/// Write the low `width` bits of `value` at `bit_offset`, LSB-first.
pub fn pack_bits(row: &mut [u8], bit_offset: u32, width: u32, value: u64) {
    for i in 0..width {
        if (value >> i) & 1 == 1 {
            let bit = (bit_offset + i) as usize;
            row[bit / 8] |= 1 << (bit % 8);
        }
    }
}

fn escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// A two-field table used across suites:
///
/// ```text
///   Region  (2 bits): North, South, East, West
///   Amount  (2 bits): 10, 2.5, 7 "seven", 1.25 "1,25"
///   rows: (North, 10) (West, 7) (South, 1.25)
/// ```
pub fn sales_table() -> QvdBuilder {
    QvdBuilder::new("Sales")
        .field(FieldSpec::new("Region").symbols([
            Symbol::text("North"),
            Symbol::text("South"),
            Symbol::text("East"),
            Symbol::text("West"),
        ]))
        .field(FieldSpec::new("Amount").symbols([
            Symbol::Int(10),
            Symbol::Double(2.5),
            Symbol::DualInt(7, "seven".into()),
            Symbol::DualDouble(1.25, "1,25".into()),
        ]))
        .row(&[0, 0])
        .row(&[3, 2])
        .row(&[1, 3])
}

/// A wide synthetic table for benches: `fields` columns of `symbols`
/// integer symbols each, `rows` rows with indices cycling through them.
pub fn synthetic_table(fields: usize, symbols: usize, rows: usize) -> QvdBuilder {
    let mut builder = QvdBuilder::new("Synthetic");
    for f in 0..fields {
        builder = builder.field(
            FieldSpec::new(&format!("F{f}")).symbols((0..symbols).map(|s| Symbol::Int(s as i32))),
        );
    }
    builder.rows((0..rows).map(|r| (0..fields).map(|f| ((r * 7 + f) % symbols) as u64).collect()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn widths_fit_symbol_counts() {
        assert_eq!(bits_for(0), 0);
        assert_eq!(bits_for(1), 0);
        assert_eq!(bits_for(2), 1);
        assert_eq!(bits_for(4), 2);
        assert_eq!(bits_for(5), 3);
        assert_eq!(bits_for(256), 8);
    }

    #[test]
    fn packs_lsb_first() {
        let mut row = [0u8; 1];
        pack_bits(&mut row, 0, 3, 6);
        pack_bits(&mut row, 3, 5, 2);
        assert_eq!(row, [0b0001_0110]);
    }

    #[test]
    fn sales_rows_are_one_byte() {
        let table = sales_table();
        assert_eq!(table.row_size(), 1);
        // (0,0) (3,2) (1,3)
        assert_eq!(table.row_bytes(), vec![0b0000, 0b1011, 0b1101]);
    }

    #[test]
    fn header_ends_with_marker() {
        let xml = sales_table().header_xml();
        assert!(xml.ends_with("</QvdTableHeader>"));
        assert_eq!(xml.matches("</QvdTableHeader>").count(), 1);
    }
}
