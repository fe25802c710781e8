use std::fmt;

/// Leading byte of an encoded symbol, selecting its payload shape.
///
/// ```text
/// ┌──────┬────────────┬──────────────────────────────────────────┐
/// │ Wire │ Variant    │ Payload                                  │
/// ├──────┼────────────┼──────────────────────────────────────────┤
/// │ 0x01 │ Int        │ i32, little-endian                       │
/// │ 0x02 │ Double     │ f64, little-endian IEEE-754              │
/// │ 0x04 │ Text       │ bytes up to a 0x00 terminator            │
/// │ 0x05 │ DualInt    │ i32, then NUL-terminated text            │
/// │ 0x06 │ DualDouble │ f64, then NUL-terminated text            │
/// └──────┴────────────┴──────────────────────────────────────────┘
/// ```
///
/// There is no catch-all variant: an unknown tag leaves the payload length
/// undefined, so the decoder has to stop rather than skip it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SymbolTag {
    Int,
    Double,
    Text,
    DualInt,
    DualDouble,
}

impl SymbolTag {
    /// Return the wire byte for this tag.
    #[must_use]
    pub fn wire_id(self) -> u8 {
        match self {
            Self::Int => 0x01,
            Self::Double => 0x02,
            Self::Text => 0x04,
            Self::DualInt => 0x05,
            Self::DualDouble => 0x06,
        }
    }

    /// Parse a wire byte, or `None` if the tag is not defined.
    #[must_use]
    pub fn from_wire_id(id: u8) -> Option<Self> {
        match id {
            0x01 => Some(Self::Int),
            0x02 => Some(Self::Double),
            0x04 => Some(Self::Text),
            0x05 => Some(Self::DualInt),
            0x06 => Some(Self::DualDouble),
            _ => None,
        }
    }
}

/// One dictionary entry, or the value a row resolves to.
///
/// Dual variants carry the same logical value in both a numeric and a
/// textual form, exactly as the file stores them. `Null` never appears in
/// a symbol table; rows produce it when a biased index is negative.
#[derive(Clone, Debug, PartialEq)]
pub enum SymbolValue {
    Int(i32),
    Double(f64),
    Text(String),
    DualInt { number: i32, text: String },
    DualDouble { number: f64, text: String },
    Null,
}

impl SymbolValue {
    /// The wire tag this value decodes from. `Null` has none.
    #[must_use]
    pub fn tag(&self) -> Option<SymbolTag> {
        match self {
            Self::Int(_) => Some(SymbolTag::Int),
            Self::Double(_) => Some(SymbolTag::Double),
            Self::Text(_) => Some(SymbolTag::Text),
            Self::DualInt { .. } => Some(SymbolTag::DualInt),
            Self::DualDouble { .. } => Some(SymbolTag::DualDouble),
            Self::Null => None,
        }
    }

    /// Numeric form, if the value has one.
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(n) | Self::DualInt { number: n, .. } => Some(f64::from(*n)),
            Self::Double(n) | Self::DualDouble { number: n, .. } => Some(*n),
            Self::Text(_) | Self::Null => None,
        }
    }

    /// Integer form, if the value was stored as an integer.
    #[must_use]
    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Self::Int(n) | Self::DualInt { number: n, .. } => Some(*n),
            _ => None,
        }
    }

    /// Textual form, if the value has one.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) | Self::DualInt { text: s, .. } | Self::DualDouble { text: s, .. } => {
                Some(s)
            }
            Self::Int(_) | Self::Double(_) | Self::Null => None,
        }
    }

    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

/// Prints the text form where there is one, else the number. `Null` prints
/// as an empty string.
impl fmt::Display for SymbolValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(n) => write!(f, "{n}"),
            Self::Double(n) => write!(f, "{n}"),
            Self::Text(s) | Self::DualInt { text: s, .. } | Self::DualDouble { text: s, .. } => {
                f.write_str(s)
            }
            Self::Null => Ok(()),
        }
    }
}

/// A field's dictionary, indexed `0..len` in file order.
///
/// Built once during symbol decoding and read-only afterwards, so it can be
/// shared freely between row consumers.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SymbolTable {
    values: Vec<SymbolValue>,
}

impl SymbolTable {
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&SymbolValue> {
        self.values.get(index)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, SymbolValue> {
        self.values.iter()
    }
}

impl From<Vec<SymbolValue>> for SymbolTable {
    fn from(values: Vec<SymbolValue>) -> Self {
        Self { values }
    }
}

impl<'a> IntoIterator for &'a SymbolTable {
    type Item = &'a SymbolValue;
    type IntoIter = std::slice::Iter<'a, SymbolValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.values.iter()
    }
}
