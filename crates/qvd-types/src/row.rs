use crate::schema::TableSchema;
use crate::symbol::SymbolValue;

/// One decoded record: the resolved value of every field, in schema order.
///
/// `number` is the zero-based position of the record in the row section.
/// Values are owned, so a row outlives the decoder that produced it.
#[derive(Clone, Debug, PartialEq)]
pub struct Row {
    pub number: u64,
    pub values: Vec<SymbolValue>,
}

impl Row {
    /// Value of the field at `ordinal`.
    #[must_use]
    pub fn get(&self, ordinal: usize) -> Option<&SymbolValue> {
        self.values.get(ordinal)
    }

    /// Value of the field called `name`.
    #[must_use]
    pub fn get_by_name(&self, schema: &TableSchema, name: &str) -> Option<&SymbolValue> {
        schema.field_index(name).and_then(|i| self.get(i))
    }

    /// `(field name, value)` pairs in schema order.
    pub fn named<'a>(
        &'a self,
        schema: &'a TableSchema,
    ) -> impl Iterator<Item = (&'a str, &'a SymbolValue)> + 'a {
        schema
            .fields
            .iter()
            .map(|f| f.name.as_str())
            .zip(self.values.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::FieldDescriptor;

    #[test]
    fn lookup_by_ordinal_and_name() {
        let schema = TableSchema::new(
            "t",
            vec![FieldDescriptor::new("id", 0, 4, 10), FieldDescriptor::new("name", 4, 4, 10)],
        )
        .unwrap();
        let row = Row {
            number: 0,
            values: vec![SymbolValue::Int(7), SymbolValue::Text("seven".into())],
        };

        assert_eq!(row.get(0), Some(&SymbolValue::Int(7)));
        assert_eq!(
            row.get_by_name(&schema, "name"),
            Some(&SymbolValue::Text("seven".into()))
        );
        assert_eq!(row.get_by_name(&schema, "nope"), None);

        let names: Vec<&str> = row.named(&schema).map(|(n, _)| n).collect();
        assert_eq!(names, vec!["id", "name"]);
    }
}
