use std::fmt;

use pg_escape::quote_identifier;

/// A fully qualified table name consisting of a schema and table name.
///
/// Identifies a relation in the warehouse or in the relational source and
/// provides quoting for use in generated statements.
#[derive(Debug, Clone, Eq, PartialEq, PartialOrd, Ord)]
pub struct TableName {
    /// The schema containing the table.
    pub schema: String,
    /// The name of the table within the schema.
    pub name: String,
}

impl TableName {
    pub fn new(schema: impl Into<String>, name: impl Into<String>) -> TableName {
        TableName {
            schema: schema.into(),
            name: name.into(),
        }
    }

    /// Returns the table name as a properly quoted identifier.
    ///
    /// Schema and table names are escaped according to Postgres identifier
    /// quoting rules.
    pub fn as_quoted_identifier(&self) -> String {
        let quoted_schema = quote_identifier(&self.schema);
        let quoted_name = quote_identifier(&self.name);

        format!("{quoted_schema}.{quoted_name}")
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_fmt(format_args!("{0}.{1}", self.schema, self.name))
    }
}

#[cfg(test)]
mod tests {
    use super::TableName;

    #[test]
    fn plain_names_are_not_quoted() {
        let table = TableName::new("public", "transactions");
        assert_eq!(table.as_quoted_identifier(), "public.transactions");
    }

    #[test]
    fn names_needing_escaping_are_quoted() {
        let table = TableName::new("public", "Trade Data");
        assert_eq!(table.as_quoted_identifier(), "public.\"Trade Data\"");
    }
}
