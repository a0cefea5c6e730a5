//! Rendering nodes as delimited text

use crate::melt::schema::KindSchema;
use crate::melt::types::{FieldType, Node};

/// Format a value for a CSV field.
///
/// Absent values map to an empty field. Strings are quoted with backslashes
/// doubled first and then double quotes escaped; numbers and dates are
/// emitted verbatim.
pub fn format_value(value: Option<&str>, datatype: FieldType) -> String {
    let Some(value) = value else {
        return String::new();
    };

    match datatype {
        FieldType::String => {
            let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
            format!("\"{}\"", escaped)
        }
        FieldType::Numeric | FieldType::DateTime => value.to_string(),
    }
}

/// Header line for a schema, without the terminator
pub fn header_line(schema: &KindSchema) -> String {
    schema.field_names().collect::<Vec<_>>().join(",")
}

/// One complete data line (terminator included) in schema order.
///
/// `resolved_type`, when given, replaces the node's raw `type` attribute so
/// `Record` rows carry the same abbreviated name as their stream.
pub fn format_row(node: &Node, schema: &KindSchema, resolved_type: Option<&str>) -> String {
    let mut line = schema
        .fields
        .iter()
        .map(|(field, datatype)| {
            let value = match resolved_type {
                Some(resolved) if field == "type" => Some(resolved),
                _ => node.get(field),
            };
            format_value(value, *datatype)
        })
        .collect::<Vec<_>>()
        .join(",");
    line.push('\n');
    line
}
