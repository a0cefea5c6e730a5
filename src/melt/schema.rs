//! Fixed per-kind field schemas
//!
//! Every stream produced under a structural kind shares that kind's schema:
//! the field order is the CSV column order and the datatype decides how a
//! value is rendered.

use crate::error::{MeltError, Result};
use crate::melt::types::{FieldType, Kind};

const RECORD_FIELDS: &[(&str, char)] = &[
    ("sourceName", 's'),
    ("sourceVersion", 's'),
    ("device", 's'),
    ("type", 's'),
    ("unit", 's'),
    ("creationDate", 'd'),
    ("startDate", 'd'),
    ("endDate", 'd'),
    ("value", 'n'),
];

const ACTIVITY_SUMMARY_FIELDS: &[(&str, char)] = &[
    ("dateComponents", 'd'),
    ("activeEnergyBurned", 'n'),
    ("activeEnergyBurnedGoal", 'n'),
    ("activeEnergyBurnedUnit", 's'),
    ("appleExerciseTime", 's'),
    ("appleExerciseTimeGoal", 's'),
    ("appleStandHours", 'n'),
    ("appleStandHoursGoal", 'n'),
];

const WORKOUT_FIELDS: &[(&str, char)] = &[
    ("sourceName", 's'),
    ("sourceVersion", 's'),
    ("device", 's'),
    ("creationDate", 'd'),
    ("startDate", 'd'),
    ("endDate", 'd'),
    ("workoutActivityType", 's'),
    ("duration", 'n'),
    ("durationUnit", 's'),
    ("totalDistance", 'n'),
    ("totalDistanceUnit", 's'),
    ("totalEnergyBurned", 'n'),
    ("totalEnergyBurnedUnit", 's'),
];

impl FieldType {
    /// Parse a schema datatype marker: `s` string, `n` number, `d` datetime
    pub fn from_marker(marker: char) -> Result<Self> {
        match marker {
            's' => Ok(FieldType::String),
            'n' => Ok(FieldType::Numeric),
            'd' => Ok(FieldType::DateTime),
            other => Err(MeltError::UnexpectedDatatype(other)),
        }
    }
}

/// Ordered field table for one structural kind
#[derive(Debug, Clone, PartialEq)]
pub struct KindSchema {
    pub kind: Kind,
    pub fields: Vec<(String, FieldType)>,
}

impl KindSchema {
    /// Build a schema from `(field, marker)` pairs; an unknown marker is a
    /// defect in the table itself and fails the whole run.
    pub fn from_markers(kind: Kind, table: &[(&str, char)]) -> Result<Self> {
        let fields = table
            .iter()
            .map(|(name, marker)| Ok((name.to_string(), FieldType::from_marker(*marker)?)))
            .collect::<Result<Vec<_>>>()?;
        Ok(KindSchema { kind, fields })
    }

    /// The built-in schema for a kind
    pub fn for_kind(kind: Kind) -> Result<Self> {
        let table = match kind {
            Kind::Record => RECORD_FIELDS,
            Kind::Workout => WORKOUT_FIELDS,
            Kind::ActivitySummary => ACTIVITY_SUMMARY_FIELDS,
        };
        Self::from_markers(kind, table)
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(name, _)| name.as_str())
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// All three schemas, validated once per run
#[derive(Debug, Clone)]
pub struct SchemaSet {
    record: KindSchema,
    workout: KindSchema,
    activity_summary: KindSchema,
}

impl SchemaSet {
    pub fn builtin() -> Result<Self> {
        Ok(SchemaSet {
            record: KindSchema::for_kind(Kind::Record)?,
            workout: KindSchema::for_kind(Kind::Workout)?,
            activity_summary: KindSchema::for_kind(Kind::ActivitySummary)?,
        })
    }

    pub fn get(&self, kind: Kind) -> &KindSchema {
        match kind {
            Kind::Record => &self.record,
            Kind::Workout => &self.workout,
            Kind::ActivitySummary => &self.activity_summary,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_schemas_are_valid() {
        let schemas = SchemaSet::builtin().unwrap();
        assert_eq!(schemas.get(Kind::Record).len(), 9);
        assert_eq!(schemas.get(Kind::Workout).len(), 13);
        assert_eq!(schemas.get(Kind::ActivitySummary).len(), 8);
    }

    #[test]
    fn test_record_field_order() {
        let schema = KindSchema::for_kind(Kind::Record).unwrap();
        let names: Vec<&str> = schema.field_names().collect();
        assert_eq!(
            names,
            vec![
                "sourceName", "sourceVersion", "device", "type", "unit",
                "creationDate", "startDate", "endDate", "value",
            ]
        );
        assert_eq!(schema.fields[5].1, FieldType::DateTime);
        assert_eq!(schema.fields[8].1, FieldType::Numeric);
    }

    #[test]
    fn test_date_like_columns() {
        let schema = KindSchema::for_kind(Kind::Workout).unwrap();
        let dates: Vec<&str> = schema
            .fields
            .iter()
            .filter(|(_, datatype)| datatype.is_date_like())
            .map(|(name, _)| name.as_str())
            .collect();
        assert_eq!(dates, vec!["creationDate", "startDate", "endDate"]);
    }

    #[test]
    fn test_unknown_marker_is_fatal() {
        let err = KindSchema::from_markers(Kind::Record, &[("value", 'n'), ("oops", 'x')]).unwrap_err();
        assert!(matches!(err, MeltError::UnexpectedDatatype('x')));
    }
}
