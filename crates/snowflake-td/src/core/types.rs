//! The closed set of Airbyte column types.
//!
//! Stream schemas arrive as JSON schema documents. They are decoded once by
//! [`AirbyteType::from_json_schema`] into this tagged tree; everything
//! downstream matches on it exhaustively.

use std::fmt;
use std::str::FromStr;

use serde_json::Value;

use crate::error::TdError;

/// Primitive column types.
///
/// Declaration order is significant: [`Union::choose_type`] prefers earlier
/// primitives over later ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AirbyteProtocolType {
    String,
    Number,
    Integer,
    Boolean,
    TimestampWithTimezone,
    TimestampWithoutTimezone,
    TimeWithTimezone,
    TimeWithoutTimezone,
    Date,
    Unknown,
}

impl AirbyteProtocolType {
    /// Every primitive, in declaration order.
    pub const ALL: [AirbyteProtocolType; 10] = [
        Self::String,
        Self::Number,
        Self::Integer,
        Self::Boolean,
        Self::TimestampWithTimezone,
        Self::TimestampWithoutTimezone,
        Self::TimeWithTimezone,
        Self::TimeWithoutTimezone,
        Self::Date,
        Self::Unknown,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::String => "STRING",
            Self::Number => "NUMBER",
            Self::Integer => "INTEGER",
            Self::Boolean => "BOOLEAN",
            Self::TimestampWithTimezone => "TIMESTAMP_WITH_TIMEZONE",
            Self::TimestampWithoutTimezone => "TIMESTAMP_WITHOUT_TIMEZONE",
            Self::TimeWithTimezone => "TIME_WITH_TIMEZONE",
            Self::TimeWithoutTimezone => "TIME_WITHOUT_TIMEZONE",
            Self::Date => "DATE",
            Self::Unknown => "UNKNOWN",
        }
    }

    fn rank(self) -> i64 {
        self as i64
    }

    /// Decode a schema node that is neither object, array, union nor oneOf.
    fn from_schema_node(node: &Value) -> Self {
        if let Some(reference) = node.get("$ref").and_then(Value::as_str) {
            return Self::from_well_known_ref(reference);
        }

        let property_type = node.get("type");
        let format = node.get("format");
        let airbyte_type = node.get("airbyte_type");

        if node_matches(property_type, "string") {
            if node_matches(format, "date") {
                return Self::Date;
            }
            if node_matches(format, "time") {
                return if node_matches(airbyte_type, "time_without_timezone") {
                    Self::TimeWithoutTimezone
                } else {
                    Self::TimeWithTimezone
                };
            }
            if node_matches(format, "date-time") {
                return if node_matches(airbyte_type, "timestamp_without_timezone") {
                    Self::TimestampWithoutTimezone
                } else {
                    Self::TimestampWithTimezone
                };
            }
            Self::String
        } else if node_matches(property_type, "boolean") {
            Self::Boolean
        } else if node_matches(property_type, "integer") {
            Self::Integer
        } else if node_matches(property_type, "number") {
            if node_matches(airbyte_type, "integer") {
                Self::Integer
            } else {
                Self::Number
            }
        } else {
            Self::Unknown
        }
    }

    fn from_well_known_ref(reference: &str) -> Self {
        match reference.rsplit('/').next().unwrap_or_default() {
            "String" | "BinaryData" => Self::String,
            "Boolean" => Self::Boolean,
            "Date" => Self::Date,
            "TimestampWithTimezone" => Self::TimestampWithTimezone,
            "TimestampWithoutTimezone" => Self::TimestampWithoutTimezone,
            "TimeWithTimezone" => Self::TimeWithTimezone,
            "TimeWithoutTimezone" => Self::TimeWithoutTimezone,
            "Integer" => Self::Integer,
            "Number" => Self::Number,
            _ => Self::Unknown,
        }
    }
}

impl fmt::Display for AirbyteProtocolType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AirbyteProtocolType {
    type Err = TdError;

    /// Parse a primitive by name (case-insensitive).
    ///
    /// A name outside the closed set means the schema generator upstream
    /// produced something this crate was never built for.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| TdError::UnrecognizedType(s.to_string()))
    }
}

/// A column type.
#[derive(Debug, Clone, PartialEq)]
pub enum AirbyteType {
    Primitive(AirbyteProtocolType),
    /// JSON object with declared properties, in declaration order.
    Struct { properties: Vec<(String, AirbyteType)> },
    /// JSON array with a declared item type.
    Array { items: Box<AirbyteType> },
    /// Nullable or multi-typed column; resolved through [`Union::choose_type`].
    Union(Union),
    /// `oneOf` schema; stored as the most permissive type.
    UnsupportedOneOf { options: Vec<AirbyteType> },
}

static UNKNOWN_TYPE: AirbyteType = AirbyteType::Primitive(AirbyteProtocolType::Unknown);

impl AirbyteType {
    pub fn string() -> Self {
        Self::Primitive(AirbyteProtocolType::String)
    }

    pub fn integer() -> Self {
        Self::Primitive(AirbyteProtocolType::Integer)
    }

    pub fn number() -> Self {
        Self::Primitive(AirbyteProtocolType::Number)
    }

    pub fn boolean() -> Self {
        Self::Primitive(AirbyteProtocolType::Boolean)
    }

    pub fn unknown() -> Self {
        Self::Primitive(AirbyteProtocolType::Unknown)
    }

    pub fn array(items: AirbyteType) -> Self {
        Self::Array {
            items: Box::new(items),
        }
    }

    pub fn union(options: Vec<AirbyteType>) -> Self {
        Self::Union(Union { options })
    }

    /// Decode a JSON schema node.
    ///
    /// Never fails: anything that cannot be interpreted becomes `UNKNOWN`,
    /// which is stored as a semi-structured value.
    pub fn from_json_schema(schema: &Value) -> Self {
        if let Some(top_level_type) = schema.get("type") {
            match top_level_type {
                Value::String(t) if t == "object" => return Self::struct_from(schema),
                Value::String(t) if t == "array" => return Self::array_from(schema),
                Value::Array(types) => return Self::from_type_array(schema, types),
                _ => {}
            }
        } else if let Some(Value::Array(options)) = schema.get("oneOf") {
            return Self::UnsupportedOneOf {
                options: options.iter().map(Self::from_json_schema).collect(),
            };
        } else if schema.get("properties").is_some_and(|p| !p.is_null()) {
            // No type and no oneOf, but properties: treat as an object.
            return Self::struct_from(schema);
        }

        Self::Primitive(AirbyteProtocolType::from_schema_node(schema))
    }

    fn struct_from(schema: &Value) -> Self {
        let properties = match schema.get("properties") {
            Some(Value::Object(props)) => props
                .iter()
                .map(|(name, node)| (name.clone(), Self::from_json_schema(node)))
                .collect(),
            _ => Vec::new(),
        };
        Self::Struct { properties }
    }

    fn array_from(schema: &Value) -> Self {
        match schema.get("items") {
            Some(items) if !items.is_null() => Self::array(Self::from_json_schema(items)),
            _ => Self::array(Self::unknown()),
        }
    }

    fn from_type_array(schema: &Value, types: &[Value]) -> Self {
        let options: Vec<&str> = types
            .iter()
            .filter_map(Value::as_str)
            .filter(|t| *t != "null")
            .collect();

        let trimmed = |type_name: &str| {
            let mut node = schema.clone();
            if let Value::Object(map) = &mut node {
                map.insert("type".to_string(), Value::String(type_name.to_string()));
            }
            Self::from_json_schema(&node)
        };

        if options.len() == 1 {
            return trimmed(options[0]);
        }
        Self::union(options.into_iter().map(trimmed).collect())
    }
}

impl From<AirbyteProtocolType> for AirbyteType {
    fn from(value: AirbyteProtocolType) -> Self {
        Self::Primitive(value)
    }
}

/// A set of candidate types for one column.
#[derive(Debug, Clone, PartialEq)]
pub struct Union {
    pub options: Vec<AirbyteType>,
}

impl Union {
    /// Pick the branch the column is stored as.
    ///
    /// Arrays win over objects, objects over primitives, and primitives are
    /// ranked by declaration order. Unions and oneOfs rank last. Ties keep
    /// the first option; an empty union is `UNKNOWN`.
    pub fn choose_type(&self) -> &AirbyteType {
        self.options
            .iter()
            .min_by_key(|option| match option {
                AirbyteType::Array { .. } => -2,
                AirbyteType::Struct { .. } => -1,
                AirbyteType::Primitive(p) => p.rank(),
                AirbyteType::Union(_) | AirbyteType::UnsupportedOneOf { .. } => i64::MAX,
            })
            .unwrap_or(&UNKNOWN_TYPE)
    }
}

fn node_matches(node: Option<&Value>, expected: &str) -> bool {
    matches!(node, Some(Value::String(s)) if s == expected)
}
