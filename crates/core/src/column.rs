//! Column metadata
//!
//! [`ColumnType`] is part of the stable surface: its numeric codes must never
//! be renumbered. New types may be appended.

use serde::{Deserialize, Serialize};

/// Collation number reported when the server did not send one.
pub const COLLATION_UNDEFINED: u16 = 0;

/// Column type code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u16)]
pub enum ColumnType {
    /// Unknown or not reported
    Undefined = 0,
    /// Signed integer
    Sint = 1,
    /// Unsigned integer
    Uint = 2,
    /// Double precision float
    Double = 5,
    /// Single precision float
    Float = 6,
    /// Binary data
    Bytes = 7,
    /// Time of day
    Time = 10,
    /// Date and time
    Datetime = 12,
    /// SET column
    Set = 15,
    /// ENUM column
    Enum = 16,
    /// BIT column
    Bit = 17,
    /// Fixed point decimal
    Decimal = 18,
    /// Boolean
    Bool = 19,
    /// JSON document
    Json = 20,
    /// Character data
    String = 21,
    /// Spatial data
    Geometry = 22,
    /// Timestamp
    Timestamp = 23,
}

impl ColumnType {
    /// Numeric code of this type.
    pub fn code(self) -> u16 {
        self as u16
    }

    /// Look up a type by its numeric code.
    pub fn from_code(code: u16) -> Option<Self> {
        let ty = match code {
            0 => ColumnType::Undefined,
            1 => ColumnType::Sint,
            2 => ColumnType::Uint,
            5 => ColumnType::Double,
            6 => ColumnType::Float,
            7 => ColumnType::Bytes,
            10 => ColumnType::Time,
            12 => ColumnType::Datetime,
            15 => ColumnType::Set,
            16 => ColumnType::Enum,
            17 => ColumnType::Bit,
            18 => ColumnType::Decimal,
            19 => ColumnType::Bool,
            20 => ColumnType::Json,
            21 => ColumnType::String,
            22 => ColumnType::Geometry,
            23 => ColumnType::Timestamp,
            _ => return None,
        };
        Some(ty)
    }
}

/// Description of one result column.
///
/// `label` and `table_label` are the (possibly aliased) names used in the
/// query; `name` and `table_name` are the originals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    /// Column label (alias if one was given)
    pub label: String,
    /// Original column name
    pub name: String,
    /// Table label (alias if one was given)
    pub table_label: String,
    /// Original table name
    pub table_name: String,
    /// Schema the table belongs to
    pub schema: String,
    /// Type code
    pub column_type: ColumnType,
    /// Collation number
    pub collation: u16,
    /// Maximum data length
    pub length: u32,
    /// Digits after the decimal point
    pub decimals: u16,
}

impl ColumnDescriptor {
    /// Create a descriptor whose label and name are both `name`.
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        let name = name.into();
        Self {
            label: name.clone(),
            name,
            table_label: String::new(),
            table_name: String::new(),
            schema: String::new(),
            column_type,
            collation: COLLATION_UNDEFINED,
            length: 0,
            decimals: 0,
        }
    }

    /// Set the column alias.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Set the owning table and schema; the table label defaults to the name.
    pub fn with_table(mut self, schema: impl Into<String>, table: impl Into<String>) -> Self {
        let table = table.into();
        self.schema = schema.into();
        self.table_label = table.clone();
        self.table_name = table;
        self
    }

    /// Set the table alias.
    pub fn with_table_label(mut self, label: impl Into<String>) -> Self {
        self.table_label = label.into();
        self
    }

    /// Set length, precision and collation.
    pub fn with_layout(mut self, length: u32, decimals: u16, collation: u16) -> Self {
        self.length = length;
        self.decimals = decimals;
        self.collation = collation;
        self
    }
}
