//! Typed runtime values and the textual serialization protocol.
//!
//! A captured variable is one of three shapes ([`Rank`]) over five element
//! types ([`ElementType`]). [`TypedValue`] is the tagged representation;
//! serialization and type-directed deserialization are implemented per
//! variant instead of by inspecting runtime types.
//!
//! # Text forms
//!
//! - scalar: the value's invariant-culture `ToString()` text (`5`, `2.5`, `a`)
//! - vector: elements joined by `,` (`1,2,3`)
//! - matrix: each row joined by `,`; in trace records every row is its own
//!   payload, in single-payload contexts (expected values, corrections)
//!   rows are joined by `;` (`1,2;3,4`)
//!
//! Strings and chars containing `,` or `;` cannot round-trip through the
//! vector and matrix forms.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Separator between elements of a vector or matrix row.
pub const ELEMENT_SEPARATOR: char = ',';

/// Separator between matrix rows in single-payload text.
pub const ROW_SEPARATOR: char = ';';

/// Element types a probe can capture and write back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ElementType {
    Int,
    Float,
    Double,
    Char,
    String,
}

/// Array rank of a captured value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Rank {
    Scalar,
    Vector,
    Matrix,
}

/// Full static type of a captured value: element type plus rank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ValueType {
    pub element: ElementType,
    pub rank: Rank,
}

/// A single element value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Scalar {
    Int(i32),
    Float(f32),
    Double(f64),
    Char(char),
    Str(String),
}

/// A captured value with its shape.
///
/// Vector and matrix items all share `element`; the constructors
/// [`TypedValue::vector`] and [`TypedValue::matrix`] enforce this. Matrix
/// items are stored row-major with `columns` items per row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TypedValue {
    Scalar(Scalar),
    Vector {
        element: ElementType,
        items: Vec<Scalar>,
    },
    Matrix {
        element: ElementType,
        columns: usize,
        items: Vec<Scalar>,
    },
}

/// The serialized form of one value: what a probe writes into trace records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerializedValue {
    pub type_name: String,
    pub rank: Rank,
    /// One payload for scalars and vectors, one per row for matrices.
    pub rows: Vec<String>,
}

impl ElementType {
    /// The .NET runtime type name (`GetType().Name`), as written in traces.
    pub fn runtime_name(self) -> &'static str {
        match self {
            ElementType::Int => "Int32",
            ElementType::Float => "Single",
            ElementType::Double => "Double",
            ElementType::Char => "Char",
            ElementType::String => "String",
        }
    }

    /// The C# keyword used in declarations and casts.
    pub fn keyword(self) -> &'static str {
        match self {
            ElementType::Int => "int",
            ElementType::Float => "float",
            ElementType::Double => "double",
            ElementType::Char => "char",
            ElementType::String => "string",
        }
    }

    /// Accepts keyword, runtime and `System.`-qualified spellings.
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim();
        let name = name.strip_prefix("System.").unwrap_or(name);
        match name {
            "int" | "Int32" => Some(ElementType::Int),
            "float" | "Single" => Some(ElementType::Float),
            "double" | "Double" => Some(ElementType::Double),
            "char" | "Char" => Some(ElementType::Char),
            "string" | "String" => Some(ElementType::String),
            _ => None,
        }
    }

    /// Parses one element. Float and double accept `,` as decimal separator
    /// only when `allow_decimal_comma` is set (scalar context).
    fn parse_element(self, raw: &str, allow_decimal_comma: bool) -> Result<Scalar, String> {
        let text = raw.trim();
        match self {
            ElementType::Int => text
                .parse::<i32>()
                .map(Scalar::Int)
                .map_err(|e| e.to_string()),
            ElementType::Float => normalize_decimal(text, allow_decimal_comma)
                .parse::<f32>()
                .map(Scalar::Float)
                .map_err(|e| e.to_string()),
            ElementType::Double => normalize_decimal(text, allow_decimal_comma)
                .parse::<f64>()
                .map(Scalar::Double)
                .map_err(|e| e.to_string()),
            ElementType::Char => {
                let inner = strip_quotes(text, '\'');
                let mut chars = inner.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => Ok(Scalar::Char(c)),
                    _ => Err("expected a single character".to_string()),
                }
            }
            ElementType::String => Ok(Scalar::Str(strip_quotes(text, '"').to_string())),
        }
    }
}

impl Rank {
    pub fn as_u8(self) -> u8 {
        match self {
            Rank::Scalar => 0,
            Rank::Vector => 1,
            Rank::Matrix => 2,
        }
    }

    pub fn from_u8(raw: u8) -> Option<Self> {
        match raw {
            0 => Some(Rank::Scalar),
            1 => Some(Rank::Vector),
            2 => Some(Rank::Matrix),
            _ => None,
        }
    }

    fn suffix(self) -> &'static str {
        match self {
            Rank::Scalar => "",
            Rank::Vector => "[]",
            Rank::Matrix => "[,]",
        }
    }
}

impl ValueType {
    pub fn new(element: ElementType, rank: Rank) -> Self {
        ValueType { element, rank }
    }

    pub fn scalar(element: ElementType) -> Self {
        ValueType::new(element, Rank::Scalar)
    }

    /// Trace type name: `Int32`, `Int32[]`, `Int32[,]`.
    pub fn runtime_name(&self) -> String {
        format!("{}{}", self.element.runtime_name(), self.rank.suffix())
    }

    /// C# spelling used for casts: `int`, `int[]`, `int[,]`.
    pub fn csharp_name(&self) -> String {
        format!("{}{}", self.element.keyword(), self.rank.suffix())
    }

    /// Decodes a type name in either runtime or C# spelling.
    pub fn from_type_name(name: &str) -> Result<Self, CoreError> {
        let compact: String = name.chars().filter(|c| !c.is_whitespace()).collect();
        let (base, rank) = if let Some(base) = compact.strip_suffix("[,]") {
            (base, Rank::Matrix)
        } else if let Some(base) = compact.strip_suffix("[]") {
            (base, Rank::Vector)
        } else {
            (compact.as_str(), Rank::Scalar)
        };
        ElementType::from_name(base)
            .map(|element| ValueType::new(element, rank))
            .ok_or_else(|| CoreError::UnsupportedType {
                name: name.to_string(),
            })
    }

    /// Type-directed deserialization of a single-payload text form.
    pub fn parse(&self, text: &str) -> Result<TypedValue, CoreError> {
        match self.rank {
            Rank::Scalar => self
                .element
                .parse_element(text, true)
                .map(TypedValue::Scalar)
                .map_err(|reason| self.parse_error(text, reason)),
            Rank::Vector => Ok(TypedValue::Vector {
                element: self.element,
                items: self.parse_row(text)?,
            }),
            Rank::Matrix => {
                let rows: Vec<&str> = text
                    .split(ROW_SEPARATOR)
                    .filter(|row| !row.trim().is_empty())
                    .collect();
                self.parse_rows(&rows)
            }
        }
    }

    /// Deserializes a matrix from its per-row payloads, in emission order.
    ///
    /// For non-matrix types the rows are joined back into one payload.
    pub fn parse_rows<S: AsRef<str>>(&self, rows: &[S]) -> Result<TypedValue, CoreError> {
        if self.rank != Rank::Matrix {
            let joined = rows
                .iter()
                .map(|r| r.as_ref())
                .collect::<Vec<_>>()
                .join(&ELEMENT_SEPARATOR.to_string());
            return self.parse(&joined);
        }
        let parsed = rows
            .iter()
            .map(|row| self.parse_row(row.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        TypedValue::matrix(self.element, parsed)
    }

    fn parse_row(&self, text: &str) -> Result<Vec<Scalar>, CoreError> {
        text.split(ELEMENT_SEPARATOR)
            .filter(|item| !item.trim().is_empty())
            .map(|item| {
                self.element
                    .parse_element(item, false)
                    .map_err(|reason| self.parse_error(text, reason))
            })
            .collect()
    }

    fn parse_error(&self, text: &str, reason: String) -> CoreError {
        CoreError::ValueParse {
            text: text.to_string(),
            expected: *self,
            reason,
        }
    }
}

impl Scalar {
    pub fn element_type(&self) -> ElementType {
        match self {
            Scalar::Int(_) => ElementType::Int,
            Scalar::Float(_) => ElementType::Float,
            Scalar::Double(_) => ElementType::Double,
            Scalar::Char(_) => ElementType::Char,
            Scalar::Str(_) => ElementType::String,
        }
    }
}

impl TypedValue {
    /// Builds a vector, checking every item has type `element`.
    pub fn vector(element: ElementType, items: Vec<Scalar>) -> Result<Self, CoreError> {
        check_homogeneous(element, &items)?;
        Ok(TypedValue::Vector { element, items })
    }

    /// Builds a matrix from rows, checking element types and that the matrix
    /// is rectangular. Rows without columns are rejected: they serialize to
    /// the same text as a matrix with no rows.
    pub fn matrix(element: ElementType, rows: Vec<Vec<Scalar>>) -> Result<Self, CoreError> {
        let columns = rows.first().map(Vec::len).unwrap_or(0);
        if columns == 0 && !rows.is_empty() {
            return Err(CoreError::EmptyMatrixRows { rows: rows.len() });
        }
        let mut items = Vec::with_capacity(columns * rows.len());
        for (row, cells) in rows.into_iter().enumerate() {
            if cells.len() != columns {
                return Err(CoreError::RaggedMatrix {
                    row,
                    expected: columns,
                    actual: cells.len(),
                });
            }
            check_homogeneous(element, &cells)?;
            items.extend(cells);
        }
        Ok(TypedValue::Matrix {
            element,
            columns,
            items,
        })
    }

    pub fn value_type(&self) -> ValueType {
        match self {
            TypedValue::Scalar(s) => ValueType::scalar(s.element_type()),
            TypedValue::Vector { element, .. } => ValueType::new(*element, Rank::Vector),
            TypedValue::Matrix { element, .. } => ValueType::new(*element, Rank::Matrix),
        }
    }

    /// Matrix rows in row-major order. Scalars and vectors yield one row.
    pub fn rows(&self) -> Vec<&[Scalar]> {
        match self {
            TypedValue::Scalar(s) => vec![std::slice::from_ref(s)],
            TypedValue::Vector { items, .. } => vec![items.as_slice()],
            TypedValue::Matrix { columns, items, .. } => {
                if *columns == 0 {
                    Vec::new()
                } else {
                    items.chunks(*columns).collect()
                }
            }
        }
    }

    /// Serializes into trace form: one payload per row for matrices.
    pub fn serialize(&self) -> SerializedValue {
        let value_type = self.value_type();
        SerializedValue {
            type_name: value_type.runtime_name(),
            rank: value_type.rank,
            rows: self.rows().into_iter().map(join_row).collect(),
        }
    }

    /// Single-payload text form (matrix rows joined by `;`).
    pub fn to_text(&self) -> String {
        self.serialize().rows.join(&ROW_SEPARATOR.to_string())
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Int(v) => write!(f, "{}", v),
            Scalar::Float(v) => write_float(f, f64::from(*v), v.to_string()),
            Scalar::Double(v) => write_float(f, *v, v.to_string()),
            Scalar::Char(c) => write!(f, "{}", c),
            Scalar::Str(s) => f.write_str(s),
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.csharp_name())
    }
}

impl fmt::Display for TypedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_text())
    }
}

// .NET prints infinities as "Infinity"/"-Infinity" under the invariant
// culture; Rust prints "inf". Finite values share the shortest round-trip form.
fn write_float(f: &mut fmt::Formatter<'_>, value: f64, text: String) -> fmt::Result {
    if value.is_infinite() {
        f.write_str(if value > 0.0 { "Infinity" } else { "-Infinity" })
    } else {
        f.write_str(&text)
    }
}

fn join_row(row: &[Scalar]) -> String {
    row.iter()
        .map(Scalar::to_string)
        .collect::<Vec<_>>()
        .join(&ELEMENT_SEPARATOR.to_string())
}

fn check_homogeneous(element: ElementType, items: &[Scalar]) -> Result<(), CoreError> {
    match items.iter().find(|s| s.element_type() != element) {
        Some(other) => Err(CoreError::ValueParse {
            text: other.to_string(),
            expected: ValueType::scalar(element),
            reason: format!("element of type {}", other.element_type().keyword()),
        }),
        None => Ok(()),
    }
}

fn normalize_decimal(text: &str, allow_decimal_comma: bool) -> String {
    if allow_decimal_comma {
        text.replace(',', ".")
    } else {
        text.to_string()
    }
}

fn strip_quotes(text: &str, quote: char) -> &str {
    if text.len() >= 2 && text.starts_with(quote) && text.ends_with(quote) {
        &text[quote.len_utf8()..text.len() - quote.len_utf8()]
    } else {
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn ints(values: &[i32]) -> Vec<Scalar> {
        values.iter().copied().map(Scalar::Int).collect()
    }

    #[test]
    fn scalar_serializes_as_tostring_text() {
        let s = TypedValue::Scalar(Scalar::Int(5)).serialize();
        assert_eq!(s.type_name, "Int32");
        assert_eq!(s.rank, Rank::Scalar);
        assert_eq!(s.rows, vec!["5".to_string()]);

        assert_eq!(TypedValue::Scalar(Scalar::Double(7.0)).to_text(), "7");
        assert_eq!(TypedValue::Scalar(Scalar::Float(2.5)).to_text(), "2.5");
        assert_eq!(TypedValue::Scalar(Scalar::Char('q')).to_text(), "q");
        assert_eq!(
            TypedValue::Scalar(Scalar::Double(f64::NEG_INFINITY)).to_text(),
            "-Infinity"
        );
    }

    #[test]
    fn vector_joins_elements_in_order() {
        let v = TypedValue::vector(ElementType::Int, ints(&[1, 2, 3])).unwrap();
        let s = v.serialize();
        assert_eq!(s.type_name, "Int32[]");
        assert_eq!(s.rows, vec!["1,2,3".to_string()]);
    }

    #[test]
    fn matrix_emits_one_row_per_payload() {
        let m = TypedValue::matrix(ElementType::Int, vec![ints(&[1, 2]), ints(&[3, 4])]).unwrap();
        let s = m.serialize();
        assert_eq!(s.type_name, "Int32[,]");
        assert_eq!(s.rank, Rank::Matrix);
        assert_eq!(s.rows, vec!["1,2".to_string(), "3,4".to_string()]);

        let back = ValueType::new(ElementType::Int, Rank::Matrix)
            .parse_rows(&s.rows)
            .unwrap();
        assert_eq!(back, m);
        assert_eq!(m.to_text(), "1,2;3,4");
    }

    #[test]
    fn ragged_matrix_is_rejected() {
        let err = TypedValue::matrix(ElementType::Int, vec![ints(&[1, 2]), ints(&[3])]).unwrap_err();
        assert!(matches!(err, CoreError::RaggedMatrix { row: 1, expected: 2, actual: 1 }));

        let err = ValueType::new(ElementType::Int, Rank::Matrix)
            .parse("1,2;3")
            .unwrap_err();
        assert!(matches!(err, CoreError::RaggedMatrix { .. }));
    }

    #[test]
    fn matrix_without_columns_is_rejected() {
        let err = TypedValue::matrix(ElementType::Int, vec![vec![], vec![]]).unwrap_err();
        assert!(matches!(err, CoreError::EmptyMatrixRows { rows: 2 }));

        let empty = TypedValue::matrix(ElementType::Int, Vec::new()).unwrap();
        assert!(empty.serialize().rows.is_empty());
        assert_eq!(
            ValueType::new(ElementType::Int, Rank::Matrix)
                .parse_rows::<&str>(&[])
                .unwrap(),
            empty
        );
    }

    #[test]
    fn mixed_element_vector_is_rejected() {
        let items = vec![Scalar::Int(1), Scalar::Double(2.0)];
        assert!(TypedValue::vector(ElementType::Int, items).is_err());
    }

    #[test]
    fn type_names_decode_in_both_spellings() {
        let t = ValueType::from_type_name("Int32[]").unwrap();
        assert_eq!(t, ValueType::new(ElementType::Int, Rank::Vector));
        let t = ValueType::from_type_name("double[,]").unwrap();
        assert_eq!(t, ValueType::new(ElementType::Double, Rank::Matrix));
        let t = ValueType::from_type_name("System.String").unwrap();
        assert_eq!(t, ValueType::scalar(ElementType::String));
        assert_eq!(t.csharp_name(), "string");
        assert!(ValueType::from_type_name("Boolean").is_err());
        assert!(ValueType::from_type_name("unknown").is_err());
    }

    #[test]
    fn scalar_decimal_comma_is_normalized() {
        let t = ValueType::scalar(ElementType::Double);
        assert_eq!(t.parse("3,5").unwrap(), TypedValue::Scalar(Scalar::Double(3.5)));
        assert_eq!(t.parse(" 3.5 ").unwrap(), TypedValue::Scalar(Scalar::Double(3.5)));

        let t = ValueType::scalar(ElementType::Float);
        assert_eq!(t.parse("0,25").unwrap(), TypedValue::Scalar(Scalar::Float(0.25)));
    }

    #[test]
    fn char_and_string_accept_quoted_and_bare_forms() {
        let c = ValueType::scalar(ElementType::Char);
        assert_eq!(c.parse("'x'").unwrap(), TypedValue::Scalar(Scalar::Char('x')));
        assert_eq!(c.parse("x").unwrap(), TypedValue::Scalar(Scalar::Char('x')));
        assert!(c.parse("xy").is_err());

        let s = ValueType::scalar(ElementType::String);
        assert_eq!(
            s.parse("\"hello\"").unwrap(),
            TypedValue::Scalar(Scalar::Str("hello".into()))
        );
        assert_eq!(
            s.parse("hello").unwrap(),
            TypedValue::Scalar(Scalar::Str("hello".into()))
        );
    }

    #[test]
    fn empty_vector_text_parses_to_empty_vector() {
        let t = ValueType::new(ElementType::Int, Rank::Vector);
        let v = t.parse("").unwrap();
        assert_eq!(v, TypedValue::Vector { element: ElementType::Int, items: vec![] });
        assert_eq!(v.to_text(), "");
    }

    #[test]
    fn bad_int_reports_expected_type() {
        let err = ValueType::scalar(ElementType::Int).parse("seven").unwrap_err();
        match err {
            CoreError::ValueParse { text, expected, .. } => {
                assert_eq!(text, "seven");
                assert_eq!(expected, ValueType::scalar(ElementType::Int));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    proptest! {
        #[test]
        fn int_matrix_rows_reconstruct_in_emission_order(
            rows in 1usize..5,
            cols in 1usize..5,
            seed in proptest::collection::vec(-1000i32..1000, 25),
        ) {
            let cells: Vec<Vec<Scalar>> = (0..rows)
                .map(|r| (0..cols).map(|c| Scalar::Int(seed[r * 5 + c])).collect())
                .collect();
            let m = TypedValue::matrix(ElementType::Int, cells).unwrap();
            let serialized = m.serialize();
            prop_assert_eq!(serialized.rows.len(), rows);
            let back = ValueType::new(ElementType::Int, Rank::Matrix)
                .parse_rows(&serialized.rows)
                .unwrap();
            prop_assert_eq!(back, m);
        }
    }
}
