//! Scalar cell values.

use serde::{Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;

/// A single cell in a [`Table`](super::Table).
///
/// Categorical data is carried as [`Value::Text`]. Values are totally
/// ordered so grouping and sorting are deterministic: missing sorts first,
/// then numbers (integers and floats compared numerically), then text.
#[derive(Debug, Clone)]
pub enum Value {
    /// Integer number.
    Int(i64),
    /// Floating point number.
    Float(f64),
    /// String or categorical label.
    Text(String),
    /// Explicit "no value" marker, distinct from zero.
    Missing,
}

/// Tokens that load as [`Value::Missing`] (compared case-insensitively).
const MISSING_TOKENS: &[&str] = &["", "na", "nan", "n/a", "null", "none"];

impl Value {
    /// Infer a value from raw text.
    ///
    /// Integers win over floats; anything non-numeric is text.
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        let lowered = trimmed.to_ascii_lowercase();

        if MISSING_TOKENS.contains(&lowered.as_str()) {
            return Value::Missing;
        }

        if let Ok(i) = trimmed.parse::<i64>() {
            return Value::Int(i);
        }

        match trimmed.parse::<f64>() {
            Ok(f) if f.is_finite() => Value::Float(f),
            _ => Value::Text(trimmed.to_string()),
        }
    }

    /// Returns true for the missing marker (and for NaN floats).
    pub fn is_missing(&self) -> bool {
        match self {
            Value::Missing => true,
            Value::Float(f) => f.is_nan(),
            _ => false,
        }
    }

    /// Returns true for integers and floats.
    pub fn is_numeric(&self) -> bool {
        matches!(self, Value::Int(_) | Value::Float(_))
    }

    /// Numeric view of the value, if it has one.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) if !f.is_nan() => Some(*f),
            _ => None,
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Value::Missing => 0,
            Value::Int(_) | Value::Float(_) => 1,
            Value::Text(_) => 2,
        }
    }
}

impl Ord for Value {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => a.cmp(b),
            (Value::Text(a), Value::Text(b)) => a.cmp(b),
            (Value::Float(a), Value::Float(b)) => a.total_cmp(b),
            (Value::Int(a), Value::Float(b)) => cmp_int_float(*a, *b),
            (Value::Float(a), Value::Int(b)) => cmp_int_float(*b, *a).reverse(),
            (a, b) => a.rank().cmp(&b.rank()),
        }
    }
}

/// Exact comparison of an integer with a float, without rounding `i` to f64.
fn cmp_int_float(i: i64, f: f64) -> Ordering {
    const TWO_63: f64 = 9_223_372_036_854_775_808.0;

    if f.is_nan() {
        return (i as f64).total_cmp(&f);
    }
    if f >= TWO_63 {
        return Ordering::Less;
    }
    if f < -TWO_63 {
        return Ordering::Greater;
    }

    let whole = f.trunc();
    match i.cmp(&(whole as i64)) {
        Ordering::Equal => 0.0_f64.total_cmp(&(f - whole)),
        other => other,
    }
}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Value {}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(i) => write!(f, "{}", i),
            // Integral floats print without a fraction so derived names read `month_1`
            Value::Float(x) if x.is_finite() && x.fract() == 0.0 && x.abs() < 1e15 => {
                write!(f, "{:.0}", x)
            }
            Value::Float(x) => write!(f, "{}", x),
            Value::Text(s) => write!(f, "{}", s),
            Value::Missing => write!(f, "NA"),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Int(i) => serializer.serialize_i64(*i),
            Value::Float(f) if f.is_finite() => serializer.serialize_f64(*f),
            Value::Float(_) | Value::Missing => serializer.serialize_none(),
            Value::Text(s) => serializer.serialize_str(s),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_infers_types() {
        assert_eq!(Value::parse("7"), Value::Int(7));
        assert!(matches!(Value::parse("2.5"), Value::Float(_)));
        assert!(matches!(Value::parse(" Residential "), Value::Text(ref s) if s == "Residential"));
        assert!(Value::parse("").is_missing());
        assert!(Value::parse("NaN").is_missing());
        assert!(Value::parse("NA").is_missing());
        assert!(matches!(Value::parse("inf"), Value::Text(_)));
    }

    #[test]
    fn test_numeric_equality_across_int_and_float() {
        assert_eq!(Value::Int(5), Value::Float(5.0));
        assert!(Value::Int(2) < Value::Float(2.5));
        assert!(Value::Int(-2) > Value::Float(-2.5));
    }

    #[test]
    fn test_int_float_order_is_exact_beyond_f64_precision() {
        let big = 1i64 << 53;
        let a = Value::Int(big);
        let b = Value::Float(big as f64);
        let c = Value::Int(big + 1);

        assert_eq!(a, b);
        assert!(c > b);
        assert!(c > a);
        assert_ne!(b, c);

        assert!(Value::Int(i64::MAX) < Value::Float(9.3e18));
        assert!(Value::Int(i64::MIN) > Value::Float(f64::NEG_INFINITY));
        assert!(Value::Float(f64::INFINITY) > Value::Int(i64::MAX));

        let mut sorted = vec![c.clone(), b.clone(), Value::Float(0.5), a.clone()];
        sorted.sort();
        assert_eq!(sorted[0], Value::Float(0.5));
        assert_eq!(sorted[3], c);
    }

    #[test]
    fn test_ordering_ranks() {
        let mut values = vec![
            Value::from("b"),
            Value::Int(3),
            Value::Missing,
            Value::from("a"),
            Value::Float(-1.0),
        ];
        values.sort();
        assert_eq!(
            values,
            vec![
                Value::Missing,
                Value::Float(-1.0),
                Value::Int(3),
                Value::from("a"),
                Value::from("b"),
            ]
        );
    }

    #[test]
    fn test_display_integral_float() {
        assert_eq!(Value::Float(1.0).to_string(), "1");
        assert_eq!(Value::Float(2.5).to_string(), "2.5");
        assert_eq!(Value::Int(7).to_string(), "7");
        assert_eq!(Value::Missing.to_string(), "NA");
    }

    #[test]
    fn test_serialize_missing_as_null() {
        let json = serde_json::to_string(&vec![
            Value::Int(1),
            Value::Missing,
            Value::from("x"),
            Value::Float(f64::NAN),
        ])
        .unwrap();
        assert_eq!(json, r#"[1,null,"x",null]"#);
    }
}
