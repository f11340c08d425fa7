//! Dynamically typed field values and their comparison.
//!
//! Record fields are exposed to the filter engine as [`Value`]s. Each field
//! type converts into a value with [`ToValue`] and back with [`FromValue`];
//! the object-safe [`Assign`] lets a descriptor write a value into a field
//! without knowing its static type.

use std::cmp::Ordering;
use std::fmt;

/// A scalar field value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Absent value (`None` fields, JSON `null`).
    Null,
    /// Boolean.
    Bool(bool),
    /// Signed integer.
    Int(i64),
    /// Unsigned integer.
    UInt(u64),
    /// Floating point number.
    Float(f64),
    /// String.
    Str(String),
}

impl Value {
    /// Returns a short name of the value's kind.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::UInt(_) => "uint",
            Self::Float(_) => "float",
            Self::Str(_) => "string",
        }
    }

    /// Returns true for [`Value::Null`].
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Returns the string contents, if this is a string.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Converts to a JSON value. Non-finite floats become `null`.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Null => serde_json::Value::Null,
            Self::Bool(b) => serde_json::Value::Bool(*b),
            Self::Int(i) => serde_json::Value::from(*i),
            Self::UInt(u) => serde_json::Value::from(*u),
            Self::Float(f) => serde_json::Number::from_f64(*f)
                .map_or(serde_json::Value::Null, serde_json::Value::Number),
            Self::Str(s) => serde_json::Value::String(s.clone()),
        }
    }

    /// Converts a scalar JSON value. Arrays and objects have no scalar form.
    #[must_use]
    pub fn from_json(json: &serde_json::Value) -> Option<Self> {
        match json {
            serde_json::Value::Null => Some(Self::Null),
            serde_json::Value::Bool(b) => Some(Self::Bool(*b)),
            serde_json::Value::Number(n) => n
                .as_u64()
                .map(Self::UInt)
                .or_else(|| n.as_i64().map(Self::Int))
                .or_else(|| n.as_f64().map(Self::Float)),
            serde_json::Value::String(s) => Some(Self::Str(s.clone())),
            serde_json::Value::Array(_) | serde_json::Value::Object(_) => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::UInt(u) => write!(f, "{u}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Str(s) => f.write_str(s),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Str(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}

macro_rules! value_from {
    ($variant:ident as $wide:ty: $($t:ty),*) => {$(
        impl From<$t> for Value {
            fn from(n: $t) -> Self {
                Self::$variant(<$wide>::from(n))
            }
        }
    )*};
}

value_from!(Int as i64: i8, i16, i32, i64);
value_from!(UInt as u64: u8, u16, u32, u64);
value_from!(Float as f64: f32, f64);

impl From<isize> for Value {
    fn from(n: isize) -> Self {
        Self::Int(n as i64)
    }
}

impl From<usize> for Value {
    fn from(n: usize) -> Self {
        Self::UInt(n as u64)
    }
}

/// Three-way comparison of two values.
///
/// Returns `None` when the pair is incomparable: either side is null, or the
/// kinds cannot be ordered against each other (string vs number, bool vs
/// number). Numbers compare by exact mathematical value, so an integer and
/// a float are never rounded into each other and `0.0` equals `-0.0`. NaN
/// sorts above every number when positive and below when negative.
#[must_use]
pub fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    use Value::{Bool, Float, Int, Str, UInt};

    if a.is_null() || b.is_null() {
        return None;
    }
    if a == b {
        return Some(Ordering::Equal);
    }
    match (a, b) {
        (Bool(x), Bool(y)) => Some(x.cmp(y)),
        (Str(x), Str(y)) => Some(x.cmp(y)),
        (Int(x), Int(y)) => Some(x.cmp(y)),
        (UInt(x), UInt(y)) => Some(x.cmp(y)),
        (Int(x), UInt(y)) => Some(i128::from(*x).cmp(&i128::from(*y))),
        (UInt(x), Int(y)) => Some(i128::from(*x).cmp(&i128::from(*y))),
        (Float(x), Float(y)) if x == y => Some(Ordering::Equal),
        (Float(x), Float(y)) => Some(x.total_cmp(y)),
        (Float(x), Int(y)) => Some(int_vs_float(i128::from(*y), *x).reverse()),
        (Float(x), UInt(y)) => Some(int_vs_float(i128::from(*y), *x).reverse()),
        (Int(x), Float(y)) => Some(int_vs_float(i128::from(*x), *y)),
        (UInt(x), Float(y)) => Some(int_vs_float(i128::from(*x), *y)),
        _ => None,
    }
}

/// Orders an integer against a float without converting either lossily.
fn int_vs_float(i: i128, f: f64) -> Ordering {
    if f.is_nan() {
        return if f.is_sign_negative() {
            Ordering::Greater
        } else {
            Ordering::Less
        };
    }
    // 2^127, exactly representable; also catches the infinities.
    let limit = i128::MAX as f64;
    if f >= limit {
        return Ordering::Less;
    }
    if f < -limit {
        return Ordering::Greater;
    }
    let floor = f.floor();
    match i.cmp(&(floor as i128)) {
        Ordering::Equal if f > floor => Ordering::Less,
        ord => ord,
    }
}

/// Returns true if the two values compare equal.
#[must_use]
pub fn equals(a: &Value, b: &Value) -> bool {
    compare(a, b) == Some(Ordering::Equal)
}

/// Conversion of a field into a [`Value`].
pub trait ToValue {
    /// Returns the field's current value.
    fn to_value(&self) -> Value;
}

/// Conversion of a [`Value`] into a field type.
pub trait FromValue: Sized {
    /// The kind name reported when conversion fails.
    const EXPECTED: &'static str;

    /// Converts `value`, or returns `None` if it does not fit this type.
    fn from_value(value: &Value) -> Option<Self>;
}

/// Object-safe writer used by record descriptors.
pub trait Assign {
    /// Overwrites `self` with `value`.
    ///
    /// # Errors
    ///
    /// Returns the name of the expected kind if `value` does not fit.
    fn assign(&mut self, value: &Value) -> Result<(), &'static str>;
}

impl<T: FromValue> Assign for T {
    fn assign(&mut self, value: &Value) -> Result<(), &'static str> {
        *self = T::from_value(value).ok_or(T::EXPECTED)?;
        Ok(())
    }
}

impl<T: Clone + Into<Value>> ToValue for T {
    fn to_value(&self) -> Value {
        self.clone().into()
    }
}

impl FromValue for bool {
    const EXPECTED: &'static str = "bool";

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl FromValue for String {
    const EXPECTED: &'static str = "string";

    fn from_value(value: &Value) -> Option<Self> {
        value.as_str().map(str::to_string)
    }
}

impl<T: FromValue> FromValue for Option<T> {
    const EXPECTED: &'static str = T::EXPECTED;

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Null => Some(None),
            other => T::from_value(other).map(Some),
        }
    }
}

macro_rules! integer_from_value {
    ($($t:ty => $name:literal),*) => {$(
        impl FromValue for $t {
            const EXPECTED: &'static str = $name;

            fn from_value(value: &Value) -> Option<Self> {
                match value {
                    Value::Int(i) => <$t>::try_from(*i).ok(),
                    Value::UInt(u) => <$t>::try_from(*u).ok(),
                    Value::Float(f) if f.is_finite() && f.fract() == 0.0 => {
                        <$t>::try_from(*f as i128).ok()
                    }
                    _ => None,
                }
            }
        }
    )*};
}

integer_from_value!(
    i8 => "i8", i16 => "i16", i32 => "i32", i64 => "i64", isize => "isize",
    u8 => "u8", u16 => "u16", u32 => "u32", u64 => "u64", usize => "usize"
);

macro_rules! float_from_value {
    ($($t:ty),*) => {$(
        impl FromValue for $t {
            const EXPECTED: &'static str = "float";

            fn from_value(value: &Value) -> Option<Self> {
                match value {
                    Value::Float(f) => Some(*f as $t),
                    Value::Int(i) => Some(*i as $t),
                    Value::UInt(u) => Some(*u as $t),
                    _ => None,
                }
            }
        }
    )*};
}

float_from_value!(f32, f64);
