//! Structural descriptors for record types.
//!
//! A record type describes its fields once through [`Reflect`], usually via
//! the [`impl_reflect!`](crate::impl_reflect) macro. The free functions in
//! this module navigate those descriptors by field name or dotted path
//! (`"role.name"`), read and write field values, and look up serialization
//! tags.
//!
//! ```rust
//! use tabula_core::impl_reflect;
//! use tabula_core::reflect::{field_by_path, set_field, tag_for};
//! use tabula_core::value::Value;
//!
//! #[derive(Default)]
//! struct Engine { power: u32 }
//! #[derive(Default)]
//! struct Car { id: u64, city: String, engine: Engine }
//!
//! impl_reflect!(Engine { value power });
//! impl_reflect!(Car {
//!     value id,
//!     value city as { "json": "city_name" },
//!     nested engine,
//! });
//!
//! let mut car = Car::default();
//! set_field(&mut car, "engine.power", &Value::UInt(300)).unwrap();
//! assert_eq!(field_by_path(&car, "engine.power").unwrap(), Value::UInt(300));
//! assert_eq!(tag_for(&car, "city", "json"), Some("city_name"));
//! ```

use crate::error::{CoreError, CoreResult};
use crate::value::{Assign, Value};

/// A field as seen through a descriptor.
pub enum Field<'a> {
    /// A scalar field and its current value.
    Value(Value),
    /// A nested record.
    Record(&'a dyn Reflect),
}

/// A writable field as seen through a descriptor.
pub enum FieldMut<'a> {
    /// A scalar field.
    Value(&'a mut dyn Assign),
    /// A nested record.
    Record(&'a mut dyn Reflect),
}

/// Field-level descriptor of a record type.
pub trait Reflect {
    /// Name of the record type.
    fn type_name(&self) -> &'static str;

    /// Field names in declaration order.
    fn field_names(&self) -> &'static [&'static str];

    /// Looks up a field by its struct-level name.
    fn field(&self, name: &str) -> Option<Field<'_>>;

    /// Looks up a writable field by its struct-level name.
    fn field_mut(&mut self, name: &str) -> Option<FieldMut<'_>>;

    /// Declared tag of `field` in `namespace`, if any.
    fn tag(&self, _field: &str, _namespace: &str) -> Option<&'static str> {
        None
    }
}

impl<T: Reflect + ?Sized> Reflect for Box<T> {
    fn type_name(&self) -> &'static str {
        (**self).type_name()
    }

    fn field_names(&self) -> &'static [&'static str] {
        (**self).field_names()
    }

    fn field(&self, name: &str) -> Option<Field<'_>> {
        (**self).field(name)
    }

    fn field_mut(&mut self, name: &str) -> Option<FieldMut<'_>> {
        (**self).field_mut(name)
    }

    fn tag(&self, field: &str, namespace: &str) -> Option<&'static str> {
        (**self).tag(field, namespace)
    }
}

fn split(path: &str) -> Vec<&str> {
    path.split('.').collect()
}

/// Reads the scalar value at `path`.
///
/// # Errors
///
/// - [`CoreError::FieldNotFound`] if a segment names no field
/// - [`CoreError::NotStruct`] if an intermediate segment is a scalar
/// - [`CoreError::TypeMismatch`] if the path ends at a nested record
pub fn field_by_path(record: &dyn Reflect, path: &str) -> CoreResult<Value> {
    read_in(record, &split(path), path)
}

fn read_in(record: &dyn Reflect, segments: &[&str], path: &str) -> CoreResult<Value> {
    let Some((head, rest)) = segments.split_first() else {
        return Err(CoreError::field_not_found(record.type_name(), path));
    };
    match record.field(head) {
        None => Err(CoreError::field_not_found(record.type_name(), *head)),
        Some(Field::Value(value)) if rest.is_empty() => Ok(value),
        Some(Field::Value(_)) => Err(CoreError::NotStruct {
            path: path.to_string(),
            segment: (*head).to_string(),
        }),
        Some(Field::Record(inner)) if !rest.is_empty() => read_in(inner, rest, path),
        Some(Field::Record(_)) => Err(CoreError::TypeMismatch {
            field: path.to_string(),
            expected: "scalar",
            found: "record",
        }),
    }
}

/// Writes `value` into the scalar field at `path`.
///
/// # Errors
///
/// Same lookup errors as [`field_by_path`], plus
/// [`CoreError::TypeMismatch`] if `value` does not fit the field's type.
pub fn set_field(record: &mut dyn Reflect, path: &str, value: &Value) -> CoreResult<()> {
    write_in(record, &split(path), path, value)
}

fn write_in(
    record: &mut dyn Reflect,
    segments: &[&str],
    path: &str,
    value: &Value,
) -> CoreResult<()> {
    let type_name = record.type_name();
    let Some((head, rest)) = segments.split_first() else {
        return Err(CoreError::field_not_found(type_name, path));
    };
    match record.field_mut(head) {
        None => Err(CoreError::field_not_found(type_name, *head)),
        Some(FieldMut::Value(slot)) if rest.is_empty() => {
            slot.assign(value).map_err(|expected| CoreError::TypeMismatch {
                field: path.to_string(),
                expected,
                found: value.kind(),
            })
        }
        Some(FieldMut::Value(_)) => Err(CoreError::NotStruct {
            path: path.to_string(),
            segment: (*head).to_string(),
        }),
        Some(FieldMut::Record(inner)) if !rest.is_empty() => write_in(inner, rest, path, value),
        Some(FieldMut::Record(_)) => Err(CoreError::TypeMismatch {
            field: path.to_string(),
            expected: "record",
            found: value.kind(),
        }),
    }
}

/// Returns the tag declared for `field` in `namespace`, or `None` when the
/// field has no tag there (or does not exist).
#[must_use]
pub fn tag_for(record: &dyn Reflect, field: &str, namespace: &str) -> Option<&'static str> {
    record.tag(field, namespace)
}

/// Translates a struct-level path into its serialized form, segment by
/// segment, using tags from `namespace`.
///
/// Untagged segments pass through unchanged, as does everything after a
/// segment that does not lead to a nested record.
#[must_use]
pub fn storage_path(record: &dyn Reflect, path: &str, namespace: &str) -> String {
    let mut out = Vec::new();
    let mut current = Some(record);
    for segment in path.split('.') {
        match current {
            Some(rec) => {
                out.push(rec.tag(segment, namespace).unwrap_or(segment).to_string());
                current = match rec.field(segment) {
                    Some(Field::Record(inner)) => Some(inner),
                    _ => None,
                };
            }
            None => out.push(segment.to_string()),
        }
    }
    out.join(".")
}

/// Declares a [`Reflect`] descriptor for a struct.
///
/// Each field is listed as `value name` (a scalar implementing
/// [`ToValue`](crate::value::ToValue) and [`Assign`]) or `nested name` (a
/// field whose type itself implements [`Reflect`]). Tags follow `as`:
///
/// ```rust
/// # use tabula_core::impl_reflect;
/// # #[derive(Clone)] struct Role { name: String }
/// # struct User { id: u64, login: String, role: Role }
/// # impl_reflect!(Role { value name });
/// impl_reflect!(User {
///     value id,
///     value login as { "json": "login", "form": "username" },
///     nested role,
/// });
/// ```
#[macro_export]
macro_rules! impl_reflect {
    (@get value $e:expr) => {
        $crate::reflect::Field::Value($crate::value::ToValue::to_value(&$e))
    };
    (@get nested $e:expr) => {
        $crate::reflect::Field::Record(&$e)
    };
    (@set value $e:expr) => {
        $crate::reflect::FieldMut::Value(&mut $e)
    };
    (@set nested $e:expr) => {
        $crate::reflect::FieldMut::Record(&mut $e)
    };
    ($ty:ident {
        $($kind:ident $field:ident $(as { $($ns:literal : $tag:literal),* $(,)? })?),* $(,)?
    }) => {
        impl $crate::reflect::Reflect for $ty {
            fn type_name(&self) -> &'static str {
                stringify!($ty)
            }

            fn field_names(&self) -> &'static [&'static str] {
                &[$(stringify!($field)),*]
            }

            fn field(&self, name: &str) -> Option<$crate::reflect::Field<'_>> {
                match name {
                    $(stringify!($field) => Some($crate::impl_reflect!(@get $kind self.$field)),)*
                    _ => None,
                }
            }

            fn field_mut(&mut self, name: &str) -> Option<$crate::reflect::FieldMut<'_>> {
                match name {
                    $(stringify!($field) => Some($crate::impl_reflect!(@set $kind self.$field)),)*
                    _ => None,
                }
            }

            fn tag(&self, field: &str, namespace: &str) -> Option<&'static str> {
                match (field, namespace) {
                    $($($((stringify!($field), $ns) => Some($tag),)*)?)*
                    _ => None,
                }
            }
        }
    };
}
