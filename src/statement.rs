use std::collections::{BTreeMap, HashMap};

use prost_types::value::Kind;
use prost_types::Value;

use crate::proto::spanner::{Type, TypeCode};

/// A SQL statement with named parameters.
///
/// Parameters are referenced in the SQL text as `@name`.
/// ```
/// use spanner_core::statement::Statement;
///
/// let mut stmt = Statement::new("SELECT * FROM Guild WHERE UserId = @UserId");
/// stmt.add_param("UserId", &"user-1");
/// ```
#[derive(Clone, Default)]
pub struct Statement {
    pub(crate) sql: String,
    pub(crate) params: BTreeMap<String, Value>,
    pub(crate) param_types: HashMap<String, Type>,
}

impl Statement {
    pub fn new(sql: impl Into<String>) -> Self {
        Statement {
            sql: sql.into(),
            params: BTreeMap::new(),
            param_types: HashMap::new(),
        }
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn add_param<T>(&mut self, name: &str, value: &T)
    where
        T: ToKind,
    {
        self.params.insert(
            name.to_string(),
            Value {
                kind: Some(value.to_kind()),
            },
        );
        self.param_types.insert(name.to_string(), T::get_type());
    }
}

pub(crate) fn single_type(code: TypeCode) -> Type {
    Type {
        code: code as i32,
        array_element_type: None,
    }
}

/// Conversion into the protobuf value representation Spanner expects.
pub trait ToKind {
    fn to_kind(&self) -> Kind;
    fn get_type() -> Type
    where
        Self: Sized;
}

impl ToKind for bool {
    fn to_kind(&self) -> Kind {
        Kind::BoolValue(*self)
    }
    fn get_type() -> Type {
        single_type(TypeCode::Bool)
    }
}

impl ToKind for i64 {
    // INT64 travels as a decimal string on the wire.
    fn to_kind(&self) -> Kind {
        Kind::StringValue(self.to_string())
    }
    fn get_type() -> Type {
        single_type(TypeCode::Int64)
    }
}

impl ToKind for f64 {
    fn to_kind(&self) -> Kind {
        Kind::NumberValue(*self)
    }
    fn get_type() -> Type {
        single_type(TypeCode::Float64)
    }
}

impl ToKind for &str {
    fn to_kind(&self) -> Kind {
        Kind::StringValue(self.to_string())
    }
    fn get_type() -> Type {
        single_type(TypeCode::String)
    }
}

impl ToKind for String {
    fn to_kind(&self) -> Kind {
        Kind::StringValue(self.clone())
    }
    fn get_type() -> Type {
        single_type(TypeCode::String)
    }
}

impl<T> ToKind for Option<T>
where
    T: ToKind,
{
    fn to_kind(&self) -> Kind {
        match self {
            Some(v) => v.to_kind(),
            None => Kind::NullValue(0),
        }
    }
    fn get_type() -> Type {
        T::get_type()
    }
}
