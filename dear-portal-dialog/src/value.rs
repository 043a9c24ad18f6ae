//! Bus-independent model of incoming message arguments.
//!
//! Transports convert whatever their bus library hands them into [`Value`]s so
//! that reply readers can be written (and tested) without a live bus.

/// A single argument value of an incoming message.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Bool(bool),
    Byte(u8),
    U32(u32),
    Str(String),
    ObjectPath(String),
    /// A value boxed in a variant (`v`)
    Variant(Box<Value>),
    Array(Vec<Value>),
    Struct(Vec<Value>),
    /// Dictionary entries in wire order
    Dict(Vec<(Value, Value)>),
    /// Any other type, carried by signature only
    Other(String),
}

impl Value {
    /// Short type name used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Bool(_) => "boolean",
            Value::Byte(_) => "byte",
            Value::U32(_) => "uint32",
            Value::Str(_) => "string",
            Value::ObjectPath(_) => "object path",
            Value::Variant(_) => "variant",
            Value::Array(_) => "array",
            Value::Struct(_) => "struct",
            Value::Dict(_) => "dict",
            Value::Other(_) => "unsupported type",
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_object_path(&self) -> Option<&str> {
        match self {
            Value::ObjectPath(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_u32(&self) -> Option<u32> {
        match self {
            Value::U32(n) => Some(*n),
            _ => None,
        }
    }

    /// Contents of a variant, or `None` for any other value.
    pub fn variant_inner(&self) -> Option<&Value> {
        match self {
            Value::Variant(inner) => Some(inner),
            _ => None,
        }
    }

    /// Convenience for building `a{sv}` dictionaries.
    pub fn string_dict<I, K>(entries: I) -> Value
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        Value::Dict(
            entries
                .into_iter()
                .map(|(k, v)| (Value::Str(k.into()), Value::Variant(Box::new(v))))
                .collect(),
        )
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Value::U32(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}
