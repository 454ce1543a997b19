use std::fmt;
use std::sync::Arc;

use crate::class::ClassId;
use crate::object::Object;

/// Dynamically typed argument or return value of a message send.
#[derive(Clone, Debug, Default)]
pub enum Value {
    #[default]
    Unit,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Arc<str>),
    Object(Object),
    Class(ClassId),
}

impl Value {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&Object> {
        match self {
            Value::Object(object) => Some(object),
            _ => None,
        }
    }

    pub fn is_unit(&self) -> bool {
        matches!(self, Value::Unit)
    }
}

impl From<()> for Value {
    fn from(_: ()) -> Self {
        Value::Unit
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Str(Arc::from(value))
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Str(Arc::from(value))
    }
}

impl From<Object> for Value {
    fn from(value: Object) -> Self {
        Value::Object(value)
    }
}

impl From<ClassId> for Value {
    fn from(value: ClassId) -> Self {
        Value::Class(value)
    }
}

/// The `self` of a message: an instance, or a class for class-level methods.
#[derive(Clone, Debug)]
pub enum Receiver {
    Object(Object),
    Class(ClassId),
}

impl Receiver {
    pub fn as_object(&self) -> Option<&Object> {
        match self {
            Receiver::Object(object) => Some(object),
            Receiver::Class(_) => None,
        }
    }

    /// The class whose table a send to this receiver starts from.
    pub fn class(&self) -> ClassId {
        match self {
            Receiver::Object(object) => object.class(),
            Receiver::Class(class) => *class,
        }
    }
}

impl From<Object> for Receiver {
    fn from(object: Object) -> Self {
        Receiver::Object(object)
    }
}

impl From<&Object> for Receiver {
    fn from(object: &Object) -> Self {
        Receiver::Object(object.clone())
    }
}

/// Executable behavior bound to a (class, method) slot.
pub type Implementation = Arc<dyn Fn(&Receiver, &[Value]) -> Value + Send + Sync + 'static>;

/// Boxes a closure as an [`Implementation`].
pub fn implementation(
    body: impl Fn(&Receiver, &[Value]) -> Value + Send + Sync + 'static,
) -> Implementation {
    Arc::new(body)
}

pub(crate) struct DebugImplementation<'a>(pub(crate) &'a Implementation);

impl fmt::Debug for DebugImplementation<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Implementation({:p})", Arc::as_ptr(self.0) as *const ())
    }
}
