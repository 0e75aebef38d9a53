//! A small management interface: named objects exposing read-only attributes
//! that can be looked up by [`ObjectName`] and attribute name.

use num_traits::ToPrimitive;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use thiserror::Error;

pub mod object_name;
pub mod worker;

pub use object_name::{MalformedObjectName, ObjectName, worker_object_name};

#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    Int(i64),
    UInt(u64),
    Float(f64),
    Bool(bool),
    Text(String),
}

impl AttributeValue {
    /// The numeric reading of this value, if it has one.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            AttributeValue::Int(v) => v.to_f64(),
            AttributeValue::UInt(v) => v.to_f64(),
            AttributeValue::Float(v) => Some(*v),
            AttributeValue::Bool(_) | AttributeValue::Text(_) => None,
        }
    }
}

impl From<i64> for AttributeValue {
    fn from(value: i64) -> Self {
        AttributeValue::Int(value)
    }
}

impl From<u64> for AttributeValue {
    fn from(value: u64) -> Self {
        AttributeValue::UInt(value)
    }
}

impl From<usize> for AttributeValue {
    fn from(value: usize) -> Self {
        AttributeValue::UInt(value.to_u64().unwrap_or(u64::MAX))
    }
}

impl From<f64> for AttributeValue {
    fn from(value: f64) -> Self {
        AttributeValue::Float(value)
    }
}

impl From<bool> for AttributeValue {
    fn from(value: bool) -> Self {
        AttributeValue::Bool(value)
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        AttributeValue::Text(value.to_owned())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        AttributeValue::Text(value)
    }
}

#[derive(Debug, Error)]
pub enum LookupError {
    #[error("instance not found: {0}")]
    InstanceNotFound(ObjectName),

    #[error("instance already registered: {0}")]
    AlreadyRegistered(ObjectName),

    #[error("attribute [{attribute}] not found on {object}")]
    AttributeNotFound {
        object: ObjectName,
        attribute: String,
    },

    #[error("attribute [{attribute}] of {object} is not numeric: {value:?}")]
    NotNumeric {
        object: ObjectName,
        attribute: String,
        value: AttributeValue,
    },

    #[error("management interface is unreachable: {0}")]
    Connection(String),

    #[error(transparent)]
    MalformedName(#[from] MalformedObjectName),
}

/// Read access to named attributes of managed objects.
///
/// Implementations are queried concurrently by metric scrapes.
pub trait AttributeSource: Send + Sync {
    fn attribute(&self, object: &ObjectName, attribute: &str)
    -> Result<AttributeValue, LookupError>;

    /// Looks up an attribute and converts it to a gauge reading.
    fn numeric_attribute(&self, object: &ObjectName, attribute: &str) -> Result<f64, LookupError> {
        let value = self.attribute(object, attribute)?;
        value.as_f64().ok_or_else(|| LookupError::NotNumeric {
            object: object.clone(),
            attribute: attribute.to_owned(),
            value,
        })
    }
}

pub trait ManagedObject: Send + Sync {
    fn attribute(&self, name: &str) -> Option<AttributeValue>;

    fn attribute_names(&self) -> Vec<&'static str>;
}

/// In-process registry of managed objects.
#[derive(Default)]
pub struct ManagementServer {
    objects: RwLock<HashMap<ObjectName, Arc<dyn ManagedObject>>>,
}

impl ManagementServer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &self,
        name: ObjectName,
        object: Arc<dyn ManagedObject>,
    ) -> Result<(), LookupError> {
        let mut objects = self.objects.write().unwrap_or_else(|e| e.into_inner());
        if objects.contains_key(&name) {
            return Err(LookupError::AlreadyRegistered(name));
        }

        tracing::debug!(
            %name,
            attributes = ?object.attribute_names(),
            "Registered managed object"
        );
        objects.insert(name, object);
        Ok(())
    }

    pub fn unregister(&self, name: &ObjectName) -> Result<(), LookupError> {
        let mut objects = self.objects.write().unwrap_or_else(|e| e.into_inner());
        match objects.remove(name) {
            Some(_) => Ok(()),
            None => Err(LookupError::InstanceNotFound(name.clone())),
        }
    }

    pub fn names(&self) -> Vec<ObjectName> {
        let objects = self.objects.read().unwrap_or_else(|e| e.into_inner());
        let mut names = objects.keys().cloned().collect::<Vec<_>>();
        names.sort();
        names
    }

    fn find(&self, name: &ObjectName) -> Result<Arc<dyn ManagedObject>, LookupError> {
        let objects = self.objects.read().unwrap_or_else(|e| e.into_inner());
        objects
            .get(name)
            .cloned()
            .ok_or_else(|| LookupError::InstanceNotFound(name.clone()))
    }
}

impl AttributeSource for ManagementServer {
    fn attribute(
        &self,
        object: &ObjectName,
        attribute: &str,
    ) -> Result<AttributeValue, LookupError> {
        self.find(object)?
            .attribute(attribute)
            .ok_or_else(|| LookupError::AttributeNotFound {
                object: object.clone(),
                attribute: attribute.to_owned(),
            })
    }
}
