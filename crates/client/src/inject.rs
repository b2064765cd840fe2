// Copyright The Embedded Kafka Harness Authors
// SPDX-License-Identifier: Apache-2.0

//! Type information and construction hooks for injectable clients.
//!
//! Generic type arguments are not observable at runtime, so each injectable client type
//! declares them through [`Injectable`]. A [`ParameterType`] is the erased view the resolvers
//! work from: the client family ([`RawType`]), the key and value types, and a constructor.

use crate::config::ClientProperties;
use crate::error::ClientError;
use std::any::{Any, TypeId, type_name};
use std::fmt;

/// Runtime identity and display name of a type.
#[derive(Clone, Copy, Eq)]
pub struct TypeToken {
    id: TypeId,
    name: &'static str,
}

impl TypeToken {
    /// Token of `T`.
    #[must_use]
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: type_name::<T>(),
        }
    }

    /// True when the token denotes `T`.
    #[must_use]
    pub fn is<T: ?Sized + 'static>(&self) -> bool {
        self.id == TypeId::of::<T>()
    }

    /// Type name, for messages.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for TypeToken {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl std::hash::Hash for TypeToken {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for TypeToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// A client family regardless of its type arguments (`KafkaProducer`, `KafkaTemplate`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RawType(&'static str);

impl RawType {
    /// Declares a family by name.
    #[must_use]
    pub const fn new(name: &'static str) -> Self {
        Self(name)
    }

    /// Family name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.0
    }
}

impl fmt::Display for RawType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

/// Raw type of [`ClientProperties`].
pub const CLIENT_PROPERTIES: RawType = RawType::new("ClientProperties");

/// What a resolver hands to a client constructor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientSpec {
    /// Merged client properties.
    pub properties: ClientProperties,
    /// Topics to subscribe to (consumers only).
    pub topics: Vec<String>,
}

/// Releases a resolved value at teardown.
pub type Disposer = Box<dyn FnOnce() -> Result<(), ClientError> + Send>;

/// A client that holds broker resources until closed.
pub trait Closeable {
    /// Releases the client's resources. Idempotent.
    fn close(&self) -> Result<(), ClientError>;
}

/// A resolved parameter value with an optional disposal action.
pub struct DisposableParameter {
    value: Box<dyn Any + Send>,
    type_name: &'static str,
    disposer: Option<Disposer>,
}

impl DisposableParameter {
    /// A value that needs no disposal.
    pub fn plain<T: Any + Send>(value: T) -> Self {
        Self {
            value: Box::new(value),
            type_name: type_name::<T>(),
            disposer: None,
        }
    }

    /// A value released by `disposer` at teardown.
    pub fn new<T, F>(value: T, disposer: F) -> Self
    where
        T: Any + Send,
        F: FnOnce() -> Result<(), ClientError> + Send + 'static,
    {
        Self {
            value: Box::new(value),
            type_name: type_name::<T>(),
            disposer: Some(Box::new(disposer)),
        }
    }

    /// A closeable handle, closed at teardown through a clone of itself.
    pub fn closeable<T>(value: T) -> Self
    where
        T: Closeable + Clone + Any + Send,
    {
        let handle = value.clone();
        Self::new(value, move || handle.close())
    }

    /// Name of the value's type.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// True when a disposal action is attached.
    #[must_use]
    pub fn has_disposer(&self) -> bool {
        self.disposer.is_some()
    }

    /// Splits into the erased value and its disposer.
    #[must_use]
    pub fn into_parts(self) -> (Box<dyn Any + Send>, &'static str, Option<Disposer>) {
        (self.value, self.type_name, self.disposer)
    }
}

impl fmt::Debug for DisposableParameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DisposableParameter")
            .field("type_name", &self.type_name)
            .field("has_disposer", &self.disposer.is_some())
            .finish()
    }
}

/// A client type that can be injected into a test.
pub trait Injectable: Any + Send + Sized {
    /// Client family.
    const RAW: RawType;

    /// Key and value types, when the family is parameterized by them.
    fn type_arguments() -> Option<(TypeToken, TypeToken)> {
        None
    }

    /// Builds the client from merged properties (and topics, for consumers).
    fn construct(spec: ClientSpec) -> Result<DisposableParameter, ClientError>;
}

impl Injectable for ClientProperties {
    const RAW: RawType = CLIENT_PROPERTIES;

    fn construct(spec: ClientSpec) -> Result<DisposableParameter, ClientError> {
        Ok(DisposableParameter::plain(spec.properties))
    }
}

type Constructor = fn(ClientSpec) -> Result<DisposableParameter, ClientError>;

/// Declared type of a test parameter.
#[derive(Clone, Copy)]
pub struct ParameterType {
    raw: RawType,
    declared: TypeToken,
    arguments: Option<(TypeToken, TypeToken)>,
    constructor: Option<Constructor>,
}

impl ParameterType {
    /// An injectable client type.
    #[must_use]
    pub fn of<T: Injectable>() -> Self {
        Self {
            raw: T::RAW,
            declared: TypeToken::of::<T>(),
            arguments: T::type_arguments(),
            constructor: Some(T::construct),
        }
    }

    /// Any other type (`String`, `u16`, ...). Only the address resolver handles these.
    #[must_use]
    pub fn plain<T: Any>() -> Self {
        Self {
            raw: RawType::new(type_name::<T>()),
            declared: TypeToken::of::<T>(),
            arguments: None,
            constructor: None,
        }
    }

    /// Client family.
    #[must_use]
    pub fn raw(&self) -> RawType {
        self.raw
    }

    /// The full declared type.
    #[must_use]
    pub fn declared(&self) -> TypeToken {
        self.declared
    }

    /// True when the declared type is `T`.
    #[must_use]
    pub fn is<T: Any>(&self) -> bool {
        self.declared.is::<T>()
    }

    /// Key type argument.
    #[must_use]
    pub fn key_type(&self) -> Option<TypeToken> {
        self.arguments.map(|(key, _)| key)
    }

    /// Value type argument.
    #[must_use]
    pub fn value_type(&self) -> Option<TypeToken> {
        self.arguments.map(|(_, value)| value)
    }

    /// Runs the type's constructor; `None` for types without one.
    pub fn construct(&self, spec: ClientSpec) -> Option<Result<DisposableParameter, ClientError>> {
        self.constructor.map(|constructor| constructor(spec))
    }
}

impl fmt::Debug for ParameterType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParameterType")
            .field("raw", &self.raw)
            .field("declared", &self.declared)
            .field("arguments", &self.arguments)
            .finish_non_exhaustive()
    }
}
