// Copyright The Embedded Kafka Harness Authors
// SPDX-License-Identifier: Apache-2.0

//! Serializers, deserializers and codec classes.
//!
//! A [`CodecClass`] identifies a codec implementation without instantiating it, the way a class
//! name does in a client property. Clients instantiate the class when they are built and check
//! that it targets their key or value type.

use crate::error::{ClientError, CodecError};
use crate::inject::TypeToken;
use bytes::Bytes;
use std::any::{Any, type_name};
use std::fmt;
use std::sync::OnceLock;

/// Encodes values of type `T`.
pub trait Serializer<T>: Send + Sync {
    /// Serializes `data` destined for `topic`.
    fn serialize(&self, topic: &str, data: &T) -> Result<Bytes, CodecError>;
}

/// Decodes values of type `T`.
pub trait Deserializer<T>: Send + Sync {
    /// Deserializes `data` read from `topic`.
    fn deserialize(&self, topic: &str, data: &[u8]) -> Result<T, CodecError>;
}

/// A serializer that can be named in client properties.
pub trait SerializerClass: Serializer<Self::Target> + Default + 'static {
    /// Type the serializer encodes.
    type Target: 'static;
    /// Name used in client properties.
    const NAME: &'static str;
}

/// A deserializer that can be named in client properties.
pub trait DeserializerClass: Deserializer<Self::Target> + Default + 'static {
    /// Type the deserializer decodes.
    type Target: 'static;
    /// Name used in client properties.
    const NAME: &'static str;
}

/// Direction of a codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CodecKind {
    /// Value to bytes.
    Serializer,
    /// Bytes to value.
    Deserializer,
}

impl fmt::Display for CodecKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Serializer => "serializer",
            Self::Deserializer => "deserializer",
        })
    }
}

/// An uninstantiated codec: name, kind, target type and constructor.
#[derive(Clone, Copy)]
pub struct CodecClass {
    name: &'static str,
    kind: CodecKind,
    target: fn() -> TypeToken,
    instantiate: fn() -> Box<dyn Any + Send + Sync>,
}

impl CodecClass {
    /// Class of a serializer.
    #[must_use]
    pub fn serializer<S: SerializerClass>() -> Self {
        Self {
            name: S::NAME,
            kind: CodecKind::Serializer,
            target: TypeToken::of::<S::Target>,
            instantiate: instantiate_serializer::<S>,
        }
    }

    /// Class of a deserializer.
    #[must_use]
    pub fn deserializer<D: DeserializerClass>() -> Self {
        Self {
            name: D::NAME,
            kind: CodecKind::Deserializer,
            target: TypeToken::of::<D::Target>,
            instantiate: instantiate_deserializer::<D>,
        }
    }

    /// Codec name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Codec direction.
    #[must_use]
    pub fn kind(&self) -> CodecKind {
        self.kind
    }

    /// Type the codec handles.
    #[must_use]
    pub fn target_type(&self) -> TypeToken {
        (self.target)()
    }

    /// Instantiates the codec as a serializer of `T`.
    pub fn new_serializer<T: 'static>(&self) -> Result<Box<dyn Serializer<T>>, ClientError> {
        self.instantiate_as::<Box<dyn Serializer<T>>, T>(CodecKind::Serializer)
    }

    /// Instantiates the codec as a deserializer of `T`.
    pub fn new_deserializer<T: 'static>(&self) -> Result<Box<dyn Deserializer<T>>, ClientError> {
        self.instantiate_as::<Box<dyn Deserializer<T>>, T>(CodecKind::Deserializer)
    }

    fn instantiate_as<C: 'static, T: 'static>(&self, kind: CodecKind) -> Result<C, ClientError> {
        let mismatch = || ClientError::CodecMismatch {
            codec: self.name,
            kind: kind.to_string(),
            expected: type_name::<T>(),
        };
        if self.kind != kind {
            return Err(mismatch());
        }
        (self.instantiate)()
            .downcast::<C>()
            .map(|codec| *codec)
            .map_err(|_| mismatch())
    }
}

fn instantiate_serializer<S: SerializerClass>() -> Box<dyn Any + Send + Sync> {
    let serializer: Box<dyn Serializer<S::Target>> = Box::new(S::default());
    Box::new(serializer)
}

fn instantiate_deserializer<D: DeserializerClass>() -> Box<dyn Any + Send + Sync> {
    let deserializer: Box<dyn Deserializer<D::Target>> = Box::new(D::default());
    Box::new(deserializer)
}

impl PartialEq for CodecClass {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.kind == other.kind
    }
}

impl Eq for CodecClass {}

impl fmt::Debug for CodecClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CodecClass")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .finish()
    }
}

impl fmt::Display for CodecClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// UTF-8 string serializer.
#[derive(Debug, Default, Clone, Copy)]
pub struct StringSerializer;

impl Serializer<String> for StringSerializer {
    fn serialize(&self, _topic: &str, data: &String) -> Result<Bytes, CodecError> {
        Ok(Bytes::copy_from_slice(data.as_bytes()))
    }
}

impl SerializerClass for StringSerializer {
    type Target = String;
    const NAME: &'static str = "StringSerializer";
}

/// UTF-8 string deserializer.
#[derive(Debug, Default, Clone, Copy)]
pub struct StringDeserializer;

impl Deserializer<String> for StringDeserializer {
    fn deserialize(&self, _topic: &str, data: &[u8]) -> Result<String, CodecError> {
        String::from_utf8(data.to_vec())
            .map_err(|e| CodecError::new(<Self as DeserializerClass>::NAME, e.to_string()))
    }
}

impl DeserializerClass for StringDeserializer {
    type Target = String;
    const NAME: &'static str = "StringDeserializer";
}

/// Pass-through serializer for byte vectors.
#[derive(Debug, Default, Clone, Copy)]
pub struct ByteArraySerializer;

impl Serializer<Vec<u8>> for ByteArraySerializer {
    fn serialize(&self, _topic: &str, data: &Vec<u8>) -> Result<Bytes, CodecError> {
        Ok(Bytes::copy_from_slice(data))
    }
}

impl SerializerClass for ByteArraySerializer {
    type Target = Vec<u8>;
    const NAME: &'static str = "ByteArraySerializer";
}

/// Pass-through deserializer for byte vectors.
#[derive(Debug, Default, Clone, Copy)]
pub struct ByteArrayDeserializer;

impl Deserializer<Vec<u8>> for ByteArrayDeserializer {
    fn deserialize(&self, _topic: &str, data: &[u8]) -> Result<Vec<u8>, CodecError> {
        Ok(data.to_vec())
    }
}

impl DeserializerClass for ByteArrayDeserializer {
    type Target = Vec<u8>;
    const NAME: &'static str = "ByteArrayDeserializer";
}

/// Pass-through serializer for shared buffers.
#[derive(Debug, Default, Clone, Copy)]
pub struct BytesSerializer;

impl Serializer<Bytes> for BytesSerializer {
    fn serialize(&self, _topic: &str, data: &Bytes) -> Result<Bytes, CodecError> {
        Ok(data.clone())
    }
}

impl SerializerClass for BytesSerializer {
    type Target = Bytes;
    const NAME: &'static str = "BytesSerializer";
}

/// Pass-through deserializer for shared buffers.
#[derive(Debug, Default, Clone, Copy)]
pub struct BytesDeserializer;

impl Deserializer<Bytes> for BytesDeserializer {
    fn deserialize(&self, _topic: &str, data: &[u8]) -> Result<Bytes, CodecError> {
        Ok(Bytes::copy_from_slice(data))
    }
}

impl DeserializerClass for BytesDeserializer {
    type Target = Bytes;
    const NAME: &'static str = "BytesDeserializer";
}

macro_rules! fixed_width_codec {
    ($serializer:ident, $deserializer:ident, $ty:ty) => {
        #[doc = concat!("Big-endian `", stringify!($ty), "` serializer.")]
        #[derive(Debug, Default, Clone, Copy)]
        pub struct $serializer;

        impl Serializer<$ty> for $serializer {
            fn serialize(&self, _topic: &str, data: &$ty) -> Result<Bytes, CodecError> {
                Ok(Bytes::copy_from_slice(&data.to_be_bytes()))
            }
        }

        impl SerializerClass for $serializer {
            type Target = $ty;
            const NAME: &'static str = stringify!($serializer);
        }

        #[doc = concat!("Big-endian `", stringify!($ty), "` deserializer.")]
        #[derive(Debug, Default, Clone, Copy)]
        pub struct $deserializer;

        impl Deserializer<$ty> for $deserializer {
            fn deserialize(&self, _topic: &str, data: &[u8]) -> Result<$ty, CodecError> {
                let width = size_of::<$ty>();
                let bytes = data.try_into().map_err(|_| {
                    CodecError::new(
                        stringify!($deserializer),
                        format!("expected {width} bytes, got {}", data.len()),
                    )
                })?;
                Ok(<$ty>::from_be_bytes(bytes))
            }
        }

        impl DeserializerClass for $deserializer {
            type Target = $ty;
            const NAME: &'static str = stringify!($deserializer);
        }
    };
}

fixed_width_codec!(ShortSerializer, ShortDeserializer, i16);
fixed_width_codec!(IntegerSerializer, IntegerDeserializer, i32);
fixed_width_codec!(LongSerializer, LongDeserializer, i64);
fixed_width_codec!(FloatSerializer, FloatDeserializer, f32);
fixed_width_codec!(DoubleSerializer, DoubleDeserializer, f64);

/// Every built-in codec class.
#[must_use]
pub fn builtin_codecs() -> &'static [CodecClass] {
    static CATALOG: OnceLock<Vec<CodecClass>> = OnceLock::new();
    CATALOG.get_or_init(|| {
        vec![
            CodecClass::serializer::<StringSerializer>(),
            CodecClass::deserializer::<StringDeserializer>(),
            CodecClass::serializer::<ByteArraySerializer>(),
            CodecClass::deserializer::<ByteArrayDeserializer>(),
            CodecClass::serializer::<BytesSerializer>(),
            CodecClass::deserializer::<BytesDeserializer>(),
            CodecClass::serializer::<ShortSerializer>(),
            CodecClass::deserializer::<ShortDeserializer>(),
            CodecClass::serializer::<IntegerSerializer>(),
            CodecClass::deserializer::<IntegerDeserializer>(),
            CodecClass::serializer::<LongSerializer>(),
            CodecClass::deserializer::<LongDeserializer>(),
            CodecClass::serializer::<FloatSerializer>(),
            CodecClass::deserializer::<FloatDeserializer>(),
            CodecClass::serializer::<DoubleSerializer>(),
            CodecClass::deserializer::<DoubleDeserializer>(),
        ]
    })
}

/// Finds a built-in codec by name.
#[must_use]
pub fn find_codec(name: &str) -> Option<CodecClass> {
    builtin_codecs()
        .iter()
        .find(|codec| codec.name() == name)
        .copied()
}

#[cfg(test)]
mod tests {
    use super::{
        CodecClass, CodecKind, Deserializer, IntegerDeserializer, LongSerializer, Serializer,
        StringSerializer, find_codec,
    };
    use crate::error::ClientError;
    use crate::inject::TypeToken;

    #[test]
    fn integer_deserializer_checks_width() {
        let error = IntegerDeserializer
            .deserialize("t", &[0, 1])
            .expect_err("two bytes are not an i32");
        assert_eq!(error.codec(), "IntegerDeserializer");
        assert_eq!(IntegerDeserializer.deserialize("t", &[0, 0, 1, 0]), Ok(256));
    }

    #[test]
    fn numbers_are_big_endian() {
        let encoded = LongSerializer.serialize("t", &1).expect("encodes");
        assert_eq!(encoded.as_ref(), &[0, 0, 0, 0, 0, 0, 0, 1]);
    }

    #[test]
    fn codec_class_instantiates_for_its_target_only() {
        let class = CodecClass::serializer::<StringSerializer>();
        assert_eq!(class.target_type(), TypeToken::of::<String>());
        assert_eq!(class.kind(), CodecKind::Serializer);

        let serializer = class.new_serializer::<String>().expect("string target");
        assert_eq!(
            serializer.serialize("t", &"hi".to_owned()).expect("encodes").as_ref(),
            b"hi"
        );

        assert!(matches!(
            class.new_serializer::<i32>(),
            Err(ClientError::CodecMismatch { codec: "StringSerializer", .. })
        ));
        assert!(matches!(
            class.new_deserializer::<String>(),
            Err(ClientError::CodecMismatch { .. })
        ));
    }

    #[test]
    fn catalog_finds_codecs_by_name() {
        let class = find_codec("DoubleDeserializer").expect("built in");
        assert_eq!(class.target_type(), TypeToken::of::<f64>());
        assert!(find_codec("AvroSerializer").is_none());
    }
}
