// Copyright The Embedded Kafka Harness Authors
// SPDX-License-Identifier: Apache-2.0

//! Guessing a codec from a key or value type.

use crate::codec::{CodecClass, CodecKind, builtin_codecs};
use crate::inject::TypeToken;
use std::sync::Arc;

/// Proposes codecs for key and value types.
pub trait SerializerTypeGuesser: Send + Sync {
    /// Serializer for `ty`, if this guesser knows one.
    fn guess_serializer_type(&self, ty: &TypeToken, is_key: bool) -> Option<CodecClass>;

    /// Deserializer for `ty`, if this guesser knows one.
    fn guess_deserializer_type(&self, ty: &TypeToken, is_key: bool) -> Option<CodecClass>;
}

/// Maps the built-in codec target types: `String`, `Vec<u8>`, `Bytes`, `i16`, `i32`, `i64`,
/// `f32` and `f64`.
#[derive(Debug, Default, Clone, Copy)]
pub struct BuiltinSerializerTypeGuesser;

impl BuiltinSerializerTypeGuesser {
    fn lookup(kind: CodecKind, ty: &TypeToken) -> Option<CodecClass> {
        builtin_codecs()
            .iter()
            .find(|codec| codec.kind() == kind && codec.target_type() == *ty)
            .copied()
    }
}

impl SerializerTypeGuesser for BuiltinSerializerTypeGuesser {
    fn guess_serializer_type(&self, ty: &TypeToken, _is_key: bool) -> Option<CodecClass> {
        Self::lookup(CodecKind::Serializer, ty)
    }

    fn guess_deserializer_type(&self, ty: &TypeToken, _is_key: bool) -> Option<CodecClass> {
        Self::lookup(CodecKind::Deserializer, ty)
    }
}

/// Ordered guessers; the first non-empty answer wins.
#[derive(Clone)]
pub struct GuesserRegistry {
    guessers: Vec<Arc<dyn SerializerTypeGuesser>>,
}

impl GuesserRegistry {
    /// A registry with no guessers.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            guessers: Vec::new(),
        }
    }

    /// A registry holding the built-in guesser.
    #[must_use]
    pub fn builtin() -> Self {
        Self::empty().with_guesser(Arc::new(BuiltinSerializerTypeGuesser))
    }

    /// Appends a guesser, consulted after the ones already registered.
    #[must_use]
    pub fn with_guesser(mut self, guesser: Arc<dyn SerializerTypeGuesser>) -> Self {
        self.guessers.push(guesser);
        self
    }

    /// Asks each guesser in order.
    #[must_use]
    pub fn guess(&self, kind: CodecKind, ty: &TypeToken, is_key: bool) -> Option<CodecClass> {
        self.guessers.iter().find_map(|guesser| match kind {
            CodecKind::Serializer => guesser.guess_serializer_type(ty, is_key),
            CodecKind::Deserializer => guesser.guess_deserializer_type(ty, is_key),
        })
    }
}

impl Default for GuesserRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl std::fmt::Debug for GuesserRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GuesserRegistry")
            .field("guessers", &self.guessers.len())
            .finish()
    }
}
