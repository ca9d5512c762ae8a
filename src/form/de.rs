use std::{
    cell::RefCell,
    collections::{BTreeMap, btree_map},
};

use serde::{
    de::{
        self, DeserializeSeed, IntoDeserializer, MapAccess, SeqAccess, Visitor,
        value::{StrDeserializer, StringDeserializer},
    },
    forward_to_deserialize_any,
};

use super::{
    FormOptions, child_key,
    error::FormError,
    scalar::{Scalar, ScalarKind, ScalarValue, ScalarValues},
    values::ValuesMap,
};

/// Dotted keys folded into a tree: `inner.name` becomes `inner` -> `name`.
#[derive(Debug, Default)]
pub(crate) struct Node<'a> {
    values: &'a [String],
    children: BTreeMap<&'a str, Node<'a>>,
}

impl<'a> Node<'a> {
    pub(crate) fn build(values: &'a ValuesMap) -> Self {
        let mut root = Node::default();
        for (key, list) in values {
            let mut node = &mut root;
            for part in key.split('.') {
                node = node.children.entry(part).or_default();
            }
            node.values = list;
        }
        root
    }
}

/// Settings shared by every deserializer of one decode.
#[derive(Clone, Copy)]
pub(crate) struct Context<'a> {
    options: &'a FormOptions,
    /// Keeps the first error when the caller only gets its message back.
    failure: Option<&'a RefCell<Option<FormError>>>,
}

impl<'a> Context<'a> {
    pub(crate) fn new(options: &'a FormOptions) -> Self {
        Self {
            options,
            failure: None,
        }
    }

    pub(crate) fn keep_failure(
        options: &'a FormOptions,
        slot: &'a RefCell<Option<FormError>>,
    ) -> Self {
        Self {
            options,
            failure: Some(slot),
        }
    }

    fn fail(self, err: FormError) -> FormError {
        let Some(slot) = self.failure else {
            return err;
        };
        let message = err.to_string();
        let mut slot = slot.borrow_mut();
        if slot.is_none() {
            *slot = Some(err);
        }
        FormError::Custom { message }
    }
}

pub(crate) struct NodeDeserializer<'a> {
    node: &'a Node<'a>,
    key: String,
    cx: Context<'a>,
}

impl<'a> NodeDeserializer<'a> {
    pub(crate) fn root(node: &'a Node<'a>, cx: Context<'a>) -> Self {
        Self {
            node,
            key: String::new(),
            cx,
        }
    }

    /// A leaf whose values are all empty, as sent by `page=`.
    fn is_blank(&self) -> bool {
        self.node.children.is_empty() && self.node.values.iter().all(|value| value.is_empty())
    }

    fn first(&self) -> Result<&'a str, FormError> {
        match self.node.values.first() {
            Some(value) => Ok(value.as_str()),
            None => Err(self.cx.fail(FormError::MissingValue {
                key: self.key.clone(),
            })),
        }
    }

    /// Blank values leave the field at its zero value.
    fn parse<T: Scalar + Default>(&self) -> Result<T, FormError> {
        let token = self.first()?;
        if token.is_empty() {
            return Ok(T::default());
        }
        T::parse_token(token).map_err(|e| self.cx.fail(FormError::scalar(&self.key, e)))
    }
}

macro_rules! parse_scalar {
    ($($method:ident => $visit:ident: $ty:ty),* $(,)?) => {
        $(
            fn $method<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, FormError> {
                visitor.$visit(self.parse::<$ty>()?)
            }
        )*
    };
}

impl<'de, 'a> de::Deserializer<'de> for NodeDeserializer<'a> {
    type Error = FormError;

    fn deserialize_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, FormError> {
        if !self.node.children.is_empty() {
            self.deserialize_map(visitor)
        } else if self.node.values.len() > 1 {
            self.deserialize_seq(visitor)
        } else if let Some(value) = self.node.values.first() {
            visitor.visit_str(value)
        } else {
            visitor.visit_unit()
        }
    }

    parse_scalar! {
        deserialize_bool => visit_bool: bool,
        deserialize_i8 => visit_i8: i8,
        deserialize_i16 => visit_i16: i16,
        deserialize_i32 => visit_i32: i32,
        deserialize_i64 => visit_i64: i64,
        deserialize_u8 => visit_u8: u8,
        deserialize_u16 => visit_u16: u16,
        deserialize_u32 => visit_u32: u32,
        deserialize_u64 => visit_u64: u64,
        deserialize_f32 => visit_f32: f32,
        deserialize_f64 => visit_f64: f64,
    }

    fn deserialize_char<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, FormError> {
        visitor.visit_str(self.first()?)
    }

    fn deserialize_str<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, FormError> {
        visitor.visit_str(self.first()?)
    }

    fn deserialize_string<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, FormError> {
        visitor.visit_str(self.first()?)
    }

    fn deserialize_bytes<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, FormError> {
        visitor.visit_bytes(self.first()?.as_bytes())
    }

    fn deserialize_byte_buf<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, FormError> {
        self.deserialize_bytes(visitor)
    }

    fn deserialize_option<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, FormError> {
        if self.is_blank() {
            visitor.visit_none()
        } else {
            visitor.visit_some(self)
        }
    }

    fn deserialize_unit<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, FormError> {
        visitor.visit_unit()
    }

    fn deserialize_unit_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value, FormError> {
        visitor.visit_unit()
    }

    fn deserialize_newtype_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value, FormError> {
        visitor.visit_newtype_struct(self)
    }

    fn deserialize_seq<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, FormError> {
        visitor.visit_seq(ValuesSeq::new(self.node.values, self.key, self.cx))
    }

    fn deserialize_tuple<V: Visitor<'de>>(
        self,
        _len: usize,
        visitor: V,
    ) -> Result<V::Value, FormError> {
        self.deserialize_seq(visitor)
    }

    fn deserialize_tuple_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _len: usize,
        visitor: V,
    ) -> Result<V::Value, FormError> {
        self.deserialize_seq(visitor)
    }

    fn deserialize_map<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, FormError> {
        visitor.visit_map(NodeMap {
            iter: self.node.children.iter(),
            pending: None,
            prefix: self.key,
            cx: self.cx,
        })
    }

    fn deserialize_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _fields: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, FormError> {
        self.deserialize_map(visitor)
    }

    fn deserialize_enum<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _variants: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, FormError> {
        let variant: StrDeserializer<'_, FormError> = self.first()?.into_deserializer();
        visitor.visit_enum(variant)
    }

    fn deserialize_identifier<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, FormError> {
        self.deserialize_str(visitor)
    }

    fn deserialize_ignored_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, FormError> {
        visitor.visit_unit()
    }
}

struct NodeMap<'a> {
    iter: btree_map::Iter<'a, &'a str, Node<'a>>,
    pending: Option<(&'a str, &'a Node<'a>)>,
    prefix: String,
    cx: Context<'a>,
}

impl<'de, 'a> MapAccess<'de> for NodeMap<'a> {
    type Error = FormError;

    fn next_key_seed<K: DeserializeSeed<'de>>(
        &mut self,
        seed: K,
    ) -> Result<Option<K::Value>, FormError> {
        let Some((&name, node)) = self.iter.next() else {
            return Ok(None);
        };
        self.pending = Some((name, node));
        seed.deserialize(TokenDeserializer {
            token: name,
            key: &self.prefix,
            cx: self.cx,
        })
        .map(Some)
    }

    fn next_value_seed<V: DeserializeSeed<'de>>(&mut self, seed: V) -> Result<V::Value, FormError> {
        let Some((name, node)) = self.pending.take() else {
            return Err(self.cx.fail(FormError::Custom {
                message: "map value requested before its key".to_string(),
            }));
        };
        seed.deserialize(NodeDeserializer {
            node,
            key: child_key(&self.prefix, name),
            cx: self.cx,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    /// element kind not known until the first element asks for it
    Pending,
    Split,
    Whole,
}

/// The values of one sequence field.
///
/// Whether the values are comma-split depends on the element kind, which is
/// only learned from the first element's deserialize hint. Split values are
/// decoded all at once.
struct ValuesSeq<'a> {
    values: &'a [String],
    key: String,
    cx: Context<'a>,
    mode: Mode,
    next_value: usize,
    split: std::vec::IntoIter<ScalarValue>,
    /// set when comma-splitting produced no tokens at all
    split_empty: bool,
}

impl<'a> ValuesSeq<'a> {
    fn new(values: &'a [String], key: String, cx: Context<'a>) -> Self {
        Self {
            values,
            key,
            cx,
            mode: Mode::Pending,
            next_value: 0,
            split: Vec::new().into_iter(),
            split_empty: false,
        }
    }

    fn commit(&mut self, kind: Option<ScalarKind>) -> Result<(), FormError> {
        match kind {
            Some(kind) if self.cx.options.decode_comma.contains(kind) => {
                let decoded = ScalarValues::decode(kind, self.values)
                    .map_err(|e| self.cx.fail(FormError::scalar(&self.key, e)))?;
                self.split = decoded.into_values().into_iter();
                self.mode = Mode::Split;
            }
            _ => self.mode = Mode::Whole,
        }
        Ok(())
    }

    /// The next non-empty value in whole mode.
    fn next_whole(&mut self) -> Option<&'a str> {
        while let Some(value) = self.values.get(self.next_value) {
            self.next_value += 1;
            if !value.is_empty() {
                return Some(value.as_str());
            }
        }
        None
    }
}

impl<'de, 'a> SeqAccess<'de> for ValuesSeq<'a> {
    type Error = FormError;

    fn next_element_seed<T: DeserializeSeed<'de>>(
        &mut self,
        seed: T,
    ) -> Result<Option<T::Value>, FormError> {
        match self.mode {
            Mode::Pending => {
                if self.values.iter().all(|value| value.is_empty()) {
                    return Ok(None);
                }
                match seed.deserialize(FirstElement { seq: self }) {
                    Ok(value) => Ok(Some(value)),
                    Err(_) if self.split_empty => Ok(None),
                    Err(e) => Err(e),
                }
            }
            Mode::Whole => {
                let Some(token) = self.next_whole() else {
                    return Ok(None);
                };
                seed.deserialize(TokenDeserializer {
                    token,
                    key: &self.key,
                    cx: self.cx,
                })
                .map(Some)
            }
            Mode::Split => match self.split.next() {
                Some(value) => seed.deserialize(value).map(Some),
                None => Ok(None),
            },
        }
    }

    fn size_hint(&self) -> Option<usize> {
        match self.mode {
            Mode::Whole => Some(self.values.len().saturating_sub(self.next_value)),
            Mode::Split => Some(self.split.len()),
            Mode::Pending => None,
        }
    }
}

/// Deserializes the first element of a [`ValuesSeq`] and fixes its mode.
struct FirstElement<'s, 'a> {
    seq: &'s mut ValuesSeq<'a>,
}

enum Started<'t> {
    Token(TokenDeserializer<'t>),
    Value(ScalarValue),
}

impl<'s, 'a> FirstElement<'s, 'a> {
    fn start(self, kind: Option<ScalarKind>) -> Result<Started<'s>, FormError> {
        let seq = self.seq;
        seq.commit(kind)?;
        if seq.mode == Mode::Split {
            return match seq.split.next() {
                Some(value) => Ok(Started::Value(value)),
                None => {
                    // the sequence ends before its first element
                    seq.split_empty = true;
                    Err(FormError::MissingValue {
                        key: seq.key.clone(),
                    })
                }
            };
        }

        let token = seq.next_whole();
        let seq: &'s ValuesSeq<'a> = seq;
        match token {
            Some(token) => Ok(Started::Token(TokenDeserializer {
                token,
                key: &seq.key,
                cx: seq.cx,
            })),
            None => Err(seq.cx.fail(FormError::MissingValue {
                key: seq.key.clone(),
            })),
        }
    }
}

macro_rules! dispatch {
    ($started:expr, $method:ident($($arg:expr),*)) => {
        match $started {
            Started::Token(token) => token.$method($($arg),*),
            Started::Value(value) => value.$method($($arg),*),
        }
    };
}

macro_rules! first_scalar {
    ($($method:ident => $kind:ident),* $(,)?) => {
        $(
            fn $method<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, FormError> {
                dispatch!(self.start(Some(ScalarKind::$kind))?, $method(visitor))
            }
        )*
    };
}

macro_rules! first_other {
    ($($method:ident),* $(,)?) => {
        $(
            fn $method<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, FormError> {
                dispatch!(self.start(None)?, $method(visitor))
            }
        )*
    };
}

impl<'de> de::Deserializer<'de> for FirstElement<'_, '_> {
    type Error = FormError;

    first_scalar! {
        deserialize_bool => Bool,
        deserialize_i8 => I8,
        deserialize_i16 => I16,
        deserialize_i32 => I32,
        deserialize_i64 => I64,
        deserialize_u8 => U8,
        deserialize_u16 => U16,
        deserialize_u32 => U32,
        deserialize_u64 => U64,
        deserialize_f32 => F32,
        deserialize_f64 => F64,
        deserialize_char => String,
        deserialize_str => String,
        deserialize_string => String,
    }

    first_other! {
        deserialize_any,
        deserialize_bytes,
        deserialize_byte_buf,
        deserialize_option,
        deserialize_unit,
        deserialize_seq,
        deserialize_map,
        deserialize_identifier,
        deserialize_ignored_any,
    }

    fn deserialize_unit_struct<V: Visitor<'de>>(
        self,
        name: &'static str,
        visitor: V,
    ) -> Result<V::Value, FormError> {
        dispatch!(self.start(None)?, deserialize_unit_struct(name, visitor))
    }

    fn deserialize_newtype_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value, FormError> {
        // the inner type's hint decides the mode
        visitor.visit_newtype_struct(self)
    }

    fn deserialize_tuple<V: Visitor<'de>>(
        self,
        len: usize,
        visitor: V,
    ) -> Result<V::Value, FormError> {
        dispatch!(self.start(None)?, deserialize_tuple(len, visitor))
    }

    fn deserialize_tuple_struct<V: Visitor<'de>>(
        self,
        name: &'static str,
        len: usize,
        visitor: V,
    ) -> Result<V::Value, FormError> {
        dispatch!(self.start(None)?, deserialize_tuple_struct(name, len, visitor))
    }

    fn deserialize_struct<V: Visitor<'de>>(
        self,
        name: &'static str,
        fields: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, FormError> {
        dispatch!(self.start(None)?, deserialize_struct(name, fields, visitor))
    }

    fn deserialize_enum<V: Visitor<'de>>(
        self,
        name: &'static str,
        variants: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, FormError> {
        dispatch!(
            self.start(Some(ScalarKind::String))?,
            deserialize_enum(name, variants, visitor)
        )
    }
}

/// A single token: one sequence element or one map key.
struct TokenDeserializer<'t> {
    token: &'t str,
    key: &'t str,
    cx: Context<'t>,
}

impl TokenDeserializer<'_> {
    fn parse<T: Scalar>(&self) -> Result<T, FormError> {
        T::parse_token(self.token).map_err(|e| self.cx.fail(FormError::scalar(self.key, e)))
    }
}

impl<'de> de::Deserializer<'de> for TokenDeserializer<'_> {
    type Error = FormError;

    fn deserialize_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, FormError> {
        visitor.visit_str(self.token)
    }

    parse_scalar! {
        deserialize_bool => visit_bool: bool,
        deserialize_i8 => visit_i8: i8,
        deserialize_i16 => visit_i16: i16,
        deserialize_i32 => visit_i32: i32,
        deserialize_i64 => visit_i64: i64,
        deserialize_u8 => visit_u8: u8,
        deserialize_u16 => visit_u16: u16,
        deserialize_u32 => visit_u32: u32,
        deserialize_u64 => visit_u64: u64,
        deserialize_f32 => visit_f32: f32,
        deserialize_f64 => visit_f64: f64,
    }

    fn deserialize_bytes<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, FormError> {
        visitor.visit_bytes(self.token.as_bytes())
    }

    fn deserialize_byte_buf<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, FormError> {
        self.deserialize_bytes(visitor)
    }

    fn deserialize_option<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, FormError> {
        visitor.visit_some(self)
    }

    fn deserialize_unit<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, FormError> {
        visitor.visit_unit()
    }

    fn deserialize_newtype_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value, FormError> {
        visitor.visit_newtype_struct(self)
    }

    fn deserialize_enum<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _variants: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, FormError> {
        let variant: StrDeserializer<'_, FormError> = self.token.into_deserializer();
        visitor.visit_enum(variant)
    }

    fn deserialize_ignored_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, FormError> {
        visitor.visit_unit()
    }

    forward_to_deserialize_any! {
        char str string unit_struct seq tuple tuple_struct map struct identifier
    }
}

/// An element already decoded by the comma-split path.
impl<'de> de::Deserializer<'de> for ScalarValue {
    type Error = FormError;

    fn deserialize_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, FormError> {
        match self {
            ScalarValue::Bool(v) => visitor.visit_bool(v),
            ScalarValue::I8(v) => visitor.visit_i8(v),
            ScalarValue::I16(v) => visitor.visit_i16(v),
            ScalarValue::I32(v) => visitor.visit_i32(v),
            ScalarValue::I64(v) => visitor.visit_i64(v),
            ScalarValue::U8(v) => visitor.visit_u8(v),
            ScalarValue::U16(v) => visitor.visit_u16(v),
            ScalarValue::U32(v) => visitor.visit_u32(v),
            ScalarValue::U64(v) => visitor.visit_u64(v),
            ScalarValue::F32(v) => visitor.visit_f32(v),
            ScalarValue::F64(v) => visitor.visit_f64(v),
            ScalarValue::String(v) => visitor.visit_string(v),
        }
    }

    fn deserialize_option<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, FormError> {
        visitor.visit_some(self)
    }

    fn deserialize_newtype_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value, FormError> {
        visitor.visit_newtype_struct(self)
    }

    fn deserialize_enum<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _variants: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, FormError> {
        let variant: StringDeserializer<FormError> = self.to_token().into_deserializer();
        visitor.visit_enum(variant)
    }

    forward_to_deserialize_any! {
        bool i8 i16 i32 i64 u8 u16 u32 u64 f32 f64 char str string bytes byte_buf
        unit unit_struct seq tuple tuple_struct map struct identifier ignored_any
    }
}
