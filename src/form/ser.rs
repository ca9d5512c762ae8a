use serde::{
    Serialize,
    ser::{self, Impossible, SerializeSeq},
};

use super::{
    FormOptions, child_key,
    error::FormError,
    scalar::{Scalar, ScalarValue, ScalarValues},
    values::ValuesMap,
};

/// Writes a value into `out` under `key`. An empty key is the top level,
/// where only records and maps are accepted.
pub(crate) struct ValueSerializer<'a> {
    out: &'a mut ValuesMap,
    options: &'a FormOptions,
    key: String,
}

impl<'a> ValueSerializer<'a> {
    pub(crate) fn root(out: &'a mut ValuesMap, options: &'a FormOptions) -> Self {
        Self {
            out,
            options,
            key: String::new(),
        }
    }

    fn scalar<T: Scalar>(self, value: T) -> Result<(), FormError> {
        if self.key.is_empty() {
            return Err(FormError::unsupported("a bare scalar", &self.key));
        }
        self.out.append(self.key, value.to_token());
        Ok(())
    }
}

macro_rules! scalar_methods {
    ($($method:ident: $ty:ty),* $(,)?) => {
        $(
            fn $method(self, v: $ty) -> Result<Self::Ok, Self::Error> {
                self.scalar(v)
            }
        )*
    };
}

impl<'a> ser::Serializer for ValueSerializer<'a> {
    type Ok = ();
    type Error = FormError;
    type SerializeSeq = SeqFields<'a>;
    type SerializeTuple = SeqFields<'a>;
    type SerializeTupleStruct = SeqFields<'a>;
    type SerializeTupleVariant = Impossible<(), FormError>;
    type SerializeMap = MapFields<'a>;
    type SerializeStruct = MapFields<'a>;
    type SerializeStructVariant = Impossible<(), FormError>;

    scalar_methods! {
        serialize_bool: bool,
        serialize_i8: i8,
        serialize_i16: i16,
        serialize_i32: i32,
        serialize_i64: i64,
        serialize_u8: u8,
        serialize_u16: u16,
        serialize_u32: u32,
        serialize_u64: u64,
        serialize_f32: f32,
        serialize_f64: f64,
    }

    fn serialize_char(self, v: char) -> Result<(), FormError> {
        self.scalar(v.to_string())
    }

    fn serialize_str(self, v: &str) -> Result<(), FormError> {
        self.scalar(v.to_string())
    }

    fn serialize_bytes(self, v: &[u8]) -> Result<(), FormError> {
        let mut seq = self.serialize_seq(Some(v.len()))?;
        for byte in v {
            seq.serialize_element(byte)?;
        }
        seq.end()
    }

    fn serialize_none(self) -> Result<(), FormError> {
        Ok(())
    }

    fn serialize_some<T: ?Sized + Serialize>(self, value: &T) -> Result<(), FormError> {
        value.serialize(self)
    }

    fn serialize_unit(self) -> Result<(), FormError> {
        Ok(())
    }

    fn serialize_unit_struct(self, _name: &'static str) -> Result<(), FormError> {
        Ok(())
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
    ) -> Result<(), FormError> {
        self.scalar(variant.to_string())
    }

    fn serialize_newtype_struct<T: ?Sized + Serialize>(
        self,
        _name: &'static str,
        value: &T,
    ) -> Result<(), FormError> {
        value.serialize(self)
    }

    fn serialize_newtype_variant<T: ?Sized + Serialize>(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _value: &T,
    ) -> Result<(), FormError> {
        Err(FormError::unsupported("an enum variant with data", &self.key))
    }

    fn serialize_seq(self, _len: Option<usize>) -> Result<SeqFields<'a>, FormError> {
        if self.key.is_empty() {
            return Err(FormError::unsupported("a sequence", &self.key));
        }
        Ok(SeqFields {
            out: self.out,
            options: self.options,
            key: self.key,
            values: None,
        })
    }

    fn serialize_tuple(self, len: usize) -> Result<SeqFields<'a>, FormError> {
        self.serialize_seq(Some(len))
    }

    fn serialize_tuple_struct(
        self,
        _name: &'static str,
        len: usize,
    ) -> Result<SeqFields<'a>, FormError> {
        self.serialize_seq(Some(len))
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeTupleVariant, FormError> {
        Err(FormError::unsupported("an enum variant with data", &self.key))
    }

    fn serialize_map(self, _len: Option<usize>) -> Result<MapFields<'a>, FormError> {
        Ok(MapFields {
            out: self.out,
            options: self.options,
            prefix: self.key,
            next_key: None,
        })
    }

    fn serialize_struct(self, _name: &'static str, len: usize) -> Result<MapFields<'a>, FormError> {
        self.serialize_map(Some(len))
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeStructVariant, FormError> {
        Err(FormError::unsupported("an enum variant with data", &self.key))
    }
}

/// Collects the scalars of a sequence field.
pub(crate) struct SeqFields<'a> {
    out: &'a mut ValuesMap,
    options: &'a FormOptions,
    key: String,
    values: Option<ScalarValues>,
}

impl SeqFields<'_> {
    fn push<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), FormError> {
        let Some(value) = value.serialize(ElementSerializer { key: &self.key })? else {
            return Ok(());
        };
        match &mut self.values {
            None => self.values = Some(ScalarValues::new(value)),
            Some(values) => {
                if values.push(value).is_err() {
                    return Err(FormError::unsupported("a sequence of mixed scalar kinds", &self.key));
                }
            }
        }
        Ok(())
    }

    fn finish(self) -> Result<(), FormError> {
        let entry = self.out.entry(self.key);
        if let Some(values) = self.values {
            if self.options.encode_comma.contains(values.kind()) {
                entry.extend(values.encode());
            } else {
                entry.extend(values.tokens());
            }
        }
        Ok(())
    }
}

impl ser::SerializeSeq for SeqFields<'_> {
    type Ok = ();
    type Error = FormError;

    fn serialize_element<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), FormError> {
        self.push(value)
    }

    fn end(self) -> Result<(), FormError> {
        self.finish()
    }
}

impl ser::SerializeTuple for SeqFields<'_> {
    type Ok = ();
    type Error = FormError;

    fn serialize_element<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), FormError> {
        self.push(value)
    }

    fn end(self) -> Result<(), FormError> {
        self.finish()
    }
}

impl ser::SerializeTupleStruct for SeqFields<'_> {
    type Ok = ();
    type Error = FormError;

    fn serialize_field<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), FormError> {
        self.push(value)
    }

    fn end(self) -> Result<(), FormError> {
        self.finish()
    }
}

/// Struct fields and map entries, written under dotted keys.
pub(crate) struct MapFields<'a> {
    out: &'a mut ValuesMap,
    options: &'a FormOptions,
    prefix: String,
    next_key: Option<String>,
}

impl MapFields<'_> {
    fn field<T: ?Sized + Serialize>(&mut self, name: &str, value: &T) -> Result<(), FormError> {
        value.serialize(ValueSerializer {
            out: &mut *self.out,
            options: self.options,
            key: child_key(&self.prefix, name),
        })
    }
}

impl ser::SerializeMap for MapFields<'_> {
    type Ok = ();
    type Error = FormError;

    fn serialize_key<T: ?Sized + Serialize>(&mut self, key: &T) -> Result<(), FormError> {
        let Some(key) = key.serialize(ElementSerializer { key: &self.prefix })? else {
            return Err(FormError::unsupported("an empty map key", &self.prefix));
        };
        self.next_key = Some(key.to_token());
        Ok(())
    }

    fn serialize_value<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), FormError> {
        let Some(key) = self.next_key.take() else {
            return Err(FormError::Custom {
                message: "map value serialized before its key".to_string(),
            });
        };
        self.field(&key, value)
    }

    fn end(self) -> Result<(), FormError> {
        Ok(())
    }
}

impl ser::SerializeStruct for MapFields<'_> {
    type Ok = ();
    type Error = FormError;

    fn serialize_field<T: ?Sized + Serialize>(
        &mut self,
        key: &'static str,
        value: &T,
    ) -> Result<(), FormError> {
        self.field(key, value)
    }

    fn end(self) -> Result<(), FormError> {
        Ok(())
    }
}

/// Captures one sequence element or map key as a typed scalar.
struct ElementSerializer<'k> {
    key: &'k str,
}

type Element = Option<ScalarValue>;

impl ElementSerializer<'_> {
    fn scalar<T>(self, value: T) -> Result<Element, FormError>
    where
        ScalarValue: From<T>,
    {
        Ok(Some(ScalarValue::from(value)))
    }

    fn nested(&self) -> FormError {
        FormError::unsupported("a nested compound value", self.key)
    }
}

impl ser::Serializer for ElementSerializer<'_> {
    type Ok = Element;
    type Error = FormError;
    type SerializeSeq = Impossible<Element, FormError>;
    type SerializeTuple = Impossible<Element, FormError>;
    type SerializeTupleStruct = Impossible<Element, FormError>;
    type SerializeTupleVariant = Impossible<Element, FormError>;
    type SerializeMap = Impossible<Element, FormError>;
    type SerializeStruct = Impossible<Element, FormError>;
    type SerializeStructVariant = Impossible<Element, FormError>;

    scalar_methods! {
        serialize_bool: bool,
        serialize_i8: i8,
        serialize_i16: i16,
        serialize_i32: i32,
        serialize_i64: i64,
        serialize_u8: u8,
        serialize_u16: u16,
        serialize_u32: u32,
        serialize_u64: u64,
        serialize_f32: f32,
        serialize_f64: f64,
    }

    fn serialize_char(self, v: char) -> Result<Element, FormError> {
        self.scalar(v.to_string())
    }

    fn serialize_str(self, v: &str) -> Result<Element, FormError> {
        self.scalar(v.to_string())
    }

    fn serialize_bytes(self, _v: &[u8]) -> Result<Element, FormError> {
        Err(self.nested())
    }

    fn serialize_none(self) -> Result<Element, FormError> {
        Ok(None)
    }

    fn serialize_some<T: ?Sized + Serialize>(self, value: &T) -> Result<Element, FormError> {
        value.serialize(self)
    }

    fn serialize_unit(self) -> Result<Element, FormError> {
        Ok(None)
    }

    fn serialize_unit_struct(self, _name: &'static str) -> Result<Element, FormError> {
        Ok(None)
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
    ) -> Result<Element, FormError> {
        self.scalar(variant.to_string())
    }

    fn serialize_newtype_struct<T: ?Sized + Serialize>(
        self,
        _name: &'static str,
        value: &T,
    ) -> Result<Element, FormError> {
        value.serialize(self)
    }

    fn serialize_newtype_variant<T: ?Sized + Serialize>(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _value: &T,
    ) -> Result<Element, FormError> {
        Err(self.nested())
    }

    fn serialize_seq(self, _len: Option<usize>) -> Result<Self::SerializeSeq, FormError> {
        Err(self.nested())
    }

    fn serialize_tuple(self, _len: usize) -> Result<Self::SerializeTuple, FormError> {
        Err(self.nested())
    }

    fn serialize_tuple_struct(
        self,
        _name: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeTupleStruct, FormError> {
        Err(self.nested())
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeTupleVariant, FormError> {
        Err(self.nested())
    }

    fn serialize_map(self, _len: Option<usize>) -> Result<Self::SerializeMap, FormError> {
        Err(self.nested())
    }

    fn serialize_struct(
        self,
        _name: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeStruct, FormError> {
        Err(self.nested())
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeStructVariant, FormError> {
        Err(self.nested())
    }
}
