//! Scalar sequences to and from comma-joined strings.
//!
//! The element types are a closed set: `bool`, every integer width, `f32`,
//! `f64` and `String`. Decoding splits every input value on `,` and skips
//! empty tokens, so `"1,,3"` gives `[1, 3]`.

use std::{
    fmt::Write,
    iter::Filter,
    num::{ParseFloatError, ParseIntError},
    str::Split,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, derive_more::Display)]
pub enum ScalarKind {
    #[display("bool")]
    Bool,
    #[display("i8")]
    I8,
    #[display("i16")]
    I16,
    #[display("i32")]
    I32,
    #[display("i64")]
    I64,
    #[display("u8")]
    U8,
    #[display("u16")]
    U16,
    #[display("u32")]
    U32,
    #[display("u64")]
    U64,
    #[display("f32")]
    F32,
    #[display("f64")]
    F64,
    #[display("string")]
    String,
}

impl ScalarKind {
    pub const ALL: [ScalarKind; 12] = [
        ScalarKind::Bool,
        ScalarKind::I8,
        ScalarKind::I16,
        ScalarKind::I32,
        ScalarKind::I64,
        ScalarKind::U8,
        ScalarKind::U16,
        ScalarKind::U32,
        ScalarKind::U64,
        ScalarKind::F32,
        ScalarKind::F64,
        ScalarKind::String,
    ];

    const fn bit(self) -> u16 {
        1 << self as u16
    }
}

/// A set of [`ScalarKind`]s, used to opt kinds into comma-joined encoding or comma-split decoding.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KindSet(u16);

impl KindSet {
    pub const EMPTY: KindSet = KindSet(0);

    pub const fn all() -> Self {
        let mut bits = 0;
        let mut i = 0;
        while i < ScalarKind::ALL.len() {
            bits |= ScalarKind::ALL[i].bit();
            i += 1;
        }
        KindSet(bits)
    }

    pub const fn with(self, kind: ScalarKind) -> Self {
        KindSet(self.0 | kind.bit())
    }

    pub fn insert(&mut self, kind: ScalarKind) {
        self.0 |= kind.bit();
    }

    pub fn remove(&mut self, kind: ScalarKind) {
        self.0 &= !kind.bit();
    }

    pub const fn contains(self, kind: ScalarKind) -> bool {
        self.0 & kind.bit() != 0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl FromIterator<ScalarKind> for KindSet {
    fn from_iter<I: IntoIterator<Item = ScalarKind>>(iter: I) -> Self {
        let mut set = KindSet::EMPTY;
        for kind in iter {
            set.insert(kind);
        }
        set
    }
}

#[derive(Debug, derive_more::Display)]
pub enum ParseFailure {
    Int(ParseIntError),
    Float(ParseFloatError),
    #[display("invalid syntax")]
    Bool,
}

#[derive(Debug, derive_more::Display)]
#[display("parse {kind} from {token:?}: {source}")]
pub struct ScalarError {
    pub kind: ScalarKind,
    pub token: String,
    pub source: ParseFailure,
}

impl ScalarError {
    fn new(kind: ScalarKind, token: &str, source: ParseFailure) -> Self {
        Self {
            kind,
            token: token.to_owned(),
            source,
        }
    }
}

impl std::error::Error for ScalarError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match &self.source {
            ParseFailure::Int(e) => Some(e),
            ParseFailure::Float(e) => Some(e),
            ParseFailure::Bool => None,
        }
    }
}

pub trait Scalar: Sized {
    const KIND: ScalarKind;

    fn render(&self, out: &mut String);

    fn parse_token(token: &str) -> Result<Self, ScalarError>;

    fn to_token(&self) -> String {
        let mut out = String::new();
        self.render(&mut out);
        out
    }
}

impl Scalar for bool {
    const KIND: ScalarKind = ScalarKind::Bool;

    fn render(&self, out: &mut String) {
        out.push_str(if *self { "true" } else { "false" });
    }

    fn parse_token(token: &str) -> Result<Self, ScalarError> {
        match token {
            "1" | "t" | "T" | "TRUE" | "true" | "True" => Ok(true),
            "0" | "f" | "F" | "FALSE" | "false" | "False" => Ok(false),
            _ => Err(ScalarError::new(Self::KIND, token, ParseFailure::Bool)),
        }
    }
}

impl Scalar for String {
    const KIND: ScalarKind = ScalarKind::String;

    fn render(&self, out: &mut String) {
        out.push_str(self);
    }

    fn parse_token(token: &str) -> Result<Self, ScalarError> {
        Ok(token.to_owned())
    }
}

macro_rules! number_scalar {
    ($failure:ident: $($ty:ty => $kind:ident),* $(,)?) => {
        $(
            impl Scalar for $ty {
                const KIND: ScalarKind = ScalarKind::$kind;

                fn render(&self, out: &mut String) {
                    let _ = write!(out, "{self}");
                }

                fn parse_token(token: &str) -> Result<Self, ScalarError> {
                    token
                        .parse()
                        .map_err(|e| ScalarError::new(Self::KIND, token, ParseFailure::$failure(e)))
                }
            }
        )*
    };
}

number_scalar!(Int:
    i8 => I8,
    i16 => I16,
    i32 => I32,
    i64 => I64,
    isize => I64,
    u8 => U8,
    u16 => U16,
    u32 => U32,
    u64 => U64,
    usize => U64,
);

number_scalar!(Float:
    f32 => F32,
    f64 => F64,
);

type Tokens<'a> = Filter<Split<'a, char>, fn(&&'a str) -> bool>;

fn non_empty(token: &&str) -> bool {
    !token.is_empty()
}

/// Splits on `,`, skipping empty tokens.
fn tokens(raw: &str) -> Tokens<'_> {
    raw.split(',').filter(non_empty as fn(&&str) -> bool)
}

/// Renders `items` as a single comma-joined value. An empty slice yields `[""]`.
pub fn encode<T: Scalar>(items: &[T]) -> Vec<String> {
    let mut joined = String::new();
    let mut token = String::new();
    for item in items {
        token.clear();
        item.render(&mut token);
        if token.is_empty() {
            continue;
        }
        if !joined.is_empty() {
            joined.push(',');
        }
        joined.push_str(&token);
    }
    vec![joined]
}

/// Splits every raw value on `,` and parses the tokens in order.
///
/// Any bad token fails the whole call; no partial result is returned.
pub fn decode<T: Scalar>(raw: &[impl AsRef<str>]) -> Result<Vec<T>, ScalarError> {
    let mut out: Vec<T> = Vec::new();
    for value in raw {
        let value = value.as_ref();
        let needed = out.len() + value.bytes().filter(|b| *b == b',').count() + 1;
        if needed > out.capacity() {
            let cap = next_capacity(out.capacity(), needed);
            out.reserve_exact(cap - out.len());
        }
        for token in tokens(value) {
            out.push(T::parse_token(token)?);
        }
    }
    Ok(out)
}

macro_rules! scalar_values {
    ($($kind:ident => $ty:ty),* $(,)?) => {
        /// One scalar of any supported kind.
        #[derive(Debug, Clone, PartialEq)]
        pub(crate) enum ScalarValue {
            $($kind($ty),)*
        }

        /// A list of scalars that all share one kind.
        #[derive(Debug, Clone, PartialEq)]
        pub(crate) enum ScalarValues {
            $($kind(Vec<$ty>),)*
        }

        $(
            impl From<$ty> for ScalarValue {
                fn from(value: $ty) -> Self {
                    ScalarValue::$kind(value)
                }
            }
        )*

        impl ScalarValue {
            pub(crate) fn kind(&self) -> ScalarKind {
                match self {
                    $(ScalarValue::$kind(_) => ScalarKind::$kind,)*
                }
            }

            pub(crate) fn to_token(&self) -> String {
                match self {
                    $(ScalarValue::$kind(value) => value.to_token(),)*
                }
            }
        }

        impl ScalarValues {
            pub(crate) fn new(first: ScalarValue) -> Self {
                match first {
                    $(ScalarValue::$kind(value) => ScalarValues::$kind(vec![value]),)*
                }
            }

            /// Gives `value` back if its kind differs from the list's.
            pub(crate) fn push(&mut self, value: ScalarValue) -> Result<(), ScalarValue> {
                match (self, value) {
                    $((ScalarValues::$kind(list), ScalarValue::$kind(value)) => {
                        list.push(value);
                        Ok(())
                    })*
                    (_, value) => Err(value),
                }
            }

            pub(crate) fn kind(&self) -> ScalarKind {
                match self {
                    $(ScalarValues::$kind(_) => ScalarKind::$kind,)*
                }
            }

            /// A single comma-joined value, see [`encode`].
            pub(crate) fn encode(&self) -> Vec<String> {
                match self {
                    $(ScalarValues::$kind(list) => encode(list),)*
                }
            }

            /// One value per element.
            pub(crate) fn tokens(&self) -> Vec<String> {
                match self {
                    $(ScalarValues::$kind(list) => list.iter().map(<$ty as Scalar>::to_token).collect(),)*
                }
            }

            /// [`decode`] for the element type of `kind`.
            pub(crate) fn decode(kind: ScalarKind, raw: &[impl AsRef<str>]) -> Result<Self, ScalarError> {
                match kind {
                    $(ScalarKind::$kind => decode::<$ty>(raw).map(ScalarValues::$kind),)*
                }
            }

            pub(crate) fn into_values(self) -> Vec<ScalarValue> {
                match self {
                    $(ScalarValues::$kind(list) => list.into_iter().map(ScalarValue::$kind).collect(),)*
                }
            }
        }
    };
}

scalar_values! {
    Bool => bool,
    I8 => i8,
    I16 => i16,
    I32 => i32,
    I64 => i64,
    U8 => u8,
    U16 => u16,
    U32 => u32,
    U64 => u64,
    F32 => f32,
    F64 => f64,
    String => String,
}

const GROWTH_THRESHOLD: usize = 256;

/// Amortized growth: double while small, then about 1.25x until `needed` fits.
pub fn next_capacity(old: usize, needed: usize) -> usize {
    let double = old.saturating_mul(2);
    if needed > double {
        return needed;
    }
    if old < GROWTH_THRESHOLD {
        return double;
    }

    let mut cap = old;
    while cap < needed {
        cap = cap.saturating_add((cap + 3 * GROWTH_THRESHOLD) >> 2);
    }
    cap
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn test_encode() {
        assert_eq!(encode(&[1i32, -2, 3]), vec!["1,-2,3"]);
        assert_eq!(encode(&[true, false]), vec!["true,false"]);
        assert_eq!(encode(&[u64::MAX]), vec!["18446744073709551615"]);
        assert_eq!(encode(&[0.1f32, 2.5]), vec!["0.1,2.5"]);
        assert_eq!(encode(&[1e21f64]), vec!["1000000000000000000000"]);
        assert_eq!(encode::<i64>(&[]), vec![""]);
        assert_eq!(
            encode(&["a".to_string(), String::new(), "b".to_string()]),
            vec!["a,b"]
        );
    }

    #[test]
    fn test_decode_splits_every_value() {
        let got: Vec<i32> = decode(&["1,2", "3"]).unwrap();
        assert_eq!(got, vec![1, 2, 3]);

        let got: Vec<String> = decode(&["a,b"]).unwrap();
        assert_eq!(got, vec!["a", "b"]);
    }

    #[test]
    fn test_decode_empty() {
        let got: Vec<u8> = decode::<u8>(&[] as &[&str]).unwrap();
        assert!(got.is_empty());

        for kind in ScalarKind::ALL {
            let empty = match kind {
                ScalarKind::Bool => decode::<bool>(&[""]).unwrap().len(),
                ScalarKind::I8 => decode::<i8>(&[""]).unwrap().len(),
                ScalarKind::I16 => decode::<i16>(&[""]).unwrap().len(),
                ScalarKind::I32 => decode::<i32>(&[""]).unwrap().len(),
                ScalarKind::I64 => decode::<i64>(&[""]).unwrap().len(),
                ScalarKind::U8 => decode::<u8>(&[""]).unwrap().len(),
                ScalarKind::U16 => decode::<u16>(&[""]).unwrap().len(),
                ScalarKind::U32 => decode::<u32>(&[""]).unwrap().len(),
                ScalarKind::U64 => decode::<u64>(&[""]).unwrap().len(),
                ScalarKind::F32 => decode::<f32>(&[""]).unwrap().len(),
                ScalarKind::F64 => decode::<f64>(&[""]).unwrap().len(),
                ScalarKind::String => decode::<String>(&[""]).unwrap().len(),
            };
            assert_eq!(empty, 0, "{kind}");
        }
    }

    #[test]
    fn test_decode_skips_empty_tokens() {
        let got: Vec<i64> = decode(&["1,,3"]).unwrap();
        assert_eq!(got, vec![1, 3]);

        let got: Vec<i64> = decode(&[",1,", ""]).unwrap();
        assert_eq!(got, vec![1]);
    }

    #[test]
    fn test_empty_string_element_is_dropped() {
        let items = ["a".to_string(), String::new()];
        assert_eq!(encode(&items), vec!["a"]);
        let got: Vec<String> = decode(&encode(&items)).unwrap();
        assert_eq!(got, vec!["a"]);
    }

    #[test]
    fn test_scalar_values_dispatch() {
        let decoded = ScalarValues::decode(ScalarKind::U16, &["1,2", ",3"]).unwrap();
        assert_eq!(decoded, ScalarValues::U16(vec![1, 2, 3]));
        assert_eq!(decoded.encode(), vec!["1,2,3"]);
        assert_eq!(decoded.tokens(), vec!["1", "2", "3"]);

        let mut values = ScalarValues::new(ScalarValue::from(true));
        assert!(values.push(ScalarValue::from(false)).is_ok());
        assert_eq!(values.push(ScalarValue::from(1u8)), Err(ScalarValue::U8(1)));
        assert_eq!(values.kind(), ScalarKind::Bool);
        assert_eq!(
            values.into_values(),
            vec![ScalarValue::Bool(true), ScalarValue::Bool(false)]
        );

        assert!(ScalarValues::decode(ScalarKind::I8, &[","]).unwrap().into_values().is_empty());
    }

    #[test]
    fn test_decode_bool_grammar() {
        let got: Vec<bool> = decode(&["1,t,T,TRUE,true,True"]).unwrap();
        assert!(got.iter().all(|b| *b));
        let got: Vec<bool> = decode(&["0,f,F,FALSE,false,False"]).unwrap();
        assert!(got.iter().all(|b| !*b));

        let err = decode::<bool>(&["true,yes"]).unwrap_err();
        assert_eq!(err.kind, ScalarKind::Bool);
        assert_eq!(err.token, "yes");
        assert!(matches!(err.source, ParseFailure::Bool));
    }

    #[test]
    fn test_decode_failure_discards_everything() {
        let err = decode::<i32>(&["1,2", "x"]).unwrap_err();
        assert_eq!(err.token, "x");
        assert!(matches!(err.source, ParseFailure::Int(_)));
    }

    #[test]
    fn test_decode_overflow() {
        let err = decode::<i8>(&["127,128"]).unwrap_err();
        assert_eq!(err.kind, ScalarKind::I8);
        assert_eq!(err.token, "128");

        assert!(decode::<u8>(&["-1"]).is_err());
        assert!(decode::<u64>(&["18446744073709551616"]).is_err());
        assert_eq!(
            decode::<u64>(&["18446744073709551615"]).unwrap(),
            vec![u64::MAX]
        );
    }

    #[test]
    fn test_error_message() {
        let err = decode::<u16>(&["abc"]).unwrap_err();
        assert_eq!(
            err.to_string(),
            "parse u16 from \"abc\": invalid digit found in string"
        );
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_next_capacity() {
        assert_eq!(next_capacity(0, 1), 1);
        assert_eq!(next_capacity(4, 5), 8);
        assert_eq!(next_capacity(4, 20), 20);
        assert_eq!(next_capacity(255, 300), 510);
        // 256 + (256 + 768) / 4
        assert_eq!(next_capacity(256, 257), 512);
        // 1024 + (1024 + 768) / 4
        assert_eq!(next_capacity(1024, 1025), 1472);
        assert_eq!(next_capacity(1024, 1500), 1472 + (1472 + 768) / 4);
    }

    #[test]
    fn test_decode_capacity() {
        let raw = vec!["1"; 300];
        let got: Vec<u32> = decode(&raw).unwrap();
        assert_eq!(got.len(), 300);
        assert!(got.capacity() >= 300);
    }

    #[test]
    fn test_kind_set() {
        let mut set = KindSet::EMPTY.with(ScalarKind::I32);
        assert!(set.contains(ScalarKind::I32));
        assert!(!set.contains(ScalarKind::I64));
        set.insert(ScalarKind::String);
        set.remove(ScalarKind::I32);
        assert_eq!(set, [ScalarKind::String].into_iter().collect());
        assert!(ScalarKind::ALL.iter().all(|k| KindSet::all().contains(*k)));
        assert!(KindSet::default().is_empty());
    }

    proptest! {
        #[test]
        fn int_round_trip(items in proptest::collection::vec(any::<i64>(), 0..64)) {
            let got: Vec<i64> = decode(&encode(&items)).unwrap();
            prop_assert_eq!(got, items);
        }

        #[test]
        fn bool_round_trip(items in proptest::collection::vec(any::<bool>(), 0..64)) {
            let got: Vec<bool> = decode(&encode(&items)).unwrap();
            prop_assert_eq!(got, items);
        }

        #[test]
        fn float_round_trip(items in proptest::collection::vec(-1e12f64..1e12, 0..64)) {
            let got: Vec<f64> = decode(&encode(&items)).unwrap();
            prop_assert_eq!(got, items);
        }

        #[test]
        fn f64_round_trip(
            items in proptest::collection::vec(
                prop::num::f64::NORMAL | prop::num::f64::SUBNORMAL | prop::num::f64::ZERO,
                0..64,
            )
        ) {
            let got: Vec<f64> = decode(&encode(&items)).unwrap();
            prop_assert_eq!(got, items);
        }

        #[test]
        fn f32_round_trip(
            items in proptest::collection::vec(
                prop::num::f32::NORMAL | prop::num::f32::SUBNORMAL | prop::num::f32::ZERO,
                0..64,
            )
        ) {
            let got: Vec<f32> = decode(&encode(&items)).unwrap();
            prop_assert_eq!(got, items);
        }

        #[test]
        fn u8_round_trip(items in proptest::collection::vec(any::<u8>(), 0..64)) {
            let got: Vec<u8> = decode(&encode(&items)).unwrap();
            prop_assert_eq!(got, items);
        }

        #[test]
        fn i16_round_trip(items in proptest::collection::vec(any::<i16>(), 0..64)) {
            let got: Vec<i16> = decode(&encode(&items)).unwrap();
            prop_assert_eq!(got, items);
        }

        #[test]
        fn u64_round_trip(items in proptest::collection::vec(any::<u64>(), 0..64)) {
            let got: Vec<u64> = decode(&encode(&items)).unwrap();
            prop_assert_eq!(got, items);
        }

        #[test]
        fn string_round_trip(items in proptest::collection::vec("[a-z0-9 ]{1,8}", 0..16)) {
            let got: Vec<String> = decode(&encode(&items)).unwrap();
            prop_assert_eq!(got, items);
        }
    }
}
