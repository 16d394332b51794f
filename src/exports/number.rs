////////////////////////////////////////////////////////////////////////////////
// This file is part of "Stela", an embeddable scripting runtime binding      //
// and marshalling engine.                                                    //
//                                                                            //
// This work is proprietary software with source-available code.              //
//                                                                            //
// To copy, use, distribute, or contribute to this work, you must agree to    //
// the terms of the General License Agreement:                                //
//                                                                            //
// https://github.com/Eliah-Lakhin/stela/blob/master/EULA.md                  //
//                                                                            //
// The agreement grants a Basic Commercial License, allowing you to use       //
// this work in non-commercial and limited commercial products with a total   //
// gross revenue cap. To remove this commercial limit for one of your         //
// products, you must acquire a Full Commercial License.                      //
//                                                                            //
// If you contribute to the source code, documentation, or related materials, //
// you must grant me an exclusive license to these contributions.             //
// Contributions are governed by the "Contributions" section of the General   //
// License Agreement.                                                         //
//                                                                            //
// Copying the work in parts is strictly forbidden, except as permitted       //
// under the General License Agreement.                                       //
//                                                                            //
// If you do not or cannot agree to the terms of this Agreement,              //
// do not use this work.                                                      //
//                                                                            //
// This work is provided "as is", without any warranties, express or implied, //
// except where such disclaimers are legally invalid.                         //
//                                                                            //
// Copyright (c) 2024 Ilya Lakhin (Илья Александрович Лахин).                 //
// All rights reserved.                                                       //
////////////////////////////////////////////////////////////////////////////////

use crate::runtime::{
    coercion::{Conversion, Downcast, Upcast},
    session::Session,
    value::ScriptValue,
};

/// Integer-first numeric reading of a string.
///
/// A string that spells an integer (decimal or `0x` hexadecimal) becomes an
/// [ScriptValue::Int] with no precision loss, even beyond the 53-bit range
/// where a real-number roundtrip would round. Anything else falls back to a
/// real-number parse.
pub(crate) fn parse_number(text: &str) -> Option<ScriptValue> {
    let text = text.trim();

    if text.is_empty() {
        return None;
    }

    let (sign, digits) = match text.strip_prefix('-') {
        Some(rest) => (-1i64, rest),
        None => (1i64, text.strip_prefix('+').unwrap_or(text)),
    };

    if let Some(hex) = digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X")) {
        let value = i64::from_str_radix(hex, 16).ok()?;

        return Some(ScriptValue::Int(sign.wrapping_mul(value)));
    }

    if let Ok(value) = text.parse::<i64>() {
        return Some(ScriptValue::Int(value));
    }

    match text.parse::<f64>() {
        Ok(value) if value.is_finite() => Some(ScriptValue::Float(value)),
        _ => None,
    }
}

macro_rules! int_family {
    ($($ty:ident),* $(,)?) => {$(
        impl Upcast for $ty {
            #[inline(always)]
            fn upcast(self, _session: &mut Session) -> ScriptValue {
                ScriptValue::Int(self as i64)
            }
        }

        impl Downcast for $ty {
            fn downcast(session: &mut Session, value: &ScriptValue) -> Conversion<Self> {
                match value {
                    ScriptValue::Nil => Conversion::absent(),

                    ScriptValue::Bool(value) => Conversion::of(*value as $ty),

                    ScriptValue::Int(value) => match cast::$ty(*value) {
                        Ok(value) => Conversion::of(value),
                        Err(_) => Conversion::failure(),
                    },

                    ScriptValue::Float(value) => match cast::$ty(*value) {
                        Ok(value) => Conversion::of(value),
                        Err(_) => Conversion::failure(),
                    },

                    ScriptValue::Str(string) => match parse_number(string) {
                        Some(number) => Self::downcast(session, &number),
                        None => Conversion::failure(),
                    },

                    _ => Conversion::failure(),
                }
            }
        }
    )*};
}

int_family!(i8, i16, i32, u8, u16, u32);

impl Upcast for i64 {
    #[inline(always)]
    fn upcast(self, _session: &mut Session) -> ScriptValue {
        ScriptValue::Int(self)
    }
}

impl Downcast for i64 {
    fn downcast(session: &mut Session, value: &ScriptValue) -> Conversion<Self> {
        match value {
            ScriptValue::Nil => Conversion::absent(),

            ScriptValue::Bool(value) => Conversion::of(*value as i64),

            ScriptValue::Int(value) => Conversion::of(*value),

            ScriptValue::Float(value) => match cast::i64(*value) {
                Ok(value) => Conversion::of(value),
                Err(_) => Conversion::failure(),
            },

            ScriptValue::Str(string) => match parse_number(string) {
                Some(number) => Self::downcast(session, &number),
                None => Conversion::failure(),
            },

            _ => Conversion::failure(),
        }
    }
}

macro_rules! wide_unsigned_family {
    ($($ty:ident),* $(,)?) => {$(
        impl Upcast for $ty {
            #[inline(always)]
            fn upcast(self, _session: &mut Session) -> ScriptValue {
                // Values above i64::MAX lose the integer representation.
                match i64::try_from(self) {
                    Ok(value) => ScriptValue::Int(value),
                    Err(_) => ScriptValue::Float(self as f64),
                }
            }
        }

        impl Downcast for $ty {
            fn downcast(session: &mut Session, value: &ScriptValue) -> Conversion<Self> {
                match value {
                    ScriptValue::Nil => Conversion::absent(),

                    ScriptValue::Bool(value) => Conversion::of(*value as $ty),

                    ScriptValue::Int(value) => match <$ty>::try_from(*value) {
                        Ok(value) => Conversion::of(value),
                        Err(_) => Conversion::failure(),
                    },

                    ScriptValue::Float(value) => match cast::i64(*value) {
                        Ok(value) => match <$ty>::try_from(value) {
                            Ok(value) => Conversion::of(value),
                            Err(_) => Conversion::failure(),
                        },
                        Err(_) => Conversion::failure(),
                    },

                    ScriptValue::Str(string) => match parse_number(string) {
                        Some(number) => Self::downcast(session, &number),
                        None => Conversion::failure(),
                    },

                    _ => Conversion::failure(),
                }
            }
        }
    )*};
}

wide_unsigned_family!(u64, usize);

impl Upcast for isize {
    #[inline(always)]
    fn upcast(self, _session: &mut Session) -> ScriptValue {
        ScriptValue::Int(self as i64)
    }
}

impl Downcast for isize {
    fn downcast(session: &mut Session, value: &ScriptValue) -> Conversion<Self> {
        let wide = i64::downcast(session, value);

        let Some(value) = wide.value else {
            return Conversion {
                value: None,
                failed: wide.failed,
                exists: wide.exists,
            };
        };

        // Pointer-width narrowing is checked on 32-bit hosts.
        match isize::try_from(value) {
            Ok(value) => Conversion::of(value),
            Err(_) => Conversion::failure(),
        }
    }
}

impl Upcast for f32 {
    #[inline(always)]
    fn upcast(self, _session: &mut Session) -> ScriptValue {
        ScriptValue::Float(self as f64)
    }
}

impl Downcast for f32 {
    fn downcast(session: &mut Session, value: &ScriptValue) -> Conversion<Self> {
        f64::downcast(session, value).map(|value| value as f32)
    }
}

impl Upcast for f64 {
    #[inline(always)]
    fn upcast(self, _session: &mut Session) -> ScriptValue {
        ScriptValue::Float(self)
    }
}

impl Downcast for f64 {
    fn downcast(session: &mut Session, value: &ScriptValue) -> Conversion<Self> {
        match value {
            ScriptValue::Nil => Conversion::absent(),

            ScriptValue::Bool(value) => Conversion::of(*value as u8 as f64),

            ScriptValue::Int(value) => Conversion::of(cast::f64(*value)),

            ScriptValue::Float(value) => Conversion::of(*value),

            ScriptValue::Str(string) => match parse_number(string) {
                Some(number) => Self::downcast(session, &number),
                None => Conversion::failure(),
            },

            _ => Conversion::failure(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_first_string_parse() {
        // This value is not exactly representable in an f64.
        assert_eq!(
            parse_number("9007199254740993"),
            Some(ScriptValue::Int(9007199254740993)),
        );

        assert_eq!(parse_number("  -17 "), Some(ScriptValue::Int(-17)));
        assert_eq!(parse_number("0x1f"), Some(ScriptValue::Int(31)));
        assert_eq!(parse_number("2.5"), Some(ScriptValue::Float(2.5)));
        assert_eq!(parse_number("1e3"), Some(ScriptValue::Float(1000.0)));
        assert_eq!(parse_number("grape"), None);
        assert_eq!(parse_number(""), None);
    }

    #[test]
    fn checked_narrowing() {
        let mut session = Session::new();

        assert_eq!(session.convert::<u8>(&ScriptValue::Int(255)).ok(), Some(255));
        assert!(session.convert::<u8>(&ScriptValue::Int(256)).failed);
        assert!(session.convert::<u8>(&ScriptValue::Int(-1)).failed);
        assert!(session.convert::<u64>(&ScriptValue::Int(-1)).failed);

        assert_eq!(
            session.convert::<i64>(&ScriptValue::from("9007199254740993")).ok(),
            Some(9007199254740993),
        );

        assert_eq!(
            session.convert::<i32>(&ScriptValue::Bool(true)).ok(),
            Some(1),
        );

        assert!(session.convert::<i32>(&ScriptValue::from("grape")).failed);
    }

    #[test]
    fn pointer_width_ints_are_checked() {
        let mut session = Session::new();

        assert_eq!(session.convert::<isize>(&ScriptValue::Int(7)).ok(), Some(7));

        let conversion = session.convert::<isize>(&ScriptValue::Int(1i64 << 40));

        assert_eq!(conversion.failed, isize::BITS < 64);
    }

    #[test]
    fn wide_unsigned_push() {
        let mut session = Session::new();

        session.push(7u64);
        assert_eq!(session.value_at(-1), Some(ScriptValue::Int(7)));

        session.push(u64::MAX);
        assert_eq!(session.kind_at(-1), crate::runtime::ScriptKind::Float);
    }
}
