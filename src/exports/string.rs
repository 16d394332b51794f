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

use compact_str::{format_compact, CompactString};

use crate::runtime::{
    coercion::{Conversion, Downcast, Upcast},
    session::Session,
    value::ScriptValue,
};

impl Upcast for &str {
    #[inline(always)]
    fn upcast(self, _session: &mut Session) -> ScriptValue {
        ScriptValue::Str(CompactString::from(self))
    }
}

impl Upcast for String {
    #[inline(always)]
    fn upcast(self, _session: &mut Session) -> ScriptValue {
        ScriptValue::Str(CompactString::from(self))
    }
}

impl Upcast for CompactString {
    #[inline(always)]
    fn upcast(self, _session: &mut Session) -> ScriptValue {
        ScriptValue::Str(self)
    }
}

impl Upcast for char {
    #[inline(always)]
    fn upcast(self, _session: &mut Session) -> ScriptValue {
        ScriptValue::Str(format_compact!("{self}"))
    }
}

impl Downcast for CompactString {
    fn downcast(_session: &mut Session, value: &ScriptValue) -> Conversion<Self> {
        match value {
            ScriptValue::Nil => Conversion::absent(),

            ScriptValue::Int(value) => Conversion::of(format_compact!("{value}")),

            ScriptValue::Float(value) => Conversion::of(format_compact!("{value}")),

            // The string copies out of the runtime storage. The clone stays
            // valid regardless of later stack mutations.
            ScriptValue::Str(string) => Conversion::of(string.clone()),

            // Booleans do not read as strings.
            _ => Conversion::failure(),
        }
    }
}

impl Downcast for String {
    #[inline]
    fn downcast(session: &mut Session, value: &ScriptValue) -> Conversion<Self> {
        CompactString::downcast(session, value).map(String::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stringification() {
        let mut session = Session::new();

        assert_eq!(
            session.convert::<String>(&ScriptValue::Int(42)).ok(),
            Some(String::from("42")),
        );

        assert_eq!(
            session.convert::<String>(&ScriptValue::Float(2.5)).ok(),
            Some(String::from("2.5")),
        );

        assert!(session.convert::<String>(&ScriptValue::Bool(true)).failed);

        let outcome = session.convert::<String>(&ScriptValue::Nil);

        assert!(!outcome.exists);
        assert!(!outcome.failed);
    }
}
