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

use crate::{
    exports::number::parse_number,
    runtime::{
        coercion::{Conversion, Downcast, Upcast},
        session::Session,
        value::ScriptValue,
    },
};

impl Upcast for bool {
    #[inline(always)]
    fn upcast(self, _session: &mut Session) -> ScriptValue {
        ScriptValue::Bool(self)
    }
}

impl Downcast for bool {
    fn downcast(_session: &mut Session, value: &ScriptValue) -> Conversion<Self> {
        match value {
            ScriptValue::Nil => Conversion::absent(),

            ScriptValue::Bool(value) => Conversion::of(*value),

            // Only a zero number is falsy.
            ScriptValue::Int(value) => Conversion::of(*value != 0),
            ScriptValue::Float(value) => Conversion::of(*value != 0.0),

            // A string is a boolean only if it reads as a number.
            ScriptValue::Str(string) => match parse_number(string) {
                Some(_) => Conversion::of(true),
                None => Conversion::failure(),
            },

            ScriptValue::Table(..) | ScriptValue::Fn(..) | ScriptValue::Data(..) => {
                Conversion::of(true)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truthiness() {
        let mut session = Session::new();

        assert_eq!(
            session.convert::<bool>(&ScriptValue::Int(0)).ok(),
            Some(false),
        );
        assert_eq!(
            session.convert::<bool>(&ScriptValue::Float(0.5)).ok(),
            Some(true),
        );
        assert_eq!(
            session.convert::<bool>(&ScriptValue::from("12.5")).ok(),
            Some(true),
        );
        assert_eq!(
            session
                .convert::<bool>(&ScriptValue::Table(Default::default()))
                .ok(),
            Some(true),
        );

        let outcome = session.convert::<bool>(&ScriptValue::from("yes"));

        assert!(outcome.failed);
        assert!(outcome.exists);

        let outcome = session.convert::<bool>(&ScriptValue::Nil);

        assert!(!outcome.failed);
        assert!(!outcome.exists);
    }
}
