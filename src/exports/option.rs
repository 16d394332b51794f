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

impl<T: Upcast> Upcast for Option<T> {
    #[inline]
    fn upcast(self, session: &mut Session) -> ScriptValue {
        match self {
            Some(value) => value.upcast(session),
            None => ScriptValue::Nil,
        }
    }
}

impl<T: Downcast> Downcast for Option<T> {
    fn downcast(session: &mut Session, value: &ScriptValue) -> Conversion<Self> {
        if value.is_nil() {
            // A nil optional converts, but does not exist.
            return Conversion {
                value: Some(None),
                failed: false,
                exists: false,
            };
        }

        T::downcast(session, value).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nil_optionals() {
        let mut session = Session::new();

        let outcome = session.convert::<Option<i64>>(&ScriptValue::Nil);

        assert_eq!(outcome.value, Some(None));
        assert!(!outcome.failed);
        assert!(!outcome.exists);

        let outcome = session.convert::<Option<i64>>(&ScriptValue::Int(5));

        assert_eq!(outcome.value, Some(Some(5)));
        assert!(outcome.exists);

        let outcome = session.convert::<Option<i64>>(&ScriptValue::from("grape"));

        assert!(outcome.failed);
    }
}
