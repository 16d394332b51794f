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
    report::debug_unreachable,
    runtime::{
        coercion::{Conversion, Downcast, Upcast},
        session::Session,
        value::{ScriptValue, Table, TableKey},
    },
};

impl Upcast for () {
    #[inline(always)]
    fn upcast(self, _session: &mut Session) -> ScriptValue {
        ScriptValue::Nil
    }
}

// A tuple occupies a single slot: a table with 1-based positional keys.
// Spreading a tuple across several slots only happens at function
// boundaries, through the results interface.
macro_rules! tuple_family {
    ($(($($field:ident as $var:ident: $index:literal),+))*) => {$(
        impl<$($field: Upcast),+> Upcast for ($($field,)+) {
            fn upcast(self, session: &mut Session) -> ScriptValue {
                let ($($var,)+) = self;

                let table = Table::new();

                $(
                    let value = $var.upcast(session);

                    if table.set(ScriptValue::Int($index), value).is_err() {
                        debug_unreachable!("Integer table key rejected.");
                    }
                )+

                ScriptValue::Table(table)
            }
        }

        impl<$($field: Downcast + Default),+> Downcast for ($($field,)+) {
            fn downcast(session: &mut Session, value: &ScriptValue) -> Conversion<Self> {
                let ScriptValue::Table(table) = value else {
                    return match value.is_nil() {
                        true => Conversion::absent(),
                        false => Conversion::failure(),
                    };
                };

                let mut failed = false;

                $(
                    let slot = table.get(&TableKey::Int($index));

                    let ($var, slot_failed, _) =
                        $field::downcast(session, &slot).split($field::default());

                    failed = failed || slot_failed;
                )+

                Conversion {
                    value: Some(($($var,)+)),
                    failed,
                    exists: true,
                }
            }
        }
    )*};
}

tuple_family! {
    (A as a: 1, B as b: 2)
    (A as a: 1, B as b: 2, C as c: 3)
    (A as a: 1, B as b: 2, C as c: 3, D as d: 4)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pair_as_table() {
        let mut session = Session::new();

        session.push((10i64, "ten"));

        let ScriptValue::Table(table) = session.pop() else {
            panic!("Pair did not become a table.");
        };

        assert_eq!(table.get(&TableKey::Int(1)), ScriptValue::Int(10));
        assert_eq!(table.get(&TableKey::Int(2)), ScriptValue::from("ten"));
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn tuple_extraction_defaults_holes() {
        let mut session = Session::new();

        let table = Table::new();

        table.set(ScriptValue::Int(1), ScriptValue::Int(7)).unwrap();
        table.set(ScriptValue::Int(3), ScriptValue::Int(9)).unwrap();

        let outcome = session.convert::<(i64, i64, i64)>(&ScriptValue::Table(table));

        assert_eq!(outcome.value, Some((7, 0, 9)));
        assert!(!outcome.failed);

        let outcome = session.convert::<(i64, i64)>(&ScriptValue::Int(5));

        assert!(outcome.failed);
    }
}
