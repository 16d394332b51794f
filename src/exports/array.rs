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

impl<T: Upcast> Upcast for Vec<T> {
    fn upcast(self, session: &mut Session) -> ScriptValue {
        let table = Table::new();

        for (index, element) in self.into_iter().enumerate() {
            let value = element.upcast(session);

            if table.set(ScriptValue::Int(index as i64 + 1), value).is_err() {
                debug_unreachable!("Integer table key rejected.");
            }
        }

        ScriptValue::Table(table)
    }
}

impl<T: Upcast + Clone> Upcast for &[T] {
    #[inline]
    fn upcast(self, session: &mut Session) -> ScriptValue {
        self.to_vec().upcast(session)
    }
}

impl<T: Downcast> Downcast for Vec<T> {
    fn downcast(session: &mut Session, value: &ScriptValue) -> Conversion<Self> {
        let ScriptValue::Table(table) = value else {
            return match value.is_nil() {
                true => Conversion::absent(),
                false => Conversion::failure(),
            };
        };

        let length = table.seq_len();

        let mut elements = Vec::with_capacity(length);
        let mut failed = false;

        for index in 1..=length {
            let slot = table.get(&TableKey::Int(index as i64));

            // Sequence holes are compacted away.
            if slot.is_nil() {
                continue;
            }

            let conversion = T::downcast(session, &slot);

            if conversion.failed {
                log::warn!("Sequence element {index} resisted coercion.");

                failed = true;

                continue;
            }

            if let Some(element) = conversion.value {
                elements.push(element);
            }
        }

        Conversion {
            value: Some(elements),
            failed,
            exists: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_roundtrip() {
        let mut session = Session::new();

        session.push(vec![1i64, 2, 3]);

        let value = session.pop();

        let outcome = session.convert::<Vec<i64>>(&value);

        assert_eq!(outcome.value, Some(vec![1, 2, 3]));
        assert!(!outcome.failed);
    }

    #[test]
    fn holes_are_discarded() {
        let mut session = Session::new();

        let table = Table::new();

        table.set(ScriptValue::Int(1), ScriptValue::Int(1)).unwrap();
        table.set(ScriptValue::Int(2), ScriptValue::Int(2)).unwrap();
        table.set(ScriptValue::Int(4), ScriptValue::Int(4)).unwrap();

        assert_eq!(table.seq_len(), 4);

        let outcome = session.convert::<Vec<i64>>(&ScriptValue::Table(table));

        assert_eq!(outcome.value, Some(vec![1, 2, 4]));
        assert!(!outcome.failed);
    }

    #[test]
    fn malformed_elements_flag_failure() {
        let mut session = Session::new();

        let table = Table::new();

        table.set(ScriptValue::Int(1), ScriptValue::Int(1)).unwrap();
        table
            .set(ScriptValue::Int(2), ScriptValue::from("grape"))
            .unwrap();
        table.set(ScriptValue::Int(3), ScriptValue::Int(3)).unwrap();

        let outcome = session.convert::<Vec<i64>>(&ScriptValue::Table(table));

        assert_eq!(outcome.value, Some(vec![1, 3]));
        assert!(outcome.failed);
    }
}
