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

use std::{
    collections::{BTreeSet, HashSet},
    hash::{BuildHasher, Hash},
};

use crate::{
    report::debug_unreachable,
    runtime::{
        coercion::{Conversion, Downcast, Upcast},
        session::Session,
        value::{ScriptValue, Table},
    },
};

// A set maps each element to `true`. Nil elements cannot be table keys and
// are dropped on entry.
fn upcast_set<T: Upcast>(
    session: &mut Session,
    elements: impl IntoIterator<Item = T>,
) -> ScriptValue {
    let table = Table::new();

    for element in elements {
        let key = element.upcast(session);

        if key.is_nil() {
            continue;
        }

        if table.set(key, ScriptValue::Bool(true)).is_err() {
            debug_unreachable!("Non-nil set element rejected as a table key.");
        }
    }

    ScriptValue::Table(table)
}

fn downcast_set<T: Downcast>(
    session: &mut Session,
    value: &ScriptValue,
) -> Conversion<Vec<T>> {
    let ScriptValue::Table(table) = value else {
        return match value.is_nil() {
            true => Conversion::absent(),
            false => Conversion::failure(),
        };
    };

    let mut elements = Vec::new();
    let mut failed = false;

    // Every key of the table is an element, regardless of the entry value.
    for (key, _) in table.pairs() {
        let conversion = T::downcast(session, &key);

        if conversion.failed {
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

impl<T: Upcast + Eq + Hash, S: BuildHasher> Upcast for HashSet<T, S> {
    #[inline]
    fn upcast(self, session: &mut Session) -> ScriptValue {
        upcast_set(session, self)
    }
}

impl<T: Downcast + Eq + Hash, S: BuildHasher + Default> Downcast for HashSet<T, S> {
    #[inline]
    fn downcast(session: &mut Session, value: &ScriptValue) -> Conversion<Self> {
        downcast_set(session, value).map(|elements| elements.into_iter().collect())
    }
}

impl<T: Upcast + Ord> Upcast for BTreeSet<T> {
    #[inline]
    fn upcast(self, session: &mut Session) -> ScriptValue {
        upcast_set(session, self)
    }
}

impl<T: Downcast + Ord> Downcast for BTreeSet<T> {
    #[inline]
    fn downcast(session: &mut Session, value: &ScriptValue) -> Conversion<Self> {
        downcast_set(session, value).map(|elements| elements.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_roundtrip() {
        let mut session = Session::new();

        let source = BTreeSet::from([1i64, 5, 9]);

        session.push(source.clone());

        let value = session.pop();

        let ScriptValue::Table(table) = &value else {
            panic!("Set did not become a table.");
        };

        for (_, flag) in table.pairs() {
            assert_eq!(flag, ScriptValue::Bool(true));
        }

        let outcome = session.convert::<BTreeSet<i64>>(&value);

        assert_eq!(outcome.value, Some(source));
        assert!(!outcome.failed);
    }
}
