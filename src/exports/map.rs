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
    collections::{BTreeMap, HashMap},
    hash::{BuildHasher, Hash},
};

use crate::runtime::{
    coercion::{Conversion, Downcast, Upcast},
    session::Session,
    value::{ScriptValue, Table},
};

fn upcast_map<K: Upcast, V: Upcast>(
    session: &mut Session,
    entries: impl IntoIterator<Item = (K, V)>,
) -> ScriptValue {
    let table = Table::new();

    for (key, value) in entries {
        let key = key.upcast(session);

        // Nil keys cannot address table entries.
        if key.is_nil() {
            continue;
        }

        let value = value.upcast(session);

        let _ = table.set(key, value);
    }

    ScriptValue::Table(table)
}

// Map extraction walks every entry of the table, not just the sequence
// part. An entry lands in the map only when both its key and its value
// convert cleanly.
fn downcast_map<K: Downcast, V: Downcast>(
    session: &mut Session,
    value: &ScriptValue,
) -> Conversion<Vec<(K, V)>> {
    let ScriptValue::Table(table) = value else {
        return match value.is_nil() {
            true => Conversion::absent(),
            false => Conversion::failure(),
        };
    };

    let mut entries = Vec::new();
    let mut failed = false;

    for (key, slot) in table.pairs() {
        let key = K::downcast(session, &key);
        let slot = V::downcast(session, &slot);

        if key.failed || slot.failed {
            log::warn!("Table entry resisted coercion.");

            failed = true;

            continue;
        }

        if let (Some(key), Some(slot)) = (key.value, slot.value) {
            entries.push((key, slot));
        }
    }

    Conversion {
        value: Some(entries),
        failed,
        exists: true,
    }
}

impl<K: Upcast + Eq + Hash, V: Upcast, S: BuildHasher> Upcast for HashMap<K, V, S> {
    #[inline]
    fn upcast(self, session: &mut Session) -> ScriptValue {
        upcast_map(session, self)
    }
}

impl<K: Downcast + Eq + Hash, V: Downcast, S: BuildHasher + Default> Downcast
    for HashMap<K, V, S>
{
    #[inline]
    fn downcast(session: &mut Session, value: &ScriptValue) -> Conversion<Self> {
        downcast_map(session, value).map(|entries| entries.into_iter().collect())
    }
}

impl<K: Upcast + Ord, V: Upcast> Upcast for BTreeMap<K, V> {
    #[inline]
    fn upcast(self, session: &mut Session) -> ScriptValue {
        upcast_map(session, self)
    }
}

impl<K: Downcast + Ord, V: Downcast> Downcast for BTreeMap<K, V> {
    #[inline]
    fn downcast(session: &mut Session, value: &ScriptValue) -> Conversion<Self> {
        downcast_map(session, value).map(|entries| entries.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_extract_every_entry() {
        let mut session = Session::new();

        let table = Table::new();

        table
            .set(ScriptValue::from("a"), ScriptValue::Int(1))
            .unwrap();
        table.set(ScriptValue::Int(1), ScriptValue::Int(1)).unwrap();
        table.set(ScriptValue::Int(2), ScriptValue::Int(2)).unwrap();

        // String targets stringify the integer keys, so all three entries
        // survive under distinct keys.
        let outcome = session.convert::<BTreeMap<String, i64>>(&ScriptValue::Table(table));

        let map = outcome.value.unwrap();

        assert_eq!(map.len(), 3);
        assert_eq!(map.get("a"), Some(&1));
        assert_eq!(map.get("1"), Some(&1));
        assert_eq!(map.get("2"), Some(&2));
    }

    #[test]
    fn map_roundtrip() {
        let mut session = Session::new();

        let source = BTreeMap::from([(String::from("x"), 1i64), (String::from("y"), 2)]);

        session.push(source.clone());

        let value = session.pop();

        let outcome = session.convert::<BTreeMap<String, i64>>(&value);

        assert_eq!(outcome.value, Some(source));
        assert!(!outcome.failed);
    }
}
