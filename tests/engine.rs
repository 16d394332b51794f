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

use std::{cell::RefCell, collections::BTreeMap, rc::Rc};

use stela::{
    runtime::{
        CallStatus,
        ClassBinding,
        Exported,
        RuntimeError,
        RuntimeResult,
        ScriptFnValue,
        ScriptValue,
        Session,
    },
    script_class,
};

#[derive(Clone, Debug, PartialEq)]
struct Counter {
    count: i64,
}

script_class!(Counter as "Counter");

fn setup() -> Session {
    let mut session = Session::new();

    session.set_global_fn("double", |value: i64| value * 2);

    session.set_global_fn("checked_div", |a: i64, b: i64| -> RuntimeResult<i64> {
        if b == 0 {
            return Err(RuntimeError::custom("division by zero"));
        }

        Ok(a / b)
    });

    ClassBinding::<Counter>::new()
        .constructor(|count: i64| Counter { count })
        .field_mut("count", |counter: &Counter| counter.count, |counter, count| {
            counter.count = count
        })
        .method_mut("bump", |counter: &mut Counter| {
            counter.count += 1;

            counter.count
        })
        .install(&mut session);

    session
}

// A toy loader standing in for a language frontend. It understands two
// source forms: "push <ints...>" and "call <global> <ints...>".
fn install_loader(session: &mut Session) {
    session.set_loader(Rc::new(|_session, source: &str| {
        let mut words = source.split_whitespace();

        match words.next() {
            Some("push") => {
                let values: Vec<i64> = words.flat_map(|word| word.parse::<i64>()).collect();

                Ok(ScriptFnValue::new(move |session, _nargs| {
                    for value in &values {
                        session.push(*value);
                    }

                    Ok(values.len())
                }))
            }

            Some("call") => {
                let name = words.next().unwrap_or_default().to_owned();
                let args: Vec<i64> = words.flat_map(|word| word.parse::<i64>()).collect();

                Ok(ScriptFnValue::new(move |session, _nargs| {
                    let floor = session.top();

                    for arg in &args {
                        session.push(*arg);
                    }

                    if session.call_by_name(&name, args.len(), None) == CallStatus::Error {
                        let message = session.get_str(-1);

                        return Err(RuntimeError::custom(message));
                    }

                    Ok(session.top() - floor)
                }))
            }

            _ => Err(RuntimeError::custom("unknown chunk form")),
        }
    }));
}

#[test]
fn scalar_globals_roundtrip() {
    let mut session = setup();

    session.set_global("flag", true);
    session.set_global("amount", 42i64);
    session.set_global("ratio", 0.5);
    session.set_global("title", "stela");

    assert_eq!(session.global_value("flag"), ScriptValue::Bool(true));
    assert_eq!(session.global_value("amount"), ScriptValue::Int(42));
    assert_eq!(session.global_value("ratio"), ScriptValue::Float(0.5));
    assert_eq!(session.global_value("title"), ScriptValue::from("stela"));
    assert_eq!(session.global_value("missing"), ScriptValue::Nil);
}

#[test]
fn container_globals_roundtrip() {
    let mut session = setup();

    session.set_global("items", vec![10i64, 20, 30]);

    let map = BTreeMap::from([(String::from("a"), 1i64), (String::from("b"), 2)]);

    session.set_global("lookup", map.clone());

    session.get_global("items");

    let items = session.to::<Vec<i64>>(-1).ok().unwrap();

    assert_eq!(items, vec![10, 20, 30]);

    session.get_global("lookup");

    let lookup = session.to::<BTreeMap<String, i64>>(-1).ok().unwrap();

    assert_eq!(lookup, map);
}

#[test]
fn string_numbers_prefer_integers() {
    let mut session = setup();

    // Beyond the 53-bit range a real-number detour would round this value.
    session.push("9007199254740993");

    assert_eq!(session.get_int(-1), 9007199254740993);

    session.push("2.5");

    assert_eq!(session.get_float(-1), 2.5);
    assert_eq!(session.get_int(-1), 2);
}

#[test]
fn eval_through_loader() {
    let mut session = setup();

    install_loader(&mut session);

    assert_eq!(session.eval("push 1 2 3", None), CallStatus::Ok);
    assert_eq!(session.top(), 3);
    assert_eq!(session.get_int(3), 3);

    session.truncate(0);

    assert_eq!(session.eval("push 1 2 3", Some(2)), CallStatus::Ok);
    assert_eq!(session.top(), 2);

    session.truncate(0);

    assert_eq!(session.eval("call double 21", Some(1)), CallStatus::Ok);
    assert_eq!(session.get_int(-1), 42);
}

#[test]
fn eval_failures_leave_one_error_slot() {
    let mut session = setup();

    install_loader(&mut session);

    session.push("sentinel");

    assert_eq!(session.eval("call checked_div 1 0", None), CallStatus::Error);
    assert_eq!(session.top(), 2);
    assert!(session.get_str(-1).contains("division by zero"));

    session.truncate(1);

    assert_eq!(session.eval("frobnicate", None), CallStatus::Error);
    assert!(session.get_str(-1).contains("unknown chunk form"));
    assert_eq!(session.get_str(1).as_str(), "sentinel");
}

#[test]
fn subcontexts_share_everything_but_the_stack() {
    let mut session = setup();

    install_loader(&mut session);

    session.push(1i64);

    let mut child = session.subcontext();

    assert_eq!(child.top(), 0);

    // The loader, the globals, and the class registry are shared.
    assert_eq!(child.eval("call double 5", Some(1)), CallStatus::Ok);
    assert_eq!(child.get_int(-1), 10);

    child.push(Counter { count: 7 });

    assert!(child.member_get(-1, "count").is_ok());

    assert_eq!(session.top(), 1);
}

#[test]
fn class_state_crosses_through_shared_cells() {
    let mut session = setup();

    let counter = Rc::new(RefCell::new(Counter { count: 0 }));

    session.push(Rc::clone(&counter));

    let bump = session.member_get(-1, "bump").unwrap();

    for _ in 0..3 {
        session.push_value(bump.clone());

        assert_eq!(session.call(0, Some(1)), CallStatus::Ok);

        session.truncate(1);
    }

    assert_eq!(counter.borrow().count, 3);
}

#[test]
fn const_handles_guard_shared_state() {
    let mut session = setup();

    let counter = Rc::new(RefCell::new(Counter { count: 0 }));

    session.push(Exported::shared(Rc::clone(&counter)).constant());

    assert!(matches!(
        session.member_get(-1, "bump").unwrap_err(),
        RuntimeError::QualifierMismatch { .. },
    ));

    assert!(matches!(
        session
            .member_set(-1, "count", ScriptValue::Int(9))
            .unwrap_err(),
        RuntimeError::ReadOnly { .. },
    ));

    assert_eq!(
        session.member_get(-1, "count").unwrap(),
        ScriptValue::Int(0),
    );
}

#[test]
fn anchored_functions_survive_session_churn() {
    let mut session = setup();

    let double = session.function::<i64>("double").unwrap();

    session.set_global("double", ScriptValue::Nil);
    session.truncate(0);

    let outcome = double.call(&mut session, (21i64,));

    assert!(outcome.existed);
    assert!(outcome.complete);
    assert_eq!(outcome.ok(), Some(42));
}

#[test]
fn table_api_over_stack_slots() {
    let mut session = setup();

    session.push(Vec::<i64>::new());

    session.table_set(1, 1i64, 10i64).unwrap();
    session.table_set(1, 2i64, 20i64).unwrap();
    session.table_set(1, "label", "ten-twenty").unwrap();

    assert_eq!(session.seq_len(1), 2);
    assert_eq!(session.table_get(1, 2i64).unwrap(), ScriptValue::Int(20));
    assert_eq!(
        session.table_get(1, "label").unwrap(),
        ScriptValue::from("ten-twenty"),
    );

    // The real-number key 2.0 addresses the same entry as the integer 2.
    assert_eq!(session.table_get(1, 2.0).unwrap(), ScriptValue::Int(20));

    // A nil write removes the entry; the length operator still reports the
    // largest surviving integer key.
    session.table_set(1, 1i64, ScriptValue::Nil).unwrap();

    assert_eq!(session.seq_len(1), 2);
    assert_eq!(session.to::<Vec<i64>>(1).ok(), Some(vec![20]));
}
