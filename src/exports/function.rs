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

//! Marshalling of callables across the host/runtime boundary.
//!
//! Host functions become runtime values through [IntoNativeFn]; runtime
//! functions become typed host handles through [ScriptFnRef]. Function
//! boundaries are the one place where a Rust tuple spreads over several
//! stack slots instead of becoming a table: the [IntoResults] and
//! [FromResults] interfaces govern that spread.

use std::{
    collections::{BTreeMap, BTreeSet, HashMap, HashSet},
    hash::{BuildHasher, Hash},
    marker::PhantomData,
};

use compact_str::CompactString;

use crate::runtime::{
    coercion::{Conversion, Downcast, Upcast},
    error::RuntimeResult,
    refs::ScriptRef,
    session::{CallStatus, Session},
    value::{ScriptFnValue, ScriptValue, Table},
};

/// An argument pack of a [ScriptFnRef] invocation.
///
/// Implemented for tuples of [Upcast] types up to five elements. Each
/// element occupies one argument slot.
pub trait PushArgs {
    /// Converts and pushes every argument onto the session stack.
    fn push_args(self, session: &mut Session);
}

macro_rules! push_args_family {
    ($(($($arg:ident as $var:ident),*))*) => {$(
        impl<$($arg: Upcast),*> PushArgs for ($($arg,)*) {
            #[inline]
            #[allow(unused_variables)]
            fn push_args(self, session: &mut Session) {
                let ($($var,)*) = self;

                $(session.push($var);)*
            }
        }
    )*};
}

push_args_family! {
    ()
    (A1 as a1)
    (A1 as a1, A2 as a2)
    (A1 as a1, A2 as a2, A3 as a3)
    (A1 as a1, A2 as a2, A3 as a3, A4 as a4)
    (A1 as a1, A2 as a2, A3 as a3, A4 as a4, A5 as a5)
}

/// A host function result spread over stack slots.
///
/// A unit result occupies zero slots, a single value one slot, and a tuple
/// one slot per element. A failing [RuntimeResult] unwinds the invocation
/// to the protected call boundary.
pub trait IntoResults {
    /// Pushes the result slots and returns how many were pushed.
    fn into_results(self, session: &mut Session) -> RuntimeResult<usize>;
}

impl IntoResults for () {
    #[inline(always)]
    fn into_results(self, _session: &mut Session) -> RuntimeResult<usize> {
        Ok(0)
    }
}

impl<T: IntoResults> IntoResults for RuntimeResult<T> {
    #[inline]
    fn into_results(self, session: &mut Session) -> RuntimeResult<usize> {
        self?.into_results(session)
    }
}

macro_rules! single_result_family {
    ($($ty:ty),* $(,)?) => {$(
        impl IntoResults for $ty {
            #[inline]
            fn into_results(self, session: &mut Session) -> RuntimeResult<usize> {
                session.push(self);

                Ok(1)
            }
        }
    )*};
}

single_result_family!(
    bool, i8, i16, i32, i64, u8, u16, u32, u64, isize, usize, f32, f64, char,
    String, CompactString, ScriptValue, Table, ScriptFnValue,
);

impl IntoResults for &str {
    #[inline]
    fn into_results(self, session: &mut Session) -> RuntimeResult<usize> {
        session.push(self);

        Ok(1)
    }
}

impl<T: Upcast> IntoResults for Option<T> {
    #[inline]
    fn into_results(self, session: &mut Session) -> RuntimeResult<usize> {
        session.push(self);

        Ok(1)
    }
}

impl<T: Upcast> IntoResults for Vec<T> {
    #[inline]
    fn into_results(self, session: &mut Session) -> RuntimeResult<usize> {
        session.push(self);

        Ok(1)
    }
}

impl<T: Upcast + Eq + Hash, S: BuildHasher> IntoResults for HashSet<T, S> {
    #[inline]
    fn into_results(self, session: &mut Session) -> RuntimeResult<usize> {
        session.push(self);

        Ok(1)
    }
}

impl<T: Upcast + Ord> IntoResults for BTreeSet<T> {
    #[inline]
    fn into_results(self, session: &mut Session) -> RuntimeResult<usize> {
        session.push(self);

        Ok(1)
    }
}

impl<K: Upcast + Eq + Hash, V: Upcast, S: BuildHasher> IntoResults for HashMap<K, V, S> {
    #[inline]
    fn into_results(self, session: &mut Session) -> RuntimeResult<usize> {
        session.push(self);

        Ok(1)
    }
}

impl<K: Upcast + Ord, V: Upcast> IntoResults for BTreeMap<K, V> {
    #[inline]
    fn into_results(self, session: &mut Session) -> RuntimeResult<usize> {
        session.push(self);

        Ok(1)
    }
}

macro_rules! multi_result_family {
    ($(($($field:ident as $var:ident),+; $total:literal))*) => {$(
        impl<$($field: Upcast),+> IntoResults for ($($field,)+) {
            fn into_results(self, session: &mut Session) -> RuntimeResult<usize> {
                let ($($var,)+) = self;

                $(session.push($var);)+

                Ok($total)
            }
        }
    )*};
}

multi_result_family! {
    (A as a, B as b; 2)
    (A as a, B as b, C as c; 3)
    (A as a, B as b, C as c, D as d; 4)
}

/// A runtime function result read back into a Rust object.
///
/// The mirror of [IntoResults]: a unit consumes zero slots, a single type
/// one slot, a tuple one slot per element starting at the first result
/// position.
pub trait FromResults: Sized {
    /// The number of result slots this type consumes.
    const POSITIONS: usize;

    /// Reads the result slots starting at the 1-based stack slot `base`.
    fn from_results(session: &mut Session, base: i32) -> Conversion<Self>;
}

impl FromResults for () {
    const POSITIONS: usize = 0;

    #[inline(always)]
    fn from_results(_session: &mut Session, _base: i32) -> Conversion<Self> {
        Conversion::of(())
    }
}

fn one_result<T: Downcast>(session: &mut Session, base: i32) -> Conversion<T> {
    match session.value_at(base) {
        Some(value) => T::downcast(session, &value),
        None => Conversion::absent(),
    }
}

macro_rules! single_position_family {
    ($($ty:ty),* $(,)?) => {$(
        impl FromResults for $ty {
            const POSITIONS: usize = 1;

            #[inline]
            fn from_results(session: &mut Session, base: i32) -> Conversion<Self> {
                one_result(session, base)
            }
        }
    )*};
}

single_position_family!(
    bool, i8, i16, i32, i64, u8, u16, u32, u64, isize, usize, f32, f64,
    String, CompactString, ScriptValue, Table, ScriptFnValue,
);

impl<T: Downcast> FromResults for Option<T> {
    const POSITIONS: usize = 1;

    #[inline]
    fn from_results(session: &mut Session, base: i32) -> Conversion<Self> {
        one_result(session, base)
    }
}

impl<T: Downcast> FromResults for Vec<T> {
    const POSITIONS: usize = 1;

    #[inline]
    fn from_results(session: &mut Session, base: i32) -> Conversion<Self> {
        one_result(session, base)
    }
}

impl<T: Downcast + Eq + Hash, S: BuildHasher + Default> FromResults for HashSet<T, S> {
    const POSITIONS: usize = 1;

    #[inline]
    fn from_results(session: &mut Session, base: i32) -> Conversion<Self> {
        one_result(session, base)
    }
}

impl<T: Downcast + Ord> FromResults for BTreeSet<T> {
    const POSITIONS: usize = 1;

    #[inline]
    fn from_results(session: &mut Session, base: i32) -> Conversion<Self> {
        one_result(session, base)
    }
}

impl<K: Downcast + Eq + Hash, V: Downcast, S: BuildHasher + Default> FromResults
    for HashMap<K, V, S>
{
    const POSITIONS: usize = 1;

    #[inline]
    fn from_results(session: &mut Session, base: i32) -> Conversion<Self> {
        one_result(session, base)
    }
}

impl<K: Downcast + Ord, V: Downcast> FromResults for BTreeMap<K, V> {
    const POSITIONS: usize = 1;

    #[inline]
    fn from_results(session: &mut Session, base: i32) -> Conversion<Self> {
        one_result(session, base)
    }
}

macro_rules! multi_position_family {
    ($(($($field:ident as $var:ident: $offset:literal),+; $total:literal))*) => {$(
        impl<$($field: Downcast + Default),+> FromResults for ($($field,)+) {
            const POSITIONS: usize = $total;

            fn from_results(session: &mut Session, base: i32) -> Conversion<Self> {
                let mut failed = false;
                let mut exists = false;

                $(
                    let conversion = one_result::<$field>(session, base + $offset);

                    failed = failed || conversion.failed;
                    exists = exists || conversion.exists;

                    let $var = conversion.value.unwrap_or_default();
                )+

                Conversion {
                    value: Some(($($var,)+)),
                    failed,
                    exists,
                }
            }
        }
    )*};
}

multi_position_family! {
    (A as a: 0, B as b: 1; 2)
    (A as a: 0, B as b: 1, C as c: 2; 3)
    (A as a: 0, B as b: 1, C as c: 2, D as d: 3; 4)
}

/// Wraps a host callable into a runtime function value.
///
/// Implemented for `Fn` closures of up to five arguments. Each argument
/// type defaults when the caller passes nil or nothing at its position, and
/// fails the whole invocation when an incompatible value is passed. The
/// return type spreads over stack slots through [IntoResults]; a
/// [RuntimeResult] return lets the callable raise.
///
/// The `A` parameter is the argument tuple marker that keeps the arity
/// implementations coherent. It is inferred at call sites.
pub trait IntoNativeFn<A> {
    /// Converts the callable into a runtime function value.
    fn into_native_fn(self) -> ScriptFnValue;
}

macro_rules! native_fn_family {
    ($(($($arg:ident as $var:ident: $index:literal),*))*) => {$(
        impl<Fun, Res $(, $arg)*> IntoNativeFn<($($arg,)*)> for Fun
        where
            Fun: Fn($($arg),*) -> Res + 'static,
            Res: IntoResults,
            $($arg: Downcast + Default,)*
        {
            fn into_native_fn(self) -> ScriptFnValue {
                ScriptFnValue::new(move |session, nargs| {
                    #[allow(unused_variables)]
                    let base = (session.top() - nargs) as i32 + 1;

                    $(let $var: $arg = session.arg(base + $index - 1, $index)?;)*

                    self($($var),*).into_results(session)
                })
            }
        }
    )*};
}

native_fn_family! {
    ()
    (A1 as a1: 1)
    (A1 as a1: 1, A2 as a2: 2)
    (A1 as a1: 1, A2 as a2: 2, A3 as a3: 3)
    (A1 as a1: 1, A2 as a2: 2, A3 as a3: 3, A4 as a4: 4)
    (A1 as a1: 1, A2 as a2: 2, A3 as a3: 3, A4 as a4: 4, A5 as a5: 5)
}

/// Wraps a host callable into a runtime function value.
///
/// A free-standing alias of [IntoNativeFn::into_native_fn].
#[inline(always)]
pub fn native_fn<A>(function: impl IntoNativeFn<A>) -> ScriptFnValue {
    function.into_native_fn()
}

/// The outcome of a [ScriptFnRef] invocation.
///
/// Four facts are reported independently, so the caller can distinguish a
/// missing callee from a raising one, and a malformed result from a short
/// result list.
#[derive(Debug)]
pub struct FnOutcome<R> {
    /// The converted result, if any.
    pub value: Option<R>,

    /// True if the invocation raised (or the callee was missing).
    pub failed: bool,

    /// True if the referenced value was a function at invocation time.
    pub existed: bool,

    /// True if the invocation succeeded but its result resisted coercion.
    pub result_failed: bool,

    /// True if the callee produced at least as many result slots as the
    /// result type consumes.
    pub complete: bool,
}

impl<R> FnOutcome<R> {
    /// The converted result, if the invocation fully succeeded.
    #[inline]
    pub fn ok(self) -> Option<R> {
        match self.failed || self.result_failed {
            true => None,
            false => self.value,
        }
    }

    /// Unwraps the result, substituting `default` when the invocation did
    /// not produce one.
    #[inline(always)]
    pub fn value_or(self, default: R) -> R {
        self.value.unwrap_or(default)
    }
}

/// A typed, persistent handle of a runtime function.
///
/// The handle anchors the function value, so it remains invocable long
/// after the stack slot or global it was read from is gone. `R` is the
/// result type the invocation converts into.
pub struct ScriptFnRef<R> {
    anchor: ScriptRef,
    _result: PhantomData<R>,
}

impl<R> Clone for ScriptFnRef<R> {
    #[inline]
    fn clone(&self) -> Self {
        Self {
            anchor: self.anchor.clone(),
            _result: PhantomData,
        }
    }
}

impl<R: FromResults> ScriptFnRef<R> {
    /// Anchors a function value into a typed handle.
    pub fn new(session: &mut Session, function: ScriptFnValue) -> Self {
        Self {
            anchor: session.anchor(ScriptValue::Fn(function)),
            _result: PhantomData,
        }
    }

    /// Invokes the referenced function with the `args` pack.
    ///
    /// The invocation never raises and never disturbs the slots below the
    /// call; every failure mode is reported through the [FnOutcome] flags.
    pub fn call(&self, session: &mut Session, args: impl PushArgs) -> FnOutcome<R> {
        let callee = self.anchor.get();

        if !matches!(callee, ScriptValue::Fn(..)) {
            return FnOutcome {
                value: None,
                failed: true,
                existed: false,
                result_failed: false,
                complete: false,
            };
        }

        let floor = session.top();

        session.push_value(callee);

        args.push_args(session);

        let nargs = session.top() - floor - 1;

        match session.call(nargs, None) {
            CallStatus::Error => {
                session.truncate(floor);

                FnOutcome {
                    value: None,
                    failed: true,
                    existed: true,
                    result_failed: false,
                    complete: false,
                }
            }

            CallStatus::Ok => {
                let produced = session.top() - floor;

                let complete = produced >= R::POSITIONS;

                let conversion = R::from_results(session, floor as i32 + 1);

                session.truncate(floor);

                FnOutcome {
                    value: conversion.value,
                    failed: false,
                    existed: true,
                    result_failed: conversion.failed,
                    complete,
                }
            }
        }
    }
}

impl Session {
    /// Binds a host callable to the global `name`.
    #[inline]
    pub fn set_global_fn<A>(&mut self, name: &str, function: impl IntoNativeFn<A>) {
        self.set_global_value(name, ScriptValue::Fn(function.into_native_fn()));
    }

    /// A typed handle of the function bound to the global `name`, or None
    /// if the global does not hold a function.
    pub fn function<R: FromResults>(&mut self, name: &str) -> Option<ScriptFnRef<R>> {
        let value = self.global_value(name);

        match &value {
            ScriptValue::Fn(..) => Some(ScriptFnRef {
                anchor: self.anchor(value),
                _result: PhantomData,
            }),

            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn native_fn_defaults_missing_args() {
        let mut session = Session::new();

        session.set_global_fn("add", |a: i64, b: i64| a + b);

        let add = session.function::<i64>("add").unwrap();

        assert_eq!(add.call(&mut session, (2i64, 3i64)).ok(), Some(5));
        assert_eq!(add.call(&mut session, (2i64,)).ok(), Some(2));
        assert_eq!(add.call(&mut session, ()).ok(), Some(0));
    }

    #[test]
    fn native_fn_rejects_malformed_args() {
        let mut session = Session::new();

        session.set_global_fn("double", |a: i64| a * 2);

        let double = session.function::<i64>("double").unwrap();

        let outcome = double.call(&mut session, ("grape",));

        assert!(outcome.failed);
        assert!(outcome.existed);
        assert_eq!(session.top(), 0);
    }

    #[test]
    fn multiple_returns_spread_over_slots() {
        let mut session = Session::new();

        session.set_global_fn("divmod", |a: i64, b: i64| -> RuntimeResult<(i64, i64)> {
            if b == 0 {
                return Err(crate::runtime::RuntimeError::custom("division by zero"));
            }

            Ok((a / b, a % b))
        });

        let divmod = session.function::<(i64, i64)>("divmod").unwrap();

        let outcome = divmod.call(&mut session, (7i64, 2i64));

        assert_eq!(outcome.value, Some((3, 1)));
        assert!(outcome.complete);
        assert!(!outcome.failed);

        let outcome = divmod.call(&mut session, (7i64, 0i64));

        assert!(outcome.failed);
        assert!(outcome.existed);
    }

    #[test]
    fn short_result_lists_are_incomplete() {
        let mut session = Session::new();

        session.set_global_fn("single", || 5i64);

        let single = session.function::<(i64, i64)>("single").unwrap();

        let outcome = single.call(&mut session, ());

        assert!(!outcome.failed);
        assert!(!outcome.complete);
        assert_eq!(outcome.value, Some((5, 0)));
    }

    #[test]
    fn missing_callee() {
        let mut session = Session::new();

        assert!(session.function::<i64>("absent").is_none());

        session.set_global("still_not_fn", 5i64);

        assert!(session.function::<i64>("still_not_fn").is_none());
    }

    #[test]
    fn handle_survives_rebinding() {
        let mut session = Session::new();

        session.set_global_fn("probe", || 1i64);

        let probe = session.function::<i64>("probe").unwrap();

        session.set_global("probe", ScriptValue::Nil);

        assert_eq!(probe.call(&mut session, ()).ok(), Some(1));
    }
}
