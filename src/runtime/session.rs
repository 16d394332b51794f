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

use std::{cell::RefCell, rc::Rc};

use compact_str::CompactString;

use crate::{
    class::registry::ClassRegistry,
    report::system_panic,
    runtime::{
        coercion::{Conversion, Downcast, Upcast},
        error::{RuntimeError, RuntimeResult},
        refs::{AnchorTable, ScriptRef},
        value::{ScriptFnValue, ScriptKind, ScriptValue, Table, TableKey},
    },
};

/// A factory of executable function values from script source text.
///
/// The engine itself does not parse or compile anything. The embedder
/// installs a loader through [Session::set_loader], and
/// [Session::eval] delegates to it.
pub type Loader = Rc<dyn Fn(&mut Session, &str) -> RuntimeResult<ScriptFnValue>>;

/// The outcome of a protected invocation.
///
/// A failed invocation never unwinds through the session. The stack is
/// rolled back to the callee position, and a single string slot describing
/// the failure is pushed in its place.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CallStatus {
    /// The invocation completed, and its results are on the stack.
    Ok,

    /// The invocation failed, and the error message is on the stack.
    Error,
}

struct SessionShared {
    globals: Table,
    registry: ClassRegistry,
    anchors: Rc<RefCell<AnchorTable>>,
    loader: RefCell<Option<Loader>>,
}

/// An isolated interaction context with the embedded runtime.
///
/// The session owns a value stack through which all data crosses the
/// host/runtime boundary, a table of global bindings, and the
/// [class registry](crate::runtime::ClassBinding) of host types exposed to
/// scripts.
///
/// Sessions are independent of each other, except for
/// [subcontexts](Session::subcontext), which own a fresh stack but share the
/// globals, the registry, and the anchor table of their parent.
pub struct Session {
    stack: Vec<ScriptValue>,
    shared: Rc<SessionShared>,
}

impl Default for Session {
    #[inline(always)]
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    /// Creates a new session with an empty stack, empty globals, and an
    /// empty class registry.
    pub fn new() -> Self {
        Self {
            stack: Vec::new(),
            shared: Rc::new(SessionShared {
                globals: Table::new(),
                registry: ClassRegistry::default(),
                anchors: Rc::new(RefCell::new(AnchorTable::default())),
                loader: RefCell::new(None),
            }),
        }
    }

    /// Creates a session with a fresh empty stack that shares this session's
    /// globals, class registry, persistent anchors, and loader.
    pub fn subcontext(&self) -> Self {
        Self {
            stack: Vec::new(),
            shared: Rc::clone(&self.shared),
        }
    }

    /// The number of slots currently on the stack.
    #[inline(always)]
    pub fn top(&self) -> usize {
        self.stack.len()
    }

    /// Shrinks the stack to `len` slots. Does nothing if the stack is
    /// already shorter.
    #[inline(always)]
    pub fn truncate(&mut self, len: usize) {
        self.stack.truncate(len);
    }

    /// Converts `value` into a runtime value and pushes it onto the stack.
    #[inline(always)]
    pub fn push(&mut self, value: impl Upcast) {
        let value = value.upcast(self);

        self.stack.push(value);
    }

    /// Pushes an already-converted runtime value onto the stack.
    #[inline(always)]
    pub fn push_value(&mut self, value: ScriptValue) {
        self.stack.push(value);
    }

    /// Removes and returns the topmost stack value, or [ScriptValue::Nil]
    /// if the stack is empty.
    #[inline(always)]
    pub fn pop(&mut self) -> ScriptValue {
        self.stack.pop().unwrap_or(ScriptValue::Nil)
    }

    /// The dynamic kind of the stack slot at `index`, or
    /// [ScriptKind::Absent] if the index is outside of the stack.
    ///
    /// Positive indices address the stack from the bottom starting at 1;
    /// negative indices address it from the top, `-1` being the topmost
    /// slot. Index 0 is always absent.
    #[inline]
    pub fn kind_at(&self, index: i32) -> ScriptKind {
        match self.resolve(index) {
            Some(slot) => self.stack[slot].kind(),
            None => ScriptKind::Absent,
        }
    }

    /// A clone of the stack slot at `index`, or None if the index is
    /// outside of the stack.
    #[inline]
    pub fn value_at(&self, index: i32) -> Option<ScriptValue> {
        let slot = self.resolve(index)?;

        Some(self.stack[slot].clone())
    }

    /// Converts the stack slot at `index` into a Rust object.
    ///
    /// A failed coercion is reported through the returned [Conversion]
    /// flags and logged at the debug level.
    #[inline(always)]
    pub fn to<T: Downcast>(&mut self, index: i32) -> Conversion<T> {
        self.fetch(index, false)
    }

    /// The same as [to](Self::to), but without logging on failure.
    #[inline(always)]
    pub fn to_quiet<T: Downcast>(&mut self, index: i32) -> Conversion<T> {
        self.fetch(index, true)
    }

    /// Converts the stack slot at `index`, substituting `default` when the
    /// slot is absent, nil, or resists coercion.
    #[inline(always)]
    pub fn to_or<T: Downcast>(&mut self, index: i32, default: T) -> T {
        self.fetch(index, false).value_or(default)
    }

    /// Reads the slot at `index` as a boolean, defaulting to `false`.
    #[inline(always)]
    pub fn get_bool(&mut self, index: i32) -> bool {
        self.to_or(index, false)
    }

    /// Reads the slot at `index` as an integer, defaulting to `0`.
    #[inline(always)]
    pub fn get_int(&mut self, index: i32) -> i64 {
        self.to_or(index, 0)
    }

    /// Reads the slot at `index` as a real number, defaulting to `0.0`.
    #[inline(always)]
    pub fn get_float(&mut self, index: i32) -> f64 {
        self.to_or(index, 0.0)
    }

    /// Reads the slot at `index` as a string, defaulting to an empty one.
    #[inline(always)]
    pub fn get_str(&mut self, index: i32) -> CompactString {
        self.to_or(index, CompactString::default())
    }

    /// Reads the entry of the table at the stack slot `index` under `key`.
    pub fn table_get(&mut self, index: i32, key: impl Upcast) -> RuntimeResult<ScriptValue> {
        let table = self.table_at(index)?;

        let key = key.upcast(self);

        let Some(key) = TableKey::from_value(&key) else {
            return Err(RuntimeError::InvalidKey { kind: key.kind() });
        };

        Ok(table.get(&key))
    }

    /// Writes the entry of the table at the stack slot `index` under `key`.
    ///
    /// A nil `value` removes the entry.
    pub fn table_set(
        &mut self,
        index: i32,
        key: impl Upcast,
        value: impl Upcast,
    ) -> RuntimeResult<()> {
        let table = self.table_at(index)?;

        let key = key.upcast(self);
        let value = value.upcast(self);

        table.set(key, value)
    }

    /// The sequence length of the table at the stack slot `index`, or zero
    /// if the slot does not hold a table.
    pub fn seq_len(&self, index: i32) -> usize {
        match self.value_at(index) {
            Some(ScriptValue::Table(table)) => table.seq_len(),
            _ => 0,
        }
    }

    /// A snapshot of the entries of the table at the stack slot `index`, or
    /// an empty snapshot if the slot does not hold a table.
    pub fn pairs(&self, index: i32) -> Vec<(ScriptValue, ScriptValue)> {
        match self.value_at(index) {
            Some(ScriptValue::Table(table)) => table.pairs(),
            _ => Vec::new(),
        }
    }

    /// Binds `value` to the global `name`.
    pub fn set_global(&mut self, name: &str, value: impl Upcast) {
        let value = value.upcast(self);

        self.set_global_value(name, value);
    }

    /// Binds an already-converted runtime value to the global `name`.
    pub fn set_global_value(&mut self, name: &str, value: ScriptValue) {
        let globals = self.shared.globals.clone();

        // String keys are never nil or NaN.
        if globals.set(ScriptValue::from(name), value).is_err() {
            system_panic!("Malformed global key.");
        }
    }

    /// A clone of the value bound to the global `name`, or
    /// [ScriptValue::Nil] if the global is unbound.
    #[inline]
    pub fn global_value(&self, name: &str) -> ScriptValue {
        self.shared.globals.get(&TableKey::from(name))
    }

    /// Pushes the value bound to the global `name` onto the stack, and
    /// returns its kind.
    pub fn get_global(&mut self, name: &str) -> ScriptKind {
        let value = self.global_value(name);

        let kind = value.kind();

        self.stack.push(value);

        kind
    }

    /// Anchors `value` into the session's persistent reference table.
    ///
    /// The value survives independently of the stack until the last clone of
    /// the returned [ScriptRef] is dropped.
    #[inline]
    pub fn anchor(&mut self, value: ScriptValue) -> ScriptRef {
        AnchorTable::anchor(&self.shared.anchors, value)
    }

    /// Installs the source loader used by [eval](Self::eval).
    pub fn set_loader(&mut self, loader: Loader) {
        let mut slot = self.shared.loader.borrow_mut();

        *slot = Some(loader);
    }

    /// Invokes the callable at the stack slot below the topmost `nargs`
    /// slots.
    ///
    /// On success, the callee and argument slots are replaced by the
    /// callee's results. When `nresults` is specified, the result list is
    /// padded with nils or truncated to exactly that many slots.
    ///
    /// On failure, the callee and argument slots are replaced by a single
    /// string slot describing the error, and no nresults adjustment takes
    /// place.
    pub fn call(&mut self, nargs: usize, nresults: Option<usize>) -> CallStatus {
        if self.stack.len() < nargs + 1 {
            system_panic!("Call without a callee slot on the stack.");
        }

        let floor = self.stack.len() - nargs - 1;

        let callee = self.stack[floor].clone();

        let outcome = match &callee {
            ScriptValue::Fn(function) => {
                let function = function.clone();

                function.invoke(self, nargs)
            }

            other => Err(RuntimeError::NotCallable { kind: other.kind() }),
        };

        match outcome {
            Ok(produced) => {
                if self.stack.len() < floor + produced {
                    system_panic!("Function result count exceeds the stack length.");
                }

                let results = self.stack.split_off(self.stack.len() - produced);

                self.stack.truncate(floor);
                self.stack.extend(results);

                if let Some(expected) = nresults {
                    while self.stack.len() < floor + expected {
                        self.stack.push(ScriptValue::Nil);
                    }

                    self.stack.truncate(floor + expected);
                }

                CallStatus::Ok
            }

            Err(error) => {
                self.stack.truncate(floor);

                self.stack
                    .push(ScriptValue::Str(CompactString::from(error.to_string())));

                CallStatus::Error
            }
        }
    }

    /// Invokes the global `name` with the topmost `nargs` stack slots as
    /// arguments.
    ///
    /// The callee slot is inserted below the already-pushed arguments, so
    /// the caller pushes arguments first and then invokes.
    pub fn call_by_name(&mut self, name: &str, nargs: usize, nresults: Option<usize>) -> CallStatus {
        if self.stack.len() < nargs {
            system_panic!("Call with fewer stack slots than arguments.");
        }

        let callee = self.global_value(name);

        let floor = self.stack.len() - nargs;

        self.stack.insert(floor, callee);

        self.call(nargs, nresults)
    }

    /// Compiles `source` through the installed [Loader] and invokes the
    /// resulting chunk with no arguments.
    ///
    /// Fails with an error slot on the stack if no loader was installed or
    /// the loader rejects the source.
    pub fn eval(&mut self, source: &str, nresults: Option<usize>) -> CallStatus {
        let loader = self.shared.loader.borrow().clone();

        let chunk = match loader {
            Some(loader) => loader(self, source),
            None => Err(RuntimeError::NoLoader),
        };

        match chunk {
            Ok(function) => {
                self.stack.push(ScriptValue::Fn(function));

                self.call(0, nresults)
            }

            Err(error) => {
                self.stack
                    .push(ScriptValue::Str(CompactString::from(error.to_string())));

                CallStatus::Error
            }
        }
    }

    /// Converts an already-fetched runtime value into a Rust object.
    #[inline(always)]
    pub fn convert<T: Downcast>(&mut self, value: &ScriptValue) -> Conversion<T> {
        T::downcast(self, value)
    }

    /// Reads the function argument at the stack slot `position`.
    ///
    /// An absent or nil argument defaults; a present value that resists
    /// coercion fails the whole invocation with a
    /// [RuntimeError::ArgumentType] error naming the 1-based argument
    /// `index`.
    pub fn arg<T: Downcast + Default>(&mut self, position: i32, index: usize) -> RuntimeResult<T> {
        let Some(value) = self.value_at(position) else {
            return Ok(T::default());
        };

        let found = value.kind();

        let conversion = T::downcast(self, &value);

        if conversion.failed {
            return Err(RuntimeError::ArgumentType {
                index,
                expected: std::any::type_name::<T>(),
                found,
            });
        }

        Ok(conversion.value.unwrap_or_default())
    }

    #[inline]
    pub(crate) fn registry(&self) -> &ClassRegistry {
        &self.shared.registry
    }

    fn fetch<T: Downcast>(&mut self, index: i32, quiet: bool) -> Conversion<T> {
        let Some(value) = self.value_at(index) else {
            return Conversion::absent();
        };

        let conversion = T::downcast(self, &value);

        if conversion.failed && !quiet {
            log::debug!(
                "Coercion of the stack slot {index} ({}) into {} failed.",
                value.kind(),
                std::any::type_name::<T>(),
            );
        }

        conversion
    }

    fn table_at(&self, index: i32) -> RuntimeResult<Table> {
        match self.value_at(index) {
            Some(ScriptValue::Table(table)) => Ok(table),

            Some(other) => Err(RuntimeError::KindMismatch {
                expected: ScriptKind::Table,
                found: other.kind(),
            }),

            None => Err(RuntimeError::KindMismatch {
                expected: ScriptKind::Table,
                found: ScriptKind::Absent,
            }),
        }
    }

    #[inline]
    fn resolve(&self, index: i32) -> Option<usize> {
        let len = self.stack.len();

        if index > 0 {
            let slot = (index as usize) - 1;

            return (slot < len).then_some(slot);
        }

        if index < 0 {
            let back = index.unsigned_abs() as usize;

            return (back <= len).then(|| len - back);
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quiet_conversions_still_flag_failures() {
        let mut session = Session::new();

        session.push("grape");

        let conversion = session.to_quiet::<i64>(1);

        assert!(conversion.failed);
        assert_eq!(conversion.ok(), None);
        assert_eq!(session.to_quiet::<i64>(1).failed, session.to::<i64>(1).failed);
    }

    #[test]
    fn stack_indexing() {
        let mut session = Session::new();

        session.push(10i64);
        session.push("foo");
        session.push(true);

        assert_eq!(session.kind_at(1), ScriptKind::Int);
        assert_eq!(session.kind_at(3), ScriptKind::Bool);
        assert_eq!(session.kind_at(-1), ScriptKind::Bool);
        assert_eq!(session.kind_at(-3), ScriptKind::Int);
        assert_eq!(session.kind_at(0), ScriptKind::Absent);
        assert_eq!(session.kind_at(4), ScriptKind::Absent);
        assert_eq!(session.kind_at(-4), ScriptKind::Absent);
    }

    #[test]
    fn protected_call_rollback() {
        let mut session = Session::new();

        session.push("sentinel");
        session.push(123i64);
        session.push(1i64);
        session.push(2i64);

        // The callee slot holds an integer.
        assert_eq!(session.call(2, None), CallStatus::Error);

        assert_eq!(session.top(), 2);

        let message = session.get_str(-1);

        assert!(message.contains("integer"));
        assert_eq!(session.get_str(1), CompactString::from("sentinel"));
    }

    #[test]
    fn call_pads_and_truncates_results() {
        let mut session = Session::new();

        let pair = ScriptFnValue::new(|session, _nargs| {
            session.push(1i64);
            session.push(2i64);

            Ok(2)
        });

        session.push_value(ScriptValue::Fn(pair.clone()));
        assert_eq!(session.call(0, Some(3)), CallStatus::Ok);
        assert_eq!(session.top(), 3);
        assert_eq!(session.kind_at(3), ScriptKind::Nil);

        session.truncate(0);

        session.push_value(ScriptValue::Fn(pair));
        assert_eq!(session.call(0, Some(1)), CallStatus::Ok);
        assert_eq!(session.top(), 1);
        assert_eq!(session.get_int(1), 1);
    }

    #[test]
    fn subcontext_shares_globals() {
        let mut parent = Session::new();

        parent.set_global("answer", 42i64);

        let mut child = parent.subcontext();

        assert_eq!(child.top(), 0);
        assert_eq!(child.global_value("answer"), ScriptValue::Int(42));

        child.set_global("answer", 43i64);

        assert_eq!(parent.global_value("answer"), ScriptValue::Int(43));
    }

    #[test]
    fn eval_without_loader_fails() {
        let mut session = Session::new();

        assert_eq!(session.eval("return 1", None), CallStatus::Error);

        let message = session.get_str(-1);

        assert!(message.contains("loader"));
    }

    #[test]
    fn anchors_outlive_stack() {
        let mut session = Session::new();

        session.push("kept");

        let value = session.pop();
        let anchor = session.anchor(value);

        session.truncate(0);

        assert_eq!(anchor.get(), ScriptValue::from("kept"));

        let clone = anchor.clone();

        drop(anchor);

        assert_eq!(clone.get(), ScriptValue::from("kept"));

        drop(clone);
    }
}
