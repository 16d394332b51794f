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
    cell::RefCell,
    fmt::{Debug, Display, Formatter},
    rc::Rc,
};

use ahash::AHashMap;
use compact_str::CompactString;

use crate::{
    class::Instance,
    runtime::{
        error::{RuntimeError, RuntimeResult},
        session::Session,
    },
};

/// A dynamic value of the embedded runtime.
///
/// The runtime distinguishes a closed set of value kinds: nil, boolean,
/// number (integer or real), string, table (the single aggregate kind),
/// function, and opaque handle (an [Instance] of a
/// [registered class](crate::runtime::ClassBinding)).
///
/// Values are cheap to clone: aggregates, functions, and opaque handles
/// clone by reference.
#[derive(Clone, Default)]
pub enum ScriptValue {
    /// The absence of data.
    #[default]
    Nil,

    /// A boolean value.
    Bool(bool),

    /// An integer number.
    Int(i64),

    /// A real number.
    Float(f64),

    /// An immutable string.
    Str(CompactString),

    /// The single aggregate kind of the runtime.
    Table(Table),

    /// A runtime-invocable function value.
    Fn(ScriptFnValue),

    /// An opaque handle to a host class instance with attached dispatch
    /// metadata.
    Data(Instance),
}

impl Debug for ScriptValue {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Nil => formatter.write_str("nil"),
            Self::Bool(value) => Debug::fmt(value, formatter),
            Self::Int(value) => Debug::fmt(value, formatter),
            Self::Float(value) => Debug::fmt(value, formatter),
            Self::Str(value) => Debug::fmt(value, formatter),
            Self::Table(table) => formatter.write_fmt(format_args!("table({:#x})", table.identity())),
            Self::Fn(function) => {
                formatter.write_fmt(format_args!("function({:#x})", function.identity()))
            }
            Self::Data(instance) => Debug::fmt(instance, formatter),
        }
    }
}

impl PartialEq for ScriptValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Nil, Self::Nil) => true,
            (Self::Bool(this), Self::Bool(other)) => this == other,
            (Self::Int(this), Self::Int(other)) => this == other,
            (Self::Float(this), Self::Float(other)) => this == other,
            (Self::Str(this), Self::Str(other)) => this == other,
            (Self::Table(this), Self::Table(other)) => this.identity() == other.identity(),
            (Self::Fn(this), Self::Fn(other)) => this.identity() == other.identity(),
            (Self::Data(this), Self::Data(other)) => this.identity() == other.identity(),
            _ => false,
        }
    }
}

impl From<bool> for ScriptValue {
    #[inline(always)]
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i32> for ScriptValue {
    #[inline(always)]
    fn from(value: i32) -> Self {
        Self::Int(value as i64)
    }
}

impl From<i64> for ScriptValue {
    #[inline(always)]
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for ScriptValue {
    #[inline(always)]
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for ScriptValue {
    #[inline(always)]
    fn from(value: &str) -> Self {
        Self::Str(CompactString::from(value))
    }
}

impl From<String> for ScriptValue {
    #[inline(always)]
    fn from(value: String) -> Self {
        Self::Str(CompactString::from(value))
    }
}

impl From<CompactString> for ScriptValue {
    #[inline(always)]
    fn from(value: CompactString) -> Self {
        Self::Str(value)
    }
}

impl From<Table> for ScriptValue {
    #[inline(always)]
    fn from(value: Table) -> Self {
        Self::Table(value)
    }
}

impl ScriptValue {
    /// Returns the dynamic kind of this value.
    #[inline(always)]
    pub fn kind(&self) -> ScriptKind {
        match self {
            Self::Nil => ScriptKind::Nil,
            Self::Bool(..) => ScriptKind::Bool,
            Self::Int(..) => ScriptKind::Int,
            Self::Float(..) => ScriptKind::Float,
            Self::Str(..) => ScriptKind::Str,
            Self::Table(..) => ScriptKind::Table,
            Self::Fn(..) => ScriptKind::Fn,
            Self::Data(..) => ScriptKind::Data,
        }
    }

    /// Returns true if this value is [Nil](Self::Nil).
    #[inline(always)]
    pub fn is_nil(&self) -> bool {
        matches!(self, Self::Nil)
    }
}

/// A classification of the [ScriptValue] kinds, plus the [Absent](Self::Absent)
/// pseudo-kind denoting a stack slot outside of the current stack boundaries.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ScriptKind {
    /// The slot does not exist on the stack.
    Absent,

    /// The absence of data.
    Nil,

    /// A boolean value.
    Bool,

    /// An integer number.
    Int,

    /// A real number.
    Float,

    /// A string.
    Str,

    /// A table.
    Table,

    /// A function.
    Fn,

    /// An opaque handle to a host class instance.
    Data,
}

impl Display for ScriptKind {
    #[inline]
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Absent => "absent",
            Self::Nil => "nil",
            Self::Bool => "boolean",
            Self::Int => "integer",
            Self::Float => "float",
            Self::Str => "string",
            Self::Table => "table",
            Self::Fn => "function",
            Self::Data => "data",
        };

        formatter.write_str(name)
    }
}

/// A key of a [Table] entry.
///
/// The runtime folds real-number keys into integer keys when the number is an
/// exactly representable integer, so `t[2.0]` and `t[2]` address the same
/// entry. Aggregates, functions, and opaque handles key by identity.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum TableKey {
    /// A boolean key.
    Bool(bool),

    /// An integer key (including folded exact real numbers).
    Int(i64),

    /// A non-integral real-number key, stored as its bit pattern.
    Float(u64),

    /// A string key.
    Str(CompactString),

    /// An identity key of a table, function, or opaque handle.
    Opaque(usize),
}

impl From<i64> for TableKey {
    #[inline(always)]
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<&str> for TableKey {
    #[inline(always)]
    fn from(value: &str) -> Self {
        Self::Str(CompactString::from(value))
    }
}

impl TableKey {
    /// Derives a key from a dynamic value.
    ///
    /// Returns None if the value cannot be a key: nil, or a NaN number.
    pub fn from_value(value: &ScriptValue) -> Option<Self> {
        match value {
            ScriptValue::Nil => None,

            ScriptValue::Bool(value) => Some(Self::Bool(*value)),

            ScriptValue::Int(value) => Some(Self::Int(*value)),

            ScriptValue::Float(value) => {
                if value.is_nan() {
                    return None;
                }

                if value.fract() == 0.0
                    && *value >= i64::MIN as f64
                    && *value <= i64::MAX as f64
                {
                    return Some(Self::Int(*value as i64));
                }

                Some(Self::Float(value.to_bits()))
            }

            ScriptValue::Str(value) => Some(Self::Str(value.clone())),

            ScriptValue::Table(table) => Some(Self::Opaque(table.identity())),

            ScriptValue::Fn(function) => Some(Self::Opaque(function.identity())),

            ScriptValue::Data(instance) => Some(Self::Opaque(instance.identity())),
        }
    }
}

/// The single aggregate kind of the embedded runtime.
///
/// A table maps keys of any non-nil kind to values. Ordered sequences are
/// represented by 1-based integer keys, sets by element-to-`true` entries,
/// and associative maps by arbitrary keys; the marshalling layer builds all
/// three container semantics on top of this one kind.
///
/// Tables clone by reference: two clones address the same storage.
#[derive(Clone, Default)]
pub struct Table {
    inner: Rc<RefCell<TableRepr>>,
}

#[derive(Default)]
struct TableRepr {
    entries: AHashMap<TableKey, (ScriptValue, ScriptValue)>,
}

impl Debug for Table {
    #[inline]
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_fmt(format_args!("table({:#x})", self.identity()))
    }
}

impl Table {
    /// Creates a new empty table.
    #[inline(always)]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the value stored under the `key`, or [ScriptValue::Nil] if the
    /// entry does not exist.
    #[inline]
    pub fn get(&self, key: &TableKey) -> ScriptValue {
        match self.inner.borrow().entries.get(key) {
            Some((_, value)) => value.clone(),
            None => ScriptValue::Nil,
        }
    }

    /// Stores the `value` under the `key`.
    ///
    /// Storing [ScriptValue::Nil] removes the entry. Nil and NaN keys are
    /// rejected with a [RuntimeError::InvalidKey] error.
    pub fn set(&self, key: ScriptValue, value: ScriptValue) -> RuntimeResult<()> {
        let Some(table_key) = TableKey::from_value(&key) else {
            return Err(RuntimeError::InvalidKey { kind: key.kind() });
        };

        let mut inner = self.inner.borrow_mut();

        match value {
            ScriptValue::Nil => {
                let _ = inner.entries.remove(&table_key);
            }

            value => {
                let _ = inner.entries.insert(table_key, (key, value));
            }
        }

        Ok(())
    }

    /// The runtime's length operator: the largest positive integer key
    /// present in the table, or zero if there is none.
    ///
    /// The 1-based range `1..=seq_len()` may contain holes; sequence
    /// conversion discards them.
    pub fn seq_len(&self) -> usize {
        let inner = self.inner.borrow();

        let mut length = 0;

        for key in inner.entries.keys() {
            if let TableKey::Int(index) = key {
                if *index > length {
                    length = *index;
                }
            }
        }

        length.max(0) as usize
    }

    /// Returns the number of entries of any key kind.
    #[inline]
    pub fn len(&self) -> usize {
        self.inner.borrow().entries.len()
    }

    /// Returns true if the table has no entries.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.inner.borrow().entries.is_empty()
    }

    /// The runtime's generic iteration primitive: a snapshot of every
    /// key/value pair of the table.
    ///
    /// The snapshot is detached from the table storage, so mutating the table
    /// (or coercing its values) during iteration cannot corrupt the walk.
    pub fn pairs(&self) -> Vec<(ScriptValue, ScriptValue)> {
        let inner = self.inner.borrow();

        inner.entries.values().cloned().collect()
    }

    /// A process-unique identity of the table storage.
    #[inline(always)]
    pub fn identity(&self) -> usize {
        Rc::as_ptr(&self.inner) as *const u8 as usize
    }
}

/// A runtime-invocable function value.
///
/// The wrapped callable receives the invoking [Session] and the number of
/// arguments pushed onto the stack; it pushes its results and returns how
/// many it pushed. Errors unwind to the nearest
/// [call](crate::runtime::Session::call) boundary.
#[derive(Clone)]
pub struct ScriptFnValue {
    inner: Rc<dyn Fn(&mut Session, usize) -> RuntimeResult<usize>>,
}

impl Debug for ScriptFnValue {
    #[inline]
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_fmt(format_args!("function({:#x})", self.identity()))
    }
}

impl ScriptFnValue {
    /// Wraps a raw native callable.
    ///
    /// Most host functions should be wrapped through the typed
    /// [IntoNativeFn](crate::runtime::IntoNativeFn) interface instead; this
    /// constructor is the low-level escape hatch for callables with
    /// hand-written argument handling.
    #[inline(always)]
    pub fn new(function: impl Fn(&mut Session, usize) -> RuntimeResult<usize> + 'static) -> Self {
        Self {
            inner: Rc::new(function),
        }
    }

    /// A process-unique identity of the function object.
    #[inline(always)]
    pub fn identity(&self) -> usize {
        Rc::as_ptr(&self.inner) as *const u8 as usize
    }

    #[inline(always)]
    pub(crate) fn invoke(&self, session: &mut Session, nargs: usize) -> RuntimeResult<usize> {
        (self.inner)(session, nargs)
    }
}
