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

use crate::runtime::{session::Session, value::ScriptValue};

/// A Rust-to-runtime projection of a value.
///
/// An implementation builds a single [ScriptValue] out of a Rust object.
/// Scalars map directly, strings copy into runtime storage, containers build
/// tables, callables wrap into function values, and
/// [registered classes](crate::runtime::ClassBinding) box into opaque
/// handles.
///
/// The conversion is total. Values a runtime kind cannot express (e.g. NaN
/// keys) surface later, at the point of use.
pub trait Upcast {
    /// Converts `self` into a dynamic runtime value.
    fn upcast(self, session: &mut Session) -> ScriptValue;
}

/// A runtime-to-Rust projection of a value.
///
/// The conversion never raises. Its outcome is a [Conversion] object that
/// separately reports whether the source slot existed at all and whether the
/// value resisted coercion, so callers decide per call site whether a missing
/// optional argument and a malformed one mean the same thing.
pub trait Downcast: Sized {
    /// Attempts to convert a dynamic runtime value into `Self`.
    fn downcast(session: &mut Session, value: &ScriptValue) -> Conversion<Self>;
}

/// The outcome of a [Downcast] conversion.
///
/// Three facts are reported independently:
///
///  - `value` is the converted object, if the conversion produced one.
///  - `failed` is set when a value was present but resisted coercion.
///  - `exists` is unset when the source slot was absent or nil.
///
/// A nil source yields `{ value: None, failed: false, exists: false }`, which
/// is distinct from a genuine conversion failure.
#[derive(Debug)]
pub struct Conversion<T> {
    /// The converted object, if any.
    pub value: Option<T>,

    /// True if a present value resisted coercion.
    pub failed: bool,

    /// False if the source slot was absent or nil.
    pub exists: bool,
}

impl<T> Conversion<T> {
    /// A successful conversion of a present value.
    #[inline(always)]
    pub fn of(value: T) -> Self {
        Self {
            value: Some(value),
            failed: false,
            exists: true,
        }
    }

    /// The outcome of converting an absent or nil slot.
    #[inline(always)]
    pub fn absent() -> Self {
        Self {
            value: None,
            failed: false,
            exists: false,
        }
    }

    /// The outcome of a present value that resisted coercion.
    #[inline(always)]
    pub fn failure() -> Self {
        Self {
            value: None,
            failed: true,
            exists: true,
        }
    }

    /// Unwraps the converted object, substituting `default` when the
    /// conversion failed or the slot was absent.
    #[inline(always)]
    pub fn value_or(self, default: T) -> T {
        self.value.unwrap_or(default)
    }

    /// Maps the converted object, preserving the `failed` and `exists` flags.
    #[inline]
    pub fn map<U>(self, map: impl FnOnce(T) -> U) -> Conversion<U> {
        Conversion {
            value: self.value.map(map),
            failed: self.failed,
            exists: self.exists,
        }
    }

    /// Splits the outcome into the `(value, failed, exists)` triple,
    /// substituting `default` for a missing value.
    #[inline(always)]
    pub fn split(self, default: T) -> (T, bool, bool) {
        (self.value.unwrap_or(default), self.failed, self.exists)
    }

    /// Returns the converted object only if the value existed and the
    /// conversion did not fail.
    #[inline(always)]
    pub fn ok(self) -> Option<T> {
        match self.failed {
            true => None,
            false => self.value,
        }
    }
}
