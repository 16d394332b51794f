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
    error::Error as StdError,
    fmt::{Display, Formatter},
    result::Result as StdResult,
};

use compact_str::CompactString;

use crate::{
    class::Qual,
    runtime::value::ScriptKind,
};

/// A result of a runtime API call, which can either be a normal value or a
/// [RuntimeError].
pub type RuntimeResult<T> = StdResult<T, RuntimeError>;

/// A helper trait for the [RuntimeResult] object.
///
/// This trait is automatically implemented for RuntimeResult and provides the
/// [expect_blame](Self::expect_blame) function, which either unwraps the
/// underlying value or panics with the provided context message.
pub trait RuntimeResultExt {
    /// The [Ok] type of the underlying [Result].
    type OkType;

    /// If the result is [Ok], returns the underlying data; otherwise, panics
    /// with the `message` context and the underlying error description.
    fn expect_blame(self, message: &str) -> Self::OkType;
}

impl<T> RuntimeResultExt for RuntimeResult<T> {
    #[inline(always)]
    fn expect_blame(self, message: &str) -> Self::OkType {
        match self {
            Ok(ok) => ok,
            Err(error) => panic!("{message}\n{error}"),
        }
    }

    type OkType = T;
}

/// Represents any error raised by the Binding Engine during script-visible
/// operations.
///
/// Conversion failures are never represented by this object: the conversion
/// engine reports them through the [Conversion](crate::runtime::Conversion)
/// flags instead. RuntimeError covers contract violations that unwind to the
/// nearest [call](crate::runtime::Session::call) boundary as a single error
/// value plus a nonzero status.
///
/// The [Display] implementation provides a brief, human-readable description
/// of the underlying error, naming the offending key where one exists.
#[derive(Clone, Debug)]
#[non_exhaustive]
pub enum RuntimeError {
    /// The script code attempts to invoke a value that is not a function.
    NotCallable {
        /// The kind of the value that was about to be invoked.
        kind: ScriptKind,
    },

    /// An operation expected a value of one dynamic kind but found another
    /// (e.g., indexing into a non-table).
    KindMismatch {
        /// The kind required by the operation.
        expected: ScriptKind,

        /// The kind actually found.
        found: ScriptKind,
    },

    /// A table key of an unsupported kind (nil, or a non-finite number).
    InvalidKey {
        /// The kind of the rejected key value.
        kind: ScriptKind,
    },

    /// An argument of an invoked host function failed to convert into the
    /// declared parameter type.
    ///
    /// Typed values are mandatory for the call to proceed, so this error is
    /// fatal for the call.
    ArgumentType {
        /// The 1-based position of the offending argument.
        index: usize,

        /// The name of the Rust type the parameter was declared with.
        expected: &'static str,

        /// The kind of the value actually passed.
        found: ScriptKind,
    },

    /// A value written into a class member failed to convert into the
    /// member's type.
    MemberType {
        /// The user-facing name of the class.
        class: CompactString,

        /// The member key.
        key: CompactString,

        /// The kind of the value actually written.
        found: ScriptKind,
    },

    /// The script code attempts to mutate a member through a representation
    /// that only provides read-only access.
    ReadOnly {
        /// The user-facing name of the class.
        class: CompactString,

        /// The member key.
        key: CompactString,
    },

    /// The script code attempts to call a method whose qualification does not
    /// match the receiver's qualification.
    QualifierMismatch {
        /// The user-facing name of the class.
        class: CompactString,

        /// The method key.
        key: CompactString,

        /// The receiver's qualification.
        receiver: Qual,

        /// True if the method requires a mutable (non-const) receiver; false
        /// if the method requires a non-volatile receiver.
        mutation: bool,
    },

    /// The script code attempts to write a member for which no setter exists.
    NoSetter {
        /// The user-facing name of the class.
        class: CompactString,

        /// The member key.
        key: CompactString,

        /// The closest registered member name, if a plausible one exists.
        hint: Option<CompactString>,
    },

    /// The script code attempts to access an instance that is already
    /// borrowed incompatibly (e.g., a reentrant mutation).
    BorrowConflict {
        /// The user-facing name of the class.
        class: CompactString,
    },

    /// The script code attempts to access a non-owning alias whose referent
    /// has been dropped.
    Dead {
        /// The user-facing name of the class.
        class: CompactString,
    },

    /// The session attempts to evaluate an inline snippet, but no script
    /// loader has been installed.
    NoLoader,

    /// An error raised explicitly by embedded host code.
    Custom {
        /// The error description.
        message: CompactString,
    },
}

impl Display for RuntimeError {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotCallable { kind } => {
                formatter.write_fmt(format_args!("A {kind} value is not callable."))
            }

            Self::KindMismatch { expected, found } => formatter.write_fmt(format_args!(
                "Operation requires a {expected} value, but a {found} value was provided.",
            )),

            Self::InvalidKey { kind } => {
                formatter.write_fmt(format_args!("A {kind} value cannot be used as a table key."))
            }

            Self::ArgumentType {
                index,
                expected,
                found,
            } => formatter.write_fmt(format_args!(
                "Argument {index} cannot be converted into {expected} from a {found} value.",
            )),

            Self::MemberType { class, key, found } => formatter.write_fmt(format_args!(
                "Member \"{key}\" of {class} cannot be assigned from a {found} value.",
            )),

            Self::ReadOnly { class, key } => formatter.write_fmt(format_args!(
                "Member \"{key}\" of {class} is read-only for this representation.",
            )),

            Self::QualifierMismatch {
                class,
                key,
                receiver,
                mutation,
            } => {
                let requirement = match mutation {
                    true => "a mutable (non-const)",
                    false => "a non-volatile",
                };

                formatter.write_fmt(format_args!(
                    "Method \"{key}\" of {class} requires {requirement} receiver, \
                    but the receiver is {receiver}.",
                ))
            }

            Self::NoSetter { class, key, hint } => {
                formatter.write_fmt(format_args!("Member \"{key}\" of {class} has no setter."))?;

                if let Some(hint) = hint {
                    formatter.write_fmt(format_args!(" Did you mean \"{hint}\"?"))?;
                }

                Ok(())
            }

            Self::BorrowConflict { class } => formatter.write_fmt(format_args!(
                "An instance of {class} is already borrowed incompatibly.",
            )),

            Self::Dead { class } => formatter.write_fmt(format_args!(
                "An alias of {class} outlived the data it refers to.",
            )),

            Self::NoLoader => formatter.write_str("No script loader installed in this session."),

            Self::Custom { message } => formatter.write_str(message),
        }
    }
}

impl StdError for RuntimeError {}

impl RuntimeError {
    /// A convenient constructor of the [Custom](Self::Custom) error variant,
    /// intended to be used by the embedded host functions to raise
    /// domain-specific errors.
    #[inline(always)]
    pub fn custom(message: impl AsRef<str>) -> Self {
        Self::Custom {
            message: CompactString::from(message.as_ref()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blame_passes_ok_values_through() {
        let result: RuntimeResult<usize> = Ok(100);

        assert_eq!(result.expect_blame("Unexpected failure."), 100);
    }

    #[test]
    #[should_panic(expected = "Unexpected failure.")]
    fn blame_names_the_failed_operation() {
        let result: RuntimeResult<usize> = Err(RuntimeError::custom("grape"));

        let _ = result.expect_blame("Unexpected failure.");
    }
}
