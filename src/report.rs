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

// A violation of an internal invariant of the Binding Engine.
//
// These panics indicate programmer errors (a misuse of the binding API, or a
// bug in the engine itself), never recoverable script errors.
macro_rules! system_panic {
    ($message:expr $(, $args:expr)* $(,)?) => {{
        panic!(
            "Stela internal error.\n{}\nThis is likely a misuse of the \
            binding API or a bug in the engine.",
            ::std::format!($message $(, $args)*),
        );
    }};
}

// A code path that is statically unreachable as long as the engine's
// invariants hold.
macro_rules! debug_unreachable {
    ($message:expr $(, $args:expr)* $(,)?) => {{
        #[cfg(debug_assertions)]
        {
            panic!(
                "Stela internal error.\n{}\nThis is a bug in the engine.",
                ::std::format!($message $(, $args)*),
            );
        }

        #[cfg(not(debug_assertions))]
        {
            ::std::unreachable!();
        }
    }};
}

pub(crate) use debug_unreachable;
pub(crate) use system_panic;
