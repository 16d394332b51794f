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

//! # Stela
//!
//! Stela is the value-marshalling and class-binding engine of an embedding
//! layer: it lets a statically typed Rust host program exchange values and
//! behavior with a dynamically typed, stack-based scripting runtime hosted
//! in-process.
//!
//! The engine converts bidirectionally between a small set of dynamic value
//! kinds (nil, boolean, number, string, table, function, opaque handle) and
//! an open-ended set of Rust types: primitives, ordered/set/map containers,
//! tuples, function objects, and arbitrary user classes. Conversions preserve
//! their semantics under const/volatile access qualifiers, three ownership
//! modes (raw alias, exclusive, shared), and many simultaneously registered
//! representations of one class.
//!
//! The entry point is the [runtime::Session] object, which owns one execution
//! context and its value stack. The [runtime::Upcast] and [runtime::Downcast]
//! traits form the marshalling seam; the [runtime::ClassBinding] builder and
//! the [script_class] macro register user classes.
//!
//! Stela is not a scripting language. Script compilation is the
//! responsibility of an embedded language frontend plugged in through
//! [runtime::Session::set_loader]; the engine itself consumes and exposes
//! only the runtime's minimal host-callable primitives.

mod class;
mod exports;
mod report;

pub mod runtime;
