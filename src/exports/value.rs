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

use crate::runtime::{
    coercion::{Conversion, Downcast, Upcast},
    refs::ScriptRef,
    session::Session,
    value::{ScriptFnValue, ScriptValue, Table},
};

impl Upcast for ScriptValue {
    #[inline(always)]
    fn upcast(self, _session: &mut Session) -> ScriptValue {
        self
    }
}

impl Downcast for ScriptValue {
    #[inline]
    fn downcast(_session: &mut Session, value: &ScriptValue) -> Conversion<Self> {
        Conversion {
            value: Some(value.clone()),
            failed: false,
            exists: !value.is_nil(),
        }
    }
}

impl Upcast for Table {
    #[inline(always)]
    fn upcast(self, _session: &mut Session) -> ScriptValue {
        ScriptValue::Table(self)
    }
}

impl Downcast for Table {
    fn downcast(_session: &mut Session, value: &ScriptValue) -> Conversion<Self> {
        match value {
            ScriptValue::Nil => Conversion::absent(),
            ScriptValue::Table(table) => Conversion::of(table.clone()),
            _ => Conversion::failure(),
        }
    }
}

impl Upcast for ScriptFnValue {
    #[inline(always)]
    fn upcast(self, _session: &mut Session) -> ScriptValue {
        ScriptValue::Fn(self)
    }
}

impl Downcast for ScriptFnValue {
    fn downcast(_session: &mut Session, value: &ScriptValue) -> Conversion<Self> {
        match value {
            ScriptValue::Nil => Conversion::absent(),
            ScriptValue::Fn(function) => Conversion::of(function.clone()),
            _ => Conversion::failure(),
        }
    }
}

impl Upcast for &ScriptRef {
    #[inline(always)]
    fn upcast(self, _session: &mut Session) -> ScriptValue {
        self.get()
    }
}
