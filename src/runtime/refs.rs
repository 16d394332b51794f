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
    fmt::{Debug, Formatter},
    rc::Rc,
};

use crate::runtime::value::ScriptValue;

/// A persistent, counted anchor of a runtime value.
///
/// An anchored value survives independently of any stack frame until the last
/// [ScriptRef] clone is dropped. Anchors of the same session tree (the root
/// [Session](crate::runtime::Session) and its subcontexts) share one table.
pub struct ScriptRef {
    anchors: Rc<RefCell<AnchorTable>>,
    slot: usize,
}

impl Debug for ScriptRef {
    #[inline]
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_fmt(format_args!("ref({})", self.slot))
    }
}

impl Clone for ScriptRef {
    fn clone(&self) -> Self {
        {
            let mut anchors = self.anchors.borrow_mut();

            anchors.retain(self.slot);
        }

        Self {
            anchors: Rc::clone(&self.anchors),
            slot: self.slot,
        }
    }
}

impl Drop for ScriptRef {
    fn drop(&mut self) {
        // The anchor table may already be borrowed if the drop happens while
        // the table is under mutation. The slot leaks in that case.
        let Ok(mut anchors) = self.anchors.try_borrow_mut() else {
            return;
        };

        anchors.release(self.slot);
    }
}

impl ScriptRef {
    /// Reads the anchored value.
    #[inline]
    pub fn get(&self) -> ScriptValue {
        let anchors = self.anchors.borrow();

        anchors.get(self.slot)
    }
}

#[derive(Default)]
pub(crate) struct AnchorTable {
    slots: Vec<AnchorSlot>,
    free: Vec<usize>,
}

struct AnchorSlot {
    value: ScriptValue,
    count: usize,
}

impl AnchorTable {
    pub(crate) fn anchor(table: &Rc<RefCell<Self>>, value: ScriptValue) -> ScriptRef {
        let slot;

        {
            let mut anchors = table.borrow_mut();

            match anchors.free.pop() {
                Some(index) => {
                    slot = index;

                    anchors.slots[index] = AnchorSlot { value, count: 1 };
                }

                None => {
                    slot = anchors.slots.len();

                    anchors.slots.push(AnchorSlot { value, count: 1 });
                }
            }
        }

        ScriptRef {
            anchors: Rc::clone(table),
            slot,
        }
    }

    fn get(&self, slot: usize) -> ScriptValue {
        match self.slots.get(slot) {
            Some(entry) if entry.count > 0 => entry.value.clone(),
            _ => ScriptValue::Nil,
        }
    }

    fn retain(&mut self, slot: usize) {
        if let Some(entry) = self.slots.get_mut(slot) {
            entry.count += 1;
        }
    }

    fn release(&mut self, slot: usize) {
        let Some(entry) = self.slots.get_mut(slot) else {
            return;
        };

        if entry.count == 0 {
            return;
        }

        entry.count -= 1;

        if entry.count == 0 {
            entry.value = ScriptValue::Nil;

            self.free.push(slot);
        }
    }
}
