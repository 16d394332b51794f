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

use std::{any::TypeId, cell::RefCell, rc::Rc};

use ahash::{AHashMap, AHashSet};
use compact_str::CompactString;

use crate::{
    class::instance::{Instance, Ownership, Qual},
    report::system_panic,
    runtime::{
        error::RuntimeResult,
        session::Session,
        value::ScriptValue,
    },
};

pub(crate) type GetterFn = Rc<dyn Fn(&mut Session, &Instance) -> RuntimeResult<ScriptValue>>;

pub(crate) type SetterFn = Rc<dyn Fn(&mut Session, &Instance, &ScriptValue) -> RuntimeResult<()>>;

pub(crate) type MethodFn = Rc<dyn Fn(&mut Session, &Instance, usize) -> RuntimeResult<usize>>;

pub(crate) type DynGetterFn =
    Rc<dyn Fn(&mut Session, &Instance, &str) -> RuntimeResult<Option<ScriptValue>>>;

pub(crate) type DynSetterFn =
    Rc<dyn Fn(&mut Session, &Instance, &str, &ScriptValue) -> RuntimeResult<()>>;

pub(crate) struct MethodSlot {
    pub(crate) function: MethodFn,

    /// The method mutates the receiver.
    pub(crate) requires_mut: bool,

    /// The method is callable on volatile receivers.
    pub(crate) volatile_ok: bool,
}

/// The registration-time member metadata of a class, shared by every
/// dispatch slot.
#[derive(Default)]
pub(crate) struct ClassMeta {
    pub(crate) methods: AHashMap<CompactString, MethodSlot>,
    pub(crate) getters: AHashMap<CompactString, GetterFn>,
    pub(crate) setters: AHashMap<CompactString, SetterFn>,

    /// Members that are readable but deliberately have no setter. Writing
    /// them reports a read-only violation instead of an unknown-member one.
    pub(crate) const_keys: AHashSet<CompactString>,

    pub(crate) dynamic_getter: Option<DynGetterFn>,
    pub(crate) dynamic_setter: Option<DynSetterFn>,
}

impl ClassMeta {
    pub(crate) fn member_names(&self) -> impl Iterator<Item = &CompactString> {
        self.methods
            .keys()
            .chain(self.getters.keys())
            .chain(self.setters.keys())
    }
}

/// The access capabilities of one (qualification, ownership) combination.
///
/// The full cross product is materialized at registration time, so member
/// dispatch resolves capabilities with a single lookup and no per-access
/// recomputation.
pub(crate) struct DispatchSlot {
    pub(crate) writable: bool,
    pub(crate) mut_methods: bool,
    pub(crate) volatile_receiver: bool,
}

pub(crate) struct ClassEntry {
    pub(crate) name: CompactString,
    pub(crate) ty: TypeId,
    pub(crate) meta: Rc<ClassMeta>,
    slots: AHashMap<(Qual, Ownership), DispatchSlot>,
}

impl ClassEntry {
    pub(crate) fn new(name: CompactString, ty: TypeId, meta: Rc<ClassMeta>) -> Self {
        let mut slots = AHashMap::with_capacity(Qual::ALL.len() * Ownership::ALL.len());

        for qual in Qual::ALL {
            for ownership in Ownership::ALL {
                slots.insert(
                    (qual, ownership),
                    DispatchSlot {
                        writable: !qual.is_const(),
                        mut_methods: !qual.is_const(),
                        volatile_receiver: qual.is_volatile(),
                    },
                );
            }
        }

        Self {
            name,
            ty,
            meta,
            slots,
        }
    }

    pub(crate) fn slot(&self, qual: Qual, ownership: Ownership) -> &DispatchSlot {
        let Some(slot) = self.slots.get(&(qual, ownership)) else {
            system_panic!("Missing dispatch slot.");
        };

        slot
    }
}

/// A session-wide index of the registered classes, keyed by the Rust type.
#[derive(Default)]
pub(crate) struct ClassRegistry {
    classes: RefCell<AHashMap<TypeId, Rc<ClassEntry>>>,
}

impl ClassRegistry {
    pub(crate) fn get(&self, ty: TypeId) -> Option<Rc<ClassEntry>> {
        self.classes.borrow().get(&ty).cloned()
    }

    pub(crate) fn expect(&self, ty: TypeId, name: &str) -> Rc<ClassEntry> {
        let Some(entry) = self.get(ty) else {
            system_panic!("Class \"{name}\" is not registered in this session.");
        };

        entry
    }

    pub(crate) fn install(&self, entry: ClassEntry) {
        let mut classes = self.classes.borrow_mut();

        if classes.contains_key(&entry.ty) {
            system_panic!("Class \"{}\" is registered twice.", entry.name);
        }

        let _ = classes.insert(entry.ty, Rc::new(entry));
    }
}
