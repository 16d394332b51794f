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

use compact_str::CompactString;

use crate::{
    class::{instance::Instance, registry::ClassMeta},
    runtime::{
        error::{RuntimeError, RuntimeResult},
        session::Session,
        value::{ScriptFnValue, ScriptKind, ScriptValue},
    },
};

// Below this similarity threshold a misspelling hint does more harm than
// good.
const HINT_THRESHOLD: f64 = 0.85;

impl Instance {
    /// Resolves a member read: methods first, then getters, then the
    /// dynamic fallback.
    ///
    /// A method resolves into a bound function value capturing this
    /// receiver. The qualification gates apply at resolution time, so even
    /// looking up a mutating method on a const receiver is an error. An
    /// unknown member reads as nil.
    pub fn read(&self, session: &mut Session, key: &str) -> RuntimeResult<ScriptValue> {
        let entry = self.class().clone();
        let slot = entry.slot(self.qual(), self.ownership());

        if let Some(method) = entry.meta.methods.get(key) {
            log::trace!("Class \"{}\" member \"{key}\" resolves to a method.", entry.name);

            if method.requires_mut && !slot.mut_methods {
                return Err(RuntimeError::QualifierMismatch {
                    class: entry.name.clone(),
                    key: CompactString::from(key),
                    receiver: self.qual(),
                    mutation: true,
                });
            }

            if !method.volatile_ok && slot.volatile_receiver {
                return Err(RuntimeError::QualifierMismatch {
                    class: entry.name.clone(),
                    key: CompactString::from(key),
                    receiver: self.qual(),
                    mutation: false,
                });
            }

            let receiver = self.clone();
            let function = method.function.clone();

            return Ok(ScriptValue::Fn(ScriptFnValue::new(
                move |session, nargs| function(session, &receiver, nargs),
            )));
        }

        if let Some(getter) = entry.meta.getters.get(key) {
            let getter = getter.clone();

            return getter(session, self);
        }

        if let Some(dynamic) = &entry.meta.dynamic_getter {
            let dynamic = dynamic.clone();

            if let Some(value) = dynamic(session, self, key)? {
                return Ok(value);
            }
        }

        Ok(ScriptValue::Nil)
    }

    /// Resolves a member write.
    ///
    /// A registered setter dispatches if the representation is writable. A
    /// readable member without a setter reports a read-only violation; a
    /// fully unknown member reports a missing setter, with a
    /// closest-spelling hint when a plausible one exists.
    pub fn write(
        &self,
        session: &mut Session,
        key: &str,
        value: &ScriptValue,
    ) -> RuntimeResult<()> {
        let entry = self.class().clone();
        let slot = entry.slot(self.qual(), self.ownership());

        if let Some(setter) = entry.meta.setters.get(key) {
            if !slot.writable {
                return Err(RuntimeError::ReadOnly {
                    class: entry.name.clone(),
                    key: CompactString::from(key),
                });
            }

            let setter = setter.clone();

            return setter(session, self, value);
        }

        if entry.meta.const_keys.contains(key) || entry.meta.methods.contains_key(key) {
            return Err(RuntimeError::ReadOnly {
                class: entry.name.clone(),
                key: CompactString::from(key),
            });
        }

        if let Some(dynamic) = &entry.meta.dynamic_setter {
            if !slot.writable {
                return Err(RuntimeError::ReadOnly {
                    class: entry.name.clone(),
                    key: CompactString::from(key),
                });
            }

            let dynamic = dynamic.clone();

            return dynamic(session, self, key, value);
        }

        Err(RuntimeError::NoSetter {
            class: entry.name.clone(),
            key: CompactString::from(key),
            hint: closest_member(&entry.meta, key),
        })
    }
}

fn closest_member(meta: &ClassMeta, key: &str) -> Option<CompactString> {
    let mut best: Option<(&CompactString, f64)> = None;

    for candidate in meta.member_names() {
        let score = strsim::jaro_winkler(key, candidate.as_str());

        if score < HINT_THRESHOLD {
            continue;
        }

        match &best {
            Some((_, top)) if *top >= score => {}
            _ => best = Some((candidate, score)),
        }
    }

    best.map(|(candidate, _)| candidate.clone())
}

impl Session {
    /// Reads the member `key` of the instance at the stack slot `index`.
    pub fn member_get(&mut self, index: i32, key: &str) -> RuntimeResult<ScriptValue> {
        let instance = self.instance_at(index)?;

        instance.read(self, key)
    }

    /// Writes the member `key` of the instance at the stack slot `index`.
    pub fn member_set(
        &mut self,
        index: i32,
        key: &str,
        value: ScriptValue,
    ) -> RuntimeResult<()> {
        let instance = self.instance_at(index)?;

        instance.write(self, key, &value)
    }

    fn instance_at(&self, index: i32) -> RuntimeResult<Instance> {
        match self.value_at(index) {
            Some(ScriptValue::Data(instance)) => Ok(instance),

            Some(other) => Err(RuntimeError::KindMismatch {
                expected: ScriptKind::Data,
                found: other.kind(),
            }),

            None => Err(RuntimeError::KindMismatch {
                expected: ScriptKind::Data,
                found: ScriptKind::Absent,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::RefCell, rc::Rc};

    use crate::{
        runtime::{CallStatus, ClassBinding, Exported, RuntimeError, Session},
        script_class,
    };

    #[derive(Clone, Debug, PartialEq)]
    struct Vector {
        x: f64,
        y: f64,
    }

    script_class!(Vector as "Vector");

    #[derive(Clone, Debug, PartialEq)]
    struct Segment {
        from: Vector,
        to: Vector,
    }

    script_class!(Segment as "Segment");

    fn setup() -> Session {
        let mut session = Session::new();

        ClassBinding::<Vector>::new()
            .constructor(|x: f64, y: f64| Vector { x, y })
            .field_mut("x", |vector: &Vector| vector.x, |vector, x| vector.x = x)
            .field("y", |vector: &Vector| vector.y)
            .method("length", |vector: &Vector| {
                (vector.x * vector.x + vector.y * vector.y).sqrt()
            })
            .method_mut("scale", |vector: &mut Vector, factor: f64| {
                vector.x *= factor;
                vector.y *= factor;
            })
            .volatile_method("zeroed", |vector: &Vector| vector.x == 0.0 && vector.y == 0.0)
            .install(&mut session);

        ClassBinding::<Segment>::new()
            .member_ref(
                "from",
                |segment: &Segment| &segment.from,
                |segment| &mut segment.from,
            )
            .member_ref(
                "to",
                |segment: &Segment| &segment.to,
                |segment| &mut segment.to,
            )
            .install(&mut session);

        session
    }

    fn segment(ax: f64, ay: f64, bx: f64, by: f64) -> Segment {
        Segment {
            from: Vector { x: ax, y: ay },
            to: Vector { x: bx, y: by },
        }
    }

    #[test]
    fn constructor_global() {
        let mut session = setup();

        session.push(3.0);
        session.push(4.0);

        assert_eq!(session.call_by_name("Vector", 2, Some(1)), CallStatus::Ok);

        let length = session.member_get(-1, "length").unwrap();

        session.push_value(length);

        assert_eq!(session.call(0, Some(1)), CallStatus::Ok);
        assert_eq!(session.get_float(-1), 5.0);
    }

    #[test]
    fn field_access() {
        let mut session = setup();

        session.push(Vector { x: 1.0, y: 2.0 });

        assert_eq!(
            session.member_get(-1, "x").unwrap(),
            crate::runtime::ScriptValue::Float(1.0),
        );

        session
            .member_set(-1, "x", crate::runtime::ScriptValue::Float(5.0))
            .unwrap();

        let copy = session.to::<Vector>(-1).ok().unwrap();

        assert_eq!(copy, Vector { x: 5.0, y: 2.0 });
    }

    #[test]
    fn read_only_fields() {
        let mut session = setup();

        session.push(Vector { x: 1.0, y: 2.0 });

        let error = session
            .member_set(-1, "y", crate::runtime::ScriptValue::Float(5.0))
            .unwrap_err();

        assert!(matches!(error, RuntimeError::ReadOnly { .. }));
    }

    #[test]
    fn const_receivers() {
        let mut session = setup();

        session.push(Exported::of(Vector { x: 1.0, y: 2.0 }).constant());

        let error = session
            .member_set(-1, "x", crate::runtime::ScriptValue::Float(5.0))
            .unwrap_err();

        assert!(matches!(error, RuntimeError::ReadOnly { .. }));

        let error = session.member_get(-1, "scale").unwrap_err();

        assert!(matches!(
            error,
            RuntimeError::QualifierMismatch { mutation: true, .. },
        ));

        // Non-mutating members remain available.
        assert!(session.member_get(-1, "length").is_ok());
        assert!(session.member_get(-1, "x").is_ok());
    }

    #[test]
    fn volatile_receivers() {
        let mut session = setup();

        session.push(Exported::of(Vector { x: 0.0, y: 0.0 }).volatile());

        let error = session.member_get(-1, "length").unwrap_err();

        assert!(matches!(
            error,
            RuntimeError::QualifierMismatch {
                mutation: false,
                ..
            },
        ));

        let zeroed = session.member_get(-1, "zeroed").unwrap();

        session.push_value(zeroed);

        assert_eq!(session.call(0, Some(1)), CallStatus::Ok);
        assert!(session.get_bool(-1));
    }

    #[test]
    fn misspelling_hint() {
        let mut session = setup();

        session.push(Vector { x: 1.0, y: 2.0 });

        let error = session
            .member_set(-1, "lenght", crate::runtime::ScriptValue::Float(1.0))
            .unwrap_err();

        let RuntimeError::NoSetter { hint, .. } = error else {
            panic!("Unexpected error kind.");
        };

        assert_eq!(hint.as_deref(), Some("length"));
    }

    #[test]
    fn shared_ownership_identity() {
        let mut session = setup();

        let cell = Rc::new(RefCell::new(Vector { x: 1.0, y: 2.0 }));

        session.push(Rc::clone(&cell));

        let back = session.to::<Rc<RefCell<Vector>>>(-1).ok().unwrap();

        assert!(Rc::ptr_eq(&cell, &back));

        // Host-side mutations are visible through the handle.
        cell.borrow_mut().x = 9.0;

        assert_eq!(
            session.member_get(-1, "x").unwrap(),
            crate::runtime::ScriptValue::Float(9.0),
        );
    }

    #[test]
    fn by_value_copies_are_distinct() {
        let mut session = setup();

        let vector = Vector { x: 1.0, y: 2.0 };

        session.push(vector.clone());
        session.push(vector);

        let first = session.instance_at(1).unwrap();
        let second = session.instance_at(2).unwrap();

        assert_ne!(first.identity(), second.identity());

        // Mutating one copy leaves the other untouched.
        session
            .member_set(1, "x", crate::runtime::ScriptValue::Float(9.0))
            .unwrap();

        assert_eq!(
            session.member_get(2, "x").unwrap(),
            crate::runtime::ScriptValue::Float(1.0),
        );
    }

    #[test]
    fn dead_aliases() {
        let mut session = setup();

        let cell = Rc::new(RefCell::new(Vector { x: 1.0, y: 2.0 }));

        session.push(Exported::alias(&cell));

        assert!(session.member_get(-1, "x").is_ok());

        drop(cell);

        let error = session.member_get(-1, "x").unwrap_err();

        assert!(matches!(error, RuntimeError::Dead { .. }));
    }

    #[test]
    fn member_projections() {
        let mut session = setup();

        session.push(segment(0.0, 0.0, 3.0, 4.0));

        let projection = session.member_get(-1, "to").unwrap();

        session.push_value(projection);

        // Writes through the projection land in the parent.
        session
            .member_set(-1, "x", crate::runtime::ScriptValue::Float(6.0))
            .unwrap();

        let parent = session.to::<Segment>(-2).ok().unwrap();

        assert_eq!(parent.to, Vector { x: 6.0, y: 4.0 });
    }

    #[test]
    fn projections_of_dead_parents() {
        let mut session = setup();

        let cell = Rc::new(RefCell::new(segment(0.0, 0.0, 1.0, 1.0)));

        session.push(Exported::alias(&cell));

        let projection = session.member_get(-1, "from").unwrap();

        session.push_value(projection);

        drop(cell);

        let error = session.member_get(-1, "x").unwrap_err();

        assert!(matches!(error, RuntimeError::Dead { .. }));
    }

    #[test]
    fn projections_keep_owned_parents_alive() {
        let mut session = setup();

        session.push(segment(0.0, 0.0, 1.0, 1.0));

        let projection = session.member_get(-1, "from").unwrap();

        // The parent's stack slot is gone, but the projection holds the
        // owning storage.
        session.truncate(0);
        session.push_value(projection);

        assert!(session.member_get(-1, "x").is_ok());
    }

    #[test]
    fn unknown_members_read_nil() {
        let mut session = setup();

        session.push(Vector { x: 1.0, y: 2.0 });

        assert_eq!(
            session.member_get(-1, "missing").unwrap(),
            crate::runtime::ScriptValue::Nil,
        );
    }
}
