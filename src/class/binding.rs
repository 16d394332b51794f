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

use std::{any::TypeId, marker::PhantomData, rc::Rc};

use compact_str::CompactString;

use crate::{
    class::{
        instance::{Exported, Instance, ScriptClass},
        registry::{ClassEntry, ClassMeta, DynGetterFn, DynSetterFn, MethodFn, MethodSlot},
    },
    exports::function::IntoResults,
    report::system_panic,
    runtime::{
        coercion::{Downcast, Upcast},
        error::{RuntimeError, RuntimeResult},
        session::Session,
        value::{ScriptFnValue, ScriptValue},
    },
};

/// A registration builder of a [ScriptClass].
///
/// The builder collects constructors, methods, fields, member projections,
/// and dynamic fallbacks, and [install](Self::install)s them into a
/// session's class registry. Member names must be unique across all member
/// categories; a duplicate is an API misuse and panics at registration
/// time.
///
/// ```ignore
/// ClassBinding::<Vector>::new()
///     .constructor(|x: f64, y: f64| Vector { x, y })
///     .field_mut("x", |v| v.x, |v, x| v.x = x)
///     .method("length", |v: &Vector| (v.x * v.x + v.y * v.y).sqrt())
///     .install(&mut session);
/// ```
pub struct ClassBinding<T: ScriptClass> {
    meta: ClassMeta,
    constructor: Option<ScriptFnValue>,
    _class: PhantomData<T>,
}

impl<T: ScriptClass> Default for ClassBinding<T> {
    #[inline(always)]
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ScriptClass> ClassBinding<T> {
    /// Creates an empty binding of `T`.
    #[inline]
    pub fn new() -> Self {
        Self {
            meta: ClassMeta::default(),
            constructor: None,
            _class: PhantomData,
        }
    }

    /// Registers a constructor.
    ///
    /// [install](Self::install) binds the constructor to a global named
    /// after the class, so scripts create instances by calling the class
    /// name.
    pub fn constructor<A>(mut self, function: impl ScriptCtor<T, A>) -> Self {
        if self.constructor.is_some() {
            system_panic!("Class \"{}\" has two constructors.", T::NAME);
        }

        self.constructor = Some(function.into_ctor());

        self
    }

    /// Registers a method with a shared receiver.
    #[inline]
    pub fn method<A>(self, name: &str, function: impl ScriptMethod<T, A>) -> Self {
        self.method_slot(name, function.into_method(), false, false)
    }

    /// Registers a method with a mutable receiver. Rejected on const
    /// receivers.
    #[inline]
    pub fn method_mut<A>(self, name: &str, function: impl ScriptMethodMut<T, A>) -> Self {
        self.method_slot(name, function.into_method_mut(), true, false)
    }

    /// Registers a shared-receiver method that is also callable on volatile
    /// receivers.
    #[inline]
    pub fn volatile_method<A>(self, name: &str, function: impl ScriptMethod<T, A>) -> Self {
        self.method_slot(name, function.into_method(), false, true)
    }

    /// Registers a read-only field.
    ///
    /// Writing the field reports a read-only violation regardless of the
    /// receiver's qualification.
    pub fn field<V>(mut self, name: &str, getter: impl Fn(&T) -> V + 'static) -> Self
    where
        V: Upcast,
    {
        self.claim(name);

        let _ = self.meta.getters.insert(
            CompactString::from(name),
            Rc::new(move |session: &mut Session, receiver: &Instance| {
                let value = receiver.with_ref::<T, V>(&getter)?;

                Ok(value.upcast(session))
            }),
        );

        let _ = self.meta.const_keys.insert(CompactString::from(name));

        self
    }

    /// Registers a readable and writable field.
    pub fn field_mut<V>(
        mut self,
        name: &str,
        getter: impl Fn(&T) -> V + 'static,
        setter: impl Fn(&mut T, V) + 'static,
    ) -> Self
    where
        V: Upcast + Downcast,
    {
        self.claim(name);

        let key = CompactString::from(name);

        let _ = self.meta.getters.insert(
            key.clone(),
            Rc::new(move |session: &mut Session, receiver: &Instance| {
                let value = receiver.with_ref::<T, V>(&getter)?;

                Ok(value.upcast(session))
            }),
        );

        let _ = self.meta.setters.insert(
            key.clone(),
            Rc::new(
                move |session: &mut Session, receiver: &Instance, value: &ScriptValue| {
                    let Some(converted) = session.convert::<V>(value).ok() else {
                        return Err(RuntimeError::MemberType {
                            class: CompactString::from(T::NAME),
                            key: key.clone(),
                            found: value.kind(),
                        });
                    };

                    receiver.with_mut::<T, ()>(|object| setter(object, converted))
                },
            ),
        );

        self
    }

    /// Registers a member projection: reading the member yields a handle of
    /// the member object itself, not a copy.
    ///
    /// The projection accesses the member through its parent on every use,
    /// so mutations through the handle land in the parent, and a handle
    /// whose parent data is gone fails instead of dangling. The member
    /// class `M` must itself be registered before the projection is first
    /// read.
    pub fn member_ref<M: ScriptClass>(
        mut self,
        name: &str,
        getter: impl Fn(&T) -> &M + 'static,
        getter_mut: impl Fn(&mut T) -> &mut M + 'static,
    ) -> Self {
        self.claim(name);

        let getter: Rc<dyn Fn(&T) -> &M> = Rc::new(getter);
        let getter_mut: Rc<dyn Fn(&mut T) -> &mut M> = Rc::new(getter_mut);

        let _ = self.meta.getters.insert(
            CompactString::from(name),
            Rc::new(move |session: &mut Session, receiver: &Instance| {
                let projection =
                    receiver.project::<T, M>(session, getter.clone(), getter_mut.clone());

                Ok(ScriptValue::Data(projection))
            }),
        );

        let _ = self.meta.const_keys.insert(CompactString::from(name));

        self
    }

    /// Registers the fallback getter consulted for member names with no
    /// static registration.
    pub fn dynamic_getter(
        mut self,
        getter: impl Fn(&T, &str) -> Option<ScriptValue> + 'static,
    ) -> Self {
        if self.meta.dynamic_getter.is_some() {
            system_panic!("Class \"{}\" has two dynamic getters.", T::NAME);
        }

        let wrapped: DynGetterFn = Rc::new(
            move |_session: &mut Session, receiver: &Instance, key: &str| {
                receiver.with_ref::<T, Option<ScriptValue>>(|object| getter(object, key))
            },
        );

        self.meta.dynamic_getter = Some(wrapped);

        self
    }

    /// Registers the fallback setter consulted for member names with no
    /// static registration.
    pub fn dynamic_setter(
        mut self,
        setter: impl Fn(&mut T, &str, &ScriptValue) -> RuntimeResult<()> + 'static,
    ) -> Self {
        if self.meta.dynamic_setter.is_some() {
            system_panic!("Class \"{}\" has two dynamic setters.", T::NAME);
        }

        let wrapped: DynSetterFn = Rc::new(
            move |_session: &mut Session,
                  receiver: &Instance,
                  key: &str,
                  value: &ScriptValue| {
                receiver.with_mut::<T, RuntimeResult<()>>(|object| setter(object, key, value))?
            },
        );

        self.meta.dynamic_setter = Some(wrapped);

        self
    }

    /// Installs the binding into the session's class registry and binds the
    /// constructor global, if one was registered.
    pub fn install(self, session: &mut Session) {
        let entry = ClassEntry::new(
            CompactString::from(T::NAME),
            TypeId::of::<T>(),
            Rc::new(self.meta),
        );

        session.registry().install(entry);

        if let Some(constructor) = self.constructor {
            session.set_global_value(T::NAME, ScriptValue::Fn(constructor));
        }
    }

    fn method_slot(
        mut self,
        name: &str,
        function: MethodFn,
        requires_mut: bool,
        volatile_ok: bool,
    ) -> Self {
        self.claim(name);

        let _ = self.meta.methods.insert(
            CompactString::from(name),
            MethodSlot {
                function,
                requires_mut,
                volatile_ok,
            },
        );

        self
    }

    fn claim(&self, name: &str) {
        if self.meta.methods.contains_key(name)
            || self.meta.getters.contains_key(name)
            || self.meta.setters.contains_key(name)
        {
            system_panic!("Class \"{}\" member \"{name}\" is registered twice.", T::NAME);
        }
    }
}

/// A host constructor of a [ScriptClass], implemented for `Fn` closures of
/// up to four [Downcast] arguments returning the class type.
pub trait ScriptCtor<T, A> {
    /// Wraps the constructor into a runtime function value.
    fn into_ctor(self) -> ScriptFnValue;
}

macro_rules! ctor_family {
    ($(($($arg:ident as $var:ident: $index:literal),*))*) => {$(
        impl<Fun, T $(, $arg)*> ScriptCtor<T, ($($arg,)*)> for Fun
        where
            T: ScriptClass,
            Fun: Fn($($arg),*) -> T + 'static,
            $($arg: Downcast + Default,)*
        {
            fn into_ctor(self) -> ScriptFnValue {
                ScriptFnValue::new(move |session, nargs| {
                    #[allow(unused_variables)]
                    let base = (session.top() - nargs) as i32 + 1;

                    $(let $var: $arg = session.arg(base + $index - 1, $index)?;)*

                    let object = self($($var),*);

                    session.push(Exported::of(object));

                    Ok(1)
                })
            }
        }
    )*};
}

ctor_family! {
    ()
    (A1 as a1: 1)
    (A1 as a1: 1, A2 as a2: 2)
    (A1 as a1: 1, A2 as a2: 2, A3 as a3: 3)
    (A1 as a1: 1, A2 as a2: 2, A3 as a3: 3, A4 as a4: 4)
}

/// A shared-receiver host method, implemented for `Fn` closures taking
/// `&T` plus up to four [Downcast] arguments.
pub trait ScriptMethod<T, A> {
    /// Wraps the method into the internal dispatch form.
    fn into_method(self) -> MethodFn;
}

/// A mutable-receiver host method, implemented for `Fn` closures taking
/// `&mut T` plus up to four [Downcast] arguments.
pub trait ScriptMethodMut<T, A> {
    /// Wraps the method into the internal dispatch form.
    fn into_method_mut(self) -> MethodFn;
}

macro_rules! method_family {
    ($(($($arg:ident as $var:ident: $index:literal),*))*) => {$(
        impl<Fun, T, Res $(, $arg)*> ScriptMethod<T, ($($arg,)*)> for Fun
        where
            T: ScriptClass,
            Res: IntoResults,
            Fun: Fn(&T $(, $arg)*) -> Res + 'static,
            $($arg: Downcast + Default + 'static,)*
        {
            fn into_method(self) -> MethodFn {
                let function = Rc::new(self);

                Rc::new(move |session: &mut Session, receiver: &Instance, nargs: usize| {
                    #[allow(unused_variables)]
                    let base = (session.top() - nargs) as i32 + 1;

                    // Arguments convert before the receiver borrow, so an
                    // argument that reads the same instance cannot deadlock
                    // the dispatch.
                    $(let $var: $arg = session.arg(base + $index - 1, $index)?;)*

                    let function = function.clone();

                    let result =
                        receiver.with_ref::<T, Res>(move |object| function(object $(, $var)*))?;

                    result.into_results(session)
                })
            }
        }

        impl<Fun, T, Res $(, $arg)*> ScriptMethodMut<T, ($($arg,)*)> for Fun
        where
            T: ScriptClass,
            Res: IntoResults,
            Fun: Fn(&mut T $(, $arg)*) -> Res + 'static,
            $($arg: Downcast + Default + 'static,)*
        {
            fn into_method_mut(self) -> MethodFn {
                let function = Rc::new(self);

                Rc::new(move |session: &mut Session, receiver: &Instance, nargs: usize| {
                    #[allow(unused_variables)]
                    let base = (session.top() - nargs) as i32 + 1;

                    $(let $var: $arg = session.arg(base + $index - 1, $index)?;)*

                    let function = function.clone();

                    let result = receiver
                        .with_mut::<T, Res>(move |object| function(object $(, $var)*))?;

                    result.into_results(session)
                })
            }
        }
    )*};
}

method_family! {
    ()
    (A1 as a1: 1)
    (A1 as a1: 1, A2 as a2: 2)
    (A1 as a1: 1, A2 as a2: 2, A3 as a3: 3)
    (A1 as a1: 1, A2 as a2: 2, A3 as a3: 3, A4 as a4: 4)
}
