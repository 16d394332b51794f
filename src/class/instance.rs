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
    any::{Any, TypeId},
    cell::RefCell,
    fmt::{Debug, Display, Formatter},
    rc::{Rc, Weak},
};

use compact_str::CompactString;

use crate::{
    class::registry::ClassEntry,
    report::system_panic,
    runtime::{
        coercion::{Conversion, Downcast, Upcast},
        error::{RuntimeError, RuntimeResult},
        session::Session,
        value::ScriptValue,
    },
};

/// The constness qualification of an exported instance.
///
/// The qualification travels with the handle, not with the underlying data:
/// the same object can be visible to one script as mutable and to another
/// as const.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Qual {
    /// A mutable, non-volatile receiver.
    Plain,

    /// Member writes and mutating methods are rejected.
    Const,

    /// Only methods explicitly marked volatile-safe are callable.
    Volatile,

    /// Both restrictions at once.
    ConstVolatile,
}

impl Display for Qual {
    #[inline]
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Plain => "mutable",
            Self::Const => "const",
            Self::Volatile => "volatile",
            Self::ConstVolatile => "const volatile",
        };

        formatter.write_str(name)
    }
}

impl Qual {
    pub(crate) const ALL: [Self; 4] = [Self::Plain, Self::Const, Self::Volatile, Self::ConstVolatile];

    /// True if member writes and mutating methods are rejected.
    #[inline(always)]
    pub fn is_const(self) -> bool {
        matches!(self, Self::Const | Self::ConstVolatile)
    }

    /// True if only volatile-safe methods are callable.
    #[inline(always)]
    pub fn is_volatile(self) -> bool {
        matches!(self, Self::Volatile | Self::ConstVolatile)
    }

    #[inline]
    pub(crate) fn of(is_const: bool, is_volatile: bool) -> Self {
        match (is_const, is_volatile) {
            (false, false) => Self::Plain,
            (true, false) => Self::Const,
            (false, true) => Self::Volatile,
            (true, true) => Self::ConstVolatile,
        }
    }
}

/// The ownership mode of an exported instance.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Ownership {
    /// The handle is the sole owner of the data.
    Unique,

    /// The handle shares ownership with the host.
    Shared,

    /// The handle does not own the data. Access fails once the owner drops
    /// it.
    Alias,
}

impl Ownership {
    pub(crate) const ALL: [Self; 3] = [Self::Unique, Self::Shared, Self::Alias];
}

/// A host type exposed to scripts.
///
/// Implemented through the [script_class](crate::script_class) macro, and
/// activated per session by installing a
/// [ClassBinding](crate::runtime::ClassBinding).
pub trait ScriptClass: Sized + 'static {
    /// The user-facing class name: the constructor global and the name used
    /// in error messages.
    const NAME: &'static str;
}

/// A host object prepared for the crossing into the runtime, together with
/// its ownership mode and qualification.
///
/// The plain [script_class](crate::script_class)-generated conversions
/// export mutable unique handles; this wrapper is the explicit form for the
/// other combinations.
pub struct Exported<T: ScriptClass> {
    repr: Repr<T>,
    qual: Qual,
}

enum Repr<T> {
    Owned(T),
    Unique(Box<T>),
    Shared(Rc<RefCell<T>>),
    Alias(Weak<RefCell<T>>),
}

impl<T: ScriptClass> Exported<T> {
    /// Exports an owned object. The handle becomes its sole owner.
    #[inline(always)]
    pub fn of(object: T) -> Self {
        Self {
            repr: Repr::Owned(object),
            qual: Qual::Plain,
        }
    }

    /// Exports a boxed object. The handle becomes its sole owner.
    #[inline(always)]
    pub fn unique(object: Box<T>) -> Self {
        Self {
            repr: Repr::Unique(object),
            qual: Qual::Plain,
        }
    }

    /// Exports a shared cell. The host and the handle co-own the data, and
    /// mutations on either side are visible on the other.
    #[inline(always)]
    pub fn shared(cell: Rc<RefCell<T>>) -> Self {
        Self {
            repr: Repr::Shared(cell),
            qual: Qual::Plain,
        }
    }

    /// Exports a non-owning alias of a shared cell. Access through the
    /// handle fails once the last owner drops the cell.
    #[inline(always)]
    pub fn alias(cell: &Rc<RefCell<T>>) -> Self {
        Self {
            repr: Repr::Alias(Rc::downgrade(cell)),
            qual: Qual::Plain,
        }
    }

    /// Marks the handle const. Combines with an earlier
    /// [volatile](Self::volatile) mark.
    #[inline]
    pub fn constant(mut self) -> Self {
        self.qual = Qual::of(true, self.qual.is_volatile());

        self
    }

    /// Marks the handle volatile. Combines with an earlier
    /// [constant](Self::constant) mark.
    #[inline]
    pub fn volatile(mut self) -> Self {
        self.qual = Qual::of(self.qual.is_const(), true);

        self
    }
}

impl<T: ScriptClass> Upcast for Exported<T> {
    #[inline]
    fn upcast(self, session: &mut Session) -> ScriptValue {
        ScriptValue::Data(Instance::from_exported(session, self))
    }
}

impl<T: ScriptClass> Upcast for Rc<RefCell<T>> {
    #[inline]
    fn upcast(self, session: &mut Session) -> ScriptValue {
        Exported::shared(self).upcast(session)
    }
}

impl<T: ScriptClass> Downcast for Rc<RefCell<T>> {
    fn downcast(_session: &mut Session, value: &ScriptValue) -> Conversion<Self> {
        match value {
            ScriptValue::Nil => Conversion::absent(),

            ScriptValue::Data(instance) if instance.is::<T>() => {
                // Aliases and member projections cannot re-own the data.
                let Some(strong) = &instance.cell.strong else {
                    return Conversion::failure();
                };

                match Rc::clone(strong).downcast::<RefCell<T>>() {
                    Ok(cell) => Conversion::of(cell),
                    Err(_) => Conversion::failure(),
                }
            }

            _ => Conversion::failure(),
        }
    }
}

/// An opaque handle of a host class instance, as it lives inside the
/// runtime.
///
/// The handle carries the dynamic type, the [Qual] and [Ownership] of the
/// crossing, and the dispatch metadata of its registered class. Clones
/// address the same underlying data.
#[derive(Clone)]
pub struct Instance {
    pub(crate) cell: InstanceCell,
    ty: TypeId,
    qual: Qual,
    ownership: Ownership,
    class: Rc<ClassEntry>,
}

impl Debug for Instance {
    #[inline]
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_fmt(format_args!(
            "{}({:#x})",
            self.class.name,
            self.identity(),
        ))
    }
}

impl Upcast for Instance {
    #[inline(always)]
    fn upcast(self, _session: &mut Session) -> ScriptValue {
        ScriptValue::Data(self)
    }
}

impl Downcast for Instance {
    fn downcast(_session: &mut Session, value: &ScriptValue) -> Conversion<Self> {
        match value {
            ScriptValue::Nil => Conversion::absent(),
            ScriptValue::Data(instance) => Conversion::of(instance.clone()),
            _ => Conversion::failure(),
        }
    }
}

impl Instance {
    pub(crate) fn from_exported<T: ScriptClass>(
        session: &Session,
        exported: Exported<T>,
    ) -> Self {
        let class = session.registry().expect(TypeId::of::<T>(), T::NAME);

        let (cell, ownership) = match exported.repr {
            Repr::Owned(object) => (
                InstanceCell::strong(Rc::new(RefCell::new(object))),
                Ownership::Unique,
            ),

            Repr::Unique(object) => (
                InstanceCell::strong(Rc::new(RefCell::new(*object))),
                Ownership::Unique,
            ),

            Repr::Shared(cell) => (InstanceCell::strong(cell), Ownership::Shared),

            Repr::Alias(weak) => (InstanceCell::alias(weak), Ownership::Alias),
        };

        Self {
            cell,
            ty: TypeId::of::<T>(),
            qual: exported.qual,
            ownership,
            class,
        }
    }

    /// True if the handle wraps an instance of `T`.
    #[inline(always)]
    pub fn is<T: 'static>(&self) -> bool {
        self.ty == TypeId::of::<T>()
    }

    /// The qualification the instance crossed the boundary with.
    #[inline(always)]
    pub fn qual(&self) -> Qual {
        self.qual
    }

    /// The ownership mode the instance crossed the boundary with.
    #[inline(always)]
    pub fn ownership(&self) -> Ownership {
        self.ownership
    }

    /// The user-facing name of the instance's class.
    #[inline(always)]
    pub fn class_name(&self) -> &str {
        self.class.name.as_str()
    }

    /// A process-unique identity of the underlying data.
    #[inline(always)]
    pub fn identity(&self) -> usize {
        self.cell.identity
    }

    #[inline(always)]
    pub(crate) fn class(&self) -> &Rc<ClassEntry> {
        &self.class
    }

    /// Reads the underlying object.
    ///
    /// Fails with [RuntimeError::BorrowConflict] on a reentrant
    /// incompatible borrow, and with [RuntimeError::Dead] when a non-owning
    /// handle outlives its referent.
    pub(crate) fn with_ref<T: ScriptClass, Ret>(
        &self,
        scope: impl FnOnce(&T) -> Ret,
    ) -> RuntimeResult<Ret> {
        let mut scope = Some(scope);
        let mut result = None;

        (self.cell.with_ref)(&mut |object: &dyn Any| {
            let Some(object) = object.downcast_ref::<T>() else {
                system_panic!("Instance cell type mismatch.");
            };

            if let Some(scope) = scope.take() {
                result = Some(scope(object));
            }
        })?;

        match result {
            Some(result) => Ok(result),
            None => system_panic!("Instance cell visitor was not invoked."),
        }
    }

    /// Mutates the underlying object. The qualification gates are the
    /// caller's responsibility.
    pub(crate) fn with_mut<T: ScriptClass, Ret>(
        &self,
        scope: impl FnOnce(&mut T) -> Ret,
    ) -> RuntimeResult<Ret> {
        let mut scope = Some(scope);
        let mut result = None;

        (self.cell.with_mut)(&mut |object: &mut dyn Any| {
            let Some(object) = object.downcast_mut::<T>() else {
                system_panic!("Instance cell type mismatch.");
            };

            if let Some(scope) = scope.take() {
                result = Some(scope(object));
            }
        })?;

        match result {
            Some(result) => Ok(result),
            None => system_panic!("Instance cell visitor was not invoked."),
        }
    }

    /// Derives a member projection handle.
    ///
    /// The projection borrows through its parent on every access, so it can
    /// never outlive the parent's data: a projection of a dropped alias
    /// reports [RuntimeError::Dead] instead of dangling. Projections keep
    /// owning parents alive.
    pub(crate) fn project<T: ScriptClass, M: ScriptClass>(
        &self,
        session: &Session,
        getter: Rc<dyn Fn(&T) -> &M>,
        getter_mut: Rc<dyn Fn(&mut T) -> &mut M>,
    ) -> Self {
        let class = session.registry().expect(TypeId::of::<M>(), M::NAME);

        let with_ref: AccessRef = {
            let parent = self.cell.with_ref.clone();

            Rc::new(move |visitor: &mut dyn FnMut(&dyn Any)| {
                parent(&mut |object: &dyn Any| {
                    let Some(object) = object.downcast_ref::<T>() else {
                        system_panic!("Projection parent type mismatch.");
                    };

                    visitor(getter(object));
                })
            })
        };

        let with_mut: AccessMut = {
            let parent = self.cell.with_mut.clone();

            Rc::new(move |visitor: &mut dyn FnMut(&mut dyn Any)| {
                parent(&mut |object: &mut dyn Any| {
                    let Some(object) = object.downcast_mut::<T>() else {
                        system_panic!("Projection parent type mismatch.");
                    };

                    visitor(getter_mut(object));
                })
            })
        };

        Self {
            cell: InstanceCell {
                with_ref,
                with_mut,
                strong: self.cell.strong.clone(),
                identity: self.cell.identity,
            },
            ty: TypeId::of::<M>(),
            qual: self.qual,
            ownership: Ownership::Alias,
            class,
        }
    }
}

type AccessRef = Rc<dyn Fn(&mut dyn FnMut(&dyn Any)) -> RuntimeResult<()>>;
type AccessMut = Rc<dyn Fn(&mut dyn FnMut(&mut dyn Any)) -> RuntimeResult<()>>;

#[derive(Clone)]
pub(crate) struct InstanceCell {
    with_ref: AccessRef,
    with_mut: AccessMut,
    strong: Option<Rc<dyn Any>>,
    identity: usize,
}

impl InstanceCell {
    fn strong<T: ScriptClass>(cell: Rc<RefCell<T>>) -> Self {
        let identity = Rc::as_ptr(&cell) as *const u8 as usize;

        let with_ref: AccessRef = {
            let cell = Rc::clone(&cell);

            Rc::new(move |visitor: &mut dyn FnMut(&dyn Any)| {
                let Ok(object) = cell.try_borrow() else {
                    return Err(RuntimeError::BorrowConflict {
                        class: CompactString::from(T::NAME),
                    });
                };

                visitor(&*object);

                Ok(())
            })
        };

        let with_mut: AccessMut = {
            let cell = Rc::clone(&cell);

            Rc::new(move |visitor: &mut dyn FnMut(&mut dyn Any)| {
                let Ok(mut object) = cell.try_borrow_mut() else {
                    return Err(RuntimeError::BorrowConflict {
                        class: CompactString::from(T::NAME),
                    });
                };

                visitor(&mut *object);

                Ok(())
            })
        };

        Self {
            with_ref,
            with_mut,
            strong: Some(cell as Rc<dyn Any>),
            identity,
        }
    }

    fn alias<T: ScriptClass>(weak: Weak<RefCell<T>>) -> Self {
        let identity = weak.as_ptr() as *const u8 as usize;

        let with_ref: AccessRef = {
            let weak = weak.clone();

            Rc::new(move |visitor: &mut dyn FnMut(&dyn Any)| {
                let Some(cell) = weak.upgrade() else {
                    return Err(RuntimeError::Dead {
                        class: CompactString::from(T::NAME),
                    });
                };

                let Ok(object) = cell.try_borrow() else {
                    return Err(RuntimeError::BorrowConflict {
                        class: CompactString::from(T::NAME),
                    });
                };

                visitor(&*object);

                Ok(())
            })
        };

        let with_mut: AccessMut = {
            let weak = weak.clone();

            Rc::new(move |visitor: &mut dyn FnMut(&mut dyn Any)| {
                let Some(cell) = weak.upgrade() else {
                    return Err(RuntimeError::Dead {
                        class: CompactString::from(T::NAME),
                    });
                };

                let Ok(mut object) = cell.try_borrow_mut() else {
                    return Err(RuntimeError::BorrowConflict {
                        class: CompactString::from(T::NAME),
                    });
                };

                visitor(&mut *object);

                Ok(())
            })
        };

        Self {
            with_ref,
            with_mut,
            strong: None,
            identity,
        }
    }
}

/// Declares a host type as a script class.
///
/// The plain form generates by-value conversions in both directions (the
/// extraction clones the instance):
///
/// ```ignore
/// script_class!(Vector as "Vector");
/// ```
///
/// The `opaque` form skips the by-value conversions for types that should
/// only cross the boundary through [Exported](crate::runtime::Exported)
/// wrappers or shared cells:
///
/// ```ignore
/// script_class!(Connection as "Connection", opaque);
/// ```
#[macro_export]
macro_rules! script_class {
    ($ty:ty as $name:literal) => {
        $crate::script_class!($ty as $name, opaque);

        impl $crate::runtime::Upcast for $ty {
            #[inline]
            fn upcast(
                self,
                session: &mut $crate::runtime::Session,
            ) -> $crate::runtime::ScriptValue {
                $crate::runtime::Exported::of(self).upcast(session)
            }
        }

        impl $crate::runtime::Downcast for $ty {
            fn downcast(
                _session: &mut $crate::runtime::Session,
                value: &$crate::runtime::ScriptValue,
            ) -> $crate::runtime::Conversion<Self> {
                match value {
                    $crate::runtime::ScriptValue::Nil => {
                        $crate::runtime::Conversion::absent()
                    }

                    $crate::runtime::ScriptValue::Data(instance)
                        if instance.is::<$ty>() =>
                    {
                        match instance.extract_cloned::<$ty>() {
                            Ok(object) => $crate::runtime::Conversion::of(object),
                            Err(_) => $crate::runtime::Conversion::failure(),
                        }
                    }

                    _ => $crate::runtime::Conversion::failure(),
                }
            }
        }
    };

    ($ty:ty as $name:literal, opaque) => {
        impl $crate::runtime::ScriptClass for $ty {
            const NAME: &'static str = $name;
        }
    };
}

impl Instance {
    /// Clones the underlying object out of the handle.
    pub fn extract_cloned<T: ScriptClass + Clone>(&self) -> RuntimeResult<T> {
        self.with_ref::<T, T>(Clone::clone)
    }
}
