//! Function table for type-erased models.
//!
//! Every handle stores a `&'static Vtable` next to its erased pointers. The table is built
//! by [`Vtable::new`] for one concrete `(V, B)` pair, so the function pointers always agree
//! with the model, value and behavior they are handed, as long as callers only pass
//! pointers that were produced for the same pair. All three handles uphold this by never
//! exposing their pointers or their vtable for modification.
//!
//! Operations come in two flavours:
//!
//! * model operations take a pointer to a whole [`Model<V, B>`], wherever it lives;
//! * part operations take separate value and behavior pointers, which is all a
//!   [`CapRef`](crate::CapRef) has. Invoking and duplicating only ever go through the part
//!   operations, so there is a single dispatch point for each of them.

use alloc::boxed::Box;
use core::alloc::Layout;
use core::any::{self, TypeId};
use core::mem::MaybeUninit;
use core::ptr::{self, NonNull};

use crate::model::{Behavior, Model};
use crate::util::Erased;

pub(crate) struct Vtable {
    /// Layout of `Model<V, B>`.
    layout: Layout,
    value_type_id: fn() -> TypeId,
    value_type_name: fn() -> &'static str,
    behavior_type_name: fn() -> &'static str,
    invoke: unsafe fn(NonNull<Erased>, NonNull<Erased>),
    parts: unsafe fn(NonNull<Erased>) -> (NonNull<Erased>, NonNull<Erased>),
    clone_into: unsafe fn(NonNull<Erased>, NonNull<Erased>, NonNull<Erased>),
    clone_boxed: unsafe fn(NonNull<Erased>, NonNull<Erased>) -> NonNull<Erased>,
    relocate_into: unsafe fn(NonNull<Erased>, NonNull<Erased>),
    relocate_boxed: unsafe fn(NonNull<Erased>) -> NonNull<Erased>,
    drop_in_place: unsafe fn(NonNull<Erased>),
    drop_boxed: unsafe fn(NonNull<Erased>),
    dealloc_boxed: unsafe fn(NonNull<Erased>),
}

impl Vtable {
    /// Returns the vtable of `Model<V, B>`.
    pub(crate) const fn new<V, B>() -> &'static Self
    where
        V: Clone + 'static,
        B: Behavior<V> + 'static,
    {
        const {
            &Self {
                layout: Layout::new::<Model<V, B>>(),
                value_type_id: TypeId::of::<V>,
                value_type_name: any::type_name::<V>,
                behavior_type_name: any::type_name::<B>,
                invoke: invoke::<V, B>,
                parts: parts::<V, B>,
                clone_into: clone_into::<V, B>,
                clone_boxed: clone_boxed::<V, B>,
                relocate_into: relocate_into::<V, B>,
                relocate_boxed: relocate_boxed::<V, B>,
                drop_in_place: drop_in_place::<V, B>,
                drop_boxed: drop_boxed::<V, B>,
                dealloc_boxed: dealloc_boxed::<V, B>,
            }
        }
    }

    #[inline]
    pub(crate) fn layout(&self) -> Layout {
        self.layout
    }

    #[inline]
    pub(crate) fn value_type_id(&self) -> TypeId {
        (self.value_type_id)()
    }

    #[inline]
    pub(crate) fn value_type_name(&self) -> &'static str {
        (self.value_type_name)()
    }

    #[inline]
    pub(crate) fn behavior_type_name(&self) -> &'static str {
        (self.behavior_type_name)()
    }

    /// Applies the behavior to the value.
    ///
    /// # Safety
    ///
    /// `value` and `behavior` must point to live instances of the `V` and `B` this vtable
    /// was built for.
    #[inline]
    pub(crate) unsafe fn invoke(&self, value: NonNull<Erased>, behavior: NonNull<Erased>) {
        // SAFETY: forwarded to the caller.
        unsafe { (self.invoke)(value, behavior) }
    }

    /// Projects a model pointer onto its value and behavior fields.
    ///
    /// # Safety
    ///
    /// `model` must point to an allocation holding a `Model<V, B>` of this vtable.
    #[inline]
    pub(crate) unsafe fn parts(
        &self,
        model: NonNull<Erased>,
    ) -> (NonNull<Erased>, NonNull<Erased>) {
        // SAFETY: forwarded to the caller.
        unsafe { (self.parts)(model) }
    }

    /// Writes a fresh model cloned from `value` and `behavior` into `dst`.
    ///
    /// # Safety
    ///
    /// 1. `value` and `behavior` must point to live instances of this vtable's `V` and `B`.
    /// 2. `dst` must be valid for writes of [`Self::layout`] and aligned to it. Whatever
    ///    `dst` held before is overwritten without being dropped.
    #[inline]
    pub(crate) unsafe fn clone_into(
        &self,
        value: NonNull<Erased>,
        behavior: NonNull<Erased>,
        dst: NonNull<Erased>,
    ) {
        // SAFETY: forwarded to the caller.
        unsafe { (self.clone_into)(value, behavior, dst) }
    }

    /// Clones `value` and `behavior` into a new heap model and returns its pointer.
    ///
    /// # Safety
    ///
    /// `value` and `behavior` must point to live instances of this vtable's `V` and `B`.
    #[inline]
    pub(crate) unsafe fn clone_boxed(
        &self,
        value: NonNull<Erased>,
        behavior: NonNull<Erased>,
    ) -> NonNull<Erased> {
        // SAFETY: forwarded to the caller.
        unsafe { (self.clone_boxed)(value, behavior) }
    }

    /// Moves the model at `src` into `dst`.
    ///
    /// # Safety
    ///
    /// 1. `src` must point to a live model of this vtable. Afterwards it is logically
    ///    moved-from: it must not be used or dropped again, only its storage released.
    /// 2. `dst` must be valid for writes of [`Self::layout`], aligned to it, and must not
    ///    overlap `src`.
    #[inline]
    pub(crate) unsafe fn relocate_into(&self, src: NonNull<Erased>, dst: NonNull<Erased>) {
        // SAFETY: forwarded to the caller.
        unsafe { (self.relocate_into)(src, dst) }
    }

    /// Moves the model at `src` into a new heap allocation and returns its pointer.
    ///
    /// # Safety
    ///
    /// Same as the first requirement of [`Self::relocate_into`].
    #[inline]
    pub(crate) unsafe fn relocate_boxed(&self, src: NonNull<Erased>) -> NonNull<Erased> {
        // SAFETY: forwarded to the caller.
        unsafe { (self.relocate_boxed)(src) }
    }

    /// Drops the model at `model` without releasing its storage.
    ///
    /// # Safety
    ///
    /// `model` must point to a live model of this vtable which is not used afterwards.
    #[inline]
    pub(crate) unsafe fn drop_in_place(&self, model: NonNull<Erased>) {
        // SAFETY: forwarded to the caller.
        unsafe { (self.drop_in_place)(model) }
    }

    /// Drops a heap model and frees its allocation.
    ///
    /// # Safety
    ///
    /// `model` must come from [`Self::clone_boxed`] or [`Self::relocate_boxed`] of this
    /// vtable, hold a live model and not be used afterwards.
    #[inline]
    pub(crate) unsafe fn drop_boxed(&self, model: NonNull<Erased>) {
        // SAFETY: forwarded to the caller.
        unsafe { (self.drop_boxed)(model) }
    }

    /// Frees the allocation of a heap model that has already been moved out.
    ///
    /// # Safety
    ///
    /// `model` must come from [`Self::clone_boxed`] or [`Self::relocate_boxed`] of this
    /// vtable, its model must have been relocated away, and it must not be used afterwards.
    #[inline]
    pub(crate) unsafe fn dealloc_boxed(&self, model: NonNull<Erased>) {
        // SAFETY: forwarded to the caller.
        unsafe { (self.dealloc_boxed)(model) }
    }
}

/// Allocates `model` on the heap.
pub(crate) fn boxed<V, B>(model: Model<V, B>) -> NonNull<Erased> {
    NonNull::from(Box::leak(Box::new(model))).cast::<Erased>()
}

/// # Safety
///
/// `value` and `behavior` must point to live `V` and `B`.
unsafe fn invoke<V, B: Behavior<V>>(value: NonNull<Erased>, behavior: NonNull<Erased>) {
    // SAFETY: guaranteed by the caller, only shared access is needed.
    let (value, behavior) = unsafe { (value.cast::<V>().as_ref(), behavior.cast::<B>().as_ref()) };
    behavior.invoke(value);
}

/// # Safety
///
/// `model` must point into an allocation holding a `Model<V, B>`.
unsafe fn parts<V, B>(model: NonNull<Erased>) -> (NonNull<Erased>, NonNull<Erased>) {
    let model = model.cast::<Model<V, B>>().as_ptr();
    // SAFETY: projecting to fields stays within the model's allocation and creates no
    // intermediate reference.
    let (value, behavior) = unsafe {
        (
            ptr::addr_of_mut!((*model).value),
            ptr::addr_of_mut!((*model).behavior),
        )
    };
    // SAFETY: field addresses of a non-null model are non-null.
    unsafe {
        (
            NonNull::new_unchecked(value).cast::<Erased>(),
            NonNull::new_unchecked(behavior).cast::<Erased>(),
        )
    }
}

/// # Safety
///
/// See [`Vtable::clone_into`].
unsafe fn clone_into<V: Clone, B: Behavior<V>>(
    value: NonNull<Erased>,
    behavior: NonNull<Erased>,
    dst: NonNull<Erased>,
) {
    // SAFETY: guaranteed by the caller.
    let (value, behavior) = unsafe { (value.cast::<V>().as_ref(), behavior.cast::<B>().as_ref()) };
    let model = Model::new(value.clone(), behavior.clone());
    // SAFETY: `dst` fits a `Model<V, B>`, guaranteed by the caller.
    unsafe { dst.cast::<Model<V, B>>().as_ptr().write(model) }
}

/// # Safety
///
/// See [`Vtable::clone_boxed`].
unsafe fn clone_boxed<V: Clone, B: Behavior<V>>(
    value: NonNull<Erased>,
    behavior: NonNull<Erased>,
) -> NonNull<Erased> {
    // SAFETY: guaranteed by the caller.
    let (value, behavior) = unsafe { (value.cast::<V>().as_ref(), behavior.cast::<B>().as_ref()) };
    boxed(Model::new(value.clone(), behavior.clone()))
}

/// # Safety
///
/// See [`Vtable::relocate_into`].
unsafe fn relocate_into<V, B>(src: NonNull<Erased>, dst: NonNull<Erased>) {
    // SAFETY: both pointers are valid for one `Model<V, B>` and do not overlap.
    unsafe {
        ptr::copy_nonoverlapping(
            src.cast::<Model<V, B>>().as_ptr(),
            dst.cast::<Model<V, B>>().as_ptr(),
            1,
        )
    }
}

/// # Safety
///
/// See [`Vtable::relocate_boxed`].
unsafe fn relocate_boxed<V, B>(src: NonNull<Erased>) -> NonNull<Erased> {
    // SAFETY: `src` holds a live model which the caller gives up.
    let model = unsafe { src.cast::<Model<V, B>>().as_ptr().read() };
    boxed(model)
}

/// # Safety
///
/// See [`Vtable::drop_in_place`].
unsafe fn drop_in_place<V, B>(model: NonNull<Erased>) {
    // SAFETY: guaranteed by the caller.
    unsafe { ptr::drop_in_place(model.cast::<Model<V, B>>().as_ptr()) }
}

/// # Safety
///
/// See [`Vtable::drop_boxed`].
unsafe fn drop_boxed<V, B>(model: NonNull<Erased>) {
    // SAFETY: the pointer came from `Box::leak` of a `Box<Model<V, B>>`.
    drop(unsafe { Box::from_raw(model.cast::<Model<V, B>>().as_ptr()) });
}

/// # Safety
///
/// See [`Vtable::dealloc_boxed`].
unsafe fn dealloc_boxed<V, B>(model: NonNull<Erased>) {
    // SAFETY: the pointer came from `Box::leak` of a `Box<Model<V, B>>`, and
    // `MaybeUninit<Model<V, B>>` has the same layout but no drop glue.
    drop(unsafe { Box::from_raw(model.cast::<MaybeUninit<Model<V, B>>>().as_ptr()) });
}
