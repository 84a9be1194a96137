use core::alloc::Layout;
use core::any::TypeId;
use core::cell::UnsafeCell;
use core::fmt;
use core::marker::PhantomData;
use core::mem::{self, ManuallyDrop, MaybeUninit};
use core::ptr::NonNull;

use crate::capbox::CapBox;
use crate::error::CapacityError;
use crate::model::{Behavior, Model};
use crate::space::S4;
use crate::util::{fits_in, Erased};
use crate::vtable::Vtable;
use crate::CapRef;

/// Compile-time check that a model of type `M` fits the storage of `Space`.
struct AssertFits<M, Space>(PhantomData<(M, Space)>);

impl<M, Space> AssertFits<M, Space> {
    const ASSERT: () = {
        assert!(
            mem::size_of::<M>() <= mem::size_of::<Space>(),
            "model is too large for the inline space of `InlineCapBox`"
        );
        assert!(
            mem::align_of::<M>() <= mem::align_of::<Space>(),
            "model alignment exceeds the alignment of the inline space of `InlineCapBox`"
        );
    };
}

/// A value and its behavior, erased and stored inline.
///
/// The model lives inside the handle, in a buffer with the size and alignment of `Space`
/// (see [`space`](crate::space)). Constructing, cloning and moving an `InlineCapBox` never
/// touch the heap. The price is a hard ceiling: [`InlineCapBox::new`] refuses to compile
/// for a value and behavior that together do not fit, and the runtime-checked paths
/// ([`try_new`](InlineCapBox::try_new), [`resize`](InlineCapBox::resize),
/// [`CapRef::to_inline`], [`CapBox::try_into_inline`]) return a [`CapacityError`].
///
/// # Example
///
/// ```
/// use capbox::InlineCapBox;
/// use capbox::space::S4;
///
/// #[derive(Clone)]
/// struct Square {
///     side: f64,
/// }
///
/// let shape: InlineCapBox<S4> = InlineCapBox::new(Square { side: 2.0 }, |s: &Square| {
///     assert_eq!(s.side * s.side, 4.0)
/// });
/// let copy = shape.clone();
/// shape.invoke();
/// copy.invoke();
/// ```
///
/// A model that does not fit is a compile error:
///
/// ```compile_fail
/// use capbox::InlineCapBox;
/// use capbox::space::S1;
///
/// let shape: InlineCapBox<S1> = InlineCapBox::new([0u64; 8], |_: &[u64; 8]| {});
/// ```
///
/// So is a model aligned beyond the space, even when its size fits:
///
/// ```compile_fail
/// use capbox::InlineCapBox;
/// use capbox::space::S16;
///
/// #[derive(Clone)]
/// #[repr(align(64))]
/// struct Aligned(u8);
///
/// let shape: InlineCapBox<S16> = InlineCapBox::new(Aligned(1), |_: &Aligned| {});
/// ```
pub struct InlineCapBox<Space = S4> {
    /// Always holds a live `Model<V, B>` for the `V` and `B` of `vtable`. The model may be
    /// mutated through `&self` when it has interior mutability.
    space: UnsafeCell<MaybeUninit<Space>>,
    vtable: &'static Vtable,
    _marker: PhantomData<*const Erased>,
}

impl<Space> InlineCapBox<Space> {
    /// Stores `value` together with `behavior` inline.
    ///
    /// Fails to compile if the pair does not fit `Space`, by size or by alignment.
    pub fn new<V, B>(value: V, behavior: B) -> InlineCapBox<Space>
    where
        V: Clone + 'static,
        B: Behavior<V> + 'static,
    {
        #[allow(clippy::let_unit_value)]
        let () = AssertFits::<Model<V, B>, Space>::ASSERT;
        // SAFETY: checked statically above.
        unsafe { Self::new_unchecked(value, behavior) }
    }

    /// Stores `value` together with `behavior` inline, checking the fit at runtime.
    ///
    /// On failure both are handed back and nothing is constructed.
    ///
    /// # Example
    ///
    /// ```
    /// use capbox::InlineCapBox;
    /// use capbox::space::{S1, S2};
    ///
    /// assert!(InlineCapBox::<S2>::try_new(1u64, |_: &u64| {}).is_ok());
    /// assert!(InlineCapBox::<S1>::try_new([1u64; 2], |_: &[u64; 2]| {}).is_err());
    /// ```
    pub fn try_new<V, B>(
        value: V,
        behavior: B,
    ) -> Result<InlineCapBox<Space>, CapacityError<(V, B)>>
    where
        V: Clone + 'static,
        B: Behavior<V> + 'static,
    {
        if Self::fits::<V, B>() {
            // SAFETY: checked above.
            Ok(unsafe { Self::new_unchecked(value, behavior) })
        } else {
            Err(CapacityError::new::<Space>((value, behavior), Layout::new::<Model<V, B>>()))
        }
    }

    /// # Safety
    ///
    /// `Model<V, B>` must fit `Space`.
    unsafe fn new_unchecked<V, B>(value: V, behavior: B) -> InlineCapBox<Space>
    where
        V: Clone + 'static,
        B: Behavior<V> + 'static,
    {
        let model = Model::new(value, behavior);
        // SAFETY: the destination fits the model, guaranteed by the caller.
        unsafe {
            Self::init_with(Vtable::new::<V, B>(), |dst| {
                dst.cast::<Model<V, B>>().as_ptr().write(model)
            })
        }
    }

    /// Builds a box whose model is written by `init`.
    ///
    /// If `init` panics nothing is dropped.
    ///
    /// # Safety
    ///
    /// `init` must write a live model of `vtable` into the pointer it is given, and that
    /// model must fit `Space`.
    pub(crate) unsafe fn init_with(
        vtable: &'static Vtable,
        init: impl FnOnce(NonNull<Erased>),
    ) -> InlineCapBox<Space> {
        let mut space = UnsafeCell::new(MaybeUninit::<Space>::uninit());
        init(NonNull::from(space.get_mut()).cast::<Erased>());
        InlineCapBox {
            space,
            vtable,
            _marker: PhantomData,
        }
    }

    /// Returns `true` if a `V` paired with a `B` fits this space.
    pub const fn fits<V, B>() -> bool {
        fits_in::<Space>(Layout::new::<Model<V, B>>())
    }

    /// Size of the inline space in bytes.
    pub const fn capacity(&self) -> usize {
        mem::size_of::<Space>()
    }

    /// Alignment of the inline space in bytes.
    pub const fn alignment(&self) -> usize {
        mem::align_of::<Space>()
    }

    /// Applies the stored behavior to the stored value.
    pub fn invoke(&self) {
        let (value, behavior) = self.parts();
        // SAFETY: the parts belong to the live model of `self.vtable`.
        unsafe { self.vtable.invoke(value, behavior) }
    }

    /// Borrows the stored value and behavior as a [`CapRef`].
    ///
    /// The reference points into this box's buffer, which cannot move while it is
    /// borrowed.
    #[allow(clippy::should_implement_trait)]
    pub fn as_ref(&self) -> CapRef<'_> {
        CapRef::from(self)
    }

    /// Moves the model into an `InlineCapBox` with a different space.
    ///
    /// Fails, handing `self` back, if the model does not fit `ToSpace`.
    ///
    /// # Example
    ///
    /// ```
    /// use capbox::InlineCapBox;
    /// use capbox::space::{S2, S4, S8};
    ///
    /// let m = InlineCapBox::<S4>::new([0usize; 2], |_: &[usize; 2]| {});
    /// let l = m.resize::<S8>().ok().unwrap();
    /// let s = l.resize::<S2>().ok().unwrap();
    /// assert!(s.resize::<[u8; 1]>().is_err());
    /// ```
    pub fn resize<ToSpace>(self) -> Result<InlineCapBox<ToSpace>, CapacityError<Self>> {
        let vtable = self.vtable;
        if !fits_in::<ToSpace>(vtable.layout()) {
            return Err(CapacityError::new::<ToSpace>(self, vtable.layout()));
        }

        let mut this = ManuallyDrop::new(self);
        let src = this.model_ptr_mut();
        // SAFETY: the model fits `ToSpace`, and `this` is never dropped so the moved-from
        // model is only released together with its buffer.
        Ok(unsafe { InlineCapBox::init_with(vtable, |dst| vtable.relocate_into(src, dst)) })
    }

    /// Moves the model onto the heap.
    pub fn into_heap(self) -> CapBox {
        let vtable = self.vtable;
        let mut this = ManuallyDrop::new(self);
        // SAFETY: the model is live, and `this` is never dropped so it is not used again.
        unsafe {
            let model = vtable.relocate_boxed(this.model_ptr_mut());
            CapBox::from_raw(model, vtable)
        }
    }

    /// Returns `true` if the stored value is a `V`.
    pub fn is<V: 'static>(&self) -> bool {
        self.vtable.value_type_id() == TypeId::of::<V>()
    }

    /// Returns the stored value if it is a `V`.
    pub fn downcast_value_ref<V: 'static>(&self) -> Option<&V> {
        if self.is::<V>() {
            let (value, _) = self.parts();
            // SAFETY: the type was checked above, and the value lives as long as `self`.
            Some(unsafe { value.cast::<V>().as_ref() })
        } else {
            None
        }
    }

    /// Returns the stored value mutably if it is a `V`.
    pub fn downcast_value_mut<V: 'static>(&mut self) -> Option<&mut V> {
        if self.is::<V>() {
            // SAFETY: `self` is borrowed mutably, so the model is not aliased.
            let (value, _) = unsafe { self.vtable.parts(self.model_ptr_mut()) };
            // SAFETY: the type was checked above.
            Some(unsafe { value.cast::<V>().as_mut() })
        } else {
            None
        }
    }

    /// Returns the [`TypeId`] of the stored value.
    pub fn value_type_id(&self) -> TypeId {
        self.vtable.value_type_id()
    }

    /// Returns the type name of the stored value.
    pub fn value_type_name(&self) -> &'static str {
        self.vtable.value_type_name()
    }

    /// Returns the type name of the stored behavior.
    pub fn behavior_type_name(&self) -> &'static str {
        self.vtable.behavior_type_name()
    }

    /// Returns the layout of the stored model, which is at most the layout of `Space`.
    pub fn model_layout(&self) -> Layout {
        self.vtable.layout()
    }

    pub(crate) fn vtable(&self) -> &'static Vtable {
        self.vtable
    }

    /// Pointers to the stored value and behavior, valid for shared access.
    pub(crate) fn parts(&self) -> (NonNull<Erased>, NonNull<Erased>) {
        // SAFETY: the buffer holds a live model of `self.vtable`.
        unsafe { self.vtable.parts(self.model_ptr()) }
    }

    fn model_ptr(&self) -> NonNull<Erased> {
        // SAFETY: `UnsafeCell::get` never returns null.
        unsafe { NonNull::new_unchecked(self.space.get()) }.cast::<Erased>()
    }

    fn model_ptr_mut(&mut self) -> NonNull<Erased> {
        NonNull::from(self.space.get_mut()).cast::<Erased>()
    }
}

impl<Space> Clone for InlineCapBox<Space> {
    fn clone(&self) -> Self {
        let (value, behavior) = self.parts();
        // SAFETY: the clone has the same model type as `self`, which already fits.
        unsafe {
            InlineCapBox::init_with(self.vtable, |dst| {
                self.vtable.clone_into(value, behavior, dst)
            })
        }
    }

    /// Copy-and-swap: `self` is left untouched if cloning `source` panics.
    fn clone_from(&mut self, source: &Self) {
        let mut copy = source.clone();
        mem::swap(self, &mut copy);
    }
}

impl<Space> Drop for InlineCapBox<Space> {
    fn drop(&mut self) {
        let model = self.model_ptr_mut();
        // SAFETY: the model is live and never used again. The space itself is not dropped.
        unsafe { self.vtable.drop_in_place(model) }
    }
}

impl<Space> TryFrom<CapBox> for InlineCapBox<Space> {
    type Error = CapacityError<CapBox>;

    fn try_from(boxed: CapBox) -> Result<Self, Self::Error> {
        let vtable = boxed.vtable();
        if !fits_in::<Space>(vtable.layout()) {
            return Err(CapacityError::new::<Space>(boxed, vtable.layout()));
        }

        let model = boxed.into_raw();
        // SAFETY: the model fits, it is moved out of its allocation exactly once, and the
        // allocation is released without dropping the moved-from model.
        let inline = unsafe {
            InlineCapBox::init_with(vtable, |dst| {
                vtable.relocate_into(model, dst);
                vtable.dealloc_boxed(model);
            })
        };
        Ok(inline)
    }
}

impl<Space> From<InlineCapBox<Space>> for CapBox {
    fn from(inline: InlineCapBox<Space>) -> CapBox {
        inline.into_heap()
    }
}

impl<Space> fmt::Debug for InlineCapBox<Space> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("InlineCapBox")
            .field("value", &self.value_type_name())
            .field("behavior", &self.behavior_type_name())
            .field("capacity", &self.capacity())
            .finish()
    }
}

impl<Space> fmt::Pointer for InlineCapBox<Space> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Pointer::fmt(&self.model_ptr().as_ptr(), f)
    }
}

#[cfg(test)]
mod tests {
    use super::InlineCapBox;
    use crate::space::*;
    use crate::{Behavior, CapBox, CapRef};
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    #[derive(Debug, Clone, PartialEq)]
    struct Circle {
        radius: f64,
    }

    #[derive(Clone)]
    struct DropCount(Rc<Cell<usize>>);

    impl Drop for DropCount {
        fn drop(&mut self) {
            self.0.set(self.0.get() + 1);
        }
    }

    fn noop<T>(_: &T) {}

    #[test]
    fn test_basic() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let log = seen.clone();
        let b: InlineCapBox<S4> = InlineCapBox::new(Circle { radius: 3.14 }, move |c: &Circle| {
            log.borrow_mut().push(c.radius)
        });

        b.invoke();
        b.clone().invoke();
        assert_eq!(*seen.borrow(), [3.14, 3.14]);
        assert_eq!(b.capacity(), 4 * std::mem::size_of::<usize>());
        assert_eq!(b.alignment(), std::mem::align_of::<usize>());
    }

    #[test]
    fn test_model_lives_in_buffer() {
        let b: InlineCapBox<S2> = InlineCapBox::new(7usize, noop::<usize>);
        let start = &b as *const _ as usize;
        let end = start + std::mem::size_of_val(&b);
        let value = b.downcast_value_ref::<usize>().unwrap() as *const usize as usize;
        assert!(start <= value && value < end);
    }

    #[test]
    fn test_fits() {
        assert!(InlineCapBox::<S1>::fits::<usize, ()>());
        assert!(!InlineCapBox::<S1>::fits::<usize, fn(&usize)>());
        assert!(!InlineCapBox::<S1>::fits::<usize, Rc<()>>());
        assert!(InlineCapBox::<S2>::fits::<usize, Rc<()>>());
        assert!(!InlineCapBox::<[u8; 64]>::fits::<u16, ()>());
    }

    #[test]
    fn test_try_new() {
        let drops = Rc::new(Cell::new(0));
        let fit = InlineCapBox::<S2>::try_new(DropCount(drops.clone()), noop::<DropCount>);
        assert!(fit.is_ok());

        let pair = (DropCount(drops.clone()), 0u64);
        let err = InlineCapBox::<S1>::try_new(pair, noop::<(DropCount, u64)>).unwrap_err();
        assert!(err.is_too_large());
        assert_eq!(drops.get(), 0);

        let ((value, _), _) = err.into_inner();
        assert_eq!(drops.get(), 0);
        drop(value);
        assert_eq!(drops.get(), 1);

        drop(fit);
        assert_eq!(drops.get(), 2);
    }

    #[test]
    fn test_try_new_alignment() {
        #[derive(Clone)]
        #[repr(align(64))]
        struct Aligned(u8);

        let err = InlineCapBox::<S16>::try_new(Aligned(1), noop::<Aligned>).unwrap_err();
        assert!(!err.is_too_large());
        assert_eq!(err.required().align(), 64);
    }

    #[test]
    fn test_clone_is_deep() {
        let mut a: InlineCapBox<S4> = InlineCapBox::new(Circle { radius: 1.0 }, noop::<Circle>);
        let b = a.clone();

        a.downcast_value_mut::<Circle>().unwrap().radius = 2.0;
        assert_eq!(a.downcast_value_ref::<Circle>().unwrap().radius, 2.0);
        assert_eq!(b.downcast_value_ref::<Circle>().unwrap().radius, 1.0);
    }

    #[test]
    fn test_clone_from() {
        let drops = Rc::new(Cell::new(0));
        let tracked = DropCount(drops.clone());
        let mut target: InlineCapBox<S2> = InlineCapBox::new(tracked, noop::<DropCount>);
        let source: InlineCapBox<S2> = InlineCapBox::new(5u32, noop::<u32>);

        target.clone_from(&source);
        assert_eq!(drops.get(), 1);
        assert_eq!(target.downcast_value_ref::<u32>(), Some(&5));
    }

    #[test]
    fn test_drop_once() {
        let drops = Rc::new(Cell::new(0));
        let tracked = DropCount(drops.clone());
        let b: InlineCapBox<S2> = InlineCapBox::new(tracked, noop::<DropCount>);
        let c = b.clone();
        let moved = b;
        assert_eq!(drops.get(), 0);

        drop(moved);
        assert_eq!(drops.get(), 1);
        drop(c);
        assert_eq!(drops.get(), 2);
    }

    #[test]
    fn test_dont_drop_space() {
        struct NoDrop(S4);
        impl Drop for NoDrop {
            fn drop(&mut self) {
                unreachable!();
            }
        }

        let b = InlineCapBox::<NoDrop>::new(true, noop::<bool>);
        drop(b.clone());
        drop(b);
    }

    #[test]
    fn test_resize() {
        let drops = Rc::new(Cell::new(0));
        let m = InlineCapBox::<S4>::new(DropCount(drops.clone()), noop::<DropCount>);
        let l = m.resize::<S8>().ok().unwrap();
        let s = l.resize::<S1>().ok().unwrap();
        assert_eq!(drops.get(), 0);

        let s = s.resize::<[u8; 2]>().unwrap_err().into_inner();
        assert!(s.is::<DropCount>());
        assert_eq!(drops.get(), 0);

        drop(s);
        assert_eq!(drops.get(), 1);
    }

    #[test]
    fn test_heap_round_trip() {
        let drops = Rc::new(Cell::new(0));
        let inline = InlineCapBox::<S4>::new(DropCount(drops.clone()), noop::<DropCount>);

        let heap: CapBox = inline.into();
        assert!(heap.is::<DropCount>());
        let inline = InlineCapBox::<S2>::try_from(heap).ok().unwrap();
        assert_eq!(drops.get(), 0);

        let heap = CapBox::from(inline);
        let heap = heap.try_into_inline::<[u8; 1]>().unwrap_err().into_inner();
        assert_eq!(drops.get(), 0);
        drop(heap);
        assert_eq!(drops.get(), 1);
    }

    #[test]
    fn test_zst() {
        struct ZSpace;

        let hits = Rc::new(Cell::new(0));
        let counter = hits.clone();
        let b: InlineCapBox<S1> =
            InlineCapBox::new((), move |_: &()| counter.set(counter.get() + 1));
        b.invoke();
        assert_eq!(hits.get(), 1);

        let zst: InlineCapBox<ZSpace> = InlineCapBox::new((), noop::<()>);
        zst.clone().invoke();
        assert_eq!(zst.capacity(), 0);
        assert!(zst.resize::<ZSpace>().is_ok());
    }

    #[test]
    fn test_interior_mutability() {
        #[derive(Clone)]
        struct Hits(Cell<u32>);

        impl Behavior<Cell<u32>> for Hits {
            fn invoke(&self, value: &Cell<u32>) {
                value.set(value.get() + 1);
                self.0.set(self.0.get() + 1);
            }
        }

        let b = InlineCapBox::<S2>::new(Cell::new(0u32), Hits(Cell::new(0)));
        b.invoke();
        CapRef::from(&b).invoke();
        b.as_ref().invoke();

        assert_eq!(b.downcast_value_ref::<Cell<u32>>().map(Cell::get), Some(3));
        let hits = unsafe { &*(b.as_ref().behavior_ptr() as *const Hits) };
        assert_eq!(hits.0.get(), 3);

        let copy = b.clone().resize::<S4>().ok().unwrap();
        copy.invoke();
        let copied = copy.downcast_value_ref::<Cell<u32>>().map(Cell::get);
        assert_eq!(copied, Some(4));
        assert_eq!(b.downcast_value_ref::<Cell<u32>>().map(Cell::get), Some(3));
    }

    #[test]
    fn test_debug() {
        let b: InlineCapBox<S4> = InlineCapBox::new(Circle { radius: 1.0 }, noop::<Circle>);
        let s = format!("{:?}", b);
        assert!(s.starts_with("InlineCapBox"));
        assert!(s.contains("Circle"));
        assert!(s.contains("capacity"));
    }
}
