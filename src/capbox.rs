use core::alloc::Layout;
use core::any::TypeId;
use core::fmt;
use core::mem::{self, ManuallyDrop};
use core::ptr::NonNull;

use crate::error::CapacityError;
use crate::inlinebox::InlineCapBox;
use crate::model::{Behavior, Model};
use crate::util::Erased;
use crate::vtable::{self, Vtable};
use crate::CapRef;

/// A value and its behavior, erased and owned on the heap.
///
/// `CapBox` has value semantics: cloning it clones the stored value and behavior into a
/// fresh allocation, and assigning a clone over it goes through copy-and-swap
/// ([`Clone::clone_from`]). Moving a `CapBox` moves ownership of the allocation; the
/// moved-from binding can no longer be used.
///
/// # Example
///
/// ```
/// use std::cell::RefCell;
/// use std::rc::Rc;
/// use capbox::CapBox;
///
/// #[derive(Clone)]
/// struct Circle {
///     radius: f64,
/// }
///
/// let drawn = Rc::new(RefCell::new(Vec::new()));
/// let log = drawn.clone();
/// let shape = CapBox::new(Circle { radius: 3.14 }, move |c: &Circle| {
///     log.borrow_mut().push(c.radius)
/// });
///
/// let copy = shape.clone();
/// shape.invoke();
/// copy.invoke();
/// assert_eq!(*drawn.borrow(), [3.14, 3.14]);
/// ```
pub struct CapBox {
    /// Always a live `Model<V, B>` allocated by a `Box`, for the `V` and `B` of `vtable`.
    model: NonNull<Erased>,
    vtable: &'static Vtable,
}

impl CapBox {
    /// Boxes `value` together with `behavior` on the heap.
    pub fn new<V, B>(value: V, behavior: B) -> CapBox
    where
        V: Clone + 'static,
        B: Behavior<V> + 'static,
    {
        CapBox {
            model: vtable::boxed(Model::new(value, behavior)),
            vtable: Vtable::new::<V, B>(),
        }
    }

    /// Applies the stored behavior to the stored value.
    pub fn invoke(&self) {
        let (value, behavior) = self.parts();
        // SAFETY: the parts belong to the live model of `self.vtable`.
        unsafe { self.vtable.invoke(value, behavior) }
    }

    /// Borrows the stored value and behavior as a [`CapRef`].
    ///
    /// The reference points at the value and behavior inside the allocation, not at this
    /// `CapBox`.
    #[allow(clippy::should_implement_trait)]
    pub fn as_ref(&self) -> CapRef<'_> {
        CapRef::from(self)
    }

    /// Moves the model into an [`InlineCapBox`], releasing the heap allocation.
    ///
    /// Fails, handing `self` back, if the model does not fit `Space`.
    ///
    /// # Example
    ///
    /// ```
    /// use capbox::CapBox;
    /// use capbox::space::{S1, S4};
    ///
    /// let b = CapBox::new([1u16, 2], |_: &[u16; 2]| {});
    /// let inline = b.try_into_inline::<S4>().ok().unwrap();
    ///
    /// let b = CapBox::new([1u64; 3], |_: &[u64; 3]| {});
    /// let b = b.try_into_inline::<S1>().unwrap_err().into_inner();
    /// b.invoke();
    /// # drop(inline);
    /// ```
    pub fn try_into_inline<Space>(self) -> Result<InlineCapBox<Space>, CapacityError<CapBox>> {
        InlineCapBox::try_from(self)
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
    ///
    /// Clones made before the mutation are not affected by it.
    pub fn downcast_value_mut<V: 'static>(&mut self) -> Option<&mut V> {
        if self.is::<V>() {
            let (value, _) = self.parts();
            // SAFETY: the type was checked above, and `self` owns the allocation uniquely.
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

    /// Returns the layout of the heap allocation.
    pub fn model_layout(&self) -> Layout {
        self.vtable.layout()
    }

    pub(crate) fn vtable(&self) -> &'static Vtable {
        self.vtable
    }

    /// Pointers to the stored value and behavior.
    pub(crate) fn parts(&self) -> (NonNull<Erased>, NonNull<Erased>) {
        // SAFETY: `self.model` is a live model of `self.vtable`.
        unsafe { self.vtable.parts(self.model) }
    }

    /// Adopts a heap model.
    ///
    /// # Safety
    ///
    /// `model` must be a live model allocated by `vtable`'s boxed operations, and ownership
    /// of it is transferred to the result.
    pub(crate) unsafe fn from_raw(model: NonNull<Erased>, vtable: &'static Vtable) -> CapBox {
        CapBox { model, vtable }
    }

    /// Gives up ownership of the heap model without dropping it.
    pub(crate) fn into_raw(self) -> NonNull<Erased> {
        ManuallyDrop::new(self).model
    }
}

impl Clone for CapBox {
    fn clone(&self) -> Self {
        let (value, behavior) = self.parts();
        // SAFETY: the parts belong to the live model of `self.vtable`.
        let model = unsafe { self.vtable.clone_boxed(value, behavior) };
        CapBox {
            model,
            vtable: self.vtable,
        }
    }

    /// Copy-and-swap: `self` is left untouched if cloning `source` panics.
    fn clone_from(&mut self, source: &Self) {
        let mut copy = source.clone();
        mem::swap(self, &mut copy);
    }
}

impl Drop for CapBox {
    fn drop(&mut self) {
        // SAFETY: the model is live, owned by `self` and never used again.
        unsafe { self.vtable.drop_boxed(self.model) }
    }
}

impl fmt::Debug for CapBox {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("CapBox")
            .field("value", &self.value_type_name())
            .field("behavior", &self.behavior_type_name())
            .finish()
    }
}

impl fmt::Pointer for CapBox {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Pointer::fmt(&self.model.as_ptr(), f)
    }
}
