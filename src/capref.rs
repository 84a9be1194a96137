use core::alloc::Layout;
use core::any::TypeId;
use core::fmt;
use core::marker::PhantomData;
use core::ptr::NonNull;

use crate::capbox::CapBox;
use crate::error::CapacityError;
use crate::inlinebox::InlineCapBox;
use crate::model::Behavior;
use crate::util::{fits_in, Erased};
use crate::vtable::Vtable;

/// A borrowed value and behavior, erased.
///
/// `CapRef` holds two addresses, one for the value and one for the behavior, plus the
/// function table that knows their types. It never owns, copies or drops what it points
/// at, and it is `Copy`: a copy holds the very same two addresses.
///
/// Built from a [`CapBox`] or an [`InlineCapBox`], it points at the value and behavior
/// *inside* the box, not at the box itself, so invoking through it costs the same single
/// indirection as invoking through the box. Going the other way,
/// [`to_box`](CapRef::to_box) and [`to_inline`](CapRef::to_inline) deep-copy the referenced
/// pair into a new, independently owned box.
///
/// The lifetime `'a` ties a `CapRef` to the objects it references, so it cannot outlive
/// them:
///
/// ```compile_fail
/// use capbox::{CapBox, CapRef};
///
/// let r: CapRef<'_> = {
///     let b = CapBox::new(1u8, |_: &u8| {});
///     CapRef::from(&b)
/// };
/// r.invoke();
/// ```
///
/// # Example
///
/// ```
/// use std::cell::Cell;
/// use std::rc::Rc;
/// use capbox::{CapBox, CapRef};
///
/// #[derive(Clone)]
/// struct Circle {
///     radius: f64,
/// }
///
/// let count = Rc::new(Cell::new(0));
/// let counter = count.clone();
/// let draw = move |_: &Circle| counter.set(counter.get() + 1);
///
/// let circle = Circle { radius: 3.14 };
/// let r = CapRef::new(&circle, &draw);
/// r.invoke();
///
/// let owned: CapBox = r.to_box();
/// drop(circle);
/// owned.invoke();
/// assert_eq!(count.get(), 2);
/// ```
#[derive(Clone, Copy)]
pub struct CapRef<'a> {
    /// Points to a live `V` of `vtable` for `'a`.
    value: NonNull<Erased>,
    /// Points to a live `B` of `vtable` for `'a`.
    behavior: NonNull<Erased>,
    vtable: &'static Vtable,
    _marker: PhantomData<&'a Erased>,
}

impl<'a> CapRef<'a> {
    /// References `value` and `behavior` without copying them.
    pub fn new<V, B>(value: &'a V, behavior: &'a B) -> CapRef<'a>
    where
        V: Clone + 'static,
        B: Behavior<V> + 'static,
    {
        // SAFETY: both references are live for `'a` and match the vtable.
        unsafe {
            CapRef::from_parts(
                NonNull::from(value).cast::<Erased>(),
                NonNull::from(behavior).cast::<Erased>(),
                Vtable::new::<V, B>(),
            )
        }
    }

    /// # Safety
    ///
    /// `value` and `behavior` must point to a `V` and a `B` of `vtable` which stay alive
    /// and are neither mutably borrowed nor moved for `'a`.
    unsafe fn from_parts(
        value: NonNull<Erased>,
        behavior: NonNull<Erased>,
        vtable: &'static Vtable,
    ) -> CapRef<'a> {
        CapRef {
            value,
            behavior,
            vtable,
            _marker: PhantomData,
        }
    }

    /// Applies the referenced behavior to the referenced value.
    pub fn invoke(&self) {
        // SAFETY: both pointers are live for `'a` and match the vtable.
        unsafe { self.vtable.invoke(self.value, self.behavior) }
    }

    /// Deep-copies the referenced value and behavior onto the heap.
    ///
    /// The result owns its copies and does not depend on `self` or on what `self`
    /// references.
    pub fn to_box(&self) -> CapBox {
        // SAFETY: both pointers are live for `'a` and match the vtable, and the returned
        // model comes from the vtable's boxed operations.
        unsafe {
            let model = self.vtable.clone_boxed(self.value, self.behavior);
            CapBox::from_raw(model, self.vtable)
        }
    }

    /// Deep-copies the referenced value and behavior into an [`InlineCapBox`].
    ///
    /// Fails if they do not fit `Space`.
    ///
    /// # Example
    ///
    /// ```
    /// use capbox::CapRef;
    /// use capbox::space::{S1, S4};
    ///
    /// let values = [1u32, 2, 3];
    /// let sum = |v: &[u32; 3]| assert_eq!(v.iter().sum::<u32>(), 6);
    /// let r = CapRef::new(&values, &sum);
    ///
    /// assert!(r.to_inline::<S1>().is_err());
    /// r.to_inline::<S4>().unwrap().invoke();
    /// ```
    pub fn to_inline<Space>(&self) -> Result<InlineCapBox<Space>, CapacityError<CapRef<'a>>> {
        let layout = self.vtable.layout();
        if !fits_in::<Space>(layout) {
            return Err(CapacityError::new::<Space>(*self, layout));
        }

        // SAFETY: both pointers are live for `'a` and match the vtable, and the model fits.
        Ok(unsafe {
            InlineCapBox::init_with(self.vtable, |dst| {
                self.vtable.clone_into(self.value, self.behavior, dst)
            })
        })
    }

    /// Address of the referenced value.
    pub fn value_ptr(&self) -> *const () {
        self.value.as_ptr().cast_const().cast::<()>()
    }

    /// Address of the referenced behavior.
    pub fn behavior_ptr(&self) -> *const () {
        self.behavior.as_ptr().cast_const().cast::<()>()
    }

    /// Returns `true` if both references point at the same value and behavior.
    pub fn ptr_eq(this: &CapRef<'_>, other: &CapRef<'_>) -> bool {
        this.value == other.value && this.behavior == other.behavior
    }

    /// Returns `true` if the referenced value is a `V`.
    pub fn is<V: 'static>(&self) -> bool {
        self.vtable.value_type_id() == TypeId::of::<V>()
    }

    /// Returns the referenced value if it is a `V`.
    pub fn downcast_value_ref<V: 'static>(&self) -> Option<&'a V> {
        if self.is::<V>() {
            // SAFETY: the type was checked above, and the value lives for `'a`.
            Some(unsafe { self.value.cast::<V>().as_ref() })
        } else {
            None
        }
    }

    /// Returns the [`TypeId`] of the referenced value.
    pub fn value_type_id(&self) -> TypeId {
        self.vtable.value_type_id()
    }

    /// Returns the type name of the referenced value.
    pub fn value_type_name(&self) -> &'static str {
        self.vtable.value_type_name()
    }

    /// Returns the type name of the referenced behavior.
    pub fn behavior_type_name(&self) -> &'static str {
        self.vtable.behavior_type_name()
    }

    /// Returns the layout an owning box needs for a copy of the referenced pair.
    pub fn model_layout(&self) -> Layout {
        self.vtable.layout()
    }
}

impl<'a> From<&'a CapBox> for CapRef<'a> {
    fn from(boxed: &'a CapBox) -> CapRef<'a> {
        let (value, behavior) = boxed.parts();
        // SAFETY: the parts live as long as the borrow of `boxed`, which cannot be mutated
        // or dropped meanwhile.
        unsafe { CapRef::from_parts(value, behavior, boxed.vtable()) }
    }
}

impl<'a, Space> From<&'a InlineCapBox<Space>> for CapRef<'a> {
    fn from(inline: &'a InlineCapBox<Space>) -> CapRef<'a> {
        let (value, behavior) = inline.parts();
        // SAFETY: the parts live as long as the borrow of `inline`, which cannot be moved,
        // mutated or dropped meanwhile.
        unsafe { CapRef::from_parts(value, behavior, inline.vtable()) }
    }
}

impl From<CapRef<'_>> for CapBox {
    fn from(r: CapRef<'_>) -> CapBox {
        r.to_box()
    }
}

impl<'a, Space> TryFrom<CapRef<'a>> for InlineCapBox<Space> {
    type Error = CapacityError<CapRef<'a>>;

    fn try_from(r: CapRef<'a>) -> Result<Self, Self::Error> {
        r.to_inline()
    }
}

impl fmt::Debug for CapRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("CapRef")
            .field("value", &self.value_type_name())
            .field("value_ptr", &self.value_ptr())
            .field("behavior", &self.behavior_type_name())
            .finish()
    }
}
