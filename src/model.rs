/// An operation that can be applied to a value of type `V`.
///
/// Behaviors are stored next to their value inside every handle and are cloned whenever
/// the handle is deep-copied. Any `Clone` closure taking `&V` is a behavior:
///
/// ```
/// use capbox::CapBox;
///
/// let b = CapBox::new(3.14f64, |r: &f64| assert!(*r > 3.0));
/// b.invoke();
/// ```
///
/// Named types work as well, which is handy when the behavior carries state:
///
/// ```
/// use std::cell::Cell;
/// use std::rc::Rc;
/// use capbox::{Behavior, CapBox};
///
/// #[derive(Clone)]
/// struct Count(Rc<Cell<u32>>);
///
/// impl Behavior<&'static str> for Count {
///     fn invoke(&self, _: &&'static str) {
///         self.0.set(self.0.get() + 1);
///     }
/// }
///
/// let hits = Rc::new(Cell::new(0));
/// let b = CapBox::new("square", Count(hits.clone()));
/// b.invoke();
/// b.clone().invoke();
/// assert_eq!(hits.get(), 2);
/// ```
pub trait Behavior<V>: Clone {
    /// Applies the behavior to `value`.
    fn invoke(&self, value: &V);
}

impl<V, F> Behavior<V> for F
where
    F: Fn(&V) + Clone,
{
    #[inline]
    fn invoke(&self, value: &V) {
        self(value)
    }
}

/// One value and the behavior it is paired with, owned together.
///
/// `#[repr(C)]` keeps `value` at offset zero, so an erased model pointer is also a pointer
/// to its value.
#[derive(Clone)]
#[repr(C)]
pub(crate) struct Model<V, B> {
    pub(crate) value: V,
    pub(crate) behavior: B,
}

impl<V, B: Behavior<V>> Model<V, B> {
    #[inline]
    pub(crate) fn new(value: V, behavior: B) -> Self {
        Model { value, behavior }
    }
}
