use core::alloc::Layout;
use core::mem;

/// Placeholder for a value, behavior or model whose concrete type has been erased.
///
/// Pointers are only ever cast back to the concrete type through the [`Vtable`] that was
/// built for it.
///
/// [`Vtable`]: crate::vtable::Vtable
pub(crate) struct Erased;

/// Whether a model with `layout` can be placed into the storage of `Space`.
pub(crate) const fn fits_in<Space>(layout: Layout) -> bool {
    layout.size() <= mem::size_of::<Space>() && layout.align() <= mem::align_of::<Space>()
}
