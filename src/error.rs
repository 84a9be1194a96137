use core::alloc::Layout;
use core::fmt;

/// The model did not fit the inline space it was meant for.
///
/// Returned by every runtime-checked path into an [`InlineCapBox`]. The rejected input is
/// handed back untouched, nothing was constructed from it.
///
/// ```
/// use capbox::InlineCapBox;
/// use capbox::space::S1;
///
/// let err = InlineCapBox::<S1>::try_new([0u64; 4], |_: &[u64; 4]| {}).unwrap_err();
/// assert_eq!(err.required().size(), 32);
/// assert_eq!(err.available().size(), std::mem::size_of::<usize>());
///
/// let (value, _behavior) = err.into_inner();
/// assert_eq!(value, [0; 4]);
/// ```
///
/// [`InlineCapBox`]: crate::InlineCapBox
pub struct CapacityError<T> {
    inner: T,
    required: Layout,
    available: Layout,
}

impl<T> CapacityError<T> {
    pub(crate) fn new<Space>(inner: T, required: Layout) -> Self {
        CapacityError {
            inner,
            required,
            available: Layout::new::<Space>(),
        }
    }

    /// Layout of the model that was rejected.
    pub fn required(&self) -> Layout {
        self.required
    }

    /// Capacity and alignment of the inline space that rejected it.
    pub fn available(&self) -> Layout {
        self.available
    }

    /// Whether the model was rejected for its size (as opposed to only its alignment).
    pub fn is_too_large(&self) -> bool {
        self.required.size() > self.available.size()
    }

    /// Returns the rejected input.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Returns a reference to the rejected input.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }
}

// The input is rarely `Debug`, so only its type is named.
impl<T> fmt::Debug for CapacityError<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("CapacityError")
            .field("input", &core::any::type_name::<T>())
            .field("required", &self.required)
            .field("available", &self.available)
            .finish()
    }
}

impl<T> fmt::Display for CapacityError<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "model of {} bytes (align {}) does not fit inline space of {} bytes (align {})",
            self.required.size(),
            self.required.align(),
            self.available.size(),
            self.available.align(),
        )
    }
}

#[cfg(feature = "std")]
impl<T> std::error::Error for CapacityError<T> {}
