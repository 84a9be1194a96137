//! Predefined inline spaces.
//!
//! A space type describes the inline storage of an [`InlineCapBox`]: its size is the
//! capacity and its alignment is the maximum alignment of a stored model. The predefined
//! spaces are pointer-aligned and hold `N` machine words.
//!
//! Any type can be used as a space, for example a custom over-aligned buffer:
//!
//! ```
//! use capbox::InlineCapBox;
//!
//! #[repr(align(16))]
//! struct Wide([u8; 64]);
//!
//! let b: InlineCapBox<Wide> = InlineCapBox::new(7u128, |_: &u128| {});
//! assert_eq!(b.capacity(), 64);
//! assert_eq!(b.alignment(), 16);
//! ```
//!
//! The space value itself is never constructed or dropped.
//!
//! [`InlineCapBox`]: crate::InlineCapBox

/// Represents `1 * usize` of inline space.
pub type S1 = [usize; 1];
/// Represents `2 * usize` of inline space.
pub type S2 = [usize; 2];
/// Represents `4 * usize` of inline space.
pub type S4 = [usize; 4];
/// Represents `8 * usize` of inline space.
pub type S8 = [usize; 8];
/// Represents `16 * usize` of inline space.
pub type S16 = [usize; 16];
/// Represents `32 * usize` of inline space.
pub type S32 = [usize; 32];
/// Represents `64 * usize` of inline space.
pub type S64 = [usize; 64];
