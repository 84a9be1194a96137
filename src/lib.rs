//! # CapBox: Type-Erased Value + Behavior Handles
//!
//! A capability box pairs a value with a behavior (anything that can be applied to that
//! value) and erases both concrete types behind one uniform handle. Handles over
//! completely different pairs have the same type, can be stored side by side, copied,
//! moved and invoked, and the caller never names the concrete types again.
//!
//! Three storage strategies share one function table per `(value, behavior)` pair:
//!
//! | Handle           | Storage                                  | Owns? | Allocates?    |
//! |------------------|------------------------------------------|-------|---------------|
//! | [`CapBox`]       | one heap allocation                      | yes   | on every copy |
//! | [`InlineCapBox`] | fixed-size buffer inside the handle      | yes   | never         |
//! | [`CapRef`]       | two addresses of objects owned elsewhere | no    | never         |
//!
//! ## Quick Start
//!
//! ```rust
//! use std::cell::RefCell;
//! use std::rc::Rc;
//! use capbox::{CapBox, CapRef, InlineCapBox};
//! use capbox::space::S4;
//!
//! #[derive(Clone)]
//! struct Circle {
//!     radius: f64,
//! }
//!
//! #[derive(Clone)]
//! struct Square {
//!     side: f64,
//! }
//!
//! let drawn = Rc::new(RefCell::new(Vec::new()));
//! let log = drawn.clone();
//! let draw_circle = move |c: &Circle| log.borrow_mut().push(format!("circle {}", c.radius));
//! let log = drawn.clone();
//! let draw_square = move |s: &Square| log.borrow_mut().push(format!("square {}", s.side));
//!
//! // Different concrete pairs, one handle type
//! let shapes = vec![
//!     CapBox::new(Circle { radius: 3.14 }, draw_circle.clone()),
//!     CapBox::new(Square { side: 2.0 }, draw_square),
//! ];
//! for shape in &shapes {
//!     shape.invoke();
//! }
//!
//! // Same thing without touching the heap
//! let inline: InlineCapBox<S4> = InlineCapBox::new(Circle { radius: 1.0 }, draw_circle);
//! inline.invoke();
//!
//! // Borrow without copying, then materialize an owned copy
//! let r = CapRef::from(&shapes[1]);
//! let owned: CapBox = r.to_box();
//! drop(shapes);
//! owned.invoke();
//!
//! assert_eq!(
//!     *drawn.borrow(),
//!     ["circle 3.14", "square 2", "circle 1", "square 2"]
//! );
//! ```
//!
//! ## Values and Behaviors
//!
//! A value is any `Clone + 'static` type. A behavior is any `Clone + 'static` type
//! implementing [`Behavior<V>`]; every `Fn(&V) + Clone` closure or function already does.
//! Both are cloned when a handle is deep-copied, and the behavior only ever gets shared
//! access to the value.
//!
//! ## Inline Capacity
//!
//! [`InlineCapBox<Space>`] stores the pair in a buffer with the size and alignment of
//! `Space` (see [`space`] for predefined ones, the default [`space::S4`] is four machine
//! words). [`InlineCapBox::new`] checks the fit at compile time, while
//! [`InlineCapBox::try_new`] and the conversions check it at runtime and return a
//! [`CapacityError`] that hands the input back.
//!
//! ```rust
//! use capbox::InlineCapBox;
//! use capbox::space::{S1, S8};
//!
//! assert!(InlineCapBox::<S1>::try_new([0u8; 64], |_: &[u8; 64]| {}).is_err());
//! assert!(InlineCapBox::<S8>::try_new([0u8; 64], |_: &[u8; 64]| {}).is_ok());
//! ```
//!
//! ## References and Conversions
//!
//! A [`CapRef`] built from an owning box points at the value and behavior stored inside
//! it, never at the box, and copying a `CapRef` copies those two addresses. Converting a
//! `CapRef` back into an owning box always deep-copies. Chains of conversions therefore
//! never add indirection:
//!
//! ```rust
//! use capbox::{CapBox, CapRef};
//!
//! let original = CapBox::new(5u32, |n: &u32| assert_eq!(*n, 5));
//! let r1 = CapRef::from(&original);
//! let copy = CapBox::from(r1);
//! let r2 = CapRef::from(&copy);
//!
//! assert_eq!(r1.value_ptr(), original.downcast_value_ref::<u32>().unwrap() as *const u32 as *const ());
//! assert!(!CapRef::ptr_eq(&r1, &r2));
//! assert_eq!(r2.value_type_name(), "u32");
//! ```
//!
//! The lifetime on `CapRef` keeps the referenced objects alive for as long as the
//! reference is used.
//!
//! ## Feature Flags
//!
//! - **`std`** (enabled by default)
//!   - Links to the standard library and implements `std::error::Error` for
//!     [`CapacityError`]
//!   - Disable for `#![no_std]` environments: `default-features = false` (`alloc` is still
//!     required for [`CapBox`])
//!
//! ## Threads
//!
//! Handles are neither `Send` nor `Sync`, whatever they store.

#![cfg_attr(not(feature = "std"), no_std)]
#![deny(missing_docs)]
#![cfg_attr(not(test), deny(clippy::as_conversions))]
#![deny(unsafe_op_in_unsafe_fn)]

extern crate alloc;

mod capbox;
mod capref;
mod error;
mod inlinebox;
mod model;
pub mod space;
mod util;
mod vtable;

pub use crate::capbox::CapBox;
pub use crate::capref::CapRef;
pub use crate::error::CapacityError;
pub use crate::inlinebox::InlineCapBox;
pub use crate::model::Behavior;
