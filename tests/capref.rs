extern crate capbox;

use std::cell::Cell;
use std::rc::Rc;

use capbox::space::*;
use capbox::{CapBox, CapRef, InlineCapBox};

#[derive(Debug, Clone, PartialEq)]
struct Circle {
    radius: f64,
}

fn counter(hits: &Rc<Cell<u32>>) -> impl Fn(&Circle) + Clone + 'static {
    let hits = hits.clone();
    move |_: &Circle| hits.set(hits.get() + 1)
}

fn value_addr<V: 'static>(b: &CapBox) -> *const () {
    b.downcast_value_ref::<V>().unwrap() as *const V as *const ()
}

#[test]
fn reference_to_box_has_single_indirection() {
    let hits = Rc::new(Cell::new(0));
    let b = CapBox::new(Circle { radius: 3.14 }, counter(&hits));

    let r = CapRef::from(&b);
    assert_eq!(r.value_ptr(), value_addr::<Circle>(&b));
    assert_ne!(r.value_ptr(), &b as *const CapBox as *const ());

    r.invoke();
    b.invoke();
    assert_eq!(hits.get(), 2);
}

#[test]
fn copied_reference_has_same_addresses() {
    let b = CapBox::new(Circle { radius: 1.0 }, |_: &Circle| {});
    let r = b.as_ref();
    let r2 = r;

    assert_eq!(r2.value_ptr(), r.value_ptr());
    assert_eq!(r2.behavior_ptr(), r.behavior_ptr());
    assert_ne!(r2.value_ptr(), &r as *const CapRef<'_> as *const ());
}

#[test]
fn round_trip_outlives_original() {
    let hits = Rc::new(Cell::new(0));
    let b = CapBox::new(Circle { radius: 2.0 }, counter(&hits));

    let copy = CapBox::from(CapRef::from(&b));
    assert_ne!(value_addr::<Circle>(&copy), value_addr::<Circle>(&b));
    drop(b);

    copy.invoke();
    assert_eq!(hits.get(), 1);
    assert_eq!(copy.downcast_value_ref::<Circle>().unwrap().radius, 2.0);
}

#[test]
fn repeated_conversions_never_nest() {
    let hits = Rc::new(Cell::new(0));
    let mut current = CapBox::new(Circle { radius: 1.0 }, counter(&hits));

    for _ in 0..8 {
        let r = CapRef::from(&current);
        assert!(r.is::<Circle>());
        assert_eq!(r.value_ptr(), value_addr::<Circle>(&current));
        current = r.to_box();
    }

    assert!(current.is::<Circle>());
    let r = CapRef::from(&current);
    assert_eq!(r.model_layout(), current.model_layout());
    current.invoke();
    assert_eq!(hits.get(), 1);
}

#[test]
fn reference_to_inline_box() {
    let hits = Rc::new(Cell::new(0));
    let inline: InlineCapBox<S2> = InlineCapBox::new(Circle { radius: 1.0 }, counter(&hits));

    let r = CapRef::from(&inline);
    assert_eq!(
        r.value_ptr(),
        inline.downcast_value_ref::<Circle>().unwrap() as *const Circle as *const ()
    );
    r.invoke();

    let heap = r.to_box();
    let back: InlineCapBox<S2> = InlineCapBox::try_from(CapRef::from(&heap)).ok().unwrap();
    drop(inline);
    drop(heap);
    back.invoke();
    assert_eq!(hits.get(), 2);
}

#[test]
fn reference_to_borrowed_parts() {
    let hits = Rc::new(Cell::new(0));
    let circle = Circle { radius: 5.0 };
    let draw = counter(&hits);

    fn use_ref(r: CapRef<'_>) {
        r.invoke();
    }

    use_ref(CapRef::new(&circle, &draw));
    use_ref(CapRef::new(&circle, &draw));
    assert_eq!(hits.get(), 2);
    assert_eq!(Rc::strong_count(&hits), 2);
}

#[test]
fn to_inline_rejects_without_copying() {
    #[derive(Clone)]
    struct Big([u64; 16]);

    let copies = Rc::new(Cell::new(0));
    let tracked = {
        let copies = copies.clone();
        move |_: &Big| copies.set(copies.get() + 1)
    };
    let big = Big([0; 16]);
    let r = CapRef::new(&big, &tracked);

    let err = InlineCapBox::<S4>::try_from(r).unwrap_err();
    assert_eq!(err.required().size(), r.model_layout().size());
    assert!(err.to_string().contains("does not fit"));
    assert_eq!(Rc::strong_count(&copies), 2);
}

#[test]
fn reference_allows_interior_mutation() {
    let count = Cell::new(0u32);
    let bump = |c: &Cell<u32>| c.set(c.get() + 1);

    let r = CapRef::new(&count, &bump);
    r.invoke();
    r.invoke();
    assert_eq!(count.get(), 2);

    let owned = r.to_box();
    owned.invoke();
    assert_eq!(count.get(), 2);
    let copied = owned.downcast_value_ref::<Cell<u32>>().map(Cell::get);
    assert_eq!(copied, Some(3));
}
