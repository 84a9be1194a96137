use capbox::space::*;
use capbox::{CapBox, CapRef, InlineCapBox};
use divan;

fn main() {
    divan::main();
}

#[derive(Clone)]
struct Circle {
    radius: f64,
}

fn area(circle: &Circle) {
    divan::black_box(3.14 * circle.radius * circle.radius);
}

#[divan::bench]
fn capbox_new() {
    divan::black_box({
        let b = CapBox::new(divan::black_box(Circle { radius: 3.14 }), area);
        b
    });
}

#[divan::bench]
fn inline_new_small_space() {
    divan::black_box({
        let circle = divan::black_box(Circle { radius: 3.14 });
        let b: InlineCapBox<S1> = InlineCapBox::new(circle, area);
        b
    });
}

#[divan::bench]
fn inline_new_large_space() {
    divan::black_box({
        let circle = divan::black_box(Circle { radius: 3.14 });
        let b: InlineCapBox<S64> = InlineCapBox::new(circle, area);
        b
    });
}

#[divan::bench]
fn box_dyn_fn_new() {
    divan::black_box({
        let circle = divan::black_box(Circle { radius: 3.14 });
        let b: Box<dyn Fn()> = Box::new(move || area(&circle));
        b
    });
}

#[divan::bench]
fn capbox_clone(bencher: divan::Bencher) {
    let b = CapBox::new(Circle { radius: 3.14 }, area);
    bencher.bench_local(|| divan::black_box(&b).clone());
}

#[divan::bench]
fn inline_clone(bencher: divan::Bencher) {
    let b: InlineCapBox<S4> = InlineCapBox::new(Circle { radius: 3.14 }, area);
    bencher.bench_local(|| divan::black_box(&b).clone());
}

#[divan::bench]
fn capref_to_box(bencher: divan::Bencher) {
    let circle = Circle { radius: 3.14 };
    let draw = area;
    bencher.bench_local(|| CapRef::new(divan::black_box(&circle), &draw).to_box());
}

#[divan::bench]
fn capbox_invoke(bencher: divan::Bencher) {
    let b = CapBox::new(Circle { radius: 3.14 }, area);
    bencher.bench_local(|| divan::black_box(&b).invoke());
}

#[divan::bench]
fn inline_invoke(bencher: divan::Bencher) {
    let b: InlineCapBox<S4> = InlineCapBox::new(Circle { radius: 3.14 }, area);
    bencher.bench_local(|| divan::black_box(&b).invoke());
}

#[divan::bench]
fn capref_invoke(bencher: divan::Bencher) {
    let b = CapBox::new(Circle { radius: 3.14 }, area);
    let r = b.as_ref();
    bencher.bench_local(|| divan::black_box(r).invoke());
}

#[divan::bench]
fn box_dyn_fn_invoke(bencher: divan::Bencher) {
    let circle = Circle { radius: 3.14 };
    let b: Box<dyn Fn()> = Box::new(move || area(&circle));
    bencher.bench_local(|| divan::black_box(&b)());
}
