//! Counter Example - state, effects and keyed lists on the noop host
//!
//! This example demonstrates:
//! - A function component with `use_state` and `use_effect`
//! - Updating state from outside the render
//! - The host operations each commit performs
//!
//! Run with: cargo run --example counter

use std::cell::RefCell;

use spark_reconciler::noop::{act, NoopHost};
use spark_reconciler::{create_root, Child, Element, Hooks, Props, RenderResult, SetState};

thread_local! {
    static SET_COUNT: RefCell<Option<SetState<i64>>> = const { RefCell::new(None) };
}

fn counter(hooks: &mut Hooks, props: &Props) -> RenderResult<Child> {
    let (count, set_count) = hooks.use_state(0_i64)?;
    SET_COUNT.with(|s| *s.borrow_mut() = Some(set_count));

    let label = props
        .get("label")
        .map(ToString::to_string)
        .unwrap_or_else(|| "count".to_string());

    hooks.use_effect(
        move || {
            println!("  effect: count is now {count}");
            Some(Box::new(move || println!("  cleanup: count was {count}")))
        },
        Some(vec![count.into()]),
    )?;

    let items = (0..count).map(|n| Element::host("li").key(n.to_string()).child(n));
    Ok(Element::host("div")
        .child(Element::host("h1").child(format!("{label}: {count}")))
        .child(Element::host("ul").children(items))
        .into())
}

fn main() {
    let _ = env_logger::builder().try_init();

    println!("=== spark-reconciler Counter Example ===\n");

    let host = NoopHost::new();
    let root = create_root(host.clone(), host.create_container());

    root.render(Element::component(counter).attr("label", "clicks"));
    act(&root);
    println!("mount: {}", host.to_markup());
    println!("  {} host operations\n", host.take_ops().len());

    for step in 1..=3 {
        SET_COUNT.with(|s| {
            if let Some(set_count) = &*s.borrow() {
                if let Err(error) = set_count.update(|n| n + 1) {
                    eprintln!("update failed: {error}");
                }
            }
        });
        act(&root);
        println!("step {step}: {}", host.to_markup());
        for op in host.take_ops() {
            println!("  {op:?}");
        }
        println!();
    }

    root.unmount();
    act(&root);
    println!("unmounted: {:?}", host.to_markup());
}
