//! State and effect hooks driven through real renders.

mod common;

use std::cell::RefCell;

use spark_reconciler::noop::{act, HostOp};
use spark_reconciler::{
    text, with_update_lane, Child, Element, Hooks, Lanes, Props, ReconcileError, RenderResult,
    SetState, Value,
};

use common::{log, setup, take_log};

thread_local! {
    static SETTER: RefCell<Option<SetState<i32>>> = const { RefCell::new(None) };
}

fn setter() -> SetState<i32> {
    SETTER.with(|s| s.borrow().clone()).expect("counter has rendered")
}

fn counter(hooks: &mut Hooks, _props: &Props) -> RenderResult<Child> {
    let (count, set_count) = hooks.use_state(0)?;
    SETTER.with(|s| *s.borrow_mut() = Some(set_count));
    log(format!("render {count}"));
    Ok(Element::host("span").child(count).into())
}

fn name_of(props: &Props) -> String {
    props.get("name").map(ToString::to_string).unwrap_or_default()
}

/// Logs its effect lifecycle; the effect depends on the `v` prop.
fn tracked(hooks: &mut Hooks, props: &Props) -> RenderResult<Child> {
    let name = name_of(props);
    let v = props.get("v").cloned().unwrap_or(Value::Int(0));

    let label = format!("{name} {v}");
    hooks.use_effect(
        move || {
            log(format!("create {label}"));
            Some(Box::new(move || log(format!("destroy {label}"))))
        },
        Some(vec![v]),
    )?;
    Ok(Element::host("i").child(name).into())
}

// =============================================================================
// State
// =============================================================================

#[test]
fn test_state_update_rerenders() {
    let (host, root) = setup();

    root.render(Element::component(counter));
    act(&root);
    assert_eq!(host.to_markup(), "<span>0</span>");
    assert_eq!(take_log(), ["render 0"]);

    setter().set(5).unwrap();
    act(&root);
    assert_eq!(host.to_markup(), "<span>5</span>");
    assert_eq!(take_log(), ["render 5"]);
}

#[test]
fn test_updates_in_one_tick_batch_into_one_render() {
    let (host, root) = setup();

    root.render(Element::component(counter));
    act(&root);
    take_log();

    let set = setter();
    set.update(|n| n + 1).unwrap();
    set.update(|n| n + 1).unwrap();
    set.update(|n| n * 10).unwrap();
    assert_eq!(host.pending_microtasks(), 1);

    act(&root);
    assert_eq!(take_log(), ["render 20"]);
    assert_eq!(host.to_markup(), "<span>20</span>");
}

#[test]
fn test_setting_equal_value_still_rerenders() {
    let (host, root) = setup();

    root.render(Element::component(counter));
    act(&root);
    take_log();
    host.take_ops();

    setter().set(0).unwrap();
    act(&root);

    assert_eq!(take_log(), ["render 0"]);
    assert!(host.take_ops().is_empty());
}

#[test]
fn test_state_survives_parent_rerender() {
    let (host, root) = setup();
    let app = |label: &str| Element::host("div").attr("title", label).child(Element::component(counter));

    root.render(app("one"));
    act(&root);
    setter().set(3).unwrap();
    act(&root);

    root.render(app("two"));
    act(&root);
    assert_eq!(host.to_markup(), "<div title=\"two\"><span>3</span></div>");
}

#[test]
fn test_skipped_update_does_not_override_later_sync_update() {
    let (host, root) = setup();

    root.render(Element::component(counter));
    act(&root);
    take_log();

    let set = setter();
    with_update_lane(Lanes::DEFAULT, || set.update(|n| n + 100)).unwrap();
    set.set(5).unwrap();

    host.flush_microtasks();
    assert_eq!(host.to_markup(), "<span>5</span>");
    assert_eq!(root.pending_lanes(), Lanes::DEFAULT);

    // `+100` replays under the later `set(5)`.
    act(&root);
    assert_eq!(take_log(), ["render 5", "render 5"]);
    assert_eq!(host.to_markup(), "<span>5</span>");
    assert!(root.pending_lanes().is_empty());
}

#[test]
fn test_skipped_update_lands_in_dispatch_order() {
    let (host, root) = setup();

    root.render(Element::component(counter));
    act(&root);
    take_log();

    let set = setter();
    with_update_lane(Lanes::DEFAULT, || set.update(|n| n + 1)).unwrap();
    set.update(|n| n * 10).unwrap();

    host.flush_microtasks();
    assert_eq!(host.to_markup(), "<span>0</span>");

    act(&root);
    assert_eq!(host.to_markup(), "<span>10</span>");
}

#[test]
fn test_setter_after_unmount_fails() {
    let (_host, root) = setup();

    root.render(Element::component(counter));
    act(&root);
    let set = setter();

    root.unmount();
    act(&root);

    assert_eq!(set.set(1), Err(ReconcileError::Unmounted));
}

#[test]
fn test_setter_after_root_dropped_fails() {
    let (host, root) = setup();

    root.render(Element::component(counter));
    act(&root);
    let set = setter();
    drop(root);

    assert_eq!(set.set(1), Err(ReconcileError::Unmounted));
    assert_eq!(host.flush_microtasks(), 0);
}

// =============================================================================
// Component identity
// =============================================================================

/// A closure component; every call captures a different label.
fn labeled(label: &'static str) -> Element {
    Element::component(move |_: &mut Hooks, _: &Props| -> RenderResult<Child> {
        Ok(Element::host("b").child(label).into())
    })
}

#[test]
fn test_reused_component_renders_with_new_captures() {
    let (host, root) = setup();

    root.render(labeled("a"));
    act(&root);
    assert_eq!(host.to_markup(), "<b>a</b>");
    let b = host.children(*root.container())[0];
    let text = host.children(b)[0];
    host.take_ops();

    root.render(labeled("b"));
    act(&root);

    assert_eq!(host.to_markup(), "<b>b</b>");
    assert_eq!(host.children(*root.container()), vec![b]);
    assert_eq!(
        host.take_ops(),
        vec![HostOp::CommitTextUpdate {
            id: text,
            old: "a".into(),
            new: "b".into(),
        }]
    );
}

#[test]
fn test_reused_component_keeps_state_with_new_closure() {
    let (host, root) = setup();
    let with_suffix = |suffix: &'static str| {
        Element::component(move |hooks: &mut Hooks, _: &Props| -> RenderResult<Child> {
            let (n, set) = hooks.use_state(0)?;
            SETTER.with(|s| *s.borrow_mut() = Some(set));
            Ok(text(format!("{n}{suffix}")))
        })
    };

    root.render(with_suffix("!"));
    act(&root);
    setter().set(7).unwrap();
    act(&root);
    assert_eq!(host.to_markup(), "7!");

    root.render(with_suffix("?"));
    act(&root);
    assert_eq!(host.to_markup(), "7?");
}

// =============================================================================
// Effects
// =============================================================================

#[test]
fn test_effect_runs_after_commit() {
    let (host, root) = setup();

    root.render(Element::component(tracked).attr("name", "a"));
    root.flush_sync();
    assert_eq!(host.to_markup(), "<i>a</i>");
    assert!(take_log().is_empty());

    act(&root);
    assert_eq!(take_log(), ["create a 0"]);
}

#[test]
fn test_effect_skipped_when_deps_unchanged() {
    let (_host, root) = setup();
    let element = || Element::component(tracked).attr("name", "a").attr("v", 1);

    root.render(element());
    act(&root);
    take_log();

    root.render(element());
    act(&root);
    assert!(take_log().is_empty());

    root.render(element().attr("v", 2));
    act(&root);
    assert_eq!(take_log(), ["destroy a 1", "create a 2"]);
}

#[test]
fn test_effect_without_deps_runs_every_commit() {
    let (_host, root) = setup();

    fn always(hooks: &mut Hooks, _props: &Props) -> RenderResult<Child> {
        hooks.use_effect(
            || {
                log("create");
                Some(Box::new(|| log("destroy")))
            },
            None,
        )?;
        Ok(Child::Empty)
    }

    root.render(Element::component(always));
    act(&root);
    root.render(Element::component(always));
    act(&root);

    assert_eq!(take_log(), ["create", "destroy", "create"]);
}

#[test]
fn test_unmount_destroys_run_before_update_destroys_and_creates() {
    let (_host, root) = setup();
    let app = |items: &[(&str, i64)]| {
        Element::host("div").children(items.iter().map(|&(name, v)| {
            Element::component(tracked)
                .key(name)
                .attr("name", name)
                .attr("v", v)
        }))
    };

    root.render(app(&[("x", 1), ("y", 1)]));
    act(&root);
    assert_eq!(take_log(), ["create x 1", "create y 1"]);

    root.render(app(&[("y", 2)]));
    act(&root);
    assert_eq!(take_log(), ["destroy x 1", "destroy y 1", "create y 2"]);
}

#[test]
fn test_deleted_subtree_cleans_up_once_in_order() {
    let (host, root) = setup();
    let app = |show: bool| {
        let children: Child = if show {
            vec![
                Element::component(tracked).key("a").attr("name", "a"),
                Element::component(tracked).key("b").attr("name", "b"),
            ]
            .into()
        } else {
            Child::Empty
        };
        Element::host("section").child(Element::host("div").child(children))
    };

    root.render(app(true));
    act(&root);
    let div = host.children(host.children(*root.container())[0])[0];
    let items = host.children(div);
    take_log();
    host.take_ops();

    root.render(app(false));
    act(&root);

    assert_eq!(take_log(), ["destroy a 0", "destroy b 0"]);
    assert_eq!(
        host.take_ops(),
        vec![
            HostOp::RemoveChild {
                parent: div,
                child: items[0],
            },
            HostOp::RemoveChild {
                parent: div,
                child: items[1],
            },
        ]
    );

    root.unmount();
    act(&root);
    assert!(take_log().is_empty());
}

#[test]
fn test_effect_can_update_state() {
    let (host, root) = setup();

    fn loader(hooks: &mut Hooks, _props: &Props) -> RenderResult<Child> {
        let (value, set_value) = hooks.use_state(String::from("loading"))?;
        hooks.use_effect(
            move || {
                set_value.set("ready".into()).ok();
                None
            },
            Some(vec![]),
        )?;
        Ok(Element::host("p").child(value).into())
    }

    root.render(Element::component(loader));
    act(&root);

    assert_eq!(host.to_markup(), "<p>ready</p>");
}

// =============================================================================
// Errors
// =============================================================================

#[test]
fn test_component_error_keeps_committed_tree() {
    let (host, root) = setup();

    fn fallible(_hooks: &mut Hooks, props: &Props) -> RenderResult<Child> {
        if props.get("fail") == Some(&Value::Bool(true)) {
            return Err(ReconcileError::component("fallible", "asked to fail"));
        }
        Ok(Element::host("b").child("ok").into())
    }

    root.render(Element::component(fallible));
    act(&root);
    host.take_ops();

    root.render(Element::component(fallible).attr("fail", true));
    act(&root);

    assert_eq!(host.to_markup(), "<b>ok</b>");
    assert!(host.take_ops().is_empty());
    let errors = root.take_errors();
    assert_eq!(errors.len(), 1);
    assert!(matches!(&errors[0], ReconcileError::Component { component, .. } if component == "fallible"));
    assert!(root.pending_lanes().is_empty());

    root.render(Element::host("u").child("after"));
    act(&root);
    assert_eq!(host.to_markup(), "<u>after</u>");
    assert!(root.take_errors().is_empty());
}

#[test]
fn test_fewer_hooks_than_previous_render_is_an_error() {
    let (host, root) = setup();

    fn conditional(hooks: &mut Hooks, props: &Props) -> RenderResult<Child> {
        let (a, _) = hooks.use_state(1)?;
        if props.get("extra").is_none() {
            hooks.use_state(2)?;
        }
        Ok(Child::from(a))
    }

    root.render(Element::component(conditional));
    act(&root);
    assert_eq!(host.to_markup(), "1");

    root.render(Element::component(conditional).attr("extra", false));
    act(&root);

    assert_eq!(
        root.take_errors(),
        vec![ReconcileError::TooFewHooks {
            expected: 2,
            rendered: 1,
        }]
    );
    assert_eq!(host.to_markup(), "1");
}

#[test]
fn test_more_hooks_than_previous_render_is_an_error() {
    let (_host, root) = setup();

    fn growing(hooks: &mut Hooks, props: &Props) -> RenderResult<Child> {
        hooks.use_state(0)?;
        if props.get("grow").is_some() {
            hooks.use_effect(|| None, None)?;
        }
        Ok(Child::Empty)
    }

    root.render(Element::component(growing));
    act(&root);
    root.render(Element::component(growing).attr("grow", true));
    act(&root);

    let errors = root.take_errors();
    assert_eq!(errors, vec![ReconcileError::TooManyHooks { index: 1 }]);
    assert!(errors[0].is_usage_error());
}

#[test]
fn test_hook_kind_change_is_an_error() {
    let (_host, root) = setup();

    fn flipping(hooks: &mut Hooks, props: &Props) -> RenderResult<Child> {
        if props.get("flip").is_some() {
            hooks.use_effect(|| None, None)?;
        } else {
            hooks.use_state(0)?;
        }
        Ok(Child::Empty)
    }

    root.render(Element::component(flipping));
    act(&root);
    root.render(Element::component(flipping).attr("flip", true));
    act(&root);

    assert_eq!(
        root.take_errors(),
        vec![ReconcileError::HookMismatch {
            index: 0,
            expected: "use_effect",
        }]
    );
}
