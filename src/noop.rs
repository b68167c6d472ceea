//! Noop host - an in-memory host tree for tests, demos and debugging.
//!
//! Nodes live in a flat table and are addressed by [`NoopInstance`]. Every
//! mutation the reconciler performs is appended to an operation log
//! ([`HostOp`]) so tests can assert on exactly what was done. Microtasks are
//! queued and only run when [`NoopHost::flush_microtasks`] is called.
//!
//! # Example
//!
//! ```ignore
//! let host = NoopHost::new();
//! let root = create_root(host.clone(), host.create_container());
//!
//! root.render(Element::host("p").child("hi"));
//! act(&root);
//!
//! assert_eq!(host.to_markup(), "<p>hi</p>");
//! ```

use std::cell::RefCell;
use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use std::rc::Rc;

use crate::element::{PropChange, Props, Value};
use crate::host::{HostConfig, Microtask};
use crate::reconciler::Root;

/// Handle to a node of the noop host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NoopInstance(usize);

impl fmt::Display for NoopInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One recorded host operation.
#[derive(Debug, Clone, PartialEq)]
pub enum HostOp {
    CreateInstance { id: NoopInstance, ty: String },
    CreateText { id: NoopInstance, text: String },
    AppendInitialChild { parent: NoopInstance, child: NoopInstance },
    AppendChild { parent: NoopInstance, child: NoopInstance },
    InsertBefore { parent: NoopInstance, child: NoopInstance, before: NoopInstance },
    RemoveChild { parent: NoopInstance, child: NoopInstance },
    CommitUpdate { id: NoopInstance, changes: Vec<PropChange> },
    CommitTextUpdate { id: NoopInstance, old: String, new: String },
}

impl HostOp {
    /// True for operations that change a live tree after creation.
    pub fn is_mutation(&self) -> bool {
        !matches!(
            self,
            Self::CreateInstance { .. } | Self::CreateText { .. } | Self::AppendInitialChild { .. }
        )
    }
}

#[derive(Debug)]
enum NodeKind {
    Container,
    Element {
        ty: Rc<str>,
        attributes: BTreeMap<Rc<str>, Value>,
    },
    Text(String),
}

#[derive(Debug)]
struct Node {
    kind: NodeKind,
    parent: Option<NoopInstance>,
    children: Vec<NoopInstance>,
}

#[derive(Default)]
struct NoopState {
    nodes: Vec<Node>,
    containers: Vec<NoopInstance>,
    ops: Vec<HostOp>,
    microtasks: VecDeque<Microtask>,
}

impl NoopState {
    fn add(&mut self, kind: NodeKind) -> NoopInstance {
        let id = NoopInstance(self.nodes.len());
        self.nodes.push(Node {
            kind,
            parent: None,
            children: Vec::new(),
        });
        id
    }

    fn detach(&mut self, child: NoopInstance) {
        if let Some(parent) = self.nodes[child.0].parent.take() {
            self.nodes[parent.0].children.retain(|&c| c != child);
        }
    }

    fn append(&mut self, parent: NoopInstance, child: NoopInstance) {
        self.detach(child);
        self.nodes[parent.0].children.push(child);
        self.nodes[child.0].parent = Some(parent);
    }

    fn insert_before(&mut self, parent: NoopInstance, child: NoopInstance, before: NoopInstance) {
        self.detach(child);
        let children = &mut self.nodes[parent.0].children;
        match children.iter().position(|&c| c == before) {
            Some(index) => children.insert(index, child),
            None => {
                log::warn!("{before} is not a child of {parent}; appending {child}");
                children.push(child);
            }
        }
        self.nodes[child.0].parent = Some(parent);
    }

    fn write_markup(&self, id: NoopInstance, out: &mut String) {
        let node = &self.nodes[id.0];
        match &node.kind {
            NodeKind::Container => {
                for &child in &node.children {
                    self.write_markup(child, out);
                }
            }
            NodeKind::Text(text) => out.push_str(text),
            NodeKind::Element { ty, attributes } => {
                out.push('<');
                out.push_str(ty);
                for (name, value) in attributes {
                    out.push_str(&format!(" {name}=\"{value}\""));
                }
                out.push('>');
                for &child in &node.children {
                    self.write_markup(child, out);
                }
                out.push_str(&format!("</{ty}>"));
            }
        }
    }
}

/// In-memory host. Clones share the same tree.
#[derive(Clone, Default)]
pub struct NoopHost {
    state: Rc<RefCell<NoopState>>,
}

impl NoopHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty container to render into.
    pub fn create_container(&self) -> NoopInstance {
        let mut state = self.state.borrow_mut();
        let id = state.add(NodeKind::Container);
        state.containers.push(id);
        id
    }

    // =========================================================================
    // Operation log
    // =========================================================================

    pub fn ops(&self) -> Vec<HostOp> {
        self.state.borrow().ops.clone()
    }

    /// Return and clear the operation log.
    pub fn take_ops(&self) -> Vec<HostOp> {
        std::mem::take(&mut self.state.borrow_mut().ops)
    }

    fn record(&self, op: HostOp) {
        log::trace!("noop host: {op:?}");
        self.state.borrow_mut().ops.push(op);
    }

    // =========================================================================
    // Microtasks
    // =========================================================================

    pub fn pending_microtasks(&self) -> usize {
        self.state.borrow().microtasks.len()
    }

    /// Run queued microtasks, including ones queued while running.
    /// Returns how many ran.
    pub fn flush_microtasks(&self) -> usize {
        let mut ran = 0;
        loop {
            let next = self.state.borrow_mut().microtasks.pop_front();
            let Some(task) = next else {
                return ran;
            };
            task();
            ran += 1;
        }
    }

    // =========================================================================
    // Inspection
    // =========================================================================

    pub fn children(&self, id: NoopInstance) -> Vec<NoopInstance> {
        self.state.borrow().nodes[id.0].children.clone()
    }

    pub fn parent(&self, id: NoopInstance) -> Option<NoopInstance> {
        self.state.borrow().nodes[id.0].parent
    }

    /// Tag of an element node.
    pub fn tag(&self, id: NoopInstance) -> Option<String> {
        match &self.state.borrow().nodes[id.0].kind {
            NodeKind::Element { ty, .. } => Some(ty.to_string()),
            _ => None,
        }
    }

    /// Content of a text node.
    pub fn text(&self, id: NoopInstance) -> Option<String> {
        match &self.state.borrow().nodes[id.0].kind {
            NodeKind::Text(text) => Some(text.clone()),
            _ => None,
        }
    }

    pub fn attribute(&self, id: NoopInstance, name: &str) -> Option<Value> {
        match &self.state.borrow().nodes[id.0].kind {
            NodeKind::Element { attributes, .. } => attributes.get(name).cloned(),
            _ => None,
        }
    }

    /// Serialize the subtree under `id`.
    pub fn markup(&self, id: NoopInstance) -> String {
        let mut out = String::new();
        self.state.borrow().write_markup(id, &mut out);
        out
    }

    /// Serialize every container, in creation order.
    pub fn to_markup(&self) -> String {
        let state = self.state.borrow();
        let mut out = String::new();
        for &container in &state.containers {
            state.write_markup(container, &mut out);
        }
        out
    }
}

impl fmt::Debug for NoopHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("NoopHost")
            .field("nodes", &state.nodes.len())
            .field("ops", &state.ops.len())
            .field("microtasks", &state.microtasks.len())
            .finish()
    }
}

impl HostConfig for NoopHost {
    type Instance = NoopInstance;

    fn create_instance(&self, ty: &str, props: &Props) -> NoopInstance {
        let attributes = props
            .attributes()
            .map(|(name, value)| (Rc::from(name), value.clone()))
            .collect();
        let id = self.state.borrow_mut().add(NodeKind::Element {
            ty: ty.into(),
            attributes,
        });
        self.record(HostOp::CreateInstance {
            id,
            ty: ty.to_string(),
        });
        id
    }

    fn create_text_instance(&self, content: &str) -> NoopInstance {
        let id = self.state.borrow_mut().add(NodeKind::Text(content.to_string()));
        self.record(HostOp::CreateText {
            id,
            text: content.to_string(),
        });
        id
    }

    fn append_initial_child(&self, parent: &NoopInstance, child: &NoopInstance) {
        self.state.borrow_mut().append(*parent, *child);
        self.record(HostOp::AppendInitialChild {
            parent: *parent,
            child: *child,
        });
    }

    fn append_child_to_container(&self, container: &NoopInstance, child: &NoopInstance) {
        self.state.borrow_mut().append(*container, *child);
        self.record(HostOp::AppendChild {
            parent: *container,
            child: *child,
        });
    }

    fn insert_child_to_container(
        &self,
        container: &NoopInstance,
        child: &NoopInstance,
        before: &NoopInstance,
    ) {
        self.state
            .borrow_mut()
            .insert_before(*container, *child, *before);
        self.record(HostOp::InsertBefore {
            parent: *container,
            child: *child,
            before: *before,
        });
    }

    fn remove_child(&self, child: &NoopInstance, container: &NoopInstance) {
        {
            let mut state = self.state.borrow_mut();
            if state.nodes[child.0].parent != Some(*container) {
                log::warn!("{child} is not a child of {container}");
            }
            state.detach(*child);
        }
        self.record(HostOp::RemoveChild {
            parent: *container,
            child: *child,
        });
    }

    fn commit_update(&self, instance: &NoopInstance, _ty: &str, payload: &[PropChange], _new_props: &Props) {
        {
            let mut state = self.state.borrow_mut();
            if let NodeKind::Element { attributes, .. } = &mut state.nodes[instance.0].kind {
                for change in payload {
                    match &change.value {
                        Some(value) => {
                            attributes.insert(change.name.clone(), value.clone());
                        }
                        None => {
                            attributes.remove(&change.name);
                        }
                    }
                }
            }
        }
        self.record(HostOp::CommitUpdate {
            id: *instance,
            changes: payload.to_vec(),
        });
    }

    fn commit_text_update(&self, instance: &NoopInstance, old: &str, new: &str) {
        if let NodeKind::Text(text) = &mut self.state.borrow_mut().nodes[instance.0].kind {
            *text = new.to_string();
        }
        self.record(HostOp::CommitTextUpdate {
            id: *instance,
            old: old.to_string(),
            new: new.to_string(),
        });
    }

    fn schedule_microtask(&self, task: Microtask) {
        self.state.borrow_mut().microtasks.push_back(task);
    }
}

/// Drain microtasks and scheduler work until the root is idle.
pub fn act(root: &Root<NoopHost>) {
    loop {
        let microtasks = root.host().flush_microtasks();
        let tasks = root.scheduler().flush_all();
        if microtasks == 0 && !tasks {
            break;
        }
    }
}
