#![forbid(unsafe_code)]

//! End-to-end behavior of the dismissable layer stack.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use scrim_dom::{Document, EventPayload, Key, Modifiers, NodeId, NodeSpec, PointerType};
use scrim_primitives::{LayerOptions, LayerRegistry};

fn press(doc: &Document, target: NodeId) {
    doc.dispatch(
        target,
        EventPayload::PointerDown {
            pointer_type: PointerType::Mouse,
        },
    );
}

fn escape(doc: &Document) {
    doc.dispatch(
        doc.body(),
        EventPayload::KeyDown {
            key: Key::Escape,
            modifiers: Modifiers::empty(),
        },
    );
}

#[test]
fn three_layer_interactivity_scenario() {
    let doc = Document::new();
    let registry = LayerRegistry::new(&doc);
    let node1 = doc.create_child(doc.body(), NodeSpec::new());
    let node2 = doc.create_child(doc.body(), NodeSpec::new());
    let node3 = doc.create_child(doc.body(), NodeSpec::new());

    let layer1 = registry.mount(node1, LayerOptions::new());
    let layer2 = registry.mount(node2, LayerOptions::new().disable_outside_pointer_events(true));
    let layer3 = registry.mount(node3, LayerOptions::new());

    assert!(!layer1.is_pointer_events_enabled());
    assert!(layer2.is_pointer_events_enabled());
    assert!(layer3.is_pointer_events_enabled());
    assert_eq!(doc.pointer_events(doc.body()), "none");

    drop(layer2);
    assert!(layer1.is_pointer_events_enabled());
    assert!(layer3.is_pointer_events_enabled());
    assert_eq!(doc.pointer_events(doc.body()), "");
}

#[test]
fn body_style_restored_byte_for_byte() {
    let doc = Document::new();
    // Deliberately odd author style, preserved exactly.
    doc.set_pointer_events(doc.body(), "  AuTo ;");
    let registry = LayerRegistry::new(&doc);
    let node = doc.create_child(doc.body(), NodeSpec::new());

    let layer = registry.mount(node, LayerOptions::new().disable_outside_pointer_events(true));
    assert_eq!(doc.pointer_events(doc.body()), "none");
    drop(layer);
    assert_eq!(doc.pointer_events(doc.body()), "  AuTo ;");
}

#[test]
fn mounting_press_does_not_dismiss_the_layer_it_mounted() {
    let doc = Document::new();
    let registry = LayerRegistry::new(&doc);
    let trigger = doc.create_child(doc.body(), NodeSpec::new());
    let dismissed = Rc::new(Cell::new(false));

    // The press that opens the layer is still dispatching when the layer
    // mounts; its outside detector must not see that press.
    let slot: Rc<RefCell<Option<scrim_primitives::Layer>>> = Rc::new(RefCell::new(None));
    let _open_guard = doc.on_node(trigger, scrim_dom::EventType::PointerDown, scrim_dom::Phase::Bubble, {
        let doc = doc.clone();
        let registry = registry.clone();
        let slot = Rc::clone(&slot);
        let dismissed = Rc::clone(&dismissed);
        move |_, _| {
            let node = doc.create_child(doc.body(), NodeSpec::new());
            let flag = Rc::clone(&dismissed);
            let layer = registry.mount(node, LayerOptions::new().on_dismiss(move || flag.set(true)));
            *slot.borrow_mut() = Some(layer);
        }
    });

    press(&doc, trigger);
    assert!(slot.borrow().is_some());
    assert!(!dismissed.get());

    // From the next turn on, outside presses dismiss as usual.
    doc.run_tasks();
    press(&doc, trigger);
    assert!(dismissed.get());
}

#[test]
fn escape_unwinds_layers_top_down() {
    let doc = Document::new();
    let registry = LayerRegistry::new(&doc);
    let order = Rc::new(RefCell::new(Vec::new()));

    let nodes: Vec<NodeId> = (0..3)
        .map(|_| doc.create_child(doc.body(), NodeSpec::new()))
        .collect();
    let layers: Rc<RefCell<Vec<Option<scrim_primitives::Layer>>>> =
        Rc::new(RefCell::new(Vec::new()));
    for (i, node) in nodes.iter().enumerate() {
        let layer = registry.mount(*node, {
            let order = Rc::clone(&order);
            LayerOptions::new().on_dismiss(move || order.borrow_mut().push(i))
        });
        layers.borrow_mut().push(Some(layer));
    }

    // Dismiss handlers drop their layer out of band, as an owner would.
    escape(&doc);
    layers.borrow_mut()[2] = None;
    escape(&doc);
    layers.borrow_mut()[1] = None;
    escape(&doc);
    assert_eq!(*order.borrow(), vec![2, 1, 0]);
}

#[test]
fn branch_subtree_is_exempt_for_every_layer() {
    let doc = Document::new();
    let registry = LayerRegistry::new(&doc);
    let node_a = doc.create_child(doc.body(), NodeSpec::new());
    let node_b = doc.create_child(doc.body(), NodeSpec::new());
    let branch = doc.create_child(doc.body(), NodeSpec::new());
    let leaf = doc.create_child(branch, NodeSpec::new());
    let dismissals = Rc::new(Cell::new(0u32));

    let mk_options = |dismissals: &Rc<Cell<u32>>| {
        let count = Rc::clone(dismissals);
        LayerOptions::new().on_dismiss(move || count.set(count.get() + 1))
    };
    let _la = registry.mount(node_a, mk_options(&dismissals));
    let _lb = registry.mount(node_b, mk_options(&dismissals));
    let _branch = registry.register_branch(branch);
    doc.run_tasks();

    press(&doc, leaf);
    assert_eq!(dismissals.get(), 0);
    press(&doc, doc.body());
    assert_eq!(dismissals.get(), 2);
}

#[test]
fn touch_outside_dismisses_on_following_click() {
    let doc = Document::new();
    let registry = LayerRegistry::new(&doc);
    let node = doc.create_child(doc.body(), NodeSpec::new());
    let outside = doc.create_child(doc.body(), NodeSpec::new());
    let dismissed = Rc::new(Cell::new(false));

    let _layer = registry.mount(node, {
        let flag = Rc::clone(&dismissed);
        LayerOptions::new().on_dismiss(move || flag.set(true))
    });
    doc.run_tasks();

    doc.dispatch(
        outside,
        EventPayload::PointerDown {
            pointer_type: PointerType::Touch,
        },
    );
    assert!(!dismissed.get());
    doc.dispatch(outside, EventPayload::Click);
    assert!(dismissed.get());
}

#[test]
fn update_subscribers_observe_every_stack_change() {
    let doc = Document::new();
    let registry = LayerRegistry::new(&doc);
    let counts = Rc::new(RefCell::new(Vec::new()));
    let _sub = {
        let registry = registry.clone();
        let counts = Rc::clone(&counts);
        registry
            .clone()
            .subscribe_updates(move || counts.borrow_mut().push(registry.layer_count()))
    };

    let a = doc.create_child(doc.body(), NodeSpec::new());
    let b = doc.create_child(doc.body(), NodeSpec::new());
    let la = registry.mount(a, LayerOptions::new());
    let lb = registry.mount(b, LayerOptions::new());
    drop(la);
    drop(lb);
    assert_eq!(*counts.borrow(), vec![1, 2, 1, 0]);
}
