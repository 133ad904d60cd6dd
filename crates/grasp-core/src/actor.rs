//! Thin scene-graph node used by the coordinator.
//!
//! The real windowing host owns staging, painting and picking; the
//! coordinator only needs stable identity, subtree containment, bubble
//! chains and a place to attach gestures. Actors here carry just enough
//! geometry for a host to pick by coordinates.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use crate::geometry::Rect;
use crate::gesture::Gesture;

pub struct Actor {
    name: String,
    rect: Cell<Rect>,
    reactive: Cell<bool>,
    parent: RefCell<Weak<Actor>>,
    children: RefCell<Vec<Rc<Actor>>>,
    gestures: RefCell<Vec<Rc<Gesture>>>,
}

impl Actor {
    pub fn new(name: impl Into<String>) -> Rc<Self> {
        Rc::new(Self {
            name: name.into(),
            rect: Cell::new(Rect::default()),
            reactive: Cell::new(false),
            parent: RefCell::new(Weak::new()),
            children: RefCell::new(Vec::new()),
            gestures: RefCell::new(Vec::new()),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn rect(&self) -> Rect {
        self.rect.get()
    }

    pub fn set_rect(&self, rect: Rect) {
        self.rect.set(rect);
    }

    pub fn is_reactive(&self) -> bool {
        self.reactive.get()
    }

    pub fn set_reactive(&self, reactive: bool) {
        self.reactive.set(reactive);
    }

    pub fn parent(&self) -> Option<Rc<Actor>> {
        self.parent.borrow().upgrade()
    }

    pub fn add_child(self: &Rc<Self>, child: &Rc<Actor>) {
        *child.parent.borrow_mut() = Rc::downgrade(self);
        self.children.borrow_mut().push(Rc::clone(child));
    }

    pub fn remove_child(self: &Rc<Self>, child: &Rc<Actor>) {
        self.children.borrow_mut().retain(|c| !Rc::ptr_eq(c, child));
        *child.parent.borrow_mut() = Weak::new();
    }

    /// Whether `other` is `self` or a descendant of `self`.
    pub fn contains(self: &Rc<Self>, other: &Rc<Actor>) -> bool {
        let mut cursor = Some(Rc::clone(other));
        while let Some(actor) = cursor {
            if Rc::ptr_eq(&actor, self) {
                return true;
            }
            cursor = actor.parent();
        }
        false
    }

    /// The chain from `self` up to the root, innermost first.
    pub fn ancestor_chain(self: &Rc<Self>) -> Vec<Rc<Actor>> {
        let mut chain = Vec::new();
        let mut cursor = Some(Rc::clone(self));
        while let Some(actor) = cursor {
            cursor = actor.parent();
            chain.push(actor);
        }
        chain
    }

    /// Picks the topmost reactive actor containing the coordinates. Later
    /// siblings are considered on top of earlier ones.
    pub fn pick(self: &Rc<Self>, x: f32, y: f32) -> Option<Rc<Actor>> {
        for child in self.children.borrow().iter().rev() {
            if let Some(hit) = child.pick(x, y) {
                return Some(hit);
            }
        }

        if self.reactive.get() && self.rect.get().contains(x, y) {
            return Some(Rc::clone(self));
        }

        None
    }

    pub fn add_gesture(self: &Rc<Self>, gesture: &Rc<Gesture>) {
        gesture.set_actor(Some(self));
        self.gestures.borrow_mut().push(Rc::clone(gesture));
    }

    pub fn remove_gesture(self: &Rc<Self>, gesture: &Rc<Gesture>) {
        let mut gestures = self.gestures.borrow_mut();
        if let Some(position) = gestures.iter().position(|g| Rc::ptr_eq(g, gesture)) {
            let gesture = gestures.remove(position);
            drop(gestures);
            gesture.set_actor(None);
        }
    }

    pub fn gestures(&self) -> Vec<Rc<Gesture>> {
        self.gestures.borrow().clone()
    }

    /// Detaches all gestures and children, recursively. The host calls this
    /// when an actor is destroyed; attached gestures lose their points.
    pub fn destroy(self: &Rc<Self>) {
        let gestures = std::mem::take(&mut *self.gestures.borrow_mut());
        for gesture in gestures {
            gesture.set_actor(None);
        }

        let children = std::mem::take(&mut *self.children.borrow_mut());
        for child in children {
            child.destroy();
        }

        if let Some(parent) = self.parent() {
            parent.remove_child(self);
        }
    }
}
