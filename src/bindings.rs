//! Slint model sync.
//!
//! [`ModelSync`] copies the engine's render state into Slint `VecModel`s.
//! Bind each model once with a row constructor, then call
//! [`sync`](ModelSync::sync) after input or on every frame:
//!
//! ```ignore
//! let edges = Rc::new(VecModel::<EdgeRow>::default());
//! let mut sync = ModelSync::new();
//! sync.bind_edges(edges.clone(), |layout| EdgeRow {
//!     id: layout.id.as_str().into(),
//!     path: layout.path.commands.as_str().into(),
//!     selected: layout.selected,
//! });
//! window.set_edges(ModelRc::from(edges));
//!
//! ctrl.with(|engine| sync.sync(engine));
//! ```
//!
//! Rows are updated in place; unchanged rows are left alone so Slint only
//! re-renders what moved.

use crate::edges::EdgeLayout;
use crate::engine::FlowEngine;
use crate::store::InternalNode;
use slint::{Model, VecModel};
use std::rc::Rc;

/// One bound model.
trait Syncer<T: ?Sized> {
    fn sync(&self, items: &[&T]);
}

struct RowSyncer<P, F> {
    model: Rc<VecModel<P>>,
    constructor: F,
}

impl<T, P, F> Syncer<T> for RowSyncer<P, F>
where
    T: ?Sized,
    P: Clone + PartialEq + 'static,
    F: Fn(&T) -> P,
{
    fn sync(&self, items: &[&T]) {
        for (i, item) in items.iter().enumerate() {
            let row = (self.constructor)(item);
            if i < self.model.row_count() {
                if self.model.row_data(i).as_ref() != Some(&row) {
                    self.model.set_row_data(i, row);
                }
            } else {
                self.model.push(row);
            }
        }
        while self.model.row_count() > items.len() {
            self.model.remove(self.model.row_count() - 1);
        }
    }
}

#[derive(Default)]
pub struct ModelSync {
    nodes: Option<Box<dyn Syncer<InternalNode>>>,
    edges: Option<Box<dyn Syncer<EdgeLayout>>>,
}

impl ModelSync {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rows for the visible nodes, in store order.
    pub fn bind_nodes<P, F>(&mut self, model: Rc<VecModel<P>>, constructor: F)
    where
        P: Clone + PartialEq + 'static,
        F: Fn(&InternalNode) -> P + 'static,
    {
        self.nodes = Some(Box::new(RowSyncer { model, constructor }));
    }

    /// Rows for the visible edges, sorted by z.
    pub fn bind_edges<P, F>(&mut self, model: Rc<VecModel<P>>, constructor: F)
    where
        P: Clone + PartialEq + 'static,
        F: Fn(&EdgeLayout) -> P + 'static,
    {
        self.edges = Some(Box::new(RowSyncer { model, constructor }));
    }

    pub fn sync(&self, engine: &mut FlowEngine) {
        if let Some(edges) = &self.edges {
            let layouts: Vec<&EdgeLayout> = engine.edge_layouts().iter().map(Rc::as_ref).collect();
            edges.sync(&layouts);
        }
        if let Some(nodes) = &self.nodes {
            nodes.sync(&engine.visible_nodes());
        }
    }
}
