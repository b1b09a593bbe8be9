//! Pointer and keyboard events as delivered by the rendering layer.

use crate::geometry::Point;
use crate::resize::ResizeControl;
use crate::types::HandleType;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MouseButton {
    #[default]
    Left,
    Middle,
    Right,
}

/// A keyboard modifier that can be bound to a selection action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModifierKey {
    Shift,
    Control,
    Alt,
    Meta,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Modifiers {
    pub shift: bool,
    pub control: bool,
    pub alt: bool,
    pub meta: bool,
}

impl Modifiers {
    pub const NONE: Modifiers = Modifiers {
        shift: false,
        control: false,
        alt: false,
        meta: false,
    };

    pub fn shift() -> Self {
        Self {
            shift: true,
            ..Self::NONE
        }
    }

    pub fn control() -> Self {
        Self {
            control: true,
            ..Self::NONE
        }
    }

    pub fn is_pressed(&self, key: ModifierKey) -> bool {
        match key {
            ModifierKey::Shift => self.shift,
            ModifierKey::Control => self.control,
            ModifierKey::Alt => self.alt,
            ModifierKey::Meta => self.meta,
        }
    }

    /// True when any of `keys` is held.
    pub fn any(&self, keys: &[ModifierKey]) -> bool {
        keys.iter().any(|k| self.is_pressed(*k))
    }
}

/// What lies under the pointer, as hit-tested by the rendering layer.
#[derive(Debug, Clone, PartialEq)]
pub enum PointerTarget {
    Pane,
    Node(String),
    Handle {
        node_id: String,
        handle_id: Option<String>,
        handle_type: HandleType,
    },
    Edge(String),
    /// The draggable end of a selected edge.
    EdgeEndpoint {
        edge_id: String,
        end: HandleType,
    },
    ResizeControl {
        node_id: String,
        control: ResizeControl,
    },
    /// The box around a marquee selection.
    SelectionBox,
}

/// A pointer event in screen coordinates relative to the surface.
#[derive(Debug, Clone, PartialEq)]
pub struct PointerEvent {
    pub position: Point,
    pub button: MouseButton,
    pub modifiers: Modifiers,
    pub target: PointerTarget,
}

impl PointerEvent {
    pub fn new(position: Point, target: PointerTarget) -> Self {
        Self {
            position,
            button: MouseButton::Left,
            modifiers: Modifiers::NONE,
            target,
        }
    }

    pub fn with_modifiers(mut self, modifiers: Modifiers) -> Self {
        self.modifiers = modifiers;
        self
    }

    pub fn with_button(mut self, button: MouseButton) -> Self {
        self.button = button;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    Escape,
    Delete,
    Backspace,
    ArrowUp,
    ArrowDown,
    ArrowLeft,
    ArrowRight,
    Other,
}

impl Key {
    /// Unit step for the arrow keys.
    pub fn arrow_direction(self) -> Option<Point> {
        match self {
            Key::ArrowUp => Some(Point::new(0.0, -1.0)),
            Key::ArrowDown => Some(Point::new(0.0, 1.0)),
            Key::ArrowLeft => Some(Point::new(-1.0, 0.0)),
            Key::ArrowRight => Some(Point::new(1.0, 0.0)),
            _ => None,
        }
    }
}
