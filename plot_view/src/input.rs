//! Navigation input.
//!
//! Host-independent description of pointer and key input. The host (or the
//! console) translates its native events into [`InputEvent`]s; the camera
//! controller decides what they do.

use std::{fmt, str::FromStr};

use anyhow::bail;

/// Modifier keys held during a drag.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Modifiers {
    pub ctrl: bool,
    pub alt: bool,
    pub shift: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PointerButton {
    #[default]
    Primary,
    Middle,
    Secondary,
}

/// Held-key navigation commands. Each drives one velocity component while
/// held.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NavKey {
    Forward,
    Backward,
    PanLeft,
    PanRight,
    PanUp,
    PanDown,
    RotateLeft,
    RotateRight,
    RotateUp,
    RotateDown,
    BankLeft,
    BankRight,
    PivotLeft,
    PivotRight,
    PivotUp,
    PivotDown,
}

impl NavKey {
    pub const ALL: [NavKey; 16] = [
        NavKey::Forward,
        NavKey::Backward,
        NavKey::PanLeft,
        NavKey::PanRight,
        NavKey::PanUp,
        NavKey::PanDown,
        NavKey::RotateLeft,
        NavKey::RotateRight,
        NavKey::RotateUp,
        NavKey::RotateDown,
        NavKey::BankLeft,
        NavKey::BankRight,
        NavKey::PivotLeft,
        NavKey::PivotRight,
        NavKey::PivotUp,
        NavKey::PivotDown,
    ];

    pub fn name(self) -> &'static str {
        match self {
            NavKey::Forward => "forward",
            NavKey::Backward => "backward",
            NavKey::PanLeft => "pan-left",
            NavKey::PanRight => "pan-right",
            NavKey::PanUp => "pan-up",
            NavKey::PanDown => "pan-down",
            NavKey::RotateLeft => "rotate-left",
            NavKey::RotateRight => "rotate-right",
            NavKey::RotateUp => "rotate-up",
            NavKey::RotateDown => "rotate-down",
            NavKey::BankLeft => "bank-left",
            NavKey::BankRight => "bank-right",
            NavKey::PivotLeft => "pivot-left",
            NavKey::PivotRight => "pivot-right",
            NavKey::PivotUp => "pivot-up",
            NavKey::PivotDown => "pivot-down",
        }
    }
}

impl fmt::Display for NavKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for NavKey {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        let wanted = s.trim().to_ascii_lowercase().replace('_', "-");
        if wanted == "back" {
            return Ok(NavKey::Backward);
        }
        match NavKey::ALL.into_iter().find(|k| k.name() == wanted) {
            Some(key) => Ok(key),
            None => bail!("unknown navigation key: {}", s),
        }
    }
}

/// One navigation input.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputEvent {
    /// Pointer moved by `(dx, dy)` pixels with a button held; `+dy` is down.
    Drag {
        dx: f64,
        dy: f64,
        button: PointerButton,
        modifiers: Modifiers,
    },
    /// Scroll notches; positive moves toward the scene.
    Wheel { delta: f64 },
    KeyDown(NavKey),
    KeyUp(NavKey),
}

/// What a drag does to the camera.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DragAction {
    Pan,
    Dolly,
    Rotate,
    Pivot,
}

impl DragAction {
    /// Alt or the middle button pans, shift dollies, ctrl rotates in place,
    /// anything else orbits.
    pub fn classify(button: PointerButton, modifiers: Modifiers) -> Self {
        if modifiers.alt || button == PointerButton::Middle {
            DragAction::Pan
        } else if modifiers.shift {
            DragAction::Dolly
        } else if modifiers.ctrl {
            DragAction::Rotate
        } else {
            DragAction::Pivot
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_names_parse_back() {
        for key in NavKey::ALL {
            assert_eq!(key.name().parse::<NavKey>().unwrap(), key);
        }
        assert_eq!("PAN_LEFT".parse::<NavKey>().unwrap(), NavKey::PanLeft);
        assert_eq!("back".parse::<NavKey>().unwrap(), NavKey::Backward);
        assert!("jump".parse::<NavKey>().is_err());
    }

    #[test]
    fn drag_classification() {
        let none = Modifiers::default();
        let alt = Modifiers {
            alt: true,
            ..none
        };
        let shift = Modifiers {
            shift: true,
            ..none
        };
        let ctrl = Modifiers {
            ctrl: true,
            ..none
        };
        assert_eq!(DragAction::classify(PointerButton::Primary, none), DragAction::Pivot);
        assert_eq!(DragAction::classify(PointerButton::Middle, none), DragAction::Pan);
        assert_eq!(DragAction::classify(PointerButton::Primary, alt), DragAction::Pan);
        assert_eq!(DragAction::classify(PointerButton::Primary, shift), DragAction::Dolly);
        assert_eq!(DragAction::classify(PointerButton::Secondary, ctrl), DragAction::Rotate);
    }
}
