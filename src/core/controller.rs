/// Input button identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Button {
    KeyW,
    KeyA,
    KeyS,
    KeyD,
    ArrowUp,
    ArrowDown,
    ArrowLeft,
    ArrowRight,
    Escape,
}

/// Controller - handles button input states
pub trait Controller {
    /// Check if button is currently down
    fn is_down(&self, button: Button) -> bool;

    /// Get all currently pressed buttons
    fn get_down_keys(&self) -> &[Button];
}

/// Fixed set of held buttons, used for scripted input and tests
#[derive(Debug, Clone, Default)]
pub struct HeldButtons {
    pressed: Vec<Button>,
}

impl HeldButtons {
    pub fn new(buttons: &[Button]) -> Self {
        let mut pressed = Vec::with_capacity(buttons.len());
        for &b in buttons {
            if !pressed.contains(&b) {
                pressed.push(b);
            }
        }
        Self { pressed }
    }

    pub fn none() -> Self {
        Self::default()
    }
}

impl Controller for HeldButtons {
    fn is_down(&self, button: Button) -> bool {
        self.pressed.contains(&button)
    }

    fn get_down_keys(&self) -> &[Button] {
        &self.pressed
    }
}
