use std::fmt;

/// Можно ли клавиатуре реагировать на фокус полей ввода
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ArmState {
    pub hardware_keyboard_present: bool,
    pub preference_enabled: bool,
    pub armed: bool,
}

impl ArmState {
    pub fn new() -> Self {
        Self::default()
    }

    /// armed = preference_enabled && !hardware_keyboard_present
    pub fn derived(&self) -> bool {
        self.preference_enabled && !self.hardware_keyboard_present
    }
}

impl fmt::Display for ArmState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "armed={} (preference={}, hw_keyboard={})",
            self.armed, self.preference_enabled, self.hardware_keyboard_present
        )
    }
}
