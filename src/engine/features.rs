//! WebAssembly feature toggles
//!
//! Gate decode-time acceptance of post-MVP constructs. Everything defaults
//! to off; the binary reader rejects gated encodings with a diagnostic
//! instead of silently accepting them.

/// Enabled WebAssembly features
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Features {
    multi_value: bool,
    sign_extension: bool,
}

impl Features {
    pub fn new() -> Features {
        Features::default()
    }

    /// Enable every supported feature
    pub fn enable_all(&mut self) {
        self.enable_multi_value();
        self.enable_sign_extension();
    }

    pub fn multi_value_enabled(&self) -> bool {
        self.multi_value
    }

    pub fn enable_multi_value(&mut self) {
        self.set_multi_value_enabled(true);
    }

    pub fn set_multi_value_enabled(
        &mut self,
        value: bool,
    ) {
        self.multi_value = value;
    }

    pub fn sign_extension_enabled(&self) -> bool {
        self.sign_extension
    }

    pub fn enable_sign_extension(&mut self) {
        self.set_sign_extension_enabled(true);
    }

    pub fn set_sign_extension_enabled(
        &mut self,
        value: bool,
    ) {
        self.sign_extension = value;
    }
}
