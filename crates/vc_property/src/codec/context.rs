use alloc::string::String;
use alloc::vec::Vec;

use crate::config::SerialConfig;
use crate::convert::ConversionRegistry;
use crate::error::Diagnostic;

// -----------------------------------------------------------------------------
// Format

/// Wire format of struct values.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Format {
    /// Self-describing field tags, tolerant to schema changes.
    #[default]
    Tagged,
    /// Compact header plus values, reader and writer share the schema.
    Unversioned,
}

// -----------------------------------------------------------------------------
// SerialContext

/// State threaded through one codec invocation.
///
/// Carries the host configuration, the optional conversion registry, the
/// wire format and the path of the field being processed. Recovered
/// problems are logged and collected as [`Diagnostic`]s.
///
/// # Examples
///
/// ```
/// use vc_property::codec::{Format, SerialContext};
/// use vc_property::config::SerialConfig;
///
/// let config = SerialConfig::default();
/// let mut cx = SerialContext::new(&config, Format::Tagged);
///
/// cx.push_field("Inventory");
/// cx.push_field("Slots");
/// assert_eq!(cx.field_path(), "Inventory.Slots");
/// cx.pop_field();
/// assert_eq!(cx.field_path(), "Inventory");
/// ```
#[derive(Debug)]
pub struct SerialContext<'a> {
    config: &'a SerialConfig,
    conversions: Option<&'a ConversionRegistry>,
    format: Format,
    diagnostics: Vec<Diagnostic>,
    path: Vec<String>,
}

impl<'a> SerialContext<'a> {
    #[inline]
    pub fn new(config: &'a SerialConfig, format: Format) -> Self {
        Self {
            config,
            conversions: None,
            format,
            diagnostics: Vec::new(),
            path: Vec::new(),
        }
    }

    /// Enables type conversion of mismatched tagged fields.
    #[inline]
    pub fn with_conversions(mut self, registry: &'a ConversionRegistry) -> Self {
        self.conversions = Some(registry);
        self
    }

    #[inline]
    pub fn config(&self) -> &'a SerialConfig {
        self.config
    }

    #[inline]
    pub fn conversions(&self) -> Option<&'a ConversionRegistry> {
        self.conversions
    }

    #[inline]
    pub fn format(&self) -> Format {
        self.format
    }

    #[inline]
    pub fn set_format(&mut self, format: Format) {
        self.format = format;
    }

    /// Diagnostics reported so far.
    #[inline]
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Takes the collected diagnostics, leaving the context empty.
    #[inline]
    pub fn take_diagnostics(&mut self) -> Vec<Diagnostic> {
        core::mem::take(&mut self.diagnostics)
    }

    /// Logs a diagnostic and collects it.
    ///
    /// Lossy conversions are dropped when
    /// [`SerialConfig::warn_on_lossy_conversion`] is off.
    pub fn report(&mut self, diagnostic: Diagnostic) {
        if matches!(diagnostic, Diagnostic::LossyConversion { .. }) && !self.config.warn_on_lossy_conversion {
            return;
        }
        log::log!(diagnostic.level(), "{diagnostic}");
        self.diagnostics.push(diagnostic);
    }

    /// Enters a field.
    #[inline]
    pub fn push_field(&mut self, name: &str) {
        self.path.push(String::from(name));
    }

    #[inline]
    pub fn pop_field(&mut self) {
        self.path.pop();
    }

    /// The dotted path of the current field.
    pub fn field_path(&self) -> String {
        self.path.join(".")
    }
}

// -----------------------------------------------------------------------------
// Tests

#[cfg(test)]
mod tests {
    use alloc::string::ToString;

    use super::{Format, SerialContext};
    use crate::config::SerialConfig;
    use crate::error::Diagnostic;

    #[test]
    fn lossy_reports_follow_config() {
        let lossy = || Diagnostic::LossyConversion {
            field: "Speed".to_string(),
            from: "IntProperty".to_string(),
            to: "Int8Property".to_string(),
        };

        let quiet = SerialConfig {
            warn_on_lossy_conversion: false,
            ..SerialConfig::DEFAULT
        };
        let mut cx = SerialContext::new(&quiet, Format::Tagged);
        cx.report(lossy());
        assert!(cx.diagnostics().is_empty());

        let mut cx = SerialContext::new(&SerialConfig::DEFAULT, Format::Unversioned);
        cx.report(lossy());
        assert_eq!(cx.take_diagnostics(), [lossy()]);
        assert!(cx.diagnostics().is_empty());
    }
}
