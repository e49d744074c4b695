//! Process-wide serialization settings.

use serde::{Deserialize, Serialize};

// -----------------------------------------------------------------------------
// SerialConfig

/// Settings resolved once by the host and passed to every codec call
/// through [`SerialContext`](crate::codec::SerialContext).
///
/// All fields have defaults, so a host config file only needs to name the
/// values it overrides.
///
/// # Examples
///
/// ```
/// use vc_property::config::SerialConfig;
///
/// let config: SerialConfig = serde_json::from_str(r#"{ "filter_editor_only": true }"#).unwrap();
///
/// assert!(config.filter_editor_only);
/// assert_eq!(config.fast_zero_word_limit, 16);
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialConfig {
    /// Drop editor-only fields from schemas (shipping builds).
    pub filter_editor_only: bool,
    /// Largest value, in machine words, the unversioned writer inspects when
    /// checking whether a field is all zero. Larger fields are always written.
    pub fast_zero_word_limit: usize,
    /// Upper bound for element counts read from an archive.
    pub max_container_len: usize,
    /// Report lossy numeric conversions as diagnostics.
    pub warn_on_lossy_conversion: bool,
}

impl SerialConfig {
    /// The default development configuration.
    pub const DEFAULT: Self = Self {
        filter_editor_only: false,
        fast_zero_word_limit: 16,
        max_container_len: 1 << 24,
        warn_on_lossy_conversion: true,
    };

    /// A shipping configuration: editor-only fields are excluded.
    pub const SHIPPING: Self = Self {
        filter_editor_only: true,
        ..Self::DEFAULT
    };

    /// Byte limit derived from [`fast_zero_word_limit`](Self::fast_zero_word_limit).
    #[inline]
    pub const fn fast_zero_byte_limit(&self) -> usize {
        self.fast_zero_word_limit * size_of::<usize>()
    }
}

impl Default for SerialConfig {
    #[inline]
    fn default() -> Self {
        Self::DEFAULT
    }
}

// -----------------------------------------------------------------------------
// Tests

#[cfg(test)]
mod tests {
    use super::SerialConfig;

    #[test]
    fn ron_overrides() {
        let config: SerialConfig =
            ron::from_str("(fast_zero_word_limit: 4, warn_on_lossy_conversion: false)").unwrap();

        assert_eq!(config.fast_zero_word_limit, 4);
        assert!(!config.warn_on_lossy_conversion);
        assert!(!config.filter_editor_only);
        assert_eq!(config.max_container_len, SerialConfig::DEFAULT.max_container_len);
    }

    #[test]
    fn shipping_filters_editor_data() {
        assert!(SerialConfig::SHIPPING.filter_editor_only);
        assert_eq!(
            SerialConfig::SHIPPING.fast_zero_byte_limit(),
            SerialConfig::DEFAULT.fast_zero_byte_limit()
        );
    }
}
