use alloc::string::String;
use alloc::vec::Vec;

// -----------------------------------------------------------------------------
// EnumDef

/// An enumerator table: `(name, value)` pairs in declaration order.
///
/// Enumerator lookup by name ignores ASCII case and accepts the qualified
/// `Type::Name` spelling.
///
/// # Examples
///
/// ```
/// use vc_property::info::EnumDef;
///
/// let color = EnumDef::new("EColor", [("Red", 0), ("Green", 1), ("Blue", 4)]);
///
/// assert_eq!(color.value_of("green"), Some(1));
/// assert_eq!(color.value_of("EColor::Blue"), Some(4));
/// assert_eq!(color.name_of(4), Some("Blue"));
/// assert_eq!(color.max_value(), 5);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumDef {
    name: String,
    entries: Vec<(String, i64)>,
}

impl EnumDef {
    /// Creates an enum from its name and entries.
    pub fn new<'a>(name: &str, entries: impl IntoIterator<Item = (&'a str, i64)>) -> Self {
        Self {
            name: String::from(name),
            entries: entries
                .into_iter()
                .map(|(n, v)| (String::from(n), v))
                .collect(),
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn entries(&self) -> &[(String, i64)] {
        &self.entries
    }

    /// Returns the value of the enumerator called `name`.
    pub fn value_of(&self, name: &str) -> Option<i64> {
        let short = match name.split_once("::") {
            Some((ty, short)) if ty.eq_ignore_ascii_case(&self.name) => short,
            _ => name,
        };
        self.entries
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(short))
            .map(|(_, v)| *v)
    }

    /// Returns the name of the first enumerator with `value`.
    pub fn name_of(&self, value: i64) -> Option<&str> {
        self.entries
            .iter()
            .find(|(_, v)| *v == value)
            .map(|(n, _)| n.as_str())
    }

    #[inline]
    pub fn contains_value(&self, value: i64) -> bool {
        self.name_of(value).is_some()
    }

    /// The sentinel: one past the largest declared value.
    ///
    /// Unresolvable enumerators load as this value. An empty enum has
    /// sentinel `0`.
    pub fn max_value(&self) -> i64 {
        self.entries
            .iter()
            .map(|(_, v)| v.saturating_add(1))
            .max()
            .unwrap_or(0)
    }
}
