//! Display-formatting rules keyed by type name.
//!
//! Rules are stored by [`TypeNameSpecifier`]; the session only stores and
//! looks them up. Rendering values is the engine's business.

pub mod cache;

use std::fmt;

use bitflags::bitflags;

use crate::error::Result;

/// How a rule names the types it applies to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeNameSpecifier {
    /// An exact type name.
    Literal(String),
    /// A regular expression matched against the whole type name.
    Regex(String),
    /// A glob pattern (`*` and `?`) matched against the whole type name.
    Pattern(String),
}

impl TypeNameSpecifier {
    /// An exact type name.
    pub fn literal(name: impl Into<String>) -> Self {
        Self::Literal(name.into())
    }

    /// A regex specifier. The regex is compiled up front.
    pub fn regex(source: impl Into<String>) -> Result<Self> {
        let source = source.into();
        cache::MATCHERS.get_or_compile(&anchored(&source))?;
        Ok(Self::Regex(source))
    }

    /// A glob specifier.
    pub fn pattern(glob: impl Into<String>) -> Self {
        Self::Pattern(glob.into())
    }

    /// The name, regex or glob text.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Literal(s) | Self::Regex(s) | Self::Pattern(s) => s,
        }
    }

    /// Check if this is a regex or glob specifier.
    #[must_use]
    pub const fn is_wildcard(&self) -> bool {
        !matches!(self, Self::Literal(_))
    }

    /// Check if the specifier applies to a concrete type name.
    #[must_use]
    pub fn matches(&self, type_name: &str) -> bool {
        let source = match self {
            Self::Literal(name) => return name == type_name,
            Self::Regex(source) => anchored(source),
            Self::Pattern(glob) => glob_to_regex(glob),
        };
        match cache::MATCHERS.get_or_compile(&source) {
            Ok(re) => re.is_match(type_name),
            Err(e) => {
                tracing::debug!(specifier = %self, error = %e, "unusable type name specifier");
                false
            }
        }
    }
}

impl fmt::Display for TypeNameSpecifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(name) => f.write_str(name),
            Self::Regex(source) => write!(f, "/{source}/"),
            Self::Pattern(glob) => write!(f, "glob:{glob}"),
        }
    }
}

impl From<&str> for TypeNameSpecifier {
    fn from(name: &str) -> Self {
        Self::literal(name)
    }
}

fn anchored(source: &str) -> String {
    format!("^(?:{source})$")
}

fn glob_to_regex(glob: &str) -> String {
    let mut out = String::with_capacity(glob.len() + 8);
    out.push('^');
    for c in glob.chars() {
        match c {
            '*' => out.push_str(".*"),
            '?' => out.push('.'),
            other => out.push_str(&regex::escape(other.encode_utf8(&mut [0; 4]))),
        }
    }
    out.push('$');
    out
}

/// Value display format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ValueFormat {
    /// Engine default.
    #[default]
    Default,
    /// `true`/`false`.
    Boolean,
    /// Binary digits.
    Binary,
    /// Raw bytes.
    Bytes,
    /// Raw bytes with an ASCII column.
    BytesWithAscii,
    /// A character.
    Char,
    /// A NUL-terminated string.
    CString,
    /// Signed decimal.
    Decimal,
    /// Unsigned decimal.
    Unsigned,
    /// Enumerator name.
    Enum,
    /// Lowercase hex.
    Hex,
    /// Uppercase hex.
    HexUppercase,
    /// Floating point.
    Float,
    /// Octal.
    Octal,
    /// Pointer.
    Pointer,
    /// UTF-16 text.
    Unicode16,
    /// UTF-32 text.
    Unicode32,
}

bitflags! {
    /// Options shared by every rule kind.
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
    pub struct TypeOptions: u32 {
        /// Apply to typedefs of the matched type.
        const CASCADE = 1 << 0;
        /// Do not apply through pointers.
        const SKIP_POINTERS = 1 << 1;
        /// Do not apply through references.
        const SKIP_REFERENCES = 1 << 2;
        /// Hide children.
        const HIDE_CHILDREN = 1 << 3;
        /// Hide the value.
        const HIDE_VALUE = 1 << 4;
        /// Show children on one line.
        const SHOW_ONE_LINER = 1 << 5;
        /// Hide child names.
        const HIDE_NAMES = 1 << 6;
    }
}

/// A format rule.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TypeFormat {
    /// The display format.
    pub format: ValueFormat,
    /// Rule options.
    pub options: TypeOptions,
}

impl TypeFormat {
    /// A format rule with cascade enabled.
    #[must_use]
    pub const fn new(format: ValueFormat) -> Self {
        Self {
            format,
            options: TypeOptions::CASCADE,
        }
    }
}

/// Where a summary comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SummarySource {
    /// A summary format string such as `"size=${var.size}"`.
    String(String),
    /// A scripted function name.
    Function(String),
}

/// A summary rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeSummary {
    /// The summary source.
    pub source: SummarySource,
    /// Rule options.
    pub options: TypeOptions,
}

impl TypeSummary {
    /// A summary from a format string.
    pub fn string(format: impl Into<String>) -> Self {
        Self {
            source: SummarySource::String(format.into()),
            options: TypeOptions::CASCADE,
        }
    }

    /// A summary from a scripted function.
    pub fn function(name: impl Into<String>) -> Self {
        Self {
            source: SummarySource::Function(name.into()),
            options: TypeOptions::CASCADE,
        }
    }
}

/// A filter rule: the child expression paths to show.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TypeFilter {
    /// Child expression paths, in display order.
    pub children: Vec<String>,
    /// Rule options.
    pub options: TypeOptions,
}

impl TypeFilter {
    /// A filter showing the given children.
    pub fn new<I, S>(children: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            children: children.into_iter().map(Into::into).collect(),
            options: TypeOptions::CASCADE,
        }
    }
}

/// A synthetic-children provider rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeSynthetic {
    /// Name of the provider class.
    pub class_name: String,
    /// Rule options.
    pub options: TypeOptions,
}

impl TypeSynthetic {
    /// A provider rule naming a class.
    pub fn class(name: impl Into<String>) -> Self {
        Self {
            class_name: name.into(),
            options: TypeOptions::CASCADE,
        }
    }
}

/// Rules of one kind within a category, in insertion order.
#[derive(Debug, Clone)]
pub(crate) struct RuleSet<R> {
    rules: Vec<(TypeNameSpecifier, R)>,
}

impl<R> Default for RuleSet<R> {
    fn default() -> Self {
        Self { rules: Vec::new() }
    }
}

impl<R: Clone> RuleSet<R> {
    /// Add or replace a rule. Returns true if a rule was replaced.
    pub(crate) fn insert(&mut self, spec: TypeNameSpecifier, rule: R) -> bool {
        if let Some(slot) = self.rules.iter_mut().find(|(key, _)| *key == spec) {
            slot.1 = rule;
            true
        } else {
            self.rules.push((spec, rule));
            false
        }
    }

    pub(crate) fn remove(&mut self, spec: &TypeNameSpecifier) -> bool {
        let before = self.rules.len();
        self.rules.retain(|(key, _)| key != spec);
        self.rules.len() != before
    }

    pub(crate) fn len(&self) -> usize {
        self.rules.len()
    }

    pub(crate) fn at(&self, index: usize) -> Option<(TypeNameSpecifier, R)> {
        self.rules.get(index).cloned()
    }

    /// Find the rule for a query.
    ///
    /// An equal key wins. A literal query then falls back to wildcard keys
    /// matching the name, in insertion order.
    pub(crate) fn lookup(&self, query: &TypeNameSpecifier) -> Option<R> {
        if let Some((_, rule)) = self.rules.iter().find(|(key, _)| key == query) {
            return Some(rule.clone());
        }
        let TypeNameSpecifier::Literal(name) = query else {
            return None;
        };
        self.rules
            .iter()
            .find(|(key, _)| key.is_wildcard() && key.matches(name))
            .map(|(_, rule)| rule.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn glob_matching() {
        let spec = TypeNameSpecifier::pattern("std::vector<*>");
        assert!(spec.matches("std::vector<int>"));
        assert!(!spec.matches("std::vector"));
        assert!(!spec.matches("xstd::vector<int>"));
    }

    #[test]
    fn regex_is_anchored() {
        let spec = TypeNameSpecifier::regex("Foo[0-9]+").unwrap();
        assert!(spec.matches("Foo12"));
        assert!(!spec.matches("Foo12Bar"));
    }

    #[test]
    fn invalid_regex_rejected() {
        assert!(TypeNameSpecifier::regex("(").is_err());
    }

    #[test]
    fn exact_key_beats_wildcard() {
        let mut rules = RuleSet::default();
        rules.insert(TypeNameSpecifier::pattern("*"), TypeFormat::new(ValueFormat::Hex));
        rules.insert(
            TypeNameSpecifier::literal("int"),
            TypeFormat::new(ValueFormat::Decimal),
        );

        let hit = rules.lookup(&TypeNameSpecifier::literal("int")).unwrap();
        assert_eq!(hit.format, ValueFormat::Decimal);
        let fallback = rules.lookup(&TypeNameSpecifier::literal("long")).unwrap();
        assert_eq!(fallback.format, ValueFormat::Hex);
    }

    #[test]
    fn insert_replaces_equal_key() {
        let mut rules = RuleSet::default();
        assert!(!rules.insert("a".into(), TypeSummary::string("x")));
        assert!(rules.insert("a".into(), TypeSummary::string("y")));
        assert_eq!(rules.len(), 1);
        assert!(rules.remove(&"a".into()));
        assert!(!rules.remove(&"a".into()));
    }
}
