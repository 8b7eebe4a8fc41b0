//! Named, ordered collections of formatting rules.
//!
//! Categories sit in a priority list; index 0 is the highest priority.
//! Enabling a category moves it to the front. Lookups walk the enabled
//! categories front to back and return the first match. The `"default"`
//! category always exists and cannot be deleted.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};

use crate::formatters::{
    RuleSet, TypeFilter, TypeFormat, TypeNameSpecifier, TypeSummary, TypeSynthetic,
};

/// Name of the category that always exists.
pub const DEFAULT_CATEGORY: &str = "default";

static NEXT_GENERATION: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone)]
struct CategoryData {
    name: String,
    /// Distinguishes a recreated category from a deleted one of the same name.
    generation: u64,
    enabled: bool,
    formats: RuleSet<TypeFormat>,
    summaries: RuleSet<TypeSummary>,
    filters: RuleSet<TypeFilter>,
    synthetics: RuleSet<TypeSynthetic>,
}

impl CategoryData {
    fn new(name: &str, enabled: bool) -> Self {
        Self {
            name: name.to_string(),
            generation: NEXT_GENERATION.fetch_add(1, Ordering::Relaxed),
            enabled,
            formats: RuleSet::default(),
            summaries: RuleSet::default(),
            filters: RuleSet::default(),
            synthetics: RuleSet::default(),
        }
    }
}

type Categories = RwLock<Vec<CategoryData>>;

/// The categories of one session.
#[derive(Debug, Clone)]
pub(crate) struct TypeCategoryRegistry {
    categories: Arc<Categories>,
}

impl Default for TypeCategoryRegistry {
    fn default() -> Self {
        Self {
            categories: Arc::new(RwLock::new(vec![CategoryData::new(DEFAULT_CATEGORY, true)])),
        }
    }
}

fn read(categories: &Categories) -> RwLockReadGuard<'_, Vec<CategoryData>> {
    categories.read().unwrap_or_else(PoisonError::into_inner)
}

fn write(categories: &Categories) -> RwLockWriteGuard<'_, Vec<CategoryData>> {
    categories.write().unwrap_or_else(PoisonError::into_inner)
}

fn position(list: &[CategoryData], name: &str) -> Option<usize> {
    list.iter().position(|c| c.name == name)
}

impl TypeCategoryRegistry {
    fn handle(&self, data: &CategoryData) -> TypeCategory {
        TypeCategory {
            name: data.name.clone(),
            generation: data.generation,
            registry: Arc::downgrade(&self.categories),
        }
    }

    /// Look up a category. Never creates one.
    pub(crate) fn get(&self, name: &str) -> Option<TypeCategory> {
        let list = read(&self.categories);
        list.iter().find(|c| c.name == name).map(|c| self.handle(c))
    }

    /// Return the named category, appending a disabled one if missing.
    pub(crate) fn create(&self, name: &str) -> TypeCategory {
        let mut list = write(&self.categories);
        let pos = position(&list, name).unwrap_or_else(|| {
            tracing::debug!(category = name, "creating type category");
            list.push(CategoryData::new(name, false));
            list.len() - 1
        });
        self.handle(&list[pos])
    }

    pub(crate) fn delete(&self, name: &str) -> bool {
        if name == DEFAULT_CATEGORY {
            return false;
        }
        let mut list = write(&self.categories);
        match position(&list, name) {
            Some(pos) => {
                list.remove(pos);
                true
            }
            None => false,
        }
    }

    pub(crate) fn len(&self) -> usize {
        read(&self.categories).len()
    }

    pub(crate) fn at(&self, index: usize) -> Option<TypeCategory> {
        read(&self.categories).get(index).map(|c| self.handle(c))
    }

    pub(crate) fn default_category(&self) -> Option<TypeCategory> {
        self.get(DEFAULT_CATEGORY)
    }

    /// Enable a category at the highest priority.
    pub(crate) fn enable(&self, name: &str) -> bool {
        self.enable_at(name, 0)
    }

    /// Enable a category and move it to `position` (clamped).
    pub(crate) fn enable_at(&self, name: &str, at: usize) -> bool {
        enable_at(&self.categories, |c| c.name == name, at)
    }

    pub(crate) fn disable(&self, name: &str) -> bool {
        set_disabled(&self.categories, |c| c.name == name)
    }

    /// First matching rule across enabled categories, in priority order.
    fn lookup<R: Clone>(
        &self,
        spec: &TypeNameSpecifier,
        pick: impl Fn(&CategoryData) -> &RuleSet<R>,
    ) -> Option<R> {
        read(&self.categories)
            .iter()
            .filter(|c| c.enabled)
            .find_map(|c| pick(c).lookup(spec))
    }

    pub(crate) fn format_for_type(&self, spec: &TypeNameSpecifier) -> Option<TypeFormat> {
        self.lookup(spec, |c| &c.formats)
    }

    pub(crate) fn summary_for_type(&self, spec: &TypeNameSpecifier) -> Option<TypeSummary> {
        self.lookup(spec, |c| &c.summaries)
    }

    pub(crate) fn filter_for_type(&self, spec: &TypeNameSpecifier) -> Option<TypeFilter> {
        self.lookup(spec, |c| &c.filters)
    }

    pub(crate) fn synthetic_for_type(&self, spec: &TypeNameSpecifier) -> Option<TypeSynthetic> {
        self.lookup(spec, |c| &c.synthetics)
    }
}

fn enable_at(categories: &Categories, matches: impl Fn(&CategoryData) -> bool, at: usize) -> bool {
    let mut list = write(categories);
    let Some(pos) = list.iter().position(matches) else {
        return false;
    };
    let mut category = list.remove(pos);
    category.enabled = true;
    let at = at.min(list.len());
    list.insert(at, category);
    true
}

fn set_disabled(categories: &Categories, matches: impl Fn(&CategoryData) -> bool) -> bool {
    let mut list = write(categories);
    match list.iter_mut().find(|c| matches(c)) {
        Some(category) => {
            category.enabled = false;
            true
        }
        None => false,
    }
}

macro_rules! rule_accessors {
    ($field:ident, $rule:ty, $add:ident, $delete:ident, $count:ident, $at:ident, $for_type:ident) => {
        /// Add or replace a rule. Returns false if the category is gone.
        pub fn $add(&self, spec: TypeNameSpecifier, rule: $rule) -> bool {
            self.with_mut(|c| {
                c.$field.insert(spec, rule);
            })
            .is_some()
        }

        /// Remove a rule. Returns true if one was removed.
        pub fn $delete(&self, spec: &TypeNameSpecifier) -> bool {
            self.with_mut(|c| c.$field.remove(spec)).unwrap_or(false)
        }

        /// Number of rules of this kind.
        #[must_use]
        pub fn $count(&self) -> usize {
            self.with(|c| c.$field.len()).unwrap_or(0)
        }

        /// Rule at an insertion index.
        #[must_use]
        pub fn $at(&self, index: usize) -> Option<(TypeNameSpecifier, $rule)> {
            self.with(|c| c.$field.at(index)).flatten()
        }

        /// The rule this category holds for a type.
        #[must_use]
        pub fn $for_type(&self, spec: &TypeNameSpecifier) -> Option<$rule> {
            self.with(|c| c.$field.lookup(spec)).flatten()
        }
    };
}

/// Handle to a category.
///
/// The handle does not keep the session alive; once the category is deleted
/// or the session destroyed, it reports `is_valid() == false`.
#[derive(Debug, Clone)]
pub struct TypeCategory {
    name: String,
    generation: u64,
    registry: Weak<Categories>,
}

impl TypeCategory {
    fn with<T>(&self, f: impl FnOnce(&CategoryData) -> T) -> Option<T> {
        let categories = self.registry.upgrade()?;
        let list = read(&categories);
        list.iter().find(|c| c.generation == self.generation).map(f)
    }

    fn with_mut<T>(&self, f: impl FnOnce(&mut CategoryData) -> T) -> Option<T> {
        let categories = self.registry.upgrade()?;
        let mut list = write(&categories);
        list.iter_mut().find(|c| c.generation == self.generation).map(f)
    }

    /// The category name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Check if the category still exists.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.with(|_| ()).is_some()
    }

    /// Check if the category takes part in lookups.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.with(|c| c.enabled).unwrap_or(false)
    }

    /// Enable (at highest priority) or disable the category.
    pub fn set_enabled(&self, enabled: bool) -> bool {
        let Some(categories) = self.registry.upgrade() else {
            return false;
        };
        let generation = self.generation;
        if enabled {
            enable_at(&categories, |c| c.generation == generation, 0)
        } else {
            set_disabled(&categories, |c| c.generation == generation)
        }
    }

    rule_accessors!(formats, TypeFormat, add_format, delete_format, num_formats, format_at_index, format_for_type);
    rule_accessors!(summaries, TypeSummary, add_summary, delete_summary, num_summaries, summary_at_index, summary_for_type);
    rule_accessors!(filters, TypeFilter, add_filter, delete_filter, num_filters, filter_at_index, filter_for_type);
    rule_accessors!(synthetics, TypeSynthetic, add_synthetic, delete_synthetic, num_synthetics, synthetic_at_index, synthetic_for_type);
}

impl PartialEq for TypeCategory {
    fn eq(&self, other: &Self) -> bool {
        self.generation == other.generation && self.registry.ptr_eq(&other.registry)
    }
}
