//! Object spec registry for patchbay patches.
//!
//! Every object placed in a patch is identified by its type text: a name
//! followed by literal arguments (`"osc~ 440"`, `"pack f f f"`). This crate
//! maps that text to the object's [`Arity`], the number of inlets and outlets
//! it exposes, so the patch graph knows which iolets exist.
//!
//! # Resolution
//!
//! - **Fixed-arity objects**: a constant `(inlets, outlets)` pair keyed by name.
//! - **Variadic objects**: a rule evaluated against the literal arguments
//!   (`pack`, `sel`/`select`, `unpack`, `trigger`/`t`).
//! - Anything else is [`RegistryError::UnknownObjectType`]. Unknown objects are
//!   still placeable; they just have no iolets.
//!
//! Resolution is pure: no I/O, no interior state, identical input gives
//! identical output. The registry is immutable after construction and is
//! meant to be built once by the process root and shared by reference.
//!
//! # Example
//!
//! ```rust
//! use patchbay_registry::{Arity, ObjectRegistry};
//!
//! let registry = ObjectRegistry::new();
//!
//! assert_eq!(registry.resolve("osc~ 440").unwrap(), Arity::new(2, 1));
//! assert_eq!(registry.resolve("pack f f f").unwrap(), Arity::new(3, 1));
//! assert_eq!(registry.resolve("sel 1 2").unwrap(), Arity::new(1, 3));
//! assert!(registry.resolve("no-such-object").is_err());
//! ```

use std::collections::HashMap;
use std::fmt;

use thiserror::Error;

/// Inlet and outlet counts of an object type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Arity {
    /// Number of inlets.
    pub inlets: usize,
    /// Number of outlets.
    pub outlets: usize,
}

impl Arity {
    /// Creates an arity pair.
    pub const fn new(inlets: usize, outlets: usize) -> Self {
        Self { inlets, outlets }
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} in / {} out", self.inlets, self.outlets)
    }
}

/// Errors produced by arity resolution.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// The type text names no registered object (or is empty).
    #[error("unknown object type: '{0}'")]
    UnknownObjectType(String),
}

/// Coarse grouping used when listing objects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectCategory {
    /// Message-rate objects (math, routing, MIDI, GUI).
    Control,
    /// Audio-rate objects; by convention their names end in `~`.
    Signal,
}

impl ObjectCategory {
    /// Returns a human-readable name for the category.
    pub const fn name(&self) -> &'static str {
        match self {
            ObjectCategory::Control => "Control",
            ObjectCategory::Signal => "Signal",
        }
    }

    fn of(name: &str) -> Self {
        if name.ends_with('~') {
            ObjectCategory::Signal
        } else {
            ObjectCategory::Control
        }
    }
}

/// Variadic rule: computes an arity from the literal arguments.
pub type VariadicRule = fn(&[&str]) -> Arity;

/// How an object's arity is determined.
#[derive(Clone, Copy)]
pub enum ObjectSpec {
    /// Constant arity independent of arguments.
    Fixed(Arity),
    /// Arity computed from the literal argument list.
    Variadic(VariadicRule),
}

impl ObjectSpec {
    /// Evaluates the spec against a list of literal arguments.
    pub fn arity(&self, args: &[&str]) -> Arity {
        match self {
            ObjectSpec::Fixed(arity) => *arity,
            ObjectSpec::Variadic(rule) => rule(args),
        }
    }

    /// Whether the arity depends on the arguments.
    pub fn is_variadic(&self) -> bool {
        matches!(self, ObjectSpec::Variadic(_))
    }
}

impl fmt::Debug for ObjectSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ObjectSpec::Fixed(arity) => f.debug_tuple("Fixed").field(arity).finish(),
            ObjectSpec::Variadic(_) => f.write_str("Variadic(..)"),
        }
    }
}

/// A registered object type, as returned by listing queries.
#[derive(Debug, Clone, Copy)]
pub struct ObjectDescriptor {
    /// Object name as typed in a patch (`"osc~"`, `"pack"`).
    pub name: &'static str,
    /// Category for organization.
    pub category: ObjectCategory,
    /// Arity rule.
    pub spec: ObjectSpec,
}

/// Routing/selection by value: one outlet per argument plus a reject outlet.
fn select_rule(args: &[&str]) -> Arity {
    Arity::new(1, args.len() + 1)
}

/// Packing: one inlet per argument, never fewer than two.
fn pack_rule(args: &[&str]) -> Arity {
    Arity::new(args.len().max(2), 1)
}

/// Unpacking/triggering: one outlet per argument, two when bare.
fn unpack_rule(args: &[&str]) -> Arity {
    if args.is_empty() {
        Arity::new(1, 2)
    } else {
        Arity::new(1, args.len())
    }
}

const VARIADIC_OBJECTS: &[(&str, VariadicRule)] = &[
    ("pack", pack_rule),
    ("sel", select_rule),
    ("select", select_rule),
    ("unpack", unpack_rule),
    ("trigger", unpack_rule),
    ("t", unpack_rule),
];

const FIXED_OBJECTS: &[(&str, usize, usize)] = &[
    // Control: binary operators
    ("!=", 2, 1),
    ("%", 2, 1),
    ("&", 2, 1),
    ("&&", 2, 1),
    ("|", 2, 1),
    ("||", 2, 1),
    ("*", 2, 1),
    ("+", 2, 1),
    ("-", 2, 1),
    ("/", 2, 1),
    ("<", 2, 1),
    ("<<", 2, 1),
    ("<=", 2, 1),
    ("==", 2, 1),
    (">", 2, 1),
    (">=", 2, 1),
    (">>", 2, 1),
    // Control: math, timing, storage, routing
    ("abs", 1, 1),
    ("atan", 1, 1),
    ("atan2", 2, 1),
    ("b", 1, 1),
    ("bang", 1, 1),
    ("change", 1, 1),
    ("clip", 3, 1),
    ("cos", 1, 1),
    ("dbtopow", 1, 1),
    ("dbtorms", 1, 1),
    ("declare", 0, 0),
    ("del", 2, 1),
    ("delay", 2, 1),
    ("div", 2, 1),
    ("exp", 1, 1),
    ("f", 2, 1),
    ("float", 2, 1),
    ("ftom", 1, 1),
    ("i", 2, 1),
    ("inlet", 0, 1),
    ("int", 2, 1),
    ("line", 3, 1),
    ("loadbang", 0, 1),
    ("log", 2, 1),
    ("makenote", 3, 2),
    ("max", 2, 1),
    ("metro", 2, 1),
    ("min", 2, 1),
    ("mod", 2, 1),
    ("moses", 2, 2),
    ("mtof", 1, 1),
    ("outlet", 1, 0),
    ("pipe", 2, 1),
    ("poly", 2, 3),
    ("pow", 2, 1),
    ("powtodb", 1, 1),
    ("print", 1, 0),
    ("r", 0, 1),
    ("random", 2, 1),
    ("receive", 0, 1),
    ("rmstodb", 1, 1),
    ("route", 2, 2),
    ("s", 2, 0),
    ("send", 0, 2),
    ("sin", 1, 1),
    ("spigot", 2, 1),
    ("sqrt", 1, 1),
    ("swap", 2, 2),
    ("symbol", 2, 1),
    ("table", 0, 0),
    ("tabread", 1, 1),
    ("tabwrite", 2, 0),
    ("tan", 1, 1),
    ("timer", 2, 1),
    ("until", 2, 1),
    ("wrap", 1, 1),
    // Control: GUI
    ("bng", 1, 1),
    ("cnv", 0, 0),
    ("floatatom", 1, 1),
    ("hradio", 1, 1),
    ("hsl", 1, 1),
    ("nbx", 1, 1),
    ("symbolatom", 1, 1),
    ("tgl", 1, 1),
    ("vradio", 1, 1),
    ("vsl", 1, 1),
    // Control: MIDI and touch
    ("bendin", 0, 2),
    ("bendout", 2, 0),
    ("ctlin", 0, 3),
    ("ctlout", 3, 0),
    ("midiin", 0, 2),
    ("midiout", 2, 0),
    ("notein", 0, 3),
    ("noteout", 3, 0),
    ("pgmin", 2, 1),
    ("pgmout", 0, 2),
    ("touchin", 0, 2),
    ("touchout", 2, 0),
    // Signal
    ("*~", 2, 1),
    ("+~", 2, 1),
    ("-~", 2, 1),
    ("/~", 2, 1),
    ("abs~", 1, 1),
    ("adc~", 1, 2),
    ("biquad~", 1, 1),
    ("bp~", 3, 1),
    ("catch~", 0, 1),
    ("clip~", 3, 1),
    ("cos~", 1, 1),
    ("cpole~", 4, 2),
    ("czero_rev~", 4, 2),
    ("czero~", 4, 2),
    ("dac~", 2, 0),
    ("dbtopow~", 1, 1),
    ("dbtorms~", 1, 1),
    ("delread~", 1, 1),
    ("delwrite~", 1, 0),
    ("env~", 1, 1),
    ("exp~", 1, 1),
    ("ftom~", 1, 1),
    ("hip~", 2, 1),
    ("inlet~", 1, 1),
    ("line~", 2, 1),
    ("lop~", 2, 1),
    ("max~", 2, 1),
    ("min~", 2, 1),
    ("mtof~", 1, 1),
    ("noise~", 1, 1),
    ("osc~", 2, 1),
    ("outlet~", 1, 0),
    ("phasor~", 2, 1),
    ("powtodb~", 1, 1),
    ("pow~", 2, 1),
    ("q8_rsqrt~", 1, 1),
    ("q8_sqrt~", 1, 1),
    ("receive~", 1, 1),
    ("rmstodb~", 1, 1),
    ("rpole~", 2, 1),
    ("rsqrt~", 1, 1),
    ("rzero_rev~", 2, 1),
    ("rzero~", 2, 1),
    ("r~", 1, 1),
    ("samphold~", 2, 1),
    ("samplerate~", 1, 1),
    ("send~", 1, 1),
    ("sig~", 1, 1),
    ("snapshot~", 1, 1),
    ("sqrt~", 1, 1),
    ("s~", 1, 0),
    ("tabosc4~", 2, 1),
    ("tabplay~", 1, 2),
    ("tabread4~", 2, 1),
    ("tabread~", 1, 1),
    ("tabwrite~", 1, 0),
    ("throw~", 1, 0),
    ("vcf~", 3, 2),
    ("vd~", 1, 1),
    ("wrap~", 1, 1),
];

/// Splits type text into its object name and literal arguments.
///
/// Tokens are separated by any run of whitespace. Returns `None` for blank
/// text.
///
/// ```rust
/// let (name, args) = patchbay_registry::tokenize("pack f  f").unwrap();
/// assert_eq!(name, "pack");
/// assert_eq!(args, vec!["f", "f"]);
/// ```
pub fn tokenize(type_text: &str) -> Option<(&str, Vec<&str>)> {
    let mut tokens = type_text.split_whitespace();
    let name = tokens.next()?;
    Some((name, tokens.collect()))
}

/// Immutable table of every known object type.
///
/// Fixed-arity entries are consulted before variadic ones, so a name can
/// never resolve differently depending on registration order.
pub struct ObjectRegistry {
    fixed: HashMap<&'static str, Arity>,
    variadic: HashMap<&'static str, VariadicRule>,
}

impl Default for ObjectRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ObjectRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectRegistry")
            .field("fixed", &self.fixed.len())
            .field("variadic", &self.variadic.len())
            .finish()
    }
}

impl ObjectRegistry {
    /// Creates a registry with every built-in object registered.
    pub fn new() -> Self {
        let fixed = FIXED_OBJECTS
            .iter()
            .map(|&(name, inlets, outlets)| (name, Arity::new(inlets, outlets)))
            .collect();
        let variadic = VARIADIC_OBJECTS.iter().copied().collect();
        Self { fixed, variadic }
    }

    /// Resolves the arity of a full type text (`"name arg1 arg2 ..."`).
    pub fn resolve(&self, type_text: &str) -> Result<Arity, RegistryError> {
        let (name, args) = tokenize(type_text)
            .ok_or_else(|| RegistryError::UnknownObjectType(type_text.to_string()))?;
        self.resolve_args(name, &args)
    }

    /// Resolves the arity of an already tokenized object.
    pub fn resolve_args(&self, name: &str, args: &[&str]) -> Result<Arity, RegistryError> {
        if let Some(arity) = self.fixed.get(name) {
            return Ok(*arity);
        }
        if let Some(rule) = self.variadic.get(name) {
            return Ok(rule(args));
        }
        Err(RegistryError::UnknownObjectType(name.to_string()))
    }

    /// Get the spec registered under a name.
    pub fn get(&self, name: &str) -> Option<ObjectSpec> {
        self.fixed
            .get(name)
            .map(|a| ObjectSpec::Fixed(*a))
            .or_else(|| self.variadic.get(name).map(|r| ObjectSpec::Variadic(*r)))
    }

    /// Whether a name is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.fixed.contains_key(name) || self.variadic.contains_key(name)
    }

    /// Returns descriptors for all registered objects, sorted by name.
    pub fn all_objects(&self) -> Vec<ObjectDescriptor> {
        let mut all: Vec<ObjectDescriptor> = self
            .fixed
            .iter()
            .map(|(&name, &arity)| ObjectDescriptor {
                name,
                category: ObjectCategory::of(name),
                spec: ObjectSpec::Fixed(arity),
            })
            .chain(self.variadic.iter().map(|(&name, &rule)| ObjectDescriptor {
                name,
                category: ObjectCategory::of(name),
                spec: ObjectSpec::Variadic(rule),
            }))
            .collect();
        all.sort_by(|a, b| a.name.cmp(b.name));
        all
    }

    /// Returns descriptors for objects in a specific category, sorted by name.
    pub fn objects_in_category(&self, category: ObjectCategory) -> Vec<ObjectDescriptor> {
        self.all_objects()
            .into_iter()
            .filter(|d| d.category == category)
            .collect()
    }

    /// Returns the number of registered objects.
    pub fn len(&self) -> usize {
        self.fixed.len() + self.variadic.len()
    }

    /// Returns true if no objects are registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_creation() {
        let registry = ObjectRegistry::new();
        assert_eq!(registry.len(), FIXED_OBJECTS.len() + VARIADIC_OBJECTS.len());
        assert!(!registry.is_empty());
    }

    #[test]
    fn test_fixed_table_has_no_duplicates() {
        let registry = ObjectRegistry::new();
        assert_eq!(registry.fixed.len(), FIXED_OBJECTS.len());
    }

    #[test]
    fn test_every_fixed_entry_resolves_to_its_pair() {
        let registry = ObjectRegistry::new();
        for &(name, inlets, outlets) in FIXED_OBJECTS {
            assert_eq!(
                registry.resolve(name).unwrap(),
                Arity::new(inlets, outlets),
                "wrong arity for {name}"
            );
        }
    }

    #[test]
    fn test_fixed_ignores_arguments() {
        let registry = ObjectRegistry::new();
        assert_eq!(registry.resolve("osc~ 440").unwrap(), Arity::new(2, 1));
        assert_eq!(registry.resolve("metro 500 1").unwrap(), Arity::new(2, 1));
    }

    #[test]
    fn test_variadic_pack() {
        let registry = ObjectRegistry::new();
        assert_eq!(registry.resolve("pack a b c").unwrap(), Arity::new(3, 1));
        assert_eq!(registry.resolve("pack").unwrap(), Arity::new(2, 1));
        assert_eq!(registry.resolve("pack f").unwrap(), Arity::new(2, 1));
    }

    #[test]
    fn test_variadic_select() {
        let registry = ObjectRegistry::new();
        assert_eq!(registry.resolve("sel 1 2").unwrap(), Arity::new(1, 3));
        assert_eq!(registry.resolve("select").unwrap(), Arity::new(1, 1));
    }

    #[test]
    fn test_variadic_unpack_and_trigger() {
        let registry = ObjectRegistry::new();
        assert_eq!(registry.resolve("unpack").unwrap(), Arity::new(1, 2));
        assert_eq!(registry.resolve("unpack f f f").unwrap(), Arity::new(1, 3));
        assert_eq!(registry.resolve("trigger f b").unwrap(), Arity::new(1, 2));
        assert_eq!(registry.resolve("t b").unwrap(), Arity::new(1, 1));
    }

    #[test]
    fn test_unknown_and_blank() {
        let registry = ObjectRegistry::new();
        assert_eq!(
            registry.resolve("frobnicate 3"),
            Err(RegistryError::UnknownObjectType("frobnicate".into()))
        );
        assert!(registry.resolve("").is_err());
        assert!(registry.resolve("   ").is_err());
    }

    #[test]
    fn test_whitespace_tolerant() {
        let registry = ObjectRegistry::new();
        assert_eq!(registry.resolve("  pack \t f   f  f ").unwrap(), Arity::new(3, 1));
    }

    #[test]
    fn test_categories() {
        let registry = ObjectRegistry::new();
        let signal = registry.objects_in_category(ObjectCategory::Signal);
        assert!(signal.iter().all(|d| d.name.ends_with('~')));
        assert!(signal.iter().any(|d| d.name == "dac~"));

        let control = registry.objects_in_category(ObjectCategory::Control);
        assert!(control.iter().any(|d| d.name == "pack" && d.spec.is_variadic()));
        assert_eq!(signal.len() + control.len(), registry.len());
    }

    #[test]
    fn test_get_spec() {
        let registry = ObjectRegistry::new();
        assert!(matches!(registry.get("dac~"), Some(ObjectSpec::Fixed(a)) if a == Arity::new(2, 0)));
        assert!(registry.get("t").is_some_and(|s| s.is_variadic()));
        assert!(registry.get("nope").is_none());
        assert!(registry.contains("pack"));
    }

    #[test]
    fn test_arity_display() {
        assert_eq!(Arity::new(2, 1).to_string(), "2 in / 1 out");
    }
}
