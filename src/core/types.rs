//! Type specifiers, type information and the type registry
//!
//! Types live in namespaces (`System`, `FHIR`, …) and form a hierarchy
//! rooted at `System.Any`. The registry maps specifiers to their info and
//! answers subtype questions by walking base-type chains; FHIR's string-like
//! primitives reach `System.String` through their declared bases.

use std::fmt;
use std::sync::Arc;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

/// Namespace for the System model types
pub const SYSTEM_NAMESPACE: &str = "System";
/// Namespace for the FHIR model types
pub const FHIR_NAMESPACE: &str = "FHIR";

/// A (namespace, name) type reference, optionally list-valued
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TypeSpecifier {
    /// Type namespace (e.g. "System", "FHIR")
    pub namespace: String,
    /// Type name (e.g. "Integer", "Patient")
    pub name: String,
    /// True for list-of-T specifiers
    pub is_list: bool,
}

impl TypeSpecifier {
    /// Create a specifier
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
            is_list: false,
        }
    }

    /// Create a System-namespace specifier
    pub fn system(name: impl Into<String>) -> Self {
        Self::new(SYSTEM_NAMESPACE, name)
    }

    /// Create a FHIR-namespace specifier
    pub fn fhir(name: impl Into<String>) -> Self {
        Self::new(FHIR_NAMESPACE, name)
    }

    /// Parse a possibly-qualified name (`FHIR.Patient` or `Patient`); the
    /// unqualified form gets an empty namespace resolved later against the
    /// context's default namespace.
    pub fn parse(text: &str) -> Self {
        match text.split_once('.') {
            Some((ns, name)) => Self::new(ns, name),
            None => Self::new("", text),
        }
    }

    /// True when the namespace is still unresolved
    pub fn is_unqualified(&self) -> bool {
        self.namespace.is_empty()
    }
}

impl fmt::Display for TypeSpecifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.namespace.is_empty() {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{}.{}", self.namespace, self.name)
        }
    }
}

/// One element of a class type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassInfoElement {
    /// Element name
    pub name: String,
    /// Element type
    pub element_type: TypeSpecifier,
    /// True when the element repeats
    pub is_list: bool,
}

impl ClassInfoElement {
    /// Create an element description
    pub fn new(name: impl Into<String>, element_type: TypeSpecifier, is_list: bool) -> Self {
        Self {
            name: name.into(),
            element_type,
            is_list,
        }
    }
}

/// Self-describing type information
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TypeInfo {
    /// A primitive/simple type
    SimpleTypeInfo {
        /// Namespace of the type
        namespace: String,
        /// Name of the type
        name: String,
        /// Base type, if any
        base_type: Option<TypeSpecifier>,
    },
    /// A class (complex) type with named elements
    ClassInfo {
        /// Namespace of the type
        namespace: String,
        /// Name of the type
        name: String,
        /// Base type, if any
        base_type: Option<TypeSpecifier>,
        /// The class's elements
        elements: Vec<ClassInfoElement>,
    },
    /// A homogeneous list type
    ListTypeInfo {
        /// Element type of the list
        element_type: TypeSpecifier,
    },
    /// An anonymous tuple type
    TupleTypeInfo {
        /// The tuple's elements
        elements: Vec<ClassInfoElement>,
    },
}

impl TypeInfo {
    /// Shorthand for a simple type
    pub fn simple(
        namespace: impl Into<String>,
        name: impl Into<String>,
        base_type: Option<TypeSpecifier>,
    ) -> Self {
        Self::SimpleTypeInfo {
            namespace: namespace.into(),
            name: name.into(),
            base_type,
        }
    }

    /// Shorthand for a class type
    pub fn class(
        namespace: impl Into<String>,
        name: impl Into<String>,
        base_type: Option<TypeSpecifier>,
        elements: Vec<ClassInfoElement>,
    ) -> Self {
        Self::ClassInfo {
            namespace: namespace.into(),
            name: name.into(),
            base_type,
            elements,
        }
    }

    /// The specifier this info registers under, when it has a name
    pub fn specifier(&self) -> Option<TypeSpecifier> {
        match self {
            Self::SimpleTypeInfo { namespace, name, .. }
            | Self::ClassInfo { namespace, name, .. } => {
                Some(TypeSpecifier::new(namespace.clone(), name.clone()))
            }
            _ => None,
        }
    }

    /// The declared base type
    pub fn base_type(&self) -> Option<&TypeSpecifier> {
        match self {
            Self::SimpleTypeInfo { base_type, .. } | Self::ClassInfo { base_type, .. } => {
                base_type.as_ref()
            }
            _ => None,
        }
    }

    /// Look up an element by name on class and tuple types
    pub fn element(&self, name: &str) -> Option<&ClassInfoElement> {
        match self {
            Self::ClassInfo { elements, .. } | Self::TupleTypeInfo { elements } => {
                elements.iter().find(|e| e.name == name)
            }
            _ => None,
        }
    }
}

/// Registry of known types, extensible per release through the context
/// builder. Lookups key on (namespace, name).
#[derive(Debug, Clone, Default)]
pub struct TypeRegistry {
    types: FxHashMap<(String, String), TypeInfo>,
}

impl TypeRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry pre-loaded with the System types and the FHIR primitive
    /// hierarchy.
    pub fn standard() -> Arc<Self> {
        use once_cell::sync::Lazy;
        static STANDARD: Lazy<Arc<TypeRegistry>> = Lazy::new(|| {
            let mut registry = TypeRegistry::new();
            registry.register_system_types();
            registry.register_fhir_primitives();
            Arc::new(registry)
        });
        STANDARD.clone()
    }

    /// Register one type; later registrations replace earlier ones.
    pub fn register(&mut self, info: TypeInfo) {
        if let Some(spec) = info.specifier() {
            self.types.insert((spec.namespace, spec.name), info);
        }
    }

    /// Look up a fully-qualified specifier
    pub fn get(&self, specifier: &TypeSpecifier) -> Option<&TypeInfo> {
        self.types
            .get(&(specifier.namespace.clone(), specifier.name.clone()))
    }

    /// Resolve an unqualified name against the default namespace first and
    /// `System` second; qualified names pass through untouched.
    pub fn resolve(&self, specifier: &TypeSpecifier, default_namespace: &str) -> Option<TypeSpecifier> {
        if !specifier.is_unqualified() {
            return self.get(specifier).map(|_| specifier.clone());
        }
        let in_default = TypeSpecifier::new(default_namespace, specifier.name.clone());
        if self.get(&in_default).is_some() {
            return Some(in_default);
        }
        let in_system = TypeSpecifier::system(specifier.name.clone());
        if self.get(&in_system).is_some() {
            return Some(in_system);
        }
        None
    }

    /// True when `candidate` is `target` or reaches it through its base
    /// chain.
    pub fn sub_type_of(&self, target: &TypeSpecifier, candidate: &TypeSpecifier) -> bool {
        if target.namespace == SYSTEM_NAMESPACE && target.name == "Any" {
            return true;
        }
        let mut current = candidate.clone();
        loop {
            if current.namespace == target.namespace && current.name == target.name {
                return true;
            }
            match self.get(&current).and_then(TypeInfo::base_type) {
                Some(base) => current = base.clone(),
                None => return false,
            }
        }
    }

    /// The declared type of `element` on class `owner`, walking base classes.
    pub fn element_type(&self, owner: &TypeSpecifier, element: &str) -> Option<&ClassInfoElement> {
        let mut current = owner.clone();
        loop {
            let info = self.get(&current)?;
            if let Some(found) = info.element(element) {
                return Some(found);
            }
            current = info.base_type()?.clone();
        }
    }

    fn register_system_types(&mut self) {
        let any = TypeSpecifier::system("Any");
        self.register(TypeInfo::simple(SYSTEM_NAMESPACE, "Any", None));
        for name in [
            "Boolean", "String", "Integer", "Long", "Decimal", "Date", "DateTime", "Time",
            "Quantity",
        ] {
            self.register(TypeInfo::simple(SYSTEM_NAMESPACE, name, Some(any.clone())));
        }
    }

    fn register_fhir_primitives(&mut self) {
        let entries: &[(&str, TypeSpecifier)] = &[
            ("boolean", TypeSpecifier::system("Boolean")),
            ("string", TypeSpecifier::system("String")),
            // String-like primitives reach System.String through FHIR.string
            // or FHIR.uri; the numeric/boolean-derived primitives stay out.
            ("code", TypeSpecifier::fhir("string")),
            ("id", TypeSpecifier::fhir("string")),
            ("markdown", TypeSpecifier::fhir("string")),
            ("uri", TypeSpecifier::system("String")),
            ("url", TypeSpecifier::fhir("uri")),
            ("canonical", TypeSpecifier::fhir("uri")),
            ("oid", TypeSpecifier::fhir("uri")),
            ("uuid", TypeSpecifier::fhir("uri")),
            ("base64Binary", TypeSpecifier::system("String")),
            ("integer", TypeSpecifier::system("Integer")),
            ("positiveInt", TypeSpecifier::fhir("integer")),
            ("unsignedInt", TypeSpecifier::fhir("integer")),
            ("integer64", TypeSpecifier::system("Long")),
            ("decimal", TypeSpecifier::system("Decimal")),
            ("date", TypeSpecifier::system("Date")),
            ("dateTime", TypeSpecifier::system("DateTime")),
            ("instant", TypeSpecifier::fhir("dateTime")),
            ("time", TypeSpecifier::system("Time")),
        ];
        for (name, base) in entries {
            self.register(TypeInfo::simple(FHIR_NAMESPACE, *name, Some(base.clone())));
        }
        self.register(TypeInfo::class(
            FHIR_NAMESPACE,
            "Element",
            Some(TypeSpecifier::system("Any")),
            vec![],
        ));
        self.register(TypeInfo::class(
            FHIR_NAMESPACE,
            "Resource",
            Some(TypeSpecifier::system("Any")),
            vec![],
        ));
        self.register(TypeInfo::class(
            FHIR_NAMESPACE,
            "DomainResource",
            Some(TypeSpecifier::fhir("Resource")),
            vec![],
        ));
        self.register(TypeInfo::class(
            FHIR_NAMESPACE,
            "Quantity",
            Some(TypeSpecifier::fhir("Element")),
            vec![
                ClassInfoElement::new("value", TypeSpecifier::fhir("decimal"), false),
                ClassInfoElement::new("unit", TypeSpecifier::fhir("string"), false),
                ClassInfoElement::new("system", TypeSpecifier::fhir("uri"), false),
                ClassInfoElement::new("code", TypeSpecifier::fhir("code"), false),
            ],
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn specifier_parsing() {
        let qualified = TypeSpecifier::parse("FHIR.Patient");
        assert_eq!(qualified.namespace, "FHIR");
        assert_eq!(qualified.name, "Patient");

        let bare = TypeSpecifier::parse("instant");
        assert!(bare.is_unqualified());
    }

    #[test]
    fn resolution_prefers_default_namespace() {
        let registry = TypeRegistry::standard();
        let resolved = registry
            .resolve(&TypeSpecifier::parse("string"), FHIR_NAMESPACE)
            .unwrap();
        assert_eq!(resolved.namespace, FHIR_NAMESPACE);

        let resolved = registry
            .resolve(&TypeSpecifier::parse("String"), FHIR_NAMESPACE)
            .unwrap();
        assert_eq!(resolved.namespace, SYSTEM_NAMESPACE);
    }

    #[test]
    fn string_like_primitives_are_strings() {
        let registry = TypeRegistry::standard();
        let system_string = TypeSpecifier::system("String");
        for name in ["code", "uri", "id", "canonical", "markdown"] {
            assert!(
                registry.sub_type_of(&system_string, &TypeSpecifier::fhir(name)),
                "FHIR.{name} should reach System.String"
            );
        }
        assert!(!registry.sub_type_of(&system_string, &TypeSpecifier::fhir("boolean")));
        assert!(!registry.sub_type_of(&system_string, &TypeSpecifier::fhir("integer")));
    }

    #[test]
    fn everything_is_any() {
        let registry = TypeRegistry::standard();
        let any = TypeSpecifier::system("Any");
        assert!(registry.sub_type_of(&any, &TypeSpecifier::fhir("instant")));
        assert!(registry.sub_type_of(&any, &TypeSpecifier::system("Boolean")));
    }

    #[test]
    fn instant_is_a_datetime() {
        let registry = TypeRegistry::standard();
        assert!(registry.sub_type_of(
            &TypeSpecifier::system("DateTime"),
            &TypeSpecifier::fhir("instant")
        ));
        assert!(registry.sub_type_of(
            &TypeSpecifier::fhir("dateTime"),
            &TypeSpecifier::fhir("instant")
        ));
    }

    #[test]
    fn element_lookup_walks_bases() {
        let mut registry = TypeRegistry::new();
        registry.register_system_types();
        registry.register_fhir_primitives();
        registry.register(TypeInfo::class(
            FHIR_NAMESPACE,
            "Observation",
            Some(TypeSpecifier::fhir("DomainResource")),
            vec![ClassInfoElement::new(
                "issued",
                TypeSpecifier::fhir("instant"),
                false,
            )],
        ));
        let observation = TypeSpecifier::fhir("Observation");
        let issued = registry.element_type(&observation, "issued").unwrap();
        assert_eq!(issued.element_type, TypeSpecifier::fhir("instant"));
        assert!(registry.element_type(&observation, "nope").is_none());
    }
}
