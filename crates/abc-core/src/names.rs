//! Namespaces and qualified names.
//!
//! These are the already-resolved facts the emitter receives from semantic
//! analysis: which namespace a name lives in, and which type a reference
//! denotes. The emitter never decides them, it only encodes them.

use std::fmt;

/// The category of a namespace.
///
/// The category selects the namespace's constant kind in the pool and
/// whether it takes part in API versioning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NamespaceKind {
    /// The wildcard namespace. Always encoded as index 0.
    Any,
    /// A public package namespace (`package flash.display`).
    Package,
    /// The internal namespace of a package.
    PackageInternal,
    /// A class-private namespace.
    Private,
    /// A class-protected namespace.
    Protected,
    /// The protected namespace for static members.
    StaticProtected,
    /// A namespace named explicitly in source.
    Explicit,
    /// Any other user-defined namespace.
    User,
}

/// A resolved namespace: its category plus its URI.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Namespace {
    pub kind: NamespaceKind,
    pub uri: String,
}

impl Namespace {
    /// Create a namespace of the given kind.
    pub fn new(kind: NamespaceKind, uri: impl Into<String>) -> Self {
        Self {
            kind,
            uri: uri.into(),
        }
    }

    /// The wildcard namespace.
    pub fn any() -> Self {
        Self::new(NamespaceKind::Any, "")
    }

    /// The unnamed public package namespace.
    pub fn public() -> Self {
        Self::package("")
    }

    /// A public package namespace.
    pub fn package(uri: impl Into<String>) -> Self {
        Self::new(NamespaceKind::Package, uri)
    }

    /// The internal namespace of a package.
    pub fn internal(uri: impl Into<String>) -> Self {
        Self::new(NamespaceKind::PackageInternal, uri)
    }

    pub fn private(uri: impl Into<String>) -> Self {
        Self::new(NamespaceKind::Private, uri)
    }

    pub fn protected(uri: impl Into<String>) -> Self {
        Self::new(NamespaceKind::Protected, uri)
    }

    pub fn user(uri: impl Into<String>) -> Self {
        Self::new(NamespaceKind::User, uri)
    }

    /// Whether this is the wildcard namespace.
    pub fn is_any(&self) -> bool {
        self.kind == NamespaceKind::Any
    }

    /// Whether API versioning may alias this namespace.
    ///
    /// Only public package namespaces carry version marks. Private,
    /// protected, internal and explicit namespaces never do.
    pub fn is_versioned(&self) -> bool {
        self.kind == NamespaceKind::Package
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.kind {
            NamespaceKind::Any => return f.write_str("*"),
            NamespaceKind::Private => "private",
            NamespaceKind::Protected | NamespaceKind::StaticProtected => "protected",
            NamespaceKind::PackageInternal => "internal",
            _ => "public",
        };
        write!(f, "{kind} {}", self.uri)
    }
}

/// A name qualified by exactly one namespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QName {
    pub namespace: Namespace,
    pub name: String,
}

impl QName {
    pub fn new(namespace: Namespace, name: impl Into<String>) -> Self {
        Self {
            namespace,
            name: name.into(),
        }
    }

    /// A name in the unnamed public package.
    pub fn public(name: impl Into<String>) -> Self {
        Self::new(Namespace::public(), name)
    }

    /// Whether this denotes the any-type `*`.
    pub fn is_any(&self) -> bool {
        self.name == "*"
    }
}

impl fmt::Display for QName {
    /// `uri:name`, or just `name` when the namespace URI is empty.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.namespace.uri.is_empty() {
            f.write_str(&self.name)
        } else {
            write!(f, "{}:{}", self.namespace.uri, self.name)
        }
    }
}

/// A reference to a type, possibly parameterized (`Vector.<int>`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeName {
    pub name: QName,
    pub params: Vec<TypeName>,
}

impl TypeName {
    pub fn new(name: QName) -> Self {
        Self {
            name,
            params: Vec::new(),
        }
    }

    /// A type in the unnamed public package.
    pub fn public(name: impl Into<String>) -> Self {
        Self::new(QName::public(name))
    }

    /// The any-type `*`.
    pub fn any() -> Self {
        Self::public("*")
    }

    /// Add type parameters.
    pub fn with_params(mut self, params: Vec<TypeName>) -> Self {
        self.params = params;
        self
    }

    pub fn is_any(&self) -> bool {
        self.name.is_any()
    }

    pub fn is_parameterized(&self) -> bool {
        !self.params.is_empty()
    }
}

impl From<QName> for TypeName {
    fn from(name: QName) -> Self {
        Self::new(name)
    }
}

impl fmt::Display for TypeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if !self.params.is_empty() {
            f.write_str(".<")?;
            for (i, param) in self.params.iter().enumerate() {
                if i > 0 {
                    f.write_str(",")?;
                }
                write!(f, "{param}")?;
            }
            f.write_str(">")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_package_namespaces_are_versioned() {
        assert!(Namespace::package("flash.display").is_versioned());
        assert!(Namespace::public().is_versioned());
        assert!(!Namespace::internal("flash.display").is_versioned());
        assert!(!Namespace::private("Foo").is_versioned());
        assert!(!Namespace::protected("Foo").is_versioned());
        assert!(!Namespace::new(NamespaceKind::Explicit, "ns").is_versioned());
        assert!(!Namespace::user("http://example.com").is_versioned());
    }

    #[test]
    fn qname_display() {
        assert_eq!(QName::public("Foo").to_string(), "Foo");
        let name = QName::new(Namespace::package("flash.display"), "Sprite");
        assert_eq!(name.to_string(), "flash.display:Sprite");
    }

    #[test]
    fn type_name_display() {
        let vector = TypeName::new(QName::new(Namespace::package("__AS3__.vec"), "Vector"))
            .with_params(vec![TypeName::public("int")]);
        assert!(vector.is_parameterized());
        assert_eq!(vector.to_string(), "__AS3__.vec:Vector.<int>");
    }

    #[test]
    fn any_type() {
        assert!(TypeName::any().is_any());
        assert!(!TypeName::public("int").is_any());
        assert!(Namespace::any().is_any());
    }
}
