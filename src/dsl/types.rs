//! Declared value types and the compatibility check used by assignments,
//! index writes and user-function calls.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeName {
    Str,
    Txt,
    Num,
    List,
    Dict,
    Loc,
    Par,
    Pot,
    Item,
    Block,
    Any,
    Vec,
    Gval,
}

impl TypeName {
    pub fn from_keyword(word: &str) -> Option<Self> {
        Some(match word {
            "str" => TypeName::Str,
            "txt" => TypeName::Txt,
            "num" => TypeName::Num,
            "list" => TypeName::List,
            "dict" => TypeName::Dict,
            "loc" => TypeName::Loc,
            "par" => TypeName::Par,
            "pot" => TypeName::Pot,
            "item" => TypeName::Item,
            "block" => TypeName::Block,
            "any" => TypeName::Any,
            "vec" => TypeName::Vec,
            "gval" => TypeName::Gval,
            _ => return None,
        })
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TypeName::Str => "str",
            TypeName::Txt => "txt",
            TypeName::Num => "num",
            TypeName::List => "list",
            TypeName::Dict => "dict",
            TypeName::Loc => "loc",
            TypeName::Par => "par",
            TypeName::Pot => "pot",
            TypeName::Item => "item",
            TypeName::Block => "block",
            TypeName::Any => "any",
            TypeName::Vec => "vec",
            TypeName::Gval => "gval",
        }
    }

    /// Type code of a function parameter item. `gval` has none.
    pub fn parameter_code(self) -> Option<&'static str> {
        Some(match self {
            TypeName::Str => "txt",
            TypeName::Txt => "comp",
            TypeName::Num => "num",
            TypeName::List => "list",
            TypeName::Dict => "dict",
            TypeName::Loc => "loc",
            TypeName::Par => "part",
            TypeName::Pot => "pot",
            TypeName::Item => "item",
            TypeName::Block => "block",
            TypeName::Any => "any",
            TypeName::Vec => "vec",
            TypeName::Gval => return None,
        })
    }

    /// Argument type name used by native action descriptors in the catalog.
    pub fn argument_code(self) -> &'static str {
        match self {
            TypeName::Str => "TEXT",
            TypeName::Txt => "COMPONENT",
            TypeName::Num => "NUMBER",
            TypeName::Loc => "LOCATION",
            TypeName::Par => "PARTICLE",
            TypeName::Vec => "VECTOR",
            TypeName::Item => "ITEM",
            TypeName::Block => "BLOCK",
            TypeName::Any => "ANY_TYPE",
            TypeName::Pot => "POTION",
            TypeName::Dict => "DICT",
            TypeName::List => "LIST",
            TypeName::Gval => "GAME_VALUE",
        }
    }

    /// Inverse of [`TypeName::argument_code`].
    pub fn from_argument_code(code: &str) -> Option<Self> {
        Some(match code {
            "TEXT" => TypeName::Str,
            "COMPONENT" => TypeName::Txt,
            "NUMBER" => TypeName::Num,
            "LOCATION" => TypeName::Loc,
            "PARTICLE" => TypeName::Par,
            "VECTOR" => TypeName::Vec,
            "ITEM" => TypeName::Item,
            "BLOCK" => TypeName::Block,
            "ANY_TYPE" => TypeName::Any,
            "POTION" => TypeName::Pot,
            "DICT" => TypeName::Dict,
            "LIST" => TypeName::List,
            "GAME_VALUE" => TypeName::Gval,
            _ => return None,
        })
    }
}

impl fmt::Display for TypeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Key of an entry recorded while building a container literal.
#[derive(Debug, Clone, PartialEq)]
pub enum EntryKey {
    Key(String),
    Position(usize),
}

impl fmt::Display for EntryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryKey::Key(k) => write!(f, "\"{k}\""),
            EntryKey::Position(i) => write!(f, "#{}", i + 1),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    pub key: EntryKey,
    pub ty: Type,
}

/// A declared type such as `num` or `dict<list<str>>`.
///
/// `entries` is only set on the type of a freshly built dict/list literal (or a
/// cast of one); it lets the literal be checked per element instead of by its
/// generic `any` element type.
#[derive(Debug, Clone, PartialEq)]
pub struct Type {
    pub name: TypeName,
    pub params: Vec<Type>,
    pub entries: Option<Vec<Entry>>,
}

impl Type {
    pub fn new(name: TypeName, params: Vec<Type>) -> Self {
        Self {
            name,
            params,
            entries: None,
        }
    }

    pub fn simple(name: TypeName) -> Self {
        Self::new(name, Vec::new())
    }

    pub fn any() -> Self {
        Self::simple(TypeName::Any)
    }

    pub fn num() -> Self {
        Self::simple(TypeName::Num)
    }

    pub fn list_of(element: Type) -> Self {
        Self::new(TypeName::List, vec![element])
    }

    /// Declared element type of a container, `any` when unparameterized.
    pub fn element_type(&self) -> Type {
        self.params.first().cloned().unwrap_or_else(Type::any)
    }

    pub fn with_entries(mut self, entries: Vec<Entry>) -> Self {
        self.entries = Some(entries);
        self
    }

    pub fn is(&self, name: TypeName) -> bool {
        self.name == name
    }

    /// Whether a value of type `actual` may be stored where `self` is expected.
    pub fn accepts(&self, actual: &Type) -> bool {
        matches!(compare(self, actual), Compat::Yes)
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if !self.params.is_empty() {
            let params: Vec<String> = self.params.iter().map(ToString::to_string).collect();
            write!(f, "<{}>", params.join(", "))?;
        }
        Ok(())
    }
}

/// Outcome of [`compare`].
#[derive(Debug, Clone, PartialEq)]
pub enum Compat {
    Yes,
    No,
    /// A recorded literal entry does not satisfy the expected element type.
    Entry { key: EntryKey, ty: Type },
}

/// Structural compatibility of `actual` against the acceptor `expected`.
///
/// Asymmetric: `any` on the expected side accepts everything, and only the
/// actual side's recorded literal entries are consulted.
pub fn compare(expected: &Type, actual: &Type) -> Compat {
    if expected.is(TypeName::Any) {
        return Compat::Yes;
    }
    if expected.name != actual.name || expected.params.len() != actual.params.len() {
        return Compat::No;
    }

    if matches!(expected.name, TypeName::Dict | TypeName::List) {
        let element = expected.element_type();
        return match &actual.entries {
            Some(entries) => {
                for entry in entries {
                    if !element.accepts(&entry.ty) {
                        return Compat::Entry {
                            key: entry.key.clone(),
                            ty: entry.ty.clone(),
                        };
                    }
                }
                Compat::Yes
            }
            None => compare(&element, &actual.element_type()),
        };
    }

    for (e, a) in expected.params.iter().zip(&actual.params) {
        if !e.accepts(a) {
            return Compat::No;
        }
    }
    Compat::Yes
}

/// Name-only comparison used against native action descriptors.
pub fn compare_simple(expected: &str, actual: &str) -> bool {
    expected == "any" || expected == "ANY_TYPE" || expected == actual
}
