mod tag;

use std::any::{self, TypeId};
use std::borrow::Cow;
use std::fmt::{Debug, Display, Formatter, Result as FmtResult};
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};

pub use tag::Tag;

/// An opaque identifier under which services are registered.
///
/// A [`Token`] comes in three shapes:
///
/// - a name, e.g. `Token::named("config")`, which may be declared as a
///   `const`;
/// - a [`Symbol`], minted by [`Token::symbol`], which is unique for the whole
///   process even if two symbols share a description;
/// - a type, e.g. `Token::of::<Database>()`, identified by its [`TypeId`].
///
/// Tokens are only ever compared, hashed and displayed, never parsed.
///
/// # Examples
///
/// ```rust
/// # use ambit::token::Token;
/// const CONFIG: Token = Token::named("config");
///
/// assert_eq!(CONFIG, Token::named("config"));
/// assert_ne!(Token::symbol("config"), Token::symbol("config"));
/// assert_eq!(Token::of::<String>(), Token::of::<String>());
/// ```
#[derive(Clone, PartialEq, Eq, Hash)]
pub enum Token {
    Named(Cow<'static, str>),
    Symbol(Symbol),
    Type(TypeToken),
}

impl Token {
    pub const fn named(name: &'static str) -> Self {
        Self::Named(Cow::Borrowed(name))
    }

    pub fn owned(name: impl Into<String>) -> Self {
        Self::Named(Cow::Owned(name.into()))
    }

    pub fn symbol(description: &'static str) -> Self {
        Self::Symbol(Symbol::new(description))
    }

    pub fn of<T: ?Sized + 'static>() -> Self {
        Self::Type(TypeToken::of::<T>())
    }

    /// Pairs this token with a tag, producing the key of one registration.
    pub fn tagged(&self, tag: impl Into<Tag>) -> ServiceKey {
        ServiceKey::new(self.clone(), tag.into())
    }
}

impl Display for Token {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::Named(name) => write!(f, "{name}"),
            Self::Symbol(symbol) => write!(f, "{symbol}"),
            Self::Type(ty) => write!(f, "{}", ty.name()),
        }
    }
}

impl Debug for Token {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::Named(name) => write!(f, "Token({name:?})"),
            Self::Symbol(symbol) => write!(f, "Token({symbol:?})"),
            Self::Type(ty) => write!(f, "Token(<{}>)", ty.name()),
        }
    }
}

impl From<&'static str> for Token {
    fn from(name: &'static str) -> Self {
        Self::named(name)
    }
}

impl From<String> for Token {
    fn from(name: String) -> Self {
        Self::owned(name)
    }
}

impl From<Symbol> for Token {
    fn from(symbol: Symbol) -> Self {
        Self::Symbol(symbol)
    }
}

/// A process-unique token value. Two symbols are equal only if one is a clone
/// of the other.
#[derive(Clone)]
pub struct Symbol {
    id: u64,
    description: &'static str,
}

impl Symbol {
    pub fn new(description: &'static str) -> Self {
        static NEXT_ID: AtomicU64 = AtomicU64::new(0);
        Self {
            id: NEXT_ID.fetch_add(1, Ordering::Relaxed),
            description,
        }
    }
}

impl PartialEq for Symbol {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Symbol {}

impl Hash for Symbol {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl Display for Symbol {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "Symbol({})", self.description)
    }
}

impl Debug for Symbol {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "Symbol({})#{}", self.description, self.id)
    }
}

/// A token standing for a Rust type, compared by [`TypeId`].
#[derive(Clone, Copy)]
pub struct TypeToken {
    id: TypeId,
    name: &'static str,
}

impl TypeToken {
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: any::type_name::<T>(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for TypeToken {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeToken {}

impl Hash for TypeToken {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

/// The full identity of one registration: a [`Token`] plus a normalized
/// [`Tag`].
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct ServiceKey {
    token: Token,
    tag: Tag,
}

impl ServiceKey {
    pub fn new(token: Token, tag: Tag) -> Self {
        Self { token, tag }
    }

    pub fn token(&self) -> &Token {
        &self.token
    }

    pub fn tag(&self) -> &Tag {
        &self.tag
    }
}

impl Display for ServiceKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}@{}", self.token, self.tag)
    }
}

impl Debug for ServiceKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        Display::fmt(self, f)
    }
}

impl From<Token> for ServiceKey {
    fn from(token: Token) -> Self {
        Self::new(token, Tag::default())
    }
}

impl From<&Token> for ServiceKey {
    fn from(token: &Token) -> Self {
        Self::new(token.clone(), Tag::default())
    }
}

impl From<&ServiceKey> for ServiceKey {
    fn from(key: &ServiceKey) -> Self {
        key.clone()
    }
}

impl From<&'static str> for ServiceKey {
    fn from(name: &'static str) -> Self {
        Self::from(Token::named(name))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    struct Database;

    #[test]
    fn token_eq_succeeds_for_each_shape() {
        assert_eq!(Token::named("db"), Token::owned(String::from("db")));
        assert_ne!(Token::named("db"), Token::named("cache"));

        let symbol = Token::symbol("db");
        assert_eq!(symbol, symbol.clone());
        assert_ne!(symbol, Token::symbol("db"));

        assert_eq!(Token::of::<Database>(), Token::of::<Database>());
        assert_ne!(Token::of::<Database>(), Token::of::<String>());
    }

    #[test]
    fn token_display_succeeds() {
        assert_eq!(Token::named("db").to_string(), "db");
        assert_eq!(Token::symbol("db").to_string(), "Symbol(db)");
        assert!(Token::of::<Database>().to_string().ends_with("Database"));
    }

    #[test]
    fn service_key_hash_succeeds_when_tags_differ_only_in_case() {
        let mut keys = HashSet::new();
        keys.insert(Token::named("payment").tagged("Stripe"));
        keys.insert(Token::named("payment").tagged("STRIPE"));
        keys.insert(Token::named("payment").tagged("paypal"));
        assert_eq!(keys.len(), 2);
    }

    #[test]
    fn service_key_from_token_uses_default_tag() {
        let key = ServiceKey::from(Token::named("db"));
        assert_eq!(key.tag().as_str(), "default");
        assert_eq!(key.to_string(), "db@default");
    }
}
