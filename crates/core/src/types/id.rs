//! Newtype IDs for type-safe entity references.
//!
//! Snapshot entities are keyed by identifiers minted upstream, so the
//! wrappers hold strings rather than local integers. The `define_id!` macro
//! keeps the two ID types from being mixed up at compile time.

/// Macro to define a type-safe string ID wrapper.
///
/// Creates a newtype wrapper around `String` with:
/// - `Serialize`/`Deserialize` with `#[serde(transparent)]`
/// - `Debug`, `Clone`, `PartialEq`, `Eq`, `Hash`
/// - Conversion methods: `new()`, `as_str()`, `into_inner()`
/// - `From<String>` / `From<&str>` implementations
///
/// # Example
///
/// ```rust
/// # use tidecart_core::define_id;
/// define_id!(ProductId);
/// define_id!(UserId);
///
/// let product_id = ProductId::new("42");
/// let user_id = UserId::new("42");
///
/// // These are different types, so this won't compile:
/// // let _: ProductId = user_id;
/// ```
#[macro_export]
macro_rules! define_id {
    ($name:ident) => {
        #[derive(
            Debug,
            Clone,
            PartialEq,
            Eq,
            Hash,
            ::serde::Serialize,
            ::serde::Deserialize
        )]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create a new ID from anything string-like.
            #[must_use]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Get the underlying identifier.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consume the wrapper and return the inner string.
            #[must_use]
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl ::core::fmt::Display for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_owned())
            }
        }
    };
}

define_id!(ProductId);
define_id!(UserId);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_display_matches_inner() {
        let id = ProductId::new("gid://shop/Product/42");
        assert_eq!(id.to_string(), "gid://shop/Product/42");
        assert_eq!(id.as_str(), "gid://shop/Product/42");
    }

    #[test]
    fn test_id_from_conversions() {
        let a = ProductId::from("42");
        let b = ProductId::from("42".to_owned());
        assert_eq!(a, b);
    }

    #[test]
    fn test_serde_transparent() {
        let id = UserId::new("u-7");
        let json = serde_json::to_string(&id).expect("serialize");
        assert_eq!(json, "\"u-7\"");
        let back: UserId = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, id);
    }
}
