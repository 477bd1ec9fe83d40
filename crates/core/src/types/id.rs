//! Newtype IDs for CRM record references.
//!
//! Zoho record ids are 19-digit numbers that overflow JavaScript numbers, so
//! the CRM hands them out as strings. Use the `define_crm_id!` macro to create
//! type-safe wrappers that prevent mixing ids from different CRM modules.

/// Macro to define a type-safe CRM record ID wrapper.
///
/// Creates a newtype wrapper around `String` with:
/// - `Serialize`/`Deserialize` with `#[serde(transparent)]`
/// - `Debug`, `Clone`, `PartialEq`, `Eq`, `Hash`, `PartialOrd`, `Ord`
/// - Conversion methods: `new()`, `as_str()`
/// - `From<String>`, `From<&str>` and `Display` implementations
///
/// # Example
///
/// ```rust
/// # use fulfillment_core::define_crm_id;
/// define_crm_id!(VendorId);
/// define_crm_id!(QuoteId);
///
/// let vendor = VendorId::new("5843259000000412001");
/// assert_eq!(vendor.as_str(), "5843259000000412001");
///
/// // These are different types, so this won't compile:
/// // let _: QuoteId = vendor;
/// ```
#[macro_export]
macro_rules! define_crm_id {
    ($name:ident) => {
        #[derive(
            Debug,
            Clone,
            PartialEq,
            Eq,
            Hash,
            PartialOrd,
            Ord,
            ::serde::Serialize,
            ::serde::Deserialize
        )]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create a new ID from a CRM record id.
            #[must_use]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Get the underlying record id.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl ::core::fmt::Display for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_string())
            }
        }
    };
}

define_crm_id!(CrmProductId);
define_crm_id!(CrmDealId);
define_crm_id!(ContactRef);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_serializes_transparently() {
        let id = CrmProductId::new("5843259000001234567");
        let json = serde_json::to_string(&id).unwrap_or_default();
        assert_eq!(json, "\"5843259000001234567\"");
    }

    #[test]
    fn test_id_display_matches_inner() {
        let id = CrmDealId::from("42");
        assert_eq!(id.to_string(), "42");
        assert_eq!(id.as_str(), "42");
    }
}
