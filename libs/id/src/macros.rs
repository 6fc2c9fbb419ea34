//! Macros for defining typed ID types.

/// Macro to define a typed numeric ID for a control-plane resource.
///
/// This generates a newtype wrapper around `u32` with:
/// - A `KIND` constant used in diagnostics
/// - `new()` and `value()` accessors
/// - `parse()` accepting plain decimal input
/// - `Display` and `FromStr` implementations
/// - `Serialize` and `Deserialize` as a bare integer
/// - `Ord`, `Hash`, and other standard traits
///
/// # Example
///
/// ```ignore
/// define_id!(
///     /// Virtual router ID.
///     RouterId,
///     "virtual router"
/// );
///
/// let id = RouterId::new(3);
/// let parsed: RouterId = "3".parse()?;
/// ```
#[macro_export]
macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident, $kind:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(u32);

        impl $name {
            /// Human-readable resource kind.
            pub const KIND: &'static str = $kind;

            /// Creates an ID from the value assigned by the control plane.
            #[must_use]
            pub const fn new(id: u32) -> Self {
                Self(id)
            }

            /// Returns the underlying integer.
            #[must_use]
            pub const fn value(&self) -> u32 {
                self.0
            }

            /// Parses an ID from its decimal string form.
            ///
            /// Surrounding whitespace is ignored.
            pub fn parse(s: &str) -> Result<Self, $crate::IdError> {
                let s = s.trim();
                if s.is_empty() {
                    return Err($crate::IdError::Empty { kind: Self::KIND });
                }

                s.parse::<u32>()
                    .map(Self)
                    .map_err(|_| $crate::IdError::NotNumeric {
                        kind: Self::KIND,
                        input: s.to_string(),
                    })
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl std::str::FromStr for $name {
            type Err = $crate::IdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::parse(s)
            }
        }

        impl From<u32> for $name {
            fn from(id: u32) -> Self {
                Self(id)
            }
        }

        impl From<$name> for u32 {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl serde::Serialize for $name {
            fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
            where
                S: serde::Serializer,
            {
                serializer.serialize_u32(self.0)
            }
        }

        impl<'de> serde::Deserialize<'de> for $name {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: serde::Deserializer<'de>,
            {
                let id = u32::deserialize(deserializer)?;
                Ok(Self(id))
            }
        }
    };
}
