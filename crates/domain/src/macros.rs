//! Macro for implementing Display and FromStr for wire-named enums
//!
//! Model types, sources and syncer steps all travel through logs, snapshots
//! and configuration files under a stable lowercase name. This macro keeps the
//! name table in one place per enum.
//!
//! # Example
//!
//! ```rust
//! use cadence_domain::impl_wire_name_conversions;
//!
//! #[derive(Debug, Clone, Copy, PartialEq, Eq)]
//! pub enum Channel {
//!     Stable,
//!     Beta,
//! }
//!
//! impl_wire_name_conversions!(Channel {
//!     Stable => "stable",
//!     Beta => "beta",
//! });
//!
//! assert_eq!(Channel::Beta.to_string(), "beta");
//! assert_eq!("STABLE".parse::<Channel>(), Ok(Channel::Stable));
//! ```

/// Implements `Display`, `FromStr` and `as_str` for a fieldless enum.
///
/// Parsing is case-insensitive; the error names the enum and the rejected
/// input.
#[macro_export]
macro_rules! impl_wire_name_conversions {
    ($enum_name:ident { $($variant:ident => $str:expr),+ $(,)? }) => {
        impl $enum_name {
            /// Stable lowercase name used in logs and serialized state.
            pub const fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $str,)+
                }
            }
        }

        impl std::fmt::Display for $enum_name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $enum_name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_ascii_lowercase().as_str() {
                    $($str => Ok(Self::$variant),)+
                    _ => Err(format!("Invalid {}: {}", stringify!($enum_name), s)),
                }
            }
        }
    };
}
