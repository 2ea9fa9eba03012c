//! Macro for implementing Display and FromStr for settings enums
//!
//! # Example
//!
//! ```rust
//! use zrata_domain::impl_domain_enum_conversions;
//!
//! #[derive(Debug, Clone, Copy, PartialEq, Eq)]
//! pub enum Backend {
//!     Memory,
//!     Filesystem,
//! }
//!
//! impl_domain_enum_conversions!(Backend {
//!     Memory => "memory",
//!     Filesystem => "filesystem" | "fs" | "dir",
//! });
//!
//! assert_eq!("FS".parse::<Backend>().unwrap(), Backend::Filesystem);
//! assert_eq!(Backend::Filesystem.to_string(), "filesystem");
//! ```

/// Implements Display and FromStr for a fieldless enum
///
/// The first string of each arm is the canonical name used by Display. Any
/// further `| "alias"` strings are accepted by FromStr. Parsing trims
/// whitespace and ignores case.
#[macro_export]
macro_rules! impl_domain_enum_conversions {
    ($enum_name:ident { $($variant:ident => $str:literal $(| $alias:literal)*),+ $(,)? }) => {
        impl std::fmt::Display for $enum_name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                match self {
                    $(Self::$variant => f.write_str($str),)+
                }
            }
        }

        impl std::str::FromStr for $enum_name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_ascii_lowercase().as_str() {
                    $($str $(| $alias)* => Ok(Self::$variant),)+
                    _ => Err(format!("Invalid {}: {}", stringify!($enum_name), s)),
                }
            }
        }
    };
}
