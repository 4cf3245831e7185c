//! Closed string enumerations.
//!
//! Every enumerated string domain in the schema (`lodMode`, `alphaMode`,
//! accessor `type`, ...) is declared through [`closed_label!`] so that it
//! serializes to its wire label and can be parsed with a field-named error.

/// A closed set of wire labels.
pub trait Label: Sized + Copy + 'static {
    /// Every member, in declaration order.
    fn all() -> &'static [Self];

    /// Wire label of this member.
    fn label(self) -> &'static str;

    /// Looks up a member by wire label.
    fn from_label(s: &str) -> Option<Self> {
        Self::all().iter().copied().find(|member| member.label() == s)
    }

    /// Accepted labels joined with `|`, for error messages.
    fn expected() -> String {
        Self::all()
            .iter()
            .map(|member| member.label())
            .collect::<Vec<_>>()
            .join("|")
    }
}

/// Declares a closed string enum with serde wire labels and a [`Label`] impl.
#[macro_export]
macro_rules! closed_label {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident => $wire:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
        $vis enum $name {
            $( $(#[$vmeta])* #[serde(rename = $wire)] $variant ),+
        }

        impl $name {
            /// Wire label
            #[must_use]
            pub const fn as_str(self) -> &'static str {
                match self {
                    $( Self::$variant => $wire ),+
                }
            }
        }

        impl $crate::label::Label for $name {
            fn all() -> &'static [Self] {
                &[$( Self::$variant ),+]
            }

            fn label(self) -> &'static str {
                self.as_str()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use super::Label;

    closed_label! {
        /// Test domain
        enum Shade {
            /// Light
            Light => "light",
            /// Dark
            Dark => "darkMode",
        }
    }

    #[test]
    fn test_label_lookup() {
        assert_eq!(Shade::from_label("darkMode"), Some(Shade::Dark));
        assert_eq!(Shade::from_label("Dark"), None);
        assert_eq!(Shade::expected(), "light|darkMode");
        assert_eq!(Shade::Light.to_string(), "light");
    }

    #[test]
    fn test_label_serde() {
        let json = serde_json::to_string(&Shade::Dark).unwrap();
        assert_eq!(json, "\"darkMode\"");
    }
}
