//! Helper macro generating port error enums with snake-case constructors.

macro_rules! define_port_error {
    (@ctor $variant:ident) => {
        ::paste::paste! {
            pub fn [<$variant:snake>]() -> Self {
                Self::$variant
            }
        }
    };

    (@ctor $variant:ident { $($field:ident : $ty:ty),* $(,)? }) => {
        define_port_error!(@ctor_impl $variant () () $( $field : $ty, )*);
    };

    (@ctor_impl $variant:ident ($($params:tt)*) ($($inits:tt)*) ) => {
        ::paste::paste! {
            pub fn [<$variant:snake>]($($params)*) -> Self {
                Self::$variant { $($inits)* }
            }
        }
    };

    (@ctor_impl $variant:ident ($($params:tt)*) ($($inits:tt)*) $field:ident : $ty:ty, $($rest:tt)*) => {
        define_port_error!(
            @ctor_impl
            $variant
            ($($params)* $field: impl Into<$ty>,)
            ($($inits)* $field: $field.into(),)
            $($rest)*
        );
    };
    (
        $(#[$outer:meta])*
        pub enum $name:ident {
            $(
                $(#[$variant_meta:meta])*
                $variant:ident $( { $($field:ident : $ty:ty),* $(,)? } )? => $message:expr
            ),* $(,)?
        }
    ) => {
        $(#[$outer])*
        #[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
        pub enum $name {
            $(
                $(#[$variant_meta])*
                #[error($message)]
                $variant $( { $($field : $ty),* } )?,
            )*
        }

        impl $name {
            $(
                define_port_error!(@ctor $variant $( { $($field : $ty),* } )?);
            )*
        }
    };
}

pub(crate) use define_port_error;

#[cfg(test)]
mod tests {
    define_port_error! {
        pub enum LedgerPortError {
            Unreachable { message: String } => "ledger unreachable: {message}",
            Stale { version: u64 } => "ledger stale at version {version}",
            Conflict { key: String, version: u64 } => "ledger conflict on {key} at {version}",
            Closed => "ledger closed",
        }
    }

    #[test]
    fn string_fields_accept_borrowed_text() {
        assert_eq!(
            LedgerPortError::unreachable("timeout").to_string(),
            "ledger unreachable: timeout"
        );
    }

    #[test]
    fn numeric_fields_keep_their_type() {
        assert_eq!(
            LedgerPortError::stale(7_u64),
            LedgerPortError::Stale { version: 7 }
        );
    }

    #[test]
    fn mixed_and_unit_variants_get_constructors() {
        assert_eq!(
            LedgerPortError::conflict("slug", 3_u64).to_string(),
            "ledger conflict on slug at 3"
        );
        assert_eq!(LedgerPortError::closed().to_string(), "ledger closed");
    }
}
