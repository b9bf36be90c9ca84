//! Compile-time field registration.
//!
//! [`ua_struct!`](crate::ua_struct) declares a plain Rust struct and generates
//! its [`Structure`](crate::core::descriptor::Structure) and
//! [`Encodable`](crate::core::codec::Encodable) implementations from the field
//! list, so message types need no hand-written per-field glue.
//!
//! Field attributes (after any doc comments):
//! - `#[ua(tag = "...")]` attaches a directive string
//! - `#[ua(embed)]` splices the fields of another `ua_struct!` type in place
//!
//! Only plain `pub` fields are part of the wire layout. Private and
//! restricted fields are skipped and their types need not be encodable.

/// Declare a message structure and register its fields.
///
/// ```rust
/// use ua_protocol::ua_struct;
///
/// ua_struct! {
///     #[derive(Debug, Clone, Default, PartialEq)]
///     pub struct Header {
///         pub handle: u32,
///     }
/// }
///
/// ua_struct! {
///     #[derive(Debug, Clone, Default, PartialEq)]
///     pub struct Request {
///         #[ua(embed)]
///         pub header: Header,
///         pub no_of_items: i32,
///         #[ua(tag = "lengthField=no_of_items")]
///         pub items: Vec<u16>,
///         cached_size: usize,
///     }
/// }
/// ```
#[macro_export]
macro_rules! ua_struct {
    (
        $(#[$meta:meta])*
        $svis:vis struct $name:ident {
            $(
                $(#[doc = $doc:literal])*
                $(#[ua $args:tt])?
                $lead:ident $(($($restrict:tt)*))? $($field:ident)? : $ty:ty
            ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        $svis struct $name {
            $(
                $(#[doc = $doc])*
                $lead $(($($restrict)*))? $($field)?: $ty,
            )*
        }

        impl $crate::core::descriptor::Structure for $name {
            fn declare() -> ::std::vec::Vec<$crate::core::descriptor::FieldDecl<Self>> {
                ::std::vec![
                    $( $crate::__ua_field!(
                        [$lead $(($($restrict)*))? $($field)?] $name, $ty $(, $args)?
                    ) ),*
                ]
            }
        }

        impl $crate::core::codec::Encodable for $name {
            fn encode(&self, buf: &mut $crate::bytes::BytesMut) -> $crate::error::Result<()> {
                $crate::core::codec::encode_structure(self, buf)
            }

            fn decode(&mut self, buf: &mut &[u8]) -> $crate::error::Result<()> {
                $crate::core::codec::decode_structure(self, buf)
            }
        }
    };
}

/// One field declaration. The bracket holds the visibility and name tokens;
/// only plain `pub` fields get an accessor.
#[doc(hidden)]
#[macro_export]
macro_rules! __ua_field {
    ([pub $field:ident] $owner:ident, $ty:ty) => {
        $crate::__ua_field!([pub $field] $owner, $ty, (tag = ""))
    };
    ([pub $field:ident] $owner:ident, $ty:ty, (tag = $tag:literal)) => {
        $crate::core::descriptor::FieldDecl::named(
            stringify!($field),
            $crate::core::descriptor::Visibility::Public,
            $tag,
            $crate::core::descriptor::Accessor::new(
                |s: &$owner| &s.$field as &dyn $crate::core::codec::Encodable,
                |s: &mut $owner| &mut s.$field as &mut dyn $crate::core::codec::Encodable,
            ),
        )
    };
    ([pub $field:ident] $owner:ident, $ty:ty, (embed)) => {
        $crate::core::descriptor::FieldDecl::embedded::<$ty, _, _>(
            stringify!($field),
            $crate::core::descriptor::Visibility::Public,
            |s: &$owner| &s.$field,
            |s: &mut $owner| &mut s.$field,
        )
    };
    ([$field:ident] $owner:ident, $ty:ty $(, $args:tt)?) => {
        $crate::core::descriptor::FieldDecl::private(stringify!($field))
    };
    ([$lead:ident ($($restrict:tt)*) $field:ident] $owner:ident, $ty:ty $(, $args:tt)?) => {
        $crate::core::descriptor::FieldDecl::private(stringify!($field))
    };
}
