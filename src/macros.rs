//! Macros used in the crate source.

macro_rules! debug_precondition_growth {
    ($old_size:expr, $requested_size:expr) => {
        mirai_annotations::debug_checked_precondition!(
            $requested_size > $old_size,
            "growth is only computed for requests above the current size"
        );
    };
}

macro_rules! debug_precondition_page_size {
    ($page_size:expr) => {
        mirai_annotations::debug_checked_precondition!(
            ($page_size).is_power_of_two(),
            "page size must be a non-zero power of two"
        );
    };
}

macro_rules! impl_element {
    ($($ty:ty => $kind:ident),* $(,)?) => {
        $(
            impl crate::view::sealed::Sealed for $ty {}

            impl crate::view::Element for $ty {
                const KIND: crate::view::ViewKind = crate::view::ViewKind::$kind;

                fn read_le(bytes: &[u8]) -> Self {
                    let mut raw = [0_u8; core::mem::size_of::<$ty>()];
                    raw.copy_from_slice(bytes);
                    <$ty>::from_le_bytes(raw)
                }

                fn write_le(self, bytes: &mut [u8]) {
                    bytes.copy_from_slice(&self.to_le_bytes());
                }
            }
        )*
    };
}

pub(crate) use {debug_precondition_growth, debug_precondition_page_size, impl_element};
