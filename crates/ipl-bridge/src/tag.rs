use crate::error::BridgeError;

/// The closed enumeration of IPL value variants (spec §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Tag {
    Void = 0,
    Bool = 1,
    Int = 2,
    Uint = 3,
    Float = 4,
    Bytes = 5,
    String = 6,
    Json = 7,
    Function = 8,
    Array = 9,
}

impl Tag {
    /// Width in bits of the `tag` field at the low end of an IPL value.
    pub const BITS: u32 = 4;

    pub fn as_u128(self) -> u128 {
        self as u128
    }

    pub fn from_u128(raw: u128) -> Result<Self, BridgeError> {
        Ok(match raw {
            0 => Tag::Void,
            1 => Tag::Bool,
            2 => Tag::Int,
            3 => Tag::Uint,
            4 => Tag::Float,
            5 => Tag::Bytes,
            6 => Tag::String,
            7 => Tag::Json,
            8 => Tag::Function,
            9 => Tag::Array,
            other => return Err(BridgeError::UnknownVariant(other)),
        })
    }

    /// True for the three variants sharing the `(ptr, len)` detail layout.
    pub fn is_bytes_like(self) -> bool {
        matches!(self, Tag::Bytes | Tag::String | Tag::Json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_every_valid_tag() {
        for raw in 0..10u128 {
            assert_eq!(Tag::from_u128(raw).unwrap().as_u128(), raw);
        }
    }

    #[test]
    fn rejects_tags_outside_the_domain() {
        for raw in 10..16u128 {
            assert!(matches!(Tag::from_u128(raw), Err(BridgeError::UnknownVariant(r)) if r == raw));
        }
    }
}
