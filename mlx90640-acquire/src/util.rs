// SPDX-License-Identifier: Apache-2.0
// Copyright © 2021 Will Ross

/// The word size of the camera in terms of 8-bit bytes.
pub(crate) const WORD_SIZE: usize = (u16::BITS / u8::BITS) as usize;

/// Define subtraction for address enumerations, giving the distance in words.
#[doc(hidden)]
#[macro_export]
macro_rules! address_enum_ops {
    ($typ:ident) => {
        impl ::core::ops::Sub<$typ> for $typ {
            type Output = u16;
            fn sub(self, other: $typ) -> Self::Output {
                self as u16 - other as u16
            }
        }
        impl ::core::ops::Sub<&$typ> for &$typ {
            type Output = u16;
            fn sub(self, other: &$typ) -> Self::Output {
                *self as u16 - *other as u16
            }
        }
    };
}

/// Check if the n-th bit is set.
///
/// Bits are 0-indexed, from the LSB.
pub(crate) fn is_bit_set<B>(value: B, index: usize) -> bool
where
    B: num_traits::PrimInt + num_traits::Unsigned,
{
    (value & (B::one() << index)) > B::zero()
}

/// Decode a slice of big-endian bytes into 16-bit words.
///
/// Any trailing odd byte is ignored. Returns the number of words written.
pub(crate) fn words_from_be_bytes(bytes: &[u8], words: &mut [u16]) -> usize {
    let mut count = 0;
    for (word, chunk) in words.iter_mut().zip(bytes.chunks_exact(WORD_SIZE)) {
        *word = u16::from_be_bytes([chunk[0], chunk[1]]);
        count += 1;
    }
    count
}
