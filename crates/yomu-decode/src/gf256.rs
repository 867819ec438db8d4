//! GF(256) arithmetic with the QR code's reduction polynomial.

use std::sync::OnceLock;

/// x^8 + x^4 + x^3 + x^2 + 1, the field polynomial used by QR symbols.
const PRIMITIVE: u16 = 0x11D;

/// The Galois field GF(2^8) with generator element 2.
///
/// Exp and log tables are built once and shared process-wide through
/// [`Gf256::instance`].
pub struct Gf256 {
    exp: [u8; 256],
    log: [u8; 256],
}

impl Gf256 {
    fn build() -> Self {
        let mut exp = [0u8; 256];
        let mut log = [0u8; 256];
        let mut x: u16 = 1;
        for i in 0..255 {
            exp[i] = x as u8;
            log[x as usize] = i as u8;
            x <<= 1;
            if x & 0x100 != 0 {
                x ^= PRIMITIVE;
            }
        }
        exp[255] = exp[0];
        Self { exp, log }
    }

    /// Shared field instance.
    pub fn instance() -> &'static Self {
        static FIELD: OnceLock<Gf256> = OnceLock::new();
        FIELD.get_or_init(Self::build)
    }

    /// 2^power.
    #[inline]
    pub fn exp(&self, power: usize) -> u8 {
        self.exp[power % 255]
    }

    /// log2 of a nonzero element.
    #[inline]
    pub fn log(&self, value: u8) -> Option<u8> {
        (value != 0).then(|| self.log[value as usize])
    }

    #[inline]
    pub fn multiply(&self, a: u8, b: u8) -> u8 {
        if a == 0 || b == 0 {
            return 0;
        }
        let sum = self.log[a as usize] as usize + self.log[b as usize] as usize;
        self.exp[sum % 255]
    }

    /// Multiplicative inverse; `None` for zero.
    #[inline]
    pub fn inverse(&self, value: u8) -> Option<u8> {
        (value != 0).then(|| self.exp[(255 - self.log[value as usize] as usize) % 255])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generator_powers_wrap_at_255() {
        let f = Gf256::instance();
        assert_eq!(f.exp(0), 1);
        assert_eq!(f.exp(1), 2);
        assert_eq!(f.exp(8), 0x1D);
        assert_eq!(f.exp(255), 1);
    }

    #[test]
    fn every_nonzero_element_has_an_inverse() {
        let f = Gf256::instance();
        for x in 1..=255u8 {
            let inv = f.inverse(x).expect("inverse");
            assert_eq!(f.multiply(x, inv), 1, "x = {x}");
        }
        assert_eq!(f.inverse(0), None);
    }

    #[test]
    fn multiplication_agrees_with_carryless_reference() {
        let f = Gf256::instance();
        let reference = |a: u8, b: u8| -> u8 {
            let mut product: u16 = 0;
            let mut a = a as u16;
            let mut b = b as u16;
            while b != 0 {
                if b & 1 != 0 {
                    product ^= a;
                }
                a <<= 1;
                if a & 0x100 != 0 {
                    a ^= PRIMITIVE;
                }
                b >>= 1;
            }
            product as u8
        };
        for a in [0u8, 1, 2, 3, 7, 29, 128, 200, 255] {
            for b in [0u8, 1, 2, 5, 16, 77, 129, 254, 255] {
                assert_eq!(f.multiply(a, b), reference(a, b), "{a} * {b}");
            }
        }
    }

    #[test]
    fn log_and_exp_are_mutually_inverse() {
        let f = Gf256::instance();
        for x in 1..=255u8 {
            assert_eq!(f.exp(f.log(x).unwrap() as usize), x);
        }
        assert_eq!(f.log(0), None);
    }
}
