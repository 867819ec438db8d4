//! Reed-Solomon error correction over GF(256).

use crate::error::ReedSolomonError;
use crate::gf256::Gf256;

/// Decoder for the QR code's Reed-Solomon blocks.
///
/// Codewords are coefficients of the received polynomial, highest degree
/// first; the last `ec_count` bytes are parity. Syndromes are evaluated at
/// the generator powers α^0..α^(r-1).
pub struct ReedSolomonDecoder {
    field: &'static Gf256,
}

impl ReedSolomonDecoder {
    pub fn new() -> Self {
        Self {
            field: Gf256::instance(),
        }
    }

    /// Correct up to `ec_count / 2` byte errors in place. Returns the
    /// number of corrected errors.
    pub fn correct(
        &self,
        codewords: &mut [u8],
        ec_count: usize,
    ) -> Result<usize, ReedSolomonError> {
        let field = self.field;
        let n = codewords.len();

        let mut syndromes = vec![0u8; ec_count];
        let mut clean = true;
        for (i, syndrome) in syndromes.iter_mut().enumerate() {
            let x = field.exp(i);
            let mut value = 0u8;
            for &c in codewords.iter() {
                value = field.multiply(value, x) ^ c;
            }
            *syndrome = value;
            if value != 0 {
                clean = false;
            }
        }
        if clean {
            return Ok(0);
        }

        let sigma = self.berlekamp_massey(&syndromes);
        let degree = sigma.len() - 1;
        let omega = self.omega(&syndromes, &sigma, ec_count);

        // Chien search: locators are the inverses of sigma's roots.
        let mut locators = Vec::with_capacity(degree);
        for i in 0..255 {
            let beta = field.exp(i);
            if self.evaluate(&sigma, beta) == 0 {
                locators.push(field.exp(255 - i));
            }
        }
        if locators.len() != degree {
            return Err(ReedSolomonError::DegreeMismatch {
                degree,
                roots: locators.len(),
            });
        }

        for &locator in &locators {
            let exponent = field
                .log(locator)
                .ok_or(ReedSolomonError::BadErrorLocation)? as usize;
            if exponent >= n {
                return Err(ReedSolomonError::BadErrorLocation);
            }

            // Forney: magnitude = X * omega(1/X) / sigma'(1/X).
            let x_inverse = field
                .inverse(locator)
                .ok_or(ReedSolomonError::BadErrorLocation)?;
            let numerator = field.multiply(locator, self.evaluate(&omega, x_inverse));
            let denominator = self.evaluate_derivative(&sigma, x_inverse);
            let denominator_inverse = field
                .inverse(denominator)
                .ok_or(ReedSolomonError::BadErrorLocation)?;
            let magnitude = field.multiply(numerator, denominator_inverse);

            codewords[n - 1 - exponent] ^= magnitude;
        }

        Ok(locators.len())
    }

    /// Error locator polynomial (ascending coefficients, constant 1).
    fn berlekamp_massey(&self, syndromes: &[u8]) -> Vec<u8> {
        let field = self.field;
        let mut sigma = vec![1u8];
        let mut prev = vec![1u8];
        let mut degree = 0usize;
        let mut gap = 1usize;
        let mut last_discrepancy = 1u8;

        for i in 0..syndromes.len() {
            let mut discrepancy = syndromes[i];
            for j in 1..=degree.min(sigma.len() - 1).min(i) {
                discrepancy ^= field.multiply(sigma[j], syndromes[i - j]);
            }

            if discrepancy == 0 {
                gap += 1;
                continue;
            }

            // sigma -= (d / b) * x^gap * prev
            let scale = field.multiply(
                discrepancy,
                field.inverse(last_discrepancy).unwrap_or(1),
            );
            let needed = prev.len() + gap;
            if sigma.len() < needed {
                sigma.resize(needed, 0);
            }
            let promote = 2 * degree <= i;
            let snapshot = promote.then(|| sigma.clone());
            for (j, &p) in prev.iter().enumerate() {
                sigma[j + gap] ^= field.multiply(scale, p);
            }

            if let Some(snapshot) = snapshot {
                prev = snapshot;
                last_discrepancy = discrepancy;
                degree = i + 1 - degree;
                gap = 1;
            } else {
                gap += 1;
            }
        }

        while sigma.len() > 1 && *sigma.last().unwrap() == 0 {
            sigma.pop();
        }
        sigma
    }

    /// omega = (S · sigma) mod x^ec_count.
    fn omega(&self, syndromes: &[u8], sigma: &[u8], ec_count: usize) -> Vec<u8> {
        let field = self.field;
        let mut omega = vec![0u8; ec_count.min(syndromes.len() + sigma.len())];
        for (i, &s) in syndromes.iter().enumerate() {
            for (j, &c) in sigma.iter().enumerate() {
                if i + j < omega.len() {
                    omega[i + j] ^= field.multiply(s, c);
                }
            }
        }
        while omega.len() > 1 && *omega.last().unwrap() == 0 {
            omega.pop();
        }
        omega
    }

    /// Evaluate an ascending-coefficient polynomial at `x`.
    fn evaluate(&self, poly: &[u8], x: u8) -> u8 {
        let field = self.field;
        let mut result = 0u8;
        for &coefficient in poly.iter().rev() {
            result = field.multiply(result, x) ^ coefficient;
        }
        result
    }

    /// Formal derivative evaluated at `x`: only odd terms survive in
    /// characteristic 2.
    fn evaluate_derivative(&self, poly: &[u8], x: u8) -> u8 {
        let field = self.field;
        let x_squared = field.multiply(x, x);
        let mut result = 0u8;
        let mut power = 1u8; // x^(j-1) for j = 1, 3, 5, ...
        for j in (1..poly.len()).step_by(2) {
            result ^= field.multiply(poly[j], power);
            power = field.multiply(power, x_squared);
        }
        result
    }
}

impl Default for ReedSolomonDecoder {
    fn default() -> Self {
        Self::new()
    }
}
