//! SRP-2048 proof for Telegram's cloud password.
//!
//! Implements the `passwordKdfAlgoSHA256SHA256PBKDF2HMACSHA512iter100000SHA256ModPow`
//! scheme described at <https://core.telegram.org/api/srp>.

use num_bigint::{BigInt, Sign};
use num_traits::ops::euclid::Euclid;
use sha2::{Digest, Sha256, Sha512};

const PBKDF2_ROUNDS: u32 = 100_000;

/// Server-side parameters of the current password algorithm.
pub(crate) struct SrpParams<'a> {
    pub salt1: &'a [u8],
    pub salt2: &'a [u8],
    pub p:     &'a [u8],
    pub g:     i32,
}

/// What `auth.checkPassword` needs: the proof `m1` and the public value `g_a`.
pub(crate) struct SrpAnswer {
    pub m1:  [u8; 32],
    pub g_a: [u8; 256],
}

fn sha256(parts: &[&[u8]]) -> [u8; 32] {
    let mut h = Sha256::new();
    for p in parts { h.update(p); }
    h.finalize().into()
}

/// `SH(data, salt) = H(salt | data | salt)`
fn salted(data: &[u8], salt: &[u8]) -> [u8; 32] {
    sha256(&[salt, data, salt])
}

/// `PH2(password, salt1, salt2)`, the password hash `x`.
fn password_hash(password: &[u8], salt1: &[u8], salt2: &[u8]) -> [u8; 32] {
    let ph1 = salted(&salted(password, salt1), salt2);
    let mut dk = [0u8; 64];
    pbkdf2::pbkdf2_hmac::<Sha512>(&ph1, salt1, PBKDF2_ROUNDS, &mut dk);
    salted(&dk, salt2)
}

/// Left-pad (or keep the low 256 bytes of) a big-endian number.
fn pad256(data: &[u8]) -> [u8; 256] {
    let mut out = [0u8; 256];
    let take = data.len().min(256);
    out[256 - take..].copy_from_slice(&data[data.len() - take..]);
    out
}

fn big(bytes: &[u8]) -> BigInt {
    BigInt::from_bytes_be(Sign::Plus, bytes)
}

/// Compute the SRP answer for `password`, given the server's `g_b` and our secret `a`.
pub(crate) fn calculate(
    params:   &SrpParams<'_>,
    g_b:      &[u8],
    a:        &[u8],
    password: &[u8],
) -> SrpAnswer {
    let p      = big(params.p);
    let g      = BigInt::from(params.g);
    let g_pad  = pad256(&params.g.to_be_bytes());
    let g_b    = pad256(g_b);
    let a      = big(&pad256(a));

    let k = big(&sha256(&[params.p, &g_pad]));

    let g_a = pad256(&g.modpow(&a, &p).to_bytes_be().1);
    let u   = big(&sha256(&[&g_a, &g_b]));
    let x   = big(&password_hash(password, params.salt1, params.salt2));

    let v  = g.modpow(&x, &p);
    let kv = (k * v) % &p;
    let t  = (big(&g_b) - kv).rem_euclid(&p);
    let s_a = t.modpow(&(a + u * x), &p);
    let k_a = sha256(&[&pad256(&s_a.to_bytes_be().1)]);

    let h_p = sha256(&[params.p]);
    let h_g = sha256(&[&g_pad]);
    let mut p_xor_g = [0u8; 32];
    for (out, (l, r)) in p_xor_g.iter_mut().zip(h_p.iter().zip(h_g.iter())) {
        *out = l ^ r;
    }

    let m1 = sha256(&[
        &p_xor_g,
        &sha256(&[params.salt1]),
        &sha256(&[params.salt2]),
        &g_a,
        &g_b,
        &k_a,
    ]);

    SrpAnswer { m1, g_a }
}
