use rabe_bn::Fr;
use rand::RngCore;

/// Maps a small integer (a share's x-coordinate) into the scalar field.
pub fn usize_to_fr(value: usize) -> Fr {
    // double-and-add over the bits of value
    let mut result = Fr::zero();
    let mut base = Fr::one();
    let mut rest = value;
    while rest > 0 {
        if rest & 1 == 1 {
            result = result + base;
        }
        base = base + base;
        rest >>= 1;
    }
    result
}

/// `len` bytes from the thread-local CSPRNG.
pub fn random_bytes(len: usize) -> Vec<u8> {
    let mut bytes = vec![0u8; len];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_integers_map_consistently() {
        assert_eq!(usize_to_fr(0), Fr::zero());
        assert_eq!(usize_to_fr(1), Fr::one());
        assert_eq!(usize_to_fr(6), usize_to_fr(2) * usize_to_fr(3));
        assert_eq!(usize_to_fr(13), usize_to_fr(8) + usize_to_fr(5));
    }

    #[test]
    fn random_bytes_have_requested_length() {
        assert_eq!(random_bytes(32).len(), 32);
        assert_ne!(random_bytes(32), random_bytes(32));
    }
}
