//! Short identifier generation.
//!
//! Task records, template instances, and teardown runs are tagged with a
//! short lowercase alphanumeric id. Ids are generated fresh per record;
//! retries of the same record reuse the id.

use rand::{Rng, distr::Alphanumeric};

/// Length of generated identifiers.
const ID_LEN: usize = 8;

/// Returns a fresh 8-character lowercase alphanumeric identifier.
pub fn short_id() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(ID_LEN)
        .map(char::from)
        .collect::<String>()
        .to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_has_expected_shape() {
        let id = short_id();
        assert_eq!(id.len(), ID_LEN);
        assert!(id.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));
    }

    #[test]
    fn ids_are_not_obviously_colliding() {
        let a = short_id();
        let b = short_id();
        let c = short_id();
        assert!(!(a == b && b == c));
    }
}
