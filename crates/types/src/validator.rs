use serde::{Deserialize, Serialize};

/// 20-byte validator address: first 20 bytes of SHA3-256(pk) by convention.
pub type Address = [u8; 20];

/// Validator identity plus voting power, as named in light-client-attack
/// evidence.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Validator {
    pub address: Address,
    pub voting_power: u64,
}

/// Canonical order for byzantine-validator lists: descending voting power,
/// ties broken by ascending address.
pub fn sort_by_voting_power(validators: &mut [Validator]) {
    validators.sort_by(|a, b| {
        b.voting_power
            .cmp(&a.voting_power)
            .then_with(|| a.address.cmp(&b.address))
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn val(tag: u8, power: u64) -> Validator {
        Validator {
            address: [tag; 20],
            voting_power: power,
        }
    }

    #[test]
    fn sort_is_power_desc_then_address_asc() {
        let mut vals = vec![val(3, 10), val(1, 50), val(2, 10)];
        sort_by_voting_power(&mut vals);
        assert_eq!(vals, vec![val(1, 50), val(2, 10), val(3, 10)]);
    }
}
