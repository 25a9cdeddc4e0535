//! Closed lookup tables from raw detector codes to embedding indices.
//!
//! Index `0` is the padding slot in both tables. The raw "no candidate" code
//! `-999` maps there too, so absent inputs look exactly like padding.

/// Raw code marking a slot with no candidate.
pub const ABSENT_CODE: i32 = -999;

/// Embedding table size for particle types, padding included.
pub const PDGID_NUM_EMBEDDINGS: usize = 6;
/// Embedding table size for charges, padding included.
pub const CHARGE_NUM_EMBEDDINGS: usize = 4;
/// Continuous features per candidate: px, py, eta, puppi weight.
pub const CONT_NUM_FEATURES: usize = 4;
/// Components of the MET target: px, py.
pub const TARGET_NUM_FEATURES: usize = 2;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EncodingError {
    #[error("Unrecognized particle type code {0}")]
    ParticleType(i32),

    #[error("Unrecognized charge code {0}")]
    Charge(i32),
}

/// Candidate particle type, keyed by |PDG id|.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ParticleType {
    Absent = 0,
    ChargedHadron = 1,
    NeutralHadron = 2,
    Photon = 3,
    Muon = 4,
    Electron = 5,
}

impl ParticleType {
    /// All types in embedding-index order.
    pub const ALL: [Self; PDGID_NUM_EMBEDDINGS] = [
        Self::Absent,
        Self::ChargedHadron,
        Self::NeutralHadron,
        Self::Photon,
        Self::Muon,
        Self::Electron,
    ];

    /// Look up a raw PDG id. `-999` is matched before taking the absolute
    /// value, so `999` is rejected.
    pub fn from_raw(code: i32) -> Result<Self, EncodingError> {
        if code == ABSENT_CODE {
            return Ok(Self::Absent);
        }
        match code.checked_abs() {
            Some(211) => Ok(Self::ChargedHadron),
            Some(130) => Ok(Self::NeutralHadron),
            Some(22) => Ok(Self::Photon),
            Some(13) => Ok(Self::Muon),
            Some(11) => Ok(Self::Electron),
            _ => Err(EncodingError::ParticleType(code)),
        }
    }

    pub fn embedding_index(self) -> u8 {
        self as u8
    }

    pub fn is_absent(self) -> bool {
        self == Self::Absent
    }
}

/// Candidate electric charge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Charge {
    Absent = 0,
    Negative = 1,
    Neutral = 2,
    Positive = 3,
}

impl Charge {
    pub const ALL: [Self; CHARGE_NUM_EMBEDDINGS] =
        [Self::Absent, Self::Negative, Self::Neutral, Self::Positive];

    pub fn from_raw(code: i32) -> Result<Self, EncodingError> {
        match code {
            ABSENT_CODE => Ok(Self::Absent),
            -1 => Ok(Self::Negative),
            0 => Ok(Self::Neutral),
            1 => Ok(Self::Positive),
            _ => Err(EncodingError::Charge(code)),
        }
    }

    pub fn embedding_index(self) -> u8 {
        self as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_particle_type_table() {
        let cases = [(-999, 0), (211, 1), (-211, 1), (130, 2), (22, 3), (-13, 4), (11, 5)];
        for (code, index) in cases {
            assert_eq!(ParticleType::from_raw(code).unwrap().embedding_index(), index);
        }
    }

    #[test]
    fn test_charge_table() {
        let cases = [(-999, 0), (-1, 1), (0, 2), (1, 3)];
        for (code, index) in cases {
            assert_eq!(Charge::from_raw(code).unwrap().embedding_index(), index);
        }
    }

    #[test]
    fn test_unknown_codes_fail() {
        assert_eq!(
            ParticleType::from_raw(2212),
            Err(EncodingError::ParticleType(2212))
        );
        assert_eq!(ParticleType::from_raw(999), Err(EncodingError::ParticleType(999)));
        assert_eq!(
            ParticleType::from_raw(i32::MIN),
            Err(EncodingError::ParticleType(i32::MIN))
        );
        assert_eq!(Charge::from_raw(2), Err(EncodingError::Charge(2)));
    }

    #[test]
    fn test_real_codes_never_use_padding() {
        let types: HashSet<u8> = [11, 13, 22, 130, 211, -11, -13, -211]
            .into_iter()
            .map(|c| ParticleType::from_raw(c).unwrap().embedding_index())
            .collect();
        assert!(!types.contains(&0));
        assert_eq!(types.len(), 5);

        let charges: HashSet<u8> = [-1, 0, 1]
            .into_iter()
            .map(|c| Charge::from_raw(c).unwrap().embedding_index())
            .collect();
        assert!(!charges.contains(&0));
        assert_eq!(charges.len(), 3);
    }

    #[test]
    fn test_all_matches_discriminants() {
        for (i, t) in ParticleType::ALL.iter().enumerate() {
            assert_eq!(t.embedding_index() as usize, i);
        }
        for (i, c) in Charge::ALL.iter().enumerate() {
            assert_eq!(c.embedding_index() as usize, i);
        }
    }
}
