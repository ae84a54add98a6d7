//! Passcode generation.

use std::str::FromStr;

use common::{LockerId, Occupant};
use rand::Rng;
use thiserror::Error;

/// Default number of digits in a random passcode.
pub const DEFAULT_PASSCODE_LENGTH: usize = 6;

/// Produces the passcode for a new assignment.
///
/// Only called when the caller did not supply one.
pub trait PasscodeGenerator: Send + Sync {
    fn generate(&self, locker_id: &LockerId, occupant: &Occupant) -> String;
}

impl<T: PasscodeGenerator + ?Sized> PasscodeGenerator for Box<T> {
    fn generate(&self, locker_id: &LockerId, occupant: &Occupant) -> String {
        (**self).generate(locker_id, occupant)
    }
}

/// Uniformly random decimal digits.
#[derive(Debug, Clone, Copy)]
pub struct RandomDigits {
    length: usize,
}

impl RandomDigits {
    /// A zero length is raised to one digit.
    pub fn new(length: usize) -> Self {
        Self {
            length: length.max(1),
        }
    }

    pub fn length(&self) -> usize {
        self.length
    }
}

impl Default for RandomDigits {
    fn default() -> Self {
        Self::new(DEFAULT_PASSCODE_LENGTH)
    }
}

impl PasscodeGenerator for RandomDigits {
    fn generate(&self, _locker_id: &LockerId, _occupant: &Occupant) -> String {
        let mut rng = rand::thread_rng();
        (0..self.length)
            .map(|_| char::from(b'0' + rng.gen_range(0..10u8)))
            .collect()
    }
}

/// First three characters of the occupant's first name, uppercased, followed
/// by the locker id: `"jane doe"` at locker `101` gets `JAN101`.
///
/// Occupants without a usable name get random digits instead.
#[derive(Debug, Clone, Copy, Default)]
pub struct DerivedPasscode {
    fallback: RandomDigits,
}

impl DerivedPasscode {
    pub fn new(fallback: RandomDigits) -> Self {
        Self { fallback }
    }
}

impl PasscodeGenerator for DerivedPasscode {
    fn generate(&self, locker_id: &LockerId, occupant: &Occupant) -> String {
        match occupant.id.split_whitespace().next() {
            Some(first) => {
                let prefix: String = first.chars().take(3).collect();
                format!("{}{}", prefix.to_uppercase(), locker_id)
            }
            None => self.fallback.generate(locker_id, occupant),
        }
    }
}

/// Which generator the launcher should build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PasscodePolicy {
    #[default]
    Random,
    Derived,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown passcode policy '{0}', expected random or derived")]
pub struct UnknownPolicy(pub String);

impl FromStr for PasscodePolicy {
    type Err = UnknownPolicy;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "random" => Ok(PasscodePolicy::Random),
            "derived" => Ok(PasscodePolicy::Derived),
            other => Err(UnknownPolicy(other.to_string())),
        }
    }
}

impl PasscodePolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            PasscodePolicy::Random => "random",
            PasscodePolicy::Derived => "derived",
        }
    }

    /// Builds the generator for this policy.
    pub fn generator(self, length: usize) -> Box<dyn PasscodeGenerator> {
        let digits = RandomDigits::new(length);
        match self {
            PasscodePolicy::Random => Box::new(digits),
            PasscodePolicy::Derived => Box::new(DerivedPasscode::new(digits)),
        }
    }
}

impl std::fmt::Display for PasscodePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_digits_have_requested_length() {
        let generator = RandomDigits::new(8);
        let code = generator.generate(&"101".into(), &Occupant::new("J1"));

        assert_eq!(code.len(), 8);
        assert!(code.chars().all(|c| c.is_ascii_digit()));
        assert_eq!(RandomDigits::default().length(), 6);
        assert_eq!(RandomDigits::new(0).length(), 1);
    }

    #[test]
    fn derived_passcode_uses_name_and_locker() {
        let generator = DerivedPasscode::default();

        assert_eq!(
            generator.generate(&"101".into(), &Occupant::new("jane doe")),
            "JAN101"
        );
        assert_eq!(generator.generate(&"7".into(), &Occupant::new("Al")), "AL7");
    }

    #[test]
    fn derived_passcode_falls_back_for_blank_names() {
        let generator = DerivedPasscode::new(RandomDigits::new(4));
        let code = generator.generate(&"101".into(), &Occupant::new("   "));

        assert_eq!(code.len(), 4);
        assert!(code.chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn policy_parsing() {
        assert_eq!("Random".parse::<PasscodePolicy>(), Ok(PasscodePolicy::Random));
        assert_eq!(" derived".parse::<PasscodePolicy>(), Ok(PasscodePolicy::Derived));
        assert_eq!(
            "pin".parse::<PasscodePolicy>(),
            Err(UnknownPolicy("pin".to_string()))
        );
    }

    #[test]
    fn boxed_generator_delegates() {
        let generator = PasscodePolicy::Derived.generator(6);
        assert_eq!(generator.generate(&"5".into(), &Occupant::new("Bob")), "BOB5");
    }
}
