//! Translation between foreign game units and canonical broker units.

/// A mapping from a game's resource to a broker resource.
///
/// Inbound amounts are multiplied by `factor` and divided by `divisor`;
/// outbound amounts use the inverse. Mappings are bootstrap metadata for
/// transport adapters; the routing path itself always works in canonical
/// units.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceMapping {
    resource_id: String,
    game_id: String,
    external_id: String,
    factor: u64,
    divisor: u64,
}

impl ResourceMapping {
    /// Creates a mapping. `factor` and `divisor` must be positive; the
    /// config loader validates this before construction.
    pub fn new(
        resource_id: impl Into<String>,
        game_id: impl Into<String>,
        external_id: impl Into<String>,
        factor: u64,
        divisor: u64,
    ) -> Self {
        Self {
            resource_id: resource_id.into(),
            game_id: game_id.into(),
            external_id: external_id.into(),
            factor,
            divisor,
        }
    }

    /// The broker resource this mapping points at.
    pub fn resource_id(&self) -> &str {
        &self.resource_id
    }

    /// The game the mapping belongs to.
    pub fn game_id(&self) -> &str {
        &self.game_id
    }

    /// The resource id as the game knows it.
    pub fn external_id(&self) -> &str {
        &self.external_id
    }

    /// Converts an amount entering the system into canonical units.
    pub fn to_canonical(&self, external_amount: u64) -> u64 {
        external_amount * self.factor / self.divisor
    }

    /// Converts a canonical amount leaving the system into game units.
    pub fn to_external(&self, canonical_amount: u64) -> u64 {
        canonical_amount * self.divisor / self.factor
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conversion_applies_factor_over_divisor() {
        let mapping = ResourceMapping::new("iron", "factorio", "iron-plate", 3, 2);
        assert_eq!(mapping.to_canonical(10), 15);
        assert_eq!(mapping.to_external(15), 10);
    }

    #[test]
    fn identity_mapping_is_the_default_shape() {
        let mapping = ResourceMapping::new("iron", "factorio", "iron-plate", 1, 1);
        assert_eq!(mapping.to_canonical(7), 7);
        assert_eq!(mapping.to_external(7), 7);
    }

    #[test]
    fn integer_division_truncates() {
        let mapping = ResourceMapping::new("iron", "factorio", "iron-ore", 1, 3);
        assert_eq!(mapping.to_canonical(10), 3);
    }
}
