//! Mapping between Stripe price ids and editions.

use std::collections::HashMap;

use crate::domain::membership::Edition;

/// Prices this deployment sells, injected wherever price ids are resolved.
#[derive(Debug, Clone, Default)]
pub struct PriceCatalog {
    by_price: HashMap<String, Edition>,
}

impl PriceCatalog {
    pub fn new(prices: impl IntoIterator<Item = (String, Edition)>) -> Self {
        Self {
            by_price: prices.into_iter().collect(),
        }
    }

    pub fn edition(&self, price_id: &str) -> Option<Edition> {
        self.by_price.get(price_id).copied()
    }

    pub fn price_id(&self, edition: Edition) -> Option<&str> {
        self.by_price
            .iter()
            .find(|(_, e)| **e == edition)
            .map(|(id, _)| id.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.by_price.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_both_directions() {
        let catalog = PriceCatalog::new([
            ("price_std_y".to_string(), Edition::STANDARD_YEAR),
            ("price_prm_y".to_string(), Edition::PREMIUM_YEAR),
        ]);

        assert_eq!(catalog.edition("price_prm_y"), Some(Edition::PREMIUM_YEAR));
        assert_eq!(catalog.price_id(Edition::STANDARD_YEAR), Some("price_std_y"));
        assert_eq!(catalog.price_id(Edition::STANDARD_MONTH), None);
    }
}
