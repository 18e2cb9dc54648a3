use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::GeoPoint;

/// Reference data for a mandi. Maintained through the ingest endpoint,
/// read-only on the serving path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Market {
    pub id: Uuid,
    pub name: String,
    pub state: String,
    pub district: String,
    pub commodity: String,
    pub commodities: Vec<String>,
    pub location: GeoPoint,
}

impl Market {
    /// Case-insensitive substring match against the primary commodity or any
    /// entry of the commodity set.
    pub fn trades_in(&self, commodity: &str) -> bool {
        let needle = commodity.to_lowercase();
        self.commodity.to_lowercase().contains(&needle)
            || self
                .commodities
                .iter()
                .any(|c| c.to_lowercase().contains(&needle))
    }

    pub fn all_commodities(&self) -> Vec<String> {
        if self.commodities.is_empty() {
            vec![self.commodity.clone()]
        } else {
            self.commodities.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Market;
    use crate::models::GeoPoint;
    use uuid::Uuid;

    fn market(commodity: &str, commodities: &[&str]) -> Market {
        Market {
            id: Uuid::new_v4(),
            name: "Kurnool Market".to_string(),
            state: "Andhra Pradesh".to_string(),
            district: "Kurnool".to_string(),
            commodity: commodity.to_string(),
            commodities: commodities.iter().map(|c| c.to_string()).collect(),
            location: GeoPoint { lat: 15.83, lng: 78.04 },
        }
    }

    #[test]
    fn trades_in_matches_primary_commodity_case_insensitively() {
        let m = market("Rice", &[]);
        assert!(m.trades_in("rice"));
        assert!(m.trades_in("RICE"));
        assert!(!m.trades_in("wheat"));
    }

    #[test]
    fn trades_in_matches_commodity_set_by_substring() {
        let m = market("Rice", &["Green Chilli", "Turmeric"]);
        assert!(m.trades_in("chilli"));
        assert!(m.trades_in("turmeric"));
        assert!(!m.trades_in("cotton"));
    }
}
