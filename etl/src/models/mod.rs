//! Domain models for the retail star schema.
//!
//! - [`Entity`] - the six business entities and their destination tables
//! - [`WeightClass`] - shipping category derived from a product's weight

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// =============================================================================
// Entities
// =============================================================================

/// A business entity handled by the pipeline, in load order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Entity {
    User,
    Card,
    Store,
    Product,
    Order,
    DateTime,
}

impl Entity {
    /// Every entity, in the order the pipeline processes them.
    pub const ALL: [Entity; 6] = [
        Entity::User,
        Entity::Card,
        Entity::Store,
        Entity::Product,
        Entity::Order,
        Entity::DateTime,
    ];

    /// Short name used in logs and on the command line.
    pub fn name(&self) -> &'static str {
        match self {
            Entity::User => "user",
            Entity::Card => "card",
            Entity::Store => "store",
            Entity::Product => "product",
            Entity::Order => "order",
            Entity::DateTime => "date_time",
        }
    }

    /// Destination table in the warehouse.
    pub fn destination(&self) -> &'static str {
        match self {
            Entity::User => "dim_users",
            Entity::Card => "dim_card_details",
            Entity::Store => "dim_store_details",
            Entity::Product => "dim_products",
            Entity::Order => "orders_table",
            Entity::DateTime => "dim_date_times",
        }
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Entity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "user" | "users" => Ok(Entity::User),
            "card" | "cards" => Ok(Entity::Card),
            "store" | "stores" => Ok(Entity::Store),
            "product" | "products" => Ok(Entity::Product),
            "order" | "orders" => Ok(Entity::Order),
            "date_time" | "date_times" | "datetime" | "date" => Ok(Entity::DateTime),
            other => Err(format!("unknown entity '{}'", other)),
        }
    }
}

// =============================================================================
// Weight Class
// =============================================================================

/// Shipping category of a product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WeightClass {
    Light,
    #[serde(rename = "Mid_Sized")]
    MidSized,
    Heavy,
    #[serde(rename = "Truck_Required")]
    TruckRequired,
}

impl WeightClass {
    /// Classify a weight in kilograms.
    ///
    /// `< 2` Light, `[2, 40)` Mid_Sized, `[40, 140)` Heavy, `>= 140`
    /// Truck_Required.
    pub fn from_kg(kg: f64) -> Self {
        if kg < 2.0 {
            WeightClass::Light
        } else if kg < 40.0 {
            WeightClass::MidSized
        } else if kg < 140.0 {
            WeightClass::Heavy
        } else {
            WeightClass::TruckRequired
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            WeightClass::Light => "Light",
            WeightClass::MidSized => "Mid_Sized",
            WeightClass::Heavy => "Heavy",
            WeightClass::TruckRequired => "Truck_Required",
        }
    }
}

impl fmt::Display for WeightClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_weight_class_boundaries() {
        assert_eq!(WeightClass::from_kg(1.999), WeightClass::Light);
        assert_eq!(WeightClass::from_kg(2.0), WeightClass::MidSized);
        assert_eq!(WeightClass::from_kg(39.999), WeightClass::MidSized);
        assert_eq!(WeightClass::from_kg(40.0), WeightClass::Heavy);
        assert_eq!(WeightClass::from_kg(139.999), WeightClass::Heavy);
        assert_eq!(WeightClass::from_kg(140.0), WeightClass::TruckRequired);
    }

    #[test]
    fn test_weight_class_labels() {
        assert_eq!(WeightClass::MidSized.to_string(), "Mid_Sized");
        assert_eq!(
            serde_json::to_string(&WeightClass::TruckRequired).unwrap(),
            "\"Truck_Required\""
        );
    }

    #[test]
    fn test_entity_from_str() {
        assert_eq!("users".parse::<Entity>(), Ok(Entity::User));
        assert_eq!("Date-Time".parse::<Entity>(), Ok(Entity::DateTime));
        assert!("invoice".parse::<Entity>().is_err());
    }

    #[test]
    fn test_orders_keep_their_table_name() {
        assert_eq!(Entity::Order.destination(), "orders_table");
    }
}
