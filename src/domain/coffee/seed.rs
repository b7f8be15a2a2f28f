//! Inventory contents for a freshly started process.

use crate::domain::foundation::CoffeeId;

use super::{Coffee, CoffeeDetails};

fn coffee(
    id: i64,
    name: &str,
    origin: &str,
    roast: &str,
    price: f64,
    weight: &str,
    description: &str,
    in_stock: bool,
) -> Coffee {
    Coffee::from_details(
        CoffeeId::new(id),
        CoffeeDetails {
            name: name.to_string(),
            origin: origin.to_string(),
            roast: roast.to_string(),
            price,
            weight: weight.to_string(),
            description: description.to_string(),
            in_stock,
        },
    )
}

/// The six coffees every process starts with.
pub fn initial_coffees() -> Vec<Coffee> {
    vec![
        coffee(
            1,
            "Ethiopian Yirgacheffe",
            "Ethiopia",
            "Light",
            24.99,
            "12oz",
            "Bright and floral with notes of jasmine and citrus",
            true,
        ),
        coffee(
            2,
            "Colombian Supremo",
            "Colombia",
            "Medium",
            22.99,
            "12oz",
            "Rich and balanced with chocolate and nutty undertones",
            true,
        ),
        coffee(
            3,
            "Guatemala Antigua",
            "Guatemala",
            "Medium-Dark",
            26.99,
            "12oz",
            "Full-bodied with smoky notes and a spicy finish",
            false,
        ),
        coffee(
            4,
            "Jamaican Blue Mountain",
            "Jamaica",
            "Medium",
            89.99,
            "8oz",
            "Smooth and mild with a clean, bright finish",
            true,
        ),
        coffee(
            5,
            "Hawaiian Kona",
            "Hawaii",
            "Medium",
            45.99,
            "10oz",
            "Rich and smooth with a hint of sweetness",
            true,
        ),
        coffee(
            6,
            "Sumatra Mandheling",
            "Indonesia",
            "Dark",
            28.99,
            "12oz",
            "Earthy and full-bodied with low acidity",
            true,
        ),
    ]
}
