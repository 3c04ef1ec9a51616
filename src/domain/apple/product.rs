use crate::domain::membership::Edition;

const PRODUCTS: [(&str, Edition); 3] = [
    (
        "com.ft.ftchinese.mobile.subscription.member",
        Edition::STANDARD_YEAR,
    ),
    (
        "com.ft.ftchinese.mobile.subscription.member.monthly",
        Edition::STANDARD_MONTH,
    ),
    (
        "com.ft.ftchinese.mobile.subscription.vip",
        Edition::PREMIUM_YEAR,
    ),
];

/// Edition sold under an App Store product id.
pub fn edition_for_product(product_id: &str) -> Option<Edition> {
    PRODUCTS
        .iter()
        .find(|(id, _)| *id == product_id)
        .map(|(_, edition)| *edition)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_products_map_to_editions() {
        assert_eq!(
            edition_for_product("com.ft.ftchinese.mobile.subscription.vip"),
            Some(Edition::PREMIUM_YEAR)
        );
        assert_eq!(
            edition_for_product("com.ft.ftchinese.mobile.subscription.member.monthly"),
            Some(Edition::STANDARD_MONTH)
        );
        assert_eq!(edition_for_product("com.example.other"), None);
    }
}
