//! Cache key layout.
//!
//! | key | value |
//! |-----|-------|
//! | `order:{id}:ns` | current namespace token of an order |
//! | `order:{id}:{token}` | one order |
//! | `orders:{user}:ns` | current list namespace token of a user |
//! | `orders:{user}:{token}:{page}:{limit}` | one page of a user's orders |
//! | `addresses:{user}` | all addresses of a user |
//! | `slots:{date}` | free delivery slots of a day |
//!
//! Deleting a namespace key orphans every entry cached under its token;
//! orphaned entries age out through their TTL. A reader creates the token
//! before it reads the store, so a value read before a write can only land
//! under a token that write has already deleted.

use chrono::NaiveDate;
use common::{OrderId, UserId};

pub fn order_namespace(id: OrderId) -> String {
    format!("order:{id}:ns")
}

pub fn order_entry(id: OrderId, token: &str) -> String {
    format!("order:{id}:{token}")
}

pub fn order_list_namespace(user_id: &UserId) -> String {
    format!("orders:{user_id}:ns")
}

pub fn order_list_page(user_id: &UserId, token: &str, page: u32, limit: u32) -> String {
    format!("orders:{user_id}:{token}:{page}:{limit}")
}

pub fn addresses(user_id: &UserId) -> String {
    format!("addresses:{user_id}")
}

pub fn slots(date: NaiveDate) -> String {
    format!("slots:{}", date.format("%Y-%m-%d"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_formats() {
        let user = UserId::new("user-1");
        assert_eq!(order_list_namespace(&user), "orders:user-1:ns");
        assert_eq!(order_list_page(&user, "abc", 2, 20), "orders:user-1:abc:2:20");
        assert_eq!(addresses(&user), "addresses:user-1");
        assert_eq!(
            slots(NaiveDate::from_ymd_opt(2026, 10, 17).unwrap()),
            "slots:2026-10-17"
        );

        let id = OrderId::new();
        assert_eq!(order_namespace(id), format!("order:{id}:ns"));
        assert_eq!(order_entry(id, "abc"), format!("order:{id}:abc"));
    }
}
