mod order_lifecycle_tests {
    use bigdecimal::BigDecimal;
    use std::str::FromStr;
    use uuid::Uuid;

    use storefront_backend::database::contents::ContentType;
    use storefront_backend::database::orders::{FulfillmentRow, OrderStatus};
    use storefront_backend::services::fulfillment;

    fn row(content_type: &str, quantity: i32, price: &str) -> FulfillmentRow {
        FulfillmentRow {
            content_id: Uuid::new_v4(),
            quantity,
            price_at_purchase: BigDecimal::from_str(price).unwrap(),
            content_type: content_type.to_string(),
        }
    }

    #[test]
    fn test_lifecycle_is_one_directional() {
        // pending can move forward or abort
        assert!(OrderStatus::Pending.can_transition_to(OrderStatus::Processing));
        assert!(OrderStatus::Pending.can_transition_to(OrderStatus::Completed));
        assert!(OrderStatus::Pending.can_transition_to(OrderStatus::Cancelled));

        // terminal states only move to refunded, and only from completed
        assert!(OrderStatus::Completed.can_transition_to(OrderStatus::Refunded));
        assert!(!OrderStatus::Cancelled.can_transition_to(OrderStatus::Refunded));

        // nothing re-enters pending
        for status in [
            OrderStatus::Processing,
            OrderStatus::Completed,
            OrderStatus::Cancelled,
            OrderStatus::Refunded,
        ] {
            assert!(!status.can_transition_to(OrderStatus::Pending));
        }
    }

    #[test]
    fn test_only_pending_accepts_payment() {
        assert!(OrderStatus::Pending.is_payable());
        assert!(!OrderStatus::Processing.is_payable());
        assert!(!OrderStatus::Completed.is_payable());
        assert!(!OrderStatus::Cancelled.is_payable());
        assert!(!OrderStatus::Refunded.is_payable());
    }

    #[test]
    fn test_status_string_round_trip() {
        for raw in ["pending", "processing", "completed", "cancelled", "refunded"] {
            assert_eq!(OrderStatus::parse(raw).unwrap().as_str(), raw);
        }
        assert!(OrderStatus::parse("delivered").is_none());
    }

    #[test]
    fn test_mixed_cart_splits_into_grants_and_decrements() {
        let rows = vec![
            row("document", 1, "1500"),
            row("video", 1, "3000"),
            row("physical", 2, "2500"),
        ];

        let plan = fulfillment::plan(&rows);

        assert_eq!(plan.grants.len(), 2);
        assert_eq!(plan.stock.len(), 1);
        assert_eq!(plan.stock[0].quantity, 2);
    }

    #[test]
    fn test_grant_amount_is_the_frozen_line_price() {
        let rows = vec![row("audio", 3, "499.99")];

        let plan = fulfillment::plan(&rows);

        assert_eq!(
            plan.grants[0].amount,
            BigDecimal::from_str("499.99").unwrap()
        );
        assert_eq!(plan.grants[0].quantity, 3);
    }

    #[test]
    fn test_digital_classification() {
        assert!(ContentType::Document.is_digital());
        assert!(ContentType::Video.is_digital());
        assert!(ContentType::Audio.is_digital());
        assert!(!ContentType::Physical.is_digital());
    }

    #[test]
    fn test_frozen_total_matches_line_snapshots() {
        // total = sum(price_at_purchase * quantity), computed at creation
        let lines = [("1000.00", 2), ("250.50", 1), ("99.99", 3)];
        let total = lines
            .iter()
            .fold(BigDecimal::from(0), |acc, (price, quantity)| {
                acc + BigDecimal::from_str(price).unwrap() * BigDecimal::from(*quantity)
            });

        assert_eq!(total, BigDecimal::from_str("2550.47").unwrap());
    }
}
