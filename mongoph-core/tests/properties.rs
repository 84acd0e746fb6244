use bson::{Bson, DateTime, Document};
use mongoph_core::{
    page::{Pager, PaginationParams},
    record::{DATETIME_FORMAT, normalize},
};
use proptest::prelude::*;

fn plain_value() -> impl Strategy<Value = Bson> {
    prop_oneof![
        any::<i32>().prop_map(Bson::Int32),
        any::<i64>().prop_map(Bson::Int64),
        any::<bool>().prop_map(Bson::Boolean),
        "[a-z]{0,12}".prop_map(Bson::String),
        Just(Bson::Null),
    ]
}

fn plain_record() -> impl Strategy<Value = Document> {
    prop::collection::btree_map("[a-z_]{1,8}", plain_value(), 0..8)
        .prop_map(|fields| fields.into_iter().collect())
}

proptest! {
    #[test]
    fn records_without_datetimes_are_unchanged(record in plain_record()) {
        let mut normalized = record.clone();
        normalize(&mut normalized);

        prop_assert_eq!(normalized, record);
    }

    #[test]
    fn datetimes_become_second_precision_strings(millis in 0_i64..4_102_444_800_000) {
        let mut record = Document::new();
        record.insert("at", DateTime::from_millis(millis));
        normalize(&mut record);

        let text = record.get_str("at").unwrap();
        let parsed = chrono::NaiveDateTime::parse_from_str(text, DATETIME_FORMAT).unwrap();
        prop_assert_eq!(parsed.and_utc().timestamp(), millis.div_euclid(1000));
    }

    #[test]
    fn complete_pagers_window_exactly(skip in any::<u64>(), limit in 0_u64..1000) {
        prop_assert_eq!(Pager::new(skip, limit).window().unwrap(), Some((skip, limit)));
    }

    #[test]
    fn pages_follow_each_other(page in 1_u64..10_000, per_page in 1_u64..500) {
        let this = PaginationParams::new(page, per_page).offset();
        let next = PaginationParams::new(page + 1, per_page).offset();

        prop_assert_eq!(next - this, per_page);
        prop_assert_eq!(PaginationParams::new(page, per_page).pager().limit, Some(per_page));
    }
}
