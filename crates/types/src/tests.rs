use crate::{
    filter_segment, title_case, CatalogError, FeatureRow, HealthStatus, PriceRecord,
    SegmentKey, SupportedCatalog, FEATURE_COUNT, FEATURE_NAMES,
};
use chrono::NaiveDate;

#[cfg(test)]
mod type_tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_artifact_name_is_normalized() {
        let key = SegmentKey::new("Arhar", "Madhya Pradesh");
        assert_eq!(key.artifact_name(), "arhar_madhya_pradesh_price_model");
    }

    #[test]
    fn test_normalized_key_title_cases_input() {
        let key = SegmentKey::normalized("  wHEAT ", "uttar pradesh");
        assert_eq!(key, SegmentKey::new("Wheat", "Uttar Pradesh"));
        assert_eq!(key.to_string(), "Wheat in Uttar Pradesh");
    }

    #[test]
    fn test_title_case_word_boundaries() {
        assert_eq!(title_case("west bengal"), "West Bengal");
        assert_eq!(title_case("MAHARASHTRA"), "Maharashtra");
        assert_eq!(title_case("jammu-kashmir"), "Jammu-Kashmir");
        assert_eq!(title_case(""), "");
    }

    #[test]
    fn test_feature_row_calendar_fields() {
        // 2024-03-04 is a Monday
        let row = FeatureRow::for_date(date(2024, 3, 4), 12.5, 600.0, 2100.0);
        assert_eq!(row.month, 3);
        assert_eq!(row.day_of_week, 0);

        let sunday = FeatureRow::for_date(date(2024, 3, 10), 0.0, 0.0, 0.0);
        assert_eq!(sunday.day_of_week, 6);
    }

    #[test]
    fn test_feature_vector_order() {
        let row = FeatureRow {
            rainfall: 1.0,
            demand: 2.0,
            month: 3,
            day_of_week: 4,
            moving_average_7_day: 5.0,
        };
        assert_eq!(row.to_vector(), [1.0, 2.0, 3.0, 4.0, 5.0]);
        assert_eq!(FEATURE_NAMES.len(), FEATURE_COUNT);
        assert_eq!(FEATURE_NAMES[4], "moving_average_7_day");
    }

    #[test]
    fn test_filter_segment_is_exact_and_ordered() {
        let wheat = SegmentKey::new("Wheat", "Punjab");
        let paddy = SegmentKey::new("Paddy", "Punjab");
        let records = vec![
            PriceRecord::new(date(2024, 1, 2), &wheat, 2.0, 0.0, 0.0),
            PriceRecord::new(date(2024, 1, 1), &paddy, 9.0, 0.0, 0.0),
            PriceRecord::new(date(2024, 1, 1), &wheat, 1.0, 0.0, 0.0),
        ];

        let segment = filter_segment(&records, &wheat);
        assert_eq!(segment.len(), 2);
        assert_eq!(segment[0].price, 2.0);
        assert_eq!(segment[1].price, 1.0);

        let lowercase = SegmentKey::new("wheat", "punjab");
        assert!(filter_segment(&records, &lowercase).is_empty());
    }

    #[test]
    fn test_default_catalog_contents() {
        let catalog = SupportedCatalog::default();
        assert_eq!(catalog.crops().count(), 8);
        assert_eq!(catalog.segments().len(), 20);
        assert!(catalog.contains(&SegmentKey::new("Cotton", "Gujarat")));
        assert_eq!(
            catalog.states("Sugarcane").unwrap(),
            &["Uttar Pradesh".to_string(), "Maharashtra".to_string()]
        );
    }

    #[test]
    fn test_catalog_check_messages() {
        let catalog = SupportedCatalog::default();

        let err = catalog.check(&SegmentKey::new("Rice", "Punjab")).unwrap_err();
        assert_eq!(err, CatalogError::UnsupportedCrop("Rice".into()));
        assert_eq!(err.to_string(), "Unsupported crop: Rice");

        let err = catalog.check(&SegmentKey::new("Wheat", "Kerala")).unwrap_err();
        assert_eq!(err.to_string(), "State Kerala not supported for Wheat");
    }

    #[test]
    fn test_catalog_serializes_as_plain_map() {
        let catalog = SupportedCatalog::default();
        let value = serde_json::to_value(&catalog).unwrap();
        assert_eq!(value["Moong"][0], "Rajasthan");
    }

    #[test]
    fn test_health_status_payload() {
        let status = HealthStatus::healthy("2024-01-01T00:00:00+00:00");
        let value = serde_json::to_value(&status).unwrap();
        assert_eq!(value["success"], true);
        assert_eq!(value["status"], "healthy");
    }
}
